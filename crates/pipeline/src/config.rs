use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::field::{Field, FieldKind};

// ---------------------------------------------------------------------------
// Schema document (as written in TOML)
// ---------------------------------------------------------------------------

/// A source schema exactly as configured. Keys are plain strings so the
/// document round-trips through TOML and JSON unchanged; [`SourceSchema`]
/// is the validated, typed form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaSpec {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub description: String,
    /// False for sources without a header row (UCI `processed.*.data`).
    #[serde(default = "default_header")]
    pub header: bool,
    /// Column names assigned by position when `header = false`.
    #[serde(default)]
    pub positional: Vec<String>,
    /// Source column name → canonical field name. Matched case-insensitively.
    #[serde(default)]
    pub columns: BTreeMap<String, String>,
    /// Canonical field → (textual category → integer code).
    #[serde(default)]
    pub values: BTreeMap<String, BTreeMap<String, i64>>,
    /// Canonical field → value synthesized when the source lacks the column.
    #[serde(default)]
    pub defaults: BTreeMap<String, f64>,
    #[serde(default)]
    pub repair: RepairSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepairSpec {
    /// Text tokens meaning "no value" (compared after trimming).
    #[serde(default = "default_missing_tokens")]
    pub missing_tokens: Vec<String>,
    /// Per-field legal code sets overriding the canonical domain.
    #[serde(default)]
    pub legal: BTreeMap<String, Vec<i64>>,
    /// Per-field `"bad code" = good code` substitutions.
    #[serde(default)]
    pub remap: BTreeMap<String, BTreeMap<String, i64>>,
}

impl Default for RepairSpec {
    fn default() -> Self {
        Self {
            missing_tokens: default_missing_tokens(),
            legal: BTreeMap::new(),
            remap: BTreeMap::new(),
        }
    }
}

fn default_version() -> u32 {
    1
}

fn default_header() -> bool {
    true
}

fn default_missing_tokens() -> Vec<String> {
    vec!["?".into(), "".into()]
}

// ---------------------------------------------------------------------------
// Repair rules
// ---------------------------------------------------------------------------

/// Legal code sets, remap rules and missing-value tokens for one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RepairRules {
    legal: BTreeMap<Field, BTreeSet<i64>>,
    remap: BTreeMap<Field, BTreeMap<i64, i64>>,
    missing_tokens: Vec<String>,
}

impl RepairRules {
    /// Canonical legal sets, no remap rules, default missing tokens.
    pub fn canonical() -> Self {
        let legal = Field::categorical()
            .map(|f| (f, f.canonical_codes().iter().copied().collect()))
            .collect();
        Self {
            legal,
            remap: BTreeMap::new(),
            missing_tokens: default_missing_tokens(),
        }
    }

    pub fn with_remap(mut self, field: Field, from: i64, to: i64) -> Self {
        self.remap.entry(field).or_default().insert(from, to);
        self
    }

    pub fn with_legal(mut self, field: Field, codes: impl IntoIterator<Item = i64>) -> Self {
        self.legal.insert(field, codes.into_iter().collect());
        self
    }

    pub fn with_missing_tokens(mut self, tokens: Vec<String>) -> Self {
        self.missing_tokens = tokens;
        self
    }

    pub fn legal(&self, field: Field) -> Option<&BTreeSet<i64>> {
        self.legal.get(&field)
    }

    pub fn is_legal(&self, field: Field, code: i64) -> bool {
        self.legal.get(&field).is_some_and(|set| set.contains(&code))
    }

    pub fn remap_for(&self, field: Field, code: i64) -> Option<i64> {
        self.remap.get(&field).and_then(|m| m.get(&code)).copied()
    }

    pub fn remaps(&self) -> impl Iterator<Item = (Field, i64, i64)> + '_ {
        self.remap
            .iter()
            .flat_map(|(f, m)| m.iter().map(move |(from, to)| (*f, *from, *to)))
    }

    pub fn missing_tokens(&self) -> &[String] {
        &self.missing_tokens
    }

    /// Every categorical feature needs a non-empty legal set; every remap
    /// must lead from an illegal code to a legal one.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for field in Field::categorical() {
            match self.legal.get(&field) {
                Some(set) if !set.is_empty() => {}
                _ => {
                    return Err(PipelineError::ConfigValidation(format!(
                        "field '{field}' has no legal codes"
                    )))
                }
            }
        }
        for (field, set) in &self.legal {
            if !field.is_categorical() {
                return Err(PipelineError::ConfigValidation(format!(
                    "legal set given for non-categorical field '{field}'"
                )));
            }
            if set.is_empty() {
                return Err(PipelineError::ConfigValidation(format!(
                    "field '{field}' has an empty legal set"
                )));
            }
        }
        for (field, from, to) in self.remaps() {
            if !field.is_categorical() {
                return Err(PipelineError::ConfigValidation(format!(
                    "remap given for non-categorical field '{field}'"
                )));
            }
            if self.is_legal(field, from) {
                return Err(PipelineError::ConfigValidation(format!(
                    "remap {field}: {from} -> {to} rewrites a legal code"
                )));
            }
            if !self.is_legal(field, to) {
                return Err(PipelineError::ConfigValidation(format!(
                    "remap {field}: {from} -> {to} targets an illegal code"
                )));
            }
        }
        Ok(())
    }

    fn from_spec(spec: &RepairSpec) -> Result<Self, PipelineError> {
        let mut rules = Self::canonical().with_missing_tokens(spec.missing_tokens.clone());
        for (name, codes) in &spec.legal {
            let field = parse_field(name, "repair.legal")?;
            rules = rules.with_legal(field, codes.iter().copied());
        }
        for (name, pairs) in &spec.remap {
            let field = parse_field(name, "repair.remap")?;
            for (from, to) in pairs {
                let from: i64 = from.trim().parse().map_err(|_| {
                    PipelineError::ConfigValidation(format!(
                        "repair.remap.{name}: '{from}' is not an integer code"
                    ))
                })?;
                rules = rules.with_remap(field, from, *to);
            }
        }
        rules.validate()?;
        Ok(rules)
    }
}

impl Default for RepairRules {
    fn default() -> Self {
        Self::canonical()
    }
}

// ---------------------------------------------------------------------------
// Validated schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SourceSchema {
    spec: SchemaSpec,
    renames: HashMap<String, Field>,
    value_maps: BTreeMap<Field, BTreeMap<String, i64>>,
    defaults: BTreeMap<Field, f64>,
    repair: RepairRules,
    fingerprint: String,
}

impl SourceSchema {
    pub fn from_toml(input: &str) -> Result<Self, PipelineError> {
        let spec: SchemaSpec =
            toml::from_str(input).map_err(|e| PipelineError::ConfigParse(e.to_string()))?;
        Self::from_spec(spec)
    }

    /// Validate a schema document and compile it into lookup tables.
    pub fn from_spec(spec: SchemaSpec) -> Result<Self, PipelineError> {
        if spec.name.trim().is_empty() {
            return Err(PipelineError::ConfigValidation("schema name is empty".into()));
        }
        if !spec.header && spec.positional.is_empty() {
            return Err(PipelineError::ConfigValidation(format!(
                "schema '{}': header = false requires positional column names",
                spec.name
            )));
        }

        let mut renames = HashMap::new();
        for (source, target) in &spec.columns {
            let field = parse_field(target, "columns")?;
            let key = source.trim().to_lowercase();
            if renames.insert(key, field).is_some() {
                return Err(PipelineError::ConfigValidation(format!(
                    "columns: '{source}' is listed twice (names are case-insensitive)"
                )));
            }
        }

        let mut value_maps = BTreeMap::new();
        for (name, map) in &spec.values {
            let field = parse_field(name, "values")?;
            if field.is_numeric() {
                return Err(PipelineError::ConfigValidation(format!(
                    "values: '{field}' is numeric and cannot carry a category map"
                )));
            }
            value_maps.insert(field, map.clone());
        }

        let repair = RepairRules::from_spec(&spec.repair)?;

        let mut defaults = BTreeMap::new();
        for (name, value) in &spec.defaults {
            let field = parse_field(name, "defaults")?;
            if field.kind() == FieldKind::Label {
                return Err(PipelineError::ConfigValidation(
                    "defaults: 'target' cannot be synthesized".into(),
                ));
            }
            if !value.is_finite() {
                return Err(PipelineError::ConfigValidation(format!(
                    "defaults: {field} = {value} is not a number"
                )));
            }
            if field.is_categorical() && (value.fract() != 0.0 || !repair.is_legal(field, *value as i64)) {
                return Err(PipelineError::ConfigValidation(format!(
                    "defaults: {field} = {value} is not a legal code"
                )));
            }
            defaults.insert(field, *value);
        }

        let fingerprint = fingerprint_spec(&spec);

        Ok(Self {
            spec,
            renames,
            value_maps,
            defaults,
            repair,
            fingerprint,
        })
    }

    /// One of the schemas embedded in the crate.
    pub fn builtin(name: &str) -> Result<Self, PipelineError> {
        let source = BUILTIN_SCHEMAS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, src)| *src)
            .ok_or_else(|| {
                PipelineError::ConfigValidation(format!(
                    "no built-in schema named '{name}' (available: {})",
                    builtin_names().join(", ")
                ))
            })?;
        Self::from_toml(source)
    }

    /// The canonical layout itself, with the given repair rules.
    pub fn canonical_with(rules: RepairRules) -> Result<Self, PipelineError> {
        let mut spec = Self::builtin("canonical")?.spec;
        spec.repair = rules.to_spec();
        Self::from_spec(spec)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn version(&self) -> u32 {
        self.spec.version
    }

    pub fn spec(&self) -> &SchemaSpec {
        &self.spec
    }

    pub fn has_header(&self) -> bool {
        self.spec.header
    }

    pub fn positional(&self) -> &[String] {
        &self.spec.positional
    }

    pub fn repair(&self) -> &RepairRules {
        &self.repair
    }

    /// Canonical field a (cleaned) source column name resolves to.
    pub fn resolve_column(&self, source: &str) -> Option<Field> {
        let key = source.trim().to_lowercase();
        self.renames
            .get(&key)
            .copied()
            .or_else(|| key.parse::<Field>().ok())
    }

    pub fn value_map(&self, field: Field) -> Option<&BTreeMap<String, i64>> {
        self.value_maps.get(&field)
    }

    pub fn default_for(&self, field: Field) -> Option<f64> {
        self.defaults.get(&field).copied()
    }

    /// `sha256:<hex>` over the schema document's canonical JSON form.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl RepairRules {
    fn to_spec(&self) -> RepairSpec {
        RepairSpec {
            missing_tokens: self.missing_tokens.clone(),
            legal: self
                .legal
                .iter()
                .map(|(f, set)| (f.name().to_string(), set.iter().copied().collect()))
                .collect(),
            remap: self
                .remap
                .iter()
                .map(|(f, m)| {
                    let pairs = m.iter().map(|(from, to)| (from.to_string(), *to)).collect();
                    (f.name().to_string(), pairs)
                })
                .collect(),
        }
    }
}

fn parse_field(name: &str, section: &str) -> Result<Field, PipelineError> {
    name.parse::<Field>()
        .map_err(|e| PipelineError::ConfigValidation(format!("{section}: {e}")))
}

fn fingerprint_spec(spec: &SchemaSpec) -> String {
    // BTreeMap keys serialize sorted, so equal documents hash equally.
    let bytes = serde_json::to_vec(spec).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("sha256:{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Built-in schemas
// ---------------------------------------------------------------------------

pub const BUILTIN_SCHEMAS: &[(&str, &str)] = &[
    ("canonical", include_str!("../schemas/canonical.toml")),
    ("canonical_remap_zero", include_str!("../schemas/canonical_remap_zero.toml")),
    ("uci_cleveland", include_str!("../schemas/uci_cleveland.toml")),
    ("heart_failure", include_str!("../schemas/heart_failure.toml")),
    ("heart_kaggle", include_str!("../schemas/heart_kaggle.toml")),
];

pub fn builtin_names() -> Vec<&'static str> {
    BUILTIN_SCHEMAS.iter().map(|(n, _)| *n).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
name = "minimal"

[columns]
MaxHR = "thalach"
"#;

    #[test]
    fn every_builtin_parses() {
        for name in builtin_names() {
            let schema = SourceSchema::builtin(name).unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(schema.name(), name);
            assert!(schema.fingerprint().starts_with("sha256:"));
        }
    }

    #[test]
    fn minimal_defaults() {
        let schema = SourceSchema::from_toml(MINIMAL).unwrap();
        assert_eq!(schema.version(), 1);
        assert!(schema.has_header());
        assert_eq!(schema.repair().missing_tokens(), &["?".to_string(), String::new()]);
        assert!(schema.repair().is_legal(Field::Thal, 7));
        assert!(!schema.repair().is_legal(Field::Thal, 0));
        assert_eq!(schema.repair().remap_for(Field::Slope, 0), None);
    }

    #[test]
    fn rename_lookup_is_case_insensitive_and_falls_back_to_canonical() {
        let schema = SourceSchema::from_toml(MINIMAL).unwrap();
        assert_eq!(schema.resolve_column("maxhr"), Some(Field::Thalach));
        assert_eq!(schema.resolve_column("  MAXHR "), Some(Field::Thalach));
        assert_eq!(schema.resolve_column("Oldpeak"), Some(Field::Oldpeak));
        assert_eq!(schema.resolve_column("comment"), None);
    }

    #[test]
    fn parse_remap_rules() {
        let input = r#"
name = "remapped"

[repair.remap.slope]
"0" = 1

[repair.remap.thal]
"0" = 3
"#;
        let schema = SourceSchema::from_toml(input).unwrap();
        let rules = schema.repair();
        assert_eq!(rules.remap_for(Field::Slope, 0), Some(1));
        assert_eq!(rules.remap_for(Field::Thal, 0), Some(3));
        assert_eq!(rules.remaps().count(), 2);
    }

    #[test]
    fn reject_remap_of_legal_code() {
        let input = r#"
name = "bad"
[repair.remap.thal]
"3" = 6
"#;
        let err = SourceSchema::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("rewrites a legal code"), "{err}");
    }

    #[test]
    fn reject_remap_to_illegal_code() {
        let input = r#"
name = "bad"
[repair.remap.slope]
"0" = 4
"#;
        let err = SourceSchema::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("targets an illegal code"), "{err}");
    }

    #[test]
    fn reject_unknown_field() {
        let input = r#"
name = "bad"
[columns]
Foo = "bar"
"#;
        let err = SourceSchema::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("unknown canonical field 'bar'"), "{err}");
    }

    #[test]
    fn reject_unknown_key() {
        let err = SourceSchema::from_toml("name = \"x\"\nheaders = true\n").unwrap_err();
        assert!(matches!(err, PipelineError::ConfigParse(_)));
    }

    #[test]
    fn reject_illegal_default() {
        let input = r#"
name = "bad"
[defaults]
thal = 0
"#;
        let err = SourceSchema::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("thal = 0 is not a legal code"), "{err}");
    }

    #[test]
    fn reject_fractional_categorical_default() {
        let input = r#"
name = "bad"
[defaults]
thal = 3.5
"#;
        let err = SourceSchema::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("thal = 3.5 is not a legal code"), "{err}");
    }

    #[test]
    fn fractional_numeric_default_is_kept() {
        let input = r#"
name = "ok"
[defaults]
oldpeak = 0.5
"#;
        let schema = SourceSchema::from_toml(input).unwrap();
        assert_eq!(schema.default_for(Field::Oldpeak), Some(0.5));
    }

    #[test]
    fn reject_headerless_without_positional() {
        let err = SourceSchema::from_toml("name = \"x\"\nheader = false\n").unwrap_err();
        assert!(err.to_string().contains("positional"), "{err}");
    }

    #[test]
    fn reject_value_map_on_numeric_field() {
        let input = r#"
name = "bad"
[values.age]
old = 80
"#;
        assert!(SourceSchema::from_toml(input).is_err());
    }

    #[test]
    fn fingerprint_tracks_rules() {
        let plain = SourceSchema::canonical_with(RepairRules::canonical()).unwrap();
        let again = SourceSchema::canonical_with(RepairRules::canonical()).unwrap();
        let remapped =
            SourceSchema::canonical_with(RepairRules::canonical().with_remap(Field::Slope, 0, 1)).unwrap();
        assert_eq!(plain.fingerprint(), again.fingerprint());
        assert_ne!(plain.fingerprint(), remapped.fingerprint());
    }

    #[test]
    fn remap_zero_builtin_matches_hand_built_rules() {
        let builtin = SourceSchema::builtin("canonical_remap_zero").unwrap();
        let rules = RepairRules::canonical()
            .with_remap(Field::Slope, 0, 1)
            .with_remap(Field::Thal, 0, 3);
        assert_eq!(builtin.repair(), &rules);
    }

    #[test]
    fn unknown_builtin() {
        let err = SourceSchema::builtin("cleveland").unwrap_err();
        assert!(err.to_string().contains("available: canonical"), "{err}");
    }
}
