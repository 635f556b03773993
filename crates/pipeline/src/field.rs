//! The canonical 14-field schema every pipeline stage agrees on.
//!
//! Column order is part of the contract: the canonical CSV layout and the
//! encoder's fitted input both follow [`CANONICAL_COLUMNS`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Field {
    Age,
    Sex,
    Cp,
    Trestbps,
    Chol,
    Fbs,
    Restecg,
    Thalach,
    Exang,
    Oldpeak,
    Slope,
    Ca,
    Thal,
    Target,
}

/// How a field's raw values are coerced and encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Whole number, must be strictly positive.
    PositiveInt,
    /// Real number, must be finite and non-negative.
    NonNegativeFloat,
    /// Integer code drawn from a legal set.
    Categorical,
    /// Training label, handled by the target binarizer.
    Label,
}

/// The 13 input features, in the order the encoder consumes them.
pub const FEATURES: [Field; 13] = [
    Field::Age,
    Field::Sex,
    Field::Cp,
    Field::Trestbps,
    Field::Chol,
    Field::Fbs,
    Field::Restecg,
    Field::Thalach,
    Field::Exang,
    Field::Oldpeak,
    Field::Slope,
    Field::Ca,
    Field::Thal,
];

/// Canonical CSV column order (features followed by `target`).
pub const CANONICAL_COLUMNS: [Field; 14] = [
    Field::Age,
    Field::Sex,
    Field::Cp,
    Field::Trestbps,
    Field::Chol,
    Field::Fbs,
    Field::Restecg,
    Field::Thalach,
    Field::Exang,
    Field::Oldpeak,
    Field::Slope,
    Field::Ca,
    Field::Thal,
    Field::Target,
];

impl Field {
    pub fn name(self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Cp => "cp",
            Self::Trestbps => "trestbps",
            Self::Chol => "chol",
            Self::Fbs => "fbs",
            Self::Restecg => "restecg",
            Self::Thalach => "thalach",
            Self::Exang => "exang",
            Self::Oldpeak => "oldpeak",
            Self::Slope => "slope",
            Self::Ca => "ca",
            Self::Thal => "thal",
            Self::Target => "target",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Self::Age | Self::Trestbps | Self::Chol | Self::Thalach => FieldKind::PositiveInt,
            Self::Oldpeak => FieldKind::NonNegativeFloat,
            Self::Target => FieldKind::Label,
            Self::Sex
            | Self::Cp
            | Self::Fbs
            | Self::Restecg
            | Self::Exang
            | Self::Slope
            | Self::Ca
            | Self::Thal => FieldKind::Categorical,
        }
    }

    pub fn is_categorical(self) -> bool {
        self.kind() == FieldKind::Categorical
    }

    pub fn is_numeric(self) -> bool {
        matches!(self.kind(), FieldKind::PositiveInt | FieldKind::NonNegativeFloat)
    }

    /// Position of this field in [`CANONICAL_COLUMNS`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Clinical code space of a categorical field in the canonical encoding.
    ///
    /// This is the baseline a [`crate::config::RepairRules`] starts from;
    /// schemas may override it, and the fitted encoder records whatever the
    /// rules said at fit time.
    pub fn canonical_codes(self) -> &'static [i64] {
        match self {
            Self::Sex | Self::Fbs | Self::Exang => &[0, 1],
            Self::Cp => &[1, 2, 3, 4],
            Self::Restecg => &[0, 1, 2],
            Self::Slope => &[1, 2, 3],
            Self::Ca => &[0, 1, 2, 3],
            Self::Thal => &[3, 6, 7],
            _ => &[],
        }
    }

    pub fn categorical() -> impl Iterator<Item = Field> {
        FEATURES.into_iter().filter(|f| f.is_categorical())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown canonical field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for Field {
    type Err = UnknownField;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        CANONICAL_COLUMNS
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}
