//! `heartline schema`: list, show and validate source schemas.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use heartline_pipeline::config::{builtin_names, BUILTIN_SCHEMAS};
use heartline_pipeline::SourceSchema;
use serde::Serialize;

use crate::exit_codes::EXIT_USAGE;
use crate::CliError;

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// List built-in schemas
    List {
        #[arg(long)]
        json: bool,
    },

    /// Print a schema document (built-in name or file)
    #[command(after_help = "\
Examples:
  heartline schema show heart_failure
  heartline schema show ./my_source.toml")]
    Show {
        schema: String,
    },

    /// Validate a schema file and print its fingerprint
    Validate {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

/// Resolve a built-in schema name or a path to a schema TOML file.
pub(crate) fn resolve_schema(name_or_path: &str) -> Result<SourceSchema, CliError> {
    if builtin_names().contains(&name_or_path) {
        return Ok(SourceSchema::builtin(name_or_path)?);
    }
    let path = Path::new(name_or_path);
    if !path.is_file() {
        return Err(CliError {
            code: EXIT_USAGE,
            message: format!("unknown schema '{name_or_path}'"),
            hint: Some(format!(
                "use a schema file path or one of: {}",
                builtin_names().join(", ")
            )),
        });
    }
    load_schema_file(path)
}

fn load_schema_file(path: &Path) -> Result<SourceSchema, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {}: {e}", path.display())))?;
    SourceSchema::from_toml(&text)
        .map_err(|e| CliError::from(e).with_hint(format!("in {}", path.display())))
}

#[derive(Serialize)]
struct SchemaSummary<'a> {
    name: &'a str,
    version: u32,
    header: bool,
    description: &'a str,
    fingerprint: &'a str,
}

impl<'a> SchemaSummary<'a> {
    fn of(schema: &'a SourceSchema) -> Self {
        Self {
            name: schema.name(),
            version: schema.version(),
            header: schema.has_header(),
            description: &schema.spec().description,
            fingerprint: schema.fingerprint(),
        }
    }
}

pub fn cmd_schema(cmd: SchemaCommands) -> Result<(), CliError> {
    match cmd {
        SchemaCommands::List { json } => {
            let schemas = builtin_names()
                .into_iter()
                .map(SourceSchema::builtin)
                .collect::<Result<Vec<_>, _>>()?;
            if json {
                let summaries: Vec<SchemaSummary> = schemas.iter().map(SchemaSummary::of).collect();
                return crate::print_json(&summaries);
            }
            for schema in &schemas {
                println!("{:<22} v{}  {}", schema.name(), schema.version(), schema.spec().description);
            }
            Ok(())
        }
        SchemaCommands::Show { schema } => {
            if let Some((_, text)) = BUILTIN_SCHEMAS.iter().find(|(name, _)| *name == schema) {
                print!("{text}");
                return Ok(());
            }
            let resolved = resolve_schema(&schema)?;
            let text = toml::to_string_pretty(resolved.spec()).map_err(|e| CliError::eval(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
        SchemaCommands::Validate { file, json } => {
            let schema = load_schema_file(&file)?;
            if json {
                return crate::print_json(&SchemaSummary::of(&schema));
            }
            println!("ok  {} v{}  {}", schema.name(), schema.version(), schema.fingerprint());
            Ok(())
        }
    }
}
