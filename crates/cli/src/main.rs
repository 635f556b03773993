// heartline CLI - heart-disease dataset reconciliation and consistent inference

mod dataset;
mod exit_codes;
mod fetch;
mod model;
mod schema;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use heartline_config::{ConfigError, Settings};
use heartline_io::IoError;
use heartline_pipeline::PipelineError;
use serde::Serialize;

use exit_codes::{
    config_exit_code, io_exit_code, pipeline_exit_code, EXIT_ERROR, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE,
};

#[derive(Parser)]
#[command(name = "heartline")]
#[command(about = "Reconcile heart-disease datasets and serve consistent predictions")]
#[command(version)]
struct Cli {
    /// Settings file (default: ./heartline.toml, then the per-user config dir)
    #[arg(long, global = true, env = "HEARTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(long, short = 'v', global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the dataset from the first usable configured source
    Fetch(fetch::FetchArgs),

    /// Reconcile a source file into canonical CSV
    Preprocess(dataset::PreprocessArgs),

    /// Profile a dataset: shape, missing values, value counts, class balance
    Inspect(dataset::InspectArgs),

    /// Fit the pipeline and classifier and write both artifacts
    Train(model::TrainArgs),

    /// Score the stored classifier on a labeled dataset
    Evaluate(model::EvaluateArgs),

    /// Predict one or more JSON records through the stored pipeline
    Predict(model::PredictArgs),

    /// Source schema tools
    #[command(subcommand)]
    Schema(schema::SchemaCommands),

    /// Settings file tools
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings as TOML
    Show,

    /// Print the per-user settings file path
    Path,

    /// Write the default settings to a file
    Init {
        /// Target file (default: ./heartline.toml)
        #[arg(default_value = "heartline.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let load = || -> Result<Settings, CliError> {
        let (settings, from) = Settings::load(cli.config.as_deref())?;
        if let Some(path) = from {
            log::debug!("settings: {}", path.display());
        }
        Ok(settings)
    };

    match cli.command {
        Commands::Fetch(args) => fetch::cmd_fetch(&load()?, args),
        Commands::Preprocess(args) => dataset::cmd_preprocess(args),
        Commands::Inspect(args) => dataset::cmd_inspect(&load()?, args),
        Commands::Train(args) => model::cmd_train(&load()?, args),
        Commands::Evaluate(args) => model::cmd_evaluate(&load()?, args),
        Commands::Predict(args) => model::cmd_predict(&load()?, args),
        Commands::Schema(cmd) => schema::cmd_schema(cmd),
        Commands::Config(cmd) => cmd_config(cmd, load),
    }
}

fn cmd_config(cmd: ConfigCommands, load: impl Fn() -> Result<Settings, CliError>) -> Result<(), CliError> {
    match cmd {
        ConfigCommands::Show => {
            let text = toml::to_string_pretty(&load()?).map_err(|e| CliError::eval(e.to_string()))?;
            print!("{text}");
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", Settings::config_path().display());
            Ok(())
        }
        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                return Err(CliError::args(format!("{} already exists", path.display()))
                    .with_hint("pass --force to overwrite"));
            }
            Settings::default().save(&path)?;
            eprintln!("wrote {}", path.display());
            Ok(())
        }
    }
}

/// Pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::eval(e.to_string()))?;
    println!("{text}");
    Ok(())
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn eval(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PipelineError> for CliError {
    fn from(err: PipelineError) -> Self {
        let hint = match &err {
            PipelineError::OutOfDistribution { field, .. } => Some(format!(
                "add a [repair.remap.{field}] rule to the schema if this code is a known alias"
            )),
            PipelineError::SchemaVersionMismatch { .. } => {
                Some("retrain so the pipeline and model artifacts match".to_string())
            }
            _ => None,
        };
        Self { code: pipeline_exit_code(&err), message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        match err {
            IoError::Pipeline(e) => e.into(),
            other => {
                let hint = match &other {
                    IoError::Artifact { .. } => Some("run `heartline train` first".to_string()),
                    IoError::SourceUnavailable { .. } => {
                        Some("check network access or the [[sources]] list in heartline.toml".to_string())
                    }
                    _ => None,
                };
                Self { code: io_exit_code(&other), message: other.to_string(), hint }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self { code: config_exit_code(&err), message: err.to_string(), hint: None }
    }
}
