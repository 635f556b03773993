// Configuration loading

pub mod settings;

pub use settings::{ConfigError, FetchSettings, Settings, SourceSettings, TrainSettings};
