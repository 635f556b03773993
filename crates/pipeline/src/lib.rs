//! `heartline-pipeline`: heart-disease dataset reconciliation and
//! inference-consistency engine.
//!
//! Pure engine crate: receives pre-loaded raw tables and records, returns
//! canonical records, encoded vectors and predictions. No filesystem or
//! network access.

pub mod artifact;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluate;
pub mod field;
pub mod guard;
pub mod ingest;
pub mod normalize;
pub mod predict;
pub mod profile;
pub mod record;
pub mod repair;
pub mod split;
pub mod table;
pub mod target;

pub use artifact::{ClassifierArtifact, PipelineArtifact};
pub use classifier::{Classifier, LogisticRegression, TrainParams, TrainReport};
pub use config::{RepairRules, SchemaSpec, SourceSchema};
pub use encoder::{EncoderLayout, FeatureEncoder, FittedEncoder};
pub use error::{PipelineError, RecordRef};
pub use evaluate::{evaluate, ConfusionMatrix, EvaluationMetrics};
pub use field::{Field, CANONICAL_COLUMNS, FEATURES};
pub use guard::{ConsistencyGuard, EncodedBatch, EncodedRecord, PipelineInput, PipelineOutput};
pub use ingest::{ingest_training, PreprocessReport};
pub use normalize::{normalize, NormalizedTable};
pub use predict::{predict_one, Prediction, Predictor};
pub use record::{CanonicalRecord, LabeledRecord};
pub use repair::{repair_record, repair_row, repair_table, Repair, RepairedBatch};
pub use split::{stratified_split, Split};
pub use table::{Cell, RawRecord, RawTable};
pub use target::{binarize, binarize_batch, binarize_cell, binarize_column, LabeledBatch};
