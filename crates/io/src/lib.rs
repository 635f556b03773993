// File I/O operations

pub mod csv;
pub mod error;
pub mod json;
pub mod source;
pub mod store;

pub use error::IoError;
pub use source::{FileSource, RawSource, SourceTable};
pub use store::ArtifactStore;
