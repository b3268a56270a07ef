//! Popularity ML - пайплайн обучения и версионирования модели популярности треков

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod types;
pub mod versioning;

pub use config::{PipelineConfig, SplitConfig};
pub use error::{PipelineError, Result};
pub use models::*;
pub use pipeline::{train_version, TrainedVersion};
pub use preprocessing::*;
pub use types::*;
pub use versioning::*;
