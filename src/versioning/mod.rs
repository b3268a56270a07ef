//! Версионирование моделей: метаданные, артефакты и сравнение версий

pub mod artifacts;
pub mod comparison;
pub mod registry;

pub use artifacts::ArtifactStore;
pub use comparison::{VersionComparator, VersionComparison};
pub use registry::VersionRegistry;
