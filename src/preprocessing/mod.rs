/// Модуль предобработки данных

pub mod feature_engineering;
pub mod normalization;
pub mod split;

pub use feature_engineering::{DerivedDataset, FeatureEngineer, TempoRange};
pub use normalization::{DataNormalizer, ScalingParameters};
pub use split::{DatasetSplit, DatasetSplitter};
