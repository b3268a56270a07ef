//! Версионированная конфигурация пайплайна
//!
//! Один объект задаёт набор признаков, масштабирование, гиперпараметры
//! и параметры разбиения. Его читают и обучение, и реестр версий, так что
//! список признаков существует ровно в одном месте.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{Feature, Hyperparameters};

const V1_FEATURES: [Feature; 12] = [
    Feature::Danceability,
    Feature::Energy,
    Feature::Loudness,
    Feature::Speechiness,
    Feature::Acousticness,
    Feature::Instrumentalness,
    Feature::Liveness,
    Feature::Valence,
    Feature::TempoNormalized,
    Feature::EnergyRatio,
    Feature::MoodScore,
    Feature::DurationMin,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_split_seed")]
    pub seed: u64,
}

fn default_test_ratio() -> f64 { 0.2 }
fn default_split_seed() -> u64 { 42 }

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_ratio: default_test_ratio(),
            seed: default_split_seed(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: String,
    pub features: Vec<Feature>,
    #[serde(default)]
    pub scale: bool,
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PipelineConfig {
    /// Базовая версия: 12 признаков без масштабирования
    pub fn v1() -> Self {
        Self {
            version: "v1".to_string(),
            features: V1_FEATURES.to_vec(),
            scale: false,
            hyperparameters: Hyperparameters {
                tree_count: 100,
                max_depth: 15,
                min_samples_to_split: 2,
                seed: 42,
            },
            split: SplitConfig::default(),
            notes: None,
        }
    }

    /// v1 + key/mode, StandardScaler и более глубокие деревья
    pub fn v2() -> Self {
        let mut features = V1_FEATURES.to_vec();
        features.extend([Feature::Key, Feature::Mode]);

        Self {
            version: "v2".to_string(),
            features,
            scale: true,
            hyperparameters: Hyperparameters {
                tree_count: 150,
                max_depth: 20,
                min_samples_to_split: 5,
                seed: 42,
            },
            split: SplitConfig::default(),
            notes: Some(
                "Added StandardScaler, 2 more features, tuned hyperparameters".to_string(),
            ),
        }
    }

    pub fn builtin(version: &str) -> Option<Self> {
        match version {
            "v1" => Some(Self::v1()),
            "v2" => Some(Self::v2()),
            _ => None,
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.as_str().to_string()).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.version.trim().is_empty() {
            return Err(PipelineError::Config("version id is empty".to_string()));
        }
        if self.features.is_empty() {
            return Err(PipelineError::Config(format!(
                "version {} declares no features",
                self.version
            )));
        }
        for (i, feature) in self.features.iter().enumerate() {
            if self.features[..i].contains(feature) {
                return Err(PipelineError::Config(format!(
                    "feature {} listed twice in version {}",
                    feature, self.version
                )));
            }
        }
        if !(self.split.test_ratio > 0.0 && self.split.test_ratio < 1.0) {
            return Err(PipelineError::invalid(
                "test_ratio",
                self.split.test_ratio,
                "must be in (0, 1)",
            ));
        }

        self.hyperparameters.validate()?;

        Ok(())
    }
}
