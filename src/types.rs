/// Типы данных пайплайна

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Очищенная запись о треке. Числовые поля опциональны только на границе
/// десериализации: пропуски отлавливает `FeatureEngineer`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SongRecord {
    #[serde(default)]
    pub track_id: Option<String>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub track_artist: Option<String>,
    #[serde(default, alias = "popularity")]
    pub track_popularity: Option<f64>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub key: Option<f64>,
    #[serde(default)]
    pub loudness: Option<f64>,
    #[serde(default)]
    pub mode: Option<f64>,
    #[serde(default)]
    pub speechiness: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub instrumentalness: Option<f64>,
    #[serde(default)]
    pub liveness: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
    #[serde(default)]
    pub tempo: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PopularityCategory {
    Low,
    Medium,
    High,
}

impl PopularityCategory {
    /// Интервалы (0, 30], (30, 60], (60, 100]. Всё, что вне них, без категории.
    pub fn from_popularity(popularity: f64) -> Option<Self> {
        if popularity > 0.0 && popularity <= 30.0 {
            Some(Self::Low)
        } else if popularity > 30.0 && popularity <= 60.0 {
            Some(Self::Medium)
        } else if popularity > 60.0 && popularity <= 100.0 {
            Some(Self::High)
        } else {
            None
        }
    }
}

/// Признаки одного трека после feature engineering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    #[serde(default)]
    pub track_id: Option<String>,
    pub danceability: f64,
    pub energy: f64,
    pub key: f64,
    pub loudness: f64,
    pub mode: f64,
    pub speechiness: f64,
    pub acousticness: f64,
    pub instrumentalness: f64,
    pub liveness: f64,
    pub valence: f64,
    pub tempo: f64,
    pub duration_min: f64,
    pub energy_ratio: f64,
    pub mood_score: f64,
    pub tempo_normalized: f64,
    #[serde(default)]
    pub popularity_category: Option<PopularityCategory>,
    pub track_popularity: f64,
}

/// Колонка, которую модель может получить на вход
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Danceability,
    Energy,
    Key,
    Loudness,
    Mode,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    DurationMin,
    EnergyRatio,
    MoodScore,
    TempoNormalized,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Danceability => "danceability",
            Feature::Energy => "energy",
            Feature::Key => "key",
            Feature::Loudness => "loudness",
            Feature::Mode => "mode",
            Feature::Speechiness => "speechiness",
            Feature::Acousticness => "acousticness",
            Feature::Instrumentalness => "instrumentalness",
            Feature::Liveness => "liveness",
            Feature::Valence => "valence",
            Feature::Tempo => "tempo",
            Feature::DurationMin => "duration_min",
            Feature::EnergyRatio => "energy_ratio",
            Feature::MoodScore => "mood_score",
            Feature::TempoNormalized => "tempo_normalized",
        }
    }

    pub fn value(&self, row: &DerivedFeatures) -> f64 {
        match self {
            Feature::Danceability => row.danceability,
            Feature::Energy => row.energy,
            Feature::Key => row.key,
            Feature::Loudness => row.loudness,
            Feature::Mode => row.mode,
            Feature::Speechiness => row.speechiness,
            Feature::Acousticness => row.acousticness,
            Feature::Instrumentalness => row.instrumentalness,
            Feature::Liveness => row.liveness,
            Feature::Valence => row.valence,
            Feature::Tempo => row.tempo,
            Feature::DurationMin => row.duration_min,
            Feature::EnergyRatio => row.energy_ratio,
            Feature::MoodScore => row.mood_score,
            Feature::TempoNormalized => row.tempo_normalized,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Гиперпараметры ансамбля
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub tree_count: usize,
    pub max_depth: usize,
    #[serde(default = "default_min_samples_to_split")]
    pub min_samples_to_split: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_min_samples_to_split() -> usize { 2 }
fn default_seed() -> u64 { 42 }

impl Hyperparameters {
    pub fn validate(&self) -> Result<()> {
        if self.tree_count == 0 {
            return Err(PipelineError::invalid("tree_count", self.tree_count, "must be positive"));
        }
        if self.max_depth == 0 {
            return Err(PipelineError::invalid("max_depth", self.max_depth, "must be positive"));
        }
        if self.min_samples_to_split < 2 {
            return Err(PipelineError::invalid(
                "min_samples_to_split",
                self.min_samples_to_split,
                "must be at least 2",
            ));
        }
        Ok(())
    }
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            tree_count: 100,
            max_depth: 15,
            min_samples_to_split: default_min_samples_to_split(),
            seed: default_seed(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub n_train: usize,
    pub n_test: usize,
}

/// Снимок одной обученной версии. Создаётся один раз и не меняется.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub features: Vec<String>,
    pub n_features: usize,
    pub hyperparameters: Hyperparameters,
    pub n_train: usize,
    pub n_test: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl VersionRecord {
    pub fn metrics(&self) -> Metrics {
        Metrics {
            rmse: self.rmse,
            mae: self.mae,
            r2: self.r2,
        }
    }
}

/// Сравнение двух версий. Положительный процент всегда означает, что
/// `candidate` лучше `baseline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub baseline: String,
    pub candidate: String,
    pub rmse_improvement_pct: f64,
    pub mae_improvement_pct: f64,
    pub r2_improvement_pct: f64,
    pub rmse_delta: f64,
    pub mae_delta: f64,
    pub r2_delta: f64,
    pub winner: String,
}
