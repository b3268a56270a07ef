//! Feature engineering для модели популярности

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{DerivedFeatures, Feature, PopularityCategory, SongRecord};

/// Сглаживающая константа в знаменателе energy_ratio
pub const ACOUSTICNESS_SMOOTHING: f64 = 0.01;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Диапазон темпа, по которому нормализуется `tempo_normalized`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoRange {
    pub min: f64,
    pub max: f64,
}

impl TempoRange {
    pub fn from_records(records: &[SongRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(PipelineError::EmptyDataset(
                "no records to derive features from".to_string(),
            ));
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (row, record) in records.iter().enumerate() {
            let tempo = require(record.tempo, "tempo", row)?;
            min = min.min(tempo);
            max = max.max(tempo);
        }

        Ok(Self { min, max })
    }

    pub fn normalize(&self, tempo: f64) -> Result<f64> {
        let span = self.max - self.min;
        if span == 0.0 {
            return Err(PipelineError::DegenerateColumn("tempo".to_string()));
        }
        Ok((tempo - self.min) / span)
    }
}

/// Результат feature engineering по всему корпусу. Диапазон темпа
/// хранится вместе со строками: по нему же считаются новые треки.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedDataset {
    pub rows: Vec<DerivedFeatures>,
    pub tempo_range: TempoRange,
}

pub struct FeatureEngineer;

impl FeatureEngineer {
    /// Считает производные признаки. min/max темпа берутся по всему
    /// корпусу до разбиения на train/test.
    pub fn derive(records: &[SongRecord]) -> Result<DerivedDataset> {
        let tempo_range = TempoRange::from_records(records)?;
        let rows = Self::derive_with_range(records, tempo_range)?;

        tracing::info!(
            "Derived features for {} records (tempo range {:.2}..{:.2})",
            rows.len(),
            tempo_range.min,
            tempo_range.max
        );

        Ok(DerivedDataset { rows, tempo_range })
    }

    /// То же, но с заранее известным диапазоном темпа
    pub fn derive_with_range(
        records: &[SongRecord],
        tempo_range: TempoRange,
    ) -> Result<Vec<DerivedFeatures>> {
        records
            .iter()
            .enumerate()
            .map(|(row, record)| Self::derive_one(record, row, &tempo_range))
            .collect()
    }

    fn derive_one(
        record: &SongRecord,
        row: usize,
        tempo_range: &TempoRange,
    ) -> Result<DerivedFeatures> {
        let danceability = require(record.danceability, "danceability", row)?;
        let energy = require(record.energy, "energy", row)?;
        let key = require(record.key, "key", row)?;
        let loudness = require(record.loudness, "loudness", row)?;
        let mode = require(record.mode, "mode", row)?;
        let speechiness = require(record.speechiness, "speechiness", row)?;
        let acousticness = require(record.acousticness, "acousticness", row)?;
        let instrumentalness = require(record.instrumentalness, "instrumentalness", row)?;
        let liveness = require(record.liveness, "liveness", row)?;
        let valence = require(record.valence, "valence", row)?;
        let tempo = require(record.tempo, "tempo", row)?;
        let duration_ms = require(record.duration_ms, "duration_ms", row)?;
        let popularity = require(record.track_popularity, "track_popularity", row)?;

        Ok(DerivedFeatures {
            track_id: record.track_id.clone(),
            danceability,
            energy,
            key,
            loudness,
            mode,
            speechiness,
            acousticness,
            instrumentalness,
            liveness,
            valence,
            tempo,
            duration_min: duration_ms / MS_PER_MINUTE,
            energy_ratio: energy / (acousticness + ACOUSTICNESS_SMOOTHING),
            mood_score: valence * danceability,
            tempo_normalized: tempo_range.normalize(tempo)?,
            popularity_category: PopularityCategory::from_popularity(popularity),
            track_popularity: popularity,
        })
    }

    /// Матрица признаков в порядке `features` и вектор целевой переменной
    pub fn to_matrix(
        rows: &[DerivedFeatures],
        features: &[Feature],
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        if rows.is_empty() {
            return Err(PipelineError::EmptyDataset("no feature rows".to_string()));
        }

        let mut x = Array2::zeros((rows.len(), features.len()));
        let mut y = Array1::zeros(rows.len());

        for (i, row) in rows.iter().enumerate() {
            for (j, feature) in features.iter().enumerate() {
                x[[i, j]] = feature.value(row);
            }
            y[i] = row.track_popularity;
        }

        Ok((x, y))
    }
}

fn require(value: Option<f64>, field: &'static str, row: usize) -> Result<f64> {
    value.ok_or(PipelineError::MissingField { field, row })
}
