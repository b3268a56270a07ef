//! Обучение одной версии: признаки → разбиение → (масштабирование) →
//! лес → метрики. Каждый шаг получает и возвращает значения явно.

use ndarray::{Array1, Array2};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{Evaluator, RandomForestModel};
use crate::preprocessing::{
    DataNormalizer, DatasetSplitter, DerivedDataset, FeatureEngineer, ScalingParameters,
    TempoRange,
};
use crate::types::{DerivedFeatures, Metrics, SampleCounts, SongRecord, VersionRecord};
use crate::versioning::{ArtifactStore, VersionRegistry};

/// Результат обучения версии, ещё не сохранённый в реестр
#[derive(Debug, Clone)]
pub struct TrainedVersion {
    pub config: PipelineConfig,
    pub model: RandomForestModel,
    pub scaling: Option<ScalingParameters>,
    /// Диапазон темпа корпуса, на котором считался `tempo_normalized`
    pub tempo_range: TempoRange,
    pub metrics: Metrics,
    pub counts: SampleCounts,
}

pub fn train_version(dataset: &DerivedDataset, config: &PipelineConfig) -> Result<TrainedVersion> {
    config.validate()?;
    let feature_names = config.feature_names();

    let (x, y) = FeatureEngineer::to_matrix(&dataset.rows, &config.features)?;
    let split = DatasetSplitter::split(&x, &y, &config.split)?;
    tracing::info!(
        "Version {}: {} features, train {} rows, test {} rows",
        config.version,
        feature_names.len(),
        split.train_y.len(),
        split.eval_y.len()
    );

    // Статистики только по обучающей выборке
    let (train_x, eval_x, scaling) = if config.scale {
        let params = DataNormalizer::fit(&split.train_x, &feature_names)?;
        let train_x = DataNormalizer::apply(&params, &split.train_x)?;
        let eval_x = DataNormalizer::apply(&params, &split.eval_x)?;
        (train_x, eval_x, Some(params))
    } else {
        (split.train_x, split.eval_x, None)
    };

    let model = RandomForestModel::train(
        &train_x,
        &split.train_y,
        &feature_names,
        &config.hyperparameters,
    )?;
    let metrics = Evaluator::evaluate(&model, &eval_x, &split.eval_y)?;

    tracing::info!(
        "Version {} evaluated. RMSE: {:.2}, MAE: {:.2}, R2: {:.4}",
        config.version,
        metrics.rmse,
        metrics.mae,
        metrics.r2
    );

    Ok(TrainedVersion {
        config: config.clone(),
        model,
        scaling,
        tempo_range: dataset.tempo_range,
        metrics,
        counts: SampleCounts {
            n_train: split.train_y.len(),
            n_test: split.eval_y.len(),
        },
    })
}

impl TrainedVersion {
    /// Предсказания для новых строк с сохранёнными параметрами масштабирования
    pub fn predict(&self, rows: &[DerivedFeatures]) -> Result<Array1<f64>> {
        let (x, _) = FeatureEngineer::to_matrix(rows, &self.config.features)?;
        self.model.predict(&self.prepare(x)?)
    }

    /// То же для сырых записей: признаки считаются по диапазону темпа обучения
    pub fn predict_records(&self, records: &[SongRecord]) -> Result<Array1<f64>> {
        let rows = FeatureEngineer::derive_with_range(records, self.tempo_range)?;
        self.predict(&rows)
    }

    fn prepare(&self, x: Array2<f64>) -> Result<Array2<f64>> {
        match &self.scaling {
            Some(params) => DataNormalizer::apply(params, &x),
            None => Ok(x),
        }
    }

    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.model.ranked_importances()
    }

    /// Пишет метаданные в реестр, а модель, scaler и диапазон темпа в
    /// хранилище артефактов
    pub fn register(
        &self,
        registry: &VersionRegistry,
        artifacts: &ArtifactStore,
    ) -> Result<VersionRecord> {
        let version = &self.config.version;

        artifacts.save_model(version, &self.model)?;
        artifacts.save_tempo_range(version, &self.tempo_range)?;
        match &self.scaling {
            Some(params) => {
                artifacts.save_scaler(version, params)?;
            }
            None => artifacts.remove_scaler(version)?,
        }

        registry.save_with_notes(
            version,
            &self.metrics,
            &self.config.feature_names(),
            &self.config.hyperparameters,
            self.counts,
            self.config.notes.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SplitConfig;
    use crate::error::PipelineError;
    use crate::types::{Feature, Hyperparameters};

    fn song(tempo: f64, danceability: f64) -> SongRecord {
        SongRecord {
            track_id: Some("new".to_string()),
            track_popularity: Some(0.0),
            danceability: Some(danceability),
            energy: Some(0.5),
            key: Some(3.0),
            loudness: Some(-8.0),
            mode: Some(1.0),
            speechiness: Some(0.1),
            acousticness: Some(0.3),
            instrumentalness: Some(0.4),
            liveness: Some(0.2),
            valence: Some(0.5),
            tempo: Some(tempo),
            duration_ms: Some(200_000.0),
            ..SongRecord::default()
        }
    }

    fn rows(n: usize) -> DerivedDataset {
        let rows = (0..n)
            .map(|i| {
                let t = i as f64 / n as f64;
                DerivedFeatures {
                    track_id: None,
                    danceability: t,
                    energy: 1.0 - t,
                    key: (i % 12) as f64,
                    loudness: -20.0 + 15.0 * t,
                    mode: (i % 2) as f64,
                    speechiness: 0.1,
                    acousticness: 0.3,
                    instrumentalness: ((i * 31) % 17) as f64 / 17.0,
                    liveness: 0.2,
                    valence: 0.5,
                    tempo: 100.0 + t * 60.0,
                    duration_min: 3.0 + t,
                    energy_ratio: (1.0 - t) / 0.31,
                    mood_score: 0.5 * t,
                    tempo_normalized: t,
                    popularity_category: None,
                    track_popularity: 80.0 * t,
                }
            })
            .collect();

        DerivedDataset {
            rows,
            tempo_range: TempoRange { min: 100.0, max: 160.0 },
        }
    }

    fn small_config(scale: bool) -> PipelineConfig {
        PipelineConfig {
            version: "test".to_string(),
            features: vec![Feature::Danceability, Feature::Loudness, Feature::Instrumentalness],
            scale,
            hyperparameters: Hyperparameters {
                tree_count: 10,
                max_depth: 6,
                min_samples_to_split: 2,
                seed: 42,
            },
            split: SplitConfig::default(),
            notes: None,
        }
    }

    #[test]
    fn test_train_unscaled() {
        let trained = train_version(&rows(100), &small_config(false)).unwrap();

        assert!(trained.scaling.is_none());
        assert_eq!(trained.counts, SampleCounts { n_train: 80, n_test: 20 });
        assert!(trained.metrics.r2 > 0.8, "r2 = {}", trained.metrics.r2);
    }

    #[test]
    fn test_scaled_prediction_reuses_training_statistics() {
        let data = rows(100);
        let trained = train_version(&data, &small_config(true)).unwrap();
        let params = trained.scaling.as_ref().unwrap();

        assert_eq!(params.features, vec!["danceability", "loudness", "instrumentalness"]);

        let predictions = trained.predict(&data.rows).unwrap();
        let (x, _) = FeatureEngineer::to_matrix(&data.rows, &trained.config.features).unwrap();
        let expected = trained.model.predict(&DataNormalizer::apply(params, &x).unwrap()).unwrap();
        assert_eq!(predictions, expected);
    }

    #[test]
    fn test_scaling_does_not_change_tree_metrics_much() {
        let data = rows(100);
        let plain = train_version(&data, &small_config(false)).unwrap();
        let scaled = train_version(&data, &small_config(true)).unwrap();

        assert_eq!(plain.counts, scaled.counts);
        assert!((plain.metrics.rmse - scaled.metrics.rmse).abs() < 1.0);
    }

    #[test]
    fn test_degenerate_column_when_scaling() {
        let mut config = small_config(true);
        config.features.push(Feature::Liveness);

        assert!(matches!(
            train_version(&rows(50), &config),
            Err(PipelineError::DegenerateColumn(name)) if name == "liveness"
        ));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            train_version(
                &DerivedDataset {
                    rows: Vec::new(),
                    tempo_range: TempoRange { min: 0.0, max: 1.0 },
                },
                &small_config(false)
            ),
            Err(PipelineError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_register_writes_record_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let registry = VersionRegistry::open(dir.path()).unwrap();
        let artifacts = ArtifactStore::open(dir.path()).unwrap();

        let mut config = small_config(true);
        config.notes = Some("scaled".to_string());
        let trained = train_version(&rows(60), &config).unwrap();
        let record = trained.register(&registry, &artifacts).unwrap();

        assert_eq!(record.version, "test");
        assert_eq!(record.n_features, 3);
        assert_eq!(record.metrics(), trained.metrics);
        assert_eq!(record.notes.as_deref(), Some("scaled"));
        assert_eq!(registry.load("test").unwrap(), record);
        assert!(artifacts.load_scaler("test").unwrap().is_some());
        assert_eq!(artifacts.load_tempo_range("test").unwrap(), trained.tempo_range);

        let unscaled = train_version(&rows(60), &small_config(false)).unwrap();
        unscaled.register(&registry, &artifacts).unwrap();
        assert!(artifacts.load_scaler("test").unwrap().is_none());
    }

    #[test]
    fn test_predict_records_uses_training_tempo_range() {
        let mut config = small_config(true);
        config.features.push(Feature::TempoNormalized);
        let trained = train_version(&rows(100), &config).unwrap();

        // Одиночный трек: собственный min/max вырожден, диапазон обучения нет
        let unseen = vec![song(130.0, 0.9)];
        assert!(FeatureEngineer::derive(&unseen).is_err());

        let rows = FeatureEngineer::derive_with_range(&unseen, trained.tempo_range).unwrap();
        assert_eq!(rows[0].tempo_normalized, 0.5);
        assert_eq!(
            trained.predict_records(&unseen).unwrap(),
            trained.predict(&rows).unwrap()
        );
    }
}
