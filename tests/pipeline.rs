use popularity_ml::{
    train_version, ArtifactStore, FeatureEngineer, Metrics, PipelineConfig, SongRecord,
    VersionComparator, VersionRegistry,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Популярность линейно зависит от danceability, остальные поля случайны
fn linear_records(n: usize, seed: u64) -> Vec<SongRecord> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let danceability: f64 = rng.gen_range(0.0..1.0);
            let noise: f64 = rng.gen_range(-2.0..2.0);
            SongRecord {
                track_id: Some(format!("track-{}", i)),
                track_name: Some(format!("Song {}", i)),
                track_artist: Some("Artist".to_string()),
                track_popularity: Some((5.0 + 85.0 * danceability + noise).clamp(0.0, 100.0)),
                danceability: Some(danceability),
                energy: Some(rng.gen_range(0.0..1.0)),
                key: Some(rng.gen_range(0..12) as f64),
                loudness: Some(rng.gen_range(-30.0..0.0)),
                mode: Some(rng.gen_range(0..2) as f64),
                speechiness: Some(rng.gen_range(0.0..0.5)),
                acousticness: Some(rng.gen_range(0.0..1.0)),
                instrumentalness: Some(rng.gen_range(0.0..1.0)),
                liveness: Some(rng.gen_range(0.0..1.0)),
                valence: Some(rng.gen_range(0.0..1.0)),
                tempo: Some(rng.gen_range(60.0..200.0)),
                duration_ms: Some(rng.gen_range(120_000.0..360_000.0)),
            }
        })
        .collect()
}

fn relative_diff(a: f64, b: f64) -> f64 {
    (a - b).abs() / a.abs().max(f64::MIN_POSITIVE)
}

#[test]
fn repeated_training_is_reproducible() {
    let records = linear_records(1000, 7);
    let dataset = FeatureEngineer::derive(&records).unwrap();
    let config = PipelineConfig::v1();
    assert_eq!(config.hyperparameters.tree_count, 100);
    assert_eq!(config.hyperparameters.max_depth, 15);
    assert_eq!(config.hyperparameters.seed, 42);

    let first = train_version(&dataset, &config).unwrap();
    let second = train_version(&dataset, &config).unwrap();

    assert_eq!(first.counts.n_train, 800);
    assert_eq!(first.counts.n_test, 200);
    assert!(relative_diff(first.metrics.rmse, second.metrics.rmse) < 1e-6);
    assert_eq!(first.metrics, second.metrics);
    assert!(first.metrics.r2 > 0.8, "r2 = {}", first.metrics.r2);
    assert_eq!(first.feature_importances()[0].0, "danceability");
}

#[test]
fn derive_train_register_compare() {
    let dir = tempfile::tempdir().unwrap();
    let registry = VersionRegistry::open(dir.path()).unwrap();
    let artifacts = ArtifactStore::open(dir.path()).unwrap();

    let records = linear_records(300, 11);
    let dataset = FeatureEngineer::derive(&records).unwrap();

    let mut v1 = PipelineConfig::v1();
    v1.hyperparameters.tree_count = 15;
    let mut v2 = PipelineConfig::v2();
    v2.hyperparameters.tree_count = 15;

    let trained_v1 = train_version(&dataset, &v1).unwrap();
    let trained_v2 = train_version(&dataset, &v2).unwrap();
    trained_v1.register(&registry, &artifacts).unwrap();
    trained_v2.register(&registry, &artifacts).unwrap();

    assert_eq!(registry.list().unwrap(), vec!["v1".to_string(), "v2".to_string()]);

    let loaded_v2 = registry.load("v2").unwrap();
    assert_eq!(loaded_v2.n_features, 14);
    assert_eq!(loaded_v2.features, v2.feature_names());
    assert_eq!(loaded_v2.n_train + loaded_v2.n_test, 300);
    assert!(loaded_v2.notes.is_some());
    assert!(artifacts.load_scaler("v1").unwrap().is_none());
    assert!(artifacts.load_scaler("v2").unwrap().is_some());

    // Обе версии видят одно и то же разбиение
    assert_eq!(trained_v1.counts, trained_v2.counts);

    let ids = vec!["v1".to_string(), "v2".to_string()];
    let comparison = VersionComparator::compare_versions(&registry, &ids).unwrap();
    let report = &comparison.reports[0];
    let expected_winner = if loaded_v2.rmse < trained_v1.metrics.rmse { "v2" } else { "v1" };

    assert_eq!(comparison.baseline, "v1");
    assert_eq!(report.candidate, "v2");
    assert_eq!(comparison.winner, report.winner);
    assert_eq!(comparison.winner, expected_winner);
    assert_eq!(report.rmse_improvement_pct > 0.0, loaded_v2.rmse < trained_v1.metrics.rmse);
}

#[test]
fn restored_model_predicts_like_trained_one() {
    let dir = tempfile::tempdir().unwrap();
    let registry = VersionRegistry::open(dir.path()).unwrap();
    let artifacts = ArtifactStore::open(dir.path()).unwrap();

    let records = linear_records(150, 3);
    let dataset = FeatureEngineer::derive(&records).unwrap();
    let mut config = PipelineConfig::v2();
    config.hyperparameters.tree_count = 5;

    let trained = train_version(&dataset, &config).unwrap();
    trained.register(&registry, &artifacts).unwrap();

    let model = artifacts.load_model("v2").unwrap();
    let scaling = artifacts.load_scaler("v2").unwrap().unwrap();
    let (x, _) = FeatureEngineer::to_matrix(&dataset.rows, &config.features).unwrap();
    let scaled = popularity_ml::DataNormalizer::apply(&scaling, &x).unwrap();

    assert_eq!(model.predict(&scaled).unwrap(), trained.predict(&dataset.rows).unwrap());
}

#[test]
fn unseen_track_scored_from_stored_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let registry = VersionRegistry::open(dir.path()).unwrap();
    let artifacts = ArtifactStore::open(dir.path()).unwrap();

    let records = linear_records(150, 5);
    let dataset = FeatureEngineer::derive(&records).unwrap();
    let mut config = PipelineConfig::v2();
    config.hyperparameters.tree_count = 5;
    let trained = train_version(&dataset, &config).unwrap();
    trained.register(&registry, &artifacts).unwrap();

    let mut unseen = linear_records(1, 99);
    unseen[0].tempo = Some(dataset.tempo_range.min);
    assert!(FeatureEngineer::derive(&unseen).is_err());

    let range = artifacts.load_tempo_range("v2").unwrap();
    assert_eq!(range, dataset.tempo_range);
    let rows = FeatureEngineer::derive_with_range(&unseen, range).unwrap();
    assert_eq!(rows[0].tempo_normalized, 0.0);

    let model = artifacts.load_model("v2").unwrap();
    let scaling = artifacts.load_scaler("v2").unwrap().unwrap();
    let (x, _) = FeatureEngineer::to_matrix(&rows, &config.features).unwrap();
    let scaled = popularity_ml::DataNormalizer::apply(&scaling, &x).unwrap();

    let restored = model.predict(&scaled).unwrap();
    assert_eq!(restored, trained.predict_records(&unseen).unwrap());
    assert!((0.0..=100.0).contains(&restored[0]));
}

#[test]
fn reference_version_comparison() {
    let dir = tempfile::tempdir().unwrap();
    let registry = VersionRegistry::open(dir.path()).unwrap();
    let features = PipelineConfig::v1().feature_names();
    let hp = PipelineConfig::v1().hyperparameters;
    let counts = popularity_ml::SampleCounts { n_train: 800, n_test: 200 };

    let a = registry
        .save("v1", &Metrics { rmse: 10.0, mae: 8.0, r2: 0.5 }, &features, &hp, counts)
        .unwrap();
    let b = registry
        .save("v2", &Metrics { rmse: 8.0, mae: 7.0, r2: 0.6 }, &features, &hp, counts)
        .unwrap();

    let report = VersionComparator::compare(&a, &b).unwrap();
    assert!((report.rmse_improvement_pct - 20.0).abs() < 1e-9);
    assert!((report.mae_improvement_pct - 12.5).abs() < 1e-9);
    assert!((report.r2_improvement_pct - 20.0).abs() < 1e-9);
    assert_eq!(report.winner, "v2");
}
