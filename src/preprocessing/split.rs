//! Детерминированное разбиение на обучающую и тестовую выборки

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::SplitConfig;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train_x: Array2<f64>,
    pub train_y: Array1<f64>,
    pub eval_x: Array2<f64>,
    pub eval_y: Array1<f64>,
    pub train_indices: Vec<usize>,
    pub eval_indices: Vec<usize>,
}

pub struct DatasetSplitter;

impl DatasetSplitter {
    /// Перемешивает индексы строк генератором с фиксированным seed и отдаёт
    /// первые `ceil(n * test_ratio)` в тестовую выборку.
    pub fn split(x: &Array2<f64>, y: &Array1<f64>, config: &SplitConfig) -> Result<DatasetSplit> {
        let n = x.nrows();
        if n != y.len() {
            return Err(PipelineError::shape(
                format!("{} targets", n),
                format!("{} targets", y.len()),
            ));
        }
        if !(config.test_ratio > 0.0 && config.test_ratio < 1.0) {
            return Err(PipelineError::invalid(
                "test_ratio",
                config.test_ratio,
                "must be in (0, 1)",
            ));
        }

        let n_test = (n as f64 * config.test_ratio).ceil() as usize;
        let n_train = n.saturating_sub(n_test);
        if n_test == 0 || n_train == 0 {
            return Err(PipelineError::EmptyDataset(format!(
                "{} rows cannot be split with test ratio {}",
                n, config.test_ratio
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        indices.shuffle(&mut rng);

        let eval_indices = indices[..n_test].to_vec();
        let train_indices = indices[n_test..].to_vec();

        Ok(DatasetSplit {
            train_x: x.select(Axis(0), &train_indices),
            train_y: y.select(Axis(0), &train_indices),
            eval_x: x.select(Axis(0), &eval_indices),
            eval_y: y.select(Axis(0), &eval_indices),
            train_indices,
            eval_indices,
        })
    }
}
