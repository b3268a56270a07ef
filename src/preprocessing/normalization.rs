//! Нормализация данных

#![allow(non_snake_case)]

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Минимальное стандартное отклонение, при котором колонку можно масштабировать
const MIN_STD: f64 = 1e-10;

/// Статистики обучающей выборки. Принадлежат версии модели и
/// переиспользуются при инференсе как есть.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingParameters {
    pub features: Vec<String>,
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

pub struct DataNormalizer;

impl DataNormalizer {
    /// Среднее и стандартное отклонение (ddof = 0) по каждому признаку
    pub fn fit(X: &Array2<f64>, features: &[String]) -> Result<ScalingParameters> {
        if X.nrows() == 0 {
            return Err(PipelineError::EmptyDataset("cannot fit scaler on zero rows".to_string()));
        }
        if X.ncols() != features.len() {
            return Err(PipelineError::shape(
                format!("{} columns", features.len()),
                format!("{} columns", X.ncols()),
            ));
        }

        let mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| PipelineError::EmptyDataset("failed to compute mean".to_string()))?;
        let std = X.std_axis(Axis(0), 0.0);

        Ok(ScalingParameters {
            features: features.to_vec(),
            mean,
            std,
        })
    }

    /// (X - mean) / std по колонкам
    pub fn apply(params: &ScalingParameters, X: &Array2<f64>) -> Result<Array2<f64>> {
        if X.ncols() != params.mean.len() || params.mean.len() != params.std.len() {
            return Err(PipelineError::shape(
                format!("{} columns", params.mean.len()),
                format!("{} columns", X.ncols()),
            ));
        }

        if let Some(col) = params.std.iter().position(|s| !(*s >= MIN_STD)) {
            let name = params
                .features
                .get(col)
                .cloned()
                .unwrap_or_else(|| format!("#{}", col));
            return Err(PipelineError::DegenerateColumn(name));
        }

        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - params.mean[i]) / params.std[i];
            }
        }

        Ok(normalized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{}", i)).collect()
    }

    #[test]
    fn test_round_trip_is_standardized() {
        let X = array![
            [1.0, 100.0, -3.0],
            [2.0, 250.0, 0.5],
            [3.0, 175.0, 2.0],
            [4.0, 90.0, 7.5],
            [10.0, 120.0, -1.0],
        ];
        let params = DataNormalizer::fit(&X, &names(3)).unwrap();
        let scaled = DataNormalizer::apply(&params, &X).unwrap();

        let mean = scaled.mean_axis(Axis(0)).unwrap();
        let std = scaled.std_axis(Axis(0), 0.0);
        for j in 0..3 {
            assert!(mean[j].abs() < 1e-9, "column {} mean {}", j, mean[j]);
            assert!((std[j] - 1.0).abs() < 1e-9, "column {} std {}", j, std[j]);
        }
    }

    #[test]
    fn test_apply_reuses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let params = DataNormalizer::fit(&train, &names(1)).unwrap();
        let scaled = DataNormalizer::apply(&params, &array![[4.0]]).unwrap();

        assert_eq!(params.mean[0], 1.0);
        assert_eq!(params.std[0], 1.0);
        assert_eq!(scaled[[0, 0]], 3.0);
    }

    #[test]
    fn test_zero_variance_column() {
        let X = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let params = DataNormalizer::fit(&X, &names(2)).unwrap();

        match DataNormalizer::apply(&params, &X) {
            Err(PipelineError::DegenerateColumn(name)) => assert_eq!(name, "f1"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_column_mismatch() {
        let params = DataNormalizer::fit(&array![[1.0, 2.0], [3.0, 5.0]], &names(2)).unwrap();
        assert!(matches!(
            DataNormalizer::apply(&params, &array![[1.0]]),
            Err(PipelineError::ShapeMismatch { .. })
        ));
    }
}
