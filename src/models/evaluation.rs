//! Оценка качества регрессии на отложенной выборке

use ndarray::{Array1, Array2};

use crate::error::{PipelineError, Result};
use crate::types::Metrics;

/// Всё, что умеет предсказывать по матрице признаков
pub trait Regressor {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

pub struct Evaluator;

impl Evaluator {
    pub fn evaluate<R: Regressor + ?Sized>(
        model: &R,
        eval_x: &Array2<f64>,
        eval_y: &Array1<f64>,
    ) -> Result<Metrics> {
        let predictions = model.predict(eval_x)?;
        Self::from_predictions(&predictions, eval_y)
    }

    /// RMSE, MAE и R². Для константной цели R² = 1 при точном
    /// совпадении и 0 иначе.
    pub fn from_predictions(predictions: &Array1<f64>, targets: &Array1<f64>) -> Result<Metrics> {
        if targets.is_empty() {
            return Err(PipelineError::EmptyDataset("evaluation set is empty".to_string()));
        }
        if predictions.len() != targets.len() {
            return Err(PipelineError::shape(
                format!("{} predictions", targets.len()),
                format!("{} predictions", predictions.len()),
            ));
        }
        if let Some(pos) = predictions.iter().position(|p| !p.is_finite()) {
            return Err(PipelineError::shape(
                "finite predictions",
                format!("{} at position {}", predictions[pos], pos),
            ));
        }

        let n = targets.len() as f64;
        let residuals = predictions - targets;

        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / n;
        let rmse = (sse / n).sqrt();

        let mean = targets.sum() / n;
        let sst: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
        let r2 = if sst > 0.0 {
            1.0 - sse / sst
        } else if sse == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Metrics { rmse, mae, r2 })
    }
}
