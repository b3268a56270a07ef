//! Сравнение версий модели по метрикам

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::types::{ComparisonReport, VersionRecord};
use crate::versioning::registry::VersionRegistry;

/// Сравнение нескольких версий с первой как базовой
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionComparison {
    pub baseline: String,
    pub reports: Vec<ComparisonReport>,
    pub winner: String,
}

pub struct VersionComparator;

impl VersionComparator {
    /// Проценты ориентированы так, что плюс означает «b лучше a».
    /// RMSE/MAE: (a - b) / a; R²: (b - a) / |a|.
    pub fn compare(a: &VersionRecord, b: &VersionRecord) -> Result<ComparisonReport> {
        if a.rmse == 0.0 {
            return Err(PipelineError::DivisionByZero("rmse"));
        }
        if a.mae == 0.0 {
            return Err(PipelineError::DivisionByZero("mae"));
        }
        if a.r2 == 0.0 {
            return Err(PipelineError::DivisionByZero("r2"));
        }

        let rmse_delta = a.rmse - b.rmse;
        let mae_delta = a.mae - b.mae;
        let r2_delta = b.r2 - a.r2;

        let winner = match Self::rank(a, b) {
            Ordering::Greater => &b.version,
            _ => &a.version,
        };

        Ok(ComparisonReport {
            baseline: a.version.clone(),
            candidate: b.version.clone(),
            rmse_improvement_pct: rmse_delta / a.rmse * 100.0,
            mae_improvement_pct: mae_delta / a.mae * 100.0,
            r2_improvement_pct: r2_delta / a.r2.abs() * 100.0,
            rmse_delta,
            mae_delta,
            r2_delta,
            winner: winner.clone(),
        })
    }

    /// Каждая версия сравнивается с первой; победитель выбирается среди всех
    pub fn compare_all(records: &[VersionRecord]) -> Result<VersionComparison> {
        let (baseline, rest) = match records.split_first() {
            Some((first, rest)) if !rest.is_empty() => (first, rest),
            _ => {
                return Err(PipelineError::invalid(
                    "versions",
                    records.len(),
                    "need at least two versions to compare",
                ))
            }
        };

        let reports = rest
            .iter()
            .map(|candidate| Self::compare(baseline, candidate))
            .collect::<Result<Vec<_>>>()?;

        let mut best = baseline;
        for candidate in rest {
            if Self::rank(best, candidate) == Ordering::Greater {
                best = candidate;
            }
        }

        tracing::info!(
            "Compared {} versions against {}: winner {}",
            records.len(),
            baseline.version,
            best.version
        );

        Ok(VersionComparison {
            baseline: baseline.version.clone(),
            reports,
            winner: best.version.clone(),
        })
    }

    /// Загружает версии из реестра в заданном порядке и сравнивает их
    pub fn compare_versions(
        registry: &VersionRegistry,
        version_ids: &[String],
    ) -> Result<VersionComparison> {
        let records = version_ids
            .iter()
            .map(|id| registry.load(id))
            .collect::<Result<Vec<_>>>()?;
        Self::compare_all(&records)
    }

    /// Less — `a` лучше: меньше RMSE, при равенстве больше R²
    fn rank(a: &VersionRecord, b: &VersionRecord) -> Ordering {
        a.rmse
            .total_cmp(&b.rmse)
            .then_with(|| b.r2.total_cmp(&a.r2))
    }
}
