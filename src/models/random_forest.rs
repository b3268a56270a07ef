//! Случайный лес для регрессии (bagging над деревьями решений)

use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::models::evaluation::Regressor;
use crate::types::Hyperparameters;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Дерево регрессии: разбиения минимизируют сумму квадратов отклонений в листьях
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    root: TreeNode,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    max_depth: usize,
    min_samples_split: usize,
    /// Снижение SSE, накопленное по признакам
    importances: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn build_tree(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| self.y[i]).sum::<f64>() / n;

        if depth >= self.max_depth || indices.len() < self.min_samples_split {
            return TreeNode::Leaf { value: mean };
        }

        let node_sse: f64 = indices.iter().map(|&i| (self.y[i] - mean).powi(2)).sum();
        if node_sse <= 0.0 {
            return TreeNode::Leaf { value: mean };
        }

        let best = match self.best_split(&indices) {
            Some(best) => best,
            None => return TreeNode::Leaf { value: mean },
        };

        self.importances[best.feature] += (node_sse - best.sse).max(0.0);

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| self.x[[i, best.feature]] <= best.threshold);

        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build_tree(left_indices, depth + 1)),
            right: Box::new(self.build_tree(right_indices, depth + 1)),
        }
    }

    /// Перебор всех порогов между соседними различными значениями.
    /// При равной SSE побеждает признак с меньшим индексом.
    fn best_split(&self, indices: &[usize]) -> Option<SplitCandidate> {
        let n = indices.len();
        let total_sum: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let total_sq: f64 = indices.iter().map(|&i| self.y[i] * self.y[i]).sum();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();

        for feature in 0..self.x.ncols() {
            sorted.sort_by(|&a, &b| self.x[[a, feature]].total_cmp(&self.x[[b, feature]]));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 1..n {
                let prev = sorted[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                let lo = self.x[[prev, feature]];
                let hi = self.x[[sorted[k], feature]];
                if lo == hi {
                    continue;
                }

                let n_left = k as f64;
                let n_right = (n - k) as f64;
                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / n_left)
                    + (right_sq - right_sum * right_sum / n_right);

                if best.as_ref().map_or(true, |b| sse < b.sse) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(SplitCandidate { feature, threshold, sse });
                }
            }
        }

        best
    }
}

impl RegressionTree {
    fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: Vec<usize>,
        max_depth: usize,
        min_samples_split: usize,
    ) -> (Self, Vec<f64>) {
        let mut builder = TreeBuilder {
            x,
            y,
            max_depth,
            min_samples_split,
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build_tree(indices, 0);
        (Self { root }, builder.importances)
    }

    fn predict_single(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    fn depth(&self) -> usize {
        fn walk(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(left).max(walk(right)),
            }
        }
        walk(&self.root)
    }
}

/// Обученный ансамбль. После `train` не изменяется: новая конфигурация
/// означает новый артефакт.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestModel {
    trees: Vec<RegressionTree>,
    feature_names: Vec<String>,
    hyperparameters: Hyperparameters,
    feature_importances: Vec<f64>,
}

impl RandomForestModel {
    pub fn train(
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
        hyperparameters: &Hyperparameters,
    ) -> Result<Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples == 0 {
            return Err(PipelineError::EmptyDataset("training set is empty".to_string()));
        }
        if n_samples != y.len() {
            return Err(PipelineError::shape(
                format!("{} targets", n_samples),
                format!("{} targets", y.len()),
            ));
        }
        if n_features != feature_names.len() {
            return Err(PipelineError::shape(
                format!("{} columns", feature_names.len()),
                format!("{} columns", n_features),
            ));
        }
        hyperparameters.validate()?;

        let base_seed = hyperparameters.seed;
        let max_depth = hyperparameters.max_depth;
        let min_samples_split = hyperparameters.min_samples_to_split;

        // Каждое дерево со своим seed, порядок сбора фиксирован
        let fitted: Vec<(RegressionTree, Vec<f64>)> = (0..hyperparameters.tree_count)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> =
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                RegressionTree::fit(x, y, sample, max_depth, min_samples_split)
            })
            .collect();

        let mut feature_importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, importances) in fitted {
            let total: f64 = importances.iter().sum();
            if total > 0.0 {
                for (acc, imp) in feature_importances.iter_mut().zip(&importances) {
                    *acc += imp / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            feature_importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::info!(
            "Random forest trained: {} trees, {} samples, {} features, max depth reached {}",
            trees.len(),
            n_samples,
            n_features,
            trees.iter().map(RegressionTree::depth).max().unwrap_or(0)
        );

        Ok(Self {
            trees,
            feature_names: feature_names.to_vec(),
            hyperparameters: hyperparameters.clone(),
            feature_importances,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.feature_names.len() {
            return Err(PipelineError::shape(
                format!("{} columns", self.feature_names.len()),
                format!("{} columns", x.ncols()),
            ));
        }

        let n_trees = self.trees.len() as f64;
        let predictions = x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_single(row)).sum::<f64>() / n_trees)
            .collect();

        Ok(predictions)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyperparameters
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Вклад признаков в снижение дисперсии, сумма равна 1
    /// (или все нули, если ни одно дерево не сделало разбиения)
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.feature_importances.iter().copied())
            .collect()
    }

    /// Признаки по убыванию важности
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let mut ranked = self.feature_importances();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}

impl Regressor for RandomForestModel {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForestModel::predict(self, x)
    }
}
