/// ML модели

pub mod evaluation;
pub mod random_forest;

pub use evaluation::{Evaluator, Regressor};
pub use random_forest::{RandomForestModel, RegressionTree};
