//! Reward regression used by DM and the DR family.
//!
//! The model is trained on `(x_i, e_{a_i}) -> r_i` from the logged data and
//! then queried for every action at every round.

use crate::domain::errors::{OpeError, OpeResult};
use crate::domain::feedback::BanditFeedback;
use crate::domain::linalg::solve;
use crate::domain::stats::sigmoid;
use ndarray::{Array1, Array2, Axis, s};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

pub trait RewardRegressor: Send {
    fn name(&self) -> &str;
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> OpeResult<()>;
    fn predict(&self, x: &Array2<f64>) -> OpeResult<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseModel {
    #[default]
    LogisticRegression,
    RandomForest,
}

impl fmt::Display for BaseModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BaseModel::LogisticRegression => f.write_str("logistic_regression"),
            BaseModel::RandomForest => f.write_str("random_forest"),
        }
    }
}

impl FromStr for BaseModel {
    type Err = OpeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "logistic_regression" | "logistic" => Ok(BaseModel::LogisticRegression),
            "random_forest" | "rf" => Ok(BaseModel::RandomForest),
            _ => Err(OpeError::UnknownBaseModel(s.to_string())),
        }
    }
}

/// Hyperparameters for both base models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionSettings {
    pub base_model: BaseModel,
    /// L2 penalty for the logistic model.
    pub lambda: f64,
    pub max_iter: usize,
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
}

impl Default for RegressionSettings {
    fn default() -> Self {
        Self {
            base_model: BaseModel::LogisticRegression,
            lambda: 1.0,
            max_iter: 25,
            n_trees: 20,
            max_depth: 8,
            min_samples_split: 10,
        }
    }
}

/// L2-regularized logistic regression with an unpenalized intercept, fitted
/// by Newton-Raphson. Accepts soft labels in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct LogisticRidge {
    lambda: f64,
    max_iter: usize,
    tol: f64,
    /// Feature weights followed by the intercept.
    coef: Option<Array1<f64>>,
}

impl LogisticRidge {
    pub fn new(lambda: f64, max_iter: usize) -> Self {
        Self {
            lambda,
            max_iter,
            tol: 1e-8,
            coef: None,
        }
    }

    fn linear_score(coef: &Array1<f64>, x: ndarray::ArrayView1<'_, f64>) -> f64 {
        let d = x.len();
        x.dot(&coef.slice(s![..d])) + coef[d]
    }
}

impl RewardRegressor for LogisticRidge {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> OpeResult<()> {
        let (n, d) = x.dim();
        if n == 0 || n != y.len() {
            return Err(OpeError::shape("regression targets", n, y.len()));
        }

        let mut coef = Array1::<f64>::zeros(d + 1);
        for iter in 0..self.max_iter {
            let mut grad = Array1::<f64>::zeros(d + 1);
            let mut hess = Array2::<f64>::zeros((d + 1, d + 1));

            for (row, target) in x.rows().into_iter().zip(y) {
                let p = sigmoid(Self::linear_score(&coef, row));
                let residual = p - target;
                let curvature = (p * (1.0 - p)).max(1e-10);
                for j in 0..=d {
                    let xj = if j < d { row[j] } else { 1.0 };
                    grad[j] += residual * xj;
                    for k in 0..=j {
                        let xk = if k < d { row[k] } else { 1.0 };
                        hess[[j, k]] += curvature * xj * xk;
                    }
                }
            }
            for j in 0..=d {
                for k in 0..j {
                    hess[[k, j]] = hess[[j, k]];
                }
            }
            for j in 0..d {
                grad[j] += self.lambda * coef[j];
                hess[[j, j]] += self.lambda;
            }
            hess[[d, d]] += 1e-8;

            let step = solve(&hess, &grad)?;
            coef -= &step;
            let max_step = step.iter().map(|v| v.abs()).fold(0.0, f64::max);
            if max_step < self.tol {
                debug!("Logistic regression converged after {} iterations", iter + 1);
                break;
            }
        }

        self.coef = Some(coef);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> OpeResult<Vec<f64>> {
        let coef = self.coef.as_ref().ok_or_else(|| OpeError::Regression {
            reason: "model has not been fitted".to_string(),
        })?;
        if x.ncols() + 1 != coef.len() {
            return Err(OpeError::shape("regression features", coef.len() - 1, x.ncols()));
        }
        Ok(x
            .rows()
            .into_iter()
            .map(|row| sigmoid(Self::linear_score(coef, row)))
            .collect())
    }
}

/// SmartCore random forest regressor on the reward.
pub struct RandomForest {
    n_trees: usize,
    max_depth: u16,
    min_samples_split: usize,
    model: Option<RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: u16, min_samples_split: usize) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split,
            model: None,
        }
    }

    fn to_dense(x: &Array2<f64>) -> OpeResult<DenseMatrix<f64>> {
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        DenseMatrix::from_2d_vec(&rows).map_err(|e| OpeError::Regression {
            reason: format!("Matrix error: {}", e),
        })
    }
}

impl RewardRegressor for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> OpeResult<()> {
        if x.nrows() == 0 || x.nrows() != y.len() {
            return Err(OpeError::shape("regression targets", x.nrows(), y.len()));
        }
        let x_matrix = Self::to_dense(x)?;
        let params = RandomForestRegressorParameters::default()
            .with_n_trees(self.n_trees)
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split);
        let model = RandomForestRegressor::fit(&x_matrix, &y.to_vec(), params).map_err(|e| {
            OpeError::Regression {
                reason: format!("Training error: {}", e),
            }
        })?;
        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> OpeResult<Vec<f64>> {
        let model = self.model.as_ref().ok_or_else(|| OpeError::Regression {
            reason: "model has not been fitted".to_string(),
        })?;
        let x_matrix = Self::to_dense(x)?;
        model.predict(&x_matrix).map_err(|e| OpeError::Regression {
            reason: format!("Predict error: {}", e),
        })
    }
}

/// Reward model over `[context, action_context]` features.
pub struct RegressionModel {
    base: Box<dyn RewardRegressor>,
    action_context: Array2<f64>,
}

impl RegressionModel {
    pub fn new(settings: &RegressionSettings, action_context: Array2<f64>) -> OpeResult<Self> {
        if settings.lambda < 0.0 {
            return Err(OpeError::invalid("lambda", "must be non-negative"));
        }
        if settings.max_iter == 0 {
            return Err(OpeError::invalid("max_iter", "must be positive"));
        }
        let base: Box<dyn RewardRegressor> = match settings.base_model {
            BaseModel::LogisticRegression => {
                Box::new(LogisticRidge::new(settings.lambda, settings.max_iter))
            }
            BaseModel::RandomForest => Box::new(RandomForest::new(
                settings.n_trees,
                settings.max_depth,
                settings.min_samples_split,
            )),
        };
        Ok(Self::with_base(base, action_context))
    }

    pub fn with_base(base: Box<dyn RewardRegressor>, action_context: Array2<f64>) -> Self {
        Self {
            base,
            action_context,
        }
    }

    pub fn base_name(&self) -> &str {
        self.base.name()
    }

    fn n_actions(&self) -> usize {
        self.action_context.nrows()
    }

    /// Feature rows `[x_i, e_{a_i}]` for one action per round.
    fn features(&self, context: &Array2<f64>, actions: impl Fn(usize) -> usize) -> Array2<f64> {
        let (n, dc) = context.dim();
        let da = self.action_context.ncols();
        let mut x = Array2::<f64>::zeros((n, dc + da));
        x.slice_mut(s![.., ..dc]).assign(context);
        for i in 0..n {
            x.slice_mut(s![i, dc..])
                .assign(&self.action_context.row(actions(i)));
        }
        x
    }

    pub fn fit(&mut self, feedback: &BanditFeedback) -> OpeResult<()> {
        feedback.validate()?;
        if feedback.action_context.dim() != self.action_context.dim() {
            return Err(OpeError::shape(
                "action_context",
                format!("{:?}", self.action_context.dim()),
                format!("{:?}", feedback.action_context.dim()),
            ));
        }
        let x = self.features(&feedback.context, |i| feedback.action[i]);
        self.base.fit(&x, &feedback.reward)
    }

    /// Predicted reward of every action at every context: `(n_rounds, n_actions)`.
    pub fn predict(&self, context: &Array2<f64>) -> OpeResult<Array2<f64>> {
        let mut estimated = Array2::<f64>::zeros((context.nrows(), self.n_actions()));
        for a in 0..self.n_actions() {
            let x = self.features(context, |_| a);
            let predictions = self.base.predict(&x)?;
            estimated
                .index_axis_mut(Axis(1), a)
                .assign(&Array1::from(predictions));
        }
        Ok(estimated)
    }

    pub fn fit_predict(&mut self, feedback: &BanditFeedback) -> OpeResult<Array2<f64>> {
        self.fit(feedback)?;
        self.predict(&feedback.context)
    }
}
