//! Binary logistic regression with an L2 penalty.
//!
//! Minimises `0.5 * |w|^2 + C * sum(log_loss)` with full-batch gradient
//! descent. The intercept is not penalised. The step size is `1 / L` where `L`
//! bounds the curvature of the objective, so training is deterministic and
//! needs no tuning.

use crate::error::{Result, TonemeterError};

use super::tfidf::SparseVec;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Inverse regularisation strength.
    pub c: f64,
    pub max_iter: usize,
    /// Stop once the gradient norm drops below this.
    pub tol: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self { c: 1.0, max_iter: 2000, tol: 1e-6 }
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    intercept: f64,
    iterations: usize,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn dot(weights: &[f64], x: &SparseVec) -> f64 {
    x.iter().map(|&(i, v)| weights[i] * v).sum()
}

impl LogisticRegression {
    /// Fit on rows `x` with boolean targets `y` (`true` = positive class).
    pub fn fit(x: &[SparseVec], y: &[bool], dim: usize, opts: &TrainOptions) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(TonemeterError::InvalidInput(format!(
                "training set needs matching non-empty rows and targets (rows={}, targets={})",
                x.len(),
                y.len()
            )));
        }
        if y.iter().all(|&t| t) || y.iter().all(|&t| !t) {
            return Err(TonemeterError::InvalidInput("training set needs both classes".into()));
        }
        if let Some(bad) = x.iter().flatten().find(|(i, _)| *i >= dim) {
            return Err(TonemeterError::InvalidInput(format!(
                "feature index {} out of range for dim {dim}",
                bad.0
            )));
        }

        let sq_norms: f64 = x.iter().map(|row| row.iter().map(|(_, v)| v * v).sum::<f64>() + 1.0).sum();
        let lipschitz = 1.0 + 0.25 * opts.c * sq_norms;
        let step = 1.0 / lipschitz;

        let mut w = vec![0.0; dim];
        let mut b = 0.0;
        let mut grad_w = vec![0.0; dim];
        let mut iterations = 0;

        while iterations < opts.max_iter {
            grad_w.copy_from_slice(&w);
            let mut grad_b = 0.0;
            for (row, &target) in x.iter().zip(y) {
                let err = sigmoid(dot(&w, row) + b) - if target { 1.0 } else { 0.0 };
                for &(i, v) in row {
                    grad_w[i] += opts.c * err * v;
                }
                grad_b += opts.c * err;
            }

            let norm = (grad_w.iter().map(|g| g * g).sum::<f64>() + grad_b * grad_b).sqrt();
            if norm < opts.tol {
                break;
            }
            for (wi, gi) in w.iter_mut().zip(&grad_w) {
                *wi -= step * gi;
            }
            b -= step * grad_b;
            iterations += 1;
        }

        Ok(Self { weights: w, intercept: b, iterations })
    }

    /// Linear score `w . x + b`.
    pub fn decision(&self, x: &SparseVec) -> f64 {
        dot(&self.weights, x) + self.intercept
    }

    /// Probability of the positive class.
    pub fn predict_proba(&self, x: &SparseVec) -> f64 {
        sigmoid(self.decision(x))
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Gradient steps taken during `fit`.
    pub fn iterations(&self) -> usize {
        self.iterations
    }
}
