//! Binary classifier behind the encoder.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Anything that maps an encoded feature vector to a 0/1 label.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> u8;

    /// `[p(no disease), p(disease)]`, for classifiers that can estimate it.
    fn predict_probability(&self, _features: &[f64]) -> Option<[f64; 2]> {
        None
    }

    /// Expected feature vector width, when the classifier knows it.
    fn input_width(&self) -> Option<usize> {
        None
    }
}

/// Full-batch gradient descent hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainParams {
    pub learning_rate: f64,
    pub epochs: usize,
    /// L2 penalty on the weights (not the bias).
    pub l2: f64,
    /// Stop once the loss improves by less than this between epochs.
    pub tolerance: f64,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 1000,
            l2: 1e-3,
            tolerance: 1e-7,
        }
    }
}

impl TrainParams {
    /// At least one epoch, a positive finite step, non-negative `l2` and
    /// `tolerance`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.epochs == 0 {
            return Err(PipelineError::ConfigValidation("epochs must be at least 1".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(PipelineError::ConfigValidation(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.l2 >= 0.0 && self.tolerance >= 0.0) {
            return Err(PipelineError::ConfigValidation(
                "l2 and tolerance must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub epochs_run: usize,
    pub final_loss: f64,
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticRegression {
    pub fn fit(samples: &[(&[f64], u8)], params: &TrainParams) -> Result<(Self, TrainReport), PipelineError> {
        let Some((first, _)) = samples.first() else {
            return Err(PipelineError::Label {
                at: None,
                reason: "no labeled rows to train on".into(),
            });
        };
        let width = first.len();
        if let Some((bad, _)) = samples.iter().find(|(x, _)| x.len() != width) {
            return Err(PipelineError::mismatch("training feature width", width, bad.len()));
        }
        params.validate()?;

        let n = samples.len() as f64;
        let mut model = Self {
            weights: vec![0.0; width],
            bias: 0.0,
        };
        let mut prev_loss = f64::INFINITY;
        let mut report = TrainReport {
            epochs_run: 0,
            final_loss: model.loss(samples, params.l2),
            converged: false,
        };

        for epoch in 0..params.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            let mut loss = 0.0;

            for (x, y) in samples {
                let p = model.probability(x);
                let err = p - f64::from(*y);
                for (g, xi) in grad_w.iter_mut().zip(x.iter()) {
                    *g += err * xi;
                }
                grad_b += err;
                loss -= if *y == 1 { p.max(1e-12).ln() } else { (1.0 - p).max(1e-12).ln() };
            }

            loss /= n;
            loss += 0.5 * params.l2 * model.weights.iter().map(|w| w * w).sum::<f64>();

            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            model.bias -= params.learning_rate * grad_b / n;

            report.epochs_run = epoch + 1;
            report.final_loss = loss;
            if epoch % 100 == 0 {
                debug!("epoch {:4} | loss={loss:.6}", epoch + 1);
            }
            if (prev_loss - loss).abs() < params.tolerance {
                report.converged = true;
                break;
            }
            prev_loss = loss;
        }

        info!(
            "logistic regression: {} epochs, loss={:.4}{}",
            report.epochs_run,
            report.final_loss,
            if report.converged { " (converged)" } else { "" }
        );
        Ok((model, report))
    }

    /// Mean log loss plus the L2 penalty.
    fn loss(&self, samples: &[(&[f64], u8)], l2: f64) -> f64 {
        let total: f64 = samples
            .iter()
            .map(|(x, y)| {
                let p = self.probability(x);
                -if *y == 1 { p.max(1e-12).ln() } else { (1.0 - p).max(1e-12).ln() }
            })
            .sum();
        total / samples.len() as f64 + 0.5 * l2 * self.weights.iter().map(|w| w * w).sum::<f64>()
    }

    fn probability(&self, features: &[f64]) -> f64 {
        let z = self.bias
            + self
                .weights
                .iter()
                .zip(features)
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl Classifier for LogisticRegression {
    fn predict(&self, features: &[f64]) -> u8 {
        u8::from(self.probability(features) >= 0.5)
    }

    fn predict_probability(&self, features: &[f64]) -> Option<[f64; 2]> {
        let p = self.probability(features);
        Some([1.0 - p, p])
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.weights.len())
    }
}
