//! Confusion-matrix metrics for the binary classifier.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classifier::Classifier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_count: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_pairs(predictions: &[u8], labels: &[u8]) -> Self {
        let mut m = Self::default();
        for (&pred, &label) in predictions.iter().zip(labels) {
            m.record(pred, label);
        }
        m
    }

    pub fn record(&mut self, prediction: u8, label: u8) {
        match (prediction, label) {
            (1, 1) => self.tp += 1,
            (1, 0) => self.fp += 1,
            (0, 0) => self.tn += 1,
            _ => self.fn_count += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_count + self.tp
    }

    pub fn metrics(&self) -> EvaluationMetrics {
        let ratio = |num: usize, den: usize| if den > 0 { num as f64 / den as f64 } else { 0.0 };
        let accuracy = ratio(self.tp + self.tn, self.total());
        let precision = ratio(self.tp, self.tp + self.fp);
        let sensitivity = ratio(self.tp, self.tp + self.fn_count);
        let specificity = ratio(self.tn, self.tn + self.fp);
        let f1 = if precision + sensitivity > 0.0 {
            2.0 * precision * sensitivity / (precision + sensitivity)
        } else {
            0.0
        };
        EvaluationMetrics {
            samples: self.total(),
            accuracy,
            precision,
            sensitivity,
            specificity,
            f1,
            confusion: *self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    /// Recall of the positive class.
    pub sensitivity: f64,
    pub specificity: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "acc={:.4} prec={:.4} sens={:.4} spec={:.4} f1={:.4} (tp={} fp={} tn={} fn={})",
            self.accuracy,
            self.precision,
            self.sensitivity,
            self.specificity,
            self.f1,
            self.confusion.tp,
            self.confusion.fp,
            self.confusion.tn,
            self.confusion.fn_count,
        )
    }
}

/// Score `classifier` on labeled feature vectors.
pub fn evaluate<C: Classifier + ?Sized>(classifier: &C, samples: &[(&[f64], u8)]) -> EvaluationMetrics {
    let mut m = ConfusionMatrix::default();
    for (x, y) in samples {
        m.record(classifier.predict(x), *y);
    }
    m.metrics()
}
