//! Multinomial logistic regression trained by batch gradient descent

use ndarray::{Array1, Array2, Axis};
use serde_json::json;

use super::{check_features, training_targets, MLMethod};
use crate::data::Label;
use crate::encoding::EncodedData;
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{ParamReader, Params};

/// Softmax regression with L2 penalty
#[derive(Clone, Debug)]
pub struct LogisticRegression {
    learning_rate: f64,
    max_iter: usize,
    l2_penalty: f64,
    tolerance: f64,
    weights: Option<Array2<f64>>,
    bias: Option<Array1<f64>>,
    classes: Vec<String>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 500,
            l2_penalty: 0.0,
            tolerance: 1e-6,
            weights: None,
            bias: None,
            classes: Vec::new(),
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_l2_penalty(mut self, l2_penalty: f64) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    /// Build from configuration parameters
    /// (`learning_rate`, `max_iter`, `l2_penalty`, `tolerance`)
    pub fn from_params(params: &Params) -> Result<Self> {
        let reader = ParamReader::new("LogisticRegression", params);
        let defaults = Self::default();
        let model = Self {
            learning_rate: reader.f64("learning_rate", defaults.learning_rate)?,
            max_iter: reader.usize("max_iter", defaults.max_iter)?,
            l2_penalty: reader.f64("l2_penalty", defaults.l2_penalty)?,
            tolerance: reader.f64("tolerance", defaults.tolerance)?,
            ..defaults
        };
        if !(model.learning_rate > 0.0) {
            return Err(Error::config("LogisticRegression.learning_rate", "must be positive"));
        }
        if model.l2_penalty < 0.0 {
            return Err(Error::config("LogisticRegression.l2_penalty", "must not be negative"));
        }
        Ok(model)
    }

    fn probabilities(weights: &Array2<f64>, bias: &Array1<f64>, x: &Array2<f64>) -> Array2<f64> {
        let mut logits = x.dot(weights) + bias;
        for mut row in logits.outer_iter_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let total = row.sum();
            row.mapv_inplace(|v| v / total);
        }
        logits
    }

    fn fitted(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.weights, &self.bias) {
            (Some(w), Some(b)) => Ok((w, b)),
            _ => Err(Error::fit("LogisticRegression", "model is not fitted")),
        }
    }
}

impl MLMethod for LogisticRegression {
    fn name(&self) -> &str {
        "LogisticRegression"
    }

    fn fit(&mut self, data: &EncodedData, label: &Label, _cores_for_training: usize) -> Result<()> {
        let (y, classes) = training_targets(data, label)?;
        let x = &data.examples;
        let n = x.nrows() as f64;

        let mut targets = Array2::<f64>::zeros((x.nrows(), classes.len()));
        for (i, value) in y.iter().enumerate() {
            if let Some(c) = classes.iter().position(|class| class == value) {
                targets[[i, c]] = 1.0;
            }
        }

        let mut weights = Array2::<f64>::zeros((x.ncols(), classes.len()));
        let mut bias = Array1::<f64>::zeros(classes.len());
        for _ in 0..self.max_iter {
            let residual = Self::probabilities(&weights, &bias, x) - &targets;
            let grad_w = x.t().dot(&residual) / n + &weights * self.l2_penalty;
            let grad_b = residual.sum_axis(Axis(0)) / n;

            weights.scaled_add(-self.learning_rate, &grad_w);
            bias.scaled_add(-self.learning_rate, &grad_b);

            let largest = grad_w.iter().chain(grad_b.iter()).fold(0.0_f64, |m, g| m.max(g.abs()));
            if largest < self.tolerance {
                break;
            }
        }

        if weights.iter().chain(bias.iter()).any(|v| !v.is_finite()) {
            return Err(Error::fit(self.name(), "gradient descent diverged"));
        }
        self.weights = Some(weights);
        self.bias = Some(bias);
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, data: &EncodedData, label: &Label) -> Result<Vec<String>> {
        let Some(proba) = self.predict_proba(data, label)? else {
            return Err(Error::fit(self.name(), "model is not fitted"));
        };
        Ok(proba
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                for (c, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = c;
                    }
                }
                self.classes[best].clone()
            })
            .collect())
    }

    fn predict_proba(&self, data: &EncodedData, _label: &Label) -> Result<Option<Array2<f64>>> {
        let (weights, bias) = self.fitted()?;
        check_features(self.name(), weights.nrows(), data)?;
        Ok(Some(Self::probabilities(weights, bias, &data.examples)))
    }

    fn can_predict_proba(&self) -> bool {
        true
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn get_params(&self) -> serde_json::Value {
        json!({
            "learning_rate": self.learning_rate,
            "max_iter": self.max_iter,
            "l2_penalty": self.l2_penalty,
            "tolerance": self.tolerance,
            "classes": self.classes,
            "weights": self
                .weights
                .as_ref()
                .map(|w| w.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>()),
            "bias": self.bias.as_ref().map(|b| b.to_vec()),
        })
    }
}
