//! ML methods
//!
//! An [`MLMethod`] is fitted on encoded training data for one label and then
//! predicts class labels (and, when supported, class probabilities) for
//! encoded data produced by the same fitted encoder.

mod logistic_regression;
pub mod model_selection;
mod nearest_centroid;

pub use logistic_regression::LogisticRegression;
pub use model_selection::{fit_by_cross_validation, ParameterGrid};
pub use nearest_centroid::{Distance, NearestCentroid};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::data::Label;
use crate::encoding::EncodedData;
use crate::error::{Error, Result};

/// A trainable classifier
pub trait MLMethod: Send + Sync + fmt::Debug {
    /// Method name, used for artifact file names
    fn name(&self) -> &str;

    /// Fit on `data` for `label`, using up to `cores_for_training` threads
    fn fit(&mut self, data: &EncodedData, label: &Label, cores_for_training: usize) -> Result<()>;

    /// Predicted class per row
    fn predict(&self, data: &EncodedData, label: &Label) -> Result<Vec<String>>;

    /// Class probabilities per row, columns ordered as [`MLMethod::classes`]
    fn predict_proba(&self, _data: &EncodedData, _label: &Label) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }

    fn can_predict_proba(&self) -> bool {
        false
    }

    /// Classes seen during fitting
    fn classes(&self) -> &[String];

    /// Fitted parameters as JSON
    fn get_params(&self) -> serde_json::Value;

    /// Write the fitted model to `dir/<name>.json`
    fn store(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .map_err(|e| Error::io(format!("creating {}", dir.display()), e))?;
        let path = dir.join(format!("{}.json", self.name()));
        let body = serde_json::to_string_pretty(&self.get_params())?;
        fs::write(&path, body).map_err(|e| Error::io(format!("writing {}", path.display()), e))?;
        Ok(path)
    }
}

/// Row targets for `label` and the classes present, in label declaration order
///
/// Fails when fewer than two classes are present: no classifier can be fitted.
pub(crate) fn training_targets(
    data: &EncodedData,
    label: &Label,
) -> Result<(Vec<String>, Vec<String>)> {
    let y = data.label_values(&label.name)?.to_vec();
    if y.is_empty() {
        return Err(Error::Data(format!("no training examples for label '{}'", label.name)));
    }
    let mut classes: Vec<String> =
        label.values.iter().filter(|v| y.contains(*v)).cloned().collect();
    let mut extra: Vec<String> =
        y.iter().filter(|v| !label.values.contains(*v)).cloned().collect();
    extra.sort();
    extra.dedup();
    classes.extend(extra);

    if classes.len() < 2 {
        return Err(Error::Data(format!(
            "training data for label '{}' contains a single class '{}'",
            label.name,
            classes.first().map(String::as_str).unwrap_or_default()
        )));
    }
    Ok((y, classes))
}

/// Fail when `data` does not have the feature count seen during fitting
pub(crate) fn check_features(method: &str, expected: usize, data: &EncodedData) -> Result<()> {
    if data.n_features() == expected {
        Ok(())
    } else {
        Err(Error::fit(
            method,
            format!("expected {expected} features, got {}", data.n_features()),
        ))
    }
}
