//! Dataset preprocessing applied before encoding
//!
//! Preprocessors never modify their input; each returns a new dataset. Inside
//! an [`MLProcess`](crate::workflows::MLProcess) the same sequence is applied
//! to the training and the test dataset independently.

mod filters;

pub use filters::{DuplicateSequenceFilter, SequenceLengthFilter};

use std::fmt;

use crate::data::Dataset;
use crate::error::Result;

/// A dataset-to-dataset transformation
pub trait Preprocessor: Send + Sync + fmt::Debug {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Produce the processed dataset
    fn process(&self, dataset: &Dataset) -> Result<Dataset>;
}

/// Run `preprocessors` in order
pub fn apply_preprocessing(
    preprocessors: &[Box<dyn Preprocessor>],
    dataset: &Dataset,
) -> Result<Dataset> {
    preprocessors
        .iter()
        .try_fold(dataset.clone(), |current, step| {
            tracing::debug!(step = step.name(), dataset = current.name(), "preprocessing");
            step.process(&current)
        })
}
