//! Dataset encoders
//!
//! An [`Encoder`] turns a [`Dataset`] into a numeric design matrix. Encoders
//! are stateful: encoding with `learn_model = true` fits the encoder's
//! vocabulary and scaling on that dataset; encoding with `learn_model = false`
//! reuses what was learned. Fitting only on training data keeps test data
//! from leaking into the representation.

mod kmer;

pub use kmer::{KmerFrequencyEncoder, Normalization, SequenceEncoding};

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;

use crate::data::{Dataset, LabelConfiguration};
use crate::error::Result;

/// Numeric representation of a dataset
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedData {
    /// Design matrix, one row per example
    pub examples: Array2<f64>,
    /// Example identifiers in row order
    pub example_ids: Vec<String>,
    /// Column names
    pub feature_names: Vec<String>,
    /// Label name -> value per row
    pub labels: BTreeMap<String, Vec<String>>,
    /// Name of the encoder that produced the data
    pub encoding: String,
}

impl EncodedData {
    /// Number of encoded examples
    pub fn n_examples(&self) -> usize {
        self.examples.nrows()
    }

    /// Number of features
    pub fn n_features(&self) -> usize {
        self.examples.ncols()
    }

    /// Row values of `label`
    pub fn label_values(&self, label: &str) -> Result<&[String]> {
        self.labels.get(label).map(Vec::as_slice).ok_or_else(|| {
            crate::error::Error::Data(format!("encoded data has no values for label '{label}'"))
        })
    }

    /// Rows at `indices` (used by method-internal cross-validation)
    pub fn select_rows(&self, indices: &[usize]) -> EncodedData {
        EncodedData {
            examples: self.examples.select(ndarray::Axis(0), indices),
            example_ids: indices.iter().map(|&i| self.example_ids[i].clone()).collect(),
            feature_names: self.feature_names.clone(),
            labels: self
                .labels
                .iter()
                .map(|(name, values)| {
                    (name.clone(), indices.iter().map(|&i| values[i].clone()).collect())
                })
                .collect(),
            encoding: self.encoding.clone(),
        }
    }
}

/// Parameters for one encoding call
#[derive(Clone, Copy, Debug)]
pub struct EncoderParams<'a> {
    /// Labels whose values are carried into the encoded data
    pub label_configuration: &'a LabelConfiguration,
    /// Fit encoder state on this dataset (training data) or reuse it (test data)
    pub learn_model: bool,
}

/// Dataset encoder
pub trait Encoder: Send + Sync + fmt::Debug {
    /// Encoder name
    fn name(&self) -> &str;

    /// Encode `dataset`
    fn encode(&mut self, dataset: &Dataset, params: &EncoderParams<'_>) -> Result<EncodedData>;
}

/// Label columns for `dataset` restricted to the configured labels
pub(crate) fn collect_labels(
    dataset: &Dataset,
    label_configuration: &LabelConfiguration,
) -> Result<BTreeMap<String, Vec<String>>> {
    label_configuration
        .labels()
        .iter()
        .map(|label| {
            let values = dataset.label_values(&label.name)?;
            Ok((label.name.clone(), values.into_iter().map(str::to_string).collect()))
        })
        .collect()
}
