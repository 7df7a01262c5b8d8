//! K-mer frequency encoding of repertoires

use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use ndarray::Array2;

use super::{collect_labels, EncodedData, Encoder, EncoderParams};
use crate::data::{Dataset, Example};
use crate::error::{Error, Result};

/// How k-mers are cut from a sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SequenceEncoding {
    /// Overlapping contiguous k-mers
    Continuous { k: usize },
    /// `k_left` residues, a gap of `min_gap..=max_gap` positions, `k_right` residues
    Gapped { k_left: usize, k_right: usize, min_gap: usize, max_gap: usize },
}

impl SequenceEncoding {
    fn features(&self, sequence: &str) -> Vec<String> {
        let bytes = sequence.as_bytes();
        match *self {
            SequenceEncoding::Continuous { k } => {
                if k == 0 || bytes.len() < k {
                    return Vec::new();
                }
                bytes.windows(k).map(|w| String::from_utf8_lossy(w).into_owned()).collect()
            }
            SequenceEncoding::Gapped { k_left, k_right, min_gap, max_gap } => {
                let mut features = Vec::new();
                for gap in min_gap..=max_gap {
                    let span = k_left + gap + k_right;
                    if span == 0 || bytes.len() < span {
                        continue;
                    }
                    for start in 0..=bytes.len() - span {
                        let left = String::from_utf8_lossy(&bytes[start..start + k_left]);
                        let right_start = start + k_left + gap;
                        let right = String::from_utf8_lossy(&bytes[right_start..right_start + k_right]);
                        features.push(format!("{left}{}{right}", ".".repeat(gap)));
                    }
                }
                features
            }
        }
    }
}

/// Per-example normalization of k-mer counts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Normalization {
    /// Counts divided by the example's total count
    #[default]
    RelativeFrequency,
    /// Counts divided by the example's L2 norm
    L2,
    /// Raw counts
    None,
}

impl FromStr for Normalization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relative_frequency" => Ok(Self::RelativeFrequency),
            "l2" => Ok(Self::L2),
            "none" => Ok(Self::None),
            other => Err(Error::config(
                "normalization_type",
                format!("'{other}' is not one of: relative_frequency, l2, none"),
            )),
        }
    }
}

/// Encodes each repertoire as the (normalized) frequencies of its k-mers
///
/// The vocabulary is the sorted set of k-mers seen while learning; k-mers that
/// only occur in later datasets are ignored. With `scale_to_unit_variance`,
/// column means and standard deviations are also learned.
#[derive(Clone, Debug)]
pub struct KmerFrequencyEncoder {
    sequence_encoding: SequenceEncoding,
    normalization: Normalization,
    scale_to_unit_variance: bool,
    vocabulary: Option<Vec<String>>,
    scaler: Option<Vec<(f64, f64)>>,
}

impl KmerFrequencyEncoder {
    /// Create an encoder with relative-frequency normalization and no scaling
    pub fn new(sequence_encoding: SequenceEncoding) -> Self {
        Self {
            sequence_encoding,
            normalization: Normalization::default(),
            scale_to_unit_variance: false,
            vocabulary: None,
            scaler: None,
        }
    }

    /// Set row normalization
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    /// Standardize columns with statistics learned on the training data
    pub fn with_scaling(mut self, scale_to_unit_variance: bool) -> Self {
        self.scale_to_unit_variance = scale_to_unit_variance;
        self
    }

    /// Learned vocabulary, if any
    pub fn vocabulary(&self) -> Option<&[String]> {
        self.vocabulary.as_deref()
    }

    fn count(&self, example: &Example) -> HashMap<String, f64> {
        let mut counts = HashMap::new();
        for sequence in &example.sequences {
            for feature in self.sequence_encoding.features(sequence) {
                *counts.entry(feature).or_insert(0.0) += 1.0;
            }
        }
        counts
    }

    fn normalize(&self, matrix: &mut Array2<f64>) {
        for mut row in matrix.rows_mut() {
            let denominator = match self.normalization {
                Normalization::RelativeFrequency => row.sum(),
                Normalization::L2 => row.iter().map(|v| v * v).sum::<f64>().sqrt(),
                Normalization::None => 1.0,
            };
            if denominator > 0.0 {
                row.mapv_inplace(|v| v / denominator);
            }
        }
    }

    fn learn_scaler(matrix: &Array2<f64>) -> Vec<(f64, f64)> {
        matrix
            .columns()
            .into_iter()
            .map(|column| {
                let n = column.len().max(1) as f64;
                let mean = column.sum() / n;
                let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                let std = variance.sqrt();
                (mean, if std > 0.0 { std } else { 1.0 })
            })
            .collect()
    }
}

impl Encoder for KmerFrequencyEncoder {
    fn name(&self) -> &str {
        "KmerFrequency"
    }

    fn encode(&mut self, dataset: &Dataset, params: &EncoderParams<'_>) -> Result<EncodedData> {
        let counts: Vec<HashMap<String, f64>> =
            dataset.examples().iter().map(|e| self.count(e)).collect();

        if params.learn_model {
            let vocabulary: BTreeSet<&String> = counts.iter().flat_map(HashMap::keys).collect();
            self.vocabulary = Some(vocabulary.into_iter().cloned().collect());
        }
        let vocabulary = self.vocabulary.clone().ok_or_else(|| {
            Error::fit(self.name(), "encoding without learn_model before a vocabulary was learned")
        })?;

        let column: HashMap<&str, usize> =
            vocabulary.iter().enumerate().map(|(i, k)| (k.as_str(), i)).collect();
        let mut matrix = Array2::<f64>::zeros((dataset.len(), vocabulary.len()));
        for (row, example_counts) in counts.iter().enumerate() {
            for (kmer, count) in example_counts {
                if let Some(&col) = column.get(kmer.as_str()) {
                    matrix[[row, col]] = *count;
                }
            }
        }
        self.normalize(&mut matrix);

        if self.scale_to_unit_variance {
            if params.learn_model {
                self.scaler = Some(Self::learn_scaler(&matrix));
            }
            let scaler = self.scaler.as_ref().ok_or_else(|| {
                Error::fit(self.name(), "scaling requested before scaler statistics were learned")
            })?;
            for (mut column, (mean, std)) in matrix.columns_mut().into_iter().zip(scaler) {
                column.mapv_inplace(|v| (v - mean) / std);
            }
        }

        Ok(EncodedData {
            examples: matrix,
            example_ids: dataset.example_ids().into_iter().map(str::to_string).collect(),
            feature_names: vocabulary,
            labels: collect_labels(dataset, params.label_configuration)?,
            encoding: self.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Label, LabelConfiguration};
    use approx::assert_abs_diff_eq;

    fn labels() -> LabelConfiguration {
        LabelConfiguration::single(Label::new("status", ["healthy", "sick"]))
    }

    fn dataset(name: &str, sequences: &[&[&str]]) -> Dataset {
        Dataset::new(
            name,
            sequences
                .iter()
                .enumerate()
                .map(|(i, seqs)| {
                    Example::new(format!("{name}{i}"), seqs.iter().map(|s| s.to_string()).collect())
                        .with_label("status", if i % 2 == 0 { "healthy" } else { "sick" })
                })
                .collect(),
        )
    }

    #[test]
    fn test_continuous_kmers() {
        let features = SequenceEncoding::Continuous { k: 3 }.features("CASSL");
        assert_eq!(features, vec!["CAS", "ASS", "SSL"]);
        assert!(SequenceEncoding::Continuous { k: 6 }.features("CASSL").is_empty());
    }

    #[test]
    fn test_gapped_kmers() {
        let encoding = SequenceEncoding::Gapped { k_left: 1, k_right: 1, min_gap: 0, max_gap: 1 };
        let features = encoding.features("ABC");
        assert_eq!(features, vec!["AB", "BC", "A.C"]);
    }

    #[test]
    fn test_relative_frequency_rows_sum_to_one() {
        let train = dataset("train", &[&["AAAB"], &["ABAB"]]);
        let labels = labels();
        let mut encoder = KmerFrequencyEncoder::new(SequenceEncoding::Continuous { k: 2 });
        let encoded = encoder
            .encode(&train, &EncoderParams { label_configuration: &labels, learn_model: true })
            .unwrap();
        assert_eq!(encoded.feature_names, vec!["AA", "AB", "BA"]);
        for row in encoded.examples.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-12);
        }
        assert_eq!(encoded.labels["status"], vec!["healthy", "sick"]);
    }

    #[test]
    fn test_test_data_reuses_training_vocabulary() {
        let labels = labels();
        let train = dataset("train", &[&["AAAA"], &["AAAA"]]);
        let test = dataset("test", &[&["CCCC"], &["AACC"]]);
        let mut encoder = KmerFrequencyEncoder::new(SequenceEncoding::Continuous { k: 2 })
            .with_normalization(Normalization::None);
        encoder
            .encode(&train, &EncoderParams { label_configuration: &labels, learn_model: true })
            .unwrap();
        let encoded = encoder
            .encode(&test, &EncoderParams { label_configuration: &labels, learn_model: false })
            .unwrap();
        assert_eq!(encoded.feature_names, vec!["AA"]);
        assert_eq!(encoded.examples[[0, 0]], 0.0);
        assert_eq!(encoded.examples[[1, 0]], 1.0);
    }

    #[test]
    fn test_encoding_without_learning_fails() {
        let labels = labels();
        let mut encoder = KmerFrequencyEncoder::new(SequenceEncoding::Continuous { k: 2 });
        let result = encoder.encode(
            &dataset("test", &[&["AAAA"]]),
            &EncoderParams { label_configuration: &labels, learn_model: false },
        );
        assert!(matches!(result, Err(Error::Fit { .. })));
    }

    #[test]
    fn test_scaling_uses_training_statistics() {
        let labels = labels();
        let train = dataset("train", &[&["AA"], &["AA", "AA", "AA"]]);
        let mut encoder = KmerFrequencyEncoder::new(SequenceEncoding::Continuous { k: 2 })
            .with_normalization(Normalization::None)
            .with_scaling(true);
        let encoded = encoder
            .encode(&train, &EncoderParams { label_configuration: &labels, learn_model: true })
            .unwrap();
        // counts 1 and 3: mean 2, std 1
        assert_abs_diff_eq!(encoded.examples[[0, 0]], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(encoded.examples[[1, 0]], 1.0, epsilon = 1e-12);

        let test = dataset("test", &[&["AA", "AA"]]);
        let encoded = encoder
            .encode(&test, &EncoderParams { label_configuration: &labels, learn_model: false })
            .unwrap();
        assert_abs_diff_eq!(encoded.examples[[0, 0]], 0.0, epsilon = 1e-12);
    }
}
