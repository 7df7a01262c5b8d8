//! Seeded synthetic repertoire datasets

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::dataset::{Dataset, Example};

const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

/// Motif implanted into repertoires of one class
#[derive(Clone, Debug)]
struct Signal {
    label: String,
    class: String,
    motif: String,
    rate: f64,
}

/// Builder for random repertoire datasets
///
/// Label values are assigned round-robin so every class of every label is
/// represented as evenly as the repertoire count allows. With a signal, a
/// fraction of the sequences in repertoires of the signal class carry the
/// motif, which makes the label learnable from k-mer frequencies.
#[derive(Clone, Debug)]
pub struct RandomDatasetBuilder {
    repertoire_count: usize,
    sequence_count: (usize, usize),
    sequence_length: (usize, usize),
    labels: Vec<(String, Vec<String>)>,
    signal: Option<Signal>,
    seed: u64,
}

impl RandomDatasetBuilder {
    /// Start a builder for `repertoire_count` repertoires
    pub fn new(repertoire_count: usize) -> Self {
        Self {
            repertoire_count,
            sequence_count: (10, 20),
            sequence_length: (10, 14),
            labels: Vec::new(),
            signal: None,
            seed: 42,
        }
    }

    /// Inclusive range of sequences per repertoire
    pub fn sequence_count(mut self, min: usize, max: usize) -> Self {
        self.sequence_count = (min.min(max), max.max(min));
        self
    }

    /// Inclusive range of sequence lengths
    pub fn sequence_length(mut self, min: usize, max: usize) -> Self {
        self.sequence_length = (min.min(max).max(1), max.max(min).max(1));
        self
    }

    /// Add a label with its values
    pub fn label<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.push((name.into(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Implant `motif` into a `rate` fraction of sequences of repertoires where `label == class`
    pub fn signal(
        mut self,
        label: impl Into<String>,
        class: impl Into<String>,
        motif: impl Into<String>,
        rate: f64,
    ) -> Self {
        self.signal = Some(Signal {
            label: label.into(),
            class: class.into(),
            motif: motif.into(),
            rate: rate.clamp(0.0, 1.0),
        });
        self
    }

    /// Random seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Generate the dataset
    pub fn build(&self, name: impl Into<String>) -> Dataset {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let examples = (0..self.repertoire_count)
            .map(|i| {
                let mut example = Example::new(format!("repertoire_{i}"), Vec::new());
                for (label, values) in &self.labels {
                    if !values.is_empty() {
                        example.labels.insert(label.clone(), values[i % values.len()].clone());
                    }
                }
                let carries_signal = self.signal.as_ref().filter(|s| {
                    example.label(&s.label) == Some(s.class.as_str())
                });
                let n_sequences = rng.random_range(self.sequence_count.0..=self.sequence_count.1);
                example.sequences = (0..n_sequences)
                    .map(|_| {
                        let mut sequence = self.random_sequence(&mut rng);
                        if let Some(signal) = carries_signal {
                            if rng.random::<f64>() < signal.rate {
                                implant(&mut sequence, &signal.motif, &mut rng);
                            }
                        }
                        sequence
                    })
                    .collect();
                example
            })
            .collect();
        Dataset::new(name, examples)
    }

    fn random_sequence(&self, rng: &mut StdRng) -> String {
        let length = rng.random_range(self.sequence_length.0..=self.sequence_length.1);
        (0..length)
            .map(|_| AMINO_ACIDS[rng.random_range(0..AMINO_ACIDS.len())] as char)
            .collect()
    }
}

fn implant(sequence: &mut String, motif: &str, rng: &mut StdRng) {
    if motif.len() >= sequence.len() {
        *sequence = motif.to_string();
        return;
    }
    let start = rng.random_range(0..=sequence.len() - motif.len());
    sequence.replace_range(start..start + motif.len(), motif);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_dataset() {
        let builder = RandomDatasetBuilder::new(8).label("status", ["a", "b"]).seed(7);
        let first = builder.build("x");
        let second = builder.build("x");
        assert_eq!(first.examples(), second.examples());
    }

    #[test]
    fn test_labels_are_balanced() {
        let dataset = RandomDatasetBuilder::new(9).label("status", ["a", "b", "c"]).build("x");
        let counts = dataset.class_counts("status").unwrap();
        assert!(counts.values().all(|&c| c == 3));
    }

    #[test]
    fn test_signal_is_implanted_only_in_signal_class() {
        let dataset = RandomDatasetBuilder::new(10)
            .label("status", ["healthy", "sick"])
            .sequence_length(12, 12)
            .signal("status", "sick", "WWWW", 1.0)
            .build("x");
        for example in dataset.examples() {
            let has_motif = example.sequences.iter().all(|s| s.contains("WWWW"));
            assert_eq!(has_motif, example.label("status") == Some("sick"));
        }
    }
}
