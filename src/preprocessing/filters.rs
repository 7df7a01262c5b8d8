//! Sequence-level repertoire filters

use std::collections::HashSet;

use super::Preprocessor;
use crate::data::{Dataset, Example};
use crate::error::{Error, Result};

/// Keeps only sequences whose length lies in `[min_length, max_length]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceLengthFilter {
    min_length: usize,
    max_length: usize,
}

impl SequenceLengthFilter {
    /// Create a filter; fails if the bounds are inverted
    pub fn new(min_length: usize, max_length: usize) -> Result<Self> {
        if min_length > max_length {
            return Err(Error::config(
                "SequenceLengthFilter",
                format!("min_length {min_length} exceeds max_length {max_length}"),
            ));
        }
        Ok(Self { min_length, max_length })
    }
}

impl Preprocessor for SequenceLengthFilter {
    fn name(&self) -> &str {
        "SequenceLengthFilter"
    }

    fn process(&self, dataset: &Dataset) -> Result<Dataset> {
        let examples = dataset
            .examples()
            .iter()
            .map(|example| Example {
                sequences: example
                    .sequences
                    .iter()
                    .filter(|s| (self.min_length..=self.max_length).contains(&s.len()))
                    .cloned()
                    .collect(),
                ..example.clone()
            })
            .collect();
        Ok(dataset.with_examples(format!("{}_length_filtered", dataset.name()), examples))
    }
}

/// Removes repeated sequences within each repertoire, keeping first occurrences
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DuplicateSequenceFilter;

impl Preprocessor for DuplicateSequenceFilter {
    fn name(&self) -> &str {
        "DuplicateSequenceFilter"
    }

    fn process(&self, dataset: &Dataset) -> Result<Dataset> {
        let examples = dataset
            .examples()
            .iter()
            .map(|example| {
                let mut seen = HashSet::new();
                Example {
                    sequences: example
                        .sequences
                        .iter()
                        .filter(|s| seen.insert(s.as_str()))
                        .cloned()
                        .collect(),
                    ..example.clone()
                }
            })
            .collect();
        Ok(dataset.with_examples(format!("{}_deduplicated", dataset.name()), examples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::apply_preprocessing;

    fn dataset() -> Dataset {
        Dataset::new(
            "d",
            vec![
                Example::new("1", vec!["AAA".into(), "AAAAA".into(), "AAA".into()])
                    .with_label("status", "sick"),
                Example::new("2", vec!["CC".into()]).with_label("status", "healthy"),
            ],
        )
    }

    #[test]
    fn test_length_filter_keeps_examples_and_labels() {
        let filtered = SequenceLengthFilter::new(3, 4).unwrap().process(&dataset()).unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.examples()[0].sequences, vec!["AAA", "AAA"]);
        assert!(filtered.examples()[1].sequences.is_empty());
        assert_eq!(filtered.examples()[1].label("status"), Some("healthy"));
    }

    #[test]
    fn test_length_filter_rejects_inverted_bounds() {
        assert!(SequenceLengthFilter::new(5, 2).is_err());
    }

    #[test]
    fn test_chained_preprocessing_leaves_input_untouched() {
        let input = dataset();
        let steps: Vec<Box<dyn Preprocessor>> = vec![
            Box::new(DuplicateSequenceFilter),
            Box::new(SequenceLengthFilter::new(1, 3).unwrap()),
        ];
        let output = apply_preprocessing(&steps, &input).unwrap();
        assert_eq!(output.examples()[0].sequences, vec!["AAA"]);
        assert_eq!(input.examples()[0].sequences.len(), 3);
    }
}
