//! In-memory repertoire dataset

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One immune repertoire: its receptor sequences and metadata labels
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Unique identifier within a dataset
    pub id: String,
    /// Receptor sequences (e.g. CDR3 amino acid sequences)
    pub sequences: Vec<String>,
    /// Label name -> class value
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Example {
    /// Create an example without labels
    pub fn new(id: impl Into<String>, sequences: Vec<String>) -> Self {
        Self { id: id.into(), sequences, labels: BTreeMap::new() }
    }

    /// Attach a label value
    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(name.into(), value.into());
        self
    }

    /// Value of the given label, if present
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }
}

/// Immutable, cheaply clonable collection of examples
///
/// Cloning a dataset shares the underlying examples; there is no way to
/// mutate them once the dataset is built.
#[derive(Clone, Debug)]
pub struct Dataset {
    name: String,
    examples: Arc<[Example]>,
}

impl Dataset {
    /// Create a dataset from examples
    pub fn new(name: impl Into<String>, examples: Vec<Example>) -> Self {
        Self { name: name.into(), examples: examples.into() }
    }

    /// Dataset name (used in logs and report outputs)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    /// Whether the dataset has no examples
    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    /// All examples in order
    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    /// Example identifiers in order
    pub fn example_ids(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.id.as_str()).collect()
    }

    /// Value of `label` for every example, in order
    ///
    /// Fails with a data error if any example lacks the label.
    pub fn label_values(&self, label: &str) -> Result<Vec<&str>> {
        self.examples
            .iter()
            .map(|e| {
                e.label(label).ok_or_else(|| {
                    Error::Data(format!(
                        "example '{}' in dataset '{}' has no value for label '{label}'",
                        e.id, self.name
                    ))
                })
            })
            .collect()
    }

    /// Number of examples per class of `label`
    pub fn class_counts(&self, label: &str) -> Result<BTreeMap<String, usize>> {
        let mut counts = BTreeMap::new();
        for value in self.label_values(label)? {
            *counts.entry(value.to_string()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// New dataset holding the examples at `indices` (in the given order)
    pub fn subset(&self, indices: &[usize], name: impl Into<String>) -> Result<Dataset> {
        let examples = indices
            .iter()
            .map(|&i| {
                self.examples.get(i).cloned().ok_or_else(|| {
                    Error::Data(format!(
                        "index {i} out of range for dataset '{}' with {} examples",
                        self.name,
                        self.len()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Dataset::new(name, examples))
    }

    /// New dataset with the same name lineage but different examples
    pub fn with_examples(&self, name: impl Into<String>, examples: Vec<Example>) -> Dataset {
        Dataset::new(name, examples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::new(
            "d",
            (0..6)
                .map(|i| {
                    Example::new(format!("rep{i}"), vec!["CASS".into()])
                        .with_label("status", if i % 3 == 0 { "sick" } else { "healthy" })
                })
                .collect(),
        )
    }

    #[test]
    fn test_subset_leaves_parent_untouched() {
        let parent = dataset();
        let child = parent.subset(&[4, 1], "child").unwrap();
        assert_eq!(child.example_ids(), vec!["rep4", "rep1"]);
        assert_eq!(parent.len(), 6);
        assert_eq!(parent.examples()[1].id, "rep1");
    }

    #[test]
    fn test_subset_out_of_range() {
        assert!(matches!(dataset().subset(&[10], "x"), Err(Error::Data(_))));
    }

    #[test]
    fn test_class_counts() {
        let counts = dataset().class_counts("status").unwrap();
        assert_eq!(counts["sick"], 2);
        assert_eq!(counts["healthy"], 4);
    }

    #[test]
    fn test_missing_label_is_data_error() {
        let err = dataset().label_values("age").unwrap_err();
        assert!(err.to_string().contains("rep0"));
    }
}
