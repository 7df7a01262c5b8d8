//! Labels and label configuration

use serde::{Deserialize, Serialize};

use super::dataset::Dataset;
use crate::error::{Error, Result};

/// A named label with its value domain
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    /// Label name as it appears in example metadata
    pub name: String,
    /// Possible class values, in declaration order
    pub values: Vec<String>,
    /// Class treated as positive by binary metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive_class: Option<String>,
}

impl Label {
    /// Create a label with the given values
    pub fn new<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
            positive_class: None,
        }
    }

    /// Set the positive class
    pub fn with_positive_class(mut self, class: impl Into<String>) -> Self {
        self.positive_class = Some(class.into());
        self
    }

    /// Positive class: the explicit one, otherwise the last value for binary labels
    pub fn positive_class(&self) -> Option<&str> {
        match &self.positive_class {
            Some(class) => Some(class),
            None if self.values.len() == 2 => self.values.last().map(String::as_str),
            None => None,
        }
    }

    /// Whether the label has exactly two classes
    pub fn is_binary(&self) -> bool {
        self.values.len() == 2
    }
}

/// Ordered set of labels to learn
///
/// Iteration order is declaration order, which keeps every loop over labels
/// deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelConfiguration {
    labels: Vec<Label>,
}

impl LabelConfiguration {
    /// Create from labels; later duplicates replace earlier ones in place
    pub fn new(labels: Vec<Label>) -> Self {
        let mut config = Self::default();
        for label in labels {
            config.add_label(label);
        }
        config
    }

    /// Configuration holding a single label
    pub fn single(label: Label) -> Self {
        Self { labels: vec![label] }
    }

    /// Infer value domains for `names` from the dataset (values sorted)
    pub fn from_dataset(dataset: &Dataset, names: &[&str]) -> Result<Self> {
        let labels = names
            .iter()
            .map(|name| {
                let counts = dataset.class_counts(name)?;
                Ok(Label::new(*name, counts.into_keys()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(labels))
    }

    /// Add or replace a label
    pub fn add_label(&mut self, label: Label) {
        match self.labels.iter_mut().find(|l| l.name == label.name) {
            Some(existing) => *existing = label,
            None => self.labels.push(label),
        }
    }

    /// Labels in declaration order
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label names in declaration order
    pub fn label_names(&self) -> Vec<&str> {
        self.labels.iter().map(|l| l.name.as_str()).collect()
    }

    /// Look up a label by name
    pub fn get(&self, name: &str) -> Result<&Label> {
        self.labels
            .iter()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::config("labels", format!("label '{name}' is not configured")))
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no labels are configured
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
