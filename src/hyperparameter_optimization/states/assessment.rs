use std::path::PathBuf;

use indexmap::IndexMap;

use super::label::HPLabelState;
use crate::data::{Dataset, LabelConfiguration};
use crate::error::{Error, Result};
use crate::reports::ReportResult;

/// Record of one outer split
#[derive(Clone, Debug)]
pub struct HPAssessmentState {
    pub split_index: usize,
    pub train_val_dataset: Dataset,
    pub test_dataset: Dataset,
    pub path: PathBuf,
    /// Label name -> label state, in label declaration order
    pub label_states: IndexMap<String, HPLabelState>,
    pub train_val_data_reports: Vec<ReportResult>,
    pub test_data_reports: Vec<ReportResult>,
}

impl HPAssessmentState {
    pub fn new(
        split_index: usize,
        train_val_dataset: Dataset,
        test_dataset: Dataset,
        path: PathBuf,
        label_configuration: &LabelConfiguration,
    ) -> Self {
        let label_states = label_configuration
            .labels()
            .iter()
            .map(|label| (label.name.clone(), HPLabelState::new(label.clone())))
            .collect();
        Self {
            split_index,
            train_val_dataset,
            test_dataset,
            path,
            label_states,
            train_val_data_reports: Vec::new(),
            test_data_reports: Vec::new(),
        }
    }

    pub fn label_state(&self, label: &str) -> Result<&HPLabelState> {
        self.label_states
            .get(label)
            .ok_or_else(|| Error::Data(format!("no state for label '{label}'")))
    }

    pub fn label_state_mut(&mut self, label: &str) -> Result<&mut HPLabelState> {
        self.label_states
            .get_mut(label)
            .ok_or_else(|| Error::Data(format!("no state for label '{label}'")))
    }
}
