use std::path::PathBuf;

use indexmap::IndexMap;

use super::item::HPItem;
use crate::data::Dataset;
use crate::hyperparameter_optimization::HPSetting;
use crate::reports::ReportResult;

/// Inner-loop record for one label of one outer split
#[derive(Clone, Debug, Default)]
pub struct HPSelectionState {
    pub train_datasets: Vec<Dataset>,
    pub val_datasets: Vec<Dataset>,
    pub path: PathBuf,
    /// One item per inner split, for settings that succeeded on all of them
    pub hp_items: IndexMap<HPSetting, Vec<HPItem>>,
    /// Aggregated inner score per successful setting
    pub performances: IndexMap<HPSetting, f64>,
    /// Failure message per setting that could not be evaluated
    pub failures: IndexMap<HPSetting, String>,
    pub optimal_hp_setting: Option<HPSetting>,
    pub train_data_reports: Vec<ReportResult>,
    pub val_data_reports: Vec<ReportResult>,
}

impl HPSelectionState {
    pub fn new(train_datasets: Vec<Dataset>, val_datasets: Vec<Dataset>, path: PathBuf) -> Self {
        Self { train_datasets, val_datasets, path, ..Self::default() }
    }

    /// Inner scores of `setting`, one per inner split
    pub fn scores(&self, setting: &HPSetting) -> Vec<f64> {
        self.hp_items
            .get(setting)
            .map(|items| items.iter().filter_map(HPItem::score).collect())
            .unwrap_or_default()
    }

    pub fn inner_split_count(&self) -> usize {
        self.train_datasets.len()
    }
}
