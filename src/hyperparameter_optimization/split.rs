//! Split configuration for the outer (assessment) and inner (selection) loops

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reports::ReportConfig;

/// How a dataset is partitioned into train/test pairs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    /// `split_count` folds, each example tested exactly once
    KFold,
    /// k-fold with class proportions of `stratify_by` kept in every fold
    StratifiedKFold,
    /// `split_count` independent holdout draws of `training_percentage`
    #[default]
    Random,
    /// One fold per example
    LeaveOneOut,
}

impl SplitStrategy {
    /// Smallest meaningful `split_count`
    pub fn min_split_count(&self) -> usize {
        match self {
            Self::KFold | Self::StratifiedKFold => 2,
            Self::Random | Self::LeaveOneOut => 1,
        }
    }

    /// Count substituted when the configured one is below the minimum
    pub fn default_split_count(&self) -> usize {
        match self {
            Self::KFold | Self::StratifiedKFold => 5,
            Self::Random | Self::LeaveOneOut => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::KFold => "k_fold",
            Self::StratifiedKFold => "stratified_k_fold",
            Self::Random => "random",
            Self::LeaveOneOut => "leave_one_out",
        }
    }
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Splitting strategy plus the reports attached to its splits
#[derive(Clone, Debug)]
pub struct SplitConfig {
    pub split_strategy: SplitStrategy,
    /// Number of folds (k-fold variants) or repetitions (random)
    pub split_count: usize,
    /// Train fraction for random splits, in (0, 1)
    pub training_percentage: f64,
    /// Label whose classes are balanced across stratified folds
    pub stratify_by: Option<String>,
    pub seed: u64,
    pub reports: ReportConfig,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            split_strategy: SplitStrategy::Random,
            split_count: 1,
            training_percentage: 0.7,
            stratify_by: None,
            seed: 42,
            reports: ReportConfig::default(),
        }
    }
}

impl SplitConfig {
    /// Plain k-fold
    pub fn k_fold(k: usize) -> Self {
        Self { split_strategy: SplitStrategy::KFold, split_count: k, ..Self::default() }
    }

    /// k-fold stratified on `label`
    pub fn stratified_k_fold(k: usize, label: impl Into<String>) -> Self {
        Self {
            split_strategy: SplitStrategy::StratifiedKFold,
            split_count: k,
            stratify_by: Some(label.into()),
            ..Self::default()
        }
    }

    /// `count` random holdout splits with `training_percentage` of the data for training
    pub fn random(count: usize, training_percentage: f64) -> Self {
        Self { split_count: count, training_percentage, ..Self::default() }
    }

    pub fn leave_one_out() -> Self {
        Self { split_strategy: SplitStrategy::LeaveOneOut, ..Self::default() }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_reports(mut self, reports: ReportConfig) -> Self {
        self.reports = reports;
        self
    }
}
