//! Nested cross-validation
//!
//! The outer loop ([`HPAssessment`]) splits the dataset into train/validation
//! and test parts. For each outer split the inner loop ([`HPSelection`])
//! splits the train/validation part again and picks, per label, the setting
//! with the best aggregated inner score. Every setting is then retrained on
//! the full train/validation part and assessed on the held-out test part.
//! Everything is recorded in a [`TrainMLModelState`].

mod assessment;
mod selection;
mod setting;
mod split;
mod states;
mod strategy;
mod util;

pub use assessment::{worker_count, HPAssessment};
pub use selection::HPSelection;
pub use setting::{
    check_name, find_item_dir_clash, item_dir_name, ComponentSpec, HPSetting, MLMethodSpec,
    ParamReader, ParamValue, Params, OPTIMAL_MARKER,
};
pub use split::{SplitConfig, SplitStrategy};
pub use states::{
    ExecutionMode, HPAssessmentState, HPItem, HPItemSummary, HPLabelState, HPSelectionState,
    TrainMLModelState, TrainMLModelStateBuilder,
};
pub use strategy::{improves, Aggregation, GridSearch, HPOptimizationStrategy, TIE_TOLERANCE};
pub use util::{Fold, HPUtil, KFold, StratifiedKFold};
