//! Ledger types of a nested cross-validation run
//!
//! [`TrainMLModelState`] holds one [`HPAssessmentState`] per outer split; each
//! of those holds one [`HPLabelState`] per label with the inner-loop
//! [`HPSelectionState`] and the retrained [`HPItem`]s.

mod assessment;
mod item;
mod label;
mod selection;
mod train_ml_model;

pub use assessment::HPAssessmentState;
pub use item::{HPItem, HPItemSummary};
pub use label::HPLabelState;
pub use selection::HPSelectionState;
pub use train_ml_model::{ExecutionMode, TrainMLModelState, TrainMLModelStateBuilder};
