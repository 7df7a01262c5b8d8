//! Validation error types
//!
//! Hard errors found while checking a run description. Problems that have a
//! documented default are not errors; they are downgraded to warnings when
//! the description is resolved.

/// Validation error type
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No labels configured (at least one is required)")]
    NoLabels,

    #[error("No hyperparameter settings configured (at least one is required)")]
    NoSettings,

    #[error("Setting {index} references unknown encoding '{name}'")]
    UnknownEncoding { index: usize, name: String },

    #[error("Setting {index} references unknown ML method '{name}'")]
    UnknownMLMethod { index: usize, name: String },

    #[error("Setting {index} references unknown preprocessing sequence '{name}'")]
    UnknownPreprocessing { index: usize, name: String },

    #[error("Setting '{0}' is declared more than once")]
    DuplicateSetting(String),

    #[error("Invalid {field} name '{name}': it {reason}")]
    InvalidName { field: String, name: String, reason: String },

    #[error("Output directories clash: {0}")]
    OutputClash(String),

    #[error("Report '{name}' referenced by {field} is not defined under reports")]
    UnknownReport { field: String, name: String },

    #[error("Invalid {field}.training_percentage: {value} (must be in (0.0, 1.0))")]
    InvalidTrainingPercentage { field: String, value: f64 },

    #[error("{field}.stratify_by names label '{label}', which is not configured")]
    UnknownStratificationLabel { field: String, label: String },

    #[error("Invalid model_selection_n_folds for ML method '{method}': {folds} (must be >= 2)")]
    InvalidModelSelectionFolds { method: String, folds: usize },

    #[error("Invalid max_workers: 0 (must be > 0)")]
    InvalidMaxWorkers,
}
