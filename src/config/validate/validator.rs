//! Configuration validation logic

use std::collections::HashSet;

use super::error::ValidationError;
use crate::config::schema::{SplitSpec, TrainMLModelSpec};
use crate::hyperparameter_optimization::{check_name, find_item_dir_clash};

/// Validate a run description
///
/// Checks:
/// - Labels and settings are present
/// - Every setting references defined encodings, ML methods and preprocessing
/// - Settings are unique and no two of them share an output directory
/// - Label and component names are usable as directory names
/// - Split specs are usable and their reports are defined
pub fn validate_config(spec: &TrainMLModelSpec) -> Result<(), ValidationError> {
    if spec.labels.is_empty() {
        return Err(ValidationError::NoLabels);
    }
    if spec.settings.is_empty() {
        return Err(ValidationError::NoSettings);
    }

    let mut seen = HashSet::new();
    for (index, setting) in spec.settings.iter().enumerate() {
        if !spec.encodings.contains_key(&setting.encoding) {
            return Err(ValidationError::UnknownEncoding { index, name: setting.encoding.clone() });
        }
        if !spec.ml_methods.contains_key(&setting.ml_method) {
            return Err(ValidationError::UnknownMLMethod { index, name: setting.ml_method.clone() });
        }
        if let Some(name) = &setting.preprocessing {
            if !spec.preprocessing_sequences.contains_key(name) {
                return Err(ValidationError::UnknownPreprocessing { index, name: name.clone() });
            }
        }
        if !seen.insert(setting) {
            return Err(ValidationError::DuplicateSetting(setting.key()));
        }
    }

    validate_names(spec)?;
    let labels: Vec<&str> = spec.labels.iter().map(|l| l.name()).collect();
    let keys: Vec<String> = spec.settings.iter().map(|s| s.key()).collect();
    if let Some(clash) = find_item_dir_clash(&labels, &keys) {
        return Err(ValidationError::OutputClash(clash));
    }

    for (name, method) in &spec.ml_methods {
        if method.model_selection_cv && method.model_selection_n_folds < 2 {
            return Err(ValidationError::InvalidModelSelectionFolds {
                method: name.clone(),
                folds: method.model_selection_n_folds,
            });
        }
    }

    validate_split(spec, &spec.assessment, "assessment")?;
    validate_split(spec, &spec.selection, "selection")?;

    for name in &spec.instruction_reports {
        if !spec.reports.contains_key(name) {
            return Err(ValidationError::UnknownReport {
                field: "instruction_reports".to_string(),
                name: name.clone(),
            });
        }
    }

    if spec.max_workers == Some(0) {
        return Err(ValidationError::InvalidMaxWorkers);
    }

    Ok(())
}

fn validate_names(spec: &TrainMLModelSpec) -> Result<(), ValidationError> {
    let names = spec
        .labels
        .iter()
        .map(|label| ("label", label.name()))
        .chain(spec.encodings.keys().map(|name| ("encoding", name.as_str())))
        .chain(spec.ml_methods.keys().map(|name| ("ML method", name.as_str())))
        .chain(spec.preprocessing_sequences.keys().map(|name| ("preprocessing", name.as_str())));
    for (field, name) in names {
        if let Some(reason) = check_name(name) {
            return Err(ValidationError::InvalidName {
                field: field.to_string(),
                name: name.to_string(),
                reason: reason.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_split(
    spec: &TrainMLModelSpec,
    split: &SplitSpec,
    field: &str,
) -> Result<(), ValidationError> {
    let fraction = split.training_percentage;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(ValidationError::InvalidTrainingPercentage {
            field: field.to_string(),
            value: fraction,
        });
    }

    if let Some(label) = &split.stratify_by {
        if !spec.labels.iter().any(|l| l.name() == label) {
            return Err(ValidationError::UnknownStratificationLabel {
                field: field.to_string(),
                label: label.clone(),
            });
        }
    }

    let reports = &split.reports;
    for name in reports.data_splits.iter().chain(&reports.encoding).chain(&reports.models) {
        if !spec.reports.contains_key(name) {
            return Err(ValidationError::UnknownReport {
                field: format!("{field}.reports"),
                name: name.clone(),
            });
        }
    }
    Ok(())
}
