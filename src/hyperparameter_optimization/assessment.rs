//! Outer loop: assessment splits, selection and retraining

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use super::selection::HPSelection;
use super::setting::HPSetting;
use super::states::{ExecutionMode, HPAssessmentState, HPItem, TrainMLModelState};
use super::util::HPUtil;
use crate::data::{Dataset, Label};
use crate::error::{Error, Result};
use crate::pool::{host_cores, local_pool};
use crate::reports::{self, create_dir};
use crate::workflows::MLProcess;

/// Number of splits run at once in parallel mode
///
/// Each worker trains with `number_of_processes` cores (never more than the
/// host has), so the pool is capped at `host_cores / number_of_processes`
/// workers (at least one).
pub fn worker_count(
    n_splits: usize,
    number_of_processes: usize,
    max_workers: Option<usize>,
    host_cores: usize,
) -> usize {
    let host_cores = host_cores.max(1);
    let by_cores = (host_cores / number_of_processes.clamp(1, host_cores)).max(1);
    let mut workers = n_splits.min(by_cores);
    if let Some(max) = max_workers {
        workers = workers.min(max);
    }
    workers.max(1)
}

/// Nested cross-validation driver
pub struct HPAssessment;

impl HPAssessment {
    /// Run every outer split and return the filled ledger
    ///
    /// Output goes to `state.path/state.name`, which becomes the new
    /// `state.path`.
    pub fn run_assessment(mut state: TrainMLModelState) -> Result<TrainMLModelState> {
        state.path = state.result_path();
        create_dir(&state.path)?;

        let (train_val_datasets, test_datasets) =
            HPUtil::split_data(&state.dataset, &state.assessment, &state.label_configuration)?;
        let n_splits = train_val_datasets.len();
        tracing::info!(
            name = %state.name,
            splits = n_splits,
            settings = state.hp_settings.len(),
            labels = state.label_configuration.len(),
            execution = ?state.execution,
            "starting nested cross-validation"
        );

        match state.execution {
            ExecutionMode::Sequential => {
                for (index, (train_val, test)) in
                    train_val_datasets.into_iter().zip(test_datasets).enumerate()
                {
                    Self::run_assessment_split(&mut state, train_val, test, index, n_splits)?;
                }
                Ok(state)
            }
            ExecutionMode::Parallel => {
                let workers = worker_count(
                    n_splits,
                    state.number_of_processes,
                    state.max_workers,
                    host_cores(),
                );
                tracing::debug!(workers, "dispatching outer splits to worker pool");
                let pool = local_pool(workers)?;
                let splits: Vec<(Dataset, Dataset)> =
                    train_val_datasets.into_iter().zip(test_datasets).collect();
                let seed_state = &state;
                let results: Vec<Result<TrainMLModelState>> = pool.install(|| {
                    splits
                        .into_par_iter()
                        .enumerate()
                        .map(|(index, (train_val, test))| {
                            let mut worker_state = seed_state.clone();
                            Self::run_assessment_split(
                                &mut worker_state,
                                train_val,
                                test,
                                index,
                                n_splits,
                            )?;
                            Ok(worker_state)
                        })
                        .collect()
                });
                let states = results.into_iter().collect::<Result<Vec<_>>>()?;
                Self::combine_states(states)
            }
        }
    }

    /// Merge partial ledgers produced by independent workers
    pub fn combine_states(states: Vec<TrainMLModelState>) -> Result<TrainMLModelState> {
        TrainMLModelState::combine(states)
    }

    /// Path of outer split `split_index` (`split_{i+1}`)
    pub fn assessment_path(state: &TrainMLModelState, split_index: usize) -> PathBuf {
        state.path.join(format!("split_{}", split_index + 1))
    }

    /// Selection, retraining and data reports for one outer split
    pub fn run_assessment_split(
        state: &mut TrainMLModelState,
        train_val_dataset: Dataset,
        test_dataset: Dataset,
        split_index: usize,
        n_splits: usize,
    ) -> Result<()> {
        tracing::info!(split = split_index + 1, total = n_splits, "outer split started");
        let path = Self::assessment_path(state, split_index);
        create_dir(&path)?;

        state.assessment_states.push(HPAssessmentState::new(
            split_index,
            train_val_dataset.clone(),
            test_dataset.clone(),
            path.clone(),
            &state.label_configuration,
        ));

        HPSelection::run_selection(state, &train_val_dataset, &path, split_index)?;
        Self::run_assessment_split_per_label(state, split_index)?;

        let data_reports = &state.assessment.reports.data_split_reports;
        let train_reports = reports::run_data_reports(
            &train_val_dataset,
            data_reports,
            &path.join("data_report_train"),
            &state.context,
        )
        .map_err(|e| e.in_split(split_index, None, None))?;
        let test_reports = reports::run_data_reports(
            &test_dataset,
            data_reports,
            &path.join("data_report_test"),
            &state.context,
        )
        .map_err(|e| e.in_split(split_index, None, None))?;
        let assessment_state = state.assessment_state_mut(split_index)?;
        assessment_state.train_val_data_reports = train_reports;
        assessment_state.test_data_reports = test_reports;

        tracing::info!(split = split_index + 1, total = n_splits, "outer split finished");
        Ok(())
    }

    /// Retrain every setting for every label on the full train/validation data
    pub fn run_assessment_split_per_label(
        state: &mut TrainMLModelState,
        split_index: usize,
    ) -> Result<()> {
        let labels: Vec<Label> = state.label_configuration.labels().to_vec();
        let n_labels = labels.len();
        let (path, train_val_dataset, test_dataset) = {
            let assessment_state = state.assessment_state(split_index)?;
            (
                assessment_state.path.clone(),
                assessment_state.train_val_dataset.clone(),
                assessment_state.test_dataset.clone(),
            )
        };

        for (position, label) in labels.iter().enumerate() {
            tracing::info!(
                split = split_index + 1,
                label = %label.name,
                progress = format!("{}/{n_labels}", position + 1),
                "retraining settings"
            );
            let optimal = state
                .assessment_state(split_index)?
                .label_state(&label.name)?
                .optimal_hp_setting
                .clone();
            let settings = state.hp_settings.clone();
            for setting in &settings {
                let is_optimal = optimal.as_ref() == Some(setting);
                let setting_path = path.join(setting.item_dir_name(&label.name, is_optimal));
                let item = Self::reeval_on_assessment_split(
                    state,
                    &train_val_dataset,
                    &test_dataset,
                    setting,
                    &setting_path,
                    label,
                    split_index,
                )?;
                state
                    .label_state_mut(split_index, &label.name)?
                    .assessment_items
                    .insert(setting.clone(), item);
            }
            tracing::info!(
                split = split_index + 1,
                label = %label.name,
                "retraining finished"
            );
        }
        Ok(())
    }

    /// Fit `hp_setting` on `train_val_dataset` and evaluate it on `test_dataset`
    pub fn reeval_on_assessment_split(
        state: &TrainMLModelState,
        train_val_dataset: &Dataset,
        test_dataset: &Dataset,
        hp_setting: &HPSetting,
        path: &Path,
        label: &Label,
        split_index: usize,
    ) -> Result<HPItem> {
        MLProcess::new(train_val_dataset, Some(test_dataset), label, hp_setting, &state.registry)
            .with_metrics(state.metrics.iter().copied())
            .with_optimization_metric(state.optimization_metric)
            .with_path(path)
            .with_reports(
                state.assessment.reports.encoding_reports.clone(),
                state.assessment.reports.model_reports.clone(),
            )
            .with_number_of_processes(state.number_of_processes)
            .with_context(state.context.clone())
            .with_seed(state.seed)
            .run(split_index)
            .map_err(|e: Error| {
                let key = hp_setting.key();
                e.in_split(split_index, Some(label.name.as_str()), Some(key.as_str()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_count_respects_cores() {
        assert_eq!(worker_count(5, 2, None, 8), 4);
        assert_eq!(worker_count(3, 2, None, 8), 3);
        assert_eq!(worker_count(5, 16, None, 8), 1);
        assert_eq!(worker_count(5, 1, Some(2), 8), 2);
        assert_eq!(worker_count(0, 1, None, 8), 1);
    }

    #[test]
    fn test_worker_count_never_oversubscribes() {
        for cores in 1..=16 {
            for processes in 1..=cores {
                let workers = worker_count(32, processes, None, cores);
                assert!(workers * processes <= cores);
            }
        }
    }

    #[test]
    fn test_worker_count_with_more_processes_than_cores() {
        assert_eq!(worker_count(5, 64, None, 4), 1);
        assert_eq!(worker_count(5, 3, Some(4), 0), 1);
    }
}
