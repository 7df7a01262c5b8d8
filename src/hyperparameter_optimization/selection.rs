//! Inner loop: pick the optimal setting per label for one outer split

use std::path::Path;

use indexmap::IndexMap;

use super::setting::HPSetting;
use super::states::{HPItem, HPSelectionState, TrainMLModelState};
use super::util::HPUtil;
use crate::data::{Dataset, Label};
use crate::error::{Error, Result};
use crate::reports::{self, ReportResult};
use crate::workflows::MLProcess;

/// Inner cross-validation over the train/validation part of an outer split
pub struct HPSelection;

impl HPSelection {
    /// Choose the optimal setting of every label for outer split `split_index`
    ///
    /// `train_val_dataset` is split again with the selection config. Every
    /// candidate setting is fitted on each inner train subset and scored on
    /// the matching validation subset; scores are aggregated and the
    /// strategy picks the optimum. A setting failing on any inner split is
    /// excluded with a warning. The result is written to the label states of
    /// the outer split, which must already be registered in `state`.
    pub fn run_selection(
        state: &mut TrainMLModelState,
        train_val_dataset: &Dataset,
        path: &Path,
        split_index: usize,
    ) -> Result<()> {
        let (train_datasets, val_datasets) =
            HPUtil::split_data(train_val_dataset, &state.selection, &state.label_configuration)
                .map_err(|e| e.in_split(split_index, None, None))?;
        let selection_path = path.join(format!("selection_{}", state.hp_strategy.name()));

        let (train_reports, val_reports) =
            Self::run_inner_data_reports(state, &train_datasets, &val_datasets, &selection_path)
                .map_err(|e| e.in_split(split_index, None, None))?;

        let labels: Vec<Label> = state.label_configuration.labels().to_vec();
        for label in &labels {
            let mut selection = HPSelectionState::new(
                train_datasets.clone(),
                val_datasets.clone(),
                selection_path.clone(),
            );
            selection.train_data_reports = train_reports.clone();
            selection.val_data_reports = val_reports.clone();

            let mut last_error = None;
            let candidates: Vec<_> =
                state.hp_strategy.candidates(&state.hp_settings).into_iter().cloned().collect();
            for setting in &candidates {
                match Self::evaluate_setting(state, &selection, label, setting, &selection_path) {
                    Ok(items) => {
                        let scores: Vec<f64> = items.iter().filter_map(HPItem::score).collect();
                        if let Some(score) = state.aggregation.aggregate(&scores) {
                            selection.performances.insert(setting.clone(), score);
                        }
                        selection.hp_items.insert(setting.clone(), items);
                    }
                    Err(err) => {
                        let key = setting.key();
                        let err =
                            err.in_split(split_index, Some(label.name.as_str()), Some(key.as_str()));
                        tracing::warn!(
                            error = %err,
                            "setting failed during selection, excluding it"
                        );
                        selection.failures.insert(setting.clone(), err.to_string());
                        last_error = Some(err);
                    }
                }
            }

            let optimal = Self::optimal(state, &selection.performances).ok_or_else(|| {
                let source = last_error.unwrap_or_else(|| {
                    Error::Data(format!("no setting produced a score for label '{}'", label.name))
                });
                Error::NoViableSetting {
                    label: label.name.clone(),
                    count: candidates.len(),
                    source: Box::new(source),
                }
                .in_split(split_index, Some(label.name.as_str()), None)
            })?;

            tracing::info!(
                split = split_index + 1,
                label = %label.name,
                optimal = %optimal,
                metric = state.optimization_metric.name(),
                score = selection.performances.get(&optimal).copied().unwrap_or(f64::NAN),
                "selected optimal setting"
            );
            selection.optimal_hp_setting = Some(optimal.clone());
            let label_state = state
                .label_state_mut(split_index, &label.name)
                .map_err(|e| e.in_split(split_index, Some(label.name.as_str()), None))?;
            label_state.optimal_hp_setting = Some(optimal);
            label_state.selection_state = selection;
        }
        Ok(())
    }

    fn optimal(
        state: &TrainMLModelState,
        performances: &IndexMap<HPSetting, f64>,
    ) -> Option<HPSetting> {
        state.hp_strategy.optimal(performances, state.optimization_metric).cloned()
    }

    fn evaluate_setting(
        state: &TrainMLModelState,
        selection: &HPSelectionState,
        label: &Label,
        setting: &HPSetting,
        selection_path: &Path,
    ) -> Result<Vec<HPItem>> {
        selection
            .train_datasets
            .iter()
            .zip(&selection.val_datasets)
            .enumerate()
            .map(|(inner, (train, val))| {
                let path = selection_path
                    .join(format!("split_{}", inner + 1))
                    .join(setting.item_dir_name(&label.name, false));
                MLProcess::new(train, Some(val), label, setting, &state.registry)
                    .with_metrics(state.metrics.iter().copied())
                    .with_optimization_metric(state.optimization_metric)
                    .with_path(path)
                    .with_reports(
                        state.selection.reports.encoding_reports.clone(),
                        state.selection.reports.model_reports.clone(),
                    )
                    .with_number_of_processes(state.number_of_processes)
                    .with_context(state.context.clone())
                    .with_seed(state.seed)
                    .run(inner)
            })
            .collect()
    }

    fn run_inner_data_reports(
        state: &TrainMLModelState,
        train_datasets: &[Dataset],
        val_datasets: &[Dataset],
        selection_path: &Path,
    ) -> Result<(Vec<ReportResult>, Vec<ReportResult>)> {
        let data_reports = &state.selection.reports.data_split_reports;
        let mut train_results = Vec::new();
        let mut val_results = Vec::new();
        if data_reports.is_empty() {
            return Ok((train_results, val_results));
        }
        for (inner, (train, val)) in train_datasets.iter().zip(val_datasets).enumerate() {
            let split_path = selection_path.join(format!("split_{}", inner + 1));
            train_results.extend(reports::run_data_reports(
                train,
                data_reports,
                &split_path.join("data_report_train"),
                &state.context,
            )?);
            val_results.extend(reports::run_data_reports(
                val,
                data_reports,
                &split_path.join("data_report_test"),
                &state.context,
            )?);
        }
        Ok((train_results, val_results))
    }
}
