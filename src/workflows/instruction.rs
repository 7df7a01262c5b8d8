//! Top-level "train ML model" instruction

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::data::Label;
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{HPAssessment, HPItem, HPSetting, TrainMLModelState};
use crate::reports::{self, create_dir};
use crate::workflows::MLProcess;

/// Runs nested cross-validation, then picks, exports and reports the overall optimal models
#[derive(Debug)]
pub struct TrainMLModelInstruction {
    state: TrainMLModelState,
}

impl TrainMLModelInstruction {
    pub fn new(state: TrainMLModelState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &TrainMLModelState {
        &self.state
    }

    /// Run under `result_path/{name}` and return the finished ledger
    pub fn run(self, result_path: &Path) -> Result<TrainMLModelState> {
        let mut state = self.state;
        state.path = result_path.to_path_buf();
        let mut state = HPAssessment::run_assessment(state)?;

        let labels: Vec<Label> = state.label_configuration.labels().to_vec();
        for label in &labels {
            Self::export_optimal_model(&mut state, label)?;
        }

        let instruction_reports: Vec<_> = state.reports.values().cloned().collect();
        let results = reports::run_state_reports(
            &state,
            &instruction_reports,
            &state.path.join("reports"),
            &state.context,
        )?;
        state.report_results.extend(results);

        for label in &labels {
            Self::write_performances(&state, label)?;
        }
        Self::log_summary(&state);
        Ok(state)
    }

    /// Setting chosen most often across outer splits; ties go to the earliest split's choice
    pub fn overall_optimal_setting(state: &TrainMLModelState, label: &str) -> Option<HPSetting> {
        let mut votes: IndexMap<&HPSetting, usize> = IndexMap::new();
        for assessment in &state.assessment_states {
            let optimal = assessment
                .label_states
                .get(label)
                .and_then(|s| s.optimal_hp_setting.as_ref());
            if let Some(setting) = optimal {
                *votes.entry(setting).or_insert(0) += 1;
            }
        }
        let mut best: Option<(&HPSetting, usize)> = None;
        for (setting, count) in votes {
            if best.map_or(true, |(_, best_count)| count > best_count) {
                best = Some((setting, count));
            }
        }
        best.map(|(setting, _)| setting.clone())
    }

    fn export_optimal_model(state: &mut TrainMLModelState, label: &Label) -> Result<()> {
        let setting = Self::overall_optimal_setting(state, &label.name).ok_or_else(|| {
            Error::Data(format!("no optimal setting was selected for label '{}'", label.name))
        })?;
        let path = state.path.join(format!("optimal_{}", label.name));
        create_dir(&path)?;

        let item = if state.refit_optimal_model {
            tracing::info!(
                label = %label.name,
                setting = %setting,
                "refitting optimal setting on the full dataset"
            );
            MLProcess::new(&state.dataset, None, label, &setting, &state.registry)
                .with_metrics(state.metrics.iter().copied())
                .with_optimization_metric(state.optimization_metric)
                .with_number_of_processes(state.number_of_processes)
                .with_context(state.context.clone())
                .with_seed(state.seed)
                .run_refit()?
        } else {
            Self::first_optimal_item(state, &label.name, &setting)?
        };

        item.method.store(&path)?;
        let yaml = serde_yaml::to_string(&setting)?;
        let setting_file = path.join("hp_setting.yaml");
        fs::write(&setting_file, yaml)
            .map_err(|e| Error::io(format!("writing {}", setting_file.display()), e))?;

        state.optimal_hp_items.insert(label.name.clone(), item);
        state.optimal_hp_item_paths.insert(label.name.clone(), path);
        Ok(())
    }

    fn first_optimal_item(
        state: &TrainMLModelState,
        label: &str,
        setting: &HPSetting,
    ) -> Result<HPItem> {
        state
            .assessment_states
            .iter()
            .filter_map(|a| a.label_states.get(label))
            .find(|s| s.optimal_hp_setting.as_ref() == Some(setting))
            .and_then(|s| s.assessment_items.get(setting))
            .cloned()
            .ok_or_else(|| {
                Error::Data(format!(
                    "no assessment item for optimal setting '{setting}' of '{label}'"
                ))
            })
    }

    /// `{label}_performances.csv`: one row per setting, one column per outer split
    fn write_performances(state: &TrainMLModelState, label: &Label) -> Result<PathBuf> {
        let file = state.path.join(format!("{}_performances.csv", label.name));
        let mut writer = csv::Writer::from_path(&file)?;
        let mut header = vec!["hp_setting".to_string()];
        header.extend(
            state.assessment_states.iter().map(|a| format!("split_{}", a.split_index + 1)),
        );
        writer.write_record(&header)?;

        for setting in &state.hp_settings {
            let mut record = vec![setting.key()];
            record.extend(state.assessment_states.iter().map(|a| {
                a.label_states
                    .get(&label.name)
                    .and_then(|s| s.assessment_items.get(setting))
                    .and_then(HPItem::score)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| Error::io(format!("writing {}", file.display()), e))?;
        Ok(file)
    }

    fn log_summary(state: &TrainMLModelState) {
        for (label, item) in &state.optimal_hp_items {
            let scores: Vec<f64> = state
                .assessment_states
                .iter()
                .filter_map(|a| a.label_states.get(label))
                .filter_map(|s| s.assessment_items.get(&item.hp_setting))
                .filter_map(HPItem::score)
                .collect();
            let mean = if scores.is_empty() {
                f64::NAN
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            tracing::info!(
                label = %label,
                optimal = %item.hp_setting,
                metric = state.optimization_metric.name(),
                mean_test_score = mean,
                path = ?state.optimal_hp_item_paths.get(label),
                "optimal model"
            );
        }
    }
}
