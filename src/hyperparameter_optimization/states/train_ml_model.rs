use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::assessment::HPAssessmentState;
use super::item::HPItem;
use super::label::HPLabelState;
use crate::data::{Dataset, LabelConfiguration};
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{
    check_name, find_item_dir_clash, Aggregation, GridSearch, HPOptimizationStrategy, HPSetting,
    SplitConfig,
};
use crate::pool::host_cores;
use crate::metrics::{Metric, DEFAULT_OPTIMIZATION_METRIC};
use crate::registry::Registry;
use crate::reports::{Report, ReportContext, ReportResult};

/// How outer splits are dispatched
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One split after another on the calling thread
    #[default]
    Sequential,
    /// One task per split on a local worker pool, merged afterwards
    Parallel,
}

/// Ledger of a whole nested cross-validation run
///
/// Owned by the caller and passed by mutable reference through the
/// assessment and selection loops, which append to it. In parallel mode each
/// worker owns a clone seeded from the same initial state and the partial
/// ledgers are joined with [`TrainMLModelState::combine`].
#[derive(Clone, Debug)]
pub struct TrainMLModelState {
    pub name: String,
    pub dataset: Dataset,
    pub label_configuration: LabelConfiguration,
    pub hp_settings: Vec<HPSetting>,
    pub hp_strategy: Arc<dyn HPOptimizationStrategy>,
    pub assessment: SplitConfig,
    pub selection: SplitConfig,
    pub metrics: BTreeSet<Metric>,
    pub optimization_metric: Metric,
    pub aggregation: Aggregation,
    pub path: PathBuf,
    /// Cores given to every training call
    pub number_of_processes: usize,
    pub refit_optimal_model: bool,
    pub execution: ExecutionMode,
    pub max_workers: Option<usize>,
    pub seed: u64,
    pub registry: Arc<Registry>,
    /// Instruction-level reports, run on the finished ledger
    pub reports: IndexMap<String, Arc<dyn Report>>,
    pub context: ReportContext,
    pub assessment_states: Vec<HPAssessmentState>,
    /// Label -> item of the overall optimal model
    pub optimal_hp_items: IndexMap<String, HPItem>,
    /// Label -> directory the overall optimal model was exported to
    pub optimal_hp_item_paths: IndexMap<String, PathBuf>,
    pub report_results: Vec<ReportResult>,
}

impl TrainMLModelState {
    pub fn builder(
        dataset: Dataset,
        label_configuration: LabelConfiguration,
        registry: Arc<Registry>,
    ) -> TrainMLModelStateBuilder {
        TrainMLModelStateBuilder::new(dataset, label_configuration, registry)
    }

    /// Assessment state of outer split `split_index`
    pub fn assessment_state(&self, split_index: usize) -> Result<&HPAssessmentState> {
        self.assessment_states
            .iter()
            .find(|s| s.split_index == split_index)
            .ok_or(Error::MissingSplit(split_index))
    }

    pub fn assessment_state_mut(&mut self, split_index: usize) -> Result<&mut HPAssessmentState> {
        self.assessment_states
            .iter_mut()
            .find(|s| s.split_index == split_index)
            .ok_or(Error::MissingSplit(split_index))
    }

    pub fn label_state_mut(&mut self, split_index: usize, label: &str) -> Result<&mut HPLabelState> {
        self.assessment_state_mut(split_index)?.label_state_mut(label)
    }

    /// Metrics computed for every item: the configured ones plus the optimization metric
    pub fn all_metrics(&self) -> BTreeSet<Metric> {
        let mut metrics = self.metrics.clone();
        metrics.insert(self.optimization_metric);
        metrics
    }

    /// Fold a partial ledger from another worker into this one
    ///
    /// Lists are concatenated (settings only when not already present);
    /// maps are unioned with `other` winning on key collisions.
    pub fn merge(&mut self, other: TrainMLModelState) {
        for setting in other.hp_settings {
            if !self.hp_settings.contains(&setting) {
                self.hp_settings.push(setting);
            }
        }
        self.metrics.extend(other.metrics);
        self.context.extend(other.context);
        self.reports.extend(other.reports);
        self.optimal_hp_items.extend(other.optimal_hp_items);
        self.optimal_hp_item_paths.extend(other.optimal_hp_item_paths);
        self.assessment_states.extend(other.assessment_states);
        self.report_results.extend(other.report_results);
    }

    /// Join partial ledgers; assessment states end up ordered by split index
    pub fn combine(states: Vec<TrainMLModelState>) -> Result<TrainMLModelState> {
        let mut states = states.into_iter();
        let Some(mut combined) = states.next() else {
            return Err(Error::Data("no states to combine".to_string()));
        };
        for state in states {
            combined.merge(state);
        }
        combined.assessment_states.sort_by_key(|s| s.split_index);
        Ok(combined)
    }

    /// Root output directory of the run (`path/name`)
    pub fn result_path(&self) -> PathBuf {
        self.path.join(&self.name)
    }
}

/// Builder for [`TrainMLModelState`]
#[derive(Debug)]
pub struct TrainMLModelStateBuilder {
    state: TrainMLModelState,
}

impl TrainMLModelStateBuilder {
    fn new(dataset: Dataset, label_configuration: LabelConfiguration, registry: Arc<Registry>) -> Self {
        let mut context = ReportContext::new();
        context.insert("dataset".into(), dataset.name().into());
        context.insert("labels".into(), label_configuration.label_names().into());
        Self {
            state: TrainMLModelState {
                name: "result".to_string(),
                dataset,
                label_configuration,
                hp_settings: Vec::new(),
                hp_strategy: Arc::new(GridSearch),
                assessment: SplitConfig::k_fold(5),
                selection: SplitConfig::k_fold(5),
                metrics: BTreeSet::new(),
                optimization_metric: DEFAULT_OPTIMIZATION_METRIC,
                aggregation: Aggregation::default(),
                path: PathBuf::from("."),
                number_of_processes: 1,
                refit_optimal_model: false,
                execution: ExecutionMode::default(),
                max_workers: None,
                seed: 42,
                registry,
                reports: IndexMap::new(),
                context,
                assessment_states: Vec::new(),
                optimal_hp_items: IndexMap::new(),
                optimal_hp_item_paths: IndexMap::new(),
                report_results: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.state.name = name.into();
        self
    }

    pub fn settings(mut self, settings: Vec<HPSetting>) -> Self {
        self.state.hp_settings = settings;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn HPOptimizationStrategy>) -> Self {
        self.state.hp_strategy = strategy;
        self
    }

    pub fn assessment(mut self, config: SplitConfig) -> Self {
        self.state.assessment = config;
        self
    }

    pub fn selection(mut self, config: SplitConfig) -> Self {
        self.state.selection = config;
        self
    }

    pub fn metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.state.metrics = metrics.into_iter().collect();
        self
    }

    pub fn optimization_metric(mut self, metric: Metric) -> Self {
        self.state.optimization_metric = metric;
        self
    }

    pub fn aggregation(mut self, aggregation: Aggregation) -> Self {
        self.state.aggregation = aggregation;
        self
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.state.path = path.as_ref().to_path_buf();
        self
    }

    pub fn number_of_processes(mut self, n: usize) -> Self {
        self.state.number_of_processes = n;
        self
    }

    pub fn refit_optimal_model(mut self, refit: bool) -> Self {
        self.state.refit_optimal_model = refit;
        self
    }

    pub fn execution(mut self, execution: ExecutionMode) -> Self {
        self.state.execution = execution;
        self
    }

    pub fn max_workers(mut self, max_workers: Option<usize>) -> Self {
        self.state.max_workers = max_workers;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.state.seed = seed;
        self
    }

    pub fn report(mut self, report: Arc<dyn Report>) -> Self {
        self.state.reports.insert(report.name().to_string(), report);
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.state.context.insert(key.into(), value);
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<TrainMLModelState> {
        let mut state = self.state;
        if state.label_configuration.is_empty() {
            return Err(Error::config("labels", "at least one label is required"));
        }
        if state.hp_settings.is_empty() {
            return Err(Error::config("settings", "at least one hyperparameter setting is required"));
        }
        for name in state.label_configuration.label_names() {
            if let Some(problem) = check_name(name) {
                return Err(Error::config("labels", format!("label name '{name}' {problem}")));
            }
        }
        let mut seen = HashSet::new();
        for setting in &state.hp_settings {
            for name in setting.names() {
                if let Some(problem) = check_name(name) {
                    return Err(Error::config("settings", format!("name '{name}' {problem}")));
                }
            }
            if !seen.insert(setting) {
                return Err(Error::config(
                    "settings",
                    format!("setting '{setting}' is declared more than once"),
                ));
            }
        }
        let labels = state.label_configuration.label_names();
        let keys: Vec<String> = state.hp_settings.iter().map(HPSetting::key).collect();
        if let Some(clash) = find_item_dir_clash(&labels, &keys) {
            return Err(Error::config("settings", clash));
        }

        let cores = host_cores();
        if state.number_of_processes == 0 {
            tracing::warn!("number_of_processes is 0, using 1");
            state.number_of_processes = 1;
        } else if state.number_of_processes > cores {
            tracing::warn!(
                number_of_processes = state.number_of_processes,
                host_cores = cores,
                "number_of_processes exceeds the host cores, using the host cores"
            );
            state.number_of_processes = cores;
        }
        Ok(state)
    }
}
