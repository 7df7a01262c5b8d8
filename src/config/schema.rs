//! YAML/JSON schema for a nested cross-validation run
//!
//! Components are declared once under a name (`encodings`, `ml_methods`,
//! `preprocessing_sequences`, `reports`) and referenced by that name from
//! `settings` and the split specs.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use crate::hyperparameter_optimization::{
    Aggregation, ComponentSpec, ExecutionMode, MLMethodSpec, SplitStrategy,
};

/// Deserialize a bool from either a YAML boolean (`true`) or a quoted string (`"true"`).
fn deserialize_bool_lenient<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(b) => Ok(b),
        BoolOrString::Str(s) => match s.to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected 'true' or 'false', got '{other}'"
            ))),
        },
    }
}

/// Complete description of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainMLModelSpec {
    /// Output directory name under the result path
    #[serde(default = "default_name")]
    pub name: String,

    /// Labels to learn, in declaration order
    pub labels: Vec<LabelSpec>,

    /// Named encoders
    #[serde(default)]
    pub encodings: IndexMap<String, ComponentSpec>,

    /// Named ML methods
    #[serde(default)]
    pub ml_methods: IndexMap<String, MLMethodSpec>,

    /// Named preprocessing sequences
    #[serde(default)]
    pub preprocessing_sequences: IndexMap<String, Vec<ComponentSpec>>,

    /// Named reports, referenced from split specs and `instruction_reports`
    #[serde(default)]
    pub reports: IndexMap<String, ComponentSpec>,

    /// Candidate settings, in tie-break order
    pub settings: Vec<SettingRef>,

    /// Outer loop splitting
    #[serde(default)]
    pub assessment: SplitSpec,

    /// Inner loop splitting
    #[serde(default)]
    pub selection: SplitSpec,

    /// Metric that ranks settings; unknown names fall back to `balanced_accuracy`
    #[serde(default = "default_optimization_metric")]
    pub optimization_metric: String,

    /// Additional metrics computed for every model; unknown names are dropped
    #[serde(default)]
    pub metrics: Vec<String>,

    /// Reports run on the finished run
    #[serde(default)]
    pub instruction_reports: Vec<String>,

    /// Cores given to each training call
    #[serde(default = "default_number_of_processes")]
    pub number_of_processes: usize,

    /// Refit the overall optimal setting on the full dataset
    #[serde(default, deserialize_with = "deserialize_bool_lenient")]
    pub refit_optimal_model: bool,

    #[serde(default)]
    pub aggregation: Aggregation,

    #[serde(default)]
    pub execution: ExecutionMode,

    /// Upper bound on concurrently processed outer splits
    #[serde(default)]
    pub max_workers: Option<usize>,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_name() -> String {
    "result".to_string()
}

fn default_optimization_metric() -> String {
    "balanced_accuracy".to_string()
}

fn default_number_of_processes() -> usize {
    1
}

fn default_seed() -> u64 {
    42
}

fn default_training_percentage() -> f64 {
    0.7
}

/// A label, either by name or with explicit classes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LabelSpec {
    /// Classes are inferred from the dataset
    Name(String),
    Detailed {
        name: String,
        /// Classes; inferred from the dataset when empty
        #[serde(default)]
        values: Vec<String>,
        #[serde(default)]
        positive_class: Option<String>,
    },
}

impl LabelSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }
}

/// A setting assembled from named components
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SettingRef {
    pub encoding: String,
    pub ml_method: String,
    #[serde(default)]
    pub preprocessing: Option<String>,
}

impl SettingRef {
    /// Same name the resolved setting will carry
    pub fn key(&self) -> String {
        match &self.preprocessing {
            Some(prep) => format!("{prep}_{}_{}", self.encoding, self.ml_method),
            None => format!("{}_{}", self.encoding, self.ml_method),
        }
    }
}

/// Splitting of one loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSpec {
    #[serde(default)]
    pub split_strategy: SplitStrategy,

    /// Folds or repetitions; the strategy default when absent or too small
    #[serde(default)]
    pub split_count: Option<usize>,

    #[serde(default = "default_training_percentage")]
    pub training_percentage: f64,

    #[serde(default)]
    pub stratify_by: Option<String>,

    /// Defaults to the run seed
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub reports: SplitReportsSpec,
}

impl Default for SplitSpec {
    fn default() -> Self {
        Self {
            split_strategy: SplitStrategy::default(),
            split_count: None,
            training_percentage: default_training_percentage(),
            stratify_by: None,
            seed: None,
            reports: SplitReportsSpec::default(),
        }
    }
}

/// Report names attached to the splits of one loop
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReportsSpec {
    /// Run on every train and test subset
    #[serde(default)]
    pub data_splits: Vec<String>,
    /// Run on every encoded train and test subset
    #[serde(default)]
    pub encoding: Vec<String>,
    /// Run on every fitted model
    #[serde(default)]
    pub models: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
name: kmer_study
labels:
  - status
  - name: hla
    values: [A, B]
    positive_class: B
encodings:
  kmer3:
    type: KmerFrequency
    params:
      k: 3
ml_methods:
  centroid:
    type: NearestCentroid
  logreg:
    type: LogisticRegression
    params:
      l2_penalty: [0.0, 0.1]
    model_selection_cv: true
    model_selection_n_folds: 3
settings:
  - encoding: kmer3
    ml_method: centroid
  - encoding: kmer3
    ml_method: logreg
assessment:
  split_strategy: k_fold
  split_count: 3
refit_optimal_model: "true"
execution: parallel
"#;

    #[test]
    fn test_parse_full_spec() {
        let spec: TrainMLModelSpec = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(spec.name, "kmer_study");
        assert_eq!(spec.labels.len(), 2);
        assert_eq!(spec.labels[0], LabelSpec::Name("status".into()));
        assert_eq!(spec.labels[1].name(), "hla");
        assert_eq!(spec.settings[1].key(), "kmer3_logreg");
        assert!(spec.ml_methods["logreg"].model_selection_cv);
        assert_eq!(spec.ml_methods["centroid"].model_selection_n_folds, 5);
        assert_eq!(spec.assessment.split_strategy, SplitStrategy::KFold);
        assert_eq!(spec.assessment.split_count, Some(3));
        assert!(spec.refit_optimal_model);
        assert_eq!(spec.execution, ExecutionMode::Parallel);
    }

    #[test]
    fn test_defaults() {
        let spec: TrainMLModelSpec = serde_yaml::from_str(YAML).unwrap();
        assert_eq!(spec.optimization_metric, "balanced_accuracy");
        assert_eq!(spec.number_of_processes, 1);
        assert_eq!(spec.seed, 42);
        assert_eq!(spec.aggregation, Aggregation::Mean);
        assert_eq!(spec.selection, SplitSpec::default());
        assert!(spec.max_workers.is_none());
    }

    #[test]
    fn test_lenient_bool_rejects_garbage() {
        let yaml = YAML.replace("refit_optimal_model: \"true\"", "refit_optimal_model: \"maybe\"");
        assert!(serde_yaml::from_str::<TrainMLModelSpec>(&yaml).is_err());
    }

    #[test]
    fn test_preprocessing_key() {
        let setting = SettingRef {
            encoding: "kmer3".into(),
            ml_method: "centroid".into(),
            preprocessing: Some("dedup".into()),
        };
        assert_eq!(setting.key(), "dedup_kmer3_centroid");
    }
}
