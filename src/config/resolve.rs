//! Resolving a run description into a [`TrainMLModelState`]
//!
//! Recoverable problems are replaced by their documented default and logged
//! with `warn!`; everything else is an error.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use crate::config::schema::{LabelSpec, SplitSpec, TrainMLModelSpec};
use crate::config::validate::validate_config;
use crate::data::{Dataset, Label, LabelConfiguration};
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{HPSetting, SplitConfig, TrainMLModelState};
use crate::metrics::Metric;
use crate::registry::Registry;
use crate::reports::{Report, ReportConfig};

impl TrainMLModelSpec {
    /// Labels with their classes, inferring missing classes from `dataset`
    pub fn label_configuration(&self, dataset: &Dataset) -> Result<LabelConfiguration> {
        let mut config = LabelConfiguration::default();
        for spec in &self.labels {
            let label = match spec {
                LabelSpec::Name(name) => infer_label(dataset, name)?,
                LabelSpec::Detailed { name, values, positive_class } => {
                    let mut label = if values.is_empty() {
                        infer_label(dataset, name)?
                    } else {
                        Label::new(name.clone(), values.iter().cloned())
                    };
                    if let Some(class) = positive_class {
                        if !label.values.contains(class) {
                            return Err(Error::config(
                                format!("labels.{name}.positive_class"),
                                format!("'{class}' is not one of {:?}", label.values),
                            ));
                        }
                        label = label.with_positive_class(class.clone());
                    }
                    label
                }
            };
            config.add_label(label);
        }
        Ok(config)
    }

    /// Settings in declaration order
    pub fn hp_settings(&self) -> Result<Vec<HPSetting>> {
        self.settings
            .iter()
            .map(|setting| {
                let encoder = self
                    .encodings
                    .get(&setting.encoding)
                    .ok_or_else(|| undefined("settings.encoding", &setting.encoding))?;
                let method = self
                    .ml_methods
                    .get(&setting.ml_method)
                    .ok_or_else(|| undefined("settings.ml_method", &setting.ml_method))?;
                let hp_setting = HPSetting::new(
                    setting.encoding.clone(),
                    encoder.clone(),
                    setting.ml_method.clone(),
                    method.clone(),
                );
                match &setting.preprocessing {
                    None => Ok(hp_setting),
                    Some(name) => {
                        let sequence = self
                            .preprocessing_sequences
                            .get(name)
                            .ok_or_else(|| undefined("settings.preprocessing", name))?;
                        Ok(hp_setting.with_preprocessing(name.clone(), sequence.clone()))
                    }
                }
            })
            .collect()
    }

    /// Optimization metric, falling back to `balanced_accuracy` when unknown
    pub fn resolved_optimization_metric(&self) -> Metric {
        Metric::parse_or_default(&self.optimization_metric)
    }

    /// Additional metrics; unknown names are dropped with a warning
    pub fn resolved_metrics(&self) -> BTreeSet<Metric> {
        self.metrics
            .iter()
            .filter_map(|name| match name.parse::<Metric>() {
                Ok(metric) => Some(metric),
                Err(_) => {
                    tracing::warn!(metric = %name, "unknown metric dropped");
                    None
                }
            })
            .collect()
    }

    /// Split configuration for `field` (`assessment` or `selection`)
    pub fn split_config(
        &self,
        split: &SplitSpec,
        field: &str,
        registry: &Registry,
    ) -> Result<SplitConfig> {
        let strategy = split.split_strategy;
        let split_count = match split.split_count {
            None => strategy.default_split_count(),
            Some(count) if count < strategy.min_split_count() => {
                let fallback = strategy.default_split_count();
                tracing::warn!(
                    field,
                    split_count = count,
                    strategy = %strategy,
                    fallback,
                    "split_count below the strategy minimum, using the default"
                );
                fallback
            }
            Some(count) => count,
        };
        let reports = ReportConfig {
            data_split_reports: self.build_reports(&split.reports.data_splits, registry)?,
            encoding_reports: self.build_reports(&split.reports.encoding, registry)?,
            model_reports: self.build_reports(&split.reports.models, registry)?,
        };
        Ok(SplitConfig {
            split_strategy: strategy,
            split_count,
            training_percentage: split.training_percentage,
            stratify_by: split.stratify_by.clone(),
            seed: split.seed.unwrap_or(self.seed),
            reports,
        })
    }

    fn build_reports(&self, names: &[String], registry: &Registry) -> Result<Vec<Arc<dyn Report>>> {
        names
            .iter()
            .map(|name| {
                let spec = self.reports.get(name).ok_or_else(|| {
                    Error::config("reports", format!("report '{name}' is not defined"))
                })?;
                registry.report(spec)
            })
            .collect()
    }

    /// Check that every referenced component kind is registered
    fn check_components(&self, registry: &Registry) -> Result<()> {
        for spec in self.encodings.values() {
            if !registry.has_encoder(&spec.kind) {
                return Err(Error::UnknownComponent { kind: "encoder", name: spec.kind.clone() });
            }
        }
        for spec in self.ml_methods.values() {
            if !registry.has_ml_method(&spec.kind) {
                return Err(Error::UnknownComponent { kind: "ML method", name: spec.kind.clone() });
            }
        }
        for spec in self.preprocessing_sequences.values().flatten() {
            if !registry.has_preprocessor(&spec.kind) {
                return Err(Error::UnknownComponent {
                    kind: "preprocessor",
                    name: spec.kind.clone(),
                });
            }
        }
        for spec in self.reports.values() {
            if !registry.has_report(&spec.kind) {
                return Err(Error::UnknownComponent { kind: "report", name: spec.kind.clone() });
            }
        }
        Ok(())
    }

    /// Build the ledger for a run on `dataset`, writing under `path`
    pub fn build_state(
        &self,
        dataset: Dataset,
        registry: Arc<Registry>,
        path: impl AsRef<Path>,
    ) -> Result<TrainMLModelState> {
        validate_config(self)?;
        self.check_components(&registry)?;

        let labels = self.label_configuration(&dataset)?;
        let settings = self.hp_settings()?;
        let assessment = self.split_config(&self.assessment, "assessment", &registry)?;
        let selection = self.split_config(&self.selection, "selection", &registry)?;
        let instruction_reports = self.build_reports(&self.instruction_reports, &registry)?;

        let mut builder = TrainMLModelState::builder(dataset, labels, Arc::clone(&registry))
            .name(self.name.clone())
            .settings(settings)
            .assessment(assessment)
            .selection(selection)
            .metrics(self.resolved_metrics())
            .optimization_metric(self.resolved_optimization_metric())
            .aggregation(self.aggregation)
            .path(path)
            .number_of_processes(self.number_of_processes)
            .refit_optimal_model(self.refit_optimal_model)
            .execution(self.execution)
            .max_workers(self.max_workers)
            .seed(self.seed);
        for report in instruction_reports {
            builder = builder.report(report);
        }
        builder.build()
    }
}

fn undefined(field: &str, name: &str) -> Error {
    Error::config(field, format!("'{name}' is not defined"))
}

fn infer_label(dataset: &Dataset, name: &str) -> Result<Label> {
    let classes = dataset.class_counts(name)?;
    Ok(Label::new(name, classes.into_keys()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RandomDatasetBuilder;
    use crate::hyperparameter_optimization::SplitStrategy;

    const YAML: &str = r#"
name: study
labels:
  - status
encodings:
  kmer:
    type: KmerFrequency
    params:
      k: 3
ml_methods:
  centroid:
    type: NearestCentroid
preprocessing_sequences:
  dedup:
    - type: DuplicateSequenceFilter
reports:
  summary:
    type: DatasetSummary
  overview:
    type: PerformanceOverview
settings:
  - encoding: kmer
    ml_method: centroid
  - encoding: kmer
    ml_method: centroid
    preprocessing: dedup
assessment:
  split_strategy: k_fold
  split_count: 1
  reports:
    data_splits: [summary]
selection:
  split_strategy: random
  split_count: 2
  training_percentage: 0.5
optimization_metric: not_a_metric
metrics: [accuracy, bogus, auc]
instruction_reports: [overview]
number_of_processes: 0
"#;

    fn dataset() -> Dataset {
        RandomDatasetBuilder::new(12).label("status", ["healthy", "sick"]).seed(3).build("d")
    }

    #[test]
    fn test_build_state_applies_fallbacks() {
        let spec = TrainMLModelSpec::from_yaml_str(YAML).unwrap();
        let state = spec
            .build_state(dataset(), Arc::new(Registry::with_builtins()), "/tmp/out")
            .unwrap();
        assert_eq!(state.name, "study");
        assert_eq!(state.optimization_metric, Metric::BalancedAccuracy);
        assert_eq!(state.metrics, BTreeSet::from([Metric::Accuracy, Metric::Auc]));
        assert_eq!(state.assessment.split_strategy, SplitStrategy::KFold);
        assert_eq!(state.assessment.split_count, 5);
        assert_eq!(state.assessment.reports.data_split_reports.len(), 1);
        assert_eq!(state.selection.split_count, 2);
        assert_eq!(state.selection.seed, 42);
        assert_eq!(state.number_of_processes, 1);
        assert!(state.reports.contains_key("PerformanceOverview"));
    }

    #[test]
    fn test_settings_resolve_in_order() {
        let spec = TrainMLModelSpec::from_yaml_str(YAML).unwrap();
        let settings = spec.hp_settings().unwrap();
        assert_eq!(settings[0].key(), "kmer_centroid");
        assert_eq!(settings[1].key(), "dedup_kmer_centroid");
        assert_eq!(settings[1].preprocessing.len(), 1);
    }

    #[test]
    fn test_labels_inferred_from_dataset() {
        let spec = TrainMLModelSpec::from_yaml_str(YAML).unwrap();
        let labels = spec.label_configuration(&dataset()).unwrap();
        assert_eq!(labels.get("status").unwrap().values, vec!["healthy", "sick"]);
    }

    #[test]
    fn test_unknown_positive_class_is_rejected() {
        let yaml = YAML.replace(
            "  - status\n",
            "  - name: status\n    positive_class: ill\n",
        );
        let spec = TrainMLModelSpec::from_yaml_str(&yaml).unwrap();
        let err = spec.label_configuration(&dataset()).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_unregistered_kind_is_reported() {
        let yaml = YAML.replace("type: NearestCentroid", "type: RandomForest");
        let spec = TrainMLModelSpec::from_yaml_str(&yaml).unwrap();
        let err = spec
            .build_state(dataset(), Arc::new(Registry::with_builtins()), "/tmp/out")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { kind: "ML method", .. }));
    }
}
