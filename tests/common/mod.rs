//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use immuneml_hpo::data::{Dataset, Label, LabelConfiguration, RandomDatasetBuilder};
use immuneml_hpo::encoding::EncodedData;
use immuneml_hpo::hyperparameter_optimization::{
    ComponentSpec, ExecutionMode, HPSetting, MLMethodSpec, ParamReader, SplitConfig,
    TrainMLModelState,
};
use immuneml_hpo::metrics::Metric;
use immuneml_hpo::ml_methods::{Distance, MLMethod, NearestCentroid};
use immuneml_hpo::{Error, Registry, Result};

pub const LABEL: &str = "status";

/// Balanced two-class dataset with a learnable motif in the "sick" class
pub fn status_dataset(repertoires: usize) -> Dataset {
    RandomDatasetBuilder::new(repertoires)
        .sequence_count(8, 12)
        .sequence_length(8, 10)
        .label(LABEL, ["healthy", "sick"])
        .signal(LABEL, "sick", "WWW", 0.6)
        .seed(11)
        .build("status_data")
}

pub fn labels() -> LabelConfiguration {
    LabelConfiguration::single(Label::new(LABEL, ["healthy", "sick"]))
}

pub fn kmer() -> ComponentSpec {
    ComponentSpec::new("KmerFrequency").with_param("k", 3)
}

pub fn centroid_setting() -> HPSetting {
    HPSetting::new("kmer3", kmer(), "centroid", MLMethodSpec::new("NearestCentroid"))
}

pub fn logreg_setting() -> HPSetting {
    HPSetting::new(
        "kmer3",
        kmer(),
        "logreg",
        MLMethodSpec::new("LogisticRegression").with_param("max_iter", 100),
    )
}

/// Nearest centroid that refuses to fit on fewer than `min_examples` rows
#[derive(Debug)]
pub struct NeedsExamples {
    inner: NearestCentroid,
    min_examples: usize,
}

impl MLMethod for NeedsExamples {
    fn name(&self) -> &str {
        "NeedsExamples"
    }

    fn fit(&mut self, data: &EncodedData, label: &Label, cores: usize) -> Result<()> {
        if data.n_examples() < self.min_examples {
            return Err(Error::fit(
                "NeedsExamples",
                format!("needs {} examples, got {}", self.min_examples, data.n_examples()),
            ));
        }
        self.inner.fit(data, label, cores)
    }

    fn predict(&self, data: &EncodedData, label: &Label) -> Result<Vec<String>> {
        self.inner.predict(data, label)
    }

    fn classes(&self) -> &[String] {
        self.inner.classes()
    }

    fn get_params(&self) -> serde_json::Value {
        serde_json::json!({ "min_examples": self.min_examples, "centroids": self.inner.get_params() })
    }
}

/// Built-in registry plus the test-only `NeedsExamples` method
pub fn registry() -> Arc<Registry> {
    let mut registry = Registry::with_builtins();
    registry.register_ml_method("NeedsExamples", |params| {
        let reader = ParamReader::new("NeedsExamples", params);
        Ok(Box::new(NeedsExamples {
            inner: NearestCentroid::new(Distance::Euclidean),
            min_examples: reader.usize("min_examples", 0)?,
        }) as Box<dyn MLMethod>)
    });
    Arc::new(registry)
}

pub fn needs_examples_setting(min_examples: i64) -> HPSetting {
    HPSetting::new(
        "kmer3",
        kmer(),
        "picky",
        MLMethodSpec::new("NeedsExamples").with_param("min_examples", min_examples),
    )
}

/// 3 stratified outer folds, 2 stratified inner folds
pub fn state(
    dataset: Dataset,
    settings: Vec<HPSetting>,
    execution: ExecutionMode,
    path: &Path,
) -> TrainMLModelState {
    TrainMLModelState::builder(dataset, labels(), registry())
        .name("nested_cv")
        .settings(settings)
        .assessment(SplitConfig::stratified_k_fold(3, LABEL))
        .selection(SplitConfig::stratified_k_fold(2, LABEL))
        .metrics([Metric::Accuracy, Metric::F1Macro])
        .optimization_metric(Metric::BalancedAccuracy)
        .execution(execution)
        .path(path)
        .build()
        .unwrap()
}
