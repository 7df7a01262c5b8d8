//! Fit and evaluate one setting for one label on one split

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;

use crate::data::{Dataset, Label, LabelConfiguration};
use crate::encoding::{EncodedData, EncoderParams};
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{HPItem, HPSetting, Params};
use crate::metrics::{Metric, Probabilities, DEFAULT_OPTIMIZATION_METRIC};
use crate::ml_methods::{fit_by_cross_validation, MLMethod, ParameterGrid};
use crate::pool::host_cores;
use crate::preprocessing::apply_preprocessing;
use crate::registry::Registry;
use crate::reports::{self, create_dir, Report, ReportContext, ReportResult};

/// One fit/evaluate unit
///
/// Preprocesses and encodes the train data (learning the encoder) and the
/// test data (reusing it), fits the setting's ML method for `label`,
/// evaluates every metric on the test data and writes artifacts under the
/// configured path. The result is returned as an [`HPItem`]; storing it in
/// the ledger is the caller's job.
#[derive(Debug)]
pub struct MLProcess<'a> {
    train_dataset: &'a Dataset,
    test_dataset: Option<&'a Dataset>,
    label: &'a Label,
    hp_setting: &'a HPSetting,
    registry: &'a Registry,
    metrics: BTreeSet<Metric>,
    optimization_metric: Metric,
    path: Option<PathBuf>,
    encoding_reports: Vec<Arc<dyn Report>>,
    model_reports: Vec<Arc<dyn Report>>,
    number_of_processes: usize,
    context: ReportContext,
    seed: u64,
}

/// Encoded train/test data of one run
struct Encoded {
    train: EncodedData,
    test: Option<EncodedData>,
}

/// Test-set evaluation of a fitted method
struct Evaluation {
    predictions: Vec<String>,
    probabilities: Option<Array2<f64>>,
    performance: std::collections::BTreeMap<Metric, f64>,
}

impl<'a> MLProcess<'a> {
    pub fn new(
        train_dataset: &'a Dataset,
        test_dataset: Option<&'a Dataset>,
        label: &'a Label,
        hp_setting: &'a HPSetting,
        registry: &'a Registry,
    ) -> Self {
        Self {
            train_dataset,
            test_dataset,
            label,
            hp_setting,
            registry,
            metrics: BTreeSet::new(),
            optimization_metric: DEFAULT_OPTIMIZATION_METRIC,
            path: None,
            encoding_reports: Vec::new(),
            model_reports: Vec::new(),
            number_of_processes: 1,
            context: ReportContext::new(),
            seed: 42,
        }
    }

    pub fn with_metrics(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.metrics = metrics.into_iter().collect();
        self
    }

    pub fn with_optimization_metric(mut self, metric: Metric) -> Self {
        self.optimization_metric = metric;
        self
    }

    /// Directory for artifacts; without one nothing is written
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_reports(
        mut self,
        encoding_reports: Vec<Arc<dyn Report>>,
        model_reports: Vec<Arc<dyn Report>>,
    ) -> Self {
        self.encoding_reports = encoding_reports;
        self.model_reports = model_reports;
        self
    }

    /// Cores available to the ML method's own parallelism
    pub fn with_number_of_processes(mut self, n: usize) -> Self {
        self.number_of_processes = n.clamp(1, host_cores());
        self
    }

    pub fn with_context(mut self, context: ReportContext) -> Self {
        self.context = context;
        self
    }

    /// Seed of method-internal cross-validation folds
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run and return the result; `split_index` is recorded on the item
    pub fn run(&self, split_index: usize) -> Result<HPItem> {
        self.run_inner(Some(split_index))
    }

    /// Fit on the full train dataset without a split (used for refits)
    pub fn run_refit(&self) -> Result<HPItem> {
        self.run_inner(None)
    }

    fn run_inner(&self, split_index: Option<usize>) -> Result<HPItem> {
        if let Some(path) = &self.path {
            create_dir(path)?;
        }
        let encoded = self.encode()?;
        let (encoding_train_results, encoding_test_results) = self.run_encoding_reports(&encoded)?;

        let (method, method_params) = self.fit(&encoded.train)?;
        let evaluation = match &encoded.test {
            Some(test) => Some(self.evaluate(method.as_ref(), test)?),
            None => None,
        };

        let mut item = HPItem {
            hp_setting: self.hp_setting.clone(),
            label: self.label.clone(),
            split_index,
            method: Arc::from(method),
            method_params,
            optimization_metric: self.optimization_metric,
            performance: evaluation.as_ref().map(|e| e.performance.clone()).unwrap_or_default(),
            path: self.path.clone(),
            model_path: None,
            test_predictions_path: None,
            performance_path: None,
            encoding_train_results,
            encoding_test_results,
            model_report_results: Vec::new(),
        };

        if let Some(path) = &self.path {
            item.model_path = Some(item.method.store(path)?);
            if let (Some(evaluation), Some(test)) = (&evaluation, &encoded.test) {
                item.test_predictions_path =
                    Some(self.write_predictions(path, test, evaluation, item.method.classes())?);
                item.performance_path = Some(self.write_performance(path, &item)?);
            }
            item.model_report_results = reports::run_model_reports(
                item.method.as_ref(),
                self.hp_setting,
                self.label,
                encoded.test.as_ref(),
                &self.model_reports,
                &path.join("ml_reports"),
                &self.context,
            )?;
        }

        tracing::debug!(
            setting = %self.hp_setting,
            label = %self.label.name,
            split = ?split_index.map(|i| i + 1),
            score = ?item.score(),
            "ml process finished"
        );
        Ok(item)
    }

    fn encode(&self) -> Result<Encoded> {
        let preprocessing = self.registry.preprocessing(&self.hp_setting.preprocessing)?;
        let train = apply_preprocessing(&preprocessing, self.train_dataset)?;
        let test = self.test_dataset.map(|d| apply_preprocessing(&preprocessing, d)).transpose()?;

        let label_configuration = LabelConfiguration::single(self.label.clone());
        let mut encoder = self.registry.encoder(&self.hp_setting.encoder)?;
        let train = encoder.encode(
            &train,
            &EncoderParams { label_configuration: &label_configuration, learn_model: true },
        )?;
        let test = test
            .map(|d| {
                let params =
                    EncoderParams { label_configuration: &label_configuration, learn_model: false };
                encoder.encode(&d, &params)
            })
            .transpose()?;
        Ok(Encoded { train, test })
    }

    fn run_encoding_reports(
        &self,
        encoded: &Encoded,
    ) -> Result<(Vec<ReportResult>, Vec<ReportResult>)> {
        let Some(path) = &self.path else {
            return Ok((Vec::new(), Vec::new()));
        };
        if self.encoding_reports.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let reports_path = path.join("encoding_reports");
        let train = reports::run_encoding_reports(
            &encoded.train,
            self.label,
            &self.encoding_reports,
            &reports_path.join("train"),
            &self.context,
        )?;
        let test = match &encoded.test {
            Some(test) => reports::run_encoding_reports(
                test,
                self.label,
                &self.encoding_reports,
                &reports_path.join("test"),
                &self.context,
            )?,
            None => Vec::new(),
        };
        Ok((train, test))
    }

    fn fit(&self, train: &EncodedData) -> Result<(Box<dyn MLMethod>, Params)> {
        let spec = &self.hp_setting.ml_method;
        let grid = ParameterGrid::new(&spec.params);
        let build = |params: &Params| self.registry.ml_method(&spec.kind, params);

        if grid.is_search() && spec.model_selection_cv {
            return fit_by_cross_validation(
                &build,
                &grid,
                train,
                self.label,
                spec.model_selection_n_folds,
                self.optimization_metric,
                self.number_of_processes,
                self.seed,
            );
        }
        if grid.is_search() {
            tracing::warn!(
                method = %spec.kind,
                candidates = grid.len(),
                "parameter grid given without model_selection_cv, using the first combination"
            );
        }
        let params = grid.first();
        let mut method = build(&params)?;
        method.fit(train, self.label, self.number_of_processes)?;
        Ok((method, params))
    }

    fn evaluate(&self, method: &dyn MLMethod, test: &EncodedData) -> Result<Evaluation> {
        let predictions = method.predict(test, self.label)?;
        let probabilities = method.predict_proba(test, self.label)?;
        let y_true = test.label_values(&self.label.name)?;

        let mut metrics = self.metrics.clone();
        metrics.insert(self.optimization_metric);
        let mut performance = std::collections::BTreeMap::new();
        for metric in metrics {
            let proba = probabilities
                .as_ref()
                .map(|values| Probabilities { values, classes: method.classes() });
            let value =
                metric.compute(y_true, &predictions, proba, self.label.positive_class())?;
            performance.insert(metric, value);
        }
        Ok(Evaluation { predictions, probabilities, performance })
    }

    fn write_predictions(
        &self,
        path: &Path,
        test: &EncodedData,
        evaluation: &Evaluation,
        classes: &[String],
    ) -> Result<PathBuf> {
        let file = path.join("test_predictions.csv");
        let mut writer = csv::Writer::from_path(&file)?;
        let label = &self.label.name;
        let mut header = vec![
            "example_id".to_string(),
            format!("{label}_true_class"),
            format!("{label}_predicted_class"),
        ];
        if evaluation.probabilities.is_some() {
            header.extend(classes.iter().map(|c| format!("{label}_{c}_proba")));
        }
        writer.write_record(&header)?;

        let y_true = test.label_values(label)?;
        for (row, id) in test.example_ids.iter().enumerate() {
            let mut record =
                vec![id.clone(), y_true[row].clone(), evaluation.predictions[row].clone()];
            if let Some(proba) = &evaluation.probabilities {
                record.extend(proba.row(row).iter().map(f64::to_string));
            }
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| Error::io(format!("writing {}", file.display()), e))?;
        Ok(file)
    }

    fn write_performance(&self, path: &Path, item: &HPItem) -> Result<PathBuf> {
        let file = path.join("performance.json");
        let body = serde_json::to_string_pretty(&item.summary())?;
        fs::write(&file, body).map_err(|e| Error::io(format!("writing {}", file.display()), e))?;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RandomDatasetBuilder;
    use crate::hyperparameter_optimization::{ComponentSpec, MLMethodSpec, ParamValue};
    use crate::reports::{DesignMatrixExporter, ModelParameters};

    fn datasets() -> (Dataset, Dataset) {
        let build = |n, seed| {
            RandomDatasetBuilder::new(n)
                .sequence_count(20, 30)
                .label("status", ["healthy", "sick"])
                .signal("status", "sick", "WWW", 0.6)
                .seed(seed)
                .build("d")
        };
        (build(20, 1), build(10, 2))
    }

    fn setting(method: MLMethodSpec) -> HPSetting {
        HPSetting::new(
            "kmer",
            ComponentSpec::new("KmerFrequency").with_param("k", 3),
            "ml",
            method,
        )
    }

    #[test]
    fn test_run_writes_artifacts_and_scores() {
        let (train, test) = datasets();
        let label = Label::new("status", ["healthy", "sick"]);
        let registry = Registry::with_builtins();
        let setting = setting(MLMethodSpec::new("LogisticRegression"));
        let dir = tempfile::tempdir().unwrap();
        let item = MLProcess::new(&train, Some(&test), &label, &setting, &registry)
            .with_metrics([Metric::Accuracy, Metric::Auc])
            .with_path(dir.path().join("run"))
            .with_reports(vec![Arc::new(DesignMatrixExporter)], vec![Arc::new(ModelParameters)])
            .run(0)
            .unwrap();

        assert_eq!(item.split_index, Some(0));
        assert_eq!(item.performance.len(), 3);
        assert!(item.score().is_some());
        let run = dir.path().join("run");
        assert!(run.join("test_predictions.csv").is_file());
        assert!(run.join("performance.json").is_file());
        assert!(run.join("LogisticRegression.json").is_file());
        assert!(run.join("encoding_reports/train/DesignMatrixExporter/design_matrix.csv").is_file());
        assert!(run.join("ml_reports/ModelParameters/model_parameters.json").is_file());

        let predictions = fs::read_to_string(run.join("test_predictions.csv")).unwrap();
        assert_eq!(predictions.lines().count(), 11);
        assert!(predictions.starts_with("example_id,status_true_class,status_predicted_class"));
    }

    #[test]
    fn test_refit_without_test_data_has_no_performance() {
        let (train, _) = datasets();
        let label = Label::new("status", ["healthy", "sick"]);
        let registry = Registry::with_builtins();
        let setting = setting(MLMethodSpec::new("NearestCentroid"));
        let item = MLProcess::new(&train, None, &label, &setting, &registry).run_refit().unwrap();
        assert!(item.split_index.is_none());
        assert!(item.performance.is_empty());
        assert!(item.path.is_none());
    }

    #[test]
    fn test_grid_with_model_selection_records_chosen_params() {
        let (train, test) = datasets();
        let label = Label::new("status", ["healthy", "sick"]);
        let registry = Registry::with_builtins();
        let method = MLMethodSpec::new("NearestCentroid")
            .with_grid("distance", vec!["euclidean".into(), "manhattan".into()])
            .with_model_selection(2);
        let setting = setting(method);
        let item = MLProcess::new(&train, Some(&test), &label, &setting, &registry)
            .with_number_of_processes(2)
            .run(1)
            .unwrap();
        assert!(!item.method_params["distance"].is_list());
    }

    #[test]
    fn test_grid_without_model_selection_uses_first() {
        let (train, test) = datasets();
        let label = Label::new("status", ["healthy", "sick"]);
        let registry = Registry::with_builtins();
        let method = MLMethodSpec::new("NearestCentroid")
            .with_grid("distance", vec!["manhattan".into(), "euclidean".into()]);
        let setting = setting(method);
        let item =
            MLProcess::new(&train, Some(&test), &label, &setting, &registry).run(0).unwrap();
        assert_eq!(item.method_params["distance"], ParamValue::Str("manhattan".into()));
    }

    #[test]
    fn test_single_class_training_is_data_error() {
        let train = RandomDatasetBuilder::new(4).label("status", ["sick"]).build("train");
        let (_, test) = datasets();
        let label = Label::new("status", ["healthy", "sick"]);
        let registry = Registry::with_builtins();
        let setting = setting(MLMethodSpec::new("NearestCentroid"));
        let err =
            MLProcess::new(&train, Some(&test), &label, &setting, &registry).run(0).unwrap_err();
        assert!(matches!(err, Error::Data(_)));
    }
}
