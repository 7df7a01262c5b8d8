//! Reports
//!
//! A [`Report`] consumes one kind of [`ReportInput`] and writes artifacts under
//! a directory it is given. The `run_*_reports` helpers run a list of
//! reports against one input, skipping (with a warning) reports that do not
//! accept that input.

mod builtin;

pub use builtin::{DatasetSummary, DesignMatrixExporter, ModelParameters, PerformanceOverview};

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Label};
use crate::encoding::EncodedData;
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{HPSetting, TrainMLModelState};
use crate::ml_methods::MLMethod;

/// Free-form values shared with every report of a run
pub type ReportContext = BTreeMap<String, serde_json::Value>;

/// What a report is run against
#[derive(Clone, Copy, Debug)]
pub enum ReportInput<'a> {
    /// A dataset (full, or one side of a split)
    Dataset(&'a Dataset),
    /// Encoded data, with the label the encoding was produced for
    Encoding { data: &'a EncodedData, label: &'a Label },
    /// A fitted method with the setting that produced it
    Model {
        method: &'a dyn MLMethod,
        setting: &'a HPSetting,
        label: &'a Label,
        test_data: Option<&'a EncodedData>,
    },
    /// The whole nested cross-validation ledger
    TrainMLModel(&'a TrainMLModelState),
}

impl ReportInput<'_> {
    fn kind(&self) -> ReportType {
        match self {
            Self::Dataset(_) => ReportType::Data,
            Self::Encoding { .. } => ReportType::Encoding,
            Self::Model { .. } => ReportType::Model,
            Self::TrainMLModel(_) => ReportType::TrainMLModel,
        }
    }
}

/// Category of a report
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Data,
    Encoding,
    Model,
    TrainMLModel,
}

/// One file written by a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOutput {
    pub name: String,
    pub path: PathBuf,
}

/// Outcome of one report run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReportResult {
    pub name: String,
    pub report_type: ReportType,
    pub outputs: Vec<ReportOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
}

impl ReportResult {
    pub fn new(name: impl Into<String>, report_type: ReportType) -> Self {
        Self { name: name.into(), report_type, outputs: Vec::new(), info: None }
    }

    pub fn with_output(mut self, name: impl Into<String>, path: PathBuf) -> Self {
        self.outputs.push(ReportOutput { name: name.into(), path });
        self
    }

    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }
}

/// A report
pub trait Report: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// Category of input this report expects
    fn report_type(&self) -> ReportType;

    /// Whether the report can run on `input`
    fn accepts(&self, input: &ReportInput<'_>) -> bool {
        input.kind() == self.report_type()
    }

    /// Write the report under `path`
    fn generate(
        &self,
        input: &ReportInput<'_>,
        path: &Path,
        context: &ReportContext,
    ) -> Result<ReportResult>;
}

/// Reports attached to one level of the nested cross-validation
#[derive(Clone, Debug, Default)]
pub struct ReportConfig {
    /// Run on the train and test side of every split
    pub data_split_reports: Vec<Arc<dyn Report>>,
    /// Run on every encoded dataset
    pub encoding_reports: Vec<Arc<dyn Report>>,
    /// Run on every fitted model
    pub model_reports: Vec<Arc<dyn Report>>,
}

impl ReportConfig {
    pub fn is_empty(&self) -> bool {
        self.data_split_reports.is_empty()
            && self.encoding_reports.is_empty()
            && self.model_reports.is_empty()
    }
}

pub(crate) fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(format!("creating {}", path.display()), e))
}

fn run_reports(
    input: &ReportInput<'_>,
    reports: &[Arc<dyn Report>],
    path: &Path,
    context: &ReportContext,
) -> Result<Vec<ReportResult>> {
    let mut results = Vec::with_capacity(reports.len());
    for report in reports {
        if !report.accepts(input) {
            tracing::warn!(
                report = report.name(),
                expected = ?report.report_type(),
                got = ?input.kind(),
                "report prerequisites not met, skipping"
            );
            continue;
        }
        let report_path = path.join(report.name());
        create_dir(&report_path)?;
        results.push(report.generate(input, &report_path, context)?);
    }
    Ok(results)
}

/// Run data reports on `dataset`
pub fn run_data_reports(
    dataset: &Dataset,
    reports: &[Arc<dyn Report>],
    path: &Path,
    context: &ReportContext,
) -> Result<Vec<ReportResult>> {
    run_reports(&ReportInput::Dataset(dataset), reports, path, context)
}

/// Run encoding reports on encoded data
pub fn run_encoding_reports(
    data: &EncodedData,
    label: &Label,
    reports: &[Arc<dyn Report>],
    path: &Path,
    context: &ReportContext,
) -> Result<Vec<ReportResult>> {
    run_reports(&ReportInput::Encoding { data, label }, reports, path, context)
}

/// Run model reports on a fitted method
pub fn run_model_reports(
    method: &dyn MLMethod,
    setting: &HPSetting,
    label: &Label,
    test_data: Option<&EncodedData>,
    reports: &[Arc<dyn Report>],
    path: &Path,
    context: &ReportContext,
) -> Result<Vec<ReportResult>> {
    let input = ReportInput::Model { method, setting, label, test_data };
    run_reports(&input, reports, path, context)
}

/// Run instruction-level reports on the finished ledger
pub fn run_state_reports(
    state: &TrainMLModelState,
    reports: &[Arc<dyn Report>],
    path: &Path,
    context: &ReportContext,
) -> Result<Vec<ReportResult>> {
    run_reports(&ReportInput::TrainMLModel(state), reports, path, context)
}
