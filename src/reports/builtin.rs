//! Built-in reports

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::Serialize;

use super::{Report, ReportContext, ReportInput, ReportResult, ReportType};
use crate::error::{Error, Result};

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body).map_err(|e| Error::io(format!("writing {}", path.display()), e))
}

fn wrong_input(report: &str, input: &ReportInput<'_>) -> Error {
    Error::config(report, format!("cannot run on {:?} input", input.kind()))
}

/// Example counts, sequence counts and class balance of a dataset
#[derive(Clone, Copy, Debug, Default)]
pub struct DatasetSummary;

#[derive(Serialize)]
struct Summary {
    dataset: String,
    example_count: usize,
    sequence_count: usize,
    mean_sequences_per_example: f64,
    class_counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl Report for DatasetSummary {
    fn name(&self) -> &str {
        "DatasetSummary"
    }

    fn report_type(&self) -> ReportType {
        ReportType::Data
    }

    /// Labels listed under `labels` in the context must be present on every
    /// example; without that entry every label found on the examples is counted.
    fn generate(
        &self,
        input: &ReportInput<'_>,
        path: &Path,
        context: &ReportContext,
    ) -> Result<ReportResult> {
        let ReportInput::Dataset(dataset) = input else {
            return Err(wrong_input(self.name(), input));
        };

        let labels: BTreeSet<String> = match context.get("labels").and_then(|v| v.as_array()) {
            Some(names) => names.iter().filter_map(|v| v.as_str().map(str::to_string)).collect(),
            None => dataset
                .examples()
                .iter()
                .flat_map(|e| e.labels.keys().cloned())
                .collect(),
        };
        let mut class_counts = BTreeMap::new();
        for label in labels {
            let counts = dataset.class_counts(&label)?;
            class_counts.insert(label, counts);
        }

        let sequence_count: usize = dataset.examples().iter().map(|e| e.sequences.len()).sum();
        let summary = Summary {
            dataset: dataset.name().to_string(),
            example_count: dataset.len(),
            sequence_count,
            mean_sequences_per_example: if dataset.is_empty() {
                0.0
            } else {
                sequence_count as f64 / dataset.len() as f64
            },
            class_counts,
        };

        let file = path.join("dataset_summary.json");
        write_json(&file, &summary)?;
        Ok(ReportResult::new(self.name(), ReportType::Data).with_output("summary", file))
    }
}

/// Writes the encoded design matrix and its labels as CSV
#[derive(Clone, Copy, Debug, Default)]
pub struct DesignMatrixExporter;

impl Report for DesignMatrixExporter {
    fn name(&self) -> &str {
        "DesignMatrixExporter"
    }

    fn report_type(&self) -> ReportType {
        ReportType::Encoding
    }

    fn generate(
        &self,
        input: &ReportInput<'_>,
        path: &Path,
        _context: &ReportContext,
    ) -> Result<ReportResult> {
        let ReportInput::Encoding { data, label } = input else {
            return Err(wrong_input(self.name(), input));
        };

        let matrix_path = path.join("design_matrix.csv");
        let mut writer = csv::Writer::from_path(&matrix_path)?;
        let mut header = vec!["example_id".to_string()];
        header.extend(data.feature_names.iter().cloned());
        writer.write_record(&header)?;
        for (id, row) in data.example_ids.iter().zip(data.examples.outer_iter()) {
            let mut record = vec![id.clone()];
            record.extend(row.iter().map(f64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush().map_err(|e| Error::io("flushing design matrix", e))?;

        let labels_path = path.join("labels.csv");
        let mut writer = csv::Writer::from_path(&labels_path)?;
        writer.write_record(["example_id", label.name.as_str()])?;
        for (id, value) in data.example_ids.iter().zip(data.label_values(&label.name)?) {
            writer.write_record([id, value])?;
        }
        writer.flush().map_err(|e| Error::io("flushing labels", e))?;

        Ok(ReportResult::new(self.name(), ReportType::Encoding)
            .with_output("design_matrix", matrix_path)
            .with_output("labels", labels_path)
            .with_info(format!(
                "{} examples x {} features ({})",
                data.n_examples(),
                data.n_features(),
                data.encoding
            )))
    }
}

/// Dumps the fitted parameters of a model along with its setting
#[derive(Clone, Copy, Debug, Default)]
pub struct ModelParameters;

impl Report for ModelParameters {
    fn name(&self) -> &str {
        "ModelParameters"
    }

    fn report_type(&self) -> ReportType {
        ReportType::Model
    }

    fn generate(
        &self,
        input: &ReportInput<'_>,
        path: &Path,
        _context: &ReportContext,
    ) -> Result<ReportResult> {
        let ReportInput::Model { method, setting, label, .. } = input else {
            return Err(wrong_input(self.name(), input));
        };
        let file = path.join("model_parameters.json");
        write_json(
            &file,
            &serde_json::json!({
                "label": label.name,
                "setting": setting.key(),
                "method": method.name(),
                "classes": method.classes(),
                "parameters": method.get_params(),
            }),
        )?;
        Ok(ReportResult::new(self.name(), ReportType::Model).with_output("parameters", file))
    }
}

/// Table of every assessment item's performance across outer splits
#[derive(Clone, Copy, Debug, Default)]
pub struct PerformanceOverview;

impl Report for PerformanceOverview {
    fn name(&self) -> &str {
        "PerformanceOverview"
    }

    fn report_type(&self) -> ReportType {
        ReportType::TrainMLModel
    }

    fn generate(
        &self,
        input: &ReportInput<'_>,
        path: &Path,
        _context: &ReportContext,
    ) -> Result<ReportResult> {
        let ReportInput::TrainMLModel(state) = input else {
            return Err(wrong_input(self.name(), input));
        };

        let metrics: Vec<_> = state.metrics.iter().copied().collect();
        let file = path.join("performance_overview.csv");
        let mut writer = csv::Writer::from_path(&file)?;
        let mut header: Vec<String> =
            ["split", "label", "setting", "optimal"].iter().map(|s| s.to_string()).collect();
        header.extend(metrics.iter().map(|m| m.name().to_string()));
        writer.write_record(&header)?;

        let mut rows = 0;
        for assessment in &state.assessment_states {
            for (label, label_state) in &assessment.label_states {
                for (setting, item) in &label_state.assessment_items {
                    let optimal = label_state.optimal_hp_setting.as_ref() == Some(setting);
                    let mut record = vec![
                        (assessment.split_index + 1).to_string(),
                        label.clone(),
                        setting.key(),
                        optimal.to_string(),
                    ];
                    record.extend(metrics.iter().map(|m| {
                        item.performance.get(m).map(f64::to_string).unwrap_or_default()
                    }));
                    writer.write_record(&record)?;
                    rows += 1;
                }
            }
        }
        writer.flush().map_err(|e| Error::io("flushing performance overview", e))?;

        Ok(ReportResult::new(self.name(), ReportType::TrainMLModel)
            .with_output("performance_overview", file)
            .with_info(format!("{rows} assessment items")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Label, RandomDatasetBuilder};
    use crate::encoding::EncodedData;
    use ndarray::array;

    #[test]
    fn test_dataset_summary_counts_classes() {
        let dataset = RandomDatasetBuilder::new(6)
            .sequence_count(2, 2)
            .label("status", ["a", "b"])
            .seed(3)
            .build("d");
        let dir = tempfile::tempdir().unwrap();
        let result = DatasetSummary
            .generate(&ReportInput::Dataset(&dataset), dir.path(), &ReportContext::new())
            .unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&result.outputs[0].path).unwrap()).unwrap();
        assert_eq!(written["example_count"], 6);
        assert_eq!(written["sequence_count"], 12);
        assert_eq!(written["class_counts"]["status"]["a"], 3);
        assert_eq!(written["class_counts"]["status"]["b"], 3);
    }

    #[test]
    fn test_design_matrix_exporter_writes_rows() {
        let data = EncodedData {
            examples: array![[1.0, 0.0], [0.5, 0.5]],
            example_ids: vec!["e1".into(), "e2".into()],
            feature_names: vec!["AA".into(), "AC".into()],
            labels: BTreeMap::from([("status".to_string(), vec!["a".into(), "b".into()])]),
            encoding: "KmerFrequency".into(),
        };
        let label = Label::new("status", ["a", "b"]);
        let dir = tempfile::tempdir().unwrap();
        let input = ReportInput::Encoding { data: &data, label: &label };
        let result = DesignMatrixExporter.generate(&input, dir.path(), &ReportContext::new()).unwrap();
        let matrix = fs::read_to_string(dir.path().join("design_matrix.csv")).unwrap();
        let lines: Vec<&str> = matrix.lines().collect();
        assert_eq!(lines[0], "example_id,AA,AC");
        assert_eq!(lines[1], "e1,1,0");
        assert_eq!(lines.len(), 3);
        assert_eq!(result.outputs.len(), 2);
    }

    #[test]
    fn test_wrong_input_is_error() {
        let dataset = RandomDatasetBuilder::new(2).label("status", ["a", "b"]).build("d");
        let dir = tempfile::tempdir().unwrap();
        let err = DesignMatrixExporter
            .generate(&ReportInput::Dataset(&dataset), dir.path(), &ReportContext::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }
}
