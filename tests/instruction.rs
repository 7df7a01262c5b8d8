//! Full "train ML model" instruction, from configuration to exported model

mod common;

use std::fs;
use std::sync::Arc;

use common::*;
use immuneml_hpo::config::TrainMLModelSpec;
use immuneml_hpo::hyperparameter_optimization::{ExecutionMode, HPSetting};
use immuneml_hpo::workflows::TrainMLModelInstruction;
use immuneml_hpo::Registry;

#[test]
fn test_instruction_exports_optimal_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = state(
        status_dataset(30),
        vec![centroid_setting(), logreg_setting()],
        ExecutionMode::Sequential,
        dir.path(),
    );
    state.refit_optimal_model = true;

    let state = TrainMLModelInstruction::new(state).run(dir.path()).unwrap();
    let root = dir.path().join("nested_cv");

    let optimal = TrainMLModelInstruction::overall_optimal_setting(&state, LABEL).unwrap();
    let item = &state.optimal_hp_items[LABEL];
    assert_eq!(item.hp_setting, optimal);
    assert_eq!(item.split_index, None);
    assert!(item.performance.is_empty());

    let export = &state.optimal_hp_item_paths[LABEL];
    assert_eq!(export, &root.join(format!("optimal_{LABEL}")));
    let yaml = fs::read_to_string(export.join("hp_setting.yaml")).unwrap();
    let exported: HPSetting = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(exported, optimal);
    assert!(export.join(format!("{}.json", item.method.name())).is_file());

    let table = fs::read_to_string(root.join(format!("{LABEL}_performances.csv"))).unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "hp_setting,split_1,split_2,split_3");
    assert!(lines[1].starts_with("kmer3_centroid,"));
    assert!(lines[2].starts_with("kmer3_logreg,"));
}

#[test]
fn test_majority_vote_prefers_earliest_split_on_tie() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(
        status_dataset(30),
        vec![centroid_setting(), logreg_setting()],
        ExecutionMode::Sequential,
        dir.path(),
    );
    let mut state = immuneml_hpo::HPAssessment::run_assessment(state).unwrap();

    let picks = [logreg_setting(), centroid_setting(), centroid_setting()];
    for (assessment, pick) in state.assessment_states.iter_mut().zip(picks) {
        assessment.label_state_mut(LABEL).unwrap().optimal_hp_setting = Some(pick);
    }
    assert_eq!(
        TrainMLModelInstruction::overall_optimal_setting(&state, LABEL),
        Some(centroid_setting())
    );

    state.assessment_states.pop();
    assert_eq!(
        TrainMLModelInstruction::overall_optimal_setting(&state, LABEL),
        Some(logreg_setting())
    );
}

#[test]
fn test_without_refit_reuses_assessment_item() {
    let dir = tempfile::tempdir().unwrap();
    let state = state(
        status_dataset(30),
        vec![centroid_setting(), logreg_setting()],
        ExecutionMode::Parallel,
        dir.path(),
    );
    let state = TrainMLModelInstruction::new(state).run(dir.path()).unwrap();

    let item = &state.optimal_hp_items[LABEL];
    assert!(item.split_index.is_some());
    assert!(item.score().is_some());
}

const RUN: &str = r#"
name: from_yaml
labels:
  - name: status
    positive_class: sick
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
      max_iter: 100
      l2_penalty: [0.0, 0.01]
    model_selection_cv: true
    model_selection_n_folds: 2
reports:
  summary:
    type: DatasetSummary
  overview:
    type: PerformanceOverview
  weights:
    type: ModelParameters
settings:
  - encoding: kmer3
    ml_method: centroid
  - encoding: kmer3
    ml_method: logreg
assessment:
  split_strategy: stratified_k_fold
  split_count: 3
  reports:
    data_splits: [summary]
    models: [weights]
selection:
  split_strategy: stratified_k_fold
  split_count: 2
  stratify_by: status
metrics: [accuracy, auc]
optimization_metric: balanced_accuracy
instruction_reports: [overview]
execution: parallel
max_workers: 2
"#;

#[test]
fn test_run_from_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let spec = TrainMLModelSpec::from_yaml_str(RUN).unwrap();
    let registry = Arc::new(Registry::with_builtins());
    let state = spec.build_state(status_dataset(36), registry, dir.path()).unwrap();
    let state = TrainMLModelInstruction::new(state).run(dir.path()).unwrap();

    let root = dir.path().join("from_yaml");
    assert_eq!(state.assessment_states.len(), 3);
    for assessment in &state.assessment_states {
        assert_eq!(assessment.train_val_data_reports.len(), 1);
        assert_eq!(assessment.test_data_reports.len(), 1);
        assert!(assessment.path.join("data_report_train").is_dir());
        assert!(assessment.path.join("data_report_test").is_dir());
        for item in assessment.label_state(LABEL).unwrap().assessment_items.values() {
            assert_eq!(item.model_report_results.len(), 1);
        }
    }
    assert!(state.report_results.iter().any(|r| r.name == "PerformanceOverview"));
    assert!(root.join("reports").is_dir());
    assert!(root.join(format!("optimal_{LABEL}")).join("hp_setting.yaml").is_file());
}
