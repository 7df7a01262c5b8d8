//! Method-internal model selection
//!
//! An ML method spec whose parameters contain lists declares a grid. With
//! model selection enabled, every grid point is scored by k-fold
//! cross-validation on the training data and the best one is refitted on
//! all of it. This happens inside a single fit and never touches the outer
//! or inner splits of the nested cross-validation.

use rayon::prelude::*;

use super::MLMethod;
use crate::data::Label;
use crate::encoding::EncodedData;
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{Fold, KFold, ParamValue, Params, StratifiedKFold};
use crate::metrics::{Metric, Probabilities, DEFAULT_OPTIMIZATION_METRIC};
use crate::pool::{host_cores, local_pool};

/// Cartesian product of list-valued parameters
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterGrid {
    combinations: Vec<Params>,
}

impl ParameterGrid {
    /// Expand `params`; scalar values appear unchanged in every combination
    pub fn new(params: &Params) -> Self {
        let axes: Vec<(&String, Vec<&ParamValue>)> = params
            .iter()
            .map(|(name, value)| match value {
                ParamValue::List(values) if !values.is_empty() => (name, values.iter().collect()),
                other => (name, vec![other]),
            })
            .collect();
        Self { combinations: Self::cartesian_product(&axes) }
    }

    fn cartesian_product(axes: &[(&String, Vec<&ParamValue>)]) -> Vec<Params> {
        let Some(((name, values), rest)) = axes.split_first() else {
            return vec![Params::new()];
        };
        let rest_combinations = Self::cartesian_product(rest);
        values
            .iter()
            .flat_map(|value| {
                rest_combinations.iter().map(move |combination| {
                    let mut combination = combination.clone();
                    combination.insert((*name).clone(), (*value).clone());
                    combination
                })
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    /// Whether the grid has more than one point
    pub fn is_search(&self) -> bool {
        self.combinations.len() > 1
    }

    pub fn combinations(&self) -> &[Params] {
        &self.combinations
    }

    /// First combination in declaration order
    pub fn first(&self) -> Params {
        self.combinations.first().cloned().unwrap_or_default()
    }
}

/// Score of one grid point
#[derive(Clone, Debug)]
struct Candidate {
    index: usize,
    score: f64,
}

fn score_fold<F>(
    build: &F,
    params: &Params,
    data: &EncodedData,
    label: &Label,
    fold: &Fold,
    metric: Metric,
) -> Result<f64>
where
    F: Fn(&Params) -> Result<Box<dyn MLMethod>> + Sync,
{
    let (train_rows, test_rows) = fold;
    let train = data.select_rows(train_rows);
    let test = data.select_rows(test_rows);
    let mut method = build(params)?;
    method.fit(&train, label, 1)?;
    let predictions = method.predict(&test, label)?;
    let proba = method.predict_proba(&test, label)?;
    let probabilities =
        proba.as_ref().map(|values| Probabilities { values, classes: method.classes() });
    Ok(metric.compute(
        test.label_values(&label.name)?,
        &predictions,
        probabilities,
        label.positive_class(),
    )?)
}

/// Stratified folds when every class can fill each fold, plain k-fold otherwise
fn folds_for(data: &EncodedData, label: &Label, n_folds: usize, seed: u64) -> Result<Vec<Fold>> {
    let targets = data.label_values(&label.name)?;
    match StratifiedKFold::new(n_folds).with_seed(seed).split(targets) {
        Ok(folds) => Ok(folds),
        Err(_) => Ok(KFold::new(n_folds).with_seed(seed).split(data.n_examples())),
    }
}

/// Choose the best grid point by k-fold cross-validation, then refit it on all of `data`
///
/// Grid points are scored concurrently on a pool of `cores_for_training`
/// threads. A grid point whose fit or metric fails on any fold is skipped;
/// ties go to the earliest grid point. Returns the refitted method and the
/// chosen parameters.
#[allow(clippy::too_many_arguments)]
pub fn fit_by_cross_validation<F>(
    build: &F,
    grid: &ParameterGrid,
    data: &EncodedData,
    label: &Label,
    n_folds: usize,
    metric: Metric,
    cores_for_training: usize,
    seed: u64,
) -> Result<(Box<dyn MLMethod>, Params)>
where
    F: Fn(&Params) -> Result<Box<dyn MLMethod>> + Sync,
{
    let n_folds = n_folds.clamp(2, data.n_examples().max(2));
    if data.n_examples() < n_folds {
        return Err(Error::Data(format!(
            "model selection needs at least {n_folds} examples, got {}",
            data.n_examples()
        )));
    }

    let probe = build(&grid.first())?;
    let metric = if metric == Metric::LogLoss && !probe.can_predict_proba() {
        tracing::warn!(
            method = probe.name(),
            metric = metric.name(),
            fallback = DEFAULT_OPTIMIZATION_METRIC.name(),
            "method cannot predict probabilities, model selection uses the fallback metric"
        );
        DEFAULT_OPTIMIZATION_METRIC
    } else {
        metric
    };

    let folds = folds_for(data, label, n_folds, seed)?;
    let pool = local_pool(cores_for_training.min(host_cores()))?;
    let scored: Vec<(usize, Result<f64>)> = pool.install(|| {
        grid.combinations()
            .par_iter()
            .enumerate()
            .map(|(index, params)| {
                let scores: Result<Vec<f64>> = folds
                    .iter()
                    .map(|fold| score_fold(build, params, data, label, fold, metric))
                    .collect();
                (index, scores.map(|s| s.iter().sum::<f64>() / s.len() as f64))
            })
            .collect()
    });

    let mut best: Option<Candidate> = None;
    let mut last_error = None;
    for (index, outcome) in scored {
        match outcome {
            Ok(score) => {
                let better = match &best {
                    None => true,
                    Some(current) if metric.higher_is_better() => score > current.score,
                    Some(current) => score < current.score,
                };
                if better {
                    best = Some(Candidate { index, score });
                }
            }
            Err(err) => {
                tracing::warn!(
                    method = probe.name(),
                    candidate = index,
                    error = %err,
                    "model selection candidate failed"
                );
                last_error = Some(err);
            }
        }
    }

    let Some(best) = best else {
        return Err(last_error
            .unwrap_or_else(|| Error::Data("model selection grid is empty".to_string())));
    };
    let params = grid.combinations()[best.index].clone();
    tracing::debug!(
        method = probe.name(),
        metric = metric.name(),
        score = best.score,
        candidates = grid.len(),
        "model selection finished"
    );
    let mut method = build(&params)?;
    method.fit(data, label, cores_for_training)?;
    Ok((method, params))
}
