//! Dataset splitting shared by the selection and assessment loops

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::split::{SplitConfig, SplitStrategy};
use crate::data::{Dataset, LabelConfiguration};
use crate::error::{Error, Result};

/// Train/test row indices of one split
pub type Fold = (Vec<usize>, Vec<usize>);

fn shuffled(n_samples: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n_samples).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    indices
}

fn sorted(mut indices: Vec<usize>) -> Vec<usize> {
    indices.sort_unstable();
    indices
}

/// K-fold cross-validation splitter
///
/// The first `n_samples % n_splits` folds get one extra test example.
#[derive(Clone, Debug)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, shuffle: true, seed: 42 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn without_shuffle(mut self) -> Self {
        self.shuffle = false;
        self
    }

    /// Train/test indices for each fold, both sorted ascending
    pub fn split(&self, n_samples: usize) -> Vec<Fold> {
        let indices = if self.shuffle {
            shuffled(n_samples, self.seed)
        } else {
            (0..n_samples).collect()
        };
        let n_splits = self.n_splits.max(1);
        let fold_size = n_samples / n_splits;
        let remainder = n_samples % n_splits;

        let mut folds = Vec::with_capacity(n_splits);
        let mut start = 0;
        for i in 0..n_splits {
            let end = start + fold_size + usize::from(i < remainder);
            let test = indices[start..end].to_vec();
            let train = indices[..start].iter().chain(&indices[end..]).copied().collect();
            folds.push((sorted(train), sorted(test)));
            start = end;
        }
        folds
    }
}

/// K-fold splitter that keeps class proportions in every fold
#[derive(Clone, Debug)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits, seed: 42 }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Folds over `classes` (one entry per example)
    ///
    /// Fails when the rarest class has fewer members than there are folds.
    pub fn split<S: AsRef<str>>(&self, classes: &[S]) -> Result<Vec<Fold>> {
        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, class) in classes.iter().enumerate() {
            groups.entry(class.as_ref()).or_default().push(i);
        }
        if let Some((rarest, members)) = groups.iter().min_by_key(|(_, members)| members.len()) {
            if members.len() < self.n_splits {
                return Err(Error::config(
                    "split_count",
                    format!(
                        "{} folds requested but class '{rarest}' has only {} examples",
                        self.n_splits,
                        members.len()
                    ),
                ));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_folds = self.n_splits.max(1);
        let mut test_folds = vec![Vec::new(); n_folds];
        let mut position = 0;
        for members in groups.values_mut() {
            members.shuffle(&mut rng);
            for &index in members.iter() {
                test_folds[position % n_folds].push(index);
                position += 1;
            }
        }

        Ok(test_folds
            .into_iter()
            .map(|test| {
                let test = sorted(test);
                let train = (0..classes.len()).filter(|i| test.binary_search(i).is_err()).collect();
                (train, test)
            })
            .collect())
    }
}

/// Splitting helpers for the nested cross-validation loops
pub struct HPUtil;

impl HPUtil {
    /// Row indices of every split of `dataset` under `config`
    pub fn split_indices(
        dataset: &Dataset,
        config: &SplitConfig,
        label_configuration: &LabelConfiguration,
    ) -> Result<Vec<Fold>> {
        let n = dataset.len();
        let count = config.split_count;
        match config.split_strategy {
            SplitStrategy::KFold => {
                if count < 2 || count > n {
                    return Err(Error::config(
                        "split_count",
                        format!("k-fold needs 2 <= k <= {n} examples, got k = {count}"),
                    ));
                }
                Ok(KFold::new(count).with_seed(config.seed).split(n))
            }
            SplitStrategy::StratifiedKFold => {
                let label = match &config.stratify_by {
                    Some(label) => label.as_str(),
                    None => match label_configuration.labels().first() {
                        Some(label) => label.name.as_str(),
                        None => {
                            return Err(Error::config(
                                "stratify_by",
                                "stratified k-fold needs a label to stratify on",
                            ))
                        }
                    },
                };
                if count < 2 {
                    return Err(Error::config(
                        "split_count",
                        format!("stratified k-fold needs k >= 2, got {count}"),
                    ));
                }
                let classes = dataset.label_values(label)?;
                StratifiedKFold::new(count).with_seed(config.seed).split(&classes)
            }
            SplitStrategy::Random => {
                let fraction = config.training_percentage;
                if !(fraction > 0.0 && fraction < 1.0) {
                    return Err(Error::config(
                        "training_percentage",
                        format!("must lie in (0, 1), got {fraction}"),
                    ));
                }
                if n < 2 {
                    return Err(Error::Data(format!(
                        "a random split needs at least 2 examples, dataset '{}' has {n}",
                        dataset.name()
                    )));
                }
                let n_train = ((n as f64 * fraction).floor() as usize).clamp(1, n - 1);
                Ok((0..count.max(1))
                    .map(|repetition| {
                        let indices = shuffled(n, config.seed.wrapping_add(repetition as u64));
                        let (train, test) = indices.split_at(n_train);
                        (sorted(train.to_vec()), sorted(test.to_vec()))
                    })
                    .collect())
            }
            SplitStrategy::LeaveOneOut => {
                if n < 2 {
                    return Err(Error::Data(format!(
                        "leave-one-out needs at least 2 examples, dataset '{}' has {n}",
                        dataset.name()
                    )));
                }
                Ok(KFold::new(n).without_shuffle().split(n))
            }
        }
    }

    /// Split `dataset` into parallel lists of train/validation and test subsets
    ///
    /// Both lists have one entry per split. Subsets are named
    /// `{dataset}_split{i}_train` / `{dataset}_split{i}_test` (1-based).
    pub fn split_data(
        dataset: &Dataset,
        config: &SplitConfig,
        label_configuration: &LabelConfiguration,
    ) -> Result<(Vec<Dataset>, Vec<Dataset>)> {
        let folds = Self::split_indices(dataset, config, label_configuration)?;
        let mut train_datasets = Vec::with_capacity(folds.len());
        let mut test_datasets = Vec::with_capacity(folds.len());
        for (i, (train, test)) in folds.iter().enumerate() {
            let name = format!("{}_split{}", dataset.name(), i + 1);
            train_datasets.push(dataset.subset(train, format!("{name}_train"))?);
            test_datasets.push(dataset.subset(test, format!("{name}_test"))?);
        }
        tracing::debug!(
            dataset = dataset.name(),
            strategy = %config.split_strategy,
            splits = folds.len(),
            "split dataset"
        );
        Ok((train_datasets, test_datasets))
    }
}
