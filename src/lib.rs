//! Nested cross-validation for immune receptor repertoire classifiers.
//!
//! Given a labelled [`Dataset`](data::Dataset) and a list of candidate
//! [`HPSetting`]s (encoder + preprocessing + ML method), the crate
//! - splits the data into outer train/validation and test parts ([`HPUtil`]),
//! - picks the best setting per label on inner splits ([`HPSelection`]),
//! - retrains every setting on each outer train/validation part and scores it
//!   on the held-out test part ([`HPAssessment`]),
//! - records everything in a single [`TrainMLModelState`] ledger.
//!
//! Outer splits can be processed sequentially or on a local worker pool; both
//! modes produce the same ledger.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use immuneml_hpo::data::RandomDatasetBuilder;
//! use immuneml_hpo::config::TrainMLModelSpec;
//! use immuneml_hpo::registry::Registry;
//! use immuneml_hpo::workflows::TrainMLModelInstruction;
//!
//! let dataset = RandomDatasetBuilder::new(30).label("status", ["healthy", "sick"]).build("d");
//! let spec = TrainMLModelSpec::from_yaml_str(&std::fs::read_to_string("run.yaml")?)?;
//! let state = spec.build_state(dataset, Arc::new(Registry::with_builtins()), "out")?;
//! let state = TrainMLModelInstruction::new(state).run("out".as_ref())?;
//! println!("{} outer splits", state.assessment_states.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod data;
pub mod encoding;
pub mod error;
pub mod hyperparameter_optimization;
pub mod metrics;
pub mod ml_methods;
pub mod pool;
pub mod preprocessing;
pub mod registry;
pub mod reports;
pub mod workflows;

pub use error::{Error, Result};
pub use hyperparameter_optimization::{
    HPAssessment, HPSelection, HPSetting, HPUtil, SplitConfig, TrainMLModelState,
};
pub use metrics::Metric;
pub use registry::Registry;
pub use workflows::{MLProcess, TrainMLModelInstruction};
