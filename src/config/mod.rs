//! Declarative run configuration
//!
//! A [`TrainMLModelSpec`] is read from YAML or JSON, validated, and resolved
//! into a [`TrainMLModelState`](crate::hyperparameter_optimization::TrainMLModelState)
//! with [`TrainMLModelSpec::build_state`].

mod loader;
mod resolve;
pub mod schema;
pub mod validate;

pub use loader::load_config;
pub use schema::{LabelSpec, SettingRef, SplitReportsSpec, SplitSpec, TrainMLModelSpec};
pub use validate::{validate_config, ValidationError};
