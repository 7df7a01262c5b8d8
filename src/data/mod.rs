//! Repertoire datasets and label configuration
//!
//! A [`Dataset`] is an immutable, ordered collection of immune repertoires
//! ([`Example`]s). Splitting produces new datasets that share nothing mutable
//! with their parent. [`LabelConfiguration`] fixes which labels are learned
//! and in which order they are processed.

mod dataset;
mod label;
mod random;

pub use dataset::{Dataset, Example};
pub use label::{Label, LabelConfiguration};
pub use random::RandomDatasetBuilder;
