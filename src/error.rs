//! Error types with actionable diagnostics.
//!
//! Every failure raised while running nested cross-validation ends up as an
//! [`Error`]. Failures inside an outer split carry the split index, the label
//! and the hyperparameter setting that were being processed so that the
//! failing combination can be identified from the message alone.

use thiserror::Error;

use crate::config::ValidationError;
use crate::metrics::MetricError;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the nested cross-validation core.
#[derive(Debug, Error)]
pub enum Error {
    /// A configuration value is invalid and no default can be substituted.
    #[error("Invalid configuration for '{field}': {message}")]
    Config { field: String, message: String },

    /// Configuration failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The data cannot support the requested operation (e.g. a single-class split).
    #[error("Degenerate data: {0}")]
    Data(String),

    /// The underlying ML method failed to fit or predict.
    #[error("Model fit failed for {method}: {message}")]
    Fit { method: String, message: String },

    /// A metric could not be computed on the given input.
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// A component name is not registered.
    #[error("Unknown {kind} '{name}'\n  → Register it on the Registry or fix the name in the configuration")]
    UnknownComponent { kind: &'static str, name: String },

    /// No assessment state exists for the requested outer split.
    #[error("No assessment state registered for outer split {0}")]
    MissingSplit(usize),

    /// Every candidate setting failed during selection for one label.
    #[error("All {count} hyperparameter settings failed during selection for label '{label}'; last failure: {source}")]
    NoViableSetting {
        label: String,
        count: usize,
        #[source]
        source: Box<Error>,
    },

    /// Wraps an error with the outer split / label / setting being processed.
    #[error("{}: {source}", describe_context(*split, label.as_deref(), setting.as_deref()))]
    Context {
        split: usize,
        label: Option<String>,
        setting: Option<String>,
        #[source]
        source: Box<Error>,
    },

    /// IO error with context.
    #[error("IO error: {context}\n  Cause: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// The worker pool could not be created.
    #[error("Worker pool error: {0}")]
    Pool(String),
}

fn describe_context(split: usize, label: Option<&str>, setting: Option<&str>) -> String {
    let mut out = format!("outer split {}", split + 1);
    if let Some(label) = label {
        out.push_str(&format!(", label '{label}'"));
    }
    if let Some(setting) = setting {
        out.push_str(&format!(", setting '{setting}'"));
    }
    out
}

impl Error {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { context: context.into(), source }
    }

    /// Create a configuration error.
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { field: field.into(), message: message.into() }
    }

    /// Create a fit error for the named method.
    pub fn fit(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fit { method: method.into(), message: message.into() }
    }

    /// Create a serialization error from any displayable cause.
    pub fn serialization(cause: impl std::fmt::Display) -> Self {
        Self::Serialization { message: cause.to_string() }
    }

    /// Attach outer split / label / setting context.
    ///
    /// Errors that already carry context are returned unchanged so the
    /// innermost (most specific) context wins.
    pub fn in_split(self, split: usize, label: Option<&str>, setting: Option<&str>) -> Self {
        match self {
            Self::Context { .. } => self,
            other => Self::Context {
                split,
                label: label.map(str::to_string),
                setting: setting.map(str::to_string),
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, skipping context wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Self::Context { source, .. } | Self::NoViableSetting { source, .. } => source.root(),
            other => other,
        }
    }

    /// Check if this error stems from configuration or data the user controls.
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Context { source, .. } => source.is_user_error(),
            Self::Config { .. }
            | Self::Validation(_)
            | Self::Data(_)
            | Self::UnknownComponent { .. }
            | Self::NoViableSetting { .. } => true,
            _ => false,
        }
    }

    /// Get the error code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config { .. } => "E001",
            Self::Validation(_) => "E002",
            Self::UnknownComponent { .. } => "E003",
            Self::Data(_) => "E010",
            Self::Fit { .. } => "E020",
            Self::Metric(_) => "E021",
            Self::NoViableSetting { .. } => "E022",
            Self::MissingSplit(_) => "E030",
            Self::Context { source, .. } => source.code(),
            Self::Io { .. } => "E050",
            Self::Serialization { .. } => "E051",
            Self::Pool(_) => "E060",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::serialization(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Self::serialization(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_message_names_split_label_and_setting() {
        let err = Error::fit("LogisticRegression", "diverged").in_split(
            1,
            Some("status"),
            Some("kmer_logreg"),
        );
        let msg = err.to_string();
        assert!(msg.contains("outer split 2"));
        assert!(msg.contains("label 'status'"));
        assert!(msg.contains("setting 'kmer_logreg'"));
        assert!(msg.contains("diverged"));
    }

    #[test]
    fn test_context_is_attached_once() {
        let err = Error::Data("single class".into())
            .in_split(0, Some("status"), Some("inner"))
            .in_split(3, Some("other"), None);
        match &err {
            Error::Context { split, setting, .. } => {
                assert_eq!(*split, 0);
                assert_eq!(setting.as_deref(), Some("inner"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.root(), Error::Data(_)));
    }

    #[test]
    fn test_context_without_label() {
        let err = Error::Data("empty".into()).in_split(4, None, None);
        assert!(err.to_string().starts_with("outer split 5: "));
    }

    #[test]
    fn test_codes_follow_wrapped_error() {
        let err = Error::config("split_count", "too large").in_split(0, None, None);
        assert_eq!(err.code(), "E001");
        assert!(err.is_user_error());
        assert!(!Error::Pool("x".into()).is_user_error());
    }

    #[test]
    fn test_all_error_codes_start_with_e() {
        let errors = vec![
            Error::config("a", "b"),
            Error::Data("x".into()),
            Error::fit("m", "x"),
            Error::MissingSplit(0),
            Error::Pool("p".into()),
            Error::serialization("bad"),
            Error::io("reading", std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
        ];
        for err in errors {
            assert!(err.code().starts_with('E'));
        }
    }

    #[test]
    fn test_unknown_component_is_actionable() {
        let err = Error::UnknownComponent { kind: "encoder", name: "Word2Vec".into() };
        let msg = err.to_string();
        assert!(msg.contains("Word2Vec"));
        assert!(msg.contains("Registry"));
    }
}
