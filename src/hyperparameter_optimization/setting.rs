//! Hyperparameter settings
//!
//! An [`HPSetting`] is a plain value describing one candidate combination of
//! encoder, ML method and preprocessing sequence. It holds component *specs*
//! (kind + parameters), never fitted components, so it can be cloned freely,
//! compared structurally and used as a map key. Live components are built
//! from the specs by the [`Registry`](crate::registry::Registry) for each run.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single hyperparameter value
///
/// Lists are only meaningful for ML method parameters, where they declare a
/// grid searched by the method's own model-selection cross-validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// Candidate values for grid search
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Numeric value as float (integers are widened)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Non-negative integer value
    pub fn as_usize(&self) -> Option<usize> {
        match self {
            Self::Int(v) => usize::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Boolean value
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this value lists grid candidates
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

// Floats compare and hash by bit pattern so settings can be map keys.
impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ParamValue {}

impl Hash for ParamValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
            Self::List(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// Named parameters of one component
pub type Params = BTreeMap<String, ParamValue>;

/// Typed access to a component's parameters with defaults
///
/// A missing parameter yields the default; a parameter of the wrong type is a
/// configuration error naming the component and the parameter.
#[derive(Clone, Copy, Debug)]
pub struct ParamReader<'a> {
    component: &'a str,
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub fn new(component: &'a str, params: &'a Params) -> Self {
        Self { component, params }
    }

    fn invalid(&self, name: &str, expected: &str, value: &ParamValue) -> Error {
        Error::config(
            format!("{}.{name}", self.component),
            format!("expected {expected}, got {value}"),
        )
    }

    pub fn f64(&self, name: &str, default: f64) -> Result<f64> {
        match self.params.get(name) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(name, "a number", v)),
        }
    }

    pub fn usize(&self, name: &str, default: usize) -> Result<usize> {
        match self.params.get(name) {
            None => Ok(default),
            Some(v) => v.as_usize().ok_or_else(|| self.invalid(name, "a non-negative integer", v)),
        }
    }

    pub fn bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.params.get(name) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.invalid(name, "a boolean", v)),
        }
    }

    pub fn string(&self, name: &str, default: &str) -> Result<String> {
        match self.params.get(name) {
            None => Ok(default.to_string()),
            Some(v) => {
                v.as_str().map(str::to_string).ok_or_else(|| self.invalid(name, "a string", v))
            }
        }
    }
}

/// Kind and parameters of an encoder or preprocessor
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Registered component name
    #[serde(rename = "type")]
    pub kind: String,
    /// Component parameters
    #[serde(default)]
    pub params: Params,
}

impl ComponentSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), params: Params::new() }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

fn default_n_folds() -> usize {
    5
}

/// Kind and parameters of an ML method
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MLMethodSpec {
    /// Registered method name
    #[serde(rename = "type")]
    pub kind: String,
    /// Method parameters; list values declare a grid
    #[serde(default)]
    pub params: Params,
    /// Pick among grid candidates with internal cross-validation
    #[serde(default)]
    pub model_selection_cv: bool,
    /// Folds used by internal cross-validation
    #[serde(default = "default_n_folds")]
    pub model_selection_n_folds: usize,
}

impl MLMethodSpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: Params::new(),
            model_selection_cv: false,
            model_selection_n_folds: default_n_folds(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Declare a grid of candidate values for `name`
    pub fn with_grid(mut self, name: impl Into<String>, values: Vec<ParamValue>) -> Self {
        self.params.insert(name.into(), ParamValue::List(values));
        self
    }

    /// Enable internal cross-validation over the parameter grid
    pub fn with_model_selection(mut self, n_folds: usize) -> Self {
        self.model_selection_cv = true;
        self.model_selection_n_folds = n_folds;
        self
    }
}

/// One candidate combination of encoder, ML method and preprocessing
///
/// Two settings are equal when every name and spec is equal, so a setting
/// read back from a different worker still finds its ledger entries.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HPSetting {
    pub encoder_name: String,
    pub encoder: ComponentSpec,
    pub ml_method_name: String,
    pub ml_method: MLMethodSpec,
    #[serde(default)]
    pub preprocessing_name: Option<String>,
    #[serde(default)]
    pub preprocessing: Vec<ComponentSpec>,
}

impl HPSetting {
    pub fn new(
        encoder_name: impl Into<String>,
        encoder: ComponentSpec,
        ml_method_name: impl Into<String>,
        ml_method: MLMethodSpec,
    ) -> Self {
        Self {
            encoder_name: encoder_name.into(),
            encoder,
            ml_method_name: ml_method_name.into(),
            ml_method,
            preprocessing_name: None,
            preprocessing: Vec::new(),
        }
    }

    pub fn with_preprocessing(
        mut self,
        name: impl Into<String>,
        sequence: Vec<ComponentSpec>,
    ) -> Self {
        self.preprocessing_name = Some(name.into());
        self.preprocessing = sequence;
        self
    }

    /// Stable key: `{encoder}_{ml_method}` or `{preprocessing}_{encoder}_{ml_method}`
    pub fn key(&self) -> String {
        match &self.preprocessing_name {
            Some(prep) => format!("{prep}_{}_{}", self.encoder_name, self.ml_method_name),
            None => format!("{}_{}", self.encoder_name, self.ml_method_name),
        }
    }

    /// Component names in key order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.preprocessing_name
            .as_deref()
            .into_iter()
            .chain([self.encoder_name.as_str(), self.ml_method_name.as_str()])
    }

    /// Directory of this setting's item for `label` on a split
    pub fn item_dir_name(&self, label: &str, optimal: bool) -> String {
        item_dir_name(label, &self.key(), optimal)
    }
}

/// Suffix marking the directory of the optimal setting on an outer split
pub const OPTIMAL_MARKER: &str = "_optimal";

/// `{label}_{key}`, followed by [`OPTIMAL_MARKER`] when `optimal`
pub fn item_dir_name(label: &str, key: &str, optimal: bool) -> String {
    let marker = if optimal { OPTIMAL_MARKER } else { "" };
    format!("{label}_{key}{marker}")
}

/// Reason `name` cannot be used for a label or component, if any
///
/// Names end up in directory names, so they must stay a single path
/// component and must not imitate the optimal marker.
pub fn check_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        Some("is empty")
    } else if name.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if name.contains("..") {
        Some("contains '..'")
    } else if name.ends_with(OPTIMAL_MARKER) {
        Some("ends with the reserved '_optimal' marker")
    } else {
        None
    }
}

/// First item directory claimed by two different (label, setting) pairs
///
/// `keys` are setting keys in declaration order. Every pair owns two
/// directories (plain and marked optimal); the message names both owners.
pub fn find_item_dir_clash<L, K>(labels: &[L], keys: &[K]) -> Option<String>
where
    L: AsRef<str>,
    K: AsRef<str>,
{
    let mut owners: HashMap<String, (usize, usize)> = HashMap::new();
    for (label_index, label) in labels.iter().enumerate() {
        for (setting_index, key) in keys.iter().enumerate() {
            for optimal in [false, true] {
                let dir = item_dir_name(label.as_ref(), key.as_ref(), optimal);
                let owner = (label_index, setting_index);
                match owners.get(&dir) {
                    Some(&first) if first != owner => {
                        let describe = |(l, s): (usize, usize)| {
                            let (label, key) = (labels[l].as_ref(), keys[s].as_ref());
                            format!("setting {} ('{key}') for label '{label}'", s + 1)
                        };
                        return Some(format!(
                            "{} and {} would both write '{dir}'",
                            describe(first),
                            describe(owner)
                        ));
                    }
                    Some(_) => {}
                    None => {
                        owners.insert(dir, owner);
                    }
                }
            }
        }
    }
    None
}

impl fmt::Display for HPSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn setting(encoder: &str, method: &str) -> HPSetting {
        HPSetting::new(
            encoder,
            ComponentSpec::new("KmerFrequency").with_param("k", 3),
            method,
            MLMethodSpec::new("LogisticRegression").with_param("learning_rate", 0.1),
        )
    }

    #[test]
    fn test_key_without_preprocessing() {
        assert_eq!(setting("enc1", "ml1").key(), "enc1_ml1");
    }

    #[test]
    fn test_key_with_preprocessing() {
        let s = setting("enc1", "ml1").with_preprocessing("filt", vec![]);
        assert_eq!(s.key(), "filt_enc1_ml1");
        assert_eq!(s.to_string(), "filt_enc1_ml1");
    }

    #[test]
    fn test_item_dir_names() {
        let s = setting("enc1", "ml1").with_preprocessing("filt", vec![]);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["filt", "enc1", "ml1"]);
        assert_eq!(s.item_dir_name("status", false), "status_filt_enc1_ml1");
        assert_eq!(s.item_dir_name("status", true), "status_filt_enc1_ml1_optimal");
    }

    #[test]
    fn test_check_name() {
        assert_eq!(check_name("kmer_3"), None);
        assert!(check_name("").is_some());
        assert!(check_name("a/b").is_some());
        assert!(check_name("a\\b").is_some());
        assert!(check_name("..").is_some());
        assert!(check_name("centroid_optimal").is_some());
        assert_eq!(check_name("optimal_centroid"), None);
    }

    #[test]
    fn test_item_dir_clash_between_settings() {
        // preprocessing "filt" and an encoder named "filt_enc1" give the same key
        let keys = ["filt_enc1_ml1", "enc1_ml1", "filt_enc1_ml1"];
        let message = find_item_dir_clash(&["status"], &keys).unwrap();
        assert!(message.contains("setting 1"));
        assert!(message.contains("setting 3"));
        assert!(message.contains("'status_filt_enc1_ml1'"));
        assert_eq!(find_item_dir_clash(&["status"], &keys[..2]), None);
    }

    #[test]
    fn test_item_dir_clash_between_labels_and_markers() {
        let message = find_item_dir_clash(&["a", "a_b"], &["b_c", "c"]).unwrap();
        assert!(message.contains("label 'a'"));
        assert!(message.contains("label 'a_b'"));

        // a method called "optimal" looks like the marked directory of "enc"
        assert!(find_item_dir_clash(&["l"], &["enc_optimal", "enc"]).is_some());
    }

    #[test]
    fn test_structural_equality_and_hash() {
        let a = setting("enc1", "ml1");
        let b = setting("enc1", "ml1");
        let c = setting("enc1", "ml1").with_preprocessing("p", vec![]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        let set: HashSet<HPSetting> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_float_params_distinguish_settings() {
        let a = MLMethodSpec::new("LR").with_param("lr", 0.1);
        let b = MLMethodSpec::new("LR").with_param("lr", 0.2);
        assert_ne!(a, b);
    }

    #[test]
    fn test_param_reader_defaults_and_types() {
        let mut params = Params::new();
        params.insert("k".into(), ParamValue::Int(3));
        params.insert("scale".into(), ParamValue::Bool(true));
        params.insert("norm".into(), ParamValue::Str("l2".into()));
        let reader = ParamReader::new("KmerFrequency", &params);
        assert_eq!(reader.usize("k", 1).ok(), Some(3));
        assert_eq!(reader.f64("k", 0.0).ok(), Some(3.0));
        assert_eq!(reader.bool("scale", false).ok(), Some(true));
        assert_eq!(reader.string("norm", "none").ok().as_deref(), Some("l2"));
        assert_eq!(reader.usize("missing", 7).ok(), Some(7));
        let err = reader.usize("norm", 1).unwrap_err();
        assert!(err.to_string().contains("KmerFrequency.norm"));
    }

    #[test]
    fn test_param_value_deserializes_untagged() {
        let params: Params =
            serde_yaml::from_str("k: 3\nrate: 0.5\nflag: true\nname: abc\ngrid: [0.1, 1.0]\n")
                .unwrap();
        assert_eq!(params["k"], ParamValue::Int(3));
        assert_eq!(params["rate"], ParamValue::Float(0.5));
        assert_eq!(params["flag"], ParamValue::Bool(true));
        assert_eq!(params["name"], ParamValue::Str("abc".into()));
        assert!(params["grid"].is_list());
    }

    #[test]
    fn test_ml_method_spec_defaults_from_yaml() {
        let spec: MLMethodSpec = serde_yaml::from_str("type: NearestCentroid\n").unwrap();
        assert_eq!(spec.kind, "NearestCentroid");
        assert!(!spec.model_selection_cv);
        assert_eq!(spec.model_selection_n_folds, 5);
    }

    #[test]
    fn test_list_display() {
        let v = ParamValue::List(vec![ParamValue::Int(1), ParamValue::Float(0.5)]);
        assert_eq!(v.to_string(), "[1, 0.5]");
    }
}
