//! Component registry
//!
//! Settings and configurations refer to encoders, ML methods, preprocessors
//! and reports by name. The [`Registry`] turns a name plus parameters into a
//! fresh component, so every fit starts from an unfitted instance.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::encoding::{Encoder, KmerFrequencyEncoder, Normalization, SequenceEncoding};
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{ComponentSpec, ParamReader, Params};
use crate::ml_methods::{LogisticRegression, MLMethod, NearestCentroid};
use crate::preprocessing::{DuplicateSequenceFilter, Preprocessor, SequenceLengthFilter};
use crate::reports::{
    DatasetSummary, DesignMatrixExporter, ModelParameters, PerformanceOverview, Report,
};

pub type EncoderFactory = Arc<dyn Fn(&Params) -> Result<Box<dyn Encoder>> + Send + Sync>;
pub type MLMethodFactory = Arc<dyn Fn(&Params) -> Result<Box<dyn MLMethod>> + Send + Sync>;
pub type PreprocessorFactory =
    Arc<dyn Fn(&Params) -> Result<Box<dyn Preprocessor>> + Send + Sync>;
pub type ReportFactory = Arc<dyn Fn(&Params) -> Result<Arc<dyn Report>> + Send + Sync>;

/// Name -> factory tables for every pluggable component
#[derive(Clone, Default)]
pub struct Registry {
    encoders: BTreeMap<String, EncoderFactory>,
    ml_methods: BTreeMap<String, MLMethodFactory>,
    preprocessors: BTreeMap<String, PreprocessorFactory>,
    reports: BTreeMap<String, ReportFactory>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("ml_methods", &self.ml_methods.keys().collect::<Vec<_>>())
            .field("preprocessors", &self.preprocessors.keys().collect::<Vec<_>>())
            .field("reports", &self.reports.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn kmer_encoder(params: &Params) -> Result<Box<dyn Encoder>> {
    let reader = ParamReader::new("KmerFrequency", params);
    let sequence_encoding = match reader.string("sequence_encoding", "continuous_kmer")?.as_str() {
        "continuous_kmer" => SequenceEncoding::Continuous { k: reader.usize("k", 3)? },
        "gapped_kmer" => SequenceEncoding::Gapped {
            k_left: reader.usize("k_left", 1)?,
            k_right: reader.usize("k_right", 1)?,
            min_gap: reader.usize("min_gap", 0)?,
            max_gap: reader.usize("max_gap", 0)?,
        },
        other => {
            return Err(Error::config(
                "KmerFrequency.sequence_encoding",
                format!("'{other}' is not one of: continuous_kmer, gapped_kmer"),
            ))
        }
    };
    let normalization: Normalization =
        reader.string("normalization_type", "relative_frequency")?.parse()?;
    Ok(Box::new(
        KmerFrequencyEncoder::new(sequence_encoding)
            .with_normalization(normalization)
            .with_scaling(reader.bool("scale_to_unit_variance", false)?),
    ))
}

fn length_filter(params: &Params) -> Result<Box<dyn Preprocessor>> {
    let reader = ParamReader::new("SequenceLengthFilter", params);
    Ok(Box::new(SequenceLengthFilter::new(
        reader.usize("min_length", 0)?,
        reader.usize("max_length", usize::MAX)?,
    )?))
}

impl Registry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in component
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_encoder("KmerFrequency", kmer_encoder);
        registry.register_ml_method("NearestCentroid", |p| {
            Ok(Box::new(NearestCentroid::from_params(p)?) as Box<dyn MLMethod>)
        });
        registry.register_ml_method("LogisticRegression", |p| {
            Ok(Box::new(LogisticRegression::from_params(p)?) as Box<dyn MLMethod>)
        });
        registry.register_preprocessor("SequenceLengthFilter", length_filter);
        registry.register_preprocessor("DuplicateSequenceFilter", |_| {
            Ok(Box::new(DuplicateSequenceFilter) as Box<dyn Preprocessor>)
        });
        registry.register_report("DatasetSummary", |_| Ok(Arc::new(DatasetSummary) as Arc<dyn Report>));
        registry.register_report("DesignMatrixExporter", |_| {
            Ok(Arc::new(DesignMatrixExporter) as Arc<dyn Report>)
        });
        registry.register_report("ModelParameters", |_| Ok(Arc::new(ModelParameters) as Arc<dyn Report>));
        registry.register_report("PerformanceOverview", |_| {
            Ok(Arc::new(PerformanceOverview) as Arc<dyn Report>)
        });
        registry
    }

    pub fn register_encoder<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Box<dyn Encoder>> + Send + Sync + 'static,
    {
        self.encoders.insert(name.into(), Arc::new(factory));
    }

    pub fn register_ml_method<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Box<dyn MLMethod>> + Send + Sync + 'static,
    {
        self.ml_methods.insert(name.into(), Arc::new(factory));
    }

    pub fn register_preprocessor<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Box<dyn Preprocessor>> + Send + Sync + 'static,
    {
        self.preprocessors.insert(name.into(), Arc::new(factory));
    }

    pub fn register_report<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Arc<dyn Report>> + Send + Sync + 'static,
    {
        self.reports.insert(name.into(), Arc::new(factory));
    }

    /// Fresh encoder for `spec`
    pub fn encoder(&self, spec: &ComponentSpec) -> Result<Box<dyn Encoder>> {
        let factory = self.encoders.get(&spec.kind).ok_or_else(|| Error::UnknownComponent {
            kind: "encoder",
            name: spec.kind.clone(),
        })?;
        factory(&spec.params)
    }

    /// Fresh, unfitted ML method
    pub fn ml_method(&self, kind: &str, params: &Params) -> Result<Box<dyn MLMethod>> {
        let factory = self.ml_methods.get(kind).ok_or_else(|| Error::UnknownComponent {
            kind: "ML method",
            name: kind.to_string(),
        })?;
        factory(params)
    }

    /// Preprocessors for a sequence of specs, in order
    pub fn preprocessing(&self, specs: &[ComponentSpec]) -> Result<Vec<Box<dyn Preprocessor>>> {
        specs
            .iter()
            .map(|spec| {
                let factory =
                    self.preprocessors.get(&spec.kind).ok_or_else(|| Error::UnknownComponent {
                        kind: "preprocessor",
                        name: spec.kind.clone(),
                    })?;
                factory(&spec.params)
            })
            .collect()
    }

    pub fn report(&self, spec: &ComponentSpec) -> Result<Arc<dyn Report>> {
        let factory = self.reports.get(&spec.kind).ok_or_else(|| Error::UnknownComponent {
            kind: "report",
            name: spec.kind.clone(),
        })?;
        factory(&spec.params)
    }

    pub fn has_encoder(&self, name: &str) -> bool {
        self.encoders.contains_key(name)
    }

    pub fn has_ml_method(&self, name: &str) -> bool {
        self.ml_methods.contains_key(name)
    }

    pub fn has_preprocessor(&self, name: &str) -> bool {
        self.preprocessors.contains_key(name)
    }

    pub fn has_report(&self, name: &str) -> bool {
        self.reports.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hyperparameter_optimization::ParamValue;

    #[test]
    fn test_builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert!(registry.has_encoder("KmerFrequency"));
        assert!(registry.has_ml_method("LogisticRegression"));
        assert!(registry.has_ml_method("NearestCentroid"));
        assert!(registry.has_preprocessor("SequenceLengthFilter"));
        assert!(registry.has_report("PerformanceOverview"));
        assert!(!registry.has_encoder("OneHot"));
    }

    #[test]
    fn test_unknown_component_names_kind() {
        let registry = Registry::with_builtins();
        let err = registry.encoder(&ComponentSpec::new("Word2Vec")).unwrap_err();
        assert!(matches!(err, Error::UnknownComponent { kind: "encoder", .. }));
        let err = registry.ml_method("SVM", &Params::new()).unwrap_err();
        assert!(err.to_string().contains("SVM"));
    }

    #[test]
    fn test_kmer_encoder_params_are_checked() {
        let registry = Registry::with_builtins();
        let spec = ComponentSpec::new("KmerFrequency").with_param("sequence_encoding", "spaced");
        assert!(matches!(registry.encoder(&spec), Err(Error::Config { .. })));
        let spec = ComponentSpec::new("KmerFrequency")
            .with_param("sequence_encoding", "gapped_kmer")
            .with_param("max_gap", 2);
        assert_eq!(registry.encoder(&spec).unwrap().name(), "KmerFrequency");
    }

    #[test]
    fn test_preprocessing_sequence_in_order() {
        let registry = Registry::with_builtins();
        let specs = vec![
            ComponentSpec::new("DuplicateSequenceFilter"),
            ComponentSpec::new("SequenceLengthFilter")
                .with_param("min_length", 3)
                .with_param("max_length", 20),
        ];
        let sequence = registry.preprocessing(&specs).unwrap();
        let names: Vec<&str> = sequence.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["DuplicateSequenceFilter", "SequenceLengthFilter"]);
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = Registry::new();
        registry.register_ml_method("Centroid", |p| {
            Ok(Box::new(NearestCentroid::from_params(p)?) as Box<dyn MLMethod>)
        });
        let mut params = Params::new();
        params.insert("distance".into(), ParamValue::Str("manhattan".into()));
        assert_eq!(registry.ml_method("Centroid", &params).unwrap().name(), "NearestCentroid");
        assert!(format!("{registry:?}").contains("Centroid"));
    }
}
