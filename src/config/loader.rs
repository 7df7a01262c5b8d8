//! Loading run descriptions from YAML or JSON

use std::fs;
use std::path::Path;

use crate::config::schema::TrainMLModelSpec;
use crate::config::validate::validate_config;
use crate::error::{Error, Result};

impl TrainMLModelSpec {
    /// Parse and validate a YAML description
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let spec: TrainMLModelSpec = serde_yaml::from_str(yaml)?;
        validate_config(&spec)?;
        Ok(spec)
    }

    /// Parse and validate a JSON description
    pub fn from_json_str(json: &str) -> Result<Self> {
        let spec: TrainMLModelSpec = serde_json::from_str(json)?;
        validate_config(&spec)?;
        Ok(spec)
    }
}

/// Load a run description from a file
///
/// Files ending in `.json` are read as JSON, everything else as YAML.
pub fn load_config<P: AsRef<Path>>(config_path: P) -> Result<TrainMLModelSpec> {
    let path = config_path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| Error::io(format!("reading config file {}", path.display()), e))?;

    let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let spec = if is_json {
        TrainMLModelSpec::from_json_str(&content)?
    } else {
        TrainMLModelSpec::from_yaml_str(&content)?
    };
    tracing::debug!(
        path = %path.display(),
        settings = spec.settings.len(),
        labels = spec.labels.len(),
        "loaded run description"
    );
    Ok(spec)
}
