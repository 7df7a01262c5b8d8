//! Nearest centroid classifier

use std::str::FromStr;

use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_features, training_targets, MLMethod};
use crate::data::Label;
use crate::encoding::EncodedData;
use crate::error::{Error, Result};
use crate::hyperparameter_optimization::{ParamReader, Params};

/// Distance between an example and a class centroid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    Euclidean,
    Manhattan,
}

impl Distance {
    fn between(self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match self {
            Self::Euclidean => a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            Self::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Manhattan => "manhattan",
        }
    }
}

impl FromStr for Distance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "euclidean" => Ok(Self::Euclidean),
            "manhattan" => Ok(Self::Manhattan),
            other => Err(Error::config("NearestCentroid.distance", format!("unknown distance '{other}'"))),
        }
    }
}

/// Assigns each example to the class with the closest mean feature vector
#[derive(Clone, Debug, Default)]
pub struct NearestCentroid {
    distance: Distance,
    centroids: Option<Array2<f64>>,
    classes: Vec<String>,
}

impl NearestCentroid {
    pub fn new(distance: Distance) -> Self {
        Self { distance, ..Self::default() }
    }

    /// Build from configuration parameters (`distance`)
    pub fn from_params(params: &Params) -> Result<Self> {
        let reader = ParamReader::new("NearestCentroid", params);
        Ok(Self::new(reader.string("distance", "euclidean")?.parse()?))
    }

    fn fitted(&self) -> Result<&Array2<f64>> {
        self.centroids.as_ref().ok_or_else(|| Error::fit("NearestCentroid", "model is not fitted"))
    }
}

impl MLMethod for NearestCentroid {
    fn name(&self) -> &str {
        "NearestCentroid"
    }

    fn fit(&mut self, data: &EncodedData, label: &Label, _cores_for_training: usize) -> Result<()> {
        let (y, classes) = training_targets(data, label)?;
        let mut centroids = Array2::<f64>::zeros((classes.len(), data.n_features()));
        for (c, class) in classes.iter().enumerate() {
            let rows: Vec<usize> =
                y.iter().enumerate().filter(|(_, v)| *v == class).map(|(i, _)| i).collect();
            let members = data.examples.select(Axis(0), &rows);
            if let Some(mean) = members.mean_axis(Axis(0)) {
                centroids.row_mut(c).assign(&mean);
            }
        }
        self.centroids = Some(centroids);
        self.classes = classes;
        Ok(())
    }

    fn predict(&self, data: &EncodedData, _label: &Label) -> Result<Vec<String>> {
        let centroids = self.fitted()?;
        check_features(self.name(), centroids.ncols(), data)?;
        Ok(data
            .examples
            .outer_iter()
            .map(|row| {
                let mut best = 0;
                let mut best_distance = f64::INFINITY;
                for (c, centroid) in centroids.outer_iter().enumerate() {
                    let d = self.distance.between(row, centroid);
                    if d < best_distance {
                        best = c;
                        best_distance = d;
                    }
                }
                self.classes[best].clone()
            })
            .collect())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn get_params(&self) -> serde_json::Value {
        json!({
            "distance": self.distance.as_str(),
            "classes": self.classes,
            "centroids": self
                .centroids
                .as_ref()
                .map(|c| c.outer_iter().map(|row| row.to_vec()).collect::<Vec<_>>()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml_methods::test_support::separable;

    #[test]
    fn test_predicts_training_clusters() {
        let data = separable("status");
        let label = Label::new("status", ["a", "b"]);
        let mut model = NearestCentroid::default();
        model.fit(&data, &label, 1).unwrap();
        let predictions = model.predict(&data, &label).unwrap();
        assert_eq!(predictions, data.labels["status"]);
        assert!(!model.can_predict_proba());
    }

    #[test]
    fn test_manhattan_from_params() {
        let mut params = Params::new();
        params.insert("distance".into(), "manhattan".into());
        let model = NearestCentroid::from_params(&params).unwrap();
        assert_eq!(model.distance, Distance::Manhattan);
        assert_eq!(model.get_params()["distance"], "manhattan");
    }

    #[test]
    fn test_unknown_distance_rejected() {
        let mut params = Params::new();
        params.insert("distance".into(), "cosine".into());
        assert!(matches!(NearestCentroid::from_params(&params), Err(Error::Config { .. })));
    }

    #[test]
    fn test_predict_before_fit_fails() {
        let data = separable("status");
        let label = Label::new("status", ["a", "b"]);
        let err = NearestCentroid::default().predict(&data, &label).unwrap_err();
        assert!(matches!(err, Error::Fit { .. }));
    }

    #[test]
    fn test_store_writes_json() {
        let data = separable("status");
        let label = Label::new("status", ["a", "b"]);
        let mut model = NearestCentroid::default();
        model.fit(&data, &label, 1).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = model.store(dir.path()).unwrap();
        assert!(path.ends_with("NearestCentroid.json"));
        let stored: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(stored["classes"], json!(["a", "b"]));
    }
}
