use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::error::ImpactResult;
use crate::feature_vector::FeatureRow;

/// An already-fitted season-outcome model. Fitting and selection live elsewhere.
pub trait Predictor {
    /// Declared, order-sensitive input columns.
    fn feature_columns(&self) -> &[String];

    /// Scores one row laid out in [`Predictor::feature_columns`] order.
    fn predict(&self, row: &FeatureRow) -> ImpactResult<f64>;
}

/// Impute, standardise, then a linear read-out. Trend columns are usually
/// imputed with 0 and left unscaled (mean 0, std 1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearPredictorArtifact {
    pub version: u32,
    #[serde(default)]
    pub generated_at: String,
    #[serde(default)]
    pub target: String,
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub impute_values: Vec<f64>,
    #[serde(default)]
    pub feature_means: Vec<f64>,
    #[serde(default)]
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

#[derive(Debug, Clone)]
pub struct LinearPredictor {
    artifact: LinearPredictorArtifact,
}

impl LinearPredictor {
    pub fn from_artifact(artifact: LinearPredictorArtifact) -> Result<Self> {
        let n = artifact.feature_names.len();
        if n == 0 {
            return Err(anyhow!("predictor artifact declares no features"));
        }
        if artifact.coeffs.len() != n {
            return Err(anyhow!(
                "predictor artifact has {} coeffs for {} features",
                artifact.coeffs.len(),
                n
            ));
        }
        for (label, v) in [
            ("impute_values", &artifact.impute_values),
            ("feature_means", &artifact.feature_means),
            ("feature_stds", &artifact.feature_stds),
        ] {
            if !v.is_empty() && v.len() != n {
                return Err(anyhow!("predictor artifact {label} has {} entries, expected {n}", v.len()));
            }
        }
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &LinearPredictorArtifact {
        &self.artifact
    }

    fn standardized(&self, raw: f64, idx: usize) -> f64 {
        let mean = self.artifact.feature_means.get(idx).copied().unwrap_or(0.0);
        let std = self
            .artifact
            .feature_stds
            .get(idx)
            .copied()
            .unwrap_or(1.0)
            .max(1e-6);
        (raw - mean) / std
    }
}

impl Predictor for LinearPredictor {
    fn feature_columns(&self) -> &[String] {
        &self.artifact.feature_names
    }

    fn predict(&self, row: &FeatureRow) -> ImpactResult<f64> {
        row.ensure_schema(&self.artifact.feature_names)?;
        let mut sum = self.artifact.intercept;
        for (idx, (value, coeff)) in row.values.iter().zip(&self.artifact.coeffs).enumerate() {
            let raw = value
                .as_f64()
                .unwrap_or_else(|| self.artifact.impute_values.get(idx).copied().unwrap_or(0.0));
            sum += coeff * self.standardized(raw, idx);
        }
        Ok(sum)
    }
}

pub fn load_linear_predictor(path: &Path) -> Result<LinearPredictor> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read predictor artifact {}", path.display()))?;
    let artifact = serde_json::from_str::<LinearPredictorArtifact>(&raw)
        .with_context(|| format!("parse predictor artifact {}", path.display()))?;
    LinearPredictor::from_artifact(artifact)
        .with_context(|| format!("validate predictor artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImpactError;
    use crate::feature_vector::FeatureValue;
    use crate::season::Season;

    fn artifact() -> LinearPredictorArtifact {
        LinearPredictorArtifact {
            version: 1,
            generated_at: "x".to_string(),
            target: "points".to_string(),
            feature_names: vec!["last1_gls_per90".to_string(), "trend_gls_per90".to_string()],
            impute_values: vec![1.5, 0.0],
            feature_means: vec![1.0, 0.0],
            feature_stds: vec![0.5, 1.0],
            coeffs: vec![10.0, 2.0],
            intercept: 50.0,
        }
    }

    fn row(values: Vec<FeatureValue>) -> FeatureRow {
        FeatureRow {
            season: Season::new(2024),
            squad: "Town FC".to_string(),
            columns: artifact().feature_names,
            values,
        }
    }

    #[test]
    fn scores_standardized_linear_sum() {
        let model = LinearPredictor::from_artifact(artifact()).unwrap();
        let y = model
            .predict(&row(vec![FeatureValue::Present(2.0), FeatureValue::StructuralZero]))
            .unwrap();
        assert!((y - 70.0).abs() < 1e-12);
    }

    #[test]
    fn missing_values_are_imputed() {
        let model = LinearPredictor::from_artifact(artifact()).unwrap();
        let y = model
            .predict(&row(vec![FeatureValue::Missing, FeatureValue::Present(-1.0)]))
            .unwrap();
        assert!((y - (50.0 + 10.0 - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn rejects_rows_in_wrong_order() {
        let model = LinearPredictor::from_artifact(artifact()).unwrap();
        let mut r = row(vec![FeatureValue::Missing, FeatureValue::Missing]);
        r.columns.reverse();
        assert!(matches!(model.predict(&r), Err(ImpactError::SchemaMismatch(_))));
    }

    #[test]
    fn rejects_inconsistent_artifacts() {
        let mut bad = artifact();
        bad.coeffs.pop();
        assert!(LinearPredictor::from_artifact(bad).is_err());
        let mut bad_std = artifact();
        bad_std.feature_stds = vec![1.0];
        assert!(LinearPredictor::from_artifact(bad_std).is_err());
    }
}
