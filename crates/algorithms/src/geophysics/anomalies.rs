//! Sigma-threshold anomaly detection on point values

use serde::Serialize;
use terraf_core::vector::{SamplePoint, SparsePointSet};
use terraf_core::{Error, Result};

/// High and low anomalies of a point set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub mean: f64,
    pub std: f64,
    pub upper_threshold: f64,
    pub lower_threshold: f64,
    /// Indices into the input points with value > upper threshold
    pub high: Vec<usize>,
    /// Indices into the input points with value < lower threshold
    pub low: Vec<usize>,
}

fn mean_std(values: impl Iterator<Item = f64> + Clone) -> Option<(f64, f64)> {
    let n = values.clone().count();
    if n == 0 {
        return None;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    Some((mean, var.sqrt()))
}

/// Z-score the values (population std). Non-finite points are dropped.
pub fn standardize(points: &SparsePointSet) -> Result<SparsePointSet> {
    let finite = points.finite_points();
    let (mean, std) = mean_std(finite.iter().map(|p| p.value)).ok_or_else(|| {
        Error::Interpolation(format!("point set '{}' has no finite samples", points.label))
    })?;
    if std <= 0.0 {
        return Err(Error::Interpolation(format!(
            "point set '{}' has zero variance",
            points.label
        )));
    }
    Ok(SparsePointSet::new(
        points.label.clone(),
        finite
            .into_iter()
            .map(|p| SamplePoint::new(p.x, p.y, (p.value - mean) / std))
            .collect(),
    ))
}

/// Points beyond `mean ± sigma·std` of the finite values
pub fn detect_anomalies(points: &SparsePointSet, sigma: f64) -> Result<AnomalyReport> {
    if !(sigma > 0.0) {
        return Err(Error::InvalidParameter {
            name: "sigma",
            value: sigma.to_string(),
            reason: "must be > 0".into(),
        });
    }
    let finite = points.points.iter().map(|p| p.value).filter(|v| v.is_finite());
    let (mean, std) = mean_std(finite).ok_or_else(|| {
        Error::Interpolation(format!("point set '{}' has no finite samples", points.label))
    })?;

    let upper_threshold = mean + sigma * std;
    let lower_threshold = mean - sigma * std;
    let mut high = Vec::new();
    let mut low = Vec::new();
    for (i, p) in points.points.iter().enumerate() {
        if p.value > upper_threshold {
            high.push(i);
        } else if p.value < lower_threshold {
            low.push(i);
        }
    }

    Ok(AnomalyReport {
        mean,
        std,
        upper_threshold,
        lower_threshold,
        high,
        low,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(values: &[f64]) -> SparsePointSet {
        SparsePointSet::new(
            "mag",
            values
                .iter()
                .enumerate()
                .map(|(i, &v)| SamplePoint::new(i as f64, 0.0, v))
                .collect(),
        )
    }

    #[test]
    fn test_detect_high_and_low() {
        let mut values = vec![0.0; 20];
        values[3] = 10.0;
        values[11] = -10.0;
        let report = detect_anomalies(&line(&values), 2.0).unwrap();
        assert_eq!(report.high, vec![3]);
        assert_eq!(report.low, vec![11]);
    }

    #[test]
    fn test_standardize() {
        let z = standardize(&line(&[1.0, 3.0, f64::NAN])).unwrap();
        assert_eq!(z.len(), 2);
        assert_eq!(z.points[0].value, -1.0);
        assert_eq!(z.points[1].value, 1.0);
        assert!(standardize(&line(&[2.0, 2.0])).is_err());
    }

    #[test]
    fn test_sigma_must_be_positive() {
        assert!(detect_anomalies(&line(&[1.0, 2.0]), 0.0).is_err());
    }
}
