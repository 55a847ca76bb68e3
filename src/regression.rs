//! Weight vs. average tumor volume: Pearson correlation and OLS fit
//!
//! Operates on per-mouse averages over the clean dataset, restricted to a
//! single regimen. A zero-variance input axis is a distinct degenerate-input
//! error so NaN never leaks into the report.

use crate::dataset::StudyRecord;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors for correlation/regression computation
#[derive(Error, Debug, PartialEq)]
pub enum RegressionError {
    #[error("degenerate input: {axis} values have zero variance across {mice} mice")]
    DegenerateInput { axis: &'static str, mice: usize },

    #[error("insufficient data: need at least {required} mice, got {actual}")]
    InsufficientData { required: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, RegressionError>;

/// Per-mouse averages over all of the mouse's clean rows
#[derive(Debug, Clone, PartialEq)]
pub struct MouseAverages {
    pub mouse_id: String,
    pub weight_g: f64,
    pub tumor_volume: f64,
}

/// Pearson r plus the OLS line of tumor volume on weight
#[derive(Debug, Clone, PartialEq)]
pub struct WeightVolumeFit {
    pub r: f64,
    pub slope: f64,
    pub intercept: f64,
    pub mice: usize,
}

/// Average weight and tumor volume per mouse for one regimen, in
/// mouse-id order.
///
/// Weight is constant per mouse in well-formed metadata; averaging it the
/// same way as tumor volume keeps the two vectors aligned row-for-row.
pub fn mouse_averages(records: &[StudyRecord], regimen: &str) -> Vec<MouseAverages> {
    let mut sums: BTreeMap<&str, (f64, f64, u32)> = BTreeMap::new();
    for record in records {
        let Some(info) = &record.info else { continue };
        if info.drug_regimen != regimen {
            continue;
        }
        let entry = sums.entry(record.mouse_id.as_str()).or_default();
        entry.0 += f64::from(info.weight_g);
        entry.1 += f64::from(record.tumor_volume);
        entry.2 += 1;
    }
    sums.into_iter()
        .map(|(mouse_id, (weight, volume, n))| MouseAverages {
            mouse_id: mouse_id.to_string(),
            weight_g: weight / f64::from(n),
            tumor_volume: volume / f64::from(n),
        })
        .collect()
}

const VARIANCE_FLOOR: f64 = 1e-12;

/// Fit tumor volume against weight: Pearson r, OLS slope and intercept
pub fn fit_weight_volume(points: &[MouseAverages]) -> Result<WeightVolumeFit> {
    if points.len() < 2 {
        return Err(RegressionError::InsufficientData {
            required: 2,
            actual: points.len(),
        });
    }

    let n = points.len() as f64;
    let mean_w = points.iter().map(|p| p.weight_g).sum::<f64>() / n;
    let mean_v = points.iter().map(|p| p.tumor_volume).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_w = 0.0;
    let mut var_v = 0.0;
    for p in points {
        let dw = p.weight_g - mean_w;
        let dv = p.tumor_volume - mean_v;
        cov += dw * dv;
        var_w += dw * dw;
        var_v += dv * dv;
    }

    if var_w < VARIANCE_FLOOR {
        return Err(RegressionError::DegenerateInput {
            axis: "weight",
            mice: points.len(),
        });
    }
    if var_v < VARIANCE_FLOOR {
        return Err(RegressionError::DegenerateInput {
            axis: "tumor volume",
            mice: points.len(),
        });
    }

    let r = cov / (var_w.sqrt() * var_v.sqrt());
    let slope = cov / var_w;
    let intercept = mean_v - slope * mean_w;

    Ok(WeightVolumeFit {
        r,
        slope,
        intercept,
        mice: points.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{MouseInfo, Sex};

    fn record(mouse_id: &str, regimen: &str, timepoint: u32, volume: f32, weight: f32) -> StudyRecord {
        StudyRecord {
            mouse_id: mouse_id.to_string(),
            timepoint,
            tumor_volume: volume,
            metastatic_sites: 0,
            info: Some(MouseInfo {
                drug_regimen: regimen.to_string(),
                sex: Sex::Male,
                age_months: 20,
                weight_g: weight,
            }),
        }
    }

    fn points(weights: &[f64], volumes: &[f64]) -> Vec<MouseAverages> {
        weights
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&w, &v))| MouseAverages {
                mouse_id: format!("m{i}"),
                weight_g: w,
                tumor_volume: v,
            })
            .collect()
    }

    #[test]
    fn test_mouse_averages_restricted_to_regimen() {
        let records = vec![
            record("a1", "Capomulin", 0, 40.0, 20.0),
            record("a1", "Capomulin", 5, 44.0, 20.0),
            record("b2", "Ramicane", 0, 48.0, 18.0),
        ];
        let averages = mouse_averages(&records, "Capomulin");
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].mouse_id, "a1");
        assert!((averages[0].tumor_volume - 42.0).abs() < 1e-9);
        assert!((averages[0].weight_g - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_perfectly_linear_input() {
        let fit = fit_weight_volume(&points(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0])).unwrap();
        assert!((fit.r - 1.0).abs() < 1e-6);
        assert!((fit.slope - 2.0).abs() < 1e-6);
        assert!(fit.intercept.abs() < 1e-6);
        assert_eq!(fit.mice, 3);
    }

    #[test]
    fn test_negative_correlation() {
        let fit = fit_weight_volume(&points(&[1.0, 2.0, 3.0], &[6.0, 4.0, 2.0])).unwrap();
        assert!((fit.r + 1.0).abs() < 1e-6);
        assert!((fit.slope + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_r_stays_in_unit_interval() {
        let fit = fit_weight_volume(&points(&[1.0, 2.0, 3.0, 4.0], &[2.1, 3.9, 6.2, 7.8])).unwrap();
        assert!(fit.r > 0.99 && fit.r <= 1.0);
    }

    #[test]
    fn test_zero_weight_variance_is_degenerate_not_nan() {
        let err = fit_weight_volume(&points(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0])).unwrap_err();
        assert_eq!(
            err,
            RegressionError::DegenerateInput {
                axis: "weight",
                mice: 3
            }
        );
    }

    #[test]
    fn test_zero_volume_variance_is_degenerate() {
        let err = fit_weight_volume(&points(&[1.0, 2.0, 3.0], &[4.0, 4.0, 4.0])).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateInput { axis, .. } if axis == "tumor volume"));
    }

    #[test]
    fn test_fewer_than_two_mice_insufficient() {
        let err = fit_weight_volume(&points(&[5.0], &[1.0])).unwrap_err();
        assert_eq!(
            err,
            RegressionError::InsufficientData {
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_intercept_passes_through_means() {
        let pts = points(&[10.0, 20.0, 30.0], &[30.0, 40.0, 56.0]);
        let fit = fit_weight_volume(&pts).unwrap();
        let mean_w: f64 = pts.iter().map(|p| p.weight_g).sum::<f64>() / 3.0;
        let mean_v: f64 = pts.iter().map(|p| p.tumor_volume).sum::<f64>() / 3.0;
        assert!((fit.slope * mean_w + fit.intercept - mean_v).abs() < 1e-9);
    }
}
