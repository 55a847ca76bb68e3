//! Report formatting: text, JSON, and CSV
//!
//! The text form is the human-facing run output; JSON and CSV mirror the
//! same numbers for machine parsing. JSON uses dedicated mirror structs so
//! the wire shape is independent of the analysis internals.

use crate::analysis::{RegressionOutcome, StudyAnalysis};
use crate::outliers::OutlierOutcome;
use serde::Serialize;
use std::fmt::Write as _;

/// Per-regimen summary row
#[derive(Debug, Clone, Serialize)]
pub struct JsonRegimenSummary {
    pub regimen: String,
    pub samples: usize,
    pub mean: f32,
    pub median: f32,
    pub variance: f32,
    pub std_dev: f32,
    pub sem: f32,
}

/// Measurement count for one regimen
#[derive(Debug, Clone, Serialize)]
pub struct JsonRegimenCount {
    pub regimen: String,
    pub measurements: u32,
}

/// Row count for one sex
#[derive(Debug, Clone, Serialize)]
pub struct JsonSexCount {
    pub sex: String,
    pub measurements: u32,
}

/// A flagged final tumor volume
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutlier {
    pub mouse_id: String,
    pub tumor_volume: f32,
}

/// Outlier analysis for one regimen; `skipped` carries the reason when the
/// fences could not be computed
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutlierReport {
    pub regimen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q1: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q3: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f32>,
    pub outliers: Vec<JsonOutlier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Correlation/regression block
#[derive(Debug, Clone, Serialize)]
pub struct JsonRegression {
    pub regimen: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intercept: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mice: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Root JSON report structure
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub total_mice: usize,
    pub clean_mice: usize,
    pub excluded_mice: Vec<String>,
    pub summary: Vec<JsonRegimenSummary>,
    pub regimen_counts: Vec<JsonRegimenCount>,
    pub sex_counts: Vec<JsonSexCount>,
    pub outliers: Vec<JsonOutlierReport>,
    pub regression: JsonRegression,
}

impl From<&StudyAnalysis> for JsonReport {
    fn from(analysis: &StudyAnalysis) -> Self {
        let outliers = analysis
            .outliers
            .iter()
            .map(|outcome| match outcome {
                OutlierOutcome::Computed(report) => JsonOutlierReport {
                    regimen: report.regimen.clone(),
                    samples: Some(report.samples),
                    q1: Some(report.q1),
                    q3: Some(report.q3),
                    lower_bound: Some(report.lower_bound),
                    upper_bound: Some(report.upper_bound),
                    outliers: report
                        .outliers
                        .iter()
                        .map(|o| JsonOutlier {
                            mouse_id: o.mouse_id.clone(),
                            tumor_volume: o.tumor_volume,
                        })
                        .collect(),
                    skipped: None,
                },
                OutlierOutcome::Skipped { regimen, reason } => JsonOutlierReport {
                    regimen: regimen.clone(),
                    samples: None,
                    q1: None,
                    q3: None,
                    lower_bound: None,
                    upper_bound: None,
                    outliers: Vec::new(),
                    skipped: Some(reason.clone()),
                },
            })
            .collect();

        let regression = match &analysis.regression {
            RegressionOutcome::Fitted(fit) => JsonRegression {
                regimen: analysis.focus_regimen.clone(),
                r: Some(fit.r),
                slope: Some(fit.slope),
                intercept: Some(fit.intercept),
                mice: Some(fit.mice),
                error: None,
            },
            RegressionOutcome::Unavailable { reason } => JsonRegression {
                regimen: analysis.focus_regimen.clone(),
                r: None,
                slope: None,
                intercept: None,
                mice: None,
                error: Some(reason.clone()),
            },
        };

        JsonReport {
            total_mice: analysis.total_mice,
            clean_mice: analysis.clean_mice,
            excluded_mice: analysis.excluded_mice.clone(),
            summary: analysis
                .summaries
                .iter()
                .map(|s| JsonRegimenSummary {
                    regimen: s.regimen.clone(),
                    samples: s.samples,
                    mean: s.mean,
                    median: s.median,
                    variance: s.variance,
                    std_dev: s.std_dev,
                    sem: s.sem,
                })
                .collect(),
            regimen_counts: analysis
                .regimen_counts
                .iter()
                .map(|(regimen, count)| JsonRegimenCount {
                    regimen: regimen.clone(),
                    measurements: *count,
                })
                .collect(),
            sex_counts: analysis
                .sex_counts
                .iter()
                .map(|(sex, count)| JsonSexCount {
                    sex: sex.to_string(),
                    measurements: *count,
                })
                .collect(),
            outliers,
            regression,
        }
    }
}

/// Pretty-printed JSON report
pub fn render_json(analysis: &StudyAnalysis) -> anyhow::Result<String> {
    let report = JsonReport::from(analysis);
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Escape CSV field (handle commas, quotes, newlines)
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Regimen summary table as CSV
pub fn render_csv(analysis: &StudyAnalysis) -> String {
    let mut output = String::new();
    output.push_str("drug_regimen,samples,mean,median,variance,std_dev,sem\n");
    for s in &analysis.summaries {
        let _ = writeln!(
            output,
            "{},{},{:.4},{:.4},{:.4},{:.4},{:.4}",
            escape_field(&s.regimen),
            s.samples,
            s.mean,
            s.median,
            s.variance,
            s.std_dev,
            s.sem
        );
    }
    output
}

/// Human-readable report for stdout
pub fn render_text(analysis: &StudyAnalysis) -> String {
    let mut out = String::new();

    out.push_str("=== Tumor Study Summary ===\n");
    let _ = writeln!(out, "Mice in study:      {}", analysis.total_mice);
    let _ = writeln!(out, "Mice after cleaning: {}", analysis.clean_mice);
    if analysis.excluded_mice.is_empty() {
        out.push_str("Excluded for duplicate timepoints: none\n");
    } else {
        let _ = writeln!(
            out,
            "Excluded for duplicate timepoints: {}",
            analysis.excluded_mice.join(", ")
        );
    }
    out.push('\n');

    out.push_str(
        "Drug Regimen          Mean  Median Variance Std Dev     SEM  Samples\n",
    );
    out.push_str(
        "---------------- --------- ------- -------- ------- ------- --------\n",
    );
    for s in &analysis.summaries {
        let _ = writeln!(
            out,
            "{:<16} {:>9.2} {:>7.2} {:>8.2} {:>7.2} {:>7.2} {:>8}",
            s.regimen, s.mean, s.median, s.variance, s.std_dev, s.sem, s.samples
        );
    }
    out.push('\n');

    out.push_str("=== Final Tumor Volume Outliers ===\n");
    for outcome in &analysis.outliers {
        match outcome {
            OutlierOutcome::Computed(report) => {
                if report.outliers.is_empty() {
                    let _ = writeln!(
                        out,
                        "{}: no outliers (bounds [{:.2}, {:.2}], {} mice)",
                        report.regimen, report.lower_bound, report.upper_bound, report.samples
                    );
                } else {
                    let _ = writeln!(
                        out,
                        "{}: {} potential outlier(s) (bounds [{:.2}, {:.2}], {} mice)",
                        report.regimen,
                        report.outliers.len(),
                        report.lower_bound,
                        report.upper_bound,
                        report.samples
                    );
                    for o in &report.outliers {
                        let _ = writeln!(
                            out,
                            "  mouse {}: {:.2} mm3",
                            o.mouse_id, o.tumor_volume
                        );
                    }
                }
            }
            OutlierOutcome::Skipped { regimen, reason } => {
                let _ = writeln!(out, "{regimen}: not computed ({reason})");
            }
        }
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "=== Weight vs Average Tumor Volume ({}) ===",
        analysis.focus_regimen
    );
    match &analysis.regression {
        RegressionOutcome::Fitted(fit) => {
            let _ = writeln!(
                out,
                "The correlation between mouse weight and the average tumor volume is {:.2}",
                fit.r
            );
            let _ = writeln!(
                out,
                "Linear fit: volume = {:.2} * weight + {:.2} ({} mice)",
                fit.slope, fit.intercept, fit.mice
            );
        }
        RegressionOutcome::Unavailable { reason } => {
            let _ = writeln!(out, "not computed: {reason}");
        }
    }

    out
}
