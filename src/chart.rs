//! Chart descriptors produced by the analysis stages
//!
//! Plain data, no drawing state: each analysis stage returns a descriptor
//! and the renderer decides how (and whether) to draw it. Bar and pie
//! descriptors are built once and rendered through two code paths each, so
//! the paired charts agree numerically by construction.

use crate::dataset::Sex;
use crate::outliers::{OutlierOutcome, OutlierReport};
use crate::regression::{MouseAverages, WeightVolumeFit};

/// Categorical bar chart
#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub categories: Vec<String>,
    pub values: Vec<u32>,
}

impl BarChart {
    pub fn measurements_per_regimen(counts: &[(String, u32)]) -> Self {
        BarChart {
            title: "Measurements per Drug Regimen".to_string(),
            x_label: "Drug Regimen".to_string(),
            y_label: "Number of Mice Tested".to_string(),
            categories: counts.iter().map(|(name, _)| name.clone()).collect(),
            values: counts.iter().map(|(_, count)| *count).collect(),
        }
    }
}

/// Pie chart of category counts
#[derive(Debug, Clone, PartialEq)]
pub struct PieChart {
    pub title: String,
    pub labels: Vec<String>,
    pub counts: Vec<u32>,
}

impl PieChart {
    pub fn sex_distribution(counts: &[(Sex, u32)]) -> Self {
        PieChart {
            title: "Sex Distribution".to_string(),
            labels: counts.iter().map(|(sex, _)| sex.to_string()).collect(),
            counts: counts.iter().map(|(_, count)| *count).collect(),
        }
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }

    /// Slice percentages in label order, one decimal's worth of precision
    pub fn percentages(&self) -> Vec<f64> {
        let total = f64::from(self.total().max(1));
        self.counts
            .iter()
            .map(|&c| f64::from(c) / total * 100.0)
            .collect()
    }
}

/// One box in a box plot, quartiles and whiskers precomputed
#[derive(Debug, Clone, PartialEq)]
pub struct BoxGroup {
    pub label: String,
    pub q1: f32,
    pub median: f32,
    pub q3: f32,
    pub whisker_low: f32,
    pub whisker_high: f32,
    pub outliers: Vec<f32>,
}

impl From<&OutlierReport> for BoxGroup {
    fn from(report: &OutlierReport) -> Self {
        BoxGroup {
            label: report.regimen.clone(),
            q1: report.q1,
            median: report.median,
            q3: report.q3,
            whisker_low: report.whisker_low,
            whisker_high: report.whisker_high,
            outliers: report.outliers.iter().map(|o| o.tumor_volume).collect(),
        }
    }
}

/// Box plot of final tumor volume across regimens
#[derive(Debug, Clone, PartialEq)]
pub struct BoxPlot {
    pub title: String,
    pub y_label: String,
    pub groups: Vec<BoxGroup>,
}

impl BoxPlot {
    /// Build from the outlier outcomes; skipped regimens contribute no box
    pub fn final_tumor_volumes(outcomes: &[OutlierOutcome]) -> Self {
        BoxPlot {
            title: "Final Tumor Volume by Regimen".to_string(),
            y_label: "Final Tumor Volume (mm3)".to_string(),
            groups: outcomes
                .iter()
                .filter_map(|outcome| match outcome {
                    OutlierOutcome::Computed(report) => Some(BoxGroup::from(report)),
                    OutlierOutcome::Skipped { .. } => None,
                })
                .collect(),
        }
    }
}

/// Tumor volume over time for a single mouse
#[derive(Debug, Clone, PartialEq)]
pub struct LineChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(u32, f32)>,
}

impl LineChart {
    pub fn mouse_treatment(mouse_id: &str, regimen: &str, mut points: Vec<(u32, f32)>) -> Self {
        points.sort_by_key(|(timepoint, _)| *timepoint);
        LineChart {
            title: format!("{regimen} Treatment of Mouse {mouse_id}"),
            x_label: "Timepoint (Days)".to_string(),
            y_label: "Tumor Volume (mm3)".to_string(),
            points,
        }
    }
}

/// Fitted line over a scatter plot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitLine {
    pub slope: f64,
    pub intercept: f64,
}

/// Average tumor volume vs. weight, optionally with a regression line
#[derive(Debug, Clone, PartialEq)]
pub struct ScatterChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
    pub fit: Option<FitLine>,
}

impl ScatterChart {
    pub fn weight_vs_volume(
        regimen: &str,
        averages: &[MouseAverages],
        fit: Option<&WeightVolumeFit>,
    ) -> Self {
        ScatterChart {
            title: format!("Average Tumor Volume vs. Weight ({regimen})"),
            x_label: "Weight (g)".to_string(),
            y_label: "Average Tumor Volume (mm3)".to_string(),
            points: averages
                .iter()
                .map(|a| (a.weight_g, a.tumor_volume))
                .collect(),
            fit: fit.map(|f| FitLine {
                slope: f.slope,
                intercept: f.intercept,
            }),
        }
    }
}

/// Every descriptor one analysis run produces
#[derive(Debug, Clone, Default)]
pub struct ChartSet {
    pub regimen_bar: Option<BarChart>,
    pub sex_pie: Option<PieChart>,
    pub final_volume_box: Option<BoxPlot>,
    pub mouse_line: Option<LineChart>,
    pub weight_scatter: Option<ScatterChart>,
}
