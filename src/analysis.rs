//! End-to-end analysis orchestration
//!
//! Strictly sequential batch pipeline: load → deduplicate → aggregate →
//! outliers → regression, each stage consuming the previous stage's output
//! and producing a new immutable collection. The result carries both the
//! report numbers and the chart descriptors.

use crate::chart::{BarChart, BoxPlot, ChartSet, LineChart, PieChart, ScatterChart};
use crate::dataset::{self, Sex};
use crate::dedup;
use crate::outliers::{self, OutlierOutcome, DEFAULT_REGIMENS};
use crate::regression::{self, WeightVolumeFit};
use crate::summary::{self, RegimenSummary};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Inputs and knobs for one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub results_path: PathBuf,
    pub metadata_path: PathBuf,
    /// Regimens compared in the outlier/box-plot analysis
    pub regimens: Vec<String>,
    /// Regimen used for the line chart, scatter plot, and regression
    pub focus_regimen: String,
    /// Mouse for the tumor-vs-timepoint line chart; first mouse of the
    /// focus regimen when absent
    pub mouse: Option<String>,
}

impl AnalysisConfig {
    pub fn new(results_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            metadata_path: metadata_path.into(),
            regimens: DEFAULT_REGIMENS.iter().map(|s| s.to_string()).collect(),
            focus_regimen: "Capomulin".to_string(),
            mouse: None,
        }
    }
}

/// Regression result or the reason it is absent from the report
#[derive(Debug, Clone)]
pub enum RegressionOutcome {
    Fitted(WeightVolumeFit),
    Unavailable { reason: String },
}

/// Everything one run computes
#[derive(Debug)]
pub struct StudyAnalysis {
    pub total_mice: usize,
    pub clean_mice: usize,
    pub excluded_mice: Vec<String>,
    pub summaries: Vec<RegimenSummary>,
    pub regimen_counts: Vec<(String, u32)>,
    pub sex_counts: Vec<(Sex, u32)>,
    pub outliers: Vec<OutlierOutcome>,
    pub focus_regimen: String,
    pub line_mouse: Option<String>,
    pub regression: RegressionOutcome,
    pub charts: ChartSet,
}

/// Pick the mouse for the line chart: the configured one if it has rows,
/// otherwise the first mouse of the focus regimen in id order.
fn select_line_mouse(
    config: &AnalysisConfig,
    records: &[dataset::StudyRecord],
) -> Option<String> {
    if let Some(mouse) = &config.mouse {
        if records.iter().any(|r| &r.mouse_id == mouse) {
            return Some(mouse.clone());
        }
        warn!(%mouse, "requested mouse has no clean measurements");
        return None;
    }
    records
        .iter()
        .filter(|r| r.regimen() == Some(config.focus_regimen.as_str()))
        .map(|r| r.mouse_id.as_str())
        .min()
        .map(str::to_string)
}

/// Run the full pipeline
pub fn run(config: &AnalysisConfig) -> Result<StudyAnalysis> {
    let combined = dataset::load_study_data(&config.results_path, &config.metadata_path)
        .context("failed to load study data")?;
    let total_mice = dedup::distinct_mouse_count(&combined);
    info!(rows = combined.len(), mice = total_mice, "combined study table loaded");

    let clean = dedup::deduplicate(&combined);
    let clean_mice = clean.mouse_count();
    debug!(
        rows = clean.records.len(),
        mice = clean_mice,
        "dataset cleaned"
    );

    let summaries = summary::summarize_by_regimen(&clean.records);
    let regimen_counts = summary::measurements_per_regimen(&clean.records);
    let sex_counts = summary::sex_distribution(&clean.records);

    let finals = summary::final_timepoints(&clean.records);
    let outlier_outcomes = outliers::detect_outliers(&finals, &config.regimens);

    let averages = regression::mouse_averages(&clean.records, &config.focus_regimen);
    let regression_outcome = match regression::fit_weight_volume(&averages) {
        Ok(fit) => RegressionOutcome::Fitted(fit),
        Err(e) => {
            warn!(regimen = %config.focus_regimen, error = %e, "regression not computed");
            RegressionOutcome::Unavailable {
                reason: e.to_string(),
            }
        }
    };

    let line_mouse = select_line_mouse(config, &clean.records);
    let mouse_line = line_mouse.as_ref().map(|mouse| {
        LineChart::mouse_treatment(
            mouse,
            &config.focus_regimen,
            clean
                .records
                .iter()
                .filter(|r| &r.mouse_id == mouse)
                .map(|r| (r.timepoint, r.tumor_volume))
                .collect(),
        )
    });

    let fit = match &regression_outcome {
        RegressionOutcome::Fitted(fit) => Some(fit),
        RegressionOutcome::Unavailable { .. } => None,
    };
    let charts = ChartSet {
        regimen_bar: Some(BarChart::measurements_per_regimen(&regimen_counts)),
        sex_pie: Some(PieChart::sex_distribution(&sex_counts)),
        final_volume_box: Some(BoxPlot::final_tumor_volumes(&outlier_outcomes)),
        mouse_line,
        weight_scatter: if averages.is_empty() {
            None
        } else {
            Some(ScatterChart::weight_vs_volume(
                &config.focus_regimen,
                &averages,
                fit,
            ))
        },
    };

    Ok(StudyAnalysis {
        total_mice,
        clean_mice,
        excluded_mice: clean.excluded_mice.iter().cloned().collect(),
        summaries,
        regimen_counts,
        sex_counts,
        outliers: outlier_outcomes,
        focus_regimen: config.focus_regimen.clone(),
        line_mouse,
        regression: regression_outcome,
        charts,
    })
}
