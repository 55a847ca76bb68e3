//! IQR-based outlier detection over final tumor volumes
//!
//! Quartiles use linear interpolation between order statistics
//! (index = q/100 * (n-1)), the same method the summary medians use.
//! Detection runs per regimen and never aborts the batch: a regimen
//! without enough data is reported as skipped.

use crate::dataset::StudyRecord;

/// Default regimens for the final-tumor-volume comparison
pub const DEFAULT_REGIMENS: [&str; 4] = ["Capomulin", "Ramicane", "Infubinol", "Ceftamin"];

/// One flagged final tumor volume, with the mouse it came from
#[derive(Debug, Clone, PartialEq)]
pub struct TumorOutlier {
    pub mouse_id: String,
    pub tumor_volume: f32,
}

/// IQR fences and flagged values for one regimen
#[derive(Debug, Clone)]
pub struct OutlierReport {
    pub regimen: String,
    pub samples: usize,
    pub q1: f32,
    pub median: f32,
    pub q3: f32,
    pub iqr: f32,
    pub lower_bound: f32,
    pub upper_bound: f32,
    /// Smallest/largest observed value still inside the fences
    pub whisker_low: f32,
    pub whisker_high: f32,
    pub outliers: Vec<TumorOutlier>,
}

/// Per-regimen result: computed fences or the reason nothing was computed
#[derive(Debug, Clone)]
pub enum OutlierOutcome {
    Computed(OutlierReport),
    Skipped { regimen: String, reason: String },
}

impl OutlierOutcome {
    pub fn regimen(&self) -> &str {
        match self {
            OutlierOutcome::Computed(report) => &report.regimen,
            OutlierOutcome::Skipped { regimen, .. } => regimen,
        }
    }
}

/// Calculate percentile from sorted data via linear interpolation
pub fn percentile(sorted_data: &[f32], percentile: f32) -> f32 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    if sorted_data.len() == 1 {
        return sorted_data[0];
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f32;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f32;
        sorted_data[lower] * (1.0 - weight) + sorted_data[upper] * weight
    }
}

/// Compute the IQR fences and outliers for one regimen's final volumes
fn analyze_regimen(regimen: &str, finals: &[StudyRecord]) -> OutlierOutcome {
    let mut values: Vec<(f32, &str)> = finals
        .iter()
        .filter(|r| r.regimen() == Some(regimen))
        .map(|r| (r.tumor_volume, r.mouse_id.as_str()))
        .collect();

    if values.is_empty() {
        return OutlierOutcome::Skipped {
            regimen: regimen.to_string(),
            reason: "no final measurements for regimen".to_string(),
        };
    }
    if values.len() < 2 {
        return OutlierOutcome::Skipped {
            regimen: regimen.to_string(),
            reason: format!("need at least 2 final measurements, got {}", values.len()),
        };
    }

    values.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let sorted: Vec<f32> = values.iter().map(|(v, _)| *v).collect();

    let q1 = percentile(&sorted, 25.0);
    let median = percentile(&sorted, 50.0);
    let q3 = percentile(&sorted, 75.0);
    let iqr = q3 - q1;
    let lower_bound = q1 - 1.5 * iqr;
    let upper_bound = q3 + 1.5 * iqr;

    let outliers: Vec<TumorOutlier> = values
        .iter()
        .filter(|(v, _)| *v < lower_bound || *v > upper_bound)
        .map(|(v, mouse_id)| TumorOutlier {
            mouse_id: (*mouse_id).to_string(),
            tumor_volume: *v,
        })
        .collect();

    let inside: Vec<f32> = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lower_bound && *v <= upper_bound)
        .collect();
    // At least one value is always inside the fences (the median is)
    let whisker_low = inside.first().copied().unwrap_or(q1);
    let whisker_high = inside.last().copied().unwrap_or(q3);

    OutlierOutcome::Computed(OutlierReport {
        regimen: regimen.to_string(),
        samples: sorted.len(),
        q1,
        median,
        q3,
        iqr,
        lower_bound,
        upper_bound,
        whisker_low,
        whisker_high,
        outliers,
    })
}

/// Run outlier detection over the final-timepoint rows for each requested
/// regimen. Per-regimen problems are reported in the outcome, never raised.
pub fn detect_outliers(finals: &[StudyRecord], regimens: &[String]) -> Vec<OutlierOutcome> {
    regimens
        .iter()
        .map(|regimen| {
            let outcome = analyze_regimen(regimen, finals);
            if let OutlierOutcome::Skipped { regimen, reason } = &outcome {
                tracing::warn!(%regimen, %reason, "outlier analysis skipped");
            }
            outcome
        })
        .collect()
}
