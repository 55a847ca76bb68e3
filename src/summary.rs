//! Grouped descriptive statistics over the clean dataset
//!
//! Two summary-construction paths exist on purpose: per-group vector
//! statistics and a single-pass accumulator. Their means must agree for
//! every regimen, which the test suite checks.

use crate::dataset::{Sex, StudyRecord};
use anyhow::Result;
use aprender::stats::DescriptiveStats;
use std::collections::{BTreeMap, HashMap};
use trueno::Vector;

/// Per-regimen descriptive statistics of tumor volume
#[derive(Debug, Clone, PartialEq)]
pub struct RegimenSummary {
    pub regimen: String,
    pub samples: usize,
    pub mean: f32,
    pub median: f32,
    /// Sample variance (n-1 denominator); NaN for groups of size 1
    pub variance: f32,
    pub std_dev: f32,
    /// Standard error of the mean: std_dev / sqrt(n)
    pub sem: f32,
}

/// Calculate median using aprender's DescriptiveStats
///
/// Uses aprender's quantile(0.5) which implements the R-7 method with
/// QuickSelect for O(n) performance.
pub fn median(vector: &Vector<f32>) -> Result<f32> {
    let stats = DescriptiveStats::new(vector);
    stats
        .quantile(0.5)
        .map_err(|e| anyhow::anyhow!("Failed to compute median: {}", e))
}

/// Sample variance (n-1 denominator) with f64 accumulation.
///
/// trueno's `variance()` is the population form, so the sample form is
/// computed by hand. Groups of size 1 have no defined sample variance and
/// yield NaN rather than an error.
pub fn sample_variance(values: &[f32]) -> f32 {
    let n = values.len();
    if n < 2 {
        return f32::NAN;
    }
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n as f64;
    let ss: f64 = values
        .iter()
        .map(|&v| {
            let diff = f64::from(v) - mean;
            diff * diff
        })
        .sum();
    (ss / (n as f64 - 1.0)) as f32
}

/// Group tumor volumes by regimen; rows with no metadata match have no
/// regimen and fall out of the grouping, the way a null group key would.
fn volumes_by_regimen(records: &[StudyRecord]) -> BTreeMap<&str, Vec<f32>> {
    let mut groups: BTreeMap<&str, Vec<f32>> = BTreeMap::new();
    for record in records {
        if let Some(regimen) = record.regimen() {
            groups.entry(regimen).or_default().push(record.tumor_volume);
        }
    }
    groups
}

/// Per-regimen summary via per-group vector statistics.
///
/// One row per distinct regimen present, in name order.
pub fn summarize_by_regimen(records: &[StudyRecord]) -> Vec<RegimenSummary> {
    volumes_by_regimen(records)
        .into_iter()
        .map(|(regimen, volumes)| {
            let v = Vector::from_slice(&volumes);
            let mean = v.mean().unwrap_or(f32::NAN);
            let median = median(&v).unwrap_or(f32::NAN);
            let variance = sample_variance(&volumes);
            let std_dev = variance.sqrt();
            let sem = std_dev / (volumes.len() as f32).sqrt();
            RegimenSummary {
                regimen: regimen.to_string(),
                samples: volumes.len(),
                mean,
                median,
                variance,
                std_dev,
                sem,
            }
        })
        .collect()
}

/// Single-pass accumulator for mean/variance/SEM without buffering values
#[derive(Debug, Clone, Copy, Default)]
pub struct SummaryAccumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

impl SummaryAccumulator {
    pub fn push(&mut self, value: f32) {
        let v = f64::from(value);
        self.count += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    pub fn count(&self) -> usize {
        self.count as usize
    }

    pub fn mean(&self) -> f32 {
        if self.count == 0 {
            return f32::NAN;
        }
        (self.sum / self.count as f64) as f32
    }

    pub fn sample_variance(&self) -> f32 {
        if self.count < 2 {
            return f32::NAN;
        }
        let n = self.count as f64;
        let ss = self.sum_sq - self.sum * self.sum / n;
        // Cancellation can leave a tiny negative residue
        (ss.max(0.0) / (n - 1.0)) as f32
    }

    pub fn std_dev(&self) -> f32 {
        self.sample_variance().sqrt()
    }

    pub fn sem(&self) -> f32 {
        self.std_dev() / (self.count as f32).sqrt()
    }
}

/// Per-regimen summary via the single-pass aggregation path
pub fn summarize_single_pass(records: &[StudyRecord]) -> BTreeMap<String, SummaryAccumulator> {
    let mut groups: BTreeMap<String, SummaryAccumulator> = BTreeMap::new();
    for record in records {
        if let Some(regimen) = record.regimen() {
            groups.entry(regimen.to_string()).or_default().push(record.tumor_volume);
        }
    }
    groups
}

/// Pick the greater of two candidate rows for a mouse's final timepoint.
///
/// Ties at the maximum timepoint cannot occur after deduplication; the
/// tie-break (smaller tumor volume, then fewer metastatic sites) keeps the
/// choice deterministic and independent of input order regardless.
fn supersedes(candidate: &StudyRecord, current: &StudyRecord) -> bool {
    if candidate.timepoint != current.timepoint {
        return candidate.timepoint > current.timepoint;
    }
    if candidate.tumor_volume != current.tumor_volume {
        return candidate.tumor_volume < current.tumor_volume;
    }
    candidate.metastatic_sites < current.metastatic_sites
}

/// For each mouse, the row at its maximum timepoint, in mouse-id order
pub fn final_timepoints(records: &[StudyRecord]) -> Vec<StudyRecord> {
    let mut best: BTreeMap<&str, &StudyRecord> = BTreeMap::new();
    for record in records {
        match best.get(record.mouse_id.as_str()) {
            Some(current) if !supersedes(record, current) => {}
            _ => {
                best.insert(record.mouse_id.as_str(), record);
            }
        }
    }
    best.into_values().cloned().collect()
}

/// Measurement-row counts per regimen, most-measured first
pub fn measurements_per_regimen(records: &[StudyRecord]) -> Vec<(String, u32)> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for record in records {
        if let Some(regimen) = record.regimen() {
            *counts.entry(regimen).or_default() += 1;
        }
    }
    let mut sorted: Vec<(String, u32)> = counts
        .into_iter()
        .map(|(regimen, count)| (regimen.to_string(), count))
        .collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    sorted
}

/// Measurement-row counts by sex, largest first
pub fn sex_distribution(records: &[StudyRecord]) -> Vec<(Sex, u32)> {
    let mut counts: BTreeMap<Sex, u32> = BTreeMap::new();
    for record in records {
        if let Some(info) = &record.info {
            *counts.entry(info.sex).or_default() += 1;
        }
    }
    let mut sorted: Vec<(Sex, u32)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MouseInfo;

    fn record(mouse_id: &str, regimen: &str, timepoint: u32, tumor_volume: f32) -> StudyRecord {
        StudyRecord {
            mouse_id: mouse_id.to_string(),
            timepoint,
            tumor_volume,
            metastatic_sites: 0,
            info: Some(MouseInfo {
                drug_regimen: regimen.to_string(),
                sex: Sex::Male,
                age_months: 20,
                weight_g: 20.0,
            }),
        }
    }

    #[test]
    fn test_median_odd_length() {
        let vec = Vector::from_slice(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        assert_eq!(median(&vec).unwrap(), 5.0);
    }

    #[test]
    fn test_median_even_length() {
        let vec = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(median(&vec).unwrap(), 2.5);
    }

    #[test]
    fn test_sample_variance_known_values() {
        // mean = 5, squared deviations sum to 20, sample variance 20/3
        let var = sample_variance(&[2.0, 4.0, 6.0, 8.0]);
        assert!((var - 20.0 / 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_sample_variance_single_value_is_nan() {
        assert!(sample_variance(&[5.0]).is_nan());
    }

    #[test]
    fn test_summarize_by_regimen_basic() {
        let records = vec![
            record("a1", "Capomulin", 0, 40.0),
            record("a1", "Capomulin", 5, 44.0),
            record("b2", "Ramicane", 0, 48.0),
        ];
        let summaries = summarize_by_regimen(&records);
        assert_eq!(summaries.len(), 2);
        // Name order
        assert_eq!(summaries[0].regimen, "Capomulin");
        assert_eq!(summaries[0].samples, 2);
        assert!((summaries[0].mean - 42.0).abs() < 1e-4);
        assert!((summaries[0].median - 42.0).abs() < 1e-4);
        assert_eq!(summaries[1].regimen, "Ramicane");
        assert!(summaries[1].variance.is_nan());
        assert!(summaries[1].sem.is_nan());
    }

    #[test]
    fn test_summarize_skips_rows_without_metadata() {
        let mut orphan = record("zz9", "ignored", 0, 40.0);
        orphan.info = None;
        let records = vec![record("a1", "Capomulin", 0, 40.0), orphan];
        let summaries = summarize_by_regimen(&records);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].samples, 1);
    }

    #[test]
    fn test_sem_relation() {
        let records = vec![
            record("a1", "Capomulin", 0, 40.0),
            record("a2", "Capomulin", 0, 42.0),
            record("a3", "Capomulin", 0, 44.0),
            record("a4", "Capomulin", 0, 46.0),
        ];
        let s = &summarize_by_regimen(&records)[0];
        assert!((s.sem - s.std_dev / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_pass_matches_direct_mean() {
        let records = vec![
            record("a1", "Capomulin", 0, 40.0),
            record("a1", "Capomulin", 5, 44.5),
            record("b2", "Ramicane", 0, 48.0),
            record("b2", "Ramicane", 5, 47.25),
            record("b2", "Ramicane", 10, 46.5),
        ];
        let direct = summarize_by_regimen(&records);
        let single_pass = summarize_single_pass(&records);
        for summary in &direct {
            let acc = &single_pass[&summary.regimen];
            assert_eq!(acc.count(), summary.samples);
            assert!((acc.mean() - summary.mean).abs() < 1e-3);
            assert!((acc.sample_variance() - summary.variance).abs() < 1e-3);
        }
    }

    #[test]
    fn test_accumulator_empty_is_nan() {
        let acc = SummaryAccumulator::default();
        assert!(acc.mean().is_nan());
        assert!(acc.sample_variance().is_nan());
    }

    #[test]
    fn test_final_timepoints_picks_maximum() {
        let records = vec![
            record("a1", "Capomulin", 0, 45.0),
            record("a1", "Capomulin", 45, 38.0),
            record("a1", "Capomulin", 20, 41.0),
            record("b2", "Ramicane", 10, 44.0),
        ];
        let finals = final_timepoints(&records);
        assert_eq!(finals.len(), 2);
        assert_eq!(finals[0].mouse_id, "a1");
        assert_eq!(finals[0].timepoint, 45);
        assert!((finals[0].tumor_volume - 38.0).abs() < 1e-6);
        assert_eq!(finals[1].timepoint, 10);
    }

    #[test]
    fn test_final_timepoints_tie_breaks_deterministically() {
        let a = record("a1", "Capomulin", 45, 39.0);
        let b = record("a1", "Capomulin", 45, 38.0);
        let forward = final_timepoints(&[a.clone(), b.clone()]);
        let reverse = final_timepoints(&[b, a]);
        assert_eq!(forward, reverse);
        assert!((forward[0].tumor_volume - 38.0).abs() < 1e-6);
    }

    #[test]
    fn test_measurements_per_regimen_sorted_descending() {
        let records = vec![
            record("a1", "Capomulin", 0, 45.0),
            record("a1", "Capomulin", 5, 44.0),
            record("b2", "Ramicane", 0, 45.0),
        ];
        let counts = measurements_per_regimen(&records);
        assert_eq!(counts[0], ("Capomulin".to_string(), 2));
        assert_eq!(counts[1], ("Ramicane".to_string(), 1));
    }

    #[test]
    fn test_measurements_per_regimen_ties_in_name_order() {
        let records = vec![
            record("a1", "Zoniferol", 0, 45.0),
            record("b2", "Capomulin", 0, 45.0),
        ];
        let counts = measurements_per_regimen(&records);
        assert_eq!(counts[0].0, "Capomulin");
        assert_eq!(counts[1].0, "Zoniferol");
    }

    #[test]
    fn test_sex_distribution_counts_rows() {
        let mut records = vec![
            record("a1", "Capomulin", 0, 45.0),
            record("a1", "Capomulin", 5, 44.0),
        ];
        let mut female = record("b2", "Ramicane", 0, 45.0);
        if let Some(info) = &mut female.info {
            info.sex = Sex::Female;
        }
        records.push(female);

        let counts = sex_distribution(&records);
        assert_eq!(counts[0], (Sex::Male, 2));
        assert_eq!(counts[1], (Sex::Female, 1));
    }
}
