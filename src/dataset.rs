//! Study data loading and joining
//!
//! Reads the two delimited inputs (mouse metadata, study results), validates
//! the expected columns, and left-joins study rows onto mouse metadata to
//! produce the combined table the rest of the pipeline consumes.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Required columns of the study-results source
pub const RESULT_COLUMNS: [&str; 4] = [
    "Mouse ID",
    "Timepoint",
    "Tumor Volume (mm3)",
    "Metastatic Sites",
];

/// Required columns of the mouse-metadata source
pub const METADATA_COLUMNS: [&str; 5] =
    ["Mouse ID", "Drug Regimen", "Sex", "Age_months", "Weight (g)"];

/// Errors for dataset loading operations
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("{path} line {line}: {message}")]
    MalformedRow {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, DatasetError>;

/// Sex of a study mouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Sex {
    Male,
    Female,
}

impl FromStr for Sex {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Sex::Male),
            "female" | "f" => Ok(Sex::Female),
            other => Err(format!("unrecognized sex '{other}'")),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sex::Male => write!(f, "Male"),
            Sex::Female => write!(f, "Female"),
        }
    }
}

/// One row of the study-results source
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub mouse_id: String,
    pub timepoint: u32,
    pub tumor_volume: f32,
    pub metastatic_sites: u32,
}

/// Per-mouse metadata from the metadata source
#[derive(Debug, Clone, PartialEq)]
pub struct MouseInfo {
    pub drug_regimen: String,
    pub sex: Sex,
    pub age_months: u32,
    pub weight_g: f32,
}

/// One row of the combined table: a measurement plus its mouse's metadata.
///
/// `info` is `None` when the metadata source has no row for the mouse id
/// (left join keeps every measurement row).
#[derive(Debug, Clone, PartialEq)]
pub struct StudyRecord {
    pub mouse_id: String,
    pub timepoint: u32,
    pub tumor_volume: f32,
    pub metastatic_sites: u32,
    pub info: Option<MouseInfo>,
}

impl StudyRecord {
    /// Regimen of the record's mouse, if metadata matched
    pub fn regimen(&self) -> Option<&str> {
        self.info.as_ref().map(|i| i.drug_regimen.as_str())
    }
}

/// Split one CSV line, honoring quoted fields with doubled-quote escapes
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Map each required column name to its index in the header row.
///
/// Column order does not matter; a renamed or missing column is a fatal
/// schema error naming the first absent column.
fn column_indices(
    path: &Path,
    header: &str,
    required: &[&str],
) -> Result<HashMap<String, usize>> {
    let names = split_csv_line(header);
    let mut indices = HashMap::new();
    for column in required {
        let idx = names
            .iter()
            .position(|n| n.trim() == *column)
            .ok_or_else(|| DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: (*column).to_string(),
            })?;
        indices.insert((*column).to_string(), idx);
    }
    Ok(indices)
}

fn open_lines(path: &Path) -> Result<impl Iterator<Item = std::io::Result<String>>> {
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file).lines())
}

fn field<'a>(
    fields: &'a [String],
    indices: &HashMap<String, usize>,
    column: &str,
    path: &Path,
    line: usize,
) -> Result<&'a str> {
    let idx = indices[column];
    fields
        .get(idx)
        .map(|f| f.trim())
        .ok_or_else(|| DatasetError::MalformedRow {
            path: path.to_path_buf(),
            line,
            message: format!("row has {} fields, need column '{}'", fields.len(), column),
        })
}

fn parse_field<T: FromStr>(
    raw: &str,
    column: &str,
    path: &Path,
    line: usize,
) -> Result<T> {
    raw.parse().map_err(|_| DatasetError::MalformedRow {
        path: path.to_path_buf(),
        line,
        message: format!("cannot parse '{raw}' in column '{column}'"),
    })
}

/// Load the study-results source
pub fn load_measurements(path: &Path) -> Result<Vec<Measurement>> {
    let mut lines = open_lines(path)?;
    let header = match lines.next() {
        Some(h) => h.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?,
        None => {
            return Err(DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: RESULT_COLUMNS[0].to_string(),
            })
        }
    };
    let indices = column_indices(path, &header, &RESULT_COLUMNS)?;

    let mut measurements = Vec::new();
    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        let raw = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(&raw);
        let mouse_id = field(&fields, &indices, "Mouse ID", path, line_no)?.to_string();
        let timepoint = parse_field(
            field(&fields, &indices, "Timepoint", path, line_no)?,
            "Timepoint",
            path,
            line_no,
        )?;
        let tumor_volume = parse_field(
            field(&fields, &indices, "Tumor Volume (mm3)", path, line_no)?,
            "Tumor Volume (mm3)",
            path,
            line_no,
        )?;
        let metastatic_sites = parse_field(
            field(&fields, &indices, "Metastatic Sites", path, line_no)?,
            "Metastatic Sites",
            path,
            line_no,
        )?;
        measurements.push(Measurement {
            mouse_id,
            timepoint,
            tumor_volume,
            metastatic_sites,
        });
    }
    Ok(measurements)
}

/// Load the mouse-metadata source into a per-mouse map.
///
/// Mouse ids are unique in well-formed metadata; a repeated id is rejected
/// rather than silently fanning the later join out.
pub fn load_mouse_metadata(path: &Path) -> Result<HashMap<String, MouseInfo>> {
    let mut lines = open_lines(path)?;
    let header = match lines.next() {
        Some(h) => h.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?,
        None => {
            return Err(DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column: METADATA_COLUMNS[0].to_string(),
            })
        }
    };
    let indices = column_indices(path, &header, &METADATA_COLUMNS)?;

    let mut metadata = HashMap::new();
    for (offset, line) in lines.enumerate() {
        let line_no = offset + 2;
        let raw = line.map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(&raw);
        let mouse_id = field(&fields, &indices, "Mouse ID", path, line_no)?.to_string();
        let drug_regimen = field(&fields, &indices, "Drug Regimen", path, line_no)?.to_string();
        let sex_raw = field(&fields, &indices, "Sex", path, line_no)?;
        let sex = sex_raw.parse().map_err(|e| DatasetError::MalformedRow {
            path: path.to_path_buf(),
            line: line_no,
            message: e,
        })?;
        let age_months = parse_field(
            field(&fields, &indices, "Age_months", path, line_no)?,
            "Age_months",
            path,
            line_no,
        )?;
        let weight_g = parse_field(
            field(&fields, &indices, "Weight (g)", path, line_no)?,
            "Weight (g)",
            path,
            line_no,
        )?;

        if metadata
            .insert(
                mouse_id.clone(),
                MouseInfo {
                    drug_regimen,
                    sex,
                    age_months,
                    weight_g,
                },
            )
            .is_some()
        {
            return Err(DatasetError::MalformedRow {
                path: path.to_path_buf(),
                line: line_no,
                message: format!("duplicate metadata row for mouse '{mouse_id}'"),
            });
        }
    }
    Ok(metadata)
}

/// Left join: every measurement row appears exactly once in the output,
/// with metadata attached where the mouse id matches.
pub fn join_study_data(
    measurements: Vec<Measurement>,
    metadata: &HashMap<String, MouseInfo>,
) -> Vec<StudyRecord> {
    measurements
        .into_iter()
        .map(|m| {
            let info = metadata.get(&m.mouse_id).cloned();
            StudyRecord {
                mouse_id: m.mouse_id,
                timepoint: m.timepoint,
                tumor_volume: m.tumor_volume,
                metastatic_sites: m.metastatic_sites,
                info,
            }
        })
        .collect()
}

/// Load both sources and produce the combined table
pub fn load_study_data(results_path: &Path, metadata_path: &Path) -> Result<Vec<StudyRecord>> {
    let metadata = load_mouse_metadata(metadata_path)?;
    let measurements = load_measurements(results_path)?;
    tracing::debug!(
        rows = measurements.len(),
        mice = metadata.len(),
        "loaded study sources"
    );
    Ok(join_study_data(measurements, &metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_split_csv_line_plain() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_split_csv_line_quoted_comma() {
        assert_eq!(
            split_csv_line("a,\"b,c\",d"),
            vec!["a", "b,c", "d"]
        );
    }

    #[test]
    fn test_split_csv_line_escaped_quote() {
        assert_eq!(split_csv_line("\"say \"\"hi\"\"\""), vec!["say \"hi\""]);
    }

    #[test]
    fn test_split_csv_line_trailing_empty_field() {
        assert_eq!(split_csv_line("a,b,"), vec!["a", "b", ""]);
    }

    #[test]
    fn test_load_measurements_basic() {
        let file = write_file(
            "Mouse ID,Timepoint,Tumor Volume (mm3),Metastatic Sites\n\
             m601,0,45.0,0\n\
             m601,5,43.2,0\n",
        );
        let rows = load_measurements(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].mouse_id, "m601");
        assert_eq!(rows[1].timepoint, 5);
        assert!((rows[1].tumor_volume - 43.2).abs() < 1e-6);
    }

    #[test]
    fn test_load_measurements_reordered_columns() {
        let file = write_file(
            "Timepoint,Mouse ID,Metastatic Sites,Tumor Volume (mm3)\n\
             10,k403,1,38.5\n",
        );
        let rows = load_measurements(file.path()).unwrap();
        assert_eq!(rows[0].mouse_id, "k403");
        assert_eq!(rows[0].timepoint, 10);
        assert_eq!(rows[0].metastatic_sites, 1);
    }

    #[test]
    fn test_load_measurements_missing_column() {
        let file = write_file("Mouse ID,Timepoint,Metastatic Sites\nm601,0,0\n");
        let err = load_measurements(file.path()).unwrap_err();
        match err {
            DatasetError::MissingColumn { column, .. } => {
                assert_eq!(column, "Tumor Volume (mm3)");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_load_measurements_renamed_column_breaks() {
        let file = write_file(
            "MouseID,Timepoint,Tumor Volume (mm3),Metastatic Sites\nm601,0,45.0,0\n",
        );
        assert!(load_measurements(file.path()).is_err());
    }

    #[test]
    fn test_load_measurements_malformed_number() {
        let file = write_file(
            "Mouse ID,Timepoint,Tumor Volume (mm3),Metastatic Sites\n\
             m601,zero,45.0,0\n",
        );
        let err = load_measurements(file.path()).unwrap_err();
        match err {
            DatasetError::MalformedRow { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("Timepoint"));
            }
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn test_load_measurements_skips_blank_lines() {
        let file = write_file(
            "Mouse ID,Timepoint,Tumor Volume (mm3),Metastatic Sites\n\
             \n\
             m601,0,45.0,0\n\
             \n",
        );
        assert_eq!(load_measurements(file.path()).unwrap().len(), 1);
    }

    #[test]
    fn test_load_metadata_basic() {
        let file = write_file(
            "Mouse ID,Drug Regimen,Sex,Age_months,Weight (g)\n\
             m601,Capomulin,Male,22,17.0\n\
             k403,Ramicane,Female,21,16.0\n",
        );
        let meta = load_mouse_metadata(file.path()).unwrap();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta["m601"].drug_regimen, "Capomulin");
        assert_eq!(meta["k403"].sex, Sex::Female);
    }

    #[test]
    fn test_load_metadata_duplicate_mouse_rejected() {
        let file = write_file(
            "Mouse ID,Drug Regimen,Sex,Age_months,Weight (g)\n\
             m601,Capomulin,Male,22,17.0\n\
             m601,Capomulin,Male,22,17.0\n",
        );
        assert!(load_mouse_metadata(file.path()).is_err());
    }

    #[test]
    fn test_load_metadata_bad_sex_value() {
        let file = write_file(
            "Mouse ID,Drug Regimen,Sex,Age_months,Weight (g)\n\
             m601,Capomulin,Unknown,22,17.0\n",
        );
        let err = load_mouse_metadata(file.path()).unwrap_err();
        assert!(err.to_string().contains("unrecognized sex"));
    }

    #[test]
    fn test_sex_parsing() {
        assert_eq!("Male".parse::<Sex>().unwrap(), Sex::Male);
        assert_eq!("female".parse::<Sex>().unwrap(), Sex::Female);
        assert!("other".parse::<Sex>().is_err());
    }

    #[test]
    fn test_join_left_keeps_every_measurement() {
        let measurements = vec![
            Measurement {
                mouse_id: "m601".to_string(),
                timepoint: 0,
                tumor_volume: 45.0,
                metastatic_sites: 0,
            },
            Measurement {
                mouse_id: "zzz9".to_string(),
                timepoint: 0,
                tumor_volume: 45.0,
                metastatic_sites: 0,
            },
        ];
        let mut metadata = HashMap::new();
        metadata.insert(
            "m601".to_string(),
            MouseInfo {
                drug_regimen: "Capomulin".to_string(),
                sex: Sex::Male,
                age_months: 22,
                weight_g: 17.0,
            },
        );

        let joined = join_study_data(measurements, &metadata);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].regimen(), Some("Capomulin"));
        assert!(joined[1].info.is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_measurements(Path::new("/nonexistent/results.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }
}
