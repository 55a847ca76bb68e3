//! CLI argument parsing for Oncostat

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Output format for the analysis report
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format for spreadsheet analysis (regimen summary table)
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "oncostat")]
#[command(version)]
#[command(about = "Descriptive statistics and charts for pre-clinical tumor study data", long_about = None)]
pub struct Cli {
    /// Study results file (Mouse ID, Timepoint, Tumor Volume (mm3), Metastatic Sites)
    #[arg(short = 'r', long = "results", value_name = "FILE")]
    pub results: PathBuf,

    /// Mouse metadata file (Mouse ID, Drug Regimen, Sex, Age_months, Weight (g))
    #[arg(short = 'm', long = "metadata", value_name = "FILE")]
    pub metadata: PathBuf,

    /// Report format (text, json or csv)
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Comma-separated regimens for the outlier/box-plot comparison
    #[arg(
        long = "regimens",
        value_name = "LIST",
        default_value = "Capomulin,Ramicane,Infubinol,Ceftamin"
    )]
    pub regimens: String,

    /// Regimen for the line chart, scatter plot and regression
    #[arg(long = "regimen", value_name = "NAME", default_value = "Capomulin")]
    pub focus_regimen: String,

    /// Mouse for the tumor-vs-timepoint line chart (default: first mouse of
    /// the focus regimen)
    #[arg(long = "mouse", value_name = "ID")]
    pub mouse: Option<String>,

    /// Directory for rendered charts
    #[arg(long = "out-dir", value_name = "DIR", default_value = "charts")]
    pub out_dir: PathBuf,

    /// Skip chart rendering
    #[arg(long = "no-charts")]
    pub no_charts: bool,

    /// Enable debug output to stderr
    #[arg(long = "debug")]
    pub debug: bool,
}

impl Cli {
    /// The outlier regimen list, split and trimmed
    pub fn regimen_list(&self) -> Vec<String> {
        self.regimens
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
