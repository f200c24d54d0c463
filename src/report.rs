use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const NO_DRIFT_MESSAGE: &str = "No drift detected.";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReportStyle {
    #[default]
    Standard,
    Legacy,
}

impl ReportStyle {
    pub fn separator(&self) -> &'static str {
        match self {
            Self::Standard => "\n\n",
            Self::Legacy => "\n",
        }
    }

    pub fn as_slug(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Legacy => "legacy",
        }
    }
}

impl Display for ReportStyle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_slug())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftMatch {
    pub line_number: usize,
    pub indicator: String,
    pub output: String,
    pub package: Option<String>,
    pub test: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftReport {
    pub profile: String,
    pub artifact: PathBuf,
    pub output_key: String,
    pub generated_at: DateTime<Utc>,
    pub lines_read: usize,
    pub skipped_lines: usize,
    pub matches: Vec<DriftMatch>,
    pub text: String,
}

impl DriftReport {
    pub fn has_drift(&self) -> bool {
        !self.matches.is_empty()
    }
}

pub fn render_report(matches: &[DriftMatch], default_message: &str, style: ReportStyle) -> String {
    if matches.is_empty() {
        return default_message.to_string();
    }
    let joined = matches
        .iter()
        .map(|m| m.output.as_str())
        .collect::<Vec<_>>()
        .join(style.separator());
    format!("'{joined}'")
}
