use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::{DisplayFormat, SinkKind};
use crate::output::json::render_json;
use crate::output::table::render_matches_table;
use crate::report::DriftReport;

pub const GITHUB_OUTPUT_ENV: &str = "GITHUB_OUTPUT";

/// Named output channel of the CI orchestrator.
#[async_trait]
pub trait OutputSink: Send + Sync {
    async fn publish(&self, report: &DriftReport) -> Result<()>;
}

pub struct StdoutSink {
    format: DisplayFormat,
    labeled: bool,
}

impl StdoutSink {
    pub fn new(format: DisplayFormat) -> Self {
        Self {
            format,
            labeled: false,
        }
    }

    /// Text values carry their output key, for runs publishing several profiles.
    pub fn labeled(mut self, labeled: bool) -> Self {
        self.labeled = labeled;
        self
    }

    pub fn render(&self, report: &DriftReport) -> Result<String> {
        let rendered = match self.format {
            DisplayFormat::Text if self.labeled => {
                format_github_output(&report.output_key, &report.text)
                    .trim_end_matches('\n')
                    .to_string()
            }
            DisplayFormat::Text => report.text.clone(),
            DisplayFormat::Json => render_json(report)?,
            DisplayFormat::Table => format!(
                "{}\n{} = {}",
                render_matches_table(report),
                report.output_key,
                report.text
            ),
        };
        Ok(rendered)
    }
}

#[async_trait]
impl OutputSink for StdoutSink {
    async fn publish(&self, report: &DriftReport) -> Result<()> {
        // single write so concurrent profiles do not interleave
        println!("{}", self.render(report)?);
        Ok(())
    }
}

/// Appends `key<<DELIM ... DELIM` blocks to the GitHub Actions output file.
pub struct GithubOutputSink {
    path: PathBuf,
}

impl GithubOutputSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var_os(GITHUB_OUTPUT_ENV)
            .filter(|value| !value.is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl OutputSink for GithubOutputSink {
    async fn publish(&self, report: &DriftReport) -> Result<()> {
        let block = format_github_output(&report.output_key, &report.text);
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed opening output file: {}", self.path.display()))?;
        file.write_all(block.as_bytes())
            .await
            .with_context(|| format!("failed writing output file: {}", self.path.display()))?;
        file.flush().await?;
        info!(key = %report.output_key, path = %self.path.display(), "published output");
        Ok(())
    }
}

pub fn format_github_output(key: &str, value: &str) -> String {
    let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format_github_output_with(key, value, seed)
}

/// The delimiter grows until it no longer occurs in `value`.
pub fn format_github_output_with(key: &str, value: &str, seed: i64) -> String {
    let mut delimiter = format!("ghadelimiter_{seed}");
    while value.contains(&delimiter) {
        delimiter.push('_');
    }
    format!("{key}<<{delimiter}\n{value}\n{delimiter}\n")
}

pub fn build_sink(
    kind: SinkKind,
    format: DisplayFormat,
    labeled: bool,
) -> Box<dyn OutputSink> {
    let stdout = StdoutSink::new(format).labeled(labeled);
    match kind {
        SinkKind::Stdout => Box::new(stdout),
        SinkKind::Github => match GithubOutputSink::from_env() {
            Some(sink) => Box::new(sink),
            None => {
                warn!("{GITHUB_OUTPUT_ENV} is not set, publishing to stdout");
                Box::new(stdout)
            }
        },
        SinkKind::Auto => match GithubOutputSink::from_env() {
            Some(sink) => Box::new(sink),
            None => Box::new(stdout),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use chrono::Utc;

    use super::{
        format_github_output, format_github_output_with, GithubOutputSink, OutputSink, StdoutSink,
    };
    use crate::config::DisplayFormat;
    use crate::report::DriftReport;

    fn report(key: &str, text: &str) -> DriftReport {
        DriftReport {
            profile: "integration".to_string(),
            artifact: PathBuf::from("results.json"),
            output_key: key.to_string(),
            generated_at: Utc::now(),
            lines_read: 0,
            skipped_lines: 0,
            matches: Vec::new(),
            text: text.to_string(),
        }
    }

    #[test]
    fn github_block_wraps_multiline_value() {
        let block = format_github_output("drift_report", "'A\n\nB'");
        let lines: Vec<&str> = block.lines().collect();
        assert!(lines[0].starts_with("drift_report<<ghadelimiter_"));
        let delimiter = lines[0].trim_start_matches("drift_report<<");
        assert_eq!(&lines[1..4], &["'A", "", "B'"]);
        assert_eq!(lines[4], delimiter);
    }

    #[test]
    fn github_block_grows_delimiter_past_collisions() {
        let value = "output quoting ghadelimiter_42 and ghadelimiter_42_";
        let block = format_github_output_with("k", value, 42);
        let header = block.lines().next().expect("header line");
        assert_eq!(header, "k<<ghadelimiter_42__");
        assert!(!value.contains("ghadelimiter_42__"));
        assert!(block.ends_with("\nghadelimiter_42__\n"));
    }

    #[test]
    fn github_block_keeps_seeded_delimiter_without_collision() {
        let block = format_github_output_with("drift_report", "No drift detected.", 7);
        assert_eq!(
            block,
            "drift_report<<ghadelimiter_7\nNo drift detected.\nghadelimiter_7\n"
        );
    }

    #[test]
    fn labeled_stdout_text_carries_output_key() {
        let integration = report("drift_report", "No drift detected.");
        let unit = report("failed_tests_with_drift", "'A\n\nB'");
        let sink = StdoutSink::new(DisplayFormat::Text).labeled(true);

        let first = sink.render(&integration).expect("render");
        assert!(first.starts_with("drift_report<<ghadelimiter_"));
        assert!(first.contains("\nNo drift detected.\n"));
        let second = sink.render(&unit).expect("render");
        let lines: Vec<&str> = second.lines().collect();
        assert!(lines[0].starts_with("failed_tests_with_drift<<"));
        assert_eq!(&lines[1..4], &["'A", "", "B'"]);
        assert_eq!(lines[4], lines[0].trim_start_matches("failed_tests_with_drift<<"));
    }

    #[test]
    fn unlabeled_stdout_text_is_the_bare_value() {
        let sink = StdoutSink::new(DisplayFormat::Text);
        let rendered = sink
            .render(&report("drift_report", "No drift detected."))
            .expect("render");
        assert_eq!(rendered, "No drift detected.");
    }

    #[tokio::test]
    async fn github_sink_appends_each_publication() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("github_output");
        std::fs::write(&path, "existing=1\n").expect("seed output file");
        let sink = GithubOutputSink::new(&path);
        sink.publish(&report("drift_report", "No drift detected."))
            .await
            .expect("first publish");
        sink.publish(&report("failed_tests_with_drift", "'boom'"))
            .await
            .expect("second publish");

        let written = std::fs::read_to_string(&path).expect("read output file");
        assert!(written.starts_with("existing=1\n"));
        assert!(written.contains("drift_report<<"));
        assert!(written.contains("\nNo drift detected.\n"));
        assert!(written.contains("failed_tests_with_drift<<"));
        assert!(written.contains("\n'boom'\n"));
    }
}
