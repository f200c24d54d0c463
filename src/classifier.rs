use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::config::ResolvedProfile;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::indicators::IndicatorSet;
use crate::record::{parse_artifact, NumberedLine, ParsedLine, TestRecord};
use crate::report::{render_report, DriftMatch, DriftReport};
use crate::sink::OutputSink;

#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions<'a> {
    pub indicators: &'a IndicatorSet,
    pub only_failed_tests: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub lines_read: usize,
    pub skipped_lines: usize,
    pub matches: Vec<DriftMatch>,
}

/// Malformed lines are reported to `diagnostics` and excluded.
pub fn classify_text(
    text: &str,
    options: &ClassifyOptions<'_>,
    diagnostics: &dyn Diagnostics,
) -> Classification {
    let lines = parse_artifact(text);
    let mut classification = Classification {
        lines_read: lines.len(),
        ..Classification::default()
    };

    let failed_tests = options
        .only_failed_tests
        .then(|| collect_failed_tests(&lines));

    for NumberedLine {
        line_number,
        parsed,
    } in &lines
    {
        let record = match parsed {
            ParsedLine::Record(record) => record,
            ParsedLine::Unparseable(err) => {
                classification.skipped_lines += 1;
                diagnostics.emit(Diagnostic::UnparseableLine {
                    line_number: *line_number,
                    message: err.to_string(),
                });
                continue;
            }
        };
        if let Some(failed) = &failed_tests {
            let belongs_to_failure = record
                .test_key()
                .is_some_and(|key| failed.contains(&key));
            if !belongs_to_failure {
                continue;
            }
        }
        let Some(drift) = classify_record(*line_number, record, options.indicators) else {
            continue;
        };
        diagnostics.emit(Diagnostic::RecordMatched {
            line_number: *line_number,
            indicator: drift.indicator.clone(),
        });
        classification.matches.push(drift);
    }

    classification
}

pub fn classify_record(
    line_number: usize,
    record: &TestRecord,
    indicators: &IndicatorSet,
) -> Option<DriftMatch> {
    let output = record.non_empty_output()?;
    let indicator = indicators.first_match(output)?;
    Some(DriftMatch {
        line_number,
        indicator: indicator.to_string(),
        output: output.trim().to_string(),
        package: record.package.clone(),
        test: record.test.clone(),
    })
}

fn collect_failed_tests(lines: &[NumberedLine]) -> BTreeSet<(&str, &str)> {
    lines
        .iter()
        .filter_map(|line| match &line.parsed {
            ParsedLine::Record(record) if record.is_failure() => record.test_key(),
            _ => None,
        })
        .collect()
}

pub struct DriftClassifier {
    profile: ResolvedProfile,
}

impl DriftClassifier {
    pub fn new(profile: ResolvedProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &ResolvedProfile {
        &self.profile
    }

    /// A read failure is fatal and yields no report. Invalid UTF-8 is replaced,
    /// so a damaged line can only fail its own JSON parse.
    pub async fn classify(&self, diagnostics: &dyn Diagnostics) -> Result<DriftReport> {
        let path = &self.profile.artifact;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed reading test log artifact: {}", path.display()))?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self.classify_loaded(&text, diagnostics))
    }

    pub fn classify_loaded(&self, text: &str, diagnostics: &dyn Diagnostics) -> DriftReport {
        let options = ClassifyOptions {
            indicators: &self.profile.indicators,
            only_failed_tests: self.profile.only_failed_tests,
        };
        let classification = classify_text(text, &options, diagnostics);
        diagnostics.emit(Diagnostic::ArtifactClassified {
            path: self.profile.artifact.clone(),
            lines: classification.lines_read,
            matches: classification.matches.len(),
        });
        let text = render_report(
            &classification.matches,
            &self.profile.default_message,
            self.profile.style,
        );
        DriftReport {
            profile: self.profile.name.clone(),
            artifact: self.profile.artifact.clone(),
            output_key: self.profile.output_key.clone(),
            generated_at: Utc::now(),
            lines_read: classification.lines_read,
            skipped_lines: classification.skipped_lines,
            matches: classification.matches,
            text,
        }
    }

    pub async fn run(
        &self,
        sink: &dyn OutputSink,
        diagnostics: &dyn Diagnostics,
    ) -> Result<DriftReport> {
        let report = self.classify(diagnostics).await?;
        info!(
            profile = %report.profile,
            key = %report.output_key,
            matches = report.matches.len(),
            skipped = report.skipped_lines,
            "drift classification finished"
        );
        sink.publish(&report)
            .await
            .with_context(|| format!("failed publishing output {}", report.output_key))?;
        Ok(report)
    }
}
