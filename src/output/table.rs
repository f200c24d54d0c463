use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Row, Table};

use crate::config::Config;
use crate::report::DriftReport;

const OUTPUT_PREVIEW_CHARS: usize = 120;

pub fn render_matches_table(report: &DriftReport) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Line", "Package", "Test", "Indicator", "Output"]);

    for m in &report.matches {
        table.add_row(Row::from(vec![
            Cell::new(m.line_number),
            Cell::new(m.package.as_deref().unwrap_or("-")),
            Cell::new(m.test.as_deref().unwrap_or("-")),
            Cell::new(&m.indicator).fg(Color::Red),
            Cell::new(preview(&m.output)),
        ]));
    }

    let status = if report.has_drift() {
        format!("{} drift match(es)", report.matches.len())
    } else {
        "no drift".to_string()
    };
    format!(
        "{table}\n{}: {status}; {} line(s) read, {} skipped",
        report.profile, report.lines_read, report.skipped_lines
    )
}

pub fn render_profiles_table(config: &Config) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Profile",
        "Artifact",
        "Output Key",
        "Indicators",
        "Style",
        "Failed Only",
    ]);
    for (name, profile) in &config.profiles {
        table.add_row(vec![
            name.clone(),
            profile.artifact.clone(),
            profile.output_key.clone(),
            profile.indicators.to_string(),
            profile.style.to_string(),
            if profile.only_failed_tests { "YES" } else { "NO" }.to_string(),
        ]);
    }
    table.to_string()
}

fn preview(output: &str) -> String {
    let first_line = output.lines().next().unwrap_or_default();
    let mut shown: String = first_line.chars().take(OUTPUT_PREVIEW_CHARS).collect();
    if shown.len() < output.len() {
        shown.push_str("...");
    }
    shown
}
