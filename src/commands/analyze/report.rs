use std::fmt::Write as FmtWrite;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{Deck, EvaluationResult, StatusCounts, ZoomWindow, PLACEHOLDER_LIMIT};

const RULE_WIDTH: usize = 110;

pub struct ReportInputs<'a> {
    pub generated_at: &'a str,
    pub data_file: &'a Path,
    pub limits_file: &'a Path,
    pub window: ZoomWindow,
    pub decks: &'a [Deck],
    pub results: &'a [EvaluationResult],
    pub created_placeholders: &'a [String],
    pub warnings: &'a [String],
}

pub fn write_report(path: &Path, inputs: &ReportInputs<'_>) -> Result<()> {
    let text = render_report(inputs)?;
    fs::write(path, text).with_context(|| format!("failed to write report {}", path.display()))
}

pub fn render_report(inputs: &ReportInputs<'_>) -> Result<String> {
    let mut out = String::new();
    let heavy = "=".repeat(RULE_WIDTH);
    let light = "-".repeat(RULE_WIDTH);

    writeln!(out, "{heavy}")?;
    writeln!(out, "SATELLITE THERMAL ANALYSIS REPORT")?;
    writeln!(out, "{heavy}")?;
    writeln!(out, "Generated on: {}", inputs.generated_at)?;
    writeln!(out, "Data file:    {}", inputs.data_file.display())?;
    writeln!(out, "Limits file:  {}", inputs.limits_file.display())?;
    let window = inputs.window;
    writeln!(
        out,
        "Zoom window:  {:.1} to {:.1} min ({:.1} min{})",
        window.start_min,
        window.end_min,
        window.end_min - window.start_min,
        if window.clamped {
            ", whole span"
        } else {
            ""
        }
    )?;
    if !inputs.created_placeholders.is_empty() {
        writeln!(
            out,
            "Placeholder limits created for {} component(s): {}",
            inputs.created_placeholders.len(),
            inputs.created_placeholders.join(", ")
        )?;
    }
    writeln!(
        out,
        "A '*' after the status marks placeholder limits ({PLACEHOLDER_LIMIT}) that still need real values."
    )?;
    writeln!(out)?;

    for deck in inputs.decks {
        let rows = deck
            .members
            .iter()
            .filter_map(|&index| inputs.results.get(index))
            .collect::<Vec<&EvaluationResult>>();

        writeln!(out, "{light}")?;
        writeln!(out, "Analysis for Deck: {}", deck.name)?;
        writeln!(out, "{light}")?;
        writeln!(out)?;
        write_deck_table(&mut out, &rows)?;
        writeln!(out)?;
    }

    let counts = StatusCounts::tally(inputs.results);
    writeln!(out, "{heavy}")?;
    writeln!(out, "SUMMARY")?;
    writeln!(out, "{heavy}")?;
    writeln!(
        out,
        "Components: {}   PASS: {}   FAIL: {}   UNDEFINED: {}",
        inputs.results.len(),
        counts.pass,
        counts.fail,
        counts.undefined
    )?;

    if !inputs.warnings.is_empty() {
        writeln!(out)?;
        writeln!(out, "Warnings:")?;
        for warning in inputs.warnings {
            writeln!(out, "  - {warning}")?;
        }
    }

    Ok(out)
}

fn write_deck_table(out: &mut String, rows: &[&EvaluationResult]) -> Result<()> {
    let name_width = rows
        .iter()
        .map(|row| row.component_name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Component".len());

    let header = format!(
        "{:<name_width$} | {:<16} | {:<16} | {:<16} | {:>15} | {:>15} | {:<10}",
        "Component",
        "Full Range [C]",
        "Zoomed Range [C]",
        "Accept Range [C]",
        "Cold Margin [C]",
        "Hot Margin [C]",
        "Status",
    );
    writeln!(out, "{}", header.trim_end())?;
    writeln!(out, "{}", "-".repeat(header.trim_end().len()))?;

    for row in rows {
        let status = if row.placeholder_limits {
            format!("{}*", row.status.as_str())
        } else {
            row.status.as_str().to_string()
        };
        let line = format!(
            "{:<name_width$} | {:<16} | {:<16} | {:<16} | {:>15} | {:>15} | {:<10}",
            row.component_name,
            format_range(row.observed_min, row.observed_max),
            format_range(row.observed_min_zoomed, row.observed_max_zoomed),
            format_range(Some(row.acceptance_min), Some(row.acceptance_max)),
            format_margin(row.margin_min),
            format_margin(row.margin_max),
            status,
        );
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn format_range(lo: Option<f64>, hi: Option<f64>) -> String {
    match (lo, hi) {
        (Some(lo), Some(hi)) => format!("[{lo:.1}, {hi:.1}]"),
        _ => "N/A".to_string(),
    }
}

fn format_margin(margin: Option<f64>) -> String {
    margin
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| "N/A".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;

    fn result(name: &str, status: Status, observed: Option<(f64, f64)>) -> EvaluationResult {
        EvaluationResult {
            component_name: name.to_string(),
            deck: "VD01".to_string(),
            label: name.to_string(),
            sample_count: usize::from(observed.is_some()),
            observed_min: observed.map(|o| o.0),
            observed_max: observed.map(|o| o.1),
            observed_min_zoomed: observed.map(|o| o.0),
            observed_max_zoomed: observed.map(|o| o.1),
            acceptance_min: -10.0,
            acceptance_max: 60.0,
            margin_min: observed.map(|o| o.0 + 10.0),
            margin_max: observed.map(|o| 60.0 - o.1),
            status,
            placeholder_limits: false,
        }
    }

    #[test]
    fn report_has_a_section_per_deck_with_literal_statuses() {
        let mut batt = result("VD01 BATT", Status::Undefined, None);
        batt.acceptance_min = PLACEHOLDER_LIMIT;
        batt.acceptance_max = PLACEHOLDER_LIMIT;
        batt.placeholder_limits = true;
        let results = vec![result("VD01 FOG", Status::Pass, Some((10.0, 45.0))), batt];
        let decks = vec![Deck {
            name: "VD01".to_string(),
            members: vec![0, 1],
        }];
        let created = vec!["VD01 BATT".to_string()];
        let warnings = vec!["component 'VD01 BATT' has no numeric readings".to_string()];

        let text = render_report(&ReportInputs {
            generated_at: "2024-05-01 13:45:09",
            data_file: Path::new("simulation_data.csv"),
            limits_file: Path::new("component_limits.csv"),
            window: ZoomWindow {
                start_min: 810.0,
                end_min: 1000.0,
                clamped: false,
            },
            decks: &decks,
            results: &results,
            created_placeholders: &created,
            warnings: &warnings,
        })
        .unwrap();

        assert!(text.contains("Analysis for Deck: VD01"));
        assert!(text.contains("Generated on: 2024-05-01 13:45:09"));
        assert!(text.contains("Placeholder limits created for 1 component(s): VD01 BATT"));

        let fog_line = text.lines().find(|l| l.starts_with("VD01 FOG")).unwrap();
        assert!(fog_line.contains("[10.0, 45.0]"));
        assert!(fog_line.contains("[-10.0, 60.0]"));
        assert!(fog_line.contains("20.00"));
        assert!(fog_line.contains("15.00"));
        assert!(fog_line.ends_with("PASS"));

        let batt_line = text.lines().find(|l| l.starts_with("VD01 BATT")).unwrap();
        assert!(batt_line.contains("N/A"));
        assert!(batt_line.ends_with("UNDEFINED*"));

        assert!(text.contains("Components: 2   PASS: 1   FAIL: 0   UNDEFINED: 1"));
        assert!(text.contains("  - component 'VD01 BATT' has no numeric readings"));
    }

    #[test]
    fn write_report_saves_the_rendered_text_and_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let results = vec![result("VD01 FOG", Status::Pass, Some((10.0, 45.0)))];
        let decks = vec![Deck {
            name: "VD01".to_string(),
            members: vec![0],
        }];
        let inputs = ReportInputs {
            generated_at: "2024-05-01 13:45:09",
            data_file: Path::new("simulation_data.csv"),
            limits_file: Path::new("component_limits.csv"),
            window: ZoomWindow {
                start_min: 0.0,
                end_min: 10.0,
                clamped: true,
            },
            decks: &decks,
            results: &results,
            created_placeholders: &[],
            warnings: &[],
        };

        let path = dir.path().join("report.txt");
        write_report(&path, &inputs).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, render_report(&inputs).unwrap());
        assert!(written.contains("(10.0 min, whole span)"));
        assert!(!written.contains("Warnings:"));

        let err = write_report(&dir.path().join("missing").join("report.txt"), &inputs).unwrap_err();
        assert!(format!("{err:#}").contains("failed to write report"));
    }
}
