use std::fmt::Write;

use crate::models::{ImageRecord, RunReport};

pub fn build_report(run: &RunReport) -> String {
    let report = &run.report;
    let mut output = String::new();

    let _ = writeln!(output, "# Construction Progress Report");
    let _ = writeln!(
        output,
        "Generated for {} ({})",
        run.project.name, run.project.project_type
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Overall Status");
    let _ = writeln!(
        output,
        "- Overall progress: {:.1}%",
        report.overall_progress_percent
    );
    match report.estimated_completion_date {
        Some(date) => {
            let _ = writeln!(output, "- Estimated completion: {date}");
        }
        None => {
            let _ = writeln!(
                output,
                "- Estimated completion: not derivable from the available captures"
            );
        }
    }

    let simulated = report.timeline.iter().filter(|r| r.is_simulated).count();
    if simulated > 0 {
        let _ = writeln!(
            output,
            "- Warning: {simulated} of {} analyses are simulated, not model output",
            report.timeline.len()
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Timeline");

    if report.timeline.is_empty() {
        let _ = writeln!(output, "No images were analyzed.");
    } else {
        for result in report.timeline.iter() {
            let _ = writeln!(
                output,
                "### {} ({:.1}%{})",
                result.captured_date,
                result.progress_percent,
                if result.is_simulated { ", simulated" } else { "" }
            );
            let _ = writeln!(output, "Image: {}", result.reference);
            let _ = writeln!(output);
            let _ = writeln!(output, "{}", result.narrative.trim());
            let _ = writeln!(output);
        }
    }

    let _ = writeln!(output, "## Recommended Imagery");
    let _ = writeln!(
        output,
        "- Frequency: {}\n- Resolution: {}\n- Spectral bands: {}",
        run.recommendation.frequency,
        run.recommendation.resolution,
        run.recommendation.spectral_bands.join(", ")
    );

    if let Some(summary) = &run.summary {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Executive Summary");
        if summary.is_simulated {
            let _ = writeln!(output, "_Generated locally; the summary model was unavailable._");
            let _ = writeln!(output);
        }
        let _ = writeln!(output, "{}", summary.text.trim());
    }

    output
}

pub fn render_json(run: &RunReport) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(run)?)
}

pub fn format_record(record: &ImageRecord) -> String {
    let metadata: Vec<String> = record
        .auxiliary_metadata
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect();

    if metadata.is_empty() {
        format!("- {} {}", record.captured_date, record.reference)
    } else {
        format!(
            "- {} {} ({})",
            record.captured_date,
            record.reference,
            metadata.join(", ")
        )
    }
}
