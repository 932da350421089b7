use std::fmt::Write;
use std::time::Duration;

use tracing::{info, warn};

use crate::analyzer::{ModelError, SummaryModel};
use crate::models::{ConsolidatedReport, ExecutiveSummary, ImageSpecs, ProjectDetails};

pub fn build_summary_prompt(project: &ProjectDetails, report: &ConsolidatedReport) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Provide an executive summary for the {} project \"{}\". Highlight the % of the project \
         completed and an estimate of the time needed to finish it.",
        project.project_type, project.name
    );
    let _ = writeln!(prompt);
    let _ = writeln!(prompt, "Per-image analyses in capture order:");
    for result in &report.timeline {
        let _ = writeln!(
            prompt,
            "- {} ({}): {:.1}%{}\n  {}",
            result.captured_date,
            result.reference,
            result.progress_percent,
            if result.is_simulated { " [simulated]" } else { "" },
            result.narrative.replace('\n', " ")
        );
    }
    let _ = writeln!(prompt);
    let _ = writeln!(
        prompt,
        "Include key observations from the image analysis, potential risks, and strategic \
         recommendations, including the frequency of satellite imagery needed for continued monitoring."
    );
    prompt
}

/// Text used when the summary model cannot be reached.
pub fn fallback_summary(report: &ConsolidatedReport, specs: &ImageSpecs) -> String {
    let completion = match report.estimated_completion_date {
        Some(date) => format!(" At the observed pace it should finish around {date}."),
        None => " The captures do not yet support a completion estimate.".to_string(),
    };
    format!(
        "The project is approximately {:.1}% complete.{completion} \
         It is recommended to collect {} imagery at {} resolution for continued monitoring.",
        report.overall_progress_percent, specs.frequency, specs.resolution
    )
}

pub async fn executive_summary(
    model: &dyn SummaryModel,
    timeout: Duration,
    project: &ProjectDetails,
    report: &ConsolidatedReport,
    specs: &ImageSpecs,
) -> ExecutiveSummary {
    let prompt = build_summary_prompt(project, report);
    let outcome = match tokio::time::timeout(timeout, model.summarize(&prompt)).await {
        Ok(result) => result,
        Err(_) => Err(ModelError::Timeout(timeout)),
    };

    match outcome {
        Ok(text) => {
            info!(chars = text.len(), "executive_summary: model summary received");
            ExecutiveSummary {
                text,
                is_simulated: false,
            }
        }
        Err(err) => {
            warn!(error = %err, "executive_summary: model unavailable, using local summary");
            ExecutiveSummary {
                text: fallback_summary(report, specs),
                is_simulated: true,
            }
        }
    }
}
