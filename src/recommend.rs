use tracing::debug;

use crate::models::ImageSpecs;

/// Progress at which monitoring tightens to a weekly cadence.
pub const CLOSE_OUT_THRESHOLD: f64 = 75.0;

pub fn recommend_specs(project_type: &str, overall_progress: Option<f64>) -> ImageSpecs {
    let (frequency, resolution, bands): (&str, &str, &[&str]) =
        match project_type.trim().to_lowercase().as_str() {
            "building" => ("monthly", "0.5m", &["RGB", "NIR"][..]),
            "road" => ("bi-weekly", "1m", &["RGB"][..]),
            _ => ("monthly", "1m", &["RGB"][..]),
        };

    let frequency = match overall_progress {
        Some(progress) if progress >= CLOSE_OUT_THRESHOLD => "weekly",
        _ => frequency,
    };

    debug!(project_type, ?overall_progress, frequency, "recommend_specs: resolved");
    ImageSpecs {
        frequency: frequency.to_string(),
        resolution: resolution.to_string(),
        spectral_bands: bands.iter().map(|b| b.to_string()).collect(),
    }
}
