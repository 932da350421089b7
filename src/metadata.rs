use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tracing::debug;

use crate::models::{ImageRecord, MetadataValue};

const SAMPLE_BUCKET: &str = "gs://site_comparisons/Project_images";

pub fn sample_records() -> anyhow::Result<Vec<ImageRecord>> {
    let samples = vec![
        ("Project_Aug_1.png", (2023, 8, 13), 0.2),
        ("Project_Nov_1.png", (2023, 11, 29), 0.1),
        ("Project_Dec_1.png", (2023, 12, 8), 0.1),
    ];

    let mut records = Vec::new();
    for (file, (year, month, day), cloud_cover) in samples {
        let mut auxiliary_metadata = BTreeMap::new();
        auxiliary_metadata.insert("cloud_cover".to_string(), MetadataValue::Float(cloud_cover));
        records.push(ImageRecord {
            reference: format!("{SAMPLE_BUCKET}/{file}"),
            captured_date: NaiveDate::from_ymd_opt(year, month, day).context("invalid date")?,
            auxiliary_metadata,
        });
    }

    Ok(records)
}

/// Loads a catalog file, dispatching on its extension. Records keep file order.
pub fn load_records(path: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    let records = match extension.as_deref() {
        Some("json") => load_json(path)?,
        Some("csv") => load_csv(path)?,
        _ => bail!(
            "unsupported catalog format for {} (expected .json or .csv)",
            path.display()
        ),
    };

    for record in &records {
        if record.reference.trim().is_empty() {
            bail!("catalog {} contains a record without a reference", path.display());
        }
    }

    debug!(path = %path.display(), count = records.len(), "load_records: loaded");
    Ok(records)
}

fn load_json(path: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let records: Vec<ImageRecord> = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(records)
}

fn load_csv(path: &Path) -> anyhow::Result<Vec<ImageRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let reference_idx = headers
        .iter()
        .position(|h| h == "reference")
        .context("catalog is missing a `reference` column")?;
    let date_idx = headers
        .iter()
        .position(|h| h == "captured_date")
        .context("catalog is missing a `captured_date` column")?;

    let mut records = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = result?;
        let reference = row.get(reference_idx).unwrap_or_default().trim().to_string();
        let raw_date = row.get(date_idx).unwrap_or_default().trim();
        let captured_date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .with_context(|| format!("row {}: invalid captured_date `{raw_date}`", line + 1))?;

        let mut auxiliary_metadata = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if idx == reference_idx || idx == date_idx {
                continue;
            }
            if let Some(value) = row.get(idx).filter(|v| !v.trim().is_empty()) {
                auxiliary_metadata.insert(header.to_string(), MetadataValue::infer(value));
            }
        }

        records.push(ImageRecord {
            reference,
            captured_date,
            auxiliary_metadata,
        });
    }

    Ok(records)
}
