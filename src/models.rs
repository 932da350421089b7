use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetadataValue {
    /// Types a raw catalog cell, preferring the narrowest scalar that parses.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<bool>() {
            return MetadataValue::Bool(value);
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return MetadataValue::Integer(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return MetadataValue::Float(value);
        }
        MetadataValue::Text(trimmed.to_string())
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(value) => write!(f, "{value}"),
            MetadataValue::Integer(value) => write!(f, "{value}"),
            MetadataValue::Float(value) => write!(f, "{value}"),
            MetadataValue::Text(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub reference: String,
    pub captured_date: NaiveDate,
    #[serde(default)]
    pub auxiliary_metadata: BTreeMap<String, MetadataValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub reference: String,
    pub captured_date: NaiveDate,
    pub narrative: String,
    pub progress_percent: f64,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidatedReport {
    pub timeline: Vec<AnalysisResult>,
    pub overall_progress_percent: f64,
    /// `None` when the captures do not support an extrapolation.
    pub estimated_completion_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDetails {
    pub name: String,
    pub project_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSpecs {
    pub frequency: String,
    pub resolution: String,
    pub spectral_bands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutiveSummary {
    pub text: String,
    pub is_simulated: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub project: ProjectDetails,
    pub report: ConsolidatedReport,
    pub recommendation: ImageSpecs,
    pub summary: Option<ExecutiveSummary>,
}
