//! Domain types shared across the enrichment pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A land parcel as read from the parcel catalog. This service never writes
/// parcels; optional fields are omitted from serialized context when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parcel {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_sq_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_plan_designation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flood_zone: Option<String>,
    /// Opaque constraint layers (JSONB in the catalog).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<serde_json::Value>,
    /// Pre-stored price-paid comparables snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ppd_snapshot: Option<serde_json::Value>,
}

/// AI suitability scores for one parcel. Every numeric field is within
/// [0, 100] after validation, regardless of what the model produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelScores {
    pub development_potential: f64,
    pub planning_probability: f64,
    pub access_quality: f64,
    pub constraint_severity: f64,
    pub marketability: f64,
    pub density_potential: f64,
    pub recommended_use: String,
    pub rationale: String,
}

/// Stored score row: exactly one live record per parcel_id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub parcel_id: String,
    pub scores: ParcelScores,
    pub updated_at: DateTime<Utc>,
}

/// Structured summary of a planning application / decision.
/// `approval_probability` is always `None` or within [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningSummary {
    pub decision: String,
    pub summary: String,
    pub policies: Vec<String>,
    pub material_issues: Vec<String>,
    pub risks: Vec<String>,
    pub approval_probability: Option<f64>,
}

/// Identifying key for a stored planning summary. Built by construction so a
/// record always has exactly one non-null key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryKey {
    Parcel(String),
    SourceUrl(String),
}

impl SummaryKey {
    /// Pick the persistence key: parcel id wins over source URL.
    /// Returns `None` when neither is present (result is not persisted).
    pub fn from_parts(parcel_id: Option<&str>, url: Option<&str>) -> Option<Self> {
        match (parcel_id, url) {
            (Some(id), _) if !id.is_empty() => Some(SummaryKey::Parcel(id.to_string())),
            (_, Some(u)) if !u.is_empty() => Some(SummaryKey::SourceUrl(u.to_string())),
            _ => None,
        }
    }

    /// Column name the upsert conflicts on.
    pub fn conflict_column(&self) -> &'static str {
        match self {
            SummaryKey::Parcel(_) => "parcel_id",
            SummaryKey::SourceUrl(_) => "source_url",
        }
    }
}

/// Append-only reference to a generated passport document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassportRecord {
    pub parcel_id: String,
    pub file_path: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
