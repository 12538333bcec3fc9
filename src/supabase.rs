#![allow(dead_code)]
//! Supabase client: enrichment reads/writes over PostgREST plus passport
//! uploads to Storage.
//!
//! The [`EnrichmentStore`] trait is the seam the pipelines depend on, so
//! tests run against an in-memory store. Writes are upserts keyed on the
//! declared conflict column — repeated identical requests converge to one
//! record instead of accumulating duplicates.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::schema::{Parcel, ParcelScores, PassportRecord, PlanningSummary, ScoreRecord, SummaryKey};

const DOCUMENTS_BUCKET: &str = "documents";

/// Whether a store write is allowed to fail without failing the request.
///
/// Stored scores and summaries are derived, cacheable artifacts, not a
/// system of record; for those the computed result is returned even when the
/// write fails (availability over durability). The policy is explicit at
/// each call site rather than an implicit side effect of error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    BestEffort,
    Required,
}

impl Durability {
    /// Apply the policy to a write result. `BestEffort` downgrades a failure
    /// to a logged warning.
    pub fn apply(self, result: Result<(), ApiError>, what: &str) -> Result<(), ApiError> {
        match (self, result) {
            (_, Ok(())) => Ok(()),
            (Durability::BestEffort, Err(err)) => {
                warn!("Failed to persist {what} (continuing): {err}");
                Ok(())
            }
            (Durability::Required, Err(err)) => Err(err),
        }
    }
}

/// Seam over the parcel catalog, the enrichment tables, and blob storage.
#[async_trait::async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Read a parcel by id. `Ok(None)` is the distinct not-found condition.
    async fn fetch_parcel(&self, parcel_id: &str) -> Result<Option<Parcel>, ApiError>;

    /// Read the live score record for a parcel, if any.
    async fn fetch_scores(&self, parcel_id: &str) -> Result<Option<ScoreRecord>, ApiError>;

    /// Read the stored planning summary for a parcel, if any.
    async fn fetch_planning_summary(
        &self,
        parcel_id: &str,
    ) -> Result<Option<PlanningSummary>, ApiError>;

    /// Upsert scores on `parcel_id`, refreshing `updated_at`.
    async fn upsert_scores(&self, parcel_id: &str, scores: &ParcelScores)
        -> Result<(), ApiError>;

    /// Upsert a planning summary on the key's conflict column.
    async fn upsert_planning_summary(
        &self,
        key: &SummaryKey,
        summary: &PlanningSummary,
    ) -> Result<(), ApiError>;

    /// Append a passport reference row (never overwrites).
    async fn insert_passport(&self, record: &PassportRecord) -> Result<(), ApiError>;

    /// Upload a document to blob storage, returning its public URL.
    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError>;
}

/// Supabase-backed implementation.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    /// Create a client from `SUPABASE_URL` and `SUPABASE_SERVICE_ROLE_KEY`.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("SUPABASE_URL").map_err(|_| anyhow!("SUPABASE_URL not set"))?;
        let service_role_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .map_err(|_| anyhow!("SUPABASE_SERVICE_ROLE_KEY not set"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            service_role_key,
        })
    }

    /// GET from the REST API, deserializing the row array.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}/rest/v1/{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .send()
            .await
            .map_err(|e| ApiError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!("GET {path} failed: {status} - {text}")));
        }

        resp.json()
            .await
            .map_err(|e| ApiError::Store(e.to_string()))
    }

    /// POST a row to the REST API. `on_conflict` switches insert to upsert.
    async fn post_row(
        &self,
        table: &str,
        on_conflict: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<(), ApiError> {
        let url = match on_conflict {
            Some(column) => format!(
                "{}/rest/v1/{}?on_conflict={}",
                self.base_url, table, column
            ),
            None => format!("{}/rest/v1/{}", self.base_url, table),
        };

        let prefer = if on_conflict.is_some() {
            "resolution=merge-duplicates,return=minimal"
        } else {
            "return=minimal"
        };

        let resp = self
            .client
            .post(&url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
            .header("Prefer", prefer)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Store(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Store(format!(
                "write to {table} failed: {status} - {text}"
            )));
        }

        debug!("Wrote row to {table}");
        Ok(())
    }
}

#[async_trait::async_trait]
impl EnrichmentStore for SupabaseClient {
    async fn fetch_parcel(&self, parcel_id: &str) -> Result<Option<Parcel>, ApiError> {
        let rows: Vec<Parcel> = self
            .get_json(&format!(
                "parcels?id=eq.{parcel_id}&select=id,address,area_sq_m,use_class,local_plan_designation,flood_zone,constraints,ppd_snapshot"
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_scores(&self, parcel_id: &str) -> Result<Option<ScoreRecord>, ApiError> {
        let rows: Vec<ScoreRecord> = self
            .get_json(&format!(
                "parcel_ai_scores?parcel_id=eq.{parcel_id}&select=parcel_id,scores,updated_at"
            ))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn fetch_planning_summary(
        &self,
        parcel_id: &str,
    ) -> Result<Option<PlanningSummary>, ApiError> {
        let rows: Vec<PlanningSummaryRow> = self
            .get_json(&format!(
                "planning_summaries?parcel_id=eq.{parcel_id}&select=decision,summary,policies,material_issues,risks,approval_probability"
            ))
            .await?;
        Ok(rows.into_iter().next().map(PlanningSummaryRow::into_summary))
    }

    async fn upsert_scores(
        &self,
        parcel_id: &str,
        scores: &ParcelScores,
    ) -> Result<(), ApiError> {
        let body = json!({
            "parcel_id": parcel_id,
            "scores": scores,
            "updated_at": Utc::now(),
        });
        self.post_row("parcel_ai_scores", Some("parcel_id"), &body)
            .await
    }

    async fn upsert_planning_summary(
        &self,
        key: &SummaryKey,
        summary: &PlanningSummary,
    ) -> Result<(), ApiError> {
        let (parcel_id, source_url) = match key {
            SummaryKey::Parcel(id) => (Some(id.as_str()), None),
            SummaryKey::SourceUrl(url) => (None, Some(url.as_str())),
        };

        let body = json!({
            "parcel_id": parcel_id,
            "source_url": source_url,
            "decision": summary.decision,
            "summary": summary.summary,
            "policies": summary.policies,
            "material_issues": summary.material_issues,
            "risks": summary.risks,
            "approval_probability": summary.approval_probability,
            "updated_at": Utc::now(),
        });
        self.post_row("planning_summaries", Some(key.conflict_column()), &body)
            .await
    }

    async fn insert_passport(&self, record: &PassportRecord) -> Result<(), ApiError> {
        let body = json!({
            "parcel_id": record.parcel_id,
            "file_path": record.file_path,
            "url": record.url,
            "created_at": record.created_at,
        });
        self.post_row("parcel_passports", None, &body).await
    }

    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ApiError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, DOCUMENTS_BUCKET, path
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| ApiError::Storage(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::Storage(format!("{status}: {text}")));
        }

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, DOCUMENTS_BUCKET, path
        ))
    }
}

/// Stored summary row. Columns are nullable in the table, so every field
/// defaults before mapping back into the domain type.
#[derive(Debug, Deserialize)]
struct PlanningSummaryRow {
    #[serde(default)]
    decision: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    policies: Option<Vec<String>>,
    #[serde(default)]
    material_issues: Option<Vec<String>>,
    #[serde(default)]
    risks: Option<Vec<String>>,
    #[serde(default)]
    approval_probability: Option<f64>,
}

impl PlanningSummaryRow {
    fn into_summary(self) -> PlanningSummary {
        PlanningSummary {
            decision: self.decision.unwrap_or_else(|| "unknown".to_string()),
            summary: self.summary.unwrap_or_default(),
            policies: self.policies.unwrap_or_default(),
            material_issues: self.material_issues.unwrap_or_default(),
            risks: self.risks.unwrap_or_default(),
            approval_probability: self.approval_probability,
        }
    }
}
