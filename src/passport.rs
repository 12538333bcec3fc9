//! Passport synthesis: compose parcel facts with stored enrichment and a
//! fresh narrative into a single PDF, upload it, and record the reference.
//!
//! Failure classification differs per step. The two enrichment reads and
//! the narrative call are best-effort (a degraded document is still a
//! document); the blob upload is fatal because without it there is no URL
//! to return; the reference-row insert after a successful upload is again
//! best-effort.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::layout::LayoutEngine;
use crate::llm::{ChatCompletion, CompletionRequest};
use crate::prompts;
use crate::schema::{Parcel, ParcelScores, PassportRecord, PlanningSummary};
use crate::supabase::{Durability, EnrichmentStore};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPassport {
    pub parcel_id: String,
    pub url: String,
}

pub struct PassportGenerator {
    llm: Arc<dyn ChatCompletion>,
    store: Arc<dyn EnrichmentStore>,
}

impl PassportGenerator {
    pub fn new(llm: Arc<dyn ChatCompletion>, store: Arc<dyn EnrichmentStore>) -> Self {
        Self { llm, store }
    }

    pub async fn generate(&self, parcel_id: &str) -> Result<GeneratedPassport, ApiError> {
        let parcel = self
            .store
            .fetch_parcel(parcel_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        info!("Generating passport for parcel {}", parcel.id);

        // Independent reads, issued concurrently. Absence is expected;
        // a failed read degrades to absence as well.
        let (scores_result, planning_result) = tokio::join!(
            self.store.fetch_scores(&parcel.id),
            self.store.fetch_planning_summary(&parcel.id),
        );
        let scores = or_absent(scores_result, "AI scores").map(|record| record.scores);
        let planning = or_absent(planning_result, "planning summary");

        let narrative = self
            .draft_narrative(&parcel, scores.as_ref(), planning.as_ref())
            .await;

        let bytes = compose_document(&parcel, scores.as_ref(), planning.as_ref(), narrative.as_deref())
            .map_err(|e| ApiError::Storage(format!("failed to render document: {e}")))?;

        let file_path = format!(
            "site-passports/{}/{}.pdf",
            parcel.id,
            Utc::now().timestamp_millis()
        );

        // Fatal: no upload means no URL to return.
        let url = self
            .store
            .upload_document(&file_path, bytes, "application/pdf")
            .await?;

        let record = PassportRecord {
            parcel_id: parcel.id.clone(),
            file_path,
            url: url.clone(),
            created_at: Utc::now(),
        };
        Durability::BestEffort.apply(
            self.store.insert_passport(&record).await,
            "passport record",
        )?;

        info!("Passport ready for parcel {}: {}", parcel.id, url);
        Ok(GeneratedPassport {
            parcel_id: parcel.id,
            url,
        })
    }

    /// Best-effort feasibility narrative; failure omits the section.
    async fn draft_narrative(
        &self,
        parcel: &Parcel,
        scores: Option<&ParcelScores>,
        planning: Option<&PlanningSummary>,
    ) -> Option<String> {
        let result = self
            .llm
            .complete(CompletionRequest {
                system: prompts::NARRATIVE_SYSTEM_PROMPT.to_string(),
                user: prompts::narrative_user_prompt(parcel, scores, planning),
                temperature: 0.4,
            })
            .await;

        match result {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(err) => {
                warn!("AI narrative failed, continuing without it: {err}");
                None
            }
        }
    }
}

fn or_absent<T>(result: Result<Option<T>, ApiError>, what: &str) -> Option<T> {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!("Failed to load {what} (treating as absent): {err}");
            None
        }
    }
}

/// Lay out the passport sections in fixed order and render to PDF bytes.
/// Section numbering matches the established document format.
fn compose_document(
    parcel: &Parcel,
    scores: Option<&ParcelScores>,
    planning: Option<&PlanningSummary>,
    narrative: Option<&str>,
) -> anyhow::Result<Vec<u8>> {
    let mut engine = LayoutEngine::new();

    engine.heading("Digital Site Passport");
    let subtitle = parcel
        .address
        .clone()
        .unwrap_or_else(|| format!("Parcel ID: {}", parcel.id));
    engine.paragraph_sized(&subtitle, 12.0);

    engine.subheading("1. Parcel Summary");
    for fact in parcel_facts(parcel) {
        engine.paragraph(&fact);
    }

    if let Some(scores) = scores {
        engine.subheading("2. AI Suitability Scores");
        for line in score_lines(scores) {
            engine.paragraph(&line);
        }
        if !scores.rationale.is_empty() {
            engine.paragraph(&format!("Rationale: {}", scores.rationale));
        }
    }

    if let Some(planning) = planning {
        engine.subheading("3. Planning Summary");
        engine.paragraph(&format!("Decision: {}", planning.decision));
        if let Some(probability) = planning.approval_probability {
            engine.paragraph(&format!(
                "Estimated approval probability: {:.0}%",
                probability * 100.0
            ));
        }
        if !planning.summary.is_empty() {
            engine.paragraph(&format!("Summary: {}", planning.summary));
        }
        if !planning.risks.is_empty() {
            engine.paragraph(&format!("Key risks: {}", planning.risks.join(", ")));
        }
    }

    if let Some(narrative) = narrative {
        engine.subheading("4. AI Feasibility Commentary");
        engine.paragraph(narrative);
    }

    engine.subheading("5. Additional Layers (beta)");
    engine.paragraph(
        "Topography, detailed constraints, comparables and site photography can be \
         added here as further data sources are connected.",
    );

    engine.render()
}

/// Parcel fact lines; absent fields are simply omitted.
fn parcel_facts(parcel: &Parcel) -> Vec<String> {
    let mut facts = Vec::new();
    if let Some(address) = &parcel.address {
        facts.push(format!("Address: {address}"));
    }
    if let Some(area) = parcel.area_sq_m {
        facts.push(format!("Area: {area:.0} m\u{00b2}"));
    }
    if let Some(use_class) = &parcel.use_class {
        facts.push(format!("Use class: {use_class}"));
    }
    if let Some(designation) = &parcel.local_plan_designation {
        facts.push(format!("Local plan designation: {designation}"));
    }
    if let Some(flood_zone) = &parcel.flood_zone {
        facts.push(format!("Flood zone: {flood_zone}"));
    }
    facts
}

fn score_lines(scores: &ParcelScores) -> Vec<String> {
    vec![
        format!("Development potential: {:.0} / 100", scores.development_potential),
        format!("Planning probability: {:.0} / 100", scores.planning_probability),
        format!("Access quality: {:.0} / 100", scores.access_quality),
        format!("Constraint severity: {:.0} / 100", scores.constraint_severity),
        format!("Marketability: {:.0} / 100", scores.marketability),
        format!("Density potential: {:.0} / 100", scores.density_potential),
        format!("Recommended use: {}", scores.recommended_use),
    ]
}
