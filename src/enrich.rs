//! Scoring and planning-summary pipelines.
//!
//! Both follow the same shape: assemble context, ask the model for a
//! constrained JSON judgment, validate defensively, persist best-effort,
//! return the validated result. A failed store write never fails the
//! request; a structurally invalid completion always does.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::context::{resolve_source_text, PageFetcher};
use crate::error::ApiError;
use crate::llm::{ChatCompletion, CompletionRequest};
use crate::prompts;
use crate::schema::{ParcelScores, PlanningSummary, SummaryKey};
use crate::supabase::{Durability, EnrichmentStore};
use crate::validate;

/// Caller input for the planning-summary pipeline. One of `url` / `raw_text`
/// is required; `parcel_id` only affects the persistence key.
#[derive(Debug, Clone, Default)]
pub struct SummaryRequest {
    pub url: Option<String>,
    pub raw_text: Option<String>,
    pub parcel_id: Option<String>,
}

/// Scoring pipeline response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredParcel {
    pub parcel_id: String,
    pub scores: ParcelScores,
}

/// Orchestrator for the two enrichment pipelines. Clients are injected so
/// tests can substitute them.
pub struct Enricher {
    llm: Arc<dyn ChatCompletion>,
    store: Arc<dyn EnrichmentStore>,
    fetcher: Arc<dyn PageFetcher>,
}

impl Enricher {
    pub fn new(
        llm: Arc<dyn ChatCompletion>,
        store: Arc<dyn EnrichmentStore>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            llm,
            store,
            fetcher,
        }
    }

    /// Generate suitability scores for a parcel and upsert them on
    /// `parcel_id`.
    pub async fn score_parcel(&self, parcel_id: &str) -> Result<ScoredParcel, ApiError> {
        let parcel = self
            .store
            .fetch_parcel(parcel_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        info!("Scoring parcel {}", parcel.id);

        let raw = self
            .llm
            .complete(CompletionRequest {
                system: prompts::SCORE_SYSTEM_PROMPT.to_string(),
                user: prompts::score_user_prompt(&parcel),
                temperature: 0.3,
            })
            .await?;

        let scores = validate::parse_scores(&raw)?;

        Durability::BestEffort.apply(
            self.store.upsert_scores(&parcel.id, &scores).await,
            "parcel scores",
        )?;

        Ok(ScoredParcel {
            parcel_id: parcel.id,
            scores,
        })
    }

    /// Summarise a planning application / decision from raw text or a URL,
    /// upserting the result when an identifying key is available.
    pub async fn planning_summary(
        &self,
        request: &SummaryRequest,
    ) -> Result<PlanningSummary, ApiError> {
        let source_text = resolve_source_text(
            request.raw_text.as_deref(),
            request.url.as_deref(),
            self.fetcher.as_ref(),
        )
        .await?;

        info!("Summarising planning text ({} chars)", source_text.len());

        let raw = self
            .llm
            .complete(CompletionRequest {
                system: prompts::SUMMARY_SYSTEM_PROMPT.to_string(),
                user: prompts::summary_user_prompt(&source_text),
                temperature: 0.2,
            })
            .await?;

        let summary = validate::parse_planning_summary(&raw)?;

        // Without a parcel id or source URL there is no conflict key, so the
        // result is returned without being stored.
        if let Some(key) =
            SummaryKey::from_parts(request.parcel_id.as_deref(), request.url.as_deref())
        {
            Durability::BestEffort.apply(
                self.store.upsert_planning_summary(&key, &summary).await,
                "planning summary",
            )?;
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_parcel, FakeLlm, FakeStore, NoFetch, SummaryKeyCell};
    use std::time::Duration;

    const GOOD_SCORES: &str = r#"{
        "development_potential": 82,
        "planning_probability": 140,
        "access_quality": 61,
        "constraint_severity": -10,
        "marketability": 70,
        "density_potential": 45,
        "recommended_use": "medium-density residential",
        "rationale": "Well-located site with few constraints."
    }"#;

    const GOOD_SUMMARY: &str = r#"{
        "decision": "refused",
        "summary": "Outline application for 40 dwellings refused.",
        "policies": ["NPPF", "Local Plan H2"],
        "material_issues": ["highway safety"],
        "risks": ["green belt encroachment"],
        "approval_probability": 1.4
    }"#;

    fn enricher(llm: FakeLlm, store: Arc<FakeStore>) -> Enricher {
        Enricher::new(Arc::new(llm), store, Arc::new(NoFetch))
    }

    #[tokio::test]
    async fn test_score_parcel_end_to_end() {
        let store = Arc::new(FakeStore::with_parcel(test_parcel("p1")));
        let result = enricher(FakeLlm::returning(GOOD_SCORES), store.clone())
            .score_parcel("p1")
            .await
            .unwrap();

        assert_eq!(result.parcel_id, "p1");
        for value in [
            result.scores.development_potential,
            result.scores.planning_probability,
            result.scores.access_quality,
            result.scores.constraint_severity,
            result.scores.marketability,
            result.scores.density_potential,
        ] {
            assert!((0.0..=100.0).contains(&value));
        }
        assert_eq!(result.scores.planning_probability, 100.0);
        assert_eq!(result.scores.constraint_severity, 0.0);
        assert!(!result.scores.recommended_use.is_empty());

        let stored = store.scores.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get("p1").unwrap().parcel_id, "p1");
    }

    #[tokio::test]
    async fn test_score_twice_upserts_single_record() {
        let store = Arc::new(FakeStore::with_parcel(test_parcel("p1")));
        let enricher = enricher(FakeLlm::returning(GOOD_SCORES), store.clone());

        enricher.score_parcel("p1").await.unwrap();
        let first = store.scores.lock().unwrap().get("p1").unwrap().updated_at;

        tokio::time::sleep(Duration::from_millis(5)).await;
        enricher.score_parcel("p1").await.unwrap();

        let stored = store.scores.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.get("p1").unwrap().updated_at > first);
    }

    #[tokio::test]
    async fn test_score_missing_parcel_not_found() {
        let store = Arc::new(FakeStore::default());
        let err = enricher(FakeLlm::returning(GOOD_SCORES), store)
            .score_parcel("missing")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_score_store_failure_is_best_effort() {
        let mut store = FakeStore::with_parcel(test_parcel("p1"));
        store.fail_writes = true;
        let result = enricher(FakeLlm::returning(GOOD_SCORES), Arc::new(store))
            .score_parcel("p1")
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_score_malformed_json_is_fatal_and_not_stored() {
        let store = Arc::new(FakeStore::with_parcel(test_parcel("p1")));
        let err = enricher(FakeLlm::returning("I cannot help with that."), store.clone())
            .score_parcel("p1")
            .await
            .unwrap_err();
        match err {
            ApiError::Schema { raw } => assert_eq!(raw, "I cannot help with that."),
            other => panic!("expected Schema error, got {other:?}"),
        }
        assert!(store.scores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_persists_under_parcel_key() {
        let store = Arc::new(FakeStore::default());
        let request = SummaryRequest {
            raw_text: Some("Decision notice text".to_string()),
            url: Some("https://planning.example/app/1".to_string()),
            parcel_id: Some("p1".to_string()),
        };
        // NoFetch panics if a fetch happens: rawText must win.
        let summary = enricher(FakeLlm::returning(GOOD_SUMMARY), store.clone())
            .planning_summary(&request)
            .await
            .unwrap();

        assert_eq!(summary.decision, "refused");
        assert_eq!(summary.approval_probability, Some(1.0));

        let stored = store.summaries.lock().unwrap();
        assert_eq!(stored.len(), 1);
        let cell = SummaryKeyCell {
            column: "parcel_id",
            value: "p1".to_string(),
        };
        assert!(stored.contains_key(&cell));
    }

    #[tokio::test]
    async fn test_summary_falls_back_to_url_key() {
        let store = Arc::new(FakeStore::default());
        let request = SummaryRequest {
            raw_text: Some("Decision notice text".to_string()),
            url: Some("https://planning.example/app/1".to_string()),
            parcel_id: None,
        };
        enricher(FakeLlm::returning(GOOD_SUMMARY), store.clone())
            .planning_summary(&request)
            .await
            .unwrap();

        let stored = store.summaries.lock().unwrap();
        let cell = SummaryKeyCell {
            column: "source_url",
            value: "https://planning.example/app/1".to_string(),
        };
        assert!(stored.contains_key(&cell));
    }

    #[tokio::test]
    async fn test_summary_without_key_not_persisted() {
        let store = Arc::new(FakeStore::default());
        let request = SummaryRequest {
            raw_text: Some("Decision notice text".to_string()),
            ..Default::default()
        };
        let summary = enricher(FakeLlm::returning(GOOD_SUMMARY), store.clone())
            .planning_summary(&request)
            .await
            .unwrap();
        assert_eq!(summary.decision, "refused");
        assert!(store.summaries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_malformed_json_writes_nothing() {
        let store = Arc::new(FakeStore::default());
        let request = SummaryRequest {
            raw_text: Some("Decision notice text".to_string()),
            parcel_id: Some("p1".to_string()),
            ..Default::default()
        };
        let err = enricher(FakeLlm::returning("```\nnot json\n```"), store.clone())
            .planning_summary(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Schema { .. }));
        assert!(store.summaries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_summary_model_failure_surfaces() {
        let store = Arc::new(FakeStore::default());
        let request = SummaryRequest {
            raw_text: Some("text".to_string()),
            ..Default::default()
        };
        let err = enricher(FakeLlm::failing("overloaded"), store)
            .planning_summary(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Model(_)));
    }
}
