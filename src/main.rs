//! Landsight enrichment service: AI parcel scoring, planning summaries, and
//! site passport generation over the parcel catalog.

mod context;
mod enrich;
mod error;
mod html;
mod layout;
mod llm;
mod passport;
mod prompts;
mod schema;
mod supabase;
#[cfg(test)]
mod testutil;
mod validate;

use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use context::{HttpFetcher, PageFetcher};
use enrich::{Enricher, ScoredParcel, SummaryRequest};
use error::ApiError;
use llm::{ChatCompletion, OpenAiClient};
use passport::{GeneratedPassport, PassportGenerator};
use schema::PlanningSummary;
use supabase::{EnrichmentStore, SupabaseClient};

/// Application state shared across handlers. Clients are constructed once at
/// startup and injected; pipeline stages never reach for globals.
#[derive(Clone)]
struct AppState {
    enricher: Arc<Enricher>,
    passports: Arc<PassportGenerator>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "landsight=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let llm: Arc<dyn ChatCompletion> = Arc::new(OpenAiClient::from_env()?);
    info!("Completion client initialized");

    let store: Arc<dyn EnrichmentStore> = Arc::new(SupabaseClient::from_env()?);
    info!("Supabase client initialized");

    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new()?);

    let state = AppState {
        enricher: Arc::new(Enricher::new(llm.clone(), store.clone(), fetcher)),
        passports: Arc::new(PassportGenerator::new(llm, store)),
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/ai/score-parcel", post(score_parcel))
        .route("/ai/planning-summary", post(planning_summary))
        .route("/passports/generate", post(generate_passport))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    info!("Server listening on http://0.0.0.0:3000");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParcelBody {
    parcel_id: Option<String>,
}

impl ParcelBody {
    fn require_parcel_id(self) -> Result<String, ApiError> {
        self.parcel_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::Validation("parcelId is required".to_string()))
    }
}

/// Generate and persist AI suitability scores for one parcel.
async fn score_parcel(
    State(state): State<AppState>,
    Json(body): Json<ParcelBody>,
) -> Result<Json<ScoredParcel>, ApiError> {
    let parcel_id = body.require_parcel_id()?;
    let scored = state.enricher.score_parcel(&parcel_id).await?;
    Ok(Json(scored))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryBody {
    url: Option<String>,
    raw_text: Option<String>,
    parcel_id: Option<String>,
}

/// Summarise a planning application / decision from a URL or raw text.
async fn planning_summary(
    State(state): State<AppState>,
    Json(body): Json<SummaryBody>,
) -> Result<Json<PlanningSummary>, ApiError> {
    let has_url = body.url.as_deref().is_some_and(|u| !u.is_empty());
    let has_text = body.raw_text.as_deref().is_some_and(|t| !t.is_empty());
    if !has_url && !has_text {
        return Err(ApiError::Validation(
            "Either url or rawText is required".to_string(),
        ));
    }

    let request = SummaryRequest {
        url: body.url,
        raw_text: body.raw_text,
        parcel_id: body.parcel_id,
    };
    let summary = state.enricher.planning_summary(&request).await?;
    Ok(Json(summary))
}

/// Synthesise and upload a site passport document for one parcel.
async fn generate_passport(
    State(state): State<AppState>,
    Json(body): Json<ParcelBody>,
) -> Result<Json<GeneratedPassport>, ApiError> {
    let parcel_id = body.require_parcel_id()?;
    let passport = state.passports.generate(&parcel_id).await?;
    Ok(Json(passport))
}
