//! In-memory substitute clients for pipeline tests.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;

use crate::context::PageFetcher;
use crate::error::ApiError;
use crate::llm::{ChatCompletion, CompletionRequest};
use crate::schema::{
    Parcel, ParcelScores, PassportRecord, PlanningSummary, ScoreRecord, SummaryKey,
};
use crate::supabase::EnrichmentStore;

/// Completion client serving a canned response (or a canned failure).
pub struct FakeLlm {
    response: Result<String, String>,
}

impl FakeLlm {
    pub fn returning(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl ChatCompletion for FakeLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ApiError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(ApiError::Model(msg.clone())),
        }
    }
}

/// Fetcher that must never be reached.
pub struct NoFetch;

#[async_trait::async_trait]
impl PageFetcher for NoFetch {
    async fn fetch(&self, url: &str) -> Result<String, ApiError> {
        panic!("unexpected fetch of {url}");
    }
}

/// In-memory store modelling upsert-by-key and append-only semantics.
#[derive(Default)]
pub struct FakeStore {
    pub parcels: HashMap<String, Parcel>,
    pub scores: Mutex<HashMap<String, ScoreRecord>>,
    pub summaries: Mutex<HashMap<SummaryKeyCell, PlanningSummary>>,
    pub passports: Mutex<Vec<PassportRecord>>,
    pub uploads: Mutex<Vec<(String, Vec<u8>)>>,
    pub fail_writes: bool,
    pub fail_upload: bool,
}

/// Hashable form of [`SummaryKey`] for the in-memory map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKeyCell {
    pub column: &'static str,
    pub value: String,
}

impl From<&SummaryKey> for SummaryKeyCell {
    fn from(key: &SummaryKey) -> Self {
        let value = match key {
            SummaryKey::Parcel(id) => id.clone(),
            SummaryKey::SourceUrl(url) => url.clone(),
        };
        Self {
            column: key.conflict_column(),
            value,
        }
    }
}

impl FakeStore {
    pub fn with_parcel(parcel: Parcel) -> Self {
        let mut store = Self::default();
        store.parcels.insert(parcel.id.clone(), parcel);
        store
    }
}

/// A minimal parcel for tests.
pub fn test_parcel(id: &str) -> Parcel {
    Parcel {
        id: id.to_string(),
        address: Some("1 High Street, Testford".to_string()),
        area_sq_m: Some(5000.0),
        use_class: Some("residential".to_string()),
        local_plan_designation: None,
        flood_zone: None,
        constraints: None,
        ppd_snapshot: None,
    }
}

#[async_trait::async_trait]
impl EnrichmentStore for FakeStore {
    async fn fetch_parcel(&self, parcel_id: &str) -> Result<Option<Parcel>, ApiError> {
        Ok(self.parcels.get(parcel_id).cloned())
    }

    async fn fetch_scores(&self, parcel_id: &str) -> Result<Option<ScoreRecord>, ApiError> {
        Ok(self.scores.lock().unwrap().get(parcel_id).cloned())
    }

    async fn fetch_planning_summary(
        &self,
        parcel_id: &str,
    ) -> Result<Option<PlanningSummary>, ApiError> {
        let cell = SummaryKeyCell {
            column: "parcel_id",
            value: parcel_id.to_string(),
        };
        Ok(self.summaries.lock().unwrap().get(&cell).cloned())
    }

    async fn upsert_scores(
        &self,
        parcel_id: &str,
        scores: &ParcelScores,
    ) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Store("injected write failure".to_string()));
        }
        self.scores.lock().unwrap().insert(
            parcel_id.to_string(),
            ScoreRecord {
                parcel_id: parcel_id.to_string(),
                scores: scores.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn upsert_planning_summary(
        &self,
        key: &SummaryKey,
        summary: &PlanningSummary,
    ) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Store("injected write failure".to_string()));
        }
        self.summaries
            .lock()
            .unwrap()
            .insert(SummaryKeyCell::from(key), summary.clone());
        Ok(())
    }

    async fn insert_passport(&self, record: &PassportRecord) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Store("injected write failure".to_string()));
        }
        self.passports.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn upload_document(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ApiError> {
        if self.fail_upload {
            return Err(ApiError::Storage("injected upload failure".to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_string(), bytes));
        Ok(format!("https://storage.test/public/documents/{path}"))
    }
}
