//! Defensive validation of model output.
//!
//! The model is an untrusted producer: the requested shape is described, not
//! enforced. Policy is two-tier. Output that is not JSON at all is fatal —
//! there is no safe default judgment, so the raw text is surfaced for
//! diagnosis. Field-level noise inside valid JSON is expected and recovered
//! locally: every field goes through total, clamp-based coercion that never
//! errors.

use serde_json::Value;

use crate::error::ApiError;
use crate::schema::{ParcelScores, PlanningSummary};

/// Parse and coerce a raw scoring completion.
pub fn parse_scores(raw: &str) -> Result<ParcelScores, ApiError> {
    let value = parse_json(raw)?;

    Ok(ParcelScores {
        development_potential: clamp_score(value.get("development_potential")),
        planning_probability: clamp_score(value.get("planning_probability")),
        access_quality: clamp_score(value.get("access_quality")),
        constraint_severity: clamp_score(value.get("constraint_severity")),
        marketability: clamp_score(value.get("marketability")),
        density_potential: clamp_score(value.get("density_potential")),
        recommended_use: string_or(value.get("recommended_use"), "unspecified"),
        rationale: string_or(value.get("rationale"), ""),
    })
}

/// Parse and coerce a raw planning-summary completion.
pub fn parse_planning_summary(raw: &str) -> Result<PlanningSummary, ApiError> {
    let value = parse_json(raw)?;

    Ok(PlanningSummary {
        decision: string_or(value.get("decision"), "unknown"),
        summary: string_or(value.get("summary"), ""),
        policies: string_list(value.get("policies")),
        material_issues: string_list(value.get("material_issues")),
        risks: string_list(value.get("risks")),
        approval_probability: clamp_probability(value.get("approval_probability")),
    })
}

/// Syntax-level parse. Models sometimes wrap JSON in markdown fences despite
/// the instructions; tolerate that, but anything else unparseable is fatal.
fn parse_json(raw: &str) -> Result<Value, ApiError> {
    let json_str = if raw.contains("```json") {
        raw.split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(raw)
            .trim()
    } else if raw.contains("```") {
        raw.split("```").nth(1).unwrap_or(raw).trim()
    } else {
        raw.trim()
    };

    serde_json::from_str(json_str).map_err(|_| ApiError::Schema {
        raw: raw.to_string(),
    })
}

/// Clamp a score into [0, 100]; anything non-numeric or non-finite becomes 0.
fn clamp_score(value: Option<&Value>) -> f64 {
    match value.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => n.clamp(0.0, 100.0),
        _ => 0.0,
    }
}

/// Clamp a probability into [0, 1]; anything non-numeric stays null.
fn clamp_probability(value: Option<&Value>) -> Option<f64> {
    match value.and_then(Value::as_f64) {
        Some(n) if n.is_finite() => Some(n.clamp(0.0, 1.0)),
        _ => None,
    }
}

fn string_or(value: Option<&Value>, fallback: &str) -> String {
    match value.and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => fallback.to_string(),
    }
}

/// Coerce to a list of strings; a missing or non-array value becomes `[]`.
/// Elements are not individually validated — non-strings are rendered as-is.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value.and_then(Value::as_array) {
        Some(items) => items
            .iter()
            .map(|v| match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_string(),
            })
            .collect(),
        None => Vec::new(),
    }
}
