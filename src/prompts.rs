//! Prompt construction for the three completion use cases.
//!
//! Each use case is a fixed system instruction describing the exact JSON
//! shape required, plus a user payload carrying the serialized context.
//! Free-text sources are truncated to a fixed character budget before
//! inclusion; the tail is dropped, never the head, and the truncation is not
//! reported to the caller.

use crate::schema::{Parcel, ParcelScores, PlanningSummary};

/// Character budget for free-text source material in a user payload.
/// Deliberately lossy: caps latency and token cost.
pub const MAX_SOURCE_CHARS: usize = 12_000;

pub const SCORE_SYSTEM_PROMPT: &str = "\
You are a UK land and planning analyst.
Given factual parcel data, you MUST output a single JSON object with numeric scores between 0 and 100,
plus a recommended use and a short rationale.

Scores:
- development_potential (0-100)
- planning_probability (0-100)
- access_quality (0-100)
- constraint_severity (0-100, where higher = more severe constraints)
- marketability (0-100)
- density_potential (approx units per hectare, treat as 0-100 scale)
- recommended_use (string: e.g. \"medium-density residential\", \"logistics\", \"care home\", \"light industrial\")
- rationale (2-3 sentence explanation)

If data is missing, infer cautiously but still provide a numeric score.
Return ONLY valid JSON - no commentary.";

pub const SUMMARY_SYSTEM_PROMPT: &str = "\
You are a UK planning consultant.
Given the full text of a planning application / decision, extract a structured summary.

Return strict JSON with fields:
{
  \"decision\": \"approved\" | \"refused\" | \"pending\" | \"unknown\",
  \"summary\": \"2-3 sentence overview\",
  \"policies\": [\"list of key local/national policies referenced\"],
  \"material_issues\": [\"list of main material planning considerations\"],
  \"risks\": [\"list of risks / reasons for refusal / potential grounds for challenge\"],
  \"approval_probability\": number between 0 and 1 or null if not applicable
}

Do not include any commentary outside JSON.";

pub const NARRATIVE_SYSTEM_PROMPT: &str =
    "You are a UK land analyst. Write a concise, professional feasibility summary (max 200 words).";

/// User payload for parcel scoring: the serialized parcel context plus the
/// requested output shape.
pub fn score_user_prompt(parcel: &Parcel) -> String {
    let context = serde_json::to_string_pretty(parcel).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Here is the parcel data (JSON):\n\n{context}\n\n\
         Return a JSON object like:\n\
         {{\n\
           \"development_potential\": 0-100,\n\
           \"planning_probability\": 0-100,\n\
           \"access_quality\": 0-100,\n\
           \"constraint_severity\": 0-100,\n\
           \"marketability\": 0-100,\n\
           \"density_potential\": 0-100,\n\
           \"recommended_use\": \"string\",\n\
           \"rationale\": \"string\"\n\
         }}"
    )
}

/// User payload for a planning summary: the source text, bounded to
/// [`MAX_SOURCE_CHARS`].
pub fn summary_user_prompt(source_text: &str) -> String {
    format!(
        "Here is the planning text:\n\n{}\n(Truncated if very long)",
        truncate_for_context(source_text, MAX_SOURCE_CHARS)
    )
}

/// User payload for the passport feasibility narrative: parcel facts plus
/// whatever enrichment already exists.
pub fn narrative_user_prompt(
    parcel: &Parcel,
    scores: Option<&ParcelScores>,
    planning: Option<&PlanningSummary>,
) -> String {
    let parcel_json = serde_json::to_string_pretty(parcel).unwrap_or_else(|_| "{}".to_string());
    let scores_json = scores
        .and_then(|s| serde_json::to_string_pretty(s).ok())
        .unwrap_or_else(|| "null".to_string());
    let planning_json = planning
        .and_then(|p| serde_json::to_string_pretty(p).ok())
        .unwrap_or_else(|| "null".to_string());

    format!(
        "Parcel data:\n{parcel_json}\n\nAI scores:\n{scores_json}\n\nPlanning summary:\n{planning_json}"
    )
}

/// Truncate to at most `max_chars` bytes, backing off to a char boundary.
/// Always drops the tail.
fn truncate_for_context(text: &str, max_chars: usize) -> &str {
    if text.len() <= max_chars {
        text
    } else {
        let mut end = max_chars;
        while !text.is_char_boundary(end) && end > 0 {
            end -= 1;
        }
        &text[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_head() {
        let text = "a".repeat(20);
        let out = truncate_for_context(&text, 10);
        assert_eq!(out, "a".repeat(10));
    }

    #[test]
    fn test_truncate_short_input_untouched() {
        assert_eq!(truncate_for_context("short", 10), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // 'é' is two bytes; cutting at 1 would split it.
        let out = truncate_for_context("é", 1);
        assert_eq!(out, "");
    }

    #[test]
    fn test_summary_prompt_bounded() {
        let long = "word ".repeat(10_000);
        let prompt = summary_user_prompt(&long);
        assert!(prompt.len() < MAX_SOURCE_CHARS + 200);
        // Head preserved, tail dropped.
        assert!(prompt.contains("Here is the planning text:\n\nword word"));
    }
}
