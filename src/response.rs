use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::categories::{normalize, Category, DEFAULT_CATEGORY};
use crate::places::PlaceRecord;

const RAW_PREVIEW_CHARS: usize = 200;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("fenced block pattern"));

/// Reconciles a model reply with the batch it answers.
///
/// Answers are matched by 1-based position, so the output covers every place
/// in `batch` no matter how broken the reply is. Two places sharing a name
/// collapse into one entry; the later position wins.
pub fn parse_batch_response(raw: &str, batch: &[PlaceRecord]) -> HashMap<String, Category> {
    let raw = raw.trim();
    let candidate = extract_json_candidate(raw);

    let answers = match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            warn!(
                kind = json_kind(&other),
                "batch response is not a JSON object; using default category"
            );
            return default_assignments(batch);
        }
        Err(err) => {
            warn!(
                ?err,
                raw = %preview(raw),
                "batch response JSON parse failed; using default category"
            );
            return default_assignments(batch);
        }
    };

    batch
        .iter()
        .enumerate()
        .map(|(index, place)| {
            let answer = answer_for_position(&answers, index + 1);
            (place.name.clone(), normalize(Some(answer.as_str())))
        })
        .collect()
}

/// Every place in `batch` mapped to [`DEFAULT_CATEGORY`].
pub fn default_assignments(batch: &[PlaceRecord]) -> HashMap<String, Category> {
    batch
        .iter()
        .map(|place| (place.name.clone(), DEFAULT_CATEGORY))
        .collect()
}

/// Returns the first fenced block's interior, or the whole text when unfenced.
pub fn extract_json_candidate(raw: &str) -> &str {
    if !raw.contains("```") {
        return raw;
    }
    FENCED_BLOCK
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .map(|interior| interior.as_str().trim())
        .unwrap_or(raw)
}

// Tries "n", then the zero-based "n-1". An integer key `n` would also be
// consulted, but JSON object keys are always strings, so it coincides with
// "n". Empty-ish answers fall through to the next key.
fn answer_for_position(answers: &Map<String, Value>, position: usize) -> String {
    let keys = [position.to_string(), (position - 1).to_string()];
    keys.iter()
        .filter_map(|key| answers.get(key))
        .find(|value| is_meaningful(value))
        .map(render_answer)
        .unwrap_or_default()
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn render_answer(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn preview(raw: &str) -> String {
    raw.chars().take(RAW_PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(names: &[&str]) -> Vec<PlaceRecord> {
        names.iter().map(|name| PlaceRecord::named(*name)).collect()
    }

    #[test]
    fn malformed_reply_defaults_whole_batch() {
        let places = batch(&["A", "B", "C"]);
        let parsed = parse_batch_response("not json at all", &places);

        assert_eq!(parsed.len(), 3);
        assert!(parsed.values().all(|cat| *cat == Category::Attractions));
    }

    #[test]
    fn non_object_reply_defaults_whole_batch() {
        let places = batch(&["A", "B"]);
        let parsed = parse_batch_response(r#"["Shopping", "Hotel"]"#, &places);
        assert_eq!(parsed["A"], DEFAULT_CATEGORY);
        assert_eq!(parsed["B"], DEFAULT_CATEGORY);
    }

    #[test]
    fn reads_fenced_json_and_normalizes_values() {
        let places = batch(&["Mall", "Inn"]);
        let raw = "```json\n{\"1\":\"Shopping\",\"2\":\"hotel\"}\n```";
        let parsed = parse_batch_response(raw, &places);

        assert_eq!(parsed["Mall"], Category::Shopping);
        assert_eq!(parsed["Inn"], Category::Hotel);
    }

    #[test]
    fn reads_untagged_fence_surrounded_by_prose() {
        let places = batch(&["Stall"]);
        let raw = "Sure! Here you go:\n```\n{\"1\": \"Street food\"}\n```\nAnything else?";
        assert_eq!(
            parse_batch_response(raw, &places)["Stall"],
            Category::StreetFood
        );
    }

    #[test]
    fn falls_back_to_zero_based_key() {
        let places = batch(&["First", "Second"]);
        let parsed = parse_batch_response(r#"{"0": "Sweets", "1": "Cable"}"#, &places);

        // Position 1 still prefers key "1"; position 2 has no "2" and reads "1".
        assert_eq!(parsed["First"], Category::Cable);
        assert_eq!(parsed["Second"], Category::Cable);
    }

    #[test]
    fn empty_answer_falls_through_to_next_key() {
        let places = batch(&["Only"]);
        let parsed = parse_batch_response(r#"{"1": "", "0": "Hotel"}"#, &places);
        assert_eq!(parsed["Only"], Category::Hotel);
    }

    #[test]
    fn missing_or_odd_answers_default() {
        let places = batch(&["A", "B", "C"]);
        let parsed = parse_batch_response(r#"{"1": 7, "3": ["Shopping"]}"#, &places);

        assert_eq!(parsed["A"], DEFAULT_CATEGORY);
        assert_eq!(parsed["B"], DEFAULT_CATEGORY);
        // Rendered as `["Shopping"]`, which still contains a canonical name.
        assert_eq!(parsed["C"], Category::Shopping);
    }

    #[test]
    fn duplicate_names_keep_the_later_answer() {
        let places = batch(&["Twin", "Twin"]);
        let parsed = parse_batch_response(r#"{"1": "Hotel", "2": "Sweets"}"#, &places);

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed["Twin"], Category::Sweets);
    }

    #[test]
    fn extracts_candidate_text() {
        assert_eq!(extract_json_candidate("{\"1\": 1}"), "{\"1\": 1}");
        assert_eq!(extract_json_candidate("```json {\"a\":1} ```"), "{\"a\":1}");
        assert_eq!(extract_json_candidate("``` unterminated"), "``` unterminated");
    }
}
