//! Text extraction from generateContent responses

use serde::Deserialize;
use serde_json::Value;

/// A generateContent response, kept both typed and raw
///
/// The typed view is best-effort: a response whose shape does not match still
/// keeps its raw JSON so the mapping-based extractor can look at it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub candidates: Vec<ResponseCandidate>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseCandidate {
    #[serde(default)]
    pub content: Option<ResponseContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseContent {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerationResponse {
    pub fn from_json(raw: Value) -> Self {
        let mut response: Self = serde_json::from_value(raw.clone()).unwrap_or_default();
        response.raw = raw;
        response
    }

    /// Response carrying only a top-level text accessor
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn extract_text(&self) -> String {
        extract_text(self)
    }
}

type Extractor = fn(&GenerationResponse) -> Option<String>;

/// Accessors in priority order
const EXTRACTORS: &[Extractor] = &[top_level_text, first_candidate_part, raw_first_candidate_part];

/// First non-empty text any extractor yields, or an empty string
pub fn extract_text(response: &GenerationResponse) -> String {
    EXTRACTORS
        .iter()
        .filter_map(|extract| extract(response))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

fn top_level_text(response: &GenerationResponse) -> Option<String> {
    response.text.clone()
}

fn first_candidate_part(response: &GenerationResponse) -> Option<String> {
    response
        .candidates
        .first()?
        .content
        .as_ref()?
        .parts
        .first()?
        .text
        .clone()
}

fn raw_first_candidate_part(response: &GenerationResponse) -> Option<String> {
    response
        .raw
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_nested_candidate_text() {
        let response = GenerationResponse::from_json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "{\"category\": 2}"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 10}
        }));

        assert_eq!(response.extract_text(), "{\"category\": 2}");
        assert_eq!(response.candidates[0].finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_top_level_text_wins() {
        let mut response = GenerationResponse::from_json(json!({
            "candidates": [{"content": {"parts": [{"text": "nested"}]}}]
        }));
        response.text = Some("top".to_string());

        assert_eq!(extract_text(&response), "top");
    }

    #[test]
    fn test_empty_top_level_text_falls_through() {
        let mut response = GenerationResponse::from_json(json!({
            "candidates": [{"content": {"parts": [{"text": "nested"}]}}]
        }));
        response.text = Some(String::new());

        assert_eq!(extract_text(&response), "nested");
    }

    #[test]
    fn test_raw_mapping_used_when_typed_view_does_not_fit() {
        // a non-string `text` breaks the typed view but the raw pointer still resolves
        let response = GenerationResponse::from_json(json!({
            "text": 42,
            "candidates": [{"content": {"parts": [{"text": "from raw"}]}}]
        }));
        assert!(response.candidates.is_empty());
        assert_eq!(extract_text(&response), "from raw");
    }

    #[test]
    fn test_no_text_anywhere_is_empty() {
        let response = GenerationResponse::from_json(json!({
            "candidates": [{"finishReason": "SAFETY"}]
        }));
        assert_eq!(extract_text(&response), "");
        assert_eq!(extract_text(&GenerationResponse::default()), "");
    }
}
