//! Message classification through the generation client

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::generation::GenerationClient;
use crate::models::{Category, GenerationOutcome, GenerationRequest, OutputFormat};
use crate::prompts;
use crate::redact::truncate_for_log;

/// Classification is deterministic
pub const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// The answer is a single digit wrapped in a tiny JSON object
pub const CLASSIFY_MAX_TOKENS: u32 = 16;

/// Raw model output kept in the `classify_out` record
pub const RAW_OUTPUT_LOG_LIMIT: usize = 64;

/// `category` key followed by a digit, tolerating quotes and prose around it
static KEYED_CATEGORY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""?category"?\D*([1-4])"#).unwrap());

/// A standalone digit 1-4 (not part of a longer number)
static BARE_DIGIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])([1-4])(?:[^0-9]|$)").unwrap());

/// Assigns a [`Category`] to message text; never fails
pub struct Classifier {
    client: Arc<GenerationClient>,
    instruction: String,
}

impl Classifier {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        Self {
            client,
            instruction: prompts::CLASSIFICATION_INSTRUCTION.to_string(),
        }
    }

    /// Replace the classification rubric
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn build_request(&self, input_text: &str) -> GenerationRequest {
        GenerationRequest::new(
            self.instruction.clone(),
            input_text,
            OutputFormat::StructuredJson,
            CLASSIFY_TEMPERATURE,
            CLASSIFY_MAX_TOKENS,
        )
    }

    /// Classify message text, degrading to [`Category::LowPriority`]
    pub async fn classify(&self, input_text: &str) -> Category {
        let request = self.build_request(input_text);

        match self.client.generate(&request).await {
            GenerationOutcome::Success(text) => {
                let category = parse_category(&text);
                info!(
                    step = "classify_out",
                    raw = %truncate_for_log(text.trim(), RAW_OUTPUT_LOG_LIMIT),
                    category = %category,
                    "Classification received"
                );
                category
            }
            GenerationOutcome::Failure(failure) => {
                warn!(
                    step = "classify_fallback",
                    attempts = failure.attempts.len(),
                    "Classification unavailable, using low priority"
                );
                Category::LowPriority
            }
        }
    }
}

/// Parse model output: strict JSON, then the keyed pattern, then a bare digit
pub fn parse_category(text: &str) -> Category {
    parse_strict(text)
        .or_else(|| capture_category(&KEYED_CATEGORY, text))
        .or_else(|| capture_category(&BARE_DIGIT, text))
        .unwrap_or(Category::LowPriority)
}

fn parse_strict(text: &str) -> Option<Category> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;

    let field = match &value {
        Value::Object(map) => match map.get("category") {
            Some(field) => field,
            None if map.len() == 1 => map.values().next()?,
            None => return None,
        },
        _ => return None,
    };

    let number = match field {
        Value::Number(number) => number.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };

    Category::from_number(number)
}

fn capture_category(pattern: &Regex, text: &str) -> Option<Category> {
    let digit = pattern.captures(text)?.get(1)?.as_str();
    Category::from_number(digit.parse().ok()?)
}
