use serde::{Deserialize, Serialize};
use std::fmt;

use crate::generation::{ServiceError, ServiceErrorKind};

/// Priority bucket assigned to an incoming message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NeedsReply,
    MustRead,
    ShouldSkim,
    LowPriority,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::NeedsReply,
        Category::MustRead,
        Category::ShouldSkim,
        Category::LowPriority,
    ];

    /// Map the numeric answer of the classification rubric (1-4) to a category
    pub fn from_number(number: u64) -> Option<Self> {
        match number {
            1 => Some(Category::NeedsReply),
            2 => Some(Category::MustRead),
            3 => Some(Category::ShouldSkim),
            4 => Some(Category::LowPriority),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Category::NeedsReply => 1,
            Category::MustRead => 2,
            Category::ShouldSkim => 3,
            Category::LowPriority => 4,
        }
    }

    /// Last segment of the Gmail label for this category
    pub fn label_suffix(self) -> &'static str {
        match self {
            Category::NeedsReply => "Important",
            Category::MustRead => "Read",
            Category::ShouldSkim => "Event",
            Category::LowPriority => "Ads",
        }
    }

    /// Full label name under the configured prefix, e.g. `Auto/Important`
    pub fn label_name(self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.label_suffix())
    }

    pub fn needs_reply(self) -> bool {
        self == Category::NeedsReply
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::NeedsReply => "needs_reply",
            Category::MustRead => "must_read",
            Category::ShouldSkim => "should_skim",
            Category::LowPriority => "low_priority",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response format requested from the generation service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    StructuredJson,
    PlainText,
}

impl OutputFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::StructuredJson => "application/json",
            OutputFormat::PlainText => "text/plain",
        }
    }
}

/// One call's worth of input for the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    instruction_text: String,
    user_text: String,
    output_format: OutputFormat,
    temperature: f32,
    max_output_tokens: u32,
}

impl GenerationRequest {
    pub fn new(
        instruction_text: impl Into<String>,
        user_text: impl Into<String>,
        output_format: OutputFormat,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            instruction_text: instruction_text.into(),
            user_text: user_text.into(),
            output_format,
            temperature,
            max_output_tokens,
        }
    }

    pub fn instruction_text(&self) -> &str {
        &self.instruction_text
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}

/// A single failed (region, model) attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub region: String,
    pub model: String,
    pub kind: ServiceErrorKind,
    pub error_summary: String,
}

/// Every candidate failed for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationFailure {
    pub last_error: Option<ServiceError>,
    pub attempts: Vec<AttemptRecord>,
}

/// Result of [`crate::generation::GenerationClient::generate`]
///
/// `Success("")` is a valid outcome and is not the same thing as `Failure`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Success(String),
    Failure(GenerationFailure),
}

impl GenerationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success(text) => Some(text),
            GenerationOutcome::Failure(_) => None,
        }
    }
}

/// Reply body produced for a "needs reply" message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyDraft {
    pub body_text: String,
    pub appended: bool,
}

impl ReplyDraft {
    pub fn new(body_text: impl Into<String>) -> Self {
        Self {
            body_text: body_text.into().trim().to_string(),
            appended: false,
        }
    }

    /// Append the signature block once
    ///
    /// Empty drafts stay empty, and a draft that already carries a signature is
    /// returned unchanged.
    pub fn with_signature(mut self, signature: &str) -> Self {
        let signature = signature.trim();
        if self.appended || self.body_text.is_empty() || signature.is_empty() {
            return self;
        }

        self.body_text = format!("{}\n\n{}", self.body_text, signature);
        self.appended = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.body_text.trim().is_empty()
    }
}

/// Header values and thread id of a message fetched in metadata format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    pub thread_id: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl MessageHeaders {
    /// First header value with this name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}
