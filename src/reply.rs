//! Reply drafting for messages that need an answer

use std::sync::Arc;
use tracing::warn;

use crate::generation::GenerationClient;
use crate::models::{GenerationOutcome, GenerationRequest, OutputFormat, ReplyDraft};
use crate::prompts;

pub const REPLY_TEMPERATURE: f32 = 0.7;
pub const REPLY_MAX_TOKENS: u32 = 256;

pub struct ReplyDrafter {
    client: Arc<GenerationClient>,
    instruction: String,
    signature: String,
}

impl ReplyDrafter {
    pub fn new(client: Arc<GenerationClient>, signature: impl Into<String>) -> Self {
        Self {
            client,
            instruction: prompts::REPLY_INSTRUCTION.to_string(),
            signature: signature.into(),
        }
    }

    /// Replace the reply persona prompt
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn build_request(&self, subject: &str, body: &str) -> GenerationRequest {
        GenerationRequest::new(
            self.instruction.clone(),
            format!("Subject: {}\nBody:\n{}", subject, body),
            OutputFormat::PlainText,
            REPLY_TEMPERATURE,
            REPLY_MAX_TOKENS,
        )
    }

    /// Model-written reply body, trimmed; empty when nothing was produced
    pub async fn draft_reply(&self, subject: &str, body: &str) -> String {
        let request = self.build_request(subject, body);

        match self.client.generate(&request).await {
            GenerationOutcome::Success(text) => text.trim().to_string(),
            GenerationOutcome::Failure(failure) => {
                warn!(
                    step = "generate_reply_fallback",
                    attempts = failure.attempts.len(),
                    "Reply generation unavailable"
                );
                String::new()
            }
        }
    }

    /// Draft a reply and append the configured signature
    ///
    /// Returns `None` when the model produced nothing; the caller skips drafting.
    pub async fn compose(&self, subject: &str, body: &str) -> Option<ReplyDraft> {
        let draft = ReplyDraft::new(self.draft_reply(subject, body).await).with_signature(&self.signature);

        if draft.is_empty() {
            warn!(step = "empty_reply_draft", "Reply draft is empty, skipping");
            None
        } else {
            Some(draft)
        }
    }
}

/// Append a signature block after a blank line
///
/// An empty body stays empty so that a failed draft is never turned into a
/// signature-only reply.
pub fn append_signature(body: &str, signature: &str) -> String {
    ReplyDraft::new(body).with_signature(signature).body_text
}
