//! Reply drafting and signature handling

mod common;

use common::ScriptedFactory;
use gmail_triage::generation::ServiceError;
use gmail_triage::models::OutputFormat;
use gmail_triage::prompts::REPLY_INSTRUCTION;
use gmail_triage::reply::{append_signature, ReplyDrafter, REPLY_MAX_TOKENS};
use std::sync::Arc;

fn drafter_answering(text: &str, signature: &str) -> (ScriptedFactory, ReplyDrafter) {
    let factory = ScriptedFactory::always_text(text);
    let drafter = ReplyDrafter::new(Arc::new(factory.client(&["A"], &["X"])), signature);
    (factory, drafter)
}

#[test]
fn test_signature_on_non_empty_body() {
    assert_eq!(append_signature("Thanks, see you then.", "SIG"), "Thanks, see you then.\n\nSIG");
}

#[test]
fn test_no_signature_on_empty_body() {
    assert_eq!(append_signature("", "SIG"), "");
}

#[tokio::test]
async fn test_draft_reply_trims_model_output() {
    let (_, drafter) = drafter_answering("\n  Hello,\n\nThursday works.\n  ", "");
    assert_eq!(
        drafter.draft_reply("Meeting", "When are you free?").await,
        "Hello,\n\nThursday works."
    );
}

#[tokio::test]
async fn test_draft_reply_failure_is_empty() {
    let factory = ScriptedFactory::always_failing(ServiceError::rate_limited("quota"));
    let drafter = ReplyDrafter::new(Arc::new(factory.client(&["A", "B"], &["X"])), "SIG");

    assert_eq!(drafter.draft_reply("Meeting", "When?").await, "");
    assert_eq!(factory.calls().len(), 2);
}

#[tokio::test]
async fn test_compose_appends_signature_once() {
    let (_, drafter) = drafter_answering("Thanks, I will send it today.", "Best,\nOps");

    let draft = drafter.compose("Documents", "Please send the file").await.unwrap();
    assert_eq!(draft.body_text, "Thanks, I will send it today.\n\nBest,\nOps");
    assert!(draft.appended);

    // Applying the signature again leaves the draft unchanged
    let again = draft.clone().with_signature("Best,\nOps");
    assert_eq!(again, draft);
}

#[tokio::test]
async fn test_compose_skips_empty_model_output() {
    let (_, drafter) = drafter_answering("   ", "SIG");
    assert!(drafter.compose("Meeting", "When?").await.is_none());
}

#[tokio::test]
async fn test_compose_skips_failed_generation() {
    let factory = ScriptedFactory::always_failing(ServiceError::not_found("no model"));
    let drafter = ReplyDrafter::new(Arc::new(factory.client(&["A"], &["X"])), "SIG");

    assert!(drafter.compose("Meeting", "When?").await.is_none());
}

#[tokio::test]
async fn test_compose_without_signature() {
    let (_, drafter) = drafter_answering("Sounds good.", "");

    let draft = drafter.compose("Plan", "Ok?").await.unwrap();
    assert_eq!(draft.body_text, "Sounds good.");
    assert!(!draft.appended);
}

#[tokio::test]
async fn test_request_shape() {
    let (factory, drafter) = drafter_answering("ok", "");

    drafter.draft_reply("Quarterly report", "Can you review it?").await;

    let request = &factory.requests()[0];
    assert_eq!(request.instruction_text(), REPLY_INSTRUCTION);
    assert_eq!(request.user_text(), "Subject: Quarterly report\nBody:\nCan you review it?");
    assert_eq!(request.output_format(), OutputFormat::PlainText);
    assert_eq!(request.max_output_tokens(), REPLY_MAX_TOKENS);
}
