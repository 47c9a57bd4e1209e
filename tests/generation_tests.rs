//! Region/model fallback behavior of the generation client

mod common;

use common::ScriptedFactory;
use gmail_triage::generation::{GenerationResponse, ServiceError, ServiceErrorKind};
use gmail_triage::models::{GenerationOutcome, GenerationRequest, OutputFormat};
use serde_json::json;
use std::time::Duration;

fn request() -> GenerationRequest {
    GenerationRequest::new("instruction", "Subject: hi\nbody", OutputFormat::PlainText, 0.7, 256)
}

fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|(r, m)| (r.to_string(), m.to_string()))
        .collect()
}

#[tokio::test]
async fn test_attempt_order_is_regions_outer_models_inner() {
    let factory = ScriptedFactory::always_failing(ServiceError::not_found("publisher model not found"));
    let client = factory.client(&["A", "B"], &["X", "Y"]);

    let outcome = client.generate(&request()).await;

    assert!(!outcome.is_success());
    assert_eq!(
        factory.calls(),
        pairs(&[("A", "X"), ("A", "Y"), ("B", "X"), ("B", "Y")])
    );
}

#[tokio::test]
async fn test_exhaustion_records_every_attempt() {
    let factory = ScriptedFactory::new()
        .default_response(Err(ServiceError::not_found("not found")))
        .respond("B", "Y", Err(ServiceError::not_found("last candidate missing")));
    let client = factory.client(&["A", "B"], &["X", "Y"]);

    let outcome = client.generate(&request()).await;

    let GenerationOutcome::Failure(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.attempts.len(), 4);
    assert!(failure
        .attempts
        .iter()
        .all(|attempt| attempt.kind == ServiceErrorKind::NotFound));

    let last = failure.last_error.expect("last error recorded");
    assert_eq!(last.kind, ServiceErrorKind::NotFound);
    assert_eq!(last.message, "last candidate missing");

    let final_attempt = failure.attempts.last().unwrap();
    assert_eq!((final_attempt.region.as_str(), final_attempt.model.as_str()), ("B", "Y"));
}

#[tokio::test]
async fn test_success_on_second_model_skips_second_region() {
    let factory = ScriptedFactory::new()
        .respond("A", "X", Err(ServiceError::not_found("no X in A")))
        .respond_text("A", "Y", "hello from A/Y")
        .default_response(Ok(GenerationResponse::from_text("should not be used")));
    let client = factory.client(&["A", "B"], &["X", "Y"]);

    let outcome = client.generate(&request()).await;

    assert_eq!(outcome, GenerationOutcome::Success("hello from A/Y".to_string()));
    assert_eq!(factory.calls(), pairs(&[("A", "X"), ("A", "Y")]));
    assert!(factory.calls().iter().all(|(region, _)| region == "A"));
    assert_eq!(factory.clients_created(), vec!["A".to_string()]);
}

#[tokio::test]
async fn test_repeated_requests_give_identical_outcomes() {
    let factory = ScriptedFactory::new()
        .respond("A", "X", Err(ServiceError::rate_limited("quota exceeded")))
        .respond_text("A", "Y", "{\"category\": 2}");
    let client = factory.client(&["A"], &["X", "Y"]);

    let first = client.generate(&request()).await;
    let second = client.generate(&request()).await;

    assert_eq!(first, second);
    assert_eq!(
        factory.calls(),
        pairs(&[("A", "X"), ("A", "Y"), ("A", "X"), ("A", "Y")])
    );
    // One client per region for the lifetime of the generation client
    assert_eq!(factory.clients_created(), vec!["A".to_string()]);
}

#[tokio::test]
async fn test_exhausted_outcomes_are_also_identical() {
    let factory = ScriptedFactory::always_failing(ServiceError::access_denied("permission denied"));
    let client = factory.client(&["A", "B"], &["X"]);

    let first = client.generate(&request()).await;
    let second = client.generate(&request()).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_empty_text_is_success_not_failure() {
    let factory = ScriptedFactory::new()
        .respond("A", "X", Ok(GenerationResponse::from_json(json!({"candidates": []}))));
    let client = factory.client(&["A", "B"], &["X"]);

    let outcome = client.generate(&request()).await;

    assert_eq!(outcome, GenerationOutcome::Success(String::new()));
    assert_eq!(factory.calls().len(), 1);
}

#[tokio::test]
async fn test_text_extracted_from_candidate_parts() {
    let response = GenerationResponse::from_json(json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Thanks for the note."}]},
            "finishReason": "STOP"
        }]
    }));
    let factory = ScriptedFactory::new().respond("A", "X", Ok(response));
    let client = factory.client(&["A"], &["X"]);

    let outcome = client.generate(&request()).await;

    assert_eq!(outcome.text(), Some("Thanks for the note."));
}

#[tokio::test]
async fn test_every_error_kind_falls_through() {
    let factory = ScriptedFactory::new()
        .respond("A", "M1", Err(ServiceError::not_found("a")))
        .respond("A", "M2", Err(ServiceError::access_denied("b")))
        .respond("A", "M3", Err(ServiceError::rate_limited("c")))
        .respond("A", "M4", Err(ServiceError::transient("d")))
        .respond("A", "M5", Err(ServiceError::other("e")))
        .respond_text("A", "M6", "finally");
    let client = factory.client(&["A"], &["M1", "M2", "M3", "M4", "M5", "M6"]);

    let outcome = client.generate(&request()).await;

    assert_eq!(outcome.text(), Some("finally"));
    assert_eq!(factory.calls().len(), 6);
}

#[tokio::test]
async fn test_slow_candidate_times_out_and_falls_through() {
    let factory = ScriptedFactory::new()
        .respond_text("A", "X", "too late")
        .delay("A", "X", Duration::from_secs(5))
        .respond_text("A", "Y", "in time");
    let client = factory
        .client(&["A"], &["X", "Y"])
        .with_attempt_timeout(Duration::from_millis(50));

    let outcome = client.generate(&request()).await;

    assert_eq!(outcome.text(), Some("in time"));
    assert_eq!(factory.calls(), pairs(&[("A", "X"), ("A", "Y")]));
}

#[tokio::test]
async fn test_timeout_is_recorded_as_transient() {
    let factory = ScriptedFactory::new()
        .default_response(Ok(GenerationResponse::from_text("never seen")))
        .delay("A", "X", Duration::from_secs(5));
    let client = factory
        .client(&["A"], &["X"])
        .with_attempt_timeout(Duration::from_millis(20));

    let GenerationOutcome::Failure(failure) = client.generate(&request()).await else {
        panic!("expected failure");
    };
    assert_eq!(failure.attempts.len(), 1);
    assert_eq!(failure.attempts[0].kind, ServiceErrorKind::Transient);
    assert!(failure.attempts[0].error_summary.contains("timed out"));
}

#[tokio::test]
async fn test_request_is_passed_through_unchanged() {
    let factory = ScriptedFactory::always_text("ok");
    let client = factory.client(&["A"], &["X"]);
    let request = request();

    client.generate(&request).await;

    assert_eq!(factory.requests(), vec![request]);
}
