//! Common test utilities and fixtures
#![allow(dead_code)]

use async_trait::async_trait;
use gmail_triage::client::{DraftRequest, GmailClient, LabelInfo};
use gmail_triage::error::Result;
use gmail_triage::generation::{
    CandidateList, GenerationClient, GenerationResponse, RegionClient, RegionClientFactory,
    ServiceError,
};
use gmail_triage::models::{GenerationRequest, MessageHeaders};
use mockall::mock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a plain-text RFC 822 message
pub fn raw_message(from: &str, subject: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {}\r\nTo: me@example.com\r\nSubject: {}\r\nMessage-ID: <orig@example.com>\r\nMIME-Version: 1.0\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        from, subject, body
    )
    .into_bytes()
}

/// Metadata as returned for a message that gets a reply
pub fn reply_headers(from: &str, subject: &str) -> MessageHeaders {
    MessageHeaders {
        thread_id: Some("thread-1".to_string()),
        headers: vec![
            ("Subject".to_string(), subject.to_string()),
            ("From".to_string(), from.to_string()),
            ("Message-Id".to_string(), "<orig@example.com>".to_string()),
        ],
    }
}

/// Create a test LabelInfo
pub fn create_test_label_info(id: &str, name: &str) -> LabelInfo {
    LabelInfo {
        id: id.to_string(),
        name: name.to_string(),
    }
}

/// Labels for every category under `Auto`
pub fn existing_category_labels() -> Vec<LabelInfo> {
    vec![
        create_test_label_info("L0", "Auto"),
        create_test_label_info("L1", "Auto/Important"),
        create_test_label_info("L2", "Auto/Read"),
        create_test_label_info("L3", "Auto/Event"),
        create_test_label_info("L4", "Auto/Ads"),
    ]
}

// Mock implementation of GmailClient for testing
mock! {
    pub GmailClient {}

    #[async_trait::async_trait]
    impl GmailClient for GmailClient {
        async fn list_unread(&self, limit: u32) -> Result<Vec<String>>;
        async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>>;
        async fn get_metadata(&self, id: &str, header_names: &[String]) -> Result<MessageHeaders>;
        async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;
        async fn list_labels(&self) -> Result<Vec<LabelInfo>>;
        async fn create_label(&self, name: &str) -> Result<String>;
        async fn create_draft(&self, draft: &DraftRequest) -> Result<String>;
    }
}

type Scripted = std::result::Result<GenerationResponse, ServiceError>;

#[derive(Default)]
struct ScriptState {
    responses: HashMap<(String, String), Scripted>,
    delays: HashMap<(String, String), Duration>,
    default: Option<Scripted>,
    calls: Vec<(String, String)>,
    requests: Vec<GenerationRequest>,
    clients_created: Vec<String>,
}

/// Region client factory with a fixed answer per (region, model)
///
/// Unscripted pairs answer with the default, or `NotFound` when none is set.
/// Every attempt is recorded in order.
#[derive(Clone, Default)]
pub struct ScriptedFactory {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, region: &str, model: &str, result: Scripted) -> Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert((region.to_string(), model.to_string()), result);
        self
    }

    pub fn respond_text(self, region: &str, model: &str, text: &str) -> Self {
        self.respond(region, model, Ok(GenerationResponse::from_text(text)))
    }

    pub fn delay(self, region: &str, model: &str, delay: Duration) -> Self {
        self.state
            .lock()
            .unwrap()
            .delays
            .insert((region.to_string(), model.to_string()), delay);
        self
    }

    pub fn default_response(self, result: Scripted) -> Self {
        self.state.lock().unwrap().default = Some(result);
        self
    }

    pub fn always_text(text: &str) -> Self {
        Self::new().default_response(Ok(GenerationResponse::from_text(text)))
    }

    pub fn always_failing(error: ServiceError) -> Self {
        Self::new().default_response(Err(error))
    }

    /// (region, model) of every attempt, in order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Regions for which a client was constructed, in order
    pub fn clients_created(&self) -> Vec<String> {
        self.state.lock().unwrap().clients_created.clone()
    }

    /// Generation client over `regions` x `models` backed by this factory
    pub fn client(&self, regions: &[&str], models: &[&str]) -> GenerationClient {
        GenerationClient::new(
            Arc::new(self.clone()),
            CandidateList::from_lists(regions.iter().copied(), models.iter().copied()),
        )
    }
}

impl RegionClientFactory for ScriptedFactory {
    fn client_for(&self, region: &str) -> Arc<dyn RegionClient> {
        self.state
            .lock()
            .unwrap()
            .clients_created
            .push(region.to_string());
        Arc::new(ScriptedRegionClient {
            region: region.to_string(),
            state: Arc::clone(&self.state),
        })
    }
}

struct ScriptedRegionClient {
    region: String,
    state: Arc<Mutex<ScriptState>>,
}

#[async_trait]
impl RegionClient for ScriptedRegionClient {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ServiceError> {
        let key = (self.region.clone(), model.to_string());
        let (result, delay) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(key.clone());
            state.requests.push(request.clone());
            let result = state
                .responses
                .get(&key)
                .cloned()
                .or_else(|| state.default.clone())
                .unwrap_or_else(|| Err(ServiceError::not_found("model not scripted")));
            (result, state.delays.get(&key).copied())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_fixture_parses() {
        let raw = raw_message("Alice <alice@example.com>", "Hello", "Body text");
        let content = gmail_triage::message::parse_raw_message(&raw).unwrap();
        assert_eq!(content.subject, "Hello");
        assert!(content.body.contains("Body text"));
    }

    #[test]
    fn test_reply_headers_fixture() {
        let headers = reply_headers("a@example.com", "Hi");
        assert_eq!(headers.get("from"), Some("a@example.com"));
        assert_eq!(headers.thread_id.as_deref(), Some("thread-1"));
    }
}
