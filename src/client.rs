//! Gmail API client with timeouts and retry logic

use async_trait::async_trait;
use google_gmail1::api::{Draft, Label, Message, ModifyMessageRequest};
use std::future::Future;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, warn};

use crate::auth::GmailHub;
use crate::error::{Result, TriageError};
use crate::models::MessageHeaders;

const MODIFY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.modify";
const COMPOSE_SCOPE: &str = "https://www.googleapis.com/auth/gmail.compose";
const LABELS_SCOPE: &str = "https://www.googleapis.com/auth/gmail.labels";

/// Query for the messages a run picks up
pub const UNREAD_QUERY: &str = "is:unread";

/// System label removed to mark a message read
pub const UNREAD_LABEL: &str = "UNREAD";

/// Largest page the messages.list endpoint returns
const LIST_PAGE_LIMIT: u32 = 500;

/// Retries after the first attempt for idempotent calls
const MAX_RETRIES: u32 = 3;

/// Label info returned from Gmail API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelInfo {
    pub id: String,
    pub name: String,
}

/// A reply draft ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRequest {
    /// Thread the draft is attached to, when the original has one
    pub thread_id: Option<String>,
    /// Complete RFC 822 message
    pub raw: Vec<u8>,
}

/// Trait defining the mailbox operations a triage run needs
#[async_trait]
pub trait GmailClient: Send + Sync {
    /// Ids of unread messages, newest first, at most `limit`
    async fn list_unread(&self, limit: u32) -> Result<Vec<String>>;

    /// Full RFC 822 bytes of a message
    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>>;

    /// Selected headers and the thread id of a message
    async fn get_metadata(&self, id: &str, header_names: &[String]) -> Result<MessageHeaders>;

    /// Add and remove label ids on a message
    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;

    /// List all labels in the account
    async fn list_labels(&self) -> Result<Vec<LabelInfo>>;

    /// Create a new label and return its id
    async fn create_label(&self, name: &str) -> Result<String>;

    /// Store a draft and return its id
    async fn create_draft(&self, draft: &DraftRequest) -> Result<String>;
}

/// Production Gmail client
///
/// Every call is bounded by `call_timeout`. Idempotent calls are retried
/// with exponential backoff; draft creation is attempted once so a slow
/// upload never produces a duplicate draft.
pub struct ProductionGmailClient {
    hub: GmailHub,
    call_timeout: Duration,
}

impl ProductionGmailClient {
    pub fn new(hub: GmailHub) -> Self {
        Self {
            hub,
            call_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Check if an error is retryable
    fn should_retry(error: &TriageError) -> bool {
        matches!(
            error,
            TriageError::ServerError { .. }
                | TriageError::RateLimitExceeded { .. }
                | TriageError::NetworkError(_)
        )
    }

    /// Execute an async operation with exponential backoff retry
    async fn with_retry<T, F, Fut>(
        operation_name: &str,
        max_retries: u32,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if Self::should_retry(&e) && attempts <= max_retries => {
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}...",
                        operation_name, attempts, max_retries + 1, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(delay * 2, Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Bound an API call by `call_timeout`, mapping expiry to a network error
async fn timed<T, Fut>(operation_name: &str, call_timeout: Duration, api_call: Fut) -> Result<T>
where
    Fut: Future<Output = std::result::Result<T, google_gmail1::Error>>,
{
    match tokio::time::timeout(call_timeout, api_call).await {
        Ok(result) => result.map_err(TriageError::from),
        Err(_) => {
            warn!("Gmail API {} call timed out after {:?}", operation_name, call_timeout);
            Err(TriageError::NetworkError(format!(
                "API call timed out after {:?}",
                call_timeout
            )))
        }
    }
}

/// Header pairs and thread id from a metadata-format message
fn message_headers(message: Message) -> MessageHeaders {
    let headers = message
        .payload
        .and_then(|payload| payload.headers)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|header| match (header.name, header.value) {
            (Some(name), Some(value)) => Some((name, value)),
            _ => None,
        })
        .collect();

    MessageHeaders {
        thread_id: message.thread_id,
        headers,
    }
}

fn optional_ids(ids: &[String]) -> Option<Vec<String>> {
    if ids.is_empty() {
        None
    } else {
        Some(ids.to_vec())
    }
}

#[async_trait]
impl GmailClient for ProductionGmailClient {
    async fn list_unread(&self, limit: u32) -> Result<Vec<String>> {
        let mut all_ids = Vec::new();
        let mut page_token: Option<String> = None;

        while (all_ids.len() as u32) < limit {
            let remaining = limit - all_ids.len() as u32;
            let token = page_token.clone();

            let response = Self::with_retry("list_unread", MAX_RETRIES, || {
                let token = token.clone();
                async move {
                    let mut call = self
                        .hub
                        .users()
                        .messages_list("me")
                        .q(UNREAD_QUERY)
                        .max_results(remaining.min(LIST_PAGE_LIMIT));

                    if let Some(token) = token.as_ref() {
                        call = call.page_token(token);
                    }

                    let (_, response) =
                        timed("list_unread", self.call_timeout, call.add_scope(MODIFY_SCOPE).doit())
                            .await?;
                    Ok(response)
                }
            })
            .await?;

            let page: Vec<String> = response
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|msg_ref| msg_ref.id)
                .collect();
            if page.is_empty() {
                break;
            }
            all_ids.extend(page);

            page_token = response.next_page_token;
            if page_token.is_none() {
                break;
            }
        }

        all_ids.truncate(limit as usize);
        debug!("Listed {} unread messages", all_ids.len());
        Ok(all_ids)
    }

    async fn get_raw_message(&self, id: &str) -> Result<Vec<u8>> {
        Self::with_retry("get_raw_message", MAX_RETRIES, || async {
            let call = self
                .hub
                .users()
                .messages_get("me", id)
                .format("raw")
                .add_scope(MODIFY_SCOPE)
                .doit();

            let (_, message) = timed("get_raw_message", self.call_timeout, call).await?;

            message.raw.ok_or_else(|| {
                TriageError::InvalidMessageFormat(format!("Message {} has no raw content", id))
            })
        })
        .await
    }

    async fn get_metadata(&self, id: &str, header_names: &[String]) -> Result<MessageHeaders> {
        Self::with_retry("get_metadata", MAX_RETRIES, || async {
            let mut call = self.hub.users().messages_get("me", id).format("metadata");
            for name in header_names {
                call = call.add_metadata_headers(name);
            }

            let (_, message) =
                timed("get_metadata", self.call_timeout, call.add_scope(MODIFY_SCOPE).doit())
                    .await?;
            Ok(message_headers(message))
        })
        .await
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        if add.is_empty() && remove.is_empty() {
            return Ok(());
        }

        Self::with_retry("modify_labels", MAX_RETRIES, || async {
            let modify_request = ModifyMessageRequest {
                add_label_ids: optional_ids(add),
                remove_label_ids: optional_ids(remove),
            };

            let call = self
                .hub
                .users()
                .messages_modify(modify_request, "me", id)
                .add_scope(MODIFY_SCOPE)
                .doit();

            timed("modify_labels", self.call_timeout, call).await?;
            Ok(())
        })
        .await
    }

    async fn list_labels(&self) -> Result<Vec<LabelInfo>> {
        Self::with_retry("list_labels", MAX_RETRIES, || async {
            debug!("Calling Gmail API to list labels...");
            let call = self
                .hub
                .users()
                .labels_list("me")
                .add_scope(LABELS_SCOPE)
                .doit();

            let (_, response) = timed("list_labels", self.call_timeout, call).await?;

            let labels: Vec<LabelInfo> = response
                .labels
                .unwrap_or_default()
                .into_iter()
                .filter_map(|label| match (label.id, label.name) {
                    (Some(id), Some(name)) => Some(LabelInfo { id, name }),
                    _ => None,
                })
                .collect();

            debug!("Successfully parsed {} labels", labels.len());
            Ok(labels)
        })
        .await
    }

    async fn create_label(&self, name: &str) -> Result<String> {
        let name = name.to_string();
        Self::with_retry("create_label", MAX_RETRIES, || async {
            let label = Label {
                name: Some(name.clone()),
                message_list_visibility: Some("show".to_string()),
                label_list_visibility: Some("labelShow".to_string()),
                ..Default::default()
            };

            let call = self
                .hub
                .users()
                .labels_create(label, "me")
                .add_scope(LABELS_SCOPE)
                .doit();

            let (_, created_label) = timed("create_label", self.call_timeout, call).await?;

            created_label
                .id
                .ok_or_else(|| TriageError::LabelError("Created label has no ID".to_string()))
        })
        .await
    }

    async fn create_draft(&self, draft: &DraftRequest) -> Result<String> {
        let mime_type: mime::Mime = "message/rfc822"
            .parse()
            .map_err(|e| TriageError::DraftError(format!("Invalid MIME type: {}", e)))?;

        let request = Draft {
            message: Some(Message {
                thread_id: draft.thread_id.clone(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let call = self
            .hub
            .users()
            .drafts_create(request, "me")
            .add_scope(COMPOSE_SCOPE)
            .upload(Cursor::new(draft.raw.clone()), mime_type);

        let (_, created) = timed("create_draft", self.call_timeout, call).await?;

        created
            .id
            .ok_or_else(|| TriageError::DraftError("Created draft has no ID".to_string()))
    }
}
