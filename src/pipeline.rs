//! Batch triage of unread messages
//!
//! Each message moves through a fixed sequence of steps:
//!
//! ```text
//! FETCHED -> CLASSIFIED -> LABELED -> DRAFTED | SKIPPED_DRAFT -> READ
//! ```
//!
//! A failing step is logged with a `step` field and the run moves on; only
//! loading the unread list can abort a batch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::client::{DraftRequest, GmailClient, UNREAD_LABEL};
use crate::error::{Result, TriageError};
use crate::label_manager::LabelManager;
use crate::message::{classification_text, parse_raw_message, MessageContent, ReplyMessage};
use crate::models::{Category, MessageHeaders};
use crate::redact::redact_email;
use crate::reply::ReplyDrafter;

/// Headers fetched for messages that get a reply draft
pub const REPLY_HEADERS: &[&str] = &["Subject", "From", "Message-Id", "References"];

/// Knobs for one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub max_messages: u32,
    pub auto_mark_read: bool,
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_messages: 10,
            auto_mark_read: true,
            dry_run: false,
        }
    }
}

/// What happened to the reply draft of one message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum DraftStatus {
    /// The message does not need a reply
    NotNeeded,
    /// Stored as a Gmail draft with this id
    Created(String),
    /// Dry run: a non-empty draft was composed but not stored
    WouldCreate,
    /// The model produced no usable reply
    SkippedEmpty,
    /// The `From` header has no usable address
    SkippedInvalidRecipient,
    Failed,
}

impl DraftStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(
            self,
            DraftStatus::SkippedEmpty | DraftStatus::SkippedInvalidRecipient
        )
    }
}

/// Per-message result
#[derive(Debug, Clone, Serialize)]
pub struct MessageOutcome {
    pub message_id: String,
    pub category: Category,
    pub labeled: bool,
    pub draft: DraftStatus,
    pub marked_read: bool,
    /// Steps that failed, as `step: error`
    pub errors: Vec<String>,
}

impl MessageOutcome {
    fn new(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            category: Category::LowPriority,
            labeled: false,
            draft: DraftStatus::NotNeeded,
            marked_read: false,
            errors: Vec::new(),
        }
    }

    fn record_error(&mut self, step: &str, error: impl std::fmt::Display) {
        self.errors.push(format!("{}: {}", step, error));
    }
}

/// Summary of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub dry_run: bool,
    pub category_counts: BTreeMap<String, usize>,
    pub drafts_created: usize,
    pub drafts_skipped: usize,
    pub marked_read: usize,
    pub failures: usize,
    pub labels_created: Vec<String>,
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchReport {
    fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: now,
            completed_at: now,
            dry_run,
            category_counts: Category::ALL
                .iter()
                .map(|category| (category.as_str().to_string(), 0))
                .collect(),
            drafts_created: 0,
            drafts_skipped: 0,
            marked_read: 0,
            failures: 0,
            labels_created: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    fn record(&mut self, outcome: MessageOutcome) {
        *self
            .category_counts
            .entry(outcome.category.as_str().to_string())
            .or_insert(0) += 1;

        match outcome.draft {
            DraftStatus::Created(_) => self.drafts_created += 1,
            ref status if status.is_skipped() => self.drafts_skipped += 1,
            _ => {}
        }
        if outcome.marked_read {
            self.marked_read += 1;
        }
        if !outcome.errors.is_empty() {
            self.failures += 1;
        }

        self.outcomes.push(outcome);
    }

    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn count(&self, category: Category) -> usize {
        self.category_counts
            .get(category.as_str())
            .copied()
            .unwrap_or(0)
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.completed_at - self.started_at).num_seconds()
    }

    /// Short plain-text summary for the terminal
    pub fn to_summary(&self) -> String {
        let mut out = String::new();

        if self.dry_run {
            out.push_str("Triage run (DRY RUN, no changes were made)\n");
        } else {
            out.push_str("Triage run\n");
        }
        out.push_str(&format!("  Run ID:      {}\n", self.run_id));
        out.push_str(&format!("  Processed:   {}\n", self.processed()));
        for category in Category::ALL {
            out.push_str(&format!(
                "  {:<12} {}\n",
                format!("{}:", category.label_suffix()),
                self.count(category)
            ));
        }
        out.push_str(&format!("  Drafts:      {} created, {} skipped\n", self.drafts_created, self.drafts_skipped));
        out.push_str(&format!("  Marked read: {}\n", self.marked_read));
        if !self.labels_created.is_empty() {
            out.push_str(&format!("  New labels:  {}\n", self.labels_created.join(", ")));
        }
        out.push_str(&format!("  Failures:    {}\n", self.failures));
        out.push_str(&format!("  Duration:    {}s\n", self.duration_seconds()));
        out
    }
}

/// One batch over the unread messages of a mailbox
pub struct TriageRun {
    client: Arc<dyn GmailClient>,
    classifier: Classifier,
    drafter: ReplyDrafter,
    labels: LabelManager,
    options: RunOptions,
}

impl TriageRun {
    pub fn new(
        client: Arc<dyn GmailClient>,
        classifier: Classifier,
        drafter: ReplyDrafter,
        labels: LabelManager,
        options: RunOptions,
    ) -> Self {
        Self {
            client,
            classifier,
            drafter,
            labels,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Process up to `max_messages` unread messages in order
    pub async fn run(&mut self) -> Result<BatchReport> {
        let mut report = BatchReport::new(self.options.dry_run);

        if let Err(e) = self.labels.load_existing_labels().await {
            warn!(step = "label_cache_fail", error = %e, "Could not load existing labels");
        }

        let message_ids = self.client.list_unread(self.options.max_messages).await?;
        info!(
            step = "fetch_unread",
            count = message_ids.len(),
            dry_run = self.options.dry_run,
            "Loaded unread messages"
        );

        for message_id in &message_ids {
            let outcome = self.process_message(message_id).await;
            report.record(outcome);
        }

        report.labels_created = self.labels.created_labels().to_vec();
        report.completed_at = Utc::now();
        info!(
            step = "run_complete",
            run_id = %report.run_id,
            processed = report.processed(),
            drafts_created = report.drafts_created,
            failures = report.failures,
            "Triage run finished"
        );
        Ok(report)
    }

    /// Run every step for one message; never fails
    pub async fn process_message(&mut self, message_id: &str) -> MessageOutcome {
        let mut outcome = MessageOutcome::new(message_id);

        // FETCHED -> CLASSIFIED
        let content = match self.fetch_content(message_id).await {
            Ok(content) => {
                outcome.category = self.classifier.classify(&classification_text(&content)).await;
                Some(content)
            }
            Err(e) => {
                error!(step = "classify_fail", msg_id = %message_id, error = %e, "Could not read message, using low priority");
                outcome.record_error("classify_fail", &e);
                None
            }
        };

        // CLASSIFIED -> LABELED
        match self.apply_category_label(message_id, outcome.category).await {
            Ok(labeled) => outcome.labeled = labeled,
            Err(e) => {
                error!(step = "label_fail", msg_id = %message_id, error = %e, "Could not label message");
                outcome.record_error("label_fail", &e);
            }
        }

        // LABELED -> DRAFTED | SKIPPED_DRAFT
        if outcome.category.needs_reply() {
            outcome.draft = match self.draft_reply(message_id, content.as_ref()).await {
                Ok(status) => status,
                Err(e) => {
                    error!(step = "draft_fail", msg_id = %message_id, error = %e, "Could not create reply draft");
                    outcome.record_error("draft_fail", &e);
                    DraftStatus::Failed
                }
            };
        }

        // -> READ
        if self.options.auto_mark_read {
            if self.options.dry_run {
                debug!(msg_id = %message_id, "Dry run: would mark as read");
            } else {
                match self
                    .client
                    .modify_labels(message_id, &[], &[UNREAD_LABEL.to_string()])
                    .await
                {
                    Ok(()) => outcome.marked_read = true,
                    Err(e) => {
                        warn!(step = "mark_read_fail", msg_id = %message_id, error = %e, "Could not mark message as read");
                        outcome.record_error("mark_read_fail", &e);
                    }
                }
            }
        }

        info!(
            step = "message_done",
            msg_id = %message_id,
            category = %outcome.category,
            labeled = outcome.labeled,
            marked_read = outcome.marked_read,
            "Message processed"
        );
        outcome
    }

    async fn fetch_content(&self, message_id: &str) -> Result<MessageContent> {
        let raw = self.client.get_raw_message(message_id).await?;
        parse_raw_message(&raw)
    }

    /// Returns whether a label was actually applied
    async fn apply_category_label(&mut self, message_id: &str, category: Category) -> Result<bool> {
        if self.options.dry_run {
            let name = self.labels.category_label_name(category);
            match self.labels.cached_label_id(&name) {
                Some(_) => debug!(msg_id = %message_id, label = %name, "Dry run: would apply label"),
                None => debug!(msg_id = %message_id, label = %name, "Dry run: would create and apply label"),
            }
            return Ok(false);
        }

        let label_id = self.labels.label_for_category(category).await?;
        self.client
            .modify_labels(message_id, &[label_id], &[])
            .await?;
        Ok(true)
    }

    async fn draft_reply(
        &self,
        message_id: &str,
        content: Option<&MessageContent>,
    ) -> Result<DraftStatus> {
        let header_names: Vec<String> = REPLY_HEADERS.iter().map(|h| h.to_string()).collect();
        let headers = self.client.get_metadata(message_id, &header_names).await?;

        let from_header = headers.get("From").unwrap_or_default();
        if crate::message::extract_first_address(from_header).is_none() {
            warn!(step = "draft_skip_invalid_to", msg_id = %message_id, "No reply address in From header");
            return Ok(DraftStatus::SkippedInvalidRecipient);
        }

        let subject = reply_source_subject(&headers, content);
        let body = content.map(|c| c.body.as_str()).unwrap_or_default();

        let Some(draft) = self.drafter.compose(&subject, body).await else {
            return Ok(DraftStatus::SkippedEmpty);
        };

        let reply = ReplyMessage::for_original(
            from_header,
            &subject,
            draft.body_text,
            headers.get("Message-Id"),
            headers.get("References"),
        )
        .ok_or_else(|| TriageError::DraftError("Reply has no recipient".to_string()))?;

        if self.options.dry_run {
            info!(step = "draft_dry_run", msg_id = %message_id, to = %redact_email(&reply.to), "Dry run: would create reply draft");
            return Ok(DraftStatus::WouldCreate);
        }

        let request = DraftRequest {
            thread_id: headers.thread_id.clone(),
            raw: reply.to_rfc822(),
        };
        let draft_id = self.client.create_draft(&request).await?;

        info!(step = "draft_created", msg_id = %message_id, to = %redact_email(&reply.to), "Reply draft created");
        Ok(DraftStatus::Created(draft_id))
    }
}

/// Subject from the metadata headers, else the parsed message
fn reply_source_subject(headers: &MessageHeaders, content: Option<&MessageContent>) -> String {
    headers
        .get("Subject")
        .map(str::to_string)
        .or_else(|| content.map(|c| c.subject.clone()))
        .unwrap_or_default()
}
