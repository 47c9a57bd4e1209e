//! Gmail Triage
//!
//! Batch triage of unread Gmail messages with Gemini on Vertex AI.
//!
//! # Overview
//!
//! Each run picks up a bounded batch of unread messages and, for every one:
//! - **Classification**: asks the model for one of four priority categories,
//!   degrading to low priority when the model is unavailable or unparseable
//! - **Labeling**: applies the category label (`{prefix}/Important`, `Read`,
//!   `Event`, `Ads`), creating labels on first use
//! - **Reply drafting**: for messages that need an answer, stores a threaded
//!   reply draft with the configured signature
//! - **Read state**: optionally marks the message read
//!
//! Generation requests walk an ordered list of regions and models, so a model
//! that is missing or throttled in one region falls through to the next.
//!
//! # Example Usage
//!
//! ```no_run
//! use gmail_triage::{auth, cli, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::load("config.toml".as_ref()).await?;
//!     config.apply_env_overrides();
//!     config.validate()?;
//!
//!     for (region, model) in config.candidate_list().pairs() {
//!         println!("{} / {}", region, model);
//!     }
//!
//!     let _hub = auth::initialize_gmail_hub(
//!         "credentials.json".as_ref(),
//!         ".gmail-triage/token.json".as_ref(),
//!     )
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`auth`] - OAuth2 for Gmail and Application Default Credentials for Vertex AI
//! - [`client`] - Gmail API client with timeouts and retry logic
//! - [`generation`] - Region/model fallback over the Vertex AI transport
//! - [`classifier`] - Category assignment from model output
//! - [`reply`] - Reply draft generation and signatures
//! - [`message`] - MIME parsing and reply message assembly
//! - [`label_manager`] - Category label lookup and creation
//! - [`pipeline`] - Per-message state machine and batch report
//! - [`cli`] - Command-line interface and wiring
//! - [`config`] - Configuration management
//! - [`error`] - Error types and result aliases
//! - [`models`] - Core data structures

pub mod auth;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod label_manager;
pub mod message;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod redact;
pub mod reply;

// Re-export commonly used types for convenience
pub use error::{Result, TriageError};

// Core data models
pub use models::{
    AttemptRecord, Category, GenerationFailure, GenerationOutcome, GenerationRequest,
    MessageHeaders, OutputFormat, ReplyDraft,
};

// Generation
pub use generation::{
    CandidateList, GenerationClient, RegionClient, RegionClientFactory, ServiceError,
    ServiceErrorKind,
};

pub use classifier::Classifier;
pub use reply::ReplyDrafter;

// Config types
pub use config::{Config, ExecutionConfig, GmailConfig, LabelConfig, ReplyConfig, VertexConfig};

// Client traits
pub use client::{DraftRequest, GmailClient, LabelInfo, ProductionGmailClient};

pub use label_manager::LabelManager;
pub use pipeline::{BatchReport, DraftStatus, MessageOutcome, RunOptions, TriageRun};

// CLI types (for binary usage)
pub use cli::{Cli, Commands};
