//! Command-line interface

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth;
use crate::classifier::Classifier;
use crate::client::{GmailClient, ProductionGmailClient};
use crate::config::Config;
use crate::error::{Result, TriageError};
use crate::generation::vertex::VertexClientFactory;
use crate::generation::GenerationClient;
use crate::label_manager::LabelManager;
use crate::pipeline::{BatchReport, RunOptions, TriageRun};
use crate::reply::ReplyDrafter;

#[derive(Parser, Debug)]
#[command(name = "gmail-triage")]
#[command(version = "0.1.0")]
#[command(about = "Classify unread Gmail messages, label them and draft replies", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to OAuth2 credentials file
    #[arg(long, default_value = "credentials.json")]
    pub credentials: PathBuf,

    /// Path to token cache file
    #[arg(long, default_value = ".gmail-triage/token.json")]
    pub token_cache: PathBuf,

    /// Authorized-user token file for unattended runs (skips the browser flow)
    #[arg(long, env = "TOKEN_PATH")]
    pub token_path: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Authenticate with Gmail API
    Auth {
        /// Force re-authentication even if token exists
        #[arg(long)]
        force: bool,
    },

    /// Triage unread messages
    Run {
        /// Dry run mode (don't make any changes)
        #[arg(long)]
        dry_run: bool,

        /// Override the number of messages handled
        #[arg(long)]
        max_messages: Option<u32>,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the region and model order used for generation
    Candidates,
}

/// Apply `run` flags on top of the loaded configuration
pub fn apply_run_overrides(config: &mut Config, dry_run: bool, max_messages: Option<u32>) {
    if dry_run {
        config.execution.dry_run = true;
    }
    if let Some(max) = max_messages {
        config.gmail.max_messages = max;
    }
}

pub fn run_options(config: &Config) -> RunOptions {
    RunOptions {
        max_messages: config.gmail.max_messages,
        auto_mark_read: config.gmail.auto_mark_read,
        dry_run: config.execution.dry_run,
    }
}

/// Config file, then environment, then command-line flags
pub async fn resolve_config(cli: &Cli, dry_run: bool, max_messages: Option<u32>) -> Result<Config> {
    let mut config = Config::load(&cli.config).await?;
    config.apply_env_overrides();
    apply_run_overrides(&mut config, dry_run, max_messages);
    config.validate()?;
    Ok(config)
}

/// Gmail hub from the token file when given, else the installed-app flow
pub async fn connect_gmail(cli: &Cli) -> Result<auth::GmailHub> {
    match &cli.token_path {
        Some(token_path) => {
            tracing::info!("Using authorized-user token file {:?}", token_path);
            auth::gmail_hub_from_token_file(token_path).await
        }
        None => auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await,
    }
}

/// Wire the production collaborators and run one batch
pub async fn run_triage(cli: &Cli, dry_run: bool, max_messages: Option<u32>) -> Result<BatchReport> {
    let config = resolve_config(cli, dry_run, max_messages).await?;
    let project_id = config
        .vertex
        .project_id
        .clone()
        .ok_or_else(|| TriageError::ConfigError("vertex.project_id is required".to_string()))?;

    tracing::info!(
        step = "precheck",
        project = %project_id,
        regions = ?config.candidate_list().regions(),
        models = ?config.candidate_list().models(),
        token_file = cli.token_path.is_some(),
        "Starting triage run"
    );

    let hub = connect_gmail(cli).await?;
    let gmail: Arc<dyn GmailClient> =
        Arc::new(ProductionGmailClient::new(hub).with_call_timeout(config.call_timeout()));

    let factory = Arc::new(VertexClientFactory::connect(&project_id).await?);
    let generation = Arc::new(
        GenerationClient::new(factory, config.candidate_list())
            .with_attempt_timeout(config.attempt_timeout())
            .with_selection_logging(config.vertex.log_model_selection),
    );

    let mut run = TriageRun::new(
        Arc::clone(&gmail),
        Classifier::new(Arc::clone(&generation)),
        ReplyDrafter::new(generation, config.reply.signature.clone()),
        LabelManager::new(gmail, config.labels.prefix.clone()),
        run_options(&config),
    );

    run.run().await
}

/// Region x model order, one pair per line
pub fn describe_candidates(config: &Config) -> String {
    config
        .candidate_list()
        .pairs()
        .enumerate()
        .map(|(index, (region, model))| format!("{:>2}. {} / {}\n", index + 1, region, model))
        .collect()
}
