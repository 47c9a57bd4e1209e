use anyhow::Result;
use clap::Parser;
use gmail_triage::cli::{self, Cli, Commands, LogFormat};
use gmail_triage::config::Config;
use gmail_triage::error::TriageError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        eprintln!("\nFor help, run: gmail-triage --help");
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_triage=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gmail_triage=info"))
    };

    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_current_span(false)
            .init(),
    }
}

async fn run() -> Result<()> {
    // Several dependencies pull in rustls; pick one crypto provider up front.
    // aws-lc-rs on non-Windows platforms, ring on Windows (no NASM/CMake needed)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    init_tracing(&cli);

    match &cli.command {
        Commands::Auth { force } => {
            tracing::info!("Authenticating with Gmail API...");

            if let Some(parent) = cli.token_cache.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            if *force && cli.token_cache.exists() {
                tokio::fs::remove_file(&cli.token_cache).await?;
                tracing::info!("Removed existing token cache");
            }

            // Triggers the browser flow when no usable token is cached
            let hub =
                gmail_triage::auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache)
                    .await?;
            if cli.token_cache.exists() {
                gmail_triage::auth::secure_token_file(&cli.token_cache).await?;
            }

            println!("Successfully authenticated with Gmail API");
            println!("Token cached at: {:?}", cli.token_cache);

            // Scope must match the cached token to avoid a second consent prompt
            let (_, profile) = hub
                .users()
                .get_profile("me")
                .add_scope("https://www.googleapis.com/auth/gmail.modify")
                .doit()
                .await?;
            println!(
                "Connected to account: {}",
                gmail_triage::redact::redact_email(&profile.email_address.unwrap_or_default())
            );

            Ok(())
        }

        Commands::Run {
            dry_run,
            max_messages,
        } => {
            if *dry_run {
                println!("Running in DRY RUN mode - no changes will be made");
            }

            let report = cli::run_triage(&cli, *dry_run, *max_messages).await?;

            println!("\n========================================");
            print!("{}", report.to_summary());
            println!("========================================");

            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !*force {
                return Err(TriageError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - vertex.project_id: Google Cloud project running Vertex AI");
            println!("  - vertex.location / vertex.model: preferred region and model");
            println!("  - gmail.max_messages: unread messages handled per run");
            println!("  - labels.prefix: Parent label for the category labels");
            println!("  - reply.signature: Appended to every reply draft");

            Ok(())
        }

        Commands::Candidates => {
            let mut config = Config::load(&cli.config).await?;
            config.apply_env_overrides();

            println!("Generation candidates (region / model), in attempt order:");
            print!("{}", cli::describe_candidates(&config));

            Ok(())
        }
    }
}
