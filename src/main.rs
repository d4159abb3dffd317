use anyhow::Result;
use clap::Parser;
use gmail_priority::classifier::RemoteClassifier;
use gmail_priority::client::{GmailClient, ProductionGmailClient};
use gmail_priority::config::Config;
use gmail_priority::label_manager::LabelManager;
use gmail_priority::models::LabelMap;
use gmail_priority::poller::Poller;
use gmail_priority::scanner::MessageScanner;
use gmail_priority::{auth, Classification};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Poll a Gmail mailbox and file new messages under priority labels.
///
/// Runs until 'q' or Esc is pressed. There are no subcommands; the loop
/// starts as soon as authentication completes.
#[derive(Debug, Parser)]
#[command(name = "gmail-priority", version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the OAuth2 credentials JSON file
    #[arg(long, default_value = "credentials.json")]
    credentials: PathBuf,

    /// Path where the OAuth2 token cache is stored
    #[arg(long, default_value = "token.json")]
    token_cache: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs (better performance, FIPS support)
    // On Windows, use ring (better compatibility, no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // Initialize tracing with level based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_priority=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("gmail_priority=info,warn,error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    tracing::info!("Gmail priority labeler starting");

    let config = Config::load(&cli.config).await?;

    // Credential acquisition is the one fatal failure: without mailbox
    // access there is nothing to poll.
    let hub = auth::initialize_gmail_hub(&cli.credentials, &cli.token_cache).await?;
    if cli.token_cache.exists() {
        auth::secure_token_file(&cli.token_cache).await?;
    }
    tracing::info!("Credential cached at {:?}", cli.token_cache);

    let client: Arc<dyn GmailClient> = Arc::new(ProductionGmailClient::new(hub));

    // The rubric needs to know whose mailbox it is labeling
    let self_address = match config.account.self_address.clone() {
        Some(address) => address,
        None => client.profile_email_address().await?,
    };
    tracing::info!("Connected to account: {}", self_address);

    let labels = LabelManager::new(Arc::clone(&client));
    let label_map = labels.ensure_labels(&LabelMap::new()).await?;
    for classification in Classification::ALL {
        if let Some(id) = label_map.id_for(classification) {
            tracing::debug!("Tracking label {} -> {}", classification, id);
        }
    }

    let scanner = MessageScanner::new(Arc::clone(&client));
    let classifier = RemoteClassifier::new(&config.classifier, self_address);

    let mut poller = Poller::new(
        scanner,
        labels,
        Box::new(classifier),
        label_map,
        &config.poll,
    );
    poller.run().await?;

    Ok(())
}
