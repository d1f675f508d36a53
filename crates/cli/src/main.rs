//! HashVault command line interface
//!
//! Publishes files to a content store, registers their provenance on the
//! ledger and lists what an owner has registered.

mod prompt;
mod settings;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use hashvault_core::{ListingOutcome, ProvenanceIndex, UploadOrchestrator, UploadState};
use hashvault_files::{gateway_url, ContentStore, HttpContentStore, MemoryContentStore};
use hashvault_ledger::{MemoryLedger, Signer, StaticSigner};
use hashvault_types::{ContentAddress, OwnerId};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::prompt::PromptSigner;
use crate::settings::AppConfig;

#[derive(Parser)]
#[command(name = "hashvault")]
#[command(about = "Publish files and record their provenance on a ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./hashvault.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `hashvault_core=debug`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Sign as this account without prompting
    #[arg(long, global = true, value_name = "ADDR")]
    identity: Option<String>,

    /// Keep content in memory instead of talking to an IPFS node
    #[arg(long, global = true)]
    memory_store: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a file and register its provenance
    Upload {
        /// File to publish
        path: PathBuf,
        /// Account expected to own the record
        #[arg(long, value_name = "ADDR")]
        owner: Option<String>,
        /// Print lifecycle events as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// List the files registered to an owner, newest first
    List {
        /// Owner account address
        owner: String,
        /// Print the full listing as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the gateway URL of a content address
    Url {
        /// Content address returned by an upload
        address: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(identity) = &cli.identity {
        config.identity = Some(identity.clone());
    }
    config.validate()?;
    init_logging(&config)?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Upload { path, owner, json } => {
            run_upload(&config, cli.memory_store, path, owner, json).await
        }
        Commands::List { owner, json } => run_list(&config, &owner, json).await,
        Commands::Url { address } => {
            let address = ContentAddress::new(address).context("invalid content address")?;
            println!("{}", gateway_url(&config.gateway_url, &address));
            Ok(())
        }
    }
}

async fn run_upload(
    config: &AppConfig,
    memory_store: bool,
    path: PathBuf,
    owner: Option<String>,
    json: bool,
) -> Result<()> {
    let data = tokio::fs::read(&path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    let ledger = Arc::new(open_ledger(config)?);
    let store: Arc<dyn ContentStore> = if memory_store {
        Arc::new(MemoryContentStore::new())
    } else {
        Arc::new(HttpContentStore::new(config.ipfs_api_url.clone()))
    };
    let signer: Arc<dyn Signer> = match &config.identity {
        Some(identity) => {
            let identity = OwnerId::parse(identity).context("invalid signing identity")?;
            Arc::new(StaticSigner::new(identity))
        }
        None => Arc::new(PromptSigner::new()),
    };

    let orchestrator = UploadOrchestrator::new(store, ledger.clone())
        .with_signer(signer)
        .with_config(&config.core());

    info!(path = %path.display(), bytes = data.len(), "starting upload");
    let mut handle = orchestrator.submit_upload(data, owner);
    let mut terminal = None;
    while let Some(event) = handle.next_event().await {
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            println!("[{}] {}", event.state.name(), event.detail);
        }
        if event.state.is_terminal() {
            terminal = Some(event.state);
            break;
        }
    }

    // A timed-out write may still have landed, so persist in every case.
    ledger
        .save_snapshot(&config.ledger_path)
        .with_context(|| format!("failed to save ledger {}", config.ledger_path.display()))?;

    match terminal {
        Some(UploadState::Committed { record }) => {
            if !json {
                println!(
                    "View at {}",
                    gateway_url(&config.gateway_url, &record.content_address)
                );
            }
            Ok(())
        }
        Some(UploadState::Failed { error }) => {
            bail!("upload failed [{}]: {}", error.kind(), error)
        }
        _ => bail!("upload ended without reporting an outcome"),
    }
}

async fn run_list(config: &AppConfig, owner: &str, json: bool) -> Result<()> {
    let ledger = Arc::new(open_ledger(config)?);
    let index = ProvenanceIndex::new(ledger, &config.core());
    let listing = index
        .list(owner)
        .await
        .with_context(|| format!("failed to list uploads of {owner}"))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.outcome == ListingOutcome::NoLedgerRecords {
        println!("No uploads recorded for {}", listing.owner.to_checksum());
        return Ok(());
    }
    for record in &listing.records {
        println!(
            "{}  {}  {}",
            record.created_at,
            record.content_address,
            gateway_url(&config.gateway_url, &record.content_address)
        );
    }
    for dropped in &listing.dropped {
        eprintln!(
            "warning: skipped {} ({}): {}",
            dropped.content_address, dropped.record_key, dropped.reason
        );
    }
    if listing.tombstoned > 0 {
        println!("({} removed record(s) hidden)", listing.tombstoned);
    }
    Ok(())
}

fn open_ledger(config: &AppConfig) -> Result<MemoryLedger> {
    MemoryLedger::open(&config.ledger_path)
        .with_context(|| format!("failed to open ledger {}", config.ledger_path.display()))
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .with_context(|| format!("invalid log level `{}`", config.log_level))?;

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_format == "compact" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}
