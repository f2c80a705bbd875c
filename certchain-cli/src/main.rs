//! CertChain CLI
//!
//! Command-line interface for issuing, verifying and revoking on-chain
//! certificates.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use certchain_api::{ApiConfig, ApiServer};
use certchain_client::{
    network_for, user_message, validate_rpc_url, CertificateService, ClientConfig,
    Eip1193Provider, HttpCertificateService, LocalTransport, RegistryContract, ServiceError,
    TxOutcome,
};
use certchain_core::constants::DEFAULT_LOCAL_RPC_URL;
use certchain_core::traits::{PinningService, WalletProvider};
use certchain_core::types::{Address, Certificate, CertificateId, CertificateMetadata};
use certchain_core::CertchainError;
use certchain_ipfs::{ipfs_uri, PinataClient, PinataConfig};
use certchain_registry::{ChainConfig, ChainStore, DevNode, SharedChain};

/// CertChain - certificates on an Ethereum-compatible chain
#[derive(Parser, Debug)]
#[command(name = "certchain")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON-RPC endpoint; without it commands run against the local state file
    #[arg(long, global = true, env = "CERTCHAIN_RPC_URL")]
    rpc_url: Option<String>,

    /// Registry address (remote mode)
    #[arg(long, global = true, env = "CERTCHAIN_CONTRACT_ADDRESS")]
    contract: Option<String>,

    /// Local chain state file
    #[arg(long, global = true, env = "CERTCHAIN_STATE_FILE", default_value = "certchain-state.bin")]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8545")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Chain id; an existing state file must match it
        #[arg(long)]
        chain_id: Option<u64>,
        /// Initial gas threshold for a fresh chain
        #[arg(long)]
        gas_limit: Option<u64>,
        /// Pin to an in-process store when Pinata is not configured
        #[arg(long)]
        memory_ipfs: bool,
    },

    /// Show the registry
    Info,

    /// Issue a certificate
    Issue {
        /// Recipient name
        name: String,
        /// Link existing metadata
        #[arg(long, conflicts_with = "title")]
        metadata_uri: Option<String>,
        /// Pin metadata with this certificate title
        #[arg(long, requires = "issuer")]
        title: Option<String>,
        /// Issuing organisation for pinned metadata
        #[arg(long, requires = "title")]
        issuer: Option<String>,
        /// Document to pin and link from the metadata
        #[arg(long, requires = "title")]
        document: Option<PathBuf>,
    },

    /// Check whether a certificate is valid
    Verify {
        /// Certificate id
        id: CertificateId,
        /// Record the verification on-chain
        #[arg(long)]
        record: bool,
    },

    /// Show a certificate
    Get {
        /// Certificate id
        id: CertificateId,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Revoke a certificate
    Revoke {
        /// Certificate id
        id: CertificateId,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Move a certificate to a new recipient name
    Transfer {
        /// Certificate id
        id: CertificateId,
        /// New recipient name
        new_name: String,
    },

    /// Change the registry gas threshold
    SetGasLimit {
        /// New threshold
        limit: u64,
    },

    /// Pin a file to IPFS
    Upload {
        /// File to pin
        path: PathBuf,
    },
}

impl Commands {
    fn sends_transaction(&self) -> bool {
        match self {
            Commands::Issue { .. }
            | Commands::Revoke { .. }
            | Commands::Transfer { .. }
            | Commands::SetGasLimit { .. } => true,
            Commands::Verify { record, .. } => *record,
            _ => false,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "certchain=debug,info"
    } else {
        "certchain=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let verbose = cli.verbose;
    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "❌".red(), describe(&err));
        if verbose {
            eprintln!("   {} {:?}", "Details:".dimmed(), err);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli {
        rpc_url,
        contract,
        state,
        command,
        ..
    } = cli;

    if let Commands::Serve {
        port,
        bind,
        chain_id,
        gas_limit,
        memory_ipfs,
    } = command
    {
        return cmd_serve(port, &bind, state, chain_id, gas_limit, memory_ipfs).await;
    }

    let mut config = ClientConfig::from_env().context("Failed to read configuration")?;
    if let Some(raw) = contract {
        config.contract_address =
            Some(Address::from_hex(raw.trim()).context("Invalid registry address")?);
    }

    match rpc_url {
        Some(url) => {
            config.rpc_url = validate_rpc_url(&url)?;
            config.network = network_for(config.network.chain_id, &config.rpc_url);
            let service = HttpCertificateService::from_config(&config)?;
            execute(&service, command, &config.pinata).await
        }
        None => {
            let store = ChainStore::new(&state);
            let chain: SharedChain = Arc::new(
                store
                    .open_or_create(ChainConfig {
                        chain_id: config.network.chain_id,
                        ..ChainConfig::default()
                    })
                    .await
                    .with_context(|| format!("Failed to open {}", state.display()))?,
            );
            debug!(path = %state.display(), block = chain.block_number(), "Local chain opened");

            let network = network_for(chain.chain_id(), DEFAULT_LOCAL_RPC_URL);
            let provider = Eip1193Provider::new(LocalTransport::new(Arc::new(DevNode::new(
                chain.clone(),
            ))));
            let contract = RegistryContract::new(provider, chain.registry_address())
                .with_tx_gas(config.tx_gas);
            let service = CertificateService::new(contract, network);

            let mined = command.sends_transaction();
            execute(&service, command, &config.pinata).await?;
            if mined {
                store
                    .persist(&chain)
                    .await
                    .with_context(|| format!("Failed to save {}", state.display()))?;
            }
            Ok(())
        }
    }
}

/// Connects and runs one certificate command.
async fn execute<P: WalletProvider>(
    service: &CertificateService<P>,
    command: Commands,
    pinata: &PinataConfig,
) -> Result<()> {
    if !matches!(command, Commands::Upload { .. } | Commands::Serve { .. }) {
        let account = service.connect().await?;
        debug!(%account, "Wallet connected");
    }

    match command {
        Commands::Serve { .. } => bail!("`serve` opens its own chain"),
        Commands::Upload { path } => cmd_upload(&path, pinata).await,
        Commands::Info => cmd_info(service).await,
        Commands::Issue {
            name,
            metadata_uri,
            title,
            issuer,
            document,
        } => {
            let metadata = match (title, issuer) {
                (Some(title), Some(issuer)) => Some((title, issuer)),
                _ => None,
            };
            cmd_issue(service, &name, metadata_uri.as_deref(), metadata, document, pinata).await
        }
        Commands::Verify { id, record } => cmd_verify(service, id, record).await,
        Commands::Get { id, json } => cmd_get(service, id, json).await,
        Commands::Revoke { id, yes } => cmd_revoke(service, id, yes).await,
        Commands::Transfer { id, new_name } => cmd_transfer(service, id, &new_name).await,
        Commands::SetGasLimit { limit } => cmd_set_gas_limit(service, limit).await,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════════

/// Run API server
async fn cmd_serve(
    port: u16,
    bind: &str,
    state: PathBuf,
    chain_id: Option<u64>,
    gas_limit: Option<u64>,
    memory_ipfs: bool,
) -> Result<()> {
    println!("{}", "🚀 Starting CertChain API server...".cyan().bold());

    let mut config = ApiConfig::from_env().context("Failed to read configuration")?;
    config.state_file = Some(state);
    config.memory_ipfs |= memory_ipfs;
    if let Some(chain_id) = chain_id {
        config.chain_id = chain_id;
    }
    if let Some(gas_limit) = gas_limit {
        config.gas_limit = gas_limit;
    }

    let server = ApiServer::new(config)
        .await
        .context("Failed to open chain state")?;
    let chain = server.state().chain();

    println!("   {} http://{}:{}/rpc", "JSON-RPC:".green(), bind, port);
    println!("   {} http://{}:{}/api/v1", "REST:".green(), bind, port);
    println!("   {} {}", "Chain id:".dimmed(), chain.chain_id());
    println!("   {} {}", "Registry:".dimmed(), chain.registry_address());
    println!("   {} {}", "Owner:".dimmed(), chain.owner());
    println!("\n   Press Ctrl+C to stop.\n");

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    server.run(addr).await?;

    Ok(())
}

/// Show registry overview
async fn cmd_info<P: WalletProvider>(service: &CertificateService<P>) -> Result<()> {
    let info = service.contract_info().await?;

    println!("{}", "📜 Certificate registry".cyan().bold());
    println!("   {} {}", "Address:".yellow(), info.address);
    println!("   {} {}", "Owner:".dimmed(), info.owner);
    println!("   {} {}", "Chain id:".dimmed(), info.chain_id);
    println!("   {} {}", "Gas threshold:".dimmed(), info.gas_limit);
    println!("   {} {}", "Certificates:".dimmed(), info.certificate_count);
    if let Some(account) = service.account() {
        println!("   {} {}", "Your account:".dimmed(), account);
    }
    if service.account() != Some(info.owner) {
        println!("\n{}", "⚠️  Connected account is not the owner; issuing is disabled.".yellow());
    }

    Ok(())
}

/// Issue a certificate, optionally pinning metadata first
async fn cmd_issue<P: WalletProvider>(
    service: &CertificateService<P>,
    name: &str,
    metadata_uri: Option<&str>,
    metadata: Option<(String, String)>,
    document: Option<PathBuf>,
    pinata: &PinataConfig,
) -> Result<()> {
    println!("{} {}", "🎓 Issuing certificate to:".cyan().bold(), name);

    let (id, outcome) = match metadata {
        Some((title, issuer)) => {
            let client = PinataClient::new(pinata.clone())?;
            let mut metadata = CertificateMetadata::new(title, name, issuer);
            if let Some(path) = document {
                let cid = pin_path(&client, &path).await?;
                println!("   {} {}", "Document:".dimmed(), ipfs_uri(&cid));
                metadata = metadata.with_document(cid);
            }

            let pb = spinner("Pinning metadata and waiting for confirmation...")?;
            let result = service.issue_with_metadata(&client, &metadata).await;
            pb.finish_and_clear();
            result?
        }
        None => {
            let pb = spinner("Waiting for confirmation...")?;
            let result = service.issue_certificate(name, metadata_uri).await;
            pb.finish_and_clear();
            result?
        }
    };

    println!("\n{} #{}", "✅ Certificate issued:".green().bold(), id);
    print_outcome(&outcome);

    Ok(())
}

/// Check validity, optionally recording it on-chain
async fn cmd_verify<P: WalletProvider>(
    service: &CertificateService<P>,
    id: CertificateId,
    record: bool,
) -> Result<()> {
    println!("{} #{}", "🔍 Verifying certificate".cyan().bold(), id);

    let (is_valid, outcome) = if record {
        let pb = spinner("Recording verification...")?;
        let result = service.record_verification(id).await;
        pb.finish_and_clear();
        let (is_valid, outcome) = result?;
        (is_valid, Some(outcome))
    } else {
        (service.verify_certificate(id).await?, None)
    };

    if is_valid {
        println!("\n{}", "✅ Certificate is valid.".green().bold());
    } else {
        println!("\n{}", "❌ Certificate has been revoked.".red().bold());
    }
    if let Some(outcome) = outcome {
        print_outcome(&outcome);
    }

    Ok(())
}

/// Show a stored certificate
async fn cmd_get<P: WalletProvider>(
    service: &CertificateService<P>,
    id: CertificateId,
    json: bool,
) -> Result<()> {
    let certificate = service.get_certificate(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&certificate)?);
    } else {
        print_certificate(&certificate);
    }

    Ok(())
}

/// Revoke after confirmation
async fn cmd_revoke<P: WalletProvider>(
    service: &CertificateService<P>,
    id: CertificateId,
    yes: bool,
) -> Result<()> {
    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Revoke certificate #{}? This cannot be undone", id))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Aborted.".yellow());
            return Ok(());
        }
    }

    let pb = spinner("Revoking...")?;
    let result = service.revoke_certificate(id).await;
    pb.finish_and_clear();
    let outcome = result?;

    println!("{} #{}", "✅ Revoked certificate".green().bold(), id);
    print_outcome(&outcome);

    Ok(())
}

/// Reassign a certificate
async fn cmd_transfer<P: WalletProvider>(
    service: &CertificateService<P>,
    id: CertificateId,
    new_name: &str,
) -> Result<()> {
    let pb = spinner("Transferring...")?;
    let result = service.transfer_certificate(id, new_name).await;
    pb.finish_and_clear();
    let outcome = result?;

    println!("{} #{} → {}", "✅ Transferred certificate".green().bold(), id, new_name);
    print_outcome(&outcome);

    Ok(())
}

/// Change the gas threshold
async fn cmd_set_gas_limit<P: WalletProvider>(service: &CertificateService<P>, limit: u64) -> Result<()> {
    let pb = spinner("Updating gas threshold...")?;
    let result = service.set_gas_limit(limit).await;
    pb.finish_and_clear();
    let outcome = result?;

    println!("{} {}", "✅ Gas threshold set to".green().bold(), limit);
    print_outcome(&outcome);

    Ok(())
}

/// Pin a file
async fn cmd_upload(path: &Path, pinata: &PinataConfig) -> Result<()> {
    println!("{} {}", "📤 Uploading:".cyan().bold(), path.display());

    let client = PinataClient::new(pinata.clone())?;
    let cid = pin_path(&client, path).await?;

    println!("\n{}", "✅ Pinned:".green().bold());
    println!("   {} {}", "CID:".yellow(), cid);
    println!("   {} {}", "URI:".dimmed(), ipfs_uri(&cid));

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

async fn pin_path(client: &PinataClient, path: &Path) -> Result<String> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "certificate".into());
    if data.is_empty() {
        bail!("{} is empty", path.display());
    }

    let pb = spinner("Pinning to IPFS...")?;
    let result = client.pin_file(data, &name).await;
    pb.finish_and_clear();
    Ok(result?)
}

fn spinner(message: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("   {spinner:.green} {msg}")?);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

fn print_outcome(outcome: &TxOutcome) {
    println!("   {} {}", "Tx:".dimmed(), outcome.tx_hash());
    println!("   {} {}", "Block:".dimmed(), outcome.receipt.block_number);
    println!("   {} {}", "Gas used:".dimmed(), outcome.receipt.gas_used);
    for event in &outcome.events {
        println!("   {} {}", "Event:".dimmed(), event.name());
    }
}

fn print_certificate(certificate: &Certificate) {
    println!("{} #{}", "📜 Certificate".cyan().bold(), certificate.id);
    println!("   {} {}", "Recipient:".yellow(), certificate.recipient_name);
    match certificate.issued_at() {
        Some(at) => println!("   {} {}", "Issued:".dimmed(), at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("   {} {}", "Issued:".dimmed(), certificate.issue_date),
    }
    let status = if certificate.is_valid {
        "valid".green()
    } else {
        "revoked".red()
    };
    println!("   {} {}", "Status:".dimmed(), status);
    if let Some(uri) = &certificate.metadata_uri {
        println!("   {} {}", "Metadata:".dimmed(), uri);
    }
}

/// User-facing text for a failed command.
fn describe(err: &anyhow::Error) -> String {
    if let Some(service) = err.chain().find_map(|e| e.downcast_ref::<ServiceError>()) {
        return service.message.clone();
    }

    let mut parts = Vec::new();
    for cause in err.chain() {
        if let Some(inner) = cause.downcast_ref::<CertchainError>() {
            parts.push(user_message(inner));
            break;
        }
        parts.push(cause.to_string());
    }
    parts.join(": ")
}
