//! HOK Admin - storefront administration client
//!
//! Usage:
//!   hok-admin [OPTIONS] <COMMAND>
//!
//! Options:
//!   -c, --config <PATH>  Path to config file
//!   -v, --verbose        Increase log verbosity
//!   --json-logs          Output logs as JSON
//!   --json               Print results as JSON
//!   -q, --quiet          Suppress notifications

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hok_admin::config::Config;
use hok_admin::credentials::CredentialStore;
use hok_admin::http::{ApiClient, ReqwestTransport, Transport};
use hok_admin::notify::{NoopNotifier, Notifier, TracingNotifier};
use hok_admin::storage::{KeyValueStore, LocalStore, SessionStore};
use hok_admin::upload::ImageUploader;

use cli::{Command, ConsoleNotifier};

#[derive(Parser, Debug)]
#[command(name = "hok-admin")]
#[command(author, version, about = "Storefront admin client", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, env = "HOK_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// Suppress notifications; failures only set the exit status
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

/// Where notices go: nowhere, into the log stream, or straight to stderr
fn notifier_for(args: &Args) -> Arc<dyn Notifier> {
    if args.quiet {
        Arc::new(NoopNotifier)
    } else if args.json_logs {
        Arc::new(TracingNotifier)
    } else {
        Arc::new(ConsoleNotifier)
    }
}

/// Everything a command needs, built once at startup
pub struct App {
    pub config: Config,
    pub client: Arc<ApiClient>,
    pub uploader: Arc<ImageUploader>,
    pub local: Arc<dyn KeyValueStore>,
    pub json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Set up logging; stdout is reserved for command output
    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("hok_admin={log_level},warn")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting hok-admin");

    // Load configuration
    let config = Config::load(args.config.as_ref())?;
    tracing::debug!(config = ?config, "loaded configuration");

    // Initialize components
    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(config.request_timeout())?);
    let local: Arc<dyn KeyValueStore> = Arc::new(LocalStore::new(&config.storage.data_dir));
    let credentials = Arc::new(CredentialStore::new(
        Arc::clone(&local),
        Arc::new(SessionStore::new()),
    ));

    let client = Arc::new(ApiClient::from_config(
        &config.api,
        Arc::clone(&transport),
        credentials,
        notifier_for(&args),
    ));
    let uploader = Arc::new(ImageUploader::from_config(&config.upload, transport));

    tracing::debug!(base_url = %client.base_url(), "client ready");

    let app = App {
        config,
        client,
        uploader,
        local,
        json: args.json,
    };

    let ok = cli::run(&app, args.command).await?;
    if !ok {
        std::process::exit(1);
    }

    Ok(())
}
