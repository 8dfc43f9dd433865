use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lfsgate::auth::TokenStore;
use lfsgate::blobstore::BlobStore;
use lfsgate::cli::authenticate;
use lfsgate::config::{Config, ConfigOverrides};
use lfsgate::server::{create_router, AppState};

#[derive(Parser)]
#[command(name = "lfsgate")]
#[command(about = "Self-hosted Git LFS server: blob store, token auth bridge, Batch API.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (BatchNegotiator + TransferHandler endpoints).
    Serve {
        /// Config file path (default: ./lfsgate.toml or /etc/lfsgate/lfsgate.toml)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to (default: 127.0.0.1)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (default: 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// BlobStore root directory (default: ./data)
        #[arg(long)]
        data_root: Option<PathBuf>,

        /// Public base URL for external access (e.g. "https://git.example.com").
        /// Used for generating LFS action URLs; when unset, URLs are derived
        /// from the incoming request's headers.
        #[arg(long)]
        public_base_url: Option<String>,
    },

    /// Invoked by a trusted transport (typically an SSH forced command) to
    /// mint or refresh a bearer token for one repository and action, printing
    /// its credentials as JSON to stdout.
    Authenticate {
        /// Config file path (default: ./lfsgate.toml or /etc/lfsgate/lfsgate.toml)
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Repository path, e.g. "org/project"
        repo: String,

        /// "download" or "upload"
        action: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            data_root,
            public_base_url,
        } => {
            let overrides = ConfigOverrides {
                host,
                port,
                data_root,
                public_base_url,
            };
            let config = Config::load_with_overrides(config.as_deref(), overrides)?;
            init_tracing(&config.log_filter);
            run_server(config).await
        }
        Commands::Authenticate {
            config,
            repo,
            action,
        } => {
            let config = Config::load_with_overrides(config.as_deref(), ConfigOverrides::default())?;
            init_tracing(&config.log_filter);
            authenticate::run(&config, &repo, &action).await
        }
    }
}

fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    // Ignore a repeat init (e.g. under `#[tokio::test]` harnesses that share a process).
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.data_root)
        .with_context(|| format!("creating data root {}", config.data_root.display()))?;

    let config = Arc::new(config);
    let mut blob_store = BlobStore::new(config.data_root.clone(), config.repositories.clone());
    blob_store.dir_mode = config.dir_mode;
    blob_store.file_mode = config.blob_mode;
    let blob_store = Arc::new(blob_store);
    let token_store = Arc::new(TokenStore::new(
        config.resolved_token_dir(),
        config.token_ttl_seconds,
    ));
    let state = Arc::new(AppState {
        blob_store,
        token_store,
        config: config.clone(),
    });

    let app = create_router(state);
    let addr = config.socket_addr()?;

    tracing::info!("starting lfsgate on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
