//! Process entry point: parses configuration, wires up the engine and its REST+WS adapter, and
//! serves them (§4.7). There is no desktop surface here — this process is the engine, not a
//! viewer onto it.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use engine::Registry;
use tracing_subscriber::EnvFilter;

/// Cascade: a chunked HTTP download engine, served over REST and a push WebSocket.
#[derive(Debug, Parser)]
#[command(name = "cascade", version)]
struct Config {
    /// Address the REST + WebSocket adapter binds to.
    #[arg(long, default_value = "127.0.0.1:7878")]
    bind: SocketAddr,

    /// Default number of chunks for a download that doesn't specify one.
    #[arg(long, default_value_t = 8)]
    default_chunks: u32,

    /// Default connect timeout, e.g. "10s".
    #[arg(long, default_value = "10s")]
    default_connect_timeout: String,

    /// Default read (inactivity) timeout, e.g. "30s".
    #[arg(long, default_value = "30s")]
    default_read_timeout: String,

    /// Directory completed downloads are written to. Defaults to the platform downloads folder.
    #[arg(long)]
    downloads_dir: Option<PathBuf>,

    /// Directory chunk backing files are created under. Defaults to a platform cache folder.
    #[arg(long)]
    temp_root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    // Engine defaults only take effect when a caller omits the field on `add_download`; parsing
    // them here, at startup, fails fast on a bad CLI value instead of on the first request.
    let _default_connect_timeout: Duration = engine::parse_duration(&config.default_connect_timeout)?;
    let _default_read_timeout: Duration = engine::parse_duration(&config.default_read_timeout)?;

    let downloads_dir = match config.downloads_dir {
        Some(dir) => dir,
        None => platform::default_downloads_dir()?,
    };
    let temp_root = match config.temp_root {
        Some(dir) => dir,
        None => platform::default_temp_root()?,
    };

    tracing::info!(
        bind = %config.bind,
        downloads_dir = %downloads_dir.display(),
        temp_root = %temp_root.display(),
        "starting cascade"
    );

    let backing = storage::BackingStore::new(temp_root).await?;
    let registry = Arc::new(Registry::new(backing, downloads_dir)?);
    let router = api::router(registry);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
