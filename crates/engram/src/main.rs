//! Main entry point for the engram MCP server

// Internal modules
mod handlers;
mod server;
mod signal;
mod state;
mod transport;

// Internal imports (std, crate)
use crate::transport::Transport;

// External imports (alphabetized)
use clap::Parser;
use engram_config::ApplicationConfig;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// engram MCP Server
///
/// Long-term memory for AI agents: facts, vector memories, graph memories,
/// knowledge-base documents, temporal events and code-symbol indexes.
/// Supports both STDIO and SSE (Server-Sent Events) transports.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transport type to use (stdio or sse)
    #[arg(short, long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// SSE server bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    sse_addr: String,

    /// SSE keep-alive interval in seconds
    #[arg(long, default_value = "30")]
    sse_keep_alive: u64,

    /// Log directory path (defaults to OS-specific location)
    #[arg(long)]
    log_dir: Option<String>,

    /// Optional configuration file path (TOML format); when absent the
    /// configuration comes from defaults plus ENGRAM_* environment variables
    #[arg(long, short = 'c')]
    config_file: Option<String>,
}

// Type alias to simplify return type
type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    let config = if let Some(config_path) = &args.config_file {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file '{config_path}': {e}"))?;
        let config: ApplicationConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{config_path}': {e}"))?;
        config.validate()?;
        config
    } else {
        ApplicationConfig::from_env()?
    };

    let log_dir = args
        .log_dir
        .map_or_else(get_default_log_dir, std::path::PathBuf::from);
    std::fs::create_dir_all(&log_dir)?;

    // === Dual Logging Setup ===
    // 1. File logger (daily rotation, async non-blocking)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "engram.log");
    let (file_writer, file_guard): (NonBlocking, WorkerGuard) =
        tracing_appender::non_blocking(file_appender);

    // 2. Stderr logger (async non-blocking); stdout is the MCP wire in
    // stdio mode and must stay clean
    let (stderr_writer, stderr_guard): (NonBlocking, WorkerGuard) =
        tracing_appender::non_blocking(std::io::stderr());

    let multi_writer = file_writer.and(stderr_writer);

    tracing_subscriber::fmt()
        .json()
        .with_writer(multi_writer)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let sse_addr = args.sse_addr.parse().unwrap_or_else(|e| {
        tracing::warn!("invalid SSE address '{}': {e}; using default", args.sse_addr);
        std::net::SocketAddr::from(([127, 0, 0, 1], 8080))
    });

    let options = server::ServerOptions {
        transport: args.transport,
        sse_addr,
        sse_keep_alive: std::time::Duration::from_secs(args.sse_keep_alive),
    };

    // Run unified server orchestrator (handles transport, signals, shutdown)
    server::start(config, options, file_guard, stderr_guard).await
}

/// Get the default log directory based on the operating system
fn get_default_log_dir() -> std::path::PathBuf {
    #[cfg(target_os = "windows")]
    {
        // Windows: %LOCALAPPDATA%\engram\logs
        if let Some(local_app_data) = std::env::var_os("LOCALAPPDATA") {
            std::path::PathBuf::from(local_app_data)
                .join("engram")
                .join("logs")
        } else {
            std::path::PathBuf::from("logs")
        }
    }

    #[cfg(target_os = "macos")]
    {
        // macOS: ~/Library/Logs/engram
        if let Some(home) = dirs::home_dir() {
            home.join("Library").join("Logs").join("engram")
        } else {
            std::path::PathBuf::from("logs")
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        // Linux and other Unix-like systems
        if let Some(data_dir) = dirs::data_dir() {
            data_dir.join("engram").join("logs")
        } else if let Some(home) = dirs::home_dir() {
            home.join(".engram").join("logs")
        } else {
            std::path::PathBuf::from("logs")
        }
    }
}
