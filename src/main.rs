//! simple-mcp-server: MCP server for notes, files and database tables
//!
//! Serves one MCP session over stdio, or over HTTP with an SSE stream for
//! server-to-client messages.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use simple_mcp_server::config::{self, Config, TransportMode};
use simple_mcp_server::mcp::server::{McpServer, ServerOptions};
use simple_mcp_server::mcp::transport::{http, StdioTransport};
use simple_mcp_server::providers::Workspace;

/// MCP server exposing notes, files and database tables.
///
/// Speaks JSON-RPC 2.0 over stdio, or over HTTP: POST messages to /mcp and
/// read replies from the SSE stream at /mcp/stream.
#[derive(Parser, Debug)]
#[command(name = "simple-mcp-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve on (overrides the configuration file)
    #[arg(long, env = "MCP_SERVER_MODE", value_enum)]
    mode: Option<TransportMode>,

    /// Listen address for the HTTP transport, e.g. 127.0.0.1:8000
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries protocol messages in stdio mode.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves when the process is asked to stop.
#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let (Ok(mut sigint), Ok(mut sigterm)) = (
        signal(SignalKind::interrupt()),
        signal(SignalKind::terminate()),
    ) else {
        warn!("Failed to install signal handlers");
        return std::future::pending().await;
    };

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

/// Resolves when the process is asked to stop.
#[cfg(windows)]
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C, initiating graceful shutdown");
    } else {
        warn!("Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

/// Serves one session over stdin/stdout.
async fn run_stdio(cfg: &Config, options: ServerOptions) -> Result<(), Box<dyn Error>> {
    let workspace = Workspace::from_config(cfg);
    let mut server = McpServer::new(StdioTransport::new(), workspace, options);

    info!("MCP server ready, waiting for client connection...");
    server.run_until(shutdown_signal()).await?;
    Ok(())
}

/// Serves one session over HTTP POST + SSE.
async fn run_http(cfg: &Config, options: ServerOptions) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind(&cfg.http.bind).await?;
    let (transport, router) = http::channel(cfg.http.queue_capacity);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let serve_task = tokio::spawn(http::serve(listener, router, async move {
        let _ = stop_rx.await;
    }));

    let workspace = Workspace::from_config(cfg);
    let mut server = McpServer::new(transport, workspace, options);
    let result = server.run_until(shutdown_signal()).await;

    // Closing the outbound queue ends any open SSE stream
    drop(server);
    let _ = stop_tx.send(());
    serve_task.await??;

    result?;
    Ok(())
}

/// Entry point for the simple-mcp-server.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            if config_path.is_none() {
                if let Some(default_path) = config::default_config_path() {
                    eprintln!("\nWhile loading: {}", default_path.display());
                }
            }
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = args.bind {
        cfg.http.bind = bind;
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    let mode = cfg.effective_mode(args.mode);
    let options = ServerOptions {
        resource_list_changed: cfg.notifications.resource_list_changed,
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = ?mode,
        "Starting simple-mcp-server"
    );

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match mode {
            TransportMode::Stdio => run_stdio(&cfg, options).await,
            TransportMode::Http => run_http(&cfg, options).await,
        }
    });

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
