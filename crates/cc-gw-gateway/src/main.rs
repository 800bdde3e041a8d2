use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use cc_gw_gateway::{app, daemon};

#[derive(Parser)]
#[command(name = "cc-gw", version, about = "Local multi-model LLM gateway")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the gateway.
    Start {
        /// Fork into the background and return immediately.
        #[arg(long)]
        daemon: bool,
        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
        /// Run in the foreground (default when `--daemon` is absent).
        #[arg(long)]
        foreground: bool,
    },
    /// Stop a background instance.
    Stop,
    /// Stop then start a background instance.
    Restart,
    /// Report whether a background instance is running.
    Status,
    /// Print the gateway version.
    Version,
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Command::Start { daemon, port, foreground } => {
            if daemon && !foreground {
                run_daemon_start(port)
            } else {
                run_foreground(port)
            }
        }
        Command::Stop => run_stop(),
        Command::Restart => run_restart(),
        Command::Status => run_status(),
        Command::Version => {
            println!("cc-gw {}", env!("CARGO_PKG_VERSION"));
            0
        }
    };

    std::process::exit(exit_code);
}

fn run_daemon_start(port: Option<u16>) -> i32 {
    match daemon::spawn_background(port) {
        Ok(pid) => {
            println!("gateway started in the background (pid {pid})");
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn run_stop() -> i32 {
    match daemon::stop() {
        Ok(pid) => {
            println!("stopped gateway (pid {pid})");
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}

fn run_restart() -> i32 {
    let _ = daemon::stop();
    run_daemon_start(None)
}

fn run_status() -> i32 {
    match daemon::status() {
        Some(pid) => {
            println!("gateway running (pid {pid})");
            0
        }
        None => {
            println!("gateway not running");
            1
        }
    }
}

fn run_foreground(port: Option<u16>) -> i32 {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start tokio runtime: {e}");
            return 1;
        }
    };
    runtime.block_on(serve(port))
}

async fn serve(port_override: Option<u16>) -> i32 {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cc_gw_gateway=info,tower_http=info".into()),
        )
        .init();

    let config_path = std::env::var("CC_GW_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| cc_gw_core::config::default_config_path());

    let config = match cc_gw_core::config::ConfigStore::load(&config_path) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("invalid configuration at {}: {e}", config_path.display());
            return 2;
        }
    };

    let db_path = cc_gw_store::default_db_path();
    let db = match cc_gw_store::GatewayDb::open(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("failed to open gateway database at {}: {e}", db_path.display());
            return 2;
        }
    };

    let state = Arc::new(app::AppState::new(config.clone(), db, db_path));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let maintenance = state.maintenance.clone();
    tokio::spawn(async move { maintenance.run(shutdown_rx).await });

    let router = app::build_router(state.clone());

    let doc = config.get();
    let port = port_override.unwrap_or(doc.listen.port);
    let addr: SocketAddr = match format!("{}:{port}", doc.listen.host).parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("invalid listen address {}:{port}: {e}", doc.listen.host);
            return 2;
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("failed to bind {addr}: {e}");
            return 1;
        }
    };
    info!("cc-gw listening on {addr}");

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await;

    if let Err(e) = result {
        error!("server error: {e}");
        return 1;
    }
    0
}
