use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::{RwLock, broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use agentwatch_daemon::client::DaemonClient;
use agentwatch_daemon::orchestrator::Orchestrator;
use agentwatch_daemon::server::{DaemonServer, DaemonState, SharedState};
use agentwatch_daemon::sessions::default_projects_dir;
use agentwatch_daemon::settings::{default_settings_path, load_settings};
use agentwatch_daemon::status::{format_agents, format_ports, format_status};
use agentwatch_daemon::watcher::spawn_watcher;

#[derive(Parser)]
#[command(name = "agentwatch", about = "Local AI coding-agent monitor")]
struct Cli {
    /// Daemon socket path
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (default when no subcommand given)
    Daemon {
        /// Claude projects directory to scan and watch
        #[arg(long, env = "CLAUDE_PROJECTS_DIR")]
        projects_dir: Option<PathBuf>,

        /// Settings file path
        #[arg(long)]
        settings: Option<PathBuf>,
    },
    /// Show agents, ports, and the pending badge (one-shot)
    Status,
    /// List visible agents
    Agents {
        /// Print raw JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Force a scan tick, then list visible agents
    Refresh,
    /// List whitelisted listening ports
    Ports {
        /// Print raw JSON instead of the table
        #[arg(long)]
        json: bool,
    },
    /// Stream daemon push events to stdout
    Watch,
    /// Terminate the process behind an agent
    Kill {
        /// Agent id, e.g. claude-abc123
        agent_id: String,
    },
    /// Terminate the process listening on a port, by pid
    KillPort { pid: u32 },
}

/// `$XDG_RUNTIME_DIR/agentwatch.sock`, or `/tmp/agentwatch.sock` without one.
fn default_socket_path() -> PathBuf {
    match std::env::var("XDG_RUNTIME_DIR") {
        Ok(dir) => Path::new(&dir).join("agentwatch.sock"),
        Err(_) => PathBuf::from("/tmp/agentwatch.sock"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing. Respects RUST_LOG env var, defaults to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let socket = cli.socket.unwrap_or_else(default_socket_path);

    match cli.command {
        // Default to daemon when no subcommand is given.
        None | Some(Commands::Daemon { .. }) => {
            let (projects_dir, settings_path) = match cli.command {
                Some(Commands::Daemon {
                    projects_dir,
                    settings,
                }) => (projects_dir, settings),
                _ => (None, None),
            };
            run_daemon(
                socket,
                projects_dir.unwrap_or_else(default_projects_dir),
                settings_path.unwrap_or_else(default_settings_path),
            )
            .await?;
        }
        Some(Commands::Status) => {
            let mut client = connect(&socket).await?;
            let summary = client.get_status().await?;
            print!("{}", format_status(&summary, Utc::now()));
        }
        Some(Commands::Agents { json }) => {
            let mut client = connect(&socket).await?;
            let agents = client.get_agents().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else {
                print!("{}", format_agents(&agents, Utc::now()));
            }
        }
        Some(Commands::Refresh) => {
            let mut client = connect(&socket).await?;
            let agents = client.refresh_agents().await?;
            print!("{}", format_agents(&agents, Utc::now()));
        }
        Some(Commands::Ports { json }) => {
            let mut client = connect(&socket).await?;
            let ports = client.get_ports().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ports)?);
            } else {
                print!("{}", format_ports(&ports));
            }
        }
        Some(Commands::Watch) => {
            run_watch(&socket).await?;
        }
        Some(Commands::Kill { agent_id }) => {
            let mut client = connect(&socket).await?;
            if client.kill_agent(&agent_id).await? {
                println!("Sent SIGTERM to {agent_id}");
            } else {
                eprintln!("No killable process for {agent_id}");
                std::process::exit(1);
            }
        }
        Some(Commands::KillPort { pid }) => {
            let mut client = connect(&socket).await?;
            if client.kill_port(pid).await? {
                println!("Sent SIGTERM to pid {pid}");
            } else {
                eprintln!("Failed to signal pid {pid}");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn run_daemon(
    socket: PathBuf,
    projects_dir: PathBuf,
    settings_path: PathBuf,
) -> Result<()> {
    tracing::info!(
        socket = %socket.display(),
        projects = %projects_dir.display(),
        settings = %settings_path.display(),
        "starting agentwatch daemon"
    );

    // The projects directory may not exist before the first session; create
    // it so the watcher has something to attach to.
    tokio::fs::create_dir_all(&projects_dir).await?;

    let settings = Arc::new(RwLock::new(load_settings(&settings_path).await));

    // Command channel: server clients -> orchestrator.
    let (command_tx, command_rx) = mpsc::channel(64);
    // Scan nudges: watcher and kill follow-ups -> orchestrator. Capacity 1
    // so bursts coalesce into a single pending scan.
    let (scan_tx, scan_rx) = mpsc::channel(1);
    // Event broadcast: orchestrator -> server/clients.
    let (event_tx, _event_rx) = broadcast::channel(64);

    let shared: SharedState = Arc::new(RwLock::new(DaemonState::default()));
    let cancel = CancellationToken::new();

    let mut orchestrator = Orchestrator::with_cancel(
        projects_dir.clone(),
        Arc::clone(&settings),
        command_rx,
        scan_tx.clone(),
        scan_rx,
        event_tx.clone(),
        Arc::clone(&shared),
        cancel.clone(),
    );

    let server = DaemonServer::with_cancel(
        socket.clone(),
        shared,
        settings,
        settings_path,
        command_tx,
        event_tx,
        cancel.clone(),
    );

    // Filesystem watch is best-effort; polling covers its absence.
    let _watcher = match spawn_watcher(&projects_dir, scan_tx) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            tracing::warn!(error = %e, "filesystem watcher unavailable, relying on interval scans");
            None
        }
    };

    tokio::select! {
        _ = orchestrator.run() => {
            tracing::warn!("orchestrator exited unexpectedly");
        }
        result = server.run() => {
            match result {
                Ok(()) => tracing::warn!("server exited unexpectedly"),
                Err(e) => tracing::warn!("server error: {e}"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }
    cancel.cancel();

    // Cleanup: remove the socket file.
    if socket.exists()
        && let Err(e) = std::fs::remove_file(&socket)
    {
        tracing::warn!(path = %socket.display(), "failed to remove socket file: {e}");
    }

    tracing::info!("agentwatch daemon stopped");
    Ok(())
}

/// Connect to the daemon, with a hint when it is not running.
async fn connect(socket: &Path) -> Result<DaemonClient> {
    DaemonClient::connect(socket).await.map_err(|e| {
        eprintln!("Failed to connect to daemon at {}: {}", socket.display(), e);
        eprintln!("Is the daemon running? Start it with: agentwatch daemon");
        e.into()
    })
}

/// Subscribe and print push events until the daemon goes away.
async fn run_watch(socket: &Path) -> Result<()> {
    let mut client = connect(socket).await?;
    client.subscribe().await?;
    loop {
        let push = client.next_event().await?;
        println!("{} {}", push.method, push.params);
    }
}
