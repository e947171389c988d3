use anyhow::{Context, Result};
use arcade_launcher::{Launcher, LauncherConfig};
use arcade_monitoring::{KillStatus, LauncherEvent};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

/// Arcade kiosk launcher - closes games nobody is playing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Idle limit in seconds (overrides config)
    #[arg(long, value_name = "SECS", global = true)]
    idle_limit: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the configured games
    Games,
    /// Launch a game by catalog name or executable path and supervise it
    ///
    /// Every line read from stdin counts as user activity. Kill and idle
    /// notifications are written to stdout as JSON lines.
    Launch {
        /// Game name from the catalog, or a path to an executable
        game: String,
    },
}

/// How often the supervisor checks whether anything is still monitored.
const SUPERVISE_POLL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => LauncherConfig::load_from_file(path)?,
        None => LauncherConfig::default(),
    };

    if let Some(secs) = args.idle_limit {
        config.launcher.idle_limit = Duration::from_secs(secs);
        config
            .validate()
            .context("Invalid --idle-limit override")?;
    }

    initialize_logging(args.debug, &config.launcher.log_level)?;

    match args.command {
        Command::Games => list_games(&config),
        Command::Launch { game } => run_launch(&config, &game).await,
    }
}

fn list_games(config: &LauncherConfig) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for game in &config.games {
        writeln!(out, "{}\t{}", game.name, game.exe.display())?;
    }
    Ok(())
}

async fn run_launch(config: &LauncherConfig, game: &str) -> Result<()> {
    let path = match config.find_game(game) {
        Some(entry) => {
            info!("Resolved '{}' to {}", entry.name, entry.exe.display());
            entry.exe.clone()
        }
        None => PathBuf::from(game),
    };

    let launcher = Launcher::from_config(config);
    let mut events = launcher.events("stdout");

    let launched = launcher
        .launch(&path)
        .await
        .with_context(|| format!("Failed to launch {}", path.display()))?;
    info!(
        "Launched {} as {} (image: {})",
        path.display(),
        launched.key,
        launched.image_name
    );

    let shutdown_signal = setup_signal_handlers();
    tokio::pin!(shutdown_signal);

    let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut poll = tokio::time::interval(SUPERVISE_POLL);

    // Kill sequences that announced `attempting` but not yet `killed`.
    let mut pending_kills: HashSet<(String, Option<u32>)> = HashSet::new();

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => break,

            Some(event) = events.recv() => {
                track_kill(&mut pending_kills, &event);
                emit(&event)?;
            }

            line = stdin_lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    launcher.report_activity().await?;
                }
                Ok(None) => {
                    info!("Activity input closed");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read activity input: {}", e);
                    stdin_open = false;
                }
            },

            _ = poll.tick() => {
                if pending_kills.is_empty() && launcher.monitor_count().await? == 0 {
                    info!("No game is running any more");
                    break;
                }
            }
        }
    }

    info!("Shutting down launcher...");
    let cleared = launcher.shutdown().await?;
    info!("Launcher shut down ({} monitor(s) cleared)", cleared);

    while let Ok(event) = events.try_recv() {
        emit(&event)?;
    }
    Ok(())
}

fn track_kill(pending: &mut HashSet<(String, Option<u32>)>, event: &LauncherEvent) {
    if let LauncherEvent::Kill(notification) = event {
        let id = (notification.exe_path.clone(), notification.pid);
        match notification.status {
            KillStatus::Attempting => {
                pending.insert(id);
            }
            KillStatus::Killed => {
                pending.remove(&id);
            }
        }
    }
}

fn emit(event: &LauncherEvent) -> Result<()> {
    let line = serde_json::to_string(event)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", line)?;
    out.flush()?;
    Ok(())
}

fn initialize_logging(debug: bool, config_level: &str) -> Result<()> {
    let level = if debug { "debug" } else { config_level };

    // stdout carries the event stream, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    Ok(())
}

async fn setup_signal_handlers() {
    use tokio::signal;

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to create SIGTERM handler");
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("Failed to create SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM signal");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT signal");
            }
        }
    }

    #[cfg(windows)]
    {
        let _ = signal::ctrl_c().await;
        info!("Received Ctrl+C signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arcade_monitoring::KillNotification;

    fn kill(status: KillStatus) -> LauncherEvent {
        LauncherEvent::Kill(KillNotification {
            exe_path: "/games/foo.exe".to_string(),
            pid: Some(7),
            idle_sec: 120,
            status,
        })
    }

    #[test]
    fn test_track_kill_pairs_phases() {
        let mut pending = HashSet::new();
        track_kill(&mut pending, &kill(KillStatus::Attempting));
        assert_eq!(pending.len(), 1);
        track_kill(&mut pending, &kill(KillStatus::Killed));
        assert!(pending.is_empty());
    }

    #[test]
    fn test_args_parse_launch() {
        let args = Args::try_parse_from([
            "arcade-kiosk",
            "launch",
            "Foo",
            "--idle-limit",
            "30",
            "--config",
            "arcade.yaml",
        ])
        .unwrap();
        assert_eq!(args.idle_limit, Some(30));
        assert_eq!(args.config, Some(PathBuf::from("arcade.yaml")));
        assert!(matches!(args.command, Command::Launch { game } if game == "Foo"));
    }
}
