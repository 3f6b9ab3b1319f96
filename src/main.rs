// Category Supervisor: Agent Fleet Server
//
// This binary keeps the fleet server process alive: it restarts it with
// exponential backoff, probes its health endpoint and shuts it down
// gracefully on SIGINT/SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_agent_fleet::{ProcessSupervisor, SupervisorConfig, SupervisorEvent};

#[derive(Debug, Parser)]
#[command(name = "kodegen-fleet-supervisor", version, about)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Program to supervise (overrides the config file)
    #[arg(long)]
    command: Option<String>,

    /// Health endpoint port (overrides the config file)
    #[arg(long)]
    port: Option<u16>,

    /// Restart limit (overrides the config file)
    #[arg(long)]
    max_restarts: Option<u32>,

    /// Arguments passed to the supervised program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

impl Args {
    fn into_config(self) -> Result<SupervisorConfig> {
        let mut config = match &self.config {
            Some(path) => SupervisorConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => SupervisorConfig::default(),
        };

        if let Some(command) = self.command {
            config.command = command;
            config.args = self.args;
        } else if !self.args.is_empty() {
            config.args = self.args;
        }
        if let Some(port) = self.port {
            config.health_port = port;
        }
        if let Some(max_restarts) = self.max_restarts {
            config.max_restarts = max_restarts;
        }

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(unix)]
async fn terminate_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};
    let mut term = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    term.recv().await;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate_signal() -> Result<()> {
    std::future::pending::<()>().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config()?;
    log::info!(
        "Supervising `{} {}` (health {})",
        config.command,
        config.args.join(" "),
        config.health_url()
    );

    let supervisor = ProcessSupervisor::new(config)?;
    let mut events = supervisor.subscribe();
    supervisor.start().context("Failed to start supervised process")?;

    let exit_code = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for SIGINT")?;
            log::info!("Received SIGINT");
            0
        }
        result = terminate_signal() => {
            result?;
            log::info!("Received SIGTERM");
            0
        }
        () = async {
            while let Some(event) = events.recv().await {
                if let SupervisorEvent::RestartLimitExceeded { restart_count } = event {
                    log::error!("Giving up after {restart_count} restarts");
                    return;
                }
            }
        } => 1,
    };

    let outcome = supervisor.shutdown().await;
    if outcome.forced {
        log::warn!("Supervised process had to be killed");
    }

    std::process::exit(exit_code);
}
