//! scr-client - Simulated Car Racing championship client
//!
//! Connects to an SCR race server over UDP, identifies itself with a
//! rangefinder layout and drives the car either from keys held in the terminal
//! or from a trained model.

#![deny(static_mut_refs)]
#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod config;
mod keyboard;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use racing_wheel_scr_control::{DrivePipeline, LinearModel, ManualInput, ManualPolicy, ModelPolicy};
use racing_wheel_scr_session::{SessionEngine, SessionError, SessionSummary, UdpTransport};
use tokio::sync::oneshot;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{ClientConfig, ConfigError, ConfigOverrides, DriverMode};
use crate::keyboard::KeyboardListener;

#[derive(Parser, Debug)]
#[command(name = "scr-client")]
#[command(about = "Client for the Simulated Car Racing championship server")]
#[command(version)]
#[command(long_about = "
scr-client connects to a TORCS server patched with the SCR championship
protocol, performs the identification handshake and answers every telemetry
message with a control command.

In manual mode, hold keys in the terminal:
  w         throttle
  s         brake
  a / d     steer left / right
  e / q     shift up / down
  Esc       stop the client (Ctrl+C also works)
")]
struct Cli {
    /// Server host name or address
    #[arg(long)]
    host: Option<String>,

    /// Server UDP port
    #[arg(long)]
    port: Option<u16>,

    /// Bot identifier sent in the handshake
    #[arg(long = "id")]
    bot_id: Option<String>,

    /// Episodes to drive before exiting
    #[arg(long, alias = "maxEpisodes")]
    max_episodes: Option<u32>,

    /// Step at which each episode is ended (0 = never)
    #[arg(long, alias = "maxSteps")]
    max_steps: Option<u64>,

    /// Track name (informational)
    #[arg(long)]
    track: Option<String>,

    /// Race stage: 0 warm-up, 1 qualifying, 2 race, 3 unknown
    #[arg(long)]
    stage: Option<u8>,

    /// Driving policy
    #[arg(long, value_enum)]
    driver: Option<DriverMode>,

    /// Model file (JSON) for the model driver
    #[arg(long = "model")]
    model_path: Option<PathBuf>,

    /// Receive timeout in milliseconds
    #[arg(long)]
    receive_timeout_ms: Option<u64>,

    /// JSON configuration file; command-line flags take precedence
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            bot_id: self.bot_id.clone(),
            max_episodes: self.max_episodes,
            max_steps: self.max_steps,
            track: self.track.clone(),
            stage: self.stage,
            driver: self.driver,
            model_path: self.model_path.clone(),
            receive_timeout_ms: self.receive_timeout_ms,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(&cli).await {
        Ok(_summary) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn default_filter(level: &str) -> String {
    [
        "scr_client",
        "racing_wheel_scr_session",
        "racing_wheel_scr_control",
        "racing_wheel_scr_protocol",
    ]
    .iter()
    .map(|target| format!("{target}={level}"))
    .collect::<Vec<_>>()
    .join(",")
}

/// 2 = send failure, 3 = transport closed, 4 = invalid configuration, 1 otherwise.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(session) = err.downcast_ref::<SessionError>() {
        return match session {
            SessionError::Send(_) => 2,
            SessionError::TransportClosed => 3,
        };
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return 4;
    }
    1
}

async fn run(cli: &Cli) -> Result<SessionSummary> {
    let config = ClientConfig::resolve(cli.config.as_deref(), cli.overrides()).await?;
    log_startup(&config);

    let stage = config.stage()?;
    let mut keyboard = None;
    let mut quit = None;
    let pipeline = match config.driver {
        DriverMode::Manual => {
            let input = Arc::new(ManualInput::new());
            let (quit_tx, quit_rx) = oneshot::channel();
            keyboard = Some(
                KeyboardListener::spawn(Arc::clone(&input), quit_tx)
                    .context("Failed to capture the keyboard")?,
            );
            quit = Some(quit_rx);
            DrivePipeline::new(Box::new(ManualPolicy::new(input, stage)), config.smoother)
        }
        DriverMode::Model => {
            let path = config
                .model_path
                .as_deref()
                .ok_or(ConfigError::MissingModelPath)?;
            let model = LinearModel::load(path)
                .with_context(|| format!("Failed to load model: {}", path.display()))?;
            DrivePipeline::new(
                Box::new(ModelPolicy::new(Box::new(model), stage)),
                config.smoother,
            )
        }
    };

    let transport = UdpTransport::connect(&config.host, config.port)
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;

    let mut engine = SessionEngine::new(transport, pipeline, config.session_config()?);
    let finished = tokio::select! {
        result = engine.run() => Some(result),
        () = interrupted(quit) => None,
    };
    if let Some(mut keyboard) = keyboard {
        keyboard.stop();
    }
    let summary = match finished {
        Some(result) => result?,
        None => {
            warn!("Interrupted, stopping session");
            engine.summary()
        }
    };
    println!(
        "Session finished: {} episode(s), {} step(s), {} command(s) sent",
        summary.episodes, summary.total_steps, summary.commands_sent
    );
    Ok(summary)
}

/// Resolves on Ctrl+C, or when the keyboard listener reports a quit key.
async fn interrupted(quit: Option<oneshot::Receiver<()>>) {
    let keyboard = async move {
        if let Some(quit) = quit
            && quit.await.is_ok()
        {
            return;
        }
        std::future::pending::<()>().await
    };
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await
        }
    };
    tokio::select! {
        () = ctrl_c => {}
        () = keyboard => {}
    }
}

fn log_startup(config: &ClientConfig) {
    info!(host = %config.host, port = config.port, "Connecting to server");
    info!(
        bot_id = %config.bot_id,
        max_episodes = config.max_episodes,
        max_steps = config.max_steps,
        track = config.track.as_deref().unwrap_or("unknown"),
        stage = config.stage,
        driver = ?config.driver,
        "Session settings"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_parse_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["scr-client"])?;
        assert_eq!(cli.overrides(), ConfigOverrides::default());
        assert_eq!(cli.verbose, 0);
        assert!(cli.config.is_none());
        Ok(())
    }

    #[test]
    fn test_parse_connection_flags() -> TestResult {
        let cli = Cli::try_parse_from([
            "scr-client",
            "--host",
            "192.168.1.10",
            "--port",
            "3002",
            "--id",
            "BOT",
            "--max-episodes",
            "3",
            "--max-steps",
            "1000",
            "--stage",
            "2",
            "-vv",
        ])?;
        let overrides = cli.overrides();
        assert_eq!(overrides.host.as_deref(), Some("192.168.1.10"));
        assert_eq!(overrides.port, Some(3002));
        assert_eq!(overrides.bot_id.as_deref(), Some("BOT"));
        assert_eq!(overrides.max_episodes, Some(3));
        assert_eq!(overrides.max_steps, Some(1000));
        assert_eq!(overrides.stage, Some(2));
        assert_eq!(cli.verbose, 2);
        Ok(())
    }

    #[test]
    fn test_parse_camel_case_aliases() -> TestResult {
        let cli = Cli::try_parse_from(["scr-client", "--maxEpisodes", "4", "--maxSteps", "50"])?;
        assert_eq!(cli.max_episodes, Some(4));
        assert_eq!(cli.max_steps, Some(50));
        Ok(())
    }

    #[test]
    fn test_parse_model_driver() -> TestResult {
        let cli = Cli::try_parse_from(["scr-client", "--driver", "model", "--model", "m.json"])?;
        assert_eq!(cli.driver, Some(DriverMode::Model));
        assert_eq!(cli.model_path, Some(PathBuf::from("m.json")));
        Ok(())
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(Cli::try_parse_from(["scr-client", "--port", "99999"]).err().is_some());
    }

    #[test]
    fn test_exit_codes_follow_error_kind() {
        let send = anyhow::Error::new(SessionError::Send(
            racing_wheel_scr_session::TransportError::Closed,
        ));
        assert_eq!(exit_code(&send), 2);

        let closed = anyhow::Error::new(SessionError::TransportClosed).context("session");
        assert_eq!(exit_code(&closed), 3);

        let config = anyhow::Error::new(ConfigError::ZeroEpisodes);
        assert_eq!(exit_code(&config), 4);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }

    #[test]
    fn test_default_filter_covers_all_crates() {
        let filter = default_filter("info");
        assert!(filter.contains("scr_client=info"));
        assert!(filter.contains("racing_wheel_scr_session=info"));
    }
}
