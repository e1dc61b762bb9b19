//! Client configuration: defaults, optional JSON file, command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use racing_wheel_scr_control::{InvalidStage, SmootherConfig, SmootherConfigError, Stage};
use racing_wheel_scr_session::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max_episodes must be at least 1")]
    ZeroEpisodes,
    #[error("receive_timeout_ms must be greater than 0")]
    ZeroTimeout,
    #[error("bot_id must not be empty")]
    EmptyBotId,
    #[error("host must not be empty")]
    EmptyHost,
    #[error("driver \"model\" requires model_path")]
    MissingModelPath,
    #[error(transparent)]
    Stage(#[from] InvalidStage),
    #[error("invalid smoother settings: {0}")]
    Smoother(#[from] SmootherConfigError),
}

/// Which policy drives the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DriverMode {
    /// Keys held in the terminal.
    #[default]
    Manual,
    /// Linear model loaded from `model_path`.
    Model,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub bot_id: String,
    pub max_episodes: u32,
    /// `0` means unlimited.
    pub max_steps: u64,
    /// Informational only.
    pub track: Option<String>,
    /// 0 warm-up, 1 qualifying, 2 race, 3 unknown.
    pub stage: u8,
    pub driver: DriverMode,
    pub model_path: Option<PathBuf>,
    pub receive_timeout_ms: u64,
    pub smoother: SmootherConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3001,
            bot_id: "SCR".to_string(),
            max_episodes: 1,
            max_steps: 0,
            track: None,
            stage: 3,
            driver: DriverMode::Manual,
            model_path: None,
            receive_timeout_ms: 1000,
            smoother: SmootherConfig::default(),
        }
    }
}

/// Values given on the command line; `None` keeps the file or default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub bot_id: Option<String>,
    pub max_episodes: Option<u32>,
    pub max_steps: Option<u64>,
    pub track: Option<String>,
    pub stage: Option<u8>,
    pub driver: Option<DriverMode>,
    pub model_path: Option<PathBuf>,
    pub receive_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Defaults, then the optional file, then the overrides; validated.
    pub async fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from_path(path).await?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            host,
            port,
            bot_id,
            max_episodes,
            max_steps,
            track,
            stage,
            driver,
            model_path,
            receive_timeout_ms,
        } = overrides;

        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(bot_id) = bot_id {
            self.bot_id = bot_id;
        }
        if let Some(max_episodes) = max_episodes {
            self.max_episodes = max_episodes;
        }
        if let Some(max_steps) = max_steps {
            self.max_steps = max_steps;
        }
        if track.is_some() {
            self.track = track;
        }
        if let Some(stage) = stage {
            self.stage = stage;
        }
        if let Some(driver) = driver {
            self.driver = driver;
        }
        if model_path.is_some() {
            self.model_path = model_path;
        }
        if let Some(timeout) = receive_timeout_ms {
            self.receive_timeout_ms = timeout;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if self.bot_id.is_empty() {
            return Err(ConfigError::EmptyBotId);
        }
        if self.max_episodes == 0 {
            return Err(ConfigError::ZeroEpisodes);
        }
        if self.receive_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.driver == DriverMode::Model && self.model_path.is_none() {
            return Err(ConfigError::MissingModelPath);
        }
        self.stage()?;
        self.smoother.validate()?;
        Ok(())
    }

    pub fn stage(&self) -> Result<Stage, ConfigError> {
        Ok(Stage::try_from(self.stage)?)
    }

    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        Ok(SessionConfig {
            bot_id: self.bot_id.clone(),
            max_episodes: self.max_episodes,
            max_steps: self.max_steps,
            receive_timeout: Duration::from_millis(self.receive_timeout_ms),
            stage: self.stage()?,
        })
    }
}
