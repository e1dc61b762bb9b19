//! Handshake and episode state machine.

use std::time::Duration;

use racing_wheel_scr_control::{DrivePipeline, Stage};
use racing_wheel_scr_protocol::{
    META_RESTART, ServerEvent, decode, decode_frame_lossy, default_rangefinder_angles, encode,
    encode_meta, handshake_message,
};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{SessionError, TransportError};
use crate::observer::{TickObserver, TracingObserver};
use crate::transport::Transport;

/// Receive timeout used when none is configured.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Options the engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub bot_id: String,
    /// Number of completed episodes after which the client stops.
    pub max_episodes: u32,
    /// Step at which the engine forces the episode to end; `0` disables it.
    pub max_steps: u64,
    pub receive_timeout: Duration,
    /// Passed through to the policy layer; logged only.
    pub stage: Stage,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bot_id: "SCR".to_string(),
            max_episodes: 1,
            max_steps: 0,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            stage: Stage::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingHandshake,
    Driving,
    /// An episode just ended; the engine decides between a new handshake and
    /// shutdown.
    Restarted,
    /// Terminal.
    Shutdown,
}

/// Completed episodes, bounded by the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeCounter {
    completed: u32,
    max: u32,
}

impl EpisodeCounter {
    pub fn new(max: u32) -> Self {
        Self { completed: 0, max }
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Record one finished episode. Returns `true` once the budget is spent.
    ///
    /// The count never exceeds the maximum.
    pub fn record(&mut self) -> bool {
        if self.completed < self.max {
            self.completed += 1;
        }
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.completed >= self.max
    }
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub episodes: u32,
    /// Datagrams processed while driving, across all episodes.
    pub total_steps: u64,
    pub commands_sent: u64,
}

/// Drives one client session over a [`Transport`].
pub struct SessionEngine<T: Transport> {
    transport: T,
    pipeline: DrivePipeline,
    observer: Box<dyn TickObserver>,
    config: SessionConfig,
    state: SessionState,
    episodes: EpisodeCounter,
    step: u64,
    summary: SessionSummary,
    handshake: String,
}

impl<T: Transport> SessionEngine<T> {
    pub fn new(transport: T, pipeline: DrivePipeline, config: SessionConfig) -> Self {
        let handshake = handshake_message(&config.bot_id, &default_rangefinder_angles());
        Self {
            transport,
            pipeline,
            observer: Box::new(TracingObserver),
            episodes: EpisodeCounter::new(config.max_episodes),
            config,
            state: SessionState::AwaitingHandshake,
            step: 0,
            summary: SessionSummary::default(),
            handshake,
        }
    }

    /// Replace the default [`TracingObserver`].
    pub fn with_observer(mut self, observer: Box<dyn TickObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn episodes(&self) -> &EpisodeCounter {
        &self.episodes
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn pipeline(&self) -> &DrivePipeline {
        &self.pipeline
    }

    /// Progress so far; equals what [`run`](Self::run) returns once it finishes.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            episodes: self.episodes.completed(),
            ..self.summary
        }
    }

    /// Run until the server shuts the race down or the episode budget is spent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] when a datagram cannot be sent and
    /// [`SessionError::TransportClosed`] when the transport stops delivering.
    pub async fn run(&mut self) -> Result<SessionSummary, SessionError> {
        if self.episodes.is_exhausted() {
            info!("Episode budget is zero, nothing to do");
            self.state = SessionState::Shutdown;
        }

        loop {
            self.state = match self.state {
                SessionState::AwaitingHandshake => self.handshake().await?,
                SessionState::Driving => self.drive_tick().await?,
                SessionState::Restarted => self.finish_episode(),
                SessionState::Shutdown => break,
            };
        }

        self.summary.episodes = self.episodes.completed();
        info!(
            episodes = self.summary.episodes,
            steps = self.summary.total_steps,
            commands = self.summary.commands_sent,
            "Session finished"
        );
        Ok(self.summary)
    }

    /// Send the init message and wait one receive period for the server to
    /// identify us.
    async fn handshake(&mut self) -> Result<SessionState, SessionError> {
        self.transport
            .send(self.handshake.as_bytes())
            .await
            .map_err(SessionError::Send)?;

        match self.receive().await {
            Ok(datagram) => {
                let text = String::from_utf8_lossy(&datagram);
                if ServerEvent::classify(&text) == ServerEvent::Identified {
                    info!(
                        bot_id = %self.config.bot_id,
                        stage = %self.config.stage,
                        episode = self.episodes.completed() + 1,
                        "Identified by server"
                    );
                    self.step = 0;
                    Ok(SessionState::Driving)
                } else {
                    debug!(message = %text, "Ignoring message while awaiting identification");
                    Ok(SessionState::AwaitingHandshake)
                }
            }
            Err(TransportError::Timeout) => {
                debug!("No response from server, resending init");
                Ok(SessionState::AwaitingHandshake)
            }
            Err(TransportError::Closed) => Err(SessionError::TransportClosed),
            Err(e) => {
                debug!("Receive failed during handshake: {e}");
                Ok(SessionState::AwaitingHandshake)
            }
        }
    }

    /// Receive one datagram and answer it.
    async fn drive_tick(&mut self) -> Result<SessionState, SessionError> {
        let datagram = match self.receive().await {
            Ok(datagram) => datagram,
            Err(TransportError::Timeout) => {
                warn!("No response from server");
                return Ok(SessionState::Driving);
            }
            Err(TransportError::Closed) => return Err(SessionError::TransportClosed),
            Err(e) => {
                warn!("Receive failed: {e}");
                return Ok(SessionState::Driving);
            }
        };

        let text = String::from_utf8_lossy(&datagram);
        match ServerEvent::classify(&text) {
            ServerEvent::Shutdown => {
                info!("Server shut the race down");
                self.pipeline.on_shutdown();
                return Ok(SessionState::Shutdown);
            }
            ServerEvent::Restart => {
                info!(step = self.step, "Server restarted the episode");
                self.pipeline.on_restart();
                return Ok(SessionState::Restarted);
            }
            ServerEvent::Identified | ServerEvent::Telemetry => {}
        }

        self.step += 1;
        self.summary.total_steps += 1;

        if self.config.max_steps != 0 && self.step == self.config.max_steps {
            info!(step = self.step, "Step limit reached, requesting episode end");
            self.send(encode_meta(META_RESTART)).await?;
            return Ok(SessionState::Driving);
        }

        let message = decode(&text);
        if message.is_empty() {
            debug!(step = self.step, "Unparseable datagram, no command sent");
            return Ok(SessionState::Driving);
        }

        let decoded = decode_frame_lossy(&message);
        for err in &decoded.errors {
            warn!(step = self.step, "Malformed telemetry field: {err}");
        }

        let command = self.pipeline.step(&decoded.frame);
        self.observer.on_tick(self.step, &decoded.frame, &command);
        self.send(encode(&command)).await?;
        Ok(SessionState::Driving)
    }

    /// Wait at most one receive period for a datagram.
    ///
    /// A receive that fails early still occupies the full period.
    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        let deadline = Instant::now() + self.config.receive_timeout;
        let result = self.transport.recv_timeout(self.config.receive_timeout).await;
        if matches!(result, Err(TransportError::Io(_) | TransportError::Resolve { .. })) {
            tokio::time::sleep_until(deadline).await;
        }
        result
    }

    fn finish_episode(&mut self) -> SessionState {
        if self.episodes.record() {
            info!(
                episodes = self.episodes.completed(),
                "Episode budget reached, shutting down"
            );
            SessionState::Shutdown
        } else {
            info!(
                episodes = self.episodes.completed(),
                max = self.episodes.max(),
                "Starting next episode"
            );
            SessionState::AwaitingHandshake
        }
    }

    async fn send(&mut self, payload: String) -> Result<(), SessionError> {
        trace!(%payload, "Sending");
        self.transport
            .send(payload.as_bytes())
            .await
            .map_err(SessionError::Send)?;
        self.summary.commands_sent += 1;
        Ok(())
    }
}
