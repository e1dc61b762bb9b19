//! Session engine tests against a scripted in-memory transport.
//!
//! Tests run on a paused tokio clock so receive periods elapse instantly while
//! send times stay observable.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use racing_wheel_scr_control::prelude::*;
use racing_wheel_scr_protocol::{ControlCommand, TelemetryFrame, decode};
use racing_wheel_scr_session::{
    SessionConfig, SessionEngine, SessionError, SessionState, TickObserver, Transport,
    TransportError,
};
use tokio::time::Instant;

type TestResult = Result<(), Box<dyn std::error::Error>>;

const IDENTIFIED: &str = "***identified***";
const RESTART: &str = "***restart***";
const SHUTDOWN: &str = "***shutdown***";
const TELEMETRY: &str = "(angle 0.01)(rpm 4000)(speedX 50)(trackPos 0.1)";

enum Incoming {
    Datagram(String),
    Timeout,
    RecvError,
}

/// Replays a fixed script of receive results and records every send.
/// `Timeout` consumes the full receive period, `RecvError` returns at once.
/// Reports `Closed` once the script runs out.
struct ScriptedTransport {
    incoming: VecDeque<Incoming>,
    sent: Vec<String>,
    sent_at: Vec<Instant>,
    fail_sends_after: Option<usize>,
}

impl ScriptedTransport {
    fn new(script: Vec<Incoming>) -> Self {
        Self {
            incoming: script.into(),
            sent: Vec::new(),
            sent_at: Vec::new(),
            fail_sends_after: None,
        }
    }

    fn handshakes(&self) -> usize {
        self.sent.iter().filter(|s| s.contains("(init ")).count()
    }

    fn handshake_times(&self) -> Vec<Instant> {
        self.sent
            .iter()
            .zip(&self.sent_at)
            .filter(|(s, _)| s.contains("(init "))
            .map(|(_, at)| *at)
            .collect()
    }

    fn commands(&self) -> Vec<&String> {
        self.sent.iter().filter(|s| !s.contains("(init ")).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.fail_sends_after.is_some_and(|limit| self.sent.len() >= limit) {
            return Err(TransportError::Io(std::io::Error::other("network down")));
        }
        self.sent.push(String::from_utf8_lossy(payload).into_owned());
        self.sent_at.push(Instant::now());
        Ok(())
    }

    async fn recv_timeout(&mut self, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        match self.incoming.pop_front() {
            Some(Incoming::Datagram(text)) => Ok(text.into_bytes()),
            Some(Incoming::Timeout) => {
                tokio::time::sleep(timeout).await;
                Err(TransportError::Timeout)
            }
            Some(Incoming::RecvError) => Err(TransportError::Io(std::io::Error::other(
                "connection refused",
            ))),
            None => Err(TransportError::Closed),
        }
    }
}

fn msg(text: &str) -> Incoming {
    Incoming::Datagram(text.to_string())
}

fn manual_pipeline() -> (Arc<ManualInput>, DrivePipeline) {
    let input = Arc::new(ManualInput::new());
    let policy = ManualPolicy::new(Arc::clone(&input), Stage::Unknown);
    (
        input,
        DrivePipeline::new(Box::new(policy), SmootherConfig::default()),
    )
}

fn engine(
    script: Vec<Incoming>,
    config: SessionConfig,
) -> (Arc<ManualInput>, SessionEngine<ScriptedTransport>) {
    let (input, pipeline) = manual_pipeline();
    (
        input,
        SessionEngine::new(ScriptedTransport::new(script), pipeline, config),
    )
}

#[tokio::test(start_paused = true)]
async fn handshake_resends_init_on_every_timeout() -> TestResult {
    let script = vec![
        Incoming::Timeout,
        Incoming::RecvError,
        Incoming::Timeout,
        msg(IDENTIFIED),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    let summary = engine.run().await?;

    assert_eq!(engine.transport().handshakes(), 4);
    assert_eq!(engine.state(), SessionState::Shutdown);
    assert_eq!(summary.commands_sent, 0);

    let first = engine.transport().sent.first().ok_or("nothing sent")?;
    assert!(first.starts_with("SCR(init -90 -75"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn immediate_receive_errors_do_not_speed_up_handshake() -> TestResult {
    let script = vec![
        Incoming::RecvError,
        Incoming::RecvError,
        Incoming::RecvError,
        Incoming::RecvError,
        msg(IDENTIFIED),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    let started = Instant::now();
    engine.run().await?;

    let times = engine.transport().handshake_times();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        if let [earlier, later] = pair {
            assert!(later.duration_since(*earlier) >= Duration::from_secs(1));
        }
    }
    assert!(started.elapsed() >= Duration::from_secs(4));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn immediate_receive_errors_while_driving_wait_out_the_period() -> TestResult {
    let script = vec![
        msg(IDENTIFIED),
        Incoming::RecvError,
        Incoming::RecvError,
        Incoming::RecvError,
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    let started = Instant::now();
    let summary = engine.run().await?;

    assert_eq!(summary.total_steps, 0);
    assert!(started.elapsed() >= Duration::from_secs(3));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_telemetry_datagram_gets_one_command() -> TestResult {
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(TELEMETRY),
        Incoming::Timeout,
        msg(TELEMETRY),
        msg(SHUTDOWN),
    ];
    let (input, mut engine) = engine(script, SessionConfig::default());
    input.press(DriveKey::Forward);
    let summary = engine.run().await?;

    assert_eq!(summary.total_steps, 3);
    assert_eq!(summary.commands_sent, 3);
    let commands = engine.transport().commands();
    assert_eq!(commands.len(), 3);

    let last = ControlCommand::from_message(&decode(commands.last().ok_or("no command")?))?;
    assert!((last.accel - 0.15).abs() < 1e-9);
    assert!(last.is_within_domain());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_at_last_episode_shuts_down() -> TestResult {
    let config = SessionConfig {
        max_episodes: 2,
        ..SessionConfig::default()
    };
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(RESTART),
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(RESTART),
        // Never reached: the second restart exhausts the budget.
        msg(IDENTIFIED),
    ];
    let (_input, mut engine) = engine(script, config);
    let summary = engine.run().await?;

    assert_eq!(engine.state(), SessionState::Shutdown);
    assert_eq!(summary.episodes, 2);
    assert_eq!(engine.episodes().completed(), 2);
    assert_eq!(engine.transport().handshakes(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn restart_resets_controller_state() -> TestResult {
    let config = SessionConfig {
        max_episodes: 3,
        ..SessionConfig::default()
    };
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(TELEMETRY),
        msg(RESTART),
        msg(IDENTIFIED),
        msg(SHUTDOWN),
    ];
    let (input, mut engine) = engine(script, config);
    input.press(DriveKey::Forward);
    input.shift_up();
    engine.run().await?;

    assert_eq!(*engine.pipeline().last_command(), ControlCommand::neutral());
    assert_eq!(input.gear(), 1);
    assert_eq!(engine.episodes().completed(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn step_limit_forces_meta_only_command() -> TestResult {
    let config = SessionConfig {
        max_steps: 2,
        ..SessionConfig::default()
    };
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(TELEMETRY),
        msg(TELEMETRY),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, config);
    engine.run().await?;

    let commands = engine.transport().commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands.get(1).map(|s| s.as_str()), Some("(meta 1)"));
    assert!(commands.first().is_some_and(|s| s.starts_with("(accel ")));
    assert!(commands.get(2).is_some_and(|s| s.starts_with("(accel ")));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn step_counter_ignores_timeouts() -> TestResult {
    let config = SessionConfig {
        max_steps: 2,
        ..SessionConfig::default()
    };
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        Incoming::Timeout,
        Incoming::Timeout,
        msg(TELEMETRY),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, config);
    engine.run().await?;

    let commands = engine.transport().commands();
    assert_eq!(commands.last().map(|s| s.as_str()), Some("(meta 1)"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unparseable_datagram_sends_nothing() -> TestResult {
    let script = vec![
        msg(IDENTIFIED),
        msg("garbage without groups"),
        msg(TELEMETRY),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    let summary = engine.run().await?;

    assert_eq!(summary.total_steps, 2);
    assert_eq!(summary.commands_sent, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn malformed_field_still_produces_command() -> TestResult {
    let script = vec![
        msg(IDENTIFIED),
        msg("(rpm abc)(track 1 2 3)(speedX 10)"),
        msg(SHUTDOWN),
    ];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    let summary = engine.run().await?;
    assert_eq!(summary.commands_sent, 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn send_failure_is_fatal() {
    let mut transport = ScriptedTransport::new(vec![msg(IDENTIFIED), msg(TELEMETRY)]);
    transport.fail_sends_after = Some(1);
    let (_input, pipeline) = manual_pipeline();
    let mut engine = SessionEngine::new(transport, pipeline, SessionConfig::default());

    let result = engine.run().await;
    assert!(matches!(result, Err(SessionError::Send(_))));
    assert_eq!(engine.transport().handshakes(), 1);
}

#[tokio::test(start_paused = true)]
async fn handshake_send_failure_is_fatal() {
    let mut transport = ScriptedTransport::new(vec![]);
    transport.fail_sends_after = Some(0);
    let (_input, pipeline) = manual_pipeline();
    let mut engine = SessionEngine::new(transport, pipeline, SessionConfig::default());

    assert!(matches!(engine.run().await, Err(SessionError::Send(_))));
}

#[tokio::test(start_paused = true)]
async fn closed_transport_stops_engine() {
    let script = vec![msg(IDENTIFIED), msg(TELEMETRY)];
    let (_input, mut engine) = engine(script, SessionConfig::default());
    assert!(matches!(
        engine.run().await,
        Err(SessionError::TransportClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn failing_model_never_stops_session() -> TestResult {
    let failing = |_features: &[f64]| -> Result<Vec<f64>, InferenceError> {
        Err(InferenceError::Backend("unavailable".to_string()))
    };
    let policy = ModelPolicy::new(Box::new(failing), Stage::Race);
    let pipeline = DrivePipeline::new(Box::new(policy), SmootherConfig::default());
    let script = vec![msg(IDENTIFIED), msg(TELEMETRY), msg(TELEMETRY), msg(SHUTDOWN)];
    let mut engine = SessionEngine::new(
        ScriptedTransport::new(script),
        pipeline,
        SessionConfig::default(),
    );
    let summary = engine.run().await?;

    assert_eq!(summary.commands_sent, 2);
    let last = engine.transport().commands().last().copied().ok_or("no command")?;
    let command = ControlCommand::from_message(&decode(last))?;
    assert!((command.brake - 0.2).abs() < 1e-9);
    assert_eq!(command.gear, 1);
    Ok(())
}

struct CountingObserver(Arc<AtomicU64>);

impl TickObserver for CountingObserver {
    fn on_tick(&mut self, step: u64, _frame: &TelemetryFrame, command: &ControlCommand) {
        assert!(command.is_within_domain());
        self.0.store(step, Ordering::Relaxed);
    }
}

#[tokio::test(start_paused = true)]
async fn observer_sees_every_tick() -> TestResult {
    let seen = Arc::new(AtomicU64::new(0));
    let script = vec![
        msg(IDENTIFIED),
        msg(TELEMETRY),
        msg(TELEMETRY),
        msg(TELEMETRY),
        msg(SHUTDOWN),
    ];
    let (_input, engine) = engine(script, SessionConfig::default());
    let mut engine = engine.with_observer(Box::new(CountingObserver(Arc::clone(&seen))));
    engine.run().await?;
    assert_eq!(seen.load(Ordering::Relaxed), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_episode_budget_never_handshakes() -> TestResult {
    let config = SessionConfig {
        max_episodes: 0,
        ..SessionConfig::default()
    };
    let (_input, mut engine) = engine(vec![msg(IDENTIFIED)], config);
    let summary = engine.run().await?;
    assert_eq!(engine.transport().handshakes(), 0);
    assert_eq!(summary.episodes, 0);
    Ok(())
}
