//! Terminal key capture for manual driving.
//!
//! `w`/`s`/`a`/`d` are held keys (forward, backward, left, right); `e` shifts
//! up and `q` shifts down. Esc or Ctrl+C asks the client to stop.
//!
//! Keys are read in raw mode on a dedicated thread. Release events are
//! requested through the keyboard enhancement protocol; on terminals without
//! it a key counts as released once it stops auto-repeating.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use racing_wheel_scr_control::{DriveKey, InputEvent, ManualInput};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Without release events, a held key is dropped after this long without a
/// press or repeat. Longer than the usual initial auto-repeat delay.
const HOLD_TIMEOUT: Duration = Duration::from_millis(600);

/// What a single key event means to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Input(InputEvent),
    Quit,
}

fn drive_key(code: KeyCode) -> Option<DriveKey> {
    match code {
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => Some(DriveKey::Forward),
            's' => Some(DriveKey::Backward),
            'a' => Some(DriveKey::Left),
            'd' => Some(DriveKey::Right),
            _ => None,
        },
        _ => None,
    }
}

/// Map a terminal key event onto the manual controls.
///
/// Auto-repeat keeps a drive key pressed but does not repeat gear shifts.
pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('c' | 'C'));
    if ctrl_c || key.code == KeyCode::Esc {
        return (key.kind == KeyEventKind::Press).then_some(KeyAction::Quit);
    }

    if let Some(drive) = drive_key(key.code) {
        let event = match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => InputEvent::Press(drive),
            KeyEventKind::Release => InputEvent::Release(drive),
        };
        return Some(KeyAction::Input(event));
    }

    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('e' | 'E') => Some(KeyAction::Input(InputEvent::ShiftUp)),
        KeyCode::Char('q' | 'Q') => Some(KeyAction::Input(InputEvent::ShiftDown)),
        _ => None,
    }
}

/// Last time each held key was seen pressed or repeating.
#[derive(Debug, Default)]
struct HeldKeys {
    seen: Vec<(DriveKey, Instant)>,
}

impl HeldKeys {
    fn record(&mut self, event: InputEvent, now: Instant) {
        match event {
            InputEvent::Press(key) => match self.seen.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = now,
                None => self.seen.push((key, now)),
            },
            InputEvent::Release(key) => self.seen.retain(|(k, _)| *k != key),
            InputEvent::ShiftUp | InputEvent::ShiftDown => {}
        }
    }

    /// Release every key not seen within [`HOLD_TIMEOUT`] of `now`.
    fn release_stale(&mut self, input: &ManualInput, now: Instant) {
        self.seen.retain(|(key, at)| {
            let held = now.saturating_duration_since(*at) < HOLD_TIMEOUT;
            if !held {
                input.release(*key);
            }
            held
        });
    }
}

/// Raw mode, plus release reporting when the terminal supports it.
struct RawModeGuard {
    enhanced: bool,
}

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let enhanced = supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        Ok(Self { enhanced })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced
            && let Err(e) = execute!(io::stdout(), PopKeyboardEnhancementFlags)
        {
            warn!("Failed to restore keyboard mode: {e}");
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to leave raw mode: {e}");
        }
    }
}

/// Background thread feeding terminal keys into [`ManualInput`].
///
/// Dropping the listener stops the thread and restores the terminal.
#[derive(Debug)]
pub struct KeyboardListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyboardListener {
    /// Put the terminal in raw mode and start reading keys.
    ///
    /// `quit` fires when the user presses Esc or Ctrl+C.
    pub fn spawn(input: Arc<ManualInput>, quit: oneshot::Sender<()>) -> io::Result<Self> {
        let guard = RawModeGuard::enter()?;
        if guard.enhanced {
            debug!("Terminal reports key releases");
        } else {
            info!("Terminal does not report key releases, keys release when auto-repeat stops");
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let handle = std::thread::Builder::new()
            .name("scr-keyboard".to_string())
            .spawn(move || listen(&input, &thread_stop, quit, guard))?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop reading keys and wait for the terminal to be restored.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Keyboard thread panicked");
        }
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen(
    input: &ManualInput,
    stop: &AtomicBool,
    quit: oneshot::Sender<()>,
    guard: RawModeGuard,
) {
    let mut quit = Some(quit);
    let mut held = HeldKeys::default();

    while !stop.load(Ordering::Relaxed) {
        match event::poll(POLL_INTERVAL) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => match map_key(&key) {
                    Some(KeyAction::Input(event)) => {
                        debug!(?event, "Input event");
                        input.apply(event);
                        held.record(event, Instant::now());
                    }
                    Some(KeyAction::Quit) => {
                        info!("Stop requested from keyboard");
                        if let Some(quit) = quit.take()
                            && quit.send(()).is_err()
                        {
                            debug!("Client already stopping");
                        }
                    }
                    None => {}
                },
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read key event: {e}");
                    break;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("Failed to poll terminal: {e}");
                break;
            }
        }

        if !guard.enhanced {
            held.release_stale(input, Instant::now());
        }
    }

    drop(guard);
    debug!("Keyboard listener stopped");
}
