//! Shared manual input state.
//!
//! An input source (terminal key listener, test harness) mutates the
//! state from its own task while the control loop reads it once per tick. Each
//! key is an independent atomic flag; no cross-key consistency is needed because
//! each key's effect on the controls is independent.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use racing_wheel_scr_protocol::{GEAR_MAX, GEAR_MIN};
use tracing::debug;

/// Held-state keys that drive the manual controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriveKey {
    Forward,
    Backward,
    Left,
    Right,
}

/// Discrete event from an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press(DriveKey),
    Release(DriveKey),
    ShiftUp,
    ShiftDown,
}

/// Point-in-time copy of the held keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeySnapshot {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
}

impl KeySnapshot {
    pub fn with(mut self, key: DriveKey) -> Self {
        match key {
            DriveKey::Forward => self.forward = true,
            DriveKey::Backward => self.backward = true,
            DriveKey::Left => self.left = true,
            DriveKey::Right => self.right = true,
        }
        self
    }
}

/// Thread-safe key and gear state for manual driving.
#[derive(Debug)]
pub struct ManualInput {
    forward: AtomicBool,
    backward: AtomicBool,
    left: AtomicBool,
    right: AtomicBool,
    gear: AtomicI32,
}

impl Default for ManualInput {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualInput {
    /// All keys released, first gear.
    pub const fn new() -> Self {
        Self {
            forward: AtomicBool::new(false),
            backward: AtomicBool::new(false),
            left: AtomicBool::new(false),
            right: AtomicBool::new(false),
            gear: AtomicI32::new(1),
        }
    }

    fn flag(&self, key: DriveKey) -> &AtomicBool {
        match key {
            DriveKey::Forward => &self.forward,
            DriveKey::Backward => &self.backward,
            DriveKey::Left => &self.left,
            DriveKey::Right => &self.right,
        }
    }

    pub fn set_key(&self, key: DriveKey, pressed: bool) {
        self.flag(key).store(pressed, Ordering::Relaxed);
    }

    pub fn press(&self, key: DriveKey) {
        self.set_key(key, true);
    }

    pub fn release(&self, key: DriveKey) {
        self.set_key(key, false);
    }

    pub fn is_pressed(&self, key: DriveKey) -> bool {
        self.flag(key).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> KeySnapshot {
        KeySnapshot {
            forward: self.is_pressed(DriveKey::Forward),
            backward: self.is_pressed(DriveKey::Backward),
            left: self.is_pressed(DriveKey::Left),
            right: self.is_pressed(DriveKey::Right),
        }
    }

    /// Current manual gear counter, always within `[GEAR_MIN, GEAR_MAX]`.
    pub fn gear(&self) -> i32 {
        self.gear.load(Ordering::Relaxed)
    }

    /// Shift up one gear, saturating at [`GEAR_MAX`]. Returns the new gear.
    pub fn shift_up(&self) -> i32 {
        let gear = self.shift_by(1);
        debug!(gear, "Gear up");
        gear
    }

    /// Shift down one gear, saturating at [`GEAR_MIN`] (reverse). Returns the new gear.
    pub fn shift_down(&self) -> i32 {
        let gear = self.shift_by(-1);
        debug!(gear, "Gear down");
        gear
    }

    fn shift_by(&self, step: i32) -> i32 {
        let update = self
            .gear
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |gear| {
                let next = gear.saturating_add(step).clamp(GEAR_MIN, GEAR_MAX);
                (next != gear).then_some(next)
            });
        match update {
            Ok(previous) => previous.saturating_add(step).clamp(GEAR_MIN, GEAR_MAX),
            Err(unchanged) => unchanged,
        }
    }

    /// Put the gear counter back in first gear.
    pub fn reset_gear(&self) {
        self.gear.store(1, Ordering::Relaxed);
    }

    pub fn apply(&self, event: InputEvent) {
        match event {
            InputEvent::Press(key) => self.press(key),
            InputEvent::Release(key) => self.release(key),
            InputEvent::ShiftUp => {
                self.shift_up();
            }
            InputEvent::ShiftDown => {
                self.shift_down();
            }
        }
    }
}
