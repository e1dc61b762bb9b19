//! Group codec for the SCR text format.
//!
//! Decoding is tolerant: anything that does not look like a `(key values...)`
//! group is skipped, and input with no groups at all yields an empty message.
//! Encoding emits fixed-point decimals only, since the server-side parser does
//! not understand scientific notation.

use std::collections::BTreeMap;

use crate::ControlCommand;
use crate::handshake::RANGEFINDER_COUNT;

/// Sentinel token meaning "no value for this field on this tick".
pub const UNKNOWN_VALUE: &str = "-";

/// A decoded datagram: group key mapped to its raw value tokens.
///
/// A key that appears twice keeps its last occurrence.
pub type WireMessage = BTreeMap<String, Vec<String>>;

/// Extract every `(key v1 ... vn)` group from `raw`.
///
/// A group is one or more non-parenthesis characters between a `(` and the next
/// `)`. The first whitespace-separated token is the key and must be an
/// identifier (`[A-Za-z0-9_]+`); groups with any other key are dropped.
pub fn decode(raw: &str) -> WireMessage {
    let mut message = WireMessage::new();
    let mut open: Option<usize> = None;

    for (idx, ch) in raw.char_indices() {
        match ch {
            '(' => open = Some(idx.saturating_add(1)),
            ')' => {
                if let Some(start) = open.take()
                    && let Some(body) = raw.get(start..idx)
                {
                    insert_group(&mut message, body);
                }
            }
            _ => {}
        }
    }

    message
}

fn insert_group(message: &mut WireMessage, body: &str) {
    let mut tokens = body.split_whitespace();
    let Some(key) = tokens.next() else {
        return;
    };
    if !is_identifier(key) {
        return;
    }
    let values = tokens.map(str::to_string).collect();
    message.insert(key.to_string(), values);
}

fn is_identifier(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Format a value for the wire: shortest round-trip decimal, never exponential.
pub(crate) fn format_value(value: f64) -> String {
    // Adding +0.0 folds -0.0 into 0.0 and leaves every other value untouched.
    let value = value + 0.0;
    format!("{value}")
}

/// Encode a control command in the fixed server order
/// `accel, brake, clutch, gear, steer, focus, meta`.
///
/// The codec never clips; callers hand it commands that are already in range.
pub fn encode(command: &ControlCommand) -> String {
    format!(
        "(accel {})(brake {})(clutch {})(gear {})(steer {})(focus {})(meta {})",
        format_value(command.accel),
        format_value(command.brake),
        format_value(command.clutch),
        command.gear,
        format_value(command.steer),
        command.focus,
        command.meta,
    )
}

/// Encode the rangefinder initialisation group `(init a0 ... a18)`.
pub fn encode_init(angles: &[f64; RANGEFINDER_COUNT]) -> String {
    let values: Vec<String> = angles.iter().copied().map(format_value).collect();
    format!("(init {})", values.join(" "))
}

/// Encode a bare meta group, e.g. `(meta 1)` to ask the server to end the episode.
pub fn encode_meta(meta: i32) -> String {
    format!("(meta {meta})")
}
