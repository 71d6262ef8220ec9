// Textual wire codec for the SCRC UDP protocol.
//
// A datagram is a run of parenthesized groups with no separator between
// them: `(key v1 v2 ... vn)`. The server sends one group per sensor, the
// client replies with one group per control channel.

use itertools::Itertools;
use log::debug;

/// An ordered key -> values mapping decoded from (or encoded into) a
/// single datagram. Keys are unique; insertion order is preserved so an
/// encoded message is reproducible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    groups: Vec<(String, Vec<f32>)>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a group, replacing any existing group with the same key.
    pub fn push(&mut self, key: impl Into<String>, values: Vec<f32>) {
        let key = key.into();
        if let Some(existing) = self.groups.iter_mut().find(|(k, _)| *k == key) {
            existing.1 = values;
        } else {
            self.groups.push((key, values));
        }
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value of a group, for the scalar sensors.
    pub fn scalar(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|values| values.first().copied())
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Decode a raw datagram into its key -> values groups.
///
/// Unknown keys are kept so the mapping is complete. A token that does not
/// parse as a number is dropped from its group only; the rest of the
/// message still decodes. Text outside any parenthesized group is ignored,
/// which is how the `***identified***` style markers pass through.
pub fn decode(raw: &str) -> Message {
    let mut message = Message::new();
    for chunk in raw.split('(').skip(1) {
        let group = match chunk.split_once(')') {
            Some((group, _)) => group,
            // unterminated group, drop it
            None => continue,
        };
        let mut tokens = group.split_whitespace();
        let Some(key) = tokens.next() else {
            continue;
        };
        let values = tokens
            .filter_map(|token| match token.parse::<f32>() {
                Ok(value) => Some(value),
                Err(_) => {
                    debug!("dropping non-numeric token {token:?} in group {key:?}");
                    None
                }
            })
            .collect();
        message.push(key, values);
    }
    message
}

/// Encode a message back into the wire form.
///
/// Integral values render without a fractional part (gear, meta, the init
/// angles); everything else renders with four decimal digits, enough to
/// round-trip every control channel.
pub fn encode(message: &Message) -> String {
    message
        .groups()
        .map(|(key, values)| {
            let rendered = values.iter().map(|v| format_value(*v)).join(" ");
            if rendered.is_empty() {
                format!("({key})")
            } else {
                format!("({key} {rendered})")
            }
        })
        .join("")
}

fn format_value(value: f32) -> String {
    if value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{}", value as i64)
    } else {
        format!("{value:.4}")
    }
}
