//! Generic named signal carried over the event bus.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Well-known signal names published by the core.
pub mod names {
    pub const DIALOGUE_FINISHED: &str = "dialogue.finished";
    pub const CAMERA_ARRIVED: &str = "camera.arrived";
    pub const BEAT_FINISHED: &str = "beat.finished";
}

/// A named notification with a JSON payload.
///
/// Positional arguments (at most five in practice) are carried as a JSON array,
/// see [`Signal::with_args`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: String,
    #[serde(default)]
    pub payload: JsonValue,
}

impl Signal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: JsonValue::Null,
        }
    }

    pub fn with_payload(name: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn with_args<I>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = JsonValue>,
    {
        Self {
            name: name.into(),
            payload: JsonValue::Array(args.into_iter().collect()),
        }
    }

    /// Positional argument `index`, if the payload is an argument list.
    pub fn arg(&self, index: usize) -> Option<&JsonValue> {
        self.payload.as_array().and_then(|a| a.get(index))
    }

    /// Field lookup on an object payload.
    pub fn field(&self, key: &str) -> Option<&JsonValue> {
        self.payload.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn positional_args_round_through_payload() {
        let s = Signal::with_args("day.changed", [json!(3), json!("morning")]);
        assert_eq!(s.arg(0), Some(&json!(3)));
        assert_eq!(s.arg(1), Some(&json!("morning")));
        assert_eq!(s.arg(2), None);
        assert_eq!(s.field("day"), None);
    }
}
