//! Control events understood by teleprompter viewers.
//!
//! The hub itself forwards payloads verbatim; this type only exists at the
//! edges (CLI, watcher, logging) where knowing the event is useful.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlEvent {
    /// Script content changed; viewers should refetch it.
    Reload,
    /// Jump to the block at `index`.
    Goto { index: u64 },
    Next,
    Prev,
    Reset,
    /// Toggle focus mode on or off.
    Focus { enabled: bool },
    /// Any other payload, forwarded untouched.
    #[serde(skip)]
    Other(Value),
}

impl ControlEvent {
    /// Classify a raw payload. Unknown or ill-formed shapes become `Other`.
    pub fn classify(value: &Value) -> Self {
        serde_json::from_value::<ControlEvent>(value.clone())
            .unwrap_or_else(|_| ControlEvent::Other(value.clone()))
    }

    /// The `type` tag, or `None` for payloads without a string tag.
    pub fn kind(&self) -> Option<&str> {
        match self {
            ControlEvent::Reload => Some("reload"),
            ControlEvent::Goto { .. } => Some("goto"),
            ControlEvent::Next => Some("next"),
            ControlEvent::Prev => Some("prev"),
            ControlEvent::Reset => Some("reset"),
            ControlEvent::Focus { .. } => Some("focus"),
            ControlEvent::Other(value) => value.get("type").and_then(Value::as_str),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            ControlEvent::Other(value) => value.clone(),
            known => serde_json::to_value(known).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_known_events() {
        assert_eq!(ControlEvent::classify(&json!({"type": "next"})), ControlEvent::Next);
        assert_eq!(
            ControlEvent::classify(&json!({"type": "goto", "index": 3})),
            ControlEvent::Goto { index: 3 }
        );
        assert_eq!(
            ControlEvent::classify(&json!({"type": "focus", "enabled": true})),
            ControlEvent::Focus { enabled: true }
        );
    }

    #[test]
    fn test_classify_unknown_is_passthrough() {
        let raw = json!({"type": "confetti", "color": "red"});
        let event = ControlEvent::classify(&raw);

        assert_eq!(event, ControlEvent::Other(raw.clone()));
        assert_eq!(event.kind(), Some("confetti"));
        assert_eq!(event.to_value(), raw);
    }

    #[test]
    fn test_goto_without_index_is_passthrough() {
        let raw = json!({"type": "goto"});
        assert_eq!(ControlEvent::classify(&raw), ControlEvent::Other(raw));
    }

    #[test]
    fn test_reload_wire_shape() {
        assert_eq!(ControlEvent::Reload.to_value(), json!({"type": "reload"}));
    }
}
