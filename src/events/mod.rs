//! Structured records emitted by the daemon
//!
//! Each line hotkeyd writes to stdout is one of these, serialized as JSON.

use serde::{Deserialize, Serialize};

use crate::hotkey::{Binding, Direction, Fingerprint};

/// Daemon output events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// Hook is live and hotkeys can fire
    EngineStarted {
        /// Number of registered bindings
        bindings: usize,
    },

    /// A registered hotkey matched
    HotkeyFired(HotkeyFired),

    /// Hook removed
    EngineStopped,
}

/// One matched hotkey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotkeyFired {
    /// Accelerator form, e.g. `Shift+Ctrl+KeyH`
    pub accelerator: String,
    pub direction: Direction,
    pub fingerprint: Fingerprint,
}

impl HotkeyFired {
    pub fn new(binding: Binding, direction: Direction) -> Self {
        Self {
            accelerator: binding.to_string(),
            direction,
            fingerprint: binding.fingerprint(),
        }
    }
}

impl From<HotkeyFired> for DaemonEvent {
    fn from(fired: HotkeyFired) -> Self {
        DaemonEvent::HotkeyFired(fired)
    }
}

impl std::fmt::Display for DaemonEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEvent::EngineStarted { bindings } => {
                write!(f, "ENGINE_STARTED ({} bindings)", bindings)
            }
            DaemonEvent::HotkeyFired(fired) => {
                write!(f, "HOTKEY_FIRED {} {}", fired.accelerator, fired.direction)
            }
            DaemonEvent::EngineStopped => write!(f, "ENGINE_STOPPED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::{KeyCode, ModifierMask};

    #[test]
    fn test_hotkey_fired_serialization() {
        let binding = Binding::new(KeyCode::H, ModifierMask::CONTROL | ModifierMask::SHIFT);
        let event: DaemonEvent = HotkeyFired::new(binding, Direction::Down).into();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"hotkey_fired""#));
        assert!(json.contains("Shift+Ctrl+KeyH"));
        assert_eq!(event.to_string(), "HOTKEY_FIRED Shift+Ctrl+KeyH down");
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"engine_started","bindings":2}"#;
        let event: DaemonEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event, DaemonEvent::EngineStarted { bindings: 2 });
    }
}
