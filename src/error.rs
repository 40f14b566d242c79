//! Error types for the hotkey engine
//!
//! User errors are recoverable and surface as `false` from the boolean host
//! API. Startup errors come back from [`HookRunner::start`](crate::hook::HookRunner::start)
//! and leave the engine stopped.

use crate::hook::HookError;

/// Errors returned by registry, runner and engine operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("unknown key name: {0}")]
    UnknownKey(String),

    #[error("unknown modifier name: {0}")]
    UnknownModifier(String),

    #[error("invalid hotkey direction: {0} (expected \"down\" or \"up\")")]
    InvalidDirection(String),

    #[error("invalid accelerator: {0}")]
    InvalidAccelerator(String),

    #[error("hotkey is already registered for this direction")]
    AlreadyRegistered,

    #[error("no hotkey is registered for this binding")]
    NotFound,

    #[error("hotkey has no callback bound for this direction")]
    NotBound,

    #[error("hotkey engine is already running")]
    AlreadyRunning,

    #[error("hotkey engine is not running")]
    NotRunning,

    #[error("failed to spawn hook thread: {0}")]
    ThreadSpawn(String),

    #[error("failed to enable hook source: {0}")]
    HookEnable(HookError),
}

impl EngineError {
    /// Caller mistakes: bad names, duplicate or missing bindings, wrong lifecycle state
    pub fn is_user_error(&self) -> bool {
        !self.is_startup_error()
    }

    /// Failures bringing up the hook thread; the engine stays stopped and may be retried
    pub fn is_startup_error(&self) -> bool {
        matches!(self, EngineError::ThreadSpawn(_) | EngineError::HookEnable(_))
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(EngineError::AlreadyRegistered.is_user_error());
        assert!(EngineError::NotRunning.is_user_error());
        assert!(EngineError::UnknownKey("Foo".into()).is_user_error());
        assert!(EngineError::ThreadSpawn("oom".into()).is_startup_error());
        assert!(EngineError::HookEnable(HookError::EventTapCreation).is_startup_error());
        assert!(!EngineError::HookEnable(HookError::ExitedEarly).is_user_error());
    }

    #[test]
    fn test_error_messages() {
        let err = EngineError::UnknownKey("KeyÄ".into());
        assert_eq!(err.to_string(), "unknown key name: KeyÄ");
        let err = EngineError::HookEnable(HookError::Status(2));
        assert!(err.to_string().contains("0x2"));
    }
}
