//! OS hook sources and the hook thread runner
//!
//! A [`HookSource`] produces raw, system-wide input events on whatever
//! thread calls [`HookSource::run`]. The [`HookRunner`] owns that thread
//! and feeds keyboard events into the matcher.

#[cfg(target_os = "macos")]
mod macos;
mod manual;
mod runner;

use std::sync::Arc;

#[cfg(target_os = "macos")]
pub use macos::CgEventTapSource;
pub use manual::{ManualHookHandle, ManualHookSource};
pub use runner::{HookRunner, RunnerState};

use crate::hotkey::KeyCode;

/// Raw events delivered by a hook source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookEvent {
    /// The hook is installed and delivering events
    HookEnabled,
    /// The hook has been removed; no further events follow
    HookDisabled,
    KeyPressed(KeyCode),
    KeyReleased(KeyCode),
    KeyTyped(KeyCode),
    MousePressed,
    MouseReleased,
    MouseClicked,
    MouseMoved,
    MouseDragged,
    MouseWheel,
}

/// Severity of a message emitted by a hook source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Receives raw events on the hook thread. Must return quickly.
pub type HookDispatcher = Arc<dyn Fn(HookEvent) + Send + Sync>;

/// Receives diagnostic messages from a hook source
pub type HookLogger = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Failures reported by a hook source
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HookError {
    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("hook source failed with status {0:#x}")]
    Status(i32),

    #[error("hook source exited without being stopped")]
    ExitedEarly,

    #[error("hook source error: {0}")]
    Other(String),
}

/// A system-wide input hook
///
/// `set_logger` and `set_dispatcher` are called once before every `run`.
/// `run` blocks the calling thread until `stop` is requested or the hook
/// fails, and must deliver [`HookEvent::HookEnabled`] once the hook is live.
/// `stop` is called from another thread and must make `run` return.
pub trait HookSource: Send + Sync + 'static {
    fn set_logger(&self, _logger: HookLogger) {}

    fn set_dispatcher(&self, dispatcher: HookDispatcher);

    fn run(&self) -> Result<(), HookError>;

    fn stop(&self);
}
