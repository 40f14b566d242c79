//! hotkey-engine: global keyboard hotkeys on a dedicated OS hook thread
//!
//! A [`HotkeyEngine`] owns a system-wide input hook running on its own
//! thread. Key events are matched against registered
//! (key, modifiers, direction) bindings, and matching callbacks are queued
//! to a [`DispatchQueue`] that the application drains on its own context.
//!
//! ```no_run
//! use std::sync::Arc;
//! use hotkey_engine::{HotkeyEngine, ManualHookSource, Modifiers};
//!
//! let (engine, mut queue) = HotkeyEngine::new(Arc::new(ManualHookSource::new()));
//! let ctrl = Modifiers { ctrl: true, ..Default::default() };
//! engine.register_hotkey("KeyC", ctrl, "down", || println!("copy"));
//! engine.start_hotkey_engine();
//! queue.run_blocking();
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod hook;
pub mod hotkey;
pub mod lifecycle;

pub use engine::{EngineConfig, HotkeyEngine, Modifiers};
pub use error::{EngineError, Result};
#[cfg(target_os = "macos")]
pub use hook::CgEventTapSource;
pub use hook::{HookError, HookEvent, HookSource, ManualHookHandle, ManualHookSource};
pub use hotkey::{Binding, Direction, DispatchQueue, KeyCode, ModifierMask};
