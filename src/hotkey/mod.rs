//! Hotkey matching core
//!
//! Key code table, modifier tracking, the binding registry, the matcher
//! that runs on the hook thread, and the dispatch queue that carries
//! matched callbacks back to the application.

mod accelerator;
mod dispatch;
mod keys;
mod matcher;
mod modifiers;
mod registry;

pub use dispatch::{dispatch_channel, DispatchQueue, DispatchSender, PendingCallback};
pub use keys::{KeyCode, Modifier, ModifierMask};
pub use matcher::Matcher;
pub use modifiers::{KeyState, ModifierState};
pub use registry::{
    Binding, Callback, Direction, Fingerprint, Hotkey, HotkeyRegistry, RegistryReadGuard,
};
