//! Host-facing hotkey engine
//!
//! [`HotkeyEngine`] ties the registry, hook runner and dispatcher together
//! behind the API a host application or scripting layer calls. The boolean
//! methods report user errors as `false` (and log them); the `try_*`
//! methods return the underlying [`EngineError`].
//!
//! One engine per process is the intended use, since every engine installs
//! its own system-wide hook.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::hook::{HookRunner, HookSource, RunnerState};
use crate::hotkey::{
    dispatch_channel, Binding, Callback, Direction, DispatchQueue, HotkeyRegistry, KeyCode,
    ModifierMask,
};

/// Modifier flags as passed by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl From<Modifiers> for ModifierMask {
    fn from(m: Modifiers) -> Self {
        let mut mask = ModifierMask::NONE;
        if m.shift {
            mask |= ModifierMask::SHIFT;
        }
        if m.ctrl {
            mask |= ModifierMask::CONTROL;
        }
        if m.alt {
            mask |= ModifierMask::ALT;
        }
        if m.meta {
            mask |= ModifierMask::META;
        }
        mask
    }
}

/// Engine settings
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Name given to the hook thread
    pub hook_thread_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hook_thread_name: "hotkey-hook".to_string(),
        }
    }
}

/// Global hotkey engine
#[derive(Debug)]
pub struct HotkeyEngine {
    registry: Arc<HotkeyRegistry>,
    runner: HookRunner,
}

impl HotkeyEngine {
    /// Create an engine over `source`. Callbacks are delivered to the
    /// returned queue, which the application must drain.
    pub fn new(source: Arc<dyn HookSource>) -> (Self, DispatchQueue) {
        Self::with_config(source, EngineConfig::default())
    }

    pub fn with_config(source: Arc<dyn HookSource>, config: EngineConfig) -> (Self, DispatchQueue) {
        let registry = Arc::new(HotkeyRegistry::new());
        let (sender, queue) = dispatch_channel();
        let runner = HookRunner::new(source, Arc::clone(&registry), sender, config.hook_thread_name);
        (Self { registry, runner }, queue)
    }

    pub fn registry(&self) -> &HotkeyRegistry {
        &self.registry
    }

    pub fn state(&self) -> RunnerState {
        self.runner.state()
    }

    pub fn is_running(&self) -> bool {
        self.runner.is_running()
    }

    pub fn try_start(&self) -> Result<()> {
        self.runner.start()
    }

    pub fn try_stop(&self) -> Result<()> {
        self.runner.stop()
    }

    /// Start the hook. False if already running or the hook failed to start.
    pub fn start_hotkey_engine(&self) -> bool {
        self.try_start().is_ok()
    }

    /// Stop the hook. False if it was not running.
    pub fn stop_hotkey_engine(&self) -> bool {
        self.try_stop().is_ok()
    }

    pub fn try_register(&self, binding: Binding, direction: Direction, callback: Callback) -> Result<()> {
        self.registry.register(binding, direction, callback)
    }

    pub fn try_unregister(&self, binding: Binding, direction: Direction) -> Result<()> {
        self.registry.unregister(binding, direction)
    }

    /// Register `callback` for `key_name` with `modifiers` on `direction` (`"down"` or `"up"`)
    pub fn register_hotkey<F>(&self, key_name: &str, modifiers: Modifiers, direction: &str, callback: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        let result = resolve(key_name, modifiers, direction)
            .and_then(|(binding, direction)| self.try_register(binding, direction, Arc::new(callback)));
        report("register", key_name, direction, result)
    }

    pub fn unregister_hotkey(&self, key_name: &str, modifiers: Modifiers, direction: &str) -> bool {
        let result = resolve(key_name, modifiers, direction)
            .and_then(|(binding, direction)| self.try_unregister(binding, direction));
        report("unregister", key_name, direction, result)
    }

    /// Register `callback` for an accelerator string such as `Ctrl+Shift+KeyC`
    pub fn register_accelerator<F>(&self, accelerator: &str, direction: Direction, callback: F) -> Result<Binding>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let binding: Binding = accelerator.parse()?;
        self.try_register(binding, direction, Arc::new(callback))?;
        Ok(binding)
    }

    pub fn unregister_all_hotkeys(&self) {
        self.registry.unregister_all();
    }

    /// Stop the hook if running and drop every binding
    pub fn shutdown(self) {
        if self.runner.is_running() {
            let _ = self.runner.stop();
        }
        self.registry.unregister_all();
        info!("hotkey engine shut down");
    }
}

fn resolve(key_name: &str, modifiers: Modifiers, direction: &str) -> Result<(Binding, Direction)> {
    let key = KeyCode::from_name(key_name)?;
    let direction: Direction = direction.parse()?;
    Ok((Binding::new(key, modifiers.into()), direction))
}

fn report(action: &str, key_name: &str, direction: &str, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            warn!(action, key = key_name, direction, %err, "hotkey request rejected");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::hook::{HookError, ManualHookHandle, ManualHookSource};

    fn engine() -> (HotkeyEngine, DispatchQueue, ManualHookHandle) {
        let source = ManualHookSource::new();
        let handle = source.handle();
        let (engine, queue) = HotkeyEngine::new(Arc::new(source));
        (engine, queue, handle)
    }

    fn ctrl() -> Modifiers {
        Modifiers {
            ctrl: true,
            ..Default::default()
        }
    }

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let cb_hits = Arc::clone(&hits);
        (hits, move || {
            cb_hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_modifiers_to_mask() {
        let mask: ModifierMask = Modifiers {
            shift: true,
            ctrl: true,
            alt: false,
            meta: true,
        }
        .into();
        assert_eq!(mask, ModifierMask::SHIFT | ModifierMask::CONTROL | ModifierMask::META);
        assert_eq!(ModifierMask::from(Modifiers::default()), ModifierMask::NONE);
    }

    #[test]
    fn test_start_twice_and_stop_twice() {
        let (engine, _queue, _handle) = engine();
        assert!(engine.start_hotkey_engine());
        assert!(!engine.start_hotkey_engine());
        assert_eq!(engine.state(), RunnerState::Running);

        assert!(engine.stop_hotkey_engine());
        assert!(!engine.stop_hotkey_engine());
        assert_eq!(engine.state(), RunnerState::Stopped);
    }

    #[test]
    fn test_start_failure_reports_false_and_allows_retry() {
        let (engine, _queue, handle) = engine();
        handle.fail_next_run(HookError::Status(0x10));
        assert!(!engine.start_hotkey_engine());
        assert!(!engine.is_running());

        handle.fail_next_run(HookError::EventTapCreation);
        let err = engine.try_start().unwrap_err();
        assert!(err.is_startup_error());

        assert!(engine.start_hotkey_engine());
        assert!(engine.stop_hotkey_engine());
    }

    #[test]
    fn test_register_rejects_bad_input() {
        let (engine, _queue, _handle) = engine();
        assert!(!engine.register_hotkey("NoSuchKey", ctrl(), "down", || {}));
        assert!(!engine.register_hotkey("KeyC", ctrl(), "sideways", || {}));
        assert!(engine.registry().is_empty());

        assert!(engine.register_hotkey("KeyC", ctrl(), "down", || {}));
        assert!(!engine.register_hotkey("KeyC", ctrl(), "down", || {}));
        assert!(engine.register_hotkey("KeyC", ctrl(), "up", || {}));
        assert_eq!(engine.registry().len(), 1);
    }

    #[test]
    fn test_register_modifier_and_letter_names() {
        let (engine, mut queue, handle) = engine();
        let (hits, on_down) = counter();
        assert!(engine.register_hotkey("Shift", ctrl(), "down", on_down));
        assert!(engine.register_hotkey("OSLeft", Modifiers::default(), "down", || {}));
        assert!(engine.register_hotkey("A", ctrl(), "up", || {}));
        assert!(engine.start_hotkey_engine());

        handle.press(KeyCode::CONTROL_LEFT);
        handle.press(KeyCode::SHIFT_RIGHT);
        handle.release(KeyCode::SHIFT_RIGHT);
        handle.press(KeyCode::SHIFT_LEFT);
        handle.flush();
        assert!(engine.stop_hotkey_engine());

        assert_eq!(queue.drain(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unregister_hotkey() {
        let (engine, _queue, _handle) = engine();
        assert!(!engine.unregister_hotkey("KeyC", ctrl(), "down"));

        engine.register_hotkey("KeyC", ctrl(), "down", || {});
        engine.register_hotkey("KeyC", ctrl(), "up", || {});
        assert!(engine.unregister_hotkey("KeyC", ctrl(), "down"));
        assert!(!engine.unregister_hotkey("KeyC", ctrl(), "down"));

        let binding = Binding::new(KeyCode::C, ModifierMask::CONTROL);
        assert_eq!(engine.registry().bound_directions(binding), Some((false, true)));

        assert!(engine.unregister_hotkey("KeyC", ctrl(), "up"));
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_unregister_all_then_unregister_each_fails() {
        let (engine, _queue, _handle) = engine();
        let shift = Modifiers {
            shift: true,
            ..Default::default()
        };
        engine.register_hotkey("KeyC", ctrl(), "down", || {});
        engine.register_hotkey("KeyV", shift, "up", || {});
        engine.register_hotkey("F5", Modifiers::default(), "down", || {});

        engine.unregister_all_hotkeys();

        assert!(!engine.unregister_hotkey("KeyC", ctrl(), "down"));
        assert!(!engine.unregister_hotkey("KeyV", shift, "up"));
        assert!(!engine.unregister_hotkey("F5", Modifiers::default(), "down"));
        assert_eq!(
            engine.try_unregister(Binding::new(KeyCode::C, ModifierMask::CONTROL), Direction::Down),
            Err(EngineError::NotFound)
        );
    }

    #[test]
    fn test_end_to_end_down_and_up() {
        let (engine, mut queue, handle) = engine();
        let (down_hits, on_down) = counter();
        let (up_hits, on_up) = counter();
        assert!(engine.register_hotkey("KeyC", ctrl(), "down", on_down));
        assert!(engine.register_hotkey("KeyC", ctrl(), "up", on_up));
        assert!(engine.start_hotkey_engine());

        handle.press(KeyCode::CONTROL_LEFT);
        handle.flush();
        assert_eq!(queue.drain(), 0);

        handle.press(KeyCode::C);
        handle.flush();
        assert_eq!(queue.drain(), 1);
        assert_eq!(down_hits.load(Ordering::SeqCst), 1);

        handle.release(KeyCode::C);
        handle.flush();
        assert_eq!(queue.drain(), 1);
        assert_eq!(up_hits.load(Ordering::SeqCst), 1);

        handle.release(KeyCode::CONTROL_LEFT);
        handle.flush();
        assert_eq!(queue.drain(), 0);

        assert!(engine.stop_hotkey_engine());
        assert_eq!(down_hits.load(Ordering::SeqCst), 1);
        assert_eq!(up_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_register_while_running() {
        let (engine, mut queue, handle) = engine();
        assert!(engine.start_hotkey_engine());

        let (hits, on_down) = counter();
        let binding = engine
            .register_accelerator("Alt+F5", Direction::Down, on_down)
            .unwrap();
        assert_eq!(binding.modifiers, ModifierMask::ALT);

        handle.press(KeyCode::ALT_RIGHT);
        handle.press(binding.key);
        handle.flush();
        engine.shutdown();

        assert_eq!(queue.drain(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_events_after_stop_are_ignored() {
        let (engine, mut queue, handle) = engine();
        engine.register_hotkey("KeyV", Modifiers::default(), "down", || {});
        assert!(engine.start_hotkey_engine());
        assert!(engine.stop_hotkey_engine());

        assert!(!handle.press(KeyCode::V));
        assert_eq!(queue.drain(), 0);
    }
}
