//! Event matching
//!
//! Decides which registered hotkeys transition on a raw key event.
//! Modifier state is updated before matching, so an event that is itself a
//! modifier sees the modifier's new state.

use tracing::{debug, trace};

use super::dispatch::PendingCallback;
use super::keys::KeyCode;
use super::modifiers::{KeyState, ModifierState};
use super::registry::{Direction, HotkeyRegistry};

/// Matching state owned by the hook thread
#[derive(Debug, Default)]
pub struct Matcher {
    modifiers: ModifierState,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modifiers(&self) -> &ModifierState {
        &self.modifiers
    }

    /// Forget all held modifiers, used at hook start
    pub fn reset(&mut self) {
        self.modifiers.reset();
    }

    /// Process one raw key event, handing each firing callback to `fire`.
    ///
    /// Returns the number of callbacks handed off.
    pub fn handle_key(
        &mut self,
        registry: &HotkeyRegistry,
        code: KeyCode,
        state: KeyState,
        mut fire: impl FnMut(PendingCallback),
    ) -> usize {
        let is_modifier = self.modifiers.update(code, state);
        let held = self.modifiers.current_mask();
        trace!(%code, ?state, %held, "key event");

        let hotkeys = registry.read();
        let mut fired = 0;

        match state {
            KeyState::Pressed => {
                for hotkey in hotkeys.triggered_by(code) {
                    let binding = hotkey.binding();
                    if !held.contains(binding.modifiers) || hotkey.is_armed() {
                        continue;
                    }
                    hotkey.set_armed(true);
                    if let Some(callback) = hotkey.callback(Direction::Down) {
                        debug!(%binding, "hotkey down");
                        fire(PendingCallback::new(binding, Direction::Down, callback.clone()));
                        fired += 1;
                    }
                }
            }
            KeyState::Released => {
                for hotkey in hotkeys.triggered_by(code) {
                    let binding = hotkey.binding();
                    if let Some(callback) = hotkey.callback(Direction::Up) {
                        debug!(%binding, "hotkey up");
                        fire(PendingCallback::new(binding, Direction::Up, callback.clone()));
                        fired += 1;
                    }
                    hotkey.set_armed(false);
                }

                // A released modifier breaks every combo that required it
                if is_modifier {
                    for hotkey in hotkeys.iter() {
                        if hotkey.is_armed() && !held.contains(hotkey.binding().modifiers) {
                            hotkey.set_armed(false);
                            trace!(binding = %hotkey.binding(), "hotkey disarmed by modifier release");
                        }
                    }
                }
            }
        }

        fired
    }
}
