//! Modifier state tracking
//!
//! Tracks the eight physical modifier keys individually and exposes them
//! as a side-agnostic [`ModifierMask`].

use super::keys::{KeyCode, Modifier, ModifierMask};

/// Press state of a physical key, as reported by the hook source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

impl KeyState {
    pub fn is_pressed(self) -> bool {
        self == KeyState::Pressed
    }
}

/// Tracks which physical modifier keys are currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Indexed by `slot()`: Shift, Control, Alt, Meta, each left then right
    pressed: [bool; 8],
}

impl ModifierState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press or release. Returns false for non-modifier keys.
    pub fn update(&mut self, code: KeyCode, state: KeyState) -> bool {
        match slot(code) {
            Some(index) => {
                self.pressed[index] = state.is_pressed();
                true
            }
            None => false,
        }
    }

    /// Logical mask: a modifier is held if either side is held
    pub fn current_mask(&self) -> ModifierMask {
        let mut mask = ModifierMask::NONE;
        for (i, modifier) in Modifier::ALL.into_iter().enumerate() {
            if self.pressed[i * 2] || self.pressed[i * 2 + 1] {
                mask.insert(modifier.mask());
            }
        }
        mask
    }

    /// Whether a specific physical modifier key is held
    pub fn is_pressed(&self, code: KeyCode) -> bool {
        slot(code).map(|i| self.pressed[i]).unwrap_or(false)
    }

    /// Check if all modifiers are released
    pub fn is_empty(&self) -> bool {
        self.pressed.iter().all(|p| !p)
    }

    /// Release everything
    pub fn reset(&mut self) {
        self.pressed = [false; 8];
    }
}

fn slot(code: KeyCode) -> Option<usize> {
    let modifier = code.modifier()?;
    let base = match modifier {
        Modifier::Shift => 0,
        Modifier::Control => 2,
        Modifier::Alt => 4,
        Modifier::Meta => 6,
    };
    let (left, _) = modifier.keys();
    Some(if code == left { base } else { base + 1 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state = ModifierState::default();
        assert!(state.is_empty());
        assert_eq!(state.current_mask(), ModifierMask::NONE);
    }

    #[test]
    fn test_non_modifier_is_ignored() {
        let mut state = ModifierState::new();
        assert!(!state.update(KeyCode::C, KeyState::Pressed));
        assert!(state.is_empty());
    }

    #[test]
    fn test_either_side_sets_logical_modifier() {
        let mut state = ModifierState::new();
        state.update(KeyCode::CONTROL_RIGHT, KeyState::Pressed);
        assert_eq!(state.current_mask(), ModifierMask::CONTROL);

        state.update(KeyCode::SHIFT_LEFT, KeyState::Pressed);
        assert_eq!(
            state.current_mask(),
            ModifierMask::CONTROL | ModifierMask::SHIFT
        );
        assert!(state.is_pressed(KeyCode::CONTROL_RIGHT));
        assert!(!state.is_pressed(KeyCode::CONTROL_LEFT));
    }

    #[test]
    fn test_sides_are_tracked_independently() {
        let mut state = ModifierState::new();
        state.update(KeyCode::ALT_LEFT, KeyState::Pressed);
        state.update(KeyCode::ALT_RIGHT, KeyState::Pressed);

        // Releasing one side keeps the logical modifier held
        state.update(KeyCode::ALT_LEFT, KeyState::Released);
        assert_eq!(state.current_mask(), ModifierMask::ALT);

        state.update(KeyCode::ALT_RIGHT, KeyState::Released);
        assert_eq!(state.current_mask(), ModifierMask::NONE);
    }

    #[test]
    fn test_reset() {
        let mut state = ModifierState::new();
        state.update(KeyCode::META_LEFT, KeyState::Pressed);
        state.update(KeyCode::SHIFT_RIGHT, KeyState::Pressed);
        state.reset();
        assert!(state.is_empty());
    }
}
