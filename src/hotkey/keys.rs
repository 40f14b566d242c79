//! Key code table and modifier masks
//!
//! Key codes use the libuiohook virtual code numbering (PC set-1 scan codes,
//! with `0x0E__` / `0xE0__` for extended keys). Platform hook sources
//! translate their native codes into this numbering before handing events
//! to the matcher.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Opaque identifier of a physical key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyCode(pub u16);

impl KeyCode {
    pub const ESCAPE: KeyCode = KeyCode(0x0001);
    pub const BACKSPACE: KeyCode = KeyCode(0x000E);
    pub const TAB: KeyCode = KeyCode(0x000F);
    pub const ENTER: KeyCode = KeyCode(0x001C);
    pub const SPACE: KeyCode = KeyCode(0x0039);

    pub const A: KeyCode = KeyCode(0x001E);
    pub const C: KeyCode = KeyCode(0x002E);
    pub const H: KeyCode = KeyCode(0x0023);
    pub const V: KeyCode = KeyCode(0x002F);

    pub const SHIFT_LEFT: KeyCode = KeyCode(0x002A);
    pub const SHIFT_RIGHT: KeyCode = KeyCode(0x0036);
    pub const CONTROL_LEFT: KeyCode = KeyCode(0x001D);
    pub const CONTROL_RIGHT: KeyCode = KeyCode(0x0E1D);
    pub const ALT_LEFT: KeyCode = KeyCode(0x0038);
    pub const ALT_RIGHT: KeyCode = KeyCode(0x0E38);
    pub const META_LEFT: KeyCode = KeyCode(0x0E5B);
    pub const META_RIGHT: KeyCode = KeyCode(0x0E5C);

    // Logical modifiers: bind either side. Hook sources never report these.
    pub const SHIFT: KeyCode = KeyCode(0xFF01);
    pub const CONTROL: KeyCode = KeyCode(0xFF02);
    pub const ALT: KeyCode = KeyCode(0xFF03);
    pub const META: KeyCode = KeyCode(0xFF04);

    #[cfg(target_os = "macos")]
    pub const COMMAND_OR_CONTROL: KeyCode = KeyCode::META;
    #[cfg(not(target_os = "macos"))]
    pub const COMMAND_OR_CONTROL: KeyCode = KeyCode::CONTROL;

    /// Look up a key by its symbolic name (`KeyA`, `F5`, `ArrowUp`, ...)
    pub fn from_name(name: &str) -> Result<KeyCode> {
        KEY_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, code)| *code)
            .ok_or_else(|| EngineError::UnknownKey(name.to_string()))
    }

    /// Canonical name of this key, if it is in the table
    pub fn name(self) -> Option<&'static str> {
        KEY_NAMES
            .iter()
            .find(|(_, code)| *code == self)
            .map(|(n, _)| *n)
    }

    /// Logical key a physical modifier also triggers (`ShiftRight` -> `Shift`)
    pub fn logical(self) -> Option<KeyCode> {
        self.modifier().map(Modifier::logical_key)
    }

    /// The logical modifier this physical key belongs to, if any
    pub fn modifier(self) -> Option<Modifier> {
        match self {
            KeyCode::SHIFT_LEFT | KeyCode::SHIFT_RIGHT => Some(Modifier::Shift),
            KeyCode::CONTROL_LEFT | KeyCode::CONTROL_RIGHT => Some(Modifier::Control),
            KeyCode::ALT_LEFT | KeyCode::ALT_RIGHT => Some(Modifier::Alt),
            KeyCode::META_LEFT | KeyCode::META_RIGHT => Some(Modifier::Meta),
            _ => None,
        }
    }
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "{:#06x}", self.0),
        }
    }
}

/// Key name table. The first entry for a code is its canonical name.
pub(crate) const KEY_NAMES: &[(&str, KeyCode)] = &[
    ("Escape", KeyCode(0x0001)),
    // Function keys
    ("F1", KeyCode(0x003B)),
    ("F2", KeyCode(0x003C)),
    ("F3", KeyCode(0x003D)),
    ("F4", KeyCode(0x003E)),
    ("F5", KeyCode(0x003F)),
    ("F6", KeyCode(0x0040)),
    ("F7", KeyCode(0x0041)),
    ("F8", KeyCode(0x0042)),
    ("F9", KeyCode(0x0043)),
    ("F10", KeyCode(0x0044)),
    ("F11", KeyCode(0x0057)),
    ("F12", KeyCode(0x0058)),
    ("F13", KeyCode(0x005B)),
    ("F14", KeyCode(0x005C)),
    ("F15", KeyCode(0x005D)),
    ("F16", KeyCode(0x0063)),
    ("F17", KeyCode(0x0064)),
    ("F18", KeyCode(0x0065)),
    ("F19", KeyCode(0x0066)),
    ("F20", KeyCode(0x0067)),
    ("F21", KeyCode(0x0068)),
    ("F22", KeyCode(0x0069)),
    ("F23", KeyCode(0x006A)),
    ("F24", KeyCode(0x006B)),
    // Digits row
    ("Backquote", KeyCode(0x0029)),
    ("1", KeyCode(0x0002)),
    ("2", KeyCode(0x0003)),
    ("3", KeyCode(0x0004)),
    ("4", KeyCode(0x0005)),
    ("5", KeyCode(0x0006)),
    ("6", KeyCode(0x0007)),
    ("7", KeyCode(0x0008)),
    ("8", KeyCode(0x0009)),
    ("9", KeyCode(0x000A)),
    ("0", KeyCode(0x000B)),
    ("Digit1", KeyCode(0x0002)),
    ("Digit2", KeyCode(0x0003)),
    ("Digit3", KeyCode(0x0004)),
    ("Digit4", KeyCode(0x0005)),
    ("Digit5", KeyCode(0x0006)),
    ("Digit6", KeyCode(0x0007)),
    ("Digit7", KeyCode(0x0008)),
    ("Digit8", KeyCode(0x0009)),
    ("Digit9", KeyCode(0x000A)),
    ("Digit0", KeyCode(0x000B)),
    ("Minus", KeyCode(0x000C)),
    ("Equal", KeyCode(0x000D)),
    ("Backspace", KeyCode(0x000E)),
    ("Tab", KeyCode(0x000F)),
    ("CapsLock", KeyCode(0x003A)),
    // Letters
    ("KeyA", KeyCode(0x001E)),
    ("KeyB", KeyCode(0x0030)),
    ("KeyC", KeyCode(0x002E)),
    ("KeyD", KeyCode(0x0020)),
    ("KeyE", KeyCode(0x0012)),
    ("KeyF", KeyCode(0x0021)),
    ("KeyG", KeyCode(0x0022)),
    ("KeyH", KeyCode(0x0023)),
    ("KeyI", KeyCode(0x0017)),
    ("KeyJ", KeyCode(0x0024)),
    ("KeyK", KeyCode(0x0025)),
    ("KeyL", KeyCode(0x0026)),
    ("KeyM", KeyCode(0x0032)),
    ("KeyN", KeyCode(0x0031)),
    ("KeyO", KeyCode(0x0018)),
    ("KeyP", KeyCode(0x0019)),
    ("KeyQ", KeyCode(0x0010)),
    ("KeyR", KeyCode(0x0013)),
    ("KeyS", KeyCode(0x001F)),
    ("KeyT", KeyCode(0x0014)),
    ("KeyU", KeyCode(0x0016)),
    ("KeyV", KeyCode(0x002F)),
    ("KeyW", KeyCode(0x0011)),
    ("KeyX", KeyCode(0x002D)),
    ("KeyY", KeyCode(0x0015)),
    ("KeyZ", KeyCode(0x002C)),
    // Punctuation
    ("BracketLeft", KeyCode(0x001A)),
    ("BracketRight", KeyCode(0x001B)),
    ("Backslash", KeyCode(0x002B)),
    ("Semicolon", KeyCode(0x0027)),
    ("Quote", KeyCode(0x0028)),
    ("Enter", KeyCode(0x001C)),
    ("Comma", KeyCode(0x0033)),
    ("Period", KeyCode(0x0034)),
    ("Slash", KeyCode(0x0035)),
    ("Space", KeyCode(0x0039)),
    // Editing and navigation
    ("PrintScreen", KeyCode(0x0E37)),
    ("ScrollLock", KeyCode(0x0046)),
    ("Pause", KeyCode(0x0E45)),
    ("Insert", KeyCode(0x0E52)),
    ("Delete", KeyCode(0x0E53)),
    ("Home", KeyCode(0x0E47)),
    ("End", KeyCode(0x0E4F)),
    ("PageUp", KeyCode(0x0E49)),
    ("PageDown", KeyCode(0x0E51)),
    ("ArrowUp", KeyCode(0xE048)),
    ("ArrowLeft", KeyCode(0xE04B)),
    ("ArrowRight", KeyCode(0xE04D)),
    ("ArrowDown", KeyCode(0xE050)),
    ("Up", KeyCode(0xE048)),
    ("Left", KeyCode(0xE04B)),
    ("Right", KeyCode(0xE04D)),
    ("Down", KeyCode(0xE050)),
    // Numeric pad
    ("NumLock", KeyCode(0x0045)),
    ("NumpadDivide", KeyCode(0x0E35)),
    ("NumpadMultiply", KeyCode(0x0037)),
    ("NumpadSubtract", KeyCode(0x004A)),
    ("NumpadEqual", KeyCode(0x0E0D)),
    ("NumpadAdd", KeyCode(0x004E)),
    ("NumpadEnter", KeyCode(0x0E1C)),
    ("NumpadDecimal", KeyCode(0x0053)),
    ("Numpad1", KeyCode(0x004F)),
    ("Numpad2", KeyCode(0x0050)),
    ("Numpad3", KeyCode(0x0051)),
    ("Numpad4", KeyCode(0x004B)),
    ("Numpad5", KeyCode(0x004C)),
    ("Numpad6", KeyCode(0x004D)),
    ("Numpad7", KeyCode(0x0047)),
    ("Numpad8", KeyCode(0x0048)),
    ("Numpad9", KeyCode(0x0049)),
    ("Numpad0", KeyCode(0x0052)),
    // Modifiers, usable as primary keys too
    ("ShiftLeft", KeyCode(0x002A)),
    ("ShiftRight", KeyCode(0x0036)),
    ("ControlLeft", KeyCode(0x001D)),
    ("ControlRight", KeyCode(0x0E1D)),
    ("AltLeft", KeyCode(0x0038)),
    ("AltRight", KeyCode(0x0E38)),
    ("MetaLeft", KeyCode(0x0E5B)),
    ("MetaRight", KeyCode(0x0E5C)),
    ("ContextMenu", KeyCode(0x0E5D)),
    ("OSLeft", KeyCode(0x0E5B)),
    ("OSRight", KeyCode(0x0E5C)),
    // Either side
    ("Shift", KeyCode::SHIFT),
    ("Control", KeyCode::CONTROL),
    ("Alt", KeyCode::ALT),
    ("Menu", KeyCode::ALT),
    ("Meta", KeyCode::META),
    ("Command", KeyCode::META),
    ("CommandOrControl", KeyCode::COMMAND_OR_CONTROL),
    // Bare letters
    ("A", KeyCode(0x001E)),
    ("B", KeyCode(0x0030)),
    ("C", KeyCode(0x002E)),
    ("D", KeyCode(0x0020)),
    ("E", KeyCode(0x0012)),
    ("F", KeyCode(0x0021)),
    ("G", KeyCode(0x0022)),
    ("H", KeyCode(0x0023)),
    ("I", KeyCode(0x0017)),
    ("J", KeyCode(0x0024)),
    ("K", KeyCode(0x0025)),
    ("L", KeyCode(0x0026)),
    ("M", KeyCode(0x0032)),
    ("N", KeyCode(0x0031)),
    ("O", KeyCode(0x0018)),
    ("P", KeyCode(0x0019)),
    ("Q", KeyCode(0x0010)),
    ("R", KeyCode(0x0013)),
    ("S", KeyCode(0x001F)),
    ("T", KeyCode(0x0014)),
    ("U", KeyCode(0x0016)),
    ("V", KeyCode(0x002F)),
    ("W", KeyCode(0x0011)),
    ("X", KeyCode(0x002D)),
    ("Y", KeyCode(0x0015)),
    ("Z", KeyCode(0x002C)),
    // Media
    ("MediaPlayPause", KeyCode(0xE022)),
    ("MediaStop", KeyCode(0xE024)),
    ("MediaTrackPrevious", KeyCode(0xE010)),
    ("MediaTrackNext", KeyCode(0xE019)),
];

/// The four logical modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    Shift,
    Control,
    Alt,
    Meta,
}

impl Modifier {
    pub const ALL: [Modifier; 4] = [
        Modifier::Shift,
        Modifier::Control,
        Modifier::Alt,
        Modifier::Meta,
    ];

    /// Bit for this modifier in a [`ModifierMask`]
    pub const fn mask(self) -> ModifierMask {
        match self {
            Modifier::Shift => ModifierMask::SHIFT,
            Modifier::Control => ModifierMask::CONTROL,
            Modifier::Alt => ModifierMask::ALT,
            Modifier::Meta => ModifierMask::META,
        }
    }

    /// Key code that matches either side of this modifier
    pub const fn logical_key(self) -> KeyCode {
        match self {
            Modifier::Shift => KeyCode::SHIFT,
            Modifier::Control => KeyCode::CONTROL,
            Modifier::Alt => KeyCode::ALT,
            Modifier::Meta => KeyCode::META,
        }
    }

    /// Physical (left, right) key codes for this modifier
    pub const fn keys(self) -> (KeyCode, KeyCode) {
        match self {
            Modifier::Shift => (KeyCode::SHIFT_LEFT, KeyCode::SHIFT_RIGHT),
            Modifier::Control => (KeyCode::CONTROL_LEFT, KeyCode::CONTROL_RIGHT),
            Modifier::Alt => (KeyCode::ALT_LEFT, KeyCode::ALT_RIGHT),
            Modifier::Meta => (KeyCode::META_LEFT, KeyCode::META_RIGHT),
        }
    }
}

/// Set of logical modifiers, side-agnostic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModifierMask(u8);

impl ModifierMask {
    pub const NONE: ModifierMask = ModifierMask(0);
    pub const SHIFT: ModifierMask = ModifierMask(0b0001);
    pub const CONTROL: ModifierMask = ModifierMask(0b0010);
    pub const ALT: ModifierMask = ModifierMask(0b0100);
    pub const META: ModifierMask = ModifierMask(0b1000);

    /// Platform primary shortcut modifier: Command on macOS, Control elsewhere
    #[cfg(target_os = "macos")]
    pub const COMMAND_OR_CONTROL: ModifierMask = ModifierMask::META;
    #[cfg(not(target_os = "macos"))]
    pub const COMMAND_OR_CONTROL: ModifierMask = ModifierMask::CONTROL;

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build a mask from raw bits, ignoring bits outside the four modifiers
    pub const fn from_bits_truncate(bits: u8) -> Self {
        ModifierMask(bits & 0b1111)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: ModifierMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: ModifierMask) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: ModifierMask) {
        self.0 &= !other.0;
    }

    /// Look up the mask bit for a modifier name
    pub fn from_name(name: &str) -> Result<ModifierMask> {
        let mask = match name.to_ascii_lowercase().as_str() {
            "shift" => ModifierMask::SHIFT,
            "control" | "ctrl" => ModifierMask::CONTROL,
            "alt" | "option" | "menu" => ModifierMask::ALT,
            "meta" | "command" | "cmd" | "super" | "win" | "osleft" => ModifierMask::META,
            "commandorcontrol" | "cmdorctrl" => ModifierMask::COMMAND_OR_CONTROL,
            _ => return Err(EngineError::UnknownModifier(name.to_string())),
        };
        Ok(mask)
    }

    /// Iterate the modifiers present in this mask
    pub fn iter(self) -> impl Iterator<Item = Modifier> {
        Modifier::ALL
            .into_iter()
            .filter(move |m| self.contains(m.mask()))
    }
}

impl std::ops::BitOr for ModifierMask {
    type Output = ModifierMask;

    fn bitor(self, rhs: ModifierMask) -> ModifierMask {
        ModifierMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ModifierMask {
    fn bitor_assign(&mut self, rhs: ModifierMask) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ModifierMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .iter()
            .map(|m| match m {
                Modifier::Shift => "Shift",
                Modifier::Control => "Ctrl",
                Modifier::Alt => "Alt",
                Modifier::Meta => "Meta",
            })
            .collect();
        write!(f, "{}", names.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_keys() {
        assert_eq!(KeyCode::from_name("KeyC").unwrap(), KeyCode::C);
        assert_eq!(KeyCode::from_name("Escape").unwrap(), KeyCode::ESCAPE);
        assert_eq!(KeyCode::from_name("F12").unwrap(), KeyCode(0x0058));
        assert_eq!(
            KeyCode::from_name("Digit7").unwrap(),
            KeyCode::from_name("7").unwrap()
        );
        assert_eq!(
            KeyCode::from_name("ArrowUp").unwrap(),
            KeyCode::from_name("Up").unwrap()
        );
    }

    #[test]
    fn test_lookup_unknown_key() {
        let err = KeyCode::from_name("Hyper").unwrap_err();
        assert_eq!(err, EngineError::UnknownKey("Hyper".into()));
        // Lookup is exact, not case-folded
        assert!(KeyCode::from_name("keyc").is_err());
    }

    #[test]
    fn test_canonical_name() {
        assert_eq!(KeyCode::C.name(), Some("KeyC"));
        assert_eq!(KeyCode::from_name("Digit3").unwrap().name(), Some("3"));
        assert_eq!(KeyCode(0x7777).name(), None);
        assert_eq!(KeyCode(0x7777).to_string(), "0x7777");
    }

    #[test]
    fn test_modifier_keys() {
        assert_eq!(KeyCode::SHIFT_RIGHT.modifier(), Some(Modifier::Shift));
        assert_eq!(KeyCode::META_LEFT.modifier(), Some(Modifier::Meta));
        assert_eq!(KeyCode::C.modifier(), None);
    }

    #[test]
    fn test_modifier_and_letter_aliases() {
        assert_eq!(KeyCode::from_name("A").unwrap(), KeyCode::A);
        assert_eq!(KeyCode::from_name("Z").unwrap(), KeyCode::from_name("KeyZ").unwrap());
        assert_eq!(KeyCode::from_name("OSLeft").unwrap(), KeyCode::META_LEFT);
        assert_eq!(KeyCode::from_name("OSRight").unwrap(), KeyCode::META_RIGHT);
        assert_eq!(KeyCode::from_name("Shift").unwrap(), KeyCode::SHIFT);
        assert_eq!(KeyCode::from_name("Control").unwrap(), KeyCode::CONTROL);
        assert_eq!(KeyCode::from_name("Menu").unwrap(), KeyCode::ALT);
        assert_eq!(KeyCode::from_name("Command").unwrap(), KeyCode::META);
        assert_eq!(
            KeyCode::from_name("CommandOrControl").unwrap(),
            KeyCode::COMMAND_OR_CONTROL
        );
        // Aliases never become the display name
        assert_eq!(KeyCode::A.name(), Some("KeyA"));
        assert_eq!(KeyCode::META_LEFT.name(), Some("MetaLeft"));
        assert_eq!(KeyCode::ALT.name(), Some("Alt"));
    }

    #[test]
    fn test_logical_modifier_keys() {
        assert_eq!(KeyCode::SHIFT_LEFT.logical(), Some(KeyCode::SHIFT));
        assert_eq!(KeyCode::SHIFT_RIGHT.logical(), Some(KeyCode::SHIFT));
        assert_eq!(KeyCode::CONTROL_RIGHT.logical(), Some(KeyCode::CONTROL));
        assert_eq!(KeyCode::META_LEFT.logical(), Some(KeyCode::META));
        assert_eq!(KeyCode::C.logical(), None);
        // Logical codes are not physical keys
        assert_eq!(KeyCode::SHIFT.modifier(), None);
        assert_eq!(KeyCode::SHIFT.logical(), None);
    }

    #[test]
    fn test_modifier_names() {
        assert_eq!(ModifierMask::from_name("Shift").unwrap(), ModifierMask::SHIFT);
        assert_eq!(ModifierMask::from_name("ctrl").unwrap(), ModifierMask::CONTROL);
        assert_eq!(ModifierMask::from_name("Option").unwrap(), ModifierMask::ALT);
        assert_eq!(ModifierMask::from_name("Command").unwrap(), ModifierMask::META);
        assert_eq!(
            ModifierMask::from_name("CommandOrControl").unwrap(),
            ModifierMask::COMMAND_OR_CONTROL
        );
        assert!(ModifierMask::from_name("Hyper").is_err());
    }

    #[test]
    fn test_mask_ops() {
        let mut mask = ModifierMask::CONTROL | ModifierMask::SHIFT;
        assert!(mask.contains(ModifierMask::CONTROL));
        assert!(mask.contains(ModifierMask::NONE));
        assert!(!mask.contains(ModifierMask::ALT));
        mask.remove(ModifierMask::SHIFT);
        assert_eq!(mask, ModifierMask::CONTROL);
        assert_eq!(ModifierMask::from_bits_truncate(0xFF).bits(), 0b1111);
        assert_eq!((ModifierMask::SHIFT | ModifierMask::META).to_string(), "Shift+Meta");
    }
}
