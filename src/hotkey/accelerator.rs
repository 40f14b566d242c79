//! Accelerator strings such as `Ctrl+Shift+KeyC`
//!
//! Tokens are split on `+`. Every token but the last must be a modifier
//! name; the last is a key name, or a single letter as shorthand for `Key<L>`.

use std::str::FromStr;

use super::keys::{KeyCode, ModifierMask};
use super::registry::Binding;
use crate::error::{EngineError, Result};

impl FromStr for Binding {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let tokens: Vec<&str> = s.split('+').map(str::trim).collect();
        let Some((key, modifiers)) = tokens.split_last() else {
            return Err(EngineError::InvalidAccelerator(s.to_string()));
        };
        if key.is_empty() || modifiers.iter().any(|m| m.is_empty()) {
            return Err(EngineError::InvalidAccelerator(s.to_string()));
        }

        let mut mask = ModifierMask::NONE;
        for name in modifiers {
            mask |= ModifierMask::from_name(name)?;
        }

        Ok(Binding::new(parse_key(key)?, mask))
    }
}

fn parse_key(token: &str) -> Result<KeyCode> {
    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if c.is_ascii_alphabetic() {
            return KeyCode::from_name(&format!("Key{}", c.to_ascii_uppercase()));
        }
    }
    KeyCode::from_name(token)
}
