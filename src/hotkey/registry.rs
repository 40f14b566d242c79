//! Hotkey registry
//!
//! Maps binding fingerprints to hotkey records. Writes (register,
//! unregister) come from application threads and take the write lock for
//! their whole duration; the hook thread only ever takes the read lock.
//! The `armed` flag is atomic so the matcher can flip it under a read guard.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keys::{KeyCode, ModifierMask};
use crate::error::{EngineError, Result};

/// User callback invoked on the dispatch context
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Which transition a callback is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Up,
}

impl FromStr for Direction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "down" | "keydown" | "registerKeydown" => Ok(Direction::Down),
            "up" | "keyup" | "registerKeyup" => Ok(Direction::Up),
            other => Err(EngineError::InvalidDirection(other.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Down => write!(f, "down"),
            Direction::Up => write!(f, "up"),
        }
    }
}

/// A primary key plus the modifiers that must be held with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Binding {
    pub key: KeyCode,
    pub modifiers: ModifierMask,
}

impl Binding {
    pub fn new(key: KeyCode, modifiers: ModifierMask) -> Self {
        Self { key, modifiers }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.key, self.modifiers)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.modifiers, self.key)
        }
    }
}

/// Registry lookup key derived from a (key, modifiers) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u32);

impl Fingerprint {
    /// Hash of the packed `key << 8 | mask` value.
    ///
    /// The murmur3 finalizer is a bijection on `u32`, and the packing is
    /// injective, so distinct bindings never share a fingerprint.
    pub fn of(key: KeyCode, modifiers: ModifierMask) -> Fingerprint {
        let mut h = (u32::from(key.0) << 8) | u32::from(modifiers.bits());
        h ^= h >> 16;
        h = h.wrapping_mul(0x85eb_ca6b);
        h ^= h >> 13;
        h = h.wrapping_mul(0xc2b2_ae35);
        h ^= h >> 16;
        Fingerprint(h)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// A registered binding with its callback slots
pub struct Hotkey {
    binding: Binding,
    down: Option<Callback>,
    up: Option<Callback>,
    armed: AtomicBool,
}

impl Hotkey {
    fn new(binding: Binding) -> Self {
        Self {
            binding,
            down: None,
            up: None,
            armed: AtomicBool::new(false),
        }
    }

    pub fn binding(&self) -> Binding {
        self.binding
    }

    pub fn callback(&self, direction: Direction) -> Option<&Callback> {
        match direction {
            Direction::Down => self.down.as_ref(),
            Direction::Up => self.up.as_ref(),
        }
    }

    pub fn is_bound(&self, direction: Direction) -> bool {
        self.callback(direction).is_some()
    }

    /// Down callback has fired and the release has not been seen yet
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Set armed, returning the previous value
    pub(crate) fn set_armed(&self, armed: bool) -> bool {
        self.armed.swap(armed, Ordering::AcqRel)
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Option<Callback> {
        match direction {
            Direction::Down => &mut self.down,
            Direction::Up => &mut self.up,
        }
    }

    fn is_empty(&self) -> bool {
        self.down.is_none() && self.up.is_none()
    }
}

impl fmt::Debug for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hotkey")
            .field("binding", &self.binding)
            .field("down", &self.down.is_some())
            .field("up", &self.up.is_some())
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Concurrent map from fingerprint to hotkey
///
/// Iteration order is ascending fingerprint, so matches on the same event
/// fire in a stable order between runs.
#[derive(Default)]
pub struct HotkeyRegistry {
    hotkeys: RwLock<BTreeMap<Fingerprint, Hotkey>>,
}

impl HotkeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `callback` to `direction` of `binding`.
    ///
    /// Fails with `AlreadyRegistered` if that slot is taken; the existing
    /// callback is left in place.
    pub fn register(&self, binding: Binding, direction: Direction, callback: Callback) -> Result<()> {
        let fingerprint = binding.fingerprint();
        let mut hotkeys = self.hotkeys.write();

        let hotkey = hotkeys
            .entry(fingerprint)
            .or_insert_with(|| Hotkey::new(binding));
        let slot = hotkey.slot_mut(direction);
        if slot.is_some() {
            return Err(EngineError::AlreadyRegistered);
        }
        *slot = Some(callback);

        debug!(%binding, %direction, %fingerprint, "hotkey registered");
        Ok(())
    }

    /// Clear `direction` of `binding`, dropping the hotkey once both slots are empty
    pub fn unregister(&self, binding: Binding, direction: Direction) -> Result<()> {
        let fingerprint = binding.fingerprint();
        let mut hotkeys = self.hotkeys.write();

        let hotkey = hotkeys.get_mut(&fingerprint).ok_or(EngineError::NotFound)?;
        if hotkey.slot_mut(direction).take().is_none() {
            return Err(EngineError::NotBound);
        }

        if hotkey.is_empty() {
            hotkeys.remove(&fingerprint);
            debug!(%binding, %fingerprint, "hotkey removed");
        } else {
            debug!(%binding, %direction, %fingerprint, "hotkey direction unregistered");
        }

        debug_assert!(hotkeys.values().all(|h| !h.is_empty()));
        Ok(())
    }

    /// Remove every hotkey
    pub fn unregister_all(&self) {
        let mut hotkeys = self.hotkeys.write();
        let count = hotkeys.len();
        hotkeys.clear();
        debug!(count, "all hotkeys unregistered");
    }

    /// Shared read access for the matcher
    pub fn read(&self) -> RegistryReadGuard<'_> {
        RegistryReadGuard {
            guard: self.hotkeys.read(),
        }
    }

    pub fn contains(&self, fingerprint: Fingerprint) -> bool {
        self.hotkeys.read().contains_key(&fingerprint)
    }

    /// Which directions are bound for `binding`, as (down, up)
    pub fn bound_directions(&self, binding: Binding) -> Option<(bool, bool)> {
        self.hotkeys
            .read()
            .get(&binding.fingerprint())
            .map(|h| (h.is_bound(Direction::Down), h.is_bound(Direction::Up)))
    }

    pub fn len(&self) -> usize {
        self.hotkeys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hotkeys.read().is_empty()
    }

    /// Disarm every hotkey, used when the hook restarts
    pub(crate) fn disarm_all(&self) {
        for hotkey in self.hotkeys.read().values() {
            hotkey.set_armed(false);
        }
    }
}

impl fmt::Debug for HotkeyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HotkeyRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Read guard over the registry
pub struct RegistryReadGuard<'a> {
    guard: RwLockReadGuard<'a, BTreeMap<Fingerprint, Hotkey>>,
}

impl RegistryReadGuard<'_> {
    pub fn lookup(&self, fingerprint: Fingerprint) -> Option<&Hotkey> {
        self.guard.get(&fingerprint)
    }

    /// Hotkeys in fingerprint order
    pub fn iter(&self) -> impl Iterator<Item = &Hotkey> {
        self.guard.values()
    }

    /// Hotkeys whose primary key is `key`
    pub fn with_key(&self, key: KeyCode) -> impl Iterator<Item = &Hotkey> {
        self.guard.values().filter(move |h| h.binding.key == key)
    }

    /// Hotkeys a physical key event applies to: those bound to the key
    /// itself, plus those bound to its logical modifier
    pub fn triggered_by(&self, code: KeyCode) -> impl Iterator<Item = &Hotkey> {
        let logical = code.logical();
        self.guard
            .values()
            .filter(move |h| h.binding.key == code || Some(h.binding.key) == logical)
    }
}
