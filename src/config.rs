//! Configuration loading and management

use std::str::FromStr;

use anyhow::{bail, Context, Result};

use crate::engine::EngineConfig;
use crate::hotkey::Binding;

const DEFAULT_BINDINGS: &str = "Ctrl+Shift+KeyH";
const DEFAULT_THREAD_NAME: &str = "hotkey-hook";

/// Where key events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// The OS hook (CGEventTap on macOS)
    Native,
    /// `press <Key>` / `release <Key>` lines on stdin
    Stdin,
}

impl Default for Backend {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Backend::Native
        } else {
            Backend::Stdin
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" => Ok(Backend::Native),
            "stdin" => Ok(Backend::Stdin),
            other => bail!("unknown backend '{}' (expected 'native' or 'stdin')", other),
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,

    /// Hotkeys registered at startup
    pub bindings: Vec<Binding>,

    /// Name of the hook thread
    pub thread_name: String,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let backend = match lookup("HOTKEYD_BACKEND") {
            Some(value) => value.parse().context("invalid HOTKEYD_BACKEND")?,
            None => Backend::default(),
        };

        let raw = lookup("HOTKEYD_BINDINGS").unwrap_or_else(|| DEFAULT_BINDINGS.to_string());
        let bindings = parse_bindings(&raw).context("invalid HOTKEYD_BINDINGS")?;

        let thread_name = lookup("HOTKEYD_THREAD_NAME")
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| DEFAULT_THREAD_NAME.to_string());

        Ok(Self {
            backend,
            bindings,
            thread_name,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            hook_thread_name: self.thread_name.clone(),
        }
    }
}

fn parse_bindings(raw: &str) -> Result<Vec<Binding>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Binding>().with_context(|| format!("bad accelerator '{}'", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::hotkey::{KeyCode, ModifierMask};

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.backend, Backend::default());
        assert_eq!(
            config.bindings,
            vec![Binding::new(KeyCode::H, ModifierMask::CONTROL | ModifierMask::SHIFT)]
        );
        assert_eq!(config.engine_config().hook_thread_name, "hotkey-hook");
    }

    #[test]
    fn test_config_overrides() {
        let config = load(&[
            ("HOTKEYD_BACKEND", "Stdin"),
            ("HOTKEYD_BINDINGS", "Alt+KeyA, Meta+Space ,"),
            ("HOTKEYD_THREAD_NAME", "keys"),
        ])
        .unwrap();
        assert_eq!(config.backend, Backend::Stdin);
        assert_eq!(config.bindings.len(), 2);
        assert_eq!(config.bindings[1], Binding::new(KeyCode::SPACE, ModifierMask::META));
        assert_eq!(config.thread_name, "keys");
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(load(&[("HOTKEYD_BACKEND", "x11")]).is_err());
        assert!(load(&[("HOTKEYD_BINDINGS", "Ctrl+Nope")]).is_err());
    }
}
