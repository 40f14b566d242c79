//! hotkeyd: background daemon that reports global hotkeys
//!
//! Registers the accelerators from `HOTKEYD_BINDINGS` and prints a JSON
//! line for every press and release of a matching hotkey. Events come from
//! the OS hook, or from stdin lines (`press KeyH`, `release KeyH`) with
//! `HOTKEYD_BACKEND=stdin`.

use std::io::BufRead;
use std::sync::Arc;
use std::thread;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use hotkey_engine::config::{Backend, Config};
use hotkey_engine::events::{DaemonEvent, HotkeyFired};
use hotkey_engine::hook::{HookSource, ManualHookHandle, ManualHookSource};
use hotkey_engine::hotkey::{Direction, KeyCode};
use hotkey_engine::lifecycle::ShutdownSignal;
use hotkey_engine::HotkeyEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "hotkeyd starting");

    let mut shutdown = ShutdownSignal::install().context("failed to install signal handlers")?;

    let config = Config::load()?;
    info!(backend = ?config.backend, bindings = config.bindings.len(), "configuration loaded");

    let (source, feeder) = build_source(config.backend)?;
    let (engine, mut queue) = HotkeyEngine::with_config(source, config.engine_config());

    for binding in &config.bindings {
        for direction in [Direction::Down, Direction::Up] {
            let binding = *binding;
            engine
                .try_register(binding, direction, Arc::new(move || emit(HotkeyFired::new(binding, direction).into())))
                .with_context(|| format!("failed to register {}", binding))?;
        }
        info!(%binding, "hotkey registered");
    }

    engine.try_start().context("failed to start hotkey engine")?;
    emit(DaemonEvent::EngineStarted {
        bindings: engine.registry().len(),
    });

    if let Some(handle) = feeder {
        spawn_stdin_feeder(handle)?;
    }

    tokio::select! {
        _ = queue.run() => {
            info!("dispatch queue closed");
        }
        result = shutdown.recv() => {
            match result {
                Ok(reason) => info!(%reason, "shutdown signal received"),
                Err(e) => error!(?e, "failed waiting for shutdown signal"),
            }
        }
    }

    info!("shutting down...");
    engine.shutdown();
    queue.drain();
    emit(DaemonEvent::EngineStopped);

    info!("hotkeyd stopped");
    Ok(())
}

fn build_source(backend: Backend) -> Result<(Arc<dyn HookSource>, Option<ManualHookHandle>)> {
    match backend {
        Backend::Stdin => {
            let source = ManualHookSource::new();
            let handle = source.handle();
            Ok((Arc::new(source), Some(handle)))
        }
        #[cfg(target_os = "macos")]
        Backend::Native => Ok((Arc::new(hotkey_engine::CgEventTapSource::new()), None)),
        #[cfg(not(target_os = "macos"))]
        Backend::Native => bail!("no native hook backend on this platform; use HOTKEYD_BACKEND=stdin"),
    }
}

fn emit(event: DaemonEvent) {
    match serde_json::to_string(&event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(?e, %event, "failed to serialize event"),
    }
}

/// Feed `press <Key>` / `release <Key>` lines from stdin into the hook
fn spawn_stdin_feeder(handle: ManualHookHandle) -> Result<()> {
    thread::Builder::new()
        .name("stdin-feeder".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!(?e, "failed to read stdin");
                        break;
                    }
                };
                if let Err(e) = feed_line(&handle, &line) {
                    warn!(line = %line.trim(), "{:#}", e);
                }
            }
            debug!("stdin closed");
        })
        .context("failed to spawn stdin feeder")?;
    Ok(())
}

fn feed_line(handle: &ManualHookHandle, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let (Some(action), Some(key), None) = (parts.next(), parts.next(), parts.next()) else {
        if line.trim().is_empty() {
            return Ok(());
        }
        bail!("expected 'press <Key>' or 'release <Key>'");
    };
    let code = KeyCode::from_name(key)?;
    let delivered = match action {
        "press" => handle.press(code),
        "release" => handle.release(code),
        other => bail!("unknown action '{}'", other),
    };
    if !delivered {
        debug!(%code, "hook not running, event dropped");
    }
    Ok(())
}
