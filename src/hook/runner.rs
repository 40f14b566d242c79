//! Hook thread lifecycle
//!
//! `start` spawns the dedicated hook thread and blocks until the hook
//! source reports that it is enabled, or that it failed. `stop` asks the
//! source to quiesce and joins the thread, so no raw event is processed
//! after it returns.
//!
//! The control lock and condvar used for this handshake are separate from
//! the registry lock.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thread_priority::ThreadPriority;
use tracing::{debug, error, info, warn};

use super::{HookDispatcher, HookError, HookEvent, HookLogger, HookSource, LogLevel};
use crate::error::{EngineError, Result};
use crate::hotkey::{DispatchSender, HotkeyRegistry, KeyState, Matcher};

/// Lifecycle of the hook thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunnerState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerState::Stopped => write!(f, "Stopped"),
            RunnerState::Starting => write!(f, "Starting"),
            RunnerState::Running => write!(f, "Running"),
            RunnerState::Stopping => write!(f, "Stopping"),
        }
    }
}

#[derive(Default)]
struct ControlState {
    state: RunnerState,
    /// Startup outcome reported by the hook thread, consumed by `start`
    outcome: Option<std::result::Result<(), HookError>>,
    thread: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Control {
    state: Mutex<ControlState>,
    cond: Condvar,
}

impl Control {
    /// Report the startup outcome once; later reports are ignored
    fn report(&self, outcome: std::result::Result<(), HookError>) {
        let mut ctl = self.state.lock();
        if ctl.state == RunnerState::Starting && ctl.outcome.is_none() {
            ctl.outcome = Some(outcome);
            self.cond.notify_all();
        }
    }

    /// Record that the hook thread's `run` returned
    fn exited(&self, err: HookError) {
        let mut ctl = self.state.lock();
        match ctl.state {
            // Overrides an unconsumed enable: the hook is already gone
            RunnerState::Starting => {
                ctl.outcome = Some(Err(err));
                self.cond.notify_all();
            }
            RunnerState::Running => {
                error!(%err, "hook source exited while running");
                ctl.state = RunnerState::Stopped;
                // Detach; this is the exiting thread itself
                ctl.thread = None;
            }
            RunnerState::Stopping | RunnerState::Stopped => {}
        }
    }
}

/// Owns the hook thread and feeds its key events to the matcher
pub struct HookRunner {
    source: Arc<dyn HookSource>,
    registry: Arc<HotkeyRegistry>,
    sender: DispatchSender,
    thread_name: String,
    control: Arc<Control>,
}

impl HookRunner {
    pub fn new(
        source: Arc<dyn HookSource>,
        registry: Arc<HotkeyRegistry>,
        sender: DispatchSender,
        thread_name: impl Into<String>,
    ) -> Self {
        Self {
            source,
            registry,
            sender,
            thread_name: thread_name.into(),
            control: Arc::new(Control::default()),
        }
    }

    pub fn state(&self) -> RunnerState {
        self.control.state.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunnerState::Running
    }

    /// Start the hook thread and wait for the source to come up.
    ///
    /// There is no timeout: a source that never enables and never returns
    /// from `run` leaves the caller blocked.
    pub fn start(&self) -> Result<()> {
        let mut ctl = self.control.state.lock();
        if ctl.state != RunnerState::Stopped {
            warn!(state = %ctl.state, "hook start requested while not stopped");
            return Err(EngineError::AlreadyRunning);
        }
        ctl.state = RunnerState::Starting;
        ctl.outcome = None;

        self.registry.disarm_all();
        self.source.set_logger(tracing_logger());
        self.source.set_dispatcher(self.event_dispatcher());

        let source = Arc::clone(&self.source);
        let control = Arc::clone(&self.control);
        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || hook_thread(source, control));

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                ctl.state = RunnerState::Stopped;
                error!(?e, "failed to spawn hook thread");
                return Err(EngineError::ThreadSpawn(e.to_string()));
            }
        };

        // Releases the control lock while waiting; the hook thread takes it
        // exactly once to report the outcome.
        let outcome = loop {
            if let Some(outcome) = ctl.outcome.take() {
                break outcome;
            }
            self.control.cond.wait(&mut ctl);
        };

        match outcome {
            Ok(()) => {
                ctl.state = RunnerState::Running;
                ctl.thread = Some(handle);
                info!(thread = %self.thread_name, "hook started");
                Ok(())
            }
            Err(err) => {
                ctl.state = RunnerState::Stopped;
                drop(ctl);
                if handle.join().is_err() {
                    error!("hook thread panicked during startup");
                }
                error!(%err, "hook source failed to enable");
                Err(EngineError::HookEnable(err))
            }
        }
    }

    /// Stop the hook and wait for the hook thread to exit
    pub fn stop(&self) -> Result<()> {
        let handle = {
            let mut ctl = self.control.state.lock();
            if ctl.state != RunnerState::Running {
                warn!(state = %ctl.state, "hook stop requested while not running");
                return Err(EngineError::NotRunning);
            }
            ctl.state = RunnerState::Stopping;
            ctl.thread.take()
        };

        self.source.stop();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("hook thread panicked");
            }
        }
        self.registry.disarm_all();

        self.control.state.lock().state = RunnerState::Stopped;
        info!("hook stopped");
        Ok(())
    }

    /// Build the raw event callback installed on the source for one run
    fn event_dispatcher(&self) -> HookDispatcher {
        let control = Arc::clone(&self.control);
        let registry = Arc::clone(&self.registry);
        let sender = self.sender.clone();
        let matcher = Mutex::new(Matcher::new());

        Arc::new(move |event: HookEvent| match event {
            HookEvent::HookEnabled => {
                debug!("hook enabled");
                control.report(Ok(()));
            }
            HookEvent::HookDisabled => {
                debug!("hook disabled");
            }
            HookEvent::KeyPressed(code) => {
                matcher.lock().handle_key(&registry, code, KeyState::Pressed, |pending| {
                    sender.send(pending);
                });
            }
            HookEvent::KeyReleased(code) => {
                matcher.lock().handle_key(&registry, code, KeyState::Released, |pending| {
                    sender.send(pending);
                });
            }
            HookEvent::KeyTyped(_)
            | HookEvent::MousePressed
            | HookEvent::MouseReleased
            | HookEvent::MouseClicked
            | HookEvent::MouseMoved
            | HookEvent::MouseDragged
            | HookEvent::MouseWheel => {}
        })
    }
}

impl Drop for HookRunner {
    fn drop(&mut self) {
        if self.is_running() {
            let _ = self.stop();
        }
    }
}

impl fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRunner")
            .field("thread_name", &self.thread_name)
            .field("state", &self.state())
            .finish()
    }
}

fn hook_thread(source: Arc<dyn HookSource>, control: Arc<Control>) {
    debug!("hook thread started");

    // Best effort: raising priority fails without privileges on some systems
    if let Err(e) = thread_priority::set_current_thread_priority(ThreadPriority::Max) {
        warn!(?e, "could not raise hook thread priority");
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| source.run()))
        .unwrap_or_else(|_| Err(HookError::Other("hook source panicked".to_string())));

    match result {
        Ok(()) => control.exited(HookError::ExitedEarly),
        Err(err) => {
            error!(%err, "hook source stopped with an error");
            control.exited(err);
        }
    }

    debug!("hook thread exiting");
}

/// Forward hook source diagnostics into tracing
fn tracing_logger() -> HookLogger {
    Arc::new(|level: LogLevel, message: &str| match level {
        LogLevel::Debug => debug!(target: "hotkey_engine::hook::source", "{}", message),
        LogLevel::Info => info!(target: "hotkey_engine::hook::source", "{}", message),
        LogLevel::Warn => warn!(target: "hotkey_engine::hook::source", "{}", message),
        LogLevel::Error => error!(target: "hotkey_engine::hook::source", "{}", message),
    })
}
