//! In-process hook source
//!
//! Events are injected through a [`ManualHookHandle`] from any thread and
//! delivered on the hook thread, exactly as an OS hook would deliver them.
//! Useful for hosts that already own an input hook, and for tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use super::{HookDispatcher, HookError, HookEvent, HookLogger, HookSource, LogLevel};
use crate::hotkey::KeyCode;

#[derive(Default)]
struct Queue {
    events: VecDeque<HookEvent>,
    running: bool,
    stopping: bool,
    in_flight: bool,
    fail_next_run: Option<HookError>,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    cond: Condvar,
    dispatcher: Mutex<Option<HookDispatcher>>,
    logger: Mutex<Option<HookLogger>>,
}

impl Shared {
    fn log(&self, level: LogLevel, message: &str) {
        if let Some(logger) = self.logger.lock().as_ref() {
            logger(level, message);
        }
    }
}

/// Hook source fed by [`ManualHookHandle`]
#[derive(Default)]
pub struct ManualHookSource {
    shared: Arc<Shared>,
}

impl ManualHookSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for injecting events into this source
    pub fn handle(&self) -> ManualHookHandle {
        ManualHookHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl HookSource for ManualHookSource {
    fn set_logger(&self, logger: HookLogger) {
        *self.shared.logger.lock() = Some(logger);
    }

    fn set_dispatcher(&self, dispatcher: HookDispatcher) {
        *self.shared.dispatcher.lock() = Some(dispatcher);
    }

    fn run(&self) -> Result<(), HookError> {
        let dispatcher = self
            .shared
            .dispatcher
            .lock()
            .clone()
            .ok_or_else(|| HookError::Other("no event dispatcher installed".to_string()))?;

        {
            let mut queue = self.shared.queue.lock();
            if let Some(err) = queue.fail_next_run.take() {
                drop(queue);
                self.shared.log(LogLevel::Error, &format!("manual hook failed to enable: {err}"));
                return Err(err);
            }
            queue.events.clear();
            queue.stopping = false;
            queue.running = true;
        }

        self.shared.log(LogLevel::Debug, "manual hook enabled");
        dispatcher(HookEvent::HookEnabled);

        loop {
            let event = {
                let mut queue = self.shared.queue.lock();
                queue.in_flight = false;
                self.shared.cond.notify_all();
                while queue.events.is_empty() && !queue.stopping {
                    self.shared.cond.wait(&mut queue);
                }
                if queue.stopping {
                    break;
                }
                queue.in_flight = true;
                queue.events.pop_front()
            };
            if let Some(event) = event {
                dispatcher(event);
            }
        }

        dispatcher(HookEvent::HookDisabled);

        let mut queue = self.shared.queue.lock();
        queue.running = false;
        queue.in_flight = false;
        queue.events.clear();
        self.shared.cond.notify_all();
        drop(queue);

        self.shared.log(LogLevel::Debug, "manual hook disabled");
        Ok(())
    }

    fn stop(&self) {
        let mut queue = self.shared.queue.lock();
        queue.stopping = true;
        self.shared.cond.notify_all();
    }
}

/// Cloneable injector for a [`ManualHookSource`]
#[derive(Clone)]
pub struct ManualHookHandle {
    shared: Arc<Shared>,
}

impl ManualHookHandle {
    /// Queue a raw event. Dropped if the hook is not running.
    pub fn emit(&self, event: HookEvent) -> bool {
        let mut queue = self.shared.queue.lock();
        if !queue.running || queue.stopping {
            debug!(?event, "manual hook not running, dropping event");
            return false;
        }
        queue.events.push_back(event);
        self.shared.cond.notify_all();
        true
    }

    pub fn press(&self, code: KeyCode) -> bool {
        self.emit(HookEvent::KeyPressed(code))
    }

    pub fn release(&self, code: KeyCode) -> bool {
        self.emit(HookEvent::KeyReleased(code))
    }

    /// Press then release
    pub fn tap(&self, code: KeyCode) -> bool {
        self.press(code) && self.release(code)
    }

    /// Make the next `run` fail before enabling, as an OS hook would
    /// without the required permissions
    pub fn fail_next_run(&self, err: HookError) {
        self.shared.queue.lock().fail_next_run = Some(err);
    }

    pub fn is_running(&self) -> bool {
        self.shared.queue.lock().running
    }

    /// Block until every queued event has been handed to the dispatcher
    pub fn flush(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.running && (!queue.events.is_empty() || queue.in_flight) {
            self.shared.cond.wait(&mut queue);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn recording_dispatcher() -> (HookDispatcher, Arc<Mutex<Vec<HookEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let dispatcher: HookDispatcher = Arc::new(move |event: HookEvent| sink.lock().push(event));
        (dispatcher, events)
    }

    fn wait_until_running(handle: &ManualHookHandle) {
        while !handle.is_running() {
            thread::yield_now();
        }
    }

    #[test]
    fn test_delivers_events_between_enabled_and_disabled() {
        let source = Arc::new(ManualHookSource::new());
        let handle = source.handle();
        let (dispatcher, events) = recording_dispatcher();
        source.set_dispatcher(dispatcher);

        let runner = {
            let source = Arc::clone(&source);
            thread::spawn(move || source.run())
        };
        wait_until_running(&handle);

        assert!(handle.tap(KeyCode::C));
        handle.flush();
        source.stop();
        runner.join().unwrap().unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                HookEvent::HookEnabled,
                HookEvent::KeyPressed(KeyCode::C),
                HookEvent::KeyReleased(KeyCode::C),
                HookEvent::HookDisabled,
            ]
        );
        assert!(!handle.is_running());
    }

    #[test]
    fn test_events_dropped_when_not_running() {
        let source = ManualHookSource::new();
        let handle = source.handle();
        assert!(!handle.press(KeyCode::A));
        // Flushing an idle source returns immediately
        handle.flush();
    }

    #[test]
    fn test_fail_next_run() {
        let source = ManualHookSource::new();
        let (dispatcher, events) = recording_dispatcher();
        source.set_dispatcher(dispatcher);
        source.handle().fail_next_run(HookError::Status(5));

        assert_eq!(source.run(), Err(HookError::Status(5)));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_run_without_dispatcher_fails() {
        let source = ManualHookSource::new();
        assert!(matches!(source.run(), Err(HookError::Other(_))));
    }
}
