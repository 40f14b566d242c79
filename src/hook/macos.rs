//! Global keyboard hook using macOS CGEventTap
//!
//! Listens to KeyDown, KeyUp and FlagsChanged on a session event tap.
//! Runs on the hook thread with its own CFRunLoop, polled so that `stop`
//! from another thread takes effect within one poll interval.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEvent, CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions,
    CGEventTapPlacement, CGEventTapProxy, CGEventType, EventField,
};
use parking_lot::Mutex;

use super::{HookDispatcher, HookError, HookEvent, HookLogger, HookSource, LogLevel};
use crate::hotkey::KeyCode;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Listen-only CGEventTap hook source. Requires Accessibility permission.
#[derive(Default)]
pub struct CgEventTapSource {
    running: AtomicBool,
    dispatcher: Mutex<Option<HookDispatcher>>,
    logger: Mutex<Option<HookLogger>>,
}

impl CgEventTapSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self, level: LogLevel, message: &str) {
        if let Some(logger) = self.logger.lock().as_ref() {
            logger(level, message);
        }
    }
}

impl HookSource for CgEventTapSource {
    fn set_logger(&self, logger: HookLogger) {
        *self.logger.lock() = Some(logger);
    }

    fn set_dispatcher(&self, dispatcher: HookDispatcher) {
        *self.dispatcher.lock() = Some(dispatcher);
    }

    fn run(&self) -> Result<(), HookError> {
        let dispatcher = self
            .dispatcher
            .lock()
            .clone()
            .ok_or_else(|| HookError::Other("no event dispatcher installed".to_string()))?;
        self.running.store(true, Ordering::SeqCst);

        // Physical modifiers currently down, one bit per `modifier_bit` slot
        let held = Cell::new(0u8);
        // Set when macOS disables the tap; re-enabled from the poll loop
        let disabled = Rc::new(Cell::new(false));
        let tap_disabled = Rc::clone(&disabled);
        let tap_dispatcher = dispatcher.clone();

        // CGEventTap callback - must be fast and non-blocking
        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
                             -> Option<CGEvent> {
            if is_tap_disabled(event_type) {
                tap_disabled.set(true);
                return Some(event.clone());
            }
            let vk = event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            match event_type {
                CGEventType::KeyDown => {
                    if let Some(code) = translate(vk) {
                        tap_dispatcher(HookEvent::KeyPressed(code));
                    }
                }
                CGEventType::KeyUp => {
                    if let Some(code) = translate(vk) {
                        tap_dispatcher(HookEvent::KeyReleased(code));
                    }
                }
                CGEventType::FlagsChanged => {
                    if let (Some(code), Some((bit, family))) = (translate(vk), modifier_bit(vk)) {
                        let was_down = held.get() & bit != 0;
                        // The family flag clears only when both sides are up
                        let pressed = event.get_flags().contains(family) && !was_down;
                        if pressed {
                            held.set(held.get() | bit);
                            tap_dispatcher(HookEvent::KeyPressed(code));
                        } else {
                            held.set(held.get() & !bit);
                            tap_dispatcher(HookEvent::KeyReleased(code));
                        }
                    }
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![
                CGEventType::KeyDown,
                CGEventType::KeyUp,
                CGEventType::FlagsChanged,
            ],
            callback,
        )
        .map_err(|_| {
            self.running.store(false, Ordering::SeqCst);
            self.log(
                LogLevel::Error,
                "failed to create event tap - is Accessibility permission granted?",
            );
            HookError::EventTapCreation
        })?;

        let run_loop_source = tap.mach_port.create_runloop_source(0).map_err(|_| {
            self.running.store(false, Ordering::SeqCst);
            HookError::Other("failed to create run loop source for event tap".to_string())
        })?;
        let run_loop = CFRunLoop::get_current();
        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }
        tap.enable();

        self.log(LogLevel::Info, "event tap created and enabled");
        dispatcher(HookEvent::HookEnabled);

        while self.running.load(Ordering::SeqCst) {
            CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, POLL_INTERVAL, true);
            if disabled.replace(false) {
                self.log(LogLevel::Warn, "event tap disabled by the system, re-enabling");
                tap.enable();
            }
        }

        unsafe {
            run_loop.remove_source(&run_loop_source, kCFRunLoopCommonModes);
        }
        dispatcher(HookEvent::HookDisabled);
        self.log(LogLevel::Info, "event tap disabled");

        Ok(())
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Whether macOS switched the tap off (slow callback or secure input)
fn is_tap_disabled(event_type: CGEventType) -> bool {
    matches!(
        event_type,
        CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput
    )
}

/// Bit and family flag for a macOS modifier virtual key
fn modifier_bit(vk: u16) -> Option<(u8, CGEventFlags)> {
    let entry = match vk {
        0x38 => (1 << 0, CGEventFlags::CGEventFlagShift),
        0x3C => (1 << 1, CGEventFlags::CGEventFlagShift),
        0x3B => (1 << 2, CGEventFlags::CGEventFlagControl),
        0x3E => (1 << 3, CGEventFlags::CGEventFlagControl),
        0x3A => (1 << 4, CGEventFlags::CGEventFlagAlternate),
        0x3D => (1 << 5, CGEventFlags::CGEventFlagAlternate),
        0x37 => (1 << 6, CGEventFlags::CGEventFlagCommand),
        0x36 => (1 << 7, CGEventFlags::CGEventFlagCommand),
        _ => return None,
    };
    Some(entry)
}

/// Map a macOS virtual key code (kVK_*) to a [`KeyCode`]
fn translate(vk: u16) -> Option<KeyCode> {
    let code = match vk {
        0x00 => 0x001E, // A
        0x01 => 0x001F, // S
        0x02 => 0x0020, // D
        0x03 => 0x0021, // F
        0x04 => 0x0023, // H
        0x05 => 0x0022, // G
        0x06 => 0x002C, // Z
        0x07 => 0x002D, // X
        0x08 => 0x002E, // C
        0x09 => 0x002F, // V
        0x0B => 0x0030, // B
        0x0C => 0x0010, // Q
        0x0D => 0x0011, // W
        0x0E => 0x0012, // E
        0x0F => 0x0013, // R
        0x10 => 0x0015, // Y
        0x11 => 0x0014, // T
        0x12 => 0x0002, // 1
        0x13 => 0x0003, // 2
        0x14 => 0x0004, // 3
        0x15 => 0x0005, // 4
        0x16 => 0x0007, // 6
        0x17 => 0x0006, // 5
        0x18 => 0x000D, // =
        0x19 => 0x000A, // 9
        0x1A => 0x0008, // 7
        0x1B => 0x000C, // -
        0x1C => 0x0009, // 8
        0x1D => 0x000B, // 0
        0x1E => 0x001B, // ]
        0x1F => 0x0018, // O
        0x20 => 0x0016, // U
        0x21 => 0x001A, // [
        0x22 => 0x0017, // I
        0x23 => 0x0019, // P
        0x24 => 0x001C, // Return
        0x25 => 0x0026, // L
        0x26 => 0x0024, // J
        0x27 => 0x0028, // '
        0x28 => 0x0025, // K
        0x29 => 0x0027, // ;
        0x2A => 0x002B, // \
        0x2B => 0x0033, // ,
        0x2C => 0x0035, // /
        0x2D => 0x0031, // N
        0x2E => 0x0032, // M
        0x2F => 0x0034, // .
        0x30 => 0x000F, // Tab
        0x31 => 0x0039, // Space
        0x32 => 0x0029, // `
        0x33 => 0x000E, // Delete (backspace)
        0x35 => 0x0001, // Escape
        0x36 => 0x0E5C, // Right Command
        0x37 => 0x0E5B, // Command
        0x38 => 0x002A, // Shift
        0x39 => 0x003A, // Caps Lock
        0x3A => 0x0038, // Option
        0x3B => 0x001D, // Control
        0x3C => 0x0036, // Right Shift
        0x3D => 0x0E38, // Right Option
        0x3E => 0x0E1D, // Right Control
        0x40 => 0x0064, // F17
        0x41 => 0x0053, // Keypad .
        0x43 => 0x0037, // Keypad *
        0x45 => 0x004E, // Keypad +
        0x47 => 0x0045, // Keypad Clear / Num Lock
        0x4B => 0x0E35, // Keypad /
        0x4C => 0x0E1C, // Keypad Enter
        0x4E => 0x004A, // Keypad -
        0x4F => 0x0065, // F18
        0x50 => 0x0066, // F19
        0x51 => 0x0E0D, // Keypad =
        0x52 => 0x0052, // Keypad 0
        0x53 => 0x004F, // Keypad 1
        0x54 => 0x0050, // Keypad 2
        0x55 => 0x0051, // Keypad 3
        0x56 => 0x004B, // Keypad 4
        0x57 => 0x004C, // Keypad 5
        0x58 => 0x004D, // Keypad 6
        0x59 => 0x0047, // Keypad 7
        0x5A => 0x0067, // F20
        0x5B => 0x0048, // Keypad 8
        0x5C => 0x0049, // Keypad 9
        0x60 => 0x003F, // F5
        0x61 => 0x0040, // F6
        0x62 => 0x0041, // F7
        0x63 => 0x003D, // F3
        0x64 => 0x0042, // F8
        0x65 => 0x0043, // F9
        0x67 => 0x0057, // F11
        0x69 => 0x005B, // F13
        0x6A => 0x0063, // F16
        0x6B => 0x005C, // F14
        0x6D => 0x0044, // F10
        0x6F => 0x0058, // F12
        0x71 => 0x005D, // F15
        0x73 => 0x0E47, // Home
        0x74 => 0x0E49, // Page Up
        0x75 => 0x0E53, // Forward Delete
        0x76 => 0x003E, // F4
        0x77 => 0x0E4F, // End
        0x78 => 0x003C, // F2
        0x79 => 0x0E51, // Page Down
        0x7A => 0x003B, // F1
        0x7B => 0xE04B, // Left
        0x7C => 0xE04D, // Right
        0x7D => 0xE050, // Down
        0x7E => 0xE048, // Up
        _ => return None,
    };
    Some(KeyCode(code))
}
