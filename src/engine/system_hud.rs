//! Listen-only interception of hardware volume/brightness/backlight keys,
//! plus suppression of the native macOS on-screen overlay (OSD).
//!
//! Two complementary mechanisms:
//! 1. A CGEventTap in listen-only mode observes NSSystemDefined key events
//!    without consuming them, so macOS still applies the volume/brightness
//!    change. Matched keys are forwarded over a channel for the engine's own
//!    HUD; everything always passes through untouched.
//! 2. `launchctl unload/load` of the OSDUIHelper launch agent hides/restores
//!    the native overlay. Strictly symmetric: stop() restores the OSD only
//!    if this process hid it.
//!
//! Requires accessibility trust. Without it, start() fails cleanly and the
//! feature is simply unavailable.

use std::ffi::c_void;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;

use objc2::msg_send;
use objc2::rc::Retained;
use objc2::ClassType;
use objc2_app_kit::NSEvent;

use crate::engine::event_bus::HudKind;

const OSD_AGENT_PLIST: &str = "/System/Library/LaunchAgents/com.apple.OSDUIHelper.plist";

// NX_SYSDEFINED event type and the special-key codes carried in its data1.
const NX_SYSDEFINED: u32 = 14;
const SYSTEM_KEY_SUBTYPE: i16 = 8;
const NX_KEYTYPE_SOUND_UP: i32 = 0;
const NX_KEYTYPE_SOUND_DOWN: i32 = 1;
const NX_KEYTYPE_BRIGHTNESS_UP: i32 = 2;
const NX_KEYTYPE_BRIGHTNESS_DOWN: i32 = 3;
const NX_KEYTYPE_MUTE: i32 = 7;
const NX_KEYTYPE_ILLUMINATION_UP: i32 = 21;
const NX_KEYTYPE_ILLUMINATION_DOWN: i32 = 22;

// CGEventTapCreate arguments and synthetic "tap disabled" event types.
const K_CG_SESSION_EVENT_TAP: u32 = 1;
const K_CG_HEAD_INSERT_EVENT_TAP: u32 = 0;
const K_CG_EVENT_TAP_OPTION_LISTEN_ONLY: u32 = 1;
const K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
const K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

type CGEventRef = *mut c_void;
type CFMachPortRef = *mut c_void;
type CFRunLoopRef = *mut c_void;
type CFRunLoopSourceRef = *mut c_void;
type CFStringRef = *const c_void;

type CGEventTapCallBack = unsafe extern "C" fn(
    proxy: *mut c_void,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGEventTapCreate(
        tap: u32,
        place: u32,
        options: u32,
        events_of_interest: u64,
        callback: CGEventTapCallBack,
        user_info: *mut c_void,
    ) -> CFMachPortRef;
    fn CGEventTapEnable(tap: CFMachPortRef, enable: bool);
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFMachPortCreateRunLoopSource(
        allocator: *const c_void,
        port: CFMachPortRef,
        order: isize,
    ) -> CFRunLoopSourceRef;
    fn CFRunLoopGetCurrent() -> CFRunLoopRef;
    fn CFRunLoopAddSource(rl: CFRunLoopRef, source: CFRunLoopSourceRef, mode: CFStringRef);
    fn CFRunLoopRun();
    fn CFRunLoopStop(rl: CFRunLoopRef);
    fn CFRelease(cf: *const c_void);
    static kCFRunLoopCommonModes: CFStringRef;
}

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// A hardware key observed by the tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: i32,
    pub is_down: bool,
}

/// Whether the required accessibility permission has been granted.
pub fn accessibility_trusted() -> bool {
    unsafe { AXIsProcessTrusted() }
}

/// Unpack an NSSystemDefined event's data1 word into (key code, key down).
pub fn decode_system_key(data1: isize) -> KeyEvent {
    let code = ((data1 & 0xFFFF_0000) >> 16) as i32;
    let key_flags = data1 & 0xFFFF;
    let key_state = (key_flags & 0xFF00) >> 8;
    KeyEvent {
        code,
        is_down: key_state == 0x0A,
    }
}

/// Fixed allow-list of forwarded keys; everything else passes unobserved.
pub fn is_watched_key(code: i32) -> bool {
    matches!(
        code,
        NX_KEYTYPE_SOUND_UP
            | NX_KEYTYPE_SOUND_DOWN
            | NX_KEYTYPE_MUTE
            | NX_KEYTYPE_BRIGHTNESS_UP
            | NX_KEYTYPE_BRIGHTNESS_DOWN
            | NX_KEYTYPE_ILLUMINATION_UP
            | NX_KEYTYPE_ILLUMINATION_DOWN
    )
}

/// Which HUD a watched key belongs to.
pub fn hud_kind_for(code: i32) -> Option<HudKind> {
    match code {
        NX_KEYTYPE_SOUND_UP | NX_KEYTYPE_SOUND_DOWN | NX_KEYTYPE_MUTE => Some(HudKind::Volume),
        NX_KEYTYPE_BRIGHTNESS_UP | NX_KEYTYPE_BRIGHTNESS_DOWN => Some(HudKind::Brightness),
        NX_KEYTYPE_ILLUMINATION_UP | NX_KEYTYPE_ILLUMINATION_DOWN => {
            Some(HudKind::KeyboardBacklight)
        }
        _ => None,
    }
}

/// Boundary adapter owned by the tap thread and handed to the C callback as
/// its context pointer. Reclaimed when the tap thread exits.
struct TapContext {
    /// CFMachPortRef of the tap, for re-enabling after a forced disable.
    tap: AtomicUsize,
    events: Sender<KeyEvent>,
}

unsafe extern "C" fn tap_callback(
    _proxy: *mut c_void,
    event_type: u32,
    event: CGEventRef,
    user_info: *mut c_void,
) -> CGEventRef {
    // The listen-only contract: this callback must return immediately and
    // must always hand the event back untouched.
    if event_type == K_CG_EVENT_TAP_DISABLED_BY_TIMEOUT
        || event_type == K_CG_EVENT_TAP_DISABLED_BY_USER_INPUT
    {
        if !user_info.is_null() {
            let ctx = unsafe { &*(user_info as *const TapContext) };
            let tap = ctx.tap.load(Ordering::Acquire) as CFMachPortRef;
            if !tap.is_null() {
                unsafe { CGEventTapEnable(tap, true) };
            }
        }
        return event;
    }

    if event_type != NX_SYSDEFINED || user_info.is_null() {
        return event;
    }

    let ns_event: Option<Retained<NSEvent>> =
        unsafe { msg_send![NSEvent::class(), eventWithCGEvent: event] };
    let Some(ns_event) = ns_event else {
        return event;
    };
    let subtype: i16 = unsafe { msg_send![&ns_event, subtype] };
    if subtype != SYSTEM_KEY_SUBTYPE {
        return event;
    }
    let data1: isize = unsafe { msg_send![&ns_event, data1] };

    let key = decode_system_key(data1);
    if is_watched_key(key.code) {
        let ctx = unsafe { &*(user_info as *const TapContext) };
        let _ = ctx.events.send(key);
    }

    event
}

/// Observes system HUD keys and optionally hides the native OSD.
pub struct SystemHudInterceptor {
    thread: Option<JoinHandle<()>>,
    /// CFRunLoopRef of the tap thread, stored for CFRunLoopStop.
    run_loop: std::sync::Arc<AtomicUsize>,
    events_rx: Receiver<KeyEvent>,
    events_tx: Sender<KeyEvent>,
    osd_hidden: bool,
    running: bool,
}

impl SystemHudInterceptor {
    pub fn new() -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            thread: None,
            run_loop: std::sync::Arc::new(AtomicUsize::new(0)),
            events_rx,
            events_tx,
            osd_hidden: false,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start observing. Returns true if already running. Returns false with
    /// no side effects when accessibility trust is missing or the tap cannot
    /// be created.
    pub fn start(&mut self, hide_osd: bool) -> bool {
        if self.running {
            return true;
        }

        if !accessibility_trusted() {
            log::warn!(
                "Accessibility permission not granted; system HUD interception unavailable"
            );
            return false;
        }

        let (ready_tx, ready_rx) = channel::<bool>();
        let events_tx = self.events_tx.clone();
        let run_loop = self.run_loop.clone();

        let thread = std::thread::spawn(move || {
            let context = Box::into_raw(Box::new(TapContext {
                tap: AtomicUsize::new(0),
                events: events_tx,
            }));

            let tap = unsafe {
                CGEventTapCreate(
                    K_CG_SESSION_EVENT_TAP,
                    K_CG_HEAD_INSERT_EVENT_TAP,
                    K_CG_EVENT_TAP_OPTION_LISTEN_ONLY,
                    1u64 << NX_SYSDEFINED,
                    tap_callback,
                    context as *mut c_void,
                )
            };
            if tap.is_null() {
                log::error!("Failed to create listen-only event tap");
                unsafe { drop(Box::from_raw(context)) };
                let _ = ready_tx.send(false);
                return;
            }
            unsafe { (*context).tap.store(tap as usize, Ordering::Release) };

            unsafe {
                let source = CFMachPortCreateRunLoopSource(std::ptr::null(), tap, 0);
                let rl = CFRunLoopGetCurrent();
                CFRunLoopAddSource(rl, source, kCFRunLoopCommonModes);
                CGEventTapEnable(tap, true);
                run_loop.store(rl as usize, Ordering::Release);
                let _ = ready_tx.send(true);

                CFRunLoopRun();

                // CFRunLoopStop was called; tear down in reverse order.
                CGEventTapEnable(tap, false);
                CFRelease(source);
                CFRelease(tap);
                drop(Box::from_raw(context));
            }
        });

        let started = ready_rx.recv().unwrap_or(false);
        if !started {
            let _ = thread.join();
            return false;
        }

        self.thread = Some(thread);
        self.running = true;
        log::info!("Event tap started (listen-only)");

        if hide_osd {
            self.hide_native_osd();
        }
        true
    }

    /// Stop observing and restore the native OSD if we hid it. Idempotent,
    /// safe after a failed or never-attempted start.
    pub fn stop(&mut self) {
        if self.running {
            let rl = self.run_loop.swap(0, Ordering::AcqRel) as CFRunLoopRef;
            if !rl.is_null() {
                unsafe { CFRunLoopStop(rl) };
            }
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
            self.running = false;
            log::info!("Event tap stopped");
        }
        self.restore_native_osd();
    }

    /// Non-blocking poll of the next observed key event.
    pub fn poll(&self) -> Option<KeyEvent> {
        self.events_rx.try_recv().ok()
    }

    // -- OSD suppression -----------------------------------------------------

    fn hide_native_osd(&mut self) {
        if self.osd_hidden {
            return;
        }
        match launchctl(&["unload", "-wF", OSD_AGENT_PLIST]) {
            Ok(()) => {
                self.osd_hidden = true;
                log::info!("Native OSD hidden (OSDUIHelper unloaded)");
            }
            Err(err) => log::error!("Failed to hide native OSD: {}", err),
        }
    }

    fn restore_native_osd(&mut self) {
        if !self.osd_hidden {
            return;
        }
        match launchctl(&["load", "-wF", OSD_AGENT_PLIST]) {
            Ok(()) => {
                self.osd_hidden = false;
                log::info!("Native OSD restored (OSDUIHelper reloaded)");
            }
            Err(err) => log::error!("Failed to restore native OSD: {}", err),
        }
    }
}

impl Default for SystemHudInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SystemHudInterceptor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn launchctl(args: &[&str]) -> std::io::Result<()> {
    Command::new("/bin/launchctl")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data1(code: i32, down: bool) -> isize {
        let state: isize = if down { 0x0A } else { 0x0B };
        ((code as isize) << 16) | (state << 8)
    }

    #[test]
    fn decode_volume_up_key_down() {
        let key = decode_system_key(data1(NX_KEYTYPE_SOUND_UP, true));
        assert_eq!(key.code, NX_KEYTYPE_SOUND_UP);
        assert!(key.is_down);
    }

    #[test]
    fn decode_key_up_state() {
        let key = decode_system_key(data1(NX_KEYTYPE_MUTE, false));
        assert_eq!(key.code, NX_KEYTYPE_MUTE);
        assert!(!key.is_down);
    }

    #[test]
    fn only_volume_brightness_and_media_keys_are_watched() {
        for code in [0, 1, 2, 3, 7, 21, 22] {
            assert!(is_watched_key(code), "key {} should be watched", code);
        }
        for code in [4, 5, 6, 8, 16, 20, 23, 100] {
            assert!(!is_watched_key(code), "key {} should pass unobserved", code);
        }
    }

    #[test]
    fn hud_kind_mapping() {
        assert_eq!(hud_kind_for(NX_KEYTYPE_SOUND_DOWN), Some(HudKind::Volume));
        assert_eq!(hud_kind_for(NX_KEYTYPE_MUTE), Some(HudKind::Volume));
        assert_eq!(
            hud_kind_for(NX_KEYTYPE_BRIGHTNESS_UP),
            Some(HudKind::Brightness)
        );
        assert_eq!(
            hud_kind_for(NX_KEYTYPE_ILLUMINATION_DOWN),
            Some(HudKind::KeyboardBacklight)
        );
        assert_eq!(hud_kind_for(99), None);
    }

    #[test]
    fn stop_before_start_is_a_safe_no_op() {
        let mut interceptor = SystemHudInterceptor::new();
        interceptor.stop();
        interceptor.stop();
        assert!(!interceptor.is_running());
        assert!(interceptor.poll().is_none());
    }
}
