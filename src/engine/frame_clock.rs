//! Shared display-refresh clock.
//!
//! One CVDisplayLink serves every consumer that needs per-frame updates
//! (visualizers, progress bars, marquee text). The link starts when the first
//! subscriber registers and stops when the last one leaves, so idle CPU usage
//! is zero. The link's high-priority thread only computes the frame delta and
//! sends it over a channel; callbacks run on the main thread when the main
//! loop calls [`FrameClock::pump`].

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Opaque subscription identity; required to unsubscribe.
pub type SubscriberToken = u64;

type FrameCallback = Arc<dyn Fn(f64)>;

/// Source of per-frame deltas. Production uses [`DisplayLinkDriver`]; tests
/// substitute a recording fake.
pub trait TickDriver {
    /// Begin delivering frame deltas (seconds) into `ticks`.
    /// Returns false if the underlying timer could not be created.
    fn start(&mut self, ticks: Sender<f64>) -> bool;
    fn stop(&mut self);
}

struct Subscribers {
    map: HashMap<SubscriberToken, FrameCallback>,
    next_token: SubscriberToken,
}

pub struct FrameClock {
    // The only engine-internal lock; held for map mutation and snapshot,
    // never across callback invocation.
    subscribers: Mutex<Subscribers>,
    driver: RefCell<Box<dyn TickDriver>>,
    running: Cell<bool>,
    ticks_tx: Sender<f64>,
    ticks_rx: Receiver<f64>,
}

impl FrameClock {
    pub fn new(driver: Box<dyn TickDriver>) -> Self {
        let (ticks_tx, ticks_rx) = channel();
        Self {
            subscribers: Mutex::new(Subscribers {
                map: HashMap::new(),
                next_token: 1,
            }),
            driver: RefCell::new(driver),
            running: Cell::new(false),
            ticks_tx,
            ticks_rx,
        }
    }

    /// Register a per-frame callback; starts the underlying timer if this is
    /// the first subscriber. The callback receives the elapsed time (seconds)
    /// since the previous frame.
    pub fn subscribe(&self, callback: impl Fn(f64) + 'static) -> SubscriberToken {
        let token;
        let first = {
            let mut subs = self.subscribers.lock().unwrap();
            token = subs.next_token;
            subs.next_token += 1;
            subs.map.insert(token, Arc::new(callback));
            subs.map.len() == 1
        };

        if first && !self.running.get() {
            if self.driver.borrow_mut().start(self.ticks_tx.clone()) {
                self.running.set(true);
            } else {
                log::error!("Frame clock failed to start its tick driver");
            }
        }
        token
    }

    /// Remove a subscriber; stops the underlying timer when the set becomes
    /// empty. Unknown tokens are a no-op, so double-unsubscribe is safe.
    pub fn unsubscribe(&self, token: SubscriberToken) {
        let empty = {
            let mut subs = self.subscribers.lock().unwrap();
            subs.map.remove(&token);
            subs.map.is_empty()
        };

        if empty && self.running.get() {
            self.driver.borrow_mut().stop();
            self.running.set(false);
            // Discard ticks that were already in flight.
            while self.ticks_rx.try_recv().is_ok() {}
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().map.len()
    }

    /// Drain pending ticks and invoke subscribers. Main loop only.
    ///
    /// The subscriber set is snapshotted under the lock and the lock released
    /// before invocation, so a callback may freely subscribe or unsubscribe.
    pub fn pump(&self) {
        while let Ok(delta) = self.ticks_rx.try_recv() {
            let callbacks: Vec<FrameCallback> = {
                let subs = self.subscribers.lock().unwrap();
                subs.map.values().cloned().collect()
            };
            for callback in callbacks {
                callback(delta);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CVDisplayLink driver
// ---------------------------------------------------------------------------

type CVDisplayLinkRef = *mut c_void;
type CVReturn = i32;

#[repr(C)]
#[derive(Clone, Copy)]
struct CVSMPTETime {
    subframes: i16,
    subframe_divisor: i16,
    counter: u32,
    time_type: u32,
    flags: u32,
    hours: i16,
    minutes: i16,
    seconds: i16,
    frames: i16,
}

#[repr(C)]
#[derive(Clone, Copy)]
struct CVTimeStamp {
    version: u32,
    video_time_scale: i32,
    video_time: i64,
    host_time: u64,
    rate_scalar: f64,
    video_refresh_period: i64,
    smpte_time: CVSMPTETime,
    flags: u64,
    reserved: u64,
}

type CVDisplayLinkOutputCallback = unsafe extern "C" fn(
    display_link: CVDisplayLinkRef,
    in_now: *const CVTimeStamp,
    in_output_time: *const CVTimeStamp,
    flags_in: u64,
    flags_out: *mut u64,
    context: *mut c_void,
) -> CVReturn;

#[link(name = "CoreVideo", kind = "framework")]
unsafe extern "C" {
    fn CVDisplayLinkCreateWithActiveCGDisplays(out: *mut CVDisplayLinkRef) -> CVReturn;
    fn CVDisplayLinkSetOutputCallback(
        link: CVDisplayLinkRef,
        callback: CVDisplayLinkOutputCallback,
        user_info: *mut c_void,
    ) -> CVReturn;
    fn CVDisplayLinkStart(link: CVDisplayLinkRef) -> CVReturn;
    fn CVDisplayLinkStop(link: CVDisplayLinkRef) -> CVReturn;
    fn CVDisplayLinkRelease(link: CVDisplayLinkRef);
    fn CVDisplayLinkGetActualOutputVideoRefreshPeriod(link: CVDisplayLinkRef) -> f64;
}

#[repr(C)]
struct MachTimebaseInfo {
    numer: u32,
    denom: u32,
}

unsafe extern "C" {
    fn mach_timebase_info(info: *mut MachTimebaseInfo) -> i32;
}

/// Data the C callback needs, owned explicitly and reclaimed at stop.
struct TickContext {
    ticks: Sender<f64>,
    link: AtomicUsize,
    last_host_time: AtomicU64,
}

unsafe extern "C" fn display_link_fired(
    _link: CVDisplayLinkRef,
    in_now: *const CVTimeStamp,
    _in_output_time: *const CVTimeStamp,
    _flags_in: u64,
    _flags_out: *mut u64,
    context: *mut c_void,
) -> CVReturn {
    if context.is_null() || in_now.is_null() {
        return 0;
    }
    let ctx = unsafe { &*(context as *const TickContext) };
    let host_time = unsafe { (*in_now).host_time };
    let last = ctx.last_host_time.swap(host_time, Ordering::Relaxed);

    let delta = if last == 0 {
        // First frame: fall back to the nominal refresh period.
        let link = ctx.link.load(Ordering::Relaxed) as CVDisplayLinkRef;
        let period = unsafe { CVDisplayLinkGetActualOutputVideoRefreshPeriod(link) };
        if period > 0.0 {
            period
        } else {
            1.0 / 60.0
        }
    } else {
        // host_time is in mach_absolute_time units; convert to seconds.
        let mut info = MachTimebaseInfo { numer: 0, denom: 0 };
        unsafe { mach_timebase_info(&mut info) };
        let nanos =
            host_time.saturating_sub(last) * u64::from(info.numer) / u64::from(info.denom);
        nanos as f64 / 1_000_000_000.0
    };

    // Never block the CV thread; the main loop drains at its own pace.
    let _ = ctx.ticks.send(delta);
    0
}

/// Hardware display-refresh tick source.
pub struct DisplayLinkDriver {
    link: CVDisplayLinkRef,
    context: *mut TickContext,
}

impl DisplayLinkDriver {
    pub fn new() -> Self {
        Self {
            link: std::ptr::null_mut(),
            context: std::ptr::null_mut(),
        }
    }
}

impl Default for DisplayLinkDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl TickDriver for DisplayLinkDriver {
    fn start(&mut self, ticks: Sender<f64>) -> bool {
        if !self.link.is_null() {
            return true;
        }

        let mut link: CVDisplayLinkRef = std::ptr::null_mut();
        let status = unsafe { CVDisplayLinkCreateWithActiveCGDisplays(&mut link) };
        if status != 0 || link.is_null() {
            log::error!("CVDisplayLinkCreateWithActiveCGDisplays failed: {}", status);
            return false;
        }

        let context = Box::into_raw(Box::new(TickContext {
            ticks,
            link: AtomicUsize::new(link as usize),
            last_host_time: AtomicU64::new(0),
        }));

        unsafe {
            CVDisplayLinkSetOutputCallback(link, display_link_fired, context as *mut c_void);
            CVDisplayLinkStart(link);
        }

        self.link = link;
        self.context = context;
        log::info!("Display link started");
        true
    }

    fn stop(&mut self) {
        if self.link.is_null() {
            return;
        }
        unsafe {
            CVDisplayLinkStop(self.link);
            CVDisplayLinkRelease(self.link);
            drop(Box::from_raw(self.context));
        }
        self.link = std::ptr::null_mut();
        self.context = std::ptr::null_mut();
        log::info!("Display link stopped");
    }
}

impl Drop for DisplayLinkDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
