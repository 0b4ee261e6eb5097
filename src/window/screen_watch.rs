//! Screen-configuration change notifications.
//!
//! AppKit may deliver the notification several times for one physical change
//! (resolution, arrangement, lid state). The observer only raises a flag; the
//! main loop drains it once per iteration, coalescing the burst into a single
//! geometry re-detection.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use objc2_foundation::{NSNotification, NSNotificationCenter, NSString};

pub struct ScreenWatcher {
    changed: Arc<AtomicBool>,
}

impl ScreenWatcher {
    /// Main thread only (installs a default-center observer). The observer
    /// lives for the rest of the process.
    pub fn new() -> Self {
        let changed = Arc::new(AtomicBool::new(false));

        let flag = changed.clone();
        let block = block2::RcBlock::new(move |_notification: NonNull<NSNotification>| {
            flag.store(true, Ordering::Release);
        });

        let name = NSString::from_str("NSApplicationDidChangeScreenParametersNotification");
        let center = NSNotificationCenter::defaultCenter();
        let _observer = unsafe {
            center.addObserverForName_object_queue_usingBlock(Some(&name), None, None, &block)
        };

        log::info!("Screen watcher started");
        Self { changed }
    }

    /// True once per change burst; clears the flag.
    pub fn take_changed(&self) -> bool {
        self.changed.swap(false, Ordering::AcqRel)
    }
}
