//! Global and local NSEvent monitors feeding the gesture classifier.
//!
//! Both monitors are pure producers: they normalize the event and send it
//! over a channel for the main loop to classify. The local monitor returns
//! every event untouched so panel content still receives its clicks.

use std::sync::mpsc::Sender;

use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2::{msg_send, ClassType};
use objc2_app_kit::{NSEvent, NSEventMask, NSEventType};

use crate::engine::geometry::Point;
use crate::engine::gesture::RawInput;

pub struct InputMonitor {
    global_monitor: Retained<AnyObject>,
    local_monitor: Option<Retained<AnyObject>>,
}

impl InputMonitor {
    /// Install the monitors. The global one sees pointer events headed for
    /// other apps; the local one sees events for the overlay window itself,
    /// including key-downs once the window is key.
    pub fn new(events: Sender<RawInput>) -> Option<Self> {
        let pointer_mask = NSEventMask::MouseMoved | NSEventMask::LeftMouseDown;

        let global_tx = events.clone();
        let global_handler = block2::RcBlock::new(move |event: &NSEvent| {
            if let Some(input) = normalize(event) {
                let _ = global_tx.send(input);
            }
        });
        let global_monitor: Option<Retained<AnyObject>> = unsafe {
            msg_send![
                NSEvent::class(),
                addGlobalMonitorForEventsMatchingMask: pointer_mask,
                handler: &*global_handler
            ]
        };
        let Some(global_monitor) = global_monitor else {
            log::error!("Failed to create global input monitor");
            return None;
        };

        let local_mask = pointer_mask | NSEventMask::KeyDown | NSEventMask::ScrollWheel;
        let local_tx = events;
        let local_handler = block2::RcBlock::new(move |event: &NSEvent| -> *mut NSEvent {
            if let Some(input) = normalize(event) {
                let _ = local_tx.send(input);
            }
            event as *const NSEvent as *mut NSEvent
        });
        let local_monitor: Option<Retained<AnyObject>> = unsafe {
            msg_send![
                NSEvent::class(),
                addLocalMonitorForEventsMatchingMask: local_mask,
                handler: &*local_handler
            ]
        };
        if local_monitor.is_none() {
            log::warn!("Failed to create local input monitor; Escape and in-window events lost");
        }

        log::info!(
            "Input monitors started (global + local={})",
            local_monitor.is_some()
        );
        Some(Self {
            global_monitor,
            local_monitor,
        })
    }
}

fn normalize(event: &NSEvent) -> Option<RawInput> {
    // mouseLocation is screen-global regardless of which window (if any) the
    // event belongs to, unlike locationInWindow.
    let location = || {
        let p = NSEvent::mouseLocation();
        Point::new(p.x, p.y)
    };

    match event.r#type() {
        NSEventType::MouseMoved => Some(RawInput::PointerMoved(location())),
        NSEventType::LeftMouseDown => Some(RawInput::LeftClick(location())),
        NSEventType::KeyDown => Some(RawInput::KeyDown(unsafe { event.keyCode() })),
        NSEventType::ScrollWheel => Some(RawInput::Scroll),
        _ => None,
    }
}

impl Drop for InputMonitor {
    fn drop(&mut self) {
        unsafe {
            let _: () = msg_send![
                NSEvent::class(),
                removeMonitor: &*self.global_monitor
            ];
            if let Some(ref local) = self.local_monitor {
                let _: () = msg_send![
                    NSEvent::class(),
                    removeMonitor: &**local
                ];
            }
        }
        log::info!("Input monitors stopped");
    }
}
