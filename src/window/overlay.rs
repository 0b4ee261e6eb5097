//! The borderless always-on-top overlay window.

use objc2::rc::Retained;
use objc2::{define_class, msg_send, MainThreadMarker, MainThreadOnly};
use objc2_app_kit::{
    NSBackingStoreType, NSColor, NSWindow, NSWindowAnimationBehavior, NSWindowCollectionBehavior,
    NSWindowStyleMask,
};
use objc2_foundation::{NSPoint, NSRect, NSSize, NSString};

use crate::engine::geometry::Rect;

/// One above NSStatusWindowLevel so the panel draws over the menu bar.
const OVERLAY_WINDOW_LEVEL: isize = 26;

// Custom NSWindow subclass: a borderless window refuses key status by
// default, but Escape handling needs it.
define_class!(
    #[unsafe(super(NSWindow))]
    #[thread_kind = MainThreadOnly]
    #[name = "NotchlingOverlayWindow"]
    struct RawOverlayWindow;

    impl RawOverlayWindow {
        #[unsafe(method(canBecomeKeyWindow))]
        fn can_become_key_window(&self) -> bool {
            true
        }

        #[unsafe(method(canBecomeMainWindow))]
        fn can_become_main_window(&self) -> bool {
            false
        }
    }
);

impl RawOverlayWindow {
    fn new(mtm: MainThreadMarker, frame: NSRect, style: NSWindowStyleMask) -> Retained<Self> {
        unsafe {
            msg_send![
                Self::alloc(mtm),
                initWithContentRect: frame,
                styleMask: style,
                backing: NSBackingStoreType::Buffered,
                defer: false
            ]
        }
    }
}

pub struct OverlayWindow {
    pub window: Retained<NSWindow>,
}

impl OverlayWindow {
    pub fn new(mtm: MainThreadMarker, frame: Rect) -> Self {
        let ns_frame = to_ns_rect(frame);
        log::debug!(
            "Creating overlay window at ({}, {}) size {}x{}",
            ns_frame.origin.x,
            ns_frame.origin.y,
            ns_frame.size.width,
            ns_frame.size.height
        );

        let raw = RawOverlayWindow::new(mtm, ns_frame, NSWindowStyleMask::Borderless);
        let window: Retained<NSWindow> = unsafe { Retained::cast_unchecked(raw) };

        window.setLevel(OVERLAY_WINDOW_LEVEL);

        // Follow the user to every space and fullscreen app; never move with
        // Mission Control.
        window.setCollectionBehavior(
            NSWindowCollectionBehavior::CanJoinAllSpaces
                | NSWindowCollectionBehavior::Stationary
                | NSWindowCollectionBehavior::FullScreenAuxiliary
                | NSWindowCollectionBehavior::IgnoresCycle,
        );

        // Transparent chrome; content draws its own shape. Frame changes are
        // animated by the engine's own tokens, so the implicit window
        // animation stays off.
        window.setOpaque(false);
        window.setHasShadow(false);
        let clear_color = NSColor::clearColor();
        window.setBackgroundColor(Some(&clear_color));
        window.setAnimationBehavior(NSWindowAnimationBehavior::None);

        window.setExcludedFromWindowsMenu(true);
        window.setIgnoresMouseEvents(false);
        window.setAcceptsMouseMovedEvents(true);

        window.setTitle(&NSString::from_str("Notchling"));

        Self { window }
    }

    pub fn show(&self) {
        self.window.orderFrontRegardless();
    }

    pub fn set_frame(&self, frame: Rect) {
        unsafe {
            let _: () = msg_send![
                &self.window,
                setFrame: to_ns_rect(frame),
                display: true
            ];
        }
    }

    pub fn set_content_view(&self, view: &objc2_app_kit::NSView) {
        self.window.setContentView(Some(view));
    }
}

fn to_ns_rect(r: Rect) -> NSRect {
    NSRect::new(NSPoint::new(r.x, r.y), NSSize::new(r.width, r.height))
}
