//! Window frame derivation and idempotent application.
//!
//! The overlay window always spans the full interactive width (notch plus
//! wings plus a small allowance) so pointer events over the wings reach it in
//! every state; only its height tracks the panel. [`frame_for`] is the pure
//! derivation, [`WindowPresenter`] applies it and skips no-op updates.

use crate::engine::geometry::{NotchGeometry, Rect};
use crate::engine::state::WING_WIDTH;
use crate::window::overlay::OverlayWindow;

/// Horizontal slack beyond the wings so edge pixels still hit the window.
const FRAME_WIDTH_ALLOWANCE: f64 = 40.0;
/// Minimum window width while a HUD slider is visible.
const HUD_MIN_WIDTH: f64 = 320.0;
/// Extra height for the HUD slider row below the panel content.
const HUD_EXTRA_HEIGHT: f64 = 50.0;
/// Bottom margin below the content, larger when expanded so the panel's
/// shadow and overshoot never clip.
const EXPANDED_BOTTOM_MARGIN: f64 = 30.0;
const COMPACT_BOTTOM_MARGIN: f64 = 10.0;
/// How far below the top edge the synthesized pill floats.
const FLOATING_TOP_OFFSET: f64 = 25.0;

/// Compute the overlay window frame for the current engine state.
pub fn frame_for(geo: &NotchGeometry, expanded_height: f64, hud_visible: bool) -> Rect {
    let content_height = geo.notch_height + expanded_height;
    let hud_extra = if hud_visible { HUD_EXTRA_HEIGHT } else { 0.0 };
    let margin = if expanded_height > 0.0 {
        EXPANDED_BOTTOM_MARGIN
    } else {
        COMPACT_BOTTOM_MARGIN
    };
    let height = content_height + hud_extra + margin;

    let full_width = geo.notch_width + WING_WIDTH * 2.0 + FRAME_WIDTH_ALLOWANCE;
    let width = if hud_visible {
        full_width.max(HUD_MIN_WIDTH)
    } else {
        full_width
    };

    let x = (geo.screen_width - width) / 2.0;
    let mut y = geo.screen_height - height;
    if geo.is_floating {
        y -= FLOATING_TOP_OFFSET;
    }

    Rect::new(x, y, width, height)
}

pub struct WindowPresenter {
    overlay: OverlayWindow,
    last_frame: Option<Rect>,
}

impl WindowPresenter {
    pub fn new(overlay: OverlayWindow) -> Self {
        Self {
            overlay,
            last_frame: None,
        }
    }

    pub fn show(&self) {
        self.overlay.show();
    }

    pub fn overlay(&self) -> &OverlayWindow {
        &self.overlay
    }

    /// Derive the frame for the current state and apply it if it differs
    /// from the one already on screen. Safe to call every loop iteration.
    pub fn refresh(&mut self, geo: &NotchGeometry, expanded_height: f64, hud_visible: bool) {
        let frame = frame_for(geo, expanded_height, hud_visible);
        if self.last_frame == Some(frame) {
            return;
        }
        log::debug!(
            "Overlay frame -> ({:.0}, {:.0}) {}x{}",
            frame.x,
            frame.y,
            frame.width,
            frame.height
        );
        self.overlay.set_frame(frame);
        self.last_frame = Some(frame);
    }
}
