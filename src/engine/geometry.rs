//! Notch geometry detection and interaction-zone math.
//!
//! Geometry is always read from screens[0] (the built-in display) rather than
//! the focused screen, so multi-monitor setups don't flip between notched and
//! notch-less geometry as focus moves. Displays without a notch get a small
//! synthesized "floating pill" at the top center so the rest of the engine
//! can treat both cases uniformly.

use objc2::{msg_send, sel, MainThreadMarker};
use objc2_app_kit::NSScreen;
use objc2_foundation::{NSEdgeInsets, NSRect};

use crate::engine::state::{MAX_EXPANDED_HEIGHT, WING_WIDTH};

/// Estimated notch width when the auxiliary top areas are unavailable.
pub const ESTIMATED_NOTCH_WIDTH: f64 = 180.0;
/// Synthesized pill dimensions for displays without a physical notch.
pub const FLOATING_WIDTH: f64 = 200.0;
pub const FLOATING_HEIGHT: f64 = 8.0;
/// Screen dimensions assumed when no display is available at all.
const FALLBACK_SCREEN_WIDTH: f64 = 1440.0;
const FALLBACK_SCREEN_HEIGHT: f64 = 900.0;

/// Vertical slack below the notch that still counts as hovering.
const HOVER_ZONE_PAD: f64 = 5.0;
/// Extra width/height around the expanded panel before the pointer is
/// considered to have left it.
const EXPANDED_ZONE_WIDTH_PAD: f64 = 40.0;
const EXPANDED_ZONE_HEIGHT_PAD: f64 = 10.0;

/// A point in screen coordinates (bottom-left origin, like NSEvent).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle in screen coordinates (bottom-left origin).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x
            && p.x <= self.x + self.width
            && p.y >= self.y
            && p.y <= self.y + self.height
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// True if `other` lies entirely inside `self`.
    pub fn encloses(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.max_x() <= self.max_x()
            && other.max_y() <= self.max_y()
    }
}

/// Immutable snapshot of the built-in display's notch geometry.
///
/// Recomputed on every screen-configuration change; the new snapshot replaces
/// the old one in a single main-thread assignment, so consumers never observe
/// a partial update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NotchGeometry {
    pub notch_width: f64,
    pub notch_height: f64,
    pub screen_width: f64,
    pub screen_height: f64,
    pub notch_min_x: f64,
    pub notch_max_x: f64,
    pub has_notch: bool,
    pub is_floating: bool,
}

impl NotchGeometry {
    /// Read the current geometry from the built-in display.
    ///
    /// Main thread only (reads NSScreen). Never fails: a display without a
    /// safe-area inset yields floating-pill geometry, and a machine with no
    /// screens at all yields a synthetic floating fallback.
    pub fn detect(mtm: MainThreadMarker) -> Self {
        let Some(screen) = NSScreen::screens(mtm).firstObject() else {
            log::warn!("No screens available, using fallback geometry");
            return Self::compute(
                FALLBACK_SCREEN_WIDTH,
                FALLBACK_SCREEN_HEIGHT,
                0.0,
                None,
                None,
            );
        };

        let frame = screen.frame();

        // safeAreaInsets and the auxiliary top areas are macOS 12+; probe at
        // runtime so older systems degrade to floating mode.
        let safe_top = unsafe {
            if msg_send![&screen, respondsToSelector: sel!(safeAreaInsets)] {
                let insets: NSEdgeInsets = msg_send![&screen, safeAreaInsets];
                insets.top
            } else {
                0.0
            }
        };

        let left_aux = unsafe {
            if msg_send![&screen, respondsToSelector: sel!(auxiliaryTopLeftArea)] {
                let r: NSRect = msg_send![&screen, auxiliaryTopLeftArea];
                Some(Rect::new(
                    r.origin.x,
                    r.origin.y,
                    r.size.width,
                    r.size.height,
                ))
            } else {
                None
            }
        };
        let right_aux = unsafe {
            if msg_send![&screen, respondsToSelector: sel!(auxiliaryTopRightArea)] {
                let r: NSRect = msg_send![&screen, auxiliaryTopRightArea];
                Some(Rect::new(
                    r.origin.x,
                    r.origin.y,
                    r.size.width,
                    r.size.height,
                ))
            } else {
                None
            }
        };

        Self::compute(
            frame.size.width,
            frame.size.height,
            safe_top,
            left_aux,
            right_aux,
        )
    }

    /// Pure geometry derivation from raw display measurements.
    fn compute(
        screen_width: f64,
        screen_height: f64,
        safe_top: f64,
        left_aux: Option<Rect>,
        right_aux: Option<Rect>,
    ) -> Self {
        let mid_x = screen_width / 2.0;

        if safe_top > 0.0 {
            // Physical notch: the auxiliary areas flank it, so the notch spans
            // from the left area's right edge to the right area's left edge.
            let (notch_min_x, notch_max_x) = match (left_aux, right_aux) {
                (Some(left), Some(right)) if left.width > 0.0 && right.width > 0.0 => {
                    (left.max_x(), right.x)
                }
                _ => (
                    mid_x - ESTIMATED_NOTCH_WIDTH / 2.0,
                    mid_x + ESTIMATED_NOTCH_WIDTH / 2.0,
                ),
            };

            Self {
                notch_width: notch_max_x - notch_min_x,
                notch_height: safe_top,
                screen_width,
                screen_height,
                notch_min_x,
                notch_max_x,
                has_notch: true,
                is_floating: false,
            }
        } else {
            // No notch: synthesize a floating pill at the top center.
            Self {
                notch_width: FLOATING_WIDTH,
                notch_height: FLOATING_HEIGHT,
                screen_width,
                screen_height,
                notch_min_x: mid_x - FLOATING_WIDTH / 2.0,
                notch_max_x: mid_x + FLOATING_WIDTH / 2.0,
                has_notch: false,
                is_floating: true,
            }
        }
    }

    // Zones are derived on demand from the current snapshot, never cached, so
    // a geometry or panel-width change is reflected on the very next event.

    /// The covered notch area itself. Hovering here expands the panel.
    pub fn notch_zone(&self) -> Rect {
        let mid_x = self.screen_width / 2.0;
        Rect::new(
            mid_x - self.notch_width / 2.0,
            self.screen_height - self.notch_height,
            self.notch_width,
            self.notch_height,
        )
    }

    /// Wider band around the notch. Entering it from idle starts a hover;
    /// leaving it while hovering collapses. Strictly larger than
    /// [`Self::notch_zone`] so the two form a hysteresis pair.
    pub fn hover_zone(&self) -> Rect {
        let mid_x = self.screen_width / 2.0;
        Rect::new(
            mid_x - (self.notch_width / 2.0 + WING_WIDTH),
            self.screen_height - self.notch_height - HOVER_ZONE_PAD,
            self.notch_width + WING_WIDTH * 2.0,
            self.notch_height + HOVER_ZONE_PAD,
        )
    }

    /// The area the pointer may roam while the panel stays expanded.
    /// Largest of the three zones.
    pub fn expanded_zone(&self, panel_width: f64) -> Rect {
        let mid_x = self.screen_width / 2.0;
        let width = panel_width + EXPANDED_ZONE_WIDTH_PAD;
        Rect::new(
            mid_x - width / 2.0,
            self.screen_height - self.notch_height - MAX_EXPANDED_HEIGHT,
            width,
            MAX_EXPANDED_HEIGHT + self.notch_height + EXPANDED_ZONE_HEIGHT_PAD,
        )
    }

    /// The expanded panel rectangle itself (no slack). Clicks outside it
    /// collapse the panel; clicks inside are reserved for panel content.
    pub fn panel_rect(&self, panel_width: f64) -> Rect {
        let mid_x = self.screen_width / 2.0;
        Rect::new(
            mid_x - panel_width / 2.0,
            self.screen_height - self.notch_height - MAX_EXPANDED_HEIGHT,
            panel_width,
            MAX_EXPANDED_HEIGHT + self.notch_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notched() -> NotchGeometry {
        NotchGeometry::compute(
            1512.0,
            982.0,
            32.0,
            Some(Rect::new(0.0, 950.0, 666.0, 32.0)),
            Some(Rect::new(846.0, 950.0, 666.0, 32.0)),
        )
    }

    #[test]
    fn physical_notch_from_auxiliary_areas() {
        let geo = notched();
        assert!(geo.has_notch);
        assert!(!geo.is_floating);
        assert_eq!(geo.notch_min_x, 666.0);
        assert_eq!(geo.notch_max_x, 846.0);
        assert_eq!(geo.notch_width, 180.0);
        assert_eq!(geo.notch_height, 32.0);
    }

    #[test]
    fn notch_width_estimated_without_auxiliary_areas() {
        let geo = NotchGeometry::compute(1512.0, 982.0, 32.0, None, None);
        assert!(geo.has_notch);
        assert_eq!(geo.notch_width, ESTIMATED_NOTCH_WIDTH);
        assert_eq!(geo.notch_min_x, 756.0 - 90.0);
        assert_eq!(geo.notch_max_x, 756.0 + 90.0);
    }

    #[test]
    fn no_safe_area_yields_floating_pill() {
        let geo = NotchGeometry::compute(1920.0, 1080.0, 0.0, None, None);
        assert!(!geo.has_notch);
        assert!(geo.is_floating);
        assert_eq!(geo.notch_width, FLOATING_WIDTH);
        assert_eq!(geo.notch_height, FLOATING_HEIGHT);
    }

    #[test]
    fn geometry_invariants_hold() {
        for geo in [
            notched(),
            NotchGeometry::compute(1512.0, 982.0, 32.0, None, None),
            NotchGeometry::compute(1920.0, 1080.0, 0.0, None, None),
        ] {
            assert!(geo.notch_max_x > geo.notch_min_x);
            assert_eq!(geo.is_floating, !geo.has_notch);
        }
    }

    #[test]
    fn hover_zone_encloses_notch_zone() {
        let geo = notched();
        assert!(geo.hover_zone().encloses(&geo.notch_zone()));
    }

    #[test]
    fn expanded_zone_encloses_hover_zone() {
        let geo = notched();
        let expanded_width = geo.notch_width + WING_WIDTH * 2.0;
        assert!(geo.expanded_zone(expanded_width).encloses(&geo.hover_zone()));
    }

    #[test]
    fn zones_track_geometry_change() {
        let before = notched();
        let after = NotchGeometry::compute(1920.0, 1080.0, 0.0, None, None);
        assert_ne!(before.notch_zone(), after.notch_zone());
        assert_ne!(before.hover_zone(), after.hover_zone());
    }

    #[test]
    fn rect_contains_edges() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains(Point::new(10.0, 10.0)));
        assert!(r.contains(Point::new(30.0, 30.0)));
        assert!(!r.contains(Point::new(30.1, 30.0)));
    }
}
