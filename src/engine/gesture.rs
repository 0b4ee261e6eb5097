//! Gesture classification: raw input + zones → transition intents.
//!
//! Classification is a pure function of the current panel state, the current
//! geometry snapshot, and the panel width. Zone rectangles are recomputed for
//! every event so a geometry or state change is never hit-tested against
//! stale bounds.

use crate::engine::geometry::{NotchGeometry, Point};
use crate::engine::state::PanelState;

/// macOS virtual key code for Escape.
pub const ESCAPE_KEY_CODE: u16 = 53;

/// Normalized input from the global and local event monitors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    PointerMoved(Point),
    LeftClick(Point),
    KeyDown(u16),
    /// Reserved (future: volume control by scrolling over the notch).
    Scroll,
}

/// High-level intent the state machine should act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Hover,
    Expand,
    Collapse,
}

/// Classify one input event against the current state and zones.
///
/// The zones nest (notch ⊂ hover ⊂ expanded), forming hysteresis bands: the
/// pointer enters through a small target but must leave through a larger one,
/// which prevents oscillation right at a zone edge.
pub fn classify(
    state: PanelState,
    geo: &NotchGeometry,
    panel_width: f64,
    input: &RawInput,
) -> Option<Intent> {
    match *input {
        RawInput::PointerMoved(point) => classify_pointer(state, geo, panel_width, point),
        RawInput::LeftClick(point) => classify_click(state, geo, panel_width, point),
        RawInput::KeyDown(code) => {
            if code == ESCAPE_KEY_CODE && state != PanelState::Idle {
                Some(Intent::Collapse)
            } else {
                None
            }
        }
        RawInput::Scroll => None,
    }
}

fn classify_pointer(
    state: PanelState,
    geo: &NotchGeometry,
    panel_width: f64,
    point: Point,
) -> Option<Intent> {
    match state {
        PanelState::Idle => geo.hover_zone().contains(point).then_some(Intent::Hover),
        PanelState::Hovering => {
            if geo.notch_zone().contains(point) {
                Some(Intent::Expand)
            } else if !geo.hover_zone().contains(point) {
                Some(Intent::Collapse)
            } else {
                None
            }
        }
        PanelState::Expanded => (!geo.expanded_zone(panel_width).contains(point))
            .then_some(Intent::Collapse),
    }
}

fn classify_click(
    state: PanelState,
    geo: &NotchGeometry,
    panel_width: f64,
    point: Point,
) -> Option<Intent> {
    // Clicks inside the expanded panel are reserved for panel content;
    // clicks elsewhere dismiss it. Other states don't react to clicks here.
    if state != PanelState::Expanded {
        return None;
    }
    (!geo.panel_rect(panel_width).contains(point)).then_some(Intent::Collapse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::state::{MAX_EXPANDED_HEIGHT, WING_WIDTH};

    fn geo() -> NotchGeometry {
        NotchGeometry {
            notch_width: 180.0,
            notch_height: 32.0,
            screen_width: 1512.0,
            screen_height: 982.0,
            notch_min_x: 666.0,
            notch_max_x: 846.0,
            has_notch: true,
            is_floating: false,
        }
    }

    fn expanded_width() -> f64 {
        180.0 + WING_WIDTH * 2.0
    }

    /// A point inside the covered notch area.
    fn in_notch() -> Point {
        Point::new(756.0, 975.0)
    }

    /// Inside the hover band but outside the notch itself (over a wing).
    fn on_wing() -> Point {
        Point::new(660.0, 960.0)
    }

    fn far_away() -> Point {
        Point::new(100.0, 100.0)
    }

    #[test]
    fn idle_pointer_in_hover_zone_requests_hover() {
        let g = geo();
        let input = RawInput::PointerMoved(on_wing());
        assert_eq!(
            classify(PanelState::Idle, &g, 180.0, &input),
            Some(Intent::Hover)
        );
    }

    #[test]
    fn idle_pointer_elsewhere_does_nothing() {
        let g = geo();
        let input = RawInput::PointerMoved(far_away());
        assert_eq!(classify(PanelState::Idle, &g, 180.0, &input), None);
    }

    #[test]
    fn hovering_pointer_over_notch_requests_expand() {
        let g = geo();
        let input = RawInput::PointerMoved(in_notch());
        assert_eq!(
            classify(PanelState::Hovering, &g, expanded_width(), &input),
            Some(Intent::Expand)
        );
    }

    #[test]
    fn hovering_pointer_on_wing_stays_put() {
        let g = geo();
        let input = RawInput::PointerMoved(on_wing());
        assert_eq!(
            classify(PanelState::Hovering, &g, expanded_width(), &input),
            None
        );
    }

    #[test]
    fn hovering_pointer_leaving_band_requests_collapse() {
        let g = geo();
        let input = RawInput::PointerMoved(far_away());
        assert_eq!(
            classify(PanelState::Hovering, &g, expanded_width(), &input),
            Some(Intent::Collapse)
        );
    }

    #[test]
    fn expanded_pointer_below_panel_requests_collapse() {
        let g = geo();
        let below = Point::new(756.0, 982.0 - 32.0 - MAX_EXPANDED_HEIGHT - 50.0);
        let input = RawInput::PointerMoved(below);
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            Some(Intent::Collapse)
        );
    }

    #[test]
    fn expanded_pointer_inside_zone_stays_expanded() {
        let g = geo();
        let inside = Point::new(756.0, 982.0 - 100.0);
        let input = RawInput::PointerMoved(inside);
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            None
        );
    }

    #[test]
    fn expanded_click_outside_panel_requests_collapse() {
        let g = geo();
        let input = RawInput::LeftClick(far_away());
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            Some(Intent::Collapse)
        );
    }

    #[test]
    fn expanded_click_inside_panel_is_ignored() {
        let g = geo();
        let input = RawInput::LeftClick(Point::new(756.0, 982.0 - 100.0));
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            None
        );
    }

    #[test]
    fn click_in_idle_or_hovering_is_ignored() {
        let g = geo();
        let input = RawInput::LeftClick(far_away());
        assert_eq!(classify(PanelState::Idle, &g, 180.0, &input), None);
        assert_eq!(
            classify(PanelState::Hovering, &g, expanded_width(), &input),
            None
        );
    }

    #[test]
    fn escape_collapses_any_non_idle_state() {
        let g = geo();
        let input = RawInput::KeyDown(ESCAPE_KEY_CODE);
        assert_eq!(classify(PanelState::Idle, &g, 180.0, &input), None);
        assert_eq!(
            classify(PanelState::Hovering, &g, expanded_width(), &input),
            Some(Intent::Collapse)
        );
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            Some(Intent::Collapse)
        );
    }

    #[test]
    fn other_keys_are_ignored() {
        let g = geo();
        let input = RawInput::KeyDown(12);
        assert_eq!(
            classify(PanelState::Expanded, &g, expanded_width(), &input),
            None
        );
    }
}
