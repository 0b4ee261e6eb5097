//! Panel state machine: Idle / Hovering / Expanded.
//!
//! All entry points are main-thread only by contract; callers on other
//! threads must forward through a channel first. Requests against an invalid
//! source state are silently ignored — multiple input sources race to request
//! transitions and losing that race is normal, not an error.

use std::time::Instant;

use crate::engine::animation::{self, AnimationToken, HOVER_DEBOUNCE};
use crate::engine::event_bus::{EngineEvent, EventBus};
use crate::engine::geometry::NotchGeometry;

/// Width of each wing region flanking the notch while hovering/expanded.
pub const WING_WIDTH: f64 = 120.0;
/// Height of the drop-down panel below the notch when expanded.
pub const MAX_EXPANDED_HEIGHT: f64 = 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Idle,
    Hovering,
    Expanded,
}

/// Owns the presentation state and the authoritative panel dimensions.
pub struct PanelStateMachine {
    state: PanelState,
    previous: PanelState,
    geometry: NotchGeometry,
    panel_width: f64,
    expanded_height: f64,
    animations_enabled: bool,
    last_animation: Option<AnimationToken>,
    /// Deadline of the pending hover debounce, if one is armed.
    pending_hover: Option<Instant>,
    bus: EventBus,
}

impl PanelStateMachine {
    pub fn new(geometry: NotchGeometry, animations_enabled: bool, bus: EventBus) -> Self {
        let mut machine = Self {
            state: PanelState::Idle,
            previous: PanelState::Idle,
            geometry,
            panel_width: 0.0,
            expanded_height: 0.0,
            animations_enabled,
            last_animation: None,
            pending_hover: None,
            bus,
        };
        machine.update_panel_dimensions();
        machine
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    /// Previous state, retained for diagnostics.
    pub fn previous_state(&self) -> PanelState {
        self.previous
    }

    pub fn geometry(&self) -> NotchGeometry {
        self.geometry
    }

    pub fn panel_width(&self) -> f64 {
        self.panel_width
    }

    pub fn expanded_height(&self) -> f64 {
        self.expanded_height
    }

    /// Animation chosen for the most recent accepted transition, if
    /// animations were enabled at that time.
    pub fn last_animation(&self) -> Option<AnimationToken> {
        self.last_animation
    }

    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.animations_enabled = enabled;
    }

    /// Replace the geometry snapshot and recompute dimensions for the
    /// current state. Called on screen-configuration changes.
    pub fn set_geometry(&mut self, geometry: NotchGeometry) {
        self.geometry = geometry;
        self.update_panel_dimensions();
    }

    // -- Transition requests ------------------------------------------------

    /// Idle → Hovering after a short debounce. A repeat call before the
    /// debounce elapses restarts it; anything else cancels it.
    pub fn hover(&mut self) {
        self.hover_at(Instant::now());
    }

    /// Hovering → Expanded, immediately. A click or shortcut is an explicit
    /// request, so no debounce.
    pub fn expand(&mut self) {
        if self.state != PanelState::Hovering {
            return;
        }
        self.pending_hover = None;
        self.transition(PanelState::Expanded);
    }

    /// Hovering/Expanded → Idle, immediately. Also the universal recovery
    /// action: safe to call from any state.
    pub fn collapse(&mut self) {
        self.pending_hover = None;
        self.transition(PanelState::Idle);
    }

    /// Hovering → expand, Expanded → collapse, Idle → no-op.
    pub fn toggle_expand(&mut self) {
        match self.state {
            PanelState::Hovering => self.expand(),
            PanelState::Expanded => self.collapse(),
            PanelState::Idle => {}
        }
    }

    /// Apply any elapsed debounce deadline. Driven from the main loop.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn hover_at(&mut self, now: Instant) {
        if self.state != PanelState::Idle {
            return;
        }
        self.pending_hover = Some(now + HOVER_DEBOUNCE);
    }

    fn tick_at(&mut self, now: Instant) {
        if let Some(deadline) = self.pending_hover {
            if now >= deadline {
                self.pending_hover = None;
                self.transition(PanelState::Hovering);
            }
        }
    }

    // -- Internals ----------------------------------------------------------

    fn transition(&mut self, to: PanelState) {
        if to == self.state {
            return;
        }

        use PanelState::{Expanded, Hovering, Idle};
        let valid = matches!(
            (self.state, to),
            (Idle, Hovering)
                | (Hovering, Expanded)
                | (Hovering, Idle)
                | (Expanded, Hovering)
                | (Expanded, Idle)
        );
        if !valid {
            log::debug!("Rejected transition {:?} -> {:?}", self.state, to);
            return;
        }

        self.previous = self.state;
        self.state = to;
        self.update_panel_dimensions();

        self.last_animation = if self.animations_enabled {
            Some(match to {
                Idle => animation::COLLAPSE,
                Hovering => animation::EXPAND_HOVER,
                Expanded => animation::EXPAND_CLICK,
            })
        } else {
            None
        };

        log::debug!("Panel state {:?} -> {:?}", self.previous, self.state);
        self.bus.publish(EngineEvent::StateChanged(to));
    }

    fn update_panel_dimensions(&mut self) {
        match self.state {
            PanelState::Idle => {
                self.expanded_height = 0.0;
                self.panel_width = self.geometry.notch_width;
            }
            PanelState::Hovering => {
                self.expanded_height = 0.0;
                self.panel_width = self.geometry.notch_width + WING_WIDTH * 2.0;
            }
            PanelState::Expanded => {
                self.expanded_height = MAX_EXPANDED_HEIGHT;
                self.panel_width = self.geometry.notch_width + WING_WIDTH * 2.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::event_bus::EventBus;
    use std::time::Duration;

    fn geometry() -> NotchGeometry {
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

    fn machine(bus: &EventBus) -> PanelStateMachine {
        PanelStateMachine::new(geometry(), true, bus.clone())
    }

    /// Drive hover through its debounce deterministically.
    fn hover_and_settle(m: &mut PanelStateMachine) {
        let now = Instant::now();
        m.hover_at(now);
        m.tick_at(now + HOVER_DEBOUNCE);
    }

    #[test]
    fn initial_state_is_idle() {
        let bus = EventBus::new();
        let m = machine(&bus);
        assert_eq!(m.state(), PanelState::Idle);
        assert_eq!(m.panel_width(), 180.0);
        assert_eq!(m.expanded_height(), 0.0);
    }

    #[test]
    fn hover_fires_after_debounce() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        let now = Instant::now();
        m.hover_at(now);
        assert_eq!(m.state(), PanelState::Idle);
        m.tick_at(now + Duration::from_millis(10));
        assert_eq!(m.state(), PanelState::Idle);
        m.tick_at(now + Duration::from_millis(60));
        assert_eq!(m.state(), PanelState::Hovering);
    }

    #[test]
    fn hover_fires_exactly_once() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut m = machine(&bus);
        let now = Instant::now();
        m.hover_at(now);
        m.tick_at(now + Duration::from_millis(60));
        m.tick_at(now + Duration::from_millis(120));
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::StateChanged(PanelState::Hovering)
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn repeat_hover_restarts_debounce() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        let now = Instant::now();
        m.hover_at(now);
        m.hover_at(now + Duration::from_millis(40));
        // Original deadline has passed, restarted one has not.
        m.tick_at(now + Duration::from_millis(60));
        assert_eq!(m.state(), PanelState::Idle);
        m.tick_at(now + Duration::from_millis(95));
        assert_eq!(m.state(), PanelState::Hovering);
    }

    #[test]
    fn collapse_within_debounce_cancels_hover() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut m = machine(&bus);
        let now = Instant::now();
        m.hover_at(now);
        m.collapse();
        m.tick_at(now + Duration::from_millis(100));
        assert_eq!(m.state(), PanelState::Idle);
        // Canceled debounce produces zero observable effect.
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn expand_from_idle_is_a_no_op() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut m = machine(&bus);
        m.expand();
        assert_eq!(m.state(), PanelState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn expand_from_hovering_is_immediate() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        hover_and_settle(&mut m);
        m.expand();
        assert_eq!(m.state(), PanelState::Expanded);
        assert_eq!(m.expanded_height(), MAX_EXPANDED_HEIGHT);
        assert_eq!(m.panel_width(), 180.0 + WING_WIDTH * 2.0);
    }

    #[test]
    fn collapse_from_expanded_goes_to_idle() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        hover_and_settle(&mut m);
        m.expand();
        m.collapse();
        // Always straight to Idle, never a soft collapse to Hovering.
        assert_eq!(m.state(), PanelState::Idle);
        assert_eq!(m.previous_state(), PanelState::Expanded);
    }

    #[test]
    fn collapse_from_idle_emits_nothing() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut m = machine(&bus);
        m.collapse();
        assert_eq!(m.state(), PanelState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn toggle_expand_round_trip() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        m.toggle_expand();
        assert_eq!(m.state(), PanelState::Idle);
        hover_and_settle(&mut m);
        m.toggle_expand();
        assert_eq!(m.state(), PanelState::Expanded);
        m.toggle_expand();
        assert_eq!(m.state(), PanelState::Idle);
    }

    #[test]
    fn arbitrary_sequences_stay_in_legal_states() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        let now = Instant::now();
        for step in 0..64u32 {
            match step % 5 {
                0 => m.hover_at(now + Duration::from_millis(u64::from(step))),
                1 => m.expand(),
                2 => m.collapse(),
                3 => m.toggle_expand(),
                _ => m.tick_at(now + Duration::from_millis(u64::from(step) + 60)),
            }
            assert!(matches!(
                m.state(),
                PanelState::Idle | PanelState::Hovering | PanelState::Expanded
            ));
        }
    }

    #[test]
    fn animation_token_tracks_setting() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        hover_and_settle(&mut m);
        assert_eq!(m.last_animation(), Some(animation::EXPAND_HOVER));

        m.set_animations_enabled(false);
        m.expand();
        assert_eq!(m.last_animation(), None);
    }

    #[test]
    fn geometry_change_recomputes_width() {
        let bus = EventBus::new();
        let mut m = machine(&bus);
        let mut geo = geometry();
        geo.notch_width = 220.0;
        geo.notch_max_x = geo.notch_min_x + 220.0;
        m.set_geometry(geo);
        assert_eq!(m.panel_width(), 220.0);
    }
}
