//! The interaction engine: geometry, state, gestures, events, frame timing.
//!
//! [`Engine`] is the main-thread facade the app drives. Raw input and tap
//! events flow in through channels, `handle_input`/`note_hud_key` translate
//! them into state changes, and `tick` applies time-based behavior (hover
//! debounce, HUD auto-dismiss) once per loop iteration.

pub mod animation;
pub mod event_bus;
pub mod frame_clock;
pub mod gesture;
pub mod geometry;
pub mod state;
pub mod system_hud;

use std::time::{Duration, Instant};

use event_bus::{EngineEvent, EventBus, HudKind};
use gesture::{classify, Intent, RawInput};
use geometry::NotchGeometry;
use state::{PanelState, PanelStateMachine};
use system_hud::KeyEvent;

pub struct Engine {
    machine: PanelStateMachine,
    bus: EventBus,
    hud: Option<HudKind>,
    hud_deadline: Option<Instant>,
    hud_auto_hide: Duration,
}

impl Engine {
    pub fn new(
        geometry: NotchGeometry,
        animations_enabled: bool,
        hud_auto_hide: Duration,
        bus: EventBus,
    ) -> Self {
        Self {
            machine: PanelStateMachine::new(geometry, animations_enabled, bus.clone()),
            bus,
            hud: None,
            hud_deadline: None,
            hud_auto_hide,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn state(&self) -> PanelState {
        self.machine.state()
    }

    pub fn geometry(&self) -> NotchGeometry {
        self.machine.geometry()
    }

    pub fn panel_width(&self) -> f64 {
        self.machine.panel_width()
    }

    pub fn expanded_height(&self) -> f64 {
        self.machine.expanded_height()
    }

    pub fn last_animation(&self) -> Option<animation::AnimationToken> {
        self.machine.last_animation()
    }

    /// The HUD currently shown, if its auto-dismiss deadline has not passed.
    pub fn hud(&self) -> Option<HudKind> {
        self.hud
    }

    pub fn hud_visible(&self) -> bool {
        self.hud.is_some()
    }

    /// Replace the geometry snapshot after a screen-configuration change and
    /// tell subscribers to re-derive anything geometry-dependent.
    pub fn set_geometry(&mut self, geometry: NotchGeometry) {
        self.machine.set_geometry(geometry);
        self.bus.publish(EngineEvent::ScreenChanged);
    }

    pub fn apply_settings(&mut self, animations_enabled: bool, hud_auto_hide: Duration) {
        self.machine.set_animations_enabled(animations_enabled);
        self.hud_auto_hide = hud_auto_hide;
    }

    // -- Input --------------------------------------------------------------

    /// Classify one monitored input event and apply the resulting intent.
    pub fn handle_input(&mut self, input: &RawInput) {
        let geometry = self.machine.geometry();
        let intent = classify(
            self.machine.state(),
            &geometry,
            self.machine.panel_width(),
            input,
        );
        match intent {
            Some(Intent::Hover) => self.machine.hover(),
            Some(Intent::Expand) => self.machine.expand(),
            Some(Intent::Collapse) => self.machine.collapse(),
            None => {}
        }
    }

    /// A hardware HUD key observed by the event tap. Key-down shows (or
    /// refreshes) the matching HUD; key-up only extends the deadline so the
    /// HUD never vanishes mid-press.
    pub fn note_hud_key(&mut self, key: KeyEvent) {
        self.note_hud_key_at(key, Instant::now());
    }

    // -- Commands -----------------------------------------------------------

    pub fn hover(&mut self) {
        self.machine.hover();
    }

    pub fn expand(&mut self) {
        self.machine.expand();
    }

    pub fn collapse(&mut self) {
        self.machine.collapse();
    }

    pub fn toggle_expand(&mut self) {
        self.machine.toggle_expand();
    }

    /// Collaborator-facing HUD control: show a HUD (armed with the
    /// auto-dismiss deadline so it can never get stuck) or clear it early.
    pub fn set_hud_visible(&mut self, kind: HudKind) {
        self.hud = Some(kind);
        self.hud_deadline = Some(Instant::now() + self.hud_auto_hide);
    }

    pub fn clear_hud(&mut self) {
        self.hud = None;
        self.hud_deadline = None;
    }

    // -- Remote commands (IPC) ----------------------------------------------

    pub fn request_expand(&mut self) {
        // Remote expand is a two-step request so the state machine's
        // Idle -> Hovering -> Expanded path stays the only route in.
        if self.machine.state() == PanelState::Idle {
            self.hover();
        } else {
            self.expand();
        }
    }

    pub fn request_collapse(&mut self) {
        self.collapse();
    }

    pub fn request_toggle(&mut self) {
        if self.machine.state() == PanelState::Idle {
            self.hover();
        } else {
            self.toggle_expand();
        }
    }

    // -- Time ---------------------------------------------------------------

    /// Apply elapsed deadlines. Driven once per main-loop iteration.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    fn note_hud_key_at(&mut self, key: KeyEvent, now: Instant) {
        if let Some(kind) = system_hud::hud_kind_for(key.code) {
            if key.is_down {
                self.hud = Some(kind);
            }
            if self.hud.is_some() {
                self.hud_deadline = Some(now + self.hud_auto_hide);
            }
            self.bus.publish(EngineEvent::HudKey {
                code: key.code,
                is_down: key.is_down,
            });
        }
    }

    fn tick_at(&mut self, now: Instant) {
        self.machine.tick();
        if let Some(deadline) = self.hud_deadline {
            if now >= deadline {
                self.hud = None;
                self.hud_deadline = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::geometry::Point;

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

    fn engine() -> Engine {
        Engine::new(
            geometry(),
            true,
            Duration::from_secs_f64(2.0),
            EventBus::new(),
        )
    }

    fn volume_down_press() -> KeyEvent {
        KeyEvent {
            code: 1,
            is_down: true,
        }
    }

    #[test]
    fn pointer_drives_full_hover_expand_collapse_cycle() {
        let mut e = engine();
        e.handle_input(&RawInput::PointerMoved(Point::new(660.0, 960.0)));
        // Debounce has not elapsed yet.
        assert_eq!(e.state(), PanelState::Idle);
        std::thread::sleep(animation::HOVER_DEBOUNCE + Duration::from_millis(10));
        e.tick();
        assert_eq!(e.state(), PanelState::Hovering);

        e.handle_input(&RawInput::PointerMoved(Point::new(756.0, 975.0)));
        assert_eq!(e.state(), PanelState::Expanded);

        e.handle_input(&RawInput::LeftClick(Point::new(100.0, 100.0)));
        assert_eq!(e.state(), PanelState::Idle);
    }

    #[test]
    fn hud_key_shows_hud_and_auto_dismisses() {
        let mut e = engine();
        let now = Instant::now();
        e.note_hud_key_at(volume_down_press(), now);
        assert_eq!(e.hud(), Some(HudKind::Volume));

        e.tick_at(now + Duration::from_secs(1));
        assert!(e.hud_visible());
        e.tick_at(now + Duration::from_secs(3));
        assert!(!e.hud_visible());
    }

    #[test]
    fn repeat_hud_key_extends_the_deadline() {
        let mut e = engine();
        let now = Instant::now();
        e.note_hud_key_at(volume_down_press(), now);
        e.note_hud_key_at(volume_down_press(), now + Duration::from_secs(1));
        e.tick_at(now + Duration::from_secs(2));
        assert!(e.hud_visible());
        e.tick_at(now + Duration::from_secs(4));
        assert!(!e.hud_visible());
    }

    #[test]
    fn key_up_alone_never_shows_a_hud() {
        let mut e = engine();
        e.note_hud_key_at(
            KeyEvent {
                code: 0,
                is_down: false,
            },
            Instant::now(),
        );
        assert!(!e.hud_visible());
    }

    #[test]
    fn unwatched_key_is_ignored() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut e = Engine::new(geometry(), true, Duration::from_secs(2), bus);
        e.note_hud_key_at(
            KeyEvent {
                code: 16,
                is_down: true,
            },
            Instant::now(),
        );
        assert!(!e.hud_visible());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hud_key_is_published_for_collaborators() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut e = Engine::new(geometry(), true, Duration::from_secs(2), bus);
        e.note_hud_key_at(volume_down_press(), Instant::now());
        assert_eq!(
            rx.try_recv().unwrap(),
            EngineEvent::HudKey {
                code: 1,
                is_down: true
            }
        );
    }

    #[test]
    fn explicit_hud_control_shows_and_clears() {
        let mut e = engine();
        e.set_hud_visible(HudKind::Brightness);
        assert_eq!(e.hud(), Some(HudKind::Brightness));
        e.clear_hud();
        assert!(!e.hud_visible());
        // Clearing is idempotent.
        e.clear_hud();
        assert!(!e.hud_visible());
    }

    #[test]
    fn remote_toggle_walks_the_state_machine() {
        let mut e = engine();
        e.request_toggle();
        std::thread::sleep(animation::HOVER_DEBOUNCE + Duration::from_millis(10));
        e.tick();
        assert_eq!(e.state(), PanelState::Hovering);
        e.request_toggle();
        assert_eq!(e.state(), PanelState::Expanded);
        e.request_toggle();
        assert_eq!(e.state(), PanelState::Idle);
    }

    #[test]
    fn geometry_change_publishes_screen_changed() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        let mut e = Engine::new(geometry(), true, Duration::from_secs(2), bus);
        let mut geo = geometry();
        geo.screen_width = 1728.0;
        e.set_geometry(geo);
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::ScreenChanged);
    }
}
