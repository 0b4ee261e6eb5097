//! Animation tokens and engine timing constants.
//!
//! Tokens describe the curve a transition should use; the presenter (or any
//! widget rendering into the panel) decides how to apply them. Keeping them
//! in one place keeps the motion language consistent.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationToken {
    /// Critically-damped-ish spring: response in seconds, damping 0..1.
    Spring { response: f64, damping: f64 },
    EaseInOut { duration: f64 },
    EaseOut { duration: f64 },
}

/// Hover: wings expand out from the notch.
pub const EXPAND_HOVER: AnimationToken = AnimationToken::Spring {
    response: 0.3,
    damping: 0.7,
};

/// Click: center panel drops down.
pub const EXPAND_CLICK: AnimationToken = AnimationToken::Spring {
    response: 0.35,
    damping: 0.8,
};

/// Panel retracts.
pub const COLLAPSE: AnimationToken = AnimationToken::Spring {
    response: 0.25,
    damping: 0.9,
};

/// HUD slider appears / dismisses.
pub const HUD_APPEAR: AnimationToken = AnimationToken::Spring {
    response: 0.2,
    damping: 0.8,
};
pub const HUD_DISMISS: AnimationToken = AnimationToken::EaseOut { duration: 0.3 };

/// Debounce before an idle panel starts hovering. Short enough to feel
/// instant, long enough to swallow pointer jitter at the zone edge.
pub const HOVER_DEBOUNCE: Duration = Duration::from_millis(50);

/// Default HUD auto-dismiss delay (seconds); overridable from config.
pub const HUD_AUTO_DISMISS_SECS: f64 = 2.0;
