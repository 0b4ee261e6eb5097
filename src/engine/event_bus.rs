//! Typed one-to-many event channel decoupling producers from consumers.
//!
//! Each subscriber gets its own unbounded channel; publishing clones the
//! event into every live channel and prunes channels whose receiver has been
//! dropped. There is no replay: late subscribers only see events published
//! after they subscribed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::engine::state::PanelState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudKind {
    Volume,
    Brightness,
    KeyboardBacklight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Stopped,
}

/// Now-playing metadata relayed for media collaborators. The engine never
/// interprets it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: f64,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    // Engine-owned
    StateChanged(PanelState),
    /// A collaborator reports a level change worth showing in the HUD (0..=1).
    HudTriggered(HudKind, f32),
    /// Raw hardware key observed by the system event tap.
    HudKey { code: i32, is_down: bool },
    ScreenChanged,

    // Collaborator-owned, relayed transparently
    MediaChanged(MediaInfo),
    PlaybackChanged(PlaybackState),
    FileDropped(PathBuf),
    FileRemoved(u64),
    SettingsChanged(String),
}

#[derive(Clone, Default)]
pub struct EventBus {
    senders: Arc<Mutex<Vec<async_channel::Sender<EngineEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. The receiver yields every event published
    /// from this point on, in publish order.
    pub fn subscribe(&self) -> async_channel::Receiver<EngineEvent> {
        let (tx, rx) = async_channel::unbounded();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    /// Deliver `event` to all live subscribers, dropping dead ones.
    pub fn publish(&self, event: EngineEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|tx| tx.try_send(event.clone()).is_ok());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }
}
