//! AppKit-facing layer: the overlay window, its frame presenter, and the
//! event sources that feed the engine.

pub mod input_monitor;
pub mod overlay;
pub mod presenter;
pub mod screen_watch;

pub use input_monitor::InputMonitor;
pub use overlay::OverlayWindow;
pub use presenter::WindowPresenter;
pub use screen_watch::ScreenWatcher;
