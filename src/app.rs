//! Composition root: builds the engine and its collaborators, then drives
//! everything from a manual main-thread event loop.
//!
//! All OS callbacks (monitors, event tap, display link, file watcher) only
//! send over channels; this loop is the single place where engine state
//! mutates, so no engine method ever needs a lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use objc2::rc::Retained;
use objc2::MainThreadMarker;
use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
use objc2_foundation::NSDate;

use crate::config::{load_config, Config, ConfigWatcher, SharedConfig};
use crate::engine::event_bus::EventBus;
use crate::engine::frame_clock::{DisplayLinkDriver, FrameClock};
use crate::engine::geometry::NotchGeometry;
use crate::engine::gesture::RawInput;
use crate::engine::system_hud::SystemHudInterceptor;
use crate::engine::Engine;
use crate::ipc::{subscribe_ipc_commands, IpcCommand};
use crate::window::{InputMonitor, OverlayWindow, ScreenWatcher, WindowPresenter};

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Ask the main loop to exit after its current iteration. Signal-safe.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Release);
}

pub struct App {
    _app: Retained<NSApplication>,
    engine: Engine,
    presenter: WindowPresenter,
    config: SharedConfig,
    config_watcher: Option<ConfigWatcher>,
    interceptor: SystemHudInterceptor,
    frame_clock: FrameClock,
    _input_monitor: Option<InputMonitor>,
    input_rx: Receiver<RawInput>,
    screen_watcher: ScreenWatcher,
}

impl App {
    pub fn new(mtm: MainThreadMarker) -> Self {
        let app = NSApplication::sharedApplication(mtm);
        // Accessory policy: no dock icon, no menu bar, doesn't activate.
        app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

        let config = Arc::new(RwLock::new(load_config()));
        let config_watcher = match ConfigWatcher::new(config.clone()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                log::error!("Failed to set up config watcher: {}", e);
                None
            }
        };

        let geometry = NotchGeometry::detect(mtm);
        log::info!(
            "Screen: {}x{}, notch: {}x{} (physical: {})",
            geometry.screen_width,
            geometry.screen_height,
            geometry.notch_width,
            geometry.notch_height,
            geometry.has_notch
        );

        let snapshot = config
            .read()
            .map(|c| c.clone())
            .unwrap_or_default();
        let engine = Engine::new(
            geometry,
            snapshot.panel.animations,
            Duration::from_secs_f64(snapshot.hud.auto_hide_delay),
            EventBus::new(),
        );

        let overlay = OverlayWindow::new(
            mtm,
            crate::window::presenter::frame_for(&geometry, 0.0, false),
        );
        let presenter = WindowPresenter::new(overlay);
        presenter.show();

        let (input_tx, input_rx) = channel();
        let input_monitor = InputMonitor::new(input_tx);

        let mut interceptor = SystemHudInterceptor::new();
        if snapshot.hud.suppress_system_osd {
            interceptor.start(true);
        }

        let frame_clock = FrameClock::new(Box::new(DisplayLinkDriver::new()));
        let screen_watcher = ScreenWatcher::new();

        Self {
            _app: app,
            engine,
            presenter,
            config,
            config_watcher,
            interceptor,
            frame_clock,
            _input_monitor: input_monitor,
            input_rx,
            screen_watcher,
        }
    }

    pub fn run(mut self, mtm: MainThreadMarker) {
        let app = NSApplication::sharedApplication(mtm);
        let ipc_rx = subscribe_ipc_commands();

        loop {
            // Pump AppKit events with a timeout so the loop also runs while
            // idle (debounce deadlines, channel drains).
            let date = NSDate::dateWithTimeIntervalSinceNow(0.05);
            while let Some(event) = unsafe {
                app.nextEventMatchingMask_untilDate_inMode_dequeue(
                    objc2_app_kit::NSEventMask::Any,
                    Some(&date),
                    objc2_foundation::NSDefaultRunLoopMode,
                    true,
                )
            } {
                app.sendEvent(&event);
                app.updateWindows();
            }

            while let Ok(input) = self.input_rx.try_recv() {
                self.engine.handle_input(&input);
            }

            while let Some(key) = self.interceptor.poll() {
                self.engine.note_hud_key(key);
            }

            while let Ok(cmd) = ipc_rx.try_recv() {
                match cmd {
                    IpcCommand::Expand => self.engine.request_expand(),
                    IpcCommand::Collapse => self.engine.request_collapse(),
                    IpcCommand::Toggle => self.engine.request_toggle(),
                    IpcCommand::Reload => {
                        let new_config = load_config();
                        if let Ok(mut cfg) = self.config.write() {
                            *cfg = new_config;
                        }
                        self.apply_config();
                    }
                }
            }

            let reloaded = self
                .config_watcher
                .as_ref()
                .is_some_and(|watcher| watcher.check_and_reload());
            if reloaded {
                self.apply_config();
            }

            if self.screen_watcher.take_changed() {
                let geometry = NotchGeometry::detect(mtm);
                log::info!(
                    "Screen configuration changed; notch now {}x{}",
                    geometry.notch_width,
                    geometry.notch_height
                );
                self.engine.set_geometry(geometry);
            }

            self.engine.tick();
            self.frame_clock.pump();

            self.presenter.refresh(
                &self.engine.geometry(),
                self.engine.expanded_height(),
                self.engine.hud_visible(),
            );

            if SHUTDOWN.load(Ordering::Acquire) {
                break;
            }
        }

        // Restore the native OSD before the process goes away.
        self.interceptor.stop();
        log::info!("Shutting down");
    }

    fn apply_config(&mut self) {
        let snapshot: Config = match self.config.read() {
            Ok(cfg) => cfg.clone(),
            Err(_) => return,
        };
        self.engine.apply_settings(
            snapshot.panel.animations,
            Duration::from_secs_f64(snapshot.hud.auto_hide_delay),
        );
        // The interceptor follows the suppress setting: install with OSD
        // hidden, or tear down and restore.
        if snapshot.hud.suppress_system_osd {
            if !self.interceptor.is_running() {
                self.interceptor.start(true);
            }
        } else if self.interceptor.is_running() {
            self.interceptor.stop();
        }
        log::info!("Config applied");
    }
}
