use std::fmt;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub hud: HudConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelConfig {
    /// Animate panel transitions. Disable for reduced motion.
    #[serde(default = "default_animations")]
    pub animations: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            animations: default_animations(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HudConfig {
    /// Unload the system OSDUIHelper so only our HUD shows. Requires
    /// accessibility permission; restored on exit.
    #[serde(default)]
    pub suppress_system_osd: bool,
    /// Seconds the HUD stays visible after the last key press.
    #[serde(default = "default_auto_hide_delay")]
    pub auto_hide_delay: f64,
}

impl Default for HudConfig {
    fn default() -> Self {
        Self {
            suppress_system_osd: false,
            auto_hide_delay: default_auto_hide_delay(),
        }
    }
}

fn default_animations() -> bool {
    true
}

fn default_auto_hide_delay() -> f64 {
    crate::engine::animation::HUD_AUTO_DISMISS_SECS
}

pub struct ValidationIssue {
    pub message: String,
    pub is_error: bool,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Config {
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if !self.hud.auto_hide_delay.is_finite() || self.hud.auto_hide_delay <= 0.0 {
            issues.push(ValidationIssue {
                message: format!(
                    "hud.auto_hide_delay must be a positive number of seconds, got {}",
                    self.hud.auto_hide_delay
                ),
                is_error: true,
            });
        } else if self.hud.auto_hide_delay > 30.0 {
            issues.push(ValidationIssue {
                message: format!(
                    "hud.auto_hide_delay of {}s will keep the HUD on screen a long time",
                    self.hud.auto_hide_delay
                ),
                is_error: false,
            });
        }

        issues
    }
}
