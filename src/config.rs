//! Visualizer configuration, persisted as JSON
//!
//! Every field has a default, so a config file only needs the keys it wants
//! to override.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::background::DEFAULT_CIRCLE_COUNT;
use crate::boundary::BoundaryProfile;
use crate::color::Rgb;
use crate::error::Result;
use crate::metaball::{clamp_ball_count, MetaballParams};
use crate::render::RenderMode;

/// Upper limit for breathing circles; more only costs fill rate
pub const MAX_BREATHING_CIRCLES: usize = 16;
/// Largest radius-like metaball parameter, logical pixels
pub const MAX_RADIUS: f32 = 512.0;
/// Largest initial drift, pixels per frame
pub const MAX_DRIFT: f32 = 50.0;
pub const MAX_SPECTRUM_LEN: usize = 4096;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub metaballs: MetaballParams,
    pub boundary: BoundaryProfile,
    pub breathing_circles: usize,
    /// Accent color, `#rgb` or `#rrggbb`
    pub theme_color: String,
    /// Color behind the container
    pub backdrop: String,
    pub render_mode: RenderMode,
    pub debug_bounds: bool,
    /// Animate with the synthetic pattern while no audio is available
    pub demo_fallback: bool,
    /// Accent glow intensity, 0.0 - 1.0
    pub glow_strength: f32,
    pub seed: u64,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            metaballs: MetaballParams::default(),
            boundary: BoundaryProfile::default(),
            breathing_circles: DEFAULT_CIRCLE_COUNT,
            theme_color: "#7c5cff".to_string(),
            backdrop: "#0e0e16".to_string(),
            render_mode: RenderMode::Mask,
            debug_bounds: false,
            demo_fallback: true,
            glow_strength: 0.35,
            seed: 0x5EED_B10B,
        }
    }
}

impl VisualizerConfig {
    /// Load config from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save config as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Pull out-of-range values back into range
    pub fn sanitized(mut self) -> Self {
        let count = clamp_ball_count(self.metaballs.count);
        if count != self.metaballs.count {
            debug!(requested = self.metaballs.count, count, "clamped ball count");
            self.metaballs.count = count;
        }

        let circles = self.breathing_circles.clamp(1, MAX_BREATHING_CIRCLES);
        if circles != self.breathing_circles {
            debug!(
                requested = self.breathing_circles,
                circles, "clamped breathing circle count"
            );
            self.breathing_circles = circles;
        }

        if !self.glow_strength.is_finite() {
            self.glow_strength = 0.0;
        }
        self.glow_strength = self.glow_strength.clamp(0.0, 1.0);

        let defaults = MetaballParams::default();
        let m = &mut self.metaballs;
        m.radius_scale = clamp_param(
            "radius_scale",
            m.radius_scale,
            defaults.radius_scale,
            0.0,
            MAX_RADIUS,
        );
        m.base_radius_min = clamp_param(
            "base_radius_min",
            m.base_radius_min,
            defaults.base_radius_min,
            1.0,
            MAX_RADIUS,
        );
        m.base_radius_max = clamp_param(
            "base_radius_max",
            m.base_radius_max,
            defaults.base_radius_max,
            1.0,
            MAX_RADIUS,
        );
        if m.base_radius_min > m.base_radius_max {
            std::mem::swap(&mut m.base_radius_min, &mut m.base_radius_max);
        }
        m.min_radius = clamp_param(
            "min_radius",
            m.min_radius,
            defaults.min_radius,
            1.0,
            MAX_RADIUS,
        );
        m.drift = clamp_param("drift", m.drift, defaults.drift, 0.0, MAX_DRIFT);
        m.breathing_speed_min = clamp_param(
            "breathing_speed_min",
            m.breathing_speed_min,
            defaults.breathing_speed_min,
            0.0,
            1.0,
        );
        m.breathing_speed_max = clamp_param(
            "breathing_speed_max",
            m.breathing_speed_max,
            defaults.breathing_speed_max,
            0.0,
            1.0,
        );

        let len = if m.spectrum_len == 0 {
            defaults.spectrum_len
        } else {
            m.spectrum_len.min(MAX_SPECTRUM_LEN)
        };
        if len != m.spectrum_len {
            debug!(requested = m.spectrum_len, len, "clamped spectrum length");
            m.spectrum_len = len;
        }
        self
    }

    /// Parsed theme color, falling back to the default theme
    pub fn theme(&self) -> Rgb {
        Rgb::from_hex(&self.theme_color).unwrap_or_else(|_| {
            debug!(value = %self.theme_color, "invalid theme color in config");
            default_theme()
        })
    }

    pub fn backdrop_color(&self) -> Rgb {
        Rgb::from_hex(&self.backdrop).unwrap_or(Rgb::new(14, 14, 22))
    }
}

/// Clamp a float parameter into `lo..=hi`; non-finite values take the default
fn clamp_param(name: &str, value: f32, default: f32, lo: f32, hi: f32) -> f32 {
    let clamped = if value.is_finite() {
        value.clamp(lo, hi)
    } else {
        default
    };
    if clamped != value {
        debug!(
            param = name,
            requested = value,
            value = clamped,
            "clamped metaball param"
        );
    }
    clamped
}

fn default_theme() -> Rgb {
    Rgb::new(0x7c, 0x5c, 0xff)
}
