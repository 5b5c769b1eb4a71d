//! Breathing background layer
//!
//! A handful of large, softly pulsating gradient discs painted inside the
//! container. They ignore audio entirely; the metaball mask later decides
//! which parts of them are visible.

use std::f32::consts::TAU;

use tracing::debug;

use crate::boundary::Bounds;
use crate::color::{Hsl, Rgb};
use crate::display::{ClipRect, PixelBuffer};
use crate::math::Vec2;
use crate::util::Rng;

/// Amplitude of the breathing oscillation on top of `scale`
pub const BREATH_AMPLITUDE: f32 = 0.25;

pub const DEFAULT_CIRCLE_COUNT: usize = 6;

/// One decorative disc. Offsets are relative to the container center.
#[derive(Debug, Clone, PartialEq)]
pub struct BreathingCircle {
    pub offset: Vec2,
    pub base_radius: f32,
    pub colors: (Rgb, Rgb),
    pub phase: f32,
    pub speed: f32,
    pub scale: f32,
    pub opacity: f32,
}

impl BreathingCircle {
    /// Radius after applying the current breathing phase
    #[inline]
    pub fn current_radius(&self) -> f32 {
        self.base_radius * (self.scale + BREATH_AMPLITUDE * self.phase.sin())
    }
}

/// Gradient pairs for a theme color. The theme hue anchors the palette; the
/// analogous and complementary hues keep the backdrop from going flat.
pub fn theme_palette(theme: Rgb, count: usize) -> Vec<(Rgb, Rgb)> {
    let base = theme.to_hsl();
    let s = base.s.max(0.45);
    let (left, right) = theme.analogous(35.0);
    let hues = [
        base.h,
        left.to_hsl().h,
        right.to_hsl().h,
        theme.complementary().to_hsl().h,
    ];

    (0..count)
        .map(|i| {
            let h = hues[i % hues.len()];
            // Nudge repeated hues so neighbours differ
            let shift = (i / hues.len()) as f32 * 12.0;
            let inner = Hsl::new(h + shift, s, 0.68).to_rgb();
            let outer = Hsl::new(h + shift + 20.0, (s * 0.85).min(1.0), 0.42).to_rgb();
            (inner, outer)
        })
        .collect()
}

/// The full set of breathing discs
#[derive(Debug, Clone)]
pub struct BreathingLayer {
    circles: Vec<BreathingCircle>,
    theme: Rgb,
}

impl BreathingLayer {
    /// Scatter `count` discs across the container
    pub fn generate(count: usize, bounds: &Bounds, theme: Rgb, rng: &mut Rng) -> Self {
        let palette = theme_palette(theme, count);
        let half_w = bounds.width / 2.0;
        let half_h = bounds.height / 2.0;
        let side = bounds.min_side();

        let circles = palette
            .into_iter()
            .map(|colors| BreathingCircle {
                offset: Vec2::new(rng.jitter(half_w * 0.7), rng.jitter(half_h * 0.7)),
                base_radius: side * rng.range_f32(0.3, 0.55),
                colors,
                phase: rng.next_f32() * TAU,
                speed: rng.range_f32(0.01, 0.03),
                scale: rng.range_f32(0.8, 1.1),
                opacity: rng.range_f32(0.5, 0.9),
            })
            .collect();

        debug!(count, theme = %theme.to_hex(), "generated breathing layer");
        Self { circles, theme }
    }

    pub fn circles(&self) -> &[BreathingCircle] {
        &self.circles
    }

    pub fn theme(&self) -> Rgb {
        self.theme
    }

    /// Swap colors for a new theme; geometry and phases are kept so the
    /// change does not make the backdrop jump.
    pub fn recolor(&mut self, theme: Rgb) {
        let palette = theme_palette(theme, self.circles.len());
        for (circle, colors) in self.circles.iter_mut().zip(palette) {
            circle.colors = colors;
        }
        self.theme = theme;
    }

    /// Advance every phase by one frame (`frame_scale` 60 Hz frames)
    pub fn advance(&mut self, frame_scale: f32, rate: f32) {
        for circle in &mut self.circles {
            circle.phase = (circle.phase + circle.speed * frame_scale * rate) % TAU;
        }
    }

    /// Paint the discs into `buffer`, clipped to the container
    pub fn render(&self, buffer: &mut PixelBuffer, bounds: &Bounds) {
        let (x0, y0, x1, y1) = bounds.pixel_rect();
        let clip = ClipRect::new(x0, y0, x1, y1);
        let center = bounds.center();

        for circle in &self.circles {
            let pos = center + circle.offset;
            buffer.fill_radial_gradient(
                pos.x,
                pos.y,
                circle.current_radius(),
                circle.colors.0,
                circle.colors.1,
                circle.opacity,
                clip,
            );
        }
    }
}
