//! Render/compositing pipeline
//!
//! Per frame:
//! 1. clear the frame to the backdrop
//! 2. optionally outline the container (debug)
//! 3. paint the breathing background into a transparent layer, clipped to
//!    the container
//! 4. build a coverage mask from the metaballs and keep the background only
//!    where the mask covers it (destination-in), then lay it over the frame
//!    and add a soft accent glow around each blob
//! 5. draw the thought bubble, if any
//!
//! The mask is accumulated with a screen operator, so overlapping blobs merge
//! into one silhouette rather than stacking translucent discs with seams.

use serde::{Deserialize, Serialize};

use crate::background::BreathingLayer;
use crate::boundary::Bounds;
use crate::color::Rgb;
use crate::display::{BlendMode, ClipRect, PixelBuffer};
use crate::math::{smoothstep, Vec2};
use crate::metaball::Metaball;
use crate::mood::{EmoteModifiers, ThoughtBubble};

/// How blob coverage is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Independent radial gradients merged into one mask
    #[default]
    Mask,
    /// Summed influence field `r^2 / d^2` thresholded with a soft edge
    Field,
}

/// Inner edge of the mask falloff, as a share of the radius
const MASK_SOLID: f32 = 0.55;
/// Glow ring reach beyond the blob radius
const GLOW_REACH: f32 = 1.35;
/// Field value band mapped onto transparent..opaque
const FIELD_LOW: f32 = 0.75;
const FIELD_HIGH: f32 = 1.15;
/// Field mode samples every Nth pixel and fills the block
const FIELD_STEP: i32 = 2;

/// Per-frame inputs that are not owned by the renderer
pub struct FrameInputs<'a> {
    pub bounds: Bounds,
    pub background: &'a BreathingLayer,
    pub balls: &'a [Metaball],
    pub accent: Rgb,
    pub emote: EmoteModifiers,
    pub bubble: Option<(&'a ThoughtBubble, f32)>,
}

/// A blob as it will be drawn this frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawnBlob {
    pub center: Vec2,
    pub radius: f32,
}

/// Resolve ball positions for drawing: apply emote rotation, offset and
/// radius scale around the container center.
pub fn drawn_blobs(balls: &[Metaball], bounds: &Bounds, emote: &EmoteModifiers) -> Vec<DrawnBlob> {
    let center = bounds.center();
    let (sin, cos) = emote.rotation.sin_cos();
    balls
        .iter()
        .map(|ball| {
            let p = ball.position;
            let rotated = Vec2::new(p.x * cos - p.y * sin, p.x * sin + p.y * cos);
            DrawnBlob {
                center: center + rotated + emote.offset,
                radius: ball.current_radius * emote.radius_scale,
            }
        })
        .collect()
}

/// Owns the scratch layers and the output frame
pub struct Renderer {
    frame: PixelBuffer,
    layer: PixelBuffer,
    mask: PixelBuffer,
    pub mode: RenderMode,
    pub backdrop: Rgb,
    pub debug_bounds: bool,
    pub glow_strength: f32,
}

impl Renderer {
    pub fn new(width: u32, height: u32, mode: RenderMode) -> Self {
        Self {
            frame: PixelBuffer::with_size(width, height),
            layer: PixelBuffer::with_size(width, height),
            mask: PixelBuffer::with_size(width, height),
            mode,
            backdrop: Rgb::new(14, 14, 22),
            debug_bounds: false,
            glow_strength: 0.35,
        }
    }

    pub fn frame(&self) -> &PixelBuffer {
        &self.frame
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.frame.resize(width, height);
        self.layer.resize(width, height);
        self.mask.resize(width, height);
    }

    /// Render one frame
    pub fn render(&mut self, inputs: &FrameInputs<'_>) -> &PixelBuffer {
        // The canvas may have changed size since the bounds were computed
        let bounds = inputs
            .bounds
            .clamped_to(self.frame.width(), self.frame.height());
        let Rgb { r, g, b } = self.backdrop;

        // 1. clear
        self.frame.clear(r, g, b);
        self.layer.clear_rgba(0, 0, 0, 0);

        // 2. debug outline
        if self.debug_bounds {
            let (x0, y0, x1, y1) = bounds.pixel_rect();
            self.frame
                .stroke_rect_dashed(ClipRect::new(x0, y0, x1, y1), 6, 4, 255, 80, 80);
        }

        if bounds.width <= 0.0 || bounds.height <= 0.0 {
            return &self.frame;
        }

        // 3. background, clipped to the container
        inputs.background.render(&mut self.layer, &bounds);

        // 4. metaball mask
        let blobs = drawn_blobs(inputs.balls, &inputs.bounds, &inputs.emote);
        self.mask.clear_rgba(0, 0, 0, 0);
        match self.mode {
            RenderMode::Mask => paint_mask(&mut self.mask, &blobs),
            RenderMode::Field => paint_field(&mut self.mask, &blobs, &bounds),
        }
        self.layer.composite_full(&self.mask, BlendMode::DestinationIn);
        self.frame.composite_full(&self.layer, BlendMode::Alpha);
        self.paint_glow(&blobs, inputs.accent);

        // 5. overlays
        if let Some((bubble, opacity)) = inputs.bubble {
            paint_bubble(&mut self.frame, &blobs, &bounds, bubble, opacity);
        }

        &self.frame
    }

    /// Soft additive halo in the accent color, standing in for a shadow blur
    fn paint_glow(&mut self, blobs: &[DrawnBlob], accent: Rgb) {
        if self.glow_strength <= 0.0 {
            return;
        }
        let k = self.glow_strength.min(1.0);
        let (r, g, b) = (
            (accent.r as f32 * k) as u8,
            (accent.g as f32 * k) as u8,
            (accent.b as f32 * k) as u8,
        );
        for blob in blobs {
            let radius = (blob.radius * GLOW_REACH).round() as i32;
            self.frame.fill_circle_gradient(
                blob.center.x.round() as i32,
                blob.center.y.round() as i32,
                radius,
                r,
                g,
                b,
                2.0,
            );
        }
    }
}

/// Mask mode: opaque center fading to a transparent rim, merged per pixel
fn paint_mask(mask: &mut PixelBuffer, blobs: &[DrawnBlob]) {
    for blob in blobs {
        if blob.radius <= 0.0 {
            continue;
        }
        let x0 = (blob.center.x - blob.radius).floor() as i32;
        let x1 = (blob.center.x + blob.radius).ceil() as i32;
        let y0 = (blob.center.y - blob.radius).floor() as i32;
        let y1 = (blob.center.y + blob.radius).ceil() as i32;
        let clip = mask.clip(ClipRect::new(x0, y0, x1 + 1, y1 + 1));

        for y in clip.y0..clip.y1 {
            let dy = y as f32 + 0.5 - blob.center.y;
            for x in clip.x0..clip.x1 {
                let dx = x as f32 + 0.5 - blob.center.x;
                let t = (dx * dx + dy * dy).sqrt() / blob.radius;
                if t >= 1.0 {
                    continue;
                }
                mask.accumulate_coverage(x, y, 1.0 - smoothstep(MASK_SOLID, 1.0, t));
            }
        }
    }
}

/// Sum of `r^2 / d^2` over all blobs at a point
#[inline]
pub fn field_at(blobs: &[DrawnBlob], p: Vec2) -> f32 {
    blobs
        .iter()
        .map(|blob| {
            let d_sq = (p - blob.center).length_sq();
            blob.radius * blob.radius / (d_sq + 1.0)
        })
        .sum()
}

/// Field mode: threshold the influence field with a soft edge so nearby
/// blobs bridge into each other
fn paint_field(mask: &mut PixelBuffer, blobs: &[DrawnBlob], bounds: &Bounds) {
    let (x0, y0, x1, y1) = bounds.pixel_rect();
    let clip = mask.clip(ClipRect::new(x0, y0, x1, y1));

    let mut y = clip.y0;
    while y < clip.y1 {
        let mut x = clip.x0;
        while x < clip.x1 {
            let p = Vec2::new(x as f32 + 1.0, y as f32 + 1.0);
            let coverage = smoothstep(FIELD_LOW, FIELD_HIGH, field_at(blobs, p));
            if coverage > 0.0 {
                for by in y..(y + FIELD_STEP).min(clip.y1) {
                    for bx in x..(x + FIELD_STEP).min(clip.x1) {
                        mask.accumulate_coverage(bx, by, coverage);
                    }
                }
            }
            x += FIELD_STEP;
        }
        y += FIELD_STEP;
    }
}

/// Cloud-shaped bubble above the cluster with a short trail of dots
fn paint_bubble(
    frame: &mut PixelBuffer,
    blobs: &[DrawnBlob],
    bounds: &Bounds,
    bubble: &ThoughtBubble,
    opacity: f32,
) {
    let alpha = (opacity.clamp(0.0, 1.0) * 230.0) as u8;
    if alpha == 0 || blobs.is_empty() {
        return;
    }

    let top = blobs
        .iter()
        .map(|b| b.center.y - b.radius)
        .fold(f32::INFINITY, f32::min);
    let cx = blobs.iter().map(|b| b.center.x).sum::<f32>() / blobs.len() as f32;

    let unit = (bounds.min_side() / 14.0).max(6.0);
    // Wider for longer text, within reason
    let lobes = (bubble.text.chars().count() / 12).clamp(1, 4) as i32;
    let body_y = (top - unit * 2.8).max(bounds.y + unit * 1.2);
    let body_x = cx + unit * 1.5;

    let (r, g, b) = (245, 245, 250);
    for i in -lobes..=lobes {
        let lx = body_x + i as f32 * unit * 0.9;
        let lr = unit * (1.25 - 0.12 * i.abs() as f32);
        frame.fill_circle_blend(
            lx.round() as i32,
            body_y.round() as i32,
            lr.round() as i32,
            r,
            g,
            b,
            alpha,
        );
    }
    // Trail of shrinking dots toward the cluster
    for (i, scale) in [0.45f32, 0.3].iter().enumerate() {
        let t = (i + 1) as f32;
        let dx = cx + unit * 0.6 - t * unit * 0.2;
        let dy = body_y + unit * (1.1 + 0.9 * t);
        frame.fill_circle_blend(
            dx.round() as i32,
            dy.round() as i32,
            (unit * scale).round() as i32,
            r,
            g,
            b,
            alpha,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metaball::{MetaballParams, MetaballSystem};
    use crate::util::Rng;

    fn fixtures() -> (Bounds, BreathingLayer, MetaballSystem) {
        let bounds = Bounds::new(40.0, 40.0, 240.0, 200.0);
        let mut rng = Rng::new(5);
        let bg = BreathingLayer::generate(6, &bounds, Rgb::new(120, 90, 210), &mut rng);
        let balls = MetaballSystem::new(MetaballParams::default(), &bounds, 1.0, &mut rng);
        (bounds, bg, balls)
    }

    fn render_with(mode: RenderMode) -> (PixelBuffer, Bounds, Vec<DrawnBlob>) {
        let (bounds, bg, balls) = fixtures();
        let mut renderer = Renderer::new(320, 280, mode);
        renderer.glow_strength = 0.0;
        let inputs = FrameInputs {
            bounds,
            background: &bg,
            balls: balls.balls(),
            accent: Rgb::WHITE,
            emote: EmoteModifiers::default(),
            bubble: None,
        };
        let frame = renderer.render(&inputs).clone();
        let blobs = drawn_blobs(balls.balls(), &bounds, &EmoteModifiers::default());
        (frame, bounds, blobs)
    }

    fn backdrop_at(frame: &PixelBuffer, x: i32, y: i32) -> bool {
        let (r, g, b, _) = frame.get_pixel_rgba(x, y).unwrap();
        (r, g, b) == (14, 14, 22)
    }

    #[test]
    fn test_outside_blobs_shows_backdrop() {
        let (frame, _, _) = render_with(RenderMode::Mask);
        // Corners are outside the container and far from every blob
        assert!(backdrop_at(&frame, 1, 1));
        assert!(backdrop_at(&frame, 318, 278));
        assert!(backdrop_at(&frame, 45, 45));
    }

    #[test]
    fn test_mask_mode_reveals_only_inside_blobs() {
        let (frame, _, blobs) = render_with(RenderMode::Mask);
        let mut revealed = 0;
        for y in 0..280 {
            for x in 0..320 {
                if backdrop_at(&frame, x, y) {
                    continue;
                }
                revealed += 1;
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let inside = blobs
                    .iter()
                    .any(|b| (p - b.center).length() <= b.radius + 1.0);
                assert!(inside, "background leaked at ({}, {})", x, y);
            }
        }
        assert!(revealed > 0);
    }

    #[test]
    fn test_field_mode_reveals_background() {
        let (frame, _, _) = render_with(RenderMode::Field);
        let revealed = (0..280)
            .flat_map(|y| (0..320).map(move |x| (x, y)))
            .filter(|&(x, y)| !backdrop_at(&frame, x, y))
            .count();
        assert!(revealed > 0);
    }

    #[test]
    fn test_field_bridges_close_blobs() {
        let blobs = [
            DrawnBlob {
                center: Vec2::new(0.0, 0.0),
                radius: 20.0,
            },
            DrawnBlob {
                center: Vec2::new(48.0, 0.0),
                radius: 20.0,
            },
        ];
        let midpoint = Vec2::new(24.0, 0.0);
        // Alone, either blob leaves the midpoint uncovered
        let single = field_at(&blobs[..1], midpoint);
        assert!(single < FIELD_LOW, "single = {}", single);
        // Together they fill it completely
        let pair = field_at(&blobs, midpoint);
        assert!(pair > FIELD_HIGH, "pair = {}", pair);
        assert_eq!(smoothstep(FIELD_LOW, FIELD_HIGH, pair), 1.0);
        assert_eq!(smoothstep(FIELD_LOW, FIELD_HIGH, single), 0.0);
    }

    #[test]
    fn test_emote_modifiers_move_blobs() {
        let (bounds, _, balls) = fixtures();
        let mods = EmoteModifiers {
            offset: Vec2::new(0.0, -10.0),
            radius_scale: 1.5,
            rotation: 0.0,
        };
        let plain = drawn_blobs(balls.balls(), &bounds, &EmoteModifiers::default());
        let moved = drawn_blobs(balls.balls(), &bounds, &mods);
        for (a, b) in plain.iter().zip(&moved) {
            assert!((b.center.y - (a.center.y - 10.0)).abs() < 1e-4);
            assert!((b.radius - a.radius * 1.5).abs() < 1e-4);
        }
    }

    #[test]
    fn test_render_survives_stale_bounds_after_shrink() {
        let (bounds, bg, balls) = fixtures();
        let mut renderer = Renderer::new(320, 280, RenderMode::Mask);
        renderer.resize(100, 80);
        let inputs = FrameInputs {
            bounds,
            background: &bg,
            balls: balls.balls(),
            accent: Rgb::WHITE,
            emote: EmoteModifiers::default(),
            bubble: None,
        };
        let frame = renderer.render(&inputs);
        assert_eq!((frame.width(), frame.height()), (100, 80));
    }

    #[test]
    fn test_debug_outline_drawn() {
        let (bounds, bg, balls) = fixtures();
        let mut renderer = Renderer::new(320, 280, RenderMode::Mask);
        renderer.debug_bounds = true;
        renderer.glow_strength = 0.0;
        let inputs = FrameInputs {
            bounds,
            background: &bg,
            balls: balls.balls(),
            accent: Rgb::WHITE,
            emote: EmoteModifiers::default(),
            bubble: None,
        };
        let frame = renderer.render(&inputs);
        assert_eq!(frame.get_pixel_rgba(40, 40), Some((255, 80, 80, 255)));
    }

    #[test]
    fn test_bubble_painted_above_cluster() {
        let (bounds, bg, balls) = fixtures();
        let mut renderer = Renderer::new(320, 280, RenderMode::Mask);
        let bubble = ThoughtBubble {
            text: "time for a break".into(),
            priority: 1,
            started_at: 0.0,
            duration: 3.0,
        };
        let without = {
            let inputs = FrameInputs {
                bounds,
                background: &bg,
                balls: balls.balls(),
                accent: Rgb::WHITE,
                emote: EmoteModifiers::default(),
                bubble: None,
            };
            renderer.render(&inputs).clone()
        };
        let inputs = FrameInputs {
            bounds,
            background: &bg,
            balls: balls.balls(),
            accent: Rgb::WHITE,
            emote: EmoteModifiers::default(),
            bubble: Some((&bubble, 1.0)),
        };
        let with = renderer.render(&inputs);
        assert_ne!(without.as_bytes(), with.as_bytes());
    }
}
