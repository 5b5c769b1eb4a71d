//! Metaball particle system
//!
//! A fixed set of blobs clustered around the container center. Each blob owns a
//! contiguous slice of the spectrum; its loudness drives the blob's radius and
//! how hard it wobbles. Without audio, a deterministic sine pattern keeps the
//! cluster alive.

use std::f32::consts::TAU;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::audio::{Spectrum, SPECTRUM_LEN};
use crate::boundary::Bounds;
use crate::math::Vec2;
use crate::physics;
use crate::util::Rng;

pub const DEFAULT_BALL_COUNT: usize = 8;
pub const MIN_BALL_COUNT: usize = 4;
pub const MAX_BALL_COUNT: usize = 24;

/// Angular jitter applied to the initial ring layout, radians
const LAYOUT_JITTER: f32 = 0.4;
/// Initial cluster disc radius as a share of the container's short side
const LAYOUT_DISC: f32 = 0.25;
/// Synthetic pattern phase offset between consecutive balls
const SYNTH_PHASE_STEP: f32 = 0.9;

/// Clamp a requested ball count into the supported range
pub fn clamp_ball_count(requested: usize) -> usize {
    requested.clamp(MIN_BALL_COUNT, MAX_BALL_COUNT)
}

/// Split `[0, len)` into `count` contiguous ranges. The last range absorbs the
/// remainder of an uneven division, so the ranges always tile the spectrum.
pub fn partition(len: usize, count: usize) -> Vec<Range<usize>> {
    if count == 0 {
        return Vec::new();
    }
    let width = len / count;
    (0..count)
        .map(|i| {
            let start = i * width;
            let end = if i + 1 == count { len } else { start + width };
            start..end
        })
        .collect()
}

/// Tunables for the particle system (logical pixels)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaballParams {
    pub count: usize,
    /// Radius growth at full amplitude
    pub radius_scale: f32,
    pub base_radius_min: f32,
    pub base_radius_max: f32,
    /// Floor for the drawn radius
    pub min_radius: f32,
    /// Initial drift speed, pixels per frame
    pub drift: f32,
    pub breathing_speed_min: f32,
    pub breathing_speed_max: f32,
    pub spectrum_len: usize,
}

impl Default for MetaballParams {
    fn default() -> Self {
        Self {
            count: DEFAULT_BALL_COUNT,
            radius_scale: 25.0,
            base_radius_min: 26.0,
            base_radius_max: 38.0,
            min_radius: 8.0,
            drift: 0.3,
            breathing_speed_min: 0.015,
            breathing_speed_max: 0.035,
            spectrum_len: SPECTRUM_LEN,
        }
    }
}

/// A single blob. Positions are offsets from the cluster center.
#[derive(Debug, Clone, PartialEq)]
pub struct Metaball {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Rest offset the synthetic pattern oscillates around
    pub anchor: Vec2,
    pub base_radius: f32,
    pub current_radius: f32,
    pub frequency_range: Range<usize>,
    pub breathing_phase: f32,
    pub breathing_speed: f32,
}

impl Metaball {
    #[inline]
    pub fn absolute_position(&self, center: Vec2) -> Vec2 {
        center + self.position
    }
}

/// Owns every blob for the session
#[derive(Debug, Clone)]
pub struct MetaballSystem {
    balls: Vec<Metaball>,
    params: MetaballParams,
    /// Device pixel ratio applied to all pixel-valued params
    pixel_scale: f32,
}

impl MetaballSystem {
    /// Lay out `params.count` balls (clamped to the supported range) in a
    /// jittered ring inside a disc at the container center.
    pub fn new(params: MetaballParams, bounds: &Bounds, pixel_scale: f32, rng: &mut Rng) -> Self {
        let count = clamp_ball_count(params.count);
        let pixel_scale = if pixel_scale.is_finite() && pixel_scale > 0.0 {
            pixel_scale
        } else {
            1.0
        };
        let disc = LAYOUT_DISC * bounds.min_side();
        let ranges = partition(params.spectrum_len, count);

        let (r_lo, r_hi) = ordered(params.base_radius_min, params.base_radius_max);
        let (s_lo, s_hi) = ordered(params.breathing_speed_min, params.breathing_speed_max);

        let balls = ranges
            .into_iter()
            .enumerate()
            .map(|(i, frequency_range)| {
                let angle = i as f32 / count as f32 * TAU + rng.jitter(LAYOUT_JITTER);
                let distance = disc * (0.35 + 0.65 * rng.next_f32());
                let position = Vec2::from_polar(angle, distance);
                let base_radius = rng.range_f32(r_lo, r_hi).max(params.min_radius) * pixel_scale;
                Metaball {
                    position,
                    velocity: Vec2::new(rng.jitter(params.drift), rng.jitter(params.drift))
                        * pixel_scale,
                    anchor: position,
                    base_radius,
                    current_radius: base_radius,
                    frequency_range,
                    breathing_phase: rng.next_f32() * TAU,
                    breathing_speed: rng.range_f32(s_lo, s_hi),
                }
            })
            .collect();

        Self {
            balls,
            params: MetaballParams { count, ..params },
            pixel_scale,
        }
    }

    pub fn balls(&self) -> &[Metaball] {
        &self.balls
    }

    pub fn len(&self) -> usize {
        self.balls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balls.is_empty()
    }

    pub fn params(&self) -> &MetaballParams {
        &self.params
    }

    /// Radius growth at full amplitude, in physical pixels
    #[inline]
    pub fn radius_scale(&self) -> f32 {
        self.params.radius_scale * self.pixel_scale
    }

    #[inline]
    fn min_radius(&self) -> f32 {
        self.params.min_radius * self.pixel_scale
    }

    /// One frame of audio-driven motion.
    ///
    /// `frame_scale` is elapsed time in 60 Hz frames; `energy` scales the
    /// wobble (mood). Missing spectrum bins read as silence.
    pub fn update_from_audio(
        &mut self,
        spectrum: &Spectrum,
        bounds: &Bounds,
        frame_scale: f32,
        energy: f32,
    ) {
        let center = bounds.center();
        let radius_scale = self.radius_scale();
        let min_radius = self.min_radius();
        let pixel_scale = self.pixel_scale;

        for ball in &mut self.balls {
            let range = &ball.frequency_range;
            let amplitude = spectrum.band_average(range.start, range.end);
            let influence = (amplitude / 255.0).clamp(0.0, 1.0);

            ball.current_radius = (ball.base_radius + influence * radius_scale).max(min_radius);
            ball.breathing_phase =
                (ball.breathing_phase + ball.breathing_speed * frame_scale) % TAU;

            let wobble = Vec2::new(
                ball.breathing_phase.sin() * (0.3 + influence),
                ball.breathing_phase.cos() * (0.2 + influence * 0.5),
            ) * (energy * pixel_scale);
            ball.position += (ball.velocity + wobble) * frame_scale;

            let mut absolute = center + ball.position;
            physics::contain(&mut absolute, &mut ball.velocity, ball.current_radius, bounds);
            ball.position = absolute - center;
        }
    }

    /// Deterministic stand-in for audio: radius and offset are pure functions
    /// of `time` and the ball's index, so repeated calls with the same time
    /// produce the same frame.
    pub fn update_synthetic(&mut self, time: f32, bounds: &Bounds) {
        let center = bounds.center();
        let radius_scale = self.radius_scale();
        let min_radius = self.min_radius();
        let pixel_scale = self.pixel_scale;

        for (i, ball) in self.balls.iter_mut().enumerate() {
            let phase = i as f32 * SYNTH_PHASE_STEP;
            let pulse = 0.5 + 0.5 * (time * 1.6 + phase).sin();
            ball.current_radius = (ball.base_radius + pulse * radius_scale * 0.6).max(min_radius);

            let mut absolute = center + ball.anchor + synthetic_offset(i, time, pixel_scale);
            // Containment only; synthetic frames never feed back into velocity
            let mut scratch = ball.velocity;
            physics::contain(&mut absolute, &mut scratch, ball.current_radius, bounds);
            ball.position = absolute - center;
        }
    }

    /// Re-anchor the synthetic pattern so that at `time` it reproduces the
    /// current positions. Called when audio stops, to avoid a visible jump.
    pub fn rebase_synthetic(&mut self, time: f32) {
        let pixel_scale = self.pixel_scale;
        for (i, ball) in self.balls.iter_mut().enumerate() {
            ball.anchor = ball.position - synthetic_offset(i, time, pixel_scale);
        }
    }
}

/// Sinusoidal drift of ball `index` around its anchor at `time`
fn synthetic_offset(index: usize, time: f32, pixel_scale: f32) -> Vec2 {
    let phase = index as f32 * SYNTH_PHASE_STEP;
    Vec2::new(
        (time * 0.7 + phase).sin() * 18.0,
        (time * 0.9 + phase * 1.3).cos() * 12.0,
    ) * pixel_scale
}

#[inline]
fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::MARGIN_FACTOR;
    use crate::util::Rng;
    use proptest::prelude::*;

    fn bounds() -> Bounds {
        Bounds::new(160.0, 40.0, 320.0, 400.0)
    }

    fn system(count: usize) -> MetaballSystem {
        let params = MetaballParams {
            count,
            ..MetaballParams::default()
        };
        MetaballSystem::new(params, &bounds(), 1.0, &mut Rng::new(1234))
    }

    #[test]
    fn test_eight_balls_get_32_bins_each() {
        let sys = system(8);
        assert_eq!(sys.len(), 8);
        for ball in sys.balls() {
            assert_eq!(ball.frequency_range.len(), 32);
        }
        assert_eq!(sys.balls()[0].frequency_range, 0..32);
        assert_eq!(sys.balls()[7].frequency_range, 224..256);
    }

    #[test]
    fn test_count_clamped() {
        assert_eq!(system(0).len(), MIN_BALL_COUNT);
        assert_eq!(system(1000).len(), MAX_BALL_COUNT);
        assert_eq!(system(12).len(), 12);
    }

    #[test]
    fn test_partition_uneven_remainder_goes_last() {
        let ranges = partition(10, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
        let short = partition(2, 4);
        assert_eq!(short, vec![0..0, 0..0, 0..0, 0..2]);
    }

    #[test]
    fn test_layout_inside_cluster_disc() {
        let sys = system(16);
        let disc = LAYOUT_DISC * bounds().min_side();
        for ball in sys.balls() {
            assert!(ball.position.length() <= disc + 1e-3);
            assert!(ball.base_radius >= 26.0 && ball.base_radius < 38.0);
        }
    }

    #[test]
    fn test_same_seed_same_layout() {
        assert_eq!(system(8).balls(), system(8).balls());
    }

    #[test]
    fn test_silence_keeps_base_radius() {
        let mut sys = system(8);
        let before: Vec<Vec2> = sys.balls().iter().map(|b| b.position).collect();
        for _ in 0..30 {
            sys.update_from_audio(&Spectrum::silent(), &bounds(), 1.0, 1.0);
        }
        for ball in sys.balls() {
            assert_eq!(ball.current_radius, ball.base_radius);
        }
        let after: Vec<Vec2> = sys.balls().iter().map(|b| b.position).collect();
        assert_ne!(before, after, "breathing should still move the blobs");
    }

    #[test]
    fn test_full_amplitude_reaches_max_radius() {
        let mut sys = system(8);
        sys.update_from_audio(&Spectrum::new(vec![255; SPECTRUM_LEN]), &bounds(), 1.0, 1.0);
        for ball in sys.balls() {
            assert!((ball.current_radius - (ball.base_radius + 25.0)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_short_spectrum_only_feeds_low_balls() {
        let mut sys = system(8);
        sys.update_from_audio(&Spectrum::new(vec![255; 32]), &bounds(), 1.0, 1.0);
        let balls = sys.balls();
        assert!(balls[0].current_radius > balls[0].base_radius);
        for ball in &balls[1..] {
            assert_eq!(ball.current_radius, ball.base_radius);
        }
    }

    #[test]
    fn test_empty_spectrum_is_silence() {
        let mut sys = system(6);
        sys.update_from_audio(&Spectrum::new(Vec::new()), &bounds(), 1.0, 1.0);
        for ball in sys.balls() {
            assert_eq!(ball.current_radius, ball.base_radius);
        }
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let mut a = system(8);
        let mut b = system(8);
        a.update_synthetic(3.7, &bounds());
        a.update_synthetic(3.7, &bounds());
        b.update_synthetic(1.0, &bounds());
        b.update_synthetic(3.7, &bounds());
        assert_eq!(a.balls(), b.balls());
    }

    #[test]
    fn test_synthetic_never_static() {
        let mut sys = system(8);
        sys.update_synthetic(0.0, &bounds());
        let snapshot = |s: &MetaballSystem| -> Vec<(Vec2, f32)> {
            s.balls().iter().map(|b| (b.position, b.current_radius)).collect()
        };
        let first = snapshot(&sys);
        sys.update_synthetic(0.5, &bounds());
        let second = snapshot(&sys);
        assert_ne!(first, second);
    }

    #[test]
    fn test_rebase_keeps_positions_continuous() {
        let mut sys = system(8);
        for _ in 0..20 {
            sys.update_from_audio(&Spectrum::new(vec![128; SPECTRUM_LEN]), &bounds(), 1.0, 1.0);
        }
        let before: Vec<Vec2> = sys.balls().iter().map(|b| b.position).collect();
        sys.rebase_synthetic(10.0);
        sys.update_synthetic(10.0, &bounds());
        for (ball, old) in sys.balls().iter().zip(&before) {
            // Containment may nudge a ball that grew against a wall; the rest stay put
            assert!((ball.position - *old).length() < ball.current_radius);
        }
    }

    #[test]
    fn test_balls_stay_inside_under_loud_audio() {
        let mut sys = system(16);
        let b = bounds();
        let center = b.center();
        for frame in 0..600 {
            let level = if frame % 10 < 5 { 255 } else { 0 };
            sys.update_from_audio(&Spectrum::new(vec![level; SPECTRUM_LEN]), &b, 1.0, 1.6);
            for ball in sys.balls() {
                let p = ball.absolute_position(center);
                let margin = ball.current_radius * MARGIN_FACTOR;
                assert!(p.x - margin >= b.x - 1e-3 && p.x + margin <= b.right() + 1e-3);
                assert!(p.y - margin >= b.y - 1e-3 && p.y + margin <= b.bottom() + 1e-3);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_partition_tiles_spectrum(len in 0usize..2048, count in 1usize..64) {
            let ranges = partition(len, count);
            prop_assert_eq!(ranges.len(), count);
            prop_assert_eq!(ranges[0].start, 0);
            prop_assert_eq!(ranges[count - 1].end, len);
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            let covered: usize = ranges.iter().map(|r| r.end - r.start).sum();
            prop_assert_eq!(covered, len);
        }

        #[test]
        fn prop_radius_within_band(level in 0u8..=255, count in 4usize..=24) {
            let mut sys = system(count);
            sys.update_from_audio(&Spectrum::new(vec![level; SPECTRUM_LEN]), &bounds(), 1.0, 1.0);
            let scale = sys.radius_scale();
            for ball in sys.balls() {
                prop_assert!(ball.current_radius >= ball.base_radius);
                prop_assert!(ball.current_radius <= ball.base_radius + scale + 1e-4);
            }
        }
    }
}
