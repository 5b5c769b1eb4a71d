//! Shared utilities

use std::collections::VecDeque;
use std::time::Instant;

/// Deterministic xorshift64 RNG.
/// Particle layouts and background circles are seeded so a given config
/// always produces the same scene.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    /// Create a new RNG with the given seed
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) } // xorshift gets stuck at zero
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 7;
        self.state ^= self.state << 17;
        self.state
    }

    /// Random f32 in [0, 1)
    #[inline]
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() & 0xFFFFFF) as f32 / 0x1000000 as f32
    }

    /// Random f32 in [min, max)
    #[inline]
    pub fn range_f32(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Random f32 in [-amount, amount)
    #[inline]
    pub fn jitter(&mut self, amount: f32) -> f32 {
        (self.next_f32() * 2.0 - 1.0) * amount
    }
}

/// Frame clock with a rolling average, used by the animation driver to turn
/// wall time into per-frame deltas.
pub struct FrameClock {
    frame_times: VecDeque<f32>,
    last_frame: Instant,
    started: Instant,
    sample_count: usize,
}

impl FrameClock {
    /// Longest delta handed to the simulation; a stalled frame (window drag,
    /// debugger) must not fling the particles across the boundary.
    pub const MAX_DT: f32 = 0.1;

    pub fn new(sample_count: usize) -> Self {
        let now = Instant::now();
        Self {
            frame_times: VecDeque::with_capacity(sample_count),
            last_frame: now,
            started: now,
            sample_count: sample_count.max(1),
        }
    }

    /// Record a frame boundary.
    /// Returns (delta_time, elapsed_seconds)
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(Self::MAX_DT);
        self.last_frame = now;

        self.frame_times.push_back(dt);
        if self.frame_times.len() > self.sample_count {
            self.frame_times.pop_front();
        }

        (dt, (now - self.started).as_secs_f32())
    }

    /// Average frames per second over the sample window
    pub fn avg_fps(&self) -> f32 {
        let avg_dt: f32 =
            self.frame_times.iter().sum::<f32>() / self.frame_times.len().max(1) as f32;
        if avg_dt > 0.0 {
            1.0 / avg_dt
        } else {
            0.0
        }
    }
}
