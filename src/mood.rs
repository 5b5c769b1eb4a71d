//! Character hooks: emotional state, emotes and thought bubbles
//!
//! The emotional state is a persistent mode that scales how energetic the
//! cluster looks. Emotes and thought bubbles are transient: each carries a
//! start time and duration and is evaluated once per frame, then dropped when
//! it expires. None of this touches particle state; it only modulates how the
//! current state is drawn and how strongly motion responds.

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::str::FromStr;

use crate::math::Vec2;

/// Persistent mood of the visualizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmotionalState {
    #[default]
    Neutral,
    Calm,
    Happy,
    Excited,
    Focused,
    Sleepy,
}

impl EmotionalState {
    /// Multiplier applied to the audio-driven wobble
    pub fn energy(self) -> f32 {
        match self {
            Self::Neutral => 1.0,
            Self::Calm => 0.6,
            Self::Happy => 1.2,
            Self::Excited => 1.6,
            Self::Focused => 0.8,
            Self::Sleepy => 0.35,
        }
    }

    /// Multiplier applied to the background breathing speed
    pub fn breathing_rate(self) -> f32 {
        match self {
            Self::Neutral | Self::Focused => 1.0,
            Self::Calm => 0.7,
            Self::Happy => 1.15,
            Self::Excited => 1.5,
            Self::Sleepy => 0.5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Calm => "calm",
            Self::Happy => "happy",
            Self::Excited => "excited",
            Self::Focused => "focused",
            Self::Sleepy => "sleepy",
        }
    }
}

impl FromStr for EmotionalState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "neutral" | "idle" | "default" => Ok(Self::Neutral),
            "calm" | "relaxed" => Ok(Self::Calm),
            "happy" | "joy" => Ok(Self::Happy),
            "excited" | "energetic" => Ok(Self::Excited),
            "focused" | "focus" | "working" => Ok(Self::Focused),
            "sleepy" | "tired" => Ok(Self::Sleepy),
            _ => Err(()),
        }
    }
}

/// Kinds of one-shot emote animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmoteKind {
    /// Cluster hops up and settles
    Bounce,
    /// All blobs swell then relax
    Pulse,
    /// Fast horizontal jitter
    Shake,
    /// Blobs orbit the cluster center once
    Spin,
}

impl EmoteKind {
    /// Default duration in seconds
    pub fn duration(self) -> f32 {
        match self {
            Self::Bounce => 0.9,
            Self::Pulse => 0.7,
            Self::Shake => 0.5,
            Self::Spin => 1.2,
        }
    }
}

impl FromStr for EmoteKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bounce" | "jump" | "hop" => Ok(Self::Bounce),
            "pulse" | "heartbeat" => Ok(Self::Pulse),
            "shake" | "shiver" | "no" => Ok(Self::Shake),
            "spin" | "twirl" => Ok(Self::Spin),
            _ => Err(()),
        }
    }
}

/// A queued emote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emote {
    pub kind: EmoteKind,
    pub started_at: f32,
    pub duration: f32,
}

impl Emote {
    /// Normalized progress in [0, 1] at time `now`, None before start
    pub fn progress(&self, now: f32) -> Option<f32> {
        if now < self.started_at {
            return None;
        }
        Some(((now - self.started_at) / self.duration.max(1e-3)).min(1.0))
    }

    pub fn is_finished(&self, now: f32) -> bool {
        now >= self.started_at + self.duration
    }
}

/// Render-time adjustment produced by the active emotes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmoteModifiers {
    /// Offset added to the whole cluster
    pub offset: Vec2,
    /// Multiplier on every blob radius
    pub radius_scale: f32,
    /// Rotation of blob offsets around the cluster center, radians
    pub rotation: f32,
}

impl Default for EmoteModifiers {
    fn default() -> Self {
        Self {
            offset: Vec2::zero(),
            radius_scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Emotes play back to back; only the head of the queue is active.
#[derive(Debug, Default)]
pub struct EmoteQueue {
    queue: VecDeque<Emote>,
}

impl EmoteQueue {
    /// Longest backlog kept; further triggers are dropped
    pub const CAPACITY: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an emote. It starts at `now` or when the previous one ends.
    /// Returns false when the backlog is full.
    pub fn push(&mut self, kind: EmoteKind, now: f32) -> bool {
        if self.queue.len() >= Self::CAPACITY {
            return false;
        }
        let started_at = self
            .queue
            .back()
            .map_or(now, |last| (last.started_at + last.duration).max(now));
        self.queue.push_back(Emote {
            kind,
            started_at,
            duration: kind.duration(),
        });
        true
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn active(&self) -> Option<&Emote> {
        self.queue.front()
    }

    /// Drop finished emotes and compute this frame's modifiers.
    /// `scale` converts the normalized amplitudes to pixels.
    pub fn evaluate(&mut self, now: f32, scale: f32) -> EmoteModifiers {
        while self.queue.front().is_some_and(|e| e.is_finished(now)) {
            self.queue.pop_front();
        }

        let Some(emote) = self.queue.front() else {
            return EmoteModifiers::default();
        };
        let Some(t) = emote.progress(now) else {
            return EmoteModifiers::default();
        };

        // Every envelope returns to rest at t = 1
        let envelope = (t * std::f32::consts::PI).sin();
        let mut mods = EmoteModifiers::default();
        match emote.kind {
            EmoteKind::Bounce => {
                let hop = (t * TAU).sin().abs() * (1.0 - t);
                mods.offset = Vec2::new(0.0, -hop * 40.0 * scale);
            }
            EmoteKind::Pulse => {
                mods.radius_scale = 1.0 + 0.35 * envelope;
            }
            EmoteKind::Shake => {
                mods.offset = Vec2::new((t * TAU * 6.0).sin() * 12.0 * scale * envelope, 0.0);
            }
            EmoteKind::Spin => {
                // Ease in and out over one full turn
                let eased = t * t * (3.0 - 2.0 * t);
                mods.rotation = eased * TAU;
            }
        }
        mods
    }
}

/// A transient text bubble shown above the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtBubble {
    pub text: String,
    pub priority: u8,
    pub started_at: f32,
    pub duration: f32,
}

impl ThoughtBubble {
    /// Opacity in [0, 1] with short fade in and out, zero once expired
    pub fn opacity(&self, now: f32) -> f32 {
        const FADE: f32 = 0.3;
        let age = now - self.started_at;
        if age < 0.0 || age >= self.duration {
            return 0.0;
        }
        let fade_in = (age / FADE).min(1.0);
        let fade_out = ((self.duration - age) / FADE).min(1.0);
        fade_in.min(fade_out)
    }
}

/// Holds at most one visible bubble. A new bubble replaces the current one
/// when its priority is at least as high; lower-priority bubbles are dropped
/// while a higher one is showing.
#[derive(Debug, Default)]
pub struct BubbleSlot {
    current: Option<ThoughtBubble>,
}

impl BubbleSlot {
    /// Base display time; longer text stays up longer
    pub const BASE_DURATION: f32 = 2.5;
    pub const PER_CHAR: f32 = 0.06;
    pub const MAX_DURATION: f32 = 8.0;

    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the bubble is shown
    pub fn offer(&mut self, text: &str, priority: u8, now: f32) -> bool {
        self.expire(now);
        if let Some(current) = &self.current {
            if priority < current.priority {
                return false;
            }
        }
        let chars = text.chars().count() as f32;
        let duration = (Self::BASE_DURATION + chars * Self::PER_CHAR).min(Self::MAX_DURATION);
        self.current = Some(ThoughtBubble {
            text: text.to_string(),
            priority,
            started_at: now,
            duration,
        });
        true
    }

    pub fn expire(&mut self, now: f32) {
        if self
            .current
            .as_ref()
            .is_some_and(|b| now >= b.started_at + b.duration)
        {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&ThoughtBubble> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_states_and_aliases() {
        assert_eq!("Happy".parse(), Ok(EmotionalState::Happy));
        assert_eq!(" tired ".parse(), Ok(EmotionalState::Sleepy));
        assert!("furious".parse::<EmotionalState>().is_err());
        assert_eq!("jump".parse(), Ok(EmoteKind::Bounce));
        assert!("moonwalk".parse::<EmoteKind>().is_err());
    }

    #[test]
    fn test_emotes_play_in_sequence() {
        let mut q = EmoteQueue::new();
        assert!(q.push(EmoteKind::Pulse, 1.0));
        assert!(q.push(EmoteKind::Shake, 1.0));
        let second = q.queue[1];
        assert_eq!(second.started_at, 1.0 + EmoteKind::Pulse.duration());

        q.evaluate(1.0 + EmoteKind::Pulse.duration() + 0.01, 1.0);
        assert_eq!(q.len(), 1);
        assert_eq!(q.active().unwrap().kind, EmoteKind::Shake);

        q.evaluate(100.0, 1.0);
        assert!(q.is_empty());
    }

    #[test]
    fn test_emote_queue_capacity() {
        let mut q = EmoteQueue::new();
        for _ in 0..EmoteQueue::CAPACITY {
            assert!(q.push(EmoteKind::Spin, 0.0));
        }
        assert!(!q.push(EmoteKind::Spin, 0.0));
    }

    #[test]
    fn test_pulse_swells_mid_way_and_rests_at_end() {
        let mut q = EmoteQueue::new();
        q.push(EmoteKind::Pulse, 0.0);
        let mid = q.evaluate(EmoteKind::Pulse.duration() / 2.0, 1.0);
        assert!(mid.radius_scale > 1.3);
        let rest = q.evaluate(EmoteKind::Pulse.duration() + 0.1, 1.0);
        assert_eq!(rest, EmoteModifiers::default());
    }

    #[test]
    fn test_bounce_moves_up() {
        let mut q = EmoteQueue::new();
        q.push(EmoteKind::Bounce, 0.0);
        let mods = q.evaluate(0.2, 1.0);
        assert!(mods.offset.y < 0.0);
        assert_eq!(mods.radius_scale, 1.0);
    }

    #[test]
    fn test_bubble_priority() {
        let mut slot = BubbleSlot::new();
        assert!(slot.offer("break time", 5, 0.0));
        assert!(!slot.offer("low", 1, 0.5));
        assert_eq!(slot.current().unwrap().text, "break time");
        assert!(slot.offer("urgent", 9, 0.6));
        assert_eq!(slot.current().unwrap().text, "urgent");
    }

    #[test]
    fn test_bubble_expires_and_frees_slot() {
        let mut slot = BubbleSlot::new();
        slot.offer("hi", 9, 0.0);
        let end = slot.current().unwrap().duration;
        assert!(slot.current().unwrap().opacity(end / 2.0) > 0.99);
        slot.expire(end + 0.01);
        assert!(slot.current().is_none());
        assert!(slot.offer("later", 0, end + 0.02));
    }

    #[test]
    fn test_bubble_duration_capped() {
        let mut slot = BubbleSlot::new();
        let long = "x".repeat(1000);
        slot.offer(&long, 0, 0.0);
        assert_eq!(slot.current().unwrap().duration, BubbleSlot::MAX_DURATION);
    }
}
