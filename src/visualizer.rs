//! The visualizer facade
//!
//! Owns every piece of per-session state (container, blobs, background,
//! mood, renderer) and exposes the host hooks. All hooks are infallible:
//! bad input is logged and ignored so a misbehaving host can never take the
//! animation down.

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::audio::AudioProvider;
use crate::background::BreathingLayer;
use crate::boundary::{compute_bounds, Bounds, SurfaceSize};
use crate::color::Rgb;
use crate::config::VisualizerConfig;
use crate::display::PixelBuffer;
use crate::error::Result;
use crate::metaball::MetaballSystem;
use crate::mood::{BubbleSlot, EmoteKind, EmoteQueue, EmotionalState, ThoughtBubble};
use crate::render::{FrameInputs, Renderer};
use crate::util::{FrameClock, Rng};

/// What the last tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Particles moved this frame (audio or synthetic)
    Active,
    /// Particles frozen: not started, or no audio and no demo fallback
    Idle,
}

/// A host hook invocation as data, so remote and window input can share one
/// path into the visualizer
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Hook {
    Start,
    Stop,
    Theme { color: String },
    Mood { state: String },
    Emote { kind: String },
    Thought {
        text: String,
        #[serde(default)]
        priority: u8,
    },
}

pub struct Visualizer {
    config: VisualizerConfig,
    surface: SurfaceSize,
    bounds: Bounds,
    rng: Rng,
    metaballs: MetaballSystem,
    background: BreathingLayer,
    renderer: Renderer,
    theme: Rgb,
    mood: EmotionalState,
    emotes: EmoteQueue,
    bubbles: BubbleSlot,
    running: bool,
    /// Seconds of animated time since construction
    time: f32,
    state: RenderState,
    /// Last active frame was driven by audio
    audio_live: bool,
}

impl Visualizer {
    pub fn new(config: VisualizerConfig, surface: SurfaceSize) -> Result<Self> {
        // Re-validate: the host may have built the struct by hand
        let surface = SurfaceSize::new(surface.width, surface.height, surface.scale_factor)?;
        let config = config.sanitized();
        let theme = config.theme();

        let mut rng = Rng::new(config.seed);
        let bounds = compute_bounds(&surface, &config.boundary);
        let metaballs =
            MetaballSystem::new(config.metaballs, &bounds, surface.scale_factor, &mut rng);
        let background =
            BreathingLayer::generate(config.breathing_circles, &bounds, theme, &mut rng);

        let mut renderer = Renderer::new(0, 0, config.render_mode);
        renderer.backdrop = config.backdrop_color();
        renderer.debug_bounds = config.debug_bounds;
        renderer.glow_strength = config.glow_strength;

        info!(
            width = surface.width,
            height = surface.height,
            scale = surface.scale_factor,
            balls = metaballs.len(),
            mode = ?config.render_mode,
            "visualizer created"
        );

        Ok(Self {
            config,
            surface,
            bounds,
            rng,
            metaballs,
            background,
            renderer,
            theme,
            mood: EmotionalState::default(),
            emotes: EmoteQueue::new(),
            bubbles: BubbleSlot::new(),
            running: false,
            time: 0.0,
            state: RenderState::Idle,
            audio_live: false,
        })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Allocate frame buffers and begin animating. No-op when running.
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.renderer.resize(self.surface.width, self.surface.height);
        self.running = true;
        info!("visualizer started");
    }

    /// Stop animating and release frame buffers. No-op when stopped.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.state = RenderState::Idle;
        self.renderer.resize(0, 0);
        info!("visualizer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Adopt a new surface size. Recomputes the container and lays out a
    /// fresh cluster and background; identical sizes are ignored.
    pub fn resize(&mut self, surface: SurfaceSize) {
        let surface = match SurfaceSize::new(surface.width, surface.height, surface.scale_factor) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "ignoring resize");
                return;
            }
        };
        if surface == self.surface {
            return;
        }

        self.surface = surface;
        self.bounds = compute_bounds(&surface, &self.config.boundary);
        self.metaballs = MetaballSystem::new(
            self.config.metaballs,
            &self.bounds,
            surface.scale_factor,
            &mut self.rng,
        );
        self.background = BreathingLayer::generate(
            self.config.breathing_circles,
            &self.bounds,
            self.theme,
            &mut self.rng,
        );
        self.audio_live = false;
        if self.running {
            self.renderer.resize(surface.width, surface.height);
        }
        debug!(
            width = surface.width,
            height = surface.height,
            bounds_w = self.bounds.width,
            bounds_h = self.bounds.height,
            "resized"
        );
    }

    // ========================================================================
    // Hooks
    // ========================================================================

    /// Change the accent color. Only the background is recolored; particles
    /// are left exactly where they are.
    pub fn set_theme_color(&mut self, hex: &str) {
        match Rgb::from_hex(hex) {
            Ok(theme) => {
                self.theme = theme;
                self.background.recolor(theme);
                debug!(theme = %theme.to_hex(), "theme changed");
            }
            Err(e) => warn!(error = %e, "ignoring theme color"),
        }
    }

    pub fn set_emotional_state(&mut self, name: &str) {
        match name.parse::<EmotionalState>() {
            Ok(state) => {
                if state != self.mood {
                    info!(from = self.mood.name(), to = state.name(), "emotional state");
                }
                self.mood = state;
            }
            Err(()) => warn!(name, "unknown emotional state"),
        }
    }

    pub fn trigger_emote(&mut self, name: &str) {
        match name.parse::<EmoteKind>() {
            Ok(kind) => {
                if self.emotes.push(kind, self.time) {
                    debug!(?kind, queued = self.emotes.len(), "emote");
                } else {
                    warn!(?kind, "emote queue full, dropping");
                }
            }
            Err(()) => warn!(name, "unknown emote"),
        }
    }

    /// Show a transient bubble above the cluster. Higher `priority` wins when
    /// one is already showing.
    pub fn show_thought_bubble(&mut self, text: &str, priority: u8) {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring empty thought bubble");
            return;
        }
        if self.bubbles.offer(text, priority, self.time) {
            info!(text, priority, "thought bubble");
        } else {
            debug!(text, priority, "thought bubble outranked");
        }
    }

    /// Dispatch a hook given as data
    pub fn apply(&mut self, hook: &Hook) {
        match hook {
            Hook::Start => self.start(),
            Hook::Stop => self.stop(),
            Hook::Theme { color } => self.set_theme_color(color),
            Hook::Mood { state } => self.set_emotional_state(state),
            Hook::Emote { kind } => self.trigger_emote(kind),
            Hook::Thought { text, priority } => self.show_thought_bubble(text, *priority),
        }
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Advance by `dt` seconds and render one frame.
    ///
    /// The provider is polled once. With no spectrum the synthetic pattern
    /// takes over when the demo fallback is enabled; otherwise the cluster
    /// freezes but the frame is still drawn.
    pub fn tick(&mut self, dt: f32, provider: Option<&mut dyn AudioProvider>) -> RenderState {
        if !self.running {
            return RenderState::Idle;
        }

        let dt = if dt.is_finite() {
            dt.clamp(0.0, FrameClock::MAX_DT)
        } else {
            0.0
        };
        self.time += dt;
        let frame_scale = dt * 60.0;

        let spectrum = provider.and_then(|p| {
            p.advance(dt);
            p.spectrum()
        });

        let state = match spectrum {
            Some(spectrum) => {
                self.metaballs.update_from_audio(
                    &spectrum,
                    &self.bounds,
                    frame_scale,
                    self.mood.energy(),
                );
                self.audio_live = true;
                RenderState::Active
            }
            None if self.config.demo_fallback => {
                if self.audio_live {
                    self.metaballs.rebase_synthetic(self.time);
                    self.audio_live = false;
                }
                self.metaballs.update_synthetic(self.time, &self.bounds);
                RenderState::Active
            }
            None => RenderState::Idle,
        };
        if state != self.state {
            debug!(?state, "render state");
            self.state = state;
        }

        if state == RenderState::Active {
            self.background
                .advance(frame_scale, self.mood.breathing_rate());
        }

        let emote = self.emotes.evaluate(self.time, self.surface.scale_factor);
        self.bubbles.expire(self.time);
        let bubble = self
            .bubbles
            .current()
            .map(|b| (b, b.opacity(self.time)));

        let inputs = FrameInputs {
            bounds: self.bounds,
            background: &self.background,
            balls: self.metaballs.balls(),
            accent: self.theme,
            emote,
            bubble,
        };
        self.renderer.render(&inputs);

        state
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Last rendered frame (empty when stopped)
    pub fn frame(&self) -> &PixelBuffer {
        self.renderer.frame()
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn surface(&self) -> &SurfaceSize {
        &self.surface
    }

    pub fn metaballs(&self) -> &MetaballSystem {
        &self.metaballs
    }

    pub fn background(&self) -> &BreathingLayer {
        &self.background
    }

    pub fn theme(&self) -> Rgb {
        self.theme
    }

    pub fn emotional_state(&self) -> EmotionalState {
        self.mood
    }

    pub fn emotes(&self) -> &EmoteQueue {
        &self.emotes
    }

    pub fn thought_bubble(&self) -> Option<&ThoughtBubble> {
        self.bubbles.current()
    }

    pub fn render_state(&self) -> RenderState {
        self.state
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{PulseSource, Spectrum};

    const DT: f32 = 1.0 / 60.0;

    struct Fixed(Option<Spectrum>);

    impl AudioProvider for Fixed {
        fn spectrum(&mut self) -> Option<Spectrum> {
            self.0.clone()
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn visualizer(config: VisualizerConfig) -> Visualizer {
        let surface = SurfaceSize::new(640, 480, 1.0).unwrap();
        Visualizer::new(config, surface).unwrap()
    }

    fn positions(v: &Visualizer) -> Vec<(f32, f32, f32)> {
        v.metaballs()
            .balls()
            .iter()
            .map(|b| (b.position.x, b.position.y, b.current_radius))
            .collect()
    }

    #[test]
    fn test_new_rejects_empty_surface() {
        let surface = SurfaceSize {
            width: 0,
            height: 480,
            scale_factor: 1.0,
        };
        assert!(Visualizer::new(VisualizerConfig::default(), surface).is_err());
    }

    #[test]
    fn test_not_started_is_idle_and_unrendered() {
        let mut v = visualizer(VisualizerConfig::default());
        assert_eq!(v.tick(DT, None), RenderState::Idle);
        assert_eq!(v.frame().width(), 0);
        assert_eq!(v.time(), 0.0);
    }

    #[test]
    fn test_start_renders_full_frame() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        assert_eq!(v.tick(DT, None), RenderState::Active);
        assert_eq!((v.frame().width(), v.frame().height()), (640, 480));
    }

    #[test]
    fn test_stop_releases_buffers() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        v.tick(DT, None);
        v.stop();
        assert!(!v.is_running());
        assert_eq!(v.frame().as_bytes().len(), 0);
        assert_eq!(v.tick(DT, None), RenderState::Idle);
    }

    #[test]
    fn test_oversized_radius_config_still_renders() {
        let mut config = VisualizerConfig::default();
        config.metaballs.base_radius_min = 40_000.0;
        config.metaballs.base_radius_max = 90_000.0;
        config.metaballs.radius_scale = 1.0e9;
        let mut v = visualizer(config);
        v.start();
        let mut provider = Fixed(Some(Spectrum::new(vec![255; 256])));
        for _ in 0..3 {
            assert_eq!(v.tick(DT, Some(&mut provider)), RenderState::Active);
        }
        assert_eq!(v.frame().width(), 640);
    }

    #[test]
    fn test_idle_without_fallback_freezes_particles() {
        let config = VisualizerConfig {
            demo_fallback: false,
            ..Default::default()
        };
        let mut v = visualizer(config);
        v.start();
        let before = positions(&v);
        for _ in 0..10 {
            assert_eq!(v.tick(DT, None), RenderState::Idle);
        }
        assert_eq!(positions(&v), before);
        // Still draws the frozen state
        assert_eq!(v.frame().width(), 640);
    }

    #[test]
    fn test_audio_drives_radius() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        let mut loud = Fixed(Some(Spectrum::new(vec![255; 256])));
        assert_eq!(v.tick(DT, Some(&mut loud)), RenderState::Active);
        for ball in v.metaballs().balls() {
            assert!((ball.current_radius - (ball.base_radius + 25.0)).abs() < 1e-3);
        }
    }

    #[test]
    fn test_theme_change_leaves_particles_untouched() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        v.tick(DT, None);
        let before = v.metaballs().balls().to_vec();
        let offsets: Vec<_> = v.background().circles().iter().map(|c| c.offset).collect();

        v.set_theme_color("#33cc99");
        assert_eq!(v.theme(), Rgb::new(0x33, 0xcc, 0x99));
        assert_eq!(v.metaballs().balls(), &before[..]);
        let after: Vec<_> = v.background().circles().iter().map(|c| c.offset).collect();
        assert_eq!(offsets, after);
    }

    #[test]
    fn test_invalid_hooks_are_ignored() {
        let mut v = visualizer(VisualizerConfig::default());
        let theme = v.theme();
        v.set_theme_color("not-a-color");
        v.set_emotional_state("furious");
        v.trigger_emote("moonwalk");
        v.show_thought_bubble("   ", 3);
        assert_eq!(v.theme(), theme);
        assert_eq!(v.emotional_state(), EmotionalState::Neutral);
        assert!(v.emotes().is_empty());
        assert!(v.thought_bubble().is_none());
    }

    #[test]
    fn test_hooks_apply() {
        let mut v = visualizer(VisualizerConfig::default());
        v.apply(&Hook::Mood {
            state: "excited".into(),
        });
        v.apply(&Hook::Emote {
            kind: "spin".into(),
        });
        v.apply(&Hook::Thought {
            text: "hello".into(),
            priority: 2,
        });
        v.apply(&Hook::Start);
        assert_eq!(v.emotional_state(), EmotionalState::Excited);
        assert_eq!(v.emotes().len(), 1);
        assert_eq!(v.thought_bubble().map(|b| b.text.as_str()), Some("hello"));
        assert!(v.is_running());
        v.apply(&Hook::Stop);
        assert!(!v.is_running());
    }

    #[test]
    fn test_bubble_expires_with_time() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        v.show_thought_bubble("hi", 0);
        assert!(v.thought_bubble().is_some());
        // 0.1s per tick after clamping; bubble lasts well under 10s
        for _ in 0..100 {
            v.tick(1.0, None);
        }
        assert!(v.thought_bubble().is_none());
    }

    #[test]
    fn test_resize_is_idempotent() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        let surface = SurfaceSize::new(1280, 720, 2.0).unwrap();
        v.resize(surface);
        let bounds = *v.bounds();
        let balls = v.metaballs().balls().to_vec();
        v.resize(surface);
        assert_eq!(*v.bounds(), bounds);
        assert_eq!(v.metaballs().balls(), &balls[..]);
        v.tick(DT, None);
        assert_eq!((v.frame().width(), v.frame().height()), (1280, 720));
    }

    #[test]
    fn test_resize_rejects_empty_surface() {
        let mut v = visualizer(VisualizerConfig::default());
        let bounds = *v.bounds();
        v.resize(SurfaceSize {
            width: 0,
            height: 0,
            scale_factor: 1.0,
        });
        assert_eq!(*v.bounds(), bounds);
    }

    #[test]
    fn test_audio_to_synthetic_has_no_jump() {
        let mut v = visualizer(VisualizerConfig::default());
        v.start();
        let mut pulse = PulseSource::new("kick", 120.0, 0.2, 0.8);
        for _ in 0..5 {
            v.tick(DT, Some(&mut pulse));
        }
        let before: Vec<_> = v.metaballs().balls().iter().map(|b| b.position).collect();
        // A zero-length step switches to synthetic at the same instant
        v.tick(0.0, None);
        for (a, b) in before.iter().zip(v.metaballs().balls()) {
            assert!(a.approx_eq(&b.position, 1.0), "{:?} -> {:?}", a, b.position);
        }
    }

    #[test]
    fn test_hook_json() {
        let hook: Hook =
            serde_json::from_str(r#"{"type": "thought", "text": "snack?", "priority": 4}"#)
                .unwrap();
        assert_eq!(
            hook,
            Hook::Thought {
                text: "snack?".into(),
                priority: 4
            }
        );
        let hook: Hook = serde_json::from_str(r##"{"type": "theme", "color": "#fff"}"##).unwrap();
        assert_eq!(
            hook,
            Hook::Theme {
                color: "#fff".into()
            }
        );
    }
}
