//! Animation driver: one update and one render per frame until stopped

use tracing::{debug, info, trace};

use crate::audio::AudioProvider;
use crate::boundary::SurfaceSize;
use crate::display::PixelBuffer;
use crate::error::Result;
use crate::util::FrameClock;
use crate::visualizer::{Hook, Visualizer};

/// Something that happened on the host side since the last frame
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    Quit,
    Resize(SurfaceSize),
    Hook(Hook),
}

/// The window (or test double) the driver renders into
pub trait FrameHost {
    /// Drain pending events. Must not block.
    fn poll_events(&mut self) -> Vec<HostEvent>;

    /// Show a finished frame
    fn present(&mut self, frame: &PixelBuffer) -> Result<()>;

    /// Called once per second with the measured frame rate
    fn report_fps(&mut self, _fps: f32) {}
}

/// Frame loop state. `stop` takes effect before the next frame is presented.
#[derive(Debug, Default)]
pub struct AnimationDriver {
    running: bool,
    frames: u64,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames presented since the last `run`
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Run until a quit event, a `Stop` hook or a present error.
    /// The visualizer is stopped (and its buffers released) on the way out.
    pub fn run(
        &mut self,
        visualizer: &mut Visualizer,
        host: &mut dyn FrameHost,
        mut provider: Option<&mut dyn AudioProvider>,
    ) -> Result<()> {
        let mut clock = FrameClock::new(60);
        let mut fps_timer = 0.0f32;
        self.running = true;
        self.frames = 0;
        visualizer.start();
        info!("animation loop started");

        let result = loop {
            for event in host.poll_events() {
                match event {
                    HostEvent::Quit => self.stop(),
                    HostEvent::Resize(surface) => visualizer.resize(surface),
                    HostEvent::Hook(Hook::Stop) => self.stop(),
                    HostEvent::Hook(hook) => visualizer.apply(&hook),
                }
            }
            if !self.running {
                break Ok(());
            }

            let (dt, _) = clock.tick();
            let audio = provider.as_mut().map(|p| &mut **p as &mut dyn AudioProvider);
            let state = visualizer.tick(dt, audio);
            trace!(?state, dt, "frame");

            if let Err(e) = host.present(visualizer.frame()) {
                break Err(e);
            }
            self.frames += 1;

            fps_timer += dt;
            if fps_timer >= 1.0 {
                fps_timer = 0.0;
                host.report_fps(clock.avg_fps());
            }
        };

        self.running = false;
        visualizer.stop();
        debug!(frames = self.frames, "animation loop ended");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VisualizerConfig;
    use crate::error::Error;

    /// Scripted host: returns queued events per frame and records presents
    struct ScriptedHost {
        script: Vec<Vec<HostEvent>>,
        polls: usize,
        presented: Vec<(u32, u32)>,
        fail_at: Option<usize>,
    }

    impl ScriptedHost {
        fn new(script: Vec<Vec<HostEvent>>) -> Self {
            Self {
                script,
                polls: 0,
                presented: Vec::new(),
                fail_at: None,
            }
        }
    }

    impl FrameHost for ScriptedHost {
        fn poll_events(&mut self) -> Vec<HostEvent> {
            let events = self.script.get(self.polls).cloned().unwrap_or_default();
            self.polls += 1;
            events
        }

        fn present(&mut self, frame: &PixelBuffer) -> Result<()> {
            if self.fail_at == Some(self.presented.len()) {
                return Err(Error::Display("lost device".into()));
            }
            self.presented.push((frame.width(), frame.height()));
            Ok(())
        }
    }

    fn visualizer() -> Visualizer {
        let surface = SurfaceSize::new(320, 240, 1.0).unwrap();
        Visualizer::new(VisualizerConfig::default(), surface).unwrap()
    }

    #[test]
    fn test_quit_stops_before_next_present() {
        let mut script = vec![Vec::new(); 3];
        script.push(vec![HostEvent::Quit]);
        let mut host = ScriptedHost::new(script);
        let mut v = visualizer();
        let mut driver = AnimationDriver::new();

        driver.run(&mut v, &mut host, None).unwrap();

        assert_eq!(host.presented.len(), 3);
        assert_eq!(driver.frames(), 3);
        assert!(!driver.is_running());
        assert!(!v.is_running());
        assert_eq!(v.frame().as_bytes().len(), 0);
    }

    #[test]
    fn test_stop_hook_ends_loop() {
        let script = vec![
            vec![HostEvent::Hook(Hook::Theme {
                color: "#00ff00".into(),
            })],
            vec![HostEvent::Hook(Hook::Stop)],
        ];
        let mut host = ScriptedHost::new(script);
        let mut v = visualizer();
        AnimationDriver::new().run(&mut v, &mut host, None).unwrap();
        assert_eq!(host.presented.len(), 1);
        assert_eq!(v.theme(), crate::color::Rgb::new(0, 255, 0));
    }

    #[test]
    fn test_resize_between_frames() {
        let script = vec![
            Vec::new(),
            vec![HostEvent::Resize(SurfaceSize::new(200, 400, 1.0).unwrap())],
            vec![HostEvent::Quit],
        ];
        let mut host = ScriptedHost::new(script);
        let mut v = visualizer();
        AnimationDriver::new().run(&mut v, &mut host, None).unwrap();
        assert_eq!(host.presented, vec![(320, 240), (200, 400)]);
    }

    #[test]
    fn test_present_error_propagates() {
        let mut host = ScriptedHost::new(Vec::new());
        host.fail_at = Some(2);
        let mut v = visualizer();
        let mut driver = AnimationDriver::new();
        let result = driver.run(&mut v, &mut host, None);
        assert!(matches!(result, Err(Error::Display(_))));
        assert_eq!(driver.frames(), 2);
        assert!(!v.is_running());
    }
}
