use metablob::display::{
    Display, InputEvent, PixelBuffer, RenderTarget, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};
use metablob::remote::{RemoteControl, DEFAULT_PORT, DEFAULT_TOPIC};
use metablob::{
    AnimationDriver, AudioProvider, FrameHost, Hook, HostEvent, MixedProvider, PulseSource,
    RenderMode, Result, SurfaceSize, Visualizer, VisualizerConfig,
};
use sdl2::keyboard::Keycode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Themes cycled with C
const THEMES: [&str; 5] = ["#7c5cff", "#ff5c8a", "#2ec4b6", "#ffb703", "#8ecae6"];

struct Options {
    width: u32,
    height: u32,
    vsync: bool,
    config: Option<String>,
    balls: Option<usize>,
    theme: Option<String>,
    field: bool,
    debug_bounds: bool,
    silent: bool,
    mqtt: Option<String>,
}

fn parse_args() -> Options {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options {
        width: DEFAULT_WIDTH,
        height: DEFAULT_HEIGHT,
        vsync: true,
        config: None,
        balls: None,
        theme: None,
        field: false,
        debug_bounds: false,
        silent: false,
        mqtt: None,
    };

    let mut i = 1;
    while i < args.len() {
        let next = args.get(i + 1);
        match args[i].as_str() {
            "--no-vsync" => opts.vsync = false,
            "--field" => opts.field = true,
            "--debug-bounds" => opts.debug_bounds = true,
            "--silent" => opts.silent = true,
            "--width" | "-w" => {
                if let Some(w) = next.and_then(|v| v.parse::<u32>().ok()) {
                    opts.width = w;
                }
                i += 1;
            }
            "--height" | "-h" => {
                if let Some(h) = next.and_then(|v| v.parse::<u32>().ok()) {
                    opts.height = h;
                }
                i += 1;
            }
            "--resolution" | "-r" => {
                // Parse WxH format (e.g., 1920x1080)
                if let Some((w, h)) = next.and_then(|v| v.split_once('x')) {
                    if let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>()) {
                        opts.width = w;
                        opts.height = h;
                    }
                }
                i += 1;
            }
            "--config" | "-c" => {
                opts.config = next.cloned();
                i += 1;
            }
            "--balls" | "-b" => {
                opts.balls = next.and_then(|v| v.parse::<usize>().ok());
                i += 1;
            }
            "--theme" | "-t" => {
                opts.theme = next.cloned();
                i += 1;
            }
            "--mqtt" | "-m" => {
                opts.mqtt = next.cloned();
                i += 1;
            }
            "--help" => {
                println!("Usage: metablob [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  --width W, -w W       Set window width (default: {})",
                    DEFAULT_WIDTH
                );
                println!(
                    "  --height H, -h H      Set window height (default: {})",
                    DEFAULT_HEIGHT
                );
                println!("  --resolution WxH, -r WxH  Set resolution (e.g., 1920x1080)");
                println!("  --no-vsync            Disable VSync for uncapped framerate");
                println!("  --config PATH, -c PATH    Load settings from a JSON file");
                println!("  --balls N, -b N       Number of blobs (4-24)");
                println!("  --theme HEX, -t HEX   Accent color, e.g. #7c5cff");
                println!("  --field               Use the field renderer instead of the mask");
                println!("  --debug-bounds        Outline the container");
                println!("  --silent              No audio; synthetic motion only");
                println!(
                    "  --mqtt HOST, -m HOST  Receive hooks over MQTT (port {}, topic '{}')",
                    DEFAULT_PORT, DEFAULT_TOPIC
                );
                println!("  --help                Show this help message");
                println!();
                println!("Keys: 1-6 mood, B/P/K/R emote, C theme, T thought, F fps, Esc quit");
                std::process::exit(0);
            }
            other => warn!(arg = other, "unknown argument"),
        }
        i += 1;
    }

    opts
}

/// SDL window as a frame host, with optional MQTT hooks merged in
struct WindowHost<'a> {
    display: Display,
    target: RenderTarget<'a>,
    remote: Option<RemoteControl>,
    surface: SurfaceSize,
    theme_index: usize,
    show_fps: bool,
}

impl WindowHost<'_> {
    fn current_surface(&self) -> Option<SurfaceSize> {
        let (w, h) = self.display.drawable_size();
        SurfaceSize::new(w, h, self.display.scale_factor()).ok()
    }

    fn key_event(&mut self, key: Keycode) -> Option<HostEvent> {
        let mood = |state: &str| {
            Some(HostEvent::Hook(Hook::Mood {
                state: state.to_string(),
            }))
        };
        let emote = |kind: &str| {
            Some(HostEvent::Hook(Hook::Emote {
                kind: kind.to_string(),
            }))
        };

        match key {
            Keycode::Escape => Some(HostEvent::Quit),
            Keycode::Num1 => mood("neutral"),
            Keycode::Num2 => mood("calm"),
            Keycode::Num3 => mood("happy"),
            Keycode::Num4 => mood("excited"),
            Keycode::Num5 => mood("focused"),
            Keycode::Num6 => mood("sleepy"),
            Keycode::B => emote("bounce"),
            Keycode::P => emote("pulse"),
            Keycode::K => emote("shake"),
            Keycode::R => emote("spin"),
            Keycode::C => {
                self.theme_index = (self.theme_index + 1) % THEMES.len();
                Some(HostEvent::Hook(Hook::Theme {
                    color: THEMES[self.theme_index].to_string(),
                }))
            }
            Keycode::T => Some(HostEvent::Hook(Hook::Thought {
                text: "hmm...".to_string(),
                priority: 1,
            })),
            Keycode::F => {
                self.show_fps = !self.show_fps;
                None
            }
            _ => None,
        }
    }
}

impl FrameHost for WindowHost<'_> {
    fn poll_events(&mut self) -> Vec<HostEvent> {
        let mut events = Vec::new();

        for event in self.display.poll_events() {
            match event {
                InputEvent::Quit => events.push(HostEvent::Quit),
                InputEvent::KeyDown(key) => events.extend(self.key_event(key)),
                InputEvent::Resized => {
                    // Window events carry logical sizes; the canvas is physical
                    if let Some(surface) = self.current_surface() {
                        if surface != self.surface {
                            self.surface = surface;
                            events.push(HostEvent::Resize(surface));
                        }
                    }
                }
            }
        }

        if let Some(remote) = &self.remote {
            events.extend(remote.poll().into_iter().map(HostEvent::Hook));
        }

        events
    }

    fn present(&mut self, frame: &PixelBuffer) -> Result<()> {
        if frame.width() == 0 || frame.height() == 0 {
            return Ok(());
        }
        self.display.present(&mut self.target, frame)
    }

    fn report_fps(&mut self, fps: f32) {
        if self.show_fps {
            info!(fps = fps.round() as u32, "frame rate");
        }
    }
}

fn load_config(opts: &Options) -> VisualizerConfig {
    let mut config = match &opts.config {
        Some(path) => VisualizerConfig::load(path).unwrap_or_else(|e| {
            warn!(path = %path, error = %e, "using default config");
            VisualizerConfig::default()
        }),
        None => VisualizerConfig::default(),
    };

    if let Some(balls) = opts.balls {
        config.metaballs.count = balls;
    }
    if let Some(theme) = &opts.theme {
        config.theme_color = theme.clone();
    }
    if opts.field {
        config.render_mode = RenderMode::Field;
    }
    if opts.debug_bounds {
        config.debug_bounds = true;
    }
    config
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metablob=info")),
        )
        .init();

    let opts = parse_args();
    let config = load_config(&opts);

    let (display, texture_creator) =
        Display::with_options("metablob", opts.width, opts.height, opts.vsync)?;
    let (w, h) = display.drawable_size();
    let surface = SurfaceSize::new(w, h, display.scale_factor())?;
    let target = RenderTarget::with_size(&texture_creator, w, h)?;

    let remote = match &opts.mqtt {
        Some(host) => match RemoteControl::connect(host, DEFAULT_PORT, DEFAULT_TOPIC) {
            Ok(remote) => Some(remote),
            Err(e) => {
                warn!(error = %e, "remote control disabled");
                None
            }
        },
        None => None,
    };

    if opts.vsync {
        info!("VSync on (60fps locked), use --no-vsync for uncapped");
    } else {
        info!("VSync off, uncapped framerate");
    }

    let mut visualizer = Visualizer::new(config, surface)?;
    let mut host = WindowHost {
        display,
        target,
        remote,
        surface,
        theme_index: 0,
        show_fps: false,
    };

    // Two procedural players mixed, standing in for real audio
    let mut audio = MixedProvider::new()
        .with_source(Box::new(PulseSource::new("beat", 118.0, 40.0, 0.7)))
        .with_source(Box::new(PulseSource::new("pad", 72.0, 150.0, 0.5).with_pad_width(40.0)));
    let provider: Option<&mut dyn AudioProvider> = if opts.silent {
        None
    } else {
        Some(&mut audio)
    };

    let mut driver = AnimationDriver::new();
    driver.run(&mut visualizer, &mut host, provider)?;
    info!(frames = driver.frames(), "bye");
    Ok(())
}
