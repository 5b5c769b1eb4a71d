//! Audio-reactive metaballs visualizer engine
//!
//! A cluster of soft blobs lives inside a rectangular container. Each blob
//! listens to one slice of a 256-bin spectrum; the cluster silhouette masks a
//! slowly breathing gradient background.

pub mod audio;
pub mod background;
pub mod boundary;
pub mod color;
pub mod config;
pub mod display;
pub mod driver;
pub mod error;
pub mod math;
pub mod metaball;
pub mod mood;
pub mod physics;
pub mod remote;
pub mod render;
pub mod util;
pub mod visualizer;

pub use audio::{AudioProvider, MixedProvider, PulseSource, Spectrum};
pub use boundary::{Bounds, SurfaceSize};
pub use config::VisualizerConfig;
pub use driver::{AnimationDriver, FrameHost, HostEvent};
pub use error::{Error, Result};
pub use render::RenderMode;
pub use visualizer::{Hook, RenderState, Visualizer};
