mod pixel_buffer;
#[cfg(feature = "window")]
mod window;

pub use pixel_buffer::{BlendMode, ClipRect, PixelBuffer};
#[cfg(feature = "window")]
pub use window::{Display, InputEvent, RenderTarget, DEFAULT_HEIGHT, DEFAULT_WIDTH};
