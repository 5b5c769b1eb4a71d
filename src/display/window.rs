use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use sdl2::render::{Canvas, Texture, TextureCreator};
use sdl2::video::{Window, WindowContext};
use sdl2::EventPump;

use super::PixelBuffer;
use crate::error::{Error, Result};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

pub struct Display {
    canvas: Canvas<Window>,
    event_pump: EventPump,
}

/// Streaming texture the frame is uploaded into. Recreated when the drawable
/// size changes.
pub struct RenderTarget<'a> {
    creator: &'a TextureCreator<WindowContext>,
    texture: Texture<'a>,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Quit,
    KeyDown(Keycode),
    /// Window resized; query `drawable_size` for the new canvas size
    Resized,
}

fn display_err(e: impl ToString) -> Error {
    Error::Display(e.to_string())
}

impl Display {
    /// Open a resizable, high-DPI aware window
    /// vsync=true: locked to monitor refresh (typically 60fps)
    /// vsync=false: uncapped framerate for performance testing
    pub fn with_options(
        title: &str,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> Result<(Self, TextureCreator<WindowContext>)> {
        let sdl_context = sdl2::init().map_err(display_err)?;
        let video_subsystem = sdl_context.video().map_err(display_err)?;

        let window = video_subsystem
            .window(title, width, height)
            .position_centered()
            .resizable()
            .allow_highdpi()
            .build()
            .map_err(display_err)?;

        let mut canvas_builder = window.into_canvas().accelerated();
        if vsync {
            canvas_builder = canvas_builder.present_vsync();
        }
        let canvas = canvas_builder.build().map_err(display_err)?;

        let texture_creator = canvas.texture_creator();
        let event_pump = sdl_context.event_pump().map_err(display_err)?;

        Ok((Self { canvas, event_pump }, texture_creator))
    }

    /// Drawable size in physical pixels
    pub fn drawable_size(&self) -> (u32, u32) {
        self.canvas.window().drawable_size()
    }

    /// Physical pixels per logical pixel
    pub fn scale_factor(&self) -> f32 {
        let (logical, _) = self.canvas.window().size();
        let (physical, _) = self.drawable_size();
        if logical == 0 {
            return 1.0;
        }
        physical as f32 / logical as f32
    }

    pub fn present(&mut self, target: &mut RenderTarget, buffer: &PixelBuffer) -> Result<()> {
        target.ensure_size(buffer.width(), buffer.height())?;
        target
            .texture
            .update(None, buffer.as_bytes(), (buffer.width() * 4) as usize)
            .map_err(display_err)?;

        self.canvas
            .copy(&target.texture, None, None)
            .map_err(display_err)?;
        self.canvas.present();
        Ok(())
    }

    pub fn poll_events(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();

        for event in self.event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => events.push(InputEvent::Quit),
                Event::KeyDown {
                    keycode: Some(k), ..
                } => events.push(InputEvent::KeyDown(k)),
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => events.push(InputEvent::Resized),
                _ => {}
            }
        }

        events
    }
}

impl<'a> RenderTarget<'a> {
    pub fn with_size(
        creator: &'a TextureCreator<WindowContext>,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let texture = create_texture(creator, width, height)?;
        Ok(Self {
            creator,
            texture,
            width,
            height,
        })
    }

    pub fn ensure_size(&mut self, width: u32, height: u32) -> Result<()> {
        if (width, height) != (self.width, self.height) {
            self.texture = create_texture(self.creator, width, height)?;
            self.width = width;
            self.height = height;
        }
        Ok(())
    }
}

fn create_texture(
    creator: &TextureCreator<WindowContext>,
    width: u32,
    height: u32,
) -> Result<Texture<'_>> {
    creator
        .create_texture_streaming(PixelFormatEnum::RGBA8888, width.max(1), height.max(1))
        .map_err(display_err)
}
