//! Boundary container model
//!
//! The rectangle the blob cluster lives in. It adapts to the canvas aspect
//! ratio by switching between a portrait and a landscape design target, and is
//! always centered on the canvas.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::Vec2;

/// Smallest usable container edge, in logical pixels
pub const MIN_BOUNDS_SIZE: f32 = 160.0;

/// Canvas aspect ratio above which the landscape profile is used
pub const LANDSCAPE_ASPECT: f32 = 1.2;

/// Host drawing surface: physical pixel size plus device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub scale_factor: f32,
}

impl SurfaceSize {
    /// Validate a host surface. A zero-sized surface or a nonsense scale
    /// factor means there is nothing to draw on.
    pub fn new(width: u32, height: u32, scale_factor: f32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::SurfaceUnavailable(format!(
                "surface has no area ({}x{})",
                width, height
            )));
        }
        if !scale_factor.is_finite() || scale_factor <= 0.0 {
            return Err(Error::SurfaceUnavailable(format!(
                "invalid scale factor {}",
                scale_factor
            )));
        }
        Ok(Self {
            width,
            height,
            scale_factor,
        })
    }

    #[inline]
    pub fn logical_width(&self) -> f32 {
        self.width as f32 / self.scale_factor
    }

    #[inline]
    pub fn logical_height(&self) -> f32 {
        self.height as f32 / self.scale_factor
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// One design target: base size, growth multiplier and the share of the live
/// canvas it may occupy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSpec {
    pub base_width: f32,
    pub base_height: f32,
    pub multiplier: f32,
    /// Fraction of the canvas (0.8 - 0.9) the container may cover
    pub canvas_fraction: f32,
}

/// Portrait and landscape design targets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryProfile {
    pub portrait: ProfileSpec,
    pub landscape: ProfileSpec,
    pub aspect_threshold: f32,
}

impl Default for BoundaryProfile {
    fn default() -> Self {
        Self {
            portrait: ProfileSpec {
                base_width: 320.0,
                base_height: 420.0,
                multiplier: 1.0,
                canvas_fraction: 0.85,
            },
            landscape: ProfileSpec {
                base_width: 520.0,
                base_height: 340.0,
                multiplier: 1.0,
                canvas_fraction: 0.8,
            },
            aspect_threshold: LANDSCAPE_ASPECT,
        }
    }
}

impl BoundaryProfile {
    /// Pick the profile for a canvas aspect ratio
    pub fn select(&self, aspect: f32) -> &ProfileSpec {
        if aspect > self.aspect_threshold {
            &self.landscape
        } else {
            &self.portrait
        }
    }
}

/// Axis-aligned container rectangle in canvas pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    #[inline]
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// Integer pixel rectangle (x0, y0, x1, y1), exclusive on the far edge
    pub fn pixel_rect(&self) -> (i32, i32, i32, i32) {
        (
            self.x.floor() as i32,
            self.y.floor() as i32,
            self.right().ceil() as i32,
            self.bottom().ceil() as i32,
        )
    }

    /// Intersection with a `width` x `height` canvas. Used when the canvas
    /// has been resized after the bounds were computed.
    pub fn clamped_to(&self, width: u32, height: u32) -> Self {
        let x0 = self.x.clamp(0.0, width as f32);
        let y0 = self.y.clamp(0.0, height as f32);
        let x1 = self.right().clamp(0.0, width as f32);
        let y1 = self.bottom().clamp(0.0, height as f32);
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Compute the container for a surface.
///
/// Each axis is the profile's scaled base size, capped at its fraction of the
/// live canvas, and never below `MIN_BOUNDS_SIZE`. Sizes are worked out in
/// logical pixels and returned in physical pixels.
pub fn compute_bounds(surface: &SurfaceSize, profile: &BoundaryProfile) -> Bounds {
    let canvas_w = surface.logical_width();
    let canvas_h = surface.logical_height();
    let spec = profile.select(surface.aspect());

    let axis = |base: f32, canvas: f32| {
        (base * spec.multiplier)
            .min(canvas * spec.canvas_fraction)
            .max(MIN_BOUNDS_SIZE)
    };

    let width = axis(spec.base_width, canvas_w) * surface.scale_factor;
    let height = axis(spec.base_height, canvas_h) * surface.scale_factor;

    let cx = surface.width as f32 / 2.0;
    let cy = surface.height as f32 / 2.0;

    Bounds::new(cx - width / 2.0, cy - height / 2.0, width, height)
}
