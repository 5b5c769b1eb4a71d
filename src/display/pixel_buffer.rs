use crate::color::Rgb;

// ============================================================================
// Blend Mode
// ============================================================================

/// Compositing mode for `composite()` / `composite_full()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Standard source-over onto an opaque destination
    Alpha,
    /// Additive: dst += src * (src_alpha / 255), saturating
    Additive,
    /// Keep destination only where the source is present:
    /// dst_alpha *= src_alpha / 255, colors untouched
    DestinationIn,
}

/// Pixel-space clip rectangle, exclusive on the far edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl ClipRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Alpha blend a single color channel
/// Uses fast approximation: (x + 1 + (x >> 8)) >> 8 instead of x / 255
#[inline]
fn blend_channel(src: u8, dst: u8, alpha: u16) -> u8 {
    let result = src as u16 * alpha + dst as u16 * (255 - alpha);
    ((result + 1 + (result >> 8)) >> 8) as u8
}

/// Write opaque ABGR pixel to slice (RGBA8888 little-endian byte order)
#[inline]
fn write_pixel(dest: &mut [u8], r: u8, g: u8, b: u8) {
    dest[0] = 255; // A
    dest[1] = b; // B
    dest[2] = g; // G
    dest[3] = r; // R
}

#[inline]
fn write_pixel_rgba(dest: &mut [u8], r: u8, g: u8, b: u8, a: u8) {
    dest[0] = a; // A
    dest[1] = b; // B
    dest[2] = g; // G
    dest[3] = r; // R
}

/// Straight-alpha source-over onto a destination that may itself be
/// translucent. `sa` is 0.0 - 1.0.
#[inline]
fn over_straight(dest: &mut [u8], r: u8, g: u8, b: u8, sa: f32) {
    if sa <= 0.0 {
        return;
    }
    let da = dest[0] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    let mix = |s: u8, d: u8| {
        ((s as f32 * sa + d as f32 * da * (1.0 - sa)) / out_a)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    dest[1] = mix(b, dest[1]);
    dest[2] = mix(g, dest[2]);
    dest[3] = mix(r, dest[3]);
    dest[0] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

// ============================================================================
// PixelBuffer
// ============================================================================

/// RGBA8888 pixel buffer for software rendering.
/// Every visualizer layer (background, mask, final frame) is one of these.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            pixels: vec![0; (width as usize) * (height as usize) * 4],
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Check if coordinates are within bounds
    #[inline]
    fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32
    }

    /// Calculate byte offset for pixel at (x, y)
    #[inline]
    fn pixel_index(&self, x: u32, y: u32) -> usize {
        ((y * self.width + x) * 4) as usize
    }

    /// Whole buffer as a clip rectangle
    #[inline]
    pub fn full_rect(&self) -> ClipRect {
        ClipRect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Intersect a clip rectangle with the buffer
    #[inline]
    pub fn clip(&self, rect: ClipRect) -> ClipRect {
        ClipRect::new(
            rect.x0.max(0),
            rect.y0.max(0),
            rect.x1.min(self.width as i32),
            rect.y1.min(self.height as i32),
        )
    }

    /// Reallocate for a new size. Contents are cleared to transparent.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; (width as usize) * (height as usize) * 4];
    }

    /// Clear to a solid opaque color
    pub fn clear(&mut self, r: u8, g: u8, b: u8) {
        self.clear_rgba(r, g, b, 255);
    }

    /// Clear to a color with custom alpha (transparent scratch layers)
    pub fn clear_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        let pixel = u32::from_ne_bytes([a, b, g, r]);
        let ptr = self.pixels.as_mut_ptr() as *mut u32;
        let len = self.pixels.len() / 4;
        for i in 0..len {
            // Safety: pixels.len() is always width * height * 4 and i < len;
            // write_unaligned avoids assuming alignment of Vec<u8>.
            unsafe {
                ptr.add(i).write_unaligned(pixel);
            }
        }
    }

    /// Set a single opaque pixel (bounds checked)
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            write_pixel(&mut self.pixels[idx..idx + 4], r, g, b);
        }
    }

    /// Set a single pixel with custom alpha (bounds checked)
    #[inline]
    pub fn set_pixel_rgba(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            write_pixel_rgba(&mut self.pixels[idx..idx + 4], r, g, b, a);
        }
    }

    /// Read all 4 channels of a pixel (bounds checked)
    /// Returns (r, g, b, a) or None if out of bounds
    #[inline]
    pub fn get_pixel_rgba(&self, x: i32, y: i32) -> Option<(u8, u8, u8, u8)> {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            Some((
                self.pixels[idx + 3], // R
                self.pixels[idx + 2], // G
                self.pixels[idx + 1], // B
                self.pixels[idx],     // A
            ))
        } else {
            None
        }
    }

    /// Alpha of a pixel, 0 when out of bounds
    #[inline]
    pub fn alpha_at(&self, x: i32, y: i32) -> u8 {
        self.get_pixel_rgba(x, y).map_or(0, |p| p.3)
    }

    /// Set pixel with alpha blending onto an opaque destination
    #[inline]
    pub fn blend_pixel(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            let alpha = a as u16;
            self.pixels[idx] = 255; // A - always opaque
            self.pixels[idx + 1] = blend_channel(b, self.pixels[idx + 1], alpha);
            self.pixels[idx + 2] = blend_channel(g, self.pixels[idx + 2], alpha);
            self.pixels[idx + 3] = blend_channel(r, self.pixels[idx + 3], alpha);
        }
    }

    /// Additive blend a pixel (colors saturate at 255)
    #[inline]
    pub fn blend_pixel_additive(&mut self, x: i32, y: i32, r: u8, g: u8, b: u8) {
        if self.in_bounds(x, y) {
            let idx = self.pixel_index(x as u32, y as u32);
            self.pixels[idx + 1] = self.pixels[idx + 1].saturating_add(b);
            self.pixels[idx + 2] = self.pixels[idx + 2].saturating_add(g);
            self.pixels[idx + 3] = self.pixels[idx + 3].saturating_add(r);
        }
    }

    /// Draw a horizontal line with alpha blending
    pub fn hline_blend(&mut self, x1: i32, x2: i32, y: i32, r: u8, g: u8, b: u8, a: u8) {
        if y < 0 || y >= self.height as i32 {
            return;
        }
        let (x1, x2) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let start = x1.max(0);
        let end = x2.min(self.width as i32 - 1);
        if start > end {
            return;
        }

        let alpha = a as u16;
        let mut idx = self.pixel_index(start as u32, y as u32);
        for _ in start..=end {
            self.pixels[idx] = 255;
            self.pixels[idx + 1] = blend_channel(b, self.pixels[idx + 1], alpha);
            self.pixels[idx + 2] = blend_channel(g, self.pixels[idx + 2], alpha);
            self.pixels[idx + 3] = blend_channel(r, self.pixels[idx + 3], alpha);
            idx += 4;
        }
    }

    /// Outline a rectangle with a dashed 1px stroke (debug overlays)
    pub fn stroke_rect_dashed(&mut self, rect: ClipRect, dash: i32, gap: i32, r: u8, g: u8, b: u8) {
        if rect.is_empty() {
            return;
        }
        let period = (dash + gap).max(1);
        let on = |i: i32| i.rem_euclid(period) < dash;
        let (x1, y1) = (rect.x1 - 1, rect.y1 - 1);

        for x in rect.x0..=x1 {
            if on(x - rect.x0) {
                self.set_pixel(x, rect.y0, r, g, b);
                self.set_pixel(x, y1, r, g, b);
            }
        }
        for y in rect.y0..=y1 {
            if on(y - rect.y0) {
                self.set_pixel(rect.x0, y, r, g, b);
                self.set_pixel(x1, y, r, g, b);
            }
        }
    }

    /// Fill a circle with alpha blending (bubbles, soft overlays)
    pub fn fill_circle_blend(&mut self, cx: i32, cy: i32, radius: i32, r: u8, g: u8, b: u8, a: u8) {
        if radius <= 0 {
            if radius == 0 {
                self.blend_pixel(cx, cy, r, g, b, a);
            }
            return;
        }

        // Midpoint circle algorithm with span filling
        let mut xi = radius;
        let mut y = 0;
        let mut err = 1 - radius;

        while xi >= y {
            self.hline_blend(cx - xi, cx + xi, cy + y, r, g, b, a);
            if y != 0 {
                self.hline_blend(cx - xi, cx + xi, cy - y, r, g, b, a);
            }
            if xi != y {
                self.hline_blend(cx - y, cx + y, cy + xi, r, g, b, a);
                if y != 0 {
                    self.hline_blend(cx - y, cx + y, cy - xi, r, g, b, a);
                }
            }

            y += 1;
            if err < 0 {
                err += 2 * y + 1;
            } else {
                xi -= 1;
                err += 2 * (y - xi) + 1;
            }
        }
    }

    /// Filled circle with radial gradient falloff, additive.
    /// `falloff` controls the curve: 1.0=linear, 2.0=quadratic (natural glow), 0.5=wide glow.
    pub fn fill_circle_gradient(
        &mut self,
        cx: i32,
        cy: i32,
        radius: i32,
        r: u8,
        g: u8,
        b: u8,
        falloff: f32,
    ) {
        if radius <= 0 {
            return;
        }
        let r_f = radius as f32;
        let r_sq = r_f * r_f;

        let y_start = cy.saturating_sub(radius).max(0);
        let y_end = cy.saturating_add(radius).min(self.height as i32 - 1);
        let x_start = cx.saturating_sub(radius).max(0);
        let x_end = cx.saturating_add(radius).min(self.width as i32 - 1);

        for y in y_start..=y_end {
            let dy = (y - cy) as f32;
            let dy_sq = dy * dy;
            for x in x_start..=x_end {
                let dx = (x - cx) as f32;
                let dist_sq = dx * dx + dy_sq;
                if dist_sq > r_sq {
                    continue;
                }

                let t = (1.0 - dist_sq.sqrt() / r_f).powf(falloff);
                self.blend_pixel_additive(
                    x,
                    y,
                    (r as f32 * t) as u8,
                    (g as f32 * t) as u8,
                    (b as f32 * t) as u8,
                );
            }
        }
    }

    /// Two-color radial gradient (inner at the center, outer at the rim)
    /// painted source-over with straight alpha, so it layers correctly onto a
    /// transparent scratch buffer. The gradient fades to transparent at the
    /// rim; `opacity` scales the whole disc. Pixels outside `clip` are left alone.
    pub fn fill_radial_gradient(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        inner: Rgb,
        outer: Rgb,
        opacity: f32,
        clip: ClipRect,
    ) {
        if radius <= 0.0 || opacity <= 0.0 {
            return;
        }
        let clip = self.clip(clip);
        if clip.is_empty() {
            return;
        }

        let x0 = ((cx - radius).floor() as i32).max(clip.x0);
        let x1 = ((cx + radius).ceil() as i32).min(clip.x1 - 1);
        let y0 = ((cy - radius).floor() as i32).max(clip.y0);
        let y1 = ((cy + radius).ceil() as i32).min(clip.y1 - 1);
        let opacity = opacity.min(1.0);
        let r_sq = radius * radius;

        for y in y0..=y1 {
            let dy = y as f32 + 0.5 - cy;
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - cx;
                let dist_sq = dx * dx + dy * dy;
                if dist_sq >= r_sq {
                    continue;
                }
                let t = dist_sq.sqrt() / radius;
                let color = inner.lerp(outer, t);
                // Ease the edge so neighbouring discs blend without a seam
                let alpha = opacity * (1.0 - t * t);
                let idx = self.pixel_index(x as u32, y as u32);
                over_straight(&mut self.pixels[idx..idx + 4], color.r, color.g, color.b, alpha);
            }
        }
    }

    /// Combine coverage into the alpha channel with a screen operator:
    /// a = 1 - (1 - a) * (1 - coverage). Overlapping shapes merge smoothly
    /// instead of stacking into hard seams. Color channels are set to white.
    #[inline]
    pub fn accumulate_coverage(&mut self, x: i32, y: i32, coverage: f32) {
        if !self.in_bounds(x, y) || coverage <= 0.0 {
            return;
        }
        let idx = self.pixel_index(x as u32, y as u32);
        let a = self.pixels[idx] as f32 / 255.0;
        let merged = 1.0 - (1.0 - a) * (1.0 - coverage.min(1.0));
        write_pixel_rgba(
            &mut self.pixels[idx..idx + 4],
            255,
            255,
            255,
            (merged * 255.0).round() as u8,
        );
    }

    // ========================================================================
    // Buffer Operations
    // ========================================================================

    /// Composite a source buffer onto this one using per-pixel source alpha.
    pub fn composite(&mut self, src: &PixelBuffer, dst_x: i32, dst_y: i32, mode: BlendMode) {
        let src_w = src.width() as i32;
        let src_h = src.height() as i32;
        let dst_w = self.width as i32;
        let dst_h = self.height as i32;

        for sy in 0..src_h {
            let dy = dst_y + sy;
            if dy < 0 || dy >= dst_h {
                continue;
            }

            for sx in 0..src_w {
                let dx = dst_x + sx;
                if dx < 0 || dx >= dst_w {
                    continue;
                }

                let si = src.pixel_index(sx as u32, sy as u32);
                let sa = src.pixels[si]; // alpha channel (ABGR[0])
                let di = self.pixel_index(dx as u32, dy as u32);

                if mode == BlendMode::DestinationIn {
                    let da = self.pixels[di] as u16;
                    self.pixels[di] = ((da * sa as u16 + 127) / 255) as u8;
                    continue;
                }

                if sa == 0 {
                    continue;
                }

                let sr = src.pixels[si + 3];
                let sg = src.pixels[si + 2];
                let sb = src.pixels[si + 1];

                match mode {
                    BlendMode::Alpha => {
                        if sa == 255 {
                            write_pixel(&mut self.pixels[di..di + 4], sr, sg, sb);
                        } else {
                            let alpha = sa as u16;
                            self.pixels[di] = 255;
                            self.pixels[di + 1] = blend_channel(sb, self.pixels[di + 1], alpha);
                            self.pixels[di + 2] = blend_channel(sg, self.pixels[di + 2], alpha);
                            self.pixels[di + 3] = blend_channel(sr, self.pixels[di + 3], alpha);
                        }
                    }
                    BlendMode::Additive => {
                        let a = sa as u16;
                        let add_r = ((sr as u16 * a + 127) / 255) as u8;
                        let add_g = ((sg as u16 * a + 127) / 255) as u8;
                        let add_b = ((sb as u16 * a + 127) / 255) as u8;
                        self.pixels[di + 1] = self.pixels[di + 1].saturating_add(add_b);
                        self.pixels[di + 2] = self.pixels[di + 2].saturating_add(add_g);
                        self.pixels[di + 3] = self.pixels[di + 3].saturating_add(add_r);
                    }
                    BlendMode::DestinationIn => {}
                }
            }
        }
    }

    /// Convenience: composite at (0, 0) - buffers should be the same size.
    /// With `DestinationIn`, destination pixels the source does not cover are
    /// cleared as well.
    pub fn composite_full(&mut self, src: &PixelBuffer, mode: BlendMode) {
        if mode == BlendMode::DestinationIn
            && (src.width != self.width || src.height != self.height)
        {
            // Anything outside the mask is uncovered
            let (w, h) = (self.width as i32, self.height as i32);
            for y in 0..h {
                for x in 0..w {
                    if x >= src.width as i32 || y >= src.height as i32 {
                        let idx = self.pixel_index(x as u32, y as u32);
                        self.pixels[idx] = 0;
                    }
                }
            }
        }
        self.composite(src, 0, 0, mode);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }
}
