//! Color and depth buffers of the software device.
//!
//! [`RenderTarget`] owns the buffers; [`FrameBuffer`] is the borrowed view the
//! rasterizer writes through.

use crate::device::pixel_buffer;
use crate::error::DeviceResult;

/// Owned back buffer: ARGB8888 color plus a float depth buffer.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    color: Vec<u32>,
    depth: Vec<f32>,
    width: u32,
    height: u32,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> DeviceResult<Self> {
        const OP: &str = "create_render_target";
        Ok(Self {
            color: pixel_buffer(OP, width, height, 0)?,
            depth: pixel_buffer(OP, width, height, 1.0)?,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clear(&mut self, color: u32, depth: f32) {
        self.color.fill(color);
        self.depth.fill(depth);
    }

    pub fn color(&self) -> &[u32] {
        &self.color
    }

    /// Nearest-neighbour copy of a `src_width` x `src_height` image over the
    /// whole color buffer. Depth is left untouched.
    pub fn stretch_from(&mut self, src: &[u32], src_width: u32, src_height: u32) {
        if src_width == 0 || src_height == 0 {
            return;
        }
        for y in 0..self.height {
            let sy = (y as u64 * src_height as u64 / self.height as u64) as u32;
            for x in 0..self.width {
                let sx = (x as u64 * src_width as u64 / self.width as u64) as u32;
                self.color[y as usize * self.width as usize + x as usize] =
                    src[sy as usize * src_width as usize + sx as usize];
            }
        }
    }

    /// Get a mutable FrameBuffer view into the color and depth buffers.
    pub fn as_framebuffer(&mut self, depth_test: bool) -> FrameBuffer<'_> {
        FrameBuffer::new(
            &mut self.color,
            &mut self.depth,
            self.width,
            self.height,
            depth_test,
        )
    }
}

/// A view into color and depth buffers.
///
/// Wraps 1D slices with width/height metadata to enable safe 2D pixel access.
/// This is a borrowed view, not an owning type - it's meant to be created
/// temporarily when you need to pass buffers + dimensions together.
///
/// # Depth Buffer
///
/// Depth holds post-projection z in [0, 1]; smaller values are closer. The
/// buffer is cleared to the far plane (1.0) at the start of a frame.
pub struct FrameBuffer<'a> {
    color_buffer: &'a mut [u32],
    depth_buffer: &'a mut [f32],
    width: u32,
    height: u32,
    depth_test: bool,
}

impl<'a> FrameBuffer<'a> {
    pub fn new(
        color_buffer: &'a mut [u32],
        depth_buffer: &'a mut [f32],
        width: u32,
        height: u32,
        depth_test: bool,
    ) -> Self {
        debug_assert_eq!(
            color_buffer.len(),
            (width * height) as usize,
            "Color buffer size doesn't match dimensions"
        );
        debug_assert_eq!(
            depth_buffer.len(),
            (width * height) as usize,
            "Depth buffer size doesn't match dimensions"
        );
        Self {
            color_buffer,
            depth_buffer,
            width,
            height,
            depth_test,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Set a pixel at (x, y) with depth testing.
    ///
    /// With depth testing on, the pixel is written only if `depth` is less
    /// than or equal to the stored depth. Out-of-bounds coordinates and
    /// depths outside [0, 1] are ignored.
    #[inline]
    pub fn set_pixel_with_depth(&mut self, x: i32, y: i32, depth: f32, color: u32) {
        if x < 0 || x >= self.width as i32 || y < 0 || y >= self.height as i32 {
            return;
        }
        if !(0.0..=1.0).contains(&depth) {
            return;
        }
        let idx = (y as u32 * self.width + x as u32) as usize;
        if !self.depth_test || depth <= self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.color_buffer[idx] = color;
        }
    }

    /// Get the color at (x, y), or None if out of bounds.
    #[inline]
    pub fn get_pixel(&self, x: i32, y: i32) -> Option<u32> {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            Some(self.color_buffer[(y as u32 * self.width + x as u32) as usize])
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closer_fragment_wins() {
        let mut target = RenderTarget::new(2, 2).unwrap();
        let mut fb = target.as_framebuffer(true);
        fb.set_pixel_with_depth(0, 0, 0.5, 0xFF00_00FF);
        fb.set_pixel_with_depth(0, 0, 0.7, 0xFFFF_0000);
        assert_eq!(fb.get_pixel(0, 0), Some(0xFF00_00FF));
        fb.set_pixel_with_depth(0, 0, 0.2, 0xFF00_FF00);
        assert_eq!(fb.get_pixel(0, 0), Some(0xFF00_FF00));
    }

    #[test]
    fn disabled_depth_test_overwrites() {
        let mut target = RenderTarget::new(1, 1).unwrap();
        let mut fb = target.as_framebuffer(false);
        fb.set_pixel_with_depth(0, 0, 0.1, 1);
        fb.set_pixel_with_depth(0, 0, 0.9, 2);
        assert_eq!(fb.get_pixel(0, 0), Some(2));
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut target = RenderTarget::new(1, 1).unwrap();
        let mut fb = target.as_framebuffer(true);
        fb.set_pixel_with_depth(-1, 0, 0.0, 1);
        fb.set_pixel_with_depth(0, 5, 0.0, 1);
        assert_eq!(fb.get_pixel(0, 0), Some(0));
        assert_eq!(fb.get_pixel(3, 3), None);
    }

    #[test]
    fn stretch_scales_source_over_target() {
        let mut target = RenderTarget::new(4, 2).unwrap();
        target.stretch_from(&[1, 2], 2, 1);
        assert_eq!(target.color(), &[1, 1, 2, 2, 1, 1, 2, 2]);
    }
}
