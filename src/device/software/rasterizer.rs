//! Edge function triangle rasterization, Bresenham lines and pixel shaders.
//!
//! Triangles are filled by testing every pixel center in the bounding box
//! against the three edge functions
//!
//! ```text
//! E(P) = (P.x - A.x) * (B.y - A.y) - (P.y - A.y) * (B.x - A.x)
//! ```
//!
//! and turning the edge values into barycentric weights for attribute
//! interpolation. Both windings are accepted; culling is not performed.
//!
//! # References
//!
//! - Juan Pineda, "A Parallel Algorithm for Polygon Rasterization" (1988)

use std::sync::Arc;

use super::framebuffer::FrameBuffer;
use crate::colors::{alpha, modulate, pack_color, unpack_color};
use crate::device::GpuTexture;
use crate::math::{Vec2, Vec3};

/// A vertex after transformation and lighting, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenVertex {
    /// x, y in pixels; z is depth in [0, 1].
    pub position: Vec3,
    pub color: u32,
    pub uv: Vec2,
}

/// Per-pixel color computation from barycentric weights.
pub trait PixelShader {
    /// `lambda` holds the weights of the three vertices and sums to 1.
    fn shade(&self, lambda: [f32; 3]) -> u32;
}

/// Interpolates vertex colors across the triangle.
pub struct GouraudShader {
    /// Unpacked RGBA colors for each vertex, in [0.0, 1.0] range
    colors: [(f32, f32, f32, f32); 3],
}

impl GouraudShader {
    pub fn new(vertex_colors: [u32; 3]) -> Self {
        let unpack = |c: u32| {
            let (r, g, b) = unpack_color(c);
            (r, g, b, alpha(c))
        };
        Self {
            colors: vertex_colors.map(unpack),
        }
    }
}

impl PixelShader for GouraudShader {
    #[inline]
    fn shade(&self, lambda: [f32; 3]) -> u32 {
        let [c0, c1, c2] = self.colors;
        let mix = |a: f32, b: f32, c: f32| lambda[0] * a + lambda[1] * b + lambda[2] * c;
        pack_color(
            mix(c0.0, c1.0, c2.0),
            mix(c0.1, c1.1, c2.1),
            mix(c0.2, c1.2, c2.2),
            mix(c0.3, c1.3, c2.3),
        )
    }
}

/// Texture color multiplied by the interpolated vertex color.
pub struct TextureModulateShader<'a> {
    texture: &'a GpuTexture,
    uvs: [Vec2; 3],
    colors: GouraudShader,
}

impl<'a> TextureModulateShader<'a> {
    pub fn new(texture: &'a GpuTexture, uvs: [Vec2; 3], vertex_colors: [u32; 3]) -> Self {
        Self {
            texture,
            uvs,
            colors: GouraudShader::new(vertex_colors),
        }
    }

    #[inline]
    fn interpolate_uv(&self, lambda: [f32; 3]) -> (f32, f32) {
        let u = lambda[0] * self.uvs[0].x + lambda[1] * self.uvs[1].x + lambda[2] * self.uvs[2].x;
        let v = lambda[0] * self.uvs[0].y + lambda[1] * self.uvs[1].y + lambda[2] * self.uvs[2].y;
        (u, v)
    }
}

impl PixelShader for TextureModulateShader<'_> {
    #[inline]
    fn shade(&self, lambda: [f32; 3]) -> u32 {
        let (u, v) = self.interpolate_uv(lambda);
        modulate(self.texture.sample(u, v), self.colors.shade(lambda))
    }
}

#[inline]
fn edge_function(a: Vec3, b: Vec3, p: Vec3) -> f32 {
    (p.x - a.x) * (b.y - a.y) - (p.y - a.y) * (b.x - a.x)
}

/// Fills a triangle, shading each covered pixel with `shader`.
pub fn rasterize_with_shader<S: PixelShader>(
    vertices: &[ScreenVertex; 3],
    buffer: &mut FrameBuffer,
    shader: &S,
) {
    let [v0, v1, v2] = vertices.map(|v| v.position);

    let min_x = (v0.x.min(v1.x).min(v2.x).floor() as i32).max(0);
    let max_x = (v0.x.max(v1.x).max(v2.x).ceil() as i32).min(buffer.width() as i32 - 1);
    let min_y = (v0.y.min(v1.y).min(v2.y).floor() as i32).max(0);
    let max_y = (v0.y.max(v1.y).max(v2.y).ceil() as i32).min(buffer.height() as i32 - 1);

    let area = edge_function(v0, v1, v2);
    if area.abs() < f32::EPSILON {
        return;
    }
    let inv_area = 1.0 / area;

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let p = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, 0.0);

            let w0 = edge_function(v1, v2, p);
            let w1 = edge_function(v2, v0, p);
            let w2 = edge_function(v0, v1, p);

            let inside = if area > 0.0 {
                w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
            } else {
                w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
            };

            if inside {
                let lambda = [w0 * inv_area, w1 * inv_area, w2 * inv_area];
                let depth = lambda[0] * v0.z + lambda[1] * v1.z + lambda[2] * v2.z;
                buffer.set_pixel_with_depth(x, y, depth, shader.shade(lambda));
            }
        }
    }
}

/// Fills a triangle, modulating by `texture` when one is bound.
pub fn fill_triangle(
    vertices: &[ScreenVertex; 3],
    buffer: &mut FrameBuffer,
    texture: Option<&Arc<GpuTexture>>,
) {
    let colors = vertices.map(|v| v.color);
    match texture {
        Some(texture) => {
            let shader = TextureModulateShader::new(texture, vertices.map(|v| v.uv), colors);
            rasterize_with_shader(vertices, buffer, &shader);
        }
        None => rasterize_with_shader(vertices, buffer, &GouraudShader::new(colors)),
    }
}

/// Parametric range `[t0, t1]` of the segment `a -> b` that lies inside the
/// `width` x `height` pixel rectangle (Liang-Barsky).
fn clip_segment(a: Vec3, b: Vec3, width: u32, height: u32) -> Option<(f32, f32)> {
    if !(a.x.is_finite() && a.y.is_finite() && b.x.is_finite() && b.y.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    if !(dx.is_finite() && dy.is_finite()) {
        return None;
    }
    let (max_x, max_y) = (width as f32 - 0.5, height as f32 - 0.5);
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (p, q) in [
        (-dx, a.x + 0.5),
        (dx, max_x - a.x),
        (-dy, a.y + 0.5),
        (dy, max_y - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

/// Bresenham line from `a` to `b`, interpolating depth and color.
///
/// The segment is clipped to the buffer first, so endpoints far off screen
/// cost no more than the visible part.
pub fn draw_line(a: &ScreenVertex, b: &ScreenVertex, buffer: &mut FrameBuffer) {
    let Some((t0, t1)) = clip_segment(a.position, b.position, buffer.width(), buffer.height())
    else {
        return;
    };
    let start = a.position.lerp(b.position, t0);
    let end = a.position.lerp(b.position, t1);

    let (mut x, mut y) = (start.x.round() as i32, start.y.round() as i32);
    let (x1, y1) = (end.x.round() as i32, end.y.round() as i32);
    let colors = GouraudShader::new([a.color, b.color, b.color]);

    let dx = (x1 - x).abs();
    let dy = (y1 - y).abs();
    let steps = dx.max(dy);
    if steps == 0 {
        let color = colors.shade([1.0 - t0, t0, 0.0]);
        buffer.set_pixel_with_depth(x, y, start.z, color);
        return;
    }

    let x_incr_direction = if x < x1 { 1 } else { -1 };
    let y_incr_direction = if y < y1 { 1 } else { -1 };

    // Positive error favors x movement, negative favors y.
    let mut err = dx - dy;
    for step in 0..=steps {
        let local = step as f32 / steps as f32;
        let t = t0 + (t1 - t0) * local;
        let depth = start.z + (end.z - start.z) * local;
        buffer.set_pixel_with_depth(x, y, depth, colors.shade([1.0 - t, t, 0.0]));

        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x += x_incr_direction;
        }
        if e2 < dx {
            err += dx;
            y += y_incr_direction;
        }
    }
}

pub fn draw_point(v: &ScreenVertex, buffer: &mut FrameBuffer) {
    buffer.set_pixel_with_depth(
        v.position.x.floor() as i32,
        v.position.y.floor() as i32,
        v.position.z,
        v.color,
    );
}
