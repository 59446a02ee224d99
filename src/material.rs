//! Surface material and normalized color values.

use crate::colors::{alpha, pack_color, unpack_color};

/// Normalized RGBA color, each channel nominally in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ColorValue {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl ColorValue {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color from 8-bit channels; out-of-range inputs are clamped.
    pub fn from_rgb8(r: i32, g: i32, b: i32) -> Self {
        let channel = |c: i32| (c as f32 / 255.0).clamp(0.0, 1.0);
        Self::new(channel(r), channel(g), channel(b), 1.0)
    }

    pub fn from_argb(color: u32) -> Self {
        let (r, g, b) = unpack_color(color);
        Self::new(r, g, b, alpha(color))
    }

    pub fn to_argb(self) -> u32 {
        pack_color(self.r, self.g, self.b, self.a)
    }

    /// Channel-wise product; alpha comes from `self`.
    pub fn modulate(self, other: Self) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.r * k, self.g * k, self.b * k, self.a)
    }

    pub fn add_rgb(self, other: Self) -> Self {
        Self::new(self.r + other.r, self.g + other.g, self.b + other.b, self.a)
    }
}

/// Fixed-function surface material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse: ColorValue,
    pub ambient: ColorValue,
    pub specular: ColorValue,
    pub emissive: ColorValue,
    /// Specular exponent.
    pub power: f32,
}

impl Material {
    pub fn new(
        diffuse: ColorValue,
        ambient: ColorValue,
        specular: ColorValue,
        emissive: ColorValue,
        power: f32,
    ) -> Self {
        Self {
            diffuse,
            ambient,
            specular,
            emissive,
            power,
        }
    }

    /// A material whose diffuse and ambient both follow `color`.
    pub fn solid(color: ColorValue) -> Self {
        Self {
            diffuse: color,
            ambient: color,
            ..Self::default()
        }
    }
}

impl Default for Material {
    /// White diffuse, ambient and specular; black emissive; power 1.
    fn default() -> Self {
        Self {
            diffuse: ColorValue::WHITE,
            ambient: ColorValue::WHITE,
            specular: ColorValue::WHITE,
            emissive: ColorValue::BLACK,
            power: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rgb8_inputs_are_clamped() {
        let c = ColorValue::from_rgb8(300, -20, 51);
        assert_relative_eq!(c.r, 1.0);
        assert_relative_eq!(c.g, 0.0);
        assert_relative_eq!(c.b, 0.2, epsilon = 1e-6);
        assert_relative_eq!(c.a, 1.0);
    }

    #[test]
    fn argb_round_trip_keeps_channels() {
        assert_eq!(ColorValue::from_argb(0xFF10_2030).to_argb(), 0xFF10_2030);
    }

    #[test]
    fn default_material_is_white_with_unit_power() {
        let m = Material::default();
        assert_eq!(m.diffuse, ColorValue::WHITE);
        assert_eq!(m.emissive, ColorValue::BLACK);
        assert_relative_eq!(m.power, 1.0);
    }
}
