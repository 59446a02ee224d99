//! Packed ARGB8888 color helpers.
//!
//! Colors travel through the engine as `u32` in `0xAARRGGBB` order, the same
//! layout the software device writes into its color buffer.

pub const BLACK: u32 = 0xFF00_0000;
pub const WHITE: u32 = 0xFFFF_FFFF;

/// Pack normalized channels into an ARGB word. Channels are clamped to [0, 1].
#[inline]
pub fn pack_color(r: f32, g: f32, b: f32, a: f32) -> u32 {
    let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u32;
    (to_byte(a) << 24) | (to_byte(r) << 16) | (to_byte(g) << 8) | to_byte(b)
}

/// Unpack the RGB channels of an ARGB word into [0, 1].
#[inline]
pub fn unpack_color(color: u32) -> (f32, f32, f32) {
    let r = ((color >> 16) & 0xFF) as f32 / 255.0;
    let g = ((color >> 8) & 0xFF) as f32 / 255.0;
    let b = (color & 0xFF) as f32 / 255.0;
    (r, g, b)
}

#[inline]
pub fn alpha(color: u32) -> f32 {
    (color >> 24) as f32 / 255.0
}

/// Force the alpha channel of a packed 24-bit RGB value to opaque.
#[inline]
pub fn opaque(rgb: u32) -> u32 {
    rgb | 0xFF00_0000
}

/// Multiply two ARGB colors channel by channel, alpha included.
#[inline]
pub fn modulate(a: u32, b: u32) -> u32 {
    let mul = |shift: u32| {
        let x = (a >> shift) & 0xFF;
        let y = (b >> shift) & 0xFF;
        ((x * y + 127) / 255) << shift
    };
    mul(24) | mul(16) | mul(8) | mul(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pack_clamps_out_of_range_channels() {
        assert_eq!(pack_color(2.0, -1.0, 1.0, 1.0), 0xFFFF_00FF);
    }

    #[test]
    fn unpack_reads_rgb() {
        let (r, g, b) = unpack_color(0xFF80_00FF);
        assert_relative_eq!(r, 128.0 / 255.0, epsilon = 1e-6);
        assert_relative_eq!(g, 0.0);
        assert_relative_eq!(b, 1.0);
    }

    #[test]
    fn modulate_with_white_is_identity() {
        assert_eq!(modulate(0x80_12_34_56, WHITE), 0x80_12_34_56);
        assert_eq!(modulate(0xFF_FF_00_00, 0xFF_00_FF_00), 0xFF_00_00_00);
    }
}
