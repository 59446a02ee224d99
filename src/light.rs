//! Scene lights.
//!
//! A [`Light`] is shared between the control side, which edits its parameters,
//! and the render pass, which uploads them to a device slot. Both sides go
//! through the light's own lock.

use std::sync::atomic::{AtomicI32, Ordering};

use parking_lot::Mutex;

use crate::material::ColorValue;
use crate::math::Vec3;

/// Range given to every light.
pub const LIGHT_RANGE: f32 = 1000.0;
/// Inner cone angle of spot lights, in radians.
pub const SPOT_THETA: f32 = 1.0;
/// Outer cone angle of spot lights, in radians.
pub const SPOT_PHI: f32 = 2.0;
pub const SPOT_FALLOFF: f32 = 1.0;

const UNASSIGNED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LightType {
    Point = 1,
    Spot = 2,
    Directional = 3,
}

impl LightType {
    /// Maps a raw type code; unknown codes yield `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(LightType::Point),
            2 => Some(LightType::Spot),
            3 => Some(LightType::Directional),
            _ => None,
        }
    }
}

/// Parameters uploaded to a device light slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    pub kind: LightType,
    pub diffuse: ColorValue,
    pub specular: ColorValue,
    pub ambient: ColorValue,
    pub position: Vec3,
    pub direction: Vec3,
    pub range: f32,
    pub falloff: f32,
    /// Constant, linear and quadratic attenuation.
    pub attenuation: [f32; 3],
    pub theta: f32,
    pub phi: f32,
}

impl LightParams {
    /// Builds parameters from 8-bit colors. Channels are clamped into [0, 1];
    /// spot lights get the fixed cone constants.
    pub fn new(
        kind: LightType,
        diffuse: [i32; 3],
        specular: [i32; 3],
        position: Vec3,
        direction: Vec3,
    ) -> Self {
        let (theta, phi, falloff) = match kind {
            LightType::Spot => (SPOT_THETA, SPOT_PHI, SPOT_FALLOFF),
            LightType::Point | LightType::Directional => (0.0, 0.0, 0.0),
        };
        Self {
            kind,
            diffuse: ColorValue::from_rgb8(diffuse[0], diffuse[1], diffuse[2]),
            specular: ColorValue::from_rgb8(specular[0], specular[1], specular[2]),
            ambient: ColorValue::new(0.0, 0.0, 0.0, 0.0),
            position,
            direction,
            range: LIGHT_RANGE,
            falloff,
            attenuation: [1.0, 0.0, 0.0],
            theta,
            phi,
        }
    }
}

impl Default for LightParams {
    fn default() -> Self {
        Self::new(LightType::Point, [0; 3], [0; 3], Vec3::ZERO, Vec3::ZERO)
    }
}

/// A light and the device slot it occupied in the latest render pass.
#[derive(Debug)]
pub struct Light {
    params: Mutex<LightParams>,
    slot: AtomicI32,
}

impl Light {
    pub fn new() -> Self {
        Self::with_params(LightParams::default())
    }

    pub fn with_params(params: LightParams) -> Self {
        Self {
            params: Mutex::new(params),
            slot: AtomicI32::new(UNASSIGNED),
        }
    }

    /// Point light; specular follows the color.
    pub fn point(position: Vec3, color: [i32; 3]) -> Self {
        Self::with_params(LightParams::new(
            LightType::Point,
            color,
            color,
            position,
            Vec3::ZERO,
        ))
    }

    pub fn spot(position: Vec3, direction: Vec3, color: [i32; 3]) -> Self {
        Self::with_params(LightParams::new(
            LightType::Spot,
            color,
            color,
            position,
            direction,
        ))
    }

    pub fn directional(direction: Vec3, color: [i32; 3]) -> Self {
        Self::with_params(LightParams::new(
            LightType::Directional,
            color,
            color,
            Vec3::ZERO,
            direction,
        ))
    }

    /// Overwrites every parameter at once.
    pub fn set_parameters(
        &self,
        kind: LightType,
        diffuse: [i32; 3],
        specular: [i32; 3],
        position: Vec3,
        direction: Vec3,
    ) {
        *self.params.lock() = LightParams::new(kind, diffuse, specular, position, direction);
    }

    pub fn parameters(&self) -> LightParams {
        *self.params.lock()
    }

    pub(crate) fn assign_slot(&self, slot: u32) {
        self.slot.store(slot as i32, Ordering::Release);
    }

    pub(crate) fn clear_slot(&self) {
        self.slot.store(UNASSIGNED, Ordering::Release);
    }

    /// Device slot used by the latest render pass, if the light is registered.
    pub fn current_slot(&self) -> Option<u32> {
        u32::try_from(self.slot.load(Ordering::Acquire)).ok()
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new()
    }
}
