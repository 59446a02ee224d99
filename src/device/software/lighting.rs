//! Fixed-function per-vertex lighting.
//!
//! ```text
//! color = emissive + ambient * material.ambient
//!       + sum(diffuse_source * light.diffuse * max(N.L, 0) * attenuation * spot)
//! ```
//!
//! The diffuse source is the vertex color when the vertex carries one and the
//! material diffuse otherwise. Specular highlights are not computed.

use crate::light::{LightParams, LightType};
use crate::material::{ColorValue, Material};
use crate::math::Vec3;

/// Lights a single vertex given in world space.
pub fn light_vertex<'a>(
    position: Vec3,
    normal: Vec3,
    vertex_diffuse: Option<u32>,
    material: &Material,
    ambient: u32,
    lights: impl Iterator<Item = &'a LightParams>,
) -> u32 {
    let diffuse_source = vertex_diffuse.map_or(material.diffuse, ColorValue::from_argb);
    let normal = normal.normalize();

    let mut color = material
        .emissive
        .add_rgb(ColorValue::from_argb(ambient).modulate(material.ambient));

    for light in lights {
        let Some((to_light, attenuation)) = incidence(light, position) else {
            continue;
        };
        let n_dot_l = normal.dot(to_light);
        if n_dot_l <= 0.0 {
            continue;
        }
        let spot = spot_factor(light, to_light);
        color = color.add_rgb(
            diffuse_source
                .modulate(light.diffuse)
                .scale(n_dot_l * attenuation * spot),
        );
    }

    ColorValue {
        a: diffuse_source.a,
        ..color
    }
    .to_argb()
}

/// Unit vector from the vertex towards the light, and distance attenuation.
/// `None` when the vertex is out of the light's range.
fn incidence(light: &LightParams, position: Vec3) -> Option<(Vec3, f32)> {
    match light.kind {
        LightType::Directional => Some(((-light.direction).normalize(), 1.0)),
        LightType::Point | LightType::Spot => {
            let offset = light.position - position;
            let distance = offset.magnitude();
            if distance > light.range {
                return None;
            }
            let [a0, a1, a2] = light.attenuation;
            let falloff = a0 + a1 * distance + a2 * distance * distance;
            let attenuation = if falloff > 0.0 { 1.0 / falloff } else { 1.0 };
            Some((offset.normalize(), attenuation))
        }
    }
}

fn spot_factor(light: &LightParams, to_light: Vec3) -> f32 {
    if light.kind != LightType::Spot {
        return 1.0;
    }
    let rho = light.direction.normalize().dot(-to_light);
    let cos_phi = (light.phi / 2.0).cos();
    let cos_theta = (light.theta / 2.0).cos();
    if rho <= cos_phi {
        0.0
    } else if rho > cos_theta {
        1.0
    } else {
        ((rho - cos_phi) / (cos_theta - cos_phi)).powf(light.falloff)
    }
}
