//! Minimal linear algebra for the fixed-function pipeline.
//!
//! Matrices follow the row-vector convention used by the device layer:
//! `v' = v * M`, translation in the last row, and `A * B` applies `A` first.

pub mod mat4;
pub mod vec2;
pub mod vec3;
pub mod vec4;

pub use mat4::Mat4;
pub use vec2::Vec2;
pub use vec3::Vec3;
pub use vec4::Vec4;
