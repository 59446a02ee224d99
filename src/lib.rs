//! A fixed-function 3D rendering engine with retained scene state.
//!
//! A [`Scene`] holds primitives, meshes and lights that any thread may edit,
//! and draws them through a [`device::Device`] once per displayed frame.
//! Geometry derived from primitives and meshes is cached and only rebuilt
//! after an edit.
//!
//! # Quick Start
//!
//! ```ignore
//! use env3d::prelude::*;
//!
//! let factory = SoftwareDeviceFactory::new(PresentParameters::new(640, 480));
//! let frames = factory.present_target();
//! let scene = Scene::new(factory);
//! scene.bind_surface(SurfaceHandle::from_raw(1).unwrap())?;
//!
//! let triangle = Arc::new(Primitive::new(RenderMode::TriangleList));
//! triangle.add_vertex(Vertex::at(320.0, 80.0, 0.5).with_color(0xFFFF_0000));
//! triangle.add_vertex(Vertex::at(560.0, 400.0, 0.5).with_color(0xFF00_FF00));
//! triangle.add_vertex(Vertex::at(80.0, 400.0, 0.5).with_color(0xFF00_00FF));
//! scene.add_primitive(triangle);
//! scene.render()?;
//! ```

pub mod colors;
pub mod device;
pub mod error;
pub mod light;
pub mod material;
pub mod math;
pub mod mesh;
pub mod primitive;
pub mod projection;
pub mod scene;
pub mod texture;

pub use error::{DeviceError, RenderError, StatusCode};
pub use light::{Light, LightParams, LightType};
pub use material::{ColorValue, Material};
pub use mesh::Mesh;
pub use primitive::{Primitive, RenderMode, Vertex};
pub use projection::Projection;
pub use scene::{Environment3D, Scene, SceneEvent};
pub use texture::Texture;

/// Prelude module for convenient imports.
///
/// # Example
/// ```ignore
/// use env3d::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Scene graph
    pub use crate::light::{Light, LightType};
    pub use crate::material::{ColorValue, Material};
    pub use crate::mesh::Mesh;
    pub use crate::primitive::{Primitive, RenderMode, Vertex};
    pub use crate::scene::{Scene, SceneEvent};
    pub use crate::texture::Texture;

    // Camera
    pub use crate::projection::Projection;

    // Math
    pub use crate::math::{Mat4, Vec2, Vec3, Vec4};

    // Devices
    pub use crate::device::software::{PresentTarget, SoftwareDeviceFactory};
    pub use crate::device::{Device, DeviceFactory, PresentParameters, SurfaceHandle};

    // Errors
    pub use crate::error::{RenderError, StatusCode};
}
