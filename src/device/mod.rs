//! The device boundary.
//!
//! The engine never talks to a graphics API directly. Everything it needs
//! from a backend is expressed by the [`Device`] trait, and device creation by
//! [`DeviceFactory`]. [`software`] provides a complete CPU backend; tests drive
//! the engine through a recording double.
//!
//! Every call reports failure as a [`DeviceError`] carrying the raw status
//! code, which the engine records and surfaces unchanged.

pub mod resource;
pub mod software;

use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use crate::error::DeviceResult;
use crate::light::LightParams;
use crate::material::Material;
use crate::math::Mat4;

pub use resource::{
    compute_normals, pixel_buffer, GpuTexture, ImageSurface, LoadedMesh, MeshBuffer,
    SubsetMaterial, VertexAttributes, VertexBuffer, VertexLayout, VertexStream,
    MAX_SURFACE_DIMENSION,
};

/// Opaque handle of the platform surface a device presents to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(NonZeroU64);

impl SurfaceHandle {
    /// Wraps a raw platform handle; the null handle is rejected.
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn raw(self) -> u64 {
        self.0.get()
    }
}

/// Vertex processing mode requested when creating a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    HardwareVertexProcessing,
    SoftwareVertexProcessing,
    Reference,
}

impl DeviceKind {
    /// Order in which device creation is attempted.
    pub const FALLBACK_ORDER: [DeviceKind; 3] = [
        DeviceKind::HardwareVertexProcessing,
        DeviceKind::SoftwareVertexProcessing,
        DeviceKind::Reference,
    ];
}

/// Back buffer configuration for a new device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentParameters {
    pub back_buffer_width: u32,
    pub back_buffer_height: u32,
    pub depth_buffer: bool,
}

impl PresentParameters {
    pub fn new(back_buffer_width: u32, back_buffer_height: u32) -> Self {
        Self {
            back_buffer_width,
            back_buffer_height,
            depth_buffer: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformKind {
    World,
    View,
    Projection,
}

/// Fixed-function pipeline switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Lighting(bool),
    SpecularEnable(bool),
    /// Global ambient light as packed RGB.
    Ambient(u32),
    ZEnable(bool),
}

/// Topology passed to [`Device::draw_primitive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl PrimitiveType {
    /// Number of vertices consumed by `count` primitives.
    pub fn vertex_count(self, count: u32) -> u32 {
        if count == 0 {
            return 0;
        }
        match self {
            PrimitiveType::PointList => count,
            PrimitiveType::LineList => count * 2,
            PrimitiveType::LineStrip => count + 1,
            PrimitiveType::TriangleList => count * 3,
            PrimitiveType::TriangleStrip | PrimitiveType::TriangleFan => count + 2,
        }
    }
}

/// A rendering device bound to one surface.
///
/// Methods mirror a fixed-function immediate-mode API: state setters, scene
/// brackets, resource creation and draws. Resources are plain values or
/// reference-counted handles; dropping the last handle releases the resource.
pub trait Device: Send {
    /// Clears the color target to `color` and the depth buffer to `depth`.
    fn clear(&mut self, color: u32, depth: f32) -> DeviceResult<()>;
    fn begin_scene(&mut self) -> DeviceResult<()>;
    fn end_scene(&mut self) -> DeviceResult<()>;
    fn present(&mut self) -> DeviceResult<()>;

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()>;
    fn set_transform(&mut self, kind: TransformKind, matrix: &Mat4) -> DeviceResult<()>;
    fn set_light(&mut self, slot: u32, light: &LightParams) -> DeviceResult<()>;
    fn light_enable(&mut self, slot: u32, enable: bool) -> DeviceResult<()>;
    fn set_material(&mut self, material: &Material) -> DeviceResult<()>;
    fn set_texture(&mut self, stage: u32, texture: Option<&Arc<GpuTexture>>) -> DeviceResult<()>;

    fn create_vertex_buffer(
        &mut self,
        layout: VertexLayout,
        vertex_count: usize,
    ) -> DeviceResult<VertexBuffer>;
    fn draw_primitive(
        &mut self,
        buffer: &VertexBuffer,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()>;

    fn create_mesh(
        &mut self,
        face_count: usize,
        vertex_count: usize,
        layout: VertexLayout,
    ) -> DeviceResult<MeshBuffer>;
    fn clone_mesh(&mut self, mesh: &MeshBuffer, layout: VertexLayout) -> DeviceResult<MeshBuffer>;
    fn draw_subset(&mut self, mesh: &MeshBuffer, subset: u32) -> DeviceResult<()>;
    fn load_mesh(&mut self, path: &Path) -> DeviceResult<LoadedMesh>;

    fn create_texture_from_file(&mut self, path: &Path) -> DeviceResult<Arc<GpuTexture>>;
    fn create_image_surface(&mut self, width: u32, height: u32)
        -> DeviceResult<Arc<ImageSurface>>;
    fn load_surface_from_file(&mut self, surface: &ImageSurface, path: &Path) -> DeviceResult<()>;
    /// Copies `surface` over the whole back buffer, scaling as needed.
    fn stretch_to_back_buffer(&mut self, surface: &ImageSurface) -> DeviceResult<()>;
}

/// Creates devices for a surface.
pub trait DeviceFactory: Send {
    fn create_device(
        &mut self,
        surface: SurfaceHandle,
        kind: DeviceKind,
    ) -> DeviceResult<Box<dyn Device>>;
}
