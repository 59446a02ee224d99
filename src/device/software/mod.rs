//! CPU reference implementation of [`Device`].
//!
//! Vertices are transformed, lit and rasterized on the calling thread into an
//! owned back buffer. [`Device::present`] publishes the finished frame to a
//! [`PresentTarget`] that a window layer can read.
//!
//! The factory refuses hardware vertex processing, so binding a scene always
//! walks the creation fallback chain and settles on software vertex
//! processing.

pub mod framebuffer;
pub mod lighting;
pub mod loader;
pub mod rasterizer;

use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;

use self::framebuffer::RenderTarget;
use self::rasterizer::{draw_line, draw_point, fill_triangle, ScreenVertex};
use super::{
    Device, DeviceFactory, DeviceKind, GpuTexture, ImageSurface, LoadedMesh, MeshBuffer,
    PresentParameters, PrimitiveType, RenderState, SurfaceHandle, TransformKind, VertexAttributes,
    VertexBuffer, VertexLayout, VertexStream,
};
use crate::colors::{opaque, WHITE};
use crate::error::{DeviceError, DeviceResult, StatusCode};
use crate::light::LightParams;
use crate::material::Material;
use crate::math::{Mat4, Vec3, Vec4};

/// Vertices with clip-space w at or below this are behind the eye.
const W_EPSILON: f32 = 1e-5;

/// The most recently presented frame.
#[derive(Debug, Default)]
pub struct PresentedFrame {
    pub width: u32,
    pub height: u32,
    /// ARGB8888 pixels, row-major.
    pub pixels: Vec<u32>,
    pub frame_count: u64,
}

impl PresentedFrame {
    /// Pixels as raw bytes, ready for an ARGB8888 streaming texture.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Shared handle to the frames a device presents.
pub type PresentTarget = Arc<Mutex<PresentedFrame>>;

/// Creates [`SoftwareDevice`]s that present into a shared [`PresentTarget`].
pub struct SoftwareDeviceFactory {
    params: PresentParameters,
    target: PresentTarget,
}

impl SoftwareDeviceFactory {
    pub fn new(params: PresentParameters) -> Self {
        Self {
            params,
            target: PresentTarget::default(),
        }
    }

    /// Frames presented by every device this factory creates.
    pub fn present_target(&self) -> PresentTarget {
        Arc::clone(&self.target)
    }
}

impl DeviceFactory for SoftwareDeviceFactory {
    fn create_device(
        &mut self,
        surface: SurfaceHandle,
        kind: DeviceKind,
    ) -> DeviceResult<Box<dyn Device>> {
        if kind == DeviceKind::HardwareVertexProcessing {
            return Err(DeviceError::new("create_device", StatusCode::NOT_AVAILABLE));
        }
        if self.params.back_buffer_width == 0 || self.params.back_buffer_height == 0 {
            return Err(DeviceError::new("create_device", StatusCode::INVALID_ARG));
        }
        info!(
            "software device ({kind:?}) for surface {:#x}, {}x{}",
            surface.raw(),
            self.params.back_buffer_width,
            self.params.back_buffer_height
        );
        Ok(Box::new(SoftwareDevice::new(
            self.params,
            Arc::clone(&self.target),
        )?))
    }
}

#[derive(Debug, Clone, Copy)]
struct LightSlot {
    params: LightParams,
    enabled: bool,
}

#[derive(Debug, Clone, Copy)]
struct PipelineState {
    lighting: bool,
    specular: bool,
    ambient: u32,
    z_enable: bool,
}

/// CPU rendering device.
pub struct SoftwareDevice {
    back: RenderTarget,
    present_target: PresentTarget,
    depth_buffer: bool,
    in_scene: bool,
    state: PipelineState,
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    lights: Vec<Option<LightSlot>>,
    material: Material,
    texture: Option<Arc<GpuTexture>>,
}

impl SoftwareDevice {
    pub fn new(params: PresentParameters, present_target: PresentTarget) -> DeviceResult<Self> {
        Ok(Self {
            back: RenderTarget::new(params.back_buffer_width, params.back_buffer_height)?,
            present_target,
            depth_buffer: params.depth_buffer,
            in_scene: false,
            state: PipelineState {
                lighting: true,
                specular: false,
                ambient: 0,
                z_enable: params.depth_buffer,
            },
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            lights: Vec::new(),
            material: Material::default(),
            texture: None,
        })
    }

    /// Back buffer contents, before presentation.
    pub fn back_buffer(&self) -> &[u32] {
        self.back.color()
    }

    pub fn lighting_enabled(&self) -> bool {
        self.state.lighting
    }

    /// Specular highlights are accepted as a state but not rendered.
    pub fn specular_enabled(&self) -> bool {
        self.state.specular
    }

    pub fn is_light_enabled(&self, slot: u32) -> bool {
        matches!(self.lights.get(slot as usize), Some(Some(l)) if l.enabled)
    }

    fn require_scene(&self, op: &'static str) -> DeviceResult<()> {
        if self.in_scene {
            Ok(())
        } else {
            Err(DeviceError::new(op, StatusCode::INVALID_CALL))
        }
    }

    /// Transforms, lights and maps one vertex to screen space. `None` when the
    /// vertex lies behind the eye.
    fn process_vertex(
        &self,
        v: &VertexAttributes,
        layout: VertexLayout,
        world_view_proj: &Mat4,
    ) -> Option<ScreenVertex> {
        if layout.transformed {
            return Some(ScreenVertex {
                position: v.position,
                color: if layout.diffuse { v.diffuse } else { WHITE },
                uv: v.uv,
            });
        }

        let clip = Vec4::point(v.position) * *world_view_proj;
        if clip.w <= W_EPSILON {
            return None;
        }
        let inv_w = 1.0 / clip.w;
        let width = self.back.width() as f32;
        let height = self.back.height() as f32;
        let position = Vec3::new(
            (clip.x * inv_w + 1.0) * 0.5 * width,
            (1.0 - clip.y * inv_w) * 0.5 * height,
            clip.z * inv_w,
        );

        let vertex_diffuse = layout.diffuse.then_some(v.diffuse);
        let color = if self.state.lighting {
            let enabled = self.lights.iter().flatten().filter(|l| l.enabled);
            lighting::light_vertex(
                self.world.transform_point(v.position),
                self.world.transform_normal(v.normal),
                vertex_diffuse,
                &self.material,
                self.state.ambient,
                enabled.map(|l| &l.params),
            )
        } else {
            vertex_diffuse.unwrap_or(WHITE)
        };

        Some(ScreenVertex {
            position,
            color,
            uv: v.uv,
        })
    }

    fn process_range(
        &self,
        stream: &VertexStream,
        start: usize,
        count: usize,
    ) -> Vec<Option<ScreenVertex>> {
        let world_view_proj = self.world * self.view * self.projection;
        let layout = stream.layout();
        (start..start + count)
            .map(|i| self.process_vertex(&stream.read(i), layout, &world_view_proj))
            .collect()
    }

    fn draw_triangles(
        &mut self,
        vertices: &[Option<ScreenVertex>],
        triangles: impl Iterator<Item = [usize; 3]>,
    ) {
        let texture = self.texture.clone();
        let mut fb = self.back.as_framebuffer(self.depth_buffer && self.state.z_enable);
        for [a, b, c] in triangles {
            if let (Some(a), Some(b), Some(c)) = (vertices[a], vertices[b], vertices[c]) {
                fill_triangle(&[a, b, c], &mut fb, texture.as_ref());
            }
        }
    }

    fn draw_lines(
        &mut self,
        vertices: &[Option<ScreenVertex>],
        lines: impl Iterator<Item = [usize; 2]>,
    ) {
        let mut fb = self.back.as_framebuffer(self.depth_buffer && self.state.z_enable);
        for [a, b] in lines {
            if let (Some(a), Some(b)) = (vertices[a], vertices[b]) {
                draw_line(&a, &b, &mut fb);
            }
        }
    }
}

impl Device for SoftwareDevice {
    fn clear(&mut self, color: u32, depth: f32) -> DeviceResult<()> {
        self.back.clear(opaque(color), depth.clamp(0.0, 1.0));
        Ok(())
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        if self.in_scene {
            return Err(DeviceError::new("begin_scene", StatusCode::INVALID_CALL));
        }
        self.in_scene = true;
        Ok(())
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        self.require_scene("end_scene")?;
        self.in_scene = false;
        Ok(())
    }

    fn present(&mut self) -> DeviceResult<()> {
        if self.in_scene {
            return Err(DeviceError::new("present", StatusCode::INVALID_CALL));
        }
        let mut frame = self.present_target.lock();
        frame.width = self.back.width();
        frame.height = self.back.height();
        frame.pixels.clear();
        frame.pixels.extend_from_slice(self.back.color());
        frame.frame_count += 1;
        Ok(())
    }

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()> {
        match state {
            RenderState::Lighting(on) => self.state.lighting = on,
            RenderState::SpecularEnable(on) => self.state.specular = on,
            RenderState::Ambient(color) => self.state.ambient = color,
            RenderState::ZEnable(on) => self.state.z_enable = on,
        }
        Ok(())
    }

    fn set_transform(&mut self, kind: TransformKind, matrix: &Mat4) -> DeviceResult<()> {
        match kind {
            TransformKind::World => self.world = *matrix,
            TransformKind::View => self.view = *matrix,
            TransformKind::Projection => self.projection = *matrix,
        }
        Ok(())
    }

    fn set_light(&mut self, slot: u32, light: &LightParams) -> DeviceResult<()> {
        let slot = slot as usize;
        if self.lights.len() <= slot {
            self.lights.resize(slot + 1, None);
        }
        let enabled = self.lights[slot].is_some_and(|l| l.enabled);
        self.lights[slot] = Some(LightSlot {
            params: *light,
            enabled,
        });
        Ok(())
    }

    fn light_enable(&mut self, slot: u32, enable: bool) -> DeviceResult<()> {
        let slot = slot as usize;
        if self.lights.len() <= slot {
            self.lights.resize(slot + 1, None);
        }
        // Enabling a slot that was never set uses default parameters.
        let entry = self.lights[slot].get_or_insert(LightSlot {
            params: LightParams::default(),
            enabled: false,
        });
        entry.enabled = enable;
        Ok(())
    }

    fn set_material(&mut self, material: &Material) -> DeviceResult<()> {
        self.material = *material;
        Ok(())
    }

    fn set_texture(&mut self, stage: u32, texture: Option<&Arc<GpuTexture>>) -> DeviceResult<()> {
        if stage != 0 {
            return Err(DeviceError::new("set_texture", StatusCode::INVALID_CALL));
        }
        self.texture = texture.cloned();
        Ok(())
    }

    fn create_vertex_buffer(
        &mut self,
        layout: VertexLayout,
        vertex_count: usize,
    ) -> DeviceResult<VertexBuffer> {
        if vertex_count == 0 {
            return Err(DeviceError::new("create_vertex_buffer", StatusCode::INVALID_CALL));
        }
        Ok(VertexBuffer::new(layout, vertex_count))
    }

    fn draw_primitive(
        &mut self,
        buffer: &VertexBuffer,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()> {
        const OP: &str = "draw_primitive";
        self.require_scene(OP)?;
        let start = start_vertex as usize;
        let count = primitive.vertex_count(primitive_count) as usize;
        if primitive_count == 0 || start + count > buffer.vertex_count() {
            return Err(DeviceError::new(OP, StatusCode::INVALID_CALL));
        }

        let vertices = self.process_range(buffer.vertices(), start, count);
        let n = primitive_count as usize;
        match primitive {
            PrimitiveType::PointList => {
                let mut fb = self.back.as_framebuffer(self.depth_buffer && self.state.z_enable);
                for v in vertices.iter().flatten() {
                    draw_point(v, &mut fb);
                }
            }
            PrimitiveType::LineList => self.draw_lines(&vertices, (0..n).map(|i| [2 * i, 2 * i + 1])),
            PrimitiveType::LineStrip => self.draw_lines(&vertices, (0..n).map(|i| [i, i + 1])),
            PrimitiveType::TriangleList => {
                self.draw_triangles(&vertices, (0..n).map(|i| [3 * i, 3 * i + 1, 3 * i + 2]))
            }
            PrimitiveType::TriangleStrip => self.draw_triangles(
                &vertices,
                // Odd triangles swap their first two vertices to keep one winding.
                (0..n).map(|i| if i % 2 == 0 { [i, i + 1, i + 2] } else { [i + 1, i, i + 2] }),
            ),
            PrimitiveType::TriangleFan => {
                self.draw_triangles(&vertices, (0..n).map(|i| [0, i + 1, i + 2]))
            }
        }
        Ok(())
    }

    fn create_mesh(
        &mut self,
        face_count: usize,
        vertex_count: usize,
        layout: VertexLayout,
    ) -> DeviceResult<MeshBuffer> {
        if face_count == 0 || vertex_count == 0 || vertex_count > loader::MAX_MESH_VERTICES {
            return Err(DeviceError::new("create_mesh", StatusCode::INVALID_CALL));
        }
        Ok(MeshBuffer::new(face_count, vertex_count, layout))
    }

    fn clone_mesh(&mut self, mesh: &MeshBuffer, layout: VertexLayout) -> DeviceResult<MeshBuffer> {
        Ok(mesh.clone_with_layout(layout))
    }

    fn draw_subset(&mut self, mesh: &MeshBuffer, subset: u32) -> DeviceResult<()> {
        const OP: &str = "draw_subset";
        self.require_scene(OP)?;
        let count = mesh.vertex_count();
        let faces: Vec<[usize; 3]> = mesh
            .subset_faces(subset)
            .map(|f| f.map(usize::from))
            .collect();
        if faces.iter().flatten().any(|&i| i >= count) {
            return Err(DeviceError::new(OP, StatusCode::INVALID_DATA));
        }
        let vertices = self.process_range(mesh.vertices(), 0, count);
        self.draw_triangles(&vertices, faces.into_iter());
        Ok(())
    }

    fn load_mesh(&mut self, path: &Path) -> DeviceResult<LoadedMesh> {
        loader::load_obj(path)
    }

    fn create_texture_from_file(&mut self, path: &Path) -> DeviceResult<Arc<GpuTexture>> {
        let img = loader::decode_image("create_texture_from_file", path)?;
        let (width, height) = img.dimensions();
        debug!("texture {} ({width}x{height})", path.display());
        Ok(Arc::new(GpuTexture::new(width, height, loader::to_argb(&img))?))
    }

    fn create_image_surface(
        &mut self,
        width: u32,
        height: u32,
    ) -> DeviceResult<Arc<ImageSurface>> {
        Ok(Arc::new(ImageSurface::new(width, height)?))
    }

    fn load_surface_from_file(&mut self, surface: &ImageSurface, path: &Path) -> DeviceResult<()> {
        let pixels =
            loader::decode_resized("load_surface_from_file", path, surface.width(), surface.height())?;
        surface.fill(pixels)
    }

    fn stretch_to_back_buffer(&mut self, surface: &ImageSurface) -> DeviceResult<()> {
        let pixels = surface.pixels();
        self.back
            .stretch_from(&pixels, surface.width(), surface.height());
        Ok(())
    }
}
