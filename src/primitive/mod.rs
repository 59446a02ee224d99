//! Drawable primitives.
//!
//! A [`Primitive`] is an editable vertex list plus the attributes that decide
//! how it is drawn. The GPU geometry derived from it is built lazily on the
//! first render after a change and reused until the next change.
//!
//! Which geometry is built depends on the [`RenderPath`] selected from the
//! scene's transform and lighting switches and the primitive's own colored
//! and textured state:
//!
//! | transform | lighting | geometry                                   |
//! |-----------|----------|--------------------------------------------|
//! | off       | off      | vertex buffer of screen-space (rhw) vertices |
//! | on        | off      | vertex buffer of untransformed vertices     |
//! | on        | on       | indexed mesh with computed normals          |
//! | off       | on       | rejected                                    |

mod path;
mod topology;

pub use path::{PathFlags, RenderPath};
pub use topology::RenderMode;

use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::colors::WHITE;
use crate::device::{compute_normals, Device, MeshBuffer, VertexAttributes, VertexBuffer, VertexLayout};
use crate::error::RenderError;
use crate::material::Material;
use crate::math::{Mat4, Vec2, Vec3};
use crate::texture::Texture;

/// Most vertices the lit mesh path can index with 16-bit indices.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// One vertex as the caller supplies it.
///
/// `rhw` is only used when the scene's transform pipeline is off, and `tu`/`tv`
/// only when a texture is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub rhw: f32,
    /// Packed ARGB diffuse color.
    pub color: u32,
    pub tu: f32,
    pub tv: f32,
}

impl Vertex {
    pub const fn new(x: f32, y: f32, z: f32, rhw: f32, color: u32, tu: f32, tv: f32) -> Self {
        Self {
            x,
            y,
            z,
            rhw,
            color,
            tu,
            tv,
        }
    }

    /// White vertex at a position, with rhw 1.
    pub const fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, 1.0, WHITE, 0.0, 0.0)
    }

    pub const fn with_color(self, color: u32) -> Self {
        Self { color, ..self }
    }

    pub const fn with_tex(self, tu: f32, tv: f32) -> Self {
        Self { tu, tv, ..self }
    }

    pub const fn with_rhw(self, rhw: f32) -> Self {
        Self { rhw, ..self }
    }

    fn attributes(&self, local: Option<&Mat4>) -> VertexAttributes {
        let position = Vec3::new(self.x, self.y, self.z);
        VertexAttributes {
            position: local.map_or(position, |m| m.transform_point(position)),
            rhw: self.rhw,
            normal: Vec3::ZERO,
            diffuse: self.color,
            uv: Vec2::new(self.tu, self.tv),
        }
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::at(0.0, 0.0, 0.0)
    }
}

/// Scene switches a primitive is rendered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderContext {
    pub transform: bool,
    pub lighting: bool,
}

#[derive(Debug)]
enum Geometry {
    Buffer(VertexBuffer),
    Mesh { mode: RenderMode, mesh: MeshBuffer },
}

#[derive(Debug)]
struct PrimitiveState {
    vertices: Vec<Vertex>,
    mode: RenderMode,
    colored: bool,
    material: Option<Material>,
    texture: Option<Arc<Texture>>,
    local_transform: Option<Mat4>,
    dirty: bool,
    geometry: Option<Geometry>,
}

/// A vertex list with its render attributes and cached GPU geometry.
#[derive(Debug)]
pub struct Primitive {
    state: Mutex<PrimitiveState>,
}

impl Primitive {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            state: Mutex::new(PrimitiveState {
                vertices: Vec::new(),
                mode,
                colored: true,
                material: Some(Material::default()),
                texture: None,
                local_transform: None,
                dirty: false,
                geometry: None,
            }),
        }
    }

    pub fn add_vertex(&self, vertex: Vertex) {
        let mut state = self.state.lock();
        state.vertices.push(vertex);
        state.dirty = true;
    }

    /// Replaces the vertex at `index`, which must be below the vertex count.
    pub fn set_vertex_at(&self, index: usize, vertex: Vertex) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        let len = state.vertices.len();
        let slot = state
            .vertices
            .get_mut(index)
            .ok_or(RenderError::VertexIndexOutOfRange { index, len })?;
        *slot = vertex;
        state.dirty = true;
        Ok(())
    }

    pub fn vertex(&self, index: usize) -> Option<Vertex> {
        self.state.lock().vertices.get(index).copied()
    }

    pub fn vertices(&self) -> Vec<Vertex> {
        self.state.lock().vertices.clone()
    }

    pub fn vertex_count(&self) -> usize {
        self.state.lock().vertices.len()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.state.lock().mode
    }

    pub fn set_render_mode(&self, mode: RenderMode) {
        self.state.lock().mode = mode;
    }

    pub fn material(&self) -> Option<Material> {
        self.state.lock().material
    }

    /// Material used on the lit path; `None` leaves the device's current one.
    pub fn set_material(&self, material: Option<Material>) {
        self.state.lock().material = material;
    }

    pub fn texture(&self) -> Option<Arc<Texture>> {
        self.state.lock().texture.clone()
    }

    pub fn set_texture(&self, texture: Option<Arc<Texture>>) {
        self.state.lock().texture = texture;
    }

    pub fn is_colored(&self) -> bool {
        self.state.lock().colored
    }

    pub fn set_colored(&self, colored: bool) {
        self.state.lock().colored = colored;
    }

    /// Applies `transform` to every position when the geometry is built.
    /// `None` restores the positions as supplied.
    pub fn set_transform(&self, transform: Option<Mat4>) {
        let mut state = self.state.lock();
        state.local_transform = transform;
        state.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Releases the cached geometry. A later render rebuilds it.
    pub fn dispose(&self) {
        let mut state = self.state.lock();
        state.geometry = None;
        state.dirty = !state.vertices.is_empty();
    }

    /// Draws the primitive, rebuilding its geometry first when it is stale.
    ///
    /// The primitive's lock is held for the whole call, so edits from other
    /// threads wait until the draw is issued.
    pub fn render(&self, device: &mut dyn Device, context: RenderContext) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        let flags = PathFlags {
            transform: context.transform,
            lighting: context.lighting,
            colored: state.colored,
            textured: state.texture.is_some(),
        };
        match RenderPath::select(flags) {
            RenderPath::Rejected => Err(RenderError::InvalidRenderPath),
            RenderPath::VertexBuffer(layout) => state.draw_vertex_buffer(device, layout),
            RenderPath::LitMesh(layout) => state.draw_lit_mesh(device, layout),
        }
    }
}

impl Default for Primitive {
    fn default() -> Self {
        Self::new(RenderMode::default())
    }
}

impl PrimitiveState {
    fn draw_vertex_buffer(
        &mut self,
        device: &mut dyn Device,
        layout: VertexLayout,
    ) -> Result<(), RenderError> {
        let current = matches!(&self.geometry, Some(Geometry::Buffer(b)) if b.layout() == layout);
        if self.dirty || !current {
            let built = self.build_vertex_buffer(device, layout);
            self.finish_rebuild(built)?;
        }

        let Some(Geometry::Buffer(buffer)) = &self.geometry else {
            return Ok(());
        };
        let count = self.mode.primitive_count(buffer.vertex_count());
        if count == 0 {
            return Ok(());
        }
        self.bind_texture(device)?;
        device.draw_primitive(buffer, self.mode.primitive_type(), 0, count)?;
        Ok(())
    }

    fn draw_lit_mesh(
        &mut self,
        device: &mut dyn Device,
        layout: VertexLayout,
    ) -> Result<(), RenderError> {
        if !self.mode.is_triangles() {
            return Err(RenderError::UnsupportedTopology(self.mode));
        }

        let current = matches!(
            &self.geometry,
            Some(Geometry::Mesh { mode, mesh })
                if *mode == self.mode && mesh.layout() == layout.with_normal()
        );
        if self.dirty || !current {
            let built = self.build_mesh(device, layout);
            self.finish_rebuild(built)?;
        }

        let Some(Geometry::Mesh { mesh, .. }) = &self.geometry else {
            return Ok(());
        };
        if let Some(material) = &self.material {
            device.set_material(material)?;
        }
        self.bind_texture(device)?;
        device.draw_subset(mesh, 0)?;
        Ok(())
    }

    /// Stores the outcome of a rebuild. A failed rebuild stays dirty so the
    /// next render tries again.
    fn finish_rebuild(&mut self, built: Result<Option<Geometry>, RenderError>) -> Result<(), RenderError> {
        match built {
            Ok(geometry) => {
                self.geometry = geometry;
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                warn!("primitive rebuild failed: {err}");
                self.dirty = true;
                Err(err)
            }
        }
    }

    fn build_vertex_buffer(
        &mut self,
        device: &mut dyn Device,
        layout: VertexLayout,
    ) -> Result<Option<Geometry>, RenderError> {
        self.geometry = None;
        if self.vertices.is_empty() {
            return Ok(None);
        }
        let mut buffer = device.create_vertex_buffer(layout, self.vertices.len())?;
        let local = self.local_transform.as_ref();
        for (i, v) in self.vertices.iter().enumerate() {
            buffer.vertices_mut().write(i, &v.attributes(local));
        }
        debug!(
            "built vertex buffer: {} vertices, {} bytes",
            buffer.vertex_count(),
            buffer.size_in_bytes()
        );
        Ok(Some(Geometry::Buffer(buffer)))
    }

    fn build_mesh(
        &mut self,
        device: &mut dyn Device,
        layout: VertexLayout,
    ) -> Result<Option<Geometry>, RenderError> {
        self.geometry = None;
        let vertex_count = self.vertices.len();
        let faces = self.mode.primitive_count(vertex_count) as usize;
        if faces == 0 {
            return Ok(None);
        }
        if vertex_count > MAX_INDEXED_VERTICES {
            return Err(RenderError::TooManyVertices {
                count: vertex_count,
            });
        }

        let mut mesh = device.create_mesh(faces, vertex_count, layout)?;
        let local = self.local_transform.as_ref();
        for (i, v) in self.vertices.iter().enumerate() {
            mesh.vertices_mut().write(i, &v.attributes(local));
        }
        mesh.indices_mut()
            .copy_from_slice(&self.mode.mesh_indices(vertex_count));
        mesh.attributes_mut().fill(0);

        let mut mesh = if layout.normal {
            mesh
        } else {
            device.clone_mesh(&mesh, layout.with_normal())?
        };
        compute_normals(&mut mesh)?;
        debug!("built lit mesh: {vertex_count} vertices, {faces} faces");
        Ok(Some(Geometry::Mesh {
            mode: self.mode,
            mesh,
        }))
    }

    /// Binds the texture to stage 0, or clears the stage. A texture that fails
    /// to load is skipped and the primitive draws untextured.
    fn bind_texture(&self, device: &mut dyn Device) -> Result<(), RenderError> {
        let Some(texture) = &self.texture else {
            device.set_texture(0, None)?;
            return Ok(());
        };
        match texture.sampling_resource(device) {
            Ok(resource) => device.set_texture(0, Some(&resource))?,
            Err(err) => {
                warn!("Unable to set a texture: {err}");
                device.set_texture(0, None)?;
            }
        }
        Ok(())
    }
}
