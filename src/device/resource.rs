//! Device-side resources: vertex layouts, vertex and index storage, textures
//! and image surfaces.
//!
//! Vertex data is stored the way a device consumes it: a packed array of
//! 32-bit words, one vertex after another, with the attributes of the
//! [`VertexLayout`] in a fixed order (position, rhw, normal, diffuse, uv).

use std::path::PathBuf;

use parking_lot::{RwLock, RwLockReadGuard};

use crate::colors::WHITE;
use crate::error::{DeviceError, DeviceResult, StatusCode};
use crate::material::Material;
use crate::math::{Vec2, Vec3};

/// Which attributes each vertex of a buffer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct VertexLayout {
    /// Position is already in screen space and is followed by a reciprocal w.
    pub transformed: bool,
    pub normal: bool,
    pub diffuse: bool,
    pub tex_coords: bool,
}

impl VertexLayout {
    pub const fn new(transformed: bool, diffuse: bool, tex_coords: bool) -> Self {
        Self {
            transformed,
            normal: false,
            diffuse,
            tex_coords,
        }
    }

    pub const fn with_normal(self) -> Self {
        Self {
            normal: true,
            ..self
        }
    }

    /// Size of one vertex in bytes.
    pub const fn stride(&self) -> usize {
        self.words() * 4
    }

    /// Size of one vertex in 32-bit words.
    pub const fn words(&self) -> usize {
        3 + self.transformed as usize
            + 3 * self.normal as usize
            + self.diffuse as usize
            + 2 * self.tex_coords as usize
    }

    const fn rhw_offset(&self) -> usize {
        3
    }

    const fn normal_offset(&self) -> usize {
        3 + self.transformed as usize
    }

    const fn diffuse_offset(&self) -> usize {
        self.normal_offset() + 3 * self.normal as usize
    }

    const fn tex_offset(&self) -> usize {
        self.diffuse_offset() + self.diffuse as usize
    }
}

/// Every attribute a vertex may carry. Fields outside a buffer's layout are
/// ignored on write and take their defaults on read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttributes {
    pub position: Vec3,
    pub rhw: f32,
    pub normal: Vec3,
    pub diffuse: u32,
    pub uv: Vec2,
}

impl Default for VertexAttributes {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rhw: 1.0,
            normal: Vec3::ZERO,
            diffuse: WHITE,
            uv: Vec2::ZERO,
        }
    }
}

/// Packed vertex storage shared by vertex buffers and meshes.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexStream {
    layout: VertexLayout,
    count: usize,
    words: Vec<u32>,
}

impl VertexStream {
    pub fn new(layout: VertexLayout, count: usize) -> Self {
        Self {
            layout,
            count,
            words: vec![0; layout.words() * count],
        }
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Raw vertex bytes in device order.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    fn slot(&self, index: usize) -> &[u32] {
        let stride = self.layout.words();
        &self.words[index * stride..(index + 1) * stride]
    }

    fn slot_mut(&mut self, index: usize) -> &mut [u32] {
        let stride = self.layout.words();
        &mut self.words[index * stride..(index + 1) * stride]
    }

    /// Reads vertex `index`. Panics if out of range, like slice indexing.
    pub fn read(&self, index: usize) -> VertexAttributes {
        let layout = self.layout;
        let slot = self.slot(index);
        let floats: &[f32] = bytemuck::cast_slice(slot);
        let mut v = VertexAttributes {
            position: Vec3::new(floats[0], floats[1], floats[2]),
            ..VertexAttributes::default()
        };
        if layout.transformed {
            v.rhw = floats[layout.rhw_offset()];
        }
        if layout.normal {
            let n = layout.normal_offset();
            v.normal = Vec3::new(floats[n], floats[n + 1], floats[n + 2]);
        }
        if layout.diffuse {
            v.diffuse = slot[layout.diffuse_offset()];
        }
        if layout.tex_coords {
            let t = layout.tex_offset();
            v.uv = Vec2::new(floats[t], floats[t + 1]);
        }
        v
    }

    /// Writes the attributes of `v` that the layout carries into vertex `index`.
    pub fn write(&mut self, index: usize, v: &VertexAttributes) {
        let layout = self.layout;
        let slot = self.slot_mut(index);
        if layout.diffuse {
            slot[layout.diffuse_offset()] = v.diffuse;
        }
        let floats: &mut [f32] = bytemuck::cast_slice_mut(slot);
        floats[..3].copy_from_slice(&[v.position.x, v.position.y, v.position.z]);
        if layout.transformed {
            floats[layout.rhw_offset()] = v.rhw;
        }
        if layout.normal {
            let n = layout.normal_offset();
            floats[n..n + 3].copy_from_slice(&[v.normal.x, v.normal.y, v.normal.z]);
        }
        if layout.tex_coords {
            let t = layout.tex_offset();
            floats[t..t + 2].copy_from_slice(&[v.uv.x, v.uv.y]);
        }
    }

    /// Copies every vertex into a stream with a different layout.
    pub fn convert(&self, layout: VertexLayout) -> VertexStream {
        let mut out = VertexStream::new(layout, self.count);
        for i in 0..self.count {
            out.write(i, &self.read(i));
        }
        out
    }
}

/// A device vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    stream: VertexStream,
}

impl VertexBuffer {
    pub fn new(layout: VertexLayout, vertex_count: usize) -> Self {
        Self {
            stream: VertexStream::new(layout, vertex_count),
        }
    }

    pub fn layout(&self) -> VertexLayout {
        self.stream.layout()
    }

    pub fn vertex_count(&self) -> usize {
        self.stream.len()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.stream.as_bytes().len()
    }

    pub fn vertices(&self) -> &VertexStream {
        &self.stream
    }

    pub fn vertices_mut(&mut self) -> &mut VertexStream {
        &mut self.stream
    }
}

/// Indexed triangle geometry with 16-bit indices and a subset id per face.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBuffer {
    vertices: VertexStream,
    indices: Vec<u16>,
    attributes: Vec<u32>,
}

impl MeshBuffer {
    pub fn new(face_count: usize, vertex_count: usize, layout: VertexLayout) -> Self {
        Self {
            vertices: VertexStream::new(layout, vertex_count),
            indices: vec![0; face_count * 3],
            attributes: vec![0; face_count],
        }
    }

    pub fn layout(&self) -> VertexLayout {
        self.vertices.layout()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn vertices(&self) -> &VertexStream {
        &self.vertices
    }

    pub fn vertices_mut(&mut self) -> &mut VertexStream {
        &mut self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn indices_mut(&mut self) -> &mut [u16] {
        &mut self.indices
    }

    pub fn attributes(&self) -> &[u32] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut [u32] {
        &mut self.attributes
    }

    /// Number of subsets, one past the largest face attribute.
    pub fn subset_count(&self) -> u32 {
        self.attributes.iter().max().map_or(0, |max| max + 1)
    }

    /// Index triples of the faces that belong to `subset`.
    pub fn subset_faces(&self, subset: u32) -> impl Iterator<Item = [u16; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .zip(&self.attributes)
            .filter(move |(_, id)| **id == subset)
            .map(|(face, _)| [face[0], face[1], face[2]])
    }

    /// Copy of this mesh with its vertices converted to `layout`.
    pub fn clone_with_layout(&self, layout: VertexLayout) -> MeshBuffer {
        MeshBuffer {
            vertices: self.vertices.convert(layout),
            indices: self.indices.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Replaces every vertex normal with the normalized sum of the face normals
/// around it. Face normals are not normalized before summing, so larger faces
/// weigh more.
pub fn compute_normals(mesh: &mut MeshBuffer) -> DeviceResult<()> {
    if !mesh.layout().normal {
        return Err(DeviceError::new("compute_normals", StatusCode::INVALID_CALL));
    }

    let count = mesh.vertex_count();
    let mut sums = vec![Vec3::ZERO; count];
    for face in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [face[0] as usize, face[1] as usize, face[2] as usize];
        if a >= count || b >= count || c >= count {
            return Err(DeviceError::new("compute_normals", StatusCode::INVALID_DATA));
        }
        let p0 = mesh.vertices.read(a).position;
        let p1 = mesh.vertices.read(b).position;
        let p2 = mesh.vertices.read(c).position;
        let normal = (p1 - p0).cross(p2 - p0);
        sums[a] += normal;
        sums[b] += normal;
        sums[c] += normal;
    }

    for (i, sum) in sums.into_iter().enumerate() {
        let mut v = mesh.vertices.read(i);
        v.normal = sum.normalize();
        mesh.vertices.write(i, &v);
    }
    Ok(())
}

/// Largest width or height a texture, surface or back buffer may have.
pub const MAX_SURFACE_DIMENSION: u32 = 16_384;

/// Allocates a `width` x `height` pixel buffer filled with `value`.
///
/// Sizes past [`MAX_SURFACE_DIMENSION`] and allocations the system refuses
/// fail with OUT_OF_MEMORY instead of aborting.
pub fn pixel_buffer<T: Copy>(
    op: &'static str,
    width: u32,
    height: u32,
    value: T,
) -> DeviceResult<Vec<T>> {
    if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
        return Err(DeviceError::new(op, StatusCode::OUT_OF_MEMORY));
    }
    let len = width as usize * height as usize;
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| DeviceError::new(op, StatusCode::OUT_OF_MEMORY))?;
    pixels.resize(len, value);
    Ok(pixels)
}

/// A sampling texture in ARGB8888.
#[derive(Debug, PartialEq)]
pub struct GpuTexture {
    width: u32,
    height: u32,
    texels: Vec<u32>,
}

impl GpuTexture {
    pub fn new(width: u32, height: u32, texels: Vec<u32>) -> DeviceResult<Self> {
        const OP: &str = "create_texture";
        if width > MAX_SURFACE_DIMENSION || height > MAX_SURFACE_DIMENSION {
            return Err(DeviceError::new(OP, StatusCode::OUT_OF_MEMORY));
        }
        if width == 0 || height == 0 || texels.len() != width as usize * height as usize {
            return Err(DeviceError::new(OP, StatusCode::INVALID_DATA));
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sample the texture at UV coordinates using nearest-neighbor filtering.
    ///
    /// (0, 0) is the top-left texel. UVs outside [0, 1) wrap.
    #[inline]
    pub fn sample(&self, u: f32, v: f32) -> u32 {
        // rem_euclid keeps negative coordinates wrapping the right way
        let u = u.rem_euclid(1.0);
        let v = v.rem_euclid(1.0);

        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);

        self.texels[(y * self.width + x) as usize]
    }
}

/// A plain CPU-visible image that can be copied onto the back buffer.
#[derive(Debug)]
pub struct ImageSurface {
    width: u32,
    height: u32,
    pixels: RwLock<Vec<u32>>,
}

impl ImageSurface {
    pub fn new(width: u32, height: u32) -> DeviceResult<Self> {
        const OP: &str = "create_image_surface";
        if width == 0 || height == 0 {
            return Err(DeviceError::new(OP, StatusCode::INVALID_ARG));
        }
        Ok(Self {
            width,
            height,
            pixels: RwLock::new(pixel_buffer(OP, width, height, 0)?),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> RwLockReadGuard<'_, Vec<u32>> {
        self.pixels.read()
    }

    /// Replaces the surface contents; `pixels` must match the surface size.
    pub fn fill(&self, pixels: Vec<u32>) -> DeviceResult<()> {
        if pixels.len() != self.width as usize * self.height as usize {
            return Err(DeviceError::new("fill_surface", StatusCode::INVALID_ARG));
        }
        *self.pixels.write() = pixels;
        Ok(())
    }
}

/// Material and texture file of one mesh subset, as read from a scene file.
#[derive(Debug, Clone, PartialEq)]
pub struct SubsetMaterial {
    pub material: Material,
    pub texture: Option<PathBuf>,
}

/// Geometry and per-subset materials loaded from a scene file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedMesh {
    pub mesh: MeshBuffer,
    pub subsets: Vec<SubsetMaterial>,
}
