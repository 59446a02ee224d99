//! Recording device double shared by the integration tests.
//!
//! Every device call is appended to a [`DeviceLog`] that the test keeps a
//! handle to. Failures can be injected per operation, and weak references to
//! every texture and surface created let tests check when they are released.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use env3d::colors::WHITE;
use env3d::device::{
    Device, DeviceFactory, DeviceKind, GpuTexture, ImageSurface, LoadedMesh, MeshBuffer,
    PrimitiveType, RenderState, SubsetMaterial, SurfaceHandle, TransformKind, VertexAttributes,
    VertexBuffer, VertexLayout,
};
use env3d::error::{DeviceError, DeviceResult, StatusCode};
use env3d::light::LightParams;
use env3d::math::Vec3;
use env3d::{ColorValue, Material};
use parking_lot::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateDevice(DeviceKind),
    Clear(u32),
    BeginScene,
    EndScene,
    Present,
    RenderState(RenderState),
    SetTransform(TransformKind),
    SetLight(u32),
    LightEnable(u32, bool),
    SetMaterial(Material),
    SetTexture(bool),
    CreateVertexBuffer {
        layout: VertexLayout,
        count: usize,
    },
    DrawPrimitive {
        primitive: PrimitiveType,
        start: u32,
        count: u32,
    },
    CreateMesh {
        faces: usize,
        vertices: usize,
        layout: VertexLayout,
    },
    CloneMesh(VertexLayout),
    DrawSubset(u32),
    LoadMesh(PathBuf),
    CreateTexture(PathBuf),
    CreateSurface(u32, u32),
    LoadSurface(PathBuf),
    StretchToBackBuffer,
}

impl Call {
    pub fn is_draw(&self) -> bool {
        matches!(self, Call::DrawPrimitive { .. } | Call::DrawSubset(_))
    }

    pub fn is_build(&self) -> bool {
        matches!(
            self,
            Call::CreateVertexBuffer { .. } | Call::CreateMesh { .. } | Call::CloneMesh(_)
        )
    }
}

/// State shared between a test and the devices it created.
#[derive(Default)]
pub struct DeviceLog {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<&'static str, StatusCode>>,
    unavailable: Mutex<Vec<DeviceKind>>,
    textures: Mutex<Vec<Weak<GpuTexture>>>,
    surfaces: Mutex<Vec<Weak<ImageSurface>>>,
    drawn_meshes: Mutex<Vec<MeshBuffer>>,
    drawn_buffers: Mutex<Vec<VertexBuffer>>,
}

impl DeviceLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls recorded since the last take.
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.calls.lock())
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    /// Makes every later call to `op` fail with `status`.
    pub fn fail_on(&self, op: &'static str, status: StatusCode) {
        self.failures.lock().insert(op, status);
    }

    pub fn clear_failures(&self) {
        self.failures.lock().clear();
    }

    /// Refuses to create devices of `kind`.
    pub fn make_unavailable(&self, kind: DeviceKind) {
        self.unavailable.lock().push(kind);
    }

    pub fn make_all_available(&self) {
        self.unavailable.lock().clear();
    }

    pub fn live_textures(&self) -> usize {
        self.textures.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn live_surfaces(&self) -> usize {
        self.surfaces.lock().iter().filter(|w| w.strong_count() > 0).count()
    }

    pub fn created_surfaces(&self) -> usize {
        self.surfaces.lock().len()
    }

    /// Copies of every mesh passed to `draw_subset`, in call order.
    pub fn drawn_meshes(&self) -> Vec<MeshBuffer> {
        self.drawn_meshes.lock().clone()
    }

    /// Copies of every buffer passed to `draw_primitive`, in call order.
    pub fn drawn_buffers(&self) -> Vec<VertexBuffer> {
        self.drawn_buffers.lock().clone()
    }
}

pub struct RecordingDevice {
    log: Arc<DeviceLog>,
}

impl RecordingDevice {
    pub fn new(log: Arc<DeviceLog>) -> Self {
        Self { log }
    }

    fn record(&self, op: &'static str, call: Call) -> DeviceResult<()> {
        self.log.calls.lock().push(call);
        match self.log.failures.lock().get(op) {
            Some(&status) => Err(DeviceError::new(op, status)),
            None => Ok(()),
        }
    }
}

fn is_missing(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("missing"))
}

/// Two-face quad split into two subsets. The first subset is textured, the
/// second names a texture file that does not exist.
pub fn quad_fixture() -> LoadedMesh {
    let mut mesh = MeshBuffer::new(2, 4, VertexLayout::new(false, false, true).with_normal());
    for (i, (x, y)) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
        .into_iter()
        .enumerate()
    {
        mesh.vertices_mut().write(
            i,
            &VertexAttributes {
                position: Vec3::new(x, y, 0.0),
                normal: Vec3::new(0.0, 0.0, -1.0),
                ..VertexAttributes::default()
            },
        );
    }
    mesh.indices_mut().copy_from_slice(&[0, 1, 2, 2, 1, 3]);
    mesh.attributes_mut().copy_from_slice(&[0, 1]);

    let red = Material {
        diffuse: ColorValue::new(1.0, 0.0, 0.0, 1.0),
        ambient: ColorValue::BLACK,
        ..Material::default()
    };
    let blue = Material {
        diffuse: ColorValue::new(0.0, 0.0, 1.0, 1.0),
        ambient: ColorValue::BLACK,
        ..Material::default()
    };
    LoadedMesh {
        mesh,
        subsets: vec![
            SubsetMaterial {
                material: red,
                texture: Some(PathBuf::from("brick.png")),
            },
            SubsetMaterial {
                material: blue,
                texture: Some(PathBuf::from("missing.png")),
            },
        ],
    }
}

impl Device for RecordingDevice {
    fn clear(&mut self, color: u32, _depth: f32) -> DeviceResult<()> {
        self.record("clear", Call::Clear(color))
    }

    fn begin_scene(&mut self) -> DeviceResult<()> {
        self.record("begin_scene", Call::BeginScene)
    }

    fn end_scene(&mut self) -> DeviceResult<()> {
        self.record("end_scene", Call::EndScene)
    }

    fn present(&mut self) -> DeviceResult<()> {
        self.record("present", Call::Present)
    }

    fn set_render_state(&mut self, state: RenderState) -> DeviceResult<()> {
        self.record("set_render_state", Call::RenderState(state))
    }

    fn set_transform(&mut self, kind: TransformKind, _matrix: &env3d::math::Mat4) -> DeviceResult<()> {
        self.record("set_transform", Call::SetTransform(kind))
    }

    fn set_light(&mut self, slot: u32, _light: &LightParams) -> DeviceResult<()> {
        self.record("set_light", Call::SetLight(slot))
    }

    fn light_enable(&mut self, slot: u32, enable: bool) -> DeviceResult<()> {
        self.record("light_enable", Call::LightEnable(slot, enable))
    }

    fn set_material(&mut self, material: &Material) -> DeviceResult<()> {
        self.record("set_material", Call::SetMaterial(*material))
    }

    fn set_texture(&mut self, _stage: u32, texture: Option<&Arc<GpuTexture>>) -> DeviceResult<()> {
        self.record("set_texture", Call::SetTexture(texture.is_some()))
    }

    fn create_vertex_buffer(
        &mut self,
        layout: VertexLayout,
        vertex_count: usize,
    ) -> DeviceResult<VertexBuffer> {
        self.record(
            "create_vertex_buffer",
            Call::CreateVertexBuffer {
                layout,
                count: vertex_count,
            },
        )?;
        Ok(VertexBuffer::new(layout, vertex_count))
    }

    fn draw_primitive(
        &mut self,
        buffer: &VertexBuffer,
        primitive: PrimitiveType,
        start_vertex: u32,
        primitive_count: u32,
    ) -> DeviceResult<()> {
        self.log.drawn_buffers.lock().push(buffer.clone());
        self.record(
            "draw_primitive",
            Call::DrawPrimitive {
                primitive,
                start: start_vertex,
                count: primitive_count,
            },
        )
    }

    fn create_mesh(
        &mut self,
        face_count: usize,
        vertex_count: usize,
        layout: VertexLayout,
    ) -> DeviceResult<MeshBuffer> {
        self.record(
            "create_mesh",
            Call::CreateMesh {
                faces: face_count,
                vertices: vertex_count,
                layout,
            },
        )?;
        Ok(MeshBuffer::new(face_count, vertex_count, layout))
    }

    fn clone_mesh(&mut self, mesh: &MeshBuffer, layout: VertexLayout) -> DeviceResult<MeshBuffer> {
        self.record("clone_mesh", Call::CloneMesh(layout))?;
        Ok(mesh.clone_with_layout(layout))
    }

    fn draw_subset(&mut self, mesh: &MeshBuffer, subset: u32) -> DeviceResult<()> {
        self.log.drawn_meshes.lock().push(mesh.clone());
        self.record("draw_subset", Call::DrawSubset(subset))
    }

    fn load_mesh(&mut self, path: &Path) -> DeviceResult<LoadedMesh> {
        self.record("load_mesh", Call::LoadMesh(path.to_path_buf()))?;
        if is_missing(path) {
            return Err(DeviceError::new("load_mesh", StatusCode::NOT_FOUND));
        }
        Ok(quad_fixture())
    }

    fn create_texture_from_file(&mut self, path: &Path) -> DeviceResult<Arc<GpuTexture>> {
        self.record("create_texture_from_file", Call::CreateTexture(path.to_path_buf()))?;
        if is_missing(path) {
            return Err(DeviceError::new("create_texture_from_file", StatusCode::NOT_FOUND));
        }
        let texture = Arc::new(GpuTexture::new(2, 2, vec![WHITE; 4])?);
        self.log.textures.lock().push(Arc::downgrade(&texture));
        Ok(texture)
    }

    fn create_image_surface(
        &mut self,
        width: u32,
        height: u32,
    ) -> DeviceResult<Arc<ImageSurface>> {
        self.record("create_image_surface", Call::CreateSurface(width, height))?;
        let surface = Arc::new(ImageSurface::new(width, height)?);
        self.log.surfaces.lock().push(Arc::downgrade(&surface));
        Ok(surface)
    }

    fn load_surface_from_file(&mut self, _surface: &ImageSurface, path: &Path) -> DeviceResult<()> {
        self.record("load_surface_from_file", Call::LoadSurface(path.to_path_buf()))?;
        if is_missing(path) {
            return Err(DeviceError::new("load_surface_from_file", StatusCode::INVALID_DATA));
        }
        Ok(())
    }

    fn stretch_to_back_buffer(&mut self, _surface: &ImageSurface) -> DeviceResult<()> {
        self.record("stretch_to_back_buffer", Call::StretchToBackBuffer)
    }
}

/// Factory handing out [`RecordingDevice`]s that share one log.
pub struct RecordingFactory {
    log: Arc<DeviceLog>,
}

impl RecordingFactory {
    pub fn new(log: &Arc<DeviceLog>) -> Self {
        Self {
            log: Arc::clone(log),
        }
    }
}

impl DeviceFactory for RecordingFactory {
    fn create_device(
        &mut self,
        _surface: SurfaceHandle,
        kind: DeviceKind,
    ) -> DeviceResult<Box<dyn Device>> {
        self.log.calls.lock().push(Call::CreateDevice(kind));
        if self.log.unavailable.lock().contains(&kind) {
            return Err(DeviceError::new("create_device", StatusCode::NOT_AVAILABLE));
        }
        Ok(Box::new(RecordingDevice::new(Arc::clone(&self.log))))
    }
}

pub fn surface() -> SurfaceHandle {
    SurfaceHandle::from_raw(0x1000).expect("non-null handle")
}

/// A device recording into `log`, for driving primitives and meshes directly.
pub fn device(log: &Arc<DeviceLog>) -> RecordingDevice {
    RecordingDevice::new(Arc::clone(log))
}
