//! The scene container and its per-frame render pass.
//!
//! A [`Scene`] owns the device for one display surface, the ordered lists of
//! primitives, lights and meshes, the pipeline matrices and the global render
//! switches. Any number of threads may edit it while one thread drives
//! [`Scene::render`] once per displayed frame.
//!
//! Two locks are involved. The frame lock owns the device and is held for the
//! whole render pass. The state lock guards everything else and is only held
//! long enough to copy what a pass needs, so edits never wait for a frame to
//! finish. When both are needed the frame lock is taken first.

use std::sync::Arc;

use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::colors::opaque;
use crate::device::{
    Device, DeviceFactory, DeviceKind, RenderState, SurfaceHandle, TransformKind,
};
use crate::error::{DeviceResult, RenderError, StatusCode};
use crate::light::Light;
use crate::math::{Mat4, Vec3};
use crate::mesh::Mesh;
use crate::primitive::{Primitive, RenderContext};
use crate::projection::Projection;
use crate::texture::Texture;

/// Structural change reported to scene listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneEvent {
    PrimitiveAdded,
    PrimitiveRemoved,
    LightAdded,
    LightRemoved,
    MeshAdded,
    MeshRemoved,
}

pub type SceneListener = Arc<dyn Fn(&SceneEvent) + Send + Sync>;

struct FrameSlot {
    factory: Box<dyn DeviceFactory>,
    device: Option<Box<dyn Device>>,
    /// Light slots configured by the previous pass.
    lit_slots: u32,
    disposed: bool,
}

struct SceneState {
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    lighting: bool,
    transform: bool,
    ambient: u32,
    background_color: u32,
    background: Option<Arc<Texture>>,
    primitives: Vec<Arc<Primitive>>,
    lights: Vec<Arc<Light>>,
    meshes: Vec<Arc<Mesh>>,
    init_failure: Option<StatusCode>,
    last_status: StatusCode,
    back_buffer_size: (u32, u32),
}

/// Everything one render pass reads from the scene state.
struct FrameSnapshot {
    world: Mat4,
    view: Mat4,
    projection: Mat4,
    context: RenderContext,
    ambient: u32,
    background_color: u32,
    background: Option<Arc<Texture>>,
    primitives: Vec<Arc<Primitive>>,
    lights: Vec<Arc<Light>>,
    meshes: Vec<Arc<Mesh>>,
}

impl FrameSnapshot {
    fn capture(state: &SceneState) -> Self {
        Self {
            world: state.world,
            view: state.view,
            projection: state.projection,
            context: RenderContext {
                transform: state.transform,
                lighting: state.lighting,
            },
            ambient: state.ambient,
            background_color: state.background_color,
            background: state.background.clone(),
            primitives: state.primitives.clone(),
            lights: state.lights.clone(),
            meshes: state.meshes.clone(),
        }
    }
}

/// A renderable scene bound to at most one device.
pub struct Scene {
    frame: Mutex<FrameSlot>,
    state: Mutex<SceneState>,
    listeners: RwLock<Vec<SceneListener>>,
}

/// Name the scene goes by at the embedding boundary.
pub type Environment3D = Scene;

impl Scene {
    /// Creates an unbound scene. No device exists until
    /// [`bind_surface`](Self::bind_surface) is called.
    pub fn new(factory: impl DeviceFactory + 'static) -> Self {
        Self {
            frame: Mutex::new(FrameSlot {
                factory: Box::new(factory),
                device: None,
                lit_slots: 0,
                disposed: false,
            }),
            state: Mutex::new(SceneState {
                world: Mat4::IDENTITY,
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
                lighting: false,
                transform: false,
                ambient: 0,
                background_color: 0,
                background: None,
                primitives: Vec::new(),
                lights: Vec::new(),
                meshes: Vec::new(),
                init_failure: None,
                last_status: StatusCode::OK,
                back_buffer_size: (0, 0),
            }),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Creates the device for `surface`, trying hardware vertex processing,
    /// then software vertex processing, then the reference rasterizer.
    ///
    /// Once a device exists further calls do nothing. If every kind fails the
    /// scene stays inert until the next bind attempt.
    pub fn bind_surface(&self, surface: SurfaceHandle) -> Result<(), RenderError> {
        let mut frame = self.frame.lock();
        if frame.disposed {
            return Err(RenderError::Disposed);
        }
        if frame.device.is_some() {
            debug!("scene already bound, ignoring surface {:#x}", surface.raw());
            return Ok(());
        }

        let (lighting, ambient) = {
            let state = self.state.lock();
            (state.lighting, state.ambient)
        };

        let mut status = StatusCode::FAIL;
        for kind in DeviceKind::FALLBACK_ORDER {
            match frame.factory.create_device(surface, kind) {
                Ok(mut device) => {
                    info!("created {kind:?} device for surface {:#x}", surface.raw());
                    let configured = configure_device(device.as_mut(), lighting, ambient);
                    frame.device = Some(device);
                    drop(frame);
                    let status = configured
                        .as_ref()
                        .err()
                        .map_or(StatusCode::OK, |err| err.status);
                    let mut state = self.state.lock();
                    state.init_failure = None;
                    state.last_status = status;
                    return configured.map_err(RenderError::from);
                }
                Err(err) => {
                    debug!("{kind:?} device unavailable: {err}");
                    status = err.status;
                }
            }
        }

        error!("no device could be created for surface {:#x} ({status})", surface.raw());
        let mut state = self.state.lock();
        state.init_failure = Some(status);
        state.last_status = status;
        Err(RenderError::InitFailed(status))
    }

    pub fn is_bound(&self) -> bool {
        self.frame.lock().device.is_some()
    }

    /// Draws one frame.
    ///
    /// The pass clears the target, paints the background, configures the
    /// pipeline and lights, then draws primitives and meshes in insertion
    /// order. The first item that fails ends the pass, but the frame drawn so
    /// far is still presented. Rendering an unbound scene does nothing.
    pub fn render(&self) -> Result<(), RenderError> {
        let mut frame = self.frame.lock();
        if frame.disposed {
            return Err(RenderError::Disposed);
        }
        let snapshot = {
            let state = self.state.lock();
            if let Some(status) = state.init_failure {
                return Err(RenderError::InitFailed(status));
            }
            FrameSnapshot::capture(&state)
        };

        let FrameSlot {
            device, lit_slots, ..
        } = &mut *frame;
        let Some(device) = device.as_deref_mut() else {
            return Ok(());
        };

        let mut status = StatusCode::OK;
        let result = draw_frame(device, lit_slots, &snapshot, &mut status);
        drop(frame);

        let result = result.map_err(|err| {
            let status = err.status();
            error!("frame failed: {err} ({status})");
            RenderError::Frame {
                status,
                source: Box::new(err),
            }
        });
        if let Err(err) = &result {
            status = err.status();
        }
        self.state.lock().last_status = status;
        result
    }

    /// Releases the device and the background texture. Every later render
    /// or bind fails with [`RenderError::Disposed`].
    pub fn dispose(&self) {
        let mut frame = self.frame.lock();
        frame.device = None;
        frame.lit_slots = 0;
        frame.disposed = true;
        drop(frame);

        let mut state = self.state.lock();
        state.background = None;
        for light in &state.lights {
            light.clear_slot();
        }
        debug!("scene disposed");
    }

    /// Appends a primitive. Primitives are drawn in insertion order and the
    /// same primitive may be added more than once.
    pub fn add_primitive(&self, primitive: Arc<Primitive>) {
        self.state.lock().primitives.push(primitive);
        self.notify(SceneEvent::PrimitiveAdded);
    }

    /// Removes the first occurrence of `primitive`. Returns whether it was
    /// registered.
    pub fn remove_primitive(&self, primitive: &Arc<Primitive>) -> bool {
        let removed = remove_first(&mut self.state.lock().primitives, primitive).is_some();
        if removed {
            self.notify(SceneEvent::PrimitiveRemoved);
        }
        removed
    }

    pub fn primitive_count(&self) -> usize {
        self.state.lock().primitives.len()
    }

    /// Appends a light. Lights take device slots by their position in the
    /// list, so removing one shifts every later light down a slot.
    pub fn add_light(&self, light: Arc<Light>) {
        self.state.lock().lights.push(light);
        self.notify(SceneEvent::LightAdded);
    }

    /// Removes the first occurrence of `light`, switching off the device slot
    /// it held.
    pub fn remove_light(&self, light: &Arc<Light>) -> bool {
        let Some(removed) = remove_first(&mut self.state.lock().lights, light) else {
            return false;
        };
        if let Some(slot) = removed.current_slot() {
            self.push_to_device(|device| device.light_enable(slot, false));
        }
        removed.clear_slot();
        self.notify(SceneEvent::LightRemoved);
        true
    }

    pub fn light_count(&self) -> usize {
        self.state.lock().lights.len()
    }

    pub fn add_mesh(&self, mesh: Arc<Mesh>) {
        self.state.lock().meshes.push(mesh);
        self.notify(SceneEvent::MeshAdded);
    }

    pub fn remove_mesh(&self, mesh: &Arc<Mesh>) -> bool {
        let removed = remove_first(&mut self.state.lock().meshes, mesh).is_some();
        if removed {
            self.notify(SceneEvent::MeshRemoved);
        }
        removed
    }

    pub fn mesh_count(&self) -> usize {
        self.state.lock().meshes.len()
    }

    pub fn world(&self) -> Mat4 {
        self.state.lock().world
    }

    pub fn set_world(&self, world: Mat4) {
        self.state.lock().world = world;
    }

    pub fn view(&self) -> Mat4 {
        self.state.lock().view
    }

    pub fn set_view_matrix(&self, view: Mat4) {
        self.state.lock().view = view;
    }

    /// Points the camera from `eye` at `look_at` with +Y up.
    pub fn set_view(&self, eye: Vec3, look_at: Vec3) {
        self.set_view_matrix(Mat4::look_at_lh(eye, look_at, Vec3::UP));
    }

    pub fn projection(&self) -> Mat4 {
        self.state.lock().projection
    }

    pub fn set_projection_matrix(&self, projection: Mat4) {
        self.state.lock().projection = projection;
    }

    pub fn set_projection(&self, projection: &Projection) {
        self.set_projection_matrix(projection.matrix());
    }

    pub fn ambient_light(&self) -> u32 {
        self.state.lock().ambient
    }

    /// Sets the global ambient light (packed RGB) and pushes it to the device.
    pub fn set_ambient_light(&self, rgb: u32) {
        self.state.lock().ambient = rgb;
        self.push_to_device(|device| device.set_render_state(RenderState::Ambient(opaque(rgb))));
    }

    pub fn is_lighting_enabled(&self) -> bool {
        self.state.lock().lighting
    }

    /// Switches fixed-function lighting and re-pushes the lighting state to
    /// the device.
    pub fn set_lighting_enabled(&self, enabled: bool) {
        let ambient = {
            let mut state = self.state.lock();
            state.lighting = enabled;
            state.ambient
        };
        self.push_to_device(|device| apply_lighting(device, enabled, ambient));
    }

    pub fn is_transform_enabled(&self) -> bool {
        self.state.lock().transform
    }

    /// Switches the world/view/projection pipeline. With it off, vertices are
    /// taken as screen-space positions.
    pub fn set_transform_enabled(&self, enabled: bool) {
        self.state.lock().transform = enabled;
    }

    pub fn background_color(&self) -> u32 {
        self.state.lock().background_color
    }

    pub fn set_background_color(&self, rgb: u32) {
        self.state.lock().background_color = rgb;
    }

    pub fn background_texture(&self) -> Option<Arc<Texture>> {
        self.state.lock().background.clone()
    }

    /// Stretches `texture` over the back buffer before each frame. The scene
    /// keeps its own copy; the previous background is released.
    pub fn set_background_texture(&self, texture: &Texture) {
        self.state.lock().background = Some(Arc::new(texture.clone()));
    }

    pub fn clear_background_texture(&self) {
        self.state.lock().background = None;
    }

    /// Records the new surface size. The back buffer itself is not resized.
    pub fn update_back_buffer_size(&self, width: u32, height: u32) {
        self.state.lock().back_buffer_size = (width, height);
    }

    pub fn back_buffer_size(&self) -> (u32, u32) {
        self.state.lock().back_buffer_size
    }

    /// Status of the most recent bind, render or device push.
    pub fn last_status(&self) -> StatusCode {
        self.state.lock().last_status
    }

    /// Registers a callback for structural changes. Callbacks run on the
    /// thread that made the change, with no scene lock held.
    pub fn add_listener(&self, listener: impl Fn(&SceneEvent) + Send + Sync + 'static) {
        self.listeners.write().push(Arc::new(listener));
    }

    fn notify(&self, event: SceneEvent) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(&event);
        }
    }

    fn push_to_device(&self, push: impl FnOnce(&mut dyn Device) -> DeviceResult<()>) {
        let mut frame = self.frame.lock();
        let Some(device) = frame.device.as_deref_mut() else {
            return;
        };
        let result = push(device);
        drop(frame);
        let status = match result {
            Ok(()) => StatusCode::OK,
            Err(err) => {
                warn!("device state update failed: {err}");
                err.status
            }
        };
        self.state.lock().last_status = status;
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scene")
            .field("lighting", &state.lighting)
            .field("transform", &state.transform)
            .field("primitives", &state.primitives.len())
            .field("lights", &state.lights.len())
            .field("meshes", &state.meshes.len())
            .field("last_status", &state.last_status)
            .finish_non_exhaustive()
    }
}

fn remove_first<T>(items: &mut Vec<Arc<T>>, item: &Arc<T>) -> Option<Arc<T>> {
    let index = items.iter().position(|candidate| Arc::ptr_eq(candidate, item))?;
    Some(items.remove(index))
}

fn apply_lighting(device: &mut dyn Device, lighting: bool, ambient: u32) -> DeviceResult<()> {
    device.set_render_state(RenderState::Lighting(lighting))?;
    device.set_render_state(RenderState::SpecularEnable(lighting))?;
    device.set_render_state(RenderState::Ambient(opaque(ambient)))
}

fn configure_device(device: &mut dyn Device, lighting: bool, ambient: u32) -> DeviceResult<()> {
    apply_lighting(device, lighting, ambient)?;
    device.set_render_state(RenderState::ZEnable(true))
}

/// Runs one render pass. `status` picks up failures that do not stop the
/// pass, such as a background that cannot be painted.
fn draw_frame(
    device: &mut dyn Device,
    lit_slots: &mut u32,
    snapshot: &FrameSnapshot,
    status: &mut StatusCode,
) -> Result<(), RenderError> {
    device.clear(opaque(snapshot.background_color), 1.0)?;

    if let Some(background) = &snapshot.background {
        if let Err(err) = paint_background(device, background) {
            warn!("background not painted: {err}");
            *status = err.status();
        }
    }

    apply_lighting(device, snapshot.context.lighting, snapshot.ambient)?;
    if snapshot.context.transform {
        device.set_transform(TransformKind::World, &snapshot.world)?;
        device.set_transform(TransformKind::View, &snapshot.view)?;
        device.set_transform(TransformKind::Projection, &snapshot.projection)?;
    }
    setup_lights(device, lit_slots, &snapshot.lights, snapshot.context.lighting)?;

    device.begin_scene()?;
    let drawn = draw_items(device, snapshot);
    let ended = device.end_scene();
    let presented = device.present();
    drawn?;
    ended?;
    presented?;
    Ok(())
}

fn paint_background(device: &mut dyn Device, background: &Texture) -> Result<(), RenderError> {
    let surface = background.image_surface(device)?;
    device.stretch_to_back_buffer(&surface)?;
    Ok(())
}

/// Uploads every light to the slot matching its list position and switches
/// off slots left over from a longer list.
fn setup_lights(
    device: &mut dyn Device,
    lit_slots: &mut u32,
    lights: &[Arc<Light>],
    enabled: bool,
) -> DeviceResult<()> {
    let count = u32::try_from(lights.len()).unwrap_or(u32::MAX);
    *lit_slots = (*lit_slots).max(count);
    for (slot, light) in (0u32..).zip(lights) {
        device.set_light(slot, &light.parameters())?;
        device.light_enable(slot, enabled)?;
        light.assign_slot(slot);
    }
    for stale in count..*lit_slots {
        device.light_enable(stale, false)?;
    }
    *lit_slots = count;
    Ok(())
}

fn draw_items(device: &mut dyn Device, snapshot: &FrameSnapshot) -> Result<(), RenderError> {
    for primitive in &snapshot.primitives {
        primitive.render(device, snapshot.context)?;
    }
    for mesh in &snapshot.meshes {
        mesh.render(device)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;

    struct NoDevices;

    impl DeviceFactory for NoDevices {
        fn create_device(
            &mut self,
            _surface: SurfaceHandle,
            _kind: DeviceKind,
        ) -> DeviceResult<Box<dyn Device>> {
            Err(DeviceError::new("create_device", StatusCode::NOT_AVAILABLE))
        }
    }

    fn surface() -> SurfaceHandle {
        SurfaceHandle::from_raw(1).unwrap()
    }

    #[test]
    fn defaults() {
        let scene = Scene::new(NoDevices);
        assert_eq!(scene.world(), Mat4::IDENTITY);
        assert!(!scene.is_lighting_enabled());
        assert!(!scene.is_transform_enabled());
        assert_eq!(scene.last_status(), StatusCode::OK);
        assert!(!scene.is_bound());
    }

    #[test]
    fn unbound_render_is_a_no_op() {
        let scene = Scene::new(NoDevices);
        scene.add_primitive(Arc::new(Primitive::default()));
        assert!(scene.render().is_ok());
    }

    #[test]
    fn failed_bind_makes_render_fail_fast() {
        let scene = Scene::new(NoDevices);
        let err = scene.bind_surface(surface()).unwrap_err();
        assert!(matches!(err, RenderError::InitFailed(StatusCode::NOT_AVAILABLE)));
        assert_eq!(scene.last_status(), StatusCode::NOT_AVAILABLE);
        assert!(matches!(
            scene.render(),
            Err(RenderError::InitFailed(StatusCode::NOT_AVAILABLE))
        ));
    }

    #[test]
    fn removing_unregistered_items_is_a_no_op() {
        let scene = Scene::new(NoDevices);
        let registered = Arc::new(Primitive::default());
        scene.add_primitive(Arc::clone(&registered));
        assert!(!scene.remove_primitive(&Arc::new(Primitive::default())));
        assert!(!scene.remove_light(&Arc::new(Light::new())));
        assert!(!scene.remove_mesh(&Arc::new(Mesh::new())));
        assert!(scene.remove_primitive(&registered));
        assert!(!scene.remove_primitive(&registered));
    }

    #[test]
    fn duplicates_are_kept_and_removed_one_at_a_time() {
        let scene = Scene::new(NoDevices);
        let p = Arc::new(Primitive::default());
        scene.add_primitive(Arc::clone(&p));
        scene.add_primitive(Arc::clone(&p));
        assert_eq!(scene.primitive_count(), 2);
        scene.remove_primitive(&p);
        assert_eq!(scene.primitive_count(), 1);
    }

    #[test]
    fn listeners_see_structural_changes() {
        let scene = Scene::new(NoDevices);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scene.add_listener(move |event| sink.lock().push(*event));

        let light = Arc::new(Light::new());
        scene.add_light(Arc::clone(&light));
        scene.remove_light(&light);
        scene.add_mesh(Arc::new(Mesh::new()));

        assert_eq!(
            *seen.lock(),
            vec![
                SceneEvent::LightAdded,
                SceneEvent::LightRemoved,
                SceneEvent::MeshAdded
            ]
        );
    }

    #[test]
    fn listener_may_query_the_scene() {
        let scene = Arc::new(Scene::new(NoDevices));
        let counts = Arc::new(Mutex::new(Vec::new()));
        let (weak, sink) = (Arc::downgrade(&scene), Arc::clone(&counts));
        scene.add_listener(move |_| {
            if let Some(scene) = weak.upgrade() {
                sink.lock().push(scene.primitive_count());
            }
        });
        scene.add_primitive(Arc::new(Primitive::default()));
        assert_eq!(*counts.lock(), vec![1]);
    }

    #[test]
    fn dispose_blocks_further_use() {
        let scene = Scene::new(NoDevices);
        scene.dispose();
        assert!(matches!(scene.render(), Err(RenderError::Disposed)));
        assert!(matches!(
            scene.bind_surface(surface()),
            Err(RenderError::Disposed)
        ));
    }

    #[test]
    fn set_view_builds_look_at() {
        let scene = Scene::new(NoDevices);
        let eye = Vec3::new(0.0, 0.0, -5.0);
        scene.set_view(eye, Vec3::ZERO);
        assert_eq!(scene.view(), Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::UP));
    }
}
