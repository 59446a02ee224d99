mod window;

use env3d::prelude::*;
use log::{info, warn};
use window::{FrameLimiter, Window, WindowEvent, WINDOW_HEIGHT, WINDOW_WIDTH};

const BACKGROUND: u32 = 0x0020_2430;
const AMBIENT: u32 = 0x0030_3030;

/// Two-triangle strip facing the camera.
fn build_quad() -> Arc<Primitive> {
    let quad = Arc::new(Primitive::new(RenderMode::TriangleStrip));
    quad.add_vertex(Vertex::at(-1.0, 1.0, 0.0).with_color(0xFFE0_4040));
    quad.add_vertex(Vertex::at(1.0, 1.0, 0.0).with_color(0xFF40_E040));
    quad.add_vertex(Vertex::at(-1.0, -1.0, 0.0).with_color(0xFF40_40E0));
    quad.add_vertex(Vertex::at(1.0, -1.0, 0.0).with_color(0xFFE0_E040));
    quad.set_material(Some(Material::solid(ColorValue::WHITE)));
    quad
}

/// Perspective for a window of the given size. The frame is stretched over
/// the window, so the aspect follows the window rather than the back buffer.
fn projection(width: u32, height: u32) -> Projection {
    Projection::from_degrees(60.0, width as f32 / height as f32, 0.1, 100.0)
}

fn build_scene(factory: SoftwareDeviceFactory, surface: SurfaceHandle) -> Result<Scene, String> {
    let scene = Scene::new(factory);
    scene.bind_surface(surface).map_err(|e| e.to_string())?;

    scene.set_background_color(BACKGROUND);
    scene.set_ambient_light(AMBIENT);
    scene.set_transform_enabled(true);
    scene.set_lighting_enabled(true);
    scene.set_view(Vec3::new(0.0, 0.0, -4.0), Vec3::ZERO);
    scene.set_projection(&projection(WINDOW_WIDTH, WINDOW_HEIGHT));
    scene.add_light(Arc::new(Light::directional(
        Vec3::new(0.3, -0.4, 1.0),
        [255, 255, 255],
    )));
    scene.add_primitive(build_quad());

    if let Some(path) = std::env::args().nth(1) {
        info!("loading mesh {path}");
        scene.add_mesh(Arc::new(Mesh::from_file(path)));
    }
    Ok(scene)
}

fn main() -> Result<(), String> {
    env_logger::init();

    let mut window = Window::new("env3d", WINDOW_WIDTH, WINDOW_HEIGHT)?;
    let (width, height) = window.buffer_size();
    let factory = SoftwareDeviceFactory::new(PresentParameters::new(width, height));
    let frames = factory.present_target();
    let surface = SurfaceHandle::from_raw(u64::from(window.surface_id()))
        .ok_or_else(|| "window has no id".to_string())?;
    let scene = build_scene(factory, surface)?;

    let mut limiter = FrameLimiter::new(&window);
    let mut angle = 0.0f32;

    loop {
        match window.poll_events() {
            WindowEvent::Quit => break,
            WindowEvent::Resize(w, h) => {
                scene.update_back_buffer_size(w, h);
                scene.set_projection(&projection(w, h));
            }
            WindowEvent::None => {}
        }

        let delta = limiter.wait_and_get_delta(&window);
        angle += delta as f32 * 0.001;
        scene.set_world(Mat4::rotation_y(angle));

        if let Err(err) = scene.render() {
            warn!("{err}");
        }

        let frame = frames.lock();
        if !frame.pixels.is_empty() {
            window.present(frame.as_bytes())?;
        }
    }

    scene.dispose();
    Ok(())
}
