use std::sync::Arc;

use env3d::colors::WHITE;
use env3d::device::software::{PresentTarget, SoftwareDeviceFactory};
use env3d::device::{PresentParameters, SurfaceHandle};
use env3d::math::Vec3;
use env3d::{
    Light, Mesh, Primitive, Projection, RenderMode, Scene, StatusCode, Texture, Vertex,
};

const SIZE: u32 = 64;
const BACKGROUND: u32 = 0x0000_00FF;

fn scene() -> (Scene, PresentTarget) {
    let factory = SoftwareDeviceFactory::new(PresentParameters::new(SIZE, SIZE));
    let target = factory.present_target();
    let scene = Scene::new(factory);
    scene
        .bind_surface(SurfaceHandle::from_raw(7).unwrap())
        .unwrap();
    scene.set_background_color(BACKGROUND);
    (scene, target)
}

fn camera(scene: &Scene) {
    scene.set_transform_enabled(true);
    scene.set_view(Vec3::new(0.0, 0.0, -4.0), Vec3::ZERO);
    scene.set_projection(&Projection::from_degrees(60.0, 1.0, 0.1, 100.0));
}

fn pixel(target: &PresentTarget, x: u32, y: u32) -> u32 {
    let frame = target.lock();
    frame.pixels[(y * frame.width + x) as usize]
}

#[test]
fn software_device_binds_after_hardware_refusal() {
    let (scene, target) = scene();
    assert!(scene.is_bound());
    assert_eq!(scene.last_status(), StatusCode::OK);

    scene.render().unwrap();
    let frame = target.lock();
    assert_eq!(frame.frame_count, 1);
    assert_eq!((frame.width, frame.height), (SIZE, SIZE));
    assert!(frame.pixels.iter().all(|&p| p == 0xFF00_00FF));
}

#[test]
fn screen_space_triangle_is_filled() {
    let (scene, target) = scene();
    let triangle = Arc::new(Primitive::new(RenderMode::TriangleList));
    for (x, y) in [(4.0, 4.0), (60.0, 4.0), (4.0, 60.0)] {
        triangle.add_vertex(Vertex::at(x, y, 0.5).with_color(0xFFFF_0000));
    }
    scene.add_primitive(triangle);

    scene.render().unwrap();

    assert_eq!(pixel(&target, 10, 10), 0xFFFF_0000);
    assert_eq!(pixel(&target, 60, 60), 0xFF00_00FF);
}

#[test]
fn lit_quad_faces_the_light() {
    let (scene, target) = scene();
    camera(&scene);
    scene.set_lighting_enabled(true);
    scene.add_light(Arc::new(Light::directional(
        Vec3::new(0.0, 0.0, 1.0),
        [255, 255, 255],
    )));

    let quad = Arc::new(Primitive::new(RenderMode::TriangleStrip));
    quad.add_vertex(Vertex::at(-1.0, 1.0, 0.0));
    quad.add_vertex(Vertex::at(1.0, 1.0, 0.0));
    quad.add_vertex(Vertex::at(-1.0, -1.0, 0.0));
    quad.add_vertex(Vertex::at(1.0, -1.0, 0.0));
    quad.set_colored(false);
    scene.add_primitive(quad);

    scene.render().unwrap();

    assert_eq!(pixel(&target, 28, 28), WHITE);
    assert_eq!(pixel(&target, 2, 2), 0xFF00_00FF);
}

#[test]
fn lit_quad_without_lights_is_black() {
    let (scene, target) = scene();
    camera(&scene);
    scene.set_lighting_enabled(true);

    let quad = Arc::new(Primitive::new(RenderMode::TriangleFan));
    quad.add_vertex(Vertex::at(-1.0, 1.0, 0.0));
    quad.add_vertex(Vertex::at(1.0, 1.0, 0.0));
    quad.add_vertex(Vertex::at(1.0, -1.0, 0.0));
    quad.add_vertex(Vertex::at(-1.0, -1.0, 0.0));
    quad.set_colored(false);
    scene.add_primitive(quad);

    scene.render().unwrap();
    assert_eq!(pixel(&target, 32, 32), 0xFF00_0000);
}

#[test]
fn obj_mesh_is_loaded_and_drawn() {
    let dir = std::env::temp_dir().join(format!("env3d-software-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("triangle.obj");
    std::fs::write(
        &path,
        "v -1 -1 0\nv 1 -1 0\nv 0 1 0\nf 1 2 3\n",
    )
    .unwrap();

    let (scene, target) = scene();
    camera(&scene);
    let mesh = Arc::new(Mesh::from_file(&path));
    scene.add_mesh(Arc::clone(&mesh));

    scene.render().unwrap();

    assert!(mesh.is_loaded());
    assert_eq!(mesh.subset_count(), 1);
    assert_eq!(pixel(&target, 32, 34), WHITE);
    assert_eq!(pixel(&target, 2, 2), 0xFF00_00FF);
}

#[test]
fn line_to_a_distant_endpoint_is_clipped() {
    let (scene, target) = scene();
    let line = Arc::new(Primitive::new(RenderMode::LineList));
    line.add_vertex(Vertex::at(0.0, 10.0, 0.5).with_color(0xFFFF_0000));
    line.add_vertex(Vertex::at(3.0e9, 10.0, 0.5).with_color(0xFFFF_0000));
    scene.add_primitive(line);

    scene.render().unwrap();

    assert_eq!(scene.last_status(), StatusCode::OK);
    assert_eq!(target.lock().frame_count, 1);
    assert_eq!(pixel(&target, 0, 11), 0xFF00_00FF);
    assert_ne!(pixel(&target, 63, 10), 0xFF00_00FF);
}

#[test]
fn oversized_background_falls_back_to_clear_color() {
    let (scene, target) = scene();
    let mut background = Texture::new();
    background.set_source("sky.png", 70_000, 70_000);
    scene.set_background_texture(&background);

    scene.render().unwrap();

    assert_eq!(scene.last_status(), StatusCode::OUT_OF_MEMORY);
    assert_eq!(target.lock().frame_count, 1);
    assert_eq!(pixel(&target, 5, 5), 0xFF00_00FF);
}

#[test]
fn resize_is_recorded_but_back_buffer_keeps_its_size() {
    let (scene, target) = scene();
    scene.update_back_buffer_size(200, 100);

    scene.render().unwrap();

    assert_eq!(scene.back_buffer_size(), (200, 100));
    let frame = target.lock();
    assert_eq!((frame.width, frame.height), (SIZE, SIZE));
    assert_eq!(frame.pixels.len(), (SIZE * SIZE) as usize);
}
