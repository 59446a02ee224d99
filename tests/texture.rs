mod common;

use std::sync::Arc;

use common::{device, Call, DeviceLog};
use env3d::{RenderError, StatusCode, Texture};

fn texture(path: &str) -> Texture {
    let mut texture = Texture::new();
    texture.set_source(path, 16, 8);
    texture
}

#[test]
fn sampling_resource_is_memoized() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let texture = texture("brick.png");

    let a = texture.sampling_resource(&mut dev).unwrap();
    let b = texture.sampling_resource(&mut dev).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(log.count(|c| matches!(c, Call::CreateTexture(_))), 1);
}

#[test]
fn copies_share_resources_and_outlive_the_original() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let original = texture("brick.png");
    let resource = original.sampling_resource(&mut dev).unwrap();
    drop(resource);

    let copy = original.clone();
    drop(original);
    assert_eq!(log.live_textures(), 1);

    let shared = copy.sampling_resource(&mut dev).unwrap();
    assert_eq!(log.count(|c| matches!(c, Call::CreateTexture(_))), 1);
    drop(shared);
    drop(copy);
    assert_eq!(log.live_textures(), 0);
}

#[test]
fn missing_source_is_a_pointer_error() {
    let log = DeviceLog::new();
    let texture = Texture::new();
    let err = texture.sampling_resource(&mut device(&log)).unwrap_err();
    assert!(matches!(err, RenderError::MissingSource));
    assert_eq!(err.status(), StatusCode::POINTER);
    assert!(log.calls().is_empty());
}

#[test]
fn image_surface_uses_declared_size() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let texture = texture("sky.png");

    let surface = texture.image_surface(&mut dev).unwrap();
    assert_eq!((surface.width(), surface.height()), (16, 8));
    let again = texture.image_surface(&mut dev).unwrap();
    assert!(Arc::ptr_eq(&surface, &again));
    assert_eq!(
        log.calls(),
        vec![
            Call::CreateSurface(16, 8),
            Call::LoadSurface("sky.png".into())
        ]
    );
}

#[test]
fn undecodable_surface_is_not_cached() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let texture = texture("missing.png");

    let err = texture.image_surface(&mut dev).unwrap_err();
    assert_eq!(err.status(), StatusCode::INVALID_DATA);
    assert!(texture.cached_image_surface().is_none());
    assert_eq!(log.live_surfaces(), 0);

    texture.image_surface(&mut dev).unwrap_err();
    assert_eq!(log.created_surfaces(), 2);
}

#[test]
fn surface_allocation_failure_reports_device_status() {
    let log = DeviceLog::new();
    log.fail_on("create_image_surface", StatusCode::OUT_OF_MEMORY);
    let err = texture("sky.png")
        .image_surface(&mut device(&log))
        .unwrap_err();
    assert_eq!(err.status(), StatusCode::OUT_OF_MEMORY);
}

#[test]
fn oversized_declared_surface_is_out_of_memory() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let mut texture = Texture::new();
    texture.set_source("sky.png", 70_000, 70_000);

    let err = texture.image_surface(&mut dev).unwrap_err();
    assert_eq!(err.status(), StatusCode::OUT_OF_MEMORY);
    assert!(texture.cached_image_surface().is_none());
    assert_eq!(log.count(|c| matches!(c, Call::LoadSurface(_))), 0);
}

#[test]
fn caches_are_independent() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let texture = texture("brick.png");

    texture.image_surface(&mut dev).unwrap();
    assert!(texture.cached_sampling_resource().is_none());
    texture.sampling_resource(&mut dev).unwrap();
    assert!(texture.cached_image_surface().is_some());
}

#[test]
fn new_source_drops_cached_resources() {
    let log = DeviceLog::new();
    let mut dev = device(&log);
    let mut texture = texture("brick.png");
    texture.sampling_resource(&mut dev).unwrap();

    texture.set_source("stone.png", 4, 4);
    assert!(texture.cached_sampling_resource().is_none());
    assert_eq!(log.live_textures(), 0);
}
