//! File-backed textures.
//!
//! A [`Texture`] names an image file and lazily derives two device resources
//! from it: a sampling texture for drawing and a plain image surface for
//! copying onto the back buffer. Each is created at most once and then shared.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::device::{Device, GpuTexture, ImageSurface};
use crate::error::RenderError;

/// An image file and the device resources created from it.
///
/// Cloning shares the already-created resources instead of reloading them.
#[derive(Debug, Default)]
pub struct Texture {
    source: Option<PathBuf>,
    width: u32,
    height: u32,
    sampling: Mutex<Option<Arc<GpuTexture>>>,
    surface: Mutex<Option<Arc<ImageSurface>>>,
}

impl Texture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texture for an existing image file, with its dimensions read from the
    /// file header.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        let (width, height) = image::image_dimensions(path)?;
        let mut texture = Self::new();
        texture.set_source(path, width, height);
        Ok(texture)
    }

    /// Sets the image file and its declared size. Resources created from a
    /// previous source are dropped.
    pub fn set_source(&mut self, path: impl Into<PathBuf>, width: u32, height: u32) {
        self.source = Some(path.into());
        self.width = width;
        self.height = height;
        *self.sampling.get_mut() = None;
        *self.surface.get_mut() = None;
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sampling texture for drawing, loaded from the source on first use.
    pub fn sampling_resource(&self, device: &mut dyn Device) -> Result<Arc<GpuTexture>, RenderError> {
        let mut cached = self.sampling.lock();
        if let Some(texture) = cached.as_ref() {
            return Ok(Arc::clone(texture));
        }
        let path = self.source.as_deref().ok_or(RenderError::MissingSource)?;
        let texture = device.create_texture_from_file(path)?;
        debug!("created sampling texture for {}", path.display());
        *cached = Some(Arc::clone(&texture));
        Ok(texture)
    }

    /// Image surface of the declared size, filled from the source on first
    /// use. A surface whose decode fails is dropped, not cached.
    pub fn image_surface(&self, device: &mut dyn Device) -> Result<Arc<ImageSurface>, RenderError> {
        let mut cached = self.surface.lock();
        if let Some(surface) = cached.as_ref() {
            return Ok(Arc::clone(surface));
        }
        let path = self.source.as_deref().ok_or(RenderError::MissingSource)?;
        let surface = device.create_image_surface(self.width, self.height)?;
        device.load_surface_from_file(&surface, path)?;
        debug!(
            "created {}x{} image surface for {}",
            self.width,
            self.height,
            path.display()
        );
        *cached = Some(Arc::clone(&surface));
        Ok(surface)
    }

    pub fn cached_sampling_resource(&self) -> Option<Arc<GpuTexture>> {
        self.sampling.lock().clone()
    }

    pub fn cached_image_surface(&self) -> Option<Arc<ImageSurface>> {
        self.surface.lock().clone()
    }
}

impl Clone for Texture {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            width: self.width,
            height: self.height,
            sampling: Mutex::new(self.sampling.lock().clone()),
            surface: Mutex::new(self.surface.lock().clone()),
        }
    }
}
