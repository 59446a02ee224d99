//! Meshes loaded from scene files.
//!
//! A [`Mesh`] is loaded on its first render, through the device's
//! [`Device::load_mesh`]. Each material subset is drawn with its own material
//! and texture. A mesh that fails to load stays failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::device::{Device, GpuTexture, MeshBuffer};
use crate::error::{DeviceError, RenderError};
use crate::material::Material;

#[derive(Debug)]
enum Geometry {
    Unloaded,
    Loaded {
        buffer: MeshBuffer,
        subsets: Vec<(Material, Option<Arc<GpuTexture>>)>,
    },
    Failed(DeviceError),
}

#[derive(Debug)]
struct MeshState {
    source: Option<PathBuf>,
    geometry: Geometry,
}

/// Geometry read from a file, with one material and texture per subset.
#[derive(Debug)]
pub struct Mesh {
    state: Mutex<MeshState>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MeshState {
                source: None,
                geometry: Geometry::Unloaded,
            }),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let mesh = Self::new();
        mesh.set_source(path);
        mesh
    }

    /// Sets the file to load. Only the first source is kept; returns whether
    /// this call set it.
    pub fn set_source(&self, path: impl Into<PathBuf>) -> bool {
        let mut state = self.state.lock();
        let path = path.into();
        if let Some(existing) = &state.source {
            warn!(
                "mesh source already set to {}, ignoring {}",
                existing.display(),
                path.display()
            );
            return false;
        }
        state.source = Some(path);
        true
    }

    pub fn source(&self) -> Option<PathBuf> {
        self.state.lock().source.clone()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state.lock().geometry, Geometry::Loaded { .. })
    }

    /// Number of material subsets, zero until loaded.
    pub fn subset_count(&self) -> usize {
        match &self.state.lock().geometry {
            Geometry::Loaded { subsets, .. } => subsets.len(),
            Geometry::Unloaded | Geometry::Failed(_) => 0,
        }
    }

    /// Procedural box geometry. Not available.
    pub fn create_box(&self, _width: f32, _height: f32, _depth: f32) -> Result<(), RenderError> {
        Err(RenderError::Unsupported("box mesh generation"))
    }

    /// Procedural cylinder geometry. Not available.
    pub fn create_cylinder(
        &self,
        _radius1: f32,
        _radius2: f32,
        _length: f32,
        _slices: u32,
        _stacks: u32,
    ) -> Result<(), RenderError> {
        Err(RenderError::Unsupported("cylinder mesh generation"))
    }

    /// Draws every subset in order, loading the file first if needed.
    pub fn render(&self, device: &mut dyn Device) -> Result<(), RenderError> {
        let mut state = self.state.lock();
        if let Geometry::Unloaded = state.geometry {
            let path = state.source.clone().ok_or(RenderError::MissingSource)?;
            state.geometry = load(device, &path);
        }

        match &state.geometry {
            Geometry::Unloaded => Ok(()),
            Geometry::Failed(err) => Err((*err).into()),
            Geometry::Loaded { buffer, subsets } => {
                for (subset, (material, texture)) in subsets.iter().enumerate() {
                    device.set_material(material)?;
                    device.set_texture(0, texture.as_ref())?;
                    device.draw_subset(buffer, subset as u32)?;
                }
                Ok(())
            }
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

fn load(device: &mut dyn Device, path: &Path) -> Geometry {
    let loaded = match device.load_mesh(path) {
        Ok(loaded) => loaded,
        Err(err) => {
            warn!("failed to load mesh {}: {err}", path.display());
            return Geometry::Failed(err);
        }
    };

    let subsets = loaded
        .subsets
        .into_iter()
        .map(|subset| {
            // Files rarely carry a useful ambient term; light it like diffuse.
            let material = Material {
                ambient: subset.material.diffuse,
                ..subset.material
            };
            let texture = subset.texture.and_then(|file| {
                device
                    .create_texture_from_file(&file)
                    .map_err(|err| warn!("mesh texture {} not loaded: {err}", file.display()))
                    .ok()
            });
            (material, texture)
        })
        .collect::<Vec<_>>();

    debug!(
        "loaded mesh {}: {} vertices, {} subsets",
        path.display(),
        loaded.mesh.vertex_count(),
        subsets.len()
    );
    Geometry::Loaded {
        buffer: loaded.mesh,
        subsets,
    }
}
