//! File loading for the software device: images via `image`, meshes via `tobj`.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, warn};

use crate::device::resource::{
    compute_normals, LoadedMesh, MeshBuffer, SubsetMaterial, VertexAttributes, VertexLayout,
};
use crate::error::{DeviceError, DeviceResult, StatusCode};
use crate::material::{ColorValue, Material};
use crate::math::{Vec2, Vec3};

/// Largest vertex count addressable by 16-bit indices.
pub const MAX_MESH_VERTICES: usize = u16::MAX as usize + 1;

pub fn decode_image(op: &'static str, path: &Path) -> DeviceResult<RgbaImage> {
    let img = image::open(path).map_err(|err| {
        warn!("{op}: cannot decode {}: {err}", path.display());
        let status = match err {
            image::ImageError::IoError(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INVALID_DATA,
        };
        DeviceError::new(op, status)
    })?;
    Ok(img.to_rgba8())
}

/// Convert RGBA bytes to ARGB words.
pub fn to_argb(img: &RgbaImage) -> Vec<u32> {
    img.pixels()
        .map(|p| {
            let [r, g, b, a] = p.0;
            ((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32)
        })
        .collect()
}

/// Decodes `path` and resizes it to exactly `width` x `height`.
pub fn decode_resized(
    op: &'static str,
    path: &Path,
    width: u32,
    height: u32,
) -> DeviceResult<Vec<u32>> {
    let img = decode_image(op, path)?;
    if img.dimensions() == (width, height) {
        return Ok(to_argb(&img));
    }
    Ok(to_argb(&imageops::resize(
        &img,
        width,
        height,
        FilterType::Triangle,
    )))
}

/// Loads a Wavefront OBJ file with its MTL materials.
///
/// All models are merged into one mesh; each material becomes a subset and
/// faces without a material land in subset 0. Texture paths are resolved
/// against the OBJ file's directory. V coordinates are flipped to a top-left
/// origin.
pub fn load_obj(path: &Path) -> DeviceResult<LoadedMesh> {
    const OP: &str = "load_mesh";

    let (models, materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
    )
    .map_err(|err| {
        warn!("{OP}: cannot load {}: {err}", path.display());
        let status = match err {
            tobj::LoadError::OpenFileFailed => StatusCode::NOT_FOUND,
            _ => StatusCode::INVALID_DATA,
        };
        DeviceError::new(OP, status)
    })?;

    let materials = materials.unwrap_or_else(|err| {
        warn!("{OP}: no materials for {}: {err}", path.display());
        Vec::new()
    });

    let vertex_count: usize = models.iter().map(|m| m.mesh.positions.len() / 3).sum();
    let face_count: usize = models.iter().map(|m| m.mesh.indices.len() / 3).sum();
    if vertex_count == 0 || face_count == 0 {
        return Err(DeviceError::new(OP, StatusCode::INVALID_DATA));
    }
    if vertex_count > MAX_MESH_VERTICES {
        warn!("{OP}: {vertex_count} vertices exceed 16-bit indices");
        return Err(DeviceError::new(OP, StatusCode::INVALID_DATA));
    }

    let has_normals = models.iter().all(|m| !m.mesh.normals.is_empty());
    let has_uvs = models.iter().all(|m| !m.mesh.texcoords.is_empty());
    let layout = VertexLayout::new(false, false, has_uvs).with_normal();

    let mut buffer = MeshBuffer::new(face_count, vertex_count, layout);
    let mut base = 0usize;
    let mut face = 0usize;
    for model in &models {
        let mesh = &model.mesh;
        let count = mesh.positions.len() / 3;
        for i in 0..count {
            let mut v = VertexAttributes {
                position: Vec3::new(
                    mesh.positions[i * 3],
                    mesh.positions[i * 3 + 1],
                    mesh.positions[i * 3 + 2],
                ),
                ..VertexAttributes::default()
            };
            if has_normals {
                v.normal = Vec3::new(
                    mesh.normals[i * 3],
                    mesh.normals[i * 3 + 1],
                    mesh.normals[i * 3 + 2],
                );
            }
            if has_uvs {
                v.uv = Vec2::new(mesh.texcoords[i * 2], 1.0 - mesh.texcoords[i * 2 + 1]);
            }
            buffer.vertices_mut().write(base + i, &v);
        }

        let subset = mesh.material_id.unwrap_or(0) as u32;
        for tri in mesh.indices.chunks_exact(3) {
            for (k, &index) in tri.iter().enumerate() {
                buffer.indices_mut()[face * 3 + k] = (base + index as usize) as u16;
            }
            buffer.attributes_mut()[face] = subset;
            face += 1;
        }
        base += count;
    }

    if !has_normals {
        debug!("{OP}: computing normals for {}", path.display());
        compute_normals(&mut buffer)?;
    }

    let directory = path.parent().unwrap_or_else(|| Path::new(""));
    let mut subsets: Vec<SubsetMaterial> = materials
        .iter()
        .map(|m| {
            let rgb = |c: Option<[f32; 3]>, fallback: ColorValue| {
                c.map_or(fallback, |[r, g, b]| ColorValue::new(r, g, b, 1.0))
            };
            let diffuse = ColorValue {
                a: m.dissolve.unwrap_or(1.0),
                ..rgb(m.diffuse, ColorValue::WHITE)
            };
            SubsetMaterial {
                material: Material::new(
                    diffuse,
                    rgb(m.ambient, diffuse),
                    rgb(m.specular, ColorValue::BLACK),
                    ColorValue::BLACK,
                    m.shininess.unwrap_or(0.0),
                ),
                texture: m.diffuse_texture.as_ref().map(|t| directory.join(t)),
            }
        })
        .collect();

    let needed = buffer.subset_count() as usize;
    while subsets.len() < needed {
        subsets.push(SubsetMaterial {
            material: Material::default(),
            texture: None,
        });
    }

    debug!(
        "{OP}: {} with {vertex_count} vertices, {face_count} faces, {} subsets",
        path.display(),
        subsets.len()
    );
    Ok(LoadedMesh {
        mesh: buffer,
        subsets,
    })
}
