//! Render modes, primitive counts and index generation.

use super::MAX_INDEXED_VERTICES;
use crate::device::PrimitiveType;

/// How a primitive's vertex list is assembled into points, lines or
/// triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderMode {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

impl RenderMode {
    /// Maps the boundary's numeric mode (1 = point list ... 6 = triangle fan).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RenderMode::PointList),
            2 => Some(RenderMode::LineList),
            3 => Some(RenderMode::LineStrip),
            4 => Some(RenderMode::TriangleList),
            5 => Some(RenderMode::TriangleStrip),
            6 => Some(RenderMode::TriangleFan),
            _ => None,
        }
    }

    pub fn primitive_type(self) -> PrimitiveType {
        match self {
            RenderMode::PointList => PrimitiveType::PointList,
            RenderMode::LineList => PrimitiveType::LineList,
            RenderMode::LineStrip => PrimitiveType::LineStrip,
            RenderMode::TriangleList => PrimitiveType::TriangleList,
            RenderMode::TriangleStrip => PrimitiveType::TriangleStrip,
            RenderMode::TriangleFan => PrimitiveType::TriangleFan,
        }
    }

    pub fn is_triangles(self) -> bool {
        matches!(
            self,
            RenderMode::TriangleList | RenderMode::TriangleStrip | RenderMode::TriangleFan
        )
    }

    /// Number of whole primitives `vertex_count` vertices make. Leftover
    /// vertices are ignored, so malformed counts round down to zero.
    pub fn primitive_count(self, vertex_count: usize) -> u32 {
        let count = match self {
            RenderMode::PointList => vertex_count,
            RenderMode::LineList => vertex_count / 2,
            RenderMode::LineStrip => vertex_count.saturating_sub(1),
            RenderMode::TriangleList => vertex_count / 3,
            RenderMode::TriangleStrip | RenderMode::TriangleFan => vertex_count.saturating_sub(2),
        };
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Triangle-list indices equivalent to drawing `vertex_count` vertices in
    /// this mode. Odd strip triangles swap their first two indices so every
    /// face keeps the winding of the first. Point and line modes, and counts
    /// past the 16-bit index range, yield none.
    pub(crate) fn mesh_indices(self, vertex_count: usize) -> Vec<u16> {
        if vertex_count > MAX_INDEXED_VERTICES {
            return Vec::new();
        }
        let faces = self.primitive_count(vertex_count) as usize;
        let mut indices = Vec::with_capacity(faces * 3);
        for j in 0..faces {
            let j16 = j as u16;
            let face = match self {
                RenderMode::TriangleList => [3 * j16, 3 * j16 + 1, 3 * j16 + 2],
                RenderMode::TriangleStrip if j % 2 == 0 => [j16, j16 + 1, j16 + 2],
                RenderMode::TriangleStrip => [j16 + 1, j16, j16 + 2],
                RenderMode::TriangleFan => [0, j16 + 1, j16 + 2],
                RenderMode::PointList | RenderMode::LineList | RenderMode::LineStrip => {
                    return Vec::new()
                }
            };
            indices.extend_from_slice(&face);
        }
        indices
    }
}
