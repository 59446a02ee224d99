//! Render path selection.
//!
//! The four switches that decide how a primitive is drawn are looked up in a
//! sixteen-entry table built at compile time.

use crate::device::VertexLayout;

/// Switches that decide how a primitive is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PathFlags {
    /// The scene runs vertices through world/view/projection.
    pub transform: bool,
    pub lighting: bool,
    /// Vertices carry their own diffuse color.
    pub colored: bool,
    pub textured: bool,
}

impl PathFlags {
    const fn index(self) -> usize {
        self.transform as usize
            | (self.lighting as usize) << 1
            | (self.colored as usize) << 2
            | (self.textured as usize) << 3
    }

    const fn from_index(index: usize) -> Self {
        Self {
            transform: index & 1 != 0,
            lighting: index & 2 != 0,
            colored: index & 4 != 0,
            textured: index & 8 != 0,
        }
    }
}

/// How a primitive is turned into device calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    /// Lighting without the transform pipeline has no normals to light.
    Rejected,
    /// Plain vertex buffer drawn with `draw_primitive`.
    VertexBuffer(VertexLayout),
    /// Generated mesh with computed normals drawn with `draw_subset`. The
    /// layout is the one the mesh is created with, before normals are added.
    LitMesh(VertexLayout),
}

const fn path_for(flags: PathFlags) -> RenderPath {
    match (flags.transform, flags.lighting) {
        (false, true) => RenderPath::Rejected,
        (true, true) => RenderPath::LitMesh(VertexLayout::new(false, flags.colored, flags.textured)),
        (transform, false) => {
            RenderPath::VertexBuffer(VertexLayout::new(!transform, flags.colored, flags.textured))
        }
    }
}

const PATHS: [RenderPath; 16] = {
    let mut table = [RenderPath::Rejected; 16];
    let mut i = 0;
    while i < table.len() {
        table[i] = path_for(PathFlags::from_index(i));
        i += 1;
    }
    table
};

impl RenderPath {
    pub fn select(flags: PathFlags) -> Self {
        PATHS[flags.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_flags() -> impl Iterator<Item = PathFlags> {
        (0..16).map(PathFlags::from_index)
    }

    #[test]
    fn index_round_trips() {
        for i in 0..16 {
            assert_eq!(PathFlags::from_index(i).index(), i);
        }
    }

    #[test]
    fn lighting_without_transform_is_rejected() {
        for flags in all_flags().filter(|f| f.lighting && !f.transform) {
            assert_eq!(RenderPath::select(flags), RenderPath::Rejected);
        }
    }

    #[test]
    fn lit_paths_build_untransformed_meshes() {
        for flags in all_flags().filter(|f| f.lighting && f.transform) {
            let RenderPath::LitMesh(layout) = RenderPath::select(flags) else {
                panic!("expected mesh path for {flags:?}");
            };
            assert!(!layout.transformed);
            assert!(!layout.normal);
            assert_eq!(layout.diffuse, flags.colored);
            assert_eq!(layout.tex_coords, flags.textured);
        }
    }

    #[test]
    fn unlit_paths_carry_rhw_only_without_transform() {
        for flags in all_flags().filter(|f| !f.lighting) {
            let RenderPath::VertexBuffer(layout) = RenderPath::select(flags) else {
                panic!("expected vertex buffer path for {flags:?}");
            };
            assert_eq!(layout.transformed, !flags.transform);
            assert_eq!(layout.diffuse, flags.colored);
            assert_eq!(layout.tex_coords, flags.textured);
        }
    }

    #[test]
    fn unlit_untransformed_colored_textured_stride() {
        let flags = PathFlags {
            transform: false,
            lighting: false,
            colored: true,
            textured: true,
        };
        let RenderPath::VertexBuffer(layout) = RenderPath::select(flags) else {
            panic!("expected vertex buffer path");
        };
        assert_eq!(layout.stride(), 12 + 4 + 4 + 8);
    }
}
