//! Status codes and error types.
//!
//! Device backends report failures as raw 32-bit status codes. The engine wraps
//! them in [`DeviceError`] at the device boundary and in [`RenderError`] at the
//! engine boundary, so the caller can always recover the raw code.

use std::fmt;

use thiserror::Error;

/// Raw 32-bit status code reported by a device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const OK: Self = Self(0);
    pub const FAIL: Self = Self(0x8000_4005);
    pub const POINTER: Self = Self(0x8000_4003);
    pub const INVALID_ARG: Self = Self(0x8007_0057);
    pub const OUT_OF_MEMORY: Self = Self(0x8007_000E);
    pub const NOT_FOUND: Self = Self(0x8007_0002);
    pub const NOT_AVAILABLE: Self = Self(0x8876_086A);
    pub const INVALID_CALL: Self = Self(0x8876_086C);
    pub const INVALID_DATA: Self = Self(0x8876_0B59);

    /// Failure codes have the severity bit set.
    #[inline]
    pub const fn is_failure(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        !self.is_failure()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// A failed device call: which operation and the status it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("device call `{op}` failed with status {status}")]
pub struct DeviceError {
    pub op: &'static str,
    pub status: StatusCode,
}

impl DeviceError {
    pub const fn new(op: &'static str, status: StatusCode) -> Self {
        Self { op, status }
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Errors surfaced by the scene, primitives, meshes and textures.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("no device could be created for the surface (status {0})")]
    InitFailed(StatusCode),

    #[error("scene has been disposed")]
    Disposed,

    #[error("lighting requires the transform pipeline")]
    InvalidRenderPath,

    #[error("{0:?} cannot be drawn through the lit mesh path")]
    UnsupportedTopology(crate::primitive::RenderMode),

    #[error("{count} vertices exceed the 16-bit index range")]
    TooManyVertices { count: usize },

    #[error("vertex index {index} out of range for {len} vertices")]
    VertexIndexOutOfRange { index: usize, len: usize },

    #[error("no source path has been set")]
    MissingSource,

    #[error("failed to read image: {0}")]
    ImageLoad(#[from] image::ImageError),

    #[error("{0} is not implemented")]
    Unsupported(&'static str),

    #[error("An error occurred while rendering {status}")]
    Frame {
        status: StatusCode,
        #[source]
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Raw status code this error reports to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RenderError::Device(err) => err.status,
            RenderError::InitFailed(status) | RenderError::Frame { status, .. } => *status,
            RenderError::Disposed
            | RenderError::InvalidRenderPath
            | RenderError::UnsupportedTopology(_)
            | RenderError::TooManyVertices { .. } => StatusCode::INVALID_CALL,
            RenderError::VertexIndexOutOfRange { .. } => StatusCode::INVALID_ARG,
            RenderError::MissingSource => StatusCode::POINTER,
            RenderError::ImageLoad(image::ImageError::IoError(_)) => StatusCode::NOT_FOUND,
            RenderError::ImageLoad(_) => StatusCode::INVALID_DATA,
            RenderError::Unsupported(_) => StatusCode::FAIL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_is_hex() {
        assert_eq!(StatusCode::INVALID_CALL.to_string(), "0x8876086C");
        assert_eq!(StatusCode::OK.to_string(), "0x00000000");
    }

    #[test]
    fn severity_bit_decides_failure() {
        assert!(StatusCode::FAIL.is_failure());
        assert!(StatusCode::OK.is_success());
        assert!(StatusCode(1).is_success());
    }

    #[test]
    fn frame_error_carries_raw_status() {
        let inner = RenderError::Device(DeviceError::new("draw_primitive", StatusCode::INVALID_CALL));
        let err = RenderError::Frame {
            status: inner.status(),
            source: Box::new(inner),
        };
        assert_eq!(err.status(), StatusCode::INVALID_CALL);
        assert_eq!(
            err.to_string(),
            "An error occurred while rendering 0x8876086C"
        );
    }
}
