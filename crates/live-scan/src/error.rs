//! Error types for the scan pipeline.

use thiserror::Error;

/// Failure reported by the media layer when acquiring or configuring a track.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaAccessError {
    #[error("Permission to use the camera was denied: {0}")]
    NotAllowed(String),

    #[error("No camera matches the request: {0}")]
    NotFound(String),

    #[error("Camera could not be read: {0}")]
    NotReadable(String),

    #[error("Camera cannot satisfy the requested constraints: {0}")]
    OverConstrained(String),

    #[error("Media error: {0}")]
    Other(String),
}

/// User-facing camera failure. Always preceded by a full `stop()`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera found")]
    NotFound,

    #[error("Camera is in use or unavailable")]
    Unavailable,

    #[error("Camera failed to start: {0}")]
    InitFailed(String),
}

impl From<MediaAccessError> for CameraError {
    fn from(err: MediaAccessError) -> Self {
        match err {
            MediaAccessError::NotAllowed(_) => CameraError::PermissionDenied,
            MediaAccessError::NotFound(_) | MediaAccessError::OverConstrained(_) => {
                CameraError::NotFound
            }
            MediaAccessError::NotReadable(_) => CameraError::Unavailable,
            MediaAccessError::Other(msg) => CameraError::InitFailed(msg),
        }
    }
}

/// Per-frame decode failure. Logged, never surfaced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    #[error("Frame buffer holds {actual} bytes, expected {expected}")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Code located but not decodable: {0}")]
    Undecodable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_map_to_camera_errors() {
        assert_eq!(
            CameraError::from(MediaAccessError::NotAllowed("dismissed".into())),
            CameraError::PermissionDenied
        );
        assert_eq!(
            CameraError::from(MediaAccessError::NotFound("back".into())),
            CameraError::NotFound
        );
        assert_eq!(
            CameraError::from(MediaAccessError::OverConstrained("facing".into())),
            CameraError::NotFound
        );
        assert_eq!(
            CameraError::from(MediaAccessError::NotReadable("busy".into())),
            CameraError::Unavailable
        );
        assert_eq!(
            CameraError::from(MediaAccessError::Other("driver".into())),
            CameraError::InitFailed("driver".into())
        );
    }
}
