//! Camera abstraction the pipeline drives.

use crate::error::MediaAccessError;
use async_trait::async_trait;
use image::GrayImage;
use std::sync::Arc;

/// One greyscale video frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Row-major luma, `width * height` bytes.
    pub luma: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Self {
        Self {
            width,
            height,
            luma,
        }
    }

    /// Frame filled with a single luma value.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(width, height, vec![value; width as usize * height as usize])
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<GrayImage> for Frame {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    #[default]
    Environment,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: String,
    pub label: String,
    pub facing: Option<FacingMode>,
}

/// What `start` asks the media layer for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamConstraints {
    /// Exact device, or `None` for the preferred facing camera.
    pub device_id: Option<String>,
    pub facing: FacingMode,
}

impl StreamConstraints {
    pub fn for_device(device_id: Option<&str>) -> Self {
        Self {
            device_id: device_id.map(str::to_string),
            facing: FacingMode::Environment,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: Option<f64>,
}

impl ZoomRange {
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.clamp(self.min, self.max.max(self.min))
    }
}

/// Optional controls reported by the active track.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrackCapabilities {
    pub torch: bool,
    pub zoom: Option<ZoomRange>,
}

/// Enumerates cameras and opens video tracks.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>, MediaAccessError>;

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, MediaAccessError>;
}

/// A live camera track.
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn device_id(&self) -> &str;

    fn capabilities(&self) -> TrackCapabilities;

    async fn apply_torch(&self, on: bool) -> Result<(), MediaAccessError>;

    async fn apply_zoom(&self, zoom: f64) -> Result<(), MediaAccessError>;

    /// Next frame in capture order, `None` once the track has ended.
    async fn next_frame(&self) -> Option<Frame>;

    /// Release the device. Must take effect before returning.
    fn stop(&self);
}

/// Where the preview is shown.
pub trait VideoSink: Send + Sync {
    fn attach(&self, track: &Arc<dyn VideoTrack>);

    fn detach(&self);
}
