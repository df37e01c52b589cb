//! Live scan pipeline for the qrpass client.
//!
//! This crate provides:
//! - Media traits (`MediaDevices`, `VideoTrack`, `VideoSink`) the camera is driven through
//! - A `FrameDecoder` trait with an rqrr-backed implementation
//! - The acceptance rules applied to every detection (centred region of interest,
//!   cooldown and de-duplication)
//! - `ScanPipeline`, which owns the active track and the decode loop

mod acceptance;
mod decoder;
mod error;
mod media;
mod pipeline;

pub use acceptance::{centroid, AcceptanceFilter, DedupWindow, RegionOfInterest, Rejection};
pub use decoder::{Detection, FrameDecoder, Point, RqrrDecoder};
pub use error::{CameraError, DecodeWarning, MediaAccessError};
pub use media::{
    DeviceInfo, FacingMode, Frame, MediaDevices, StreamConstraints, TrackCapabilities,
    VideoSink, VideoTrack, ZoomRange,
};
pub use pipeline::{DecodedCallback, DecodedEvent, ScanOptions, ScanPipeline};
