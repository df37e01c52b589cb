//! Frame-directory camera.
//!
//! Each sub-directory of the root is one device; its image files, in name
//! order, are the frames it produces. A root holding images directly is a
//! single device named `default`.

use async_trait::async_trait;
use live_scan::{
    DeviceInfo, FacingMode, Frame, MediaAccessError, MediaDevices, StreamConstraints,
    TrackCapabilities, VideoTrack,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp"];
const ROOT_DEVICE_ID: &str = "default";

pub struct FrameDirectory {
    root: PathBuf,
    frame_interval: Duration,
}

impl FrameDirectory {
    pub fn new(root: impl Into<PathBuf>, frame_interval: Duration) -> Self {
        Self {
            root: root.into(),
            frame_interval,
        }
    }

    fn devices(&self) -> Result<Vec<(DeviceInfo, PathBuf)>, MediaAccessError> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;

        let mut devices = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            devices.push((device_info(&id), path));
        }
        devices.sort_by(|a, b| a.0.id.cmp(&b.0.id));

        if devices.is_empty() && !image_files(&self.root)?.is_empty() {
            devices.push((device_info(ROOT_DEVICE_ID), self.root.clone()));
        }
        Ok(devices)
    }
}

#[async_trait]
impl MediaDevices for FrameDirectory {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>, MediaAccessError> {
        Ok(self.devices()?.into_iter().map(|(info, _)| info).collect())
    }

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, MediaAccessError> {
        let devices = self.devices()?;
        let selected = match &constraints.device_id {
            Some(id) => devices.into_iter().find(|(info, _)| &info.id == id),
            None => {
                let preferred = devices
                    .iter()
                    .position(|(info, _)| info.facing == Some(constraints.facing));
                let index = preferred.unwrap_or(0);
                devices.into_iter().nth(index)
            }
        };

        let Some((info, path)) = selected else {
            return Err(MediaAccessError::NotFound(
                constraints
                    .device_id
                    .clone()
                    .unwrap_or_else(|| self.root.display().to_string()),
            ));
        };

        let frames = image_files(&path)?;
        debug!(device_id = %info.id, frames = frames.len(), "Opened frame directory");
        let track: Arc<dyn VideoTrack> = Arc::new(DirectoryTrack {
            device_id: info.id,
            frames,
            next: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
            frame_interval: self.frame_interval,
        });
        Ok(track)
    }
}

struct DirectoryTrack {
    device_id: String,
    frames: Vec<PathBuf>,
    next: AtomicUsize,
    stopped: AtomicBool,
    frame_interval: Duration,
}

#[async_trait]
impl VideoTrack for DirectoryTrack {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn capabilities(&self) -> TrackCapabilities {
        TrackCapabilities::default()
    }

    async fn apply_torch(&self, _on: bool) -> Result<(), MediaAccessError> {
        Err(MediaAccessError::Other("torch not available".into()))
    }

    async fn apply_zoom(&self, _zoom: f64) -> Result<(), MediaAccessError> {
        Err(MediaAccessError::Other("zoom not available".into()))
    }

    async fn next_frame(&self) -> Option<Frame> {
        loop {
            if self.stopped.load(Ordering::SeqCst) {
                return None;
            }
            let index = self.next.fetch_add(1, Ordering::SeqCst);
            let path = self.frames.get(index)?.clone();
            if index > 0 {
                tokio::time::sleep(self.frame_interval).await;
            }

            let loaded = tokio::task::spawn_blocking({
                let path = path.clone();
                move || image::open(&path).map(|img| Frame::from(img.to_luma8()))
            })
            .await;

            match loaded {
                Ok(Ok(frame)) => return Some(frame),
                Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Skipping unreadable frame"),
                Err(e) => warn!(path = %path.display(), error = %e, "Frame loader failed"),
            }
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

fn device_info(id: &str) -> DeviceInfo {
    let lower = id.to_lowercase();
    let facing = if lower.contains("front") || lower.contains("user") {
        Some(FacingMode::User)
    } else if lower.contains("back") || lower.contains("rear") || lower.contains("environment") {
        Some(FacingMode::Environment)
    } else {
        None
    };
    DeviceInfo {
        id: id.to_string(),
        label: id.replace(['-', '_'], " "),
        facing,
    }
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>, MediaAccessError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn io_error(path: &Path, err: std::io::Error) -> MediaAccessError {
    let detail = format!("{}: {}", path.display(), err);
    match err.kind() {
        std::io::ErrorKind::NotFound => MediaAccessError::NotFound(detail),
        std::io::ErrorKind::PermissionDenied => MediaAccessError::NotAllowed(detail),
        _ => MediaAccessError::NotReadable(detail),
    }
}
