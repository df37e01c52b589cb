//! Scan pipeline: owns the active camera track and the decode loop.

use crate::acceptance::{AcceptanceFilter, DedupWindow, RegionOfInterest};
use crate::decoder::FrameDecoder;
use crate::error::CameraError;
use crate::media::{
    DeviceInfo, Frame, MediaDevices, StreamConstraints, TrackCapabilities, VideoSink, VideoTrack,
    ZoomRange,
};
use chrono::{DateTime, Utc};
use client_config_and_utils::ScanSettings;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// An accepted decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Callback registered at construction, invoked once per accepted decode.
pub type DecodedCallback = Arc<dyn Fn(DecodedEvent) + Send + Sync>;

/// Scan policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub cooldown: Duration,
    pub repeat_cooldown: Duration,
    pub roi_fraction: f64,
    /// `false` stops the pipeline after the first accepted decode.
    pub continuous: bool,
    pub initial_zoom: f64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from(&ScanSettings::default())
    }
}

impl From<&ScanSettings> for ScanOptions {
    fn from(settings: &ScanSettings) -> Self {
        let cooldown = Duration::from_millis(settings.cooldown_ms);
        Self {
            cooldown,
            repeat_cooldown: settings
                .repeat_cooldown_ms
                .map(Duration::from_millis)
                .unwrap_or(cooldown),
            roi_fraction: f64::from(settings.roi_fraction),
            continuous: settings.continuous,
            initial_zoom: settings.initial_zoom,
        }
    }
}

struct ActiveStream {
    track: Arc<dyn VideoTrack>,
    task: Option<JoinHandle<()>>,
    capabilities: TrackCapabilities,
    torch: bool,
    zoom: Option<f64>,
}

#[derive(Default)]
struct PipelineState {
    /// Bumped by every stop; loops and pending starts from an older
    /// generation are stale.
    generation: u64,
    stream: Option<ActiveStream>,
    /// Device of the last opened or requested track, reused by `resume`.
    device_id: Option<String>,
    /// A start is waiting on the camera.
    opening: bool,
    paused: bool,
}

struct PipelineInner {
    devices: Arc<dyn MediaDevices>,
    decoder: Arc<dyn FrameDecoder>,
    sink: Option<Arc<dyn VideoSink>>,
    on_decoded: DecodedCallback,
    options: ScanOptions,
    state: Mutex<PipelineState>,
    filter: Mutex<AcceptanceFilter>,
    lifecycle: tokio::sync::Mutex<()>,
}

/// Owns at most one camera stream and its decode loop.
///
/// Cheap to clone; clones share the same stream.
#[derive(Clone)]
pub struct ScanPipeline {
    inner: Arc<PipelineInner>,
}

impl fmt::Debug for ScanPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanPipeline")
            .field("active", &self.is_active())
            .field("paused", &self.is_paused())
            .field("device_id", &self.active_device_id())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl ScanPipeline {
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        decoder: Arc<dyn FrameDecoder>,
        options: ScanOptions,
        on_decoded: DecodedCallback,
    ) -> Self {
        let filter = AcceptanceFilter::new(
            RegionOfInterest::new(options.roi_fraction),
            DedupWindow::new(options.cooldown, options.repeat_cooldown),
        );
        Self {
            inner: Arc::new(PipelineInner {
                devices,
                decoder,
                sink: None,
                on_decoded,
                options,
                state: Mutex::new(PipelineState::default()),
                filter: Mutex::new(filter),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Attach previews to `sink`. Must be called before the pipeline is shared.
    pub fn with_sink(mut self, sink: Arc<dyn VideoSink>) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.sink = Some(sink),
            None => warn!("Video sink ignored, pipeline already shared"),
        }
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.inner.options
    }

    pub async fn list_devices(&self) -> Result<Vec<DeviceInfo>, CameraError> {
        self.inner.devices.enumerate().await.map_err(|e| {
            warn!(error = %e, "Failed to enumerate cameras");
            CameraError::from(e)
        })
    }

    /// Open `device_id` (or the default environment-facing camera) and start
    /// decoding. Any running stream is stopped first.
    pub async fn start(&self, device_id: Option<&str>) -> Result<(), CameraError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.stop();
        self.inner.filter.lock().reset();
        self.open(device_id.map(str::to_string)).await
    }

    /// Stop, then start on `device_id`.
    pub async fn set_device(&self, device_id: &str) -> Result<(), CameraError> {
        info!(device_id = %device_id, "Switching camera");
        self.start(Some(device_id)).await
    }

    /// Cancel the decode loop, stop the track, detach the sink.
    ///
    /// Idempotent. The device is released before this returns.
    pub fn stop(&self) {
        let released = {
            let mut state = self.inner.state.lock();
            state.paused = false;
            self.inner.take_stream(&mut state)
        };
        if let Some(stream) = released {
            self.inner.release(stream);
            info!("Scanner stopped");
        }
    }

    /// Release the camera, keeping device selection and dedup state for
    /// [`resume`](Self::resume).
    pub fn pause(&self) {
        let (released, opening) = {
            let mut state = self.inner.state.lock();
            let stream = self.inner.take_stream(&mut state);
            if stream.is_some() || state.opening {
                state.paused = true;
            }
            (stream, state.opening)
        };
        if let Some(stream) = released {
            self.inner.release(stream);
            info!("Scanner paused");
        } else if opening {
            debug!("Scanner paused while the camera was opening");
        }
    }

    /// Reopen the device held before [`pause`](Self::pause). No-op unless paused.
    pub async fn resume(&self) -> Result<(), CameraError> {
        let _lifecycle = self.inner.lifecycle.lock().await;
        let device_id = {
            let mut state = self.inner.state.lock();
            if !state.paused {
                return Ok(());
            }
            state.paused = false;
            state.device_id.clone()
        };
        info!(device_id = ?device_id, "Resuming scanner");
        self.open(device_id).await
    }

    /// Visibility hook: hidden pauses, visible resumes.
    pub async fn set_visible(&self, visible: bool) -> Result<(), CameraError> {
        if visible {
            self.resume().await
        } else {
            self.pause();
            Ok(())
        }
    }

    /// Best-effort. No-op when inactive or the track has no torch.
    pub async fn set_torch(&self, on: bool) {
        let (track, generation) = {
            let state = self.inner.state.lock();
            match &state.stream {
                Some(stream) if stream.capabilities.torch => {
                    (stream.track.clone(), state.generation)
                }
                Some(_) => {
                    debug!("Torch not supported by active camera");
                    return;
                }
                None => return,
            }
        };

        match track.apply_torch(on).await {
            Ok(()) => {
                self.inner.update_stream(generation, |stream| stream.torch = on);
                debug!(on, "Torch updated");
            }
            Err(e) => warn!(error = %e, "Failed to set torch"),
        }
    }

    /// Best-effort, clamped to the reported range. No-op when unsupported.
    pub async fn set_zoom(&self, value: f64) {
        let (track, range, generation) = {
            let state = self.inner.state.lock();
            match &state.stream {
                Some(stream) => match stream.capabilities.zoom {
                    Some(range) => (stream.track.clone(), range, state.generation),
                    None => {
                        debug!("Zoom not supported by active camera");
                        return;
                    }
                },
                None => return,
            }
        };

        let zoom = range.clamp(value);
        match track.apply_zoom(zoom).await {
            Ok(()) => {
                self.inner
                    .update_stream(generation, |stream| stream.zoom = Some(zoom));
                debug!(zoom, "Zoom updated");
            }
            Err(e) => warn!(error = %e, zoom, "Failed to set zoom"),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().stream.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.state.lock().paused
    }

    pub fn active_device_id(&self) -> Option<String> {
        let state = self.inner.state.lock();
        state
            .stream
            .as_ref()
            .map(|stream| stream.track.device_id().to_string())
    }

    pub fn torch_supported(&self) -> bool {
        self.capabilities().is_some_and(|caps| caps.torch)
    }

    pub fn zoom_supported(&self) -> bool {
        self.zoom_range().is_some()
    }

    pub fn zoom_range(&self) -> Option<ZoomRange> {
        self.capabilities().and_then(|caps| caps.zoom)
    }

    pub fn torch(&self) -> bool {
        let state = self.inner.state.lock();
        state.stream.as_ref().is_some_and(|stream| stream.torch)
    }

    pub fn zoom(&self) -> Option<f64> {
        let state = self.inner.state.lock();
        state.stream.as_ref().and_then(|stream| stream.zoom)
    }

    fn capabilities(&self) -> Option<TrackCapabilities> {
        let state = self.inner.state.lock();
        state.stream.as_ref().map(|stream| stream.capabilities)
    }

    /// Acquire a track and spawn its decode loop. Caller holds the lifecycle lock.
    async fn open(&self, device_id: Option<String>) -> Result<(), CameraError> {
        let generation = {
            let mut state = self.inner.state.lock();
            state.opening = true;
            state.device_id = device_id.clone();
            state.generation
        };
        let constraints = StreamConstraints::for_device(device_id.as_deref());

        let opened = self.inner.devices.open(&constraints).await;
        let current = {
            let mut state = self.inner.state.lock();
            state.opening = false;
            state.generation == generation
        };
        let track = match opened {
            Ok(track) => track,
            Err(e) => {
                warn!(error = %e, device_id = ?device_id, "Failed to open camera");
                if current {
                    self.stop();
                }
                return Err(CameraError::from(e));
            }
        };

        let capabilities = track.capabilities();
        {
            let mut state = self.inner.state.lock();
            if state.generation != generation {
                drop(state);
                debug!("Camera opened after stop, releasing");
                track.stop();
                return Ok(());
            }

            let weak = Arc::downgrade(&self.inner);
            let task = tokio::spawn(run_decode_loop(weak, track.clone(), generation));
            if let Some(sink) = &self.inner.sink {
                sink.attach(&track);
            }
            state.device_id = Some(track.device_id().to_string());
            state.stream = Some(ActiveStream {
                track: track.clone(),
                task: Some(task),
                capabilities,
                torch: false,
                zoom: None,
            });
        }

        info!(
            device_id = %track.device_id(),
            torch = capabilities.torch,
            zoom = capabilities.zoom.is_some(),
            "Scanner started"
        );

        if let Some(range) = capabilities.zoom {
            self.set_zoom(self.inner.options.initial_zoom.min(range.max))
                .await;
        }
        Ok(())
    }
}

impl PipelineInner {
    /// Detach the current stream and invalidate its loop. Runs under the state lock.
    fn take_stream(&self, state: &mut PipelineState) -> Option<ActiveStream> {
        state.generation += 1;
        state.stream.take()
    }

    fn release(&self, mut stream: ActiveStream) {
        if let Some(task) = stream.task.take() {
            task.abort();
        }
        stream.track.stop();
        if let Some(sink) = &self.sink {
            sink.detach();
        }
    }

    fn stop_generation(&self, generation: u64) {
        let released = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            self.take_stream(&mut state)
        };
        if let Some(stream) = released {
            self.release(stream);
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }

    fn update_stream(&self, generation: u64, update: impl FnOnce(&mut ActiveStream)) {
        let mut state = self.state.lock();
        if state.generation != generation {
            return;
        }
        if let Some(stream) = state.stream.as_mut() {
            update(stream);
        }
    }

    fn process_frame(&self, frame: &Frame, generation: u64) {
        let detection = match self.decoder.decode(frame) {
            Ok(Some(detection)) => detection,
            Ok(None) => return,
            Err(warning) => {
                warn!(warning = %warning, "Frame decode failed");
                return;
            }
        };

        if !self.is_current(generation) {
            return;
        }
        let verdict =
            self.filter
                .lock()
                .evaluate(frame.width, frame.height, &detection, Instant::now());
        if let Err(rejection) = verdict {
            trace!(?rejection, "Detection discarded");
            return;
        }

        info!(len = detection.text.len(), "QR code accepted");
        (self.on_decoded)(DecodedEvent {
            text: detection.text,
            timestamp: Utc::now(),
        });

        if !self.options.continuous {
            debug!("Single-shot scan complete");
            self.stop_generation(generation);
        }
    }
}

impl Drop for PipelineInner {
    fn drop(&mut self) {
        if let Some(stream) = self.state.get_mut().stream.take() {
            self.release(stream);
        }
    }
}

/// Pull frames in capture order until the track ends or the pipeline moves on.
async fn run_decode_loop(inner: Weak<PipelineInner>, track: Arc<dyn VideoTrack>, generation: u64) {
    while let Some(frame) = track.next_frame().await {
        let Some(pipeline) = inner.upgrade() else {
            return;
        };
        if !pipeline.is_current(generation) {
            return;
        }
        pipeline.process_frame(&frame, generation);
        drop(pipeline);
        tokio::task::yield_now().await;
    }

    if let Some(pipeline) = inner.upgrade() {
        if pipeline.is_current(generation) {
            warn!(device_id = %track.device_id(), "Camera track ended");
            pipeline.stop_generation(generation);
        }
    }
}
