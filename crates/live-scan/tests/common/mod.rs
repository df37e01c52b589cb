#![allow(dead_code)]

use async_trait::async_trait;
use live_scan::{
    DecodeWarning, DecodedCallback, DecodedEvent, Detection, DeviceInfo, FacingMode, Frame,
    FrameDecoder, MediaAccessError, MediaDevices, Point, StreamConstraints, TrackCapabilities,
    VideoSink, VideoTrack, ZoomRange,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const WIDTH: u32 = 100;
pub const HEIGHT: u32 = 100;

/// Camera whose frames are pushed by the test.
pub struct FakeTrack {
    device_id: String,
    capabilities: TrackCapabilities,
    sender: mpsc::UnboundedSender<Frame>,
    frames: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    stopped: AtomicBool,
    pub torch: Mutex<Option<bool>>,
    pub zoom: Mutex<Option<f64>>,
}

impl FakeTrack {
    fn new(device_id: &str, capabilities: TrackCapabilities) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            device_id: device_id.to_string(),
            capabilities,
            sender,
            frames: tokio::sync::Mutex::new(receiver),
            stopped: AtomicBool::new(false),
            torch: Mutex::new(None),
            zoom: Mutex::new(None),
        }
    }

    pub fn push(&self, frame: Frame) {
        let _ = self.sender.send(frame);
    }

    pub fn push_tag(&self, tag: u8) {
        self.push(Frame::filled(WIDTH, HEIGHT, tag));
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoTrack for FakeTrack {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities
    }

    async fn apply_torch(&self, on: bool) -> Result<(), MediaAccessError> {
        *self.torch.lock() = Some(on);
        Ok(())
    }

    async fn apply_zoom(&self, zoom: f64) -> Result<(), MediaAccessError> {
        *self.zoom.lock() = Some(zoom);
        Ok(())
    }

    async fn next_frame(&self) -> Option<Frame> {
        if self.is_stopped() {
            return None;
        }
        self.frames.lock().await.recv().await
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Media layer handing out [`FakeTrack`]s.
pub struct FakeDevices {
    devices: Vec<DeviceInfo>,
    capabilities: Mutex<TrackCapabilities>,
    failure: Mutex<Option<MediaAccessError>>,
    open_delay: Mutex<Duration>,
    opened: Mutex<Vec<(StreamConstraints, Arc<FakeTrack>)>>,
}

impl FakeDevices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            devices: vec![
                DeviceInfo {
                    id: "back".into(),
                    label: "Back Camera".into(),
                    facing: Some(FacingMode::Environment),
                },
                DeviceInfo {
                    id: "front".into(),
                    label: "Front Camera".into(),
                    facing: Some(FacingMode::User),
                },
            ],
            capabilities: Mutex::new(TrackCapabilities::default()),
            failure: Mutex::new(None),
            open_delay: Mutex::new(Duration::ZERO),
            opened: Mutex::new(Vec::new()),
        })
    }

    pub fn with_capabilities(self: Arc<Self>, capabilities: TrackCapabilities) -> Arc<Self> {
        *self.capabilities.lock() = capabilities;
        self
    }

    /// Every open waits this long before granting the track.
    pub fn with_open_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.open_delay.lock() = delay;
        self
    }

    pub fn fail_next(&self, error: MediaAccessError) {
        *self.failure.lock() = Some(error);
    }

    pub fn last_track(&self) -> Arc<FakeTrack> {
        self.opened.lock().last().expect("no track opened").1.clone()
    }

    pub fn last_constraints(&self) -> StreamConstraints {
        self.opened.lock().last().expect("no track opened").0.clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn live_tracks(&self) -> usize {
        self.opened
            .lock()
            .iter()
            .filter(|(_, track)| !track.is_stopped())
            .count()
    }
}

#[async_trait]
impl MediaDevices for FakeDevices {
    async fn enumerate(&self) -> Result<Vec<DeviceInfo>, MediaAccessError> {
        Ok(self.devices.clone())
    }

    async fn open(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, MediaAccessError> {
        let delay = *self.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.failure.lock().take() {
            return Err(error);
        }
        let device_id = match &constraints.device_id {
            Some(id) if self.devices.iter().any(|d| &d.id == id) => id.clone(),
            Some(id) => return Err(MediaAccessError::NotFound(id.clone())),
            None => "back".to_string(),
        };
        let track = Arc::new(FakeTrack::new(&device_id, *self.capabilities.lock()));
        self.opened
            .lock()
            .push((constraints.clone(), track.clone()));
        Ok(track)
    }
}

/// Decoder answering by the first luma byte of the frame.
#[derive(Default)]
pub struct TaggedDecoder {
    outcomes: Mutex<HashMap<u8, Result<Option<Detection>, DecodeWarning>>>,
    calls: AtomicUsize,
}

impl TaggedDecoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on(&self, tag: u8, outcome: Result<Option<Detection>, DecodeWarning>) -> &Self {
        self.outcomes.lock().insert(tag, outcome);
        self
    }

    /// Code `text` centred on `(cx, cy)`.
    pub fn code_at(&self, tag: u8, text: &str, cx: f64, cy: f64) -> &Self {
        self.on(tag, Ok(Some(Detection::new(text, square_around(cx, cy)))))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FrameDecoder for TaggedDecoder {
    fn decode(&self, frame: &Frame) -> Result<Option<Detection>, DecodeWarning> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let tag = frame.luma.first().copied().unwrap_or_default();
        self.outcomes.lock().get(&tag).cloned().unwrap_or(Ok(None))
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub attached: Mutex<Option<String>>,
    pub detaches: AtomicUsize,
}

impl VideoSink for RecordingSink {
    fn attach(&self, track: &Arc<dyn VideoTrack>) {
        *self.attached.lock() = Some(track.device_id().to_string());
    }

    fn detach(&self) {
        *self.attached.lock() = None;
        self.detaches.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn square_around(cx: f64, cy: f64) -> Vec<Point> {
    vec![
        Point::new(cx - 4.0, cy - 4.0),
        Point::new(cx + 4.0, cy - 4.0),
        Point::new(cx + 4.0, cy + 4.0),
        Point::new(cx - 4.0, cy + 4.0),
    ]
}

pub fn zoom_and_torch(max_zoom: f64) -> TrackCapabilities {
    TrackCapabilities {
        torch: true,
        zoom: Some(ZoomRange {
            min: 1.0,
            max: max_zoom,
            step: Some(0.1),
        }),
    }
}

/// Callback collecting every accepted decode.
pub fn collector() -> (DecodedCallback, Arc<Mutex<Vec<DecodedEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: DecodedCallback = Arc::new(move |event: DecodedEvent| sink.lock().push(event));
    (callback, events)
}

pub fn texts(events: &Mutex<Vec<DecodedEvent>>) -> Vec<String> {
    events.lock().iter().map(|e| e.text.clone()).collect()
}

/// Let the decode loop drain every queued frame.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
