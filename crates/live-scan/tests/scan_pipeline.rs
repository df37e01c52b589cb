mod common;

use common::*;
use live_scan::{
    CameraError, DecodeWarning, FacingMode, MediaAccessError, ScanOptions, ScanPipeline,
    TrackCapabilities,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn pipeline(
    devices: &Arc<FakeDevices>,
    decoder: &Arc<TaggedDecoder>,
    options: ScanOptions,
) -> (ScanPipeline, Arc<parking_lot::Mutex<Vec<live_scan::DecodedEvent>>>) {
    let (callback, events) = collector();
    let scanner = ScanPipeline::new(devices.clone(), decoder.clone(), options, callback);
    (scanner, events)
}

#[tokio::test(start_paused = true)]
async fn start_opens_environment_camera_and_applies_initial_zoom() {
    let devices = FakeDevices::new().with_capabilities(zoom_and_torch(5.0));
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());

    scanner.start(None).await.unwrap();

    let constraints = devices.last_constraints();
    assert_eq!(constraints.device_id, None);
    assert_eq!(constraints.facing, FacingMode::Environment);
    assert!(scanner.is_active());
    assert_eq!(scanner.active_device_id().as_deref(), Some("back"));
    assert!(scanner.torch_supported());
    assert!(scanner.zoom_supported());
    assert_eq!(*devices.last_track().zoom.lock(), Some(2.0));
    assert_eq!(scanner.zoom(), Some(2.0));
}

#[tokio::test(start_paused = true)]
async fn initial_zoom_respects_device_maximum() {
    let devices = FakeDevices::new().with_capabilities(zoom_and_torch(1.5));
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());

    scanner.start(None).await.unwrap();

    assert_eq!(*devices.last_track().zoom.lock(), Some(1.5));
}

#[tokio::test(start_paused = true)]
async fn torch_and_zoom_are_noops_without_capabilities() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());

    scanner.set_torch(true).await;
    scanner.start(None).await.unwrap();
    scanner.set_torch(true).await;
    scanner.set_zoom(3.0).await;

    let track = devices.last_track();
    assert_eq!(*track.torch.lock(), None);
    assert_eq!(*track.zoom.lock(), None);
    assert!(!scanner.torch_supported());
    assert!(!scanner.zoom_supported());
}

#[tokio::test(start_paused = true)]
async fn zoom_is_clamped_and_torch_toggles() {
    let devices = FakeDevices::new().with_capabilities(zoom_and_torch(4.0));
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    scanner.set_zoom(10.0).await;
    assert_eq!(*track.zoom.lock(), Some(4.0));
    scanner.set_zoom(0.2).await;
    assert_eq!(*track.zoom.lock(), Some(1.0));

    scanner.set_torch(true).await;
    assert_eq!(*track.torch.lock(), Some(true));
    assert!(scanner.torch());
}

#[tokio::test(start_paused = true)]
async fn roi_filter_discards_codes_outside_centre() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder
        .code_at(1, "CORNER", 92.0, 92.0)
        .code_at(2, "CENTRE", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();

    let track = devices.last_track();
    track.push_tag(1);
    settle().await;
    assert!(events.lock().is_empty());

    track.push_tag(2);
    settle().await;
    assert_eq!(texts(&events), vec!["CENTRE"]);
}

#[tokio::test(start_paused = true)]
async fn centroid_on_roi_boundary_is_accepted() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    // Half-frame square spans 25..=75 on a 100x100 frame.
    decoder.code_at(1, "EDGE", 25.0, 75.0);
    let options = ScanOptions {
        roi_fraction: 0.5,
        ..ScanOptions::default()
    };
    let (scanner, events) = pipeline(&devices, &decoder, options);
    scanner.start(None).await.unwrap();

    devices.last_track().push_tag(1);
    settle().await;

    assert_eq!(texts(&events), vec!["EDGE"]);
}

#[tokio::test(start_paused = true)]
async fn detections_without_points_skip_roi() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder.on(1, Ok(Some(live_scan::Detection::new("NO-CORNERS", Vec::new()))));
    let options = ScanOptions {
        roi_fraction: 0.1,
        ..ScanOptions::default()
    };
    let (scanner, events) = pipeline(&devices, &decoder, options);
    scanner.start(None).await.unwrap();

    devices.last_track().push_tag(1);
    settle().await;

    assert_eq!(texts(&events), vec!["NO-CORNERS"]);
}

#[tokio::test(start_paused = true)]
async fn same_code_is_emitted_once_per_cooldown() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder.code_at(1, "TICKET-1", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    track.push_tag(1);
    track.push_tag(1);
    track.push_tag(1);
    settle().await;
    assert_eq!(events.lock().len(), 1);

    tokio::time::sleep(Duration::from_millis(800)).await;
    track.push_tag(1);
    settle().await;
    assert_eq!(texts(&events), vec!["TICKET-1", "TICKET-1"]);
}

#[tokio::test(start_paused = true)]
async fn different_code_within_cooldown_is_discarded() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder
        .code_at(1, "A", 50.0, 50.0)
        .code_at(2, "B", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    track.push_tag(1);
    track.push_tag(2);
    settle().await;
    assert_eq!(texts(&events), vec!["A"]);

    tokio::time::sleep(Duration::from_millis(900)).await;
    track.push_tag(2);
    settle().await;
    assert_eq!(texts(&events), vec!["A", "B"]);
}

#[tokio::test(start_paused = true)]
async fn decode_warnings_do_not_halt_the_loop() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder
        .on(1, Err(DecodeWarning::Undecodable("bad ECC".into())))
        .code_at(2, "AFTER-WARNING", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    track.push_tag(1);
    track.push_tag(1);
    track.push_tag(0);
    track.push_tag(2);
    settle().await;

    assert_eq!(decoder.calls(), 4);
    assert_eq!(texts(&events), vec!["AFTER-WARNING"]);
    assert!(scanner.is_active());
}

#[tokio::test(start_paused = true)]
async fn single_shot_stops_after_first_accept() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder
        .code_at(1, "FIRST", 50.0, 50.0)
        .code_at(2, "SECOND", 50.0, 50.0);
    let options = ScanOptions {
        continuous: false,
        ..ScanOptions::default()
    };
    let (scanner, events) = pipeline(&devices, &decoder, options);
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    track.push_tag(1);
    settle().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    track.push_tag(2);
    settle().await;

    assert_eq!(texts(&events), vec!["FIRST"]);
    assert!(!scanner.is_active());
    assert!(track.is_stopped());
}

#[tokio::test(start_paused = true)]
async fn stop_is_idempotent() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    let sink = Arc::new(RecordingSink::default());
    let (callback, _) = collector();
    let scanner = ScanPipeline::new(
        devices.clone(),
        decoder.clone(),
        ScanOptions::default(),
        callback,
    )
    .with_sink(sink.clone());

    scanner.stop();
    scanner.stop();
    assert!(!scanner.is_active());
    assert_eq!(sink.detaches.load(Ordering::SeqCst), 0);

    scanner.start(None).await.unwrap();
    assert_eq!(sink.attached.lock().as_deref(), Some("back"));

    scanner.stop();
    scanner.stop();
    assert!(!scanner.is_active());
    assert!(devices.last_track().is_stopped());
    assert_eq!(devices.live_tracks(), 0);
    assert_eq!(sink.attached.lock().as_deref(), None);
    assert_eq!(sink.detaches.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stopped_pipeline_ignores_late_frames() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder.code_at(1, "LATE", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let track = devices.last_track();

    scanner.stop();
    track.push_tag(1);
    settle().await;

    assert!(events.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn start_while_active_replaces_the_stream() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    decoder.code_at(1, "OLD", 50.0, 50.0);
    let (scanner, events) = pipeline(&devices, &decoder, ScanOptions::default());

    scanner.start(None).await.unwrap();
    let first = devices.last_track();
    scanner.start(None).await.unwrap();

    assert!(first.is_stopped());
    assert_eq!(devices.open_count(), 2);
    assert_eq!(devices.live_tracks(), 1);

    first.push_tag(1);
    settle().await;
    assert!(events.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn set_device_switches_camera() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();

    scanner.set_device("front").await.unwrap();

    assert_eq!(scanner.active_device_id().as_deref(), Some("front"));
    assert_eq!(
        devices.last_constraints().device_id.as_deref(),
        Some("front")
    );
    assert_eq!(devices.live_tracks(), 1);

    let listed = scanner.list_devices().await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn camera_errors_are_mapped_and_leave_nothing_open() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    let previous = devices.last_track();

    devices.fail_next(MediaAccessError::NotAllowed("dismissed".into()));
    let err = scanner.start(None).await.unwrap_err();
    assert_eq!(err, CameraError::PermissionDenied);
    assert!(!scanner.is_active());
    assert!(previous.is_stopped());

    let err = scanner.set_device("rear-wide").await.unwrap_err();
    assert_eq!(err, CameraError::NotFound);

    devices.fail_next(MediaAccessError::NotReadable("in use".into()));
    assert_eq!(
        scanner.start(None).await.unwrap_err(),
        CameraError::Unavailable
    );
    assert_eq!(devices.live_tracks(), 0);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_restore_the_same_device() {
    let devices = FakeDevices::new().with_capabilities(TrackCapabilities::default());
    let decoder = TaggedDecoder::new();
    decoder.code_at(1, "SEEN", 50.0, 50.0);
    let options = ScanOptions {
        repeat_cooldown: Duration::from_secs(60),
        ..ScanOptions::default()
    };
    let (scanner, events) = pipeline(&devices, &decoder, options);
    scanner.start(Some("front")).await.unwrap();
    devices.last_track().push_tag(1);
    settle().await;

    scanner.set_visible(false).await.unwrap();
    assert!(scanner.is_paused());
    assert!(!scanner.is_active());
    assert_eq!(devices.live_tracks(), 0);

    scanner.set_visible(true).await.unwrap();
    assert!(!scanner.is_paused());
    assert_eq!(scanner.active_device_id().as_deref(), Some("front"));
    assert_eq!(
        devices.last_constraints().device_id.as_deref(),
        Some("front")
    );

    // Dedup state survives the pause.
    tokio::time::sleep(Duration::from_secs(1)).await;
    devices.last_track().push_tag(1);
    settle().await;
    assert_eq!(texts(&events), vec!["SEEN"]);
}

#[tokio::test(start_paused = true)]
async fn hiding_while_the_camera_opens_resumes_on_return() {
    let devices = FakeDevices::new().with_open_delay(Duration::from_millis(100));
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());

    let starting = tokio::spawn({
        let scanner = scanner.clone();
        async move { scanner.start(Some("front")).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    scanner.set_visible(false).await.unwrap();
    assert!(scanner.is_paused());

    starting.await.unwrap().unwrap();
    assert!(scanner.is_paused());
    assert!(!scanner.is_active());
    assert_eq!(devices.live_tracks(), 0);

    scanner.set_visible(true).await.unwrap();
    assert!(!scanner.is_paused());
    assert!(scanner.is_active());
    assert_eq!(scanner.active_device_id().as_deref(), Some("front"));
    assert_eq!(devices.open_count(), 2);
    assert_eq!(devices.live_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn resume_after_stop_does_nothing() {
    let devices = FakeDevices::new();
    let decoder = TaggedDecoder::new();
    let (scanner, _) = pipeline(&devices, &decoder, ScanOptions::default());
    scanner.start(None).await.unwrap();
    scanner.pause();
    scanner.stop();

    scanner.resume().await.unwrap();

    assert!(!scanner.is_active());
    assert_eq!(devices.open_count(), 1);
}
