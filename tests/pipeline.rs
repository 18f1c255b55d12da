use approx::assert_relative_eq;
use image::DynamicImage;
use nalgebra::Vector2;
use std::time::{Duration, Instant};

use ring_tracker::calibration::CalibrationPhase;
use ring_tracker::landmarks::{LANDMARK_COUNT, MIDDLE_MCP, RING_MCP, RING_PIP};
use ring_tracker::recording::RecordedFrame;
use ring_tracker::tracking::SkipReason;
use ring_tracker::{
    DetectorClient, Landmark, LandmarkFrame, ObjectMetadata, RecordingScene, ReplayDetector,
    RingTracker, TrackerConfig, TrackingPipeline, Viewport,
};

const W: f64 = 640.0;
const H: f64 = 480.0;

/// Ring segment of length 50 px along +x whose anchor (t = 0.35) lands on (100, 100).
/// The middle MCP sits 120 px away.
fn reference_hand() -> LandmarkFrame {
    let px = |x: f64, y: f64, z: f64| Landmark::new(x / W, y / H, z);
    let mut points: Vec<Landmark> = (0..LANDMARK_COUNT)
        .map(|i| px(150.0 + 8.0 * i as f64, 260.0, 0.0))
        .collect();
    points[0] = px(100.0, 300.0, 0.0);
    points[5] = px(20.0, 160.0, 0.01);
    points[17] = px(160.0, 160.0, -0.01);
    points[MIDDLE_MCP] = px(82.5, 220.0, 0.0);
    points[RING_MCP] = px(82.5, 100.0, 0.0);
    points[RING_PIP] = px(132.5, 100.0, 0.0);
    LandmarkFrame::new(points)
}

fn tracker() -> RingTracker {
    let mut tracker = RingTracker::new(TrackerConfig::default(), Viewport::new(W, H));
    tracker.set_object(ObjectMetadata::default());
    tracker
}

fn recorded(frames: Vec<Option<LandmarkFrame>>) -> Vec<RecordedFrame> {
    frames
        .into_iter()
        .enumerate()
        .map(|(i, hand)| RecordedFrame {
            timestamp_ms: i as u64 * 33,
            hand,
            error: None,
        })
        .collect()
}

fn blank() -> DynamicImage {
    DynamicImage::new_rgb8(8, 8)
}

#[test]
fn twenty_identical_frames_settle_on_the_anchor() {
    let mut tracker = tracker();
    let frame = reference_hand();
    let now = Instant::now();
    for _ in 0..20 {
        assert!(tracker.process_frame(&frame, now).is_tracked());
    }

    let anchor = tracker.state().anchor().unwrap();
    assert!((anchor - Vector2::new(100.0, 100.0)).norm() < 1.0);
    assert_eq!(tracker.state().angle(), Some(0.0));
    assert_relative_eq!(tracker.state().scale().unwrap(), 140.0, epsilon = 1e-9);
}

#[test]
fn empty_frame_between_valid_frames_changes_nothing() {
    let mut tracker = tracker();
    let frame = reference_hand();
    let now = Instant::now();

    tracker.process_frame(&frame, now);
    let before = tracker.state().clone();

    assert_eq!(
        tracker.handle_detection(Ok(None), now).skip_reason(),
        Some(SkipReason::NoHand)
    );
    let few = LandmarkFrame::new(vec![Landmark::default(); 5]);
    assert_eq!(
        tracker.handle_detection(Ok(Some(few)), now).skip_reason(),
        Some(SkipReason::TooFewLandmarks(5))
    );
    assert_eq!(tracker.state(), &before);

    tracker.process_frame(&frame, now);
    assert_relative_eq!(
        tracker.state().anchor().unwrap(),
        before.anchor().unwrap(),
        epsilon = 1e-9
    );
}

#[tokio::test]
async fn replay_drives_scene_and_occluder() {
    let frames = recorded(vec![
        Some(reference_hand()),
        None,
        Some(reference_hand()),
    ]);
    let detector = DetectorClient::spawn(ReplayDetector::new(frames));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());
    let now = Instant::now();

    let mut outcomes = Vec::new();
    for _ in 0..3 {
        assert!(pipeline.detection_tick(blank()));
        outcomes.push(pipeline.wait_and_apply(now).await.unwrap());
        pipeline.render_tick(now);
    }

    assert!(outcomes[0].is_tracked());
    assert_eq!(outcomes[1].skip_reason(), Some(SkipReason::NoHand));
    assert!(outcomes[2].is_tracked());

    let scene = pipeline.scene();
    assert!(scene.occluder_created);
    assert!(scene.occluder.is_some());
    assert!(scene.render_settings.is_some());
    // Two live updates plus three renders
    assert_eq!(scene.object_updates, 5);

    pipeline.tracker_mut().config_mut().occlusion.enabled = false;
    pipeline.render_tick(now);
    assert!(pipeline.scene().occluder.is_none());
    assert!(pipeline.scene().occluder_created);
}

#[tokio::test]
async fn busy_detector_drops_frames() {
    let detector = DetectorClient::spawn(ReplayDetector::new(recorded(vec![Some(
        reference_hand(),
    )])));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());

    assert!(pipeline.detection_tick(blank()));
    assert!(pipeline.is_detecting());
    assert!(!pipeline.detection_tick(blank()));
    assert_eq!(pipeline.dropped_frames(), 1);

    let outcome = pipeline.wait_and_apply(Instant::now()).await.unwrap();
    assert!(outcome.is_tracked());
    assert!(!pipeline.is_detecting());
}

#[tokio::test]
async fn render_before_any_detection_is_empty() {
    let detector = DetectorClient::spawn(ReplayDetector::new(Vec::new()));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());
    let tick = pipeline.render_tick(Instant::now());
    assert!(tick.pose.is_none());
    assert!(pipeline.scene().object.is_none());
    assert!(pipeline.drain(Instant::now()).is_none());
}

#[tokio::test]
async fn detector_failure_is_a_skipped_tick() {
    let frames = vec![RecordedFrame {
        timestamp_ms: 0,
        hand: None,
        error: Some("model unavailable".into()),
    }];
    let detector = DetectorClient::spawn(ReplayDetector::new(frames));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());

    pipeline.detection_tick(blank());
    let outcome = pipeline.wait_and_apply(Instant::now()).await.unwrap();
    assert_eq!(outcome.skip_reason(), Some(SkipReason::DetectorFailed));
    assert!(!pipeline.is_detecting());
    assert!(pipeline.detection_tick(blank()));
}

#[tokio::test]
async fn calibration_finishes_on_render_timeout() {
    let frames = recorded(vec![Some(reference_hand()); 5]);
    let detector = DetectorClient::spawn(ReplayDetector::new(frames));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());

    let start = Instant::now();
    pipeline.tracker_mut().start_calibration(start);
    for i in 0..5 {
        let now = start + Duration::from_millis(i * 33);
        pipeline.detection_tick(blank());
        pipeline.wait_and_apply(now).await.unwrap();
        assert!(pipeline.render_tick(now).calibration.is_none());
    }
    assert_eq!(pipeline.tracker().calibration_phase(), CalibrationPhase::Collecting);

    let tick = pipeline.render_tick(start + Duration::from_millis(4000));
    let outcome = tick.calibration.unwrap();

    // width 120 px, unclamped target 50 * 3 = 150
    let expected = 120.0 * 1.15 / 150.0;
    assert_relative_eq!(outcome.multiplier().unwrap(), expected, epsilon = 1e-9);
    assert_relative_eq!(
        pipeline.tracker().config().offsets.scale_multiplier,
        expected,
        epsilon = 1e-9
    );
    // The new multiplier is already in the rendered scale
    assert_relative_eq!(tick.pose.unwrap().object.scale, 140.0 / 80.0 * expected, epsilon = 1e-9);
}

#[tokio::test]
async fn calibration_finished_by_a_missed_frame_reaches_the_host() {
    let mut frames = vec![Some(reference_hand()); 3];
    frames.push(None);
    let detector = DetectorClient::spawn(ReplayDetector::new(recorded(frames)));
    let mut pipeline = TrackingPipeline::new(tracker(), detector, RecordingScene::default());

    let start = Instant::now();
    pipeline.tracker_mut().start_calibration(start);
    for _ in 0..3 {
        pipeline.detection_tick(blank());
        pipeline.wait_and_apply(start).await.unwrap();
    }

    let late = start + Duration::from_secs(5);
    pipeline.detection_tick(blank());
    let outcome = pipeline.wait_and_apply(late).await.unwrap();
    assert_eq!(outcome.skip_reason(), Some(SkipReason::NoHand));

    let fitted = outcome.calibration().unwrap();
    assert_relative_eq!(fitted.multiplier().unwrap(), 120.0 * 1.15 / 150.0, epsilon = 1e-9);
    assert_eq!(pipeline.tracker().calibration_phase(), CalibrationPhase::Done);
    assert!(pipeline.render_tick(late).calibration.is_none());
}
