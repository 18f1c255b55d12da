// src/pipeline.rs - Detection and render ticks over tracker, detector and scene
use image::DynamicImage;
use std::time::Instant;
use tracing::{debug, warn};

use crate::calibration::CalibrationOutcome;
use crate::config::RenderSettings;
use crate::detector::{Detection, DetectorClient};
use crate::scene::SceneSink;
use crate::tracking::{ComposedPose, RingTracker, TickOutcome};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderTick {
    pub pose: Option<ComposedPose>,
    pub calibration: Option<CalibrationOutcome>,
}

pub struct TrackingPipeline<S: SceneSink> {
    tracker: RingTracker,
    detector: DetectorClient,
    scene: S,
    applied_settings: Option<RenderSettings>,
    dropped_frames: u64,
}

impl<S: SceneSink> TrackingPipeline<S> {
    pub fn new(tracker: RingTracker, detector: DetectorClient, scene: S) -> Self {
        Self {
            tracker,
            detector,
            scene,
            applied_settings: None,
            dropped_frames: 0,
        }
    }

    pub fn tracker(&self) -> &RingTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut RingTracker {
        &mut self.tracker
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn is_detecting(&self) -> bool {
        self.detector.is_busy()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    /// Hands the frame to the detector unless a request is still in flight.
    /// Returns whether it was submitted.
    pub fn detection_tick(&mut self, frame: DynamicImage) -> bool {
        match self.detector.submit(frame) {
            Ok(Some(id)) => {
                debug!(request = id, "Frame submitted");
                true
            }
            Ok(None) => {
                self.dropped_frames += 1;
                false
            }
            Err(e) => {
                warn!(error = %e, "Detector unavailable");
                false
            }
        }
    }

    /// Applies a finished detection without waiting.
    pub fn drain(&mut self, now: Instant) -> Option<TickOutcome> {
        let response = self.detector.poll()?;
        Some(self.apply(response.result, now))
    }

    /// Waits for the in-flight detection and applies it.
    pub async fn wait_and_apply(&mut self, now: Instant) -> Option<TickOutcome> {
        let response = self.detector.next_response().await?;
        Some(self.apply(response.result, now))
    }

    fn apply(&mut self, detection: Detection, now: Instant) -> TickOutcome {
        let outcome = self.tracker.handle_detection(detection, now);
        if let Some(pose) = outcome.pose() {
            self.present(pose);
        }
        outcome
    }

    /// Re-applies the cached pose; never waits on the detector.
    pub fn render_tick(&mut self, now: Instant) -> RenderTick {
        let calibration = self.tracker.poll_calibration(now);

        let settings = self.tracker.config().render;
        if self.applied_settings != Some(settings) {
            self.scene.apply_render_settings(&settings);
            self.applied_settings = Some(settings);
        }

        let pose = self.tracker.render_from_cache();
        if let Some(pose) = &pose {
            self.present(pose);
        }
        RenderTick { pose, calibration }
    }

    fn present(&mut self, pose: &ComposedPose) {
        self.scene.set_object_transform(&pose.object);
        self.scene.set_occluder(pose.occluder.as_ref());
    }
}
