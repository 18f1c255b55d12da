// src/tracking.rs - Per-frame ring tracking: landmarks in, smoothed pose out
use nalgebra::{UnitQuaternion, Vector2};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::anchor::{extract_anchor, Anchor};
use crate::asset::AssetError;
use crate::basis::{build_basis, BasisError, FingerBasis};
use crate::calibration::{CalibrationOutcome, CalibrationPhase, CalibrationSample, Calibrator};
use crate::config::TrackerConfig;
use crate::detector::Detection;
use crate::landmarks::{LandmarkFrame, Viewport};
use crate::occlusion::{size_occluder, OccluderProfile, OccluderTransform};
use crate::pose::{compose_pose, ObjectMetadata, PoseInputs, RenderTransform};
use crate::scale::{clamp_target, raw_target, segment_length};
use crate::smoothing::{CircularFilter, LinearFilter};

/// Filtered anchor, angle and scale plus the last good orientation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SmoothedPoseState {
    position: LinearFilter<Vector2<f64>>,
    angle: CircularFilter,
    scale: LinearFilter<f64>,
    basis: Option<UnitQuaternion<f64>>,
    finger_width: Option<f64>,
}

impl SmoothedPoseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seeded(&self) -> bool {
        self.position.value().is_some()
    }

    pub fn anchor(&self) -> Option<Vector2<f64>> {
        self.position.value()
    }

    pub fn angle(&self) -> Option<f64> {
        self.angle.value()
    }

    pub fn scale(&self) -> Option<f64> {
        self.scale.value()
    }

    pub fn basis(&self) -> Option<UnitQuaternion<f64>> {
        self.basis
    }

    /// Pixel distance between the tracked MCP and its neighbor, from the last valid frame.
    pub fn finger_width(&self) -> Option<f64> {
        self.finger_width
    }

    pub fn inputs(&self) -> Option<PoseInputs> {
        Some(PoseInputs {
            anchor: self.position.value()?,
            scale: self.scale.value()?,
            basis: self.basis,
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything derived from one frame before it touches the smoothed state.
#[derive(Debug, Clone, PartialEq)]
struct FrameMeasurement {
    anchor: Anchor,
    raw_target: f64,
    target: f64,
    finger_width: f64,
    basis: Result<FingerBasis, BasisError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoObject,
    NoHand,
    TooFewLandmarks(usize),
    NonFinite,
    DetectorFailed,
}

/// Which occluder sizing a composition uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosePath {
    Live,
    Cached,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposedPose {
    pub object: RenderTransform,
    /// `None` when occlusion is disabled
    pub occluder: Option<OccluderTransform>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Skipped {
        reason: SkipReason,
        /// A session whose timeout expired on this tick
        calibration: Option<CalibrationOutcome>,
    },
    Updated {
        pose: ComposedPose,
        calibration: Option<CalibrationOutcome>,
    },
}

impl TickOutcome {
    pub fn pose(&self) -> Option<&ComposedPose> {
        match self {
            TickOutcome::Updated { pose, .. } => Some(pose),
            TickOutcome::Skipped { .. } => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            TickOutcome::Skipped { reason, .. } => Some(*reason),
            TickOutcome::Updated { .. } => None,
        }
    }

    /// Calibration session that finished on this tick, whether or not the frame was used.
    pub fn calibration(&self) -> Option<&CalibrationOutcome> {
        match self {
            TickOutcome::Skipped { calibration, .. } | TickOutcome::Updated { calibration, .. } => {
                calibration.as_ref()
            }
        }
    }

    pub fn is_tracked(&self) -> bool {
        matches!(self, TickOutcome::Updated { .. })
    }
}

/// Owns all state that persists between ticks.
pub struct RingTracker {
    config: TrackerConfig,
    viewport: Viewport,
    object: Option<ObjectMetadata>,
    state: SmoothedPoseState,
    calibrator: Calibrator,
    frame_counter: u64,
}

impl RingTracker {
    pub fn new(config: TrackerConfig, viewport: Viewport) -> Self {
        Self {
            config,
            viewport,
            object: None,
            state: SmoothedPoseState::new(),
            calibrator: Calibrator::new(),
            frame_counter: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Edits apply from the next update or render.
    pub fn config_mut(&mut self) -> &mut TrackerConfig {
        &mut self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn set_object(&mut self, object: ObjectMetadata) {
        info!(
            base_scale = object.base_scale,
            target_px = object.target_size_px,
            "Object attached"
        );
        self.object = Some(object);
    }

    /// Drops the managed object after a failed load; updates become no-ops.
    pub fn object_load_failed(&mut self, err: &AssetError) {
        warn!(error = %err, "Object load failed, pose updates paused");
        self.object = None;
    }

    pub fn object(&self) -> Option<&ObjectMetadata> {
        self.object.as_ref()
    }

    pub fn state(&self) -> &SmoothedPoseState {
        &self.state
    }

    pub fn frames_processed(&self) -> u64 {
        self.frame_counter
    }

    pub fn reset_smoothing(&mut self) {
        debug!("Smoothed state reset");
        self.state.reset();
    }

    pub fn calibration(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn calibration_phase(&self) -> CalibrationPhase {
        self.calibrator.phase()
    }

    pub fn start_calibration(&mut self, now: Instant) -> Uuid {
        self.calibrator.start(&self.config.calibration, now)
    }

    pub fn cancel_calibration(&mut self) {
        self.calibrator.cancel();
    }

    /// Checks the calibration timeout; a fitted multiplier is written into the config.
    pub fn poll_calibration(&mut self, now: Instant) -> Option<CalibrationOutcome> {
        let outcome = self.calibrator.poll(&self.config.calibration, now)?;
        self.apply_calibration(&outcome);
        Some(outcome)
    }

    fn apply_calibration(&mut self, outcome: &CalibrationOutcome) {
        if let Some(multiplier) = outcome.multiplier() {
            self.config.offsets.scale_multiplier = multiplier;
        }
    }

    /// Applies one detector response. Failures and empty results skip the tick.
    pub fn handle_detection(&mut self, detection: Detection, now: Instant) -> TickOutcome {
        match detection {
            Ok(Some(frame)) => self.process_frame(&frame, now),
            Ok(None) => self.skip(SkipReason::NoHand, now),
            Err(e) => {
                warn!(error = %e, "Detection failed, skipping tick");
                self.skip(SkipReason::DetectorFailed, now)
            }
        }
    }

    pub fn process_frame(&mut self, frame: &LandmarkFrame, now: Instant) -> TickOutcome {
        let Some(object) = self.object else {
            return TickOutcome::Skipped {
                reason: SkipReason::NoObject,
                calibration: None,
            };
        };

        if !frame.is_valid() {
            debug!(points = frame.landmarks.len(), "Too few landmarks, frame skipped");
            return self.skip(SkipReason::TooFewLandmarks(frame.landmarks.len()), now);
        }

        let measurement = match self.measure(frame) {
            Ok(m) => m,
            Err(reason) => {
                debug!(?reason, "Frame rejected");
                return self.skip(reason, now);
            }
        };

        self.frame_counter += 1;
        self.update_state(&measurement);

        let calibration = if measurement.raw_target.is_finite() {
            let sample = CalibrationSample {
                finger_width: measurement.finger_width,
                target_size: measurement.raw_target,
            };
            self.calibrator.record(sample, &self.config.calibration, now)
        } else {
            self.calibrator.poll(&self.config.calibration, now)
        };
        if let Some(outcome) = &calibration {
            self.apply_calibration(outcome);
        }

        match self.compose_with(&object, PosePath::Live) {
            Some(pose) => TickOutcome::Updated { pose, calibration },
            // Unreachable once update_state has seeded the filters
            None => TickOutcome::Skipped {
                reason: SkipReason::NonFinite,
                calibration,
            },
        }
    }

    /// Skips the tick; the calibration timeout is still checked and reported.
    fn skip(&mut self, reason: SkipReason, now: Instant) -> TickOutcome {
        TickOutcome::Skipped {
            reason,
            calibration: self.poll_calibration(now),
        }
    }

    fn measure(&self, frame: &LandmarkFrame) -> Result<FrameMeasurement, SkipReason> {
        let joints = &self.config.finger;
        let pixel = |index: usize| {
            frame
                .get(index)
                .map(|lm| self.viewport.to_pixel(lm))
                .ok_or(SkipReason::TooFewLandmarks(frame.landmarks.len()))
        };

        let mcp = pixel(joints.mcp)?;
        let pip = pixel(joints.pip)?;
        let neighbor = pixel(joints.neighbor_mcp)?;

        let anchor = extract_anchor(&mcp, &pip, self.config.anchor_t);
        let finger_width = (neighbor - mcp).norm();
        if !anchor.is_finite() || !finger_width.is_finite() {
            return Err(SkipReason::NonFinite);
        }

        let distance = segment_length(frame, &self.viewport, joints)
            .ok_or(SkipReason::TooFewLandmarks(frame.landmarks.len()))?;
        let raw = raw_target(distance, &self.config.scale);

        Ok(FrameMeasurement {
            anchor,
            raw_target: raw,
            target: clamp_target(raw, &self.config.scale),
            finger_width,
            basis: build_basis(frame, &self.viewport, joints),
        })
    }

    fn update_state(&mut self, m: &FrameMeasurement) {
        let alpha = self.config.smoothing_alpha;
        let anchor = self.state.position.update(m.anchor.position, alpha);
        let angle = self.state.angle.update(m.anchor.angle, alpha);
        let scale = self.state.scale.update(m.target, alpha);
        self.state.finger_width = Some(m.finger_width);

        match &m.basis {
            Ok(basis) => self.state.basis = Some(basis.rotation()),
            Err(e) => warn!(error = %e, "Finger basis unavailable, keeping previous rotation"),
        }

        debug!(
            frame = self.frame_counter,
            x = anchor.x,
            y = anchor.y,
            angle,
            scale,
            "Smoothed state updated"
        );
    }

    /// Re-renders from cached state without a new detection.
    pub fn render_from_cache(&self) -> Option<ComposedPose> {
        self.compose(PosePath::Cached)
    }

    pub fn compose(&self, path: PosePath) -> Option<ComposedPose> {
        let object = self.object?;
        self.compose_with(&object, path)
    }

    fn compose_with(&self, object: &ObjectMetadata, path: PosePath) -> Option<ComposedPose> {
        let inputs = self.state.inputs()?;
        let transform = compose_pose(&inputs, object, &self.config.offsets);

        let profile = match path {
            PosePath::Live => OccluderProfile::LIVE,
            PosePath::Cached => OccluderProfile::CACHED,
        };
        let occluder = size_occluder(
            &profile,
            &self.config.occlusion,
            self.state.finger_width,
            inputs.scale,
            &inputs.anchor,
            &transform.rotation,
        );

        Some(ComposedPose {
            object: transform,
            occluder,
        })
    }
}
