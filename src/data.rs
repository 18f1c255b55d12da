// src/data.rs - Per-session pose export
use crate::calibration::CalibrationOutcome;
use crate::tracking::{RingTracker, SkipReason, TickOutcome};
use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Serialize)]
struct PoseRecord {
    frame: usize,
    timestamp_ms: u64,
    tracking_lost: bool,
    skip_reason: Option<String>,

    // Smoothed state
    anchor_x: Option<f64>,
    anchor_y: Option<f64>,
    angle: Option<f64>,
    smoothed_scale: Option<f64>,
    finger_width: Option<f64>,

    // Object transform
    position_x: Option<f64>,
    position_y: Option<f64>,
    position_z: Option<f64>,
    rotation_w: Option<f64>,
    rotation_x: Option<f64>,
    rotation_y: Option<f64>,
    rotation_z: Option<f64>,
    scale: Option<f64>,

    occluder_width: Option<f64>,
    occluder_height: Option<f64>,
    scale_multiplier: f64,
}

#[derive(Debug, Serialize)]
struct CalibrationSummary {
    session: String,
    fitted: bool,
    multiplier: Option<f64>,
    samples: usize,
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    session: String,
    total_frames: usize,
    tracked_frames: usize,
    tracking_rate: f64,
    no_hand_frames: usize,
    detector_failures: usize,
    calibrations: Vec<CalibrationSummary>,
    final_scale_multiplier: f64,
}

pub struct PoseExporter {
    output_dir: PathBuf,
    session_name: String,
    records: Vec<PoseRecord>,
    calibrations: Vec<CalibrationOutcome>,
    final_multiplier: f64,
}

impl PoseExporter {
    pub fn new(output_dir: impl AsRef<Path>, session_name: Option<String>) -> Self {
        let session_name = session_name.unwrap_or_else(|| {
            format!("session_{}", Local::now().format("%Y%m%d_%H%M%S"))
        });

        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
            session_name,
            records: Vec::new(),
            calibrations: Vec::new(),
            final_multiplier: 1.0,
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        self.output_dir.join(&self.session_name)
    }

    pub fn frame_count(&self) -> usize {
        self.records.len()
    }

    /// Records one detection tick together with the tracker state it produced.
    pub fn add_tick(&mut self, timestamp_ms: u64, outcome: &TickOutcome, tracker: &RingTracker) {
        let state = tracker.state();
        let anchor = state.anchor();
        let pose = outcome.pose();
        let object = pose.map(|p| &p.object);
        let occluder = pose.and_then(|p| p.occluder.as_ref());
        let rotation = object.map(|o| o.rotation.quaternion().coords);

        let skip_reason = outcome.skip_reason().map(|reason| format!("{:?}", reason));

        if let Some(c) = outcome.calibration() {
            self.add_calibration(*c);
        }
        self.final_multiplier = tracker.config().offsets.scale_multiplier;

        self.records.push(PoseRecord {
            frame: self.records.len(),
            timestamp_ms,
            tracking_lost: !outcome.is_tracked(),
            skip_reason,
            anchor_x: anchor.map(|a| a.x),
            anchor_y: anchor.map(|a| a.y),
            angle: state.angle(),
            smoothed_scale: state.scale(),
            finger_width: state.finger_width(),
            position_x: object.map(|o| o.position.x),
            position_y: object.map(|o| o.position.y),
            position_z: object.map(|o| o.position.z),
            // nalgebra stores quaternions as [i, j, k, w]
            rotation_w: rotation.map(|q| q[3]),
            rotation_x: rotation.map(|q| q[0]),
            rotation_y: rotation.map(|q| q[1]),
            rotation_z: rotation.map(|q| q[2]),
            scale: object.map(|o| o.scale),
            occluder_width: occluder.map(|o| o.width),
            occluder_height: occluder.map(|o| o.height),
            scale_multiplier: self.final_multiplier,
        });
    }

    pub fn add_calibration(&mut self, outcome: CalibrationOutcome) {
        self.calibrations.push(outcome);
    }

    pub fn export_csv(&self) -> Result<PathBuf> {
        let csv_path = self.session_dir().join("pose_data.csv");
        if let Some(parent) = csv_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let file = File::create(&csv_path)
            .with_context(|| format!("Failed to create {}", csv_path.display()))?;
        let mut writer = Writer::from_writer(file);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", csv_path.display()))?;

        info!(path = ?csv_path, rows = self.records.len(), "Pose data exported");
        Ok(csv_path)
    }

    pub fn write_summary(&self) -> Result<PathBuf> {
        let summary_path = self.session_dir().join("summary.json");
        if let Some(parent) = summary_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let summary = self.summary();
        std::fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("Failed to write {}", summary_path.display()))?;
        info!(
            path = ?summary_path,
            tracked = summary.tracked_frames,
            total = summary.total_frames,
            "Session summary written"
        );
        Ok(summary_path)
    }

    fn summary(&self) -> SessionSummary {
        let total_frames = self.records.len();
        let tracked_frames = self.records.iter().filter(|r| !r.tracking_lost).count();
        let count_reason = |reason: SkipReason| {
            let name = format!("{:?}", reason);
            self.records
                .iter()
                .filter(|r| r.skip_reason.as_deref() == Some(name.as_str()))
                .count()
        };

        SessionSummary {
            session: self.session_name.clone(),
            total_frames,
            tracked_frames,
            tracking_rate: if total_frames == 0 {
                0.0
            } else {
                tracked_frames as f64 / total_frames as f64
            },
            no_hand_frames: count_reason(SkipReason::NoHand),
            detector_failures: count_reason(SkipReason::DetectorFailed),
            calibrations: self
                .calibrations
                .iter()
                .map(|c| match *c {
                    CalibrationOutcome::Fitted {
                        session,
                        multiplier,
                        samples,
                    } => CalibrationSummary {
                        session: session.to_string(),
                        fitted: true,
                        multiplier: Some(multiplier),
                        samples,
                    },
                    CalibrationOutcome::Insufficient { session, samples } => CalibrationSummary {
                        session: session.to_string(),
                        fitted: false,
                        multiplier: None,
                        samples,
                    },
                })
                .collect(),
            final_scale_multiplier: self.final_multiplier,
        }
    }
}
