// src/lib.rs
pub mod anchor;
pub mod asset;
pub mod basis;
pub mod calibration;
pub mod config;
pub mod data;
pub mod detector;
pub mod landmarks;
pub mod occlusion;
pub mod pipeline;
pub mod pose;
pub mod recording;
pub mod scale;
pub mod scene;
pub mod smoothing;
pub mod tracking;

pub use config::TrackerConfig;
pub use detector::{DetectorClient, HandDetector, ReplayDetector};
pub use landmarks::{Landmark, LandmarkFrame, Viewport};
pub use pipeline::TrackingPipeline;
pub use pose::{ObjectMetadata, RenderTransform, UserOffsets};
pub use scene::{RecordingScene, SceneSink};
pub use tracking::{RingTracker, TickOutcome};
