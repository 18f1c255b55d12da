// src/landmarks.rs
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

// MediaPipe hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

pub const LANDMARK_COUNT: usize = 21;

/// Frames with fewer points than this are discarded before touching any state.
pub const MIN_LANDMARKS: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// One detected hand: image-normalized points plus the optional metric world set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub world: Option<Vec<Landmark>>,
}

impl LandmarkFrame {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks, world: None }
    }

    pub fn with_world(mut self, world: Vec<Landmark>) -> Self {
        self.world = Some(world);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.landmarks.len() >= MIN_LANDMARKS
    }

    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// World landmarks are only trusted when the full set is present.
    pub fn world_landmarks(&self) -> Option<&[Landmark]> {
        self.world
            .as_deref()
            .filter(|world| world.len() >= LANDMARK_COUNT)
    }
}

/// Joints that define the tracked finger and the palm plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerJoints {
    pub mcp: usize,
    pub pip: usize,
    /// MCP of the adjacent finger, used for the width proxy and the across fallback
    pub neighbor_mcp: usize,
    pub wrist: usize,
    pub palm_a: usize,
    pub palm_b: usize,
}

impl FingerJoints {
    pub const RING: FingerJoints = FingerJoints {
        mcp: RING_MCP,
        pip: RING_PIP,
        neighbor_mcp: MIDDLE_MCP,
        wrist: WRIST,
        palm_a: INDEX_MCP,
        palm_b: PINKY_MCP,
    };
}

impl Default for FingerJoints {
    fn default() -> Self {
        Self::RING
    }
}

/// Pixel dimensions of the video the landmarks were detected in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn to_pixel(&self, lm: &Landmark) -> Vector2<f64> {
        Vector2::new(lm.x * self.width, lm.y * self.height)
    }

    /// Relative depth is expressed in the same scale as x, as MediaPipe defines it.
    pub fn to_pixel_depth(&self, lm: &Landmark) -> Vector3<f64> {
        Vector3::new(lm.x * self.width, lm.y * self.height, lm.z * self.width)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(640.0, 480.0)
    }
}
