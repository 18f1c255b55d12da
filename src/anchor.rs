// src/anchor.rs
use nalgebra::Vector2;

/// Attachment point on the finger segment and the segment's in-plane angle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub position: Vector2<f64>,
    pub angle: f64,
}

impl Anchor {
    pub fn is_finite(&self) -> bool {
        self.position.x.is_finite() && self.position.y.is_finite() && self.angle.is_finite()
    }
}

/// Interpolates between two pixel-space joints. `t` outside [0, 1] extrapolates.
pub fn extract_anchor(p1: &Vector2<f64>, p2: &Vector2<f64>, t: f64) -> Anchor {
    let d = p2 - p1;
    Anchor {
        position: p1 + d * t,
        angle: d.y.atan2(d.x),
    }
}
