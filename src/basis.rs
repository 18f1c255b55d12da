// src/basis.rs - Finger-aligned orthonormal frame from hand landmarks
use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use thiserror::Error;
use tracing::debug;

use crate::landmarks::{FingerJoints, Landmark, LandmarkFrame, Viewport};

// Raw landmark vectors shorter than this carry no direction
const MIN_LENGTH: f64 = 1e-9;
// |palm x tangent| for unit inputs is sin(angle); below this they are treated as parallel
const MIN_SIN: f64 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasisSource {
    /// Metric world landmarks from the detector
    World,
    /// Image landmarks with relative depth, scaled to pixels
    ImageDepth,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BasisError {
    #[error("landmark {0} missing from frame")]
    MissingLandmark(usize),
    #[error("finger segment has no length")]
    DegenerateTangent,
    #[error("palm normal and fallback direction are both parallel to the finger")]
    DegenerateAcross,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FingerBasis {
    pub across: Vector3<f64>,
    pub tangent: Vector3<f64>,
    pub normal: Vector3<f64>,
    pub source: BasisSource,
    pub used_fallback: bool,
}

impl FingerBasis {
    /// Columns are across, tangent, normal (object X, Y, Z).
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::from_columns(&[self.across, self.tangent, self.normal])
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let rot = Rotation3::from_basis_unchecked(&[self.across, self.tangent, self.normal]);
        UnitQuaternion::from_rotation_matrix(&rot)
    }
}

// try_normalize lets NaN through since `NaN <= eps` is false
fn unit(v: &Vector3<f64>) -> Option<Vector3<f64>> {
    if v.iter().all(|c| c.is_finite()) {
        v.try_normalize(MIN_LENGTH)
    } else {
        None
    }
}

fn point(landmarks: &[Landmark], index: usize) -> Result<&Landmark, BasisError> {
    landmarks.get(index).ok_or(BasisError::MissingLandmark(index))
}

/// Builds the frame from world landmarks when the full set is present, otherwise
/// from image landmarks with relative depth.
pub fn build_basis(
    frame: &LandmarkFrame,
    viewport: &Viewport,
    joints: &FingerJoints,
) -> Result<FingerBasis, BasisError> {
    let (source, tangent, palm_normal) = match frame.world_landmarks() {
        Some(world) => {
            let (t, n) = finger_vectors(world, joints, |lm| lm.to_vector())?;
            (BasisSource::World, t, n)
        }
        None => {
            let (t, n) =
                finger_vectors(&frame.landmarks, joints, |lm| viewport.to_pixel_depth(lm))?;
            (BasisSource::ImageDepth, t, n)
        }
    };

    let tangent = unit(&tangent).ok_or(BasisError::DegenerateTangent)?;

    let primary = unit(&palm_normal)
        .map(|n| n.cross(&tangent))
        .filter(|a| a.norm() > MIN_SIN)
        .map(|a| a.normalize());

    let (across, used_fallback) = match primary {
        Some(across) => (across, false),
        None => {
            // Direction towards the adjacent finger, always taken from the image landmarks
            let mcp = viewport.to_pixel_depth(point(&frame.landmarks, joints.mcp)?);
            let neighbor = viewport.to_pixel_depth(point(&frame.landmarks, joints.neighbor_mcp)?);
            let v = neighbor - mcp;
            let v = v - tangent * tangent.dot(&v);
            let across = unit(&v).ok_or(BasisError::DegenerateAcross)?;
            debug!("palm normal parallel to finger, using neighbor joint for across axis");
            (across, true)
        }
    };

    // across x tangent keeps {across, tangent, normal} right-handed
    let normal = across.cross(&tangent).normalize();

    Ok(FingerBasis {
        across,
        tangent,
        normal,
        source,
        used_fallback,
    })
}

fn finger_vectors<F>(
    landmarks: &[Landmark],
    joints: &FingerJoints,
    to_vec: F,
) -> Result<(Vector3<f64>, Vector3<f64>), BasisError>
where
    F: Fn(&Landmark) -> Vector3<f64>,
{
    let mcp = to_vec(point(landmarks, joints.mcp)?);
    let pip = to_vec(point(landmarks, joints.pip)?);
    let wrist = to_vec(point(landmarks, joints.wrist)?);
    let a = to_vec(point(landmarks, joints.palm_a)?);
    let b = to_vec(point(landmarks, joints.palm_b)?);

    let tangent = pip - mcp;
    let palm_normal = (a - wrist).cross(&(b - wrist));
    Ok((tangent, palm_normal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::*;
    use approx::assert_relative_eq;

    fn flat_hand() -> Vec<Landmark> {
        let mut lms = vec![Landmark::default(); LANDMARK_COUNT];
        lms[WRIST] = Landmark::new(0.50, 0.80, 0.0);
        lms[INDEX_MCP] = Landmark::new(0.40, 0.55, -0.01);
        lms[MIDDLE_MCP] = Landmark::new(0.47, 0.53, -0.01);
        lms[RING_MCP] = Landmark::new(0.54, 0.54, -0.01);
        lms[RING_PIP] = Landmark::new(0.56, 0.45, -0.02);
        lms[PINKY_MCP] = Landmark::new(0.60, 0.58, -0.01);
        lms
    }

    fn assert_orthonormal(b: &FingerBasis) {
        let m = b.matrix();
        assert_relative_eq!(m.transpose() * m, Matrix3::identity(), epsilon = 1e-9);
        assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn image_depth_basis_is_orthonormal() {
        let frame = LandmarkFrame::new(flat_hand());
        let b = build_basis(&frame, &Viewport::default(), &FingerJoints::RING).unwrap();
        assert_eq!(b.source, BasisSource::ImageDepth);
        assert!(!b.used_fallback);
        assert_orthonormal(&b);
    }

    #[test]
    fn world_landmarks_are_preferred() {
        let world: Vec<Landmark> = flat_hand()
            .iter()
            .map(|lm| Landmark::new(lm.x * 0.2, lm.y * 0.2, lm.z))
            .collect();
        let frame = LandmarkFrame::new(flat_hand()).with_world(world);
        let b = build_basis(&frame, &Viewport::default(), &FingerJoints::RING).unwrap();
        assert_eq!(b.source, BasisSource::World);
        assert_orthonormal(&b);
    }

    #[test]
    fn tangent_maps_to_local_y() {
        let frame = LandmarkFrame::new(flat_hand());
        let b = build_basis(&frame, &Viewport::default(), &FingerJoints::RING).unwrap();
        let y = b.rotation() * Vector3::y();
        assert_relative_eq!(y, b.tangent, epsilon = 1e-9);
    }

    #[test]
    fn parallel_palm_normal_falls_back_to_neighbor() {
        // Finger points straight at the camera, along the palm normal
        let mut lms = vec![Landmark::default(); LANDMARK_COUNT];
        lms[WRIST] = Landmark::new(0.5, 0.5, 0.0);
        lms[INDEX_MCP] = Landmark::new(0.6, 0.5, 0.0);
        lms[PINKY_MCP] = Landmark::new(0.5, 0.6, 0.0);
        lms[RING_MCP] = Landmark::new(0.55, 0.55, 0.0);
        lms[RING_PIP] = Landmark::new(0.55, 0.55, 0.05);
        lms[MIDDLE_MCP] = Landmark::new(0.5, 0.55, 0.0);

        let frame = LandmarkFrame::new(lms);
        let b = build_basis(&frame, &Viewport::new(100.0, 100.0), &FingerJoints::RING).unwrap();
        assert!(b.used_fallback);
        assert_orthonormal(&b);
        assert_relative_eq!(b.across, -Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn zero_length_finger_is_degenerate() {
        let mut lms = flat_hand();
        lms[RING_PIP] = lms[RING_MCP];
        let frame = LandmarkFrame::new(lms);
        assert_eq!(
            build_basis(&frame, &Viewport::default(), &FingerJoints::RING),
            Err(BasisError::DegenerateTangent)
        );
    }

    #[test]
    fn collapsed_palm_and_neighbor_is_degenerate() {
        let mut lms = flat_hand();
        // All palm joints on one point, neighbor on the finger axis
        lms[INDEX_MCP] = lms[WRIST];
        lms[PINKY_MCP] = lms[WRIST];
        lms[MIDDLE_MCP] = lms[RING_MCP];
        let frame = LandmarkFrame::new(lms);
        assert_eq!(
            build_basis(&frame, &Viewport::default(), &FingerJoints::RING),
            Err(BasisError::DegenerateAcross)
        );
    }

    #[test]
    fn nan_depth_is_not_a_direction() {
        let mut lms = flat_hand();
        lms[RING_PIP].z = f64::NAN;
        let frame = LandmarkFrame::new(lms);
        assert_eq!(
            build_basis(&frame, &Viewport::default(), &FingerJoints::RING),
            Err(BasisError::DegenerateTangent)
        );

        let mut world = flat_hand();
        world[RING_MCP].x = f64::NAN;
        let frame = LandmarkFrame::new(flat_hand()).with_world(world);
        assert_eq!(
            build_basis(&frame, &Viewport::default(), &FingerJoints::RING),
            Err(BasisError::DegenerateTangent)
        );
    }

    #[test]
    fn nan_palm_uses_neighbor() {
        let mut lms = flat_hand();
        lms[INDEX_MCP].z = f64::NAN;
        let frame = LandmarkFrame::new(lms);
        let b = build_basis(&frame, &Viewport::default(), &FingerJoints::RING).unwrap();
        assert!(b.used_fallback);
        assert_orthonormal(&b);
    }

    #[test]
    fn seventeen_points_miss_pinky() {
        let frame = LandmarkFrame::new(flat_hand()[..MIN_LANDMARKS].to_vec());
        assert_eq!(
            build_basis(&frame, &Viewport::default(), &FingerJoints::RING),
            Err(BasisError::MissingLandmark(PINKY_MCP))
        );
    }
}
