// src/asset.rs - Object metadata derived from the loaded ring's geometry
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::pose::{ObjectMetadata, DEFAULT_TARGET_SIZE_PX};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read asset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse asset manifest: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("asset {0} has empty bounds")]
    EmptyBounds(String),
}

/// Axis-aligned bounds in object units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn size(&self) -> Vector3<f64> {
        Vector3::from(self.max) - Vector3::from(self.min)
    }

    pub fn center(&self) -> Vector3<f64> {
        (Vector3::from(self.max) + Vector3::from(self.min)) * 0.5
    }

    pub fn volume(&self) -> f64 {
        let s = self.size();
        s.x * s.y * s.z
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    pub name: String,
    pub bounds: Aabb,
}

/// What the asset loader reports about a loaded object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDescription {
    pub name: String,
    pub bounds: Aabb,
    #[serde(default)]
    pub meshes: Vec<MeshInfo>,
}

pub trait AssetLoader {
    fn load(&self, path: &Path) -> Result<AssetDescription, AssetError>;
}

/// Reads a JSON manifest describing the object's meshes and bounds.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestLoader;

impl AssetLoader for ManifestLoader {
    fn load(&self, path: &Path) -> Result<AssetDescription, AssetError> {
        let contents = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let asset: AssetDescription = serde_json::from_str(&contents)?;
        info!(name = %asset.name, meshes = asset.meshes.len(), "Asset manifest loaded");
        Ok(asset)
    }
}

/// The mesh carrying the finger axis: the last one named like a band, else the bulkiest.
pub fn locate_band(meshes: &[MeshInfo]) -> Option<&MeshInfo> {
    // Covers "RingBand", "band_outer" and the like
    let named = meshes
        .iter()
        .rev()
        .find(|m| m.name.to_lowercase().contains("band"));

    named.or_else(|| {
        meshes
            .iter()
            .max_by(|a, b| a.bounds.volume().total_cmp(&b.bounds.volume()))
    })
}

pub fn object_metadata(
    asset: &AssetDescription,
    target_size_px: f64,
) -> Result<ObjectMetadata, AssetError> {
    let max_dim = asset.bounds.size().max();
    if !(max_dim.is_finite() && max_dim > 0.0) {
        return Err(AssetError::EmptyBounds(asset.name.clone()));
    }
    let base_scale = target_size_px / max_dim;

    let center_offset = match locate_band(&asset.meshes) {
        Some(band) => {
            let offset = band.bounds.center() * base_scale;
            info!(
                mesh = %band.name,
                x = offset.x,
                y = offset.y,
                z = offset.z,
                "Band center offset"
            );
            offset
        }
        None => {
            warn!(name = %asset.name, "No meshes reported, assuming centered object");
            Vector3::zeros()
        }
    };

    Ok(ObjectMetadata::new(base_scale, target_size_px, center_offset))
}

pub fn load_object<L: AssetLoader>(loader: &L, path: &Path) -> Result<ObjectMetadata, AssetError> {
    let asset = loader.load(path)?;
    object_metadata(&asset, DEFAULT_TARGET_SIZE_PX)
}
