// src/recording.rs - JSON-lines landmark recordings for offline replay
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::Path;
use tracing::info;

use crate::landmarks::LandmarkFrame;

/// One detector result as captured from a live session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub hand: Option<LandmarkFrame>,
    /// Detector error message, if the call failed
    #[serde(default)]
    pub error: Option<String>,
}

pub fn parse_recording<R: BufRead>(reader: R) -> Result<Vec<RecordedFrame>> {
    let mut frames = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let frame: RecordedFrame = serde_json::from_str(line)
            .with_context(|| format!("Invalid recorded frame on line {}", line_no + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

pub fn read_recording(path: &Path) -> Result<Vec<RecordedFrame>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open recording {}", path.display()))?;
    let frames = parse_recording(std::io::BufReader::new(file))?;
    info!(?path, frames = frames.len(), "Recording loaded");
    Ok(frames)
}
