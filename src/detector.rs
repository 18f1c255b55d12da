// src/detector.rs - Request/response boundary around the hand landmark detector
use image::DynamicImage;
use std::collections::VecDeque;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, error};

use crate::landmarks::LandmarkFrame;
use crate::recording::RecordedFrame;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectorError {
    #[error("detector failed: {0}")]
    Failed(String),
    #[error("detector worker is not running")]
    Disconnected,
    #[error("detector worker panicked: {0}")]
    Panicked(String),
}

/// Zero or one hand per processed frame.
pub type Detection = Result<Option<LandmarkFrame>, DetectorError>;

/// A blocking landmark detector, e.g. a MediaPipe hand landmarker binding.
pub trait HandDetector: Send + 'static {
    fn detect(&mut self, frame: &DynamicImage) -> Detection;
}

#[derive(Debug)]
pub struct DetectionResponse {
    pub id: u64,
    pub result: Detection,
}

struct DetectionRequest {
    id: u64,
    frame: DynamicImage,
}

/// Owns the detector worker task and allows at most one request in flight.
pub struct DetectorClient {
    requests: mpsc::Sender<DetectionRequest>,
    responses: mpsc::Receiver<DetectionResponse>,
    in_flight: Option<u64>,
    next_id: u64,
}

impl DetectorClient {
    /// Starts the worker. Must be called from within a tokio runtime.
    pub fn spawn<D: HandDetector>(detector: D) -> Self {
        let (request_tx, request_rx) = mpsc::channel(1);
        let (response_tx, response_rx) = mpsc::channel(1);
        tokio::spawn(run_worker(detector, request_rx, response_tx));

        Self {
            requests: request_tx,
            responses: response_rx,
            in_flight: None,
            next_id: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Sends the frame unless a request is pending. `Ok(None)` means the frame was dropped.
    pub fn submit(&mut self, frame: DynamicImage) -> Result<Option<u64>, DetectorError> {
        if self.in_flight.is_some() {
            return Ok(None);
        }

        let id = self.next_id;
        self.requests
            .try_send(DetectionRequest { id, frame })
            .map_err(|e| match e {
                TrySendError::Closed(_) => DetectorError::Disconnected,
                TrySendError::Full(_) => DetectorError::Failed("request queue full".to_string()),
            })?;

        self.next_id += 1;
        self.in_flight = Some(id);
        Ok(Some(id))
    }

    /// Non-blocking check for the pending response.
    pub fn poll(&mut self) -> Option<DetectionResponse> {
        let id = self.in_flight?;
        let response = match self.responses.try_recv() {
            Ok(response) => response,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => DetectionResponse {
                id,
                result: Err(DetectorError::Disconnected),
            },
        };
        self.in_flight = None;
        Some(response)
    }

    /// Waits for the pending response; `None` when nothing was submitted.
    pub async fn next_response(&mut self) -> Option<DetectionResponse> {
        let id = self.in_flight?;
        let response = self.responses.recv().await.unwrap_or(DetectionResponse {
            id,
            result: Err(DetectorError::Disconnected),
        });
        self.in_flight = None;
        Some(response)
    }
}

async fn run_worker<D: HandDetector>(
    detector: D,
    mut requests: mpsc::Receiver<DetectionRequest>,
    responses: mpsc::Sender<DetectionResponse>,
) {
    let mut slot = Some(detector);

    while let Some(DetectionRequest { id, frame }) = requests.recv().await {
        let Some(mut detector) = slot.take() else {
            break;
        };

        // Inference is CPU bound; keep it off the async workers
        let joined = tokio::task::spawn_blocking(move || {
            let result = detector.detect(&frame);
            (detector, result)
        })
        .await;

        let result = match joined {
            Ok((detector, result)) => {
                slot = Some(detector);
                result
            }
            Err(e) => {
                error!(request = id, error = %e, "Detector panicked, stopping worker");
                Err(DetectorError::Panicked(e.to_string()))
            }
        };

        if responses.send(DetectionResponse { id, result }).await.is_err() || slot.is_none() {
            break;
        }
    }

    debug!("Detector worker stopped");
}

/// Plays back a recorded landmark stream, one entry per request.
pub struct ReplayDetector {
    frames: VecDeque<RecordedFrame>,
}

impl ReplayDetector {
    pub fn new(frames: Vec<RecordedFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl HandDetector for ReplayDetector {
    fn detect(&mut self, _frame: &DynamicImage) -> Detection {
        match self.frames.pop_front() {
            None => Ok(None),
            Some(RecordedFrame { error: Some(msg), .. }) => Err(DetectorError::Failed(msg)),
            Some(recorded) => Ok(recorded.hand),
        }
    }
}
