// src/calibration.rs - Fits the user scale multiplier from observed finger width
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub sample_count: usize,
    pub timeout_ms: u64,
    /// Comfort margin applied to the measured finger width
    pub fit_ratio: f64,
    pub multiplier_min: f64,
    pub multiplier_max: f64,
    pub min_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            sample_count: 20,
            timeout_ms: 4000,
            fit_ratio: 1.15,
            multiplier_min: 0.5,
            multiplier_max: 2.0,
            min_samples: 3,
        }
    }
}

impl CalibrationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub finger_width: f64,
    pub target_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    Idle,
    Collecting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    Fitted { session: Uuid, multiplier: f64, samples: usize },
    Insufficient { session: Uuid, samples: usize },
}

impl CalibrationOutcome {
    pub fn multiplier(&self) -> Option<f64> {
        match self {
            CalibrationOutcome::Fitted { multiplier, .. } => Some(*multiplier),
            CalibrationOutcome::Insufficient { .. } => None,
        }
    }
}

/// Samples gathered by one start request.
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    id: Uuid,
    started_at: Instant,
    samples: Vec<CalibrationSample>,
}

impl CalibrationSession {
    fn new(now: Instant, capacity: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: now,
            samples: Vec::with_capacity(capacity),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn samples(&self) -> &[CalibrationSample] {
        &self.samples
    }
}

enum CalibrationState {
    Idle,
    Collecting(CalibrationSession),
    Done(CalibrationOutcome),
}

/// `Idle -> Collecting -> Done` sampling state machine.
pub struct Calibrator {
    state: CalibrationState,
}

impl Calibrator {
    pub fn new() -> Self {
        Self {
            state: CalibrationState::Idle,
        }
    }

    pub fn phase(&self) -> CalibrationPhase {
        match self.state {
            CalibrationState::Idle => CalibrationPhase::Idle,
            CalibrationState::Collecting(_) => CalibrationPhase::Collecting,
            CalibrationState::Done(_) => CalibrationPhase::Done,
        }
    }

    pub fn is_collecting(&self) -> bool {
        matches!(self.state, CalibrationState::Collecting(_))
    }

    pub fn session(&self) -> Option<&CalibrationSession> {
        match &self.state {
            CalibrationState::Collecting(session) => Some(session),
            _ => None,
        }
    }

    pub fn last_outcome(&self) -> Option<&CalibrationOutcome> {
        match &self.state {
            CalibrationState::Done(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// Starts a fresh session, dropping any previous buffer.
    pub fn start(&mut self, config: &CalibrationConfig, now: Instant) -> Uuid {
        let session = CalibrationSession::new(now, config.sample_count);
        let id = session.id;
        info!(
            session = %id,
            samples = config.sample_count,
            timeout_ms = config.timeout_ms,
            "Calibration started"
        );
        self.state = CalibrationState::Collecting(session);
        id
    }

    pub fn cancel(&mut self) {
        if let CalibrationState::Collecting(session) = &self.state {
            info!(
                session = %session.id,
                collected = session.samples.len(),
                "Calibration cancelled"
            );
            self.state = CalibrationState::Idle;
        }
    }

    /// Adds a sample while collecting. Returns the outcome when this finishes the session.
    pub fn record(
        &mut self,
        sample: CalibrationSample,
        config: &CalibrationConfig,
        now: Instant,
    ) -> Option<CalibrationOutcome> {
        if let Some(outcome) = self.poll(config, now) {
            return Some(outcome);
        }

        let full = match &mut self.state {
            CalibrationState::Collecting(session) => {
                session.samples.push(sample);
                debug!(
                    session = %session.id,
                    collected = session.samples.len(),
                    "Calibration sample"
                );
                session.samples.len() >= config.sample_count
            }
            _ => return None,
        };

        if full {
            self.finish(config)
        } else {
            None
        }
    }

    /// Finishes the session once its timeout has elapsed.
    pub fn poll(&mut self, config: &CalibrationConfig, now: Instant) -> Option<CalibrationOutcome> {
        let expired = match &self.state {
            CalibrationState::Collecting(session) => {
                now.saturating_duration_since(session.started_at) >= config.timeout()
            }
            _ => false,
        };

        if expired {
            self.finish(config)
        } else {
            None
        }
    }

    fn finish(&mut self, config: &CalibrationConfig) -> Option<CalibrationOutcome> {
        let session = match std::mem::replace(&mut self.state, CalibrationState::Idle) {
            CalibrationState::Collecting(session) => session,
            other => {
                self.state = other;
                return None;
            }
        };

        let outcome = match fit_multiplier(&session.samples, config) {
            Some(multiplier) => {
                info!(
                    session = %session.id,
                    multiplier,
                    samples = session.samples.len(),
                    "Calibration fitted"
                );
                CalibrationOutcome::Fitted {
                    session: session.id,
                    multiplier,
                    samples: session.samples.len(),
                }
            }
            None => {
                debug!(
                    session = %session.id,
                    samples = session.samples.len(),
                    "Calibration had too few samples"
                );
                CalibrationOutcome::Insufficient {
                    session: session.id,
                    samples: session.samples.len(),
                }
            }
        };

        self.state = CalibrationState::Done(outcome);
        Some(outcome)
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new()
    }
}

/// `clamp(mean(width) * fit_ratio / mean(target), min, max)`, or `None` below the
/// minimum sample count.
pub fn fit_multiplier(samples: &[CalibrationSample], config: &CalibrationConfig) -> Option<f64> {
    if samples.len() < config.min_samples.max(1) {
        return None;
    }

    let n = samples.len() as f64;
    let mean_width = samples.iter().map(|s| s.finger_width).sum::<f64>() / n;
    let mean_target = samples.iter().map(|s| s.target_size).sum::<f64>() / n;

    let desired = mean_width * config.fit_ratio;
    let multiplier = desired / mean_target;
    if !multiplier.is_finite() {
        return None;
    }

    Some(multiplier.max(config.multiplier_min).min(config.multiplier_max))
}
