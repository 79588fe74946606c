//! Time integration of tissue models, on one thread or across shared-memory
//! workers.
//!
//! Both integrators advance the same forward-Euler tissue step on a fixed
//! cadence and record the membrane-potential field every `decim` steps. The
//! parallel driver splits the leading grid axis into slabs with a two-row
//! ghost overlap, keeps the full state in a shared field, and synchronizes
//! the workers with a reusable rendezvous barrier; rank 0 samples the shared
//! field on the record cadence.

pub mod barrier;
pub mod parallel;
pub mod partition;
pub mod recording;
pub mod serial;
mod shared;

pub use barrier::Rendezvous;
pub use parallel::parallel_compute;
pub use partition::partition_rows;
pub use recording::Recording;
pub use serial::serial_compute;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tissue::{StimRegion, StimWaveform, TissueError};

#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Tissue(#[from] TissueError),

    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error("cannot split {nx} rows across {workers} workers")]
    Partition { nx: usize, workers: usize },

    #[error("a worker thread panicked")]
    WorkerPanic,

    #[error("recording is too short to estimate a delay")]
    ShortRecording,

    #[error("no measurable delay between the probed sites")]
    NoDelay,
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Integration settings shared by the serial and parallel drivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Simulation horizon (ms).
    pub tmax: f64,
    /// Forward-Euler step (ms).
    pub dt: f64,
    /// Steps between recorded samples.
    pub decim: usize,
    /// Peak stimulus current.
    pub iamp: f64,
    /// Duration of the stimulus arch (ms); `None` means equal to `tmax`.
    pub stim_half_period: Option<f64>,
    /// Worker count for the parallel driver; `None` means one per CPU.
    pub workers: Option<usize>,
    /// Override for the first stimulus box (`None` inherits the model's).
    pub stim: Option<StimRegion>,
    /// Override for the second stimulus box.
    pub stim2: Option<StimRegion>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tmax: 500.0,
            dt: 0.05,
            decim: 20,
            iamp: 0.2,
            stim_half_period: None,
            workers: None,
            stim: None,
            stim2: None,
        }
    }
}

impl RunConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.tmax.is_finite() && self.tmax > 0.0) {
            return Err(SolverError::Config("tmax must be positive".to_string()));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SolverError::Config("dt must be positive".to_string()));
        }
        if self.decim == 0 {
            return Err(SolverError::Config("decim must be at least 1".to_string()));
        }
        if let Some(period) = self.stim_half_period {
            if !(period.is_finite() && period > 0.0) {
                return Err(SolverError::Config(
                    "stim_half_period must be positive".to_string(),
                ));
            }
        }
        if self.workers == Some(0) {
            return Err(SolverError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn waveform(&self) -> StimWaveform {
        StimWaveform {
            amplitude: self.iamp,
            half_period: self.stim_half_period.unwrap_or(self.tmax),
        }
    }

    /// Sample slots including the discarded initial one.
    pub(crate) fn sample_slots(&self) -> usize {
        (self.tmax / (self.dt * self.decim as f64)).round() as usize + 1
    }
}

/// Applies the configuration's stimulus overrides to the model.
pub(crate) fn apply_stim_overrides(tissue: &mut tissue::Tissue, cfg: &RunConfig) {
    if cfg.stim.is_some() {
        tissue.set_stim(cfg.stim);
    }
    if cfg.stim2.is_some() {
        tissue.set_stim2(cfg.stim2);
    }
}
