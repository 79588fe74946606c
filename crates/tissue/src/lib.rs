//! Excitable uterine smooth-muscle tissue on a regular grid.
//!
//! A tissue model couples a per-cell ionic reaction kernel with a
//! second-difference diffusion of the membrane potential between neighbouring
//! cells. The grid can be a single cell, a fiber, a sheet, or a volume;
//! present faces carry two cells of damped padding so the excitation wave
//! dies at the edge instead of re-entering.
//!
//! # Features
//!
//! - Two reduced uterine cell kernels: `Red3` (Vm, nK, Ca) and `Red6`
//!   (explicit calcium-channel gating)
//! - Wrap-around `[1, -2, 1]` diffusion stencil per active axis
//! - Border mask damping and stimulus-region masking of the coupling term
//! - Rectangular stimulus regions driven by a half-wave rectified sine
//! - Forward-Euler tissue step with an exchangeable parameter registry

pub mod diffusion;
pub mod grid;
pub mod model;
pub mod reaction;
pub mod stimulus;

pub use grid::Grid;
pub use model::Tissue;
pub use reaction::{Kernel, Red3, Red6};
pub use stimulus::{StimRegion, StimWaveform};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TissueError {
    #[error("unknown reaction model: {0}")]
    UnknownModel(String),

    #[error("no reaction kernel with {0} state variables")]
    UnsupportedDim(usize),

    #[error("stimulus rectangle has {got} coordinates, expected {expected}")]
    StimulusDimension { got: usize, expected: usize },

    #[error("invalid stimulus rectangle: {0}")]
    InvalidStimulus(String),

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),
}

pub type Result<T> = std::result::Result<T, TissueError>;

/// Physical constants
pub mod constants {
    /// Gas constant (J/(mol*K))
    pub const R_GAS: f64 = 8.314;

    /// Temperature (K)
    pub const TEMPERATURE: f64 = 295.0;

    /// Faraday constant (C/mmol)
    pub const FARADAY: f64 = 96.487;
}
