//! Recorded membrane-potential time series.

use ndarray::{s, Array1, Array4, ArrayView1};

use crate::{Result, SolverError};

/// Membrane potential over time, shape `(Nx, Ny, Nz, samples)`, with the
/// matching sample times.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    pub t: Array1<f64>,
    pub vm: Array4<f64>,
}

impl Recording {
    /// Keeps samples `1..=kept`, discarding the untouched initial slot.
    pub(crate) fn collect(t: Vec<f64>, vm: Array4<f64>, kept: usize) -> Self {
        Self {
            t: Array1::from_vec(t[1..kept + 1].to_vec()),
            vm: vm.slice_move(s![.., .., .., 1..kept + 1]),
        }
    }

    pub fn samples(&self) -> usize {
        self.t.len()
    }

    /// Membrane potential of one cell over all samples.
    pub fn trace(&self, site: [usize; 3]) -> ArrayView1<'_, f64> {
        self.vm.slice(s![site[0], site[1], site[2], ..])
    }

    /// Mean propagation speed between two recorded sites, from the peak of
    /// their cross-correlation. `spacing` is the grid spacing per axis, so
    /// the result is in spacing units per millisecond.
    pub fn conduction_speed(
        &self,
        from: [usize; 3],
        to: [usize; 3],
        spacing: [f64; 3],
    ) -> Result<f64> {
        let n = self.samples();
        if n < 2 {
            return Err(SolverError::ShortRecording);
        }
        let x = self.trace(from);
        let y = self.trace(to);
        let mx = x.mean().unwrap_or(0.0);
        let my = y.mean().unwrap_or(0.0);
        let mut best = f64::NEG_INFINITY;
        let mut best_lag = 0isize;
        for lag in -(n as isize - 1)..=(n as isize - 1) {
            let mut c = 0.0;
            for i in 0..n as isize {
                let j = i + lag;
                if (0..n as isize).contains(&j) {
                    c += (x[i as usize] - mx) * (y[j as usize] - my);
                }
            }
            if c > best {
                best = c;
                best_lag = lag;
            }
        }
        if best_lag == 0 {
            return Err(SolverError::NoDelay);
        }
        let period = self.t[1] - self.t[0];
        let delay = best_lag.unsigned_abs() as f64 * period;
        let distance = (0..3)
            .map(|axis| (to[axis] as f64 - from[axis] as f64) * spacing[axis])
            .map(|d| d * d)
            .sum::<f64>()
            .sqrt();
        Ok(distance / delay)
    }
}
