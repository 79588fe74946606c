//! Stimulus geometry and injection waveform.

use std::f64::consts::PI;

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use crate::{Result, TissueError};

/// Half-open axis-aligned box of stimulated cells, in padded grid
/// coordinates. Unused axes span `0..1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimRegion {
    pub x: (usize, usize),
    pub y: (usize, usize),
    pub z: (usize, usize),
}

impl StimRegion {
    /// Builds a region from a flat `[x0, x1, y0, y1, z0, z1]` prefix of
    /// length `2 * d`. A dimensionless model always stimulates its only cell.
    pub fn from_coords(coords: &[i64], dimensionality: usize) -> Result<Self> {
        if dimensionality == 0 {
            return Ok(Self::cell());
        }
        let expected = 2 * dimensionality;
        if coords.len() != expected {
            return Err(TissueError::StimulusDimension {
                got: coords.len(),
                expected,
            });
        }
        if let Some(&bad) = coords.iter().find(|&&c| c < 0) {
            return Err(TissueError::InvalidStimulus(format!(
                "negative coordinate {bad}"
            )));
        }
        let axis = |i: usize| {
            if coords.len() > 2 * i + 1 {
                (coords[2 * i] as usize, coords[2 * i + 1] as usize)
            } else {
                (0, 1)
            }
        };
        Ok(Self {
            x: axis(0),
            y: axis(1),
            z: axis(2),
        })
    }

    /// The single cell of a dimensionless model.
    pub fn cell() -> Self {
        Self {
            x: (0, 1),
            y: (0, 1),
            z: (0, 1),
        }
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        x >= self.x.0
            && x < self.x.1
            && y >= self.y.0
            && y < self.y.1
            && z >= self.z.0
            && z < self.z.1
    }

    /// Intersects the region with worker rows `[x0, x1)` and shifts it to
    /// slab-local coordinates. `None` when the intersection is empty.
    pub fn localized(&self, x0: usize, x1: usize) -> Option<StimRegion> {
        if self.x.0 >= x1 || self.x.1 <= x0 {
            return None;
        }
        Some(StimRegion {
            x: (self.x.0.max(x0) - x0, self.x.1.min(x1) - x0),
            ..*self
        })
    }

    fn clamped(&self, extents: [usize; 3]) -> StimRegion {
        let clamp = |(lo, hi): (usize, usize), extent: usize| {
            let hi = hi.min(extent);
            (lo.min(hi), hi)
        };
        StimRegion {
            x: clamp(self.x, extents[0]),
            y: clamp(self.y, extents[1]),
            z: clamp(self.z, extents[2]),
        }
    }
}

/// Writes `value` into the cells of `field` covered by `region`.
pub fn inject(field: &mut Array3<f64>, region: Option<&StimRegion>, value: f64) {
    let Some(region) = region else { return };
    let (nx, ny, nz) = field.dim();
    let r = region.clamped([nx, ny, nz]);
    field
        .slice_mut(s![r.x.0..r.x.1, r.y.0..r.y.1, r.z.0..r.z.1])
        .fill(value);
}

/// Half-wave rectified sine: a single positive arch over `[0, half_period]`,
/// exactly zero afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StimWaveform {
    /// Peak injected current.
    pub amplitude: f64,
    /// Duration of the positive arch (ms).
    pub half_period: f64,
}

impl StimWaveform {
    pub fn value(&self, time: f64) -> f64 {
        let s = (PI * time / self.half_period).sin();
        self.amplitude / 2.0 * (s.signum() + 1.0) * s
    }
}
