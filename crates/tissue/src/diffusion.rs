//! Second-difference coupling of the membrane potential between neighbouring
//! cells.

use std::ops::Range;

use ndarray::{ArrayView3, ArrayViewMut3};

use crate::stimulus::StimRegion;

/// Adds the masked diffusion term for `rows` of the global membrane-potential
/// field into the matching rows of `out`.
///
/// `vm` spans the whole grid and the stencil wraps over its global extents;
/// `rows` selects the slab the caller owns (ghost rows included). The
/// stimulus boxes are given in slab-local coordinates and are zeroed while
/// `stimulating` holds, so injected cells do not leak current into their
/// neighbours. `mask` and `out` cover the slab only.
#[allow(clippy::too_many_arguments)]
pub fn add_membrane_coupling(
    vm: ArrayView3<'_, f64>,
    rows: Range<usize>,
    coefficients: [f64; 3],
    dimensionality: usize,
    stimulating: bool,
    regions: [Option<StimRegion>; 2],
    mask: ArrayView3<'_, f64>,
    mut out: ArrayViewMut3<'_, f64>,
) {
    if dimensionality == 0 {
        return;
    }
    let (nx, ny, nz) = vm.dim();
    let [dx, dy, dz] = coefficients;
    for gi in rows.clone() {
        let li = gi - rows.start;
        let (xm, xp) = ((gi + nx - 1) % nx, (gi + 1) % nx);
        for j in 0..ny {
            let (ym, yp) = ((j + ny - 1) % ny, (j + 1) % ny);
            for k in 0..nz {
                let mut coupling =
                    dx * (vm[[xm, j, k]] - 2.0 * vm[[gi, j, k]] + vm[[xp, j, k]]);
                if dimensionality >= 2 {
                    coupling +=
                        dy * (vm[[gi, ym, k]] - 2.0 * vm[[gi, j, k]] + vm[[gi, yp, k]]);
                }
                if dimensionality == 3 {
                    let (zm, zp) = ((k + nz - 1) % nz, (k + 1) % nz);
                    coupling +=
                        dz * (vm[[gi, j, zm]] - 2.0 * vm[[gi, j, k]] + vm[[gi, j, zp]]);
                }
                if stimulating && regions.iter().flatten().any(|r| r.contains(li, j, k)) {
                    coupling = 0.0;
                }
                out[[li, j, k]] += coupling * mask[[li, j, k]];
            }
        }
    }
}
