//! Full-grid state field shared by the integration workers.

use std::cell::UnsafeCell;

use ndarray::{Array4, ArrayView4, ArrayViewMut4};

/// State array every worker reads and commits into between barriers.
///
/// The integration protocol is phase-based: between two barrier waits the
/// workers either all read, or each writes a disjoint row range. The unsafe
/// view constructors encode that contract; the field itself performs no
/// locking. Cells are wrapped individually so no reference to the whole
/// buffer is ever formed while workers hold views into it.
pub struct SharedState {
    cells: Vec<UnsafeCell<f64>>,
    shape: (usize, usize, usize, usize),
}

// Access is coordinated by the barrier protocol above.
unsafe impl Sync for SharedState {}

impl SharedState {
    pub fn new(state: &Array4<f64>) -> Self {
        Self {
            cells: state.iter().map(|&v| UnsafeCell::new(v)).collect(),
            shape: state.dim(),
        }
    }

    fn base(&self) -> *mut f64 {
        // UnsafeCell<f64> is layout-compatible with f64.
        self.cells.as_ptr() as *mut f64
    }

    /// Read-only view of the whole field.
    ///
    /// # Safety
    ///
    /// No worker may be in its commit phase while the view is alive.
    pub unsafe fn view(&self) -> ArrayView4<'_, f64> {
        ArrayView4::from_shape_ptr(self.shape, self.base() as *const f64)
    }

    /// Mutable view of rows `[r0, r1)` only.
    ///
    /// # Safety
    ///
    /// Concurrent callers must request disjoint row ranges, and no read view
    /// may be alive.
    pub unsafe fn rows_mut(&self, r0: usize, r1: usize) -> ArrayViewMut4<'_, f64> {
        let (_, ny, nz, dim) = self.shape;
        let stride = ny * nz * dim;
        ArrayViewMut4::from_shape_ptr((r1 - r0, ny, nz, dim), self.base().add(r0 * stride))
    }

    pub fn into_array(self) -> Array4<f64> {
        let shape = self.shape;
        let data = self.cells.into_iter().map(UnsafeCell::into_inner).collect();
        Array4::from_shape_vec(shape, data).expect("the flat buffer always matches the stored shape")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn round_trips_through_views() {
        let source = Array4::from_shape_fn((4, 2, 1, 3), |(i, j, _, c)| {
            i as f64 * 100.0 + j as f64 * 10.0 + c as f64
        });
        let shared = SharedState::new(&source);
        unsafe {
            assert_eq!(shared.view(), source.view());
            let mut rows = shared.rows_mut(1, 3);
            rows[[0, 0, 0, 0]] = -1.0;
            rows[[1, 1, 0, 2]] = -2.0;
        }
        let back = shared.into_array();
        assert_eq!(back[[1, 0, 0, 0]], -1.0);
        assert_eq!(back[[2, 1, 0, 2]], -2.0);
        assert_eq!(back[[0, 0, 0, 0]], source[[0, 0, 0, 0]]);
    }
}
