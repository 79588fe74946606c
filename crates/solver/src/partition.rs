//! Domain decomposition of the leading grid axis.

use std::ops::Range;

use crate::{Result, SolverError};

/// Splits `nx` rows into contiguous per-worker ranges with a two-row ghost
/// overlap between neighbours.
///
/// The ranges cover `[0, nx)`, adjacent ranges share exactly two rows, local
/// extents differ by at most one, and their sum is `nx + 2 * (workers - 1)`.
/// The first and last row of a range are ghosts whenever a neighbour on that
/// side exists.
pub fn partition_rows(nx: usize, workers: usize) -> Result<Vec<Range<usize>>> {
    if workers == 0 || workers > nx {
        return Err(SolverError::Partition { nx, workers });
    }
    let total = nx + 2 * (workers - 1);
    let base = total / workers;
    let extra = total % workers;
    let mut ranges = Vec::with_capacity(workers);
    let mut start = 0;
    for rank in 0..workers {
        let len = base + usize::from(rank < extra);
        let shift = 2 * rank;
        ranges.push(start - shift..start + len - shift);
        start += len;
    }
    Ok(ranges)
}
