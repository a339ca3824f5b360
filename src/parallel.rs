//! Fixed-size worker fan-out over contiguous output chunks.
//!
//! Each parallel operation splits its output into at most one chunk per
//! worker cache, so every worker owns its scratch space and its slice of
//! the output for the duration of the call and nothing is shared mutably.
use rayon::prelude::*;

use crate::error::{InterpolationError, Result};

/// Worker count: the hardware parallelism, or 1 if it cannot be queried.
pub fn available_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Length of the chunks that split `n` items across `workers`.
#[inline]
pub(crate) fn chunk_len(n: usize, workers: usize) -> usize {
    n.div_ceil(workers.max(1)).max(1)
}

/// Run `f(cache, start, chunk)` over `out`, either in one piece on the
/// first cache or split across all caches, where `start` is the index of
/// the chunk's first item in `out`.
pub(crate) fn for_each_chunk<T, C, F>(
    out: &mut [T],
    caches: &mut [C],
    parallel: bool,
    f: F,
) -> Result<()>
where
    T: Send,
    C: Send,
    F: Fn(&mut C, usize, &mut [T]) -> Result<()> + Sync,
{
    if out.is_empty() {
        return Ok(());
    }
    if caches.is_empty() {
        return Err(InterpolationError::InvalidWorker {
            worker: 0,
            workers: 0,
        });
    }
    if !parallel || caches.len() == 1 {
        return f(&mut caches[0], 0, out);
    }

    let chunk = chunk_len(out.len(), caches.len());
    out.par_chunks_mut(chunk)
        .zip(caches.par_iter_mut())
        .enumerate()
        .try_for_each(|(i, (out, cache))| f(cache, i * chunk, out))
}
