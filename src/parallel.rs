//! Parallel or sequential mapping, chosen by the `parallel` feature.
//!
//! The `cfg` switch lives here only. Every helper also takes a runtime
//! `force_sequential` flag so a parallel build can still be run (and
//! compared) sequentially.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Maps `f` over `slice`, in parallel when the `parallel` feature is on.
///
/// Results are returned in input order either way.
#[inline]
pub fn map_slice<T, F, R>(slice: &[T], f: F, force_sequential: bool) -> Vec<R>
where
    T: Sync,
    F: Fn(&T) -> R + Sync + Send,
    R: Send,
{
    #[cfg(feature = "parallel")]
    {
        if force_sequential {
            slice.iter().map(f).collect()
        } else {
            slice.par_iter().map(f).collect()
        }
    }

    #[cfg(not(feature = "parallel"))]
    {
        let _ = force_sequential;
        slice.iter().map(f).collect()
    }
}
