//! Conditional parallel iteration helpers.
//!
//! These functions provide parallel iteration when the `native` feature is
//! enabled (using rayon), and fall back to sequential iteration on web
//! (wasm32).

#[cfg(feature = "native")]
use rayon::prelude::*;

/// Process a range in parallel (native) or sequentially (web), returning results.
#[cfg(feature = "native")]
pub fn map_range<R, F>(range: std::ops::Range<usize>, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    range.into_par_iter().map(f).collect()
}

#[cfg(not(feature = "native"))]
pub fn map_range<R, F>(range: std::ops::Range<usize>, f: F) -> Vec<R>
where
    F: Fn(usize) -> R,
{
    range.into_iter().map(f).collect()
}

/// Process a slice in parallel (native) or sequentially (web), returning results.
#[cfg(feature = "native")]
pub fn map_slice<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    items.par_iter().map(f).collect()
}

#[cfg(not(feature = "native"))]
pub fn map_slice<T, R, F>(items: &[T], f: F) -> Vec<R>
where
    F: Fn(&T) -> R,
{
    items.iter().map(f).collect()
}
