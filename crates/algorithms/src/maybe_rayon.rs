//! Batch execution over independent targets.
//!
//! With the `parallel` feature each item is processed on the rayon pool;
//! without it the same call runs sequentially, so callers never branch on
//! the feature themselves.

#[cfg(feature = "parallel")]
pub fn map_batch<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    T: Sync,
    U: Send,
    F: Fn(&T) -> U + Sync + Send,
{
    use rayon::prelude::*;
    items.par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
pub fn map_batch<T, U, F>(items: &[T], f: F) -> Vec<U>
where
    F: Fn(&T) -> U,
{
    items.iter().map(f).collect()
}
