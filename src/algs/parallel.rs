//! Fork-join utilities shared by every parallel stage.
//!
//! Work is expressed either as a [`ReduceFunctor`] (per-worker scratch
//! created by `initialize`, filled by `execute` over index ranges, merged once
//! by `reduce` after the join) or through the slice helpers below, whose
//! destinations are disjoint by construction. With the `rayon` feature the
//! helpers run on the current Rayon pool; without it they run the same code
//! sequentially.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::mesh_error::MeshError;

/// A range body with per-worker scratch state.
///
/// `initialize` is called once per worker split, `execute` receives disjoint
/// `[begin, end)` ranges in unspecified order, and `reduce` sees every local
/// after all workers have joined. Correctness must not depend on the order of
/// ranges or locals.
pub trait ReduceFunctor: Sync {
    /// Worker-private scratch.
    type Local: Send;
    /// Result of the reduction.
    type Output;

    fn initialize(&self) -> Self::Local;
    fn execute(&self, begin: usize, end: usize, local: &mut Self::Local);
    fn reduce(&self, locals: Vec<Self::Local>) -> Self::Output;
}

/// Run `functor` over `0..n` in chunks of `grain` indices.
pub fn parallel_for<F>(n: usize, grain: usize, functor: &F) -> F::Output
where
    F: ReduceFunctor,
{
    let grain = grain.max(1);
    let chunks = n.div_ceil(grain);
    let range = |chunk: usize| (chunk * grain, ((chunk + 1) * grain).min(n));

    #[cfg(feature = "rayon")]
    let locals: Vec<F::Local> = (0..chunks)
        .into_par_iter()
        .fold(
            || functor.initialize(),
            |mut local, chunk| {
                let (begin, end) = range(chunk);
                functor.execute(begin, end, &mut local);
                local
            },
        )
        .collect();

    #[cfg(not(feature = "rayon"))]
    let locals: Vec<F::Local> = {
        let mut local = functor.initialize();
        for chunk in 0..chunks {
            let (begin, end) = range(chunk);
            functor.execute(begin, end, &mut local);
        }
        vec![local]
    };

    functor.reduce(locals)
}

/// Run `f` on a dedicated pool of `threads` workers.
///
/// Every helper in this module called from inside `f` uses that pool.
pub fn with_workers<R, F>(threads: usize, f: F) -> Result<R, MeshError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    #[cfg(feature = "rayon")]
    {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .build()
            .map_err(|e| MeshError::ThreadPool(e.to_string()))?;
        Ok(pool.install(f))
    }
    #[cfg(not(feature = "rayon"))]
    {
        let _ = threads;
        Ok(f())
    }
}

/// Call `f(i, &mut out[i])` for every element and combine the returned
/// values with an associative, commutative `combine`.
pub fn for_each_mut_reduce<T, A, F, C>(out: &mut [T], identity: A, f: F, combine: C) -> A
where
    T: Send,
    A: Copy + Send + Sync,
    F: Fn(usize, &mut T) -> A + Sync + Send,
    C: Fn(A, A) -> A + Sync + Send,
{
    #[cfg(feature = "rayon")]
    {
        out.par_iter_mut()
            .enumerate()
            .fold(|| identity, |acc, (i, slot)| combine(acc, f(i, slot)))
            .reduce(|| identity, &combine)
    }
    #[cfg(not(feature = "rayon"))]
    {
        out.iter_mut()
            .enumerate()
            .fold(identity, |acc, (i, slot)| combine(acc, f(i, slot)))
    }
}

/// Call `f(i, &mut out[i])` for every element.
pub fn for_each_mut<T, F>(out: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    #[cfg(feature = "rayon")]
    out.par_iter_mut().enumerate().for_each(|(i, slot)| f(i, slot));
    #[cfg(not(feature = "rayon"))]
    out.iter_mut().enumerate().for_each(|(i, slot)| f(i, slot));
}

/// Call `f(i)` for every `i` in `0..n`.
///
/// `f` may only write through interior-mutable shared state (atomics).
pub fn for_each_index<F>(n: usize, f: F)
where
    F: Fn(usize) + Sync + Send,
{
    #[cfg(feature = "rayon")]
    (0..n).into_par_iter().for_each(f);
    #[cfg(not(feature = "rayon"))]
    (0..n).for_each(f);
}

/// Split `data` into the disjoint rows described by CSR `offsets`.
///
/// `offsets` must be non-decreasing, start at 0 and end at `data.len()`.
pub fn split_rows_mut<'a, T>(offsets: &[usize], mut data: &'a mut [T]) -> Vec<&'a mut [T]> {
    let mut rows = Vec::with_capacity(offsets.len().saturating_sub(1));
    for w in offsets.windows(2) {
        let (row, rest) = std::mem::take(&mut data).split_at_mut(w[1] - w[0]);
        rows.push(row);
        data = rest;
    }
    rows
}

/// Call `f(row, &mut data[offsets[row]..offsets[row + 1]])` for every row.
pub fn for_each_row_mut<T, F>(offsets: &[usize], data: &mut [T], f: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    let mut rows = split_rows_mut(offsets, data);
    for_each_mut(&mut rows, |i, row| f(i, &mut **row));
}

/// `(0..n).map(f).collect()`, in index order.
pub fn map_collect<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send,
    F: Fn(usize) -> R + Sync + Send,
{
    #[cfg(feature = "rayon")]
    {
        (0..n).into_par_iter().map(f).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..n).map(f).collect()
    }
}

/// Indices in `0..n` satisfying `pred`, in increasing order.
pub fn indices_where<F>(n: usize, pred: F) -> Vec<usize>
where
    F: Fn(usize) -> bool + Sync + Send,
{
    #[cfg(feature = "rayon")]
    {
        (0..n).into_par_iter().filter(|&i| pred(i)).collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        (0..n).filter(|&i| pred(i)).collect()
    }
}

/// Unstable sort by key; equal keys end up in unspecified relative order.
pub fn sort_unstable_by_key<T, K, F>(data: &mut [T], key: F)
where
    T: Send,
    K: Ord + Send,
    F: Fn(&T) -> K + Sync,
{
    #[cfg(feature = "rayon")]
    data.par_sort_unstable_by_key(key);
    #[cfg(not(feature = "rayon"))]
    data.sort_unstable_by_key(key);
}

/// Exclusive prefix sum: returns `n + 1` offsets for `n` counts.
pub fn exclusive_scan(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut acc = 0usize;
    offsets.push(0);
    for &c in counts {
        acc += c;
        offsets.push(acc);
    }
    offsets
}
