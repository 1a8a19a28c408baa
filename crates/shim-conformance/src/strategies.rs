//! proptest strategies for conformance inputs.

use proptest::prelude::*;

/// Dims in `1..=max_dim` with rank in `min_rank..=max_rank`.
pub fn dims(min_rank: usize, max_rank: usize, max_dim: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..=max_dim, min_rank..=max_rank)
}

/// A shape together with matching finite data.
pub fn array(min_rank: usize, max_rank: usize) -> impl Strategy<Value = (Vec<usize>, Vec<f32>)> {
    dims(min_rank, max_rank, 4).prop_flat_map(|d| {
        let n = d.iter().product::<usize>();
        (Just(d), prop::collection::vec(-50.0f32..50.0, n))
    })
}

/// An array plus one valid axis.
pub fn array_and_axis(min_rank: usize, max_rank: usize) -> impl Strategy<Value = (Vec<usize>, Vec<f32>, usize)> {
    array(min_rank.max(1), max_rank).prop_flat_map(|(d, data)| {
        let rank = d.len();
        (Just(d), Just(data), 0..rank)
    })
}

/// `(before, after)` pairs, one per axis, each below `max_width`.
pub fn widths(rank: usize, max_width: usize) -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..max_width, 0..max_width), rank)
}

/// Integer indices for an axis of `extent`, including out-of-range ones.
pub fn loose_indices(extent: usize, len: usize) -> impl Strategy<Value = Vec<i64>> {
    let reach = extent as i64 + 3;
    prop::collection::vec(-reach..reach, len)
}
