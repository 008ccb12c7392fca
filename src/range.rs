//! Index spaces and the half-open ranges that live inside them.
//!
//! This is the pure, non-parallel algebra described as component A: an
//! [`IndexSpace`] is an immutable N-D (`N` in `1..=3`) rectangular coordinate
//! domain, and a [`Range`] is a half-open sub-box of one. Ranges compose via
//! [`Range::intersect`], which is the single primitive the transition planner
//! (`planner.rs`) builds on.
//!
//! The representation mirrors the teacher's closed-open [`Window`]-style
//! interval (total order, hashable, a dedicated `tumble`-like constructor)
//! but generalized from one dimension to up to three, carried in fixed-size
//! arrays rather than a `Vec` so `Range` stays `Copy`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum supported dimensionality, per spec: N ∈ {1, 2, 3}.
pub const MAX_DIMS: usize = 3;

/// An immutable, named N-D coordinate domain.
///
/// Created once via [`IndexSpace::new`] and never mutated afterwards;
/// partitionings, containers, and reservations all hold a handle to one
/// (see [`crate::instance::SpaceId`]) rather than a direct reference.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexSpace {
    name: String,
    dims: usize,
    extents: [i64; MAX_DIMS],
}

impl IndexSpace {
    /// Create a new space with the given extents (one per dimension, 1-3 of them).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::InvalidIndexSpace`] if `extents` is
    /// empty, has more than [`MAX_DIMS`] entries, or any extent is negative.
    pub fn new(name: impl Into<String>, extents: &[i64]) -> crate::error::Result<Self> {
        if extents.is_empty() || extents.len() > MAX_DIMS {
            return Err(crate::error::Error::InvalidIndexSpace(format!(
                "dimension count must be in 1..={MAX_DIMS}, got {}",
                extents.len()
            )));
        }
        if extents.iter().any(|&e| e < 0) {
            return Err(crate::error::Error::InvalidIndexSpace(format!(
                "extents must be non-negative, got {extents:?}"
            )));
        }
        let mut arr = [0i64; MAX_DIMS];
        arr[..extents.len()].copy_from_slice(extents);
        Ok(Self {
            name: name.into(),
            dims: extents.len(),
            extents: arr,
        })
    }

    /// Number of dimensions (1, 2, or 3).
    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    /// Extents of each dimension, one entry per `dims()`.
    #[must_use]
    pub fn extents(&self) -> &[i64] {
        &self.extents[..self.dims]
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total element count across the whole space.
    #[must_use]
    pub fn element_count(&self) -> u64 {
        self.extents()
            .iter()
            .map(|&e| u64::try_from(e).unwrap_or(0))
            .product()
    }

    /// The range covering the full extent of the space.
    #[must_use]
    pub fn full_range(&self) -> Range {
        Range::from_extents(self.dims, self.extents())
    }
}

/// A half-open box `[from_0, to_0) x ... x [from_{d-1}, to_{d-1})` within one space.
///
/// Invariant: `from <= to` componentwise. If any dimension has zero width the
/// range is empty (`is_empty()`), though it is still a valid value — empty
/// ranges arise naturally from intersections and are dropped by the planner
/// rather than rejected at construction.
#[derive(Clone, Copy, Serialize, Deserialize, Eq)]
pub struct Range {
    dims: usize,
    from: [i64; MAX_DIMS],
    to: [i64; MAX_DIMS],
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range(")?;
        for d in 0..self.dims {
            if d > 0 {
                write!(f, " x ")?;
            }
            write!(f, "[{},{})", self.from[d], self.to[d])?;
        }
        write!(f, ")")
    }
}

impl PartialEq for Range {
    fn eq(&self, other: &Self) -> bool {
        self.dims == other.dims
            && self.from[..self.dims] == other.from[..self.dims]
            && self.to[..self.dims] == other.to[..self.dims]
    }
}

impl std::hash::Hash for Range {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.dims.hash(state);
        self.from[..self.dims].hash(state);
        self.to[..self.dims].hash(state);
    }
}

impl Range {
    /// Construct a 1-D range `[from, to)`. Clamps an inverted range to empty.
    #[must_use]
    pub fn new_1d(from: i64, to: i64) -> Self {
        Self::new(&[from], &[to])
    }

    /// Construct a 2-D range `[from0,to0) x [from1,to1)`.
    #[must_use]
    pub fn new_2d(from: (i64, i64), to: (i64, i64)) -> Self {
        Self::new(&[from.0, from.1], &[to.0, to.1])
    }

    /// Construct a 3-D range.
    #[must_use]
    pub fn new_3d(from: (i64, i64, i64), to: (i64, i64, i64)) -> Self {
        Self::new(&[from.0, from.1, from.2], &[to.0, to.1, to.2])
    }

    /// Construct from arbitrary-length `from`/`to` slices (1-3 dims). Panics
    /// (debug) if the lengths differ or exceed [`MAX_DIMS`].
    #[must_use]
    pub fn new(from: &[i64], to: &[i64]) -> Self {
        debug_assert_eq!(from.len(), to.len());
        debug_assert!(!from.is_empty() && from.len() <= MAX_DIMS);
        let dims = from.len();
        let mut f = [0i64; MAX_DIMS];
        let mut t = [0i64; MAX_DIMS];
        for d in 0..dims {
            // clamp `to < from` to an empty range at `from`, rather than
            // carry a negative-width box through the algebra.
            f[d] = from[d];
            t[d] = to[d].max(from[d]);
        }
        Self { dims, from: f, to: t }
    }

    /// A zero-width range anchored at the origin of a `dims`-dimensional space.
    #[must_use]
    pub fn empty(dims: usize) -> Self {
        Self { dims, from: [0; MAX_DIMS], to: [0; MAX_DIMS] }
    }

    fn from_extents(dims: usize, extents: &[i64]) -> Self {
        let mut to = [0i64; MAX_DIMS];
        to[..dims].copy_from_slice(extents);
        Self { dims, from: [0; MAX_DIMS], to }
    }

    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    #[must_use]
    pub fn from(&self) -> &[i64] {
        &self.from[..self.dims]
    }

    #[must_use]
    pub fn to(&self) -> &[i64] {
        &self.to[..self.dims]
    }

    /// Width of dimension `d`.
    #[must_use]
    pub fn width(&self, d: usize) -> i64 {
        self.to[d] - self.from[d]
    }

    /// True if any dimension has zero width.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..self.dims).any(|d| self.width(d) == 0)
    }

    /// Number of elements covered (0 if empty).
    #[must_use]
    pub fn size(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        (0..self.dims)
            .map(|d| u64::try_from(self.width(d)).unwrap_or(0))
            .product()
    }

    /// Componentwise max-of-froms / min-of-tos. `None` if the result is empty
    /// in at least one dimension, matching spec's "result valid iff `from <
    /// to` in every dimension". Ranges from different spaces/dimensionality
    /// must never be intersected; callers are expected to have already
    /// checked dimensionality via the owning [`IndexSpace`].
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        debug_assert_eq!(self.dims, other.dims);
        let dims = self.dims;
        let mut from = [0i64; MAX_DIMS];
        let mut to = [0i64; MAX_DIMS];
        for d in 0..dims {
            from[d] = self.from[d].max(other.from[d]);
            to[d] = self.to[d].min(other.to[d]);
            if from[d] >= to[d] {
                return None;
            }
        }
        Some(Self { dims, from, to })
    }

    /// Size of the intersection without materializing it (0 if disjoint).
    #[must_use]
    pub fn intersection_size(&self, other: &Self) -> u64 {
        self.intersect(other).map_or(0, |r| r.size())
    }

    /// True if `index` (one coordinate per dimension) lies within this range.
    #[must_use]
    pub fn contains_index(&self, index: &[i64]) -> bool {
        debug_assert_eq!(index.len(), self.dims);
        (0..self.dims).all(|d| index[d] >= self.from[d] && index[d] < self.to[d])
    }

    /// Canonical row-major linearization of `index` relative to this range's
    /// own origin — i.e. the offset of `index` within a buffer laid out for
    /// exactly this range. `index` must be contained in the range.
    #[must_use]
    pub fn linearize(&self, index: &[i64]) -> u64 {
        debug_assert!(self.contains_index(index));
        let mut offset: u64 = 0;
        for d in 0..self.dims {
            let local = u64::try_from(index[d] - self.from[d]).unwrap_or(0);
            offset = offset * u64::try_from(self.width(d).max(1)).unwrap_or(1) + local;
        }
        offset
    }

    /// Inverse of [`Range::linearize`]: recover the global index at row-major
    /// `offset` within a buffer laid out for exactly this range.
    #[must_use]
    pub fn delinearize(&self, offset: u64) -> Vec<i64> {
        let mut idx = vec![0i64; self.dims];
        let mut remaining = offset;
        for d in (0..self.dims).rev() {
            let extent = u64::try_from(self.width(d).max(1)).unwrap_or(1);
            let local = remaining % extent;
            remaining /= extent;
            idx[d] = self.from[d] + i64::try_from(local).unwrap_or(0);
        }
        idx
    }

    /// Iterate every coordinate contained in this range, row-major. Used by
    /// the container executor to walk a `Copy`/`Fill`/reduce action's range
    /// one element at a time; fine for the sizes exercised by tests and the
    /// local backend, not meant for hot-path bulk transfer.
    pub fn iter_indices(&self) -> impl Iterator<Item = Vec<i64>> + '_ {
        let dims = self.dims;
        let sizes: Vec<i64> = (0..dims).map(|d| self.width(d)).collect();
        let total: i64 = sizes.iter().product();
        (0..total).map(move |mut linear| {
            let mut idx = vec![0i64; dims];
            for d in (0..dims).rev() {
                let extent = sizes[d].max(1);
                idx[d] = self.from[d] + (linear % extent);
                linear /= extent;
            }
            idx
        })
    }

    /// Extend this range by `depth` along every inner face, clamped to
    /// `bound` (normally the owning space's full range). Used by the halo
    /// partitioner (`partitioner::halo`).
    #[must_use]
    pub fn extended(&self, depth: i64, bound: &Self) -> Self {
        debug_assert_eq!(self.dims, bound.dims);
        let mut from = [0i64; MAX_DIMS];
        let mut to = [0i64; MAX_DIMS];
        for d in 0..self.dims {
            from[d] = (self.from[d] - depth).max(bound.from[d]);
            to[d] = (self.to[d] + depth).min(bound.to[d]);
        }
        Self { dims: self.dims, from, to }
    }
}

impl PartialOrd for Range {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Total order by `from` then `to`, matching the tie-break rule used
/// throughout the partitioners ("lower starting index wins").
impl Ord for Range {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.from[..self.dims]
            .cmp(&other.from[..other.dims])
            .then_with(|| self.to[..self.dims].cmp(&other.to[..other.dims]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_range_matches_extents() {
        let s = IndexSpace::new("s", &[4, 5]).unwrap();
        let r = s.full_range();
        assert_eq!(r.from(), &[0, 0]);
        assert_eq!(r.to(), &[4, 5]);
        assert_eq!(r.size(), 20);
    }

    #[test]
    fn intersect_disjoint_is_none() {
        let a = Range::new_1d(0, 5);
        let b = Range::new_1d(5, 10);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn intersect_overlapping() {
        let a = Range::new_2d((0, 0), (4, 4));
        let b = Range::new_2d((2, 2), (6, 6));
        let i = a.intersect(&b).unwrap();
        assert_eq!(i.from(), &[2, 2]);
        assert_eq!(i.to(), &[4, 4]);
        assert_eq!(i.size(), 4);
    }

    #[test]
    fn extended_clamps_to_bound() {
        let bound = Range::new_2d((0, 0), (10, 10));
        let base = Range::new_2d((2, 2), (5, 5));
        let grown = base.extended(1, &bound);
        assert_eq!(grown.from(), &[1, 1]);
        assert_eq!(grown.to(), &[6, 6]);
    }

    #[test]
    fn invalid_space_rejected() {
        assert!(IndexSpace::new("s", &[]).is_err());
        assert!(IndexSpace::new("s", &[1, 2, 3, 4]).is_err());
        assert!(IndexSpace::new("s", &[-1]).is_err());
    }
}
