//! Spatial hash-grid index over 3D points.
//!
//! Used for coincident-node detection and for matching engine output nodes
//! back onto existing mesh nodes. The grid is ephemeral: callers build it for
//! one query batch and drop it.

use crate::core::collections::{FastHashMap, SmallBuffer};
use crate::core::util::squared_distance;

const BUCKET_INLINE_CAPACITY: usize = 8;

/// Integer cell coordinates of a grid bucket.
type GridKey = [i64; 3];

/// A simple spatial hash grid mapping grid cells to nearby keys.
///
/// The grid uses a fixed `cell_size` and indexes points by the floored cell
/// coordinates `floor(coord / cell_size)`. Queries visit the 27 cells around
/// the query point, so any point within `cell_size` of the query is a
/// candidate.
#[derive(Clone, Debug)]
pub struct HashGridIndex<K> {
    cell_size: f64,
    usable: bool,
    cells: FastHashMap<GridKey, SmallBuffer<(K, [f64; 3]), BUCKET_INLINE_CAPACITY>>,
}

impl<K: Copy> HashGridIndex<K> {
    /// Create a new grid index with the given cell size.
    ///
    /// A non-finite or non-positive cell size yields an unusable index;
    /// callers then fall back to linear scans.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            usable: cell_size.is_finite() && cell_size > 0.0,
            cells: FastHashMap::default(),
        }
    }

    /// Whether queries against this index are meaningful.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.usable
    }

    /// Cell edge length.
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Insert a point into the appropriate grid cell.
    ///
    /// If the point cannot be keyed (non-finite, or too far out for unit cell
    /// resolution) the whole index is disabled.
    pub fn insert(&mut self, key: K, coords: [f64; 3]) {
        if !self.usable {
            return;
        }
        let Some(cell) = self.key_for_coords(coords) else {
            self.usable = false;
            return;
        };
        self.cells.entry(cell).or_default().push((key, coords));
    }

    /// Visit all candidates in the 27-cell neighborhood around `coords`.
    ///
    /// The visitor returns `false` to stop early. Returns `true` if the index
    /// was used for the query (even if it yielded zero candidates).
    pub fn for_each_candidate<F>(&self, coords: [f64; 3], mut f: F) -> bool
    where
        F: FnMut(K, [f64; 3]) -> bool,
    {
        if !self.usable {
            return false;
        }
        let Some(base) = self.key_for_coords(coords) else {
            return false;
        };

        'outer: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let neighbor = [base[0] + dx, base[1] + dy, base[2] + dz];
                    let Some(bucket) = self.cells.get(&neighbor) else {
                        continue;
                    };
                    for &(key, point) in bucket {
                        if !f(key, point) {
                            break 'outer;
                        }
                    }
                }
            }
        }
        true
    }

    /// Returns every indexed key within `tolerance` of `coords`, closest first.
    ///
    /// `tolerance` must not exceed the cell size for the result to be complete.
    #[must_use]
    pub fn within(&self, coords: [f64; 3], tolerance: f64) -> Vec<(K, f64)> {
        let tol_sq = tolerance * tolerance;
        let mut hits = Vec::new();
        self.for_each_candidate(coords, |key, point| {
            let d = squared_distance(coords, point);
            if d <= tol_sq {
                hits.push((key, d));
            }
            true
        });
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key_for_coords(&self, coords: [f64; 3]) -> Option<GridKey> {
        let mut key = [0_i64; 3];
        for (slot, coord) in key.iter_mut().zip(coords) {
            if !coord.is_finite() {
                return None;
            }
            let cell = (coord / self.cell_size).floor();
            // Past 2^53 neighbor enumeration would be lossy.
            if !cell.is_finite() || cell.abs() > 9.0e15 {
                return None;
            }
            *slot = cell as i64;
        }
        Some(key)
    }
}
