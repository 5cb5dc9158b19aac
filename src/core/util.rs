//! General helper utilities.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Environment variable overriding the base directory for engine working files.
pub const TMP_DIR_ENV: &str = "TETRA_TMP_DIR";

/// The function `make_uuid` generates a version 4 [Uuid].
///
/// # Example
///
/// ```
/// use tetra_constraints::core::util::make_uuid;
/// let uuid = make_uuid();
/// assert_eq!(uuid.get_version_num(), 4);
/// ```
#[must_use]
pub fn make_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Base directory under which instance-scoped working directories are created.
///
/// Reads [`TMP_DIR_ENV`]; falls back to [`std::env::temp_dir`] when the
/// variable is unset or empty.
#[must_use]
pub fn working_directory_base() -> PathBuf {
    match std::env::var_os(TMP_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir(),
    }
}

/// Exact, hashable key for a coordinate triple.
///
/// Coordinates are compared by their bit patterns after normalizing `-0.0`
/// to `0.0`, so two triples are the same key exactly when they would compare
/// equal with `==` (NaN is rejected before keys are built).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoordKey([u64; 3]);

impl CoordKey {
    /// Builds a key from a coordinate triple.
    #[must_use]
    pub fn new(coords: [f64; 3]) -> Self {
        Self(coords.map(|c| if c == 0.0 { 0.0_f64 } else { c }.to_bits()))
    }

    /// Returns the coordinates this key was built from.
    #[must_use]
    pub fn coords(self) -> [f64; 3] {
        self.0.map(f64::from_bits)
    }
}

impl PartialOrd for CoordKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CoordKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.coords(), other.coords());
        a[0].total_cmp(&b[0])
            .then_with(|| a[1].total_cmp(&b[1]))
            .then_with(|| a[2].total_cmp(&b[2]))
    }
}

/// Squared Euclidean distance between two points.
#[must_use]
pub fn squared_distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx.mul_add(dx, dy.mul_add(dy, dz * dz))
}

/// Returns `true` if all three coordinates are finite.
#[must_use]
pub fn is_finite_point(p: [f64; 3]) -> bool {
    p.iter().all(|c| c.is_finite())
}
