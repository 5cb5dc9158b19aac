//! Checks that a computed mesh honors its enforced positions.
//!
//! Each expected position is paired with a distinct mesh node within the
//! tolerance, closest candidate first. Two expected positions never share a
//! node, so `N` enforced vertices need `N` distinct result nodes.

use crate::core::collections::FastHashSet;
use crate::core::util::squared_distance;
use crate::host::mesh::{Group, Mesh, NodeKey};
use crate::host::spatial::HashGridIndex;
use thiserror::Error;

/// Tolerance for comparing result nodes to reference positions.
pub const REFERENCE_TOLERANCE: f64 = 1e-7;

/// Enforced positions that the result does not contain.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{matched} of {expected} enforced positions found in the result ({} missing)", .unmatched.len())]
pub struct ConstraintMismatch {
    /// Number of positions that were checked.
    pub expected: usize,
    /// Number of positions paired with a result node.
    pub matched: usize,
    /// Positions with no result node within tolerance.
    pub unmatched: Vec<[f64; 3]>,
    /// Node count of the checked group, when a group was checked.
    pub group_size: Option<usize>,
}

/// Outcome of pairing reference positions with mesh nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationReport {
    /// Result node paired with each reference position, in input order.
    pub pairs: Vec<([f64; 3], Option<NodeKey>)>,
}

impl VerificationReport {
    /// Number of paired positions.
    #[must_use]
    pub fn matched(&self) -> usize {
        self.pairs.iter().filter(|(_, n)| n.is_some()).count()
    }

    /// Positions without a paired node.
    #[must_use]
    pub fn unmatched(&self) -> Vec<[f64; 3]> {
        self.pairs
            .iter()
            .filter(|(_, n)| n.is_none())
            .map(|(p, _)| *p)
            .collect()
    }

    /// Returns `true` if every position was paired.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.pairs.iter().all(|(_, n)| n.is_some())
    }

    fn into_result(self, group_size: Option<usize>) -> Result<Self, ConstraintMismatch> {
        let size_ok = group_size.is_none_or(|size| size == self.pairs.len());
        if self.is_complete() && size_ok {
            return Ok(self);
        }
        Err(ConstraintMismatch {
            expected: self.pairs.len(),
            matched: self.matched(),
            unmatched: self.unmatched(),
            group_size,
        })
    }
}

fn pair_positions(
    candidates: &[(NodeKey, [f64; 3])],
    expected: &[[f64; 3]],
    tolerance: f64,
) -> VerificationReport {
    let tolerance = tolerance.max(0.0);
    let mut grid = HashGridIndex::new(tolerance);
    for &(key, coords) in candidates {
        grid.insert(key, coords);
    }

    let mut taken: FastHashSet<NodeKey> = FastHashSet::default();
    let mut pairs = Vec::with_capacity(expected.len());
    for &point in expected {
        let hits: Vec<(NodeKey, f64)> = if grid.is_usable() {
            grid.within(point, tolerance)
        } else {
            let mut hits: Vec<(NodeKey, f64)> = candidates
                .iter()
                .map(|&(k, c)| (k, squared_distance(c, point)))
                .filter(|(_, d)| *d <= tolerance * tolerance)
                .collect();
            hits.sort_by(|a, b| a.1.total_cmp(&b.1));
            hits
        };
        let node = hits.into_iter().map(|(k, _)| k).find(|k| !taken.contains(k));
        if let Some(node) = node {
            taken.insert(node);
        }
        pairs.push((point, node));
    }
    VerificationReport { pairs }
}

/// Pairs every expected position with a distinct node of `mesh`.
///
/// # Errors
///
/// Returns [`ConstraintMismatch`] listing the positions without a node.
///
/// # Examples
///
/// ```
/// use tetra_constraints::core::verification::{verify_enforced_nodes, REFERENCE_TOLERANCE};
/// use tetra_constraints::host::mesh::Mesh;
///
/// let mut mesh = Mesh::new("m");
/// mesh.add_node([50.0, 50.0, 100.0]);
/// let report = verify_enforced_nodes(&mesh, &[[50.0, 50.0, 100.0]], REFERENCE_TOLERANCE).unwrap();
/// assert_eq!(report.matched(), 1);
/// ```
pub fn verify_enforced_nodes(
    mesh: &Mesh,
    expected: &[[f64; 3]],
    tolerance: f64,
) -> Result<VerificationReport, ConstraintMismatch> {
    let candidates: Vec<(NodeKey, [f64; 3])> = mesh.nodes().collect();
    pair_positions(&candidates, expected, tolerance).into_result(None)
}

/// Distinct nodes of a group, from its nodes or its elements' corners.
fn group_nodes(mesh: &Mesh, group: &Group) -> Vec<(NodeKey, [f64; 3])> {
    let mut seen: FastHashSet<NodeKey> = FastHashSet::default();
    let element_nodes = group
        .elements()
        .iter()
        .filter_map(|e| mesh.element(*e))
        .flat_map(|e| e.nodes().iter().copied());
    group
        .nodes()
        .iter()
        .copied()
        .chain(element_nodes)
        .filter(|n| seen.insert(*n))
        .filter_map(|n| mesh.node(n).map(|c| (n, c)))
        .collect()
}

/// Checks that group `name` holds exactly the nodes at `expected`.
///
/// # Errors
///
/// Returns [`ConstraintMismatch`] if a position has no node in the group, or
/// if the group holds a different number of nodes. A missing group counts as
/// empty.
pub fn verify_group(
    mesh: &Mesh,
    name: &str,
    expected: &[[f64; 3]],
    tolerance: f64,
) -> Result<VerificationReport, ConstraintMismatch> {
    let candidates = mesh
        .group(name)
        .map(|g| group_nodes(mesh, g))
        .unwrap_or_default();
    pair_positions(&candidates, expected, tolerance).into_result(Some(candidates.len()))
}
