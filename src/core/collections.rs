//! Collection aliases used throughout the crate.
//!
//! Mesh entities are stored in slot maps with type-safe keys, and internal
//! lookups go through `rustc_hash`-backed maps. These aliases keep the
//! concrete choices in one place.

use rustc_hash::{FxHashMap, FxHashSet};
use slotmap::SlotMap;
use smallvec::SmallVec;

// Re-export UUID for convenience in type aliases
pub use uuid::Uuid;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Storage backend for mesh and geometry entities.
///
/// Keys handed out by the map stay valid until the entity is removed, which
/// lets groups and sub-meshes refer to nodes and elements without indices
/// being invalidated by unrelated removals.
///
/// # Examples
///
/// ```rust
/// use tetra_constraints::core::collections::StorageMap;
/// use tetra_constraints::host::mesh::NodeKey;
///
/// let mut nodes: StorageMap<NodeKey, [f64; 3]> = StorageMap::with_key();
/// let key = nodes.insert([0.0, 0.0, 0.0]);
/// assert_eq!(nodes[key], [0.0, 0.0, 0.0]);
/// ```
pub type StorageMap<K, V> = SlotMap<K, V>;

// =============================================================================
// CORE OPTIMIZED TYPES
// =============================================================================

/// Optimized `HashMap` for internal lookups.
///
/// Uses `rustc_hash::FxHasher`. Not DoS-resistant: only use with trusted,
/// internal keys.
///
/// # Examples
///
/// ```rust
/// use tetra_constraints::core::collections::FastHashMap;
///
/// let mut map: FastHashMap<u64, usize> = FastHashMap::default();
/// map.insert(123, 456);
/// ```
pub type FastHashMap<K, V> = FxHashMap<K, V>;

/// Optimized `HashSet` for internal membership tests.
pub type FastHashSet<T> = FxHashSet<T>;

/// Re-export the Entry enum for `FastHashMap`.
pub use std::collections::hash_map::Entry;

/// Small-optimized Vec that stays on the stack for up to `N` elements.
///
/// Element connectivity (2 to 4 nodes for the kinds handled here) and
/// hash-grid buckets use this.
pub type SmallBuffer<T, const N: usize> = SmallVec<[T; N]>;

/// Inline capacity for element node lists (a tetrahedron has four corners).
pub const MAX_ELEMENT_NODES: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fast_collections_basic_operations() {
        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        assert!(map.is_empty());
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut set: FastHashSet<u64> = FastHashSet::default();
        set.insert(789);
        assert!(set.contains(&789));
        assert!(!set.contains(&999));
    }

    #[test]
    fn test_small_buffer_spills_past_element_capacity() {
        let mut buffer: SmallBuffer<usize, MAX_ELEMENT_NODES> = SmallBuffer::new();
        for i in 0..MAX_ELEMENT_NODES {
            buffer.push(i);
        }
        assert!(!buffer.spilled());

        buffer.push(MAX_ELEMENT_NODES);
        assert!(buffer.spilled());
    }
}
