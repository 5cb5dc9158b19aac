//! # tetra-constraints
//!
//! Constraint and parameter model for a constrained 3D Delaunay
//! tetrahedralization engine and its optimization-only variant.
//!
//! The crate does not generate tetrahedra itself. It owns everything around
//! the engine call:
//!
//! - a typed, validated [`ParameterSet`](core::parameters::ParameterSet) with
//!   lazily resolved defaults, versioned optimization levels and legacy-record
//!   import
//! - a [`ConstraintRegistry`](core::constraints::ConstraintRegistry) of enforced
//!   vertices (by coordinate or by geometry) and enforced meshes
//! - algorithm adapters that bind a mesh, its parameters and an injected
//!   [`TetraEngine`](core::engine::TetraEngine), run it in an instance-scoped
//!   working directory and write the result back, including result groups
//! - post-run verification that every enforced position is present
//!
//! # Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use tetra_constraints::prelude::*;
//!
//! let mesh = Mesh::new("volume");
//! let mut algo = TetraAlgorithm::attach(&mesh, None, Arc::new(DisabledEngine::default())).unwrap();
//!
//! algo.set_to_make_groups_of_domains(true);
//! algo.parameters_mut().set_verbose_level(2).unwrap();
//! let kind = algo
//!     .constraints_mut()
//!     .add_enforced_vertex_by_coordinate(50.0, 50.0, 100.0, 2.0, None, Some("tip"))
//!     .unwrap();
//!
//! assert_eq!(kind, EnforcedVertexKind::Grouped);
//! assert_eq!(algo.constraints().enforced_vertex_count(), 1);
//! // No engine is installed, so the adapter is configurable but degraded.
//! assert!(algo.is_degraded());
//! ```
//!
//! # Optimization levels
//!
//! Levels are stored on the canonical five-valued scale. Older documents use a
//! four-valued scale and are converted when read; see
//! [`core::parameters`] for the mapping.
//!
//! # Logging
//!
//! The crate logs through [`tracing`] and installs no subscriber.

#![forbid(unsafe_code)]

#[macro_use]
extern crate derive_builder;

/// Parameters, constraints, engine contract and algorithm adapters.
pub mod core {
    /// Algorithm adapters for the generation pass.
    pub mod algorithm;
    /// Collection aliases used throughout the crate.
    pub mod collections;
    pub mod constraints;
    pub mod engine;
    pub mod error;
    pub mod optimizer;
    pub mod parameters;
    /// JSON persistence of hypotheses and constraints.
    pub mod persistence;
    pub mod session;
    pub mod util;
    pub mod verification;
}

/// In-memory stand-ins for the host platform: geometry study, mesh and the
/// spatial index used to match nodes.
pub mod host {
    pub mod geometry;
    pub mod mesh;
    pub mod spatial;
}

/// A prelude module that re-exports commonly used types.
pub mod prelude {
    pub use crate::core::algorithm::{
        MeshingAlgorithm, OPTIMIZER_HYPOTHESIS, PARAMETERS_HYPOTHESIS, TetraAlgorithm,
        TetrahedralizationSurface,
    };
    pub use crate::core::collections::{FastHashMap, FastHashSet, SmallBuffer};
    pub use crate::core::constraints::{
        ConstraintRegistry, EnforcedMeshEncoding, EnforcedVertex, EnforcedVertexKind, MeshSource,
        ShapeMode, SizeOverride,
    };
    pub use crate::core::engine::{
        AlgorithmKind, Availability, DisabledEngine, EngineFailure, EngineOutput, EngineRequest,
        OutputTetrahedron, TetraEngine,
    };
    pub use crate::core::error::{ConfigurationError, TetraError};
    pub use crate::core::optimizer::{
        OptimizeMode, OptimizerAlgorithm, OptimizerParameters, OptimizerSurface, ThreadSafetyMode,
    };
    pub use crate::core::parameters::{
        LegacyOptimizationLevel, LevelScheme, LogDestination, OptimizationLevel, ParameterSet,
        RunSettings,
    };
    pub use crate::core::session::ComputeReport;
    pub use crate::core::verification::{
        ConstraintMismatch, REFERENCE_TOLERANCE, VerificationReport, verify_enforced_nodes,
        verify_group,
    };
    pub use crate::host::geometry::{GeometryStudy, ShapeKey, ShapeKind};
    pub use crate::host::mesh::{ElementKind, ElementType, Mesh, NodeKey};
}

/// The function `is_normal` checks that structs implement `auto` traits.
/// Traits are checked at compile time, so this function is only used for
/// testing.
#[must_use]
pub const fn is_normal<T: Sized + Send + Sync + Unpin>() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use crate::{is_normal, prelude::*};

    #[test]
    fn normal_types() {
        assert!(is_normal::<ParameterSet>());
        assert!(is_normal::<OptimizerParameters>());
        assert!(is_normal::<ConstraintRegistry>());
        assert!(is_normal::<TetraAlgorithm>());
        assert!(is_normal::<OptimizerAlgorithm>());
        assert!(is_normal::<Mesh>());
    }

    #[test]
    fn test_prelude_collections_exports() {
        let mut map: FastHashMap<u64, usize> = FastHashMap::default();
        map.insert(123, 456);
        assert_eq!(map.get(&123), Some(&456));

        let mut set: FastHashSet<u64> = FastHashSet::default();
        set.insert(789);
        assert!(set.contains(&789));

        let mut buffer: SmallBuffer<i32, 8> = SmallBuffer::new();
        buffer.push(42);
        assert_eq!(buffer.len(), 1);
    }
}
