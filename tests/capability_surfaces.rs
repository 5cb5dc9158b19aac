//! Compile-time capability checks for the two algorithm adapters, plus the
//! optimization-level mapping they share.
//!
//! The optimizer must not expose hole meshing, boundary recovery or any
//! constraint operation. That is a property of the type, so it is checked on
//! trait implementations rather than by calling anything at run time.

use std::marker::PhantomData;
use tetra_constraints::prelude::*;

/// Answers "does `T` implement the trait?" for a concrete `T`.
///
/// The inherent constant only exists when the bound holds; otherwise name
/// resolution falls back to the blanket trait constant.
macro_rules! implements {
    ($ty:ty: $bound:path) => {{
        trait DoesNotImplement {
            const IMPLEMENTS: bool = false;
        }
        impl<T: ?Sized> DoesNotImplement for T {}

        struct Check<T: ?Sized>(PhantomData<T>);

        #[allow(dead_code)]
        impl<T: ?Sized + $bound> Check<T> {
            const IMPLEMENTS: bool = true;
        }

        <Check<$ty>>::IMPLEMENTS
    }};
}

#[test]
fn test_optimizer_exposes_only_its_own_surface() {
    assert!(implements!(OptimizerAlgorithm: OptimizerSurface));
    assert!(implements!(OptimizerAlgorithm: MeshingAlgorithm));
    assert!(!implements!(OptimizerAlgorithm: TetrahedralizationSurface));
}

#[test]
fn test_generation_pass_does_not_expose_optimizer_surface() {
    assert!(implements!(TetraAlgorithm: TetrahedralizationSurface));
    assert!(implements!(TetraAlgorithm: MeshingAlgorithm));
    assert!(!implements!(TetraAlgorithm: OptimizerSurface));
}

#[test]
fn test_optimizer_parameters_carry_no_generation_options() {
    assert!(implements!(OptimizerParameters: RunSettings));
    assert!(implements!(OptimizerParameters: OptimizerSurface));
    assert!(!implements!(ParameterSet: OptimizerSurface));
}

#[test]
fn test_hypotheses_are_distinct() {
    assert_ne!(PARAMETERS_HYPOTHESIS, OPTIMIZER_HYPOTHESIS);
    assert_eq!(PARAMETERS_HYPOTHESIS.library, OPTIMIZER_HYPOTHESIS.library);
}

// =============================================================================
// OPTIMIZATION LEVELS
// =============================================================================

#[test]
fn test_canonical_order() {
    use OptimizationLevel::{Light, None, Standard, StandardPlus, Strong};
    assert!(None < Light);
    assert!(Light < Standard);
    assert!(Standard < StandardPlus);
    assert!(StandardPlus < Strong);
}

#[test]
fn test_legacy_strong_is_canonical_strong() {
    let level = OptimizationLevel::from(LegacyOptimizationLevel::Strong);
    assert_eq!(level, OptimizationLevel::Strong);
    assert_ne!(level, OptimizationLevel::StandardPlus);

    let mut params = ParameterSet::new();
    params.set_legacy_optimization_level(3).unwrap();
    assert_eq!(params.optimization_level(), OptimizationLevel::Strong);
    params.set_legacy_optimization_level(2).unwrap();
    assert_eq!(params.optimization_level(), OptimizationLevel::Standard);
    assert!(params.set_legacy_optimization_level(4).is_err());

    let restored = ParameterSet::from_legacy_record("1 -1 -1 3", LevelScheme::Legacy).unwrap();
    assert_eq!(restored.optimization_level(), OptimizationLevel::Strong);
    let restored = ParameterSet::from_legacy_record("1 -1 -1 3", LevelScheme::Canonical).unwrap();
    assert_eq!(restored.optimization_level(), OptimizationLevel::StandardPlus);
}
