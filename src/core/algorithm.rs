//! Binding of an algorithm to a mesh, its parameters and the engine.
//!
//! [`TetraAlgorithm`] is the generation pass. It owns a memoized
//! [`ParameterSet`], a [`ConstraintRegistry`] and an injected engine. The
//! engine's availability is checked once at attach time; an unavailable
//! engine degrades the adapter instead of failing, so a pipeline can be fully
//! configured and persisted without one.
//!
//! Capabilities are split by trait: [`TetrahedralizationSurface`] carries the
//! generation-only options and constraint access, while the optimizer exposes
//! [`OptimizerSurface`](crate::core::optimizer::OptimizerSurface). The two
//! traits are unrelated.

use crate::core::constraints::{ConstraintRegistry, ShapeMode};
use crate::core::engine::{AlgorithmKind, Availability, EngineRequestBuilder, TetraEngine};
use crate::core::error::{ConfigurationError, TetraError};
use crate::core::parameters::{ParameterSet, RunSettings};
use crate::core::session::{ComputeReport, InputIndex, OutputWriter, RunSession, enforced_entities};
use crate::host::geometry::ShapeKey;
use crate::host::mesh::{ElementType, Mesh};
use std::sync::{Arc, OnceLock};

/// Identity of a parameter hypothesis for host persistence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HypothesisKey {
    /// Hypothesis type name.
    pub name: &'static str,
    /// Engine library the hypothesis belongs to.
    pub library: &'static str,
}

/// Library identifier shared by both hypotheses.
pub const ENGINE_LIBRARY: &str = "libTetraEngine";

/// Parameters of the generation pass.
pub const PARAMETERS_HYPOTHESIS: HypothesisKey = HypothesisKey {
    name: "Tetra_Parameters",
    library: ENGINE_LIBRARY,
};

/// Parameters of the optimization-only pass.
pub const OPTIMIZER_HYPOTHESIS: HypothesisKey = HypothesisKey {
    name: "Tetra_OptimizerParameters",
    library: ENGINE_LIBRARY,
};

// =============================================================================
// ENGINE BINDING
// =============================================================================

/// An injected engine plus the availability observed at attach time.
#[derive(Clone)]
pub(crate) struct EngineBinding {
    engine: Arc<dyn TetraEngine>,
    unavailable: Option<String>,
}

impl std::fmt::Debug for EngineBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineBinding")
            .field("engine", &self.engine.name())
            .field("unavailable", &self.unavailable)
            .finish()
    }
}

impl EngineBinding {
    pub(crate) fn new(engine: Arc<dyn TetraEngine>, kind: AlgorithmKind) -> Self {
        let unavailable = match engine.availability() {
            Availability::Ready => None,
            Availability::Missing { reason } => {
                tracing::warn!(
                    engine = engine.name(),
                    ?kind,
                    %reason,
                    "tetrahedralization engine unavailable; compute is disabled"
                );
                Some(reason)
            }
        };
        Self {
            engine,
            unavailable,
        }
    }

    pub(crate) fn reason(&self) -> Option<&str> {
        self.unavailable.as_deref()
    }

    pub(crate) fn require(&self) -> Result<&dyn TetraEngine, TetraError> {
        match &self.unavailable {
            Some(reason) => Err(TetraError::EngineUnavailable {
                reason: reason.clone(),
            }),
            None => Ok(self.engine.as_ref()),
        }
    }
}

// =============================================================================
// COMMON INTERFACE
// =============================================================================

/// Operations every algorithm variant supports.
pub trait MeshingAlgorithm {
    /// Which pass this is.
    fn kind(&self) -> AlgorithmKind;

    /// Hypothesis identity used for persistence.
    fn hypothesis_key(&self) -> HypothesisKey;

    /// Why the engine is unusable, when the adapter is degraded.
    fn degraded_reason(&self) -> Option<&str>;

    /// Returns `true` if compute is disabled for lack of an engine.
    fn is_degraded(&self) -> bool {
        self.degraded_reason().is_some()
    }

    /// Runs the pass on `mesh`. Blocks until the engine returns.
    ///
    /// # Errors
    ///
    /// Returns [`TetraError::EngineUnavailable`] on a degraded adapter and
    /// [`TetraError::ComputeFailure`] when the engine fails.
    fn compute(&self, mesh: &mut Mesh) -> Result<ComputeReport, TetraError>;
}

/// Generation-only options and constraint access.
pub trait TetrahedralizationSurface {
    /// Mesh internal holes.
    fn set_to_mesh_holes(&mut self, value: bool);

    /// Group output volumes per domain.
    fn set_to_make_groups_of_domains(&mut self, value: bool);

    /// Use the boundary-recovery variant.
    fn set_use_boundary_recovery(&mut self, value: bool);

    /// Split over-constrained edges then facets.
    fn set_fem_correction(&mut self, value: bool);

    /// Remove the initial central point.
    fn set_remove_initial_central_point(&mut self, value: bool);

    /// Enforced constraints.
    fn constraints(&self) -> &ConstraintRegistry;

    /// Mutable enforced constraints.
    fn constraints_mut(&mut self) -> &mut ConstraintRegistry;
}

// =============================================================================
// GENERATION ADAPTER
// =============================================================================

/// The constrained tetrahedralization pass attached to a mesh.
#[derive(Debug)]
pub struct TetraAlgorithm {
    mesh_name: String,
    mode: ShapeMode,
    engine: EngineBinding,
    parameters: OnceLock<ParameterSet>,
    constraints: ConstraintRegistry,
}

impl TetraAlgorithm {
    /// Attaches the pass to `mesh`, optionally scoped to `sub_shape`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::UnknownSubShape`] if `sub_shape` is not
    /// the mesh's shape or one of its sub-shapes.
    pub fn attach(
        mesh: &Mesh,
        sub_shape: Option<ShapeKey>,
        engine: Arc<dyn TetraEngine>,
    ) -> Result<Self, ConfigurationError> {
        let mode = match (mesh.shape(), sub_shape) {
            (None, None) => ShapeMode::GeometryFree,
            (Some(_), None) => ShapeMode::MainShape,
            (Some(main), Some(shape)) if shape == main => ShapeMode::MainShape,
            (Some(_), Some(shape)) if mesh.has_sub_shape(shape) => ShapeMode::SubShape(shape),
            (_, Some(_)) => {
                return Err(ConfigurationError::UnknownSubShape {
                    mesh: mesh.name().to_owned(),
                });
            }
        };
        tracing::debug!(mesh = mesh.name(), %mode, "tetrahedralization attached");
        Ok(Self {
            mesh_name: mesh.name().to_owned(),
            mode,
            engine: EngineBinding::new(engine, AlgorithmKind::Tetrahedralization),
            parameters: OnceLock::new(),
            constraints: ConstraintRegistry::new(mode),
        })
    }

    /// Name of the mesh this pass was attached to.
    #[must_use]
    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    /// Shape mode derived at attach time.
    #[must_use]
    pub const fn shape_mode(&self) -> ShapeMode {
        self.mode
    }

    /// The parameter set, created with defaults on first access.
    pub fn parameters(&self) -> &ParameterSet {
        self.parameters.get_or_init(ParameterSet::new)
    }

    /// Mutable access to the parameter set, created with defaults on first access.
    pub fn parameters_mut(&mut self) -> &mut ParameterSet {
        self.parameters.get_or_init(ParameterSet::new);
        match self.parameters.get_mut() {
            Some(parameters) => parameters,
            None => unreachable!("parameters were initialized above"),
        }
    }

    /// Installs a restored parameter set. Only possible before first access.
    ///
    /// # Errors
    ///
    /// Returns the rejected set if parameters already exist.
    pub fn adopt_parameters(&self, parameters: ParameterSet) -> Result<(), ParameterSet> {
        self.parameters.set(parameters)
    }

    /// Replaces the registry with a restored one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::IncompatibleShapeMode`] if `registry` was
    /// built for another shape mode.
    pub fn adopt_constraints(&mut self, registry: ConstraintRegistry) -> Result<(), ConfigurationError> {
        if registry.mode() != self.mode {
            return Err(ConfigurationError::IncompatibleShapeMode {
                operation: "adopt_constraints",
                mode: self.mode,
            });
        }
        self.constraints = registry;
        Ok(())
    }
}

impl TetrahedralizationSurface for TetraAlgorithm {
    fn set_to_mesh_holes(&mut self, value: bool) {
        self.parameters_mut().set_to_mesh_holes(value);
    }

    fn set_to_make_groups_of_domains(&mut self, value: bool) {
        self.parameters_mut().set_to_make_groups_of_domains(value);
    }

    fn set_use_boundary_recovery(&mut self, value: bool) {
        self.parameters_mut().set_use_boundary_recovery(value);
    }

    fn set_fem_correction(&mut self, value: bool) {
        self.parameters_mut().set_fem_correction(value);
    }

    fn set_remove_initial_central_point(&mut self, value: bool) {
        self.parameters_mut().set_remove_initial_central_point(value);
    }

    fn constraints(&self) -> &ConstraintRegistry {
        &self.constraints
    }

    fn constraints_mut(&mut self) -> &mut ConstraintRegistry {
        &mut self.constraints
    }
}

impl MeshingAlgorithm for TetraAlgorithm {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::Tetrahedralization
    }

    fn hypothesis_key(&self) -> HypothesisKey {
        PARAMETERS_HYPOTHESIS
    }

    fn degraded_reason(&self) -> Option<&str> {
        self.engine.reason()
    }

    fn compute(&self, mesh: &mut Mesh) -> Result<ComputeReport, TetraError> {
        let engine = self.engine.require()?;
        let params = self.parameters();
        let session = RunSession::open(params)?;

        let input = InputIndex::new(mesh);
        let triangles = input.connectivity::<3>(mesh, ElementType::Triangle);
        let skipped = mesh.count_of(ElementType::Quadrangle);
        if skipped > 0 {
            tracing::warn!(skipped, "quadrangles are not passed to the engine");
        }
        let enforced = enforced_entities(&self.constraints);
        let request = EngineRequestBuilder::default()
            .pass(AlgorithmKind::Tetrahedralization)
            .arguments(params.engine_arguments(mesh.shape().is_some()))
            .working_directory(session.directory())
            .file_prefix(session.prefix())
            .log_destination(params.log_destination())
            .input_nodes(input.positions)
            .input_triangles(triangles)
            .enforced_vertices(enforced.vertices)
            .enforced_nodes(enforced.nodes)
            .enforced_edges(enforced.edges)
            .enforced_triangles(enforced.triangles)
            .build()
            .map_err(|e| TetraError::ComputeFailure {
                message: e.to_string(),
                log_path: None,
                log: String::new(),
            })?;

        let (output, log_path) = session.run(engine, &request)?;

        let mut writer = OutputWriter::new(mesh);
        let (nodes_added, nodes_reused, tetrahedra) = writer.apply(&output)?;
        writer.populate_constraint_groups(&self.constraints);
        if params.to_make_groups_of_domains() && params.to_mesh_holes_effective() {
            writer.populate_domain_groups();
        }
        let groups = writer.into_groups();

        tracing::info!(
            mesh = %self.mesh_name,
            nodes_added,
            nodes_reused,
            tetrahedra,
            groups = groups.len(),
            "tetrahedralization finished"
        );
        Ok(ComputeReport {
            working_directory: session.directory().to_path_buf(),
            log_path,
            log: output.log,
            nodes_added,
            nodes_reused,
            tetrahedra,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::DisabledEngine;
    use crate::core::parameters::OptimizationLevel;
    use crate::host::geometry::{GeometryStudy, ShapeKind};

    fn disabled() -> Arc<dyn TetraEngine> {
        Arc::new(DisabledEngine::default())
    }

    #[test]
    fn test_shape_mode_derivation() {
        let mut study = GeometryStudy::new();
        let a = study.make_vertex(0.0, 0.0, 0.0);
        let b = study.make_vertex(1.0, 0.0, 0.0);
        let edge = study.make_shape(ShapeKind::Edge, &[a, b]).unwrap();
        let solid = study.make_shape(ShapeKind::Solid, &[edge]).unwrap();
        let stranger = study.make_vertex(9.0, 9.0, 9.0);

        let free = Mesh::new("free");
        assert_eq!(
            TetraAlgorithm::attach(&free, None, disabled()).unwrap().shape_mode(),
            ShapeMode::GeometryFree
        );
        assert!(TetraAlgorithm::attach(&free, Some(a), disabled()).is_err());

        let shaped = Mesh::with_shape("shaped", &study, solid);
        assert_eq!(
            TetraAlgorithm::attach(&shaped, None, disabled()).unwrap().shape_mode(),
            ShapeMode::MainShape
        );
        assert_eq!(
            TetraAlgorithm::attach(&shaped, Some(solid), disabled()).unwrap().shape_mode(),
            ShapeMode::MainShape
        );
        assert_eq!(
            TetraAlgorithm::attach(&shaped, Some(edge), disabled()).unwrap().shape_mode(),
            ShapeMode::SubShape(edge)
        );
        assert_eq!(
            TetraAlgorithm::attach(&shaped, Some(stranger), disabled()).unwrap_err(),
            ConfigurationError::UnknownSubShape {
                mesh: "shaped".to_owned()
            }
        );
    }

    #[test]
    fn test_parameters_are_memoized() {
        let mut algo = TetraAlgorithm::attach(&Mesh::new("m"), None, disabled()).unwrap();
        let first: *const ParameterSet = algo.parameters();
        let second: *const ParameterSet = algo.parameters();
        assert!(std::ptr::eq(first, second));
        let id = algo.parameters().run_options().instance_id();

        algo.parameters_mut()
            .set_optimization_level(OptimizationLevel::Strong);
        assert_eq!(algo.parameters().optimization_level(), OptimizationLevel::Strong);
        assert_eq!(algo.parameters().run_options().instance_id(), id);

        assert!(algo.adopt_parameters(ParameterSet::new()).is_err());
    }

    #[test]
    fn test_adopt_parameters_before_first_access() {
        let algo = TetraAlgorithm::attach(&Mesh::new("m"), None, disabled()).unwrap();
        let mut restored = ParameterSet::new();
        restored.set_to_mesh_holes(false);
        algo.adopt_parameters(restored.clone()).unwrap();
        assert_eq!(algo.parameters(), &restored);
    }

    #[test]
    fn test_degraded_adapter_is_configurable_but_cannot_compute() {
        let mut mesh = Mesh::new("m");
        let mut algo = TetraAlgorithm::attach(&mesh, None, disabled()).unwrap();
        assert!(algo.is_degraded());

        algo.set_to_mesh_holes(false);
        algo.constraints_mut()
            .add_enforced_vertex_by_coordinate(1.0, 2.0, 3.0, 1.0, None, None)
            .unwrap();
        assert!(!algo.parameters().to_mesh_holes());

        assert!(matches!(
            algo.compute(&mut mesh),
            Err(TetraError::EngineUnavailable { .. })
        ));
        assert_eq!(mesh.node_count(), 0);
    }

    #[test]
    fn test_adopt_constraints_checks_mode() {
        let mut algo = TetraAlgorithm::attach(&Mesh::new("m"), None, disabled()).unwrap();
        assert!(algo
            .adopt_constraints(ConstraintRegistry::new(ShapeMode::MainShape))
            .is_err());
        assert!(algo
            .adopt_constraints(ConstraintRegistry::new(ShapeMode::GeometryFree))
            .is_ok());
        assert_eq!(algo.hypothesis_key(), PARAMETERS_HYPOTHESIS);
        assert_eq!(algo.kind(), AlgorithmKind::Tetrahedralization);
    }
}
