//! Optimization-only pass over an existing volume mesh.
//!
//! [`OptimizerAlgorithm`] shares the run options and engine binding with the
//! generation pass but has no constraint registry. Its capabilities are
//! exposed through [`OptimizerSurface`], which is unrelated to
//! [`TetrahedralizationSurface`](crate::core::algorithm::TetrahedralizationSurface).

use crate::core::algorithm::{EngineBinding, HypothesisKey, MeshingAlgorithm, OPTIMIZER_HYPOTHESIS};
use crate::core::constraints::ShapeMode;
use crate::core::engine::{AlgorithmKind, EngineRequestBuilder, TetraEngine};
use crate::core::error::{ConfigurationError, TetraError};
use crate::core::parameters::{OptimizationLevel, RunOptions, RunSettings, versioned_level};
use crate::core::session::{ComputeReport, InputIndex, OutputWriter, RunSession};
use crate::host::mesh::{ElementType, Mesh};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Default cap on engine threads.
pub const DEFAULT_MAX_THREADS: u32 = 4;

/// Whether an optimization step runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptimizeMode {
    /// Do not run the step.
    Skip,
    /// Run the step after generation.
    #[default]
    Apply,
    /// Run only this step.
    OnlyOptimize,
}

impl OptimizeMode {
    /// Engine keyword.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Skip => "no",
            Self::Apply => "yes",
            Self::OnlyOptimize => "only",
        }
    }
}

impl fmt::Display for OptimizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// How the engine may parallelize optimization.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreadSafetyMode {
    /// Leave the choice to the engine.
    None,
    /// Slower but quality preserving.
    #[default]
    Safe,
    /// Faster, may degrade quality.
    Aggressive,
    /// Deterministic for a fixed thread cap.
    ReproducibleGivenMaxThreads,
    /// Deterministic regardless of thread count.
    Reproducible,
}

impl ThreadSafetyMode {
    /// Engine keyword, `None` when no flag is passed.
    #[must_use]
    pub const fn keyword(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Safe => Some("safe"),
            Self::Aggressive => Some("aggressive"),
            Self::ReproducibleGivenMaxThreads => Some("reproducible_given_max_num_of_threads"),
            Self::Reproducible => Some("reproducible"),
        }
    }
}

/// Options of the optimization-only pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerParameters {
    optimization: OptimizeMode,
    split_over_constrained: OptimizeMode,
    smooth_off_slivers: bool,
    thread_safety: ThreadSafetyMode,
    max_threads: u32,
    #[serde(with = "versioned_level")]
    optimization_level: OptimizationLevel,
    to_create_new_nodes: bool,
    run: RunOptions,
}

impl Default for OptimizerParameters {
    fn default() -> Self {
        Self {
            optimization: OptimizeMode::Apply,
            split_over_constrained: OptimizeMode::Skip,
            smooth_off_slivers: false,
            thread_safety: ThreadSafetyMode::Safe,
            max_threads: DEFAULT_MAX_THREADS,
            optimization_level: OptimizationLevel::Standard,
            to_create_new_nodes: true,
            run: RunOptions::default(),
        }
    }
}

impl RunSettings for OptimizerParameters {
    fn run_options(&self) -> &RunOptions {
        &self.run
    }

    fn run_options_mut(&mut self) -> &mut RunOptions {
        &mut self.run
    }
}

impl OptimizerParameters {
    /// Creates optimizer parameters with defaults and a fresh instance id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimization step mode.
    #[must_use]
    pub const fn optimization(&self) -> OptimizeMode {
        self.optimization
    }

    /// Over-constrained element splitting mode.
    #[must_use]
    pub const fn split_over_constrained(&self) -> OptimizeMode {
        self.split_over_constrained
    }

    /// Whether sliver smoothing is on.
    #[must_use]
    pub const fn smooth_off_slivers(&self) -> bool {
        self.smooth_off_slivers
    }

    /// Parallel mode.
    #[must_use]
    pub const fn thread_safety(&self) -> ThreadSafetyMode {
        self.thread_safety
    }

    /// Thread cap.
    #[must_use]
    pub const fn max_threads(&self) -> u32 {
        self.max_threads
    }

    /// Optimization level.
    #[must_use]
    pub const fn optimization_level(&self) -> OptimizationLevel {
        self.optimization_level
    }

    /// Whether interior nodes may be created.
    #[must_use]
    pub const fn to_create_new_nodes(&self) -> bool {
        self.to_create_new_nodes
    }

    /// Builds the optimizer command arguments, advanced text last.
    ///
    /// ```
    /// use tetra_constraints::core::optimizer::OptimizerParameters;
    /// use tetra_constraints::core::parameters::RunSettings;
    ///
    /// let mut params = OptimizerParameters::new();
    /// params.set_verbose_level(2).unwrap();
    /// assert_eq!(
    ///     params.engine_arguments().join(" "),
    ///     "--optimisation yes --optimisation_level standard \
    ///      --split_overconstrained_elements no --pthreads_mode safe \
    ///      --max_number_of_threads 4 --verbose 2"
    /// );
    /// ```
    #[must_use]
    pub fn engine_arguments(&self) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        let mut push = |parts: &[&str]| args.extend(parts.iter().map(|p| (*p).to_owned()));

        push(&["--optimisation", self.optimization.keyword()]);
        push(&["--optimisation_level", self.optimization_level.keyword()]);
        push(&[
            "--split_overconstrained_elements",
            self.split_over_constrained.keyword(),
        ]);
        if self.smooth_off_slivers {
            push(&["--smooth_off_slivers", "yes"]);
        }
        if let Some(mode) = self.thread_safety.keyword() {
            push(&["--pthreads_mode", mode]);
        }
        push(&["--max_number_of_threads", &self.max_threads.to_string()]);
        if !self.to_create_new_nodes {
            push(&["--no_internal_points"]);
        }
        if let Some(mb) = self.maximum_memory_mb() {
            push(&["--max_memory", &mb.to_string()]);
        }
        if let Some(mb) = self.initial_memory_mb() {
            push(&["--automatic_memory", &mb.to_string()]);
        }
        push(&["--verbose", &self.verbose_level().to_string()]);
        args.extend(self.advanced_options().split_whitespace().map(str::to_owned));
        args
    }
}

/// Optimizer-only options.
pub trait OptimizerSurface {
    /// Optimization step mode.
    fn set_optimization(&mut self, mode: OptimizeMode);

    /// Over-constrained element splitting mode.
    fn set_split_over_constrained(&mut self, mode: OptimizeMode);

    /// Smooth off sliver tetrahedra.
    fn set_smooth_off_slivers(&mut self, value: bool);

    /// Parallel mode.
    fn set_thread_safety(&mut self, mode: ThreadSafetyMode);

    /// Thread cap.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidParameter`] for zero.
    fn set_max_threads(&mut self, threads: u32) -> Result<(), ConfigurationError>;

    /// Optimization level.
    fn set_optimization_level(&mut self, level: OptimizationLevel);

    /// Allow interior node creation.
    fn set_to_create_new_nodes(&mut self, value: bool);
}

impl OptimizerSurface for OptimizerParameters {
    fn set_optimization(&mut self, mode: OptimizeMode) {
        self.optimization = mode;
    }

    fn set_split_over_constrained(&mut self, mode: OptimizeMode) {
        self.split_over_constrained = mode;
    }

    fn set_smooth_off_slivers(&mut self, value: bool) {
        self.smooth_off_slivers = value;
    }

    fn set_thread_safety(&mut self, mode: ThreadSafetyMode) {
        self.thread_safety = mode;
    }

    fn set_max_threads(&mut self, threads: u32) -> Result<(), ConfigurationError> {
        if threads == 0 {
            return Err(ConfigurationError::invalid(
                "max_threads",
                threads,
                "must be positive",
            ));
        }
        self.max_threads = threads;
        Ok(())
    }

    fn set_optimization_level(&mut self, level: OptimizationLevel) {
        self.optimization_level = level;
    }

    fn set_to_create_new_nodes(&mut self, value: bool) {
        self.to_create_new_nodes = value;
    }
}

// =============================================================================
// OPTIMIZER ADAPTER
// =============================================================================

/// The optimization-only pass attached to a geometry-free volume mesh.
#[derive(Debug)]
pub struct OptimizerAlgorithm {
    mesh_name: String,
    engine: EngineBinding,
    parameters: OnceLock<OptimizerParameters>,
}

impl OptimizerAlgorithm {
    /// Attaches the pass to `mesh`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::IncompatibleShapeMode`] if the mesh has a
    /// governing shape.
    pub fn attach(mesh: &Mesh, engine: Arc<dyn TetraEngine>) -> Result<Self, ConfigurationError> {
        if mesh.shape().is_some() {
            return Err(ConfigurationError::IncompatibleShapeMode {
                operation: "optimization",
                mode: ShapeMode::MainShape,
            });
        }
        tracing::debug!(mesh = mesh.name(), "optimizer attached");
        Ok(Self {
            mesh_name: mesh.name().to_owned(),
            engine: EngineBinding::new(engine, AlgorithmKind::OptimizationOnly),
            parameters: OnceLock::new(),
        })
    }

    /// Name of the mesh this pass was attached to.
    #[must_use]
    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    /// The parameter set, created with defaults on first access.
    pub fn parameters(&self) -> &OptimizerParameters {
        self.parameters.get_or_init(OptimizerParameters::new)
    }

    /// Mutable parameter access, created with defaults on first access.
    pub fn parameters_mut(&mut self) -> &mut OptimizerParameters {
        self.parameters.get_or_init(OptimizerParameters::new);
        match self.parameters.get_mut() {
            Some(parameters) => parameters,
            None => unreachable!("parameters were initialized above"),
        }
    }

    /// Installs restored parameters. Only possible before first access.
    ///
    /// # Errors
    ///
    /// Returns the rejected set if parameters already exist.
    pub fn adopt_parameters(&self, parameters: OptimizerParameters) -> Result<(), OptimizerParameters> {
        self.parameters.set(parameters)
    }
}

impl OptimizerSurface for OptimizerAlgorithm {
    fn set_optimization(&mut self, mode: OptimizeMode) {
        self.parameters_mut().set_optimization(mode);
    }

    fn set_split_over_constrained(&mut self, mode: OptimizeMode) {
        self.parameters_mut().set_split_over_constrained(mode);
    }

    fn set_smooth_off_slivers(&mut self, value: bool) {
        self.parameters_mut().set_smooth_off_slivers(value);
    }

    fn set_thread_safety(&mut self, mode: ThreadSafetyMode) {
        self.parameters_mut().set_thread_safety(mode);
    }

    fn set_max_threads(&mut self, threads: u32) -> Result<(), ConfigurationError> {
        self.parameters_mut().set_max_threads(threads)
    }

    fn set_optimization_level(&mut self, level: OptimizationLevel) {
        self.parameters_mut().set_optimization_level(level);
    }

    fn set_to_create_new_nodes(&mut self, value: bool) {
        self.parameters_mut().set_to_create_new_nodes(value);
    }
}

impl MeshingAlgorithm for OptimizerAlgorithm {
    fn kind(&self) -> AlgorithmKind {
        AlgorithmKind::OptimizationOnly
    }

    fn hypothesis_key(&self) -> HypothesisKey {
        OPTIMIZER_HYPOTHESIS
    }

    fn degraded_reason(&self) -> Option<&str> {
        self.engine.reason()
    }

    /// Replaces the mesh's tetrahedra with the optimized ones.
    fn compute(&self, mesh: &mut Mesh) -> Result<ComputeReport, TetraError> {
        let engine = self.engine.require()?;
        let params = self.parameters();
        let session = RunSession::open(params)?;

        let input = InputIndex::new(mesh);
        let tetrahedra = input.connectivity::<4>(mesh, ElementType::Tetrahedron);
        let request = EngineRequestBuilder::default()
            .pass(AlgorithmKind::OptimizationOnly)
            .arguments(params.engine_arguments())
            .working_directory(session.directory())
            .file_prefix(session.prefix())
            .log_destination(params.log_destination())
            .input_nodes(input.positions)
            .input_tetrahedra(tetrahedra)
            .build()
            .map_err(|e| TetraError::ComputeFailure {
                message: e.to_string(),
                log_path: None,
                log: String::new(),
            })?;

        let (output, log_path) = session.run(engine, &request)?;

        let mut writer = OutputWriter::new(mesh);
        let plan = writer.plan(&output)?;
        let replaced = writer.remove_elements_of(ElementType::Tetrahedron);
        let (nodes_added, nodes_reused, tetrahedra) = writer.commit(plan)?;
        let groups = writer.into_groups();

        tracing::info!(
            mesh = %self.mesh_name,
            replaced,
            tetrahedra,
            nodes_added,
            "optimization finished"
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
    use crate::host::geometry::GeometryStudy;

    #[test]
    fn test_defaults() {
        let params = OptimizerParameters::new();
        assert_eq!(params.optimization(), OptimizeMode::Apply);
        assert_eq!(params.split_over_constrained(), OptimizeMode::Skip);
        assert!(!params.smooth_off_slivers());
        assert_eq!(params.thread_safety(), ThreadSafetyMode::Safe);
        assert_eq!(params.max_threads(), DEFAULT_MAX_THREADS);
        assert_eq!(params.optimization_level(), OptimizationLevel::Standard);
        assert!(params.to_create_new_nodes());
    }

    #[test]
    fn test_zero_threads_rejected() {
        let mut params = OptimizerParameters::new();
        assert!(params.set_max_threads(0).is_err());
        assert_eq!(params.max_threads(), DEFAULT_MAX_THREADS);
        params.set_max_threads(16).unwrap();
        assert_eq!(params.max_threads(), 16);
    }

    #[test]
    fn test_engine_arguments_full() {
        let mut params = OptimizerParameters::new();
        params.set_optimization(OptimizeMode::OnlyOptimize);
        params.set_split_over_constrained(OptimizeMode::Apply);
        params.set_smooth_off_slivers(true);
        params.set_thread_safety(ThreadSafetyMode::Reproducible);
        params.set_optimization_level(OptimizationLevel::StandardPlus);
        params.set_to_create_new_nodes(false);
        params.set_maximum_memory_mb(2048).unwrap();
        params.set_initial_memory_mb(128).unwrap();
        params.set_verbose_level(0).unwrap();
        params.set_advanced_options("--gradation 1.2");
        assert_eq!(
            params.engine_arguments().join(" "),
            "--optimisation only --optimisation_level standard+ \
             --split_overconstrained_elements yes --smooth_off_slivers yes \
             --pthreads_mode reproducible --max_number_of_threads 4 \
             --no_internal_points --max_memory 2048 --automatic_memory 128 \
             --verbose 0 --gradation 1.2"
        );
    }

    #[test]
    fn test_thread_mode_none_omits_flag() {
        let mut params = OptimizerParameters::new();
        params.set_thread_safety(ThreadSafetyMode::None);
        assert!(!params.engine_arguments().iter().any(|a| a == "--pthreads_mode"));
    }

    #[test]
    fn test_attach_rejects_shaped_mesh() {
        let mut study = GeometryStudy::new();
        let v = study.make_vertex(0.0, 0.0, 0.0);
        let shaped = Mesh::with_shape("shaped", &study, v);
        let engine: Arc<dyn TetraEngine> = Arc::new(DisabledEngine::default());
        assert!(matches!(
            OptimizerAlgorithm::attach(&shaped, Arc::clone(&engine)),
            Err(ConfigurationError::IncompatibleShapeMode { .. })
        ));

        let mut algo = OptimizerAlgorithm::attach(&Mesh::new("vol"), engine).unwrap();
        assert!(algo.is_degraded());
        algo.set_max_threads(2).unwrap();
        assert_eq!(algo.parameters().max_threads(), 2);
        assert_eq!(algo.hypothesis_key(), OPTIMIZER_HYPOTHESIS);
        assert!(matches!(
            algo.compute(&mut Mesh::new("vol")),
            Err(TetraError::EngineUnavailable { .. })
        ));
    }
}
