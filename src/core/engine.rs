//! Contract with the external tetrahedralization engine.
//!
//! The engine is a black box behind [`TetraEngine`]. Adapters receive it as an
//! `Arc<dyn TetraEngine>` at attach time; [`DisabledEngine`] stands in when no
//! engine is installed and makes every adapter degraded.

use crate::core::parameters::LogDestination;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Which pass a request is for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlgorithmKind {
    /// Constrained volume generation from a surface mesh.
    #[default]
    Tetrahedralization,
    /// Optimization of an existing volume mesh.
    OptimizationOnly,
}

/// An enforced point handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnforcedPoint {
    /// Position.
    pub point: [f64; 3],
    /// Local size, `None` for the natural size.
    pub size: Option<f64>,
}

/// An enforced segment handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnforcedSegment {
    /// End points.
    pub points: [[f64; 3]; 2],
    /// Local size, `None` for the natural size.
    pub size: Option<f64>,
}

/// An enforced triangle handed to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnforcedTriangle {
    /// Corners.
    pub points: [[f64; 3]; 3],
    /// Local size, `None` for the natural size.
    pub size: Option<f64>,
}

/// Everything the engine needs for one run.
///
/// Index-based connectivity refers into [`EngineRequest::input_nodes`].
#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(setter(into))]
pub struct EngineRequest {
    /// Pass to run.
    pub pass: AlgorithmKind,
    /// Command-line style arguments.
    pub arguments: Vec<String>,
    /// Directory the engine may write into.
    pub working_directory: PathBuf,
    /// Prefix shared by every file of this run.
    pub file_prefix: String,
    /// Where the log goes.
    #[builder(default)]
    pub log_destination: LogDestination,
    /// Input node positions.
    #[builder(default)]
    pub input_nodes: Vec<[f64; 3]>,
    /// Input surface triangles (generation pass).
    #[builder(default)]
    pub input_triangles: Vec<[usize; 3]>,
    /// Input tetrahedra (optimization pass).
    #[builder(default)]
    pub input_tetrahedra: Vec<[usize; 4]>,
    /// Enforced vertices.
    #[builder(default)]
    pub enforced_vertices: Vec<EnforcedPoint>,
    /// Nodes of enforced meshes.
    #[builder(default)]
    pub enforced_nodes: Vec<EnforcedPoint>,
    /// Segments of enforced meshes.
    #[builder(default)]
    pub enforced_edges: Vec<EnforcedSegment>,
    /// Triangles of enforced meshes.
    #[builder(default)]
    pub enforced_triangles: Vec<EnforcedTriangle>,
}

/// A generated tetrahedron.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTetrahedron {
    /// Corner indices into [`EngineOutput::nodes`].
    pub nodes: [usize; 4],
    /// Connected-region id.
    pub domain: u32,
}

/// Result of a successful run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Output node positions.
    pub nodes: Vec<[f64; 3]>,
    /// Output tetrahedra.
    pub tetrahedra: Vec<OutputTetrahedron>,
    /// Textual log.
    pub log: String,
}

/// The engine ran and failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineFailure {
    /// Failure summary.
    pub message: String,
    /// Textual log up to the failure.
    pub log: String,
}

/// Whether an engine can run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Availability {
    /// The engine is installed and usable.
    Ready,
    /// The engine cannot run.
    Missing {
        /// Why the engine is unusable.
        reason: String,
    },
}

/// A tetrahedralization engine.
pub trait TetraEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Checked once when an adapter attaches.
    fn availability(&self) -> Availability {
        Availability::Ready
    }

    /// Runs one pass. Blocks until the engine finishes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineFailure`] when the engine reports failure.
    fn run(&self, request: &EngineRequest) -> Result<EngineOutput, EngineFailure>;
}

/// Engine used when none is installed. Always unavailable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisabledEngine {
    reason: String,
}

impl DisabledEngine {
    /// Disabled engine reporting `reason`.
    #[must_use]
    pub fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_owned(),
        }
    }
}

impl Default for DisabledEngine {
    fn default() -> Self {
        Self::new("no tetrahedralization engine is installed")
    }
}

impl TetraEngine for DisabledEngine {
    fn name(&self) -> &'static str {
        "disabled"
    }

    fn availability(&self) -> Availability {
        Availability::Missing {
            reason: self.reason.clone(),
        }
    }

    fn run(&self, _request: &EngineRequest) -> Result<EngineOutput, EngineFailure> {
        Err(EngineFailure {
            message: self.reason.clone(),
            log: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_engine_is_missing() {
        let engine = DisabledEngine::default();
        assert!(matches!(engine.availability(), Availability::Missing { .. }));
        let request = EngineRequestBuilder::default()
            .pass(AlgorithmKind::Tetrahedralization)
            .arguments(Vec::new())
            .working_directory("/tmp")
            .file_prefix("run")
            .build()
            .unwrap();
        assert!(engine.run(&request).is_err());
    }

    #[test]
    fn test_request_builder_requires_core_fields() {
        let err = EngineRequestBuilder::default()
            .pass(AlgorithmKind::OptimizationOnly)
            .build();
        assert!(err.is_err());

        let request = EngineRequestBuilder::default()
            .pass(AlgorithmKind::OptimizationOnly)
            .arguments(vec!["--verbose".to_owned(), "3".to_owned()])
            .working_directory(PathBuf::from("/work"))
            .file_prefix("opt")
            .input_tetrahedra(vec![[0, 1, 2, 3]])
            .build()
            .unwrap();
        assert_eq!(request.log_destination, LogDestination::File);
        assert!(request.enforced_vertices.is_empty());
        assert_eq!(request.input_tetrahedra.len(), 1);
    }
}
