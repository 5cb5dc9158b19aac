//! Error types for configuration and compute.
//!
//! Configuration errors surface at the offending setter or registry call.
//! Everything that can go wrong once [`compute`](crate::core::algorithm::TetraAlgorithm::compute)
//! starts is a [`TetraError`].

use crate::core::constraints::ShapeMode;
use crate::core::verification::ConstraintMismatch;
use crate::host::geometry::GeometryError;
use crate::host::mesh::ElementKind;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while configuring parameters or constraints.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// An option value is outside its documented bounds.
    #[error("Invalid value '{value}' for option '{option}': {reason}")]
    InvalidParameter {
        /// Option name.
        option: &'static str,
        /// Rejected value, rendered as text.
        value: String,
        /// Bound that was violated.
        reason: String,
    },
    /// A geometric reference could not be used as an enforced vertex.
    #[error("Invalid geometry reference: {source}")]
    InvalidGeometry {
        /// The underlying geometry error.
        #[from]
        source: GeometryError,
    },
    /// The constraint is not meaningful for the mesh's shape mode.
    #[error("{operation} is not allowed on a {mode} mesh")]
    IncompatibleShapeMode {
        /// Rejected operation.
        operation: &'static str,
        /// Shape mode of the attached algorithm.
        mode: ShapeMode,
    },
    /// The enforced-mesh source has no entities of the requested kind.
    #[error(
        "Source '{label}' cannot provide {requested} entities (highest kind: {})",
        kind_label(.available)
    )]
    SourceKindMismatch {
        /// Label of the source mesh, sub-mesh or group.
        label: String,
        /// Requested entity kind.
        requested: ElementKind,
        /// Highest entity kind the source holds.
        available: Option<ElementKind>,
    },
    /// No enforced vertex matches the removal key.
    #[error("No enforced vertex registered for {key}")]
    EnforcedVertexNotFound {
        /// The coordinate triple or entry name that was looked up.
        key: String,
    },
    /// The sub-shape is not part of the mesh's governing shape.
    #[error("Sub-shape is not part of the shape of mesh '{mesh}'")]
    UnknownSubShape {
        /// Name of the mesh being attached to.
        mesh: String,
    },
}

fn kind_label(kind: &Option<ElementKind>) -> String {
    kind.map_or_else(|| "none".to_owned(), |k| k.to_string())
}

impl ConfigurationError {
    pub(crate) fn invalid(option: &'static str, value: impl ToString, reason: &str) -> Self {
        Self::InvalidParameter {
            option,
            value: value.to_string(),
            reason: reason.to_owned(),
        }
    }
}

/// Errors raised by a compute run.
#[derive(Clone, Debug, Error, PartialEq)]
#[non_exhaustive]
pub enum TetraError {
    /// Invalid configuration detected while preparing the run.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The adapter was attached to an engine that cannot run.
    #[error("Tetrahedralization engine unavailable: {reason}")]
    EngineUnavailable {
        /// Why the engine could not be used.
        reason: String,
    },
    /// The engine ran and reported failure, or its output could not be applied.
    #[error("Tetrahedralization failed: {message}")]
    ComputeFailure {
        /// Failure summary.
        message: String,
        /// Log file kept on disk, when logging to a file.
        log_path: Option<PathBuf>,
        /// Captured engine log.
        log: String,
    },
    /// Post-run verification found constraints missing from the result.
    #[error(transparent)]
    ConstraintMismatch(#[from] ConstraintMismatch),
}

impl TetraError {
    /// Log content attached to a compute failure.
    #[must_use]
    pub fn log(&self) -> Option<&str> {
        match self {
            Self::ComputeFailure { log, .. } => Some(log),
            _ => None,
        }
    }
}
