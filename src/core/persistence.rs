//! JSON persistence of hypotheses and constraint registries.
//!
//! Hypotheses are written inside an envelope naming the hypothesis type and
//! engine library, so a document saved for one pass is never restored into
//! the other.

use crate::core::algorithm::{HypothesisKey, OPTIMIZER_HYPOTHESIS, PARAMETERS_HYPOTHESIS};
use crate::core::constraints::ConstraintRegistry;
use crate::core::optimizer::OptimizerParameters;
use crate::core::parameters::ParameterSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while saving or restoring.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PersistenceError {
    /// The document is not valid JSON for the requested type.
    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),
    /// The document holds a different hypothesis.
    #[error("Expected hypothesis '{expected}', found '{found}'")]
    WrongHypothesis {
        /// Hypothesis type requested by the caller.
        expected: &'static str,
        /// Hypothesis type named in the document.
        found: String,
    },
}

/// A parameter type persisted under a hypothesis identity.
pub trait Hypothesis: Serialize + DeserializeOwned {
    /// Identity written into the envelope.
    const KEY: HypothesisKey;
}

impl Hypothesis for ParameterSet {
    const KEY: HypothesisKey = PARAMETERS_HYPOTHESIS;
}

impl Hypothesis for OptimizerParameters {
    const KEY: HypothesisKey = OPTIMIZER_HYPOTHESIS;
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    hypothesis: String,
    library: String,
    body: T,
}

/// Serializes a hypothesis into its JSON envelope.
///
/// # Errors
///
/// Returns [`PersistenceError::Json`] if serialization fails.
///
/// # Examples
///
/// ```
/// use tetra_constraints::core::parameters::ParameterSet;
/// use tetra_constraints::core::persistence::{load_hypothesis, save_hypothesis};
///
/// let params = ParameterSet::new();
/// let text = save_hypothesis(&params).unwrap();
/// let restored: ParameterSet = load_hypothesis(&text).unwrap();
/// assert_eq!(restored, params);
/// ```
pub fn save_hypothesis<H: Hypothesis>(hypothesis: &H) -> Result<String, PersistenceError> {
    let envelope = Envelope {
        hypothesis: H::KEY.name.to_owned(),
        library: H::KEY.library.to_owned(),
        body: hypothesis,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Restores a hypothesis from its JSON envelope.
///
/// # Errors
///
/// Returns [`PersistenceError::WrongHypothesis`] if the envelope names another
/// hypothesis type, and [`PersistenceError::Json`] for malformed documents.
pub fn load_hypothesis<H: Hypothesis>(text: &str) -> Result<H, PersistenceError> {
    let envelope: Envelope<serde_json::Value> = serde_json::from_str(text)?;
    if envelope.hypothesis != H::KEY.name {
        return Err(PersistenceError::WrongHypothesis {
            expected: H::KEY.name,
            found: envelope.hypothesis,
        });
    }
    if envelope.library != H::KEY.library {
        tracing::debug!(
            library = %envelope.library,
            expected = H::KEY.library,
            "hypothesis saved by another engine library"
        );
    }
    Ok(serde_json::from_value(envelope.body)?)
}

/// Serializes a constraint registry.
///
/// # Errors
///
/// Returns [`PersistenceError::Json`] if serialization fails.
pub fn save_constraints(registry: &ConstraintRegistry) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string_pretty(registry)?)
}

/// Restores a constraint registry.
///
/// # Errors
///
/// Returns [`PersistenceError::Json`] for malformed documents.
pub fn load_constraints(text: &str) -> Result<ConstraintRegistry, PersistenceError> {
    Ok(serde_json::from_str(text)?)
}
