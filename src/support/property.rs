//! Errors reported by material and mixture property evaluators.

use thiserror::Error;

/// Errors that may occur when evaluating a transport or thermodynamic property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    /// The property is undefined at the given state.
    #[error("undefined property: {context}")]
    Undefined { context: String },

    /// The input state is outside the evaluator's valid domain.
    ///
    /// For example, a negative absolute temperature or mass fractions that
    /// do not describe a mixture.
    #[error("out of domain: {context}")]
    OutOfDomain { context: String },

    /// The calculation failed due to a numerical or internal error.
    #[error("calculation error: {context}")]
    Calculation { context: String },
}
