use thiserror::Error;

use crate::support::{fe::FeError, property::PropertyError};

/// Recoverable failures while assembling one element or side.
///
/// These do not indicate a bug. The nonlinear solver receiving one should
/// reject the current evaluation and retry, for example with a smaller step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    /// A derived quantity was not finite or outside its physical range.
    #[error("non-physical {quantity} = {value} on element {element}, quadrature point {qp}")]
    NonPhysical {
        quantity: &'static str,
        value: f64,
        element: usize,
        qp: usize,
    },

    /// A property evaluator rejected the local state.
    #[error("{quantity} evaluation failed on element {element}")]
    Property {
        quantity: &'static str,
        element: usize,
        #[source]
        source: PropertyError,
    },

    /// Finite-element data could not be evaluated (e.g. a collapsed element).
    #[error("finite element evaluation failed on element {element}")]
    Fe {
        element: usize,
        #[source]
        source: FeError,
    },
}

impl AssemblyError {
    /// Returns `value` if it is finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::NonPhysical`] otherwise.
    pub fn check_positive(
        quantity: &'static str,
        value: f64,
        element: usize,
        qp: usize,
    ) -> Result<f64, Self> {
        if value.is_finite() && value > 0.0 {
            Ok(value)
        } else {
            Err(Self::NonPhysical {
                quantity,
                value,
                element,
                qp,
            })
        }
    }

    /// Returns `value` if it is finite.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::NonPhysical`] otherwise.
    pub fn check_finite(
        quantity: &'static str,
        value: f64,
        element: usize,
        qp: usize,
    ) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::NonPhysical {
                quantity,
                value,
                element,
                qp,
            })
        }
    }
}
