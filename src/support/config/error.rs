use thiserror::Error;

use crate::support::{constraint::ConstraintError, fe::FeError};

/// Errors detected while configuring physics modules and the assembly system.
///
/// These are fatal: no assembly proceeds once one has been reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Two modules (or one module twice) tried to register the same variable name.
    #[error("variable `{name}` is already registered")]
    DuplicateVariable { name: String },

    #[error("unknown finite element family `{value}`")]
    UnknownFeFamily { value: String },

    #[error("unknown finite element order `{value}`")]
    UnknownFeOrder { value: String },

    #[error("unknown physics `{value}`")]
    UnknownPhysics { value: String },

    /// An option selecting a material or transport model named no known model.
    #[error("unknown {kind} model `{value}`")]
    UnknownModel { kind: &'static str, value: String },

    #[error("`{key}` must be {expected}, found {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing required option `{key}`")]
    Missing { key: String },

    /// A physical parameter violated its numeric constraint.
    #[error("invalid value for `{key}`")]
    InvalidParameter {
        key: String,
        #[source]
        source: ConstraintError,
    },

    #[error("invalid value for `{key}`: {reason}")]
    InvalidValue { key: String, reason: String },

    /// A variable's family and order cannot be built on the mesh.
    #[error("unsupported discretization")]
    Discretization(#[from] FeError),
}

impl ConfigError {
    pub(crate) fn wrong_type(key: &str, expected: &'static str, found: &'static str) -> Self {
        Self::WrongType {
            key: key.to_owned(),
            expected,
            found,
        }
    }

    pub(crate) fn missing(key: &str) -> Self {
        Self::Missing {
            key: key.to_owned(),
        }
    }

    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_owned(),
            reason: reason.into(),
        }
    }
}
