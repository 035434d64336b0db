use std::collections::HashMap;

use crate::support::{
    config::ConfigError,
    fe::{FeFamily, FeOrder},
};

/// Handle to a registered variable.
///
/// Indices are assigned in registration order and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableIndex(usize);

impl VariableIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }
}

/// A registered solution variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    index: VariableIndex,
    family: FeFamily,
    order: FeOrder,
    time_evolving: bool,
}

impl Variable {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn index(&self) -> VariableIndex {
        self.index
    }

    #[must_use]
    pub fn family(&self) -> FeFamily {
        self.family
    }

    #[must_use]
    pub fn order(&self) -> FeOrder {
        self.order
    }

    /// True if the variable participates in time integration.
    #[must_use]
    pub fn is_time_evolving(&self) -> bool {
        self.time_evolving
    }
}

/// Maps variable names to indices and discretizations.
///
/// Owned by the assembly system. Physics modules keep only the
/// [`VariableIndex`] handles returned at registration.
#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    dim: usize,
    variables: Vec<Variable>,
    by_name: HashMap<String, VariableIndex>,
}

impl VariableRegistry {
    /// Creates an empty registry for a mesh of dimension `dim`.
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            ..Self::default()
        }
    }

    /// Mesh dimension of the owning system.
    #[must_use]
    pub fn mesh_dimension(&self) -> usize {
        self.dim
    }

    /// Registers a new variable and returns its index.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateVariable`] if `name` is already taken.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        order: FeOrder,
        family: FeFamily,
    ) -> Result<VariableIndex, ConfigError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ConfigError::DuplicateVariable { name });
        }

        let index = VariableIndex(self.variables.len());
        log::debug!("registered variable `{name}` as {index:?} ({family}, {order})");

        self.by_name.insert(name.clone(), index);
        self.variables.push(Variable {
            name,
            index,
            family,
            order,
            time_evolving: false,
        });
        Ok(index)
    }

    /// Marks a variable as participating in time integration.
    ///
    /// # Panics
    ///
    /// Panics if `var` was not issued by this registry.
    pub fn time_evolving(&mut self, var: VariableIndex) {
        self.variables
            .get_mut(var.0)
            .unwrap_or_else(|| panic!("{var:?} is not a registered variable"))
            .time_evolving = true;
    }

    /// Returns the variable behind `var`.
    ///
    /// # Panics
    ///
    /// Panics if `var` was not issued by this registry.
    #[must_use]
    pub fn variable(&self, var: VariableIndex) -> &Variable {
        self.variables
            .get(var.0)
            .unwrap_or_else(|| panic!("{var:?} is not a registered variable"))
    }

    /// Looks up a variable by name.
    #[must_use]
    pub fn variable_number(&self, name: &str) -> Option<VariableIndex> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Iterates variables in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }
}
