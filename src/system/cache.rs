use std::collections::{HashMap, hash_map::Entry};

/// Derived quantities shared between physics modules at a quadrature point.
///
/// Species-indexed variants carry the species index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CachedQuantity {
    MixtureDensity,
    MixtureViscosity,
    MixtureThermalConductivity,
    MixtureSpecificHeatP,
    MixtureMolarMass,
    SpeciesDiffusivity(usize),
    SpeciesProductionRate(usize),
    HeatReleaseRate,
}

/// Per-element memo table of derived quantities.
///
/// Lives inside an assembly context and is cleared at the start of every
/// element or side visit, so a value is computed at most once per quadrature
/// point per visit no matter how many modules ask for it.
#[derive(Debug, Clone, Default)]
pub struct CachedValues {
    values: HashMap<(CachedQuantity, usize), f64>,
}

impl CachedValues {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized value, computing and storing it on first use.
    pub fn get_or_compute(
        &mut self,
        quantity: CachedQuantity,
        qp: usize,
        compute: impl FnOnce() -> f64,
    ) -> f64 {
        *self.values.entry((quantity, qp)).or_insert_with(compute)
    }

    /// Fallible form of [`get_or_compute`](Self::get_or_compute).
    ///
    /// Nothing is stored when `compute` fails, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`.
    pub fn try_get_or_compute<E>(
        &mut self,
        quantity: CachedQuantity,
        qp: usize,
        compute: impl FnOnce() -> Result<f64, E>,
    ) -> Result<f64, E> {
        match self.values.entry((quantity, qp)) {
            Entry::Occupied(entry) => Ok(*entry.get()),
            Entry::Vacant(entry) => Ok(*entry.insert(compute()?)),
        }
    }

    /// Returns a memoized value without computing it.
    #[must_use]
    pub fn get(&self, quantity: CachedQuantity, qp: usize) -> Option<f64> {
        self.values.get(&(quantity, qp)).copied()
    }

    /// Forgets every memoized value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
