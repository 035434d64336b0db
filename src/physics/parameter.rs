/// Mutable handles to every scalar registered under one parameter name.
///
/// Several modules may expose a parameter with the same name; setting the
/// parameter writes every handle. The handles borrow the modules mutably, so
/// no assembly can run while they are alive.
#[derive(Debug, Default)]
pub struct ParameterHandles<'a> {
    handles: Vec<&'a mut f64>,
}

impl<'a> ParameterHandles<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: &'a mut f64) {
        self.handles.push(handle);
    }

    /// Current value of the first handle.
    #[must_use]
    pub fn get(&self) -> Option<f64> {
        self.handles.first().map(|value| **value)
    }

    /// Writes `value` through every handle.
    pub fn set(&mut self, value: f64) {
        for handle in &mut self.handles {
            **handle = value;
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_writes_every_handle() {
        let (mut a, mut b) = (1.0, 2.0);
        {
            let mut handles = ParameterHandles::new();
            assert_eq!(handles.get(), None);

            handles.push(&mut a);
            handles.push(&mut b);
            assert_eq!(handles.len(), 2);
            assert_eq!(handles.get(), Some(1.0));

            handles.set(5.0);
        }
        assert_eq!((a, b), (5.0, 5.0));
    }
}
