use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::BindError;

/// The declared parameters of a memoized function.
///
/// Arguments are bound the way keyword-capable languages bind them:
/// positional arguments fill parameters in declaration order, keyword
/// arguments fill parameters by name and parameters left over take their
/// default.
#[derive(Debug, Clone)]
pub struct Signature<V> {
    names: Arc<Names>,
    defaults: Vec<Option<V>>,
}

/// Parameter names in declaration order.
#[derive(Debug, Clone, Default)]
struct Names {
    order: Vec<String>,
    index: FxHashMap<String, usize>,
    /// Whether the parameter at each position has a default.
    defaulted: Vec<bool>,
}

impl<V> Signature<V> {
    /// A signature without parameters.
    pub fn new() -> Self {
        Self { names: Arc::default(), defaults: Vec::new() }
    }

    /// Declare a parameter that must be passed.
    pub fn required(self, name: impl Into<String>) -> Self {
        self.param(name.into(), None)
    }

    /// Declare a parameter that takes `default` when not passed.
    pub fn optional(self, name: impl Into<String>, default: V) -> Self {
        self.param(name.into(), Some(default))
    }

    /// Redeclaring a name replaces its default but keeps its position.
    fn param(mut self, name: String, default: Option<V>) -> Self {
        let names = Arc::make_mut(&mut self.names);
        match names.index.get(&name) {
            Some(&i) => {
                names.defaulted[i] = default.is_some();
                self.defaults[i] = default;
            }
            None => {
                names.index.insert(name.clone(), names.order.len());
                names.order.push(name);
                names.defaulted.push(default.is_some());
                self.defaults.push(default);
            }
        }
        self
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.defaults.len()
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
    }

    /// The position of the parameter called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.names.index.get(name).copied()
    }

    /// The name of the parameter at `position`.
    pub fn name(&self, position: usize) -> Option<&str> {
        self.names.order.get(position).map(String::as_str)
    }

    /// The parameter names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.order.iter().map(String::as_str)
    }
}

impl<V: Clone> Signature<V> {
    /// Bind arguments to parameters and fill in defaults.
    pub fn bind(&self, args: Args<V>) -> Result<Binding<V>, BindError> {
        let Args { positional, keyword } = args;
        if positional.len() > self.len() {
            return Err(BindError::TooManyPositional {
                expected: self.len(),
                given: positional.len(),
            });
        }

        let mut slots: Vec<Option<V>> = positional.into_iter().map(Some).collect();
        slots.resize_with(self.len(), || None);

        for (name, value) in keyword {
            let Some(i) = self.position(&name) else {
                return Err(BindError::UnexpectedKeyword { name });
            };
            if slots[i].is_some() {
                return Err(BindError::DuplicateArgument { name });
            }
            slots[i] = Some(value);
        }

        let values = slots
            .into_iter()
            .zip(&self.defaults)
            .enumerate()
            .map(|(i, (slot, default))| {
                slot.or_else(|| default.clone()).ok_or_else(|| BindError::MissingArgument {
                    name: self.names.order[i].clone(),
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Binding { names: Arc::clone(&self.names), values })
    }
}

impl<V> Default for Signature<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The arguments of one call.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Args<V> {
    positional: Vec<V>,
    keyword: Vec<(String, V)>,
}

impl<V> Args<V> {
    /// No arguments.
    pub fn new() -> Self {
        Self { positional: Vec::new(), keyword: Vec::new() }
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<V>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Add a keyword argument.
    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<V>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }
}

impl<V> Default for Args<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<V> for Args<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self { positional: iter.into_iter().collect(), keyword: Vec::new() }
    }
}

/// Arguments bound to parameters, one value per parameter in declaration
/// order.
///
/// Two bindings are equal when they hold equal values, however the
/// arguments were passed.
#[derive(Debug, Clone)]
pub struct Binding<V> {
    names: Arc<Names>,
    values: Vec<V>,
}

impl<V> Binding<V> {
    /// The value of the parameter at `position`.
    pub fn get(&self, position: usize) -> Option<&V> {
        self.values.get(position)
    }

    /// The value of the parameter called `name`.
    pub fn get_named(&self, name: &str) -> Option<&V> {
        self.names.index.get(name).and_then(|&i| self.values.get(i))
    }

    /// The values in declaration order.
    pub fn values(&self) -> &[V] {
        &self.values
    }

    /// The parameter names paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.names.order.iter().map(String::as_str).zip(&self.values)
    }

    /// The values of the parameters without default, in order.
    pub fn positional(&self) -> impl Iterator<Item = &V> {
        self.values.iter().zip(&self.names.defaulted).filter(|(_, d)| !**d).map(|(v, _)| v)
    }

    /// The parameters with default paired with their values, in order.
    pub fn keyword(&self) -> impl Iterator<Item = (&str, &V)> {
        self.iter().zip(&self.names.defaulted).filter(|(_, d)| **d).map(|(pair, _)| pair)
    }

    /// Replace the value at `position`.
    pub(crate) fn set(&mut self, position: usize, value: V) {
        self.values[position] = value;
    }
}

impl<V: PartialEq> PartialEq for Binding<V> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<V: Eq> Eq for Binding<V> {}

impl<V: Hash> Hash for Binding<V> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.values.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature() -> Signature<i32> {
        Signature::new().required("a").required("b").optional("c", 3)
    }

    #[test]
    fn test_bind() {
        let sig = signature();
        let positional = sig.bind(Args::new().arg(1).arg(2)).unwrap();
        let keyword = sig.bind(Args::new().kwarg("b", 2).kwarg("a", 1).kwarg("c", 3)).unwrap();
        assert_eq!(positional, keyword);
        assert_eq!(positional.values(), [1, 2, 3]);
        assert_eq!(positional.get_named("c"), Some(&3));
        assert_eq!(
            positional.iter().collect::<Vec<_>>(),
            [("a", &1), ("b", &2), ("c", &3)],
        );
        assert_eq!(positional.positional().collect::<Vec<_>>(), [&1, &2]);
        assert_eq!(positional.keyword().collect::<Vec<_>>(), [("c", &3)]);
        assert_eq!(sig.position("b"), Some(1));
        assert_eq!(sig.name(2), Some("c"));
    }

    #[test]
    fn test_bind_errors() {
        let sig = signature();
        assert_eq!(
            sig.bind([1, 2, 3, 4].into_iter().collect()).unwrap_err(),
            BindError::TooManyPositional { expected: 3, given: 4 },
        );
        assert_eq!(
            sig.bind(Args::new().arg(1).kwarg("a", 1)).unwrap_err(),
            BindError::DuplicateArgument { name: "a".into() },
        );
        assert_eq!(
            sig.bind(Args::new().arg(1).kwarg("d", 1)).unwrap_err(),
            BindError::UnexpectedKeyword { name: "d".into() },
        );
        assert_eq!(
            sig.bind(Args::new().arg(1)).unwrap_err(),
            BindError::MissingArgument { name: "b".into() },
        );
    }

    #[test]
    fn test_redeclare() {
        let sig = signature().optional("a", 0);
        assert_eq!(sig.len(), 3);
        assert_eq!(sig.names().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(sig.bind(Args::new().kwarg("b", 2)).unwrap().values(), [0, 2, 3]);
    }

    #[test]
    fn test_set() {
        let mut binding = signature().bind(Args::new().arg(1).arg(2)).unwrap();
        binding.set(0, 9);
        assert_eq!(binding.values(), [9, 2, 3]);
    }
}
