//! Call Key Module
//!
//! Structural identity for the arguments of a memoized call.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};

use crate::error::{CacheError, Result};
use crate::memo::capture::{capture as capture_value, ArgValue};

/// Keyword argument that toggles cache reads; never part of a key.
pub const USE_CACHE_FLAG: &str = "use_cache";

// == Call Key ==
/// Immutable identity of `(positional_args, keyword_args)`.
///
/// Arguments are captured as [`ArgValue`] trees. Sequences and maps are
/// compared element-wise; keyword arguments live in a sorted map, so the
/// order they were supplied in does not matter. A value passed positionally
/// and the same value passed by keyword are different keys.
#[derive(Clone)]
pub struct CallKey {
    positional: Vec<ArgValue>,
    keyword: BTreeMap<String, ArgValue>,
    digest: u64,
}

impl CallKey {
    /// Builds a key from a positional argument list and a keyword map.
    ///
    /// `args` is spread when it is a tuple or fixed-size array, `()` means
    /// no positional arguments, anything else is a single argument.
    /// `kwargs` must be a struct, a string-keyed map, `()` or `None`.
    pub fn new<A, K>(args: &A, kwargs: &K) -> Result<Self>
    where
        A: Serialize + ?Sized,
        K: Serialize + ?Sized,
    {
        let positional = spread_positional(capture(args)?);
        let keyword = keyword_map(capture(kwargs)?)?;
        Ok(Self::from_parts(positional, keyword))
    }

    /// Builds a key from a single argument bundle.
    ///
    /// A struct becomes keyword arguments, a tuple is spread into positional
    /// arguments, and any other value is one positional argument.
    pub fn from_call<A>(args: &A) -> Result<Self>
    where
        A: Serialize + ?Sized,
    {
        Ok(match capture(args)? {
            ArgValue::Struct { fields, .. } => Self::from_parts(Vec::new(), named(fields)),
            other => Self::from_parts(spread_positional(other), BTreeMap::new()),
        })
    }

    /// Starts an incremental key.
    pub fn builder() -> CallKeyBuilder {
        CallKeyBuilder::default()
    }

    /// Assembles a key from captured values, dropping the `use_cache` flag.
    pub fn from_parts(positional: Vec<ArgValue>, mut keyword: BTreeMap<String, ArgValue>) -> Self {
        keyword.remove(USE_CACHE_FLAG);

        let mut hasher = DefaultHasher::new();
        positional.hash(&mut hasher);
        keyword.hash(&mut hasher);

        Self {
            positional,
            keyword,
            digest: hasher.finish(),
        }
    }

    pub fn positional(&self) -> &[ArgValue] {
        &self.positional
    }

    pub fn keyword(&self) -> &BTreeMap<String, ArgValue> {
        &self.keyword
    }

    /// Precomputed structural hash.
    pub fn digest(&self) -> u64 {
        self.digest
    }
}

impl PartialEq for CallKey {
    fn eq(&self, other: &Self) -> bool {
        self.digest == other.digest
            && self.positional == other.positional
            && self.keyword == other.keyword
    }
}

impl Eq for CallKey {}

impl Hash for CallKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.digest);
    }
}

impl Debug for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CallKey({:?}, {{", self.positional)?;
        for (i, (name, value)) in self.keyword.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value:?}")?;
        }
        f.write_str("})")
    }
}

// == Builder ==
/// Incremental [`CallKey`] construction.
#[derive(Debug, Default)]
pub struct CallKeyBuilder {
    positional: Vec<ArgValue>,
    keyword: BTreeMap<String, ArgValue>,
}

impl CallKeyBuilder {
    /// Appends one positional argument (not spread).
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.positional.push(capture(value)?);
        Ok(self)
    }

    /// Sets one keyword argument.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Result<Self> {
        self.keyword.insert(name.into(), capture(value)?);
        Ok(self)
    }

    pub fn build(self) -> CallKey {
        CallKey::from_parts(self.positional, self.keyword)
    }
}

// == Opaque ==
/// Participates in a key through its `Debug` text.
///
/// For argument types with no serializable structure. Two values with the
/// same `Debug` output are treated as the same argument.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Opaque<T>(pub T);

impl<T: Debug> Serialize for Opaque<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&format_args!("{:?}", self.0))
    }
}

impl<T: Debug> Debug for Opaque<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({:?})", self.0)
    }
}

// == Helpers ==
fn capture<T: Serialize + ?Sized>(value: &T) -> Result<ArgValue> {
    capture_value(value).map_err(|e| CacheError::UnhashableArgument(e.to_string()))
}

fn spread_positional(value: ArgValue) -> Vec<ArgValue> {
    match value {
        ArgValue::Unit => Vec::new(),
        ArgValue::Tuple(items) => items,
        other => vec![other],
    }
}

fn named(fields: Vec<(&'static str, ArgValue)>) -> BTreeMap<String, ArgValue> {
    fields
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

fn keyword_map(value: ArgValue) -> Result<BTreeMap<String, ArgValue>> {
    match value {
        ArgValue::Unit | ArgValue::None => Ok(BTreeMap::new()),
        ArgValue::Struct { fields, .. } => Ok(named(fields)),
        ArgValue::Map(entries) => entries
            .into_iter()
            .map(|(name, value)| match name {
                ArgValue::Str(name) => Ok((name, value)),
                other => Err(CacheError::UnhashableArgument(format!(
                    "keyword name must be a string, got {other:?}"
                ))),
            })
            .collect(),
        other => Err(CacheError::UnhashableArgument(format!(
            "keyword arguments must be a map, got {other:?}"
        ))),
    }
}

/// Positional arguments of a call bundle, as [`CallKey::from_call`] sees them.
pub(crate) fn positional_args<A: Serialize + ?Sized>(args: &A) -> Result<Vec<ArgValue>> {
    Ok(match capture(args)? {
        ArgValue::Struct { .. } => Vec::new(),
        other => spread_positional(other),
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    fn kwargs(pairs: &[(&str, i64)]) -> HashMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_equal_arguments_give_equal_keys() {
        let a = CallKey::new(&(1, 2), &kwargs(&[("a", 1)])).unwrap();
        let b = CallKey::new(&(1, 2), &kwargs(&[("a", 1)])).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_different_keyword_value_differs() {
        let a = CallKey::new(&(1, 2), &kwargs(&[("a", 1)])).unwrap();
        let b = CallKey::new(&(1, 2), &kwargs(&[("a", 2)])).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_keyword_order_is_irrelevant() {
        let a = CallKey::builder()
            .kwarg("x", &1).unwrap()
            .kwarg("y", &2).unwrap()
            .build();
        let b = CallKey::builder()
            .kwarg("y", &2).unwrap()
            .kwarg("x", &1).unwrap()
            .build();

        assert_eq!(a, b);
    }

    #[test]
    fn test_positional_and_keyword_styles_differ() {
        let positional = CallKey::builder().arg(&1).unwrap().build();
        let keyword = CallKey::builder().kwarg("a", &1).unwrap().build();

        assert_ne!(positional, keyword);
    }

    #[test]
    fn test_use_cache_flag_is_stripped() {
        let plain = CallKey::new(&(7,), &kwargs(&[("a", 1)])).unwrap();
        let flagged = CallKey::new(&(7,), &kwargs(&[("a", 1), (USE_CACHE_FLAG, 0)])).unwrap();

        assert_eq!(plain, flagged);
        assert!(!flagged.keyword().contains_key(USE_CACHE_FLAG));
    }

    #[test]
    fn test_nested_structures_hash_structurally() {
        let mut inner = HashMap::new();
        inner.insert("k", vec![1, 2, 3]);

        let a = CallKey::new(&(vec![inner.clone()],), &()).unwrap();
        let b = CallKey::new(&(vec![inner],), &()).unwrap();

        assert_eq!(a, b);
        assert_ne!(
            CallKey::new(&(vec![1, 2],), &()).unwrap(),
            CallKey::new(&(vec![2, 1],), &()).unwrap(),
        );
    }

    #[test]
    fn test_from_call_struct_is_keyword() {
        #[derive(Serialize)]
        struct Lookup {
            guild: u64,
            user: u64,
        }

        let key = CallKey::from_call(&Lookup { guild: 1, user: 2 }).unwrap();
        let expected = CallKey::builder()
            .kwarg("user", &2).unwrap()
            .kwarg("guild", &1).unwrap()
            .build();

        assert_eq!(key, expected);
        assert!(key.positional().is_empty());
    }

    #[test]
    fn test_from_call_tuple_and_scalar() {
        assert_eq!(CallKey::from_call(&(1, "a")).unwrap().positional().len(), 2);
        assert_eq!(CallKey::from_call(&42).unwrap().positional().len(), 1);
        assert!(CallKey::from_call(&()).unwrap().positional().is_empty());
    }

    #[test]
    fn test_opaque_uses_debug_text() {
        #[derive(Debug)]
        struct Handle {
            id: u32,
        }

        let a = CallKey::from_call(&(Opaque(Handle { id: 1 }),)).unwrap();
        let b = CallKey::from_call(&(Opaque(Handle { id: 1 }),)).unwrap();
        let c = CallKey::from_call(&(Opaque(Handle { id: 2 }),)).unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_unhashable_argument() {
        struct Socket;

        impl Serialize for Socket {
            fn serialize<S: Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("sockets have no stable form"))
            }
        }

        let result = CallKey::from_call(&(1, Socket));
        assert!(matches!(result, Err(CacheError::UnhashableArgument(_))));
    }

    #[test]
    fn test_compound_map_keys_are_hashable() {
        let mut map = HashMap::new();
        map.insert((1, 2), "pair");

        let a = CallKey::from_call(&(map.clone(),)).unwrap();
        let b = CallKey::from_call(&(map,)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_argument_shape_is_kept() {
        let none: Option<Vec<u64>> = None;
        assert_ne!(
            CallKey::from_call(&none).unwrap(),
            CallKey::from_call(&Some(Vec::<u64>::new())).unwrap()
        );
        assert_ne!(
            CallKey::from_call(&None::<f64>).unwrap(),
            CallKey::from_call(&Some(f64::NAN)).unwrap()
        );
        assert_eq!(
            CallKey::from_call(&Some(f64::NAN)).unwrap(),
            CallKey::from_call(&Some(f64::NAN)).unwrap()
        );

        // A sequence argument is one argument, not spread
        assert_eq!(CallKey::from_call(&vec![1, 2, 3]).unwrap().positional().len(), 1);
        assert_eq!(CallKey::from_call(&none).unwrap().positional().len(), 1);
    }

    #[test]
    fn test_non_map_kwargs_rejected() {
        let result = CallKey::new(&(), &[1, 2]);
        assert!(matches!(result, Err(CacheError::UnhashableArgument(_))));

        let mut numbered = HashMap::new();
        numbered.insert(1, 2);
        let result = CallKey::new(&(), &numbered);
        assert!(matches!(result, Err(CacheError::UnhashableArgument(_))));
    }

    #[test]
    fn test_positional_args_helper() {
        assert_eq!(positional_args(&(5u64, "x")).unwrap().len(), 2);
        assert_eq!(positional_args(&kwargs(&[("a", 1)])).unwrap().len(), 1);

        #[derive(Serialize)]
        struct Named {
            a: u8,
        }
        assert!(positional_args(&Named { a: 1 }).unwrap().is_empty());
    }
}
