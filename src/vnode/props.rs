//! Prop values.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

/// Event handler attached as a prop. Compared by identity.
pub type EventHandler = Rc<dyn Fn(&PropValue)>;

/// Ordered prop map. Insertion order is preserved so host operations are
/// deterministic.
pub type Props = IndexMap<String, PropValue>;

/// A prop value.
#[derive(Clone)]
pub enum PropValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<PropValue>),
    Map(IndexMap<String, PropValue>),
    Handler(EventHandler),
}

impl PropValue {
    pub fn handler(f: impl Fn(&PropValue) + 'static) -> Self {
        PropValue::Handler(Rc::new(f))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    /// JavaScript-style truthiness, used by class maps.
    pub fn is_truthy(&self) -> bool {
        match self {
            PropValue::Null => false,
            PropValue::Bool(b) => *b,
            PropValue::Int(i) => *i != 0,
            PropValue::Float(f) => *f != 0.0 && !f.is_nan(),
            PropValue::Str(s) => !s.is_empty(),
            PropValue::List(_) | PropValue::Map(_) | PropValue::Handler(_) => true,
        }
    }
}

impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PropValue::Null, PropValue::Null) => true,
            (PropValue::Bool(a), PropValue::Bool(b)) => a == b,
            (PropValue::Int(a), PropValue::Int(b)) => a == b,
            (PropValue::Float(a), PropValue::Float(b)) => a == b,
            (PropValue::Str(a), PropValue::Str(b)) => a == b,
            (PropValue::List(a), PropValue::List(b)) => a == b,
            (PropValue::Map(a), PropValue::Map(b)) => a == b,
            (PropValue::Handler(a), PropValue::Handler(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => f.write_str("Null"),
            PropValue::Bool(b) => write!(f, "Bool({b})"),
            PropValue::Int(i) => write!(f, "Int({i})"),
            PropValue::Float(x) => write!(f, "Float({x})"),
            PropValue::Str(s) => write!(f, "Str({s:?})"),
            PropValue::List(items) => f.debug_tuple("List").field(items).finish(),
            PropValue::Map(map) => f.debug_tuple("Map").field(map).finish(),
            PropValue::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Null => Ok(()),
            PropValue::Bool(b) => write!(f, "{b}"),
            PropValue::Int(i) => write!(f, "{i}"),
            PropValue::Float(x) => write!(f, "{x}"),
            PropValue::Str(s) => f.write_str(s),
            PropValue::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            PropValue::Map(map) => {
                for (key, value) in map {
                    write!(f, "{key}:{value};")?;
                }
                Ok(())
            }
            PropValue::Handler(_) => Ok(()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Str(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Str(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        PropValue::Bool(b)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        PropValue::Int(i64::from(i))
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Int(i)
    }
}

impl From<usize> for PropValue {
    fn from(i: usize) -> Self {
        PropValue::Int(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<f64> for PropValue {
    fn from(x: f64) -> Self {
        PropValue::Float(x)
    }
}

impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
    fn from(items: Vec<T>) -> Self {
        PropValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<IndexMap<String, PropValue>> for PropValue {
    fn from(map: IndexMap<String, PropValue>) -> Self {
        PropValue::Map(map)
    }
}

/// Build a [`Props`] map from pairs.
///
/// ```ignore
/// let p = props([("id", PropValue::from("main")), ("tabindex", 0.into())]);
/// ```
pub fn props<K, V, I>(pairs: I) -> Props
where
    K: Into<String>,
    V: Into<PropValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_identity_equality() {
        let h = PropValue::handler(|_| {});
        assert_eq!(h, h.clone());
        assert_ne!(h, PropValue::handler(|_| {}));
    }

    #[test]
    fn test_props_preserve_order() {
        let p = props([("b", 1), ("a", 2)]);
        let keys: Vec<_> = p.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_truthiness() {
        assert!(!PropValue::Null.is_truthy());
        assert!(!PropValue::from("").is_truthy());
        assert!(PropValue::from(1).is_truthy());
        assert!(!PropValue::from(false).is_truthy());
    }
}
