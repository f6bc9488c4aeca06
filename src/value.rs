use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use crate::error::RenderError;

/// A host type exposed to templates.
///
/// Dotted access (`obj.name`) first asks [`Object::get_attr`] and falls back
/// to [`Object::get_item`]. An attribute holding a zero-argument function
/// (see [`Value::from_method`]) is invoked during lookup, so methods read like
/// plain fields inside a template.
pub trait Object: fmt::Debug + Send + Sync {
    fn get_attr(&self, name: &str) -> Option<Value>;

    fn get_item(&self, key: &str) -> Option<Value> {
        let _ = key;
        None
    }

    /// How the object appears when emitted with `{{ obj }}`.
    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type FunctionImpl = dyn Fn(&[Value]) -> Result<Value, RenderError> + Send + Sync;

/// A callable value with a fixed arity.
#[derive(Clone)]
pub struct Function {
    arity: usize,
    call: Arc<FunctionImpl>,
}

impl Function {
    pub const fn arity(&self) -> usize {
        self.arity
    }

    pub(crate) fn call(&self, args: &[Value]) -> Result<Value, RenderError> {
        (self.call)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function/{}>", self.arity)
    }
}

/// A dynamically typed value supplied to, or produced while rendering, a
/// template.
///
/// Cloning is cheap: strings, sequences, maps, objects and functions are all
/// reference counted.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Arc<str>),
    Seq(Arc<[Value]>),
    Map(Arc<BTreeMap<String, Value>>),
    Object(Arc<dyn Object>),
    Function(Function),
}

impl Value {
    /// Wraps a single argument function, usable as a pipe filter (`{{ x|f }}`).
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Self) -> Result<Self, RenderError> + Send + Sync + 'static,
    {
        Self::Function(Function {
            arity: 1,
            call: Arc::new(move |args: &[Self]| match args {
                [arg] => f(arg.clone()),
                _ => Err(RenderError::NotCallable {
                    name: "<function>".to_string(),
                    arity: args.len(),
                }),
            }),
        })
    }

    /// Wraps a zero argument function. Dotted access invokes it automatically.
    pub fn from_method<F>(f: F) -> Self
    where
        F: Fn() -> Result<Self, RenderError> + Send + Sync + 'static,
    {
        Self::Function(Function {
            arity: 0,
            call: Arc::new(move |args: &[Self]| {
                if args.is_empty() {
                    f()
                } else {
                    Err(RenderError::NotCallable {
                        name: "<method>".to_string(),
                        arity: args.len(),
                    })
                }
            }),
        })
    }

    pub fn from_object<O: Object + 'static>(object: O) -> Self {
        Self::Object(Arc::new(object))
    }

    /// A short name for the kind of value, used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Seq(_) => "sequence",
            Self::Map(_) => "map",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_ref()),
            Self::None
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Seq(_)
            | Self::Map(_)
            | Self::Object(_)
            | Self::Function(_) => None,
        }
    }

    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::None
            | Self::Bool(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Seq(_)
            | Self::Map(_)
            | Self::Object(_)
            | Self::Function(_) => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Self]> {
        match self {
            Self::Seq(items) => Some(items.as_ref()),
            Self::None
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Map(_)
            | Self::Object(_)
            | Self::Function(_) => None,
        }
    }

    /// Truthiness as used by `if` conditions.
    pub fn is_true(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Seq(items) => !items.is_empty(),
            Self::Map(map) => !map.is_empty(),
            Self::Object(_) | Self::Function(_) => true,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss, reason = "mixed int/float comparison")]
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::None
            | Self::Bool(_)
            | Self::String(_)
            | Self::Seq(_)
            | Self::Map(_)
            | Self::Object(_)
            | Self::Function(_) => None,
        }
    }

    /// Attribute-style resolution: object attributes and built-in methods.
    pub(crate) fn get_attr(&self, name: &str) -> Option<Self> {
        match self {
            Self::Object(object) => object.get_attr(name),
            Self::String(s) => match name {
                "upper" => Some(s.to_uppercase().into()),
                "lower" => Some(s.to_lowercase().into()),
                "strip" => Some(s.trim().into()),
                _ => None,
            },
            Self::Map(map) => match name {
                "keys" => Some(Self::Seq(
                    map.keys().map(|k| Self::from(k.as_str())).collect(),
                )),
                "values" => Some(Self::Seq(map.values().cloned().collect())),
                "items" => Some(Self::Seq(
                    map.iter()
                        .map(|(k, v)| Self::Seq(Arc::from([Self::from(k.as_str()), v.clone()])))
                        .collect(),
                )),
                _ => None,
            },
            Self::None
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Seq(_)
            | Self::Function(_) => None,
        }
    }

    /// Keyed resolution: map entries and object items.
    pub(crate) fn get_item(&self, key: &str) -> Option<Self> {
        match self {
            Self::Map(map) => map.get(key).cloned(),
            Self::Object(object) => object.get_item(key),
            Self::None
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::String(_)
            | Self::Seq(_)
            | Self::Function(_) => None,
        }
    }

    /// The elements a `for` loop walks over.
    pub(crate) fn try_iter(&self) -> Result<Vec<Self>, RenderError> {
        match self {
            Self::Seq(items) => Ok(items.to_vec()),
            Self::Map(map) => Ok(map.keys().map(|k| Self::from(k.as_str())).collect()),
            Self::String(s) => Ok(s.chars().map(Self::from).collect()),
            Self::None
            | Self::Bool(_)
            | Self::Int(_)
            | Self::Float(_)
            | Self::Object(_)
            | Self::Function(_) => Err(RenderError::NotIterable {
                kind: self.kind().to_string(),
            }),
        }
    }

    /// Splits a two element sequence for `for k, v in ...` loops.
    pub(crate) fn unpack_pair(&self) -> Result<(Self, Self), RenderError> {
        match self.as_seq() {
            Some([first, second]) => Ok((first.clone(), second.clone())),
            Some(_) | None => Err(RenderError::Unpack {
                kind: match self.as_seq() {
                    Some(items) => format!("{}-element sequence", items.len()),
                    None => self.kind().to_string(),
                },
            }),
        }
    }

    pub(crate) fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::String(a), Self::String(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(b)),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// Membership test behind the `in` operator; `self` is the container.
    pub(crate) fn contains(&self, needle: &Self) -> Option<bool> {
        match self {
            Self::Seq(items) => Some(items.iter().any(|item| item == needle)),
            Self::Map(map) => needle.as_str().map(|key| map.contains_key(key)),
            Self::String(haystack) => needle.as_str().map(|s| haystack.contains(s)),
            Self::Object(object) => needle.as_str().map(|key| object.get_item(key).is_some()),
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Function(_) => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Seq(a), Self::Seq(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Function(a), Self::Function(b)) => Arc::ptr_eq(&a.call, &b.call),
            (Self::Int(a), Self::Int(b)) => a == b,
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Seq(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Object(object) => object.render(f),
            Self::Function(_) => f.write_str("<function>"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(Arc::from(value))
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::from(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Float(value as f64), Self::Int)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Float(value as f64), Self::Int)
    }
}

impl From<Function> for Value {
    fn from(value: Function) -> Self {
        Self::Function(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl<T: Into<Self>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Self::Seq(value.into_iter().map(Into::into).collect())
    }
}

impl<A: Into<Self>, B: Into<Self>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Self::Seq(Arc::from([a.into(), b.into()]))
    }
}

impl<K: Into<String>, V: Into<Self>> From<BTreeMap<K, V>> for Value {
    fn from(value: BTreeMap<K, V>) -> Self {
        Self::Map(Arc::new(
            value.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

impl<K: Into<String>, V: Into<Self>, S> From<HashMap<K, V, S>> for Value {
    fn from(value: HashMap<K, V, S>) -> Self {
        Self::Map(Arc::new(
            value.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ))
    }
}

impl<V: Into<Self>> FromIterator<V> for Value {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::Seq(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use std::{collections::BTreeMap, fmt, sync::Arc};

    use serde::{
        Deserialize, Deserializer, Serialize, Serializer,
        de::{MapAccess, SeqAccess, Visitor},
    };

    use super::Value;

    impl Serialize for Value {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Self::None => serializer.serialize_unit(),
                Self::Bool(b) => serializer.serialize_bool(*b),
                Self::Int(i) => serializer.serialize_i64(*i),
                Self::Float(f) => serializer.serialize_f64(*f),
                Self::String(s) => serializer.serialize_str(s),
                Self::Seq(items) => serializer.collect_seq(items.iter()),
                Self::Map(map) => serializer.collect_map(map.iter()),
                Self::Object(_) | Self::Function(_) => serializer.collect_str(self),
            }
        }
    }

    struct ValueVisitor;

    impl<'de> Visitor<'de> for ValueVisitor {
        type Value = Value;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("any template value")
        }

        fn visit_bool<E>(self, v: bool) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::Bool(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::Int(v))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::from(v))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::Float(v))
        }

        fn visit_str<E>(self, v: &str) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::from(v))
        }

        fn visit_string<E>(self, v: String) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::from(v))
        }

        fn visit_none<E>(self) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::None)
        }

        fn visit_unit<E>(self) -> Result<Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Value::None)
        }

        fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
            Value::deserialize(deserializer)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
            let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(item) = seq.next_element::<Value>()? {
                items.push(item);
            }
            Ok(Value::Seq(Arc::from(items)))
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
            let mut map = BTreeMap::new();
            while let Some((key, value)) = access.next_entry::<String, Value>()? {
                map.insert(key, value);
            }
            Ok(Value::Map(Arc::new(map)))
        }
    }

    impl<'de> Deserialize<'de> for Value {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            deserializer.deserialize_any(ValueVisitor)
        }
    }
}
