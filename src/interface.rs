use std::collections::BTreeMap;

use crate::value::Value;

/// Name to value mapping supplied when rendering a template.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context {
    data: BTreeMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: AsRef<str>, V: Into<Value>>(&mut self, name: T, value: V) -> &mut Self {
        self.data.insert(name.as_ref().to_string(), value.into());
        self
    }

    /// Builder flavour of [`Context::insert`].
    #[must_use]
    pub fn with<T: AsRef<str>, V: Into<Value>>(mut self, name: T, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get<T: AsRef<str>>(&self, name: T) -> Option<&Value> {
        self.data.get(name.as_ref())
    }

    pub fn contains<T: AsRef<str>>(&self, name: T) -> bool {
        self.data.contains_key(name.as_ref())
    }

    /// Overlays `other` on this context; keys of `other` win.
    pub fn merge(&mut self, other: &Self) -> &mut Self {
        self.data
            .extend(other.data.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Context {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.data
            .extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}

impl From<Context> for Value {
    fn from(context: Context) -> Self {
        Self::from(context.data)
    }
}

/// `TempletInterface` is the registry facing side of the templet engine: named
/// templates are added once and rendered many times.
pub trait TempletInterface {
    /// `add_template` compiles a template and makes it available under `name`.
    ///
    /// # Errors
    /// - If the template name is a duplicate.
    /// - If the template fails to compile.
    fn add_template<N: AsRef<str>, C: Into<String>>(
        &mut self,
        name: N,
        content: C,
    ) -> crate::TempletResult<()>;

    /// `render` renders a template with the given context.
    ///
    /// # Errors
    /// - If the template name is not found.
    /// - If a required context variable is missing, or evaluation fails.
    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        context: Option<&Context>,
    ) -> crate::TempletResult<String>;

    /// `context` returns the names a template still needs from the caller,
    /// given what `context` already supplies.
    ///
    /// Returns an empty list for unknown templates.
    fn context<'b, T: AsRef<str>>(&'b self, template_name: T, context: &Context) -> Vec<&'b str>;
}
