use std::collections::{BTreeMap, HashMap};

use crate::error::{LoadError, TempletError, TempletResult};
use crate::interface::{Context, TempletInterface};
use crate::loader::Loader;
use crate::template::{Compiler, Template};
use crate::value::Value;

/// `TempletEngine` is the primary implementation of the `TempletInterface`
/// trait: a registry of named templates that can be added, rendered and
/// inspected for the context they still need.
///
/// Templates may `{% extends %}` any template added before them, by name.
///
/// # Examples
///
/// ```
/// use templet::{Context, TempletEngine, TempletInterface};
///
/// // Create a new engine
/// let mut engine = TempletEngine::new();
///
/// // Add a base template and a child extending it
/// engine.add_template("base", "<b>{% block body %}{% endblock %}</b>").unwrap();
/// engine
///     .add_template("greeting", "{% extends 'base' %}{% block body %}Hello, {{ name }}!{% endblock %}")
///     .unwrap();
///
/// // Setup context
/// let mut context = Context::new();
/// context.insert("name", "World");
///
/// // Render template
/// let output = engine.render("greeting", Some(&context)).unwrap();
/// assert_eq!(output, "<b>Hello, World!</b>");
/// ```
#[derive(Debug, Default)]
pub struct TempletEngine {
    sources: BTreeMap<String, String>,
    templates: HashMap<String, Template>,
    globals: Context,
}

impl TempletEngine {
    /// Creates a new empty `TempletEngine` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `value` available to every template added from now on, unless
    /// the render context supplies the same name.
    ///
    /// # Examples
    ///
    /// ```
    /// use templet::{TempletEngine, TempletInterface, Value};
    ///
    /// let mut engine = TempletEngine::new();
    /// engine.add_global("shout", Value::from_fn(|v| Ok(v.to_string().to_uppercase().into())));
    /// engine.add_template("t", "{{ word|shout }}").unwrap();
    /// ```
    pub fn add_global<N: AsRef<str>, V: Into<Value>>(&mut self, name: N, value: V) -> &mut Self {
        self.globals.insert(name, value);
        self
    }

    pub fn get_template<N: AsRef<str>>(&self, name: N) -> Option<&Template> {
        self.templates.get(name.as_ref())
    }
}

impl Loader for TempletEngine {
    fn load(&self, path: &str) -> Result<String, LoadError> {
        self.sources.load(path)
    }
}

impl TempletInterface for TempletEngine {
    /// Adds a new template to the engine with the given name and content.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if the template was successfully added
    /// * `Err(TempletError::TemplateExists)` if a template with the given name already exists
    /// * `Err(TempletError::Compile)` if the template content contains syntax errors
    fn add_template<N: AsRef<str>, C: Into<String>>(
        &mut self,
        name: N,
        content: C,
    ) -> TempletResult<()> {
        let name = name.as_ref();

        if self.templates.contains_key(name) {
            return Err(TempletError::TemplateExists {
                template_name: name.to_string(),
            });
        }

        let content: String = content.into();
        let template = Compiler::with_loader(&*self)
            .default_context(&self.globals)
            .compile(&content)?;
        tracing::debug!(template = name, "added template");

        self.sources.insert(name.to_string(), content);
        self.templates.insert(name.to_string(), template);

        Ok(())
    }

    /// Renders a template with the given name using the provided context.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` containing the rendered template content
    /// * `Err(TempletError::MissingTemplate)` if no template with the given name exists
    /// * `Err(TempletError::Render)` for missing variables and evaluation failures
    fn render<N: AsRef<str>>(
        &self,
        template_name: N,
        context: Option<&Context>,
    ) -> TempletResult<String> {
        let name = template_name.as_ref();
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| TempletError::MissingTemplate {
                template_name: name.to_string(),
            })?;

        let default_context = Context::default();
        let context = context.unwrap_or(&default_context);

        Ok(template.render(context)?)
    }

    /// Lists the variables a template requires that are neither in `context`
    /// nor provided as globals, sorted by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use templet::{Context, TempletEngine, TempletInterface};
    ///
    /// let mut engine = TempletEngine::new();
    /// engine.add_template("greeting", "{{ greeting }}, {{ name }}!").unwrap();
    ///
    /// let context = Context::new().with("greeting", "Hello");
    /// assert_eq!(engine.context("greeting", &context), vec!["name"]);
    /// ```
    fn context<'b, T: AsRef<str>>(&'b self, template_name: T, context: &Context) -> Vec<&'b str> {
        self.templates
            .get(template_name.as_ref())
            .map(|template| template.missing_variables(context))
            .unwrap_or_default()
    }
}
