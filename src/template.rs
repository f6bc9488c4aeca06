use std::collections::{BTreeSet, HashMap};

use crate::{
    ast::{CompareOp, Condition, Expr, LoopTarget, Node, Operand},
    error::{CompileError, CompileErrorKind, RenderError},
    inherit::{find_extends, merge},
    interface::Context,
    lexer::{Token, tokenize},
    loader::{FileLoader, Loader},
    parser::parse,
    value::Value,
};

/// A compiled template, ready to be rendered any number of times.
///
/// Compilation resolves inheritance, validates the block structure and
/// records which names must be supplied by the caller. Rendering walks the
/// compiled plan and never mutates the template, so one `Template` can be
/// shared between threads and rendered concurrently.
///
/// # Example
///
/// ```rust
/// use templet::{Context, Template};
///
/// let template = Template::new("Hello, {{ name }}!").unwrap();
///
/// let mut context = Context::new();
/// context.insert("name", "World");
///
/// assert_eq!(template.render(&context).unwrap(), "Hello, World!");
/// ```
#[derive(Debug, Clone)]
pub struct Template {
    defaults: Context,
    nodes: Vec<Node>,
    declared: BTreeSet<String>,
    loop_vars: BTreeSet<String>,
    /// `declared - loop_vars`, computed once at compile time.
    required: Vec<String>,
}

/// Compiles template source with a configured loader and default context.
///
/// ```rust
/// use std::collections::BTreeMap;
/// use templet::{Compiler, Context};
///
/// let sources = BTreeMap::from([(
///     "base.html".to_string(),
///     "<h1>{% block title %}Default{% endblock %}</h1>".to_string(),
/// )]);
/// let compiler = Compiler::with_loader(sources)
///     .default_context(&Context::new().with("site", "Blog"));
///
/// let template = compiler
///     .compile("{% extends \"base.html\" %}{% block title %}{{ site }}{% endblock %}")
///     .unwrap();
/// assert_eq!(template.render(&Context::new()).unwrap(), "<h1>Blog</h1>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Compiler<L = FileLoader> {
    loader: L,
    defaults: Context,
}

impl Compiler {
    /// A compiler resolving `extends` against the `templates` directory.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<L: Loader> Compiler<L> {
    pub fn with_loader(loader: L) -> Self {
        Self {
            loader,
            defaults: Context::new(),
        }
    }

    /// Swaps the loader, keeping the default context.
    pub fn loader<M: Loader>(self, loader: M) -> Compiler<M> {
        Compiler {
            loader,
            defaults: self.defaults,
        }
    }

    /// Layers `context` over the defaults gathered so far.
    #[must_use]
    pub fn default_context(mut self, context: &Context) -> Self {
        self.defaults.merge(context);
        self
    }

    /// Compiles `source` into a [`Template`].
    ///
    /// # Errors
    /// Returns a [`CompileError`] carrying the offending token if the markup
    /// is malformed or the base template cannot be loaded.
    pub fn compile(&self, source: &str) -> Result<Template, CompileError> {
        let tokens = tokenize(source);
        let base_source;
        let merged;
        let stream: &[Token<'_>] = match find_extends(&tokens)? {
            Some((index, path)) => {
                let extends = tokens.get(index).map_or("", |t| t.raw);
                base_source = self.loader.load(path).map_err(|e| {
                    CompileError::new(CompileErrorKind::BaseTemplate(e), extends)
                })?;
                tracing::debug!(base = path, "resolving template inheritance");
                let base_tokens = tokenize(&base_source);
                merged = merge(tokens.get(index + 1..).unwrap_or_default(), &base_tokens)?;
                &merged
            }
            None => &tokens,
        };

        let program = parse(stream)?;
        let required: Vec<String> = program
            .declared
            .difference(&program.loop_vars)
            .cloned()
            .collect();

        tracing::debug!(
            nodes = program.nodes.len(),
            required = required.len(),
            "compiled template"
        );

        Ok(Template {
            defaults: self.defaults.clone(),
            nodes: program.nodes,
            declared: program.declared,
            loop_vars: program.loop_vars,
            required,
        })
    }
}

/// Compiles `source` with default contexts merged left to right.
///
/// `extends` is resolved against the `templates` directory; use a
/// [`Compiler`] to load base templates from elsewhere.
///
/// # Errors
/// See [`Compiler::compile`].
pub fn compile<I>(source: &str, defaults: I) -> Result<Template, CompileError>
where
    I: IntoIterator<Item = Context>,
{
    defaults
        .into_iter()
        .fold(Compiler::new(), |compiler, context| {
            compiler.default_context(&context)
        })
        .compile(source)
}

impl Template {
    /// Compiles a template with no default context.
    ///
    /// # Errors
    /// See [`Compiler::compile`].
    pub fn new(source: &str) -> Result<Self, CompileError> {
        Compiler::new().compile(source)
    }

    /// Names the caller has to supply (unless a default provides them).
    pub fn required_variables(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str)
    }

    /// Every bare name referenced by an expression, loop variables included.
    pub fn declared_variables(&self) -> impl Iterator<Item = &str> {
        self.declared.iter().map(String::as_str)
    }

    pub fn loop_variables(&self) -> impl Iterator<Item = &str> {
        self.loop_vars.iter().map(String::as_str)
    }

    pub const fn defaults(&self) -> &Context {
        &self.defaults
    }

    /// Required names found in neither `context` nor the defaults.
    pub fn missing_variables<'a>(&'a self, context: &Context) -> Vec<&'a str> {
        self.required_variables()
            .filter(|name| !context.contains(name) && !self.defaults.contains(name))
            .collect()
    }

    /// Renders the template with `context` layered over the defaults.
    ///
    /// # Errors
    /// - [`RenderError::UndefinedVariable`] if a required name is missing,
    ///   before any output is produced.
    /// - Any failure evaluating an expression, condition or loop.
    pub fn render(&self, context: &Context) -> Result<String, RenderError> {
        if let Some(name) = self.missing_variables(context).first() {
            return Err(RenderError::UndefinedVariable {
                name: (*name).to_string(),
            });
        }
        tracing::trace!(
            nodes = self.nodes.len(),
            supplied = context.len(),
            "rendering template"
        );

        let mut renderer = Renderer {
            context,
            defaults: &self.defaults,
            locals: HashMap::new(),
        };
        let mut out = String::new();
        renderer.render_nodes(&self.nodes, &mut out)?;
        Ok(out)
    }
}

/// Per-render walk state. Loop bindings shadow the call context, which
/// shadows the template defaults.
struct Renderer<'t> {
    context: &'t Context,
    defaults: &'t Context,
    locals: HashMap<&'t str, Value>,
}

impl<'t> Renderer<'t> {
    fn lookup(&self, name: &str) -> Result<Value, RenderError> {
        self.locals
            .get(name)
            .or_else(|| self.context.get(name))
            .or_else(|| self.defaults.get(name))
            .cloned()
            .ok_or_else(|| RenderError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn render_nodes(&mut self, nodes: &'t [Node], out: &mut String) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Emit(expr) => out.push_str(&self.eval(expr)?.to_string()),
                Node::If {
                    branches,
                    otherwise,
                } => {
                    let mut taken = None;
                    for branch in branches {
                        if self.test(&branch.condition)? {
                            taken = Some(&branch.body);
                            break;
                        }
                    }
                    if let Some(body) = taken.or(otherwise.as_ref()) {
                        self.render_nodes(body, out)?;
                    }
                }
                Node::For {
                    target,
                    source,
                    body,
                } => {
                    let items = self.eval(source)?.try_iter()?;
                    self.render_loop(target, items, body, out)?;
                }
            }
        }
        Ok(())
    }

    /// Runs a loop body per item, then restores whatever the loop variables
    /// were bound to before.
    fn render_loop(
        &mut self,
        target: &'t LoopTarget,
        items: Vec<Value>,
        body: &'t [Node],
        out: &mut String,
    ) -> Result<(), RenderError> {
        let names: &[&'t str] = &match target {
            LoopTarget::Single(name) => vec![name.as_str()],
            LoopTarget::Pair(key, value) => vec![key.as_str(), value.as_str()],
        };
        let saved: Vec<(&'t str, Option<Value>)> = names
            .iter()
            .map(|name| (*name, self.locals.get(name).cloned()))
            .collect();

        let result = items.into_iter().try_for_each(|item| {
            match target {
                LoopTarget::Single(name) => {
                    self.locals.insert(name.as_str(), item);
                }
                LoopTarget::Pair(key, value) => {
                    let (first, second) = item.unpack_pair()?;
                    self.locals.insert(key.as_str(), first);
                    self.locals.insert(value.as_str(), second);
                }
            }
            self.render_nodes(body, out)
        });

        for (name, previous) in saved {
            match previous {
                Some(value) => self.locals.insert(name, value),
                None => self.locals.remove(name),
            };
        }
        result
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RenderError> {
        match expr {
            Expr::Variable { name } => self.lookup(name),
            Expr::Pipe { base, filter } => {
                let value = self.eval(base)?;
                match self.lookup(filter)? {
                    Value::Function(function) if function.arity() == 1 => function.call(&[value]),
                    _ => Err(RenderError::NotCallable {
                        name: filter.clone(),
                        arity: 1,
                    }),
                }
            }
            Expr::Dots { base, steps } => {
                let mut value = self.eval(base)?;
                for step in steps {
                    let resolved = value
                        .get_attr(step)
                        .or_else(|| value.get_item(step))
                        .ok_or_else(|| RenderError::AttributeLookup {
                            step: step.clone(),
                            kind: value.kind().to_string(),
                        })?;
                    value = match resolved {
                        Value::Function(method) if method.arity() == 0 => method.call(&[])?,
                        other => other,
                    };
                }
                Ok(value)
            }
        }
    }

    fn operand(&self, operand: &Operand) -> Result<Value, RenderError> {
        match operand {
            Operand::Expr(expr) => self.eval(expr),
            Operand::Literal(value) => Ok(value.clone()),
        }
    }

    fn test(&self, condition: &Condition) -> Result<bool, RenderError> {
        match condition {
            Condition::Operand(operand) => Ok(self.operand(operand)?.is_true()),
            Condition::Not { condition } => Ok(!self.test(condition)?),
            Condition::And { left, right } => Ok(self.test(left)? && self.test(right)?),
            Condition::Or { left, right } => Ok(self.test(left)? || self.test(right)?),
            Condition::Compare { op, left, right } => {
                compare(*op, &self.operand(left)?, &self.operand(right)?)
            }
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, RenderError> {
    let invalid = || RenderError::InvalidOperation {
        op: op.symbol().to_string(),
        left: left.kind().to_string(),
        right: right.kind().to_string(),
    };
    match op {
        CompareOp::Eq => Ok(left == right),
        CompareOp::Ne => Ok(left != right),
        CompareOp::In => right.contains(left).ok_or_else(invalid),
        CompareOp::NotIn => right.contains(left).map(|found| !found).ok_or_else(invalid),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let ordering = left.compare(right).ok_or_else(invalid)?;
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            })
        }
    }
}
