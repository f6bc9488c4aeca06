pub type TempletResult<T> = std::result::Result<T, TempletError>;

/// Failure of a [`Loader`](crate::Loader) to produce template source.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum LoadError {
    #[error("template '{path}' not found")]
    NotFound { path: String },
    #[error("failed to read template '{path}': {message}")]
    Io { path: String, message: String },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum CompileErrorKind {
    #[error("Unmatched action tag '{tag}'")]
    UnmatchedTag { tag: String },
    #[error("Mismatched end tag, expected 'end{expected}'")]
    MismatchedEndTag { expected: String },
    #[error("Too many ends")]
    TooManyEnds,
    #[error("Don't understand tag '{keyword}'")]
    UnknownTag { keyword: String },
    #[error("Don't understand {what}")]
    Malformed { what: String },
    #[error("Not a valid name '{name}'")]
    InvalidName { name: String },
    #[error("Don't understand condition: {description}")]
    InvalidCondition { description: String },
    #[error("Block '{name}' not found in base template")]
    UnknownBlock { name: String },
    #[error("Block '{name}' declared more than once")]
    DuplicateBlock { name: String },
    #[error("Block '{name}' overridden out of base template order")]
    BlockOutOfOrder { name: String },
    #[error("Template code outside of a block")]
    OutsideBlock,
    #[error("super() used outside of a block")]
    SuperOutsideBlock,
    #[error("Failed to load base template: {0}")]
    BaseTemplate(LoadError),
}

/// A structural defect found while compiling a template.
///
/// Always carries the raw token (or name) that triggered it.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{kind}: {token:?}")]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub token: String,
}

impl CompileError {
    pub(crate) fn new<T: Into<String>>(kind: CompileErrorKind, token: T) -> Self {
        Self {
            kind,
            token: token.into(),
        }
    }

    /// Replaces the offending text with the whole token it came from.
    pub(crate) fn with_token<T: Into<String>>(mut self, token: T) -> Self {
        self.token = token.into();
        self
    }
}

/// A failure found while evaluating a compiled template against a context.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RenderError {
    #[error("Variable not found: {name}")]
    UndefinedVariable { name: String },
    #[error("Cannot resolve '.{step}' on {kind} value")]
    AttributeLookup { step: String, kind: String },
    #[error("Value of kind {kind} is not iterable")]
    NotIterable { kind: String },
    #[error("Cannot unpack {kind} value into two loop variables")]
    Unpack { kind: String },
    #[error("'{name}' is not callable with {arity} argument(s)")]
    NotCallable { name: String, arity: usize },
    #[error("Cannot apply '{op}' to {left} and {right}")]
    InvalidOperation {
        op: String,
        left: String,
        right: String,
    },
    #[error("{message}")]
    Custom { message: String },
}

impl RenderError {
    /// Builds an error from inside a user supplied function.
    pub fn custom<T: Into<String>>(message: T) -> Self {
        Self::Custom {
            message: message.into(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum TempletError {
    #[error("Template already exists: {template_name}")]
    TemplateExists { template_name: String },
    #[error("Template not found: {template_name}")]
    MissingTemplate { template_name: String },
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Render(#[from] RenderError),
}
