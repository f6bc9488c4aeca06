mod ast;
mod engine;
mod error;
mod expr;
mod inherit;
mod interface;
mod lexer;
mod loader;
mod parser;
mod template;
mod value;

// Public exports.
pub use engine::TempletEngine;
pub use error::{CompileError, CompileErrorKind, LoadError, RenderError, TempletError, TempletResult};
pub use interface::{Context, TempletInterface};
pub use loader::{FileLoader, Loader};
pub use template::{Compiler, Template, compile};
pub use value::{Function, Object, Value};
