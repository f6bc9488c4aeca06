use std::collections::BTreeSet;

use crate::{
    ast::Expr,
    error::{CompileError, CompileErrorKind},
};

/// `[_a-zA-Z][_a-zA-Z0-9]*`
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An identifier optionally followed by `.identifier` steps.
pub(crate) fn is_dotted_identifier(word: &str) -> bool {
    word.split('.').all(is_identifier)
}

/// Adds `name` to `names` after checking it is a valid identifier.
pub(crate) fn register(name: &str, names: &mut BTreeSet<String>) -> Result<(), CompileError> {
    if !is_identifier(name) {
        return Err(CompileError::new(
            CompileErrorKind::InvalidName {
                name: name.to_string(),
            },
            name,
        ));
    }
    if !names.contains(name) {
        names.insert(name.to_string());
    }
    Ok(())
}

/// Compiles `{{ ... }}` content, recording every bare name it references.
///
/// Pipes bind loosest: `a.b|f|g` is `g(f(a.b))`.
pub(crate) fn compile_expr(raw: &str, names: &mut BTreeSet<String>) -> Result<Expr, CompileError> {
    let raw = raw.trim();
    if let Some((base, filters)) = raw.split_once('|') {
        let mut expr = compile_expr(base, names)?;
        for filter in filters.split('|').map(str::trim) {
            register(filter, names)?;
            expr = Expr::Pipe {
                base: Box::new(expr),
                filter: filter.to_string(),
            };
        }
        Ok(expr)
    } else if let Some((base, steps)) = raw.split_once('.') {
        let base = compile_expr(base, names)?;
        let steps = steps
            .split('.')
            .map(|step| {
                let step = step.trim();
                if is_identifier(step) {
                    Ok(step.to_string())
                } else {
                    Err(CompileError::new(
                        CompileErrorKind::InvalidName {
                            name: step.to_string(),
                        },
                        raw,
                    ))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::Dots {
            base: Box::new(base),
            steps,
        })
    } else {
        register(raw, names)?;
        Ok(Expr::Variable {
            name: raw.to_string(),
        })
    }
}
