//! Single-level template inheritance as a token stream rewrite.
//!
//! A child starting with `{% extends "base" %}` supplies `{% block name %}`
//! bodies; these replace the base template's blocks of the same name, and
//! `{{ super() }}` re-inserts the base body inside an override. The merged
//! stream is compiled like any other template.

use std::collections::BTreeMap;

use crate::{
    error::{CompileError, CompileErrorKind},
    expr::is_identifier,
    lexer::{Token, TokenKind},
};

/// Token indices of a `block`/`endblock` pair in the base stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    /// Index range of the tokens between the two tags.
    const fn interior(self) -> std::ops::Range<usize> {
        self.start + 1..self.end
    }
}

fn malformed(what: &str, token: &Token<'_>) -> CompileError {
    CompileError::new(
        CompileErrorKind::Malformed {
            what: what.to_string(),
        },
        token.raw,
    )
}

/// Finds an `extends` as the first statement and returns its index and path.
///
/// Anything before it has to be blank text or comments.
pub(crate) fn find_extends<'a>(
    tokens: &[Token<'a>],
) -> Result<Option<(usize, &'a str)>, CompileError> {
    let Some((index, token)) = tokens
        .iter()
        .enumerate()
        .find(|(_, t)| t.kind == TokenKind::Statement)
    else {
        return Ok(None);
    };
    if token.keyword() != Some("extends") {
        return Ok(None);
    }

    let path = match token.words().as_slice() {
        [_, quoted] => unquote(quoted).ok_or_else(|| malformed("extends", token))?,
        _ => return Err(malformed("extends", token)),
    };

    if let Some(stray) = tokens
        .iter()
        .take(index)
        .find(|t| t.kind != TokenKind::Comment && !t.is_blank())
    {
        return Err(CompileError::new(CompileErrorKind::OutsideBlock, stray.raw));
    }

    Ok(Some((index, path)))
}

fn unquote(quoted: &str) -> Option<&str> {
    ['"', '\'']
        .into_iter()
        .find_map(|q| quoted.strip_prefix(q)?.strip_suffix(q))
        .filter(|path| !path.is_empty())
}

/// Checks an `endblock` closes `open`: either bare or naming the same block.
fn closes(words: &[&str], open: &str) -> bool {
    match words {
        ["endblock"] => true,
        ["endblock", name] => *name == open,
        _ => false,
    }
}

/// Locates every named block of a base template.
pub(crate) fn block_spans<'a>(
    base: &[Token<'a>],
) -> Result<BTreeMap<&'a str, BlockSpan>, CompileError> {
    let mut spans = BTreeMap::new();
    let mut open: Option<(&'a str, usize)> = None;

    for (index, token) in base.iter().enumerate() {
        if token.kind != TokenKind::Statement {
            continue;
        }
        let words = token.words();
        match (words.first().copied(), open) {
            (Some("block"), None) => {
                let [_, name] = words.as_slice() else {
                    return Err(malformed("block", token));
                };
                if !is_identifier(name) {
                    return Err(CompileError::new(
                        CompileErrorKind::InvalidName {
                            name: (*name).to_string(),
                        },
                        token.raw,
                    ));
                }
                open = Some((*name, index));
            }
            (Some("block"), Some(_)) => return Err(malformed("nested block", token)),
            (Some("endblock"), Some((name, start))) => {
                if !closes(&words, name) {
                    return Err(malformed("endblock", token));
                }
                if spans.contains_key(name) {
                    return Err(CompileError::new(
                        CompileErrorKind::DuplicateBlock {
                            name: name.to_string(),
                        },
                        token.raw,
                    ));
                }
                spans.insert(name, BlockSpan { start, end: index });
                open = None;
            }
            (Some("endblock"), None) => return Err(malformed("endblock", token)),
            _ => {}
        }
    }

    if let Some((_, start)) = open {
        let raw = base.get(start).map_or("", |t| t.raw);
        return Err(CompileError::new(
            CompileErrorKind::UnmatchedTag {
                tag: "block".to_string(),
            },
            raw,
        ));
    }
    Ok(spans)
}

/// Splices the child's block overrides into the base stream.
///
/// `child` holds the tokens after the `extends` tag. Overrides must follow
/// the order of the blocks in the base template.
pub(crate) fn merge<'a>(
    child: &[Token<'a>],
    base: &[Token<'a>],
) -> Result<Vec<Token<'a>>, CompileError> {
    let spans = block_spans(base)?;
    let mut merged = Vec::with_capacity(base.len() + child.len());
    let mut cursor = 0;
    let mut open: Option<(&str, BlockSpan)> = None;

    for token in child {
        match token.kind {
            TokenKind::Statement => {
                let words = token.words();
                match (words.first().copied(), open) {
                    (Some("block"), None) => {
                        let [_, name] = words.as_slice() else {
                            return Err(malformed("block", token));
                        };
                        let span = *spans.get(name).ok_or_else(|| {
                            CompileError::new(
                                CompileErrorKind::UnknownBlock {
                                    name: (*name).to_string(),
                                },
                                token.raw,
                            )
                        })?;
                        if span.start < cursor {
                            return Err(CompileError::new(
                                CompileErrorKind::BlockOutOfOrder {
                                    name: (*name).to_string(),
                                },
                                token.raw,
                            ));
                        }
                        merged.extend_from_slice(base.get(cursor..span.start).unwrap_or_default());
                        cursor = span.end + 1;
                        open = Some((*name, span));
                        continue;
                    }
                    (Some("block"), Some(_)) => return Err(malformed("nested block", token)),
                    (Some("endblock"), Some((name, _))) => {
                        if !closes(&words, name) {
                            return Err(malformed("endblock", token));
                        }
                        open = None;
                        continue;
                    }
                    (Some("endblock"), None) => return Err(malformed("endblock", token)),
                    _ => {}
                }
            }
            TokenKind::Expression if token.content() == "super()" => {
                let Some((_, span)) = open else {
                    return Err(CompileError::new(
                        CompileErrorKind::SuperOutsideBlock,
                        token.raw,
                    ));
                };
                merged.extend_from_slice(base.get(span.interior()).unwrap_or_default());
                continue;
            }
            TokenKind::Literal | TokenKind::Expression | TokenKind::Comment => {}
        }

        if open.is_some() {
            merged.push(*token);
        } else if token.kind != TokenKind::Comment && !token.is_blank() {
            return Err(CompileError::new(CompileErrorKind::OutsideBlock, token.raw));
        }
    }

    if open.is_some() {
        return Err(CompileError::new(
            CompileErrorKind::UnmatchedTag {
                tag: "block".to_string(),
            },
            child.last().map_or("", |t| t.raw),
        ));
    }

    merged.extend_from_slice(base.get(cursor..).unwrap_or_default());
    tracing::debug!(
        blocks = spans.len(),
        tokens = merged.len(),
        "merged child blocks into base template"
    );
    Ok(merged)
}
