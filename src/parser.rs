use std::collections::BTreeSet;

use crate::{
    ast::{Branch, CompareOp, Condition, Expr, LoopTarget, Node, Operand},
    error::{CompileError, CompileErrorKind},
    expr::{compile_expr, is_dotted_identifier, register},
    lexer::{Token, TokenKind},
    value::Value,
};

type ParseResult<T> = Result<T, CompileError>;

/// Output of the structural compiler.
#[derive(Debug, Default)]
pub(crate) struct Program {
    pub nodes: Vec<Node>,
    /// Every bare name referenced by an expression.
    pub declared: BTreeSet<String>,
    /// Names bound by `for` loops.
    pub loop_vars: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    If,
    Elif,
    Else,
}

/// An open block on the compile stack.
enum Frame<'a> {
    Conditional {
        opened_by: &'a str,
        section: Section,
        branches: Vec<Branch>,
        /// Condition guarding `body`; `None` once inside `else`.
        condition: Option<Condition>,
        body: Vec<Node>,
    },
    Loop {
        opened_by: &'a str,
        target: LoopTarget,
        source: Expr,
        body: Vec<Node>,
    },
}

impl Frame<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Conditional { .. } => "if",
            Self::Loop { .. } => "for",
        }
    }

    const fn opened_by(&self) -> &str {
        match self {
            Self::Conditional { opened_by, .. } | Self::Loop { opened_by, .. } => *opened_by,
        }
    }

    fn into_node(self) -> Node {
        match self {
            Self::Conditional {
                mut branches,
                condition,
                body,
                ..
            } => {
                let otherwise = match condition {
                    Some(condition) => {
                        branches.push(Branch { condition, body });
                        None
                    }
                    None => Some(body),
                };
                Node::If {
                    branches,
                    otherwise,
                }
            }
            Self::Loop {
                target,
                source,
                body,
                ..
            } => Node::For {
                target,
                source,
                body,
            },
        }
    }
}

struct Parser<'a> {
    stack: Vec<Frame<'a>>,
    program: Program,
}

impl<'a> Parser<'a> {
    fn new() -> Self {
        Self {
            stack: Vec::new(),
            program: Program::default(),
        }
    }

    /// The node list currently being filled.
    fn body(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(Frame::Conditional { body, .. } | Frame::Loop { body, .. }) => body,
            None => &mut self.program.nodes,
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let body = self.body();
        if let Some(Node::Text(previous)) = body.last_mut() {
            previous.push_str(text);
        } else {
            body.push(Node::Text(text.to_string()));
        }
    }

    fn parse_token(&mut self, token: &Token<'a>) -> ParseResult<()> {
        match token.kind {
            TokenKind::Comment => Ok(()),
            TokenKind::Literal => {
                self.push_text(token.raw);
                Ok(())
            }
            TokenKind::Expression => {
                let expr = compile_expr(token.content(), &mut self.program.declared)
                    .map_err(|e| e.with_token(token.raw))?;
                self.body().push(Node::Emit(expr));
                Ok(())
            }
            TokenKind::Statement => self.parse_statement(token),
        }
    }

    fn parse_statement(&mut self, token: &Token<'a>) -> ParseResult<()> {
        let words = token.words();
        match words.as_slice() {
            ["if", terms @ ..] => {
                let condition = self.parse_condition(terms, token)?;
                self.stack.push(Frame::Conditional {
                    opened_by: token.raw,
                    section: Section::If,
                    branches: Vec::new(),
                    condition: Some(condition),
                    body: Vec::new(),
                });
                Ok(())
            }
            ["elif", terms @ ..] => {
                let condition = self.parse_condition(terms, token)?;
                self.next_section(Section::Elif, Some(condition), token)
            }
            ["else"] => self.next_section(Section::Else, None, token),
            ["else", ..] => Err(malformed("else", token)),
            ["for", ..] => self.parse_for(&words, token),
            // Consumed by inheritance, or harmless in a template that never extends.
            ["block" | "extends", ..] => Ok(()),
            [keyword, rest @ ..] if keyword.starts_with("end") => {
                let what = keyword.strip_prefix("end").unwrap_or_default();
                if what == "block" {
                    return Ok(());
                }
                if !rest.is_empty() {
                    return Err(malformed("end", token));
                }
                self.close(what, token)
            }
            [keyword, ..] => Err(CompileError::new(
                CompileErrorKind::UnknownTag {
                    keyword: (*keyword).to_string(),
                },
                token.raw,
            )),
            [] => Err(CompileError::new(
                CompileErrorKind::UnknownTag {
                    keyword: String::new(),
                },
                token.raw,
            )),
        }
    }

    /// Moves an open `if` on to its next `elif`/`else` section.
    fn next_section(
        &mut self,
        next: Section,
        next_condition: Option<Condition>,
        token: &Token<'a>,
    ) -> ParseResult<()> {
        let what = if next == Section::Else { "else" } else { "elif" };
        match self.stack.last_mut() {
            Some(Frame::Conditional {
                section,
                branches,
                condition,
                body,
                ..
            }) if *section != Section::Else => {
                let finished = std::mem::take(body);
                if let Some(finished_condition) = condition.take() {
                    branches.push(Branch {
                        condition: finished_condition,
                        body: finished,
                    });
                }
                *section = next;
                *condition = next_condition;
                Ok(())
            }
            Some(Frame::Conditional { .. } | Frame::Loop { .. }) | None => {
                Err(malformed(what, token))
            }
        }
    }

    fn close(&mut self, what: &str, token: &Token<'a>) -> ParseResult<()> {
        let Some(frame) = self.stack.pop() else {
            return Err(CompileError::new(CompileErrorKind::TooManyEnds, token.raw));
        };
        if frame.kind() != what {
            return Err(CompileError::new(
                CompileErrorKind::MismatchedEndTag {
                    expected: frame.kind().to_string(),
                },
                token.raw,
            ));
        }
        let node = frame.into_node();
        self.body().push(node);
        Ok(())
    }

    /// `for v in src`, `for k, v in src` or `for k , v in src`.
    fn parse_for(&mut self, words: &[&'a str], token: &Token<'a>) -> ParseResult<()> {
        let (target, source) = match words {
            [_, name, "in", source] => match name.split_once(',') {
                Some((key, value)) => (self.pair(key, value, token)?, *source),
                None => (self.single(name, token)?, *source),
            },
            [_, key, value, "in", source] if key.ends_with(',') || value.starts_with(',') => {
                let key = key.strip_suffix(',').unwrap_or(key);
                let value = value.strip_prefix(',').unwrap_or(value);
                (self.pair(key, value, token)?, *source)
            }
            [_, key, ",", value, "in", source] => (self.pair(key, value, token)?, *source),
            _ => return Err(malformed("for", token)),
        };
        let source = compile_expr(source, &mut self.program.declared)
            .map_err(|e| e.with_token(token.raw))?;
        self.stack.push(Frame::Loop {
            opened_by: token.raw,
            target,
            source,
            body: Vec::new(),
        });
        Ok(())
    }

    fn single(&mut self, name: &str, token: &Token<'a>) -> ParseResult<LoopTarget> {
        register(name, &mut self.program.loop_vars).map_err(|e| e.with_token(token.raw))?;
        Ok(LoopTarget::Single(name.to_string()))
    }

    fn pair(&mut self, key: &str, value: &str, token: &Token<'a>) -> ParseResult<LoopTarget> {
        register(key, &mut self.program.loop_vars).map_err(|e| e.with_token(token.raw))?;
        register(value, &mut self.program.loop_vars).map_err(|e| e.with_token(token.raw))?;
        Ok(LoopTarget::Pair(key.to_string(), value.to_string()))
    }

    fn parse_condition(&mut self, terms: &[&str], token: &Token<'a>) -> ParseResult<Condition> {
        if terms.is_empty() {
            return Err(malformed(token.keyword().unwrap_or("if"), token));
        }
        ConditionParser {
            terms,
            pos: 0,
            names: &mut self.program.declared,
        }
        .parse()
        .map_err(|e| e.with_token(token.raw))
    }

    fn finish(self) -> ParseResult<Program> {
        if let Some(frame) = self.stack.last() {
            return Err(CompileError::new(
                CompileErrorKind::UnmatchedTag {
                    tag: frame.kind().to_string(),
                },
                frame.opened_by(),
            ));
        }
        Ok(self.program)
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

fn invalid_condition(description: String) -> CompileError {
    CompileError::new(CompileErrorKind::InvalidCondition { description }, "")
}

const RESERVED: [&str; 4] = ["and", "or", "not", "in"];

// --- Condition Parsing (Recursive Descent over whitespace separated terms) ---
// Precedence: OR -> AND -> NOT -> comparison -> operand

struct ConditionParser<'t, 'n> {
    terms: &'t [&'t str],
    pos: usize,
    names: &'n mut BTreeSet<String>,
}

impl<'t> ConditionParser<'t, '_> {
    fn peek(&self) -> Option<&'t str> {
        self.terms.get(self.pos).copied()
    }

    fn consume(&mut self, accepted: &[&str]) -> bool {
        if self.peek().is_some_and(|term| accepted.contains(&term)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> ParseResult<Condition> {
        let condition = self.parse_or()?;
        match self.peek() {
            Some(term) => Err(invalid_condition(format!("unexpected '{term}'"))),
            None => Ok(condition),
        }
    }

    fn parse_or(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_and()?;
        while self.consume(&["or", "||"]) {
            let right = self.parse_and()?;
            left = Condition::Or {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> ParseResult<Condition> {
        let mut left = self.parse_not()?;
        while self.consume(&["and", "&&"]) {
            let right = self.parse_not()?;
            left = Condition::And {
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> ParseResult<Condition> {
        if self.consume(&["not", "!"]) {
            let condition = self.parse_not()?;
            Ok(Condition::Not {
                condition: Box::new(condition),
            })
        } else {
            self.parse_comparison()
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Condition> {
        let left = self.parse_operand()?;
        let op = match (self.peek(), self.terms.get(self.pos + 1).copied()) {
            (Some("not"), Some("in")) => {
                self.pos += 2;
                CompareOp::NotIn
            }
            (Some(term), _) => match CompareOp::parse(term) {
                Some(op) => {
                    self.pos += 1;
                    op
                }
                None => return Ok(Condition::Operand(left)),
            },
            (None, _) => return Ok(Condition::Operand(left)),
        };
        let right = self.parse_operand()?;
        Ok(Condition::Compare { op, left, right })
    }

    fn parse_operand(&mut self) -> ParseResult<Operand> {
        let Some(term) = self.peek() else {
            return Err(invalid_condition("expected an operand".to_string()));
        };
        self.pos += 1;
        let literal = match term {
            "true" | "True" => Some(Value::Bool(true)),
            "false" | "False" => Some(Value::Bool(false)),
            "none" | "None" => Some(Value::None),
            _ => None,
        };
        if let Some(value) = literal {
            return Ok(Operand::Literal(value));
        }
        if RESERVED.contains(&term) {
            return Err(invalid_condition(format!(
                "expected an operand, found '{term}'"
            )));
        }
        if is_dotted_identifier(term) || term.contains('|') {
            return compile_expr(term, self.names).map(Operand::Expr);
        }
        parse_literal(term)
            .map(Operand::Literal)
            .ok_or_else(|| invalid_condition(format!("unexpected '{term}'")))
    }
}

/// Number or single-word quoted string literals.
fn parse_literal(term: &str) -> Option<Value> {
    for quote in ['"', '\''] {
        if let Some(inner) = term
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return Some(Value::from(inner));
        }
    }
    if !term.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
        return None;
    }
    term.parse::<i64>()
        .map(Value::Int)
        .ok()
        .or_else(|| term.parse::<f64>().ok().map(Value::Float))
}

/// Lowers a (possibly merged) token stream into an instruction plan.
pub(crate) fn parse<'a>(tokens: &[Token<'a>]) -> ParseResult<Program> {
    let mut parser = Parser::new();
    for token in tokens {
        parser.parse_token(token)?;
    }
    parser.finish()
}
