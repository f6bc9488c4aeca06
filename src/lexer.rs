//! Splits template text into literal runs and bracketed markers.
//!
//! `Hi {{ name }}{# note #}!` = `[Literal("Hi "), Expression, Literal(""), Comment, Literal("!")]`
//!
//! Markers may span lines. An opener without its closer is left in the
//! surrounding literal text, so stray `{{` or `{%` sequences render verbatim.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TokenKind {
    Literal,
    /// `{{ ... }}`
    Expression,
    /// `{% ... %}`
    Statement,
    /// `{# ... #}`
    Comment,
}

impl TokenKind {
    const fn from_opener(ch: char) -> Option<Self> {
        match ch {
            '{' => Some(Self::Expression),
            '%' => Some(Self::Statement),
            '#' => Some(Self::Comment),
            _ => None,
        }
    }

    const fn closer(self) -> &'static str {
        match self {
            Self::Expression => "}}",
            Self::Statement => "%}",
            Self::Comment => "#}",
            Self::Literal => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token<'a> {
    pub kind: TokenKind,
    /// The token text including its delimiters.
    pub raw: &'a str,
}

impl<'a> Token<'a> {
    pub const fn literal(raw: &'a str) -> Self {
        Self {
            kind: TokenKind::Literal,
            raw,
        }
    }

    /// The text between the delimiters, trimmed. Literals are returned as is.
    pub fn content(&self) -> &'a str {
        match self.kind {
            TokenKind::Literal => self.raw,
            TokenKind::Expression | TokenKind::Statement | TokenKind::Comment => self
                .raw
                .get(2..self.raw.len().saturating_sub(2))
                .unwrap_or_default()
                .trim(),
        }
    }

    /// Whitespace separated words of a statement.
    pub fn words(&self) -> Vec<&'a str> {
        self.content().split_whitespace().collect()
    }

    /// The leading keyword of a statement, if any.
    pub fn keyword(&self) -> Option<&'a str> {
        match self.kind {
            TokenKind::Statement => self.content().split_whitespace().next(),
            TokenKind::Literal | TokenKind::Expression | TokenKind::Comment => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw.trim().is_empty()
    }
}

/// Lazily yields tokens from a template source.
///
/// Literal and marker tokens strictly alternate, starting and ending with a
/// literal; literals between adjacent markers are empty.
pub(crate) struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    pending: Option<Token<'a>>,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub const fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            pending: None,
            done: false,
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }
        if self.done {
            return None;
        }

        let rest = self.source.get(self.pos..).unwrap_or_default();
        let mut search = 0;
        loop {
            let Some(open) = rest
                .get(search..)
                .and_then(|s| s.find('{'))
                .map(|i| search + i)
            else {
                self.done = true;
                self.pos = self.source.len();
                return Some(Token::literal(rest));
            };

            // '{' is one byte, so `open + 1` is always a char boundary.
            let kind = rest
                .get(open + 1..)
                .and_then(|s| s.chars().next())
                .and_then(TokenKind::from_opener);
            let Some(kind) = kind else {
                search = open + 1;
                continue;
            };

            let body = open + 2;
            let Some(close) = rest
                .get(body..)
                .and_then(|s| s.find(kind.closer()))
                .map(|i| body + i + 2)
            else {
                // Unterminated: this opener stays literal text.
                search = open + 1;
                continue;
            };

            let (literal, tail) = rest.split_at(open);
            let (marker, _) = tail.split_at(close - open);
            self.pos += close;
            self.pending = Some(Token { kind, raw: marker });
            return Some(Token::literal(literal));
        }
    }
}

pub(crate) fn tokenize(source: &str) -> Vec<Token<'_>> {
    Tokenizer::new(source).collect()
}
