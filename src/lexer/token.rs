use crate::error::SourcePos;

/// Bracket flavor for `open`/`close` tokens; the parser uses this to decide
/// whether a group is an anonymous grouping, `squareBrackets`, or
/// `curlyBrackets` (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bracket {
    Paren,
    Square,
    Curly,
}

impl Bracket {
    pub fn from_open(c: char) -> Option<Self> {
        match c {
            '(' => Some(Bracket::Paren),
            '[' => Some(Bracket::Square),
            '{' => Some(Bracket::Curly),
            _ => None,
        }
    }

    pub fn from_close(c: char) -> Option<Self> {
        match c {
            ')' => Some(Bracket::Paren),
            ']' => Some(Bracket::Square),
            '}' => Some(Bracket::Curly),
            _ => None,
        }
    }
}

/// The lexical category of a [`Token`]; see SPEC_FULL.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A statement separator: one or more semicolons/newlines, collapsed.
    Semi,
    /// An identifier or an operator identifier (same kind, distinguished by
    /// the parser from the token's spelling).
    Ident,
    Open(Bracket),
    Close(Bracket),
    Comma,
    Number,
    Hex,
    Str,
    TriQuote,
    Comment,
    /// Error carrier: `value` holds the accumulated partial lexeme and
    /// `cause` the scan failure that produced it.
    Bad,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub position: SourcePos,
    pub cause: Option<String>,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, position: SourcePos) -> Self {
        Self {
            kind,
            value: value.into(),
            position,
            cause: None,
        }
    }

    pub fn bad(value: impl Into<String>, position: SourcePos, cause: impl Into<String>) -> Self {
        Self {
            kind: TokenKind::Bad,
            value: value.into(),
            position,
            cause: Some(cause.into()),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.kind == TokenKind::Ident
            && self
                .value
                .chars()
                .next()
                .map(is_operator_char)
                .unwrap_or(false)
    }
}

/// Identifier character: ASCII letter, digit, `_`, `.`, or any byte ≥ 0x80
/// (multi-byte UTF-8 runs arrive here as a single non-ASCII `char`).
pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || !c.is_ascii()
}

/// Operator character set: `!$%&'*+-/:<=>?@\^|~`.
pub fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '!' | '$'
            | '%'
            | '&'
            | '\''
            | '*'
            | '+'
            | '-'
            | '/'
            | ':'
            | '<'
            | '='
            | '>'
            | '?'
            | '@'
            | '\\'
            | '^'
            | '|'
            | '~'
    )
}
