mod token;

pub use token::*;

use std::iter::Peekable;
use std::str::Chars;

use crate::error::SourcePos;

/// Converts source text into a lazy, non-restartable sequence of tokens.
///
/// Mirrors the character-class driven, `Peekable`-backed scanner this corpus
/// already writes for its own lexers, generalized to the token kinds and
/// edge cases this language's grammar requires (§4.1).
#[derive(Clone)]
pub struct Lexer<'a> {
    iter: Peekable<Chars<'a>>,
    line: usize,
    col: usize,
    done: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            iter: source.chars().peekable(),
            line: 1,
            col: 1,
            done: false,
        }
    }

    fn pos(&self) -> SourcePos {
        SourcePos {
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<char> {
        self.iter.clone().next()
    }

    fn peek_n(&self, n: usize) -> Option<char> {
        self.iter.clone().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.iter.next()?;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat_inline_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r') | Some('\x0c') | Some('\x0b'))
        {
            self.advance();
        }
    }

    fn lex_semi(&mut self, start: SourcePos) -> Token {
        loop {
            match self.peek() {
                Some(';') | Some('\n') => {
                    self.advance();
                }
                Some(' ') | Some('\t') | Some('\r') | Some('\x0c') | Some('\x0b') => {
                    self.advance();
                }
                _ => break,
            }
        }
        Token::new(TokenKind::Semi, ";", start)
    }

    fn lex_open(&mut self, start: SourcePos) -> Token {
        let c = self.advance().expect("dispatch guarantees a bracket char");
        Token::new(
            TokenKind::Open(Bracket::from_open(c).expect("dispatch guarantees an open bracket")),
            c.to_string(),
            start,
        )
    }

    fn lex_close(&mut self, start: SourcePos) -> Token {
        let c = self.advance().expect("dispatch guarantees a bracket char");
        Token::new(
            TokenKind::Close(Bracket::from_close(c).expect("dispatch guarantees a close bracket")),
            c.to_string(),
            start,
        )
    }

    fn lex_string(&mut self, start: SourcePos) -> Token {
        self.advance();
        let mut buf = String::new();
        loop {
            match self.advance() {
                Some('\'') => return Token::new(TokenKind::Str, buf, start),
                Some('\\') => {
                    buf.push('\\');
                    match self.advance() {
                        Some(escaped) => buf.push(escaped),
                        None => return Token::bad(buf, start, "unterminated string literal"),
                    }
                }
                Some(c) => buf.push(c),
                None => return Token::bad(buf, start, "unterminated string literal"),
            }
        }
    }

    fn lex_triquote(&mut self, start: SourcePos) -> Token {
        for _ in 0..3 {
            self.advance();
        }
        let mut buf = String::new();
        loop {
            if self.peek() == Some('"') && self.peek_n(1) == Some('"') && self.peek_n(2) == Some('"')
            {
                for _ in 0..3 {
                    self.advance();
                }
                return Token::new(TokenKind::TriQuote, format!("\"\"\"{buf}\"\"\""), start);
            }
            match self.advance() {
                Some(c) => buf.push(c),
                None => {
                    return Token::bad(
                        format!("\"\"\"{buf}"),
                        start,
                        "unterminated triple-quoted string",
                    )
                }
            }
        }
    }

    fn lex_line_comment(&mut self, start: SourcePos, marker_len: usize) -> Token {
        let mut buf = String::new();
        for _ in 0..marker_len {
            if let Some(c) = self.advance() {
                buf.push(c);
            }
        }
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            buf.push(self.advance().expect("peeked"));
        }
        Token::new(TokenKind::Comment, buf, start)
    }

    fn lex_block_comment(&mut self, start: SourcePos) -> Token {
        let mut buf = String::new();
        buf.push(self.advance().expect("dispatch guarantees '/'"));
        buf.push(self.advance().expect("dispatch guarantees '*'"));
        let mut depth = 1usize;
        loop {
            if self.peek() == Some('*') && self.peek_n(1) == Some('/') {
                buf.push(self.advance().expect("peeked"));
                buf.push(self.advance().expect("peeked"));
                depth -= 1;
                if depth == 0 {
                    return Token::new(TokenKind::Comment, buf, start);
                }
                continue;
            }
            if self.peek() == Some('/') && self.peek_n(1) == Some('*') {
                buf.push(self.advance().expect("peeked"));
                buf.push(self.advance().expect("peeked"));
                depth += 1;
                continue;
            }
            match self.advance() {
                Some(c) => buf.push(c),
                None => return Token::bad(buf, start, "unterminated block comment"),
            }
        }
    }

    fn lex_number(&mut self, start: SourcePos) -> Token {
        let mut buf = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            buf.push(self.advance().expect("peeked"));
        }
        if self.peek() == Some('.') {
            buf.push(self.advance().expect("peeked"));
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                buf.push(self.advance().expect("peeked"));
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut look = self.iter.clone();
            look.next();
            let sign = look.next();
            let has_sign = matches!(sign, Some('+') | Some('-'));
            let digit_after = if has_sign { look.next() } else { sign };
            if matches!(digit_after, Some(c) if c.is_ascii_digit()) {
                buf.push(self.advance().expect("peeked"));
                if has_sign {
                    buf.push(self.advance().expect("peeked"));
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    buf.push(self.advance().expect("peeked"));
                }
            }
        }
        Token::new(TokenKind::Number, buf, start)
    }

    fn lex_hex(&mut self, start: SourcePos) -> Token {
        let mut buf = String::new();
        buf.push(self.advance().expect("dispatch guarantees '0'"));
        buf.push(self.advance().expect("dispatch guarantees 'x'"));
        while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
            buf.push(self.advance().expect("peeked"));
        }
        Token::new(TokenKind::Hex, buf, start)
    }

    fn lex_ident(&mut self, start: SourcePos) -> Token {
        let mut buf = String::new();
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            buf.push(self.advance().expect("peeked"));
        }
        Token::new(TokenKind::Ident, buf, start)
    }

    fn lex_operator(&mut self, start: SourcePos) -> Token {
        let mut buf = String::new();
        loop {
            let Some(c) = self.peek() else { break };
            if !is_operator_char(c) {
                break;
            }
            if c == '/' && matches!(self.peek_n(1), Some('/') | Some('*')) {
                if buf.is_empty() {
                    return if self.peek_n(1) == Some('/') {
                        self.lex_line_comment(start, 2)
                    } else {
                        self.lex_block_comment(start)
                    };
                }
                break;
            }
            buf.push(self.advance().expect("peeked"));
        }
        Token::new(TokenKind::Ident, buf, start)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }

        self.eat_inline_whitespace();

        let Some(c) = self.peek() else {
            self.done = true;
            return None;
        };

        let start = self.pos();

        let token = match c {
            '\n' | ';' => self.lex_semi(start),
            '#' => self.lex_line_comment(start, 1),
            '/' if self.peek_n(1) == Some('/') => self.lex_line_comment(start, 2),
            '/' if self.peek_n(1) == Some('*') => self.lex_block_comment(start),
            '(' | '[' | '{' => self.lex_open(start),
            ')' | ']' | '}' => self.lex_close(start),
            ',' => {
                self.advance();
                Token::new(TokenKind::Comma, ",", start)
            }
            '\'' => self.lex_string(start),
            '"' if self.peek_n(1) == Some('"') && self.peek_n(2) == Some('"') => {
                self.lex_triquote(start)
            }
            '"' => {
                self.advance();
                Token::bad("\"", start, "unexpected '\"', expected a triple-quote")
            }
            '0' if matches!(self.peek_n(1), Some('x') | Some('X')) => self.lex_hex(start),
            c if c.is_ascii_digit() => self.lex_number(start),
            '.' if matches!(self.peek_n(1), Some(d) if d.is_ascii_digit()) => {
                self.lex_number(start)
            }
            c if is_operator_char(c) => self.lex_operator(start),
            c if is_ident_char(c) => self.lex_ident(start),
            other => {
                self.advance();
                Token::bad(
                    other.to_string(),
                    start,
                    format!("unexpected character '{other}'"),
                )
            }
        };

        if token.kind == TokenKind::Bad {
            self.done = true;
        }

        Some(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_identifier() {
        let tokens: Vec<_> = Lexer::new("letter").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].value, "letter");
    }

    #[test]
    fn lone_dot_is_identifier_but_dot_digit_is_number() {
        assert_eq!(kinds("."), vec![TokenKind::Ident]);
        assert_eq!(kinds(".5"), vec![TokenKind::Number]);
    }

    #[test]
    fn lexes_decimal_with_exponent() {
        let tokens: Vec<_> = Lexer::new("1.5e-10").collect();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].value, "1.5e-10");
    }

    #[test]
    fn lexes_hex_literal() {
        let tokens: Vec<_> = Lexer::new("0xFF").collect();
        assert_eq!(tokens[0].kind, TokenKind::Hex);
        assert_eq!(tokens[0].value, "0xFF");
    }

    #[test]
    fn operator_run_is_one_token() {
        let tokens: Vec<_> = Lexer::new("a +(b *(c))").collect();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Open(Bracket::Paren),
                TokenKind::Ident,
                TokenKind::Ident,
                TokenKind::Open(Bracket::Paren),
                TokenKind::Ident,
                TokenKind::Close(Bracket::Paren),
                TokenKind::Close(Bracket::Paren),
            ]
        );
    }

    #[test]
    fn slash_inside_operator_run_breaks_for_line_comment() {
        let tokens: Vec<_> = Lexer::new("a +// comment\nb").collect();
        assert_eq!(tokens[0].kind, TokenKind::Ident); // a
        assert_eq!(tokens[1].kind, TokenKind::Ident); // +
        assert_eq!(tokens[1].value, "+");
        assert_eq!(tokens[2].kind, TokenKind::Comment);
        assert_eq!(tokens[3].kind, TokenKind::Semi);
        assert_eq!(tokens[4].kind, TokenKind::Ident); // b
    }

    #[test]
    fn nested_block_comments() {
        let tokens: Vec<_> = Lexer::new("/* outer /* inner */ still outer */x").collect();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
    }

    #[test]
    fn unterminated_block_comment_is_bad() {
        let tokens: Vec<_> = Lexer::new("/* never closes").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Bad);
    }

    #[test]
    fn triquote_keeps_newlines_verbatim() {
        let tokens: Vec<_> = Lexer::new("\"\"\"line1\nline2\"\"\"").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::TriQuote);
        assert!(tokens[0].value.starts_with("\"\"\""));
        assert!(tokens[0].value.ends_with("\"\"\""));
        assert!(tokens[0].value.contains('\n'));
    }

    #[test]
    fn string_keeps_escapes_literal() {
        let tokens: Vec<_> = Lexer::new("'a\\'b'").collect();
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].value, "a\\'b");
    }

    #[test]
    fn unterminated_string_is_bad() {
        let tokens: Vec<_> = Lexer::new("'unterminated").collect();
        assert_eq!(tokens[0].kind, TokenKind::Bad);
    }

    #[test]
    fn collapses_consecutive_separators() {
        let tokens: Vec<_> = Lexer::new("a;\n\n;b").collect();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, vec![TokenKind::Ident, TokenKind::Semi, TokenKind::Ident]);
    }
}
