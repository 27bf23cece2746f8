use weft::lexer::{Lexer, TokenKind};

/// `"""line1\nline2"""` lexes to a single `TriQuote` token carrying the
/// literal newline and the triple-quote delimiters in its value (§8
/// scenario 7).
#[test]
fn triple_quoted_strings_lex_as_one_token_with_the_embedded_newline() {
    let src = "\"\"\"line1\nline2\"\"\"";
    let tokens: Vec<_> = Lexer::new(src).collect();

    assert_eq!(tokens.len(), 1);
    let token = &tokens[0];
    assert_eq!(token.kind, TokenKind::TriQuote);
    assert!(token.value.starts_with("\"\"\""));
    assert!(token.value.ends_with("\"\"\""));
    assert!(token.value.contains('\n'));
}
