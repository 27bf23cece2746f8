//! Consumes a token sequence and produces a single root [`Message`] whose
//! `.next` chain represents the top-level statements, with operator
//! precedence and assignment rewriting applied (§4.2).

use std::collections::VecDeque;

use crate::error::{SourcePos, SyntaxError};
use crate::lexer::{Bracket, Lexer, Token, TokenKind, is_operator_char};
use crate::message::{Message, MessageRef};
use crate::vm::Vm;

/// Default precedence groups, lower binds tighter (§4.2). Assignment is
/// deliberately the loosest: `a := 1 + 2` must parse as `a := (1 + 2)`.
pub const DEFAULT_PRECEDENCE_TABLE: &[(&[&str], i32)] = &[
    (&["::=", ":=", "="], 10),
    (&["||"], 9),
    (&["&&"], 8),
    (&["==", "!=", "<", "<=", ">", ">="], 7),
    (&["+", "-"], 5),
    (&["*", "/", "%"], 4),
    (&["^"], 2),
];

/// Precedence assumed for an operator identifier with no table entry.
pub const DEFAULT_PRECEDENCE: i32 = 6;

/// Seeds `Core assignmentOperators` (§4.2).
pub const DEFAULT_ASSIGNMENT_TABLE: &[(&str, &str)] = &[
    ("=", "setSlot"),
    ("::=", "newSlot"),
    (":=", "updateSlot"),
];

fn is_operator_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_operator_char)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Boundary {
    TopLevel,
    ArgOrClose(Bracket),
}

impl Boundary {
    fn is_terminator(&self, tok: &Token) -> bool {
        match self {
            Boundary::TopLevel => false,
            Boundary::ArgOrClose(b) => {
                tok.kind == TokenKind::Comma || tok.kind == TokenKind::Close(*b)
            }
        }
    }
}

enum Item {
    Operand(MessageRef),
    Op(String, SourcePos),
}

fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    let mut out = Vec::new();
    for tok in Lexer::new(source) {
        match tok.kind {
            TokenKind::Comment => continue,
            TokenKind::Bad => {
                return Err(SyntaxError::new(
                    tok.cause.unwrap_or_else(|| "invalid token".to_owned()),
                    tok.position,
                ))
            }
            _ => out.push(tok),
        }
    }
    Ok(out)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    vm: &'a Vm,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn is_bare_operator(&self, tok: &Token) -> bool {
        tok.kind == TokenKind::Ident
            && is_operator_name(&tok.value)
            && !matches!(self.peek_at(1).map(|t| &t.kind), Some(TokenKind::Open(_)))
    }

    fn parse_statement_sequence(&mut self, boundary: Boundary) -> Result<MessageRef, SyntaxError> {
        while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Semi)) {
            self.advance();
        }

        let mut head: Option<MessageRef> = None;
        loop {
            match self.peek() {
                None => break,
                Some(t) if boundary.is_terminator(t) => break,
                _ => {}
            }

            let start_pos = self.peek().map(|t| t.position).unwrap_or_default();
            let items = self.parse_flat_statement(boundary)?;
            let stmt = rewrite_statement(items, self.vm, start_pos)?;
            stmt.mark_new_statement();
            head = Some(match head {
                None => stmt,
                Some(h) => {
                    h.append(stmt);
                    h
                }
            });

            match self.peek() {
                Some(t) if t.kind == TokenKind::Semi => {
                    self.advance();
                    while matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Semi)) {
                        self.advance();
                    }
                }
                _ => break,
            }
        }

        match head {
            Some(h) => Ok(h),
            None => Ok(Message::literal(self.vm.nil.clone(), SourcePos::default())),
        }
    }

    fn parse_flat_statement(&mut self, boundary: Boundary) -> Result<Vec<Item>, SyntaxError> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(t) if t.kind == TokenKind::Semi => break,
                Some(t) if boundary.is_terminator(t) => break,
                Some(t) if matches!(t.kind, TokenKind::Close(_)) => {
                    return Err(SyntaxError::new("unbalanced bracket", t.position));
                }
                Some(t) if t.kind == TokenKind::Comma => {
                    return Err(SyntaxError::new("unexpected ','", t.position));
                }
                Some(t) if self.is_bare_operator(t) => {
                    let tok = self.advance().expect("peeked");
                    items.push(Item::Op(tok.value, tok.position));
                }
                _ => {
                    let msg = self.parse_one_message()?;
                    items.push(Item::Operand(msg));
                }
            }
        }
        Ok(items)
    }

    fn parse_bracket_group(
        &mut self,
        bracket: Bracket,
        open_pos: SourcePos,
    ) -> Result<Vec<MessageRef>, SyntaxError> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                Some(t) if t.kind == TokenKind::Close(bracket) => {
                    self.advance();
                    break;
                }
                None => {
                    return Err(SyntaxError::new(
                        "unexpected end of input, unbalanced bracket",
                        open_pos,
                    ))
                }
                _ => {}
            }

            let arg = self.parse_statement_sequence(Boundary::ArgOrClose(bracket))?;
            args.push(arg);

            match self.peek() {
                Some(t) if t.kind == TokenKind::Comma => {
                    self.advance();
                }
                Some(t) if t.kind == TokenKind::Close(bracket) => {
                    self.advance();
                    break;
                }
                Some(t) => {
                    return Err(SyntaxError::new(
                        "expected ',' or a closing bracket",
                        t.position,
                    ))
                }
                None => {
                    return Err(SyntaxError::new(
                        "unexpected end of input, unbalanced bracket",
                        open_pos,
                    ))
                }
            }
        }
        Ok(args)
    }

    fn parse_one_message(&mut self) -> Result<MessageRef, SyntaxError> {
        let tok = self
            .advance()
            .ok_or_else(|| SyntaxError::new("unexpected end of input", SourcePos::default()))?;

        match tok.kind {
            TokenKind::Number => {
                let value: f64 = tok
                    .value
                    .parse()
                    .map_err(|_| SyntaxError::new("invalid number literal", tok.position))?;
                Ok(Message::literal(self.vm.number(value), tok.position))
            }
            TokenKind::Hex => {
                let digits = tok.value.get(2..).unwrap_or("");
                let value = i64::from_str_radix(digits, 16)
                    .map_err(|_| SyntaxError::new("invalid hex literal", tok.position))?;
                Ok(Message::literal(
                    self.vm.number(value as f64),
                    tok.position,
                ))
            }
            TokenKind::Str => {
                let value = unescape::unescape(&tok.value).unwrap_or(tok.value);
                Ok(Message::literal(self.vm.string(value), tok.position))
            }
            TokenKind::TriQuote => {
                let inner = tok
                    .value
                    .strip_prefix("\"\"\"")
                    .and_then(|s| s.strip_suffix("\"\"\""))
                    .unwrap_or(&tok.value)
                    .to_owned();
                Ok(Message::literal(self.vm.string(inner), tok.position))
            }
            TokenKind::Ident => {
                let name = tok.value;
                let args = match self.peek().map(|t| &t.kind) {
                    Some(TokenKind::Open(_)) => {
                        let open = self.advance().expect("peeked");
                        let TokenKind::Open(bracket) = open.kind else {
                            unreachable!()
                        };
                        self.parse_bracket_group(bracket, open.position)?
                    }
                    _ => Vec::new(),
                };
                Ok(Message::send(name, args, tok.position))
            }
            TokenKind::Open(bracket) => {
                let args = self.parse_bracket_group(bracket, tok.position)?;
                match bracket {
                    Bracket::Paren => Ok(args.into_iter().next().unwrap_or_else(|| {
                        Message::literal(self.vm.nil.clone(), tok.position)
                    })),
                    Bracket::Square => Ok(Message::send("squareBrackets", args, tok.position)),
                    Bracket::Curly => Ok(Message::send("curlyBrackets", args, tok.position)),
                }
            }
            _ => Err(SyntaxError::new(
                format!("unexpected token '{}'", tok.value),
                tok.position,
            )),
        }
    }
}

fn group_items(
    items: Vec<Item>,
) -> Result<(VecDeque<MessageRef>, VecDeque<(String, SourcePos)>), SyntaxError> {
    let mut operands = VecDeque::new();
    let mut ops = VecDeque::new();
    let mut pending_run: Option<MessageRef> = None;
    let mut expect_operand = true;

    for item in items {
        match item {
            Item::Operand(msg) => {
                pending_run = Some(match pending_run.take() {
                    Some(run) => {
                        run.append(msg);
                        run
                    }
                    None => msg,
                });
                expect_operand = false;
            }
            Item::Op(name, pos) => {
                if expect_operand {
                    return Err(SyntaxError::new(
                        format!("operator '{name}' is missing a left operand"),
                        pos,
                    ));
                }
                operands.push_back(pending_run.take().expect("expect_operand was false"));
                ops.push_back((name, pos));
                expect_operand = true;
            }
        }
    }

    if expect_operand {
        let (name, pos) = ops
            .back()
            .cloned()
            .unwrap_or_else(|| ("?".to_owned(), SourcePos::default()));
        return Err(SyntaxError::new(
            format!("operator '{name}' is missing a right operand"),
            pos,
        ));
    }
    operands.push_back(pending_run.take().expect("loop invariant"));

    Ok((operands, ops))
}

fn climb(
    operands: &mut VecDeque<MessageRef>,
    ops: &mut VecDeque<(String, SourcePos)>,
    min_rank: i32,
    vm: &Vm,
) -> MessageRef {
    let head = operands.pop_front().expect("grouping guarantees an operand");
    loop {
        let Some((op_name, _)) = ops.front() else {
            break;
        };
        let rank = -vm.precedence_of(op_name);
        if rank < min_rank {
            break;
        }
        let (op_name, op_pos) = ops.pop_front().expect("peeked");
        let mut rhs = operands.pop_front().expect("grouping guarantees a right operand");
        loop {
            let Some((next_name, _)) = ops.front() else {
                break;
            };
            let next_rank = -vm.precedence_of(next_name);
            if next_rank <= rank {
                break;
            }
            operands.push_front(rhs);
            rhs = climb(operands, ops, next_rank, vm);
        }
        let op_msg = Message::send(op_name, vec![rhs], op_pos);
        head.append(op_msg);
    }
    head
}

fn rewrite_statement(
    items: Vec<Item>,
    vm: &Vm,
    pos: SourcePos,
) -> Result<MessageRef, SyntaxError> {
    if items.is_empty() {
        return Ok(Message::literal(vm.nil.clone(), pos));
    }

    if let [Item::Operand(lhs), Item::Op(op_name, op_pos), rest @ ..] = items.as_slice() {
        if let Some(builtin) = vm.assignment_builtin(op_name) {
            if lhs.args.is_empty() && lhs.cached_value.is_none() && !lhs.name.is_empty() {
                if rest.is_empty() {
                    return Err(SyntaxError::new(
                        format!("'{op_name}' is missing a value"),
                        *op_pos,
                    ));
                }
                let name_lit = Message::literal(vm.string(lhs.name.clone()), lhs.position);
                let value = rewrite_statement(rest.to_vec(), vm, *op_pos)?;
                return Ok(Message::send(builtin, vec![name_lit, value], *op_pos));
            }
        }
    }

    let (mut operands, mut ops) = group_items(items)?;
    Ok(climb(&mut operands, &mut ops, i32::MIN, vm))
}

impl Clone for Item {
    fn clone(&self) -> Self {
        match self {
            Item::Operand(msg) => Item::Operand(msg.clone()),
            Item::Op(name, pos) => Item::Op(name.clone(), *pos),
        }
    }
}

/// Parses `source` against `vm`'s precedence/assignment tables into a root
/// [`Message`] chain (§4.2).
pub fn parse(vm: &Vm, source: &str) -> Result<MessageRef, SyntaxError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        vm,
    };
    let root = parser.parse_statement_sequence(Boundary::TopLevel)?;
    if let Some(t) = parser.peek() {
        return Err(SyntaxError::new(
            "unexpected token after end of program",
            t.position,
        ));
    }
    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    fn chain_names(vm: &Vm, src: &str) -> Vec<String> {
        let root = parse(vm, src).unwrap();
        root.chain().iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn precedence_nests_multiply_under_plus() {
        let vm = Vm::new(VmConfig::default());
        let root = parse(&vm, "1 + 2 * 3").unwrap();
        let chain = root.chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].name, "+");
        assert_eq!(chain[1].args.len(), 1);
        // "2 * 3" is rewritten as the chain `2 *(3)`, kept as the "+"'s sole
        // argument rather than flattened into the top-level chain.
        let rhs = chain[1].args[0].chain();
        assert_eq!(rhs.len(), 2);
        assert_eq!(rhs[1].name, "*");
    }

    #[test]
    fn assignment_consumes_rest_of_statement() {
        let vm = Vm::new(VmConfig::default());
        let names = chain_names(&vm, "a := 5 + 1");
        assert_eq!(names, vec!["updateSlot"]);
        let root = parse(&vm, "a := 5 + 1").unwrap();
        // the value is the whole "5 + 1" chain, not just "5".
        let value_chain = root.args[1].chain();
        assert_eq!(value_chain.len(), 2);
        assert_eq!(value_chain[1].name, "+");
    }

    #[test]
    fn plain_equals_maps_to_set_slot() {
        let vm = Vm::new(VmConfig::default());
        let names = chain_names(&vm, "a = 5");
        assert_eq!(names, vec!["setSlot"]);
    }

    #[test]
    fn sequential_sends_stay_linked_without_operators() {
        let vm = Vm::new(VmConfig::default());
        let names = chain_names(&vm, "a foo bar");
        assert_eq!(names, vec!["a", "foo", "bar"]);
    }

    #[test]
    fn unbalanced_bracket_is_a_syntax_error() {
        let vm = Vm::new(VmConfig::default());
        assert!(parse(&vm, "foo(1, 2").is_err());
        assert!(parse(&vm, "foo 1)").is_err());
    }

    #[test]
    fn operator_missing_operand_is_a_syntax_error() {
        let vm = Vm::new(VmConfig::default());
        assert!(parse(&vm, "1 +").is_err());
        assert!(parse(&vm, "+ 1").is_err());
    }

    #[test]
    fn square_and_curly_brackets_become_named_messages() {
        let vm = Vm::new(VmConfig::default());
        assert_eq!(chain_names(&vm, "[1, 2]"), vec!["squareBrackets"]);
        assert_eq!(chain_names(&vm, "{1, 2}"), vec!["curlyBrackets"]);
    }

    /// §4.2: "The precedence table ... must be updatable by the Language at
    /// runtime; the parser reads it from a well-known slot on Core."
    #[test]
    fn rebinding_a_precedence_slot_changes_how_later_source_parses() {
        let vm = Vm::new(VmConfig::default());
        // Unmodified: "*" binds tighter, nesting under the top-level "+".
        let before = parse(&vm, "1 + 2 * 3").unwrap().chain();
        assert_eq!(before.len(), 2);
        assert_eq!(before[1].name, "+");

        vm.core
            .borrow()
            .get_local("precedenceTable")
            .unwrap()
            .borrow_mut()
            .set_local("+", vm.number(1.0));

        // Now "+" binds tighter than "*", so both land as sequential sends
        // on the same top-level chain instead of nesting.
        let after = parse(&vm, "1 + 2 * 3").unwrap().chain();
        assert_eq!(after.len(), 3);
        assert_eq!(after[1].name, "+");
        assert_eq!(after[2].name, "*");
        assert!(after[1].args[0].chain().len() == 1);
    }

    #[test]
    fn parenthesised_group_is_pure_grouping() {
        let vm = Vm::new(VmConfig::default());
        let root = parse(&vm, "(1 + 2) * 3").unwrap();
        let chain = root.chain();
        // parens contribute no node of their own: "1", "+(2)", "*(3)" all
        // land as sequential sends on the same top-level chain.
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[1].name, "+");
        assert_eq!(chain[2].name, "*");
    }
}
