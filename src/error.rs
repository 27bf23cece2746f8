//! Typed errors for the four failure kinds described by the evaluator's error
//! handling design: lexing, parsing, runtime exceptions and unrecoverable
//! host-level conditions.

use std::error::Error;
use std::fmt::{self, Display};

/// Where in the source a diagnostic applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub col: usize,
}

impl Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A scan-level failure. Carried by a `bad` token rather than raised directly
/// by the lexer; the parser is the one that turns it into a [`SyntaxError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub position: SourcePos,
}

impl Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.position)
    }
}

impl Error for LexError {}

/// Unbalanced brackets, an operator missing an operand, or a `bad` token
/// reaching the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub position: SourcePos,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, position: SourcePos) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }

    pub fn from_lex(err: LexError) -> Self {
        Self {
            message: format!("lex error: {}", err.message),
            position: err.position,
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error: {} ({})", self.message, self.position)
    }
}

impl Error for SyntaxError {}

/// An unrecoverable condition: recursion exhausted or the VM's cancellation
/// flag was observed. These are reported to the host as an `exception`
/// signal the Language itself cannot catch with `try`/`catch` (§4.4, §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    StackOverflow,
    Cancelled,
}

impl Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::StackOverflow => f.write_str("stack-overflow"),
            HostError::Cancelled => f.write_str("cancelled"),
        }
    }
}

impl Error for HostError {}

/// A runtime exception's printable projection: the `error`/`message` slot
/// text an exception Object carries (§7 "Runtime exception"). Exceptions
/// themselves stay Language-level Objects so `try`/`catch` can inspect and
/// rebind them; this type exists only so a host that receives an uncaught
/// one back from `do_string`/`do_file` can `Display` it without reaching
/// for the object model's test-only debug formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeException {
    pub type_name: String,
    pub message: String,
}

impl RuntimeException {
    pub fn from_object(vm: &crate::vm::Vm, obj: &crate::object::ObjectRef) -> Self {
        use crate::object::{lookup::find_slot, Payload};
        let message = find_slot(vm, obj, "message")
            .and_then(|(value, _)| match &value.borrow().payload {
                Some(Payload::Str(s)) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "an exception occurred".to_owned());
        let type_name = if crate::primitives::control::is_exception_kind(vm, obj) {
            "Exception".to_owned()
        } else {
            obj.borrow().type_name().to_owned()
        };
        RuntimeException { type_name, message }
    }
}

impl Display for RuntimeException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl Error for RuntimeException {}

/// Unifying error returned by the embedding API for failures that occur
/// before (or instead of) evaluation producing a `(result, signal)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    Syntax(SyntaxError),
    Host(HostError),
    Io(String),
}

impl From<SyntaxError> for EvalError {
    fn from(err: SyntaxError) -> Self {
        EvalError::Syntax(err)
    }
}

impl From<HostError> for EvalError {
    fn from(err: HostError) -> Self {
        EvalError::Host(err)
    }
}

impl Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Syntax(err) => Display::fmt(err, f),
            EvalError::Host(err) => Display::fmt(err, f),
            EvalError::Io(msg) => write!(f, "io error: {msg}"),
        }
    }
}

impl Error for EvalError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::eval::eval_chain;
    use crate::vm::Vm;

    #[test]
    fn runtime_exception_reports_the_raised_message_and_the_exception_kind() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "undefinedSlot").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert_eq!(signal, crate::message::Signal::exception());
        let exc = RuntimeException::from_object(&vm, &value);
        assert_eq!(exc.type_name, "Exception");
        assert!(exc.message.contains("does not respond to"));
        assert_eq!(exc.to_string(), format!("Exception: {}", exc.message));
    }
}
