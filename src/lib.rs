//! An embeddable, prototype-based, message-passing language interpreter:
//! lexer, operator-precedence parser, a cyclic-safe slot-lookup object model,
//! and an evaluator that threads control signals instead of unwinding.
//!
//! Hosts drive the interpreter through [`Vm`]: create one with a
//! [`VmConfig`], feed it source with [`do_string`]/[`do_file`], and read or
//! write the resulting object graph with [`get_slot`]/[`set_slot`]/
//! [`remove_slot`]. [`register_native`] exposes a Rust closure as an
//! activatable slot without the host needing to touch the payload type
//! directly.

pub mod config;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod message;
pub mod object;
pub mod parser;
pub mod primitives;
pub mod vm;

use std::fs;
use std::path::Path;

use log::debug;

pub use config::VmConfig;
pub use error::{EvalError, HostError, LexError, SyntaxError};
pub use message::Signal;
pub use object::{Object, ObjectRef};
pub use vm::Vm;

/// Lexes, parses, and evaluates `src` against the VM's `Lobby` as both
/// target and locals, returning the last statement's result (§6).
pub fn do_string(vm: &Vm, src: &str) -> Result<(ObjectRef, Signal), EvalError> {
    let root = parser::parse(vm, src)?;
    Ok(eval::eval_chain(vm, &vm.lobby, &vm.lobby, &root))
}

/// Reads `path` as UTF-8 and evaluates its contents the same way
/// [`do_string`] does.
pub fn do_file(vm: &Vm, path: impl AsRef<Path>) -> Result<(ObjectRef, Signal), EvalError> {
    let path = path.as_ref();
    let src = fs::read_to_string(path).map_err(|err| {
        EvalError::Io(format!("{}: {err}", path.display()))
    })?;
    debug!("evaluating {}", path.display());
    do_string(vm, &src)
}

/// Host-side slot read: follows the full proto chain, same as a Language
/// `target name` send would, but without going through the evaluator.
pub fn get_slot(vm: &Vm, obj: &ObjectRef, name: &str) -> Option<ObjectRef> {
    object::lookup::find_slot(vm, obj, name).map(|(value, _)| value)
}

/// Host-side slot write: always writes to `obj`'s own local table,
/// mirroring the Language's `setSlot`.
pub fn set_slot(obj: &ObjectRef, name: impl Into<String>, value: ObjectRef) {
    obj.borrow_mut().set_local(name, value);
}

/// Host-side slot removal from `obj`'s own local table; a no-op if `name`
/// is only present on a proto.
pub fn remove_slot(obj: &ObjectRef, name: &str) -> Option<ObjectRef> {
    obj.borrow_mut().remove_local(name)
}

/// Wraps a Rust closure as an activatable native Object (§6 "Embedding
/// API"), ready to be installed with [`set_slot`].
pub fn register_native(
    f: impl Fn(&Vm, &ObjectRef, &ObjectRef, &message::MessageRef) -> (ObjectRef, Signal) + 'static,
) -> ObjectRef {
    primitives::make_native(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn do_string_evaluates_the_last_statement() {
        let vm = Vm::new(VmConfig::default());
        let (value, signal) = do_string(&vm, "a := 5; a + 1").unwrap();
        assert!(signal.is_normal());
        assert_eq!(object::print_literal(&value), "Number(6)");
    }

    #[test]
    fn syntax_errors_surface_before_evaluation() {
        let vm = Vm::new(VmConfig::default());
        assert!(do_string(&vm, "(1 + 2").is_err());
    }

    #[test]
    fn host_slot_helpers_round_trip() {
        let vm = Vm::new(VmConfig::default());
        let obj = Object::new(vec![vm.object_proto.clone()]);
        set_slot(&obj, "x", vm.number(42.0));
        assert_eq!(object::print_literal(&get_slot(&vm, &obj, "x").unwrap()), "Number(42)");
        remove_slot(&obj, "x");
        assert!(get_slot(&vm, &obj, "x").is_none());
    }

    #[test]
    fn registered_native_is_reachable_by_send() {
        let vm = Vm::new(VmConfig::default());
        let answer = register_native(|vm, _target, _locals, _msg| (vm.number(7.0), Signal::Normal));
        set_slot(&vm.lobby, "answer", answer);
        let (value, signal) = do_string(&vm, "answer").unwrap();
        assert!(signal.is_normal());
        assert_eq!(object::print_literal(&value), "Number(7)");
    }
}
