//! Block/Method construction and invocation (§4.5 "Block/Method primitive").
//! `block(...)` and `method(...)` are native activators installed on
//! `Object` itself: their trailing argument is the body message tree, taken
//! raw rather than evaluated, and every argument before it is read only for
//! its message *name* (the formal parameter name), never sent.

use crate::eval::call_block;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{BlockValue, Object, ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

fn make(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, is_method: bool) -> EvalResult {
    let Some((body, params)) = msg.args.split_last() else {
        return crate::eval::raise(
            vm,
            format!(
                "{} requires a body argument",
                if is_method { "method" } else { "block" }
            ),
            msg.position,
        );
    };
    let params = params.iter().map(|p| p.name.clone()).collect();
    let proto = if is_method {
        vm.method_proto.clone()
    } else {
        vm.block_proto.clone()
    };
    let value = Object::with_payload(
        vec![proto],
        Payload::Block(BlockValue {
            params,
            body: body.clone(),
            home: locals.clone(),
            is_method,
        }),
    );
    (value, Signal::Normal)
}

pub fn install(vm: &Vm) {
    // Reachable from every Object: both `Lobby` (top-level code) and any
    // user object can build a closure over the current lexical scope.
    def(&vm.object_proto, "block", |vm, _target, locals, _definer, msg| {
        make(vm, locals, msg, false)
    });
    def(&vm.object_proto, "method", |vm, _target, locals, _definer, msg| {
        make(vm, locals, msg, true)
    });

    // Methods already activate as soon as their slot is sent (§4.3
    // "Activation"); a bare `call` lets the caller invoke one as if it were
    // a plain value, and is the *only* way to invoke a non-activatable
    // Block.
    def(&vm.block_proto, "call", |vm, target, locals, _definer, msg| {
        let block = match target.borrow().payload.clone() {
            Some(Payload::Block(b)) => b,
            _ => return type_error(vm, target, "Block", msg.position),
        };
        call_block(vm, &block, target, locals, msg)
    });

    def(&vm.block_proto, "asString", |vm, target, _locals, _definer, msg| {
        match target.borrow().payload.clone() {
            Some(Payload::Block(b)) => (
                vm.string(if b.is_method { "method(...)" } else { "block(...)" }),
                Signal::Normal,
            ),
            _ => type_error(vm, target, "Block", msg.position),
        }
    });

    def(&vm.message_proto, "name", |vm, target, _locals, _definer, msg| {
        match target.borrow().payload.clone() {
            Some(Payload::MessageNode(m)) => (vm.string(m.name.clone()), Signal::Normal),
            _ => type_error(vm, target, "Message", msg.position),
        }
    });
    def(&vm.message_proto, "argCount", |vm, target, _locals, _definer, msg| {
        match target.borrow().payload.clone() {
            Some(Payload::MessageNode(m)) => (vm.number(m.args.len() as f64), Signal::Normal),
            _ => type_error(vm, target, "Message", msg.position),
        }
    });
    def(&vm.message_proto, "argAt", |vm, target, locals, _definer, msg| {
        let m = match target.borrow().payload.clone() {
            Some(Payload::MessageNode(m)) => m,
            _ => return type_error(vm, target, "Message", msg.position),
        };
        let (idx_obj, signal) = crate::eval::eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (idx_obj, signal);
        }
        let idx = match idx_obj.borrow().payload.clone() {
            Some(Payload::Number(n)) => n as usize,
            _ => return type_error(vm, &idx_obj, "Number", msg.position),
        };
        match m.args.get(idx) {
            Some(arg) => (vm.message_object(arg), Signal::Normal),
            None => (vm.nil.clone(), Signal::Normal),
        }
    });
    def(&vm.message_proto, "asString", |vm, target, _locals, _definer, msg| {
        match target.borrow().payload.clone() {
            Some(Payload::MessageNode(m)) => (vm.string(m.name.clone()), Signal::Normal),
            _ => type_error(vm, target, "Message", msg.position),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::eval::eval_chain;

    #[test]
    fn block_call_doubles_its_argument() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "b := block(n, n * 2); b call(21)").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(42)");
    }

    #[test]
    fn method_rebinds_self_to_the_receiver() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(
            &vm,
            "Target := Object clone; Target setSlot(\"greeting\", method(\"hi\")); Target greeting",
        )
        .unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "String(\"hi\")");
    }
}
