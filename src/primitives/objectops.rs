//! Identity and slot-table operations every Object responds to, independent
//! of its payload: `clone`, `setSlot`/`newSlot`/`updateSlot`/`removeSlot`,
//! slot introspection, proto-list manipulation, and the default `==`/
//! `asString` every other prototype overrides (§4.3 "Creation", "Slot
//! mutation").

use std::rc::Rc;

use crate::eval::eval_arg;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{lookup::find_slot, Object, ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

fn string_arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> Result<String, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, index);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    match value.borrow().payload.clone() {
        Some(Payload::Str(s)) => Ok(s),
        _ => Err(type_error(vm, &value, "String", msg.position)),
    }
}

pub fn install(vm: &Vm) {
    let proto = vm.object_proto.clone();

    def(&proto, "clone", |_vm, target, _locals, _definer, _msg| {
        (Object::clone_of(target), Signal::Normal)
    });

    // Writes to the *receiver's* local table regardless of where (or
    // whether) the slot already exists elsewhere (§4.3 "Slot mutation").
    def(&proto, "setSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let (value, signal) = eval_arg(vm, locals, msg, 1);
        if !signal.is_normal() {
            return (value, signal);
        }
        target.borrow_mut().set_local(name, value.clone());
        (value, Signal::Normal)
    });

    // Succeeds only if `name` is not found anywhere in the proto chain;
    // otherwise raises (§4.3).
    def(&proto, "newSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        if find_slot(vm, target, &name).is_some() {
            return crate::eval::raise(
                vm,
                format!("slot '{name}' already exists"),
                msg.position,
            );
        }
        let (value, signal) = eval_arg(vm, locals, msg, 1);
        if !signal.is_normal() {
            return (value, signal);
        }
        target.borrow_mut().set_local(name, value.clone());
        (value, Signal::Normal)
    });

    // Walks to the defining object and writes there; if `name` is not found
    // anywhere, falls back to creating it locally (so the first `:=` on an
    // unbound name still succeeds, per §8 scenario 2).
    def(&proto, "updateSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let (value, signal) = eval_arg(vm, locals, msg, 1);
        if !signal.is_normal() {
            return (value, signal);
        }
        let definer = find_slot(vm, target, &name).map(|(_, d)| d).unwrap_or_else(|| target.clone());
        definer.borrow_mut().set_local(name, value.clone());
        (value, Signal::Normal)
    });

    def(&proto, "removeSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        target.borrow_mut().remove_local(&name);
        (target.clone(), Signal::Normal)
    });

    def(&proto, "hasLocalSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.boolean(target.borrow().get_local(&name).is_some()), Signal::Normal)
    });

    def(&proto, "hasSlot", |vm, target, locals, _definer, msg| {
        let name = match string_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.boolean(find_slot(vm, target, &name).is_some()), Signal::Normal)
    });

    def(&proto, "slotNames", |vm, target, _locals, _definer, _msg| {
        let joined = target
            .borrow()
            .slots
            .keys()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        (vm.string(joined), Signal::Normal)
    });

    def(&proto, "protos", |vm, target, _locals, _definer, _msg| {
        let count = target.borrow().protos.len();
        (vm.number(count as f64), Signal::Normal)
    });

    def(&proto, "appendProto", |vm, target, locals, _definer, msg| {
        let (proto_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (proto_obj, signal);
        }
        target.borrow_mut().protos.push(proto_obj);
        (target.clone(), Signal::Normal)
    });

    def(&proto, "type", |vm, target, _locals, _definer, _msg| {
        (vm.string(target.borrow().type_name()), Signal::Normal)
    });

    def(&proto, "asString", |vm, target, _locals, _definer, _msg| {
        (
            vm.string(format!(
                "{}_{:p}",
                target.borrow().type_name(),
                Rc::as_ptr(target)
            )),
            Signal::Normal,
        )
    });

    def(&proto, "==", |vm, target, locals, _definer, msg| {
        let (other, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (other, signal);
        }
        (vm.boolean(Rc::ptr_eq(target, &other)), Signal::Normal)
    });
    def(&proto, "!=", |vm, target, locals, _definer, msg| {
        let (other, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (other, signal);
        }
        (vm.boolean(!Rc::ptr_eq(target, &other)), Signal::Normal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::eval::eval_chain;

    #[test]
    fn clone_do_sets_slot_on_the_clone() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "Object clone do(x := 1) x").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(1)");
    }

    #[test]
    fn new_slot_rejects_a_name_already_in_scope() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "a := 1; a ::= 2").unwrap();
        let (_, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert_eq!(signal, Signal::exception());
    }

    #[test]
    fn object_identity_equality() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "a := Object clone; b := a; a == b").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert!(Rc::ptr_eq(&value, &vm.true_obj));
    }
}
