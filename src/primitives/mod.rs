//! Native activators installed onto the VM's built-in prototypes (§4.5).
//! Each submodule owns one family; `install` wires them all onto the
//! prototypes `Vm::new` already built.

mod block;
mod buffer;
pub(crate) mod control;
mod date;
mod duration;
mod number;
mod objectops;
mod string;

use std::rc::Rc;

use crate::message::{EvalResult, MessageRef};
use crate::object::{NativeFn, Object, ObjectRef, Payload};
use crate::vm::Vm;

/// Builds a standalone native-activator Object (no protos of its own — it is
/// only ever reached by the slot that carries it, never sent a message
/// itself).
fn native(f: impl Fn(&Vm, &ObjectRef, &ObjectRef, &ObjectRef, &MessageRef) -> EvalResult + 'static) -> ObjectRef {
    let f: NativeFn = Rc::new(f);
    Object::with_payload(vec![], Payload::Native(f))
}

/// Installs `name` as a native slot on `proto`.
fn def(
    proto: &ObjectRef,
    name: &str,
    f: impl Fn(&Vm, &ObjectRef, &ObjectRef, &ObjectRef, &MessageRef) -> EvalResult + 'static,
) {
    proto.borrow_mut().set_local(name, native(f));
}

/// Builds an activatable Object from the embedding API's simpler callback
/// shape (§6 "Embedding API"), which omits the defining-object argument
/// internal primitives use to implement things like `updateSlot`.
pub fn make_native(
    f: impl Fn(&Vm, &ObjectRef, &ObjectRef, &MessageRef) -> EvalResult + 'static,
) -> ObjectRef {
    native(move |vm, target, locals, _definer, msg| f(vm, target, locals, msg))
}

/// Builds a "wrong type" exception naming what was expected and what was
/// actually found, for primitives that require a specific payload.
pub(super) fn type_error(
    vm: &Vm,
    obj: &ObjectRef,
    expected: &str,
    pos: crate::error::SourcePos,
) -> EvalResult {
    let actual = obj.borrow().type_name().to_owned();
    crate::eval::raise(vm, format!("expected a {expected}, got a {actual}"), pos)
}

pub fn install(vm: &Vm) {
    objectops::install(vm);
    number::install(vm);
    string::install(vm);
    date::install(vm);
    duration::install(vm);
    block::install(vm);
    buffer::install(vm);
    control::install(vm);
}
