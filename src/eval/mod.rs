//! The dispatcher: walks a message chain against a moving target, looking up
//! and activating one slot per step, short-circuiting on any non-`Normal`
//! signal (§4.4).

use crate::error::HostError;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::lookup::find_slot;
use crate::object::{Object, ObjectRef, Payload};
use crate::vm::Vm;

/// Evaluates `root` and every message linked after it via `.next`, threading
/// the result of each send in as the target of the next (§4.4 step 5). The
/// very first message is sent to `target`; `locals` never changes across the
/// walk — it is the fixed calling context every argument is evaluated in.
pub fn eval_chain(vm: &Vm, target: &ObjectRef, locals: &ObjectRef, root: &MessageRef) -> EvalResult {
    let mut current_target = target.clone();
    let mut cursor = Some(root.clone());
    while let Some(msg) = cursor {
        if msg.new_statement.get() {
            current_target = target.clone();
        }
        let (value, signal) = perform(vm, &current_target, locals, &msg);
        if !signal.is_normal() {
            return (value, signal);
        }
        current_target = value;
        cursor = msg.next.borrow().clone();
    }
    (current_target, Signal::Normal)
}

/// Evaluates a single message node: literal short-circuit, slot lookup,
/// `forward` fallback, activation (§4.4 steps 1-4).
pub fn perform(vm: &Vm, target: &ObjectRef, locals: &ObjectRef, msg: &MessageRef) -> EvalResult {
    if msg.is_literal() {
        return (
            msg.cached_value.clone().expect("is_literal guarantees this"),
            Signal::Normal,
        );
    }

    if vm.is_cancelled() {
        return raise_host(vm, HostError::Cancelled);
    }

    let depth = vm.recursion_depth.get();
    if depth >= vm.config.max_recursion {
        return raise_host(vm, HostError::StackOverflow);
    }
    vm.recursion_depth.set(depth + 1);
    let result = perform_uncounted(vm, target, locals, msg);
    vm.recursion_depth.set(depth);
    result
}

fn perform_uncounted(vm: &Vm, target: &ObjectRef, locals: &ObjectRef, msg: &MessageRef) -> EvalResult {
    if let Some((value, definer)) = find_slot(vm, target, &msg.name) {
        return dispatch(vm, &value, target, locals, &definer, msg);
    }

    if let Some((value, definer)) = find_slot(vm, target, "forward") {
        if value.borrow().is_activatable() {
            return dispatch(vm, &value, target, locals, &definer, msg);
        }
    }

    raise(
        vm,
        format!(
            "{} does not respond to '{}'",
            target.borrow().type_name(),
            msg.name
        ),
        msg.position,
    )
}

fn dispatch(
    vm: &Vm,
    value: &ObjectRef,
    target: &ObjectRef,
    locals: &ObjectRef,
    definer: &ObjectRef,
    msg: &MessageRef,
) -> EvalResult {
    let payload = value.borrow().payload.clone();
    match payload {
        Some(Payload::Native(native)) => native(vm, target, locals, definer, msg),
        // Only a Method auto-activates on lookup; a bare Block is inert and
        // must be sent an explicit `call` (§4.3 "Activation").
        Some(Payload::Block(block)) if block.is_method => call_block(vm, &block, target, locals, msg),
        _ => (value.clone(), Signal::Normal),
    }
}

/// Activates a block or method: evaluates `msg`'s arguments against the
/// caller's scope, binds them to the callee's parameter names in a fresh
/// local scope, then evaluates the body against that scope. A block keeps
/// its captured `home` as `self`; a method rebinds `self` to `receiver`
/// (§4.5 "Block/Method primitive"). `return` unwinds only as far as the
/// nearest enclosing method; `break`/`continue`/exceptions pass through
/// untouched for the loop primitives or `try`/`catch` to handle.
pub fn call_block(
    vm: &Vm,
    block: &crate::object::BlockValue,
    receiver: &ObjectRef,
    caller_locals: &ObjectRef,
    msg: &MessageRef,
) -> EvalResult {
    let mut arg_values = Vec::with_capacity(msg.args.len());
    for arg in &msg.args {
        let (value, signal) = eval_chain(vm, caller_locals, caller_locals, arg);
        if !signal.is_normal() {
            return (value, signal);
        }
        arg_values.push(value);
    }

    let home = if block.is_method {
        receiver.clone()
    } else {
        block.home.clone()
    };
    let scope = Object::new(vec![home.clone()]);
    for (i, name) in block.params.iter().enumerate() {
        let value = arg_values.get(i).cloned().unwrap_or_else(|| vm.nil.clone());
        scope.borrow_mut().set_local(name.clone(), value);
    }

    // Reified activation context (§4.5 step 3): `self` is the block's home
    // or the method's receiver, `sender` is the caller's locals, `message`
    // is the sent Message, and `call` carries the same message for callers
    // that want `call message`/`call sender` without a separate binding.
    {
        let mut scope_mut = scope.borrow_mut();
        scope_mut.set_local("self", home);
        scope_mut.set_local("sender", caller_locals.clone());
        let message_obj = vm.message_object(msg);
        scope_mut.set_local("message", message_obj.clone());
        let call_obj = Object::clone_of(&vm.object_proto);
        call_obj.borrow_mut().set_local("message", message_obj);
        call_obj.borrow_mut().set_local("sender", caller_locals.clone());
        call_obj.borrow_mut().set_local("target", receiver.clone());
        scope_mut.set_local("call", call_obj);
    }

    let (value, signal) = eval_chain(vm, &scope, &scope, &block.body);
    match signal {
        Signal::Return if block.is_method => (value, Signal::Normal),
        other => (value, other),
    }
}

/// Evaluates the `index`-th argument of `msg` against `locals`, or `Nil` if
/// it was not supplied. The usual way a native primitive reads one operand.
pub fn eval_arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> EvalResult {
    match msg.args.get(index) {
        Some(arg) => eval_chain(vm, locals, locals, arg),
        None => (vm.nil.clone(), Signal::Normal),
    }
}

/// Builds a catchable exception Object and returns it with `Signal::Exception`
/// (§7, §4.5 "Core control primitives" — `try`/`catch`/`pass`).
pub fn raise(vm: &Vm, message: impl Into<String>, position: crate::error::SourcePos) -> EvalResult {
    let text = message.into();
    log::debug!("exception raised at {position}: {text}");
    let exc = Object::clone_of(&vm.exception_proto);
    exc.borrow_mut().set_local("message", vm.string(text.clone()));
    exc.borrow_mut().set_local("error", vm.string(text));
    (exc, Signal::exception())
}

/// Reports an unrecoverable host-level condition. Carries `Nil` rather than
/// an exception Object since the Language itself must not be able to inspect
/// or catch it (§7 "Host error").
pub fn raise_host(vm: &Vm, reason: HostError) -> EvalResult {
    log::warn!("host-level exception: {reason}");
    (vm.nil.clone(), Signal::host_exception())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;
    use crate::error::SourcePos;
    use crate::message::Message;

    #[test]
    fn literal_chain_evaluates_to_its_own_values() {
        let vm = Vm::new(VmConfig::default());
        let root = Message::literal(vm.number(41.0), SourcePos::default());
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(41)");
    }

    #[test]
    fn missing_slot_raises_a_catchable_exception() {
        let vm = Vm::new(VmConfig::default());
        let root = Message::send("totallyUndefined", vec![], SourcePos::default());
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert_eq!(signal, Signal::exception());
        assert!(find_slot(&vm, &value, "message").is_some());
    }

    #[test]
    fn native_slot_is_activated_with_the_sending_target() {
        let vm = Vm::new(VmConfig::default());
        let receiver = Object::new(vec![vm.object_proto.clone()]);
        let native: crate::object::NativeFn =
            std::rc::Rc::new(|vm, target, _locals, _definer, _msg| {
                (vm.boolean(std::rc::Rc::ptr_eq(target, target)), Signal::Normal)
            });
        receiver
            .borrow_mut()
            .set_local("ping", Object::with_payload(vec![], Payload::Native(native)));
        let root = Message::send("ping", vec![], SourcePos::default());
        let (value, signal) = eval_chain(&vm, &receiver, &receiver, &root);
        assert!(signal.is_normal());
        assert!(std::rc::Rc::ptr_eq(&value, &vm.true_obj));
    }

    #[test]
    fn recursion_limit_reports_a_host_exception() {
        let mut config = VmConfig::default();
        config.max_recursion = 3;
        let vm = Vm::new(config);
        // A slot whose own activation immediately re-sends itself, so each
        // `perform` recurses one level deeper through `dispatch`/`call_block`.
        let looper = Object::clone_of(&vm.block_proto);
        let body = Message::send("loop", vec![], SourcePos::default());
        looper.borrow_mut().payload = Some(Payload::Block(crate::object::BlockValue {
            params: vec![],
            body: body.clone(),
            home: vm.lobby.clone(),
            is_method: true,
        }));
        vm.lobby.borrow_mut().set_local("loop", looper);

        let root = Message::send("loop", vec![], SourcePos::default());
        let (_, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert_eq!(signal, Signal::host_exception());
    }
}
