//! Core control primitives (§4.5 "Core control primitives"): lazy
//! conditionals, short-circuiting boolean combinators, loops, and the
//! `try`/`catch`/`pass` exception-handler activation referenced by §4.4.
//! Every one of these depends on seeing the raw argument *message tree*
//! rather than an eagerly evaluated value — that is the whole reason
//! `perform` does not evaluate arguments itself (§4.4 "Argument
//! evaluation").

use crate::eval::eval_chain;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{Object, ObjectRef, Payload};
use crate::vm::Vm;

use super::def;

/// Evaluates `msg.args[index]` against `locals`, with `locals` also used as
/// the target (the common shape for a control primitive's own operand,
/// which is plain Language code, not a slot send on some other receiver).
fn eval_in(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> EvalResult {
    match msg.args.get(index) {
        Some(arg) => eval_chain(vm, locals, locals, arg),
        None => (vm.nil.clone(), Signal::Normal),
    }
}

/// Whether `obj`'s proto chain (pre-order, cycle-safe via `find_slot`'s
/// sibling walk) includes `ancestor`, used by `catch`'s optional type
/// filter.
fn is_kind_of(obj: &ObjectRef, ancestor: &ObjectRef) -> bool {
    fn walk(obj: &ObjectRef, ancestor: &ObjectRef, visited: &mut Vec<*const ()>) -> bool {
        let ptr = std::rc::Rc::as_ptr(obj) as *const ();
        if visited.contains(&ptr) {
            return false;
        }
        visited.push(ptr);
        if std::rc::Rc::ptr_eq(obj, ancestor) {
            return true;
        }
        obj.borrow().protos.iter().any(|p| walk(p, ancestor, visited))
    }
    walk(obj, ancestor, &mut Vec::new())
}

/// Whether `obj` descends from the `Exception` prototype, for callers
/// outside this module that need to name an exception's kind (the host
/// binary's uncaught-exception report; see [`crate::error::RuntimeException`]).
pub(crate) fn is_exception_kind(vm: &Vm, obj: &ObjectRef) -> bool {
    is_kind_of(obj, &vm.exception_proto)
}

pub fn install(vm: &Vm) {
    let proto = vm.object_proto.clone();

    def(&proto, "if", |vm, _target, locals, _definer, msg| {
        let (cond, signal) = eval_in(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (cond, signal);
        }
        if vm.is_truthy(&cond) {
            eval_in(vm, locals, msg, 1)
        } else if msg.args.len() > 2 {
            eval_in(vm, locals, msg, 2)
        } else {
            (vm.nil.clone(), Signal::Normal)
        }
    });

    def(&proto, "and", |vm, target, locals, _definer, msg| {
        if !vm.is_truthy(target) {
            return (vm.false_obj.clone(), Signal::Normal);
        }
        let (rhs, signal) = eval_in(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        (vm.boolean(vm.is_truthy(&rhs)), Signal::Normal)
    });
    def(&proto, "or", |vm, target, locals, _definer, msg| {
        if vm.is_truthy(target) {
            return (vm.true_obj.clone(), Signal::Normal);
        }
        let (rhs, signal) = eval_in(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        (vm.boolean(vm.is_truthy(&rhs)), Signal::Normal)
    });
    def(&proto, "not", |vm, target, _locals, _definer, _msg| {
        (vm.boolean(!vm.is_truthy(target)), Signal::Normal)
    });

    def(&proto, "while", |vm, _target, locals, _definer, msg| {
        loop {
            if vm.is_cancelled() {
                return crate::eval::raise_host(vm, crate::error::HostError::Cancelled);
            }
            let (cond, signal) = eval_in(vm, locals, msg, 0);
            if !signal.is_normal() {
                return (cond, signal);
            }
            if !vm.is_truthy(&cond) {
                return (vm.nil.clone(), Signal::Normal);
            }
            let (value, signal) = eval_in(vm, locals, msg, 1);
            match signal {
                Signal::Normal | Signal::Continue => continue,
                Signal::Break => return (value, Signal::Normal),
                other => return (value, other),
            }
        }
    });

    def(&proto, "loop", |vm, _target, locals, _definer, msg| {
        loop {
            if vm.is_cancelled() {
                return crate::eval::raise_host(vm, crate::error::HostError::Cancelled);
            }
            let (value, signal) = eval_in(vm, locals, msg, 0);
            match signal {
                Signal::Normal | Signal::Continue => continue,
                Signal::Break => return (value, Signal::Normal),
                other => return (value, other),
            }
        }
    });

    // `for(counterName, start, end, step?, body)`: `counterName` is read as
    // a raw identifier (never sent), the rest are evaluated in `locals`.
    def(&proto, "for", |vm, _target, locals, _definer, msg| {
        if msg.args.len() < 4 {
            return crate::eval::raise(vm, "for requires a counter, start, end and body", msg.position);
        }
        let counter_name = msg.args[0].name.clone();
        let (start_obj, signal) = eval_in(vm, locals, msg, 1);
        if !signal.is_normal() {
            return (start_obj, signal);
        }
        let (end_obj, signal) = eval_in(vm, locals, msg, 2);
        if !signal.is_normal() {
            return (end_obj, signal);
        }
        let has_step = msg.args.len() > 4;
        let (step, body_index) = if has_step {
            let (step_obj, signal) = eval_in(vm, locals, msg, 3);
            if !signal.is_normal() {
                return (step_obj, signal);
            }
            (number_of(&step_obj).unwrap_or(1.0), 4)
        } else {
            (1.0, 3)
        };
        let start = match number_of(&start_obj) {
            Some(n) => n,
            None => return super::type_error(vm, &start_obj, "Number", msg.position),
        };
        let end = match number_of(&end_obj) {
            Some(n) => n,
            None => return super::type_error(vm, &end_obj, "Number", msg.position),
        };
        let step = if step == 0.0 {
            if start <= end { 1.0 } else { -1.0 }
        } else {
            step
        };

        let mut i = start;
        loop {
            if (step > 0.0 && i > end) || (step < 0.0 && i < end) {
                return (vm.nil.clone(), Signal::Normal);
            }
            if vm.is_cancelled() {
                return crate::eval::raise_host(vm, crate::error::HostError::Cancelled);
            }
            locals.borrow_mut().set_local(counter_name.clone(), vm.number(i));
            let (value, signal) = eval_in(vm, locals, msg, body_index);
            match signal {
                Signal::Normal | Signal::Continue => {}
                Signal::Break => return (value, Signal::Normal),
                other => return (value, other),
            }
            i += step;
        }
    });

    def(&proto, "return", |vm, _target, locals, _definer, msg| {
        let (value, signal) = eval_in(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (value, signal);
        }
        (value, Signal::Return)
    });
    def(&proto, "break", |vm, _target, locals, _definer, msg| {
        let (value, signal) = eval_in(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (value, signal);
        }
        (value, Signal::Break)
    });
    def(&proto, "continue", |vm, _target, _locals, _definer, _msg| {
        (vm.nil.clone(), Signal::Continue)
    });

    // Evaluates `body` directly against `target` as both the send's target
    // and its locals (§8 scenario 3: `Object clone do(x := 1) x`).
    def(&proto, "do", |vm, target, _locals, _definer, msg| {
        match msg.args.first() {
            Some(body) => eval_chain(vm, target, target, body),
            None => (target.clone(), Signal::Normal),
        }
    });

    // `try(body)`: runs `body`; a catchable exception is caught and
    // returned as a plain value (the exception Object) rather than
    // propagated, so a chained `catch(...)` send can inspect it. On a
    // normal result the body's own value passes through unchanged, so
    // `try(1 / 0) catch(...)` still yields the computed number. A
    // `return`/`break`/`continue`/host-exception passes straight through.
    def(&proto, "try", |vm, _target, locals, _definer, msg| {
        let (value, signal) = eval_in(vm, locals, msg, 0);
        match signal {
            Signal::Exception { uncatchable: false } => (value, Signal::Normal),
            other => (value, other),
        }
    });

    // Default `catch` is a pass-through for anything that isn't an
    // in-flight exception Object, so `try(ok) catch(...)` chains cleanly
    // whether or not `try` actually caught something.
    def(&proto, "catch", |_vm, target, _locals, _definer, _msg| {
        (target.clone(), Signal::Normal)
    });

    let exception_proto = vm.exception_proto.clone();
    def(&exception_proto, "catch", |vm, target, locals, _definer, msg| {
        // catch(handler) | catch(varName, handler) | catch(type, varName, handler)
        let (type_filter, var_name, handler_index) = match msg.args.len() {
            0 => return (target.clone(), Signal::Normal),
            1 => (None, None, 0),
            2 => (None, Some(msg.args[0].name.clone()), 1),
            _ => (Some(msg.args[0].clone()), Some(msg.args[1].name.clone()), 2),
        };

        if let Some(type_msg) = &type_filter {
            let (type_obj, signal) = eval_chain(vm, locals, locals, type_msg);
            if !signal.is_normal() {
                return (type_obj, signal);
            }
            if !is_kind_of(target, &type_obj) {
                return (target.clone(), Signal::Normal);
            }
        }

        let scope = Object::new(vec![locals.clone()]);
        if let Some(name) = var_name {
            scope.borrow_mut().set_local(name, target.clone());
        }
        match msg.args.get(handler_index) {
            Some(body) => eval_chain(vm, &scope, &scope, body),
            None => (target.clone(), Signal::Normal),
        }
    });
    // Re-raises the currently-handled exception (the `catch` block's
    // target), letting an outer `try` catch it instead.
    def(&exception_proto, "pass", |_vm, target, _locals, _definer, _msg| {
        (target.clone(), Signal::exception())
    });
}

fn number_of(obj: &ObjectRef) -> Option<f64> {
    match obj.borrow().payload {
        Some(Payload::Number(n)) => Some(n),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    #[test]
    fn if_picks_the_truthy_branch() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "if(1 < 2, \"yes\", \"no\")").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "String(\"yes\")");
    }

    #[test]
    fn while_loop_accumulates_and_honors_break() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(
            &vm,
            "total := 0; i := 0; while(i < 10, total := total + i; i := i + 1; if(i == 5, break)); total",
        )
        .unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(10)");
    }

    #[test]
    fn for_loop_binds_the_counter_name() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "sum := 0; for(i, 1, 4, sum := sum + i); sum").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(10)");
    }

    #[test]
    fn try_catch_recovers_from_an_undefined_slot() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(
            &vm,
            "try(Object undefinedSlot) catch(Exception, e, \"caught\")",
        )
        .unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "String(\"caught\")");
    }

    #[test]
    fn division_by_zero_does_not_raise() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "try(1 / 0) catch(Exception, e, \"caught\")").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(inf)");
    }
}
