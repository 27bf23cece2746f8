//! Cycle-safe slot lookup (§4.3). Search order is the receiver first, then a
//! depth-first pre-order walk of its protos, skipping any object already
//! visited during this one call.

use std::cell::RefCell;
use std::rc::Rc;

use super::{Object, ObjectRef};
use crate::vm::Vm;

/// `find-slot(receiver, name) -> (value, defining-object) | not-found`.
///
/// Reuses the VM's scratch visited-set so a lookup never allocates on the
/// happy path; the set is cleared at the start of every top-level call and
/// is not shared across concurrent lookups (there are none — a VM is
/// single-threaded, §5).
pub fn find_slot(vm: &Vm, receiver: &ObjectRef, name: &str) -> Option<(ObjectRef, ObjectRef)> {
    let mut scratch = vm.lookup_scratch.borrow_mut();
    scratch.clear();
    find_slot_rec(receiver, name, &mut scratch)
}

fn find_slot_rec(
    obj: &ObjectRef,
    name: &str,
    visited: &mut Vec<*const RefCell<Object>>,
) -> Option<(ObjectRef, ObjectRef)> {
    let ptr = Rc::as_ptr(obj);
    if visited.contains(&ptr) {
        return None;
    }
    visited.push(ptr);

    if let Some(value) = obj.borrow().get_local(name) {
        return Some((value, obj.clone()));
    }

    let protos = obj.borrow().protos.clone();
    for proto in &protos {
        if let Some(found) = find_slot_rec(proto, name, visited) {
            return Some(found);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    #[test]
    fn finds_local_slot_on_receiver() {
        let vm = Vm::new(VmConfig::default());
        let obj = Object::new(vec![]);
        obj.borrow_mut().set_local("x", vm.number(1.0));
        let (value, definer) = find_slot(&vm, &obj, "x").unwrap();
        assert!(Rc::ptr_eq(&definer, &obj));
        assert!(Rc::ptr_eq(&value, &vm.number(1.0)) || super::super::print_literal(&value) == "Number(1)");
    }

    #[test]
    fn walks_protos_depth_first_left_to_right() {
        let vm = Vm::new(VmConfig::default());
        let left = Object::new(vec![]);
        left.borrow_mut().set_local("greeting", vm.number(1.0));
        let right = Object::new(vec![]);
        right.borrow_mut().set_local("greeting", vm.number(2.0));
        let child = Object::new(vec![left, right]);

        let (value, _) = find_slot(&vm, &child, "greeting").unwrap();
        assert_eq!(super::super::print_literal(&value), "Number(1)");
    }

    #[test]
    fn cyclic_protos_terminate_and_visit_each_object_once() {
        let vm = Vm::new(VmConfig::default());
        let a = Object::new(vec![]);
        let b = Object::new(vec![a.clone()]);
        a.borrow_mut().protos.push(b.clone());

        assert!(find_slot(&vm, &a, "missing").is_none());
        assert!(find_slot(&vm, &b, "missing").is_none());
    }

    #[test]
    fn missing_slot_is_not_found() {
        let vm = Vm::new(VmConfig::default());
        let obj = Object::new(vec![]);
        assert!(find_slot(&vm, &obj, "nope").is_none());
    }
}
