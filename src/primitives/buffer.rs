//! Buffer primitive: the raw-byte payload `Number asBuffer`/`asUint32Buffer`
//! produce (§4.5 "Numeric primitive"). Kept separate from the String
//! primitive because a buffer's `size` must equal its exact byte count,
//! which no UTF-8 `String` payload can guarantee for bytes ≥0x80.

use crate::eval::eval_arg;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

fn require(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<Vec<u8>, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Buffer(b)) => Ok(b),
        _ => Err(type_error(vm, obj, "Buffer", msg.position)),
    }
}

fn index_arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef) -> Result<usize, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, 0);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    match value.borrow().payload.clone() {
        Some(Payload::Number(n)) => Ok(n as usize),
        _ => Err(type_error(vm, &value, "Number", msg.position)),
    }
}

pub fn install(vm: &Vm) {
    let proto = vm.buffer_proto.clone();

    def(&proto, "size", |vm, target, _locals, _definer, msg| {
        let b = match require(vm, target, msg) {
            Ok(b) => b,
            Err(e) => return e,
        };
        (vm.number(b.len() as f64), Signal::Normal)
    });

    def(&proto, "at", |vm, target, locals, _definer, msg| {
        let b = match require(vm, target, msg) {
            Ok(b) => b,
            Err(e) => return e,
        };
        let i = match index_arg(vm, locals, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        match b.get(i) {
            Some(byte) => (vm.number(*byte as f64), Signal::Normal),
            None => (vm.nil.clone(), Signal::Normal),
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::eval::eval_chain;
    use crate::vm::Vm;

    fn eval(src: &str) -> String {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, src).unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        crate::object::print_literal(&value)
    }

    #[test]
    fn size_reports_the_exact_byte_count_regardless_of_utf8_validity() {
        assert_eq!(eval("255 asUint32Buffer size"), "Number(4)");
        assert_eq!(eval("1.5 asBuffer(8) size"), "Number(8)");
    }

    #[test]
    fn at_returns_the_raw_byte_value() {
        assert_eq!(eval("255 asUint32Buffer at(0)"), "Number(255)");
        assert_eq!(eval("255 asUint32Buffer at(1)"), "Number(0)");
    }
}
