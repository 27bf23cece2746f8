//! Process-wide interpreter state (§3 "VM state"): the `Lobby` root, the
//! `Core` namespace, the `Nil`/`True`/`False` singletons, interned numbers,
//! the clock epoch, and the scratch buffers the evaluator and slot lookup
//! reuse across calls.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use log::{debug, info};

use crate::config::VmConfig;
use crate::object::{Object, ObjectRef, Payload};

/// Small integers in `[-1, 255]` are interned at startup (§4.5 "Numeric
/// primitive").
const INTERN_MIN: i64 = -1;
const INTERN_MAX: i64 = 255;

pub struct Vm {
    pub lobby: ObjectRef,
    pub core: ObjectRef,
    pub object_proto: ObjectRef,
    pub nil: ObjectRef,
    pub true_obj: ObjectRef,
    pub false_obj: ObjectRef,

    pub number_proto: ObjectRef,
    pub string_proto: ObjectRef,
    pub date_proto: ObjectRef,
    pub duration_proto: ObjectRef,
    pub block_proto: ObjectRef,
    pub method_proto: ObjectRef,
    pub exception_proto: ObjectRef,
    pub message_proto: ObjectRef,
    pub buffer_proto: ObjectRef,

    interned_numbers: RefCell<HashMap<u64, ObjectRef>>,
    /// Content-interned Symbols (`asSymbol`), compared by identity (§4.5).
    interned_symbols: RefCell<HashMap<String, ObjectRef>>,
    /// Operator precedence table (lower binds tighter), one Number slot per
    /// operator name. Exposed to the Language as `Core precedenceTable` and
    /// read directly by the parser on every parse, so `Core precedenceTable
    /// setSlot("@", 3)` changes how subsequent source is parsed (§4.2).
    pub precedence_table: ObjectRef,
    /// Maps an assignment operator identifier to the builtin slot name its
    /// statement rewrites to (`"=" -> "setSlot"`, etc). Exposed as `Core
    /// assignmentOperators`, equally Language-mutable (§4.2).
    pub assignment_table: ObjectRef,

    pub start_time: Instant,
    pub config: VmConfig,

    /// Scratch visited-set reused by every `find_slot` call (§4.3).
    pub lookup_scratch: RefCell<Vec<*const RefCell<crate::object::Object>>>,
    /// Polled at the top of every send and every loop iteration (§5).
    pub cancelled: Cell<bool>,
    pub recursion_depth: Cell<usize>,
}

impl Vm {
    pub fn new(config: VmConfig) -> Self {
        let object_proto = Object::new(vec![]);
        let lobby = Object::new(vec![object_proto.clone()]);
        let core = Object::new(vec![object_proto.clone()]);

        let nil = Object::new(vec![object_proto.clone()]);
        let true_obj = Object::new(vec![object_proto.clone()]);
        let false_obj = Object::new(vec![object_proto.clone()]);

        let number_proto = Object::new(vec![object_proto.clone()]);
        let string_proto = Object::new(vec![object_proto.clone()]);
        let date_proto = Object::new(vec![object_proto.clone()]);
        let duration_proto = Object::new(vec![object_proto.clone()]);
        let block_proto = Object::new(vec![object_proto.clone()]);
        let method_proto = Object::new(vec![block_proto.clone()]);
        let exception_proto = Object::new(vec![object_proto.clone()]);
        let message_proto = Object::new(vec![object_proto.clone()]);
        let buffer_proto = Object::new(vec![object_proto.clone()]);

        lobby
            .borrow_mut()
            .set_local("Lobby", lobby.clone());
        lobby.borrow_mut().set_local("Core", core.clone());
        for (name, proto) in [
            ("Object", &object_proto),
            ("Number", &number_proto),
            ("String", &string_proto),
            ("Date", &date_proto),
            ("Duration", &duration_proto),
            ("Block", &block_proto),
            ("Method", &method_proto),
            ("Exception", &exception_proto),
            ("Message", &message_proto),
            ("Buffer", &buffer_proto),
            ("Nil", &nil),
            ("True", &true_obj),
            ("False", &false_obj),
        ] {
            core.borrow_mut().set_local(name, proto.clone());
            lobby.borrow_mut().set_local(name, proto.clone());
        }

        let precedence_table = Object::new(vec![object_proto.clone()]);
        for (ops, prec) in crate::parser::DEFAULT_PRECEDENCE_TABLE {
            for op in *ops {
                let number = Object::with_payload(vec![number_proto.clone()], Payload::Number(*prec as f64));
                precedence_table.borrow_mut().set_local(*op, number);
            }
        }

        let assignment_table = Object::new(vec![object_proto.clone()]);
        for (op, builtin) in crate::parser::DEFAULT_ASSIGNMENT_TABLE {
            let name = Object::with_payload(vec![string_proto.clone()], Payload::Str((*builtin).to_owned()));
            assignment_table.borrow_mut().set_local(*op, name);
        }

        core.borrow_mut().set_local("precedenceTable", precedence_table.clone());
        core.borrow_mut().set_local("assignmentOperators", assignment_table.clone());

        let vm = Vm {
            lobby,
            core,
            object_proto,
            nil,
            true_obj,
            false_obj,
            number_proto,
            string_proto,
            date_proto,
            duration_proto,
            block_proto,
            method_proto,
            exception_proto,
            message_proto,
            buffer_proto,
            interned_numbers: RefCell::new(HashMap::new()),
            interned_symbols: RefCell::new(HashMap::new()),
            precedence_table,
            assignment_table,
            start_time: Instant::now(),
            config,
            lookup_scratch: RefCell::new(Vec::with_capacity(16)),
            cancelled: Cell::new(false),
            recursion_depth: Cell::new(0),
        };

        vm.intern_small_numbers();
        crate::primitives::install(&vm);

        info!("vm initialized (max_recursion={})", vm.config.max_recursion);
        vm
    }

    fn intern_small_numbers(&self) {
        for i in INTERN_MIN..=INTERN_MAX {
            let value = i as f64;
            let obj = Object::with_payload(vec![self.number_proto.clone()], Payload::Number(value));
            self.interned_numbers.borrow_mut().insert(value.to_bits(), obj);
        }
        let constants: &[(&str, f64)] = &[
            ("e", std::f64::consts::E),
            ("pi", std::f64::consts::PI),
            ("sqrt2", std::f64::consts::SQRT_2),
            ("ln2", std::f64::consts::LN_2),
            ("ln10", std::f64::consts::LN_10),
            ("log2e", std::f64::consts::LOG2_E),
            ("log10e", std::f64::consts::LOG10_E),
            ("infinity", f64::INFINITY),
            ("negativeInfinity", f64::NEG_INFINITY),
            ("nan", f64::NAN),
            ("int64Max", i64::MAX as f64),
            ("int64Min", i64::MIN as f64),
        ];
        for (_, value) in constants {
            if self.interned_numbers.borrow().contains_key(&value.to_bits()) {
                continue;
            }
            let obj = Object::with_payload(vec![self.number_proto.clone()], Payload::Number(*value));
            self.interned_numbers.borrow_mut().insert(value.to_bits(), obj);
        }
    }

    /// `new-number(x)`: returns the canonical interned Object when `x`
    /// matches one, otherwise allocates a fresh Number (§4.5, §8 invariant 7).
    pub fn number(&self, value: f64) -> ObjectRef {
        let bits = value.to_bits();
        if let Some(obj) = self.interned_numbers.borrow().get(&bits) {
            return obj.clone();
        }
        Object::with_payload(vec![self.number_proto.clone()], Payload::Number(value))
    }

    pub fn string(&self, value: impl Into<String>) -> ObjectRef {
        Object::with_payload(vec![self.string_proto.clone()], Payload::Str(value.into()))
    }

    /// Builds a raw byte buffer, as returned by `Number asBuffer`/
    /// `asUint32Buffer` (§4.5 "Numeric primitive").
    pub fn buffer(&self, bytes: Vec<u8>) -> ObjectRef {
        Object::with_payload(vec![self.buffer_proto.clone()], Payload::Buffer(bytes))
    }

    /// Returns the canonical Symbol for `value`'s text, interning it on
    /// first use so repeated `asSymbol` calls on equal text compare equal by
    /// identity (§4.5 "String primitive").
    pub fn symbol(&self, value: impl Into<String>) -> ObjectRef {
        let value = value.into();
        if let Some(obj) = self.interned_symbols.borrow().get(&value) {
            return obj.clone();
        }
        let obj = Object::with_payload(vec![self.string_proto.clone()], Payload::Str(value.clone()));
        self.interned_symbols.borrow_mut().insert(value, obj.clone());
        obj
    }

    /// Reifies `msg` as a Message Object, for the `message` local a
    /// block/method activation binds (§4.5 "Block/Method primitive").
    pub fn message_object(&self, msg: &crate::message::MessageRef) -> ObjectRef {
        Object::with_payload(vec![self.message_proto.clone()], Payload::MessageNode(msg.clone()))
    }

    pub fn boolean(&self, value: bool) -> ObjectRef {
        if value {
            self.true_obj.clone()
        } else {
            self.false_obj.clone()
        }
    }

    /// Truthiness: `Nil` and `False` are false, every other Object is true
    /// (§4.5 "Core control primitives").
    pub fn is_truthy(&self, obj: &ObjectRef) -> bool {
        !(Rc::ptr_eq(obj, &self.nil) || Rc::ptr_eq(obj, &self.false_obj))
    }

    /// Reads `op`'s precedence straight off `Core precedenceTable`'s slots,
    /// so a Language-level `setSlot` there takes effect on the very next
    /// parse (§4.2).
    pub fn precedence_of(&self, op: &str) -> i32 {
        let slot = self.precedence_table.borrow().get_local(op);
        match slot.as_ref().and_then(|s| s.borrow().payload.clone()) {
            Some(Payload::Number(n)) => n as i32,
            _ => crate::parser::DEFAULT_PRECEDENCE,
        }
    }

    /// Reads the builtin slot name `op` rewrites to off `Core
    /// assignmentOperators`, or `None` if `op` is not an assignment operator
    /// (§4.2).
    pub fn assignment_builtin(&self, op: &str) -> Option<String> {
        let slot = self.assignment_table.borrow().get_local(op)?;
        let slot_ref = slot.borrow();
        match &slot_ref.payload {
            Some(Payload::Str(name)) => Some(name.clone()),
            _ => None,
        }
    }

    pub fn cancel(&self) {
        debug!("vm cancellation flag set");
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn clock(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VmConfig;

    /// §8 invariant 7: `new-number(x)` returns the same Object reference for
    /// every interned `x`, both for the small-integer range and the named
    /// constants.
    #[test]
    fn interned_numbers_share_identity() {
        let vm = Vm::new(VmConfig::default());
        assert!(Rc::ptr_eq(&vm.number(5.0), &vm.number(5.0)));
        assert!(Rc::ptr_eq(&vm.number(-1.0), &vm.number(-1.0)));
        assert!(Rc::ptr_eq(&vm.number(std::f64::consts::PI), &vm.number(std::f64::consts::PI)));
    }

    #[test]
    fn non_interned_numbers_are_fresh_objects() {
        let vm = Vm::new(VmConfig::default());
        assert!(!Rc::ptr_eq(&vm.number(1234.5), &vm.number(1234.5)));
    }

    /// §4.2: the precedence table is a Language-visible, Language-mutable
    /// slot table on `Core`, not a fixed Rust constant.
    #[test]
    fn precedence_table_is_reachable_and_mutable_from_core() {
        let vm = Vm::new(VmConfig::default());
        assert_eq!(vm.precedence_of("+"), 5);
        vm.core
            .borrow()
            .get_local("precedenceTable")
            .unwrap()
            .borrow_mut()
            .set_local("+", vm.number(1.0));
        assert_eq!(vm.precedence_of("+"), 1);
    }

    #[test]
    fn unlisted_operator_falls_back_to_the_default_precedence() {
        let vm = Vm::new(VmConfig::default());
        assert_eq!(vm.precedence_of("<=>"), crate::parser::DEFAULT_PRECEDENCE);
    }
}
