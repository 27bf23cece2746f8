//! The runtime's single data representation: objects with a local slot
//! table, an ordered proto list, and an optional typed payload (§3 "Object").

pub mod lookup;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::message::{EvalResult, MessageRef};
use crate::vm::Vm;

pub type ObjectRef = Rc<RefCell<Object>>;

/// A native activator: the Rust-side callback signature the embedding API
/// registers under a slot (§6, §4.3 "Activation"). Arguments are
/// `(vm, target, locals, defining-object, message)`.
pub type NativeFn =
    Rc<dyn Fn(&Vm, &ObjectRef, &ObjectRef, &ObjectRef, &MessageRef) -> EvalResult>;

/// A time instant carrying its own timezone, as Dates do in the Language.
#[derive(Clone)]
pub struct DateValue {
    pub instant: DateTime<Tz>,
}

impl DateValue {
    pub fn now(tz: Tz) -> Self {
        DateValue {
            instant: Utc::now().with_timezone(&tz),
        }
    }
}

/// A closure over a message tree: either a *block* (keeps the enclosing
/// `self`) or a *method* (rebinds `self` to its receiver) (§4.5).
#[derive(Clone)]
pub struct BlockValue {
    pub params: Vec<String>,
    pub body: MessageRef,
    /// The lexical scope active when the block literal was evaluated. Used
    /// as the activation's locals-proto for blocks; ignored for methods,
    /// whose locals-proto is the receiver at call time instead.
    pub home: ObjectRef,
    pub is_method: bool,
}

/// The typed native value an Object's payload may carry, tagged by variant
/// so the evaluator's hot paths can match on it directly (§9 "Dynamic
/// dispatch").
#[derive(Clone)]
pub enum Payload {
    Number(f64),
    Str(String),
    Date(DateValue),
    /// Nanosecond count.
    Duration(i64),
    Block(BlockValue),
    Native(NativeFn),
    /// Reifies the Message currently being activated, for the `message` and
    /// `call` locals a block/method activation binds (§4.5 "Block/Method
    /// primitive" step 3).
    MessageNode(MessageRef),
    /// Raw bytes, as produced by `Number asBuffer`/`asUint32Buffer`. Kept
    /// separate from `Str` because those are byte sequences, not UTF-8 text —
    /// no UTF-8 `String` can hold an arbitrary byte ≥0x80 as one byte.
    Buffer(Vec<u8>),
}

impl Payload {
    /// Whether a slot holding this payload is invoked rather than returned
    /// verbatim when found by a lookup (§4.3 "Activation"). A bare Block is
    /// an inert value — it must be sent an explicit `call` — but a Method
    /// behaves like any other reusable operation and activates as soon as
    /// its slot name is sent, exactly like a native primitive (§4.5
    /// "Block/Method primitive").
    pub fn is_activatable(&self) -> bool {
        matches!(self, Payload::Native(_)) || matches!(self, Payload::Block(b) if b.is_method)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Payload::Number(_) => "Number",
            Payload::Str(_) => "String",
            Payload::Date(_) => "Date",
            Payload::Duration(_) => "Duration",
            Payload::Block(b) if b.is_method => "Method",
            Payload::Block(_) => "Block",
            Payload::Native(_) => "NativeFunction",
            Payload::MessageNode(_) => "Message",
            Payload::Buffer(_) => "Buffer",
        }
    }
}

pub struct Object {
    pub slots: HashMap<String, ObjectRef>,
    pub protos: Vec<ObjectRef>,
    pub payload: Option<Payload>,
}

/// Manual impl: `Payload::Native`/`Payload::Block` close over trait objects
/// and message trees that don't themselves implement `Debug`, so printing an
/// Object only ever shows its shape, never a recursive slot dump.
impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("type", &self.type_name())
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("protos", &self.protos.len())
            .finish()
    }
}

impl Object {
    pub fn new(protos: Vec<ObjectRef>) -> ObjectRef {
        Rc::new(RefCell::new(Object {
            slots: HashMap::new(),
            protos,
            payload: None,
        }))
    }

    pub fn with_payload(protos: Vec<ObjectRef>, payload: Payload) -> ObjectRef {
        Rc::new(RefCell::new(Object {
            slots: HashMap::new(),
            protos,
            payload: Some(payload),
        }))
    }

    /// `clone` in the Language: a new object whose only proto is `proto` and
    /// whose local slot table is empty. Payload is tag-specific, but every
    /// payload kind this crate carries is a cheap Rust value (or an `Rc`),
    /// so the clone hook is uniformly "copy the payload" (§4.3 "Creation").
    pub fn clone_of(proto: &ObjectRef) -> ObjectRef {
        let payload = proto.borrow().payload.clone();
        Rc::new(RefCell::new(Object {
            slots: HashMap::new(),
            protos: vec![proto.clone()],
            payload,
        }))
    }

    pub fn get_local(&self, name: &str) -> Option<ObjectRef> {
        self.slots.get(name).cloned()
    }

    pub fn set_local(&mut self, name: impl Into<String>, value: ObjectRef) {
        self.slots.insert(name.into(), value);
    }

    pub fn remove_local(&mut self, name: &str) -> Option<ObjectRef> {
        self.slots.remove(name)
    }

    pub fn is_activatable(&self) -> bool {
        self.payload.as_ref().is_some_and(Payload::is_activatable)
    }

    pub fn type_name(&self) -> &'static str {
        self.payload.as_ref().map(Payload::type_name).unwrap_or("Object")
    }
}

/// A short, content-based rendering of a literal's payload, used only to
/// compare two literal messages for the parser-idempotence property (§8
/// invariant 5) without requiring `PartialEq` on `ObjectRef` identity.
pub fn print_literal(obj: &ObjectRef) -> String {
    match &obj.borrow().payload {
        Some(Payload::Number(n)) => format!("Number({n})"),
        Some(Payload::Str(s)) => format!("String({s:?})"),
        Some(Payload::Date(d)) => format!("Date({})", d.instant.to_rfc3339()),
        Some(Payload::Duration(ns)) => format!("Duration({ns})"),
        Some(Payload::Block(_)) => "Block".to_owned(),
        Some(Payload::Native(_)) => "Native".to_owned(),
        Some(Payload::MessageNode(m)) => format!("Message({})", m.name),
        Some(Payload::Buffer(b)) => format!("Buffer({} bytes)", b.len()),
        None => "Object".to_owned(),
    }
}
