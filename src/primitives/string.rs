//! String primitive (§4.5 "String primitive"). Strings are an owned Rust
//! `String` payload but behave as value objects at the Language level: every
//! operation here returns a fresh String rather than mutating the receiver.

use crate::eval::eval_arg;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};
use super::number::format_number;

fn require(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<String, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Str(s)) => Ok(s),
        _ => Err(type_error(vm, obj, "String", msg.position)),
    }
}

fn str_arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> Result<String, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, index);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    require(vm, &value, msg)
}

fn number_arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> Result<f64, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, index);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    match value.borrow().payload.clone() {
        Some(Payload::Number(n)) => Ok(n),
        _ => Err(type_error(vm, &value, "Number", msg.position)),
    }
}

pub fn install(vm: &Vm) {
    let proto = vm.string_proto.clone();

    def(&proto, "asString", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.string(s), Signal::Normal)
    });
    def(&proto, "size", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.number(s.len() as f64), Signal::Normal)
    });
    def(&proto, "isEmpty", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.boolean(s.is_empty()), Signal::Normal)
    });
    def(&proto, "asNumber", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        match s.trim().parse::<f64>() {
            Ok(n) => (vm.number(n), Signal::Normal),
            Err(_) => crate::eval::raise(vm, format!("'{s}' is not a valid number"), msg.position),
        }
    });
    def(&proto, "at", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let i = match number_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        match s.as_bytes().get(i as usize) {
            Some(b) => (vm.number(*b as f64), Signal::Normal),
            None => (vm.nil.clone(), Signal::Normal),
        }
    });
    def(&proto, "asUppercase", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.string(s.to_uppercase()), Signal::Normal)
    });
    def(&proto, "asLowercase", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.string(s.to_lowercase()), Signal::Normal)
    });
    def(&proto, "reverse", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.string(s.chars().rev().collect::<String>()), Signal::Normal)
    });
    // Content-interned: two calls to `asSymbol` on equal text answer the
    // same canonical Object, so Symbols compare by identity (§4.5).
    def(&proto, "asSymbol", |vm, target, _locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.symbol(s), Signal::Normal)
    });
    def(&proto, "slice", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let start = match number_arg(vm, locals, msg, 0) {
            Ok(n) => n as usize,
            Err(e) => return e,
        };
        let chars: Vec<char> = s.chars().collect();
        let end = if msg.args.len() > 1 {
            match number_arg(vm, locals, msg, 1) {
                Ok(n) => (n as usize).min(chars.len()),
                Err(e) => return e,
            }
        } else {
            chars.len()
        };
        let slice: String = chars
            .get(start.min(chars.len())..end.max(start.min(chars.len())))
            .unwrap_or(&[])
            .iter()
            .collect();
        (vm.string(slice), Signal::Normal)
    });
    def(&proto, "find", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let needle = match str_arg(vm, locals, msg, 0) {
            Ok(s) => s,
            Err(e) => return e,
        };
        match s.find(&needle) {
            Some(byte_idx) => (vm.number(s[..byte_idx].chars().count() as f64), Signal::Normal),
            None => (vm.nil.clone(), Signal::Normal),
        }
    });
    def(&proto, "contains", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let needle = match str_arg(vm, locals, msg, 0) {
            Ok(s) => s,
            Err(e) => return e,
        };
        (vm.boolean(s.contains(&needle)), Signal::Normal)
    });
    def(&proto, "split", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let sep = if msg.args.is_empty() {
            " ".to_owned()
        } else {
            match str_arg(vm, locals, msg, 0) {
                Ok(s) => s,
                Err(e) => return e,
            }
        };
        // There is no List prototype in scope (§1 non-goals); parts are
        // returned as a single newline-joined String, and the count
        // retrievable via `splitCount`.
        let pieces: Vec<&str> = s.split(&sep as &str).collect();
        let count = pieces.len();
        let joined = pieces.join("\n");
        let result = vm.string(joined);
        result
            .borrow_mut()
            .set_local("splitCount", vm.number(count as f64));
        (result, Signal::Normal)
    });
    def(&proto, "repeated", |vm, target, locals, _definer, msg| {
        let s = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let n = match number_arg(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        if n < 0.0 {
            return crate::eval::raise(vm, "repeated count must not be negative", msg.position);
        }
        (vm.string(s.repeat(n as usize)), Signal::Normal)
    });
    def(&proto, "with", |vm, _target, locals, _definer, msg| {
        let mut out = String::new();
        for i in 0..msg.args.len() {
            match eval_arg(vm, locals, msg, i) {
                (value, signal) if signal.is_normal() => {
                    out.push_str(&to_display_string(&value));
                }
                failed => return failed,
            }
        }
        (vm.string(out), Signal::Normal)
    });
    def(&proto, "+", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(s) => s,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        (vm.string(lhs + &to_display_string(&rhs_obj)), Signal::Normal)
    });

    def(&proto, "==", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Equal)
    });
    def(&proto, "!=", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Equal)
    });
    def(&proto, "<", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Less)
    });
    def(&proto, "<=", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Greater)
    });
    def(&proto, ">", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Greater)
    });
    def(&proto, ">=", |vm, target, locals, _definer, msg| {
        string_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Less)
    });
}

fn string_cmp(
    vm: &Vm,
    target: &ObjectRef,
    locals: &ObjectRef,
    msg: &MessageRef,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> EvalResult {
    let lhs = match require(vm, target, msg) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let rhs = match str_arg(vm, locals, msg, 0) {
        Ok(s) => s,
        Err(e) => return e,
    };
    (vm.boolean(accept(lhs.cmp(&rhs))), Signal::Normal)
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
    fn at_returns_the_byte_value_not_a_one_character_string() {
        assert_eq!(eval("\"abc\" at(0)"), "Number(97)");
        assert_eq!(eval("\"abc\" at(9)"), "Object");
    }

    #[test]
    fn size_counts_bytes_not_unicode_scalars() {
        // "é" is one Unicode scalar but two UTF-8 bytes.
        assert_eq!(eval("\"\u{e9}\" size"), "Number(2)");
        assert_eq!(eval("\"abc\" size"), "Number(3)");
    }

    #[test]
    fn as_number_parses_numeric_text() {
        assert_eq!(eval("\"42\" asNumber"), "Number(42)");
        assert_eq!(eval("\"  3.5  \" asNumber"), "Number(3.5)");
    }

    #[test]
    fn slice_extracts_a_character_range() {
        assert_eq!(eval("\"abcdef\" slice(1, 3)"), "String(\"bc\")");
        assert_eq!(eval("\"abcdef\" slice(2)"), "String(\"cdef\")");
    }

    #[test]
    fn find_returns_the_character_index_or_nil() {
        assert_eq!(eval("\"abcdef\" find(\"cd\")"), "Number(2)");
        assert_eq!(eval("\"abcdef\" find(\"zz\")"), "Object");
    }

    #[test]
    fn split_joins_pieces_and_records_the_count() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "\"a,b,c\" split(\",\")").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "String(\"a\\nb\\nc\")");
        let count = value.borrow().get_local("splitCount").unwrap();
        assert_eq!(crate::object::print_literal(&count), "Number(3)");
    }

    #[test]
    fn plus_concatenates_and_stringifies_the_right_hand_side() {
        assert_eq!(eval("\"x = \" + 5"), "String(\"x = 5\")");
    }
}

/// Renders any Object as text for string concatenation (`+`, `with`):
/// Strings pass through verbatim, Numbers use the same formatting as
/// `asString`, everything else falls back to its type name.
fn to_display_string(obj: &ObjectRef) -> String {
    match &obj.borrow().payload {
        Some(Payload::Str(s)) => s.clone(),
        Some(Payload::Number(n)) => format_number(*n),
        _ => obj.borrow().type_name().to_owned(),
    }
}
