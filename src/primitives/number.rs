//! Numeric primitive (§4.5): arithmetic, comparison, and the handful of math
//! functions a Number slot responds to.

use crate::eval::{eval_arg, eval_chain};
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

fn require(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<f64, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Number(n)) => Ok(n),
        _ => Err(type_error(vm, obj, "Number", msg.position)),
    }
}

/// Evaluates `msg`'s sole argument and unwraps it as a Number, propagating
/// any non-`Normal` signal (including a wrong-type exception) to the caller.
fn arg(vm: &Vm, locals: &ObjectRef, msg: &MessageRef) -> Result<f64, EvalResult> {
    arg_at(vm, locals, msg, 0)
}

/// Like [`arg`], but for an arbitrary argument index.
fn arg_at(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> Result<f64, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, index);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    require(vm, &value, msg)
}

macro_rules! binop {
    ($vm:ident, $target:ident, $locals:ident, $msg:ident, |$lhs:ident, $rhs:ident| $body:expr) => {{
        let $lhs = match require($vm, $target, $msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let $rhs = match arg($vm, $locals, $msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        $body
    }};
}

pub fn install(vm: &Vm) {
    let proto = vm.number_proto.clone();

    def(&proto, "+", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a + b);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "-", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a - b);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "*", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a * b);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "/", |vm, target, locals, _definer, msg| {
        // Division by zero yields IEEE-754 infinity/NaN rather than raising
        // (§8 concrete scenario: "division by zero is infinity, not a crash").
        let value = binop!(vm, target, locals, msg, |a, b| a / b);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "%", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a % b);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "pow", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a.powf(b));
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "min", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a.min(b));
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "max", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a.max(b));
        (vm.number(value), Signal::Normal)
    });

    def(&proto, "==", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a == b);
        (vm.boolean(value), Signal::Normal)
    });
    def(&proto, "!=", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a != b);
        (vm.boolean(value), Signal::Normal)
    });
    def(&proto, "<", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a < b);
        (vm.boolean(value), Signal::Normal)
    });
    def(&proto, "<=", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a <= b);
        (vm.boolean(value), Signal::Normal)
    });
    def(&proto, ">", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a > b);
        (vm.boolean(value), Signal::Normal)
    });
    def(&proto, ">=", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a >= b);
        (vm.boolean(value), Signal::Normal)
    });

    def(&proto, "negate", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(-n), Signal::Normal)
    });
    def(&proto, "abs", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.abs()), Signal::Normal)
    });
    def(&proto, "floor", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.floor()), Signal::Normal)
    });
    def(&proto, "ceil", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.ceil()), Signal::Normal)
    });
    def(&proto, "round", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.round()), Signal::Normal)
    });
    def(&proto, "sqrt", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.sqrt()), Signal::Normal)
    });
    def(&proto, "isNan", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.boolean(n.is_nan()), Signal::Normal)
    });
    def(&proto, "asString", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.string(format_number(n)), Signal::Normal)
    });

    // `^` is registered at the tightest precedence band (§4.2's table) but
    // carries the same meaning as `pow` rather than bitwise XOR, matching
    // the arithmetic reading of every other operator character the lexer
    // accepts.
    def(&proto, "^", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a.powf(b));
        (vm.number(value), Signal::Normal)
    });

    def(&proto, "bitwiseAnd", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| ((a as i64) & (b as i64)) as f64);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "bitwiseOr", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| ((a as i64) | (b as i64)) as f64);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "bitwiseXor", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| ((a as i64) ^ (b as i64)) as f64);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "bitwiseNot", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(!(n as i64) as f64), Signal::Normal)
    });
    def(&proto, "shiftLeft", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| ((a as i64) << (b as i64)) as f64);
        (vm.number(value), Signal::Normal)
    });
    def(&proto, "shiftRight", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| ((a as i64) >> (b as i64)) as f64);
        (vm.number(value), Signal::Normal)
    });

    def(&proto, "roundDown", |vm, target, _locals, _definer, msg| {
        // Halfway toward +infinity, unlike `round`'s halfway-away-from-zero.
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number((n + 0.5).floor()), Signal::Normal)
    });
    def(&proto, "squared", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n * n), Signal::Normal)
    });
    def(&proto, "cubed", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n * n * n), Signal::Normal)
    });
    def(&proto, "exp", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.exp()), Signal::Normal)
    });
    def(&proto, "log", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        if msg.args.is_empty() {
            return (vm.number(n.ln()), Signal::Normal);
        }
        let base = match arg(vm, locals, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.log(base)), Signal::Normal)
    });
    def(&proto, "log2", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.log2()), Signal::Normal)
    });
    def(&proto, "log10", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.log10()), Signal::Normal)
    });

    def(&proto, "sin", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::sin)
    });
    def(&proto, "cos", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::cos)
    });
    def(&proto, "tan", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::tan)
    });
    def(&proto, "asin", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::asin)
    });
    def(&proto, "acos", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::acos)
    });
    def(&proto, "atan", |vm, target, _locals, _definer, msg| {
        unary(vm, target, msg, f64::atan)
    });
    def(&proto, "atan2", |vm, target, locals, _definer, msg| {
        let value = binop!(vm, target, locals, msg, |a, b| a.atan2(b));
        (vm.number(value), Signal::Normal)
    });

    def(&proto, "clip", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let lo = match arg_at(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let hi = match arg_at(vm, locals, msg, 1) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.number(n.clamp(lo.min(hi), lo.max(hi))), Signal::Normal)
    });
    def(&proto, "between", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let lo = match arg_at(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let hi = match arg_at(vm, locals, msg, 1) {
            Ok(n) => n,
            Err(e) => return e,
        };
        (vm.boolean(n >= lo && n <= hi), Signal::Normal)
    });

    def(&proto, "factorial", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let mut acc = 1.0;
        let mut i = 2.0;
        while i <= n {
            acc *= i;
            i += 1.0;
        }
        (vm.number(acc), Signal::Normal)
    });

    def(&proto, "at", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n as i64,
            Err(e) => return e,
        };
        let bit = match arg(vm, locals, msg) {
            Ok(n) => n as u32,
            Err(e) => return e,
        };
        (vm.number(((n >> bit) & 1) as f64), Signal::Normal)
    });

    def(&proto, "asCharacter", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        match char::from_u32(n as u32) {
            Some(c) => (vm.string(c.to_string()), Signal::Normal),
            None => crate::eval::raise(vm, "not a valid codepoint", msg.position),
        }
    });

    def(&proto, "asBuffer", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let n_bytes = if msg.args.is_empty() {
            8
        } else {
            match arg(vm, locals, msg) {
                Ok(n) => n as usize,
                Err(e) => return e,
            }
        };
        let bytes = n.to_le_bytes();
        let mut out = vec![0u8; n_bytes];
        for (i, b) in bytes.iter().take(n_bytes).enumerate() {
            out[i] = *b;
        }
        (vm.buffer(out), Signal::Normal)
    });
    def(&proto, "asUint32Buffer", |vm, target, _locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let bytes = (n as u32).to_le_bytes();
        (vm.buffer(bytes.to_vec()), Signal::Normal)
    });

    def(&proto, "toBase", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n as i64,
            Err(e) => return e,
        };
        let radix = match arg(vm, locals, msg) {
            Ok(n) => n as u32,
            Err(e) => return e,
        };
        if !(2..=36).contains(&radix) {
            return crate::eval::raise(vm, "toBase radix must be between 2 and 36", msg.position);
        }
        (vm.string(to_base(n, radix)), Signal::Normal)
    });
    def(&proto, "toBaseWholeBytes", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n as i64,
            Err(e) => return e,
        };
        let radix = match arg(vm, locals, msg) {
            Ok(n) => n as u32,
            Err(e) => return e,
        };
        if !(2..=36).contains(&radix) {
            return crate::eval::raise(vm, "toBaseWholeBytes radix must be between 2 and 36", msg.position);
        }
        let digits_per_byte = match radix {
            2 => 8,
            3 => 6,
            4..=7 => 4,
            8..=14 => 3,
            _ => 2,
        };
        let digits = to_base(n, radix);
        let padded_len = (digits.len() + digits_per_byte - 1) / digits_per_byte * digits_per_byte;
        (vm.string(format!("{digits:0>padded_len$}")), Signal::Normal)
    });

    // Loops `ceil(self)` times, optionally binding each iteration index to
    // `counterName` on the caller's locals; honors `break`/`continue` like
    // the control primitives (§4.5 "Numeric primitive").
    def(&proto, "repeat", |vm, target, locals, _definer, msg| {
        let n = match require(vm, target, msg) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let times = if n.is_finite() && n > 0.0 { n.ceil() as u64 } else { 0 };
        let (counter_name, body_index) = if msg.args.len() > 1 {
            (Some(msg.args[0].name.clone()), 1)
        } else {
            (None, 0)
        };
        let body = match msg.args.get(body_index) {
            Some(b) => b.clone(),
            None => return (vm.nil.clone(), Signal::Normal),
        };
        for i in 0..times {
            if vm.is_cancelled() {
                return crate::eval::raise_host(vm, crate::error::HostError::Cancelled);
            }
            if let Some(name) = &counter_name {
                locals.borrow_mut().set_local(name.clone(), vm.number(i as f64));
            }
            let (value, signal) = eval_chain(vm, locals, locals, &body);
            match signal {
                Signal::Normal | Signal::Continue => {}
                Signal::Break => return (value, Signal::Normal),
                other => return (value, other),
            }
        }
        (vm.nil.clone(), Signal::Normal)
    });

    for (name, pred) in CHAR_CLASS_PREDICATES.iter().copied() {
        def(&proto, name, move |vm, target, _locals, _definer, msg| {
            let n = match require(vm, target, msg) {
                Ok(n) => n,
                Err(e) => return e,
            };
            let matched = char::from_u32(n as u32).is_some_and(pred);
            (vm.boolean(matched), Signal::Normal)
        });
    }
}

fn unary(vm: &Vm, target: &ObjectRef, msg: &MessageRef, f: fn(f64) -> f64) -> EvalResult {
    let n = match require(vm, target, msg) {
        Ok(n) => n,
        Err(e) => return e,
    };
    (vm.number(f(n)), Signal::Normal)
}

/// Formats `n`'s 64-bit integer truncation in `radix`, lowercase digits.
fn to_base(n: i64, radix: u32) -> String {
    if n == 0 {
        return "0".to_owned();
    }
    let negative = n < 0;
    let mut n = n.unsigned_abs();
    let mut digits = Vec::new();
    while n > 0 {
        let d = (n % radix as u64) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('0'));
        n /= radix as u64;
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

const CHAR_CLASS_PREDICATES: &[(&str, fn(char) -> bool)] = &[
    ("isDigit", |c| c.is_ascii_digit()),
    ("isLetter", |c| c.is_alphabetic()),
    ("isSpace", |c| c.is_whitespace()),
    ("isUppercase", |c| c.is_uppercase()),
    ("isLowercase", |c| c.is_lowercase()),
    ("isPunctuation", |c| c.is_ascii_punctuation()),
    ("isControl", |c| c.is_control()),
];

/// Renders integral Numbers without a trailing `.0`, matching how the
/// Language prints numeric literals back (§8 invariant 5's round-trip).
pub(super) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
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
    fn bitwise_and_shift_operate_on_the_64_bit_truncation() {
        assert_eq!(eval("6 bitwiseAnd(3)"), "Number(2)");
        assert_eq!(eval("5 bitwiseOr(2)"), "Number(7)");
        assert_eq!(eval("5 bitwiseXor(1)"), "Number(4)");
        assert_eq!(eval("1 shiftLeft(4)"), "Number(16)");
        assert_eq!(eval("16 shiftRight(4)"), "Number(1)");
    }

    #[test]
    fn clip_and_between() {
        assert_eq!(eval("10 clip(0, 5)"), "Number(5)");

        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "3 between(0, 5)").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert!(std::rc::Rc::ptr_eq(&value, &vm.true_obj));
    }

    #[test]
    fn factorial_and_to_base() {
        assert_eq!(eval("5 factorial"), "Number(120)");
        assert_eq!(eval("255 toBase(16)"), "String(\"ff\")");
        assert_eq!(eval("5 toBaseWholeBytes(2)"), "String(\"00000101\")");
    }

    #[test]
    fn repeat_accumulates_with_a_counter() {
        assert_eq!(eval("sum := 0; 3 repeat(i, sum := sum + i); sum"), "Number(3)");
    }

    #[test]
    fn as_uint32_buffer_has_exactly_four_bytes_even_when_one_is_non_ascii() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "200 asUint32Buffer").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        match &value.borrow().payload {
            Some(crate::object::Payload::Buffer(bytes)) => {
                assert_eq!(bytes, &[200u8, 0, 0, 0]);
            }
            _ => panic!("expected a Buffer payload, got a {}", value.borrow().type_name()),
        }
    }

    #[test]
    fn as_buffer_pads_or_truncates_to_the_requested_byte_count() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "1 asBuffer(2)").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        match &value.borrow().payload {
            Some(crate::object::Payload::Buffer(bytes)) => assert_eq!(bytes.len(), 2),
            _ => panic!("expected a Buffer payload, got a {}", value.borrow().type_name()),
        }
    }
}
