//! Duration primitive (§4.5): an opaque nanosecond count with unit
//! constructors/accessors, arithmetic, and comparison.

use crate::eval::eval_arg;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{Object, ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

fn require(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<i64, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Duration(ns)) => Ok(ns),
        _ => Err(type_error(vm, obj, "Duration", msg.position)),
    }
}

fn make(vm: &Vm, nanos: i64) -> ObjectRef {
    Object::with_payload(vec![vm.duration_proto.clone()], Payload::Duration(nanos))
}

fn arg_number(vm: &Vm, locals: &ObjectRef, msg: &MessageRef, index: usize) -> Result<f64, EvalResult> {
    let (value, signal) = eval_arg(vm, locals, msg, index);
    if !signal.is_normal() {
        return Err((value, signal));
    }
    match value.borrow().payload.clone() {
        Some(Payload::Number(n)) => Ok(n),
        _ => Err(type_error(vm, &value, "Number", msg.position)),
    }
}

/// Calendar-agnostic breakdown used by the accessors and `%`-directives:
/// years count whole 365-day blocks, `days` is the remainder modulo 365.
struct Breakdown {
    sign: i64,
    years: i64,
    days: i64,
    hours: i64,
    minutes: i64,
    seconds: f64,
}

fn breakdown(ns: i64) -> Breakdown {
    let sign = if ns < 0 { -1 } else { 1 };
    let mut remaining = (ns.unsigned_abs() as f64) / NANOS_PER_SECOND;
    let years = (remaining / (365.0 * 86_400.0)) as i64;
    remaining -= years as f64 * 365.0 * 86_400.0;
    let days = (remaining / 86_400.0) as i64;
    remaining -= days as f64 * 86_400.0;
    let hours = (remaining / 3600.0) as i64;
    remaining -= hours as f64 * 3600.0;
    let minutes = (remaining / 60.0) as i64;
    remaining -= minutes as f64 * 60.0;
    Breakdown {
        sign,
        years,
        days,
        hours,
        minutes,
        seconds: remaining,
    }
}

fn compose(b: &Breakdown) -> i64 {
    let seconds_total = b.years as f64 * 365.0 * 86_400.0
        + b.days as f64 * 86_400.0
        + b.hours as f64 * 3600.0
        + b.minutes as f64 * 60.0
        + b.seconds;
    b.sign * (seconds_total * NANOS_PER_SECOND) as i64
}

fn format_duration(fmt: &str, b: &Breakdown) -> String {
    let mut out = String::new();
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('Y') => out.push_str(&(b.sign * b.years).to_string()),
            Some('y') => out.push_str(&format!("{:04}", b.years)),
            Some('d') => out.push_str(&format!("{:02}", b.days)),
            Some('H') => out.push_str(&format!("{:02}", b.hours)),
            Some('M') => out.push_str(&format!("{:02}", b.minutes)),
            Some('S') => out.push_str(&format!("{:09.6}", b.seconds)),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

/// Installs a slot with three modes, mirroring the real language's
/// `Duration days`/`Duration days(5)` dual-purpose accessors:
///  - sent to a Duration instance with no args: reads the breakdown component.
///  - sent to a Duration instance with one arg: rewrites that component in
///    place and returns the (mutated) receiver.
///  - sent to the bare `Duration` prototype with one arg (which carries no
///    payload of its own): acts as the unit constructor, building a fresh
///    Duration whose only nonzero component is this one.
fn component(
    vm: &Vm,
    proto: &ObjectRef,
    name: &str,
    get: impl Fn(&Breakdown) -> f64 + 'static,
    set: impl Fn(&mut Breakdown, f64) + 'static,
) {
    let _ = vm;
    def(proto, name, move |vm, target, locals, _definer, msg| {
        let existing = target.borrow().payload.clone();
        match existing {
            Some(Payload::Duration(ns)) if msg.args.is_empty() => {
                (vm.number(get(&breakdown(ns))), Signal::Normal)
            }
            Some(Payload::Duration(ns)) => {
                let value = match arg_number(vm, locals, msg, 0) {
                    Ok(n) => n,
                    Err(e) => return e,
                };
                let mut b = breakdown(ns);
                set(&mut b, value);
                let updated = compose(&b);
                target.borrow_mut().payload = Some(Payload::Duration(updated));
                (target.clone(), Signal::Normal)
            }
            _ => {
                let value = match arg_number(vm, locals, msg, 0) {
                    Ok(n) => n,
                    Err(e) => return e,
                };
                let mut b = breakdown(0);
                set(&mut b, value);
                (make(vm, compose(&b)), Signal::Normal)
            }
        }
    });
}

pub fn install(vm: &Vm) {
    let proto = vm.duration_proto.clone();

    component(vm, &proto, "years", |b| (b.sign * b.years) as f64, |b, v| b.years = v as i64);
    component(vm, &proto, "days", |b| b.days as f64, |b, v| b.days = v as i64);
    component(vm, &proto, "hours", |b| b.hours as f64, |b, v| b.hours = v as i64);
    component(vm, &proto, "minutes", |b| b.minutes as f64, |b, v| b.minutes = v as i64);
    component(vm, &proto, "seconds", |b| b.seconds, |b, v| b.seconds = v);

    def(&proto, "asSeconds", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (vm.number(ns as f64 / NANOS_PER_SECOND), Signal::Normal),
            Err(e) => e,
        }
    });
    // `asNumber`: total seconds as a float, same value as `asSeconds` under
    // the name the Duration primitive's own operand table uses (§4.5).
    def(&proto, "asNumber", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (vm.number(ns as f64 / NANOS_PER_SECOND), Signal::Normal),
            Err(e) => e,
        }
    });
    def(&proto, "asMinutes", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (vm.number(ns as f64 / (NANOS_PER_SECOND * 60.0)), Signal::Normal),
            Err(e) => e,
        }
    });
    def(&proto, "asHours", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (vm.number(ns as f64 / (NANOS_PER_SECOND * 3600.0)), Signal::Normal),
            Err(e) => e,
        }
    });
    def(&proto, "asDays", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (vm.number(ns as f64 / (NANOS_PER_SECOND * 86_400.0)), Signal::Normal),
            Err(e) => e,
        }
    });
    def(&proto, "asString", |vm, target, locals, _definer, msg| {
        let ns = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        if msg.args.is_empty() {
            return (vm.string(format!("{}s", ns as f64 / NANOS_PER_SECOND)), Signal::Normal);
        }
        let (fmt_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (fmt_obj, signal);
        }
        let fmt = match fmt_obj.borrow().payload.clone() {
            Some(Payload::Str(s)) => s,
            _ => return type_error(vm, &fmt_obj, "String", msg.position),
        };
        (vm.string(format_duration(&fmt, &breakdown(ns))), Signal::Normal)
    });
    def(&proto, "negate", |vm, target, _locals, _definer, msg| {
        match require(vm, target, msg) {
            Ok(ns) => (make(vm, -ns), Signal::Normal),
            Err(e) => e,
        }
    });

    def(&proto, "+", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        let rhs = match require(vm, &rhs_obj, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        (make(vm, lhs.saturating_add(rhs)), Signal::Normal)
    });
    def(&proto, "-", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        let rhs = match require(vm, &rhs_obj, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        (make(vm, lhs.saturating_sub(rhs)), Signal::Normal)
    });
    def(&proto, "*", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        let factor = match rhs_obj.borrow().payload.clone() {
            Some(Payload::Number(n)) => n,
            _ => return type_error(vm, &rhs_obj, "Number", msg.position),
        };
        (make(vm, (lhs as f64 * factor) as i64), Signal::Normal)
    });

    // In-place variants: mutate the receiver's payload and return it, rather
    // than allocating a fresh Duration (§4.5 "Date/Duration mutation").
    def(&proto, "+=", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        let rhs = match require(vm, &rhs_obj, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let updated = lhs.saturating_add(rhs);
        target.borrow_mut().payload = Some(Payload::Duration(updated));
        (target.clone(), Signal::Normal)
    });
    def(&proto, "-=", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs_obj, signal);
        }
        let rhs = match require(vm, &rhs_obj, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let updated = lhs.saturating_sub(rhs);
        target.borrow_mut().payload = Some(Payload::Duration(updated));
        (target.clone(), Signal::Normal)
    });

    def(&proto, "==", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Equal)
    });
    def(&proto, "!=", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Equal)
    });
    def(&proto, "<", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Less)
    });
    def(&proto, "<=", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Greater)
    });
    def(&proto, ">", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Greater)
    });
    def(&proto, ">=", |vm, target, locals, _definer, msg| {
        duration_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Less)
    });
}

fn duration_cmp(
    vm: &Vm,
    target: &ObjectRef,
    locals: &ObjectRef,
    msg: &MessageRef,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> EvalResult {
    let lhs = match require(vm, target, msg) {
        Ok(ns) => ns,
        Err(e) => return e,
    };
    let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
    if !signal.is_normal() {
        return (rhs_obj, signal);
    }
    let rhs = match require(vm, &rhs_obj, msg) {
        Ok(ns) => ns,
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
    fn unit_constructors_and_as_conversions_round_trip() {
        assert_eq!(eval("Duration seconds(90) asMinutes"), "Number(1.5)");
        assert_eq!(eval("Duration hours(1) asSeconds"), "Number(3600)");
    }

    #[test]
    fn component_accessors_break_down_a_duration() {
        assert_eq!(eval("Duration seconds(3661) hours"), "Number(1)");
        assert_eq!(eval("Duration seconds(3661) minutes"), "Number(1)");
        assert_eq!(eval("Duration seconds(3661) seconds"), "Number(1)");
    }

    #[test]
    fn setter_mode_mutates_in_place_and_returns_self() {
        assert_eq!(eval("d := Duration seconds(0); d hours(2); d hours"), "Number(2)");
    }

    #[test]
    fn plus_equals_accumulates_in_place() {
        assert_eq!(eval("d := Duration seconds(1); d += Duration seconds(2); d asSeconds"), "Number(3)");
    }

    #[test]
    fn as_string_applies_format_directives() {
        assert_eq!(eval("Duration seconds(3661) asString(\"%H:%M:%S\")"), "String(\"01:01:01.000000\")");
    }
}
