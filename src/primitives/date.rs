//! Date primitive (§4.5): construction against the VM's configured default
//! zone or an explicit IANA name, component accessors, `strftime`-style
//! formatting, and the `Date - Date = Duration` / `Date + Duration = Date`
//! arithmetic duration.rs's half of this relationship depends on.

use chrono::{Datelike, Offset, Timelike};
use chrono_tz::Tz;

use crate::eval::eval_arg;
use crate::message::{EvalResult, MessageRef, Signal};
use crate::object::{DateValue, Object, ObjectRef, Payload};
use crate::vm::Vm;

use super::{def, type_error};

fn require(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<DateValue, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Date(d)) => Ok(d),
        _ => Err(type_error(vm, obj, "Date", msg.position)),
    }
}

fn require_duration(vm: &Vm, obj: &ObjectRef, msg: &MessageRef) -> Result<i64, EvalResult> {
    let payload = obj.borrow().payload.clone();
    match payload {
        Some(Payload::Duration(ns)) => Ok(ns),
        _ => Err(type_error(vm, obj, "Duration", msg.position)),
    }
}

fn make_date(vm: &Vm, instant: chrono::DateTime<Tz>) -> ObjectRef {
    Object::with_payload(vec![vm.date_proto.clone()], Payload::Date(DateValue { instant }))
}

pub fn install(vm: &Vm) {
    let proto = vm.date_proto.clone();

    // Sent to the `Date` prototype itself, not an instance: `Date now`.
    def(&proto, "now", |vm, _target, _locals, _definer, msg| {
        let tz = default_zone(vm, msg);
        (make_date(vm, chrono::Utc::now().with_timezone(&tz)), Signal::Normal)
    });
    def(&proto, "year", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.year() as f64)
    });
    def(&proto, "month", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.month() as f64)
    });
    def(&proto, "day", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.day() as f64)
    });
    def(&proto, "hour", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.hour() as f64)
    });
    def(&proto, "minute", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.minute() as f64)
    });
    def(&proto, "second", |vm, target, _locals, _definer, msg| {
        date_component(vm, target, msg, |d| d.instant.second() as f64)
    });

    // `asString(fmt?)`: default directive set mirrors strftime's
    // `"%Y-%m-%d %H:%M:%S %Z"`; `chrono` has no bare `%Z` without a zone
    // name table for every `Tz`, so the zone abbreviation is rendered via
    // `%Z` directly (chrono_tz supplies it) rather than `%z`'s numeric
    // offset.
    def(&proto, "asString", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        if msg.args.is_empty() {
            return (
                vm.string(d.instant.format("%Y-%m-%d %H:%M:%S %Z").to_string()),
                Signal::Normal,
            );
        }
        let (fmt_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (fmt_obj, signal);
        }
        let fmt = match fmt_obj.borrow().payload.clone() {
            Some(Payload::Str(s)) => s,
            _ => return type_error(vm, &fmt_obj, "String", msg.position),
        };
        (vm.string(d.instant.format(&fmt).to_string()), Signal::Normal)
    });
    // Alias kept for callers that prefer a name distinct from the default
    // conversion, same behavior as `asString(fmt)`.
    def(&proto, "format", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (fmt_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (fmt_obj, signal);
        }
        let fmt = match fmt_obj.borrow().payload.clone() {
            Some(Payload::Str(s)) => s,
            _ => return type_error(vm, &fmt_obj, "String", msg.position),
        };
        (vm.string(d.instant.format(&fmt).to_string()), Signal::Normal)
    });
    def(&proto, "asZone", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (name_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (name_obj, signal);
        }
        let name = match name_obj.borrow().payload.clone() {
            Some(Payload::Str(s)) => s,
            _ => return type_error(vm, &name_obj, "String", msg.position),
        };
        match name.parse::<Tz>() {
            Ok(tz) => (make_date(vm, d.instant.with_timezone(&tz)), Signal::Normal),
            Err(_) => crate::eval::raise(vm, format!("unknown time zone '{name}'"), msg.position),
        }
    });

    def(&proto, "+", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (rhs, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        let ns = match require_duration(vm, &rhs, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let instant = d.instant + chrono::Duration::nanoseconds(ns);
        (make_date(vm, instant), Signal::Normal)
    });
    def(&proto, "-", |vm, target, locals, _definer, msg| {
        let lhs = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (rhs, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        // `Date - Duration` gives a Date; `Date - Date` gives a Duration.
        if let Ok(ns) = require_duration(vm, &rhs, msg) {
            let instant = lhs.instant - chrono::Duration::nanoseconds(ns);
            return (make_date(vm, instant), Signal::Normal);
        }
        match require(vm, &rhs, msg) {
            Ok(other) => {
                let delta = lhs.instant - other.instant;
                let ns = delta.num_nanoseconds().unwrap_or(i64::MAX);
                (
                    Object::with_payload(vec![vm.duration_proto.clone()], Payload::Duration(ns)),
                    Signal::Normal,
                )
            }
            Err(e) => e,
        }
    });

    def(&proto, "+=", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (rhs, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        let ns = match require_duration(vm, &rhs, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let instant = d.instant + chrono::Duration::nanoseconds(ns);
        target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
        (target.clone(), Signal::Normal)
    });
    def(&proto, "-=", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (rhs, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (rhs, signal);
        }
        let ns = match require_duration(vm, &rhs, msg) {
            Ok(ns) => ns,
            Err(e) => return e,
        };
        let instant = d.instant - chrono::Duration::nanoseconds(ns);
        target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
        (target.clone(), Signal::Normal)
    });

    def(&proto, "setYear", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_year(v as i32))
    });
    def(&proto, "setMonth", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_month(v as u32))
    });
    def(&proto, "setDay", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_day(v as u32))
    });
    def(&proto, "setHour", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_hour(v as u32))
    });
    def(&proto, "setMinute", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_minute(v as u32))
    });
    def(&proto, "setSecond", |vm, target, locals, _definer, msg| {
        set_component(vm, target, locals, msg, |dt, v| dt.with_second(v as u32))
    });

    def(&proto, "convertToUTC", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let instant = d.instant.with_timezone(&chrono_tz::UTC);
        target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
        (target.clone(), Signal::Normal)
    });
    def(&proto, "convertToLocal", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let tz = default_zone(vm, msg);
        let instant = d.instant.with_timezone(&tz);
        target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
        (target.clone(), Signal::Normal)
    });
    def(&proto, "convertToLocation", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (name_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (name_obj, signal);
        }
        let name = match name_obj.borrow().payload.clone() {
            Some(Payload::Str(s)) => s,
            _ => return type_error(vm, &name_obj, "String", msg.position),
        };
        match name.parse::<Tz>() {
            Ok(tz) => {
                let instant = d.instant.with_timezone(&tz);
                target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
                (target.clone(), Signal::Normal)
            }
            Err(_) => crate::eval::raise(vm, format!("unknown time zone '{name}'"), msg.position),
        }
    });
    // `mw` is minutes *west* of UTC, the sign convention this slot uses
    // everywhere else — inverted from the usual east-positive offset. Since
    // `chrono_tz::Tz` only carries IANA zones, the nearest whole-hour
    // `Etc/GMT` zone is substituted (`Etc/GMT` offsets are POSIX-inverted:
    // `Etc/GMT-5` is UTC+5).
    def(&proto, "setGmtOffset", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let minutes_west = match arg_number(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let east_hours = (-minutes_west / 60.0).round() as i32;
        let name = match east_hours {
            0 => "Etc/GMT".to_owned(),
            h if h > 0 => format!("Etc/GMT-{h}"),
            h => format!("Etc/GMT+{}", -h),
        };
        match name.parse::<Tz>() {
            Ok(tz) => {
                let instant = d.instant.with_timezone(&tz);
                target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
                (target.clone(), Signal::Normal)
            }
            Err(_) => crate::eval::raise(vm, "gmt offset exceeds the Etc/GMT table", msg.position),
        }
    });
    def(&proto, "gmtOffset", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let secs_east = d.instant.offset().fix().local_minus_utc();
        (vm.string(format_gmt_offset(secs_east)), Signal::Normal)
    });
    def(&proto, "gmtOffsetSeconds", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let secs_east = d.instant.offset().fix().local_minus_utc();
        (vm.number(-(secs_east as f64)), Signal::Normal)
    });
    // Approximated by comparing the zone's current offset against its
    // offset six months away; no access to the tzdb's own DST flag through
    // `chrono_tz`.
    def(&proto, "isDST", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let six_months = d.instant + chrono::Duration::days(183);
        let now_offset = d.instant.offset().fix().local_minus_utc();
        let other_offset = six_months.offset().fix().local_minus_utc();
        (vm.boolean(now_offset > other_offset), Signal::Normal)
    });
    def(&proto, "isPast", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        (vm.boolean(d.instant < chrono::Utc::now()), Signal::Normal)
    });
    def(&proto, "secondsSince", |vm, target, locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let (other_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (other_obj, signal);
        }
        let other = match require(vm, &other_obj, msg) {
            Ok(o) => o,
            Err(e) => return e,
        };
        let delta = d.instant - other.instant;
        (vm.number(nanos_to_secs(delta)), Signal::Normal)
    });
    def(&proto, "secondsSinceNow", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let delta = d.instant - chrono::Utc::now();
        (vm.number(nanos_to_secs(delta)), Signal::Normal)
    });
    def(&proto, "copy", |vm, target, locals, _definer, msg| {
        let (other_obj, signal) = eval_arg(vm, locals, msg, 0);
        if !signal.is_normal() {
            return (other_obj, signal);
        }
        let other = match require(vm, &other_obj, msg) {
            Ok(o) => o,
            Err(e) => return e,
        };
        target.borrow_mut().payload = Some(Payload::Date(DateValue { instant: other.instant }));
        (target.clone(), Signal::Normal)
    });
    def(&proto, "clock", |vm, _target, _locals, _definer, _msg| {
        (vm.number(vm.clock()), Signal::Normal)
    });
    def(&proto, "cpuSecondsToRun", |vm, target, locals, _definer, msg| {
        let body = match msg.args.first() {
            Some(b) => b.clone(),
            None => return (vm.number(0.0), Signal::Normal),
        };
        let start = std::time::Instant::now();
        let (value, signal) = crate::eval::eval_chain(vm, target, locals, &body);
        if !signal.is_normal() {
            return (value, signal);
        }
        (vm.number(start.elapsed().as_secs_f64()), Signal::Normal)
    });
    def(&proto, "asNumber", |vm, target, _locals, _definer, msg| {
        let d = match require(vm, target, msg) {
            Ok(d) => d,
            Err(e) => return e,
        };
        let secs = d.instant.timestamp() as f64 + d.instant.timestamp_subsec_nanos() as f64 / 1e9;
        (vm.number(secs), Signal::Normal)
    });
    def(&proto, "fromNumber", |vm, _target, locals, _definer, msg| {
        let secs = match arg_number(vm, locals, msg, 0) {
            Ok(n) => n,
            Err(e) => return e,
        };
        let tz = default_zone(vm, msg);
        let whole = secs.floor() as i64;
        let nanos = ((secs - whole as f64) * 1e9).round() as u32;
        match chrono::DateTime::from_timestamp(whole, nanos) {
            Some(utc) => (make_date(vm, utc.with_timezone(&tz)), Signal::Normal),
            None => crate::eval::raise(vm, "fromNumber: timestamp out of range", msg.position),
        }
    });

    def(&proto, "==", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Equal)
    });
    def(&proto, "!=", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Equal)
    });
    def(&proto, "<", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Less)
    });
    def(&proto, "<=", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Greater)
    });
    def(&proto, ">", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o == std::cmp::Ordering::Greater)
    });
    def(&proto, ">=", |vm, target, locals, _definer, msg| {
        date_cmp(vm, target, locals, msg, |o| o != std::cmp::Ordering::Less)
    });
}

fn default_zone(vm: &Vm, msg: &MessageRef) -> Tz {
    vm.config.default_timezone.parse::<Tz>().unwrap_or_else(|_| {
        log::warn!(
            "configured default_timezone '{}' is not a recognized IANA zone at {}; using UTC",
            vm.config.default_timezone,
            msg.position
        );
        chrono_tz::UTC
    })
}

fn date_component(
    vm: &Vm,
    target: &ObjectRef,
    msg: &MessageRef,
    f: impl Fn(&DateValue) -> f64,
) -> EvalResult {
    match require(vm, target, msg) {
        Ok(d) => (vm.number(f(&d)), Signal::Normal),
        Err(e) => e,
    }
}

/// Evaluates `msg.args[index]` and unwraps a Number, for setters/converters
/// that take a plain numeric argument.
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

/// Applies `f` to the current instant's naive components, writing the
/// result back into `target` in place and returning it (§4.5's setter
/// convention for Date).
fn set_component(
    vm: &Vm,
    target: &ObjectRef,
    locals: &ObjectRef,
    msg: &MessageRef,
    f: impl Fn(&chrono::DateTime<Tz>, f64) -> Option<chrono::DateTime<Tz>>,
) -> EvalResult {
    let d = match require(vm, target, msg) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let value = match arg_number(vm, locals, msg, 0) {
        Ok(n) => n,
        Err(e) => return e,
    };
    match f(&d.instant, value) {
        Some(instant) => {
            target.borrow_mut().payload = Some(Payload::Date(DateValue { instant }));
            (target.clone(), Signal::Normal)
        }
        None => crate::eval::raise(vm, "date component out of range", msg.position),
    }
}

/// `(secs_east / 3600):(secs_east % 3600 / 60)` as `"+HHMM"`/`"-HHMM"`.
fn format_gmt_offset(secs_east: i32) -> String {
    let sign = if secs_east < 0 { '-' } else { '+' };
    let secs_east = secs_east.abs();
    format!("{sign}{:02}{:02}", secs_east / 3600, (secs_east % 3600) / 60)
}

fn nanos_to_secs(delta: chrono::Duration) -> f64 {
    delta.num_nanoseconds().unwrap_or(i64::MAX) as f64 / 1e9
}

fn date_cmp(
    vm: &Vm,
    target: &ObjectRef,
    locals: &ObjectRef,
    msg: &MessageRef,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> EvalResult {
    let lhs = match require(vm, target, msg) {
        Ok(d) => d,
        Err(e) => return e,
    };
    let (rhs_obj, signal) = eval_arg(vm, locals, msg, 0);
    if !signal.is_normal() {
        return (rhs_obj, signal);
    }
    let rhs = match require(vm, &rhs_obj, msg) {
        Ok(d) => d,
        Err(e) => return e,
    };
    (vm.boolean(accept(lhs.instant.cmp(&rhs.instant))), Signal::Normal)
}

#[cfg(test)]
mod tests {
    use crate::config::VmConfig;
    use crate::eval::eval_chain;
    use crate::vm::Vm;

    #[test]
    fn set_year_mutates_in_place_and_returns_self() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "d := Date now; d setYear(2000); d year").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(2000)");
    }

    #[test]
    fn from_number_and_as_number_round_trip() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(&vm, "(Date fromNumber(0)) asNumber").unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(0)");
    }

    #[test]
    fn seconds_since_a_duration_apart_date() {
        let vm = Vm::new(VmConfig::default());
        let root = crate::parser::parse(
            &vm,
            "a := Date fromNumber(100); b := Date fromNumber(40); a secondsSince(b)",
        )
        .unwrap();
        let (value, signal) = eval_chain(&vm, &vm.lobby, &vm.lobby, &root);
        assert!(signal.is_normal());
        assert_eq!(crate::object::print_literal(&value), "Number(60)");
    }
}
