use weft::{config::VmConfig, do_string, object::print_literal, vm::Vm};

/// Dividing by zero yields IEEE `+inf`, not an exception, so a wrapping
/// `try`/`catch` never invokes the handler; an actually-undefined slot does
/// raise and is recovered by the same `catch` shape (§8 scenario 5).
#[test]
fn division_by_zero_is_infinity_not_an_exception() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(&vm, "try(1 / 0) catch(Exception, e, \"caught\")").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(inf)");
}

#[test]
fn an_undefined_slot_send_is_caught() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) =
        do_string(&vm, "try(Object undefinedSlot) catch(Exception, e, \"caught\")").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "String(\"caught\")");
}
