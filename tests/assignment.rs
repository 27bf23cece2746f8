use weft::{config::VmConfig, do_string, get_slot, object::print_literal, vm::Vm};

/// `a := 5; a + 1` evaluates to `6` and leaves `a` bound to `5` on the
/// target it ran against (§8 scenario 2).
#[test]
fn walrus_binds_the_target_and_returns_the_expression_value() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(&vm, "a := 5; a + 1").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(6)");

    let a = get_slot(&vm, &vm.lobby, "a").expect("a should be bound on the lobby");
    assert_eq!(print_literal(&a), "Number(5)");
}
