use weft::{config::VmConfig, do_string, object::print_literal, vm::Vm};

/// `Object clone do(x := 1) x` produces `1` (§8 scenario 3): `do` runs its
/// body with the clone as both target and locals before the chain continues
/// the `x` lookup against that same clone.
#[test]
fn do_evaluates_its_body_against_the_receiver() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(&vm, "Object clone do(x := 1) x").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(1)");
}
