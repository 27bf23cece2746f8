use weft::{config::VmConfig, do_string, object::print_literal, vm::Vm};

/// `1 + 2 * 3` must parse with `*` binding tighter than `+` (§8 scenario 1).
#[test]
fn multiplication_binds_tighter_than_addition() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(&vm, "1 + 2 * 3").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(7)");
}
