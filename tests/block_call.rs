use weft::{config::VmConfig, do_string, object::print_literal, vm::Vm};

/// `b := block(n, n * 2); b call(21)` produces `42` (§8 scenario 4).
#[test]
fn calling_a_block_evaluates_its_body_with_bound_arguments() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(&vm, "b := block(n, n * 2); b call(21)").unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(42)");
}
