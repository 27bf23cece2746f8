use weft::{config::VmConfig, do_string, object::print_literal, vm::Vm};

/// Two Dates an hour apart subtract to a Duration whose `asSeconds` is
/// `3600.0` (§8 scenario 6).
#[test]
fn subtracting_an_hour_apart_dates_yields_a_one_hour_duration() {
    let vm = Vm::new(VmConfig::default());
    let (value, signal) = do_string(
        &vm,
        "a := Date fromNumber(3600); b := Date fromNumber(0); (a - b) asSeconds",
    )
    .unwrap();
    assert!(signal.is_normal());
    assert_eq!(print_literal(&value), "Number(3600)");
}
