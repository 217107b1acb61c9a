//! The public compilation surface, driven the way the CLI drives it.

use re2dfa::{compile, Error, InputKind};

#[test]
fn compiles_a_realistic_expression() {
    let source = compile(
        r"^(\+1 )?[0-9]{3}-[0-9]{3}-[0-9]{4}$",
        "matchers",
        "phone_number",
        InputKind::Str,
    )
    .unwrap();

    assert!(source.starts_with("// Code generated by re2dfa. DO NOT EDIT."));
    assert!(source.contains("pub mod matchers"));
    assert!(source.contains("pub fn phone_number(s: &str) -> isize"));
    // anchors at both ends: begin-text test and end-text test
    assert!(source.contains("i == 0"));
    assert!(source.contains("i == s.len()"));
}

#[test]
fn both_input_kinds_share_semantics() {
    let for_str = compile("a[0-9]*", "m", "f", InputKind::Str).unwrap();
    let for_bytes = compile("a[0-9]*", "m", "f", InputKind::Bytes).unwrap();

    assert!(for_str.contains("pub fn f(s: &str) -> isize"));
    assert!(for_bytes.contains("pub fn f(s: &[u8]) -> isize"));

    // the state machines are identical once the input is reborrowed
    let tail_of = |s: &str| {
        let at = s.find("loop {").unwrap();
        return s[at..].to_string();
    };
    assert_eq!(tail_of(&for_str), tail_of(&for_bytes));
}

#[test]
fn errors_carry_their_cause() {
    let err = compile("(a", "m", "f", InputKind::Str).unwrap_err();
    assert!(matches!(err, Error::Parse(_)));
    assert!(err.to_string().starts_with("invalid regular expression:"));

    let err = compile("a", "mod", "f", InputKind::Str).unwrap_err();
    assert!(matches!(err, Error::InvalidIdentifier(_)));

    let err = "[]byte".parse::<InputKind>().unwrap_err();
    assert!(matches!(err, Error::InvalidInputKind(_)));
}
