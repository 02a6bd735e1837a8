// Behavioural properties of the interpreter, exercised through the public API
//
// These tests verify:
// - Reader output survives a print/re-read round trip
// - Special forms enforce their arity
// - Only nil is false
// - Arithmetic folds and their identities
// - define overwrites, unbound lookups fail by name
// - Malformed input is rejected by the reader

#![expect(clippy::unwrap_used)] // test code OK

use minilisp::ast::to_display_string;
use minilisp::{Error, ParseErrorKind, SymbolTable, Value, create_global_env, parse};
use proptest::prelude::*;

/// Evaluate source in a fresh global environment
fn eval(source: &str) -> Result<Value, Error> {
    create_global_env().eval_str(source)
}

fn parse_fresh(source: &str) -> Result<Value, Error> {
    let mut symbols = SymbolTable::new();
    parse(source, &mut symbols)
}

fn parse_error_kind(source: &str) -> Option<ParseErrorKind> {
    match parse_fresh(source) {
        Err(Error::ParseError(e)) => Some(e.kind),
        _ => None,
    }
}

// ============================================================================
// 1. Evaluation Properties
// ============================================================================

#[test]
fn special_form_arity_is_checked() {
    for source in ["(if 1 2)", "(if 1 2 3 4)", "(define x)", "(define x 1 2)"] {
        let result = eval(source);
        assert!(
            matches!(result, Err(Error::ArityError { .. })),
            "{source} should be an arity error, got {result:?}"
        );
    }
}

#[test]
fn only_nil_is_false() {
    let cases = [
        ("(if nil 1 2)", 2),
        ("(if 0 1 2)", 1),
        ("(if t 1 2)", 1),
        ("(if (if nil 1 nil) 1 2)", 2),
        ("(if + 1 2)", 1),
    ];
    for (source, expected) in cases {
        assert_eq!(eval(source), Ok(Value::number(expected)), "{source}");
    }
}

#[test]
fn arithmetic_folds() {
    let cases = [
        ("(+)", 0),
        ("(*)", 1),
        ("(- 5)", 5),
        ("(- 5 3 1)", 1),
        ("(/ 10 2 5)", 1),
        ("(+ 1 2 3 4)", 10),
        ("(* 2 (+ 1 2))", 6),
    ];
    for (source, expected) in cases {
        assert_eq!(eval(source), Ok(Value::number(expected)), "{source}");
    }
    assert_eq!(eval("(/ 7 0)"), Err(Error::DivisionByZero));
}

#[test]
fn define_overwrites_binding() {
    let mut env = create_global_env();
    assert_eq!(env.eval_str("(define x 5)"), Ok(Value::nil()));
    assert_eq!(env.eval_str("x"), Ok(Value::number(5)));
    assert_eq!(env.eval_str("(define x 6)"), Ok(Value::nil()));
    assert_eq!(env.eval_str("x"), Ok(Value::number(6)));
}

#[test]
fn failed_define_commits_nothing() {
    let mut env = create_global_env();
    assert!(matches!(
        env.eval_str("(define z (+ 1 nil))"),
        Err(Error::TypeError(_))
    ));
    assert_eq!(env.get_by_name("z"), None);
}

#[test]
fn unbound_variable_is_named() {
    assert_eq!(eval("y"), Err(Error::UnboundVariable("y".into())));
    let message = eval("(+ 1 y)").map_err(|e| e.to_string());
    assert_eq!(message, Err("Unbound variable: y".to_owned()));
}

#[test]
fn improper_call_is_type_error() {
    match eval("(+ 1 . 2)") {
        Err(Error::TypeError(msg)) => assert!(msg.contains("improper list"), "{msg}"),
        other => panic!("expected TypeError, got {other:?}"),
    }
}

// ============================================================================
// 2. Reader Properties
// ============================================================================

#[test]
fn malformed_input_is_rejected() {
    let cases = [
        ("(1 2", ParseErrorKind::Incomplete),
        (")", ParseErrorKind::InvalidSyntax),
        ("(. 1)", ParseErrorKind::InvalidSyntax),
        ("(1 . 2 3)", ParseErrorKind::InvalidSyntax),
        ("(1 .", ParseErrorKind::Incomplete),
        ("99999999999999999999", ParseErrorKind::ImplementationLimit),
    ];
    for (source, expected) in cases {
        assert_eq!(parse_error_kind(source), Some(expected), "{source}");
    }
}

#[test]
fn interning_is_stable() {
    let mut symbols = SymbolTable::new();
    let abc = symbols.intern("abc");
    assert_eq!(symbols.intern("abc"), abc);
    let xyz = symbols.intern("xyz");
    assert_ne!(abc, xyz);
}

// ============================================================================
// 3. Round Trip
// ============================================================================

fn atom_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (0i64..1_000_000_000_000).prop_map(|n| n.to_string()),
        "[a-z+*/<>=!?-][a-z0-9+*/<>=!?-]{0,6}",
    ]
}

/// Source text for an atom or a (possibly nested) proper list
fn expr_text() -> impl Strategy<Value = String> {
    atom_text().prop_recursive(4, 32, 6, |inner| {
        prop::collection::vec(inner, 0..6).prop_map(|items| format!("({})", items.join(" ")))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn printed_value_reads_back_equal(text in expr_text()) {
        let mut symbols = SymbolTable::new();
        let value = parse(&text, &mut symbols);
        prop_assert!(value.is_ok(), "failed to parse {}: {:?}", text, value);
        let value = value.unwrap();

        let printed = to_display_string(&value, &symbols);
        let reread = parse(&printed, &mut symbols);
        prop_assert!(reread.is_ok(), "failed to re-read {}: {:?}", printed, reread);
        let reread = reread.unwrap();

        prop_assert_eq!(&reread, &value);
        prop_assert_eq!(to_display_string(&reread, &symbols), printed);
    }
}

