//! End-to-end tests for declaring, compiling, and solving through a session.

use std::path::PathBuf;

use bitsolve::engine::{EngineError, EngineKind, Z3ProcessEngine};
use bitsolve::{CompileError, Error, Expr, BinOp, ParseError, Session, SessionConfig, UnaryOp};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ════════════════════════════════════════════════════════════════════
// §1  Round trips
// ════════════════════════════════════════════════════════════════════

#[test]
fn session_literal_round_trip_unsigned() {
    init_tracing();
    for (width, value) in [(8u32, 0u64), (8, 1), (8, 200), (8, 255), (16, 40_000), (32, 0xDEAD_BEEF), (64, u64::MAX)] {
        let mut session = Session::builtin();
        let x = session.declare("x", width).unwrap();
        session.add_from_source(&format!("x == {}", value)).unwrap();
        assert_eq!(session.solve(&[x]).unwrap(), vec![value], "width {}", width);
    }
}

#[test]
fn session_literal_round_trip_signed() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("x == 0xFF").unwrap();
    assert_eq!(session.signed_solve(&[x]).unwrap(), vec![-1]);

    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("x == 127").unwrap();
    assert_eq!(session.signed_solve(&[x]).unwrap(), vec![127]);
}

#[test]
fn session_negated_literal_is_twos_complement() {
    let mut session = Session::builtin();
    let x = session.declare("x", 16).unwrap();
    session.add_from_source("x == -3").unwrap();
    assert_eq!(session.signed_solve(&[x]).unwrap(), vec![-3]);
    assert_eq!(session.solve(&[x]).unwrap(), vec![0xFFFD]);
}

// ════════════════════════════════════════════════════════════════════
// §2  Widths
// ════════════════════════════════════════════════════════════════════

#[test]
fn session_arithmetic_width_follows_left_operand() {
    let mut session = Session::builtin();
    session.declare("a", 8).unwrap();
    session.declare("b", 16).unwrap();
    let sum = session.compile(&bitsolve::parse_expression("a + b").unwrap()).unwrap();
    assert_eq!(session.bit_width(&sum).unwrap(), 8);
    let sum = session.compile(&bitsolve::parse_expression("b + a").unwrap()).unwrap();
    assert_eq!(session.bit_width(&sum).unwrap(), 16);
}

#[test]
fn session_default_width_is_monotonic() {
    let mut session = Session::builtin();
    let mut seen = Vec::new();
    for (name, width) in [("a", 8), ("b", 4), ("c", 16)] {
        session.declare(name, width).unwrap();
        seen.push(session.default_width());
    }
    assert_eq!(seen, vec![8, 8, 16]);
    let lit = session.compile(&Expr::int(3)).unwrap();
    assert_eq!(session.bit_width(&lit).unwrap(), 16);
}

#[test]
fn session_decodes_at_session_width() {
    let mut session = Session::builtin();
    let x = session.declare("x", 4).unwrap();
    session.declare("y", 16).unwrap();
    session.add_from_source("x == 15").unwrap();
    // read at 16 bits, so the 4-bit pattern is positive
    assert_eq!(session.signed_solve(&[x]).unwrap(), vec![15]);
}

#[test]
fn session_literal_too_wide_for_default_width() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    let err = session.add_from_source("x == 256").unwrap_err();
    assert!(matches!(
        err,
        Error::Compile(CompileError::LiteralOverflow { value: 256, width: 8 })
    ));
}

// ════════════════════════════════════════════════════════════════════
// §3  Unary `!`
// ════════════════════════════════════════════════════════════════════

#[test]
fn session_bang_asymmetry() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();

    let bare = session.compile(&Expr::unary(UnaryOp::Not, Expr::ident("x"))).unwrap();
    assert_eq!(session.term_to_string(&bare).unwrap(), "(bvnot x)");
    assert_eq!(session.bit_width(&bare).unwrap(), 8);

    let cmp = Expr::paren(Expr::binary(Expr::ident("x"), BinOp::Eq, Expr::int(1)));
    let boolean = session.compile(&Expr::unary(UnaryOp::Not, cmp)).unwrap();
    assert_eq!(session.term_to_string(&boolean).unwrap(), "(not (= x (_ bv1 8)))");
    assert!(matches!(session.bit_width(&boolean), Err(Error::Engine(EngineError::Sort(_)))));

    let err = session.add_from_source("!(x)").unwrap_err();
    assert!(matches!(err, Error::Engine(EngineError::Sort(_))));
}

#[test]
fn session_bitwise_not_solves() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("!x == 0xF0").unwrap();
    assert_eq!(session.solve(&[x]).unwrap(), vec![0x0F]);
}

// ════════════════════════════════════════════════════════════════════
// §4  Errors
// ════════════════════════════════════════════════════════════════════

#[test]
fn session_unbound_identifier() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    let err = session.add_from_source("x + z == 1").unwrap_err();
    assert!(matches!(err, Error::Compile(CompileError::UnboundVariable(ref n)) if n == "z"));
    assert_eq!(session.assertion_count(), 0);
}

#[test]
fn session_unsupported_operator() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    session.declare("y", 8).unwrap();
    let err = session.add_from_source("x &^ y == 0").unwrap_err();
    assert!(matches!(err, Error::Compile(CompileError::UnsupportedOperator { ref op, .. }) if op == "&^"));
}

#[test]
fn session_string_concatenation_is_unsupported() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    let err = session.add_from_source("\"a\" + \"b\" == x").unwrap_err();
    assert!(matches!(
        err,
        Error::Compile(CompileError::UnsupportedOperator { ref op, line: 1, col: 1 }) if op == "+ on strings"
    ));
    assert_eq!(session.assertion_count(), 0);
}

#[test]
fn session_deeply_nested_source_is_a_parse_error() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    let source = format!("{}x{} == 1", "(".repeat(10_000), ")".repeat(10_000));
    assert!(matches!(
        session.add_from_source(&source),
        Err(Error::Parse(ParseError::TooDeep { .. }))
    ));
    assert_eq!(session.assertion_count(), 0);
}

#[test]
fn session_unsatisfiable() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("x == 1").unwrap();
    session.add_from_source("x == 2").unwrap();
    assert!(matches!(session.solve(&[x]), Err(Error::Unsatisfiable)));
}

#[test]
fn session_unsigned_less_than_zero_is_unsatisfiable() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("x < 0").unwrap();
    assert!(matches!(session.signed_solve(&[x]), Err(Error::Unsatisfiable)));
}

#[test]
fn session_division_by_constant_zero() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    // accepted by the compiler, rejected when queried
    session.add_from_source("x / 0 == 1").unwrap();
    assert!(matches!(
        session.solve(&[x]),
        Err(Error::Engine(EngineError::DivisionByZero(_)))
    ));
}

#[test]
fn session_parse_error() {
    let mut session = Session::builtin();
    session.declare("x", 8).unwrap();
    assert!(matches!(session.add_from_source("x + (1"), Err(Error::Parse(_))));
    assert!(matches!(session.add_from_source("x == 1 2"), Err(Error::Parse(_))));
}

// ════════════════════════════════════════════════════════════════════
// §5  Solving
// ════════════════════════════════════════════════════════════════════

#[test]
fn session_modular_sum() {
    init_tracing();
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    let y = session.declare("y", 8).unwrap();
    session.add_from_source("x + y == 10").unwrap();
    let values = session.solve(&[x, y]).unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!((values[0] + values[1]) % 256, 10);
}

#[test]
fn session_values_follow_input_order() {
    let mut session = Session::builtin();
    let a = session.declare("a", 8).unwrap();
    let b = session.declare("b", 8).unwrap();
    session.add_from_source("a == 7 && b == 9").unwrap();
    assert_eq!(session.solve(&[b, a, b]).unwrap(), vec![9, 7, 9]);
    assert_eq!(session.solve(&[]).unwrap(), Vec::<u64>::new());
}

#[test]
fn session_mixed_constraints() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    let y = session.declare("y", 8).unwrap();
    session.add_from_source("x * 3 == 12 || x == 200").unwrap();
    session.add_from_source("y == (x << 1) | 1").unwrap();
    session.add_from_source("x % 2 == 0 && x >= 4 && x <= 100").unwrap();
    let values = session.solve(&[x, y]).unwrap();
    let (x, y) = (values[0], values[1]);
    assert_eq!((x * 3) % 256, 12);
    assert!((4..=100).contains(&x));
    assert_eq!(y, ((x << 1) | 1) & 0xFF);
}

#[test]
fn session_redeclared_variable_uses_new_binding() {
    let mut session = Session::builtin();
    let old = session.declare("x", 8).unwrap();
    session.add_from_source("x == 5").unwrap();
    let new = session.declare("x", 16).unwrap();
    session.add_from_source("x == 300").unwrap();
    assert_eq!(session.solve(&[old, new]).unwrap(), vec![5, 300]);
}

#[test]
fn session_repeated_solves_accumulate() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    session.add_from_source("x > 10").unwrap();
    let first = session.solve(&[x]).unwrap()[0];
    assert!(first > 10);
    session.add_from_source("x < 12").unwrap();
    assert_eq!(session.solve(&[x]).unwrap(), vec![11]);
    // the `true` added by each solve is counted
    assert_eq!(session.assertion_count(), 4);
}

#[test]
fn session_add_parsed_tree() {
    let mut session = Session::builtin();
    let x = session.declare("x", 8).unwrap();
    let expr = Expr::binary(
        Expr::binary(Expr::ident("x"), BinOp::Sub, Expr::int(1)),
        BinOp::Eq,
        Expr::int(255),
    );
    session.add(&expr).unwrap();
    assert_eq!(session.solve(&[x]).unwrap(), vec![0]);
}

#[test]
fn session_search_limit_exhaustion_is_reported() {
    let config = SessionConfig {
        search_limit: 64,
        ..SessionConfig::default()
    };
    let mut session = Session::from_config(&config).unwrap();
    let x = session.declare("x", 32).unwrap();
    session.add_from_source("x > 5 && x < 5").unwrap();
    assert!(matches!(
        session.solve(&[x]),
        Err(Error::Engine(EngineError::Inconclusive { .. }))
    ));
}

// ════════════════════════════════════════════════════════════════════
// §6  Z3 backend (skipped when z3 is not installed)
// ════════════════════════════════════════════════════════════════════

fn z3_config() -> Option<SessionConfig> {
    let path = PathBuf::from("z3");
    if !Z3ProcessEngine::is_available(&path) {
        return None;
    }
    Some(SessionConfig {
        engine: EngineKind::Z3,
        z3_path: path,
        ..SessionConfig::default()
    })
}

#[test]
fn session_z3_modular_sum() {
    let Some(config) = z3_config() else { return };
    let mut session = Session::from_config(&config).unwrap();
    let x = session.declare("x", 32).unwrap();
    let y = session.declare("y", 32).unwrap();
    session.add_from_source("x + y == 10 && x > 100").unwrap();
    let values = session.solve(&[x, y]).unwrap();
    assert_eq!(values[0].wrapping_add(values[1]) & 0xFFFF_FFFF, 10);
    assert!(values[0] > 100);
}

#[test]
fn session_z3_unsatisfiable() {
    let Some(config) = z3_config() else { return };
    let mut session = Session::from_config(&config).unwrap();
    let x = session.declare("x", 16).unwrap();
    session.add_from_source("x * 2 == 1").unwrap();
    assert!(matches!(session.solve(&[x]), Err(Error::Unsatisfiable)));
}

#[test]
fn session_z3_missing_binary() {
    let config = SessionConfig {
        engine: EngineKind::Z3,
        z3_path: PathBuf::from("/nonexistent/z3"),
        ..SessionConfig::default()
    };
    assert!(matches!(
        Session::from_config(&config),
        Err(Error::Engine(EngineError::Unavailable(_)))
    ));
}
