//! SMT-LIB2 rendering of arena terms and parsing of solver replies.
//!
//! SMT-LIB requires both operands of a bitvector operator to have the same
//! width, while the arena lets them differ (arithmetic truncates to the
//! explicit width, everything else zero-extends to the wider operand).  The
//! renderer inserts `zero_extend`/`extract` so that a process backend sees
//! exactly the semantics the builtin evaluator implements.

use crate::arena::{Node, TermArena, TermId};
use crate::{EngineError, Sort, TermOp};

/// How symbols are spelled in a rendered term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Naming {
    /// The names callers declared.  Readable, but two symbols may share one,
    /// and a name may shadow a builtin such as `and` or `bvadd`.
    Declared,
    /// `v<index>`: unique within the arena and never a reserved word or
    /// builtin function.  Used for every script sent to a solver.
    Indexed,
}

/// Render `id` as an SMT-LIB2 term with the declared symbol names.
pub fn render(arena: &TermArena, id: TermId) -> Result<String, EngineError> {
    render_as(arena, id, Naming::Declared)
}

pub fn render_as(arena: &TermArena, id: TermId, naming: Naming) -> Result<String, EngineError> {
    match arena.node(id)? {
        Node::Const { value } => {
            let width = arena.width(id)?;
            Ok(format!("(_ bv{} {})", value, width))
        }
        Node::Bool(b) => Ok(if *b { "true" } else { "false" }.to_string()),
        Node::Symbol { name } => Ok(match naming {
            Naming::Declared => quote_symbol(name),
            Naming::Indexed => format!("v{}", id.index()),
        }),
        Node::App { op, args } => {
            let op = *op;
            let parts = match op {
                _ if op.takes_width() => {
                    let width = arena.width(id)?;
                    args.iter()
                        .map(|a| coerce(arena, *a, width, naming))
                        .collect::<Result<Vec<_>, _>>()?
                }
                TermOp::BvAnd | TermOp::BvOr | TermOp::BvXor => {
                    let width = arena.width(id)?;
                    args.iter()
                        .map(|a| coerce(arena, *a, width, naming))
                        .collect::<Result<Vec<_>, _>>()?
                }
                TermOp::BvUlt | TermOp::BvUle | TermOp::BvUgt | TermOp::BvUge | TermOp::Eq => {
                    match (arena.sort(args[0])?, arena.sort(args[1])?) {
                        (Sort::BitVec(l), Sort::BitVec(r)) => {
                            let width = l.max(r);
                            vec![
                                coerce(arena, args[0], width, naming)?,
                                coerce(arena, args[1], width, naming)?,
                            ]
                        }
                        _ => args
                            .iter()
                            .map(|a| render_as(arena, *a, naming))
                            .collect::<Result<Vec<_>, _>>()?,
                    }
                }
                _ => args
                    .iter()
                    .map(|a| render_as(arena, *a, naming))
                    .collect::<Result<Vec<_>, _>>()?,
            };
            Ok(format!("({} {})", op, parts.join(" ")))
        }
    }
}

/// Render `id` adjusted to exactly `width` bits.
fn coerce(
    arena: &TermArena,
    id: TermId,
    width: u32,
    naming: Naming,
) -> Result<String, EngineError> {
    let own = arena.width(id)?;
    let inner = render_as(arena, id, naming)?;
    Ok(if own < width {
        format!("((_ zero_extend {}) {})", width - own, inner)
    } else if own > width {
        format!("((_ extract {} 0) {})", width - 1, inner)
    } else {
        inner
    })
}

fn quote_symbol(name: &str) -> String {
    let simple = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "~!@$%^&*_-+=<>.?/".contains(c))
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if simple && !name.is_empty() {
        name.to_string()
    } else {
        format!("|{}|", name)
    }
}

/// Build a complete validity-check script: declarations, every assertion,
/// the negated query formula, and a `get-value` for every declared symbol.
pub fn build_script(
    arena: &TermArena,
    assertions: &[TermId],
    formula: TermId,
) -> Result<String, EngineError> {
    let mut script = String::new();
    script.push_str("(set-option :produce-models true)\n");
    script.push_str("(set-logic QF_BV)\n");

    for sym in arena.symbols() {
        script.push_str(&format!(
            "(declare-const {} {})\n",
            render_as(arena, *sym, Naming::Indexed)?,
            arena.sort(*sym)?
        ));
    }

    for assertion in assertions {
        let term = render_as(arena, *assertion, Naming::Indexed)?;
        script.push_str(&format!("(assert {})\n", term));
    }
    let negated = render_as(arena, formula, Naming::Indexed)?;
    script.push_str(&format!("(assert (not {}))\n", negated));
    script.push_str("(check-sat)\n");

    let symbols = arena.symbols();
    if !symbols.is_empty() {
        let names = symbols
            .iter()
            .map(|s| render_as(arena, *s, Naming::Indexed))
            .collect::<Result<Vec<_>, _>>()?;
        script.push_str(&format!("(get-value ({}))\n", names.join(" ")));
    }
    script.push_str("(exit)\n");
    Ok(script)
}

/// Verdict line of a `check-sat` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckSat {
    Sat,
    Unsat,
    Unknown,
}

/// Split solver output into the `check-sat` verdict and the remaining text.
pub fn parse_check_sat(output: &str) -> Result<(CheckSat, &str), EngineError> {
    let trimmed = output.trim_start();
    let (first, rest) = match trimmed.find('\n') {
        Some(i) => (&trimmed[..i], &trimmed[i + 1..]),
        None => (trimmed, ""),
    };
    match first.trim() {
        "sat" => Ok((CheckSat::Sat, rest)),
        "unsat" => Ok((CheckSat::Unsat, rest)),
        "unknown" => Ok((CheckSat::Unknown, rest)),
        line if line.starts_with("(error") => Err(EngineError::Backend(line.to_string())),
        line => Err(EngineError::Process(format!("unexpected solver output: {}", line))),
    }
}

/// Minimal s-expression, enough for `get-value` replies.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Sexp {
    Atom(String),
    List(Vec<Sexp>),
}

fn parse_sexps(input: &str) -> Result<Vec<Sexp>, EngineError> {
    let mut stack: Vec<Vec<Sexp>> = vec![Vec::new()];
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '(' => stack.push(Vec::new()),
            ')' => {
                let done = stack
                    .pop()
                    .filter(|_| !stack.is_empty())
                    .ok_or_else(|| EngineError::Process("unbalanced `)` in reply".into()))?;
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::List(done));
                }
            }
            '|' => {
                let mut atom = String::new();
                for q in chars.by_ref() {
                    if q == '|' {
                        break;
                    }
                    atom.push(q);
                }
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::Atom(atom));
                }
            }
            c if c.is_whitespace() => {}
            c => {
                let mut atom = c.to_string();
                while let Some(&n) = chars.peek() {
                    if n == '(' || n == ')' || n.is_whitespace() {
                        break;
                    }
                    atom.push(n);
                    chars.next();
                }
                if let Some(top) = stack.last_mut() {
                    top.push(Sexp::Atom(atom));
                }
            }
        }
    }
    if stack.len() != 1 {
        return Err(EngineError::Process("unbalanced `(` in reply".into()));
    }
    Ok(stack.pop().unwrap_or_default())
}

/// Values of a `get-value` reply, in the order they were requested.
///
/// Handles `#x…`, `#b…`, `(_ bvN W)` and boolean values.
pub fn parse_values(reply: &str) -> Result<Vec<u64>, EngineError> {
    let mut values = Vec::new();
    for top in parse_sexps(reply)? {
        let Sexp::List(pairs) = top else {
            return Err(EngineError::Process(format!(
                "unexpected get-value reply: {}",
                reply.trim()
            )));
        };
        for pair in pairs {
            match pair {
                Sexp::List(items) if items.len() == 2 => values.push(value_of(&items[1])?),
                other => {
                    return Err(EngineError::Process(format!(
                        "malformed get-value entry: {:?}",
                        other
                    )))
                }
            }
        }
    }
    Ok(values)
}

fn value_of(sexp: &Sexp) -> Result<u64, EngineError> {
    match sexp {
        Sexp::Atom(a) if a == "true" => Ok(1),
        Sexp::Atom(a) if a == "false" => Ok(0),
        Sexp::Atom(a) => parse_bitvector_literal(a),
        Sexp::List(items) => match items.as_slice() {
            [Sexp::Atom(under), Sexp::Atom(bv), Sexp::Atom(_)] if under == "_" => bv
                .strip_prefix("bv")
                .and_then(|n| n.parse::<u64>().ok())
                .ok_or_else(|| EngineError::Process(format!("bad indexed literal `{}`", bv))),
            _ => Err(EngineError::Process(format!("unsupported value {:?}", sexp))),
        },
    }
}

/// Parse a single `#x…` / `#b…` literal.
pub fn parse_bitvector_literal(tok: &str) -> Result<u64, EngineError> {
    let parsed = if let Some(hex) = tok.strip_prefix("#x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = tok.strip_prefix("#b") {
        u64::from_str_radix(bin, 2)
    } else {
        return Err(EngineError::Process(format!("not a bitvector literal: {}", tok)));
    };
    parsed.map_err(|e| EngineError::Process(format!("bad bitvector literal `{}`: {}", tok, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_coerces_operand_widths() {
        let mut arena = TermArena::new();
        let a = arena.symbol("a", Sort::BitVec(8)).unwrap();
        let b = arena.symbol("b", Sort::BitVec(16)).unwrap();
        let sum = arena.apply(TermOp::BvAdd, Some(8), &[a, b]).unwrap();
        assert_eq!(
            render(&arena, sum).unwrap(),
            "(bvadd a ((_ extract 7 0) b))"
        );

        let cmp = arena.apply(TermOp::BvUlt, None, &[a, b]).unwrap();
        assert_eq!(
            render(&arena, cmp).unwrap(),
            "(bvult ((_ zero_extend 8) a) b)"
        );
    }

    #[test]
    fn render_boolean_structure() {
        let mut arena = TermArena::new();
        let x = arena.symbol("x", Sort::BitVec(8)).unwrap();
        let y = arena.symbol("y", Sort::BitVec(8)).unwrap();
        let eq = arena.apply(TermOp::Eq, None, &[x, y]).unwrap();
        let not = arena.apply(TermOp::Not, None, &[eq]).unwrap();
        assert_eq!(render(&arena, not).unwrap(), "(not (= x y))");

        let ten = arena.constant(8, 10).unwrap();
        assert_eq!(render(&arena, ten).unwrap(), "(_ bv10 8)");
    }

    #[test]
    fn render_redeclared_symbol() {
        let mut arena = TermArena::new();
        let first = arena.symbol("x", Sort::BitVec(8)).unwrap();
        let again = arena.symbol("x", Sort::BitVec(8)).unwrap();
        assert_eq!(render(&arena, again).unwrap(), "x");
        assert_eq!(render_as(&arena, first, Naming::Indexed).unwrap(), "v0");
        assert_eq!(render_as(&arena, again, Naming::Indexed).unwrap(), "v1");
    }

    #[test]
    fn script_shape() {
        let mut arena = TermArena::new();
        let x = arena.symbol("x", Sort::BitVec(4)).unwrap();
        let one = arena.constant(4, 1).unwrap();
        let eq = arena.apply(TermOp::Eq, None, &[x, one]).unwrap();
        let f = arena.boolean(false);
        let script = build_script(&arena, &[eq], f).unwrap();
        assert!(script.contains("(declare-const v0 (_ BitVec 4))"));
        assert!(script.contains("(assert (= v0 (_ bv1 4)))"));
        assert!(script.contains("(assert (not false))"));
        assert!(script.contains("(get-value (v0))"));
    }

    #[test]
    fn script_names_never_clash() {
        let mut arena = TermArena::new();
        let mut syms = Vec::new();
        for name in ["x!1", "x", "x", "and", "true", "bvadd"] {
            syms.push(arena.symbol(name, Sort::BitVec(8)).unwrap());
        }
        let sum = arena.apply(TermOp::BvAdd, Some(8), &[syms[0], syms[3]]).unwrap();
        let eq = arena.apply(TermOp::Eq, None, &[sum, syms[5]]).unwrap();
        let f = arena.boolean(false);
        let script = build_script(&arena, &[eq], f).unwrap();

        let declared: Vec<&str> = script
            .lines()
            .filter_map(|l| l.strip_prefix("(declare-const "))
            .filter_map(|rest| rest.split_whitespace().next())
            .collect();
        assert_eq!(declared, ["v0", "v1", "v2", "v3", "v4", "v5"]);
        assert!(script.contains("(assert (= (bvadd v0 v3) v5))"));
        assert!(script.contains("(get-value (v0 v1 v2 v3 v4 v5))"));
        assert!(!script.contains("x!1"));
        assert!(!script.contains("(declare-const and"));
    }

    #[test]
    fn check_sat_parsing() {
        let (verdict, rest) = parse_check_sat("sat\n((x #x0a))\n").unwrap();
        assert_eq!(verdict, CheckSat::Sat);
        assert_eq!(rest.trim(), "((x #x0a))");
        assert_eq!(parse_check_sat("unsat\n").unwrap().0, CheckSat::Unsat);
        assert!(matches!(
            parse_check_sat("(error \"line 1: bad\")"),
            Err(EngineError::Backend(_))
        ));
    }

    #[test]
    fn value_parsing() {
        let values = parse_values("((x #x0a)\n (y #b101)\n (z (_ bv7 3)))").unwrap();
        assert_eq!(values, vec![10, 5, 7]);
        let quoted = parse_values("((|true| #x01) (flag false))").unwrap();
        assert_eq!(quoted, vec![1, 0]);
        assert!(parse_bitvector_literal("#xzz").is_err());
        assert!(parse_values("((x #x01)").is_err());
    }
}
