//! Constraint session: one engine context, its declared variables, and the
//! assertions made so far.

use bitsolve_engine::{AnyEngine, BuiltinEngine, Engine, QueryOutcome};
use tracing::{debug, trace, Level};

use crate::compiler::ast::Expr;
use crate::compiler::lower::Lowerer;
use crate::compiler::parser::parse_expression;
use crate::config::SessionConfig;
use crate::decode::{decode, DecodedValue, Signedness};
use crate::registry::Registry;
use crate::Error;

/// Owns an engine context for its whole lifetime.
///
/// Assertions only accumulate; there is no retraction.  Dropping the session
/// releases the context.
pub struct Session<E: Engine> {
    engine: E,
    registry: Registry<E::Term>,
    assertions: usize,
}

impl<E: Engine> Session<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, &SessionConfig::default())
    }

    /// Only `initial_width` is read here; the engine is already built.
    pub fn with_config(engine: E, config: &SessionConfig) -> Self {
        debug!(engine = engine.name(), initial_width = config.initial_width, "session opened");
        Self {
            engine,
            registry: Registry::new(config.initial_width),
            assertions: 0,
        }
    }

    // ── Variables ──

    /// Declare a `width`-bit variable and return its term.
    pub fn declare(&mut self, name: &str, width: u32) -> Result<E::Term, Error> {
        Ok(self.registry.declare(&mut self.engine, name, width)?.term.clone())
    }

    pub fn resolve(&self, name: &str) -> Result<E::Term, Error> {
        Ok(self.registry.resolve(name)?)
    }

    pub fn registry(&self) -> &Registry<E::Term> {
        &self.registry
    }

    /// Width given to literals: the widest declaration so far, or the
    /// configured initial width if that is larger.
    pub fn default_width(&self) -> u32 {
        self.registry.default_width()
    }

    // ── Constraints ──

    /// Lower `expr` without asserting it.
    pub fn compile(&mut self, expr: &Expr) -> Result<E::Term, Error> {
        let term = Lowerer::new(&mut self.engine, &self.registry).lower(expr)?;
        if tracing::enabled!(Level::TRACE) {
            if let Ok(rendered) = self.engine.stringify(&term) {
                trace!(term = %rendered, "compiled expression");
            }
        }
        Ok(term)
    }

    pub fn assert(&mut self, term: &E::Term) -> Result<(), Error> {
        self.engine.assert_formula(term)?;
        self.assertions += 1;
        debug!(assertions = self.assertions, "asserted formula");
        Ok(())
    }

    /// Compile and assert an already parsed expression.
    pub fn add(&mut self, expr: &Expr) -> Result<E::Term, Error> {
        let term = self.compile(expr)?;
        self.assert(&term)?;
        Ok(term)
    }

    /// Parse, compile and assert `source`.
    pub fn add_from_source(&mut self, source: &str) -> Result<E::Term, Error> {
        let expr = parse_expression(source)?;
        self.add(&expr)
    }

    /// Number of formulas asserted, including the `true` added by each solve.
    pub fn assertion_count(&self) -> usize {
        self.assertions
    }

    // ── Solving ──

    /// Values of `terms` in a model of the assertions, read as unsigned
    /// integers at the session's default width.
    pub fn solve(&mut self, terms: &[E::Term]) -> Result<Vec<u64>, Error> {
        Ok(self
            .solve_with(terms, Signedness::Unsigned)?
            .into_iter()
            .map(DecodedValue::as_bits)
            .collect())
    }

    /// Like [`Session::solve`], reading values as two's complement.
    pub fn signed_solve(&mut self, terms: &[E::Term]) -> Result<Vec<i64>, Error> {
        Ok(self
            .solve_with(terms, Signedness::Signed)?
            .into_iter()
            .map(|v| v.as_bits() as i64)
            .collect())
    }

    fn solve_with(
        &mut self,
        terms: &[E::Term],
        signedness: Signedness,
    ) -> Result<Vec<DecodedValue>, Error> {
        let t = self.engine.true_term()?;
        self.assert(&t)?;

        // The assertions are satisfiable iff `false` is not valid under them.
        let f = self.engine.false_term()?;
        let outcome = self.engine.query(&f)?;
        debug!(?outcome, engine = self.engine.name(), "queried false");
        if outcome == QueryOutcome::Valid {
            return Err(Error::Unsatisfiable);
        }

        let model = self.engine.model()?;
        let width = self.registry.default_width();
        terms
            .iter()
            .map(|term| -> Result<DecodedValue, Error> {
                let native = self.engine.project(&model, term)?;
                Ok(decode(&native, width, signedness)?)
            })
            .collect()
    }

    // ── Inspection ──

    pub fn term_to_string(&self, term: &E::Term) -> Result<String, Error> {
        Ok(self.engine.stringify(term)?)
    }

    pub fn bit_width(&self, term: &E::Term) -> Result<u32, Error> {
        Ok(self.engine.bit_width(term)?)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl Session<BuiltinEngine> {
    /// Session on a fresh builtin engine with default settings.
    pub fn builtin() -> Self {
        Self::new(BuiltinEngine::new())
    }
}

impl Session<AnyEngine> {
    /// Build the engine named by `config.engine` and open a session on it.
    pub fn from_config(config: &SessionConfig) -> Result<Self, Error> {
        let engine = AnyEngine::create(config.engine, config.search_limit, &config.z3_path)?;
        Ok(Self::with_config(engine, config))
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        debug!(
            engine = self.engine.name(),
            assertions = self.assertions,
            "session closed, releasing engine context"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileError;
    use bitsolve_engine::EngineKind;

    #[test]
    fn new_session_is_empty() {
        let session = Session::builtin();
        assert_eq!(session.default_width(), 0);
        assert_eq!(session.assertion_count(), 0);
        assert!(session.registry().is_empty());
        assert_eq!(session.engine().name(), "builtin");
    }

    #[test]
    fn solve_with_no_assertions() {
        let mut session = Session::builtin();
        let x = session.declare("x", 8).unwrap();
        let values = session.solve(&[x]).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(session.assertion_count(), 1);
    }

    #[test]
    fn add_counts_assertions() {
        let mut session = Session::builtin();
        session.declare("x", 8).unwrap();
        session.add_from_source("x > 3").unwrap();
        session.add_from_source("x < 5").unwrap();
        assert_eq!(session.assertion_count(), 2);
        let x = session.resolve("x").unwrap();
        assert_eq!(session.solve(&[x]).unwrap(), vec![4]);
    }

    #[test]
    fn compile_does_not_assert() {
        let mut session = Session::builtin();
        session.declare("x", 8).unwrap();
        let expr = parse_expression("x == 1").unwrap();
        let t = session.compile(&expr).unwrap();
        assert_eq!(session.assertion_count(), 0);
        assert_eq!(session.term_to_string(&t).unwrap(), "(= x (_ bv1 8))");
    }

    #[test]
    fn asserting_bitvector_term_fails() {
        let mut session = Session::builtin();
        let err = session.add_from_source("1").unwrap_err();
        // literal at width 0
        assert!(matches!(err, Error::Engine(_)));
        session.declare("x", 8).unwrap();
        let err = session.add_from_source("x + 1").unwrap_err();
        assert!(matches!(err, Error::Engine(_)));
        assert_eq!(session.assertion_count(), 0);
    }

    #[test]
    fn compile_errors_are_surfaced() {
        let mut session = Session::builtin();
        session.declare("x", 8).unwrap();
        assert!(matches!(
            session.add_from_source("x == y"),
            Err(Error::Compile(CompileError::UnboundVariable(ref n))) if n == "y"
        ));
        assert!(matches!(session.add_from_source("x =="), Err(Error::Parse(_))));
    }

    #[test]
    fn from_config_honours_initial_width() {
        let config = SessionConfig {
            initial_width: 32,
            search_limit: 1 << 12,
            ..SessionConfig::default()
        };
        let mut session = Session::from_config(&config).unwrap();
        assert_eq!(session.engine().kind(), EngineKind::Builtin);
        assert_eq!(session.default_width(), 32);
        session.declare("x", 8).unwrap();
        assert_eq!(session.default_width(), 32);
    }
}
