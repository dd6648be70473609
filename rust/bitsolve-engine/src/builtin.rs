//! In-process reference engine.
//!
//! Handles validity queries over the arena by searching for a
//! counterexample directly:
//!
//! - If the product of all symbol domains fits in `search_limit`, every
//!   assignment is enumerated and the answer is exact in both directions.
//! - Otherwise each symbol gets a seeded candidate set (boundary values plus
//!   every constant mentioned in the formulas, its neighbours and its two's
//!   complement).  A hit proves `Invalid`; exhausting the candidates without
//!   one is reported as [`EngineError::Inconclusive`] rather than claiming
//!   validity.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use crate::arena::{mask, Assignment, Node, TermArena, TermId};
use crate::{smtlib, Engine, EngineError, QueryOutcome, Sort, TermOp};

/// Default number of assignments tried before giving up.
pub const DEFAULT_SEARCH_LIMIT: u64 = 1 << 20;

#[derive(Debug)]
pub struct BuiltinEngine {
    arena: TermArena,
    assertions: Vec<TermId>,
    search_limit: u64,
    last_model: Option<Assignment>,
}

impl BuiltinEngine {
    pub fn new() -> Self {
        Self::with_search_limit(DEFAULT_SEARCH_LIMIT)
    }

    pub fn with_search_limit(search_limit: u64) -> Self {
        Self {
            arena: TermArena::new(),
            assertions: Vec::new(),
            search_limit: search_limit.max(1),
            last_model: None,
        }
    }

    pub fn arena(&self) -> &TermArena {
        &self.arena
    }

    pub fn assertions(&self) -> &[TermId] {
        &self.assertions
    }

    /// Look for an assignment satisfying every assertion and falsifying
    /// `formula`.
    fn search(&self, formula: TermId) -> Result<Search, EngineError> {
        let mut roots = self.assertions.clone();
        roots.push(formula);
        let symbols = self.arena.symbols_in(&roots)?;

        let widths = symbols
            .iter()
            .map(|s| match self.arena.sort(*s)? {
                Sort::BitVec(w) => Ok(w),
                Sort::Bool => Ok(1),
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        let space = widths.iter().try_fold(1u64, |acc, w| {
            if *w >= 64 {
                None
            } else {
                acc.checked_mul(1u64 << w)
            }
        });

        let exhaustive = matches!(space, Some(n) if n <= self.search_limit);
        let domains: Vec<Domain> = if exhaustive {
            widths.iter().map(|w| Domain::Full { width: *w }).collect()
        } else {
            let constants = self.arena.constants_in(&roots)?;
            widths
                .iter()
                .map(|w| Domain::Seeded(seeded_candidates(*w, &constants)))
                .collect()
        };
        debug!(
            symbols = symbols.len(),
            exhaustive,
            limit = self.search_limit,
            "builtin engine searching for counterexample"
        );

        let mut cursor = vec![0u64; domains.len()];
        let mut explored = 0u64;
        loop {
            if explored >= self.search_limit {
                return Ok(Search::GaveUp { explored });
            }
            explored += 1;

            let mut assignment = Assignment::new();
            for (i, sym) in symbols.iter().enumerate() {
                assignment.insert(*sym, domains[i].value(cursor[i]));
            }
            if self.is_counterexample(&assignment, formula)? {
                trace!(explored, "counterexample found");
                return Ok(Search::Found(assignment));
            }

            // odometer step
            let mut pos = 0;
            loop {
                if pos == cursor.len() {
                    return Ok(if exhaustive {
                        Search::Exhausted
                    } else {
                        Search::GaveUp { explored }
                    });
                }
                cursor[pos] += 1;
                if cursor[pos] < domains[pos].len() {
                    break;
                }
                cursor[pos] = 0;
                pos += 1;
            }
        }
    }

    fn is_counterexample(
        &self,
        assignment: &Assignment,
        formula: TermId,
    ) -> Result<bool, EngineError> {
        for assertion in &self.assertions {
            if !truth(self.arena.evaluate(*assertion, assignment)?) {
                return Ok(false);
            }
        }
        Ok(!truth(self.arena.evaluate(formula, assignment)?))
    }
}

impl Default for BuiltinEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Values one symbol ranges over during a search.
enum Domain {
    /// Every value of a symbol narrower than 64 bits, in order.  Never
    /// materialized: the cursor is the value.
    Full { width: u32 },
    Seeded(Vec<u64>),
}

impl Domain {
    fn len(&self) -> u64 {
        match self {
            Domain::Full { width } => mask(*width) + 1,
            Domain::Seeded(values) => values.len() as u64,
        }
    }

    fn value(&self, index: u64) -> u64 {
        match self {
            Domain::Full { .. } => index,
            Domain::Seeded(values) => values[index as usize],
        }
    }
}

enum Search {
    Found(Assignment),
    Exhausted,
    GaveUp { explored: u64 },
}

fn truth(value: crate::Value) -> bool {
    match value {
        crate::Value::Bool(b) => b,
        crate::Value::Bits { value, .. } => value != 0,
    }
}

/// Candidate values for one symbol of `width` bits.
fn seeded_candidates(width: u32, constants: &[u64]) -> Vec<u64> {
    let m = mask(width);
    let mut set = BTreeSet::new();
    for v in [0, 1, 2, m, m >> 1, (m >> 1).wrapping_add(1) & m] {
        set.insert(v & m);
    }
    for c in constants {
        let c = c & m;
        set.insert(c);
        set.insert(c.wrapping_add(1) & m);
        set.insert(c.wrapping_sub(1) & m);
        set.insert(c.wrapping_neg() & m);
        set.insert(!c & m);
    }
    set.into_iter().collect()
}

impl Engine for BuiltinEngine {
    type Term = TermId;
    type Model = Assignment;

    fn name(&self) -> &str {
        "builtin"
    }

    fn declare_symbol(&mut self, name: &str, sort: Sort) -> Result<TermId, EngineError> {
        self.arena.symbol(name, sort)
    }

    fn build_term(
        &mut self,
        op: TermOp,
        width: Option<u32>,
        operands: &[TermId],
    ) -> Result<TermId, EngineError> {
        self.arena.apply(op, width, operands)
    }

    fn build_constant(&mut self, width: u32, value: u64) -> Result<TermId, EngineError> {
        self.arena.constant(width, value)
    }

    fn true_term(&mut self) -> Result<TermId, EngineError> {
        Ok(self.arena.boolean(true))
    }

    fn false_term(&mut self) -> Result<TermId, EngineError> {
        Ok(self.arena.boolean(false))
    }

    fn assert_formula(&mut self, term: &TermId) -> Result<(), EngineError> {
        if self.arena.sort(*term)? != Sort::Bool {
            return Err(EngineError::Sort(format!(
                "cannot assert non-boolean term {}",
                smtlib::render(&self.arena, *term)?
            )));
        }
        self.assertions.push(*term);
        Ok(())
    }

    fn query(&mut self, formula: &TermId) -> Result<QueryOutcome, EngineError> {
        if self.arena.sort(*formula)? != Sort::Bool {
            return Err(EngineError::Sort("query formula must be boolean".into()));
        }
        let mut roots = self.assertions.clone();
        roots.push(*formula);
        if let Some(div) = self.arena.constant_zero_divisor(&roots)? {
            return Err(EngineError::DivisionByZero(smtlib::render(&self.arena, div)?));
        }

        self.last_model = None;
        match self.search(*formula)? {
            Search::Found(assignment) => {
                self.last_model = Some(assignment);
                Ok(QueryOutcome::Invalid)
            }
            Search::Exhausted => Ok(QueryOutcome::Valid),
            Search::GaveUp { explored } => Err(EngineError::Inconclusive { explored }),
        }
    }

    fn model(&mut self) -> Result<Assignment, EngineError> {
        self.last_model
            .clone()
            .ok_or_else(|| EngineError::NoModel("last query did not produce a counterexample".into()))
    }

    fn project(&mut self, model: &Assignment, term: &TermId) -> Result<String, EngineError> {
        Ok(self.arena.evaluate(*term, model)?.render())
    }

    fn stringify(&self, term: &TermId) -> Result<String, EngineError> {
        match self.arena.node(*term)? {
            Node::Symbol { name, .. } => Ok(name.clone()),
            _ => smtlib::render(&self.arena, *term),
        }
    }

    fn bit_width(&self, term: &TermId) -> Result<u32, EngineError> {
        self.arena.width(*term)
    }
}
