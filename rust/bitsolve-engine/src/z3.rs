//! Z3 over SMT-LIB2 on stdin/stdout.
//!
//! Terms live in the same [`TermArena`] the builtin engine uses.  Each query
//! renders the whole context into a fresh script and runs one `z3 -in -smt2`
//! process; the counterexample comes back through `get-value` and is stored
//! as an [`Assignment`], so projection is evaluated in-process exactly as it
//! is for the builtin engine.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, trace, warn};

use crate::arena::{Assignment, Node, TermArena, TermId};
use crate::smtlib::{self, CheckSat};
use crate::{Engine, EngineError, QueryOutcome, Sort, TermOp};

#[derive(Debug)]
pub struct Z3ProcessEngine {
    arena: TermArena,
    assertions: Vec<TermId>,
    binary: PathBuf,
    last_model: Option<Assignment>,
}

impl Z3ProcessEngine {
    /// Engine using `z3` from `PATH`.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_binary(Path::new("z3"))
    }

    /// Engine using the given binary.  Fails with
    /// [`EngineError::Unavailable`] if it cannot be executed.
    pub fn with_binary(binary: &Path) -> Result<Self, EngineError> {
        if !Self::is_available(binary) {
            return Err(EngineError::Unavailable(format!(
                "`{}` could not be executed",
                binary.display()
            )));
        }
        Ok(Self {
            arena: TermArena::new(),
            assertions: Vec::new(),
            binary: binary.to_path_buf(),
            last_model: None,
        })
    }

    /// Check if Z3 is available at `binary`.
    pub fn is_available(binary: &Path) -> bool {
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn arena(&self) -> &TermArena {
        &self.arena
    }

    fn run(&self, script: &str) -> Result<String, EngineError> {
        let mut child = Command::new(&self.binary)
            .arg("-in")
            .arg("-smt2")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Process(format!("failed to spawn z3: {}", e)))?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(script.as_bytes())
                .map_err(|e| EngineError::Process(format!("failed to write to z3 stdin: {}", e)))?;
        }
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .map_err(|e| EngineError::Process(format!("failed to wait for z3: {}", e)))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Process(format!(
                "z3 exited with {} and no output: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Engine for Z3ProcessEngine {
    type Term = TermId;
    type Model = Assignment;

    fn name(&self) -> &str {
        "z3"
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
        let script = smtlib::build_script(&self.arena, &self.assertions, *formula)?;
        trace!(%script, "z3 script");
        let stdout = self.run(&script)?;

        let (verdict, rest) = smtlib::parse_check_sat(&stdout)?;
        debug!(?verdict, assertions = self.assertions.len(), "z3 check-sat");
        match verdict {
            CheckSat::Unsat => Ok(QueryOutcome::Valid),
            CheckSat::Unknown => {
                warn!("z3 returned unknown");
                Err(EngineError::Backend("z3 returned unknown".into()))
            }
            CheckSat::Sat => {
                let symbols = self.arena.symbols();
                let values = smtlib::parse_values(rest)?;
                if values.len() != symbols.len() {
                    return Err(EngineError::Process(format!(
                        "expected {} values from get-value, got {}",
                        symbols.len(),
                        values.len()
                    )));
                }
                let mut assignment = Assignment::new();
                for (sym, value) in symbols.iter().zip(values) {
                    assignment.insert(*sym, value);
                }
                self.last_model = Some(assignment);
                Ok(QueryOutcome::Invalid)
            }
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
