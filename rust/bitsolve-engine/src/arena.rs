//! Flat term arena shared by both backends.
//!
//! Terms are appended to a flat vector and referred to by [`TermId`].  Sort
//! checking happens at construction time, which is what gives an untyped
//! surface language its only type discipline: a bitvector operator handed a
//! boolean operand (or the reverse) is rejected here with
//! [`EngineError::Sort`].
//!
//! Evaluation is total and follows SMT-LIB2 bitvector semantics, including
//! `x / 0 = ~0` and `x % 0 = x`.

use std::collections::{HashMap, HashSet};

use crate::{EngineError, Sort, TermOp, MAX_WIDTH};

/// Handle to a term inside a [`TermArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId(pub(crate) u32);

impl TermId {
    pub fn index(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Const { value: u64 },
    Bool(bool),
    /// `name` is what the caller declared and may repeat; the term's index
    /// is what tells two symbols apart.
    Symbol { name: String },
    App { op: TermOp, args: Vec<TermId> },
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    sort: Sort,
}

/// Concrete value of a term under an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    Bits { width: u32, value: u64 },
}

impl Value {
    /// Native rendering: `0x` plus one hex digit per started nibble, or
    /// `true`/`false`.
    pub fn render(self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Bits { width, value } => {
                let digits = width.div_ceil(4) as usize;
                format!("0x{:0digits$X}", value, digits = digits)
            }
        }
    }

    fn bits(self) -> u64 {
        match self {
            Value::Bool(b) => b as u64,
            Value::Bits { value, .. } => value,
        }
    }

    fn truth(self) -> bool {
        self.bits() != 0
    }
}

/// Values chosen for the symbols of an arena.  Symbols without an entry
/// evaluate to zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    values: HashMap<TermId, u64>,
}

impl Assignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: TermId, value: u64) {
        self.values.insert(symbol, value);
    }

    pub fn get(&self, symbol: TermId) -> Option<u64> {
        self.values.get(&symbol).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// All-ones mask for `width` bits.
pub fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

#[derive(Debug, Default)]
pub struct TermArena {
    entries: Vec<Entry>,
    symbols: Vec<TermId>,
}

impl TermArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, node: Node, sort: Sort) -> TermId {
        let id = TermId(self.entries.len() as u32);
        self.entries.push(Entry { node, sort });
        id
    }

    fn entry(&self, id: TermId) -> Result<&Entry, EngineError> {
        self.entries
            .get(id.0 as usize)
            .ok_or(EngineError::UnknownTerm(id.0))
    }

    pub fn node(&self, id: TermId) -> Result<&Node, EngineError> {
        Ok(&self.entry(id)?.node)
    }

    pub fn sort(&self, id: TermId) -> Result<Sort, EngineError> {
        Ok(self.entry(id)?.sort)
    }

    /// Width of a bitvector term.  Booleans have none.
    pub fn width(&self, id: TermId) -> Result<u32, EngineError> {
        match self.sort(id)? {
            Sort::BitVec(w) => Ok(w),
            Sort::Bool => Err(EngineError::Sort(format!(
                "term #{} is boolean and has no bit-width",
                id.0
            ))),
        }
    }

    /// Every symbol declared so far, in declaration order.
    pub fn symbols(&self) -> &[TermId] {
        &self.symbols
    }

    pub fn symbol(&mut self, name: &str, sort: Sort) -> Result<TermId, EngineError> {
        if let Sort::BitVec(w) = sort {
            check_width(w)?;
        }
        let id = self.push(Node::Symbol { name: name.to_string() }, sort);
        self.symbols.push(id);
        Ok(id)
    }

    pub fn constant(&mut self, width: u32, value: u64) -> Result<TermId, EngineError> {
        check_width(width)?;
        if value & !mask(width) != 0 {
            return Err(EngineError::Width {
                width,
                reason: format!("constant {} does not fit", value),
            });
        }
        Ok(self.push(Node::Const { value }, Sort::BitVec(width)))
    }

    pub fn boolean(&mut self, value: bool) -> TermId {
        self.push(Node::Bool(value), Sort::Bool)
    }

    /// Apply `op`, checking operand sorts and computing the result sort.
    pub fn apply(
        &mut self,
        op: TermOp,
        width: Option<u32>,
        args: &[TermId],
    ) -> Result<TermId, EngineError> {
        let sorts = args
            .iter()
            .map(|a| self.sort(*a))
            .collect::<Result<Vec<_>, _>>()?;

        let sort = match op {
            TermOp::BvAdd
            | TermOp::BvSub
            | TermOp::BvMul
            | TermOp::BvDiv
            | TermOp::BvMod
            | TermOp::BvShl
            | TermOp::BvLshr => {
                let widths = bitvector_operands(op, &sorts, 2)?;
                let w = width.unwrap_or(widths[0]);
                check_width(w)?;
                Sort::BitVec(w)
            }
            TermOp::BvAnd | TermOp::BvOr | TermOp::BvXor => {
                let widths = bitvector_operands(op, &sorts, 2)?;
                Sort::BitVec(widths[0].max(widths[1]))
            }
            TermOp::BvNot | TermOp::BvNeg => {
                let widths = bitvector_operands(op, &sorts, 1)?;
                Sort::BitVec(widths[0])
            }
            TermOp::BvUlt | TermOp::BvUle | TermOp::BvUgt | TermOp::BvUge => {
                bitvector_operands(op, &sorts, 2)?;
                Sort::Bool
            }
            TermOp::Eq => {
                expect_arity(op, &sorts, 2)?;
                match (sorts[0], sorts[1]) {
                    (Sort::Bool, Sort::Bool) | (Sort::BitVec(_), Sort::BitVec(_)) => Sort::Bool,
                    (l, r) => {
                        return Err(EngineError::Sort(format!(
                            "`=` cannot compare {} with {}",
                            l, r
                        )))
                    }
                }
            }
            TermOp::And | TermOp::Or => {
                boolean_operands(op, &sorts, 2)?;
                Sort::Bool
            }
            TermOp::Not => {
                boolean_operands(op, &sorts, 1)?;
                Sort::Bool
            }
        };

        Ok(self.push(
            Node::App {
                op,
                args: args.to_vec(),
            },
            sort,
        ))
    }

    /// Evaluate `id` under `assignment`.
    pub fn evaluate(&self, id: TermId, assignment: &Assignment) -> Result<Value, EngineError> {
        let entry = self.entry(id)?;
        let value = match &entry.node {
            Node::Const { value } => *value,
            Node::Bool(b) => *b as u64,
            Node::Symbol { .. } => {
                let raw = assignment.get(id).unwrap_or(0);
                match entry.sort {
                    Sort::Bool => (raw != 0) as u64,
                    Sort::BitVec(w) => raw & mask(w),
                }
            }
            Node::App { op, args } => {
                let vals = args
                    .iter()
                    .map(|a| self.evaluate(*a, assignment))
                    .collect::<Result<Vec<_>, _>>()?;
                apply_op(*op, entry.sort, &vals)
            }
        };
        Ok(match entry.sort {
            Sort::Bool => Value::Bool(value != 0),
            Sort::BitVec(width) => Value::Bits { width, value },
        })
    }

    /// Symbols reachable from `roots`, in first-visit order.
    pub fn symbols_in(&self, roots: &[TermId]) -> Result<Vec<TermId>, EngineError> {
        let mut out = Vec::new();
        self.walk(roots, |id, node| {
            if matches!(node, Node::Symbol { .. }) {
                out.push(id);
            }
        })?;
        Ok(out)
    }

    /// Constant values reachable from `roots`.
    pub fn constants_in(&self, roots: &[TermId]) -> Result<Vec<u64>, EngineError> {
        let mut out = Vec::new();
        self.walk(roots, |_, node| {
            if let Node::Const { value } = node {
                out.push(*value);
            }
        })?;
        Ok(out)
    }

    /// First division or remainder node reachable from `roots` whose divisor
    /// is a constant that is zero at the operator's width.
    pub fn constant_zero_divisor(&self, roots: &[TermId]) -> Result<Option<TermId>, EngineError> {
        let mut found = None;
        self.walk(roots, |id, node| {
            if found.is_some() {
                return;
            }
            if let Node::App {
                op: TermOp::BvDiv | TermOp::BvMod,
                args,
            } = node
            {
                let width = self.width(id).unwrap_or(MAX_WIDTH);
                if let Ok(Node::Const { value }) = self.node(args[1]) {
                    if value & mask(width) == 0 {
                        found = Some(id);
                    }
                }
            }
        })?;
        Ok(found)
    }

    fn walk(
        &self,
        roots: &[TermId],
        mut visit: impl FnMut(TermId, &Node),
    ) -> Result<(), EngineError> {
        let mut seen = HashSet::new();
        let mut stack: Vec<TermId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let node = self.node(id)?;
            visit(id, node);
            if let Node::App { args, .. } = node {
                stack.extend(args.iter().rev().copied());
            }
        }
        Ok(())
    }
}

fn check_width(width: u32) -> Result<(), EngineError> {
    if width == 0 || width > MAX_WIDTH {
        return Err(EngineError::Width {
            width,
            reason: format!("bitvector widths must be within 1..={}", MAX_WIDTH),
        });
    }
    Ok(())
}

fn expect_arity(op: TermOp, sorts: &[Sort], arity: usize) -> Result<(), EngineError> {
    if sorts.len() != arity {
        return Err(EngineError::Sort(format!(
            "`{}` expects {} operand(s), got {}",
            op,
            arity,
            sorts.len()
        )));
    }
    Ok(())
}

fn bitvector_operands(op: TermOp, sorts: &[Sort], arity: usize) -> Result<Vec<u32>, EngineError> {
    expect_arity(op, sorts, arity)?;
    sorts
        .iter()
        .map(|s| {
            s.width().ok_or_else(|| {
                EngineError::Sort(format!("`{}` expects bitvector operands, got Bool", op))
            })
        })
        .collect()
}

fn boolean_operands(op: TermOp, sorts: &[Sort], arity: usize) -> Result<(), EngineError> {
    expect_arity(op, sorts, arity)?;
    if let Some(bad) = sorts.iter().find(|s| **s != Sort::Bool) {
        return Err(EngineError::Sort(format!(
            "`{}` expects boolean operands, got {}",
            op, bad
        )));
    }
    Ok(())
}

fn apply_op(op: TermOp, sort: Sort, vals: &[Value]) -> u64 {
    let width = sort.width().unwrap_or(1);
    let m = mask(width);
    let a = vals[0].bits();
    match op {
        TermOp::BvNot => !a & m,
        TermOp::BvNeg => a.wrapping_neg() & m,
        TermOp::Not => !vals[0].truth() as u64,
        _ => {
            let b = vals[1].bits();
            match op {
                TermOp::BvAdd => (a & m).wrapping_add(b & m) & m,
                TermOp::BvSub => (a & m).wrapping_sub(b & m) & m,
                TermOp::BvMul => (a & m).wrapping_mul(b & m) & m,
                TermOp::BvDiv => {
                    let (a, b) = (a & m, b & m);
                    if b == 0 {
                        m
                    } else {
                        a / b
                    }
                }
                TermOp::BvMod => {
                    let (a, b) = (a & m, b & m);
                    if b == 0 {
                        a
                    } else {
                        a % b
                    }
                }
                TermOp::BvShl => {
                    let (a, b) = (a & m, b & m);
                    if b >= width as u64 {
                        0
                    } else {
                        (a << b) & m
                    }
                }
                TermOp::BvLshr => {
                    let (a, b) = (a & m, b & m);
                    if b >= width as u64 {
                        0
                    } else {
                        a >> b
                    }
                }
                TermOp::BvAnd => a & b & m,
                TermOp::BvOr => (a | b) & m,
                TermOp::BvXor => (a ^ b) & m,
                TermOp::BvUlt => (a < b) as u64,
                TermOp::BvUle => (a <= b) as u64,
                TermOp::BvUgt => (a > b) as u64,
                TermOp::BvUge => (a >= b) as u64,
                TermOp::Eq => (a == b) as u64,
                TermOp::And => (vals[0].truth() && vals[1].truth()) as u64,
                TermOp::Or => (vals[0].truth() || vals[1].truth()) as u64,
                TermOp::BvNot | TermOp::BvNeg | TermOp::Not => unreachable!("unary handled above"),
            }
        }
    }
}
