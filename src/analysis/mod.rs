//! Redundancy and backtracking analysis over a parsed pattern.
//!
//! Everything hangs off an [`AnalysisContext`], which borrows one
//! [`RegexAst`] and owns the per-node caches (compiled expressions,
//! automata, normalized trees). Caches are keyed by `NodeId` and dropped
//! with the context.
//!
//! # Module Organization
//!
//! - `compile`: native compilation of sub-trees to `Expr`, with partiality
//! - `look`: nullability, first-character looks and sibling walks
//! - `structural`: syntax-driven `equal_language` / `covers`
//! - `partial`: compilation through a single anchor, nested alternatives
//! - `duplication`: classification of the alternatives of a disjunction
//! - `backtrack`: self-loops, trades, attack templates and fixes
//! - `absorption`: bounded quantifiers absorbed by preceding ones

mod absorption;
mod backtrack;
mod compile;
mod duplication;
mod look;
mod partial;
mod structural;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::automaton::{CharSet, Dfa, Expr, Nfa};
use crate::regexp::{AssertionKind, MatchingDirection, NodeId, NodeKind, RegexAst};
use crate::AuditError;

pub use absorption::dependencies_capture;

/// A compiled sub-tree.
///
/// `partial` means the language is over-approximated: assertions were
/// erased to the empty word and backreferences widened to any string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub expr: Rc<Expr>,
    pub partial: bool,
}

/// The characters that can be consumed first at some position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Look {
    pub chars: CharSet,
    /// `chars` was computed without approximation.
    pub exact: bool,
    /// The position may also be left without consuming anything.
    pub edge: bool,
}

/// Kinds of redundancy, highest priority first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FindingKind {
    Duplicate,
    Subset,
    NestedSubset,
    PrefixSubset,
    PrefixNestedSubset,
    Superset,
    Overlap,
}

/// A redundancy finding for one alternative of a disjunction.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    pub alternative: NodeId,
    /// The alternatives it was compared against.
    pub others: Vec<NodeId>,
    /// The nested alternative for the nested kinds.
    pub nested: Option<NodeId>,
    /// The overlapping language for `Overlap`.
    pub overlap: Option<Dfa>,
}

impl PartialEq for Finding {
    fn eq(&self, other: &Self) -> bool {
        let overlap_eq = match (&self.overlap, &other.overlap) {
            (Some(a), Some(b)) => Dfa::structurally_equal(a, b),
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind
            && self.alternative == other.alternative
            && self.others == other.others
            && self.nested == other.nested
            && overlap_eq
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Polynomial,
    Exponential,
}

/// Input shape that drives a backtracking matcher into the hazard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackTemplate {
    /// Characters to repeat.
    pub pump: CharSet,
    /// Smallest pumpable character.
    pub example: char,
    /// Smallest character that neither pumps nor continues the pattern.
    pub reject: Option<char>,
}

/// A backtracking hazard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    /// `quantifier` can be re-entered through the enclosing `loop_via`.
    SelfLoop {
        quantifier: NodeId,
        loop_via: NodeId,
        alphabet: CharSet,
        severity: Severity,
        attack: AttackTemplate,
        fix: Option<Expr>,
    },
    /// `start` and `end` can hand characters of `alphabet` to each other.
    Trade {
        start: NodeId,
        end: NodeId,
        alphabet: CharSet,
        severity: Severity,
        attack: AttackTemplate,
        fix: Option<Expr>,
    },
}

impl Report {
    pub fn severity(&self) -> Severity {
        match self {
            Report::SelfLoop { severity, .. } | Report::Trade { severity, .. } => *severity,
        }
    }

    pub fn alphabet(&self) -> &CharSet {
        match self {
            Report::SelfLoop { alphabet, .. } | Report::Trade { alphabet, .. } => alphabet,
        }
    }

    pub fn fix(&self) -> Option<&Expr> {
        match self {
            Report::SelfLoop { fix, .. } | Report::Trade { fix, .. } => fix.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Absorption {
    No,
    Yes { dependencies: Vec<NodeId> },
}

/// Analysis tuning.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Most NFA or DFA states any single construction may allocate.
    pub node_budget: usize,
    /// Steps one structural comparison may take before giving up.
    pub structural_fuel: usize,
    /// Reports below this severity are dropped by `backtracking`.
    pub min_severity: Severity,
    /// Emit `Overlap` findings.
    pub report_overlap: bool,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            node_budget: 20_000,
            structural_fuel: 10_000,
            min_severity: Severity::Polynomial,
            report_overlap: true,
        }
    }
}

/// Automata for one compiled sub-tree.
#[derive(Debug)]
pub(crate) struct Automaton {
    pub nfa: Nfa,
    /// Minimal.
    pub dfa: Dfa,
    pub partial: bool,
}

/// Per-tree analysis state.
pub struct AnalysisContext<'a> {
    ast: &'a RegexAst,
    options: AnalysisOptions,
    max_char: u32,
    compiled: RefCell<FxHashMap<NodeId, Compiled>>,
    automata: RefCell<FxHashMap<NodeId, Option<Rc<Automaton>>>>,
    norms: RefCell<FxHashMap<NodeId, Rc<structural::Norm>>>,
    fuel: Cell<usize>,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(ast: &'a RegexAst, options: AnalysisOptions) -> Self {
        Self {
            ast,
            max_char: ast.flags().max_char(),
            options,
            compiled: RefCell::default(),
            automata: RefCell::default(),
            norms: RefCell::default(),
            fuel: Cell::new(0),
        }
    }

    #[inline]
    pub fn ast(&self) -> &'a RegexAst {
        self.ast
    }

    #[inline]
    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Automata for `id`'s native compilation, or `None` over budget.
    pub(crate) fn automaton(&self, id: NodeId) -> Option<Rc<Automaton>> {
        if let Some(hit) = self.automata.borrow().get(&id) {
            return hit.clone();
        }
        let compiled = self.compile(id);
        let built = match self.build_automaton(&compiled.expr, compiled.partial) {
            Ok(a) => Some(Rc::new(a)),
            Err(e) => {
                debug!(node = id.index(), error = %e, "automaton construction abandoned");
                None
            }
        };
        self.automata.borrow_mut().insert(id, built.clone());
        built
    }

    pub(crate) fn build_automaton(&self, expr: &Expr, partial: bool) -> Result<Automaton, AuditError> {
        let nfa = Nfa::from_expr(expr, self.max_char, self.options.node_budget)?;
        let dfa = Dfa::from_nfa(&nfa, self.options.node_budget)?.minimize();
        Ok(Automaton { nfa, dfa, partial })
    }

    /// Classify the alternatives of every disjunction, in source order.
    pub fn duplications(&self) -> Vec<Finding> {
        let mut out = Vec::new();
        for id in self.ast.disjunctions() {
            let Some(alternatives) = self.ast.kind(id).alternatives() else {
                continue;
            };
            if alternatives.len() < 2 {
                continue;
            }
            let trailing = self.has_trailing_context(id);
            out.extend(self.classify(alternatives, trailing));
        }
        out
    }

    /// Analyze every quantifier, in source order.
    pub fn backtracking(&self) -> Vec<Report> {
        let min = self.options.min_severity;
        self.ast
            .quantifiers()
            .into_iter()
            .flat_map(|q| self.analyze(q))
            .filter(|r| r.severity() >= min)
            .collect()
    }

    /// Check every bounded, non-constant quantifier against the quantifiers
    /// right before it.
    pub fn absorptions(&self) -> Vec<(NodeId, Absorption)> {
        let mut out = Vec::new();
        for q in self.ast.quantifiers() {
            let NodeKind::Quantifier {
                min,
                max: Some(max),
                ..
            } = *self.ast.kind(q)
            else {
                continue;
            };
            if min >= max {
                continue;
            }
            let mut preceding = Vec::new();
            for e in self.siblings_before(q) {
                if self.is_zero_width(e) {
                    continue;
                }
                if !self.ast.kind(e).is_quantifier() {
                    break;
                }
                preceding.push(e);
            }
            if preceding.is_empty() {
                continue;
            }
            out.push((q, self.can_absorb(q, &preceding)));
        }
        out
    }

    /// True when nothing after `disjunction` can reject a shorter match.
    fn has_trailing_context(&self, disjunction: NodeId) -> bool {
        let mut cur = disjunction;
        let dir = self.ast.direction(disjunction);
        while let Some(parent) = self.ast.parent(cur) {
            match self.ast.kind(parent) {
                NodeKind::Alternative { .. } => {
                    if !self.siblings_after(cur, dir).is_empty() {
                        return false;
                    }
                }
                NodeKind::Group { .. } | NodeKind::CapturingGroup { .. } => {}
                NodeKind::Pattern { .. }
                | NodeKind::Assertion(
                    AssertionKind::Lookahead { .. } | AssertionKind::Lookbehind { .. },
                ) => return true,
                _ => return false,
            }
            cur = parent;
        }
        true
    }

    pub(crate) fn direction(&self, id: NodeId) -> MatchingDirection {
        self.ast.direction(id)
    }
}
