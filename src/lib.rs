//! regex-audit: redundancy and backtracking analysis for ECMAScript regular expressions
//!
//! Parse a pattern, then ask an [`AnalysisContext`] about it:
//!
//! ```
//! use regex_audit::{parse_literal, AnalysisContext, AnalysisOptions, FindingKind};
//!
//! let ast = parse_literal("/(cat|cat)/").unwrap();
//! let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
//! let findings = ctx.duplications();
//! assert_eq!(findings[0].kind, FindingKind::Duplicate);
//! ```
//!
//! The engine reasons about the languages of sub-trees with finite automata
//! (see [`automaton`]). Constructs that a classic automaton cannot express,
//! such as assertions and backreferences, are over-approximated and the
//! result is flagged as partial so that no false positive is reported.

pub mod analysis;
pub mod automaton;
pub mod regexp;

pub use analysis::{
    dependencies_capture, Absorption, AnalysisContext, AnalysisOptions, AttackTemplate,
    Compiled, Finding, FindingKind, Look, Report, Severity,
};
pub use automaton::{CharSet, Dfa, Expr, SetRelation};
pub use regexp::{
    parse_literal, parse_regex, AssertionKind, CharacterSetKind, Flags, MatchingDirection, Node,
    NodeId, NodeKind, RegexAst, Span,
};

/// Errors produced while parsing or while building automata.
///
/// Analysis entry points never return these; budget overruns inside the
/// analysis are turned into inconclusive results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    #[error("invalid regular expression: {message} at offset {offset}")]
    Parse { message: String, offset: usize },

    #[error("automaton exceeds the node budget of {limit} states")]
    TooManyNodes { limit: usize },

    #[error("unsupported construct {construct} at offset {offset}")]
    Unsupported {
        construct: &'static str,
        offset: usize,
    },
}
