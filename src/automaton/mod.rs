//! Character and automaton algebra.
//!
//! The analysis layer reasons about languages through this module:
//!
//! - `CharSet`: immutable sets of code points (sorted ranges)
//! - `Expr`: automaton-buildable expressions, also used for fixes
//! - `Nfa`: Thompson NFAs with union/append, built under a state budget
//! - `Dfa`: subset construction, product intersection, minimization,
//!   structural equality and state elimination back to `Expr`
//!
//! # Module Organization
//!
//! - `char_set`: code-point sets and well-known sets (`\d`, `\w`, `\s`)
//! - `expr`: the expression type and its ECMAScript rendering
//! - `nfa`: arena-based NFA and simulation
//! - `dfa`: DFA operations and `SetRelation`
//! - `sparse_set`: O(1)-clear state sets for closure computation

mod char_set;
mod dfa;
mod expr;
mod nfa;
mod sparse_set;

pub use char_set::{sets, CharRange, CharSet, MAX_CHAR_UNICODE, MAX_CHAR_UTF16};
pub use dfa::{set_relation, Dfa, SetRelation};
pub use expr::Expr;
pub use nfa::{Nfa, NfaState, StateId};
pub use sparse_set::{StateSet, StateSets};

#[cfg(test)]
mod tests;
