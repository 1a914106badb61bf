//! Pattern syntax trees and the ECMAScript parser that builds them.
//!
//! - `ast`: the arena tree (`RegexAst`, `NodeId`, `NodeKind`), flags and
//!   navigation helpers
//! - `parser`: `parse_regex` and `parse_literal`

mod ast;
mod parser;

pub use ast::{
    AssertionKind, CharacterSetKind, Flags, MatchingDirection, Node, NodeId, NodeKind, RegexAst,
    Span,
};
pub use parser::{parse_literal, parse_regex};
