//! Nullability, first-character looks and sibling walks.

use crate::automaton::CharSet;
use crate::regexp::{MatchingDirection, NodeId, NodeKind};

use super::{AnalysisContext, Look};

impl AnalysisContext<'_> {
    /// True if `id` can match the empty string.
    pub fn is_nullable(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Assertion(_) | NodeKind::Backreference { .. } => true,
            _ => self.compile(id).expr.is_nullable(),
        }
    }

    /// True if `id` never consumes a character.
    pub fn is_zero_width(&self, id: NodeId) -> bool {
        match self.ast.kind(id) {
            NodeKind::Assertion(_) => true,
            NodeKind::Quantifier {
                max: Some(0), ..
            } => true,
            NodeKind::Quantifier { element, .. } => self.is_zero_width(*element),
            NodeKind::Group { alternatives } | NodeKind::CapturingGroup { alternatives, .. } => {
                alternatives.iter().all(|&a| self.is_zero_width(a))
            }
            NodeKind::Alternative { elements } => elements.iter().all(|&e| self.is_zero_width(e)),
            _ => false,
        }
    }

    /// First characters `id` can consume in its matching direction.
    pub fn first_look(&self, id: NodeId) -> Look {
        let compiled = self.compile(id);
        let reverse = self.direction(id) == MatchingDirection::Rtl;
        Look {
            chars: compiled.expr.first_chars(reverse),
            exact: !compiled.partial,
            edge: self.is_nullable(id),
        }
    }

    /// Characters `c` for which one iteration of the quantifier can consume
    /// exactly `c`.
    pub fn single_repetition(&self, quantifier: NodeId) -> CharSet {
        match self.ast.kind(quantifier) {
            NodeKind::Quantifier {
                max: Some(0), ..
            } => CharSet::empty(),
            NodeKind::Quantifier { element, .. } => self.compile(*element).expr.single_chars(),
            _ => CharSet::empty(),
        }
    }

    /// Elements that follow `id` in its alternative, in matching order.
    pub(crate) fn siblings_after(&self, id: NodeId, dir: MatchingDirection) -> Vec<NodeId> {
        let Some(parent) = self.ast.parent(id) else {
            return Vec::new();
        };
        let Some(elements) = self.ast.kind(parent).elements() else {
            return Vec::new();
        };
        let Some(pos) = elements.iter().position(|&e| e == id) else {
            return Vec::new();
        };
        match dir {
            MatchingDirection::Ltr => elements[pos + 1..].to_vec(),
            MatchingDirection::Rtl => elements[..pos].iter().rev().copied().collect(),
        }
    }

    /// Elements that precede `id` in its alternative, nearest first.
    pub(crate) fn siblings_before(&self, id: NodeId) -> Vec<NodeId> {
        let dir = match self.direction(id) {
            MatchingDirection::Ltr => MatchingDirection::Rtl,
            MatchingDirection::Rtl => MatchingDirection::Ltr,
        };
        self.siblings_after(id, dir)
    }

    /// Elements before `id` in its alternative, in matching order.
    pub(crate) fn leading_siblings(&self, id: NodeId, dir: MatchingDirection) -> Vec<NodeId> {
        let reverse = match dir {
            MatchingDirection::Ltr => MatchingDirection::Rtl,
            MatchingDirection::Rtl => MatchingDirection::Ltr,
        };
        let mut before = self.siblings_after(id, reverse);
        before.reverse();
        before
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisContext, AnalysisOptions};
    use crate::automaton::CharSet;
    use crate::regexp::{parse_literal, NodeId};

    fn elements(ast: &crate::RegexAst) -> Vec<NodeId> {
        let alt = ast.kind(ast.root()).alternatives().unwrap()[0];
        ast.kind(alt).elements().unwrap().to_vec()
    }

    #[test]
    fn test_nullable_and_zero_width() {
        let ast = parse_literal("/a?(?=x)b*c(?:$|\\b)/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let els = elements(&ast);
        let nullable: Vec<bool> = els.iter().map(|&e| ctx.is_nullable(e)).collect();
        assert_eq!(nullable, vec![true, true, true, false, true]);
        let zero: Vec<bool> = els.iter().map(|&e| ctx.is_zero_width(e)).collect();
        assert_eq!(zero, vec![false, true, false, false, true]);
    }

    #[test]
    fn test_first_look_direction() {
        let ast = parse_literal("/(?<=ab)x?/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let behind = elements(&ast)[0];
        let alt = ast.kind(behind).alternatives().unwrap()[0];
        let look = ctx.first_look(alt);
        assert_eq!(look.chars, CharSet::from_char('b' as u32));
        assert!(look.exact);
        assert!(!look.edge);

        let opt = ctx.first_look(elements(&ast)[1]);
        assert!(opt.edge);
    }

    #[test]
    fn test_siblings() {
        let ast = parse_literal("/ab+cd/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let els = elements(&ast);
        let dir = ctx.direction(els[1]);
        assert_eq!(ctx.siblings_after(els[1], dir), els[2..].to_vec());
        assert_eq!(ctx.siblings_before(els[2]), vec![els[1], els[0]]);
        assert_eq!(ctx.leading_siblings(els[2], dir), vec![els[0], els[1]]);
        assert_eq!(ctx.single_repetition(els[1]), CharSet::from_char('b' as u32));
    }
}
