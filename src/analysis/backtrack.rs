//! Backtracking hazards of a quantifier.
//!
//! A *self-loop* is a quantifier that an enclosing repetition can re-enter
//! without consuming anything in between, so the same characters can be
//! split between iterations in exponentially many ways. A *trade* is a pair
//! of non-constant quantifiers that can hand repetitions of a shared
//! character back and forth.

use tracing::debug;

use crate::automaton::{CharSet, Expr};
use crate::regexp::{MatchingDirection, NodeId, NodeKind};

use super::{AnalysisContext, AttackTemplate, Report, Severity};

impl AnalysisContext<'_> {
    /// Self-loop and trade reports for `quantifier`.
    pub fn analyze(&self, quantifier: NodeId) -> Vec<Report> {
        let NodeKind::Quantifier { min, max, .. } = *self.ast.kind(quantifier) else {
            return Vec::new();
        };
        let mut reports = Vec::new();
        if max.map_or(true, |m| m > 1) {
            reports.extend(self.self_loop(quantifier));
        }
        if max != Some(min) {
            reports.extend(self.trades(quantifier));
        }
        reports
    }

    fn self_loop(&self, q: NodeId) -> Option<Report> {
        let NodeKind::Quantifier { max, element, .. } = *self.ast.kind(q) else {
            return None;
        };
        let inside = self.first_look(element).chars;
        let mut after = CharSet::empty();
        let mut cur = q;
        loop {
            for s in self.siblings_after(cur, self.direction(cur)) {
                if matches!(
                    self.ast.kind(s),
                    NodeKind::Assertion(_) | NodeKind::Backreference { .. }
                ) || !self.is_nullable(s)
                {
                    return None;
                }
                after = after.union(&self.first_look(s).chars);
            }
            let parent = self.ast.parent(cur)?;
            match *self.ast.kind(parent) {
                NodeKind::Alternative { .. }
                | NodeKind::Group { .. }
                | NodeKind::CapturingGroup { .. } => {}
                NodeKind::Quantifier {
                    max: outer_max,
                    element: outer_element,
                    ..
                } if outer_max.map_or(true, |m| m > 1)
                    && self.reaches_without_consuming(outer_element, q) =>
                {
                    after = after.union(&self.first_look(outer_element).chars);
                    let alphabet = inside.intersect(&after);
                    if !alphabet.is_empty() {
                        let severity = if max.is_none() && outer_max.is_none() {
                            Severity::Exponential
                        } else {
                            Severity::Polynomial
                        };
                        let attack = self.attack(&alphabet, parent)?;
                        return Some(Report::SelfLoop {
                            quantifier: q,
                            loop_via: parent,
                            alphabet,
                            severity,
                            attack,
                            fix: self.fix(&[parent]),
                        });
                    }
                }
                NodeKind::Quantifier { .. } => {}
                _ => return None,
            }
            cur = parent;
        }
    }

    /// True if matching `from` can arrive at `target` before consuming.
    fn reaches_without_consuming(&self, from: NodeId, target: NodeId) -> bool {
        let mut cur = target;
        while cur != from {
            let Some(parent) = self.ast.parent(cur) else {
                return false;
            };
            match self.ast.kind(parent) {
                NodeKind::Alternative { .. } => {
                    let leading = self.leading_siblings(cur, self.direction(cur));
                    if !leading.iter().all(|&s| self.is_nullable(s)) {
                        return false;
                    }
                }
                NodeKind::Assertion(_) => return false,
                _ => {}
            }
            cur = parent;
        }
        true
    }

    /// Trades starting at `start`. Both sides must be non-constant and at
    /// least one must be unbounded; two bounded quantifiers can only trade a
    /// bounded number of characters.
    fn trades(&self, start: NodeId) -> Vec<Report> {
        let NodeKind::Quantifier { max: start_max, .. } = *self.ast.kind(start) else {
            return Vec::new();
        };
        let mut shared = self.single_repetition(start);
        let mut reports = Vec::new();
        let mut cur = start;
        'walk: while !shared.is_empty() {
            for el in self.siblings_after(cur, self.direction(cur)) {
                for end in self.leading_quantifiers(el) {
                    let NodeKind::Quantifier { min, max, .. } = *self.ast.kind(end) else {
                        continue;
                    };
                    if max == Some(min) || (start_max.is_some() && max.is_some()) {
                        continue;
                    }
                    let alphabet = shared.intersect(&self.single_repetition(end));
                    if alphabet.is_empty() {
                        continue;
                    }
                    if let Some(attack) = self.attack(&alphabet, end) {
                        reports.push(Report::Trade {
                            start,
                            end,
                            fix: self.fix(&self.trade_region(start, end)),
                            alphabet,
                            severity: Severity::Polynomial,
                            attack,
                        });
                    }
                }
                if matches!(
                    self.ast.kind(el),
                    NodeKind::Assertion(_) | NodeKind::Backreference { .. }
                ) {
                    break 'walk;
                }
                if self.is_nullable(el) {
                    continue;
                }
                match self.single_char(el) {
                    Some(set) if !set.is_disjoint_with(&shared) => shared = shared.intersect(&set),
                    _ => break 'walk,
                }
            }
            let Some(parent) = self.ast.parent(cur) else {
                break;
            };
            match self.ast.kind(parent) {
                NodeKind::Alternative { .. }
                | NodeKind::Group { .. }
                | NodeKind::CapturingGroup { .. }
                | NodeKind::Quantifier { .. } => cur = parent,
                _ => break,
            }
        }
        reports
    }

    /// Quantifiers that can start a match of `id`.
    fn leading_quantifiers(&self, id: NodeId) -> Vec<NodeId> {
        match self.ast.kind(id) {
            NodeKind::Quantifier { .. } => vec![id],
            NodeKind::Group { alternatives } | NodeKind::CapturingGroup { alternatives, .. } => {
                let rtl = self.direction(id) == MatchingDirection::Rtl;
                alternatives
                    .iter()
                    .filter_map(|&a| {
                        let elements = self.ast.kind(a).elements()?;
                        if rtl {
                            elements.last().copied()
                        } else {
                            elements.first().copied()
                        }
                    })
                    .flat_map(|e| self.leading_quantifiers(e))
                    .collect()
            }
            _ => Vec::new(),
        }
    }

    /// The set of a node that always consumes exactly one character.
    fn single_char(&self, id: NodeId) -> Option<CharSet> {
        let compiled = self.compile(id);
        match &*compiled.expr {
            Expr::Chars(set) if !compiled.partial => Some(set.clone()),
            _ => None,
        }
    }

    /// Elements spanning `start` to `end` in their lowest common alternative.
    fn trade_region(&self, start: NodeId, end: NodeId) -> Vec<NodeId> {
        let lca = std::iter::once(start)
            .chain(self.ast.ancestors(start))
            .find(|&a| {
                matches!(self.ast.kind(a), NodeKind::Alternative { .. })
                    && self.ast.is_ancestor_or_self(a, end)
            });
        let Some(elements) = lca.and_then(|a| self.ast.kind(a).elements()) else {
            return Vec::new();
        };
        let position = |target: NodeId| {
            elements
                .iter()
                .position(|&e| self.ast.is_ancestor_or_self(e, target))
        };
        match (position(start), position(end)) {
            (Some(a), Some(b)) => elements[a.min(b)..=a.max(b)].to_vec(),
            _ => Vec::new(),
        }
    }

    /// Characters that can follow `id` in the rest of the pattern.
    fn follow_chars(&self, id: NodeId) -> CharSet {
        let mut out = CharSet::empty();
        let mut cur = id;
        loop {
            for s in self.siblings_after(cur, self.direction(cur)) {
                if self.is_zero_width(s) {
                    continue;
                }
                let look = self.first_look(s);
                out = out.union(&look.chars);
                if !look.edge {
                    return out;
                }
            }
            let Some(parent) = self.ast.parent(cur) else {
                return out;
            };
            match self.ast.kind(parent) {
                NodeKind::Quantifier { max, .. } if *max != Some(1) => {
                    out = out.union(&self.first_look(parent).chars);
                }
                NodeKind::Alternative { .. }
                | NodeKind::Group { .. }
                | NodeKind::CapturingGroup { .. }
                | NodeKind::Quantifier { .. } => {}
                _ => return out,
            }
            cur = parent;
        }
    }

    fn attack(&self, alphabet: &CharSet, region: NodeId) -> Option<AttackTemplate> {
        let example = alphabet.chars().find_map(char::from_u32)?;
        let reject = alphabet
            .union(&self.follow_chars(region))
            .negate(self.max_char)
            .chars()
            .find_map(char::from_u32);
        Some(AttackTemplate {
            pump: alphabet.clone(),
            example,
            reject,
        })
    }

    /// A language-equal replacement for the concatenation of `parts`.
    fn fix(&self, parts: &[NodeId]) -> Option<Expr> {
        if parts.is_empty() || parts.iter().any(|&p| self.ast.contains_capture(p)) {
            return None;
        }
        let mut items = Vec::with_capacity(parts.len());
        for &p in parts {
            let compiled = self.compile(p);
            if compiled.partial {
                return None;
            }
            items.push((*compiled.expr).clone());
        }
        match self.build_automaton(&Expr::concat(items), false) {
            Ok(automaton) => Some(automaton.dfa.to_expr()),
            Err(e) => {
                debug!(error = %e, "fix construction abandoned");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisContext, AnalysisOptions, Report, Severity};
    use crate::automaton::{CharSet, Dfa, MAX_CHAR_UTF16};
    use crate::regexp::parse_literal;

    fn reports(literal: &str) -> Vec<Report> {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        ctx.backtracking()
    }

    fn same_language(a: &crate::automaton::Expr, literal: &str) -> bool {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let b = ctx.compile(ast.root()).expr;
        let da = Dfa::from_expr(a, MAX_CHAR_UTF16, 1000).unwrap();
        let db = Dfa::from_expr(&b, MAX_CHAR_UTF16, 1000).unwrap();
        Dfa::structurally_equal(&da, &db)
    }

    #[test]
    fn test_nested_plus_is_exponential() {
        let ast = parse_literal("/(a+)+b/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let found = ctx.backtracking();
        assert_eq!(found.len(), 1);
        match &found[0] {
            Report::SelfLoop {
                quantifier,
                alphabet,
                severity,
                attack,
                fix,
                ..
            } => {
                assert_eq!(ast.text(*quantifier), "a+");
                assert_eq!(*alphabet, CharSet::from_char('a' as u32));
                assert_eq!(*severity, Severity::Exponential);
                assert_eq!(attack.example, 'a');
                assert_eq!(attack.reject, Some('\0'));
                assert!(fix.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_self_loop_fix() {
        let found = reports("/(?:a+)+b/");
        assert_eq!(found.len(), 1);
        let fix = found[0].fix().unwrap();
        assert!(same_language(fix, "/a+/"));
    }

    #[test]
    fn test_self_loop_variants() {
        let found = reports("/(?:a*b?)+c/");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity(), Severity::Exponential);

        let found = reports("/(?:a*){2,5}/");
        assert!(found
            .iter()
            .any(|r| matches!(r, Report::SelfLoop { severity: Severity::Polynomial, .. })));

        assert!(reports("/(?:a+b)+/").is_empty());
        assert!(reports("/(?:xa+)+/").is_empty());
        assert!(reports("/(?:a+(?=b))+/").is_empty());
    }

    #[test]
    fn test_trades() {
        let ast = parse_literal("/a*a*b/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let found = ctx.backtracking();
        assert_eq!(found.len(), 1);
        match &found[0] {
            Report::Trade {
                start,
                end,
                alphabet,
                severity,
                fix,
                ..
            } => {
                assert_eq!(ast.node(*start).span.start, 0);
                assert_eq!(ast.node(*end).span.start, 2);
                assert_eq!(*alphabet, CharSet::from_char('a' as u32));
                assert_eq!(*severity, Severity::Polynomial);
                assert!(same_language(fix.as_ref().unwrap(), "/a*/"));
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(reports("/a*aa*/").len(), 1);
        assert_eq!(reports("/\\w+(?:\\d+|x)/").len(), 1);
        assert!(reports("/a*b*/").is_empty());
        assert!(reports("/a?a?/").is_empty());
        assert!(reports("/a{0,3}a{1,4}b/").is_empty());
        assert_eq!(reports("/a{0,3}a*b/").len(), 1);
        assert!(reports("/\\d+\\.\\d+/").is_empty());
    }

    #[test]
    fn test_min_severity_filter() {
        let ast = parse_literal("/a*a*|(a+)+/").unwrap();
        let options = AnalysisOptions {
            min_severity: Severity::Exponential,
            ..AnalysisOptions::default()
        };
        let ctx = AnalysisContext::new(&ast, options);
        let found = ctx.backtracking();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].severity(), Severity::Exponential);
    }
}
