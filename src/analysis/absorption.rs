//! Bounded quantifiers absorbed by the quantifiers before them.
//!
//! `P Q{n,m}` is reducible to `P Q{n}` when an optional extra copy of Q's
//! element after P adds no new words.

use tracing::debug;

use crate::automaton::{Dfa, Expr};
use crate::regexp::{MatchingDirection, NodeId, NodeKind, RegexAst};

use super::{Absorption, AnalysisContext};

/// True if simplifying along `deps` could change what a capturing group
/// captures: a dependency contains a group, or a group holds some of the
/// dependencies but not all of them.
pub fn dependencies_capture(ast: &RegexAst, deps: &[NodeId]) -> bool {
    if deps.iter().any(|&d| ast.contains_capture(d)) {
        return true;
    }
    deps.iter()
        .flat_map(|&d| ast.ancestors(d))
        .filter(|&a| matches!(ast.kind(a), NodeKind::CapturingGroup { .. }))
        .any(|group| !deps.iter().all(|&d| ast.is_ancestor_or_self(group, d)))
}

impl AnalysisContext<'_> {
    /// Decide whether `quantifier` is absorbed by the quantifiers right
    /// before it.
    ///
    /// `preceding` is the unbroken run of quantifiers before `quantifier`,
    /// nearest first. The nearest one is tried on its own. A farther one is
    /// only tried together with everything between it and `quantifier`.
    ///
    /// # Panics
    ///
    /// If `quantifier` is not a quantifier node.
    pub fn can_absorb(&self, quantifier: NodeId, preceding: &[NodeId]) -> Absorption {
        assert!(
            self.ast.kind(quantifier).is_quantifier(),
            "can_absorb expects a quantifier, got {:?}",
            self.ast.kind(quantifier)
        );
        let NodeKind::Quantifier { min, max, .. } = *self.ast.kind(quantifier) else {
            return Absorption::No;
        };
        if max.is_some_and(|m| min >= m) {
            return Absorption::No;
        }
        let Some(&nearest) = preceding.first() else {
            return Absorption::No;
        };
        let mut dependencies = vec![quantifier];
        if self.absorbs(nearest, quantifier, &mut dependencies) {
            return Absorption::Yes { dependencies };
        }
        for end in 2..=preceding.len() {
            let chain = &preceding[..end];
            if self.absorbs_formally(chain, quantifier) {
                let mut dependencies = vec![quantifier];
                dependencies.extend_from_slice(chain);
                return Absorption::Yes { dependencies };
            }
        }
        Absorption::No
    }

    fn absorbs(&self, candidate: NodeId, q: NodeId, deps: &mut Vec<NodeId>) -> bool {
        let NodeKind::Quantifier {
            min, max, element, ..
        } = *self.ast.kind(candidate)
        else {
            return false;
        };
        if max.is_none() {
            if self.absorbs_cheaply(candidate, q) || self.absorbs_formally(&[candidate], q) {
                deps.push(candidate);
                return true;
            }
            return false;
        }
        // zero iterations leave no tail to absorb into
        if min == 0 {
            return false;
        }
        let tails = self.tail_quantifiers(element);
        if tails.is_empty() {
            return false;
        }
        let mark = deps.len();
        deps.push(candidate);
        for tail in tails {
            if !self.absorbs(tail, q, deps) {
                deps.truncate(mark);
                return false;
            }
        }
        true
    }

    fn absorbs_cheaply(&self, candidate: NodeId, q: NodeId) -> bool {
        let (
            NodeKind::Quantifier {
                greedy: true,
                element: outer,
                ..
            },
            NodeKind::Quantifier { element: inner, .. },
        ) = (self.ast.kind(candidate), self.ast.kind(q))
        else {
            return false;
        };
        match (self.char_set(*outer), self.char_set(*inner)) {
            (Some(outer), Some(inner)) => inner.is_subset_of(&outer),
            _ => false,
        }
    }

    /// `chain` (nearest first) followed by an optional copy of `q`'s element
    /// has the same language as `chain` alone.
    fn absorbs_formally(&self, chain: &[NodeId], q: NodeId) -> bool {
        let NodeKind::Quantifier { element, .. } = *self.ast.kind(q) else {
            return false;
        };
        let extra = self.compile(element);
        if extra.partial {
            return false;
        }
        let mut parts = Vec::with_capacity(chain.len() + 1);
        for &p in chain {
            let compiled = self.compile(p);
            if compiled.partial {
                return false;
            }
            parts.push((*compiled.expr).clone());
        }
        let optional = Expr::repeat((*extra.expr).clone(), 0, Some(1));
        // parts end up in source order
        let extended = match self.direction(q) {
            MatchingDirection::Ltr => {
                parts.reverse();
                let mut extended = parts.clone();
                extended.push(optional);
                extended
            }
            MatchingDirection::Rtl => {
                std::iter::once(optional).chain(parts.iter().cloned()).collect()
            }
        };
        let budget = self.options.node_budget;
        let alone = Dfa::from_expr(&Expr::concat(parts), self.max_char, budget);
        let extended = Dfa::from_expr(&Expr::concat(extended), self.max_char, budget);
        match (alone, extended) {
            (Ok(a), Ok(b)) => Dfa::structurally_equal(&a, &b),
            (Err(e), _) | (_, Err(e)) => {
                debug!(node = q.index(), error = %e, "absorption check abandoned");
                false
            }
        }
    }

    /// Quantifiers that end every match of `id`, or nothing if some match
    /// ends elsewhere.
    fn tail_quantifiers(&self, id: NodeId) -> Vec<NodeId> {
        match self.ast.kind(id) {
            NodeKind::Quantifier { .. } => vec![id],
            NodeKind::Group { alternatives } | NodeKind::CapturingGroup { alternatives, .. } => {
                let mut tails = Vec::new();
                for &alt in alternatives {
                    let Some(elements) = self.ast.kind(alt).elements() else {
                        return Vec::new();
                    };
                    let last = match self.direction(alt) {
                        MatchingDirection::Ltr => elements.last(),
                        MatchingDirection::Rtl => elements.first(),
                    };
                    let Some(&last) = last else {
                        return Vec::new();
                    };
                    let inner = self.tail_quantifiers(last);
                    if inner.is_empty() {
                        return Vec::new();
                    }
                    tails.extend(inner);
                }
                tails
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::dependencies_capture;
    use crate::analysis::{Absorption, AnalysisContext, AnalysisOptions};
    use crate::regexp::{parse_literal, NodeId, RegexAst};

    fn quantifier_at(ast: &RegexAst, text: &str) -> NodeId {
        ast.quantifiers()
            .into_iter()
            .find(|&q| ast.text(q) == text)
            .unwrap()
    }

    fn absorb(literal: &str, q: &str, candidate: &str) -> Absorption {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let q = quantifier_at(&ast, q);
        let candidate = quantifier_at(&ast, candidate);
        ctx.can_absorb(q, &[candidate])
    }

    #[test]
    fn test_unbounded_candidates() {
        assert!(matches!(
            absorb("/\\d*\\d{0,2}/", "\\d{0,2}", "\\d*"),
            Absorption::Yes { ref dependencies } if dependencies.len() == 2
        ));
        assert!(matches!(
            absorb("/(?:ab)*(?:ab){0,2}/", "(?:ab){0,2}", "(?:ab)*"),
            Absorption::Yes { .. }
        ));
        assert_eq!(absorb("/a*b{0,2}/", "b{0,2}", "a*"), Absorption::No);
        assert_eq!(
            absorb("/a*?a{0,2}/", "a{0,2}", "a*?"),
            Absorption::Yes {
                dependencies: absorb_deps("/a*?a{0,2}/", &["a{0,2}", "a*?"]),
            }
        );
    }

    fn absorb_deps(literal: &str, texts: &[&str]) -> Vec<NodeId> {
        let ast = parse_literal(literal).unwrap();
        texts.iter().map(|t| quantifier_at(&ast, t)).collect()
    }

    #[test]
    fn test_bounded_candidates() {
        let literal = "/(?:x\\d*){1,3}\\d{0,2}/";
        match absorb(literal, "\\d{0,2}", "(?:x\\d*){1,3}") {
            Absorption::Yes { dependencies } => {
                assert_eq!(
                    dependencies,
                    absorb_deps(literal, &["\\d{0,2}", "(?:x\\d*){1,3}", "\\d*"])
                );
            }
            Absorption::No => panic!("expected absorption"),
        }
        assert_eq!(
            absorb("/(?:x\\d*)?\\d{0,2}/", "\\d{0,2}", "(?:x\\d*)?"),
            Absorption::No
        );
        assert_eq!(absorb("/a{2,5}a{0,2}/", "a{0,2}", "a{2,5}"), Absorption::No);
    }

    #[test]
    fn test_capture_dependencies() {
        let ast = parse_literal("/a*(a{0,2})/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let q = quantifier_at(&ast, "a{0,2}");
        let cand = quantifier_at(&ast, "a*");
        let Absorption::Yes { dependencies } = ctx.can_absorb(q, &[cand]) else {
            panic!("expected absorption");
        };
        assert!(dependencies_capture(&ast, &dependencies));

        let ast = parse_literal("/(a*a{0,2})/").unwrap();
        let deps = vec![quantifier_at(&ast, "a{0,2}"), quantifier_at(&ast, "a*")];
        assert!(!dependencies_capture(&ast, &deps));
    }

    #[test]
    fn test_intervening_quantifier_blocks_absorption() {
        let literal = "/a*b*a{0,2}/";
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let found = ctx.absorptions();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].1, Absorption::No);

        // a farther quantifier only counts together with the nearer ones
        let literal = "/[ab]*b*a{0,2}/";
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let found = ctx.absorptions();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].1,
            Absorption::Yes {
                dependencies: absorb_deps(literal, &["a{0,2}", "b*", "[ab]*"]),
            }
        );
    }

    #[test]
    fn test_driver() {
        let ast = parse_literal("/\\d*\\d{0,2}x{1,3}/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let found = ctx.absorptions();
        assert_eq!(found.len(), 2);
        assert_eq!(ast.text(found[0].0), "\\d{0,2}");
        assert!(matches!(found[0].1, Absorption::Yes { .. }));
        assert_eq!(ast.text(found[1].0), "x{1,3}");
        assert_eq!(found[1].1, Absorption::No);
    }

    #[test]
    #[should_panic(expected = "can_absorb expects a quantifier")]
    fn test_non_quantifier_panics() {
        let ast = parse_literal("/ab/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alt = ast.kind(ast.root()).alternatives().unwrap()[0];
        ctx.can_absorb(alt, &[]);
    }
}
