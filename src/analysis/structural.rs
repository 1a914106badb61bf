//! Syntax-driven language comparison.
//!
//! Sub-trees are compared through a normalized view: single alternatives
//! and single elements collapse, character-like nodes become their
//! `CharSet`, and `x{n,m}` stays a repeat that is unrolled lazily while
//! comparing. Answers are sound but incomplete; `false` means "not shown".

use std::rc::Rc;

use tracing::trace;

use crate::automaton::CharSet;
use crate::regexp::{MatchingDirection, NodeId, NodeKind};

use super::AnalysisContext;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum OpaqueKey {
    /// Equal text means equal behavior.
    Text(String),
    /// Only equal to itself.
    Node(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Norm {
    Chars(CharSet),
    Seq(Vec<Rc<Norm>>),
    Alt(Vec<Rc<Norm>>),
    Repeat {
        min: u32,
        max: Option<u32>,
        item: Rc<Norm>,
    },
    Opaque(OpaqueKey),
}

impl Norm {
    /// The same tree with every sequence read back to front.
    fn reversed(self: &Rc<Norm>) -> Rc<Norm> {
        match &**self {
            Norm::Seq(items) => {
                Rc::new(Norm::Seq(items.iter().rev().map(Norm::reversed).collect()))
            }
            Norm::Alt(items) => Rc::new(Norm::Alt(items.iter().map(Norm::reversed).collect())),
            Norm::Repeat { min, max, item } => Rc::new(Norm::Repeat {
                min: *min,
                max: *max,
                item: item.reversed(),
            }),
            Norm::Chars(_) | Norm::Opaque(_) => self.clone(),
        }
    }

    fn seq(items: Vec<Rc<Norm>>) -> Rc<Norm> {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match &*item {
                Norm::Seq(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(item),
            }
        }
        if flat.len() == 1 {
            flat.swap_remove(0)
        } else {
            Rc::new(Norm::Seq(flat))
        }
    }

    fn alt(items: Vec<Rc<Norm>>) -> Rc<Norm> {
        let mut flat: Vec<Rc<Norm>> = Vec::with_capacity(items.len());
        for item in items {
            match &*item {
                Norm::Alt(inner) => flat.extend(inner.iter().cloned()),
                _ => flat.push(item),
            }
        }
        if !flat.is_empty() && flat.iter().all(|n| matches!(**n, Norm::Chars(_))) {
            let set = flat.iter().fold(CharSet::empty(), |acc, n| match &**n {
                Norm::Chars(s) => acc.union(s),
                _ => acc,
            });
            return Rc::new(Norm::Chars(set));
        }
        if flat.len() == 1 {
            flat.swap_remove(0)
        } else {
            Rc::new(Norm::Alt(flat))
        }
    }

    fn repeat(item: Rc<Norm>, min: u32, max: Option<u32>) -> Rc<Norm> {
        match (min, max) {
            (_, Some(0)) => Rc::new(Norm::Seq(Vec::new())),
            (1, Some(1)) => item,
            _ => Rc::new(Norm::Repeat { min, max, item }),
        }
    }

    fn is_nullable(&self) -> bool {
        match self {
            Norm::Chars(_) | Norm::Opaque(_) => false,
            Norm::Seq(items) => items.iter().all(|n| n.is_nullable()),
            Norm::Alt(items) => items.iter().any(|n| n.is_nullable()),
            Norm::Repeat { min, item, .. } => *min == 0 || item.is_nullable(),
        }
    }
}

/// `l{lmin,lmax}` admits every count `r{rmin,rmax}` admits.
fn bounds_contain(lmin: u32, lmax: Option<u32>, rmin: u32, rmax: Option<u32>) -> bool {
    lmin <= rmin
        && match (lmax, rmax) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(l), Some(r)) => r <= l,
        }
}

fn with_rest(head: Vec<Rc<Norm>>, rest: &[Rc<Norm>]) -> Vec<Rc<Norm>> {
    let mut out = head;
    out.extend(rest.iter().cloned());
    out
}

/// One iteration of `item{min,max}` followed by the remaining repeat.
fn unroll(item: &Rc<Norm>, min: u32, max: Option<u32>) -> Vec<Rc<Norm>> {
    let rest = Norm::repeat(
        item.clone(),
        min.saturating_sub(1),
        max.map(|m| m.saturating_sub(1)),
    );
    vec![item.clone(), rest]
}

impl AnalysisContext<'_> {
    /// Normalized view of `id`. Memoized.
    pub(crate) fn normalize(&self, id: NodeId) -> Rc<Norm> {
        if let Some(hit) = self.norms.borrow().get(&id) {
            return hit.clone();
        }
        let norm = self.normalize_node(id);
        self.norms.borrow_mut().insert(id, norm.clone());
        norm
    }

    fn normalize_node(&self, id: NodeId) -> Rc<Norm> {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Pattern { alternatives }
            | NodeKind::Group { alternatives }
            | NodeKind::CapturingGroup { alternatives, .. } => {
                Norm::alt(alternatives.iter().map(|&a| self.normalize(a)).collect())
            }
            NodeKind::Alternative { elements } => {
                Norm::seq(elements.iter().map(|&e| self.normalize(e)).collect())
            }
            NodeKind::Quantifier {
                min, max, element, ..
            } => Norm::repeat(self.normalize(*element), *min, *max),
            NodeKind::Assertion(_) => {
                let entangled = ast.has_descendant(id, &mut |k| {
                    matches!(
                        k,
                        NodeKind::CapturingGroup { .. } | NodeKind::Backreference { .. }
                    )
                });
                if entangled {
                    Rc::new(Norm::Opaque(OpaqueKey::Node(id)))
                } else {
                    Rc::new(Norm::Opaque(OpaqueKey::Text(ast.text(id).to_string())))
                }
            }
            NodeKind::Backreference { .. } => Rc::new(Norm::Opaque(OpaqueKey::Node(id))),
            _ => {
                let lang = self.class_language(id);
                let mut items = vec![Rc::new(Norm::Chars(lang.chars))];
                for s in lang.strings {
                    items.push(Norm::seq(
                        s.into_iter()
                            .map(|c| Rc::new(Norm::Chars(CharSet::from_char(c))))
                            .collect(),
                    ));
                }
                Norm::alt(items)
            }
        }
    }

    /// True if `a` and `b` are shown to have the same language.
    pub fn equal_language(&self, a: NodeId, b: NodeId) -> bool {
        self.normalize(a) == self.normalize(b)
            || (self.covers(a, b, false) && self.covers(b, a, false))
    }

    /// True if every word of `right` is shown to be a word of `left`. With
    /// `can_omit_trailing`, `left` may finish before `right` in matching
    /// order: each word of `right` starts with a word of `left`, or ends
    /// with one inside a lookbehind.
    pub fn covers(&self, left: NodeId, right: NodeId, can_omit_trailing: bool) -> bool {
        self.fuel.set(self.options.structural_fuel);
        let (mut l, mut r) = (self.normalize(left), self.normalize(right));
        if can_omit_trailing && self.direction(right) == MatchingDirection::Rtl {
            l = l.reversed();
            r = r.reversed();
        }
        let result = self.covers_seq(&[l], &[r], can_omit_trailing);
        if self.fuel.get() == 0 {
            trace!(left = left.index(), right = right.index(), "structural comparison out of fuel");
        }
        result
    }

    fn burn(&self) -> bool {
        match self.fuel.get() {
            0 => false,
            f => {
                self.fuel.set(f - 1);
                true
            }
        }
    }

    fn covers_seq(&self, left: &[Rc<Norm>], right: &[Rc<Norm>], omit: bool) -> bool {
        if !self.burn() {
            return false;
        }
        if let Some(Norm::Seq(items)) = left.first().map(|n| &**n) {
            return self.covers_seq(&with_rest(items.clone(), &left[1..]), right, omit);
        }
        if let Some(Norm::Seq(items)) = right.first().map(|n| &**n) {
            return self.covers_seq(left, &with_rest(items.clone(), &right[1..]), omit);
        }

        let (l, r) = match (left.first(), right.first()) {
            (_, None) => return left.iter().all(|n| n.is_nullable()),
            (None, Some(_)) => return omit,
            (Some(l), Some(r)) => (l, r),
        };

        if let Norm::Alt(rs) = &**r {
            return rs
                .iter()
                .all(|ra| self.covers_seq(left, &with_rest(vec![ra.clone()], &right[1..]), omit));
        }
        if let Norm::Alt(ls) = &**l {
            return ls
                .iter()
                .any(|la| self.covers_seq(&with_rest(vec![la.clone()], &left[1..]), right, omit));
        }

        match (&**l, &**r) {
            (Norm::Chars(a), Norm::Chars(b)) => {
                return b.is_subset_of(a) && self.covers_seq(&left[1..], &right[1..], omit);
            }
            (Norm::Opaque(a), Norm::Opaque(b)) => {
                return a == b && self.covers_seq(&left[1..], &right[1..], omit);
            }
            (
                Norm::Repeat {
                    min: lmin,
                    max: lmax,
                    item: li,
                },
                Norm::Repeat {
                    min: rmin,
                    max: rmax,
                    item: ri,
                },
            ) => {
                if bounds_contain(*lmin, *lmax, *rmin, *rmax)
                    && self.covers_seq(&[li.clone()], &[ri.clone()], false)
                    && self.covers_seq(&left[1..], &right[1..], omit)
                {
                    return true;
                }
            }
            _ => {}
        }

        // an unbounded repeat on the left swallows one more item of the right
        if let Norm::Repeat {
            min: lmin,
            max: None,
            item: li,
        } = &**l
        {
            let absorbed = match &**r {
                Norm::Repeat { item: ri, .. } if *lmin == 0 => {
                    self.covers_seq(&[l.clone()], &[ri.clone()], false)
                }
                Norm::Repeat { item: ri, .. } => {
                    self.covers_seq(&[li.clone()], &[ri.clone()], false)
                }
                Norm::Chars(_) => self.covers_seq(&[li.clone()], &[r.clone()], false),
                _ => false,
            };
            if absorbed && self.covers_seq(left, &right[1..], omit) {
                return true;
            }
        }

        if let Norm::Repeat { min, max, item } = &**r {
            let rest = &right[1..];
            let once = with_rest(unroll(item, *min, *max), rest);
            return if *min == 0 {
                self.covers_seq(left, rest, omit) && self.covers_seq(left, &once, omit)
            } else {
                self.covers_seq(left, &once, omit)
            };
        }
        if let Norm::Repeat { min, max, item } = &**l {
            let rest = &left[1..];
            let once = with_rest(unroll(item, *min, *max), rest);
            return if *min == 0 {
                self.covers_seq(rest, right, omit) || self.covers_seq(&once, right, omit)
            } else {
                self.covers_seq(&once, right, omit)
            };
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisContext, AnalysisOptions};
    use crate::regexp::{parse_literal, NodeId, RegexAst};

    fn alternatives(ast: &RegexAst) -> Vec<NodeId> {
        ast.kind(ast.root()).alternatives().unwrap().to_vec()
    }

    fn check(literal: &str, f: impl Fn(&AnalysisContext, &[NodeId])) {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        f(&ctx, &alternatives(&ast));
    }

    #[test]
    fn test_equal_language_normalizes() {
        check("/cat|(?:c)(a)t|c[a]t/", |ctx, alts| {
            assert!(ctx.equal_language(alts[0], alts[1]));
            assert!(ctx.equal_language(alts[0], alts[2]));
        });
        check("/a{2}|aa|a{1,2}/", |ctx, alts| {
            assert!(ctx.equal_language(alts[0], alts[1]));
            assert!(!ctx.equal_language(alts[0], alts[2]));
        });
        check("/[ab]|a|b|(?:a|b)/", |ctx, alts| {
            assert!(ctx.equal_language(alts[0], alts[3]));
        });
    }

    #[test]
    fn test_omitted_side_follows_direction() {
        let lookbehind = |literal: &str| {
            let ast = parse_literal(literal).unwrap();
            let top = alternatives(&ast)[0];
            let assertion = ast.kind(top).elements().unwrap()[0];
            let alts = ast.children(assertion);
            let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
            (ctx.covers(alts[0], alts[1], true), ctx.covers(alts[0], alts[1], false))
        };
        // matching runs backwards, so `a` is not the first thing read in `ab`
        assert_eq!(lookbehind("/(?<=a|ab)/"), (false, false));
        assert_eq!(lookbehind("/(?<=b|ab)/"), (true, false));
        assert_eq!(lookbehind("/(?<=a+|ba+)/"), (true, false));

        check("/a|ab|ba/", |ctx, alts| {
            assert!(ctx.covers(alts[0], alts[1], true));
            assert!(!ctx.covers(alts[0], alts[2], true));
        });
    }

    #[test]
    fn test_covers() {
        check("/[a-z]+|ab|a*b|a*1/", |ctx, alts| {
            assert!(ctx.covers(alts[0], alts[1], false));
            assert!(!ctx.covers(alts[1], alts[0], false));
            assert!(ctx.covers(alts[0], alts[2], false));
            assert!(ctx.covers(alts[2], alts[1], false));
            assert!(!ctx.covers(alts[0], alts[3], false));
        });
        check("/a|ab|ba/", |ctx, alts| {
            assert!(!ctx.covers(alts[0], alts[1], false));
            assert!(ctx.covers(alts[0], alts[1], true));
            assert!(!ctx.covers(alts[0], alts[2], true));
        });
        check("/a*|a+|(?:aa)*/", |ctx, alts| {
            assert!(ctx.covers(alts[0], alts[1], false));
            assert!(ctx.covers(alts[0], alts[2], false));
            assert!(!ctx.covers(alts[1], alts[0], false));
        });
    }

    #[test]
    fn test_opaque_nodes() {
        check("/^a|^a|(a)\\1|(a)\\2/", |ctx, alts| {
            assert!(ctx.equal_language(alts[0], alts[1]));
            assert!(!ctx.equal_language(alts[2], alts[3]));
            assert!(!ctx.covers(alts[0], alts[2], false));
        });
    }

    #[test]
    fn test_fuel_exhaustion_is_false() {
        let ast = parse_literal("/(?:a|b)*c|(?:a|b)*(?:a|b)*c/").unwrap();
        let options = AnalysisOptions {
            structural_fuel: 3,
            ..AnalysisOptions::default()
        };
        let ctx = AnalysisContext::new(&ast, options);
        let alts = alternatives(&ast);
        assert!(!ctx.covers(alts[0], alts[1], false));
    }
}
