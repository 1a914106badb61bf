//! Compilation through a single anchor node.
//!
//! `compile_partial(root, anchor)` keeps, at every disjunction between
//! `root` and `anchor`, only the alternative that leads to `anchor`. Nodes
//! off that path are compiled natively and shared with the context cache.

use std::cmp::Reverse;
use std::rc::Rc;

use crate::automaton::Expr;
use crate::regexp::{AssertionKind, NodeId, NodeKind};

use super::{AnalysisContext, Compiled};

impl AnalysisContext<'_> {
    /// Compile `root` so that every accepted string passes through `anchor`.
    ///
    /// `anchor` must be `root` or one of its descendants; otherwise `root`
    /// is compiled natively.
    pub fn compile_partial(&self, root: NodeId, anchor: NodeId) -> Compiled {
        if root == anchor || !self.ast.is_ancestor_or_self(root, anchor) {
            return self.compile(root);
        }
        let (expr, partial) = self.compile_path(root, anchor);
        Compiled {
            expr: Rc::new(expr),
            partial,
        }
    }

    fn native(&self, id: NodeId) -> (Expr, bool) {
        let c = self.compile(id);
        ((*c.expr).clone(), c.partial)
    }

    /// The child of `id` on the way to `anchor`.
    fn step_towards(&self, children: &[NodeId], anchor: NodeId) -> Option<NodeId> {
        children
            .iter()
            .copied()
            .find(|&c| self.ast.is_ancestor_or_self(c, anchor))
    }

    fn compile_path(&self, id: NodeId, anchor: NodeId) -> (Expr, bool) {
        if id == anchor {
            return self.native(id);
        }
        match self.ast.kind(id) {
            NodeKind::Pattern { alternatives }
            | NodeKind::Group { alternatives }
            | NodeKind::CapturingGroup { alternatives, .. }
            | NodeKind::ClassStringDisjunction { alternatives } => {
                match self.step_towards(alternatives, anchor) {
                    Some(alt) => self.compile_path(alt, anchor),
                    None => self.native(id),
                }
            }
            NodeKind::Assertion(
                AssertionKind::Lookahead { .. } | AssertionKind::Lookbehind { .. },
            ) => (Expr::empty_word(), true),
            NodeKind::Alternative { elements } => {
                let mut partial = false;
                let items = elements
                    .iter()
                    .map(|&e| {
                        let (expr, p) = if self.ast.is_ancestor_or_self(e, anchor) {
                            self.compile_path(e, anchor)
                        } else {
                            self.native(e)
                        };
                        partial |= p;
                        expr
                    })
                    .collect();
                (Expr::concat(items), partial)
            }
            NodeKind::Quantifier {
                min, max, element, ..
            } => {
                let (through, p) = self.compile_path(*element, anchor);
                if *max == Some(1) {
                    return (through, p);
                }
                let (free, fp) = self.native(*element);
                let (around, exact) = match *max {
                    None => (Expr::repeat(free, 0, None), *min <= 1),
                    Some(m) => (Expr::repeat(free, 0, Some(m - 1)), false),
                };
                let expr = Expr::concat(vec![around.clone(), through, around]);
                (expr, p || fp || !exact)
            }
            NodeKind::CharacterClass {
                negate: false,
                elements,
            } => match self.step_towards(elements, anchor) {
                Some(el) => self.compile_path(el, anchor),
                None => self.native(id),
            },
            // ranges reach here only for an anchor below them: a boundary
            NodeKind::CharacterClassRange { .. } => self.native(anchor),
            _ => {
                let (expr, _) = self.native(id);
                (expr, true)
            }
        }
    }

    /// Nested partial alternatives of `alternative`, most specific first.
    pub fn nested_alternatives(&self, alternative: NodeId) -> std::vec::IntoIter<NodeId> {
        let mut out = Vec::new();
        for child in self.ast.children(alternative) {
            self.collect_nested(child, &mut out);
        }
        out.sort_by_key(|&id| (Reverse(self.ast.depth(id)), self.ast.node(id).span.start));
        out.dedup();
        out.into_iter()
    }

    fn collect_nested(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::CharacterClass {
                negate: true, ..
            }
            | NodeKind::ExpressionCharacterClass {
                negate: true, ..
            } => return,
            NodeKind::CharacterClass {
                negate: false,
                elements,
            } if elements.len() > 1 => {
                for &el in elements {
                    match ast.kind(el) {
                        NodeKind::CharacterClassRange { min, max } => {
                            let (lo, hi) = match (ast.kind(*min), ast.kind(*max)) {
                                (
                                    NodeKind::Character { value: lo },
                                    NodeKind::Character { value: hi },
                                ) => (*lo, *hi),
                                _ => continue,
                            };
                            if hi > lo + 1 {
                                out.push(el);
                            }
                            if hi != lo {
                                out.push(*min);
                                out.push(*max);
                            }
                        }
                        _ => out.push(el),
                    }
                }
            }
            kind => {
                if let Some(alternatives) = kind.alternatives() {
                    if alternatives.len() > 1 {
                        out.extend_from_slice(alternatives);
                    }
                }
            }
        }
        for child in ast.children(id) {
            self.collect_nested(child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisContext, AnalysisOptions, Compiled};
    use crate::regexp::{parse_literal, NodeId, NodeKind, RegexAst};

    fn top(ast: &RegexAst) -> NodeId {
        ast.kind(ast.root()).alternatives().unwrap()[0]
    }

    fn accepts(ctx: &AnalysisContext, c: &Compiled, word: &str) -> bool {
        let automaton = ctx.build_automaton(&c.expr, c.partial).unwrap();
        let cps: Vec<u32> = word.chars().map(|c| c as u32).collect();
        automaton.dfa.accepts(&cps)
    }

    fn find(ast: &RegexAst, text: &str, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
        ast.ids()
            .find(|&id| ast.text(id) == text && pred(ast.kind(id)))
            .unwrap()
    }

    #[test]
    fn test_compile_through_alternative() {
        let ast = parse_literal("/x(?:a|b)y/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let b = find(&ast, "b", |k| matches!(k, NodeKind::Alternative { .. }));
        let c = ctx.compile_partial(top(&ast), b);
        assert!(!c.partial);
        assert!(accepts(&ctx, &c, "xby"));
        assert!(!accepts(&ctx, &c, "xay"));
    }

    #[test]
    fn test_compile_through_quantifier() {
        let ast = parse_literal("/(?:a|b)+c/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let b = find(&ast, "b", |k| matches!(k, NodeKind::Alternative { .. }));
        let c = ctx.compile_partial(top(&ast), b);
        assert!(!c.partial);
        assert!(accepts(&ctx, &c, "abac"));
        assert!(accepts(&ctx, &c, "bc"));
        assert!(!accepts(&ctx, &c, "aac"));

        let ast = parse_literal("/(?:a|b){2,3}/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let b = find(&ast, "b", |k| matches!(k, NodeKind::Alternative { .. }));
        let c = ctx.compile_partial(top(&ast), b);
        assert!(c.partial);
        assert!(accepts(&ctx, &c, "ab"));
        assert!(!accepts(&ctx, &c, "aa"));
    }

    #[test]
    fn test_compile_through_class() {
        let ast = parse_literal("/[a-fx]/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let f = find(&ast, "f", |k| matches!(k, NodeKind::Character { .. }));
        let c = ctx.compile_partial(top(&ast), f);
        assert!(accepts(&ctx, &c, "f"));
        assert!(!accepts(&ctx, &c, "a"));
        assert!(!accepts(&ctx, &c, "x"));
    }

    #[test]
    fn test_lookaround_on_path_is_erased() {
        let ast = parse_literal("/a(?=b|c)/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let c_alt = find(&ast, "c", |k| matches!(k, NodeKind::Alternative { .. }));
        let c = ctx.compile_partial(top(&ast), c_alt);
        assert!(c.partial);
        assert!(accepts(&ctx, &c, "a"));
    }

    #[test]
    fn test_nested_alternatives_order() {
        let ast = parse_literal("/[a-fx](?:y|(?:z|w))[^pq][g-h]/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let texts: Vec<&str> = ctx
            .nested_alternatives(top(&ast))
            .map(|id| ast.text(id))
            .collect();
        assert_eq!(texts, vec!["z", "w", "a", "f", "a-f", "x", "y", "(?:z|w)"]);
    }
}
