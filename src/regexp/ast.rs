//! Arena-based syntax tree for ECMAScript regular expressions.
//!
//! Nodes live in one `Vec` and are addressed by `NodeId`, an index that is
//! cheap to copy and usable as a cache key. Parent links are plain ids, so
//! the tree can be walked upwards without reference cycles.

use std::fmt;

use crate::automaton::{MAX_CHAR_UNICODE, MAX_CHAR_UTF16};

/// A node identifier - an index into `RegexAst::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Byte offsets `[start, end)` into the pattern source.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CharacterSetKind {
    /// `.`
    Any,
    /// `\d` / `\D`
    Digit { negate: bool },
    /// `\s` / `\S`
    Space { negate: bool },
    /// `\w` / `\W`
    Word { negate: bool },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum AssertionKind {
    /// `^`
    Start,
    /// `$`
    End,
    /// `\b` / `\B`
    WordBoundary { negate: bool },
    /// `(?=...)` / `(?!...)`
    Lookahead {
        negate: bool,
        alternatives: Vec<NodeId>,
    },
    /// `(?<=...)` / `(?<!...)`
    Lookbehind {
        negate: bool,
        alternatives: Vec<NodeId>,
    },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Pattern {
        alternatives: Vec<NodeId>,
    },
    Alternative {
        elements: Vec<NodeId>,
    },
    /// `(?:...)`
    Group {
        alternatives: Vec<NodeId>,
    },
    /// `(...)` / `(?<name>...)`
    CapturingGroup {
        index: u32,
        name: Option<String>,
        alternatives: Vec<NodeId>,
    },
    Quantifier {
        min: u32,
        /// `None` is unbounded.
        max: Option<u32>,
        greedy: bool,
        element: NodeId,
    },
    Character {
        value: u32,
    },
    CharacterClass {
        negate: bool,
        elements: Vec<NodeId>,
    },
    /// `min` and `max` are `Character` nodes.
    CharacterClassRange {
        min: NodeId,
        max: NodeId,
    },
    CharacterSet(CharacterSetKind),
    Assertion(AssertionKind),
    /// `\1` / `\k<name>`, resolved to its capturing group.
    Backreference {
        group: NodeId,
    },
    /// `[A&&B]` under the `v` flag.
    ClassIntersection {
        left: NodeId,
        right: NodeId,
    },
    /// `[A--B]` under the `v` flag.
    ClassSubtraction {
        left: NodeId,
        right: NodeId,
    },
    /// A class whose body is a set operation under the `v` flag.
    ExpressionCharacterClass {
        negate: bool,
        expression: NodeId,
    },
    /// `\q{abc|def}`
    ClassStringDisjunction {
        alternatives: Vec<NodeId>,
    },
    /// One alternative of a `\q{...}`; elements are `Character`s.
    StringAlternative {
        elements: Vec<NodeId>,
    },
}

impl NodeKind {
    /// The alternatives of a disjunction-like node.
    pub fn alternatives(&self) -> Option<&[NodeId]> {
        match self {
            NodeKind::Pattern { alternatives }
            | NodeKind::Group { alternatives }
            | NodeKind::CapturingGroup { alternatives, .. }
            | NodeKind::ClassStringDisjunction { alternatives }
            | NodeKind::Assertion(AssertionKind::Lookahead { alternatives, .. })
            | NodeKind::Assertion(AssertionKind::Lookbehind { alternatives, .. }) => {
                Some(alternatives)
            }
            _ => None,
        }
    }

    /// The ordered elements of a sequence-like node.
    pub fn elements(&self) -> Option<&[NodeId]> {
        match self {
            NodeKind::Alternative { elements } | NodeKind::StringAlternative { elements } => {
                Some(elements)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_quantifier(&self) -> bool {
        matches!(self, NodeKind::Quantifier { .. })
    }
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
}

/// Pattern flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct Flags {
    pub ignore_case: bool,
    pub multiline: bool,
    pub dot_all: bool,
    pub global: bool,
    pub sticky: bool,
    pub unicode: bool,
    pub unicode_sets: bool,
}

impl Flags {
    /// Parse a flag string such as `"giu"`. Unknown or repeated flags are rejected.
    pub fn parse(flags: &str) -> Result<Self, crate::AuditError> {
        let mut out = Flags::default();
        for (offset, c) in flags.char_indices() {
            let slot = match c {
                'i' => &mut out.ignore_case,
                'm' => &mut out.multiline,
                's' => &mut out.dot_all,
                'g' => &mut out.global,
                'y' => &mut out.sticky,
                'u' => &mut out.unicode,
                'v' => &mut out.unicode_sets,
                'd' => continue,
                _ => {
                    return Err(crate::AuditError::Parse {
                        message: format!("invalid flag '{c}'"),
                        offset,
                    })
                }
            };
            if *slot {
                return Err(crate::AuditError::Parse {
                    message: format!("duplicate flag '{c}'"),
                    offset,
                });
            }
            *slot = true;
        }
        if out.unicode && out.unicode_sets {
            return Err(crate::AuditError::Parse {
                message: "flags 'u' and 'v' are mutually exclusive".into(),
                offset: 0,
            });
        }
        Ok(out)
    }

    /// True in either unicode mode.
    #[inline]
    pub fn is_unicode(&self) -> bool {
        self.unicode || self.unicode_sets
    }

    /// Largest code point a character can take.
    #[inline]
    pub fn max_char(&self) -> u32 {
        if self.is_unicode() {
            MAX_CHAR_UNICODE
        } else {
            MAX_CHAR_UTF16
        }
    }
}

/// Matching direction; lookbehinds match right to left.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MatchingDirection {
    Ltr,
    Rtl,
}

/// A parsed pattern.
#[derive(Clone)]
pub struct RegexAst {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
    pub(crate) flags: Flags,
    pub(crate) source: String,
}

impl fmt::Debug for RegexAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexAst")
            .field("source", &self.source)
            .field("flags", &self.flags)
            .field("nodes_count", &self.nodes.len())
            .finish()
    }
}

impl RegexAst {
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn flags(&self) -> Flags {
        self.flags
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Panics if `id` does not belong to this tree.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    #[inline]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// Source text of a node.
    pub fn text(&self, id: NodeId) -> &str {
        let span = self.node(id).span;
        &self.source[span.start..span.end]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids in source order (pre-order).
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let mut children = self.children(id);
            children.reverse();
            stack.extend(children);
        }
        order.into_iter()
    }

    /// Direct children in source order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            NodeKind::Pattern { alternatives }
            | NodeKind::Group { alternatives }
            | NodeKind::CapturingGroup { alternatives, .. }
            | NodeKind::ClassStringDisjunction { alternatives }
            | NodeKind::Assertion(AssertionKind::Lookahead { alternatives, .. })
            | NodeKind::Assertion(AssertionKind::Lookbehind { alternatives, .. }) => {
                alternatives.clone()
            }
            NodeKind::Alternative { elements }
            | NodeKind::StringAlternative { elements }
            | NodeKind::CharacterClass { elements, .. } => elements.clone(),
            NodeKind::Quantifier { element, .. } => vec![*element],
            NodeKind::CharacterClassRange { min, max } => vec![*min, *max],
            NodeKind::ClassIntersection { left, right }
            | NodeKind::ClassSubtraction { left, right } => vec![*left, *right],
            NodeKind::ExpressionCharacterClass { expression, .. } => vec![*expression],
            NodeKind::Character { .. }
            | NodeKind::CharacterSet(_)
            | NodeKind::Assertion(_)
            | NodeKind::Backreference { .. } => Vec::new(),
        }
    }

    /// Iterate from `id` (exclusive) up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    /// True if `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        id == ancestor || self.ancestors(id).any(|a| a == ancestor)
    }

    /// Number of ancestors.
    pub fn depth(&self, id: NodeId) -> usize {
        self.ancestors(id).count()
    }

    /// True if `id` or a descendant satisfies `pred`.
    pub fn has_descendant(&self, id: NodeId, pred: &mut impl FnMut(&NodeKind) -> bool) -> bool {
        if pred(self.kind(id)) {
            return true;
        }
        self.children(id)
            .into_iter()
            .any(|c| self.has_descendant(c, pred))
    }

    /// True if `id` contains a capturing group.
    pub fn contains_capture(&self, id: NodeId) -> bool {
        self.has_descendant(id, &mut |k| matches!(k, NodeKind::CapturingGroup { .. }))
    }

    /// Matching direction at `id`, decided by the innermost lookaround.
    pub fn direction(&self, id: NodeId) -> MatchingDirection {
        for a in self.ancestors(id) {
            match self.kind(a) {
                NodeKind::Assertion(AssertionKind::Lookbehind { .. }) => {
                    return MatchingDirection::Rtl
                }
                NodeKind::Assertion(AssertionKind::Lookahead { .. }) => {
                    return MatchingDirection::Ltr
                }
                _ => {}
            }
        }
        MatchingDirection::Ltr
    }

    /// Every disjunction-like node (pattern, groups, lookarounds), in source order.
    pub fn disjunctions(&self) -> Vec<NodeId> {
        self.ids()
            .filter(|&id| {
                matches!(
                    self.kind(id),
                    NodeKind::Pattern { .. }
                        | NodeKind::Group { .. }
                        | NodeKind::CapturingGroup { .. }
                        | NodeKind::Assertion(AssertionKind::Lookahead { .. })
                        | NodeKind::Assertion(AssertionKind::Lookbehind { .. })
                )
            })
            .collect()
    }

    /// Every quantifier, in source order.
    pub fn quantifiers(&self) -> Vec<NodeId> {
        self.ids().filter(|&id| self.kind(id).is_quantifier()).collect()
    }
}
