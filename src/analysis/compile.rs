//! Native compilation of sub-trees to `Expr`.

use std::rc::Rc;

use crate::automaton::{sets, CharSet, Expr};
use crate::regexp::{CharacterSetKind, NodeId, NodeKind};

use super::{AnalysisContext, Compiled};

/// Sets larger than this are taken to be closed under case folding.
const FOLD_LIMIT: u64 = 20_000;

/// The language of a class: single characters plus strings of any other
/// length (from `\q{...}`).
#[derive(Debug, Clone, Default)]
pub(crate) struct ClassLanguage {
    pub chars: CharSet,
    pub strings: Vec<Vec<u32>>,
}

impl ClassLanguage {
    fn from_chars(chars: CharSet) -> Self {
        Self {
            chars,
            strings: Vec::new(),
        }
    }

    fn union(mut self, other: ClassLanguage) -> Self {
        self.chars = self.chars.union(&other.chars);
        for s in other.strings {
            if !self.strings.contains(&s) {
                self.strings.push(s);
            }
        }
        self
    }

    fn intersect(self, other: &ClassLanguage) -> Self {
        Self {
            chars: self.chars.intersect(&other.chars),
            strings: self
                .strings
                .into_iter()
                .filter(|s| other.strings.contains(s))
                .collect(),
        }
    }

    fn subtract(self, other: &ClassLanguage) -> Self {
        Self {
            chars: self.chars.subtract(&other.chars),
            strings: self
                .strings
                .into_iter()
                .filter(|s| !other.strings.contains(s))
                .collect(),
        }
    }

    fn into_expr(self) -> Expr {
        let mut items = vec![Expr::chars(self.chars)];
        items.extend(self.strings.iter().map(|s| Expr::word(s)));
        Expr::alt(items)
    }
}

impl AnalysisContext<'_> {
    /// Compile `id` natively. Memoized.
    pub fn compile(&self, id: NodeId) -> Compiled {
        if let Some(hit) = self.compiled.borrow().get(&id) {
            return hit.clone();
        }
        let (expr, partial) = self.compile_node(id);
        let compiled = Compiled {
            expr: Rc::new(expr),
            partial,
        };
        self.compiled.borrow_mut().insert(id, compiled.clone());
        compiled
    }

    fn compile_node(&self, id: NodeId) -> (Expr, bool) {
        let ast = self.ast;
        match ast.kind(id) {
            NodeKind::Pattern { alternatives }
            | NodeKind::Group { alternatives }
            | NodeKind::CapturingGroup { alternatives, .. } => {
                let mut partial = false;
                let items = alternatives
                    .iter()
                    .map(|&a| {
                        let c = self.compile(a);
                        partial |= c.partial;
                        (*c.expr).clone()
                    })
                    .collect();
                (Expr::alt(items), partial)
            }
            NodeKind::Alternative { elements } => {
                let mut partial = false;
                let items = elements
                    .iter()
                    .map(|&e| {
                        let c = self.compile(e);
                        partial |= c.partial;
                        (*c.expr).clone()
                    })
                    .collect();
                (Expr::concat(items), partial)
            }
            NodeKind::Quantifier {
                min, max, element, ..
            } => {
                let c = self.compile(*element);
                (Expr::repeat((*c.expr).clone(), *min, *max), c.partial)
            }
            NodeKind::Assertion(_) => (Expr::empty_word(), true),
            NodeKind::Backreference { .. } => (Expr::any_string(self.max_char), true),
            NodeKind::Character { .. }
            | NodeKind::CharacterClass { .. }
            | NodeKind::CharacterClassRange { .. }
            | NodeKind::CharacterSet(_)
            | NodeKind::ClassIntersection { .. }
            | NodeKind::ClassSubtraction { .. }
            | NodeKind::ExpressionCharacterClass { .. }
            | NodeKind::ClassStringDisjunction { .. }
            | NodeKind::StringAlternative { .. } => (self.class_language(id).into_expr(), false),
        }
    }

    /// The exact character set of a node that only ever consumes one
    /// character, or `None`.
    pub(crate) fn char_set(&self, id: NodeId) -> Option<CharSet> {
        match self.ast.kind(id) {
            NodeKind::Character { .. }
            | NodeKind::CharacterClassRange { .. }
            | NodeKind::CharacterSet(_) => Some(self.class_language(id).chars),
            NodeKind::CharacterClass { .. }
            | NodeKind::ExpressionCharacterClass { .. }
            | NodeKind::ClassIntersection { .. }
            | NodeKind::ClassSubtraction { .. } => {
                let lang = self.class_language(id);
                lang.strings.is_empty().then_some(lang.chars)
            }
            _ => None,
        }
    }

    pub(crate) fn class_language(&self, id: NodeId) -> ClassLanguage {
        let flags = self.ast.flags();
        match self.ast.kind(id) {
            NodeKind::Character { value } => {
                ClassLanguage::from_chars(self.fold(CharSet::from_char(*value)))
            }
            NodeKind::CharacterClassRange { min, max } => {
                let (lo, hi) = match (self.ast.kind(*min), self.ast.kind(*max)) {
                    (NodeKind::Character { value: lo }, NodeKind::Character { value: hi }) => {
                        (*lo, *hi)
                    }
                    _ => return ClassLanguage::default(),
                };
                ClassLanguage::from_chars(self.fold(CharSet::from_range(lo, hi)))
            }
            NodeKind::CharacterSet(kind) => {
                let max = self.max_char;
                let set = match *kind {
                    CharacterSetKind::Any if flags.dot_all => CharSet::all(max),
                    CharacterSetKind::Any => sets::line_terminator().negate(max),
                    CharacterSetKind::Digit { negate } => negated(sets::digit(), negate, max),
                    CharacterSetKind::Space { negate } => negated(sets::space(), negate, max),
                    CharacterSetKind::Word { negate } => {
                        let mut word = sets::word();
                        if flags.ignore_case && flags.is_unicode() {
                            // long s and kelvin sign fold into \w
                            word = word.union(&CharSet::from_chars([0x017F, 0x212A]));
                        }
                        negated(word, negate, max)
                    }
                };
                ClassLanguage::from_chars(set)
            }
            NodeKind::CharacterClass { negate, elements } => {
                let lang = elements
                    .iter()
                    .fold(ClassLanguage::default(), |acc, &e| acc.union(self.class_language(e)));
                if *negate {
                    ClassLanguage::from_chars(lang.chars.negate(self.max_char))
                } else {
                    lang
                }
            }
            NodeKind::ExpressionCharacterClass { negate, expression } => {
                let lang = self.class_language(*expression);
                if *negate {
                    ClassLanguage::from_chars(lang.chars.negate(self.max_char))
                } else {
                    lang
                }
            }
            NodeKind::ClassIntersection { left, right } => self
                .class_language(*left)
                .intersect(&self.class_language(*right)),
            NodeKind::ClassSubtraction { left, right } => self
                .class_language(*left)
                .subtract(&self.class_language(*right)),
            NodeKind::ClassStringDisjunction { alternatives } => alternatives
                .iter()
                .fold(ClassLanguage::default(), |acc, &a| acc.union(self.class_language(a))),
            NodeKind::StringAlternative { elements } => {
                let word: Vec<u32> = elements
                    .iter()
                    .filter_map(|&e| match self.ast.kind(e) {
                        NodeKind::Character { value } => Some(*value),
                        _ => None,
                    })
                    .collect();
                match word.as_slice() {
                    [c] => ClassLanguage::from_chars(self.fold(CharSet::from_char(*c))),
                    // case variants of strings are not expanded
                    _ => ClassLanguage {
                        chars: CharSet::empty(),
                        strings: vec![word],
                    },
                }
            }
            _ => ClassLanguage::default(),
        }
    }

    /// Close `set` under case folding when the `i` flag is set.
    pub(crate) fn fold(&self, set: CharSet) -> CharSet {
        let flags = self.ast.flags();
        if !flags.ignore_case || set.len() > FOLD_LIMIT {
            return set;
        }
        let unicode = flags.is_unicode();
        let mut extra = Vec::new();
        for c in set.chars() {
            let Some(ch) = char::from_u32(c) else {
                continue;
            };
            for variant in case_variants(ch, unicode) {
                if variant <= self.max_char && !set.contains(variant) {
                    extra.push(variant);
                }
            }
        }
        if extra.is_empty() {
            set
        } else {
            set.union(&CharSet::from_chars(extra))
        }
    }
}

fn negated(set: CharSet, negate: bool, max: u32) -> CharSet {
    if negate {
        set.negate(max)
    } else {
        set
    }
}

/// Simple one-to-one case variants of `c`.
fn case_variants(c: char, unicode: bool) -> Vec<u32> {
    let mut out = Vec::new();
    let mut push = |mapped: &mut dyn Iterator<Item = char>| {
        if let (Some(m), None) = (mapped.next(), mapped.next()) {
            // without `u`, non-ASCII never folds onto ASCII
            if m != c && (unicode || c.is_ascii() || !m.is_ascii()) {
                out.push(m as u32);
            }
        }
    };
    push(&mut c.to_lowercase());
    push(&mut c.to_uppercase());
    if unicode {
        let special = match c {
            'k' | 'K' => Some(0x212A),
            '\u{212A}' => Some('k' as u32),
            's' | 'S' => Some(0x017F),
            '\u{017F}' => Some('s' as u32),
            '\u{E5}' | '\u{C5}' => Some(0x212B),
            '\u{212B}' => Some(0xE5),
            _ => None,
        };
        out.extend(special);
    }
    for v in out.clone() {
        if let Some(vc) = char::from_u32(v) {
            for w in vc.to_lowercase().chain(vc.to_uppercase()) {
                if w != c && !out.contains(&(w as u32)) && (unicode || c.is_ascii() || !w.is_ascii()) {
                    out.push(w as u32);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::analysis::{AnalysisContext, AnalysisOptions};
    use crate::automaton::CharSet;
    use crate::regexp::parse_literal;

    fn first_element_set(literal: &str) -> CharSet {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alt = ast.kind(ast.root()).alternatives().unwrap()[0];
        let el = ast.kind(alt).elements().unwrap()[0];
        ctx.char_set(el).unwrap()
    }

    #[test]
    fn test_case_folding() {
        let set = first_element_set("/a/i");
        assert!(set.contains('a' as u32) && set.contains('A' as u32));
        assert_eq!(set.len(), 2);

        let set = first_element_set("/k/iu");
        assert!(set.contains(0x212A));
        assert!(!first_element_set("/k/i").contains(0x212A));
    }

    #[test]
    fn test_dot_and_classes() {
        let dot = first_element_set("/./");
        assert!(!dot.contains('\n' as u32));
        assert!(dot.contains('a' as u32));
        assert!(first_element_set("/./s").contains('\n' as u32));

        let neg = first_element_set("/[^a-c]/");
        assert!(!neg.contains('b' as u32));
        assert!(neg.contains(0xFFFF));
        assert!(!neg.contains(0x10000));

        let v = first_element_set("/[\\w--[a-z]]/v");
        assert!(v.contains('A' as u32));
        assert!(!v.contains('q' as u32));
    }

    #[test]
    fn test_compile_partiality() {
        let ast = parse_literal("/a(?=b)|\\bc|(d)\\1|e+/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = ast.kind(ast.root()).alternatives().unwrap().to_vec();
        let partial: Vec<bool> = alts.iter().map(|&a| ctx.compile(a).partial).collect();
        assert_eq!(partial, vec![true, true, true, false]);
        assert_eq!(ctx.compile(alts[3]).expr.to_string(), "e+");
        assert!(ctx.compile(ast.root()).partial);
    }

    #[test]
    fn test_class_strings() {
        let ast = parse_literal("/[\\q{ab|c}d]/v").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let expr = ctx.compile(ast.root()).expr;
        assert_eq!(expr.to_string(), "[cd]|ab");
    }
}
