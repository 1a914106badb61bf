//! Automaton-buildable expressions.
//!
//! `Expr` is the small regular language the automata are built from. It has
//! no assertions, captures or backreferences; those are resolved (or
//! approximated) before an `Expr` is produced. The smart constructors keep
//! expressions flat so rendered fixes stay readable.

use std::fmt;

use super::char_set::{write_class_char, CharSet};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    /// A single character from the set.
    Chars(CharSet),
    /// Sequence; the empty sequence accepts only the empty word.
    Concat(Vec<Expr>),
    /// Union; the empty union accepts nothing.
    Alt(Vec<Expr>),
    /// `expr{min,max}`, `max == None` is unbounded.
    Repeat {
        min: u32,
        max: Option<u32>,
        expr: Box<Expr>,
    },
}

impl Expr {
    pub fn empty_word() -> Expr {
        Expr::Concat(Vec::new())
    }

    pub fn nothing() -> Expr {
        Expr::Alt(Vec::new())
    }

    pub fn chars(set: CharSet) -> Expr {
        if set.is_empty() {
            Expr::nothing()
        } else {
            Expr::Chars(set)
        }
    }

    /// Any string over `0..=max`.
    pub fn any_string(max: u32) -> Expr {
        Expr::repeat(Expr::Chars(CharSet::all(max)), 0, None)
    }

    /// The literal word `cps`.
    pub fn word(cps: &[u32]) -> Expr {
        Expr::concat(cps.iter().map(|&c| Expr::Chars(CharSet::from_char(c))).collect())
    }

    #[inline]
    pub fn is_empty_word(&self) -> bool {
        matches!(self, Expr::Concat(items) if items.is_empty())
    }

    #[inline]
    pub fn is_nothing(&self) -> bool {
        matches!(self, Expr::Alt(items) if items.is_empty())
    }

    pub fn concat(items: Vec<Expr>) -> Expr {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Concat(inner) => {
                    for e in inner {
                        push_folded(&mut out, e);
                    }
                }
                e if e.is_nothing() => return Expr::nothing(),
                e => push_folded(&mut out, e),
            }
        }
        if out.len() == 1 {
            out.pop().unwrap_or_else(Expr::empty_word)
        } else {
            Expr::Concat(out)
        }
    }

    pub fn alt(items: Vec<Expr>) -> Expr {
        let mut out: Vec<Expr> = Vec::with_capacity(items.len());
        let mut chars: Option<(usize, CharSet)> = None;
        let mut has_empty = false;

        let mut push = |e: Expr, out: &mut Vec<Expr>| match e {
            Expr::Chars(set) => match &mut chars {
                Some((_, acc)) => *acc = acc.union(&set),
                None => {
                    chars = Some((out.len(), set));
                    out.push(Expr::nothing());
                }
            },
            e if e.is_empty_word() => has_empty = true,
            e => {
                if !out.contains(&e) {
                    out.push(e);
                }
            }
        };

        for item in items {
            match item {
                Expr::Alt(inner) => {
                    for e in inner {
                        push(e, &mut out);
                    }
                }
                e => push(e, &mut out),
            }
        }
        if let Some((idx, set)) = chars {
            out[idx] = Expr::Chars(set);
        }

        let body = if out.len() == 1 {
            out.pop().unwrap_or_else(Expr::nothing)
        } else {
            Expr::Alt(out)
        };
        if has_empty {
            if body.is_nothing() {
                Expr::empty_word()
            } else {
                Expr::repeat(body, 0, Some(1))
            }
        } else {
            body
        }
    }

    pub fn repeat(expr: Expr, min: u32, max: Option<u32>) -> Expr {
        if max == Some(0) || expr.is_empty_word() {
            return Expr::empty_word();
        }
        if expr.is_nothing() {
            return if min == 0 {
                Expr::empty_word()
            } else {
                Expr::nothing()
            };
        }
        if min == 1 && max == Some(1) {
            return expr;
        }
        match expr {
            // (x?)* == x*, (x*)? == x*, (x+)* == x*
            Expr::Repeat {
                min: inner_min @ (0 | 1),
                max: inner_max,
                expr: inner,
            } if min <= 1
                && (max.is_none() || inner_max.is_none())
                && (min == 0 || inner_max.is_none()) =>
            {
                Expr::Repeat {
                    min: inner_min.min(min),
                    max: None,
                    expr: inner,
                }
            }
            expr => Expr::Repeat {
                min,
                max,
                expr: Box::new(expr),
            },
        }
    }

    /// True if the empty word is in the language.
    pub fn is_nullable(&self) -> bool {
        match self {
            Expr::Chars(_) => false,
            Expr::Concat(items) => items.iter().all(Expr::is_nullable),
            Expr::Alt(items) => items.iter().any(Expr::is_nullable),
            Expr::Repeat { min, expr, .. } => *min == 0 || expr.is_nullable(),
        }
    }

    /// Characters a non-empty word can start with, or end with if `reverse`.
    pub fn first_chars(&self, reverse: bool) -> CharSet {
        match self {
            Expr::Chars(set) => set.clone(),
            Expr::Concat(items) => {
                let mut out = CharSet::empty();
                let mut visit = |e: &Expr| {
                    out = out.union(&e.first_chars(reverse));
                    e.is_nullable()
                };
                if reverse {
                    for e in items.iter().rev() {
                        if !visit(e) {
                            break;
                        }
                    }
                } else {
                    for e in items {
                        if !visit(e) {
                            break;
                        }
                    }
                }
                out
            }
            Expr::Alt(items) => items
                .iter()
                .fold(CharSet::empty(), |acc, e| acc.union(&e.first_chars(reverse))),
            Expr::Repeat { max: Some(0), .. } => CharSet::empty(),
            Expr::Repeat { expr, .. } => expr.first_chars(reverse),
        }
    }

    /// Characters `c` such that the one-character word `c` is accepted.
    pub fn single_chars(&self) -> CharSet {
        match self {
            Expr::Chars(set) => set.clone(),
            Expr::Concat(items) => {
                let mut out = CharSet::empty();
                for (i, e) in items.iter().enumerate() {
                    let others_nullable = items
                        .iter()
                        .enumerate()
                        .all(|(j, o)| j == i || o.is_nullable());
                    if others_nullable {
                        out = out.union(&e.single_chars());
                    }
                }
                out
            }
            Expr::Alt(items) => items
                .iter()
                .fold(CharSet::empty(), |acc, e| acc.union(&e.single_chars())),
            Expr::Repeat { max: Some(0), .. } => CharSet::empty(),
            Expr::Repeat { min, expr, .. } => {
                if *min <= 1 || expr.is_nullable() {
                    expr.single_chars()
                } else {
                    CharSet::empty()
                }
            }
        }
    }

    /// Shortest and longest accepted word lengths; `None` when unbounded.
    /// The empty language yields `(u32::MAX, Some(0))`.
    pub fn length_range(&self) -> (u32, Option<u32>) {
        match self {
            Expr::Chars(_) => (1, Some(1)),
            Expr::Concat(items) => items.iter().fold((0, Some(0)), |(lo, hi), e| {
                let (elo, ehi) = e.length_range();
                let hi = match (hi, ehi) {
                    (Some(a), Some(b)) => Some(a.saturating_add(b)),
                    _ => None,
                };
                (lo.saturating_add(elo), hi)
            }),
            Expr::Alt(items) => items.iter().fold((u32::MAX, Some(0)), |(lo, hi), e| {
                let (elo, ehi) = e.length_range();
                let hi = match (hi, ehi) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    _ => None,
                };
                (lo.min(elo), hi)
            }),
            Expr::Repeat { min, max, expr } => {
                let (elo, ehi) = expr.length_range();
                let lo = if *min == 0 { 0 } else { elo.saturating_mul(*min) };
                let hi = match (max, ehi) {
                    (_, Some(0)) | (Some(0), _) => Some(0),
                    (Some(m), Some(h)) => Some(h.saturating_mul(*m)),
                    _ => None,
                };
                (lo, hi)
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Alt(items) if items.len() > 1 => 0,
            Expr::Concat(items) if items.len() > 1 => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Chars(set) => write_chars(f, set),
            Expr::Concat(items) if items.is_empty() => f.write_str("(?:)"),
            Expr::Concat(items) => {
                for item in items {
                    if item.precedence() < 1 {
                        write!(f, "(?:{item})")?;
                    } else {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
            Expr::Alt(items) if items.is_empty() => f.write_str("[]"),
            Expr::Alt(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("|")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Expr::Repeat { min, max, expr } => {
                if expr.precedence() < 2 || matches!(**expr, Expr::Repeat { .. }) {
                    write!(f, "(?:{expr})")?;
                } else {
                    write!(f, "{expr}")?;
                }
                match (*min, *max) {
                    (0, None) => f.write_str("*"),
                    (1, None) => f.write_str("+"),
                    (0, Some(1)) => f.write_str("?"),
                    (n, None) => write!(f, "{{{n},}}"),
                    (n, Some(m)) if n == m => write!(f, "{{{n}}}"),
                    (n, Some(m)) => write!(f, "{{{n},{m}}}"),
                }
            }
        }
    }
}

/// Push onto a sequence, folding `x x*` and `x* x` into `x+`.
fn push_folded(out: &mut Vec<Expr>, e: Expr) {
    if let Expr::Repeat {
        min: 0,
        max: None,
        expr,
    } = &e
    {
        if out.last() == Some(&**expr) {
            let expr = expr.clone();
            out.pop();
            out.push(Expr::Repeat {
                min: 1,
                max: None,
                expr,
            });
            return;
        }
    }
    if let Some(Expr::Repeat {
        min: min @ 0,
        max: None,
        expr,
    }) = out.last_mut()
    {
        if **expr == e {
            *min = 1;
            return;
        }
    }
    out.push(e);
}

fn write_chars(f: &mut fmt::Formatter<'_>, set: &CharSet) -> fmt::Result {
    if let [r] = set.ranges() {
        if r.lo == r.hi {
            return match char::from_u32(r.lo) {
                Some(c) if "\\^$.|?*+()[]{}/".contains(c) => write!(f, "\\{c}"),
                Some(c) if c.is_alphanumeric() || c == ' ' || "-_,;:'\"!@#%&=<>~`".contains(c) => {
                    write!(f, "{c}")
                }
                _ => {
                    f.write_str("[")?;
                    write_class_char(f, r.lo)?;
                    f.write_str("]")
                }
            };
        }
        if r.lo == 0 && (r.hi == 0xFFFF || r.hi == 0x10FFFF) {
            return f.write_str("[^]");
        }
    }
    write!(f, "{set}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ch(c: char) -> Expr {
        Expr::Chars(CharSet::from_char(c as u32))
    }

    #[test]
    fn test_concat_flattens_and_short_circuits() {
        let e = Expr::concat(vec![ch('a'), Expr::concat(vec![ch('b'), ch('c')])]);
        assert_eq!(e.to_string(), "abc");
        assert!(Expr::concat(vec![ch('a'), Expr::nothing()]).is_nothing());
        assert_eq!(Expr::concat(vec![ch('a')]), ch('a'));
    }

    #[test]
    fn test_alt_merges_chars_and_empty() {
        let e = Expr::alt(vec![ch('a'), ch('b'), Expr::word(&[b'x'.into(), b'y'.into()])]);
        assert_eq!(e.to_string(), "[ab]|xy");

        let opt = Expr::alt(vec![ch('a'), Expr::empty_word()]);
        assert_eq!(opt.to_string(), "a?");
        assert!(opt.is_nullable());
    }

    #[test]
    fn test_repeat_simplification() {
        let star = Expr::repeat(Expr::repeat(ch('a'), 1, None), 0, None);
        assert_eq!(star.to_string(), "a*");
        let plus = Expr::repeat(Expr::repeat(ch('a'), 1, None), 1, None);
        assert_eq!(plus.to_string(), "a+");
        assert_eq!(Expr::repeat(ch('a'), 2, Some(4)).to_string(), "a{2,4}");
        assert!(Expr::repeat(Expr::nothing(), 0, None).is_empty_word());
    }

    #[test]
    fn test_first_and_single_chars() {
        // a?bc*
        let e = Expr::concat(vec![
            Expr::repeat(ch('a'), 0, Some(1)),
            ch('b'),
            Expr::repeat(ch('c'), 0, None),
        ]);
        assert_eq!(e.first_chars(false), CharSet::from_range('a' as u32, 'b' as u32));
        assert_eq!(e.first_chars(true), CharSet::from_range('b' as u32, 'c' as u32));
        assert_eq!(e.single_chars(), CharSet::from_char('b' as u32));

        let twice = Expr::repeat(ch('a'), 2, None);
        assert!(twice.single_chars().is_empty());
        assert_eq!(twice.length_range(), (2, None));
        assert_eq!(e.length_range(), (1, None));
        assert_eq!(Expr::word(&['x' as u32, 'y' as u32]).length_range(), (2, Some(2)));
    }

    #[test]
    fn test_display_grouping() {
        let e = Expr::repeat(Expr::word(&['a' as u32, 'b' as u32]), 0, None);
        assert_eq!(e.to_string(), "(?:ab)*");
        let e = Expr::concat(vec![Expr::alt(vec![ch('a'), Expr::word(&['b' as u32, 'c' as u32])]), ch('d')]);
        assert_eq!(e.to_string(), "(?:a|bc)d");
    }
}
