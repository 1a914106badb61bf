//! Sets of code points stored as sorted inclusive ranges.
//!
//! A `CharSet` is always normalized: ranges are sorted, disjoint and never
//! adjacent, so two sets are equal iff their range lists are equal. That
//! makes equality, subset and disjointness checks linear in the number of
//! ranges.

use std::fmt;

use smallvec::SmallVec;

/// Largest code point in UTF-16 (non-unicode) mode.
pub const MAX_CHAR_UTF16: u32 = 0xFFFF;

/// Largest Unicode code point.
pub const MAX_CHAR_UNICODE: u32 = 0x10FFFF;

/// An inclusive range of code points `[lo, hi]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharRange {
    pub lo: u32,
    pub hi: u32,
}

impl CharRange {
    #[inline]
    pub fn new(lo: u32, hi: u32) -> Self {
        debug_assert!(lo <= hi, "invalid range {lo:#x}-{hi:#x}");
        Self { lo, hi }
    }

    #[inline]
    pub fn single(c: u32) -> Self {
        Self { lo: c, hi: c }
    }

    #[inline]
    pub fn contains(&self, c: u32) -> bool {
        self.lo <= c && c <= self.hi
    }
}

type Ranges = SmallVec<[CharRange; 4]>;

/// An immutable set of code points.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct CharSet {
    ranges: Ranges,
}

impl CharSet {
    /// The empty set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every code point in `0..=max`.
    pub fn all(max: u32) -> Self {
        Self::from_range(0, max)
    }

    pub fn from_char(c: u32) -> Self {
        Self::from_range(c, c)
    }

    pub fn from_range(lo: u32, hi: u32) -> Self {
        let mut ranges = Ranges::new();
        ranges.push(CharRange::new(lo, hi));
        Self { ranges }
    }

    /// Build a set from arbitrary (unsorted, overlapping) ranges.
    pub fn from_ranges<I>(ranges: I) -> Self
    where
        I: IntoIterator<Item = CharRange>,
    {
        let mut rr: Ranges = ranges.into_iter().collect();
        if rr.is_empty() {
            return Self::empty();
        }
        rr.sort_by_key(|r| r.lo);

        let mut out = Ranges::with_capacity(rr.len());
        let mut current = rr[0];
        for next in rr.iter().skip(1).copied() {
            if next.lo > current.hi.saturating_add(1) {
                out.push(current);
                current = next;
                continue;
            }
            if next.hi > current.hi {
                current.hi = next.hi;
            }
        }
        out.push(current);
        Self { ranges: out }
    }

    pub fn from_chars<I>(chars: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        Self::from_ranges(chars.into_iter().map(CharRange::single))
    }

    #[inline]
    pub fn ranges(&self) -> &[CharRange] {
        &self.ranges
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True if the set covers every code point in `0..=max`.
    pub fn is_all(&self, max: u32) -> bool {
        matches!(self.ranges.as_slice(), [r] if r.lo == 0 && r.hi >= max)
    }

    /// Smallest code point in the set.
    pub fn first(&self) -> Option<u32> {
        self.ranges.first().map(|r| r.lo)
    }

    /// Number of code points in the set.
    pub fn len(&self) -> u64 {
        self.ranges
            .iter()
            .map(|r| u64::from(r.hi - r.lo) + 1)
            .sum()
    }

    pub fn contains(&self, c: u32) -> bool {
        // ranges are sorted, binary search on the upper bound
        let idx = self.ranges.partition_point(|r| r.hi < c);
        self.ranges.get(idx).is_some_and(|r| r.lo <= c)
    }

    pub fn union(&self, other: &CharSet) -> CharSet {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        CharSet::from_ranges(self.ranges.iter().chain(other.ranges.iter()).copied())
    }

    pub fn intersect(&self, other: &CharSet) -> CharSet {
        let mut out = Ranges::new();
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            let lo = a.lo.max(b.lo);
            let hi = a.hi.min(b.hi);
            if lo <= hi {
                out.push(CharRange::new(lo, hi));
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        CharSet { ranges: out }
    }

    /// Every code point in `self` that is not in `other`.
    pub fn subtract(&self, other: &CharSet) -> CharSet {
        if other.is_empty() || self.is_empty() {
            return self.clone();
        }
        let max = self.ranges[self.ranges.len() - 1].hi;
        self.intersect(&other.negate(max))
    }

    /// The complement of this set within `0..=max`.
    pub fn negate(&self, max: u32) -> CharSet {
        let mut out = Ranges::new();
        let mut point: u32 = 0;
        for r in &self.ranges {
            if r.lo > max {
                break;
            }
            if r.lo > point {
                out.push(CharRange::new(point, r.lo - 1));
            }
            point = match r.hi.checked_add(1) {
                Some(p) => p,
                None => return CharSet { ranges: out },
            };
        }
        if point <= max {
            out.push(CharRange::new(point, max));
        }
        CharSet { ranges: out }
    }

    pub fn is_disjoint_with(&self, other: &CharSet) -> bool {
        let (mut i, mut j) = (0, 0);
        while i < self.ranges.len() && j < other.ranges.len() {
            let a = self.ranges[i];
            let b = other.ranges[j];
            if a.lo.max(b.lo) <= a.hi.min(b.hi) {
                return false;
            }
            if a.hi < b.hi {
                i += 1;
            } else {
                j += 1;
            }
        }
        true
    }

    pub fn is_subset_of(&self, other: &CharSet) -> bool {
        self.ranges.iter().all(|r| {
            let idx = other.ranges.partition_point(|o| o.hi < r.lo);
            other
                .ranges
                .get(idx)
                .is_some_and(|o| o.lo <= r.lo && r.hi <= o.hi)
        })
    }

    pub fn is_superset_of(&self, other: &CharSet) -> bool {
        other.is_subset_of(self)
    }

    /// Iterate over every code point. Only sensible for small sets.
    pub fn chars(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|r| r.lo..=r.hi)
    }
}

impl fmt::Debug for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CharSet{self}")
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for r in &self.ranges {
            write_class_char(f, r.lo)?;
            if r.hi > r.lo {
                if r.hi > r.lo + 1 {
                    f.write_str("-")?;
                }
                write_class_char(f, r.hi)?;
            }
        }
        f.write_str("]")
    }
}

/// Write a code point the way it may appear inside a character class.
pub(crate) fn write_class_char(f: &mut fmt::Formatter<'_>, c: u32) -> fmt::Result {
    match char::from_u32(c) {
        Some(ch @ ('\\' | ']' | '[' | '-' | '^' | '/')) => write!(f, "\\{ch}"),
        Some('\n') => f.write_str("\\n"),
        Some('\r') => f.write_str("\\r"),
        Some('\t') => f.write_str("\\t"),
        Some(ch) if !ch.is_control() && c < 0x7F => write!(f, "{ch}"),
        _ if c <= 0xFFFF => write!(f, "\\u{c:04X}"),
        _ => write!(f, "\\u{{{c:X}}}"),
    }
}

/// Well-known character sets used by escapes and the dot.
pub mod sets {
    use super::{CharRange, CharSet};

    pub fn digit() -> CharSet {
        CharSet::from_range('0' as u32, '9' as u32)
    }

    pub fn word() -> CharSet {
        CharSet::from_ranges([
            CharRange::new('0' as u32, '9' as u32),
            CharRange::new('A' as u32, 'Z' as u32),
            CharRange::single('_' as u32),
            CharRange::new('a' as u32, 'z' as u32),
        ])
    }

    /// ECMAScript `\s`: WhiteSpace and LineTerminator.
    pub fn space() -> CharSet {
        CharSet::from_ranges([
            CharRange::new(0x09, 0x0D),
            CharRange::single(0x20),
            CharRange::single(0xA0),
            CharRange::single(0x1680),
            CharRange::new(0x2000, 0x200A),
            CharRange::new(0x2028, 0x2029),
            CharRange::single(0x202F),
            CharRange::single(0x205F),
            CharRange::single(0x3000),
            CharRange::single(0xFEFF),
        ])
    }

    pub fn line_terminator() -> CharSet {
        CharSet::from_ranges([
            CharRange::single(0x0A),
            CharRange::single(0x0D),
            CharRange::new(0x2028, 0x2029),
        ])
    }
}
