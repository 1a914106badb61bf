//! ECMAScript pattern parser.
//!
//! Parses pattern source plus flags into a `RegexAst`. Supports:
//! - `|` alternation, `(...)`, `(?:...)` and `(?<name>...)` groups
//! - `^`, `$`, `\b`, `\B` and the four lookarounds
//! - `?`, `*`, `+`, `{n}`, `{n,}`, `{n,m}` with lazy variants
//! - `.`, `\d`, `\s`, `\w` and their negations
//! - `[...]` classes with ranges, and under `v` nested classes, `&&`, `--`
//!   and `\q{...}`
//! - numbered and named backreferences
//!
//! Annex B leniency (lone `]`, `{`, `}`, identity escapes, legacy octal) applies
//! without the `u` and `v` flags.

use rustc_hash::FxHashMap;

use super::ast::{
    AssertionKind, CharacterSetKind, Flags, Node, NodeId, NodeKind, RegexAst, Span,
};
use crate::AuditError;

/// Characters that may be escaped under the unicode flags.
const SYNTAX_CHARS: &str = "^$\\.*+?()[]{}|/";

enum BackrefTarget {
    Index(u32),
    Name(String),
}

/// Parser state.
struct RegexpParse<'a> {
    source: &'a str,
    index: usize,
    last_index: usize,
    flags: Flags,
    nodes: Vec<Node>,
    /// Capturing groups found by the prescan.
    group_count: u32,
    has_named_groups: bool,
    captures: Vec<NodeId>,
    names: FxHashMap<String, NodeId>,
    pending_refs: Vec<(NodeId, BackrefTarget, usize)>,
}

impl<'a> RegexpParse<'a> {
    fn new(source: &'a str, flags: Flags) -> Self {
        let (group_count, has_named_groups) = count_capturing_groups(source, flags);
        Self {
            source,
            index: 0,
            last_index: 0,
            flags,
            nodes: Vec::new(),
            group_count,
            has_named_groups,
            captures: Vec::new(),
            names: FxHashMap::default(),
            pending_refs: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> AuditError {
        AuditError::Parse {
            message: message.into(),
            offset,
        }
    }

    fn next_rune(&mut self) -> Result<char, AuditError> {
        let c = self.peek().ok_or_else(|| self.error("end of pattern", self.index))?;
        self.last_index = self.index;
        self.index += c.len_utf8();
        Ok(c)
    }

    fn peek(&self) -> Option<char> {
        self.source[self.index..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.source[self.index..].chars().nth(n)
    }

    fn looking_at(&self, s: &str) -> bool {
        self.source[self.index..].starts_with(s)
    }

    fn require(&mut self, wanted: char) -> Result<(), AuditError> {
        let at = self.index;
        match self.peek() {
            Some(got) if got == wanted => {
                self.next_rune()?;
                Ok(())
            }
            Some(got) => Err(self.error(format!("expected '{wanted}', got '{got}'"), at)),
            None => Err(self.error(format!("expected '{wanted}', got end of pattern"), at)),
        }
    }

    /// Consume `c` if it is next.
    fn bypass_optional(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.last_index = self.index;
            self.index += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn backup1(&mut self, one_rune: char) {
        self.index -= one_rune.len_utf8();
    }

    fn is_empty(&self) -> bool {
        self.index >= self.source.len()
    }

    fn alloc(&mut self, kind: NodeKind, start: usize) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            kind,
            span: Span::new(start, self.index),
            parent: None,
        });
        id
    }

    fn character(&mut self, value: u32, start: usize) -> NodeId {
        self.alloc(NodeKind::Character { value }, start)
    }

    fn char_value(&self, id: NodeId) -> Option<u32> {
        match self.nodes[id.index()].kind {
            NodeKind::Character { value } => Some(value),
            _ => None,
        }
    }

    fn is_unicode(&self) -> bool {
        self.flags.is_unicode()
    }
}

/// Parse `source` under `flags`.
pub fn parse_regex(source: &str, flags: Flags) -> Result<RegexAst, AuditError> {
    let mut parse = RegexpParse::new(source, flags);
    let alternatives = read_disjunction(&mut parse)?;
    if !parse.is_empty() {
        return Err(parse.error("unmatched ')'", parse.index));
    }
    let root = parse.alloc(NodeKind::Pattern { alternatives }, 0);
    parse.nodes[root.index()].span = Span::new(0, source.len());
    resolve_backreferences(&mut parse)?;

    let mut ast = RegexAst {
        nodes: parse.nodes,
        root,
        flags,
        source: source.to_string(),
    };
    link_parents(&mut ast);
    Ok(ast)
}

/// Parse a literal of the form `/source/flags`.
pub fn parse_literal(literal: &str) -> Result<RegexAst, AuditError> {
    let body = literal.strip_prefix('/').ok_or_else(|| AuditError::Parse {
        message: "literal must start with '/'".into(),
        offset: 0,
    })?;
    let close = body.rfind('/').ok_or_else(|| AuditError::Parse {
        message: "unterminated literal".into(),
        offset: literal.len(),
    })?;
    let flags = Flags::parse(&body[close + 1..]).map_err(|e| match e {
        AuditError::Parse { message, offset } => AuditError::Parse {
            message,
            offset: offset + close + 2,
        },
        e => e,
    })?;
    parse_regex(&body[..close], flags).map_err(|e| match e {
        AuditError::Parse { message, offset } => AuditError::Parse {
            message,
            offset: offset + 1,
        },
        e => e,
    })
}

fn link_parents(ast: &mut RegexAst) {
    let mut stack = vec![ast.root];
    while let Some(id) = stack.pop() {
        for child in ast.children(id) {
            ast.nodes[child.index()].parent = Some(id);
            stack.push(child);
        }
    }
}

fn resolve_backreferences(parse: &mut RegexpParse) -> Result<(), AuditError> {
    for (id, target, offset) in std::mem::take(&mut parse.pending_refs) {
        let group = match &target {
            BackrefTarget::Index(i) => parse.captures.get(*i as usize - 1).copied(),
            BackrefTarget::Name(name) => parse.names.get(name).copied(),
        };
        let group = group.ok_or_else(|| parse.error("invalid backreference", offset))?;
        parse.nodes[id.index()].kind = NodeKind::Backreference { group };
    }
    Ok(())
}

/// Count capturing groups ahead of time so `\N` can be told apart from a
/// legacy octal escape.
fn count_capturing_groups(source: &str, flags: Flags) -> (u32, bool) {
    let mut count = 0;
    let mut named = false;
    let mut class_depth = 0u32;
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '[' if class_depth == 0 || flags.unicode_sets => class_depth += 1,
            ']' if class_depth > 0 => class_depth -= 1,
            '(' if class_depth == 0 => {
                let mut ahead = chars.clone();
                match ahead.next() {
                    Some('?') => {
                        if ahead.next() == Some('<') && !matches!(ahead.next(), Some('=' | '!')) {
                            count += 1;
                            named = true;
                        }
                    }
                    _ => count += 1,
                }
            }
            _ => {}
        }
    }
    (count, named)
}

/// Read alternatives separated by `|`, up to `)` or the end.
fn read_disjunction(parse: &mut RegexpParse) -> Result<Vec<NodeId>, AuditError> {
    let mut alternatives = vec![read_alternative(parse)?];
    while parse.bypass_optional('|') {
        alternatives.push(read_alternative(parse)?);
    }
    Ok(alternatives)
}

/// Read one alternative (sequence of terms).
fn read_alternative(parse: &mut RegexpParse) -> Result<NodeId, AuditError> {
    let start = parse.index;
    let mut elements = Vec::new();
    while let Some(c) = parse.peek() {
        if c == '|' || c == ')' {
            break;
        }
        read_term(parse, &mut elements)?;
    }
    Ok(parse.alloc(NodeKind::Alternative { elements }, start))
}

/// Read an assertion, or an atom with its optional quantifier.
fn read_term(parse: &mut RegexpParse, elements: &mut Vec<NodeId>) -> Result<(), AuditError> {
    let start = parse.index;
    if parse.bypass_optional('^') {
        elements.push(parse.alloc(NodeKind::Assertion(AssertionKind::Start), start));
        return Ok(());
    }
    if parse.bypass_optional('$') {
        elements.push(parse.alloc(NodeKind::Assertion(AssertionKind::End), start));
        return Ok(());
    }
    if parse.looking_at("\\b") || parse.looking_at("\\B") {
        parse.next_rune()?;
        let negate = parse.next_rune()? == 'B';
        elements.push(parse.alloc(
            NodeKind::Assertion(AssertionKind::WordBoundary { negate }),
            start,
        ));
        return Ok(());
    }
    for (prefix, behind, negate) in [
        ("(?=", false, false),
        ("(?!", false, true),
        ("(?<=", true, false),
        ("(?<!", true, true),
    ] {
        if parse.looking_at(prefix) {
            parse.index += prefix.len();
            let alternatives = read_disjunction(parse)?;
            parse.require(')')?;
            let kind = if behind {
                AssertionKind::Lookbehind {
                    negate,
                    alternatives,
                }
            } else {
                AssertionKind::Lookahead {
                    negate,
                    alternatives,
                }
            };
            elements.push(parse.alloc(NodeKind::Assertion(kind), start));
            return Ok(());
        }
    }

    // Outside the unicode modes an astral character is two code units; only
    // the trailing one takes the quantifier.
    if let Some(c) = parse.peek() {
        if c as u32 > 0xFFFF && !parse.is_unicode() {
            parse.next_rune()?;
            let (hi, lo) = surrogates(c as u32);
            elements.push(parse.character(hi, start));
            let atom = parse.character(lo, start);
            let piece = read_quantifier(parse, atom, start)?;
            elements.push(piece);
            return Ok(());
        }
    }

    let atom = read_atom(parse)?;
    let piece = read_quantifier(parse, atom, start)?;
    elements.push(piece);
    Ok(())
}

fn surrogates(c: u32) -> (u32, u32) {
    let v = c - 0x10000;
    (0xD800 + (v >> 10), 0xDC00 + (v & 0x3FF))
}

/// Read an atom.
fn read_atom(parse: &mut RegexpParse) -> Result<NodeId, AuditError> {
    let start = parse.index;
    let b = parse.next_rune()?;

    match b {
        '.' => Ok(parse.alloc(NodeKind::CharacterSet(CharacterSetKind::Any), start)),
        '(' => read_group(parse, start),
        '[' => read_char_class(parse, start),
        '\\' => read_atom_escape(parse, start),
        '*' | '+' | '?' => Err(parse.error("nothing to repeat", start)),
        '{' => {
            parse.backup1(b);
            if parse.is_unicode() || try_read_braces(parse)?.is_some() {
                Err(parse.error("nothing to repeat", start))
            } else {
                parse.next_rune()?;
                Ok(parse.character('{' as u32, start))
            }
        }
        ']' | '}' if parse.is_unicode() => Err(parse.error("lone quantifier bracket", start)),
        c => Ok(parse.character(c as u32, start)),
    }
}

/// Read a group after its `(`.
fn read_group(parse: &mut RegexpParse, start: usize) -> Result<NodeId, AuditError> {
    if parse.bypass_optional('?') {
        if parse.bypass_optional(':') {
            let alternatives = read_disjunction(parse)?;
            parse.require(')')?;
            return Ok(parse.alloc(NodeKind::Group { alternatives }, start));
        }
        if parse.bypass_optional('<') {
            let name = read_group_name(parse)?;
            if parse.names.contains_key(&name) {
                return Err(parse.error(format!("duplicate capture group name '{name}'"), start));
            }
            return read_capturing_group(parse, start, Some(name));
        }
        return Err(parse.error("invalid group", start));
    }
    read_capturing_group(parse, start, None)
}

fn read_capturing_group(
    parse: &mut RegexpParse,
    start: usize,
    name: Option<String>,
) -> Result<NodeId, AuditError> {
    // Numbered by opening parenthesis; reserve the slot before the body.
    let slot = parse.captures.len();
    parse.captures.push(NodeId::from_index(usize::MAX >> 1));
    let alternatives = read_disjunction(parse)?;
    parse.require(')')?;
    let id = parse.alloc(
        NodeKind::CapturingGroup {
            index: slot as u32 + 1,
            name: name.clone(),
            alternatives,
        },
        start,
    );
    parse.captures[slot] = id;
    if let Some(name) = name {
        parse.names.insert(name, id);
    }
    Ok(id)
}

/// Read `name>`.
fn read_group_name(parse: &mut RegexpParse) -> Result<String, AuditError> {
    let start = parse.index;
    let mut name = String::new();
    loop {
        let c = parse
            .next_rune()
            .map_err(|_| parse.error("unterminated group name", start))?;
        if c == '>' {
            break;
        }
        let valid = if name.is_empty() {
            c.is_alphabetic() || c == '_' || c == '$'
        } else {
            c.is_alphanumeric() || c == '_' || c == '$'
        };
        if !valid {
            return Err(parse.error("invalid group name", parse.last_index));
        }
        name.push(c);
    }
    if name.is_empty() {
        return Err(parse.error("empty group name", start));
    }
    Ok(name)
}

/// Read an escape outside a class, after its `\`.
fn read_atom_escape(parse: &mut RegexpParse, start: usize) -> Result<NodeId, AuditError> {
    let c = parse
        .next_rune()
        .map_err(|_| parse.error("\\ at end of pattern", start))?;

    if let Some(kind) = set_escape(c) {
        return Ok(parse.alloc(NodeKind::CharacterSet(kind), start));
    }
    match c {
        '1'..='9' => {
            parse.backup1(c);
            let digits_start = parse.index;
            let n = read_decimal(parse);
            if n <= parse.group_count {
                let id = parse.alloc(
                    NodeKind::Backreference {
                        group: NodeId::from_index(0),
                    },
                    start,
                );
                parse.pending_refs.push((id, BackrefTarget::Index(n), start));
                return Ok(id);
            }
            if parse.is_unicode() {
                return Err(parse.error("invalid escape", start));
            }
            parse.index = digits_start;
            let value = read_legacy_octal(parse);
            Ok(parse.character(value, start))
        }
        'k' if parse.is_unicode() || parse.has_named_groups => {
            parse
                .require('<')
                .map_err(|_| parse.error("invalid named reference", start))?;
            let name = read_group_name(parse)?;
            let id = parse.alloc(
                NodeKind::Backreference {
                    group: NodeId::from_index(0),
                },
                start,
            );
            parse.pending_refs.push((id, BackrefTarget::Name(name), start));
            Ok(id)
        }
        'p' | 'P' if parse.is_unicode() => Err(AuditError::Unsupported {
            construct: "unicode property escape",
            offset: start,
        }),
        c => {
            let value = read_character_escape(parse, c, start, false)?;
            Ok(parse.character(value, start))
        }
    }
}

fn set_escape(c: char) -> Option<CharacterSetKind> {
    match c {
        'd' => Some(CharacterSetKind::Digit { negate: false }),
        'D' => Some(CharacterSetKind::Digit { negate: true }),
        's' => Some(CharacterSetKind::Space { negate: false }),
        'S' => Some(CharacterSetKind::Space { negate: true }),
        'w' => Some(CharacterSetKind::Word { negate: false }),
        'W' => Some(CharacterSetKind::Word { negate: true }),
        _ => None,
    }
}

fn read_decimal(parse: &mut RegexpParse) -> u32 {
    let mut n: u32 = 0;
    while let Some(d) = parse.peek().and_then(|c| c.to_digit(10)) {
        n = n.saturating_mul(10).saturating_add(d);
        parse.index += 1;
    }
    n
}

/// `\0`-`\377` octal, or the literal digit for `\8` and `\9`.
fn read_legacy_octal(parse: &mut RegexpParse) -> u32 {
    let mut value = 0;
    let mut len = 0;
    while let Some(d) = parse.peek().and_then(|c| c.to_digit(8)) {
        if len == 3 || value * 8 + d > 0o377 {
            break;
        }
        value = value * 8 + d;
        len += 1;
        parse.index += 1;
    }
    if len == 0 {
        // \8 or \9
        if let Some(c) = parse.peek() {
            parse.index += 1;
            return c as u32;
        }
    }
    value
}

fn read_hex(parse: &mut RegexpParse, digits: usize) -> Option<u32> {
    let save = parse.index;
    let mut value = 0;
    for _ in 0..digits {
        match parse.peek().and_then(|c| c.to_digit(16)) {
            Some(d) => {
                value = value * 16 + d;
                parse.index += 1;
            }
            None => {
                parse.index = save;
                return None;
            }
        }
    }
    Some(value)
}

/// Read the character an escape denotes, after `\` and `c`.
fn read_character_escape(
    parse: &mut RegexpParse,
    c: char,
    start: usize,
    in_class: bool,
) -> Result<u32, AuditError> {
    let value = match c {
        'n' => 0x0A,
        'r' => 0x0D,
        't' => 0x09,
        'v' => 0x0B,
        'f' => 0x0C,
        'b' if in_class => 0x08,
        '-' if in_class => '-' as u32,
        '0' if !parse.peek().is_some_and(|d| d.is_ascii_digit()) => 0,
        '0'..='7' if !parse.is_unicode() => {
            parse.backup1(c);
            read_legacy_octal(parse)
        }
        'c' => match parse.peek() {
            Some(l) if l.is_ascii_alphabetic() => {
                parse.next_rune()?;
                l as u32 % 32
            }
            _ if parse.is_unicode() => return Err(parse.error("invalid unicode escape", start)),
            _ => {
                // `\c` without a letter is a literal backslash.
                parse.backup1(c);
                '\\' as u32
            }
        },
        'x' => match read_hex(parse, 2) {
            Some(v) => v,
            None if parse.is_unicode() => return Err(parse.error("invalid escape", start)),
            None => 'x' as u32,
        },
        'u' => match read_unicode_escape(parse)? {
            Some(v) => v,
            None if parse.is_unicode() => return Err(parse.error("invalid unicode escape", start)),
            None => 'u' as u32,
        },
        c if parse.is_unicode() => {
            if SYNTAX_CHARS.contains(c) {
                c as u32
            } else {
                return Err(parse.error("invalid escape", start));
            }
        }
        c => c as u32,
    };
    Ok(value)
}

/// Read the rest of `\uXXXX` or `\u{X...}`; pairs surrogates under the
/// unicode flags.
fn read_unicode_escape(parse: &mut RegexpParse) -> Result<Option<u32>, AuditError> {
    if parse.is_unicode() && parse.bypass_optional('{') {
        let at = parse.index;
        let mut value: u32 = 0;
        let mut any = false;
        while let Some(d) = parse.peek().and_then(|c| c.to_digit(16)) {
            value = value.saturating_mul(16).saturating_add(d);
            any = true;
            parse.index += 1;
        }
        if !any || value > 0x10FFFF || !parse.bypass_optional('}') {
            return Err(parse.error("invalid unicode escape", at));
        }
        return Ok(Some(value));
    }
    let Some(lead) = read_hex(parse, 4) else {
        return Ok(None);
    };
    if parse.is_unicode() && (0xD800..=0xDBFF).contains(&lead) && parse.looking_at("\\u") {
        let save = parse.index;
        parse.index += 2;
        match read_hex(parse, 4) {
            Some(trail) if (0xDC00..=0xDFFF).contains(&trail) => {
                return Ok(Some(0x10000 + ((lead - 0xD800) << 10) + (trail - 0xDC00)));
            }
            _ => parse.index = save,
        }
    }
    Ok(Some(lead))
}

/// Read a quantifier (?, *, +, {m,n}) following `atom`.
fn read_quantifier(
    parse: &mut RegexpParse,
    atom: NodeId,
    start: usize,
) -> Result<NodeId, AuditError> {
    let at = parse.index;
    let (min, max) = match parse.peek() {
        Some('*') => {
            parse.next_rune()?;
            (0, None)
        }
        Some('+') => {
            parse.next_rune()?;
            (1, None)
        }
        Some('?') => {
            parse.next_rune()?;
            (0, Some(1))
        }
        Some('{') => match try_read_braces(parse)? {
            Some(bounds) => bounds,
            None if parse.is_unicode() => return Err(parse.error("incomplete quantifier", at)),
            None => return Ok(atom),
        },
        _ => return Ok(atom),
    };
    if let Some(max) = max {
        if max < min {
            return Err(parse.error("numbers out of order in {} quantifier", at));
        }
    }
    let greedy = !parse.bypass_optional('?');
    Ok(parse.alloc(
        NodeKind::Quantifier {
            min,
            max,
            greedy,
            element: atom,
        },
        start,
    ))
}

/// Read `{n}`, `{n,}` or `{n,m}`; restores the position and returns `None`
/// when the braces do not form a quantifier.
fn try_read_braces(parse: &mut RegexpParse) -> Result<Option<(u32, Option<u32>)>, AuditError> {
    let save = parse.index;
    parse.require('{')?;
    if !parse.peek().is_some_and(|c| c.is_ascii_digit()) {
        parse.index = save;
        return Ok(None);
    }
    let min = read_decimal(parse);
    let max = if parse.bypass_optional(',') {
        if parse.peek().is_some_and(|c| c.is_ascii_digit()) {
            Some(read_decimal(parse))
        } else {
            None
        }
    } else {
        Some(min)
    };
    if !parse.bypass_optional('}') {
        parse.index = save;
        return Ok(None);
    }
    Ok(Some((min, max)))
}

/// Read a character class after its `[`.
fn read_char_class(parse: &mut RegexpParse, start: usize) -> Result<NodeId, AuditError> {
    let negate = parse.bypass_optional('^');
    if parse.flags.unicode_sets {
        return read_class_set(parse, start, negate);
    }

    let mut elements = Vec::new();
    loop {
        match parse.peek() {
            None => return Err(parse.error("unterminated character class", start)),
            Some(']') => {
                parse.next_rune()?;
                break;
            }
            Some(_) => {}
        }
        let lo = read_class_atom(parse, &mut elements)?;
        if parse.peek() != Some('-') || parse.peek_at(1) == Some(']') || parse.peek_at(1).is_none()
        {
            elements.push(lo);
            continue;
        }
        let dash_at = parse.index;
        parse.next_rune()?;
        let mut trailing = Vec::new();
        let hi = read_class_atom(parse, &mut trailing)?;
        match (parse.char_value(lo), parse.char_value(hi)) {
            (Some(a), Some(b)) if trailing.is_empty() => {
                if a > b {
                    return Err(parse.error("range out of order in character class", dash_at));
                }
                let range_start = parse.nodes[lo.index()].span.start;
                let range = parse.alloc(NodeKind::CharacterClassRange { min: lo, max: hi }, range_start);
                elements.push(range);
            }
            _ if parse.is_unicode() => {
                return Err(parse.error("invalid character class", dash_at));
            }
            _ => {
                // Annex B: a set escape next to `-` makes the dash literal.
                elements.push(lo);
                let dash = parse.alloc(NodeKind::Character { value: '-' as u32 }, dash_at);
                parse.nodes[dash.index()].span = Span::new(dash_at, dash_at + 1);
                elements.push(dash);
                elements.extend(trailing);
                elements.push(hi);
            }
        }
    }
    Ok(parse.alloc(NodeKind::CharacterClass { negate, elements }, start))
}

/// Read one class atom. An astral character outside the unicode modes
/// pushes its lead surrogate to `lead` and returns the trail.
fn read_class_atom(
    parse: &mut RegexpParse,
    lead: &mut Vec<NodeId>,
) -> Result<NodeId, AuditError> {
    let start = parse.index;
    let c = parse.next_rune()?;
    match c {
        '\\' => {
            let e = parse
                .next_rune()
                .map_err(|_| parse.error("\\ at end of pattern", start))?;
            if let Some(kind) = set_escape(e) {
                return Ok(parse.alloc(NodeKind::CharacterSet(kind), start));
            }
            if matches!(e, 'p' | 'P') && parse.is_unicode() {
                return Err(AuditError::Unsupported {
                    construct: "unicode property escape",
                    offset: start,
                });
            }
            if e.is_ascii_digit() && e != '0' && parse.is_unicode() {
                return Err(parse.error("invalid class escape", start));
            }
            let value = read_character_escape(parse, e, start, true)?;
            Ok(parse.character(value, start))
        }
        c if c as u32 > 0xFFFF && !parse.is_unicode() => {
            let (hi, lo) = surrogates(c as u32);
            lead.push(parse.character(hi, start));
            Ok(parse.character(lo, start))
        }
        c => Ok(parse.character(c as u32, start)),
    }
}

/// Read a `v`-mode class body after `[` and the optional `^`.
fn read_class_set(parse: &mut RegexpParse, start: usize, negate: bool) -> Result<NodeId, AuditError> {
    if parse.bypass_optional(']') {
        return Ok(parse.alloc(
            NodeKind::CharacterClass {
                negate,
                elements: Vec::new(),
            },
            start,
        ));
    }

    let first = read_class_set_operand(parse)?;
    let operator = if parse.looking_at("&&") {
        Some("&&")
    } else if parse.looking_at("--") {
        Some("--")
    } else {
        None
    };

    let Some(operator) = operator else {
        let mut elements = vec![first];
        loop {
            match parse.peek() {
                None => return Err(parse.error("unterminated character class", start)),
                Some(']') => {
                    parse.next_rune()?;
                    break;
                }
                Some(_) if parse.looking_at("&&") || parse.looking_at("--") => {
                    return Err(parse.error("invalid set operation in character class", parse.index));
                }
                Some(_) => elements.push(read_class_set_operand(parse)?),
            }
        }
        return Ok(parse.alloc(NodeKind::CharacterClass { negate, elements }, start));
    };

    let mut left = first;
    let left_start = parse.nodes[first.index()].span.start;
    loop {
        if parse.bypass_optional(']') {
            break;
        }
        if !parse.looking_at(operator) {
            return Err(parse.error("invalid set operation in character class", parse.index));
        }
        parse.index += operator.len();
        let right = read_class_set_operand(parse)?;
        let kind = if operator == "&&" {
            NodeKind::ClassIntersection { left, right }
        } else {
            NodeKind::ClassSubtraction { left, right }
        };
        left = parse.alloc(kind, left_start);
        if parse.is_empty() {
            return Err(parse.error("unterminated character class", start));
        }
    }
    Ok(parse.alloc(
        NodeKind::ExpressionCharacterClass {
            negate,
            expression: left,
        },
        start,
    ))
}

/// Read a nested class, `\q{...}`, a character, a set escape or a range.
fn read_class_set_operand(parse: &mut RegexpParse) -> Result<NodeId, AuditError> {
    let start = parse.index;
    if parse.bypass_optional('[') {
        let negate = parse.bypass_optional('^');
        return read_class_set(parse, start, negate);
    }
    if parse.looking_at("\\q{") {
        parse.index += 3;
        return read_string_disjunction(parse, start);
    }
    let mut lead = Vec::new();
    let lo = read_class_atom(parse, &mut lead)?;
    if parse.peek() != Some('-') || parse.looking_at("--") {
        return Ok(lo);
    }
    let dash_at = parse.index;
    parse.next_rune()?;
    let hi = read_class_atom(parse, &mut lead)?;
    match (parse.char_value(lo), parse.char_value(hi)) {
        (Some(a), Some(b)) => {
            if a > b {
                return Err(parse.error("range out of order in character class", dash_at));
            }
            Ok(parse.alloc(NodeKind::CharacterClassRange { min: lo, max: hi }, start))
        }
        _ => Err(parse.error("invalid character class", dash_at)),
    }
}

/// Read `\q{...}` after its `{`.
fn read_string_disjunction(parse: &mut RegexpParse, start: usize) -> Result<NodeId, AuditError> {
    let mut alternatives = Vec::new();
    let mut alt_start = parse.index;
    let mut elements = Vec::new();
    loop {
        let at = parse.index;
        let c = parse
            .next_rune()
            .map_err(|_| parse.error("unterminated class string disjunction", start))?;
        match c {
            '|' | '}' => {
                parse.index = at;
                let alt = parse.alloc(
                    NodeKind::StringAlternative {
                        elements: std::mem::take(&mut elements),
                    },
                    alt_start,
                );
                alternatives.push(alt);
                parse.index = at + 1;
                alt_start = parse.index;
                if c == '}' {
                    break;
                }
            }
            '\\' => {
                let e = parse
                    .next_rune()
                    .map_err(|_| parse.error("\\ at end of pattern", at))?;
                let value = read_character_escape(parse, e, at, true)?;
                elements.push(parse.character(value, at));
            }
            c => elements.push(parse.character(c as u32, at)),
        }
    }
    Ok(parse.alloc(NodeKind::ClassStringDisjunction { alternatives }, start))
}
