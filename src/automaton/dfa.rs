//! Deterministic automata and language comparison.
//!
//! A `Dfa` works over an *elementary alphabet*: disjoint code-point
//! intervals such that every transition set of the source automaton is a
//! union of intervals. Transitions are a dense `states × intervals` table,
//! which keeps product construction and partition refinement simple.
//!
//! Minimal DFAs are trimmed (no dead or unreachable states) and numbered in
//! breadth-first order, so two minimal DFAs accept the same language iff
//! `structurally_equal` holds.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use super::char_set::{CharRange, CharSet};
use super::expr::Expr;
use super::nfa::{Nfa, StateId};
use super::sparse_set::StateSet;
use crate::AuditError;

const NONE: u32 = u32::MAX;

#[derive(Clone, Debug, PartialEq, Eq)]
struct DfaState {
    next: Vec<u32>,
    accepting: bool,
}

#[derive(Clone, Debug)]
pub struct Dfa {
    alphabet: Vec<CharRange>,
    states: Vec<DfaState>,
    start: u32,
}

/// How the language of a left automaton relates to a right one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetRelation {
    Equal,
    /// left ⊊ right
    LeftSubset,
    /// left ⊋ right
    LeftSuperset,
    Disjoint,
    Overlapping,
    /// The automata could not be built within budget.
    Unknown,
}

impl SetRelation {
    /// The same relation seen from the other side.
    pub fn flip(self) -> Self {
        match self {
            SetRelation::LeftSubset => SetRelation::LeftSuperset,
            SetRelation::LeftSuperset => SetRelation::LeftSubset,
            other => other,
        }
    }
}

/// Split the given sets into elementary disjoint intervals.
fn elementary_intervals<'a, I>(sets: I) -> Vec<CharRange>
where
    I: IntoIterator<Item = &'a CharSet>,
{
    let mut covered = CharSet::empty();
    let mut cuts = Vec::new();
    for set in sets {
        for r in set.ranges() {
            cuts.push(r.lo);
            cuts.push(r.hi.saturating_add(1));
        }
        covered = covered.union(set);
    }
    elementary_from(&covered, cuts)
}

fn elementary_from(covered: &CharSet, mut cuts: Vec<u32>) -> Vec<CharRange> {
    for r in covered.ranges() {
        cuts.push(r.lo);
        cuts.push(r.hi.saturating_add(1));
    }
    cuts.sort_unstable();
    cuts.dedup();

    let mut out = Vec::new();
    for pair in cuts.windows(2) {
        let (lo, hi) = (pair[0], pair[1] - 1);
        if covered.contains(lo) {
            out.push(CharRange::new(lo, hi));
        }
    }
    out
}

/// Indices of the elementary intervals contained in `set`.
fn interval_indices(alphabet: &[CharRange], set: &CharSet) -> Vec<usize> {
    let mut out = Vec::new();
    for r in set.ranges() {
        let from = alphabet.partition_point(|a| a.hi < r.lo);
        for (i, a) in alphabet.iter().enumerate().skip(from) {
            if a.lo > r.hi {
                break;
            }
            out.push(i);
        }
    }
    out
}

impl Dfa {
    /// Subset construction. Fails once more than `budget` states are needed.
    pub fn from_nfa(nfa: &Nfa, budget: usize) -> Result<Self, AuditError> {
        let alphabet = elementary_intervals(
            nfa.states()
                .iter()
                .flat_map(|s| s.transitions.iter().map(|(set, _)| set)),
        );
        // per NFA state: (interval indices, target)
        let moves: Vec<Vec<(Vec<usize>, StateId)>> = nfa
            .states()
            .iter()
            .map(|s| {
                s.transitions
                    .iter()
                    .map(|(set, to)| (interval_indices(&alphabet, set), *to))
                    .collect()
            })
            .collect();

        let mut set = StateSet::new(nfa.len());
        let mut stack = Vec::new();
        set.insert(nfa.start());
        nfa.epsilon_closure(&mut set, &mut stack);

        let mut ids: FxHashMap<Vec<u32>, u32> = FxHashMap::default();
        let mut subsets: Vec<Vec<u32>> = Vec::new();
        let mut states: Vec<DfaState> = Vec::new();

        let start_key = set.sorted_key();
        ids.insert(start_key.clone(), 0);
        subsets.push(start_key);
        states.push(DfaState {
            next: vec![NONE; alphabet.len()],
            accepting: set.contains(nfa.accept()),
        });

        let mut targets: Vec<Vec<StateId>> = vec![Vec::new(); alphabet.len()];
        let mut current = 0;
        while current < subsets.len() {
            for t in targets.iter_mut() {
                t.clear();
            }
            for &member in &subsets[current] {
                for (intervals, to) in &moves[member as usize] {
                    for &i in intervals {
                        targets[i].push(*to);
                    }
                }
            }

            for (i, target) in targets.iter().enumerate() {
                if target.is_empty() {
                    continue;
                }
                set.clear();
                for &to in target {
                    set.insert(to);
                }
                nfa.epsilon_closure(&mut set, &mut stack);
                let key = set.sorted_key();
                let id = match ids.get(&key) {
                    Some(&id) => id,
                    None => {
                        if states.len() >= budget {
                            return Err(AuditError::TooManyNodes { limit: budget });
                        }
                        let id = states.len() as u32;
                        states.push(DfaState {
                            next: vec![NONE; alphabet.len()],
                            accepting: set.contains(nfa.accept()),
                        });
                        ids.insert(key.clone(), id);
                        subsets.push(key);
                        id
                    }
                };
                states[current].next[i] = id;
            }
            current += 1;
        }

        Ok(Self {
            alphabet,
            states,
            start: 0,
        })
    }

    /// Build and minimize the DFA for an expression.
    pub fn from_expr(expr: &Expr, max_char: u32, budget: usize) -> Result<Self, AuditError> {
        let nfa = Nfa::from_expr(expr, max_char, budget)?;
        Ok(Dfa::from_nfa(&nfa, budget)?.minimize())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True if no word is accepted.
    pub fn is_empty(&self) -> bool {
        let mut seen = vec![false; self.states.len()];
        let mut queue = VecDeque::from([self.start]);
        seen[self.start as usize] = true;
        while let Some(s) = queue.pop_front() {
            let state = &self.states[s as usize];
            if state.accepting {
                return false;
            }
            for &to in &state.next {
                if to != NONE && !seen[to as usize] {
                    seen[to as usize] = true;
                    queue.push_back(to);
                }
            }
        }
        true
    }

    /// Simulate the DFA on `word`.
    pub fn accepts(&self, word: &[u32]) -> bool {
        let mut s = self.start;
        for &c in word {
            let idx = self.alphabet.partition_point(|r| r.hi < c);
            match self.alphabet.get(idx) {
                Some(r) if r.lo <= c => {
                    s = self.states[s as usize].next[idx];
                    if s == NONE {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        self.states[s as usize].accepting
    }

    /// Remove states that are unreachable or cannot reach an accepting state.
    fn trim(&self) -> Dfa {
        let n = self.states.len();
        let mut reachable = vec![false; n];
        let mut queue = VecDeque::from([self.start]);
        reachable[self.start as usize] = true;
        let mut reverse: Vec<Vec<u32>> = vec![Vec::new(); n];
        while let Some(s) = queue.pop_front() {
            for &to in &self.states[s as usize].next {
                if to == NONE {
                    continue;
                }
                reverse[to as usize].push(s);
                if !reachable[to as usize] {
                    reachable[to as usize] = true;
                    queue.push_back(to);
                }
            }
        }

        let mut useful = vec![false; n];
        for (s, state) in self.states.iter().enumerate() {
            if reachable[s] && state.accepting {
                useful[s] = true;
                queue.push_back(s as u32);
            }
        }
        while let Some(s) = queue.pop_front() {
            for &from in &reverse[s as usize] {
                if !useful[from as usize] {
                    useful[from as usize] = true;
                    queue.push_back(from);
                }
            }
        }

        if !useful[self.start as usize] {
            return Dfa {
                alphabet: Vec::new(),
                states: vec![DfaState {
                    next: Vec::new(),
                    accepting: false,
                }],
                start: 0,
            };
        }

        let mut remap = vec![NONE; n];
        let mut kept = 0u32;
        for s in 0..n {
            if useful[s] {
                remap[s] = kept;
                kept += 1;
            }
        }
        let states = self
            .states
            .iter()
            .enumerate()
            .filter(|(s, _)| useful[*s])
            .map(|(_, state)| DfaState {
                next: state
                    .next
                    .iter()
                    .map(|&to| if to == NONE { NONE } else { remap[to as usize] })
                    .collect(),
                accepting: state.accepting,
            })
            .collect();
        Dfa {
            alphabet: self.alphabet.clone(),
            states,
            start: remap[self.start as usize],
        }
    }

    /// Minimize by Moore partition refinement, then renumber canonically.
    pub fn minimize(&self) -> Dfa {
        let dfa = self.trim();
        let n = dfa.states.len();

        let mut class: Vec<u32> = dfa.states.iter().map(|s| u32::from(s.accepting)).collect();
        let mut count = {
            let mut seen = [false; 2];
            for &c in &class {
                seen[c as usize] = true;
            }
            seen.iter().filter(|&&b| b).count()
        };
        loop {
            let mut ids: FxHashMap<(u32, Vec<u32>), u32> = FxHashMap::default();
            let mut next_class = Vec::with_capacity(n);
            for state in &dfa.states {
                let signature: Vec<u32> = state
                    .next
                    .iter()
                    .map(|&to| if to == NONE { NONE } else { class[to as usize] })
                    .collect();
                let key = (u32::from(state.accepting), signature);
                let fresh = ids.len() as u32;
                next_class.push(*ids.entry(key).or_insert(fresh));
            }
            let new_count = ids.len();
            class = next_class;
            if new_count == count {
                break;
            }
            count = new_count;
        }

        // one representative per class
        let mut repr = vec![NONE; count];
        for (s, &c) in class.iter().enumerate() {
            if repr[c as usize] == NONE {
                repr[c as usize] = s as u32;
            }
        }

        // canonical breadth-first numbering from the start class
        let mut order = vec![NONE; count];
        let mut queue = VecDeque::from([class[dfa.start as usize]]);
        order[class[dfa.start as usize] as usize] = 0;
        let mut numbered = 1u32;
        let mut bfs = Vec::with_capacity(count);
        while let Some(c) = queue.pop_front() {
            bfs.push(c);
            for &to in &dfa.states[repr[c as usize] as usize].next {
                if to == NONE {
                    continue;
                }
                let tc = class[to as usize];
                if order[tc as usize] == NONE {
                    order[tc as usize] = numbered;
                    numbered += 1;
                    queue.push_back(tc);
                }
            }
        }

        let states = bfs
            .iter()
            .map(|&c| {
                let state = &dfa.states[repr[c as usize] as usize];
                DfaState {
                    next: state
                        .next
                        .iter()
                        .map(|&to| {
                            if to == NONE {
                                NONE
                            } else {
                                order[class[to as usize] as usize]
                            }
                        })
                        .collect(),
                    accepting: state.accepting,
                }
            })
            .collect();
        Dfa {
            alphabet: dfa.alphabet,
            states,
            start: 0,
        }
    }

    /// The product automaton accepting `L(a) ∩ L(b)`.
    pub fn intersect(a: &Dfa, b: &Dfa, budget: usize) -> Result<Dfa, AuditError> {
        let covered_a = CharSet::from_ranges(a.alphabet.iter().copied());
        let covered_b = CharSet::from_ranges(b.alphabet.iter().copied());
        let cuts: Vec<u32> = a
            .alphabet
            .iter()
            .chain(b.alphabet.iter())
            .flat_map(|r| [r.lo, r.hi.saturating_add(1)])
            .collect();
        let alphabet = elementary_from(&covered_a.intersect(&covered_b), cuts);
        let column = |dfa: &Dfa, r: &CharRange| dfa.alphabet.partition_point(|x| x.hi < r.lo);
        let columns: Vec<(usize, usize)> = alphabet
            .iter()
            .map(|r| (column(a, r), column(b, r)))
            .collect();

        let mut ids: FxHashMap<(u32, u32), u32> = FxHashMap::default();
        let mut pairs = vec![(a.start, b.start)];
        ids.insert((a.start, b.start), 0);
        let mut states = Vec::new();
        let mut current = 0;
        while current < pairs.len() {
            let (sa, sb) = pairs[current];
            let (state_a, state_b) = (&a.states[sa as usize], &b.states[sb as usize]);
            let mut next = vec![NONE; alphabet.len()];
            for (i, &(ca, cb)) in columns.iter().enumerate() {
                let (ta, tb) = (state_a.next[ca], state_b.next[cb]);
                if ta == NONE || tb == NONE {
                    continue;
                }
                next[i] = match ids.get(&(ta, tb)) {
                    Some(&id) => id,
                    None => {
                        if pairs.len() >= budget {
                            return Err(AuditError::TooManyNodes { limit: budget });
                        }
                        let id = pairs.len() as u32;
                        ids.insert((ta, tb), id);
                        pairs.push((ta, tb));
                        id
                    }
                };
            }
            states.push(DfaState {
                next,
                accepting: state_a.accepting && state_b.accepting,
            });
            current += 1;
        }

        Ok(Dfa {
            alphabet,
            states,
            start: 0,
        })
    }

    /// Outgoing transitions of `s` grouped by target, sorted by first char.
    fn grouped_transitions(&self, s: u32) -> Vec<(CharSet, u32)> {
        let mut by_target: Vec<(u32, Vec<CharRange>)> = Vec::new();
        for (i, &to) in self.states[s as usize].next.iter().enumerate() {
            if to == NONE {
                continue;
            }
            match by_target.iter_mut().find(|(t, _)| *t == to) {
                Some((_, ranges)) => ranges.push(self.alphabet[i]),
                None => by_target.push((to, vec![self.alphabet[i]])),
            }
        }
        let mut out: Vec<(CharSet, u32)> = by_target
            .into_iter()
            .map(|(to, ranges)| (CharSet::from_ranges(ranges), to))
            .collect();
        out.sort_by_key(|(set, _)| set.first());
        out
    }

    /// True if the two minimal DFAs are isomorphic.
    ///
    /// Both sides must come from `minimize`; on minimal DFAs this is
    /// language equality.
    pub fn structurally_equal(a: &Dfa, b: &Dfa) -> bool {
        if a.states.len() != b.states.len() {
            return false;
        }
        let mut a_to_b = vec![NONE; a.states.len()];
        let mut b_to_a = vec![NONE; b.states.len()];
        a_to_b[a.start as usize] = b.start;
        b_to_a[b.start as usize] = a.start;
        let mut queue = VecDeque::from([(a.start, b.start)]);

        while let Some((sa, sb)) = queue.pop_front() {
            if a.states[sa as usize].accepting != b.states[sb as usize].accepting {
                return false;
            }
            let (ta, tb) = (a.grouped_transitions(sa), b.grouped_transitions(sb));
            if ta.len() != tb.len() {
                return false;
            }
            for ((set_a, to_a), (set_b, to_b)) in ta.into_iter().zip(tb) {
                if set_a != set_b {
                    return false;
                }
                match (a_to_b[to_a as usize], b_to_a[to_b as usize]) {
                    (NONE, NONE) => {
                        a_to_b[to_a as usize] = to_b;
                        b_to_a[to_b as usize] = to_a;
                        queue.push_back((to_a, to_b));
                    }
                    (mapped_b, mapped_a) if mapped_b == to_b && mapped_a == to_a => {}
                    _ => return false,
                }
            }
        }
        true
    }

    /// Convert to an expression by state elimination.
    pub fn to_expr(&self) -> Expr {
        let n = self.states.len();
        // GNFA: states 0..n, plus source n and sink n + 1
        let (source, sink) = (n, n + 1);
        let mut edges: Vec<Vec<Option<Expr>>> = vec![vec![None; n + 2]; n + 2];
        edges[source][self.start as usize] = Some(Expr::empty_word());
        for s in 0..n {
            for (set, to) in self.grouped_transitions(s as u32) {
                edges[s][to as usize] = Some(Expr::Chars(set));
            }
            if self.states[s].accepting {
                edges[s][sink] = Some(Expr::empty_word());
            }
        }

        // eliminate states with few connections first
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by_key(|&k| {
            let ins = (0..n + 2).filter(|&i| i != k && edges[i][k].is_some()).count();
            let outs = (0..n + 2).filter(|&j| j != k && edges[k][j].is_some()).count();
            ins * outs
        });

        let mut alive = vec![true; n + 2];
        for k in order {
            alive[k] = false;
            let looped = edges[k][k].take().map(|e| Expr::repeat(e, 0, None));
            let ins: Vec<(usize, Expr)> = (0..n + 2)
                .filter(|&i| alive[i])
                .filter_map(|i| edges[i][k].take().map(|e| (i, e)))
                .collect();
            let outs: Vec<(usize, Expr)> = (0..n + 2)
                .filter(|&j| alive[j])
                .filter_map(|j| edges[k][j].take().map(|e| (j, e)))
                .collect();
            for (i, e_in) in &ins {
                for (j, e_out) in &outs {
                    let mut path = vec![e_in.clone()];
                    if let Some(l) = &looped {
                        path.push(l.clone());
                    }
                    path.push(e_out.clone());
                    let through = Expr::concat(path);
                    edges[*i][*j] = Some(match edges[*i][*j].take() {
                        Some(existing) => Expr::alt(vec![existing, through]),
                        None => through,
                    });
                }
            }
        }

        edges[source][sink].take().unwrap_or_else(Expr::nothing)
    }
}

/// Relate two minimal DFAs exactly.
pub fn set_relation(a: &Dfa, b: &Dfa, budget: usize) -> Result<SetRelation, AuditError> {
    let both = Dfa::intersect(a, b, budget)?.minimize();
    let eq_a = Dfa::structurally_equal(&both, a);
    let eq_b = Dfa::structurally_equal(&both, b);
    Ok(match (eq_a, eq_b) {
        (true, true) => SetRelation::Equal,
        (true, false) => SetRelation::LeftSubset,
        (false, true) => SetRelation::LeftSuperset,
        (false, false) if both.is_empty() => SetRelation::Disjoint,
        (false, false) => SetRelation::Overlapping,
    })
}
