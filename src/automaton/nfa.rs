//! Thompson NFAs over code points.
//!
//! States live in an index arena so loops are plain `StateId` back edges.
//! Every NFA has exactly one start and one accept state; the start state has
//! no incoming edges and the accept state has no outgoing edges, which lets
//! `union` and `append` splice automata together without fresh states.

use super::char_set::CharSet;
use super::expr::Expr;
use super::sparse_set::{StateSet, StateSets};
use crate::AuditError;

/// A state identifier, an index into the NFA arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StateId(u32);

impl StateId {
    #[inline]
    pub fn from_index(index: usize) -> Self {
        StateId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    fn offset(self, by: usize) -> Self {
        StateId(self.0 + by as u32)
    }
}

#[derive(Clone, Debug, Default)]
pub struct NfaState {
    /// Character transitions.
    pub transitions: Vec<(CharSet, StateId)>,
    /// Epsilon transitions.
    pub epsilons: Vec<StateId>,
}

#[derive(Clone, Debug)]
pub struct Nfa {
    states: Vec<NfaState>,
    start: StateId,
    accept: StateId,
    max_char: u32,
}

impl Nfa {
    /// The NFA accepting nothing.
    pub fn empty(max_char: u32) -> Self {
        Self {
            states: vec![NfaState::default(), NfaState::default()],
            start: StateId(0),
            accept: StateId(1),
            max_char,
        }
    }

    /// The NFA accepting every string over `0..=max_char`.
    pub fn all_strings(max_char: u32) -> Self {
        // start -> loop <-> body, loop -> accept
        let (start, accept, looped, body) = (StateId(0), StateId(1), StateId(2), StateId(3));
        let mut states = vec![NfaState::default(); 4];
        states[start.index()].epsilons.push(looped);
        states[looped.index()].epsilons.push(accept);
        states[looped.index()]
            .transitions
            .push((CharSet::all(max_char), body));
        states[body.index()].epsilons.push(looped);
        Self {
            states,
            start,
            accept,
            max_char,
        }
    }

    /// Build an NFA for `expr`, failing once more than `budget` states are needed.
    pub fn from_expr(expr: &Expr, max_char: u32, budget: usize) -> Result<Self, AuditError> {
        let mut builder = Builder::new(budget);
        let start = builder.alloc()?;
        let accept = builder.alloc()?;
        builder.build(expr, start, accept)?;
        Ok(Self {
            states: builder.states,
            start,
            accept,
            max_char,
        })
    }

    #[inline]
    pub fn start(&self) -> StateId {
        self.start
    }

    #[inline]
    pub fn accept(&self) -> StateId {
        self.accept
    }

    #[inline]
    pub fn max_char(&self) -> u32 {
        self.max_char
    }

    #[inline]
    pub fn states(&self) -> &[NfaState] {
        &self.states
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Copy `other`'s states into this arena, returning the offset applied.
    fn absorb(&mut self, other: &Nfa, budget: usize) -> Result<usize, AuditError> {
        let offset = self.states.len();
        if offset + other.states.len() > budget {
            return Err(AuditError::TooManyNodes { limit: budget });
        }
        self.states.extend(other.states.iter().map(|s| NfaState {
            transitions: s
                .transitions
                .iter()
                .map(|(set, to)| (set.clone(), to.offset(offset)))
                .collect(),
            epsilons: s.epsilons.iter().map(|to| to.offset(offset)).collect(),
        }));
        Ok(offset)
    }

    /// Make this NFA accept `L(self) ∪ L(other)`.
    pub fn union(&mut self, other: &Nfa, budget: usize) -> Result<(), AuditError> {
        let offset = self.absorb(other, budget)?;
        let (other_start, other_accept) = (other.start.offset(offset), other.accept.offset(offset));
        self.states[self.start.index()].epsilons.push(other_start);
        self.states[other_accept.index()].epsilons.push(self.accept);
        Ok(())
    }

    /// Make this NFA accept `L(self) · L(other)`.
    pub fn append(&mut self, other: &Nfa, budget: usize) -> Result<(), AuditError> {
        let offset = self.absorb(other, budget)?;
        let other_start = other.start.offset(offset);
        self.states[self.accept.index()].epsilons.push(other_start);
        self.accept = other.accept.offset(offset);
        Ok(())
    }

    /// Add every state epsilon-reachable from `set`'s members to `set`.
    pub fn epsilon_closure(&self, set: &mut StateSet, stack: &mut Vec<StateId>) {
        stack.clear();
        stack.extend(set.iter());
        while let Some(id) = stack.pop() {
            for &eps in &self.states[id.index()].epsilons {
                if set.insert(eps) {
                    stack.push(eps);
                }
            }
        }
    }

    /// True if the accepted language is empty.
    pub fn is_empty(&self) -> bool {
        let mut seen = StateSet::new(self.states.len());
        let mut stack = vec![self.start];
        seen.insert(self.start);
        while let Some(id) = stack.pop() {
            if id == self.accept {
                return false;
            }
            let state = &self.states[id.index()];
            let next = state
                .transitions
                .iter()
                .filter(|(set, _)| !set.is_empty())
                .map(|(_, to)| *to)
                .chain(state.epsilons.iter().copied());
            for to in next {
                if seen.insert(to) {
                    stack.push(to);
                }
            }
        }
        true
    }

    /// Simulate the NFA on `word`.
    pub fn accepts(&self, word: &[u32]) -> bool {
        let mut sets = StateSets::new(self.states.len());
        let mut stack = Vec::new();
        sets.current.insert(self.start);
        self.epsilon_closure(&mut sets.current, &mut stack);

        for &c in word {
            sets.next.clear();
            for id in sets.current.iter() {
                for (set, to) in &self.states[id.index()].transitions {
                    if set.contains(c) {
                        sets.next.insert(*to);
                    }
                }
            }
            self.epsilon_closure(&mut sets.next, &mut stack);
            sets.swap();
            if sets.current.is_empty() {
                return false;
            }
        }
        sets.current.contains(self.accept)
    }
}

/// Thompson construction under a state budget.
struct Builder {
    states: Vec<NfaState>,
    budget: usize,
}

impl Builder {
    fn new(budget: usize) -> Self {
        Self {
            states: Vec::with_capacity(budget.min(64)),
            budget,
        }
    }

    fn alloc(&mut self) -> Result<StateId, AuditError> {
        if self.states.len() >= self.budget {
            return Err(AuditError::TooManyNodes { limit: self.budget });
        }
        let id = StateId::from_index(self.states.len());
        self.states.push(NfaState::default());
        Ok(id)
    }

    fn epsilon(&mut self, from: StateId, to: StateId) {
        self.states[from.index()].epsilons.push(to);
    }

    /// Connect `start` to `end` through `expr`. Loops only ever target fresh
    /// states, so `start` and `end` may be shared between alternatives.
    fn build(&mut self, expr: &Expr, start: StateId, end: StateId) -> Result<(), AuditError> {
        match expr {
            Expr::Chars(set) => {
                self.states[start.index()]
                    .transitions
                    .push((set.clone(), end));
            }
            Expr::Concat(items) => match items.split_last() {
                None => self.epsilon(start, end),
                Some((last, init)) => {
                    let mut cur = start;
                    for item in init {
                        let next = self.alloc()?;
                        self.build(item, cur, next)?;
                        cur = next;
                    }
                    self.build(last, cur, end)?;
                }
            },
            Expr::Alt(items) => {
                for item in items {
                    self.build(item, start, end)?;
                }
            }
            Expr::Repeat { min, max, expr } => {
                let mut cur = start;
                for _ in 0..*min {
                    let next = self.alloc()?;
                    self.build(expr, cur, next)?;
                    cur = next;
                }
                match max {
                    None => {
                        let loop_in = self.alloc()?;
                        let loop_out = self.alloc()?;
                        self.epsilon(cur, loop_in);
                        self.epsilon(loop_in, end);
                        self.build(expr, loop_in, loop_out)?;
                        self.epsilon(loop_out, loop_in);
                    }
                    Some(max) => {
                        let optional = max.saturating_sub(*min);
                        for i in 0..optional {
                            self.epsilon(cur, end);
                            let next = if i + 1 == optional { end } else { self.alloc()? };
                            self.build(expr, cur, next)?;
                            cur = next;
                        }
                        if optional == 0 {
                            self.epsilon(cur, end);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
