//! Frozen transition tables for matching.
//!
//! A [`RunAutomaton`] is the read-only form of a deterministic automaton. Each
//! state's transitions are packed into a [`StateTable`] using a
//! ceilings/steps layout, where each ceiling is the exclusive upper bound of a
//! character range mapping to the corresponding step:
//!
//! ```text
//! [b-d] -> s1, [x] -> s2
//! ceilings: ['b', 'e', 'x', 'y', CHAR_MAX + 1]
//! steps:    [NONE, s1, NONE, s2, NONE]
//! ```
//!
//! The table is immutable once built and is `Send + Sync`, so one instance
//! can be shared by any number of matching threads.

use super::actor::Actor;
use super::arena::{Automaton, State, StateId, Transition, CHAR_MAX};

/// Packed transitions of one state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateTable {
    ceilings: Vec<u32>,
    steps: Vec<StateId>,
}

impl StateTable {
    /// Pack sorted, non-overlapping transitions.
    pub fn pack(transitions: &[Transition]) -> Self {
        let mut ceilings = Vec::with_capacity(transitions.len() * 2 + 1);
        let mut steps = Vec::with_capacity(transitions.len() * 2 + 1);
        let mut point: u32 = 0;
        for t in transitions {
            if t.min > point {
                ceilings.push(t.min);
                steps.push(StateId::NONE);
            }
            ceilings.push(t.max + 1);
            steps.push(t.to);
            point = t.max + 1;
        }
        if point <= CHAR_MAX {
            ceilings.push(CHAR_MAX + 1);
            steps.push(StateId::NONE);
        }
        Self { ceilings, steps }
    }

    /// Target for character `c`, or [`StateId::NONE`].
    #[inline]
    pub fn dstep(&self, c: u32) -> StateId {
        let i = self.ceilings.partition_point(|&ceiling| ceiling <= c);
        self.steps.get(i).copied().unwrap_or(StateId::NONE)
    }

    /// Unpack back into range transitions, skipping dead ranges.
    pub fn transitions(&self) -> Vec<Transition> {
        let mut out = Vec::new();
        let mut floor = 0;
        for (&ceiling, &step) in self.ceilings.iter().zip(&self.steps) {
            if !step.is_none() {
                out.push(Transition::new(floor, ceiling - 1, step));
            }
            floor = ceiling;
        }
        out
    }
}

/// Deterministic automaton frozen for matching.
#[derive(Clone, Debug)]
pub struct RunAutomaton {
    tables: Vec<StateTable>,
    accept: Vec<bool>,
    actors: Vec<Actor>,
    initial: StateId,
}

impl RunAutomaton {
    /// Freeze `a`, determinizing a copy first if necessary.
    pub fn new(a: &Automaton) -> Self {
        let mut d = a.expanded();
        d.determinize();
        d.reduce();
        d.compact();

        let n = d.arena_len();
        let mut tables = Vec::with_capacity(n);
        let mut accept = Vec::with_capacity(n);
        let mut actors = Vec::with_capacity(n);
        for i in 0..n {
            let state = d.state(StateId::new(i));
            tables.push(StateTable::pack(&state.transitions));
            accept.push(state.accept);
            actors.push(state.actor.clone());
        }
        Self {
            tables,
            accept,
            actors,
            initial: d.initial(),
        }
    }

    #[inline]
    pub fn initial(&self) -> StateId {
        self.initial
    }

    /// Number of states.
    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Transition from `state` on `c`; `None` on a dead transition.
    #[inline]
    pub fn step(&self, state: StateId, c: char) -> Option<StateId> {
        let next = self.tables[state.index()].dstep(c as u32);
        (!next.is_none()).then_some(next)
    }

    #[inline]
    pub fn is_accept(&self, state: StateId) -> bool {
        self.accept[state.index()]
    }

    #[inline]
    pub fn actor(&self, state: StateId) -> &Actor {
        &self.actors[state.index()]
    }

    /// Whether the whole of `s` is accepted.
    pub fn run(&self, s: &str) -> bool {
        let mut p = self.initial;
        for c in s.chars() {
            match self.step(p, c) {
                Some(q) => p = q,
                None => return false,
            }
        }
        self.is_accept(p)
    }

    /// Thaw into an editable automaton.
    pub fn to_automaton(&self) -> Automaton {
        let states = (0..self.len())
            .map(|i| State {
                accept: self.accept[i],
                transitions: self.tables[i].transitions(),
                epsilons: Vec::new(),
                actor: self.actors[i].clone(),
            })
            .collect();
        Automaton::from_parts(states, self.initial, true)
    }
}

impl From<&Automaton> for RunAutomaton {
    fn from(a: &Automaton) -> Self {
        RunAutomaton::new(a)
    }
}
