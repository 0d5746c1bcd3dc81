//! Arena representation of finite automata over character ranges.
//!
//! Every automaton owns a dense `Vec<State>`; states refer to each other by
//! [`StateId`] (an index), so cycles and cheap cloning come for free and
//! serialization is a flat walk of the vector. An automaton whose language is
//! exactly one string may skip the graph entirely and keep the literal in
//! `singleton`; every structural operation expands it first.
//!
//! ```text
//!   ab|ac          s0 --a--> s1 --b--> (s2)
//!                             \--c--> (s3)
//! ```
//!
//! Transitions are inclusive code point ranges. Epsilon edges exist only in
//! nondeterministic automata; determinization removes them.

use std::collections::VecDeque;

use super::actor::Actor;

/// Largest Unicode scalar value.
pub const CHAR_MAX: u32 = 0x10FFFF;

/// A state identifier - an index into the owning automaton's arena.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct StateId(u32);

impl StateId {
    /// Sentinel for "no state" (a dead transition).
    pub const NONE: StateId = StateId(u32::MAX);

    #[inline]
    pub fn new(index: usize) -> Self {
        StateId(index as u32)
    }

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An inclusive character range `[min, max]` leading to `to`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Transition {
    pub min: u32,
    pub max: u32,
    pub to: StateId,
}

impl Transition {
    #[inline]
    pub fn new(min: u32, max: u32, to: StateId) -> Self {
        Self { min, max, to }
    }

    #[inline]
    pub fn contains(&self, c: u32) -> bool {
        self.min <= c && c <= self.max
    }
}

/// A state in the arena.
#[derive(Clone, Debug, Default)]
pub struct State {
    pub accept: bool,
    pub transitions: Vec<Transition>,
    pub epsilons: Vec<StateId>,
    pub actor: Actor,
}

/// Finite-state acceptor over character ranges.
#[derive(Clone, Debug)]
pub struct Automaton {
    pub(crate) states: Vec<State>,
    pub(crate) initial: StateId,
    /// True only when the automaton is known to be deterministic and
    /// epsilon-free. A false value promises nothing.
    pub(crate) deterministic: bool,
    pub(crate) singleton: Option<String>,
}

impl Default for Automaton {
    fn default() -> Self {
        Self::empty()
    }
}

impl Automaton {
    /// The automaton accepting no strings.
    pub fn empty() -> Self {
        Self {
            states: vec![State::default()],
            initial: StateId::new(0),
            deterministic: true,
            singleton: None,
        }
    }

    /// The automaton accepting only the empty string.
    pub fn empty_string() -> Self {
        Self::from_string("")
    }

    /// The automaton accepting exactly `s`, stored as a singleton.
    pub fn from_string(s: &str) -> Self {
        Self {
            states: Vec::new(),
            initial: StateId::NONE,
            deterministic: true,
            singleton: Some(s.to_string()),
        }
    }

    pub fn from_char(c: char) -> Self {
        let mut buf = [0u8; 4];
        Self::from_string(c.encode_utf8(&mut buf))
    }

    /// The automaton accepting any single character in `[min, max]`.
    pub fn char_range(min: u32, max: u32) -> Self {
        Self::from_ranges(&[(min, max)])
    }

    /// The automaton accepting any single character.
    pub fn any_char() -> Self {
        Self::char_range(0, CHAR_MAX)
    }

    /// The automaton accepting any single character covered by `ranges`.
    pub fn from_ranges(ranges: &[(u32, u32)]) -> Self {
        let mut sorted: Vec<(u32, u32)> = ranges
            .iter()
            .copied()
            .filter(|&(lo, hi)| lo <= hi && lo <= CHAR_MAX)
            .map(|(lo, hi)| (lo, hi.min(CHAR_MAX)))
            .collect();
        sorted.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
        for (lo, hi) in sorted {
            match merged.last_mut() {
                Some(last) if lo <= last.1.saturating_add(1) => last.1 = last.1.max(hi),
                _ => merged.push((lo, hi)),
            }
        }

        match merged.as_slice() {
            [] => Self::empty(),
            [(lo, hi)] if lo == hi => match char::from_u32(*lo) {
                Some(c) => Self::from_char(c),
                None => Self::empty(),
            },
            _ => {
                let mut a = Self::empty();
                let end = a.alloc();
                a.states[end.index()].accept = true;
                let start = a.initial;
                a.states[start.index()].transitions = merged
                    .iter()
                    .map(|&(lo, hi)| Transition::new(lo, hi, end))
                    .collect();
                a
            }
        }
    }

    /// Assemble an automaton from raw parts.
    pub(crate) fn from_parts(states: Vec<State>, initial: StateId, deterministic: bool) -> Self {
        Self {
            states,
            initial,
            deterministic,
            singleton: None,
        }
    }

    #[inline]
    pub fn initial(&self) -> StateId {
        self.initial
    }

    #[inline]
    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.index()]
    }

    #[inline]
    pub fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[id.index()]
    }

    /// Number of slots in the arena, reachable or not.
    #[inline]
    pub fn arena_len(&self) -> usize {
        self.states.len()
    }

    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.deterministic
    }

    #[inline]
    pub(crate) fn set_deterministic(&mut self, deterministic: bool) {
        self.deterministic = deterministic;
    }

    #[inline]
    pub fn is_singleton(&self) -> bool {
        self.singleton.is_some()
    }

    /// The literal this automaton accepts, when stored as a singleton.
    pub fn singleton(&self) -> Option<&str> {
        self.singleton.as_deref()
    }

    pub fn has_epsilons(&self) -> bool {
        self.states.iter().any(|s| !s.epsilons.is_empty())
    }

    /// Number of reachable states.
    pub fn num_states(&self) -> usize {
        match &self.singleton {
            Some(s) => s.chars().count() + 1,
            None => self.reachable().len(),
        }
    }

    /// Number of reachable range transitions.
    pub fn num_transitions(&self) -> usize {
        match &self.singleton {
            Some(s) => s.chars().count(),
            None => self
                .reachable()
                .iter()
                .map(|&id| self.state(id).transitions.len())
                .sum(),
        }
    }

    /// Allocate a fresh, non-accepting state.
    pub fn alloc(&mut self) -> StateId {
        let id = StateId::new(self.states.len());
        self.states.push(State::default());
        id
    }

    pub(crate) fn set_initial(&mut self, id: StateId) {
        self.initial = id;
    }

    /// Replace the singleton shortcut with an explicit chain of states.
    pub fn expand_singleton(&mut self) {
        let Some(s) = self.singleton.take() else {
            return;
        };
        let mut states = vec![State::default()];
        for c in s.chars() {
            let next = StateId::new(states.len());
            let last = states.len() - 1;
            states[last]
                .transitions
                .push(Transition::new(c as u32, c as u32, next));
            states.push(State::default());
        }
        let last = states.len() - 1;
        states[last].accept = true;
        self.states = states;
        self.initial = StateId::new(0);
        self.deterministic = true;
    }

    /// A clone with the singleton shortcut expanded.
    pub fn expanded(&self) -> Automaton {
        let mut a = self.clone();
        a.expand_singleton();
        a
    }

    /// Copy all states of `other` into this arena and return the id of its
    /// initial state. The copied states are unreachable until wired in.
    pub fn absorb(&mut self, other: &Automaton) -> StateId {
        debug_assert!(!self.is_singleton(), "absorb into a singleton");
        let expanded;
        let other = if other.is_singleton() {
            expanded = other.expanded();
            &expanded
        } else {
            other
        };

        let offset = self.states.len() as u32;
        let shift = |id: StateId| StateId(id.0 + offset);
        self.states.extend(other.states.iter().map(|s| State {
            accept: s.accept,
            transitions: s
                .transitions
                .iter()
                .map(|t| Transition::new(t.min, t.max, shift(t.to)))
                .collect(),
            epsilons: s.epsilons.iter().map(|&e| shift(e)).collect(),
            actor: s.actor.clone(),
        }));
        shift(other.initial)
    }

    /// States reachable from the initial state, in breadth-first order.
    pub fn reachable(&self) -> Vec<StateId> {
        self.reachable_from(self.initial)
    }

    pub(crate) fn reachable_from(&self, root: StateId) -> Vec<StateId> {
        if self.is_singleton() || root.is_none() {
            return Vec::new();
        }
        let mut seen = vec![false; self.states.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        seen[root.index()] = true;
        queue.push_back(root);
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let state = self.state(id);
            let targets = state
                .transitions
                .iter()
                .map(|t| t.to)
                .chain(state.epsilons.iter().copied());
            for to in targets {
                if !seen[to.index()] {
                    seen[to.index()] = true;
                    queue.push_back(to);
                }
            }
        }
        order
    }

    /// Reachable accept states.
    pub fn accept_states(&self) -> Vec<StateId> {
        self.accept_states_from(self.initial)
    }

    pub(crate) fn accept_states_from(&self, root: StateId) -> Vec<StateId> {
        self.reachable_from(root)
            .into_iter()
            .filter(|&id| self.state(id).accept)
            .collect()
    }

    /// Per arena slot: reachable from the initial state and able to reach an
    /// accept state.
    pub fn live_states(&self) -> Vec<bool> {
        let n = self.states.len();
        let reachable = self.reachable();
        let mut reverse: Vec<Vec<StateId>> = vec![Vec::new(); n];
        for &id in &reachable {
            let state = self.state(id);
            for to in state
                .transitions
                .iter()
                .map(|t| t.to)
                .chain(state.epsilons.iter().copied())
            {
                reverse[to.index()].push(id);
            }
        }

        let mut live = vec![false; n];
        let mut queue: VecDeque<StateId> = reachable
            .iter()
            .copied()
            .filter(|&id| self.state(id).accept)
            .collect();
        for id in &queue {
            live[id.index()] = true;
        }
        while let Some(id) = queue.pop_front() {
            for &from in &reverse[id.index()] {
                if !live[from.index()] {
                    live[from.index()] = true;
                    queue.push_back(from);
                }
            }
        }
        live
    }

    /// Sorted boundaries of the character classes that the reachable
    /// transitions distinguish. Always starts with 0.
    pub fn start_points(&self) -> Vec<u32> {
        let mut points = vec![0];
        for id in self.reachable() {
            for t in &self.state(id).transitions {
                points.push(t.min);
                if t.max < CHAR_MAX {
                    points.push(t.max + 1);
                }
            }
        }
        points.sort_unstable();
        points.dedup();
        points
    }

    /// Drop transitions and epsilons into states that cannot reach an
    /// accept state, then compact the arena.
    pub fn remove_dead_transitions(&mut self) {
        if self.is_singleton() {
            return;
        }
        let live = self.live_states();
        for id in self.reachable() {
            let state = &mut self.states[id.index()];
            state.transitions.retain(|t| live[t.to.index()]);
            state.epsilons.retain(|e| live[e.index()]);
        }
        self.reduce();
        self.compact();
    }

    /// Rebuild the arena with only the reachable states, renumbered in
    /// breadth-first order from the initial state (which becomes id 0).
    pub fn compact(&mut self) {
        if self.is_singleton() {
            return;
        }
        let order = self.reachable();
        let mut remap = vec![StateId::NONE; self.states.len()];
        for (new, old) in order.iter().enumerate() {
            remap[old.index()] = StateId::new(new);
        }
        let mut states = Vec::with_capacity(order.len());
        for old in &order {
            let s = std::mem::take(&mut self.states[old.index()]);
            states.push(State {
                accept: s.accept,
                transitions: s
                    .transitions
                    .into_iter()
                    .map(|t| Transition::new(t.min, t.max, remap[t.to.index()]))
                    .collect(),
                epsilons: s.epsilons.into_iter().map(|e| remap[e.index()]).collect(),
                actor: s.actor,
            });
        }
        self.states = states;
        self.initial = StateId::new(0);
    }

    /// Merge adjacent or overlapping ranges that share a target and sort the
    /// transitions of every state by range.
    pub fn reduce(&mut self) {
        for state in &mut self.states {
            if state.transitions.len() > 1 {
                state.transitions.sort_unstable_by_key(|t| (t.to, t.min, t.max));
                let mut merged: Vec<Transition> = Vec::with_capacity(state.transitions.len());
                for t in state.transitions.drain(..) {
                    match merged.last_mut() {
                        Some(last) if last.to == t.to && t.min <= last.max.saturating_add(1) => {
                            last.max = last.max.max(t.max);
                        }
                        _ => merged.push(t),
                    }
                }
                merged.sort_unstable_by_key(|t| (t.min, t.max));
                state.transitions = merged;
            }
            if state.epsilons.len() > 1 {
                state.epsilons.sort_unstable();
                state.epsilons.dedup();
            }
        }
    }

    /// Make every reachable state total by routing all uncovered characters
    /// to a fresh absorbing reject state. Requires a deterministic automaton.
    pub fn totalize(&mut self) {
        debug_assert!(self.deterministic, "totalize needs a deterministic automaton");
        self.expand_singleton();
        let reachable = self.reachable();
        let dead = self.alloc();
        self.states[dead.index()]
            .transitions
            .push(Transition::new(0, CHAR_MAX, dead));

        for id in reachable {
            let state = &mut self.states[id.index()];
            state.transitions.sort_unstable_by_key(|t| (t.min, t.max));
            let mut filled = Vec::with_capacity(state.transitions.len() * 2 + 1);
            let mut next: u32 = 0;
            for t in &state.transitions {
                if t.min > next {
                    filled.push(Transition::new(next, t.min - 1, dead));
                }
                filled.push(*t);
                next = next.max(t.max.saturating_add(1));
            }
            if next <= CHAR_MAX {
                filled.push(Transition::new(next, CHAR_MAX, dead));
            }
            state.transitions = filled;
        }
    }

    /// Deterministic step: the target of the first transition covering `c`.
    #[inline]
    pub fn step(&self, id: StateId, c: u32) -> Option<StateId> {
        self.state(id)
            .transitions
            .iter()
            .find(|t| t.contains(c))
            .map(|t| t.to)
    }

    /// Attach `actor` to every reachable accept state.
    pub fn tag_accept_states(&mut self, actor: &Actor) {
        self.expand_singleton();
        for id in self.accept_states() {
            self.states[id.index()].actor = actor.clone();
        }
    }
}
