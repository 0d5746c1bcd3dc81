//! Subset construction and epsilon elimination.
//!
//! Determinization follows the classic powerset construction over the
//! automaton's start points: the alphabet is cut into the character classes
//! the transitions distinguish, and each reachable set of source states
//! becomes one state of the result. Subsets are interned by their sorted
//! member list so every set is explored exactly once.
//!
//! A subset accepts when any member accepts; its actor is the union of the
//! accepting members' actors.

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::actor::Actor;
use super::arena::{Automaton, State, StateId, Transition, CHAR_MAX};
use super::state_set::StateSet;

/// Canonical (sorted) member list of a subset.
type SubsetKey = SmallVec<[StateId; 4]>;

/// Extend `set` with every state reachable through epsilon edges.
pub(crate) fn epsilon_closure(a: &Automaton, set: &mut StateSet, stack: &mut Vec<StateId>) {
    stack.clear();
    stack.extend(set.iter());
    while let Some(id) = stack.pop() {
        for &e in &a.state(id).epsilons {
            if set.insert(e) {
                stack.push(e);
            }
        }
    }
}

fn subset_key(set: &StateSet) -> SubsetKey {
    set.sorted().into_iter().collect()
}

impl Automaton {
    /// Convert to an equivalent deterministic, epsilon-free automaton with no
    /// dead transitions. A no-op when already deterministic.
    pub fn determinize(&mut self) {
        if self.deterministic || self.is_singleton() {
            return;
        }
        let points = self.start_points();
        let mut set = StateSet::new(self.states.len());
        let mut stack = Vec::new();

        set.insert(self.initial);
        epsilon_closure(self, &mut set, &mut stack);
        let start_key = subset_key(&set);

        let mut out: Vec<State> = vec![State::default()];
        let mut index: FxHashMap<SubsetKey, StateId> = FxHashMap::default();
        let mut worklist: VecDeque<(SubsetKey, StateId)> = VecDeque::new();
        index.insert(start_key.clone(), StateId::new(0));
        worklist.push_back((start_key, StateId::new(0)));

        // start point index -> targets reached on that character class
        let mut buckets: BTreeMap<usize, Vec<StateId>> = BTreeMap::new();

        while let Some((key, id)) = worklist.pop_front() {
            let mut accept = false;
            let mut actor = Actor::None;
            buckets.clear();

            for &q in &key {
                let state = self.state(q);
                if state.accept {
                    accept = true;
                    actor = actor.merge(&state.actor);
                }
                for t in &state.transitions {
                    let lo = points.partition_point(|&p| p < t.min);
                    let hi = points.partition_point(|&p| p <= t.max);
                    for n in lo..hi {
                        buckets.entry(n).or_default().push(t.to);
                    }
                }
            }

            let mut transitions = Vec::with_capacity(buckets.len());
            for (&n, targets) in &buckets {
                set.clear();
                for &t in targets {
                    set.insert(t);
                }
                epsilon_closure(self, &mut set, &mut stack);
                let target_key = subset_key(&set);
                let to = match index.get(&target_key) {
                    Some(&to) => to,
                    None => {
                        let to = StateId::new(out.len());
                        out.push(State::default());
                        index.insert(target_key.clone(), to);
                        worklist.push_back((target_key, to));
                        to
                    }
                };
                let min = points[n];
                let max = points.get(n + 1).map_or(CHAR_MAX, |&p| p - 1);
                transitions.push(Transition::new(min, max, to));
            }

            let state = &mut out[id.index()];
            state.accept = accept;
            state.actor = actor;
            state.transitions = transitions;
        }

        self.states = out;
        self.initial = StateId::new(0);
        self.deterministic = true;
        self.remove_dead_transitions();
    }

    /// Replace epsilon edges with the transitions and acceptance they lead
    /// to. The result may still be nondeterministic.
    pub fn remove_epsilons(&mut self) {
        self.expand_singleton();
        if !self.has_epsilons() {
            return;
        }
        let reachable = self.reachable();
        let mut set = StateSet::new(self.states.len());
        let mut stack = Vec::new();
        let mut rebuilt: Vec<(StateId, State)> = Vec::with_capacity(reachable.len());

        for &id in &reachable {
            set.clear();
            set.insert(id);
            epsilon_closure(self, &mut set, &mut stack);
            let mut state = State::default();
            for q in set.iter() {
                let member = self.state(q);
                if member.accept {
                    state.accept = true;
                    state.actor = state.actor.merge(&member.actor);
                }
                state.transitions.extend_from_slice(&member.transitions);
            }
            rebuilt.push((id, state));
        }
        for (id, state) in rebuilt {
            self.states[id.index()] = state;
        }
        self.remove_dead_transitions();
    }
}
