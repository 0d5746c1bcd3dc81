//! DFA minimization by partition refinement.
//!
//! The automaton is first determinized and trimmed (no unreachable states,
//! no dead transitions), then states are split until every block agrees on
//! acceptance, actor and the block reached on every character range. The
//! initial partition keys on the actor as well as acceptance, so states
//! carrying different identifiers are never merged.

use rustc_hash::FxHashMap;

use super::actor::Actor;
use super::arena::{Automaton, State, StateId, Transition};

/// Transition ranges of one state mapped to target blocks, with adjacent
/// ranges into the same block merged.
type Signature = Vec<(u32, u32, u32)>;

fn signature(state: &State, block: &[u32]) -> Signature {
    let mut sig: Signature = Vec::with_capacity(state.transitions.len());
    for t in &state.transitions {
        let b = block[t.to.index()];
        match sig.last_mut() {
            Some(last) if last.2 == b && last.1.saturating_add(1) == t.min => last.1 = t.max,
            _ => sig.push((t.min, t.max, b)),
        }
    }
    sig
}

impl Automaton {
    /// Replace this automaton with the minimal equivalent DFA.
    pub fn minimize(&mut self) {
        if self.is_singleton() {
            return;
        }
        if self.deterministic {
            // constructor-built DFAs can still hold dead transitions
            self.remove_dead_transitions();
        } else {
            self.determinize();
        }
        let n = self.states.len();
        if n <= 1 {
            return;
        }

        let mut block: Vec<u32> = Vec::with_capacity(n);
        let mut initial: FxHashMap<(bool, &Actor), u32> = FxHashMap::default();
        for state in &self.states {
            let next = initial.len() as u32;
            block.push(*initial.entry((state.accept, &state.actor)).or_insert(next));
        }
        let mut count = initial.len();

        loop {
            let mut split: FxHashMap<(u32, Signature), u32> = FxHashMap::default();
            let mut refined: Vec<u32> = Vec::with_capacity(n);
            for (i, state) in self.states.iter().enumerate() {
                let key = (block[i], signature(state, &block));
                let next = split.len() as u32;
                refined.push(*split.entry(key).or_insert(next));
            }
            let refined_count = split.len();
            block = refined;
            if refined_count == count {
                break;
            }
            count = refined_count;
        }

        if count == n {
            return;
        }

        let mut merged: Vec<Option<State>> = vec![None; count];
        for (i, state) in self.states.iter().enumerate() {
            let b = block[i] as usize;
            if merged[b].is_some() {
                continue;
            }
            merged[b] = Some(State {
                accept: state.accept,
                transitions: state
                    .transitions
                    .iter()
                    .map(|t| Transition::new(t.min, t.max, StateId::new(block[t.to.index()] as usize)))
                    .collect(),
                epsilons: Vec::new(),
                actor: state.actor.clone(),
            });
        }

        self.states = merged.into_iter().flatten().collect();
        self.initial = StateId::new(block[self.initial.index()] as usize);
        self.reduce();
        self.compact();
    }
}
