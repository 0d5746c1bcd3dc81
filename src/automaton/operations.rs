//! Language-level operations on automata.
//!
//! Every function takes its operands by reference and returns a fresh
//! automaton; operands are never modified. Structural combinators (union,
//! concatenation, repetition) wire copies together with epsilon edges and
//! leave the result nondeterministic. Complement, intersection and the
//! inclusion tests determinize internally.
//!
//! Singleton automata short-circuit wherever the answer follows from the
//! literal alone.

use std::borrow::Cow;
use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use super::actor::Actor;
use super::arena::{Automaton, State, StateId, Transition};
use super::determinize::epsilon_closure;
use super::state_set::StateSets;

/// A deterministic view of `a`: borrowed when it already is one.
fn deterministic(a: &Automaton) -> Cow<'_, Automaton> {
    if a.is_deterministic() && !a.is_singleton() {
        Cow::Borrowed(a)
    } else {
        let mut d = a.expanded();
        d.determinize();
        Cow::Owned(d)
    }
}

fn sorted_transitions(a: &Automaton) -> Vec<Vec<Transition>> {
    (0..a.arena_len())
        .map(|i| {
            let mut ts = a.state(StateId::new(i)).transitions.clone();
            ts.sort_unstable_by_key(|t| (t.min, t.max));
            ts
        })
        .collect()
}

/// Language union.
pub fn union(a1: &Automaton, a2: &Automaton) -> Automaton {
    if let (Some(s1), Some(s2)) = (a1.singleton(), a2.singleton()) {
        if s1 == s2 {
            return a1.clone();
        }
    }
    union_all([a1, a2])
}

/// Union of any number of automata. Operands with an empty language are
/// skipped; with none left the result is [`Automaton::empty`].
pub fn union_all<'a, I>(automata: I) -> Automaton
where
    I: IntoIterator<Item = &'a Automaton>,
{
    let mut out = Automaton::empty();
    let start = out.initial();
    for a in automata {
        if is_empty(a) {
            continue;
        }
        let entry = out.absorb(a);
        out.state_mut(start).epsilons.push(entry);
        out.set_deterministic(false);
    }
    out
}

/// Language concatenation `a1 a2`.
pub fn concatenate(a1: &Automaton, a2: &Automaton) -> Automaton {
    if let (Some(s1), Some(s2)) = (a1.singleton(), a2.singleton()) {
        return Automaton::from_string(&format!("{s1}{s2}"));
    }
    concatenate_all(&[a1.clone(), a2.clone()])
}

/// Concatenation of a sequence. The empty sequence yields the empty-string
/// automaton; any empty-language operand yields the empty automaton.
pub fn concatenate_all(automata: &[Automaton]) -> Automaton {
    if automata.is_empty() {
        return Automaton::empty_string();
    }
    if automata.iter().all(Automaton::is_singleton) {
        let literal: String = automata.iter().filter_map(Automaton::singleton).collect();
        return Automaton::from_string(&literal);
    }
    if automata.iter().any(is_empty) {
        return Automaton::empty();
    }

    let mut out = automata[0].expanded();
    let mut accepts = out.accept_states();
    for a in &automata[1..] {
        if a.singleton() == Some("") {
            continue;
        }
        let entry = out.absorb(a);
        let next_accepts = out.accept_states_from(entry);
        for p in accepts {
            let state = out.state_mut(p);
            state.accept = false;
            state.actor = Actor::None;
            state.epsilons.push(entry);
        }
        accepts = next_accepts;
    }
    out.set_deterministic(false);
    out
}

/// `a` or the empty string.
pub fn optional(a: &Automaton) -> Automaton {
    let mut out = a.expanded();
    let entry = out.initial();
    let start = out.alloc();
    let state = out.state_mut(start);
    state.accept = true;
    state.epsilons.push(entry);
    out.set_initial(start);
    out.set_deterministic(false);
    out
}

/// Kleene star: zero or more repetitions of `a`.
pub fn repeat(a: &Automaton) -> Automaton {
    let mut out = a.expanded();
    let accepts = out.accept_states();
    let entry = out.initial();
    let start = out.alloc();
    let state = out.state_mut(start);
    state.accept = true;
    state.epsilons.push(entry);
    for p in accepts {
        out.state_mut(p).epsilons.push(start);
    }
    out.set_initial(start);
    out.set_deterministic(false);
    out
}

/// `min` or more repetitions of `a`.
pub fn repeat_min(a: &Automaton, min: usize) -> Automaton {
    if min == 0 {
        return repeat(a);
    }
    let mut parts = vec![a.clone(); min];
    parts.push(repeat(a));
    concatenate_all(&parts)
}

/// Between `min` and `max` repetitions of `a`, inclusive. Empty when
/// `min > max`.
pub fn repeat_range(a: &Automaton, min: usize, max: usize) -> Automaton {
    if min > max {
        return Automaton::empty();
    }
    let mut out = match min {
        0 => Automaton::empty_string(),
        1 => a.clone(),
        _ => concatenate_all(&vec![a.clone(); min]),
    };
    let extra = max - min;
    if extra == 0 {
        return out;
    }

    // a chain of `extra` copies where every copy's accept states may also
    // continue into the next one
    let mut tail = a.expanded();
    for _ in 1..extra {
        let mut link = a.expanded();
        let accepts = link.accept_states();
        let entry = link.absorb(&tail);
        for p in accepts {
            link.state_mut(p).epsilons.push(entry);
        }
        tail = link;
    }

    out.expand_singleton();
    let accepts = out.accept_states();
    let entry = out.absorb(&tail);
    for p in accepts {
        out.state_mut(p).epsilons.push(entry);
    }
    out.set_deterministic(false);
    out
}

/// Every string over the full character alphabet not in `a`. Actors are
/// cleared.
pub fn complement(a: &Automaton) -> Automaton {
    let mut out = a.expanded();
    out.determinize();
    out.totalize();
    for id in out.reachable() {
        let state = out.state_mut(id);
        state.accept = !state.accept;
        state.actor = Actor::None;
    }
    out.remove_dead_transitions();
    out
}

/// Language intersection. Accept states keep the actor of `a1`.
pub fn intersection(a1: &Automaton, a2: &Automaton) -> Automaton {
    if let Some(s) = a1.singleton() {
        return if run(a2, s) { a1.clone() } else { Automaton::empty() };
    }
    if let Some(s) = a2.singleton() {
        return if run(a1, s) { a2.clone() } else { Automaton::empty() };
    }

    let d1 = deterministic(a1);
    let d2 = deterministic(a2);
    let t1 = sorted_transitions(&d1);
    let t2 = sorted_transitions(&d2);

    let mut states: Vec<State> = vec![State::default()];
    let mut pairs: FxHashMap<(StateId, StateId), StateId> = FxHashMap::default();
    let mut worklist: VecDeque<(StateId, StateId, StateId)> = VecDeque::new();
    let start = (d1.initial(), d2.initial());
    pairs.insert(start, StateId::new(0));
    worklist.push_back((start.0, start.1, StateId::new(0)));

    while let Some((p1, p2, id)) = worklist.pop_front() {
        let s1 = d1.state(p1);
        let accept = s1.accept && d2.state(p2).accept;
        let mut transitions = Vec::new();

        let (r1, r2) = (&t1[p1.index()], &t2[p2.index()]);
        let mut b2 = 0;
        for t in r1 {
            while b2 < r2.len() && r2[b2].max < t.min {
                b2 += 1;
            }
            let mut n2 = b2;
            while n2 < r2.len() && r2[n2].min <= t.max {
                let u = &r2[n2];
                let key = (t.to, u.to);
                let to = match pairs.get(&key) {
                    Some(&to) => to,
                    None => {
                        let to = StateId::new(states.len());
                        states.push(State::default());
                        pairs.insert(key, to);
                        worklist.push_back((t.to, u.to, to));
                        to
                    }
                };
                transitions.push(Transition::new(t.min.max(u.min), t.max.min(u.max), to));
                n2 += 1;
            }
        }

        let state = &mut states[id.index()];
        state.accept = accept;
        state.actor = if accept { s1.actor.clone() } else { Actor::None };
        state.transitions = transitions;
    }

    let mut out = Automaton::from_parts(states, StateId::new(0), true);
    out.remove_dead_transitions();
    out
}

/// Strings in `a1` but not in `a2`. Accept states keep the actor of `a1`.
pub fn minus(a1: &Automaton, a2: &Automaton) -> Automaton {
    if is_empty(a1) || is_empty(a2) {
        return if is_empty(a1) { Automaton::empty() } else { a1.clone() };
    }
    if let Some(s) = a1.singleton() {
        return if run(a2, s) { Automaton::empty() } else { a1.clone() };
    }
    intersection(a1, &complement(a2))
}

/// Whether the language of `a1` is contained in that of `a2`.
pub fn subset_of(a1: &Automaton, a2: &Automaton) -> bool {
    if let Some(s1) = a1.singleton() {
        return match a2.singleton() {
            Some(s2) => s1 == s2,
            None => run(a2, s1),
        };
    }
    let mut e1 = a1.clone();
    e1.remove_epsilons();
    e1.remove_dead_transitions();
    let d2 = deterministic(a2);
    let t1 = sorted_transitions(&e1);
    let t2 = sorted_transitions(&d2);

    let mut visited: FxHashMap<(StateId, StateId), ()> = FxHashMap::default();
    let mut worklist: VecDeque<(StateId, StateId)> = VecDeque::new();
    let start = (e1.initial(), d2.initial());
    visited.insert(start, ());
    worklist.push_back(start);

    while let Some((p1, p2)) = worklist.pop_front() {
        if e1.state(p1).accept && !d2.state(p2).accept {
            return false;
        }
        let r2 = &t2[p2.index()];
        for t in &t1[p1.index()] {
            // every character of `t` must be covered by some range of r2
            let mut need = t.min;
            let mut n2 = r2.partition_point(|u| u.max < t.min);
            while n2 < r2.len() && r2[n2].min <= t.max {
                let u = &r2[n2];
                if u.min > need {
                    return false;
                }
                let key = (t.to, u.to);
                if visited.insert(key, ()).is_none() {
                    worklist.push_back(key);
                }
                match u.max.checked_add(1) {
                    Some(next) if next <= t.max => need = next,
                    _ => {
                        need = u32::MAX;
                        break;
                    }
                }
                n2 += 1;
            }
            if need != u32::MAX && need <= t.max {
                return false;
            }
        }
    }
    true
}

/// Whether `a1` and `a2` accept the same language.
pub fn same_language(a1: &Automaton, a2: &Automaton) -> bool {
    subset_of(a1, a2) && subset_of(a2, a1)
}

/// Whether `a` accepts `s`.
pub fn run(a: &Automaton, s: &str) -> bool {
    if let Some(literal) = a.singleton() {
        return literal == s;
    }
    if a.is_deterministic() {
        let mut p = a.initial();
        for c in s.chars() {
            match a.step(p, c as u32) {
                Some(q) => p = q,
                None => return false,
            }
        }
        return a.state(p).accept;
    }

    let mut sets = StateSets::new(a.arena_len());
    let mut stack = Vec::new();
    sets.current.insert(a.initial());
    epsilon_closure(a, &mut sets.current, &mut stack);
    for c in s.chars() {
        let c = c as u32;
        let StateSets { current, next } = &mut sets;
        for p in current.iter() {
            for t in &a.state(p).transitions {
                if t.contains(c) {
                    next.insert(t.to);
                }
            }
        }
        epsilon_closure(a, next, &mut stack);
        sets.advance();
        if sets.current.is_empty() {
            return false;
        }
    }
    let accepted = sets.current.iter().any(|p| a.state(p).accept);
    accepted
}

/// Whether `a` accepts no string at all.
pub fn is_empty(a: &Automaton) -> bool {
    if a.is_singleton() {
        return false;
    }
    !a.reachable().iter().any(|&id| a.state(id).accept)
}

/// Whether `a` accepts the empty string and nothing else.
pub fn is_empty_string(a: &Automaton) -> bool {
    if let Some(s) = a.singleton() {
        return s.is_empty();
    }
    if !run(a, "") {
        return false;
    }
    let live = a.live_states();
    a.reachable()
        .iter()
        .all(|&id| a.state(id).transitions.iter().all(|t| !live[t.to.index()]))
}

/// Whether `a` accepts every string.
pub fn is_total(a: &Automaton) -> bool {
    is_empty(&complement(a))
}
