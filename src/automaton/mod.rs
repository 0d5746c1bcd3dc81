//! Finite automata over Unicode character ranges.
//!
//! This module implements the automaton algebra that dictionary patterns are
//! compiled into. The key components are:
//!
//! - `Automaton`: arena of states with range transitions, epsilon edges and
//!   per-state actors
//! - `Actor`: identifier payload attached to accept states
//! - `RunAutomaton`: the frozen, thread-safe form used for matching
//!
//! # Module Organization
//!
//! - `arena`: core data structures (StateId, Transition, State, Automaton)
//! - `actor`: accept-state payloads and their merge rule
//! - `state_set`: sparse state sets for closures and NFA simulation
//! - `determinize`: subset construction and epsilon elimination
//! - `minimize`: partition-refinement minimization
//! - `operations`: union, concatenation, repetition, complement,
//!   intersection, difference and language tests
//! - `table`: packed transition tables (RunAutomaton)
//! - `io`: binary persistence

mod actor;
mod arena;
mod determinize;
mod io;
mod minimize;
pub mod operations;
mod state_set;
mod table;

pub use actor::{Actor, ID_SEPARATOR};
pub use arena::{Automaton, State, StateId, Transition, CHAR_MAX};
pub use io::{load_automaton, read_automaton, save_automaton, write_automaton, AUTOMATON_MAGIC};
pub use operations::{
    complement, concatenate, concatenate_all, intersection, is_empty, is_empty_string, is_total,
    minus, optional, repeat, repeat_min, repeat_range, run, same_language, subset_of, union,
    union_all,
};
pub use state_set::{StateSet, StateSets};
pub use table::{RunAutomaton, StateTable};
