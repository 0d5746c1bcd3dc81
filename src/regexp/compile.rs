//! Automaton construction from parsed regexp trees.
//!
//! Each tree node maps onto one algebra operation: branches are unions,
//! pieces within a branch are concatenated, quantifiers become optional,
//! repeat or bounded-repeat wrappers. Literal runs stay singletons all the
//! way through, so a plain word never builds a state graph.

use crate::automaton::{
    concatenate_all, optional, repeat, repeat_min, repeat_range, union_all, Automaton,
};

use super::parser::{parse_regexp, Atom, QuantifiedAtom, RegexpBranch, RegexpError, RegexpRoot};

/// Knobs for [`compile_regexp_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Minimize after every group and at the root instead of leaving the
    /// result nondeterministic.
    pub minimize_always: bool,
}

/// Compile a pattern into an automaton with default options.
pub fn compile_regexp(pattern: &str) -> Result<Automaton, RegexpError> {
    compile_regexp_with(pattern, CompileOptions::default())
}

/// Compile a pattern into an automaton.
pub fn compile_regexp_with(pattern: &str, options: CompileOptions) -> Result<Automaton, RegexpError> {
    let root = parse_regexp(pattern)?;
    Ok(make_regexp_automaton(&root, options))
}

/// Build the automaton for a parsed tree.
pub fn make_regexp_automaton(root: &RegexpRoot, options: CompileOptions) -> Automaton {
    let mut a = match root.as_slice() {
        [] => Automaton::empty_string(),
        [branch] => make_branch_automaton(branch, options),
        branches => {
            let parts: Vec<Automaton> = branches
                .iter()
                .map(|b| make_branch_automaton(b, options))
                .collect();
            union_all(parts.iter())
        }
    };
    if options.minimize_always {
        a.minimize();
    }
    a
}

fn make_branch_automaton(branch: &RegexpBranch, options: CompileOptions) -> Automaton {
    match branch.as_slice() {
        [] => Automaton::empty_string(),
        [piece] => make_piece_automaton(piece, options),
        pieces => {
            let parts: Vec<Automaton> = pieces
                .iter()
                .map(|p| make_piece_automaton(p, options))
                .collect();
            concatenate_all(&parts)
        }
    }
}

fn make_piece_automaton(qa: &QuantifiedAtom, options: CompileOptions) -> Automaton {
    let atom = make_atom_automaton(&qa.atom, options);
    match (qa.min, qa.max) {
        (1, Some(1)) => atom,
        (0, Some(1)) => optional(&atom),
        (0, None) => repeat(&atom),
        (min, None) => repeat_min(&atom, min as usize),
        (min, Some(max)) => repeat_range(&atom, min as usize, max as usize),
    }
}

fn make_atom_automaton(atom: &Atom, options: CompileOptions) -> Automaton {
    match atom {
        Atom::Dot => Automaton::any_char(),
        Atom::Quoted(s) => Automaton::from_string(s),
        Atom::Runes(rr) => {
            let ranges: Vec<(u32, u32)> = rr.iter().map(|p| (p.lo as u32, p.hi as u32)).collect();
            Automaton::from_ranges(&ranges)
        }
        Atom::Group(root) => make_regexp_automaton(root, options),
    }
}
