//! Regexp parsing and automaton construction for dictionary patterns.
//!
//! Patterns are parsed into a small tree (`parser`) and then compiled into an
//! [`Automaton`](crate::automaton::Automaton) through the automaton algebra
//! (`compile`). The supported syntax covers what lexicon entries need:
//! literals, `\` escapes, `"..."` quoted strings, `.`, character classes,
//! alternation, grouping and the usual quantifiers. Lookaround,
//! backreferences and anchors are not supported.

mod compile;
mod parser;

pub use compile::{compile_regexp, compile_regexp_with, make_regexp_automaton, CompileOptions};
pub use parser::{
    invert_rune_range, parse_regexp, simplify_rune_range, Atom, QuantifiedAtom, RegexpBranch,
    RegexpError, RegexpErrorKind, RegexpRoot, RunePair, RuneRange, MAX_REPEAT, RUNE_MAX,
};
