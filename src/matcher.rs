//! Longest-match scanning of text against a frozen automaton.
//!
//! The scan walks the automaton from every legal match start. Each time the
//! walk sits in an accept state at a legal match end, the position becomes
//! the pending [`Waypoint`]; a later one replaces it, so the longest match
//! wins. When the walk dies (or the text runs out) the waypoint is reported
//! and scanning resumes right after it; without a waypoint the start moves
//! forward by one character. Matches therefore never overlap.
//!
//! Legal starts and ends come from a [`TokenBoundary`] policy, so the same
//! automaton can be scanned under different tokenization rules.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::automaton::{Actor, RunAutomaton, StateId};

/// Rule for where a match may start and end.
///
/// `offset` is a UTF-8 byte offset into `text`. `is_start` receives the first
/// byte of a candidate match, `is_end` its exclusive end (possibly
/// `text.len()`).
pub trait TokenBoundary: Send + Sync {
    fn is_start(&self, text: &str, offset: usize) -> bool;
    fn is_end(&self, text: &str, end: usize) -> bool;
}

fn char_at(text: &str, offset: usize) -> Option<char> {
    text.get(offset..).and_then(|s| s.chars().next())
}

fn char_before(text: &str, offset: usize) -> Option<char> {
    text.get(..offset).and_then(|s| s.chars().next_back())
}

/// Gene and protein name tokenization.
///
/// A match may not start on `' ' ':' '(' '/'` and must follow the start of
/// text or one of `' ' ':' '(' '/' '-'`. It must be followed by the end of
/// text or one of `' ' ',' '.' ':' ';' ')' '/' '-' '+' '('`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeneTokenBoundary;

impl GeneTokenBoundary {
    const NOT_START: [char; 4] = [' ', ':', '(', '/'];
    const BEFORE_START: [char; 5] = [' ', ':', '(', '/', '-'];
    const AFTER_END: [char; 10] = [' ', ',', '.', ':', ';', ')', '/', '-', '+', '('];
}

impl TokenBoundary for GeneTokenBoundary {
    fn is_start(&self, text: &str, offset: usize) -> bool {
        match char_at(text, offset) {
            Some(c) if !Self::NOT_START.contains(&c) => match char_before(text, offset) {
                None => true,
                Some(prev) => Self::BEFORE_START.contains(&prev),
            },
            _ => false,
        }
    }

    fn is_end(&self, text: &str, end: usize) -> bool {
        match char_at(text, end) {
            None => true,
            Some(next) => Self::AFTER_END.contains(&next),
        }
    }
}

/// Matches must not be flanked by alphanumeric characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordBoundary;

impl TokenBoundary for WordBoundary {
    fn is_start(&self, text: &str, offset: usize) -> bool {
        !char_before(text, offset).is_some_and(char::is_alphanumeric)
    }

    fn is_end(&self, text: &str, end: usize) -> bool {
        !char_at(text, end).is_some_and(char::is_alphanumeric)
    }
}

/// Every position is a legal start and end.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyPosition;

impl TokenBoundary for AnyPosition {
    fn is_start(&self, _text: &str, _offset: usize) -> bool {
        true
    }

    fn is_end(&self, _text: &str, _end: usize) -> bool {
        true
    }
}

/// A boundary policy built from two closures.
pub struct FnBoundary<S, E> {
    start: S,
    end: E,
}

impl<S, E> FnBoundary<S, E>
where
    S: Fn(&str, usize) -> bool + Send + Sync,
    E: Fn(&str, usize) -> bool + Send + Sync,
{
    pub fn new(start: S, end: E) -> Self {
        Self { start, end }
    }
}

impl<S, E> TokenBoundary for FnBoundary<S, E>
where
    S: Fn(&str, usize) -> bool + Send + Sync,
    E: Fn(&str, usize) -> bool + Send + Sync,
{
    fn is_start(&self, text: &str, offset: usize) -> bool {
        (self.start)(text, offset)
    }

    fn is_end(&self, text: &str, end: usize) -> bool {
        (self.end)(text, end)
    }
}

static GENE: GeneTokenBoundary = GeneTokenBoundary;
static WORD: WordBoundary = WordBoundary;
static ANY: AnyPosition = AnyPosition;

/// Named boundary policies, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    #[default]
    Gene,
    Word,
    Any,
}

impl BoundaryPolicy {
    pub fn boundary(self) -> &'static dyn TokenBoundary {
        match self {
            BoundaryPolicy::Gene => &GENE,
            BoundaryPolicy::Word => &WORD,
            BoundaryPolicy::Any => &ANY,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BoundaryPolicy::Gene => "gene",
            BoundaryPolicy::Word => "word",
            BoundaryPolicy::Any => "any",
        }
    }
}

impl fmt::Display for BoundaryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BoundaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gene" => Ok(BoundaryPolicy::Gene),
            "word" => Ok(BoundaryPolicy::Word),
            "any" => Ok(BoundaryPolicy::Any),
            other => Err(format!("unknown boundary policy '{other}'")),
        }
    }
}

/// Longest accepting position seen so far during one walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Waypoint {
    pub end: usize,
    pub state: StateId,
}

/// One reported match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'r, 't> {
    /// Actor of the accept state the match ended in; may be [`Actor::None`].
    pub actor: &'r Actor,
    /// Byte span in the scanned text.
    pub span: Range<usize>,
    pub text: &'t str,
}

/// Lazy iterator over the non-overlapping matches in a text.
pub struct Matches<'r, 't> {
    automaton: &'r RunAutomaton,
    boundary: &'r dyn TokenBoundary,
    text: &'t str,
    start: usize,
}

/// Byte offset of the character after the one at `offset`.
pub(crate) fn next_char_boundary(text: &str, offset: usize) -> usize {
    offset + char_at(text, offset).map_or(1, char::len_utf8)
}

/// Walk `automaton` from `start` and return the last waypoint seen before
/// the walk dies or the text ends.
pub fn longest_match_at(
    automaton: &RunAutomaton,
    boundary: &dyn TokenBoundary,
    text: &str,
    start: usize,
) -> Option<Waypoint> {
    let mut state = automaton.initial();
    let mut waypoint = None;
    for (i, c) in text[start..].char_indices() {
        match automaton.step(state, c) {
            Some(next) => state = next,
            None => break,
        }
        let end = start + i + c.len_utf8();
        if automaton.is_accept(state) && boundary.is_end(text, end) {
            waypoint = Some(Waypoint { end, state });
        }
    }
    waypoint
}

impl<'r, 't> Iterator for Matches<'r, 't> {
    type Item = Match<'r, 't>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.start < self.text.len() {
            let start = self.start;
            if !self.boundary.is_start(self.text, start) {
                self.start = next_char_boundary(self.text, start);
                continue;
            }
            match longest_match_at(self.automaton, self.boundary, self.text, start) {
                Some(Waypoint { end, state }) => {
                    self.start = end;
                    return Some(Match {
                        actor: self.automaton.actor(state),
                        span: start..end,
                        text: &self.text[start..end],
                    });
                }
                None => self.start = next_char_boundary(self.text, start),
            }
        }
        None
    }
}

/// Scan `text` with `automaton` under `boundary`.
pub fn find_matches<'r, 't>(
    automaton: &'r RunAutomaton,
    boundary: &'r dyn TokenBoundary,
    text: &'t str,
) -> Matches<'r, 't> {
    Matches {
        automaton,
        boundary,
        text,
        start: 0,
    }
}

/// Whether anything in `text` matches.
pub fn has_match(automaton: &RunAutomaton, boundary: &dyn TokenBoundary, text: &str) -> bool {
    find_matches(automaton, boundary, text).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automaton::{union_all, Automaton};

    fn table(entries: &[(&str, &str)]) -> RunAutomaton {
        let parts: Vec<Automaton> = entries
            .iter()
            .map(|(id, word)| {
                let mut a = Automaton::from_string(word);
                a.tag_accept_states(&Actor::from_ids(id));
                a
            })
            .collect();
        RunAutomaton::new(&union_all(parts.iter()))
    }

    fn spans(automaton: &RunAutomaton, boundary: &dyn TokenBoundary, text: &str) -> Vec<(String, Range<usize>)> {
        find_matches(automaton, boundary, text)
            .map(|m| (m.actor.joined(), m.span))
            .collect()
    }

    #[test]
    fn test_gene_boundary_rules() {
        let b = GeneTokenBoundary;
        assert!(b.is_start("p53", 0));
        assert!(b.is_start("anti-p53", 5));
        assert!(b.is_start("(p53)", 1));
        assert!(!b.is_start("(p53)", 0));
        assert!(!b.is_start("xp53", 1));
        assert!(b.is_end("p53", 3));
        assert!(b.is_end("p53+/+", 3));
        assert!(b.is_end("p53;", 3));
        assert!(!b.is_end("p53a", 3));
        assert!(!b.is_end("p53_", 3));
    }

    #[test]
    fn test_word_boundary_rules() {
        let b = WordBoundary;
        assert!(b.is_start("cat", 0));
        assert!(!b.is_start("concatenate", 3));
        assert!(b.is_end("cat.", 3));
        assert!(!b.is_end("cats", 3));
    }

    #[test]
    fn test_longest_match_wins() {
        let t = table(&[("A", "MURF"), ("B", "MURF1")]);
        let found = spans(&t, &GeneTokenBoundary, "MURF1 protein");
        assert_eq!(found, vec![("B".to_string(), 0..5)]);
    }

    #[test]
    fn test_shorter_match_when_longer_is_not_token_aligned() {
        let t = table(&[("A", "MURF"), ("B", "MURF1")]);
        let found = spans(&t, &GeneTokenBoundary, "MURF-1x");
        assert_eq!(found, vec![("A".to_string(), 0..4)]);
    }

    #[test]
    fn test_token_alignment_rejects_inner_match() {
        let t = table(&[("C", "cat")]);
        assert!(!has_match(&t, &GeneTokenBoundary, "concatenate"));
        assert!(!has_match(&t, &WordBoundary, "concatenate"));
        assert!(has_match(&t, &AnyPosition, "concatenate"));
    }

    #[test]
    fn test_matches_resume_after_waypoint() {
        let t = table(&[("G1", "p53"), ("D1", "cancer")]);
        let found = spans(&t, &GeneTokenBoundary, "p53 is linked to cancer");
        assert_eq!(
            found,
            vec![("G1".to_string(), 0..3), ("D1".to_string(), 17..23)]
        );
    }

    #[test]
    fn test_end_of_text_inside_longer_pattern() {
        let t = table(&[("D1", "cancer"), ("D2", "lung cancers")]);
        let found = spans(&t, &GeneTokenBoundary, "lung cancer");
        assert_eq!(found, vec![("D1".to_string(), 5..11)]);
    }

    #[test]
    fn test_rollback_then_scan_to_end_of_text() {
        let t = table(&[("G1", "p53"), ("G2", "p53 mutant form"), ("D1", "cancer")]);
        let found = spans(&t, &GeneTokenBoundary, "p53 mutant cancer");
        assert_eq!(
            found,
            vec![("G1".to_string(), 0..3), ("D1".to_string(), 11..17)]
        );
    }

    #[test]
    fn test_matches_do_not_overlap() {
        let t = table(&[("X", "aa")]);
        let found = spans(&t, &AnyPosition, "aaaaa");
        assert_eq!(
            found,
            vec![("X".to_string(), 0..2), ("X".to_string(), 2..4)]
        );
    }

    #[test]
    fn test_multibyte_offsets() {
        let t = table(&[("TNF", "TNFα")]);
        let text = "anti TNFα therapy";
        let found: Vec<_> = find_matches(&t, &GeneTokenBoundary, text).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].span, 5..10);
        assert_eq!(found[0].text, "TNFα");
    }

    #[test]
    fn test_fn_boundary() {
        let t = table(&[("C", "cat")]);
        let only_after_x = FnBoundary::new(
            |text: &str, offset: usize| text[..offset].ends_with('x'),
            |_: &str, _: usize| true,
        );
        let found = spans(&t, &only_after_x, "cat xcat");
        assert_eq!(found, vec![("C".to_string(), 5..8)]);
    }

    #[test]
    fn test_policy_registry() {
        assert_eq!("gene".parse::<BoundaryPolicy>(), Ok(BoundaryPolicy::Gene));
        assert_eq!(" Word ".parse::<BoundaryPolicy>(), Ok(BoundaryPolicy::Word));
        assert!("shell".parse::<BoundaryPolicy>().is_err());
        assert_eq!(BoundaryPolicy::default().to_string(), "gene");
        assert!(BoundaryPolicy::Any.boundary().is_start("xcat", 1));
    }
}
