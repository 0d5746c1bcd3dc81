//! Regexp parsing for dictionary patterns.
//!
//! This module parses pattern strings into a tree for automaton construction.
//! Supports:
//! - literal characters, with `\` escaping any following character
//! - `.` matches any character
//! - `[...]` character classes with ranges, `[^...]` negated classes
//! - `"..."` quoted literal strings
//! - `|` alternation (an empty branch denotes the empty string)
//! - `(...)` grouping (`()` denotes the empty string)
//! - `?`, `+`, `*` and `{n}`, `{n,}`, `{n,m}` quantifiers
//!
//! Error offsets are byte offsets into the pattern.

use thiserror::Error;

/// A pair of runes representing an inclusive range [lo, hi].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunePair {
    pub lo: char,
    pub hi: char,
}

/// A collection of rune pairs representing a character class.
pub type RuneRange = Vec<RunePair>;

/// Largest accepted repetition bound.
pub const MAX_REPEAT: u32 = 1000;

const ESCAPE: char = '\\';
const QUOTE: char = '"';

/// Maximum Unicode code point value.
pub const RUNE_MAX: char = '\u{10FFFF}';

const SURROGATE_START_CP: u32 = 0xD800;
const SURROGATE_END_CP: u32 = 0xDFFF;

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegexpErrorKind {
    Syntax,
    /// A `{n,m}` bound is out of range or inverted.
    RepeatBound,
}

/// Error type for regexp parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct RegexpError {
    pub kind: RegexpErrorKind,
    pub message: String,
    pub offset: usize,
}

impl RegexpError {
    fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind: RegexpErrorKind::Syntax,
            message: message.into(),
            offset,
        }
    }

    fn repeat_bound(message: impl Into<String>, offset: usize) -> Self {
        Self {
            kind: RegexpErrorKind::RepeatBound,
            message: message.into(),
            offset,
        }
    }
}

/// The matchable part of a quantified atom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    /// One character out of a set of ranges.
    Runes(RuneRange),
    /// Any character.
    Dot,
    /// A quoted literal string.
    Quoted(String),
    /// A parenthesized group.
    Group(RegexpRoot),
}

/// A quantified atom in the regexp tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantifiedAtom {
    pub atom: Atom,
    /// Minimum number of times to match.
    pub min: u32,
    /// Maximum number of times to match; `None` is unbounded.
    pub max: Option<u32>,
}

impl QuantifiedAtom {
    fn once(atom: Atom) -> Self {
        Self {
            atom,
            min: 1,
            max: Some(1),
        }
    }

    /// Returns true if this atom matches exactly once (no quantifier).
    #[inline]
    pub fn is_once(&self) -> bool {
        self.min == 1 && self.max == Some(1)
    }
}

/// A branch in the regexp (sequence of atoms).
pub type RegexpBranch = Vec<QuantifiedAtom>;

/// The root of a parsed regexp (alternatives separated by |).
pub type RegexpRoot = Vec<RegexpBranch>;

/// Parser state for regexp parsing.
struct RegexpParse<'a> {
    src: &'a str,
    index: usize,
    last_index: usize,
    nesting: Vec<RegexpRoot>,
    tree: RegexpRoot,
}

impl<'a> RegexpParse<'a> {
    fn new(re: &'a str) -> Self {
        Self {
            src: re,
            index: 0,
            last_index: 0,
            nesting: Vec::new(),
            tree: Vec::new(),
        }
    }

    fn nest(&mut self) {
        self.nesting.push(std::mem::take(&mut self.tree));
    }

    fn unnest(&mut self) -> RegexpRoot {
        let subtree = std::mem::take(&mut self.tree);
        self.tree = self.nesting.pop().unwrap_or_default();
        subtree
    }

    fn is_nested(&self) -> bool {
        !self.nesting.is_empty()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.index..].chars().next()
    }

    fn next_rune(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.last_index = self.index;
        self.index += c.len_utf8();
        Some(c)
    }

    fn backup1(&mut self, one_rune: char) {
        self.index -= one_rune.len_utf8();
    }

    fn bypass_optional(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.next_rune();
            true
        } else {
            false
        }
    }

    fn is_empty(&self) -> bool {
        self.index >= self.src.len()
    }
}

/// Parse a regexp string into a tree structure.
pub fn parse_regexp(re: &str) -> Result<RegexpRoot, RegexpError> {
    let mut parse = RegexpParse::new(re);
    read_branches(&mut parse)?;
    if !parse.is_empty() {
        // only an unbalanced ')' stops the top level early
        return Err(RegexpError::syntax("unbalanced ')'", parse.index));
    }
    Ok(parse.tree)
}

/// Read branches separated by |
fn read_branches(parse: &mut RegexpParse) -> Result<(), RegexpError> {
    loop {
        let branch = read_branch(parse)?;
        parse.tree.push(branch);

        match parse.next_rune() {
            None => return Ok(()),
            Some('|') => continue,
            Some(c) => {
                parse.backup1(c);
                return Ok(());
            }
        }
    }
}

/// Read a single branch (sequence of pieces).
fn read_branch(parse: &mut RegexpParse) -> Result<RegexpBranch, RegexpError> {
    let mut branch = Vec::new();
    while let Some(piece) = read_piece(parse)? {
        branch.push(piece);
    }
    Ok(branch)
}

/// Read a piece (atom with optional quantifiers). Returns `None` at the end
/// of a branch.
fn read_piece(parse: &mut RegexpParse) -> Result<Option<QuantifiedAtom>, RegexpError> {
    let Some(mut qa) = read_atom(parse)? else {
        return Ok(None);
    };
    while let Some((min, max)) = read_quantifier(parse)? {
        if !qa.is_once() {
            // stacked quantifiers apply to the already quantified piece
            qa = QuantifiedAtom::once(Atom::Group(vec![vec![qa]]));
        }
        qa.min = min;
        qa.max = max;
    }
    Ok(Some(qa))
}

/// Read an atom.
fn read_atom(parse: &mut RegexpParse) -> Result<Option<QuantifiedAtom>, RegexpError> {
    let Some(b) = parse.next_rune() else {
        return Ok(None);
    };

    let atom = match b {
        '|' => {
            parse.backup1(b);
            return Ok(None);
        }
        ')' => {
            parse.backup1(b);
            if parse.is_nested() {
                return Ok(None);
            }
            return Err(RegexpError::syntax("unbalanced ')'", parse.index));
        }
        '.' => Atom::Dot,
        '(' => {
            let open = parse.last_index;
            parse.nest();
            read_branches(parse)?;
            if parse.next_rune() != Some(')') {
                return Err(RegexpError::syntax("unclosed '('", open));
            }
            Atom::Group(parse.unnest())
        }
        '[' => Atom::Runes(read_char_class_expr(parse)?),
        QUOTE => Atom::Quoted(read_quoted(parse)?),
        ESCAPE => {
            let next = parse.next_rune().ok_or_else(|| {
                RegexpError::syntax(format!("'{ESCAPE}' at end of pattern"), parse.last_index)
            })?;
            Atom::Runes(vec![RunePair { lo: next, hi: next }])
        }
        '?' | '+' | '*' | '{' => {
            return Err(RegexpError::syntax(
                format!("invalid character '{b}' (quantifier without atom)"),
                parse.last_index,
            ));
        }
        c => Atom::Runes(vec![RunePair { lo: c, hi: c }]),
    };
    Ok(Some(QuantifiedAtom::once(atom)))
}

/// Read the body of a quoted string; the opening quote is consumed.
fn read_quoted(parse: &mut RegexpParse) -> Result<String, RegexpError> {
    let open = parse.last_index;
    let mut out = String::new();
    loop {
        match parse.next_rune() {
            None => return Err(RegexpError::syntax("unclosed quoted string", open)),
            Some(QUOTE) => return Ok(out),
            Some(ESCAPE) => match parse.next_rune() {
                Some(c) => out.push(c),
                None => return Err(RegexpError::syntax("unclosed quoted string", open)),
            },
            Some(c) => out.push(c),
        }
    }
}

/// Read a character class expression [...]; the '[' is consumed.
fn read_char_class_expr(parse: &mut RegexpParse) -> Result<RuneRange, RegexpError> {
    let open = parse.last_index;
    let unclosed = || RegexpError::syntax("unclosed character class", open);

    let is_negated = parse.bypass_optional('^');
    let mut rr = Vec::new();
    let mut first = true;

    loop {
        let r = parse.next_rune().ok_or_else(unclosed)?;
        let lo = match r {
            ']' if first => {
                return Err(RegexpError::syntax("empty character class", parse.last_index));
            }
            ']' => break,
            ESCAPE => parse.next_rune().ok_or_else(unclosed)?,
            c => c,
        };
        first = false;

        // Check for range
        if parse.peek() != Some('-') {
            rr.push(RunePair { lo, hi: lo });
            continue;
        }
        parse.next_rune();
        let hi = match parse.next_rune().ok_or_else(unclosed)? {
            ']' => {
                // trailing '-' is literal
                rr.push(RunePair { lo, hi: lo });
                rr.push(RunePair { lo: '-', hi: '-' });
                break;
            }
            ESCAPE => parse.next_rune().ok_or_else(unclosed)?,
            c => c,
        };
        if lo > hi {
            return Err(RegexpError::syntax(
                format!("invalid range {lo}-{hi}"),
                parse.last_index,
            ));
        }
        rr.push(RunePair { lo, hi });
    }

    let rr = simplify_rune_range(rr);
    Ok(if is_negated { invert_rune_range(rr) } else { rr })
}

/// Read a quantifier (?, *, +, {m,n}). Returns `(min, max)` or `None` when
/// no quantifier follows.
fn read_quantifier(parse: &mut RegexpParse) -> Result<Option<(u32, Option<u32>)>, RegexpError> {
    let Some(b) = parse.next_rune() else {
        return Ok(None);
    };
    let bounds = match b {
        '*' => (0, None),
        '+' => (1, None),
        '?' => (0, Some(1)),
        '{' => read_range_quantifier(parse)?,
        _ => {
            parse.backup1(b);
            return Ok(None);
        }
    };
    Ok(Some(bounds))
}

fn read_bound(parse: &mut RegexpParse) -> Result<Option<u32>, RegexpError> {
    let start = parse.index;
    while parse.peek().is_some_and(|c| c.is_ascii_digit()) {
        parse.next_rune();
    }
    let digits = &parse.src[start..parse.index];
    if digits.is_empty() {
        return Ok(None);
    }
    match digits.parse::<u32>() {
        Ok(n) if n <= MAX_REPEAT => Ok(Some(n)),
        _ => Err(RegexpError::repeat_bound(
            format!("repeat bound {digits} exceeds {MAX_REPEAT}"),
            start,
        )),
    }
}

/// Read a range quantifier {m,n}; the '{' is consumed.
fn read_range_quantifier(parse: &mut RegexpParse) -> Result<(u32, Option<u32>), RegexpError> {
    let open = parse.last_index;
    let expect_close = |parse: &mut RegexpParse| match parse.next_rune() {
        Some('}') => Ok(()),
        Some(c) => Err(RegexpError::syntax(
            format!("invalid character '{c}', expected '}}'"),
            parse.last_index,
        )),
        None => Err(RegexpError::syntax("unexpected end of string in quantifier", open)),
    };

    let Some(lo) = read_bound(parse)? else {
        return Err(RegexpError::syntax(
            "invalid range quantifier, expecting digits",
            parse.index,
        ));
    };
    if !parse.bypass_optional(',') {
        expect_close(parse)?;
        return Ok((lo, Some(lo)));
    }
    let hi = read_bound(parse)?;
    expect_close(parse)?;
    match hi {
        Some(hi) if hi < lo => Err(RegexpError::repeat_bound(
            format!("invalid range quantifier {{{lo},{hi}}}, top must not be below bottom"),
            open,
        )),
        hi => Ok((lo, hi)),
    }
}

/// Simplify and merge overlapping rune ranges
pub fn simplify_rune_range(mut rranges: RuneRange) -> RuneRange {
    if rranges.is_empty() {
        return rranges;
    }

    rranges.sort_by_key(|rp| rp.lo);

    let mut out = Vec::new();
    let mut current = rranges[0];

    for next in rranges.iter().skip(1).copied() {
        if next.lo as u32 > current.hi as u32 + 1 {
            out.push(current);
            current = next;
            continue;
        }
        if next.hi > current.hi {
            current.hi = next.hi;
        }
    }
    out.push(current);
    out
}

/// Push `[start, end]` minus the surrogate block.
fn add_gap_range(inverted: &mut Vec<RunePair>, start: u32, end: u32) {
    let pieces = [
        (start, end.min(SURROGATE_START_CP - 1)),
        (start.max(SURROGATE_END_CP + 1), end),
    ];
    for (lo, hi) in pieces {
        if lo > hi {
            continue;
        }
        if let (Some(lo), Some(hi)) = (char::from_u32(lo), char::from_u32(hi)) {
            inverted.push(RunePair { lo, hi });
        }
    }
}

/// Invert a rune range (for negated character classes).
pub fn invert_rune_range(rr: RuneRange) -> RuneRange {
    let merged = simplify_rune_range(rr);

    let mut inverted = Vec::new();
    let mut point: u32 = 0;
    for pair in &merged {
        let lo = pair.lo as u32;
        if lo > point {
            add_gap_range(&mut inverted, point, lo - 1);
        }
        point = pair.hi as u32 + 1;
    }
    if point <= RUNE_MAX as u32 {
        add_gap_range(&mut inverted, point, RUNE_MAX as u32);
    }
    inverted
}
