//! Readers for raw lexicon files.
//!
//! Two line formats are understood:
//!
//! ```text
//! <r p1="7157;TP53">p53|TP53</r>        MWT (XML-escaped)
//! 7157;TP53<TAB>p53|TP53                 TSV
//! ```
//!
//! In both, a line starting with `#shard` closes the current shard and any
//! other line starting with `#` is a comment. MWT lines that are not `<r>`
//! elements (the `<mwt>` wrapper, templates) are ignored.

use std::borrow::Cow;
use std::io::{self, BufRead};

use serde::{Deserialize, Serialize};

/// Line marking a shard boundary.
pub const SHARD_MARKER: &str = "#shard";

/// One lexicon entry: `;`-joined identifiers and a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ids: String,
    pub pattern: String,
}

impl Entry {
    pub fn new(ids: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            ids: ids.into(),
            pattern: pattern.into(),
        }
    }
}

/// An item of dictionary load input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Entry(Entry),
    ShardBreak,
}

impl From<Entry> for Record {
    fn from(entry: Entry) -> Self {
        Record::Entry(entry)
    }
}

/// Line format of a lexicon file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Mwt,
    Tsv,
}

/// Parse `<r p1="IDS">PATTERN</r>`.
pub fn parse_mwt_line(line: &str) -> Option<Entry> {
    let body = line.trim().strip_prefix("<r")?.strip_suffix("</r>")?;
    if !body.starts_with(|c: char| c == '>' || c.is_whitespace()) {
        return None;
    }
    let tag_end = body.find('>')?;
    let attrs = &body[..tag_end];
    let attr_start = attrs.find("p1=\"")? + 4;
    let attr_len = attrs[attr_start..].find('"')?;
    let ids = &attrs[attr_start..attr_start + attr_len];
    let pattern = body[tag_end + 1..].trim();
    if ids.trim().is_empty() || pattern.is_empty() {
        return None;
    }
    Some(Entry::new(unescape_xml(ids.trim()), unescape_xml(pattern)))
}

/// Parse `IDS<TAB>PATTERN`.
pub fn parse_tsv_line(line: &str) -> Option<Entry> {
    let (ids, pattern) = line.trim_end_matches(['\r', '\n']).split_once('\t')?;
    let ids = ids.trim();
    if ids.is_empty() || pattern.is_empty() {
        return None;
    }
    Some(Entry::new(ids, pattern))
}

/// Parse one line in `format`. Blank lines, comments and non-entry lines
/// yield `None`.
pub fn parse_line(line: &str, format: RecordFormat) -> Option<Record> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with(SHARD_MARKER) {
        return Some(Record::ShardBreak);
    }
    if trimmed.starts_with('#') {
        return None;
    }
    let entry = match format {
        RecordFormat::Mwt => parse_mwt_line(trimmed),
        RecordFormat::Tsv => parse_tsv_line(line),
    };
    if entry.is_none() {
        log::debug!("ignoring lexicon line {trimmed:?}");
    }
    entry.map(Record::Entry)
}

/// Lazily read records from `reader`.
pub fn read_records<R: BufRead>(
    reader: R,
    format: RecordFormat,
) -> impl Iterator<Item = io::Result<Record>> {
    reader.lines().filter_map(move |line| match line {
        Ok(line) => parse_line(&line, format).map(Ok),
        Err(e) => Some(Err(e)),
    })
}

/// Resolve the five predefined XML entities.
pub fn unescape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let entity = [
            ("&amp;", '&'),
            ("&lt;", '<'),
            ("&gt;", '>'),
            ("&quot;", '"'),
            ("&apos;", '\''),
        ]
        .into_iter()
        .find(|(name, _)| rest.starts_with(name));
        match entity {
            Some((name, c)) => {
                out.push(c);
                rest = &rest[name.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Escape text for use in an XML attribute or element.
pub fn escape_xml(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mwt_line() {
        let entry = parse_mwt_line(r#"<r p1="7157;TP53">p53|TP53</r>"#).unwrap();
        assert_eq!(entry, Entry::new("7157;TP53", "p53|TP53"));

        let entry = parse_mwt_line(r#"  <r p1="X" p2="ignored">a&amp;b &lt;1&gt;</r>"#).unwrap();
        assert_eq!(entry.pattern, "a&b <1>");

        assert!(parse_mwt_line("<mwt>").is_none());
        assert!(parse_mwt_line(r#"<r p1="">x</r>"#).is_none());
        assert!(parse_mwt_line(r#"<r p1="G1"></r>"#).is_none());
        assert!(parse_mwt_line(r#"<r p1="G1">   </r>"#).is_none());
    }

    #[test]
    fn test_parse_mwt_line_tag_and_text_trim() {
        assert!(parse_mwt_line(r#"<ref p1="G1">p53</r>"#).is_none());
        assert!(parse_mwt_line(r#"<rx p1="G1">p53</r>"#).is_none());
        assert_eq!(
            parse_mwt_line("<r\tp1=\"G1\">  p53|TP53 \t</r>"),
            Some(Entry::new("G1", "p53|TP53"))
        );
        assert!(parse_mwt_line(r#"<r>p53</r>"#).is_none());
    }

    #[test]
    fn test_parse_tsv_line() {
        assert_eq!(parse_tsv_line("G1\tp53\n"), Some(Entry::new("G1", "p53")));
        assert_eq!(parse_tsv_line("G1\ta b"), Some(Entry::new("G1", "a b")));
        assert!(parse_tsv_line("no tab here").is_none());
    }

    #[test]
    fn test_parse_line_markers_and_comments() {
        assert_eq!(parse_line("#shard", RecordFormat::Tsv), Some(Record::ShardBreak));
        assert_eq!(parse_line("  #shard 2", RecordFormat::Mwt), Some(Record::ShardBreak));
        assert_eq!(parse_line("# genes", RecordFormat::Tsv), None);
        assert_eq!(parse_line("", RecordFormat::Tsv), None);
    }

    #[test]
    fn test_read_records() {
        let input = "<mwt>\n<r p1=\"G1\">p53</r>\n#shard\n<r p1=\"D1\">cancer</r>\n</mwt>\n";
        let records: Vec<Record> = read_records(input.as_bytes(), RecordFormat::Mwt)
            .collect::<io::Result<_>>()
            .unwrap();
        assert_eq!(
            records,
            vec![
                Record::Entry(Entry::new("G1", "p53")),
                Record::ShardBreak,
                Record::Entry(Entry::new("D1", "cancer")),
            ]
        );
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(unescape_xml("a &amp b"), "a &amp b");
        assert_eq!(unescape_xml("&lt;&gt;&quot;&apos;"), "<>\"'");
        assert_eq!(escape_xml("a<b & \"c\""), "a&lt;b &amp; &quot;c&quot;");
        assert!(matches!(escape_xml("plain"), Cow::Borrowed(_)));
    }
}
