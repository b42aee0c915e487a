//! Identifier grammars and the text scanner.
//!
//! Grammars are case-insensitive and anchored on word boundaries. Cache codes exclude the
//! letters I, L, O, S and U, which the provider never issues because they read like digits.

use std::{fmt, ops::Range, sync::OnceLock};

use regex::Regex;

// Case folding is ASCII-only (`i-u`): in Unicode mode `K` would also match U+212A KELVIN SIGN.
const CACHE_PATTERN: &str = r"\b(?i-u:GC[A-HJKMNPQRTV-Z0-9]{5}|GC[A-F0-9]{1,4}|GC[GHJKMNPQRTV-Z][A-HJKMNPQRTV-Z0-9]{3})\b";
const TRACKABLE_PATTERN: &str = r"\b(?i-u:TB[A-Z0-9]{4,5})\b";

/// Kinds of identifiers the bot knows how to resolve.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    Cache,
    Trackable,
}

impl IdentifierKind {
    /// Every kind, in scan priority order.
    pub const ALL: [IdentifierKind; 2] = [IdentifierKind::Cache, IdentifierKind::Trackable];

    /// Human-readable label used in logs and replies.
    pub fn label(self) -> &'static str {
        match self {
            IdentifierKind::Cache => "cache",
            IdentifierKind::Trackable => "trackable",
        }
    }

    pub fn grammar(self) -> &'static Grammar {
        static CACHE: OnceLock<Grammar> = OnceLock::new();
        static TRACKABLE: OnceLock<Grammar> = OnceLock::new();

        match self {
            IdentifierKind::Cache => CACHE.get_or_init(|| Grammar::new(self, CACHE_PATTERN)),
            IdentifierKind::Trackable => {
                TRACKABLE.get_or_init(|| Grammar::new(self, TRACKABLE_PATTERN))
            }
        }
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One located identifier inside a message text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match<'t> {
    pub kind: IdentifierKind,
    /// The matched text exactly as typed (not normalized).
    pub raw: &'t str,
    /// Byte offset into the scanned text.
    pub start: usize,
}

impl Match<'_> {
    fn span(&self) -> Range<usize> {
        self.start..self.start + self.raw.len()
    }
}

/// Compiled identifier-shape rule for one kind.
#[derive(Debug)]
pub struct Grammar {
    kind: IdentifierKind,
    re: Regex,
}

impl Grammar {
    fn new(kind: IdentifierKind, pattern: &str) -> Self {
        Self {
            kind,
            re: Regex::new(pattern).expect("valid identifier regex"),
        }
    }

    /// Every match in `text`, left to right. Lazy; call again to restart.
    pub fn find_all<'g, 't>(&'g self, text: &'t str) -> impl Iterator<Item = Match<'t>> + 'g
    where
        't: 'g,
    {
        self.re.find_iter(text).map(move |m| Match {
            kind: self.kind,
            raw: m.as_str(),
            start: m.start(),
        })
    }
}

/// Scan `text` for every known kind, in priority order.
///
/// Matches are grouped by kind (all caches, then all trackables), each group left to right.
/// Repeated codes are kept. A match overlapping a span already claimed by an earlier kind is
/// dropped.
pub fn scan(text: &str) -> Vec<Match<'_>> {
    let mut out: Vec<Match<'_>> = Vec::new();
    for kind in IdentifierKind::ALL {
        let claimed = out.len();
        for m in kind.grammar().find_all(text) {
            let span = m.span();
            let overlaps = out[..claimed]
                .iter()
                .any(|prev| prev.span().start < span.end && span.start < prev.span().end);
            if !overlaps {
                out.push(m);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(text: &str) -> Vec<(IdentifierKind, &str)> {
        scan(text).into_iter().map(|m| (m.kind, m.raw)).collect()
    }

    #[test]
    fn finds_cache_codes_of_every_shape() {
        assert_eq!(
            raws("GCABCDE GC1234 GC1 GCG123"),
            vec![
                (IdentifierKind::Cache, "GCABCDE"),
                (IdentifierKind::Cache, "GC1234"),
                (IdentifierKind::Cache, "GC1"),
                (IdentifierKind::Cache, "GCG123"),
            ]
        );
    }

    #[test]
    fn matching_is_case_insensitive_and_keeps_raw_text() {
        assert_eq!(
            raws("try gc12abc and tb1a2b3"),
            vec![
                (IdentifierKind::Cache, "gc12abc"),
                (IdentifierKind::Trackable, "tb1a2b3"),
            ]
        );
    }

    #[test]
    fn ambiguous_letters_are_rejected() {
        // I, L, O, S, U never appear in a five-character cache suffix.
        assert!(raws("GCABCDO").is_empty());
        assert!(raws("GCSSSSS").is_empty());
    }

    #[test]
    fn codes_inside_longer_words_are_ignored() {
        assert!(raws("logcabin").is_empty());
        assert!(raws("GC12345678").is_empty());
        assert!(raws("xTB12345").is_empty());
    }

    #[test]
    fn repeated_codes_are_not_deduplicated() {
        assert_eq!(
            raws("GC123 GC123"),
            vec![(IdentifierKind::Cache, "GC123"), (IdentifierKind::Cache, "GC123")]
        );
    }

    #[test]
    fn kinds_are_grouped_in_priority_order() {
        assert_eq!(
            raws("TB11111 then GC22222, TB33333, GC44444."),
            vec![
                (IdentifierKind::Cache, "GC22222"),
                (IdentifierKind::Cache, "GC44444"),
                (IdentifierKind::Trackable, "TB11111"),
                (IdentifierKind::Trackable, "TB33333"),
            ]
        );
    }

    #[test]
    fn punctuation_and_unicode_neighbours_delimit_codes() {
        let text = "Schatz «GCABCDE», Coin: TB56789!";
        let found = scan(text);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].raw, "GCABCDE");
        assert_eq!(&text[found[0].start..found[0].start + 7], "GCABCDE");
        assert_eq!(found[1].raw, "TB56789");
    }

    #[test]
    fn letters_only_fold_within_ascii() {
        // U+212A KELVIN SIGN and U+017F LATIN SMALL LETTER LONG S case-fold to K / S.
        assert!(scan("GC\u{212A}1234").is_empty());
        assert!(scan("TB\u{212A}1234").is_empty());
        assert!(scan("TB\u{17F}ABCD").is_empty());
        assert_eq!(raws("gck1234"), vec![(IdentifierKind::Cache, "gck1234")]);
        assert!(scan("GCABCDE \u{212A}").iter().all(|m| m.raw.is_ascii()));
    }

    #[test]
    fn find_all_is_restartable() {
        let g = IdentifierKind::Trackable.grammar();
        let text = "TB12345 TB54321";
        assert_eq!(g.find_all(text).count(), 2);
        assert_eq!(g.find_all(text).count(), 2);
    }

    #[test]
    fn no_identifiers_yields_nothing() {
        assert!(scan("just saying hi").is_empty());
        assert!(scan("").is_empty());
    }
}
