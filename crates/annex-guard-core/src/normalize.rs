//! Ingredient name normalization.
//!
//! [`normalize`] turns one already-split ingredient into the canonical
//! form used for every lookup: diacritics folded, lower-cased, separator
//! variants unified, whitespace collapsed, and surrounding punctuation
//! removed. Hyphens and parentheses inside a name are kept, so
//! `Butyl-Hydroxy-Toluene` stays distinct from `butyl hydroxy toluene`.
//!
//! The function is total, pure, and idempotent. It never consults the
//! reference index.

use std::fmt;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Characters that some labels use instead of `/` between alternative names.
const SEPARATOR_VARIANTS: &[char] = &[';', '|', '\\'];

/// Characters stripped from both ends of a token.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '*', '·', '/', '"', '\'', '`', '\u{2018}', '\u{2019}',
    '\u{201C}', '\u{201D}',
];

/// Canonical form of one ingredient name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedToken(String);

impl NormalizedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a single raw ingredient token.
///
/// # Example
///
/// ```rust
/// use annex_guard_core::normalize;
///
/// assert_eq!(normalize("  Crème  de  Cacao. ").as_str(), "creme de cacao");
/// assert_eq!(normalize("Aqua ; Water").as_str(), "aqua/water");
/// ```
pub fn normalize(raw: &str) -> NormalizedToken {
    let folded: String = raw
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| {
            if SEPARATOR_VARIANTS.contains(&c) {
                '/'
            } else {
                c
            }
        })
        .collect();

    let mut out = String::with_capacity(folded.len());
    for word in folded.split_whitespace() {
        let joins_slash = out.ends_with('/') || word.starts_with('/');
        if !out.is_empty() && !joins_slash {
            out.push(' ');
        }
        out.push_str(word);
    }

    let mut squeezed = String::with_capacity(out.len());
    for c in out.chars() {
        if c == '/' && squeezed.ends_with('/') {
            continue;
        }
        squeezed.push(c);
    }

    let trimmed = squeezed.trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c) || c.is_whitespace());
    NormalizedToken(trimmed.to_string())
}
