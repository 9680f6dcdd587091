//! Tag canonicalization.
//!
//! Every place that turns user text into an index key goes through
//! [`Tag::canonicalize`], so a hashtag written in a post and a tag requested
//! from a listing page always land on the same key.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Characters the host's tag cleanup folds into `-`.
const TAG_SEPARATORS: &[char] = &[
    ',', '/', '#', '!', '$', '^', '*', ';', ':', '{', '}', '=', '_', '`', '<', '>', '\'', '"', '~',
    '(', ')', '?', '|',
];

/// Right-to-left override, stripped so tags can't render reversed.
const RTL_OVERRIDE: char = '\u{202E}';

/// Turn arbitrary text into a lowercase slug.
///
/// Letters, digits and `_` survive; everything else (whitespace included)
/// becomes `-`, dash runs collapse, and a single leading/trailing dash is
/// trimmed. `"#Rust!"` becomes `"rust"`.
pub fn slugify(raw: &str) -> String {
    slugify_inner(raw, false)
}

/// Like [`slugify`] but keeps the original casing.
///
/// Used when completing a hashtag in the composer, where the user should see
/// what they typed rather than the canonical key.
pub fn slugify_strict(raw: &str) -> String {
    slugify_inner(raw, true)
}

fn slugify_inner(raw: &str, preserve_case: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        let c = if c.is_alphanumeric() || c == '_' { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        if preserve_case {
            out.push(c);
        } else {
            out.extend(c.to_lowercase());
        }
    }

    let trimmed = out.strip_prefix('-').unwrap_or(&out);
    let trimmed = trimmed.strip_suffix('-').unwrap_or(trimmed);
    if trimmed.len() == out.len() {
        out
    } else {
        trimmed.to_string()
    }
}

/// The host's tag cleanup: lowercase, fold separator punctuation into `-`,
/// cap the length (in characters) and strip `.`/`-` from both ends.
pub fn clean_up_tag(tag: &str, max_len: usize) -> String {
    let folded: String = tag
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != RTL_OVERRIDE)
        .map(|c| if TAG_SEPARATORS.contains(&c) { '-' } else { c })
        .take(max_len)
        .collect();

    folded
        .trim()
        .trim_matches(|c| c == '.' || c == '-')
        .to_string()
}

/// A canonical tag slug.
///
/// Only constructible through [`Tag::canonicalize`], so two values compare
/// equal exactly when they address the same index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(SmolStr);

impl Tag {
    /// Host default for the maximum tag length.
    pub const DEFAULT_MAX_LENGTH: usize = 15;

    /// Canonicalize raw text (a `#token`, a tag name from a URL, a host tag).
    ///
    /// Returns `None` when nothing survives canonicalization.
    pub fn canonicalize(raw: &str, max_len: usize) -> Option<Self> {
        let cleaned = clean_up_tag(&slugify(raw), max_len);
        if cleaned.is_empty() {
            None
        } else {
            Some(Self(SmolStr::new(cleaned)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> SmolStr {
        self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Tag {
    fn borrow(&self) -> &str {
        &self.0
    }
}
