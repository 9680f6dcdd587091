//! Finding `#hashtag` tokens in post content.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::link::ByteRange;
use crate::segment::{SegmentOptions, segment};
use crate::slug::Tag;

/// A `#` at the start of a run or after whitespace, `>`, `;` or `"`, followed
/// by word characters and hyphens. The token itself is the capture group, so
/// the preceding context character never leaks into a match, and trailing
/// `!`, `?` or `.` is never part of it.
pub static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|[\s>;"])(#[\w-]+)"#).unwrap());

/// How content is prepared and matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    pub segment: SegmentOptions,
    /// Only keep a token when the rest of the content after it has a `<`
    /// before any `>`, i.e. the token sits in an HTML text node. The check
    /// looks past the plain run into the markup that follows. Exclusion of tags during segmentation
    /// already guarantees this for HTML; the check exists for callers that
    /// want the stricter behaviour on content with unusual markup.
    pub text_node_only: bool,
    pub max_tag_length: usize,
}

impl ScanOptions {
    /// Raw composer input: markdown-aware, code and quotes stripped. Used to
    /// derive a topic's tags.
    pub const fn composer(max_tag_length: usize) -> Self {
        Self {
            segment: SegmentOptions::new(true, true, true),
            text_node_only: false,
            max_tag_length,
        }
    }

    /// Content about to be persisted or rendered: HTML-aware, code and quotes
    /// stripped. Used for link rendering and the per-post index.
    pub const fn rendered(max_tag_length: usize) -> Self {
        Self {
            segment: SegmentOptions::new(false, true, true),
            text_node_only: false,
            max_tag_length,
        }
    }

    pub const fn with_text_node_only(mut self, text_node_only: bool) -> Self {
        self.text_node_only = text_node_only;
        self
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::rendered(Tag::DEFAULT_MAX_LENGTH)
    }
}

/// One hashtag token at a specific place in the content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence<'a> {
    /// The literal token, `#` included, trailing punctuation removed.
    pub raw: &'a str,
    pub range: ByteRange,
    pub tag: Tag,
}

/// A distinct raw token and the tag it canonicalizes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HashtagMatch {
    pub raw: SmolStr,
    pub tag: Tag,
}

/// Every hashtag occurrence in scannable text, in content order.
pub fn scan<'a>(content: &'a str, options: &ScanOptions) -> Vec<Occurrence<'a>> {
    let segmentation = segment(content, options.segment);
    let mut occurrences = Vec::new();

    for run in segmentation.plain_runs() {
        for caps in HASHTAG_RE.captures_iter(run.text) {
            let Some(token) = caps.get(1) else {
                continue;
            };

            let raw = token.as_str();
            let start = run.offset + token.start();
            let end = start + raw.len();

            if options.text_node_only && !in_text_node(&content[end..]) {
                continue;
            }

            // `#_` and friends canonicalize to nothing and have no page to link to.
            let Some(tag) = Tag::canonicalize(raw, options.max_tag_length) else {
                continue;
            };

            occurrences.push(Occurrence {
                raw: &content[start..end],
                range: ByteRange::new(start, end),
                tag,
            });
        }
    }

    occurrences
}

fn in_text_node(rest: &str) -> bool {
    match (rest.find('<'), rest.find('>')) {
        (Some(open), Some(close)) => open < close,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Distinct raw tokens in first-seen order.
///
/// Deduplication is by raw token, so `#Rust` and `#rust` are two matches
/// sharing one tag.
pub fn extract(content: &str, options: &ScanOptions) -> Vec<HashtagMatch> {
    let mut seen = HashSet::new();
    scan(content, options)
        .into_iter()
        .filter(|occurrence| seen.insert(occurrence.raw))
        .map(|occurrence| HashtagMatch {
            raw: SmolStr::new(occurrence.raw),
            tag: occurrence.tag,
        })
        .collect()
}

/// Distinct tags in first-seen order.
pub fn extract_tags(content: &str, options: &ScanOptions) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    for m in extract(content, options) {
        if !tags.contains(&m.tag) {
            tags.push(m.tag);
        }
    }
    tags
}
