//! Splitting post content into scannable and excluded regions.
//!
//! Post bodies are a markdown/HTML mix. Hashtag scanning must only look at
//! text a reader would see as prose, so code, quoted replies and existing
//! links/markup are carved out first. The split is total: any input, however
//! broken, produces segments that concatenate back to the original.
//!
//! Fallbacks for malformed markup:
//! - an unclosed code fence, `<code>`, `<pre>` or `<blockquote>` runs to the
//!   end of the content (CommonMark treats an unclosed fence the same way);
//!   nested `<blockquote>`s are matched by depth, so a quote closes at its own
//!   `</blockquote>`, not the first one;
//! - an unclosed inline backtick is literal text;
//! - an unclosed `<a>` only excludes its opening tag.

use std::ops::Range;
use std::sync::{LazyLock, OnceLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Code syntax, recognized in both modes since content mixes the two.
const CODE: &[&str] = &[
    r"(?s:```.*?(?:```|\z))",
    r"(?s:~~~.*?(?:~~~|\z))",
    r"`[^`\n]+`",
    r"(?is:<code\b[^>]*>.*?(?:</code>|\z))",
    r"(?is:<pre\b[^>]*>.*?(?:</pre>|\z))",
];

/// Opening tag only; [`blockquote_end`] finds the matching close.
const HTML_BLOCKQUOTE: &str = r"(?i:<blockquote\b[^>]*>)";
const MARKDOWN_BLOCKQUOTE: &str = r"(?m:^[ \t]{0,3}>[^\n]*)";

const HTML_ANCHOR: &str = r"(?is:<a\b[^>]*>.*?</a>)";
const HTML_TAG: &str = r"<[!/?]?[A-Za-z][^<>]*>";
const MARKDOWN_LINK: &str = r"\[[^\]\n]*\]\([^)\n]*\)";

/// Which regions get carved out of the content before scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentOptions {
    /// Treat the content as markdown source: markdown links and `>` quote
    /// lines are recognized in addition to their HTML forms.
    pub markdown: bool,
    pub strip_blockquote: bool,
    pub strip_code: bool,
}

impl SegmentOptions {
    pub const fn new(markdown: bool, strip_blockquote: bool, strip_code: bool) -> Self {
        Self {
            markdown,
            strip_blockquote,
            strip_code,
        }
    }

    fn cache_slot(self) -> usize {
        (self.markdown as usize) | (self.strip_blockquote as usize) << 1 | (self.strip_code as usize) << 2
    }

    fn pattern(self) -> String {
        let mut alternatives = Vec::with_capacity(3);

        if self.strip_code {
            alternatives.push(format!("(?P<code>{})", CODE.join("|")));
        }

        if self.strip_blockquote {
            let mut quote = vec![HTML_BLOCKQUOTE];
            if self.markdown {
                quote.push(MARKDOWN_BLOCKQUOTE);
            }
            alternatives.push(format!("(?P<quote>{})", quote.join("|")));
        }

        let mut anchor = vec![HTML_ANCHOR, HTML_TAG];
        if self.markdown {
            anchor.push(MARKDOWN_LINK);
        }
        alternatives.push(format!("(?P<anchor>{})", anchor.join("|")));

        alternatives.join("|")
    }

    fn regex(self) -> &'static Regex {
        static PATTERNS: [OnceLock<Regex>; 8] = [const { OnceLock::new() }; 8];
        PATTERNS[self.cache_slot()].get_or_init(|| {
            Regex::new(&self.pattern()).expect("exclusion pattern is a fixed, valid regex")
        })
    }
}

/// Why a segment was excluded from scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Plain,
    Code,
    Blockquote,
    /// Links and HTML tags: already markup, never re-linked.
    Anchor,
}

impl SegmentKind {
    pub fn is_plain(self) -> bool {
        matches!(self, SegmentKind::Plain)
    }

    pub fn is_excluded(self) -> bool {
        !self.is_plain()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub kind: SegmentKind,
    /// Byte offset of `text` within the segmented content.
    pub offset: usize,
    pub text: &'a str,
}

impl<'a> Segment<'a> {
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.text.len()
    }
}

/// A maximal run of adjacent plain segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainRun<'a> {
    pub offset: usize,
    pub text: &'a str,
}

/// Content split into ordered, contiguous segments.
#[derive(Debug, Clone)]
pub struct Segmentation<'a> {
    content: &'a str,
    segments: Vec<Segment<'a>>,
}

impl<'a> Segmentation<'a> {
    pub fn content(&self) -> &'a str {
        self.content
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    /// Plain text grouped into runs; adjacent plain segments are merged so a
    /// token spanning their boundary is scanned as one.
    pub fn plain_runs(&self) -> Vec<PlainRun<'a>> {
        let mut runs: Vec<PlainRun<'a>> = Vec::new();
        let mut current: Option<Range<usize>> = None;

        for segment in &self.segments {
            if segment.kind.is_plain() {
                current = match current {
                    Some(range) if range.end == segment.offset => Some(range.start..segment.range().end),
                    Some(range) => {
                        runs.push(self.run(range));
                        Some(segment.range())
                    }
                    None => Some(segment.range()),
                };
            } else if let Some(range) = current.take() {
                runs.push(self.run(range));
            }
        }
        if let Some(range) = current {
            runs.push(self.run(range));
        }

        runs
    }

    /// All plain text with excluded regions dropped.
    pub fn plain_text(&self) -> String {
        self.segments
            .iter()
            .filter(|s| s.kind.is_plain())
            .map(|s| s.text)
            .collect()
    }

    fn run(&self, range: Range<usize>) -> PlainRun<'a> {
        PlainRun {
            offset: range.start,
            text: &self.content[range],
        }
    }
}

static BLOCKQUOTE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<(/?)blockquote\b[^>]*>").unwrap());

/// End of the blockquote whose opening tag ends at `after_open`, counting
/// nested quotes. Runs to the end of `content` when unbalanced.
fn blockquote_end(content: &str, after_open: usize) -> usize {
    let mut depth = 1usize;
    for caps in BLOCKQUOTE_TAG.captures_iter(&content[after_open..]) {
        let closing = caps.get(1).is_some_and(|slash| !slash.is_empty());
        if !closing {
            depth += 1;
            continue;
        }
        depth -= 1;
        if depth == 0 {
            return caps.get(0).map_or(content.len(), |tag| after_open + tag.end());
        }
    }
    content.len()
}

/// Split `content` into plain and excluded segments.
pub fn segment(content: &str, options: SegmentOptions) -> Segmentation<'_> {
    let regex = options.regex();
    let mut segments = Vec::new();
    let mut last = 0;
    let mut pos = 0;

    while pos <= content.len() {
        let Some(caps) = regex.captures_at(content, pos) else {
            break;
        };
        let Some(whole) = caps.get(0) else {
            break;
        };
        if whole.is_empty() {
            // Step past one char so the search always moves forward.
            pos = content[whole.end()..]
                .chars()
                .next()
                .map_or(content.len() + 1, |c| whole.end() + c.len_utf8());
            continue;
        }

        let (kind, end) = if caps.name("code").is_some() {
            (SegmentKind::Code, whole.end())
        } else if caps.name("quote").is_some() {
            let end = if whole.as_str().starts_with('<') {
                blockquote_end(content, whole.end())
            } else {
                whole.end()
            };
            (SegmentKind::Blockquote, end)
        } else {
            (SegmentKind::Anchor, whole.end())
        };

        if whole.start() > last {
            segments.push(Segment {
                kind: SegmentKind::Plain,
                offset: last,
                text: &content[last..whole.start()],
            });
        }
        segments.push(Segment {
            kind,
            offset: whole.start(),
            text: &content[whole.start()..end],
        });
        last = end;
        pos = end;
    }

    if last < content.len() {
        segments.push(Segment {
            kind: SegmentKind::Plain,
            offset: last,
            text: &content[last..],
        });
    }

    Segmentation { content, segments }
}
