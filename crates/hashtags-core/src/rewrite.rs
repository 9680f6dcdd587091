//! Turning hashtags in post content into links to their tag pages.
//!
//! Rewriting is idempotent: the anchors it inserts are excluded from scanning
//! on the next pass, so rewriting rewritten content changes nothing.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use tracing::warn;

use crate::extract::{ScanOptions, scan};
use crate::link::{HASHTAG_CLASS, TagLink, render_html_links, render_markdown_links};
use crate::slug::Tag;

/// Which occurrences of a repeated token get linked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPolicy {
    /// Only the first occurrence of each distinct raw token.
    #[default]
    FirstOccurrence,
    EveryOccurrence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkSyntax {
    #[default]
    Html,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteOptions {
    /// Prefix for tag page links, e.g. the forum's relative path. No
    /// trailing slash.
    pub base_path: String,
    pub policy: LinkPolicy,
    pub syntax: LinkSyntax,
    pub scan: ScanOptions,
}

impl RewriteOptions {
    /// Rewriting rendered HTML.
    pub fn html(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            policy: LinkPolicy::default(),
            syntax: LinkSyntax::Html,
            scan: ScanOptions::rendered(Tag::DEFAULT_MAX_LENGTH),
        }
    }

    /// Rewriting markdown source into markdown links.
    pub fn markdown(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            policy: LinkPolicy::default(),
            syntax: LinkSyntax::Markdown,
            scan: ScanOptions::composer(Tag::DEFAULT_MAX_LENGTH),
        }
    }

    pub fn with_policy(mut self, policy: LinkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_tag_length(mut self, max_tag_length: usize) -> Self {
        self.scan.max_tag_length = max_tag_length;
        self
    }
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self::html("")
    }
}

/// Link every recognized hashtag in `content`.
///
/// Returns the input borrowed when there is nothing to link.
pub fn rewrite<'a>(content: &'a str, options: &RewriteOptions) -> Cow<'a, str> {
    let occurrences = scan(content, &options.scan);

    let mut seen = HashSet::new();
    let links: Vec<TagLink<'_>> = occurrences
        .iter()
        .filter(|o| match options.policy {
            LinkPolicy::FirstOccurrence => seen.insert(o.raw),
            LinkPolicy::EveryOccurrence => true,
        })
        .map(|o| TagLink {
            index: o.range,
            tag: &o.tag,
        })
        .collect();

    if links.is_empty() {
        return Cow::Borrowed(content);
    }

    let rendered = match options.syntax {
        LinkSyntax::Html => render_html_links(content, &links, &options.base_path),
        LinkSyntax::Markdown => render_markdown_links(content, &links, &options.base_path),
    };

    match rendered {
        Ok(output) => Cow::Owned(output),
        Err(e) => {
            warn!(error = %e, "failed to render hashtag links, leaving content as-is");
            Cow::Borrowed(content)
        }
    }
}

static HASHTAG_ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"<a class="{}" href="[^"]*">(#[^<]*)</a>"#,
        HASHTAG_CLASS
    ))
    .unwrap()
});

/// Raw tokens recovered from anchors produced by [`rewrite`], distinct and in
/// content order.
pub fn linked_hashtags(content: &str) -> Vec<SmolStr> {
    let mut seen = HashSet::new();
    HASHTAG_ANCHOR_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|raw| seen.insert(*raw))
        .map(SmolStr::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    fn html() -> RewriteOptions {
        RewriteOptions::html("/forum")
    }

    #[test]
    fn test_no_hashtags_unchanged() {
        let content = "<p>nothing here</p>";
        assert!(matches!(rewrite(content, &html()), Cow::Borrowed(c) if c == content));
    }

    #[test]
    fn test_simple_rewrite() {
        let output = rewrite("<p>hello #World</p>", &html());
        insta::assert_snapshot!(output, @r#"<p>hello <a class="hashtag" href="/forum/tags/world">#World</a></p>"#);
    }

    #[test]
    fn test_first_occurrence_policy() {
        let output = rewrite("#a and #a", &RewriteOptions::html(""));
        insta::assert_snapshot!(output, @r#"<a class="hashtag" href="/tags/a">#a</a> and #a"#);
    }

    #[test]
    fn test_every_occurrence_policy() {
        let options = RewriteOptions::html("").with_policy(LinkPolicy::EveryOccurrence);
        let output = rewrite("#a and #a", &options);
        insta::assert_snapshot!(output, @r#"<a class="hashtag" href="/tags/a">#a</a> and <a class="hashtag" href="/tags/a">#a</a>"#);
    }

    #[test]
    fn test_prefix_tokens_do_not_collide() {
        // A naive replace of "#rust" would also hit the start of "#rustacean"
        // or re-enter an already inserted anchor.
        let options = RewriteOptions::html("").with_policy(LinkPolicy::EveryOccurrence);
        let output = rewrite("#rustacean #rust", &options);
        insta::assert_snapshot!(output, @r#"<a class="hashtag" href="/tags/rustacean">#rustacean</a> <a class="hashtag" href="/tags/rust">#rust</a>"#);
    }

    #[test]
    fn test_code_is_left_alone() {
        let content = "<p>#yes</p><pre><code>#no</code></pre>";
        let output = rewrite(content, &RewriteOptions::html(""));
        insta::assert_snapshot!(output, @r#"<p><a class="hashtag" href="/tags/yes">#yes</a></p><pre><code>#no</code></pre>"#);
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let options = html().with_policy(LinkPolicy::EveryOccurrence);
        let once = rewrite("<p>#one #two #one</p>", &options).into_owned();
        let twice = rewrite(&once, &options);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_round_trip_preserves_tokens() {
        let content = "<p>#Alpha, #beta. and #Alpha again</p>";
        let before: Vec<SmolStr> = extract(content, &html().scan)
            .into_iter()
            .map(|m| m.raw)
            .collect();
        let rewritten = rewrite(content, &html());
        assert_eq!(linked_hashtags(&rewritten), before);
        assert_eq!(before, vec!["#Alpha", "#beta"]);
    }

    #[test]
    fn test_markdown_syntax() {
        let output = rewrite("see #docs", &RewriteOptions::markdown("/f"));
        insta::assert_snapshot!(output, @"see [#docs](/f/tags/docs)");

        // Markdown links are excluded on the next pass.
        let again = rewrite(&output, &RewriteOptions::markdown("/f"));
        assert_eq!(again, output);
    }

    #[test]
    fn test_link_target_uses_canonical_tag() {
        let output = rewrite("#Snake_Case", &RewriteOptions::html(""));
        insta::assert_snapshot!(output, @r#"<a class="hashtag" href="/tags/snake-case">#Snake_Case</a>"#);
    }
}
