//! Hashtag scanning engine
//!
//! Finds `#hashtag` tokens in forum post content, maps them onto canonical
//! tag slugs and rewrites content so each hashtag links to its tag page.
//! Code, quoted replies and existing links are never scanned.
//!
//! Everything here is synchronous and infallible: malformed markup degrades
//! to a conservative segmentation instead of an error.
//!
//! ```
//! use hashtags_core::{RewriteOptions, ScanOptions, Tag, extract, rewrite};
//!
//! let content = "<p>Loving #Rust</p><pre><code>#not_this</code></pre>";
//! let found = extract(content, &ScanOptions::rendered(Tag::DEFAULT_MAX_LENGTH));
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].tag.as_str(), "rust");
//!
//! let linked = rewrite(content, &RewriteOptions::html("/forum"));
//! assert!(linked.contains(r#"href="/forum/tags/rust""#));
//! ```

pub mod derive;
pub mod extract;
pub mod link;
pub mod rewrite;
pub mod segment;
pub mod slug;

pub use derive::derive_topic_tags;
pub use extract::{HashtagMatch, Occurrence, ScanOptions, extract, extract_tags, scan};
pub use link::ByteRange;
pub use rewrite::{LinkPolicy, LinkSyntax, RewriteOptions, linked_hashtags, rewrite};
pub use segment::{PlainRun, Segment, SegmentKind, SegmentOptions, Segmentation, segment};
pub use slug::{Tag, clean_up_tag, slugify, slugify_strict};
