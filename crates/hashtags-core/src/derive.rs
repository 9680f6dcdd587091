//! Folding a main post's hashtags into its topic's tag set.

use crate::extract::{ScanOptions, extract_tags};
use crate::slug::Tag;

/// Append the hashtags found in `content` to `existing`.
///
/// Existing tags keep their order; new tags follow in first-seen order and the
/// result has no duplicate tags. Callers decide whether `content` belongs to a
/// main post; replies must not be passed here.
pub fn derive_topic_tags(existing: &[Tag], content: &str, max_tag_length: usize) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::with_capacity(existing.len());
    for tag in existing {
        if !tags.contains(tag) {
            tags.push(tag.clone());
        }
    }

    for tag in extract_tags(content, &ScanOptions::composer(max_tag_length)) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    tags
}
