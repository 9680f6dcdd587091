//! Key/value seam over the host's sorted sets.
//!
//! Member ordering follows Redis: ascending by score, ties broken by member.
//! Windows are inclusive on both ends and negative indices count from the
//! end, so `(0, -1)` is the whole set.

use std::ops::Range;

use async_trait::async_trait;

use crate::error::Result;

/// Key layout shared with the host forum.
pub mod keys {
    use hashtags_core::Tag;

    use crate::model::TopicId;

    /// Tags ordered by how many topics carry them. Maintained by the host.
    pub const TAGS_BY_TOPIC_COUNT: &str = "tags:topic:count";

    /// Post ids carrying `tag`, scored by index time. Owned by this plugin.
    pub fn tag_posts(tag: &Tag) -> String {
        format!("tag:{tag}:posts")
    }

    /// Topic ids carrying `tag`. Maintained by the host, keyed by the host's
    /// own tag value.
    pub fn tag_topics(tag: &str) -> String {
        format!("tag:{tag}:topics")
    }

    /// The tag values of one topic. Maintained by the host.
    pub fn topic_tags(tid: TopicId) -> String {
        format!("topic:{tid}:tags")
    }
}

#[async_trait]
pub trait SortedSetStore: Send + Sync {
    /// Insert `member` or update its score.
    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<()>;

    /// Add `member` with the same score to every set in `keys`.
    async fn sorted_sets_add(&self, keys: &[String], score: i64, member: &str) -> Result<()> {
        for key in keys {
            self.sorted_set_add(key, score, member).await?;
        }
        Ok(())
    }

    /// Members in ascending score order within the window.
    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>>;

    /// Members in descending score order within the window.
    async fn sorted_set_rev_range(&self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>>;

    async fn sorted_set_card(&self, key: &str) -> Result<u64>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;
}

/// Resolve an inclusive, possibly negative window against a set of `len`
/// members. `None` when the window selects nothing.
pub fn resolve_window(len: usize, start: i64, stop: i64) -> Option<Range<usize>> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start >= len || stop < start {
        return None;
    }
    Some(start as usize..stop as usize + 1)
}

#[cfg(test)]
mod tests {
    use hashtags_core::Tag;

    use super::*;
    use crate::model::TopicId;

    #[test]
    fn test_window_whole_set() {
        assert_eq!(resolve_window(5, 0, -1), Some(0..5));
    }

    #[test]
    fn test_window_clamps_stop() {
        assert_eq!(resolve_window(3, 1, 100), Some(1..3));
    }

    #[test]
    fn test_window_negative_start() {
        assert_eq!(resolve_window(5, -2, -1), Some(3..5));
        assert_eq!(resolve_window(5, -10, 1), Some(0..2));
    }

    #[test]
    fn test_window_empty() {
        assert_eq!(resolve_window(0, 0, -1), None);
        assert_eq!(resolve_window(3, 3, 5), None);
        assert_eq!(resolve_window(3, 2, 1), None);
        assert_eq!(resolve_window(3, 0, -4), None);
    }

    #[test]
    fn test_keys() {
        let tag = Tag::canonicalize("Rust", Tag::DEFAULT_MAX_LENGTH).unwrap();
        assert_eq!(keys::tag_posts(&tag), "tag:rust:posts");
        assert_eq!(keys::tag_topics("rust"), "tag:rust:topics");
        assert_eq!(keys::topic_tags(TopicId(9)), "topic:9:tags");
    }
}
