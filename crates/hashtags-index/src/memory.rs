//! In-process implementations of the storage and forum seams.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;
use smol_str::SmolStr;

use crate::error::Result;
use crate::forum::ForumServices;
use crate::model::{CategoryId, PostId, PostSummary, TopicId, UserId, UserSummary};
use crate::store::{SortedSetStore, resolve_window};

/// Sorted sets and plain sets held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sorted: DashMap<String, HashMap<String, i64>>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score of `member` in `key`, if present.
    pub fn score(&self, key: &str, member: &str) -> Option<i64> {
        self.sorted.get(key)?.get(member).copied()
    }

    fn ordered(&self, key: &str) -> Vec<(i64, String)> {
        let Some(set) = self.sorted.get(key) else {
            return Vec::new();
        };
        let mut entries: Vec<(i64, String)> =
            set.iter().map(|(member, score)| (*score, member.clone())).collect();
        entries.sort();
        entries
    }
}

#[async_trait]
impl SortedSetStore for MemoryStore {
    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<()> {
        self.sorted
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        let entries = self.ordered(key);
        let Some(window) = resolve_window(entries.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(entries[window].iter().map(|(_, m)| m.clone()).collect())
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>> {
        let mut entries = self.ordered(key);
        entries.reverse();
        let Some(window) = resolve_window(entries.len(), start, stop) else {
            return Ok(Vec::new());
        };
        Ok(entries[window].iter().map(|(_, m)| m.clone()).collect())
    }

    async fn sorted_set_card(&self, key: &str) -> Result<u64> {
        Ok(self.sorted.get(key).map_or(0, |set| set.len() as u64))
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .sets
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }
}

/// A small forum kept in memory, for tests and local tooling.
///
/// The first post added to a topic becomes its main post.
#[derive(Debug, Default)]
pub struct MemoryForum {
    main_pids: DashMap<TopicId, PostId>,
    posts: DashMap<PostId, PostSummary>,
    users: DashMap<UserId, UserSummary>,
    tags: DashMap<SmolStr, ()>,
    whitelists: DashMap<CategoryId, Vec<SmolStr>>,
}

impl MemoryForum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&self, post: PostSummary) {
        self.main_pids.entry(post.tid).or_insert(post.pid);
        self.posts.insert(post.pid, post);
    }

    /// Delete a post. Its topic keeps the main post id.
    pub fn remove_post(&self, pid: PostId) {
        self.posts.remove(&pid);
    }

    pub fn add_user(&self, user: UserSummary) {
        self.users.insert(user.uid, user);
    }

    pub fn remove_user(&self, uid: UserId) {
        self.users.remove(&uid);
    }

    /// Make `tag` known to tag search.
    pub fn add_tag(&self, tag: impl Into<SmolStr>) {
        self.tags.insert(tag.into(), ());
    }

    pub fn set_tag_whitelist(&self, cid: CategoryId, tags: Vec<SmolStr>) {
        self.whitelists.insert(cid, tags);
    }
}

#[async_trait]
impl ForumServices for MemoryForum {
    async fn topic_main_pid(&self, tid: TopicId) -> Result<Option<PostId>> {
        Ok(self.main_pids.get(&tid).map(|pid| *pid))
    }

    async fn posts_fields(&self, pids: &[PostId]) -> Result<Vec<Option<PostSummary>>> {
        Ok(pids
            .iter()
            .map(|pid| self.posts.get(pid).map(|post| post.value().clone()))
            .collect())
    }

    async fn post_index(&self, pid: PostId, tid: TopicId) -> Result<Option<u64>> {
        let mut in_topic: Vec<(i64, PostId)> = self
            .posts
            .iter()
            .filter(|post| post.tid == tid)
            .map(|post| (post.timestamp, post.pid))
            .collect();
        in_topic.sort();
        Ok(in_topic
            .iter()
            .position(|(_, p)| *p == pid)
            .map(|index| index as u64))
    }

    async fn users_fields(&self, uids: &[UserId]) -> Result<Vec<Option<UserSummary>>> {
        Ok(uids
            .iter()
            .map(|uid| self.users.get(uid).map(|user| user.value().clone()))
            .collect())
    }

    async fn search_tags(&self, query: &str, cid: Option<CategoryId>) -> Result<Vec<SmolStr>> {
        let query = query.to_lowercase();
        let whitelist = cid.and_then(|cid| self.whitelists.get(&cid).map(|w| w.value().clone()));

        let mut found: Vec<SmolStr> = self
            .tags
            .iter()
            .map(|entry| entry.key().clone())
            .filter(|tag| tag.starts_with(query.as_str()))
            .filter(|tag| match &whitelist {
                Some(allowed) if !allowed.is_empty() => allowed.contains(tag),
                _ => true,
            })
            .collect();
        found.sort();
        Ok(found)
    }

    async fn category_tag_whitelist(&self, cid: CategoryId) -> Result<Vec<SmolStr>> {
        Ok(self
            .whitelists
            .get(&cid)
            .map(|tags| tags.value().clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rev_range_orders_by_score_then_member() {
        let store = MemoryStore::new();
        store.sorted_set_add("k", 3, "a").await.unwrap();
        store.sorted_set_add("k", 1, "b").await.unwrap();
        store.sorted_set_add("k", 2, "c").await.unwrap();
        store.sorted_set_add("k", 2, "d").await.unwrap();

        assert_eq!(store.sorted_set_range("k", 0, -1).await.unwrap(), ["b", "c", "d", "a"]);
        assert_eq!(store.sorted_set_rev_range("k", 0, 1).await.unwrap(), ["a", "d"]);
        assert_eq!(store.sorted_set_card("k").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_add_updates_score() {
        let store = MemoryStore::new();
        store.sorted_set_add("k", 1, "a").await.unwrap();
        store.sorted_set_add("k", 5, "a").await.unwrap();
        assert_eq!(store.sorted_set_card("k").await.unwrap(), 1);
        assert_eq!(store.score("k", "a"), Some(5));
    }

    #[tokio::test]
    async fn test_missing_keys_are_empty() {
        let store = MemoryStore::new();
        assert!(store.sorted_set_rev_range("nope", 0, -1).await.unwrap().is_empty());
        assert_eq!(store.sorted_set_card("nope").await.unwrap(), 0);
        assert!(store.set_members("nope").await.unwrap().is_empty());
    }

    fn post(pid: u64, tid: u64, timestamp: i64) -> PostSummary {
        PostSummary {
            pid: PostId(pid),
            tid: TopicId(tid),
            uid: UserId(1),
            timestamp,
            content: None,
        }
    }

    #[tokio::test]
    async fn test_forum_main_pid_and_index() {
        let forum = MemoryForum::new();
        forum.add_post(post(10, 1, 100));
        forum.add_post(post(11, 1, 200));
        forum.add_post(post(12, 1, 300));

        assert_eq!(forum.topic_main_pid(TopicId(1)).await.unwrap(), Some(PostId(10)));
        assert_eq!(forum.topic_main_pid(TopicId(2)).await.unwrap(), None);
        assert_eq!(forum.post_index(PostId(10), TopicId(1)).await.unwrap(), Some(0));
        assert_eq!(forum.post_index(PostId(12), TopicId(1)).await.unwrap(), Some(2));
        assert_eq!(
            forum.topics_main_pids(&[TopicId(2), TopicId(1)]).await.unwrap(),
            vec![None, Some(PostId(10))]
        );
    }

    #[tokio::test]
    async fn test_forum_tag_search() {
        let forum = MemoryForum::new();
        for tag in ["rust", "ruby", "go"] {
            forum.add_tag(tag);
        }
        forum.set_tag_whitelist(CategoryId(3), vec!["ruby".into()]);

        assert_eq!(forum.search_tags("ru", None).await.unwrap(), ["ruby", "rust"]);
        assert_eq!(forum.search_tags("ru", Some(CategoryId(3))).await.unwrap(), ["ruby"]);
    }
}
