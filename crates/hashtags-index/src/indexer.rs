//! The per-post tag index: `tag:<slug>:posts` relations and their rebuild.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use chrono::Utc;
use hashtags_core::{ScanOptions, Tag, extract_tags};
use n0_future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HashtagConfig;
use crate::error::Result;
use crate::forum::ForumServices;
use crate::model::{PostId, PostRecord, TopicId};
use crate::store::{SortedSetStore, keys};
use crate::telemetry;

/// Millisecond timestamps that never repeat or go backwards within a process.
///
/// Two posts indexed in the same millisecond still get distinct, ordered
/// scores.
#[derive(Debug, Default)]
pub struct ScoreClock {
    last: AtomicI64,
}

impl ScoreClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_else(|prev| prev);
        now.max(prev + 1)
    }
}

/// What indexing one post did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IndexOutcome {
    /// The post now appears under each of `tags`, scored `score`.
    Indexed { tags: Vec<Tag>, score: i64 },
    /// No hashtags and no topic tags; nothing written.
    Skipped,
}

/// Reindex progress, readable while the reindex runs.
#[derive(Debug, Default)]
pub struct ReindexProgress {
    total: AtomicUsize,
    done: AtomicUsize,
}

impl ReindexProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Release);
    }

    fn advance(&self, by: usize) {
        self.done.fetch_add(by, Ordering::AcqRel);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReindexFailure {
    pub pid: PostId,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    /// Distinct main posts found.
    pub total: usize,
    pub indexed: usize,
    pub skipped: usize,
    /// Main posts the forum no longer has.
    pub missing: usize,
    pub failures: Vec<ReindexFailure>,
}

/// Writes post/tag relations.
pub struct PostIndexer<S: ?Sized, F: ?Sized> {
    store: Arc<S>,
    forum: Arc<F>,
    clock: Arc<ScoreClock>,
    max_tag_length: usize,
    batch_size: usize,
}

impl<S, F> PostIndexer<S, F>
where
    S: SortedSetStore + ?Sized,
    F: ForumServices + ?Sized,
{
    pub fn new(store: Arc<S>, forum: Arc<F>, config: &HashtagConfig) -> Self {
        Self {
            store,
            forum,
            clock: Arc::new(ScoreClock::new()),
            max_tag_length: config.max_tag_length,
            batch_size: config.reindex_batch_size.max(1),
        }
    }

    /// Share a clock with other indexers writing to the same store.
    pub fn with_clock(mut self, clock: Arc<ScoreClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Record `post` under every tag it carries: its own hashtags plus the
    /// tags of its topic.
    ///
    /// Re-indexing a post refreshes its score under each tag and adds tags its
    /// topic has gained since. Tags it lost are not removed.
    pub async fn index_post(&self, post: &PostRecord) -> Result<IndexOutcome> {
        let Some(content) = post.content.as_deref() else {
            debug!(pid = %post.pid, "post has no content, not indexing");
            metrics::counter!(telemetry::POSTS_SKIPPED).increment(1);
            return Ok(IndexOutcome::Skipped);
        };

        let mut tags = extract_tags(content, &ScanOptions::rendered(self.max_tag_length));

        let topic_tags = self.store.set_members(&keys::topic_tags(post.tid)).await?;
        for tag in topic_tags
            .iter()
            .filter_map(|value| Tag::canonicalize(value, self.max_tag_length))
        {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        if tags.is_empty() {
            metrics::counter!(telemetry::POSTS_SKIPPED).increment(1);
            return Ok(IndexOutcome::Skipped);
        }

        let score = self.clock.next();
        let tag_keys: Vec<String> = tags.iter().map(keys::tag_posts).collect();
        self.store
            .sorted_sets_add(&tag_keys, score, &post.pid.to_string())
            .await?;

        debug!(pid = %post.pid, tid = %post.tid, tags = tags.len(), score, "indexed post");
        metrics::counter!(telemetry::POSTS_INDEXED).increment(1);
        Ok(IndexOutcome::Indexed { tags, score })
    }

    /// Rebuild the index from every main post of every tagged topic.
    ///
    /// Posts are processed `batch_size` at a time, concurrently within a
    /// batch. A post that fails to index is logged and reported; the rest
    /// carry on. Only failing to enumerate the posts aborts the run.
    pub async fn reindex_all(&self, progress: &ReindexProgress) -> Result<ReindexReport> {
        let pids = self.tagged_main_pids().await?;
        progress.set_total(pids.len());
        info!(posts = pids.len(), batch_size = self.batch_size, "reindexing tagged main posts");

        let mut report = ReindexReport {
            total: pids.len(),
            ..Default::default()
        };

        for batch in pids.chunks(self.batch_size) {
            self.reindex_batch(batch, &mut report).await;
            progress.advance(batch.len());
            debug!(done = progress.done(), total = progress.total(), "reindex batch complete");
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            missing = report.missing,
            failed = report.failures.len(),
            "reindex finished"
        );
        Ok(report)
    }

    async fn reindex_batch(&self, batch: &[PostId], report: &mut ReindexReport) {
        let posts = match self.forum.posts_fields(batch).await {
            Ok(posts) => posts,
            Err(e) => {
                warn!(error = %e, posts = batch.len(), "failed to fetch reindex batch");
                metrics::counter!(telemetry::POSTS_FAILED).increment(batch.len() as u64);
                report.failures.extend(batch.iter().map(|pid| ReindexFailure {
                    pid: *pid,
                    message: e.to_string(),
                }));
                return;
            }
        };

        let records: Vec<PostRecord> = posts
            .iter()
            .flatten()
            .map(PostRecord::from)
            .collect();
        report.missing += batch.len() - records.len();

        let outcomes = join_all(records.iter().map(|post| async move {
            (post.pid, self.index_post(post).await)
        }))
        .await;

        for (pid, outcome) in outcomes {
            match outcome {
                Ok(IndexOutcome::Indexed { .. }) => report.indexed += 1,
                Ok(IndexOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    warn!(pid = %pid, error = %e, "failed to reindex post");
                    metrics::counter!(telemetry::POSTS_FAILED).increment(1);
                    report.failures.push(ReindexFailure {
                        pid,
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    /// Distinct main posts of all topics carrying any tag, in tag order.
    async fn tagged_main_pids(&self) -> Result<Vec<PostId>> {
        let tags = self
            .store
            .sorted_set_range(keys::TAGS_BY_TOPIC_COUNT, 0, -1)
            .await?;

        let per_tag = join_all(tags.iter().map(|tag| async move {
            let members = self
                .store
                .sorted_set_range(&keys::tag_topics(tag), 0, -1)
                .await?;
            let tids: Vec<TopicId> = members
                .iter()
                .filter_map(|member| match member.parse() {
                    Ok(tid) => Some(tid),
                    Err(_) => {
                        warn!(tag = %tag, member = %member, "ignoring non-numeric topic id");
                        None
                    }
                })
                .collect();
            self.forum.topics_main_pids(&tids).await
        }))
        .await;

        let mut seen = HashSet::new();
        let mut pids = Vec::new();
        for main_pids in per_tag {
            for pid in main_pids?.into_iter().flatten() {
                if pid.0 != 0 && seen.insert(pid) {
                    pids.push(pid);
                }
            }
        }
        Ok(pids)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::error::StoreError;
    use crate::memory::{MemoryForum, MemoryStore};
    use crate::model::{PostSummary, UserId};

    fn tag(s: &str) -> Tag {
        Tag::canonicalize(s, Tag::DEFAULT_MAX_LENGTH).unwrap()
    }

    fn record(pid: u64, tid: u64, content: &str) -> PostRecord {
        PostRecord {
            pid: PostId(pid),
            tid: TopicId(tid),
            content: Some(content.to_string()),
        }
    }

    fn indexer(
        store: Arc<MemoryStore>,
        forum: Arc<MemoryForum>,
    ) -> PostIndexer<MemoryStore, MemoryForum> {
        PostIndexer::new(store, forum, &HashtagConfig::default())
    }

    #[test]
    fn test_clock_is_strictly_increasing() {
        let clock = ScoreClock::new();
        let mut last = clock.next();
        for _ in 0..1000 {
            let next = clock.next();
            assert!(next > last);
            last = next;
        }
    }

    #[tokio::test]
    async fn test_index_post_with_hashtags() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone(), Arc::new(MemoryForum::new()));

        let outcome = indexer
            .index_post(&record(5, 1, "<p>#Rust and #go</p>"))
            .await
            .unwrap();
        let IndexOutcome::Indexed { tags, score } = outcome else {
            panic!("expected post to be indexed");
        };
        assert_eq!(tags, vec![tag("rust"), tag("go")]);
        assert_eq!(store.score("tag:rust:posts", "5"), Some(score));
        assert_eq!(store.score("tag:go:posts", "5"), Some(score));
    }

    #[tokio::test]
    async fn test_index_post_without_tags_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone(), Arc::new(MemoryForum::new()));

        let outcome = indexer.index_post(&record(5, 1, "no tags")).await.unwrap();
        assert_eq!(outcome, IndexOutcome::Skipped);

        let missing = PostRecord {
            content: None,
            ..record(6, 1, "")
        };
        assert_eq!(indexer.index_post(&missing).await.unwrap(), IndexOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_quoted_and_code_hashtags_not_indexed() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone(), Arc::new(MemoryForum::new()));

        let content = "<blockquote>#quoted</blockquote><pre><code>#code</code></pre>";
        assert_eq!(
            indexer.index_post(&record(1, 1, content)).await.unwrap(),
            IndexOutcome::Skipped
        );
        assert_eq!(store.sorted_set_card("tag:quoted:posts").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reply_inherits_topic_tags() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone(), Arc::new(MemoryForum::new()));

        let first = indexer.index_post(&record(7, 3, "plain reply")).await.unwrap();
        assert_eq!(first, IndexOutcome::Skipped);

        store.set_add(&keys::topic_tags(TopicId(3)), "News").await.unwrap();
        let second = indexer.index_post(&record(7, 3, "plain reply")).await.unwrap();
        assert!(matches!(second, IndexOutcome::Indexed { ref tags, .. } if tags == &[tag("news")]));
        assert!(store.score("tag:news:posts", "7").is_some());
    }

    #[tokio::test]
    async fn test_reindex_refreshes_score() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer(store.clone(), Arc::new(MemoryForum::new()));

        indexer.index_post(&record(1, 1, "#a")).await.unwrap();
        let before = store.score("tag:a:posts", "1").unwrap();
        indexer.index_post(&record(1, 1, "#a")).await.unwrap();
        let after = store.score("tag:a:posts", "1").unwrap();

        assert!(after > before);
        assert_eq!(store.sorted_set_card("tag:a:posts").await.unwrap(), 1);
    }

    fn summary(pid: u64, tid: u64, content: &str) -> PostSummary {
        PostSummary {
            pid: PostId(pid),
            tid: TopicId(tid),
            uid: UserId(1),
            timestamp: pid as i64,
            content: Some(content.to_string()),
        }
    }

    async fn tag_topic(store: &MemoryStore, tag: &str, tid: u64) {
        store
            .sorted_set_add(keys::TAGS_BY_TOPIC_COUNT, 1, tag)
            .await
            .unwrap();
        store
            .sorted_set_add(&keys::tag_topics(tag), tid as i64, &tid.to_string())
            .await
            .unwrap();
        store
            .set_add(&keys::topic_tags(TopicId(tid)), tag)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reindex_all_covers_main_posts_once() {
        let store = Arc::new(MemoryStore::new());
        let forum = Arc::new(MemoryForum::new());

        forum.add_post(summary(10, 1, "topic one #extra"));
        forum.add_post(summary(11, 1, "a reply"));
        forum.add_post(summary(20, 2, "topic two"));
        forum.add_post(summary(30, 3, "untagged topic #ignored"));

        // Topic 1 carries two tags, so its main post is found twice.
        tag_topic(&store, "rust", 1).await;
        tag_topic(&store, "go", 1).await;
        tag_topic(&store, "go", 2).await;

        let config = HashtagConfig {
            reindex_batch_size: 1,
            ..Default::default()
        };
        let indexer = PostIndexer::new(store.clone(), forum, &config);
        let progress = ReindexProgress::new();
        let report = indexer.reindex_all(&progress).await.unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.indexed, 2);
        assert!(report.failures.is_empty());
        assert_eq!((progress.done(), progress.total()), (2, 2));

        assert!(store.score("tag:rust:posts", "10").is_some());
        assert!(store.score("tag:extra:posts", "10").is_some());
        assert!(store.score("tag:go:posts", "20").is_some());
        assert!(store.score("tag:go:posts", "11").is_none());
        assert!(store.score("tag:ignored:posts", "30").is_none());
    }

    /// Fails reads of one topic's tag set.
    struct FlakyStore {
        inner: MemoryStore,
        broken_key: String,
    }

    #[async_trait]
    impl SortedSetStore for FlakyStore {
        async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<()> {
            self.inner.sorted_set_add(key, score, member).await
        }

        async fn sorted_set_range(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
            self.inner.sorted_set_range(key, start, stop).await
        }

        async fn sorted_set_rev_range(
            &self,
            key: &str,
            start: i64,
            stop: i64,
        ) -> Result<Vec<String>> {
            self.inner.sorted_set_rev_range(key, start, stop).await
        }

        async fn sorted_set_card(&self, key: &str) -> Result<u64> {
            self.inner.sorted_set_card(key).await
        }

        async fn set_add(&self, key: &str, member: &str) -> Result<()> {
            self.inner.set_add(key, member).await
        }

        async fn set_members(&self, key: &str) -> Result<Vec<String>> {
            if key == self.broken_key {
                return Err(StoreError::Backend {
                    key: key.to_string(),
                    message: "connection reset".to_string(),
                }
                .into());
            }
            self.inner.set_members(key).await
        }
    }

    #[tokio::test]
    async fn test_reindex_all_survives_a_failing_post() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            broken_key: keys::topic_tags(TopicId(1)),
        });
        let forum = Arc::new(MemoryForum::new());
        forum.add_post(summary(10, 1, "#one"));
        forum.add_post(summary(20, 2, "#two"));
        tag_topic(&store.inner, "rust", 1).await;
        tag_topic(&store.inner, "rust", 2).await;
        // Topic 3's main post is gone.
        tag_topic(&store.inner, "rust", 3).await;
        forum.add_post(summary(30, 3, "gone"));
        forum.remove_post(PostId(30));

        let indexer = PostIndexer::new(store.clone(), forum, &HashtagConfig::default());
        let report = indexer.reindex_all(&ReindexProgress::new()).await.unwrap();

        assert_eq!(report.total, 3);
        assert_eq!(report.indexed, 1);
        assert_eq!(report.missing, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].pid, PostId(10));
        assert!(store.inner.score("tag:two:posts", "20").is_some());
    }
}
