//! What the plugin asks of the host forum.

use async_trait::async_trait;
use n0_future::join_all;
use smol_str::SmolStr;

use crate::error::Result;
use crate::model::{CategoryId, PostId, PostSummary, TopicId, UserId, UserSummary};

#[async_trait]
pub trait ForumServices: Send + Sync {
    /// The topic's main post, `None` if the topic has none (yet).
    async fn topic_main_pid(&self, tid: TopicId) -> Result<Option<PostId>>;

    /// Main posts for many topics, aligned with `tids`.
    async fn topics_main_pids(&self, tids: &[TopicId]) -> Result<Vec<Option<PostId>>> {
        join_all(tids.iter().map(|tid| self.topic_main_pid(*tid)))
            .await
            .into_iter()
            .collect()
    }

    /// Post fields aligned with `pids`; `None` for posts that no longer exist.
    async fn posts_fields(&self, pids: &[PostId]) -> Result<Vec<Option<PostSummary>>>;

    /// Position of the post within its topic, the main post being 0.
    async fn post_index(&self, pid: PostId, tid: TopicId) -> Result<Option<u64>>;

    /// User fields aligned with `uids`; `None` for deleted users.
    async fn users_fields(&self, uids: &[UserId]) -> Result<Vec<Option<UserSummary>>>;

    /// Tag autocomplete for a non-empty query.
    async fn search_tags(&self, query: &str, cid: Option<CategoryId>) -> Result<Vec<SmolStr>>;

    /// Tags a category restricts its topics to. Empty when unrestricted.
    async fn category_tag_whitelist(&self, cid: CategoryId) -> Result<Vec<SmolStr>>;
}
