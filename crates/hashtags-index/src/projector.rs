//! Tag pages list posts, not topics.
//!
//! The host renders a tag page as a topic list. [`TagPageProjector`] swaps in
//! the topics of the newest posts carrying the tag, and [`TagPage::decorate`]
//! points each row at its post and shows that post as the row's teaser.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use hashtags_core::Tag;
use n0_future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::HashtagConfig;
use crate::error::Result;
use crate::forum::ForumServices;
use crate::model::{PostId, PostSummary, Teaser, TopicId, TopicListing, UserId, UserSummary};
use crate::store::{SortedSetStore, keys};
use crate::telemetry;

/// One page of a tag's posts, newest first. Built per request.
///
/// `pids`, `tids`, `indices` and `teasers` are aligned: entry `i` of each
/// describes the same post. Posts deleted since they were indexed are left
/// out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagPage {
    /// `None` when the requested tag has no canonical form.
    pub tag: Option<Tag>,
    pub pids: Vec<PostId>,
    pub tids: Vec<TopicId>,
    /// Position of each post inside its topic, if the forum knows it.
    pub indices: Vec<Option<u64>>,
    pub teasers: Vec<Teaser>,
}

impl TagPage {
    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    /// Apply the page to the host's topic rows, which come in `tids` order.
    ///
    /// Every row loses its bookmark. Rows whose topic matches the page entry
    /// at the same position link to the post and show it as the teaser; the
    /// main post (index 0) and unknown positions keep the bare topic link.
    pub fn decorate(&self, topics: &mut [TopicListing]) {
        for (i, topic) in topics.iter_mut().enumerate() {
            topic.bookmark = None;

            if self.tids.get(i) != Some(&topic.tid) {
                debug!(tid = %topic.tid, position = i, "topic row does not match tag page entry");
                continue;
            }

            if let Some(Some(index)) = self.indices.get(i) {
                if *index > 0 {
                    topic.slug = format!("{}/{}", topic.slug, index);
                }
            }
            if let Some(teaser) = self.teasers.get(i) {
                topic.teaser = Some(teaser.clone());
            }
        }
    }
}

pub struct TagPageProjector<S: ?Sized, F: ?Sized> {
    store: Arc<S>,
    forum: Arc<F>,
    max_tag_length: usize,
}

impl<S, F> TagPageProjector<S, F>
where
    S: SortedSetStore + ?Sized,
    F: ForumServices + ?Sized,
{
    pub fn new(store: Arc<S>, forum: Arc<F>, config: &HashtagConfig) -> Self {
        Self {
            store,
            forum,
            max_tag_length: config.max_tag_length,
        }
    }

    /// Project the inclusive window `start..=stop` of `tag`'s posts, newest
    /// first.
    ///
    /// Post positions that cannot be looked up become `None` and authors that
    /// no longer exist become [`UserSummary::guest`]; neither fails the page.
    pub async fn project(&self, tag: &str, start: i64, stop: i64) -> Result<TagPage> {
        let Some(tag) = Tag::canonicalize(tag, self.max_tag_length) else {
            return Ok(TagPage::default());
        };
        metrics::counter!(telemetry::TAG_PAGES).increment(1);

        let members = self
            .store
            .sorted_set_rev_range(&keys::tag_posts(&tag), start, stop)
            .await?;
        let pids: Vec<PostId> = members
            .iter()
            .filter_map(|member| match member.parse() {
                Ok(pid) => Some(pid),
                Err(_) => {
                    warn!(tag = %tag, member = %member, "ignoring non-numeric post id");
                    None
                }
            })
            .collect();

        if pids.is_empty() {
            return Ok(TagPage {
                tag: Some(tag),
                ..Default::default()
            });
        }

        let posts: Vec<PostSummary> = self
            .forum
            .posts_fields(&pids)
            .await?
            .into_iter()
            .flatten()
            .collect();

        let indices = join_all(posts.iter().map(|post| async move {
            match self.forum.post_index(post.pid, post.tid).await {
                Ok(index) => index,
                Err(e) => {
                    warn!(pid = %post.pid, error = %e, "failed to look up post index");
                    None
                }
            }
        }))
        .await;

        let users = self.authors(&posts).await?;
        let teasers = posts
            .iter()
            .zip(&indices)
            .map(|(post, index)| Teaser {
                pid: post.pid,
                index: *index,
                timestamp_iso: iso_timestamp(post.timestamp),
                user: users
                    .get(&post.uid)
                    .cloned()
                    .unwrap_or_else(UserSummary::guest),
            })
            .collect();

        debug!(tag = %tag, start, stop, posts = posts.len(), "projected tag page");
        Ok(TagPage {
            tag: Some(tag),
            pids: posts.iter().map(|post| post.pid).collect(),
            tids: posts.iter().map(|post| post.tid).collect(),
            indices,
            teasers,
        })
    }

    async fn authors(&self, posts: &[PostSummary]) -> Result<HashMap<UserId, UserSummary>> {
        let mut uids: Vec<UserId> = posts.iter().map(|post| post.uid).collect();
        uids.sort();
        uids.dedup();

        let users = self.forum.users_fields(&uids).await?;
        Ok(uids
            .into_iter()
            .zip(users)
            .filter_map(|(uid, user)| user.map(|user| (uid, user)))
            .collect())
    }
}

/// `2020-09-13T12:26:40.000Z`
fn iso_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
