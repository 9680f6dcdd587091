//! Entry points for the host forum's plugin hooks.
//!
//! Each method takes the hook's payload and returns it, changed or not.
//! Payload field names follow the host's camelCase JSON.

use std::borrow::Cow;
use std::sync::Arc;

use hashtags_core::{Tag, derive_topic_tags, rewrite};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use smol_str::SmolStr;
use tracing::debug;

use crate::config::HashtagConfig;
use crate::counts::{tag_list_counts, tag_post_count};
use crate::error::Result;
use crate::forum::ForumServices;
use crate::indexer::{IndexOutcome, PostIndexer, ReindexProgress, ReindexReport};
use crate::model::{PostId, PostRecord, TagListEntry, TopicId, TopicListing};
use crate::projector::{TagPage, TagPageProjector};
use crate::search::{SearchRequest, search};
use crate::store::SortedSetStore;

// Payloads keep fields they do not name in `extra`; hooks hand them back
// untouched.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostParsePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostContent>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Topic create and edit payloads.
///
/// On create `post` is absent and `topic.main_pid` is unset or zero; on edit
/// `post` names the edited post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicSavePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<TopicRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<PostRef>,
    #[serde(default)]
    pub data: TopicDraft,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<TopicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_pid: Option<PostId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostRef {
    pub pid: PostId,
    pub tid: TopicId,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PostRef {
    pub fn new(pid: PostId, tid: TopicId) -> Self {
        Self {
            pid,
            tid,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<SmolStr>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Which topics a tag page lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTidsPayload {
    pub tag: SmolStr,
    #[serde(default)]
    pub tids: Vec<TopicId>,
    pub start: i64,
    pub stop: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TagTidsPayload {
    pub fn new(tag: impl Into<SmolStr>, start: i64, stop: i64) -> Self {
        Self {
            tag: tag.into(),
            tids: Vec::new(),
            start,
            stop,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRenderPayload {
    pub template_data: TagTemplateData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TagRenderPayload {
    pub fn new(tag: impl Into<SmolStr>, topics: Vec<TopicListing>) -> Self {
        Self {
            template_data: TagTemplateData {
                tag: tag.into(),
                topics,
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagTemplateData {
    pub tag: SmolStr,
    #[serde(default)]
    pub topics: Vec<TopicListing>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Item total used to paginate a tag page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagCountPayload {
    pub tag: SmolStr,
    #[serde(default)]
    pub count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TagCountPayload {
    pub fn new(tag: impl Into<SmolStr>) -> Self {
        Self {
            tag: tag.into(),
            count: 0,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagListPayload {
    #[serde(default)]
    pub tags: Vec<TagListEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TagListPayload {
    pub fn new(tags: Vec<TagListEntry>) -> Self {
        Self {
            tags,
            extra: Map::new(),
        }
    }
}

/// The plugin, wired to a store and a forum.
pub struct HashtagPlugin<S: ?Sized, F: ?Sized> {
    config: HashtagConfig,
    store: Arc<S>,
    forum: Arc<F>,
    indexer: PostIndexer<S, F>,
    projector: TagPageProjector<S, F>,
}

impl<S, F> HashtagPlugin<S, F>
where
    S: SortedSetStore + ?Sized,
    F: ForumServices + ?Sized,
{
    pub fn new(config: HashtagConfig, store: Arc<S>, forum: Arc<F>) -> Self {
        let indexer = PostIndexer::new(store.clone(), forum.clone(), &config);
        let projector = TagPageProjector::new(store.clone(), forum.clone(), &config);
        Self {
            config,
            store,
            forum,
            indexer,
            projector,
        }
    }

    pub fn config(&self) -> &HashtagConfig {
        &self.config
    }

    pub fn indexer(&self) -> &PostIndexer<S, F> {
        &self.indexer
    }

    /// Link hashtags in a post being rendered.
    pub fn parse_post(&self, mut payload: PostParsePayload) -> PostParsePayload {
        if let Some(content) = payload
            .post_data
            .as_mut()
            .and_then(|post| post.content.as_mut())
        {
            let linked = match rewrite(content, &self.config.rewrite_options()) {
                Cow::Owned(linked) => Some(linked),
                Cow::Borrowed(_) => None,
            };
            if let Some(linked) = linked {
                *content = linked;
            }
        }
        payload
    }

    /// Link hashtags in a raw string, e.g. a signature or preview.
    pub fn parse_raw(&self, content: &str) -> String {
        rewrite(content, &self.config.rewrite_options()).into_owned()
    }

    /// Add a main post's hashtags to its topic's tags.
    pub async fn on_topic_save(&self, mut payload: TopicSavePayload) -> Result<TopicSavePayload> {
        if !self.is_main_post(&payload).await? {
            debug!("not a main post, leaving topic tags alone");
            return Ok(payload);
        }
        let Some(content) = payload.data.content.as_deref() else {
            return Ok(payload);
        };

        let max = self.config.max_tag_length;
        let existing: Vec<Tag> = payload
            .data
            .tags
            .iter()
            .filter_map(|value| Tag::canonicalize(value, max))
            .collect();
        let added: Vec<SmolStr> = derive_topic_tags(&existing, content, max)
            .into_iter()
            .filter(|tag| !existing.contains(tag))
            .map(Tag::into_inner)
            .collect();

        if !added.is_empty() {
            debug!(added = ?added, "derived topic tags from main post");
            payload.data.tags.extend(added);
        }
        Ok(payload)
    }

    /// A post was saved.
    pub async fn on_post_save(&self, post: &PostRecord) -> Result<IndexOutcome> {
        self.indexer.index_post(post).await
    }

    /// Rebuild the post index from every tagged topic.
    pub async fn reindex(&self, progress: &ReindexProgress) -> Result<ReindexReport> {
        self.indexer.reindex_all(progress).await
    }

    /// Replace a tag page's topics with the topics of its newest posts.
    ///
    /// The returned [`TagPage`] is needed again by
    /// [`on_tag_page_render`](Self::on_tag_page_render) for the same request.
    pub async fn on_tag_page_load(
        &self,
        mut payload: TagTidsPayload,
    ) -> Result<(TagTidsPayload, TagPage)> {
        let page = self
            .projector
            .project(&payload.tag, payload.start, payload.stop)
            .await?;
        payload.tids = page.tids.clone();
        Ok((payload, page))
    }

    pub fn on_tag_page_render(
        &self,
        mut payload: TagRenderPayload,
        page: &TagPage,
    ) -> TagRenderPayload {
        page.decorate(&mut payload.template_data.topics);
        payload
    }

    /// Paginate by post count rather than topic count.
    pub async fn on_tag_count(&self, mut payload: TagCountPayload) -> Result<TagCountPayload> {
        payload.count =
            tag_post_count(self.store.as_ref(), &payload.tag, self.config.max_tag_length).await?;
        Ok(payload)
    }

    /// Show post counts on the tag list.
    pub async fn on_tag_list(&self, mut payload: TagListPayload) -> Result<TagListPayload> {
        tag_list_counts(
            self.store.as_ref(),
            &mut payload.tags,
            self.config.max_tag_length,
        )
        .await?;
        Ok(payload)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SmolStr>> {
        search(self.forum.as_ref(), request).await
    }

    async fn is_main_post(&self, payload: &TopicSavePayload) -> Result<bool> {
        if let Some(post) = &payload.post {
            let main_pid = self.forum.topic_main_pid(post.tid).await?;
            return Ok(main_pid == Some(post.pid));
        }
        Ok(payload
            .topic
            .as_ref()
            .is_some_and(|topic| matches!(topic.main_pid, None | Some(PostId(0)))))
    }
}
