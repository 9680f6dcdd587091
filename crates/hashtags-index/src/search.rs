//! Tag autocomplete for the composer.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::Result;
use crate::forum::ForumServices;
use crate::model::CategoryId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    /// The composer the request came from, if any.
    #[serde(default, rename = "composerObj")]
    pub composer: Option<ComposerContext>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposerContext {
    #[serde(default)]
    pub cid: Option<CategoryId>,
}

/// Suggest tags for `request`.
///
/// A non-empty query searches the forum's tags. An empty query offers the
/// composer category's tag whitelist, or nothing without a category.
pub async fn search<F>(forum: &F, request: &SearchRequest) -> Result<Vec<SmolStr>>
where
    F: ForumServices + ?Sized,
{
    let cid = request.composer.as_ref().and_then(|composer| composer.cid);
    let query = request.query.trim();

    if !query.is_empty() {
        return forum.search_tags(query, cid).await;
    }
    match cid {
        Some(cid) => forum.category_tag_whitelist(cid).await,
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryForum;

    fn forum() -> MemoryForum {
        let forum = MemoryForum::new();
        forum.add_tag("rust");
        forum.add_tag("ruby");
        forum.set_tag_whitelist(CategoryId(2), vec!["announcements".into()]);
        forum
    }

    #[tokio::test]
    async fn test_query_searches_tags() {
        let request = SearchRequest {
            query: "rus".into(),
            composer: None,
        };
        assert_eq!(search(&forum(), &request).await.unwrap(), ["rust"]);
    }

    #[tokio::test]
    async fn test_empty_query_uses_category_whitelist() {
        let request: SearchRequest =
            serde_json::from_value(serde_json::json!({ "query": "", "composerObj": { "cid": 2 } }))
                .unwrap();
        assert_eq!(search(&forum(), &request).await.unwrap(), ["announcements"]);
    }

    #[tokio::test]
    async fn test_empty_query_without_category() {
        let request = SearchRequest::default();
        assert!(search(&forum(), &request).await.unwrap().is_empty());
    }
}
