//! Post counts per tag, for pagination and the tag list.

use hashtags_core::Tag;
use n0_future::join_all;

use crate::error::Result;
use crate::model::TagListEntry;
use crate::store::{SortedSetStore, keys};

/// Number of posts indexed under `tag`. Zero for values with no canonical form.
pub async fn tag_post_count<S>(store: &S, tag: &str, max_tag_length: usize) -> Result<u64>
where
    S: SortedSetStore + ?Sized,
{
    match Tag::canonicalize(tag, max_tag_length) {
        Some(tag) => store.sorted_set_card(&keys::tag_posts(&tag)).await,
        None => Ok(0),
    }
}

/// Replace each entry's score with its post count, looked up concurrently.
pub async fn tag_list_counts<S>(
    store: &S,
    entries: &mut [TagListEntry],
    max_tag_length: usize,
) -> Result<()>
where
    S: SortedSetStore + ?Sized,
{
    let counts = join_all(
        entries
            .iter()
            .map(|entry| tag_post_count(store, &entry.value, max_tag_length)),
    )
    .await;

    for (entry, count) in entries.iter_mut().zip(counts) {
        entry.score = count?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_counts_follow_post_sets() {
        let store = MemoryStore::new();
        for pid in ["1", "2", "3"] {
            store.sorted_set_add("tag:rust:posts", 1, pid).await.unwrap();
        }
        store.sorted_set_add("tag:go:posts", 1, "4").await.unwrap();

        assert_eq!(tag_post_count(&store, "Rust", 15).await.unwrap(), 3);
        assert_eq!(tag_post_count(&store, "!!!", 15).await.unwrap(), 0);

        let mut entries = vec![
            TagListEntry::new("rust", 99),
            TagListEntry::new("go", 0),
            TagListEntry::new("zig", 5),
        ];
        tag_list_counts(&store, &mut entries, 15).await.unwrap();
        let scores: Vec<u64> = entries.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![3, 1, 0]);
    }
}
