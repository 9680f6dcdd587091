//! Identifiers and records exchanged with the host forum.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Post id. Stored as the member of `tag:<slug>:posts`.
    PostId
);
id_type!(TopicId);
id_type!(UserId);
id_type!(CategoryId);

/// The parts of a saved post the index needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    pub pid: PostId,
    pub tid: TopicId,
    /// Raw post content. `None` when the host sent a post without content,
    /// which indexes nothing.
    #[serde(default)]
    pub content: Option<String>,
}

impl From<&PostSummary> for PostRecord {
    fn from(post: &PostSummary) -> Self {
        Self {
            pid: post.pid,
            tid: post.tid,
            content: post.content.clone(),
        }
    }
}

/// Post fields fetched in bulk from the forum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub pid: PostId,
    pub tid: TopicId,
    pub uid: UserId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub uid: UserId,
    pub username: SmolStr,
    pub userslug: SmolStr,
    #[serde(default)]
    pub picture: Option<String>,
}

impl UserSummary {
    /// Stand-in author for posts whose user no longer exists.
    pub fn guest() -> Self {
        Self {
            uid: UserId(0),
            username: SmolStr::new_static("Guest"),
            userslug: SmolStr::new_static(""),
            picture: None,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.uid.0 == 0
    }
}

/// The post preview shown under a topic row on a tag page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teaser {
    pub pid: PostId,
    /// Position of the post inside its topic, if known.
    #[serde(default)]
    pub index: Option<u64>,
    /// ISO-8601 timestamp with millisecond precision.
    pub timestamp_iso: String,
    pub user: UserSummary,
}

/// One row of a topic list as rendered by the host.
///
/// Fields the plugin does not touch ride along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicListing {
    pub tid: TopicId,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teaser: Option<Teaser>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopicListing {
    pub fn new(tid: TopicId, slug: impl Into<String>) -> Self {
        Self {
            tid,
            slug: slug.into(),
            bookmark: None,
            teaser: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// One tag on the tag list page, with its displayed count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagListEntry {
    pub value: SmolStr,
    #[serde(default)]
    pub score: u64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TagListEntry {
    pub fn new(value: impl Into<SmolStr>, score: u64) -> Self {
        Self {
            value: value.into(),
            score,
            extra: serde_json::Map::new(),
        }
    }
}
