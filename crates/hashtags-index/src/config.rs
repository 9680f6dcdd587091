use std::path::PathBuf;
use std::str::FromStr;

use hashtags_core::{LinkPolicy, RewriteOptions, Tag};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, IndexError};

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagConfig {
    /// Path prefix the forum is mounted under, e.g. `/forum`. Empty when
    /// mounted at the root.
    pub relative_path: String,
    pub max_tag_length: usize,
    pub reindex_batch_size: usize,
    pub link_policy: LinkPolicy,
    /// Database file for [`crate::SqliteStore::from_config`]; in-memory when unset.
    pub sqlite_path: Option<PathBuf>,
}

impl HashtagConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 500;

    /// Load configuration from environment variables.
    ///
    /// Optional env vars:
    /// - `HASHTAGS_RELATIVE_PATH`: forum mount path (default: empty)
    /// - `HASHTAGS_MAX_TAG_LENGTH`: tag length cap (default: 15)
    /// - `HASHTAGS_REINDEX_BATCH_SIZE`: posts per reindex batch (default: 500)
    /// - `HASHTAGS_LINK_EVERY_OCCURRENCE`: link repeats of a token too (default: false)
    /// - `HASHTAGS_SQLITE_PATH`: database file for the SQLite store
    pub fn from_env() -> Result<Self, IndexError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let defaults = Self::default();

        let relative_path = lookup("HASHTAGS_RELATIVE_PATH")
            .map(|p| p.trim_end_matches('/').to_string())
            .unwrap_or(defaults.relative_path);

        let max_tag_length = parse_var(&lookup, "HASHTAGS_MAX_TAG_LENGTH")?
            .unwrap_or(defaults.max_tag_length);
        if max_tag_length == 0 {
            return Err(ConfigError::Invalid {
                var: "HASHTAGS_MAX_TAG_LENGTH",
                message: "must be at least 1".to_string(),
            }
            .into());
        }

        let reindex_batch_size = parse_var(&lookup, "HASHTAGS_REINDEX_BATCH_SIZE")?
            .unwrap_or(defaults.reindex_batch_size);
        if reindex_batch_size == 0 {
            return Err(ConfigError::Invalid {
                var: "HASHTAGS_REINDEX_BATCH_SIZE",
                message: "must be at least 1".to_string(),
            }
            .into());
        }

        let link_policy = match parse_var::<bool, _>(&lookup, "HASHTAGS_LINK_EVERY_OCCURRENCE")? {
            Some(true) => LinkPolicy::EveryOccurrence,
            Some(false) | None => defaults.link_policy,
        };

        let sqlite_path = lookup("HASHTAGS_SQLITE_PATH").map(PathBuf::from);

        Ok(Self {
            relative_path,
            max_tag_length,
            reindex_batch_size,
            link_policy,
            sqlite_path,
        })
    }

    /// Options for linking hashtags in rendered post HTML.
    pub fn rewrite_options(&self) -> RewriteOptions {
        RewriteOptions::html(self.relative_path.clone())
            .with_policy(self.link_policy)
            .with_max_tag_length(self.max_tag_length)
    }
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            relative_path: String::new(),
            max_tag_length: Tag::DEFAULT_MAX_LENGTH,
            reindex_batch_size: Self::DEFAULT_BATCH_SIZE,
            link_policy: LinkPolicy::FirstOccurrence,
            sqlite_path: None,
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, IndexError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&'static str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e: T::Err| {
        ConfigError::Invalid {
            var,
            message: format!("{raw:?}: {e}"),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&'static str, &str)]) -> Result<HashtagConfig, IndexError> {
        let vars: HashMap<&'static str, String> =
            vars.iter().map(|(k, v)| (*k, v.to_string())).collect();
        HashtagConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn test_defaults_when_unset() {
        assert_eq!(load(&[]).unwrap(), HashtagConfig::default());
    }

    #[test]
    fn test_reads_values() {
        let config = load(&[
            ("HASHTAGS_RELATIVE_PATH", "/forum/"),
            ("HASHTAGS_MAX_TAG_LENGTH", "30"),
            ("HASHTAGS_REINDEX_BATCH_SIZE", "50"),
            ("HASHTAGS_LINK_EVERY_OCCURRENCE", "true"),
            ("HASHTAGS_SQLITE_PATH", "/tmp/tags.sqlite"),
        ])
        .unwrap();

        assert_eq!(config.relative_path, "/forum");
        assert_eq!(config.max_tag_length, 30);
        assert_eq!(config.reindex_batch_size, 50);
        assert_eq!(config.link_policy, LinkPolicy::EveryOccurrence);
        assert_eq!(config.sqlite_path, Some(PathBuf::from("/tmp/tags.sqlite")));
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = load(&[("HASHTAGS_MAX_TAG_LENGTH", "lots")]).unwrap_err();
        assert!(matches!(
            err,
            IndexError::Config(ConfigError::Invalid {
                var: "HASHTAGS_MAX_TAG_LENGTH",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(load(&[("HASHTAGS_REINDEX_BATCH_SIZE", "0")]).is_err());
    }

    #[test]
    fn test_rewrite_options_follow_config() {
        let config = load(&[("HASHTAGS_RELATIVE_PATH", "/f")]).unwrap();
        let options = config.rewrite_options();
        assert_eq!(options.base_path, "/f");
        assert_eq!(options.policy, LinkPolicy::FirstOccurrence);
    }
}
