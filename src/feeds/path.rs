//! Resource path validation.
//!
//! Client tokens are scoped to exactly one feed's item collection, addressed
//! as `feeds/<feed-id>/items`. The pattern is anchored at both ends so that
//! nothing can be appended or prepended to a valid path.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

/// Source of the accepted path shape, reported in diagnostics.
pub const PATH_PATTERN: &str = r"^feeds/([a-zA-Z0-9-]+)/items$";

const FEED_ID_PATTERN: &str = r"^[a-zA-Z0-9-]+$";

static PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(PATH_PATTERN).expect("valid path regex"));

static FEED_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(FEED_ID_PATTERN).expect("valid feed id regex"));

/// A validated `feeds/<id>/items` path together with its feed id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPath {
    path: String,
    feed_id: String,
}

impl FeedPath {
    /// Validate `path` and extract the feed identifier.
    pub fn parse(path: &str) -> Result<Self> {
        let caps = PATH_RE
            .captures(path)
            .ok_or_else(|| Error::InvalidPath(PATH_PATTERN.to_string()))?;
        Ok(Self {
            path: path.to_string(),
            feed_id: caps[1].to_string(),
        })
    }

    /// Build the canonical path for a bare feed id.
    pub fn for_feed(feed_id: &str) -> Result<Self> {
        validate_feed_id(feed_id)?;
        Ok(Self {
            path: format!("feeds/{feed_id}/items"),
            feed_id: feed_id.to_string(),
        })
    }

    /// The full validated path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// The extracted feed identifier.
    #[must_use]
    pub fn feed_id(&self) -> &str {
        &self.feed_id
    }
}

impl fmt::Display for FeedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

/// Check a bare feed identifier (`[a-zA-Z0-9-]+`).
pub fn validate_feed_id(feed_id: &str) -> Result<()> {
    if FEED_ID_RE.is_match(feed_id) {
        Ok(())
    } else {
        Err(Error::InvalidPath(PATH_PATTERN.to_string()))
    }
}
