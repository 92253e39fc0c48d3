//! Check-request parsing and the shared cache-key codec.
//!
//! A check request is a newline-delimited batch of lines in the form
//! `<object>#<relation>@<user>`. The same rendering doubles as the
//! *relation key*, which is base32-encoded (no padding) into the shared
//! KV cache because the KV key charset forbids `#`, `:`, and `@`.

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Prefix distinguishing cached check results from bucket metadata.
pub const CACHE_KEY_PREFIX: &str = "rel.";

/// KV key whose write timestamp is the cache freshness cutoff.
pub const INVALIDATION_KEY: &str = "inv";

/// Value stored both for the invalidation marker and for allowed results.
pub const CACHE_ALLOWED_VALUE: &str = "1";

/// A single authorization check `(object, relation, user)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CheckItem {
    pub object: String,
    pub relation: String,
    pub user: String,
}

impl CheckItem {
    /// Creates a new check item.
    pub fn new(
        object: impl Into<String>,
        relation: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            relation: relation.into(),
            user: user.into(),
        }
    }

    /// Parses a request line of the form `<object>#<relation>@<user>`.
    ///
    /// The object part may itself contain `:` (it always does) and the user
    /// part may contain `#` or `:`; only the first `#` and the first `@`
    /// after it act as separators.
    pub fn parse(line: &str) -> DomainResult<Self> {
        let malformed = || DomainError::InvalidCheckLine {
            line: line.to_string(),
        };

        let (object, rest) = line.split_once('#').ok_or_else(malformed)?;
        let (relation, user) = rest.split_once('@').ok_or_else(malformed)?;

        if object.is_empty() || relation.is_empty() || user.is_empty() {
            return Err(malformed());
        }

        Ok(Self::new(object, relation, user))
    }

    /// Renders the canonical relation key `<object>#<relation>@<user>`.
    pub fn relation_key(&self) -> String {
        format!("{}#{}@{}", self.object, self.relation, self.user)
    }

    /// Renders the KV cache key: `rel.` plus the base32-encoded relation
    /// key, no padding.
    pub fn cache_key(&self) -> String {
        format!(
            "{CACHE_KEY_PREFIX}{}",
            BASE32_NOPAD.encode(self.relation_key().as_bytes())
        )
    }
}

/// Decodes a cache key back into its relation key.
///
/// Exists so the codec is verifiably bijective; the hot path only encodes.
pub fn decode_cache_key(key: &str) -> DomainResult<String> {
    let encoded = key
        .strip_prefix(CACHE_KEY_PREFIX)
        .ok_or_else(|| DomainError::InvalidCacheKey {
            message: format!("missing {CACHE_KEY_PREFIX:?} prefix"),
        })?;
    let bytes = BASE32_NOPAD
        .decode(encoded.as_bytes())
        .map_err(|e| DomainError::InvalidCacheKey {
            message: e.to_string(),
        })?;
    String::from_utf8(bytes).map_err(|_| DomainError::InvalidCacheKey {
        message: "decoded key is not UTF-8".to_string(),
    })
}

/// Parses a full check request payload.
///
/// Lines are LF-separated; empty lines are skipped. Any malformed line
/// fails the entire request so the caller can retry it whole rather than
/// act on a partial batch.
pub fn parse_check_request(payload: &[u8]) -> DomainResult<Vec<CheckItem>> {
    let text = std::str::from_utf8(payload).map_err(|_| DomainError::InvalidCheckPayload)?;

    let mut items = Vec::new();
    for line in text.split('\n') {
        if line.is_empty() {
            continue;
        }
        items.push(CheckItem::parse(line)?);
    }
    Ok(items)
}
