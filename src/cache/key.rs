//! Deterministic cache keys.
//!
//! Keys are `namespace:part:part:name=value` with named fields sorted by name,
//! so identical logical requests always produce byte-identical keys. Content
//! too large or too structured to embed is reduced to a SHA-256 fingerprint.
//!
//! ```
//! use resilient_cache::cache::CacheKey;
//!
//! let key = CacheKey::new("analyze_deck")
//!     .fingerprint("4 Lightning Bolt\n20 Mountain")
//!     .field("model", "gpt-4o")
//!     .field("mode", "competitive")
//!     .build();
//! assert!(key.starts_with("analyze_deck:"));
//! assert!(key.ends_with(":mode=competitive:model=gpt-4o"));
//! ```

use std::collections::BTreeMap;
use std::fmt::Display;

use sha2::{Digest, Sha256};

/// Builder for a deterministic, colon-separated cache key.
#[derive(Debug, Clone)]
pub struct CacheKey {
    parts: Vec<String>,
    fields: BTreeMap<String, String>,
}

impl CacheKey {
    /// Start a key in `namespace` (typically the operation name).
    pub fn new(namespace: impl Display) -> Self {
        Self {
            parts: vec![escape(&namespace.to_string())],
            fields: BTreeMap::new(),
        }
    }

    /// Append a positional component.
    pub fn part(mut self, value: impl Display) -> Self {
        self.parts.push(escape(&value.to_string()));
        self
    }

    /// Append a SHA-256 fingerprint of `content`.
    pub fn fingerprint(mut self, content: impl AsRef<[u8]>) -> Self {
        self.parts.push(fingerprint(content.as_ref()));
        self
    }

    /// Set a named component; order of calls does not matter.
    pub fn field(mut self, name: impl Display, value: impl Display) -> Self {
        self.fields
            .insert(escape(&name.to_string()), escape(&value.to_string()));
        self
    }

    /// Join everything into the final key string.
    pub fn build(self) -> String {
        let mut out = self.parts.join(":");
        for (name, value) in &self.fields {
            out.push(':');
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }
}

/// Hex SHA-256 of `content`.
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Hex SHA-256 over several strings.
///
/// Uses length-prefixed encoding so `("a:b", "c")` and `("a", "b:c")` differ.
pub fn fingerprint_parts<S: AsRef<str>>(parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        let bytes = part.as_ref().as_bytes();
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hex::encode(hasher.finalize())
}

/// On-disk file name for `key`: hex SHA-256 plus `.json`.
pub fn file_name_for(key: &str) -> String {
    format!("{}.json", fingerprint(key.as_bytes()))
}

fn escape(raw: &str) -> String {
    if !raw.contains([':', '=', '\\']) {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        if matches!(c, ':' | '=' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
