// Cache key encoding.
// Turns an ordered list of identity parts into a stable, collision-free key.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminates every encoded identity part.
const DELIMITER: char = '|';
/// Introduces a percent-escaped byte.
const ESCAPE: char = '%';

/// Opaque key identifying one logical resource plus its variant dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Encode identity parts into a key.
    ///
    /// Each part is escaped and then terminated by the delimiter, so two
    /// sequences produce the same key only if they are equal part for part.
    pub fn encode<S: AsRef<str>>(parts: &[S]) -> Self {
        let mut key = String::new();
        for part in parts {
            escape_into(part.as_ref(), &mut key);
            key.push(DELIMITER);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Rebuild a key from its encoded form (as read back from a medium).
    pub(crate) fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn escape_into(part: &str, out: &mut String) {
    for c in part.chars() {
        if c == DELIMITER || c == ESCAPE || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push(ESCAPE);
                out.push_str(&format!("{:02X}", byte));
            }
        } else {
            out.push(c);
        }
    }
}
