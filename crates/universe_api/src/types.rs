//! Identifier types shared by the bootstrap, the loader and the storage backends.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier of one running server instance.
///
/// Generated by the bootstrap right after the definition is constructed and
/// written into the definition's identity slot exactly once.
///
/// # Examples
///
/// ```rust
/// use universe_api::ServerId;
///
/// let id: ServerId = "550e8400-e29b-41d4-a716-446655440000".parse()?;
/// assert_eq!(id.to_string(), "550e8400-e29b-41d4-a716-446655440000");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(pub Uuid);

impl ServerId {
    /// Creates a new random server ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::str::FromStr for ServerId {
    type Err = uuid::Error;

    /// Parses a server ID from its hyphenated string form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl Default for ServerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
