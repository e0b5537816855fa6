//! The `universe.json` descriptor at the root of every server archive.
//!
//! ```json
//! { "class": "lobby.LobbyServer", "name": "Lobby" }
//! ```
//!
//! `class` is required and names the definition type. `name` is the display
//! name used when the definition does not provide its own.

use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseManifest {
    class: String,
    name: Option<String>,
    raw: String,
}

impl UniverseManifest {
    /// Parses manifest text. The error is a human-readable reason.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| format!("manifest is not valid JSON: {e}"))?;

        let Value::Object(entries) = value else {
            return Err("manifest must be a JSON object".to_string());
        };

        let class = match entries.get("class") {
            Some(Value::String(class)) if !class.trim().is_empty() => class.trim().to_string(),
            Some(Value::String(_)) => return Err("`class` must not be empty".to_string()),
            Some(_) => return Err("`class` must be a string".to_string()),
            None => return Err("missing required `class` entry".to_string()),
        };

        let name = match entries.get("name") {
            Some(Value::String(name)) => Some(name.clone()),
            Some(Value::Null) | None => None,
            Some(_) => return Err("`name` must be a string".to_string()),
        };

        Ok(Self {
            class,
            name,
            raw: raw.to_string(),
        })
    }

    /// Name of the definition type to construct.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Fallback display name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The manifest text as found in the archive.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}
