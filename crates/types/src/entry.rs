use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::serde_util::one_or_many;

/// The user configuration document holding every declared command and app.
///
/// ```json
/// {
///   "commands": { "my.command": { "script": "cmd.sh", "button": { "text": "Run" } } },
///   "apps": [ "app.sh", { "script": "other.sh", "name": "Other" } ]
/// }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntriesDocument {
    /// Command entries in declaration order, keyed by command id.
    #[serde(default, deserialize_with = "ordered_entries")]
    pub commands: Vec<(String, Entry)>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub apps: Vec<AppEntrySpec>,
}

/// An app entry is either a bare script path or a full entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppEntrySpec {
    Script(String),
    Full(Entry),
}

impl AppEntrySpec {
    pub fn into_entry(self) -> Entry {
        match self {
            AppEntrySpec::Script(script) => Entry {
                script,
                ..Default::default()
            },
            AppEntrySpec::Full(entry) => entry,
        }
    }
}

/// One user-declared command or app.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default)]
    pub script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<ButtonSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_destroyed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_condition: Option<PlatformCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_condition: Option<String>,
    /// Render the app through the component template mode.
    #[serde(default)]
    pub vue: bool,
    /// Initial value of the script's state cell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

/// Status bar button attached to an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ButtonSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityCondition>,
    /// Code run through the host each time the active editor changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_editor_changed: Option<String>,
}

/// Decides whether a button is shown for the current active editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityCondition {
    /// Language ids the active editor must have. Empty means any.
    #[serde(default, deserialize_with = "one_or_many")]
    pub languages: Vec<String>,
    /// Regular expression the active editor's file path must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    /// Hide the button when no editor is active.
    #[serde(default)]
    pub requires_editor: bool,
}

/// Platforms an entry is restricted to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlatformCondition {
    One(String),
    Many(Vec<String>),
}

impl PlatformCondition {
    /// Returns true if `os` (a `std::env::consts::OS` value) is one of the listed platforms.
    ///
    /// Node-style names (`win32`, `darwin`) are accepted as aliases. An empty list matches
    /// every platform.
    pub fn matches(&self, os: &str) -> bool {
        let platforms: Vec<&str> = match self {
            PlatformCondition::One(p) => vec![p.as_str()],
            PlatformCondition::Many(list) => list.iter().map(String::as_str).collect(),
        };

        let platforms: Vec<String> = platforms
            .into_iter()
            .map(crate::normalize_name)
            .filter(|p| !p.is_empty())
            .map(|p| match p.as_str() {
                "win32" => "windows".to_string(),
                "darwin" => "macos".to_string(),
                _ => p,
            })
            .collect();

        platforms.is_empty() || platforms.iter().any(|p| p == os)
    }
}

fn ordered_entries<'de, D>(deserializer: D) -> Result<Vec<(String, Entry)>, D::Error>
where
    D: Deserializer<'de>,
{
    let map: Option<serde_json::Map<String, Value>> = Option::deserialize(deserializer)?;
    let Some(map) = map else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        let entry: Entry = serde_json::from_value(value)
            .map_err(|e| D::Error::custom(format!("invalid entry '{key}': {e}")))?;
        entries.push((key, entry));
    }
    Ok(entries)
}
