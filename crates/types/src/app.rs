use serde::{Deserialize, Serialize};

/// An app found in the local apps directory.
///
/// Produced by an installed-app scanner. `source` is the local identifier, which is the
/// name of the directory the app lives in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledApp {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub details: Option<String>,
    pub icon: Option<String>,
    pub source: String,
}

/// One row of the merged installed + catalog inventory.
///
/// Rebuilt on every refresh and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedAppEntry {
    pub name: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_installed: bool,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upgrade_source: Option<String>,
}

impl MergedAppEntry {
    /// Turns a merged entry back into an installed-app record.
    ///
    /// Useful when feeding a previous merge result back in as the installed set.
    pub fn to_installed(&self) -> InstalledApp {
        InstalledApp {
            name: Some(self.name.clone()),
            display_name: Some(self.display_name.clone()),
            description: self.description.clone(),
            details: self.details.clone(),
            icon: self.icon.clone(),
            source: self.source.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_entry_serializes_camel_case_without_absent_fields() {
        let entry = MergedAppEntry {
            name: "foo".into(),
            display_name: "Foo".into(),
            description: None,
            details: None,
            icon: None,
            is_installed: true,
            source: "foo".into(),
            upgrade_source: Some("https://example.com/foo.tgz".into()),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["displayName"], "Foo");
        assert_eq!(json["isInstalled"], true);
        assert_eq!(json["upgradeSource"], "https://example.com/foo.tgz");
        assert!(json.get("description").is_none());
    }
}
