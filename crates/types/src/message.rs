use serde::{Deserialize, Serialize};

use crate::app::MergedAppEntry;

/// Requests sent by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    ReloadApps,
    InstallApp(AppRef),
    UpgradeApp(AppRef),
    UninstallApp(AppRef),
    OpenApp(AppRef),
}

/// Responses and notifications sent back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    AppsLoaded {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        apps: Option<Vec<MergedAppEntry>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AppInstalled {
        success: bool,
        app: AppRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    AppUninstalled {
        success: bool,
        app: AppRef,
    },
    AppListUpdated,
}

/// The app a request refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_messages_use_command_and_data() {
        let msg: ClientMessage = serde_json::from_value(json!({ "command": "reloadApps" })).unwrap();
        assert_eq!(msg, ClientMessage::ReloadApps);

        let msg: ClientMessage = serde_json::from_value(json!({
            "command": "uninstallApp",
            "data": { "name": "Foo", "source": "foo" }
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::UninstallApp(AppRef {
                name: "Foo".into(),
                source: "foo".into()
            })
        );
    }

    #[test]
    fn failed_install_carries_error() {
        let msg = ServerMessage::AppInstalled {
            success: false,
            app: AppRef::default(),
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["command"], "appInstalled");
        assert_eq!(json["data"]["success"], false);
        assert_eq!(json["data"]["error"], "boom");
    }
}
