use serde::{Deserialize, Serialize};

use crate::serde_util::{one_or_many_lenient, opt_string, string_or_empty, strings_lenient};

/// A remote app catalog as served over HTTP.
///
/// ```json
/// { "name": "...", "apps": [ { "name": "...", "source": "..." } ], "imports": ["..."] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Entries that are not objects are dropped.
    #[serde(default, deserialize_with = "one_or_many_lenient")]
    pub apps: Vec<CatalogApp>,
    /// Non-string imports read as `""` and are ignored by the loader.
    #[serde(default, deserialize_with = "strings_lenient")]
    pub imports: Vec<String>,
}

/// One app listed in a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogApp {
    #[serde(default, deserialize_with = "string_or_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "opt_string", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, deserialize_with = "string_or_empty")]
    pub source: String,
    /// Where this app was listed. Set by the loader, never part of the wire format.
    #[serde(skip)]
    pub origin: Option<AppOrigin>,
}

/// Backlink from an app to the catalog it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppOrigin {
    /// Name of the owning catalog, if it declared one.
    pub catalog: Option<String>,
    /// The URL the owning catalog was fetched from.
    pub url: String,
}

impl Catalog {
    /// Stamps every app with a backlink to this catalog and the URL it came from.
    pub fn attach_origin(&mut self, url: &str) {
        let origin = AppOrigin {
            catalog: self.name.clone(),
            url: url.to_string(),
        };
        for app in &mut self.apps {
            app.origin = Some(origin.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_apps_and_imports_become_empty() {
        let catalog: Catalog = serde_json::from_str(r#"{ "name": "Empty" }"#).unwrap();
        assert!(catalog.apps.is_empty());
        assert!(catalog.imports.is_empty());

        let catalog: Catalog = serde_json::from_str(r#"{ "apps": null }"#).unwrap();
        assert!(catalog.apps.is_empty());
    }

    #[test]
    fn single_app_object_is_wrapped() {
        let catalog: Catalog =
            serde_json::from_str(r#"{ "apps": { "name": "solo", "source": "x" }, "imports": "u" }"#)
                .unwrap();
        assert_eq!(catalog.apps.len(), 1);
        assert_eq!(catalog.apps[0].name, "solo");
        assert_eq!(catalog.imports, vec!["u".to_string()]);
    }

    #[test]
    fn attach_origin_links_every_app() {
        let mut catalog: Catalog = serde_json::from_str(
            r#"{ "name": "Main", "apps": [ { "name": "a", "source": "s" }, { "name": "b", "source": "t" } ] }"#,
        )
        .unwrap();
        catalog.attach_origin("https://example.com/store.json");

        for app in &catalog.apps {
            let origin = app.origin.as_ref().unwrap();
            assert_eq!(origin.catalog.as_deref(), Some("Main"));
            assert_eq!(origin.url, "https://example.com/store.json");
        }
    }

    #[test]
    fn null_and_non_string_fields_do_not_reject_the_catalog() {
        let catalog: Catalog = serde_json::from_str(
            r#"{
                "name": null,
                "apps": [
                    { "name": "good", "source": "https://x/good.tgz" },
                    { "name": "bad", "source": null, "displayName": 7, "icon": {} },
                    "not an app"
                ],
                "imports": ["https://sub", null]
            }"#,
        )
        .unwrap();

        assert_eq!(catalog.name, None);
        assert_eq!(catalog.apps.len(), 2);
        assert_eq!(catalog.apps[0].source, "https://x/good.tgz");
        assert_eq!(catalog.apps[1].source, "");
        assert_eq!(catalog.apps[1].display_name.as_deref(), Some("7"));
        assert_eq!(catalog.apps[1].icon, None);
        assert_eq!(catalog.imports, vec!["https://sub".to_string(), String::new()]);
    }
}
