use directories::ProjectDirs;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;
use workbench_store::{DEFAULT_CHECK_INTERVAL_DAYS, resolve_store_url};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub apps: AppsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub entries: EntriesConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Catalog URL. Empty means the built-in catalog.
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_days: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppsConfig {
    pub dir: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateConfig {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EntriesConfig {
    pub path: String,
}

fn default_check_interval() -> i64 {
    DEFAULT_CHECK_INTERVAL_DAYS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            check_interval_days: DEFAULT_CHECK_INTERVAL_DAYS,
        }
    }
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            dir: path_string(&get_default_data_dir().join("apps")),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: path_string(&get_default_data_dir().join("state.json")),
        }
    }
}

impl Default for EntriesConfig {
    fn default() -> Self {
        Self {
            path: path_string(&get_default_config_dir().join("entries.json")),
        }
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

impl Config {
    pub fn get_config_path() -> PathBuf {
        get_default_config_dir().join("config.json")
    }

    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()).await
    }

    /// Loads the configuration at `path`, writing the defaults there if it does not exist.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Self::default();
            default_config.save_to(path).await?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// The catalog URL to use, after defaulting and scheme normalization.
    pub fn store_url(&self) -> String {
        resolve_store_url(Some(&self.store.url))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["store", "url"] => {
                let resolved = resolve_store_url(Some(value));
                Url::parse(&resolved)
                    .map_err(|e| eyre::eyre!("Invalid store URL '{}': {}", value, e))?;
                self.store.url = value.trim().to_string();
            }
            ["store", "check_interval_days"] => {
                let days = value
                    .parse::<i64>()
                    .map_err(|_| eyre::eyre!("Invalid number of days: {}", value))?;
                if days < 0 {
                    return Err(eyre::eyre!("Check interval cannot be negative: {}", days));
                }
                self.store.check_interval_days = days;
            }
            ["apps", "dir"] => {
                self.apps.dir = value.to_string();
            }
            ["state", "path"] => {
                self.state.path = value.to_string();
            }
            ["entries", "path"] => {
                self.entries.path = value.to_string();
            }
            _ => {
                return Err(eyre::eyre!("Unknown configuration key: {}", key));
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Result<String> {
        let parts: Vec<&str> = key.split('.').collect();

        let value = match parts.as_slice() {
            ["store", "url"] => self.store_url(),
            ["store", "check_interval_days"] => self.store.check_interval_days.to_string(),
            ["apps", "dir"] => self.apps.dir.clone(),
            ["state", "path"] => self.state.path.clone(),
            ["entries", "path"] => self.entries.path.clone(),
            _ => {
                return Err(eyre::eyre!("Unknown configuration key: {}", key));
            }
        };

        Ok(value)
    }

    pub fn show_all(&self) -> String {
        let url = if self.store.url.trim().is_empty() {
            format!("{} (default)", self.store_url())
        } else {
            self.store_url()
        };

        format!(
            "Configuration:\n\
             Store:\n\
             ├─ url: {}\n\
             └─ check_interval_days: {}\n\
             Apps:\n\
             └─ dir: {}\n\
             State:\n\
             └─ path: {}\n\
             Entries:\n\
             └─ path: {}",
            url,
            self.store.check_interval_days,
            self.apps.dir,
            self.state.path,
            self.entries.path
        )
    }
}

/// Get the default configuration directory
fn get_default_config_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "workbench", "workbench") {
        proj_dirs.config_dir().to_path_buf()
    } else {
        // Fallback to current directory if we can't determine project dirs
        PathBuf::from(".workbench").join("config")
    }
}

/// Get the default data directory
fn get_default_data_dir() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("dev", "workbench", "workbench") {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from(".workbench").join("data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = Config::load_from(&path).await.unwrap();

        assert!(path.exists());
        assert_eq!(config.store.check_interval_days, DEFAULT_CHECK_INTERVAL_DAYS);
        assert_eq!(config.store_url(), workbench_store::DEFAULT_STORE_URL);
    }

    #[tokio::test]
    async fn set_values_round_trip_through_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");

        let mut config = Config::load_from(&path).await.unwrap();
        config.set_value("store.url", " apps.example.com/list.json ").unwrap();
        config.set_value("store.check_interval_days", "7").unwrap();
        config.set_value("apps.dir", "/tmp/apps").unwrap();
        config.save_to(&path).await.unwrap();

        let config = Config::load_from(&path).await.unwrap();
        assert_eq!(
            config.get_value("store.url").unwrap(),
            "http://apps.example.com/list.json"
        );
        assert_eq!(config.get_value("store.check_interval_days").unwrap(), "7");
        assert_eq!(config.get_value("apps.dir").unwrap(), "/tmp/apps");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = Config::default();

        assert!(config.set_value("store.check_interval_days", "soon").is_err());
        assert!(config.set_value("store.check_interval_days", "-1").is_err());
        assert!(config.set_value("store.url", "http://exa mple.com").is_err());
        assert!(config.set_value("unknown.key", "x").is_err());
        assert!(config.get_value("store").is_err());
    }
}
