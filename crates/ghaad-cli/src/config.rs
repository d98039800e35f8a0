use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

const APP_DIR: &str = "ghaad";

/// Top-level CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CliConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub github: Option<ProviderConfig>,
    #[serde(default)]
    pub gitlab: Option<ProviderConfig>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            github: None,
            gitlab: None,
        }
    }
}

/// OAuth app registration and endpoint overrides for one provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub redirect_uri: String,
    /// Self-hosted instance root. Only meaningful for GitLab.
    pub base_url: Option<String>,
    pub api_base_url: Option<String>,
}

fn default_app_name() -> String {
    "CFP Tracker".into()
}

fn app_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR))
}

/// Config file path: `~/.config/ghaad/config.toml`
pub fn config_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join("config.toml"))
}

/// Session file path: `~/.config/ghaad/session.json`
pub fn session_path() -> Option<PathBuf> {
    app_dir().map(|d| d.join("session.json"))
}

/// Load config from the default location, falling back to defaults.
pub fn load_config() -> CliConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => CliConfig::default(),
    }
}

/// Load config from `path`. A missing file yields defaults; a malformed
/// one is reported and also yields defaults.
pub fn load_config_from(path: &Path) -> CliConfig {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return CliConfig::default();
    };

    match toml::from_str::<CliConfig>(&contents) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
            CliConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: CliConfig = toml::from_str("").unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.app_name, "CFP Tracker");
    }

    #[test]
    fn parse_providers_from_toml() {
        let toml_str = r#"
app_name = "Talks"

[github]
client_id = "Iv1.abc"
redirect_uri = "http://localhost:3000/oauth/github"

[gitlab]
client_id = "gl-123"
redirect_uri = "http://localhost:3000/oauth/gitlab"
base_url = "https://gitlab.example.com"
"#;
        let config: CliConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.app_name, "Talks");

        let github = config.github.unwrap();
        assert_eq!(github.client_id, "Iv1.abc");
        assert_eq!(github.api_base_url, None);

        let gitlab = config.gitlab.unwrap();
        assert_eq!(gitlab.base_url.as_deref(), Some("https://gitlab.example.com"));
    }

    #[test]
    fn api_base_url_override_is_optional() {
        let toml_str = r#"
[github]
client_id = "Iv1.abc"
redirect_uri = "http://localhost"
api_base_url = "https://ghe.example.com/api/v3"
"#;
        let config: CliConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.github.unwrap().api_base_url.as_deref(),
            Some("https://ghe.example.com/api/v3")
        );
        assert!(config.gitlab.is_none());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml"));
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "app_name = [unterminated").unwrap();

        let config = load_config_from(&path);
        assert_eq!(config, CliConfig::default());
    }

    #[test]
    fn file_is_read_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "app_name = \"Speaker Notes\"\n").unwrap();

        assert_eq!(load_config_from(&path).app_name, "Speaker Notes");
    }
}
