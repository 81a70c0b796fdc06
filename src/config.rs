// Configuration module for meta-translator
// Handles the TOML configuration file and environment overrides

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const APP_NAME: &str = "meta-translator";
const CONFIG_FILENAME: &str = "config.toml";

/// Default mirror pool of public TMDB-addon deployments, all configured
/// to return IMDb ids alongside their localized records.
const DEFAULT_ADDON_MIRRORS: &[&str] = &[
    "https://tmdb.elfhosted.com/%7B%22provide_imdbId%22%3A%22true%22%2C%22language%22%3A%22it-IT%22%7D",
    "https://94c8cb9f702d-tmdb-addon.baby-beamup.club/%7B%22provide_imdbId%22%3A%22true%22%2C%22language%22%3A%22it-IT%22%7D",
    "https://tmdb-catalog.madari.media/%7B%22provide_imdbId%22%3A%22true%22%2C%22language%22%3A%22it-IT%22%7D",
];

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server configuration
    pub server: ServerConfig,

    /// Metadata provider credentials
    pub providers: ProvidersConfig,

    /// Translation and caching configuration
    pub translation: TranslationConfig,

    /// TMDB-addon mirror configuration
    pub addon: AddonConfig,

    /// Shared secret for the admin endpoints
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server port (default: 8080)
    pub port: u16,

    /// Bind address (default: 0.0.0.0)
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// TMDB API key (required for the builder path)
    pub tmdb_api_key: Option<String>,

    /// TVDB API key (enables anime episode reconciliation)
    pub tvdb_api_key: Option<String>,

    /// TVDB subscriber pin/user, if the key requires one
    pub tvdb_user: Option<String>,

    /// Fanart.tv API key (enables logo artwork fallback)
    pub fanart_api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Target languages to serve; one cache namespace each
    pub languages: Vec<String>,

    /// Merged-record cache lifetime in hours (default: 12)
    pub meta_ttl_hours: u64,

    /// Translated-text cache lifetime in hours (default: 720 = 30 days)
    pub translation_ttl_hours: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            languages: vec!["it-IT".to_string()],
            meta_ttl_hours: 12,
            translation_ttl_hours: 720,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AddonConfig {
    /// Fetch primary records from the mirror pool instead of building
    /// them from TMDB + Fanart directly (default: false)
    pub use_addon: bool,

    /// Mirror pool; defaults to the public deployments
    pub mirrors: Vec<String>,

    /// Upstream request timeout in seconds (default: 120)
    pub request_timeout_secs: u64,
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            use_addon: false,
            mirrors: DEFAULT_ADDON_MIRRORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            request_timeout_secs: 120,
        }
    }
}

/// Application configuration - combines TOML file with environment overrides
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub bind_address: String,
    pub tmdb_api_key: Option<String>,
    pub tvdb_api_key: Option<String>,
    pub tvdb_user: Option<String>,
    pub fanart_api_key: Option<String>,
    pub admin_password: Option<String>,
    pub languages: Vec<String>,
    pub meta_ttl: Duration,
    pub translation_ttl: Duration,
    pub use_addon: bool,
    pub addon_mirrors: Vec<String>,
    pub request_timeout: Duration,
}

impl AppConfig {
    /// Load configuration from TOML file and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. TOML config file
    /// 3. Default values
    pub fn load() -> Self {
        let config_dir = Self::find_config_dir();
        let config_file = Self::load_config_file(&config_dir);
        Self::build(config_file)
    }

    fn find_config_dir() -> PathBuf {
        if let Ok(path) = std::env::var("META_TRANSLATOR_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join(APP_NAME);
        }
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn load_config_file(config_dir: &std::path::Path) -> ConfigFile {
        let config_path = config_dir.join(CONFIG_FILENAME);

        if !config_path.exists() {
            tracing::debug!(
                "No config file found at {}, using defaults",
                config_path.display()
            );
            return ConfigFile::default();
        }

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to parse config file {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    );
                    ConfigFile::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}. Using defaults.",
                    config_path.display(),
                    e
                );
                ConfigFile::default()
            }
        }
    }

    fn build(config_file: ConfigFile) -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(config_file.server.port);

        let bind_address = std::env::var("META_TRANSLATOR_BIND_ADDRESS")
            .unwrap_or_else(|_| config_file.server.bind_address.clone());

        let tmdb_api_key = std::env::var("TMDB_API_KEY")
            .ok()
            .or(config_file.providers.tmdb_api_key);
        let tvdb_api_key = std::env::var("TVDB_API_KEY")
            .ok()
            .or(config_file.providers.tvdb_api_key);
        let tvdb_user = std::env::var("TVDB_USER")
            .ok()
            .or(config_file.providers.tvdb_user);
        let fanart_api_key = std::env::var("FANART_API_KEY")
            .ok()
            .or(config_file.providers.fanart_api_key);
        let admin_password = std::env::var("ADMIN_PASSWORD")
            .ok()
            .or(config_file.admin_password);

        Self {
            port,
            bind_address,
            tmdb_api_key,
            tvdb_api_key,
            tvdb_user,
            fanart_api_key,
            admin_password,
            languages: config_file.translation.languages,
            meta_ttl: Duration::from_secs(config_file.translation.meta_ttl_hours * 3600),
            translation_ttl: Duration::from_secs(
                config_file.translation.translation_ttl_hours * 3600,
            ),
            use_addon: config_file.addon.use_addon,
            addon_mirrors: config_file.addon.mirrors,
            request_timeout: Duration::from_secs(config_file.addon.request_timeout_secs),
        }
    }

    /// Log configuration status
    pub fn log_config(&self) {
        tracing::info!("Server listening on {}:{}", self.bind_address, self.port);
        tracing::info!("Target languages: {}", self.languages.join(", "));

        if self.use_addon {
            tracing::info!("Primary provider: addon mirror pool ({} mirrors)", self.addon_mirrors.len());
        } else if self.tmdb_api_key.is_some() {
            tracing::info!("Primary provider: TMDB builder");
        } else {
            tracing::warn!("No TMDB API key configured; primary lookups will fail");
            tracing::info!("Hint: Add tmdb_api_key to config.toml or set TMDB_API_KEY env var");
        }

        if self.tvdb_api_key.is_none() {
            tracing::debug!("TVDB disabled (no api key): anime episode reconciliation off");
        }
        if self.fanart_api_key.is_none() {
            tracing::debug!("Fanart.tv disabled (no api key): logo fallback off");
        }
        if self.admin_password.is_none() {
            tracing::warn!("No admin password set; admin endpoints will reject all requests");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_file() {
        let config = ConfigFile::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.translation.languages, vec!["it-IT"]);
        assert_eq!(config.translation.meta_ttl_hours, 12);
        assert_eq!(config.addon.mirrors.len(), 3);
        assert!(!config.addon.use_addon);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
admin_password = "hunter2"

[server]
port = 9000
bind_address = "127.0.0.1"

[providers]
tmdb_api_key = "test_key"
tvdb_api_key = "tvdb_key"

[translation]
languages = ["it-IT", "es-ES"]
meta_ttl_hours = 6

[addon]
use_addon = true
mirrors = ["https://mirror.example"]
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.providers.tmdb_api_key, Some("test_key".to_string()));
        assert_eq!(config.translation.languages.len(), 2);
        assert_eq!(config.translation.meta_ttl_hours, 6);
        assert!(config.addon.use_addon);
        assert_eq!(config.addon.mirrors, vec!["https://mirror.example"]);
        assert_eq!(config.admin_password, Some("hunter2".to_string()));
    }

    #[test]
    fn test_partial_config_toml() {
        // Partial configs work (only specify what you need)
        let toml_str = r#"
[translation]
languages = ["de-DE"]
"#;
        let config: ConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080); // default
        assert_eq!(config.translation.languages, vec!["de-DE"]); // from file
        assert_eq!(config.translation.meta_ttl_hours, 12); // default
    }
}
