//! System Module
//!
//! Configuration management. Settings come from an optional `settings.toml`
//! next to the binary, overlaid by `FILEBOT__*` environment variables.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use std::path::{Path, PathBuf};

/// Complete bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Telegram bot token
    pub token: String,
    /// Users allowed to run moderation commands
    #[serde(default)]
    pub admins: Vec<u64>,
    /// Initial contents of the banned-user set
    #[serde(default)]
    pub banned_users: Vec<u64>,
    pub inline: InlineSettings,
    #[serde(default)]
    pub index: IndexSettings,
}

/// Inline search behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct InlineSettings {
    /// When non-empty, only these users may search
    #[serde(default)]
    pub auth_users: Vec<u64>,
    /// Channel users must be subscribed to
    #[serde(default)]
    pub auth_channel: Option<i64>,
    /// Seconds Telegram may cache an answer
    #[serde(default = "default_cache_time")]
    pub cache_time: u32,
    /// Answer every query with `cache_time = 0`
    #[serde(default)]
    pub force_fresh_cache: bool,
    /// Template with `{file_name}`, `{file_size}` and `{file_caption}`
    #[serde(default)]
    pub custom_file_caption: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Match the search term against captions as well as file names
    #[serde(default = "default_true")]
    pub use_caption_filter: bool,
    #[serde(default = "default_channel_button_text")]
    pub channel_button_text: String,
    pub channel_url: String,
    #[serde(default = "default_access_denied_text")]
    pub access_denied_text: String,
    #[serde(default = "default_access_denied_param")]
    pub access_denied_param: String,
    #[serde(default = "default_subscribe_text")]
    pub subscribe_text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    Memory,
    #[default]
    Sqlite,
}

/// File index backend selection
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub backend: IndexBackend,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// JSON array of file records loaded at start-up
    #[serde(default)]
    pub seed_file: Option<PathBuf>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            database_url: default_database_url(),
            seed_file: None,
        }
    }
}

fn default_cache_time() -> u32 {
    300
}

fn default_max_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_channel_button_text() -> String {
    "📚 Join our channel 📚".to_string()
}

fn default_access_denied_text() -> String {
    "You are not allowed to use this bot".to_string()
}

fn default_access_denied_param() -> String {
    "denied".to_string()
}

fn default_subscribe_text() -> String {
    "You have to subscribe my channel to use the bot".to_string()
}

fn default_database_url() -> String {
    "sqlite://files.sqlite".to_string()
}

/// Loads configuration from settings.toml and the environment
///
/// # Returns
/// * `Result<Settings, ConfigError>` - Parsed settings or error
pub fn get_config() -> Result<Settings, ConfigError> {
    Config::builder()
        .add_source(
            File::from(Path::new("./settings.toml"))
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix("FILEBOT")
                .separator("__")
                .try_parsing(true)
                .list_separator(" ")
                .with_list_parse_key("admins")
                .with_list_parse_key("banned_users")
                .with_list_parse_key("inline.auth_users"),
        )
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let settings = parse(
            r#"
            token = "123:abc"

            [inline]
            channel_url = "https://t.me/example"
            "#,
        )
        .unwrap();

        assert!(settings.admins.is_empty());
        assert!(settings.inline.auth_users.is_empty());
        assert_eq!(settings.inline.auth_channel, None);
        assert_eq!(settings.inline.cache_time, 300);
        assert!(!settings.inline.force_fresh_cache);
        assert_eq!(settings.inline.max_results, 10);
        assert!(settings.inline.use_caption_filter);
        assert_eq!(settings.index.backend, IndexBackend::Sqlite);
        assert_eq!(settings.index.database_url, "sqlite://files.sqlite");
    }

    #[test]
    fn test_explicit_values() {
        let settings = parse(
            r#"
            token = "123:abc"
            admins = [1]
            banned_users = [7, 8]

            [inline]
            auth_users = [10, 11]
            auth_channel = -1001234
            cache_time = 60
            force_fresh_cache = true
            custom_file_caption = "{file_name}"
            channel_url = "https://t.me/example"

            [index]
            backend = "memory"
            seed_file = "files.json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.banned_users, vec![7, 8]);
        assert_eq!(settings.inline.auth_users, vec![10, 11]);
        assert_eq!(settings.inline.auth_channel, Some(-1001234));
        assert_eq!(settings.inline.cache_time, 60);
        assert!(settings.inline.force_fresh_cache);
        assert_eq!(settings.inline.custom_file_caption.as_deref(), Some("{file_name}"));
        assert_eq!(settings.index.backend, IndexBackend::Memory);
        assert_eq!(settings.index.seed_file, Some(PathBuf::from("files.json")));
    }

    #[test]
    fn test_channel_url_is_required() {
        let result = parse(
            r#"
            token = "123:abc"
            [inline]
            "#,
        );
        assert!(result.is_err());
    }
}
