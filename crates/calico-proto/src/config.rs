use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Live HLS playlist handed to the transport.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,
    /// Now-playing JSON feed.
    #[serde(default = "default_metadata_url")]
    pub metadata_url: String,
    /// Cover image for the current track.  A cache-busting query is appended
    /// on every track change.
    #[serde(default = "default_cover_url")]
    pub cover_url: String,
    /// Base URL of the ratings API (`{ratings_url}/api/ratings`).
    #[serde(default = "default_ratings_url")]
    pub ratings_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Initial output volume, 0.0..=1.0.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// mpv `audio-device`; `None` uses mpv's default output.
    #[serde(default)]
    pub audio_device: Option<String>,
    /// Consecutive network/media recoveries the transport attempts before
    /// reporting the stream as unavailable.
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,
    #[serde(default = "default_listener_id_file")]
    pub listener_id_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Directory served for every path outside `/api`.
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub in_memory: bool,
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            stream_url: default_stream_url(),
            metadata_url: default_metadata_url(),
            cover_url: default_cover_url(),
            ratings_url: default_ratings_url(),
            poll_interval_secs: default_poll_interval_secs(),
            volume: default_volume(),
            audio_device: None,
            max_recovery_attempts: default_max_recovery_attempts(),
            listener_id_file: default_listener_id_file(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            database: DatabaseConfig::default(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            in_memory: false,
            path: default_database_path(),
        }
    }
}

fn default_stream_url() -> String {
    "https://d3d4yli4hf5bmh.cloudfront.net/hls/live.m3u8".to_string()
}

fn default_metadata_url() -> String {
    "https://d3d4yli4hf5bmh.cloudfront.net/metadatav2.json".to_string()
}

fn default_cover_url() -> String {
    "https://d3d4yli4hf5bmh.cloudfront.net/cover.jpg".to_string()
}

fn default_ratings_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_volume() -> f32 {
    0.8
}

fn default_max_recovery_attempts() -> u32 {
    5
}

fn default_listener_id_file() -> PathBuf {
    platform::data_dir().join("listener_id")
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_database_path() -> PathBuf {
    platform::data_dir().join("ratings.db")
}

fn default_static_dir() -> Option<PathBuf> {
    let public = PathBuf::from("public");
    public.is_dir().then_some(public)
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.player.poll_interval_secs, 10);
        assert!(config.player.stream_url.ends_with("live.m3u8"));
        assert_eq!(config.player.ratings_url, "http://127.0.0.1:3000");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert!(!config.server.database.in_memory);
        assert!(config.server.database.path.ends_with("calico/ratings.db"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
[player]
poll_interval_secs = 3
audio_device = "pulse"

[server.database]
in_memory = true
"#,
        )
        .unwrap();
        assert_eq!(config.player.poll_interval_secs, 3);
        assert_eq!(config.player.audio_device.as_deref(), Some("pulse"));
        assert_eq!(config.player.max_recovery_attempts, 5);
        assert!(config.server.database.in_memory);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.player.metadata_url, config.player.metadata_url);
        assert_eq!(back.server.database.path, config.server.database.path);
    }
}
