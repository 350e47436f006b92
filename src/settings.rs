// src/settings.rs

use std::net::SocketAddr;
use std::path::Path;

use clap::Parser;
use config::{builder::DefaultState, ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};

const DEFAULT_ADDR: &str = "127.0.0.1:8000";

#[derive(Parser, Debug)]
#[command(version)]
pub struct Args {
    /// Path to the local configuration TOML file.
    #[arg(short, value_name = "CONFIG_PATH")]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Web {
    #[serde(deserialize_with = "deserialize_socket_addr")]
    pub address: SocketAddr,
    /// Single origin allowed by CORS. Unset permits any origin, which is
    /// acceptable for development only.
    pub allowed_origin: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchSettings {
    pub dimension: usize,
    pub top_k: usize,
    pub min_similarity: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailSettings {
    pub server: String,
    pub port: u16,
    pub sender: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Settings {
    pub web: Web,
    pub database: DatabaseSettings,
    pub search: SearchSettings,
    pub email: EmailSettings,
}

impl Settings {
    /// Load settings with sane defaults, an optional TOML file, and the
    /// recognized `EMAIL_*` environment overrides for the SMTP transport.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::<DefaultState>::default()
            .set_default("web.address", DEFAULT_ADDR)?
            .set_default("database.path", "./megsupport.db")?
            .set_default("search.dimension", 256)?
            .set_default("search.top_k", 5)?
            .set_default("search.min_similarity", 0.5)?
            .set_default("search.timeout_secs", 10)?
            .set_default("email.server", "smtp.gmail.com")?
            .set_default("email.port", 587)?
            .set_default("email.sender", "")?
            .set_default("email.password", "")?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder
            .set_override_option("email.server", std::env::var("EMAIL_SERVER").ok())?
            .set_override_option("email.port", std::env::var("EMAIL_PORT").ok())?
            .set_override_option("email.sender", std::env::var("EMAIL_SENDER").ok())?
            .set_override_option("email.password", std::env::var("EMAIL_PASSWORD").ok())?;

        let cfg = builder.build()?;

        cfg.try_deserialize()
    }
}

fn deserialize_socket_addr<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::Settings;

    // Tests reading or writing `EMAIL_*` serialize through this: the
    // process environment is shared across test threads.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn defaults_apply_without_a_file() {
        let _guard = ENV_LOCK.lock().unwrap();
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.web.address.port(), 8000);
        assert_eq!(settings.search.top_k, 5);
        assert!((settings.search.min_similarity - 0.5).abs() < f32::EPSILON);
        assert_eq!(settings.email.server, "smtp.gmail.com");
        assert_eq!(settings.email.port, 587);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[web]\naddress = \"0.0.0.0:9000\"\n[search]\ntop_k = 3\nmin_similarity = 0.0\n",
        )
        .unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.web.address.port(), 9000);
        assert_eq!(settings.search.top_k, 3);
        assert_eq!(settings.database.path, "./megsupport.db");
    }

    #[test]
    fn email_env_overrides_file_and_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[email]\nserver = \"smtp.fichier.fr\"\nport = 25\n",
        )
        .unwrap();

        std::env::set_var("EMAIL_SERVER", "smtp.example.org");
        std::env::set_var("EMAIL_PORT", "2525");
        let settings = Settings::load(Some(&path));
        std::env::remove_var("EMAIL_SERVER");
        std::env::remove_var("EMAIL_PORT");

        let settings = settings.unwrap();
        assert_eq!(settings.email.server, "smtp.example.org");
        assert_eq!(settings.email.port, 2525);
    }
}
