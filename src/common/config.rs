use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use crate::common::error::{AttendanceError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "configs/attendance.toml";
const DEV_SESSION_SECRET: &str = "dev_key_for_testing";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub roster: RosterConfig,
    #[serde(default)]
    pub sms: SmsConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_session_secret")]
    pub session_secret: String,
}

fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5000 }
fn default_session_secret() -> String { DEV_SESSION_SECRET.to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_secret: default_session_secret(),
        }
    }
}

/// Directory overrides. Anything left unset is derived from the data root.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub faces_dir: Option<PathBuf>,
    #[serde(default)]
    pub recognized_dir: Option<PathBuf>,
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_file")]
    pub file: String,
    #[serde(default)]
    pub reset_on_start: bool,
}

fn default_db_file() -> String { "attendance.db".to_string() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            file: default_db_file(),
            reset_on_start: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RosterConfig {
    #[serde(default = "default_students")]
    pub students: Vec<String>,
}

fn default_students() -> Vec<String> {
    ["Tanish", "Yuvraj", "Vishal", "Suraj", "Sanyam"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self { students: default_students() }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SmsConfig {
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub from_number: Option<String>,
    #[serde(default = "default_institution")]
    pub institution: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_institution() -> String { "Lachoo College".to_string() }
fn default_api_base() -> String { "https://api.twilio.com".to_string() }

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            institution: default_institution(),
            api_base: default_api_base(),
        }
    }
}

impl Config {
    /// Loads `configs/attendance.toml` when present, built-in defaults otherwise.
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        let mut config = if path.exists() {
            Self::read_file(path)?
        } else {
            tracing::info!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
            Config::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AttendanceError::Config(format!(
                "Config file not found: {}", path.display()
            )));
        }

        let mut config = Self::read_file(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        tracing::info!("Loading config from: {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| AttendanceError::Config(format!("Config parse error: {}", e)))
    }

    /// Secrets and the port may come from the environment instead of the file.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var("SESSION_SECRET") {
            self.server.session_secret = secret;
        }
        if let Ok(port) = std::env::var("ROLLCALL_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => tracing::warn!("Invalid ROLLCALL_PORT value {}: {}", port, e),
            }
        }
        if let Ok(sid) = std::env::var("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = Some(sid);
        }
        if let Ok(token) = std::env::var("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = Some(token);
        }
        if let Ok(from) = std::env::var("TWILIO_PHONE_NUMBER") {
            self.sms.from_number = Some(from);
        }

        if self.server.session_secret == DEV_SESSION_SECRET {
            tracing::warn!("SESSION_SECRET not set, using the development key");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AttendanceError::Config("Server port must be non-zero".into()));
        }
        if self.server.session_secret.is_empty() {
            return Err(AttendanceError::Config("Session secret must not be empty".into()));
        }

        if self.roster.students.is_empty() {
            return Err(AttendanceError::Config("Roster must name at least one student".into()));
        }
        let mut seen = HashSet::new();
        for name in &self.roster.students {
            if name.trim().is_empty() {
                return Err(AttendanceError::Config("Roster contains an empty name".into()));
            }
            // Names become directory names on disk
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(AttendanceError::Config(format!(
                    "Roster name is not a valid folder name: {}", name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(AttendanceError::Config(format!(
                    "Duplicate roster name: {}", name
                )));
            }
        }

        if self.database.file.is_empty() {
            return Err(AttendanceError::Config("Database file name must not be empty".into()));
        }

        Ok(())
    }
}
