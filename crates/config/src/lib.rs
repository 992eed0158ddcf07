use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Process-wide settings, loaded once at startup and read-only after.
///
/// Layering: `config/default.toml` (optional) first, then environment
/// variables prefixed with `HUDDLE` (double underscore as section
/// separator, e.g. `HUDDLE__REDIS__URL`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub mongo: MongoSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub encryption: EncryptionSettings,
    #[serde(default)]
    pub uploads: UploadSettings,
    #[serde(default)]
    pub turn: TurnSettings,
    #[serde(default)]
    pub video: VideoSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used to build join links.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoSettings {
    #[serde(default = "default_mongo_url")]
    pub url: String,
    #[serde(default = "default_mongo_db")]
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisSettings {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthSettings {
    /// HS256 secret for verifying access tokens minted by the identity
    /// service. Token issuing lives outside this engine.
    #[serde(default)]
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EncryptionSettings {
    /// Base64-encoded 32-byte AES-256-GCM key for chat payloads at
    /// rest. Mandatory: startup fails when missing or malformed, so a
    /// restart can never silently orphan existing ciphertext.
    #[serde(default)]
    pub message_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    #[serde(default = "default_upload_dir")]
    pub dir: String,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TurnSettings {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// When set, per-user time-limited credentials are derived via
    /// HMAC-SHA1 instead of the static username/password pair.
    pub shared_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoSettings {
    #[serde(default = "default_max_participants")]
    pub max_participants: u32,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::with_prefix("HUDDLE").separator("__"))
            .build()?
            .try_deserialize()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for MongoSettings {
    fn default() -> Self {
        Self {
            url: default_mongo_url(),
            database: default_mongo_db(),
        }
    }
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            max_participants: default_max_participants(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_mongo_url() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_mongo_db() -> String {
    "huddle".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_upload_dir() -> String {
    "/tmp/huddle-uploads".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

fn default_allowed_extensions() -> Vec<String> {
    [
        "png", "jpg", "jpeg", "gif", "svg", "pdf", "txt", "md", "csv", "json", "zip",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_max_participants() -> u32 {
    16
}
