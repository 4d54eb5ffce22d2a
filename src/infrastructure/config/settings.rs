use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum accepted request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
    /// Apply bundled migrations on startup
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterConfig {
    /// Relay room pushes to other nodes through Redis pub/sub
    #[serde(default)]
    pub enabled: bool,
    /// Identifier of this node; generated when empty
    #[serde(default)]
    pub server_id: String,
    #[serde(default = "default_routing_channel")]
    pub routing_channel: String,
    /// Upper bound on one publish; a slower Redis drops the cross-node copy
    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    /// Heartbeat interval in seconds (server sends heartbeat frame)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
    /// Session timeout in seconds (disconnect if no activity)
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Outbound frames buffered per session before pushes are dropped
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer: usize,
    /// Accept sessions without a token (open join/relay protocol)
    #[serde(default)]
    pub allow_anonymous: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversationConfig {
    /// Re-fetch attempts after losing a concurrent create race
    #[serde(default = "default_max_create_retries")]
    pub max_create_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    /// Text of the new-message notification; `{sender}` is replaced by the display name
    #[serde(default = "default_message_template")]
    pub message_template: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    /// JSON file with `users` and `jobs` used by the in-memory directory
    pub seed_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
    /// Emit log lines as JSON objects instead of human-readable text
    #[serde(default)]
    pub json_logs: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_body_limit() -> usize {
    64 * 1024
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_database_url() -> String {
    "postgres://localhost:5432/jobboard".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300
}

fn default_true() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_routing_channel() -> String {
    "jobboard:realtime:route".to_string()
}

fn default_publish_timeout_ms() -> u64 {
    250
}

fn default_heartbeat_interval() -> u64 {
    30 // 30 seconds
}

fn default_connection_timeout() -> u64 {
    120 // 2 minutes
}

fn default_channel_buffer() -> usize {
    32
}

fn default_max_create_retries() -> u32 {
    3
}

fn default_message_template() -> String {
    "You have a new message from {sender}".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "jobboard-messaging".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 5000)?
            .set_default("storage.backend", "memory")?
            .set_default("websocket.heartbeat_interval", 30)?
            .set_default("websocket.connection_timeout", 120)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // SERVER_PORT, JWT_SECRET, STORAGE_BACKEND, DATABASE_URL, ...
            .add_source(
                Environment::default()
                    .separator("_")
                    .try_parsing(true)
                    .list_separator(","),
            );

        builder.build()?.try_deserialize()
    }

    /// Settings suitable for tests and local runs: in-memory storage, no cluster.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::default(),
            jwt: JwtConfig {
                secret: secret.into(),
                issuer: None,
                audience: None,
            },
            storage: StorageConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            cluster: ClusterConfig::default(),
            websocket: WebSocketConfig::default(),
            conversation: ConversationConfig::default(),
            notification: NotificationConfig::default(),
            directory: DirectoryConfig::default(),
            otel: OtelConfig::default(),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn uses_postgres(&self) -> bool {
        self.storage.backend.eq_ignore_ascii_case("postgres")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
            run_migrations: true,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_id: String::new(),
            routing_channel: default_routing_channel(),
            publish_timeout_ms: default_publish_timeout_ms(),
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: default_heartbeat_interval(),
            connection_timeout: default_connection_timeout(),
            channel_buffer: default_channel_buffer(),
            allow_anonymous: false,
        }
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_create_retries: default_max_create_retries(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            message_template: default_message_template(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
            json_logs: false,
        }
    }
}
