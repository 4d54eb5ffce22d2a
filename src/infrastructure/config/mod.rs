mod settings;

pub use settings::{
    ClusterConfig, ConversationConfig, DatabaseConfig, DirectoryConfig, JwtConfig,
    NotificationConfig, OtelConfig, RedisConfig, ServerConfig, Settings, StorageConfig,
    WebSocketConfig,
};
