use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (the caller's identity)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Additional custom claims
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Claims {
    /// Claims for `user_id` valid for `ttl_secs` from now
    pub fn for_user(user_id: impl Into<String>, ttl_secs: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.into(),
            exp: now + ttl_secs,
            iat: now,
            roles: Vec::new(),
            extra: HashMap::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.sub
    }
}
