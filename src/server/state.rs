use std::sync::Arc;
use std::time::Instant;

use axum::extract::FromRef;

use crate::auth::JwtValidator;
use crate::cluster::{ClusterRelay, ClusterRouter};
use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::conversation::ConversationService;
use crate::error::AppError;
use crate::notification::{NotificationFanout, NotificationService, RelatedEntityResolver};
use crate::storage::{create_backends, Backends};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub connection_manager: Arc<ConnectionManager>,
    pub router: Arc<ClusterRouter>,
    pub fanout: Arc<NotificationFanout>,
    pub conversations: Arc<ConversationService>,
    pub notifications: Arc<NotificationService>,
    /// Storage backend identifier ("memory" or "postgres")
    pub storage_backend: &'static str,
    pub start_time: Instant,
}

impl AppState {
    /// Build the state from settings: storage backends first, then the
    /// cluster relay when `cluster.enabled` is set.
    pub async fn new(settings: Settings) -> Result<Self, AppError> {
        let backends = create_backends(&settings).await?;

        let relay = if settings.cluster.enabled {
            Some(Arc::new(ClusterRelay::connect(&settings.redis, &settings.cluster).await?))
        } else {
            None
        };

        Ok(Self::assemble(settings, backends, relay))
    }

    /// Single-instance state over already-built backends
    pub fn from_backends(settings: Settings, backends: Backends) -> Self {
        Self::assemble(settings, backends, None)
    }

    fn assemble(settings: Settings, backends: Backends, relay: Option<Arc<ClusterRelay>>) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let connection_manager = Arc::new(ConnectionManager::new());

        let router = Arc::new(match relay {
            Some(relay) => ClusterRouter::with_relay(connection_manager.clone(), relay),
            None => ClusterRouter::local(connection_manager.clone()),
        });

        let fanout = Arc::new(NotificationFanout::new(
            backends.notifications.clone(),
            router.clone(),
            settings.notification.message_template.clone(),
        ));

        let conversations = Arc::new(ConversationService::new(
            backends.conversations.clone(),
            backends.identity.clone(),
            backends.jobs.clone(),
            fanout.clone(),
            settings.conversation.max_create_retries,
        ));

        let resolver = RelatedEntityResolver::with_defaults(backends.jobs.clone(), backends.conversations.clone());
        let notifications = Arc::new(NotificationService::new(backends.notifications.clone(), resolver));

        tracing::info!(
            storage_backend = backends.name(),
            clustered = router.relay().is_some(),
            "Application state initialized"
        );

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            connection_manager,
            router,
            fanout,
            conversations,
            notifications,
            storage_backend: backends.name(),
            start_time: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<JwtValidator> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_validator.clone()
    }
}
