use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use uuid::Uuid;

use crate::directory::{IdentityDirectory, JobDirectory, JobSummary};
use crate::error::AppError;
use crate::metrics::ConversationMetrics;
use crate::notification::NotificationFanout;
use crate::storage::StoreError;

use super::store::ConversationStore;
use super::{
    Conversation, ConversationDetail, ConversationSummary, ConversationView, DedupKey, Message,
    MessageDraft, MessagePreview, ParticipantPair, StartedConversation,
};

/// Body of `POST /conversations`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub receiver_id: Option<String>,
    pub message: Option<String>,
    pub related_job_id: Option<String>,
}

/// Body of `POST /conversations/{id}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendMessageRequest {
    pub content: Option<String>,
}

/// Conversation use-cases. Every operation takes the already-resolved caller identity.
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
    identity: Arc<dyn IdentityDirectory>,
    jobs: Arc<dyn JobDirectory>,
    fanout: Arc<NotificationFanout>,
    max_create_retries: u32,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        identity: Arc<dyn IdentityDirectory>,
        jobs: Arc<dyn JobDirectory>,
        fanout: Arc<NotificationFanout>,
        max_create_retries: u32,
    ) -> Self {
        Self {
            store,
            identity,
            jobs,
            fanout,
            max_create_retries,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Conversations of `caller`, most recently updated first
    #[tracing::instrument(name = "conversation.list", skip(self))]
    pub async fn list_conversations(&self, caller: &str) -> Result<Vec<ConversationSummary>, AppError> {
        let conversations = self.store.list_for_user(caller).await?;
        let mut summaries = Vec::with_capacity(conversations.len());

        for conversation in conversations {
            let counterpart_id = conversation
                .participants
                .counterpart(caller)
                .unwrap_or_default()
                .to_string();

            let counterpart = self
                .identity
                .find_user(&counterpart_id)
                .await?
                .map(|profile| profile.public());

            let last_message = match conversation.last_message_id {
                Some(id) => self
                    .store
                    .get_message(id)
                    .await?
                    .as_ref()
                    .map(MessagePreview::from),
                None => None,
            };

            summaries.push(ConversationSummary {
                id: conversation.id,
                counterpart_id,
                counterpart,
                related_job: self.related_job(&conversation).await?,
                last_message,
                unread_count: conversation.unread_count,
                created_at: conversation.created_at,
                updated_at: conversation.updated_at,
            });
        }

        Ok(summaries)
    }

    /// Conversation with its messages as they were when opened; marks every
    /// message not sent by `caller` as read and resets the unread counter.
    #[tracing::instrument(name = "conversation.detail", skip(self), fields(conversation_id = %conversation_id))]
    pub async fn get_conversation_detail(
        &self,
        caller: &str,
        conversation_id: Uuid,
    ) -> Result<ConversationDetail, AppError> {
        let conversation = self.load_for_participant(caller, conversation_id).await?;

        let (conversation, messages) = self
            .store
            .mark_read(conversation.id, caller)
            .await
            .map_err(not_found_if_missing)?;

        let mut participant_profiles = Vec::with_capacity(2);
        for user_id in conversation.participants.iter() {
            if let Some(profile) = self.identity.find_user(user_id).await? {
                participant_profiles.push(profile.public());
            }
        }
        let related_job = self.related_job(&conversation).await?;

        Ok(ConversationDetail {
            conversation: ConversationView {
                conversation,
                participant_profiles,
                related_job,
            },
            messages,
        })
    }

    /// Find or create the conversation for (caller, receiver, job) and append
    /// the first message of this exchange.
    #[tracing::instrument(name = "conversation.start", skip(self, request))]
    pub async fn start_conversation(
        &self,
        caller: &str,
        request: StartConversationRequest,
    ) -> Result<StartedConversation, AppError> {
        let receiver_id = required(request.receiver_id, "Receiver ID is required")?;
        let content = required(request.message, "Message content is required")?;

        let pair = ParticipantPair::new(caller, receiver_id.as_str())
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.identity.find_user(&receiver_id).await?.is_none() {
            return Err(AppError::NotFound("Receiver not found".to_string()));
        }

        let key = DedupKey::new(pair, request.related_job_id);
        let conversation = self.find_or_create(&key).await?;

        let draft = MessageDraft {
            sender_id: caller.to_string(),
            receiver_id,
            content,
            related_job_id: key.job_id.clone(),
        };
        let (message, conversation) = self.append(conversation.id, draft).await?;

        Ok(StartedConversation {
            conversation,
            message,
        })
    }

    /// Append a message from `caller` to the counterpart
    #[tracing::instrument(name = "conversation.send", skip(self, content), fields(conversation_id = %conversation_id))]
    pub async fn send_message(
        &self,
        caller: &str,
        conversation_id: Uuid,
        content: Option<String>,
    ) -> Result<Message, AppError> {
        let content = required(content, "Message content is required")?;
        let conversation = self.load_for_participant(caller, conversation_id).await?;

        let receiver_id = conversation
            .participants
            .counterpart(caller)
            .ok_or_else(|| AppError::Forbidden("Not a participant of this conversation".to_string()))?
            .to_string();

        let draft = MessageDraft {
            sender_id: caller.to_string(),
            receiver_id,
            content,
            related_job_id: conversation.related_job_id.clone(),
        };
        let (message, _) = self.append(conversation.id, draft).await?;

        Ok(message)
    }

    async fn load_for_participant(
        &self,
        caller: &str,
        conversation_id: Uuid,
    ) -> Result<Conversation, AppError> {
        let conversation = self
            .store
            .get(conversation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))?;

        if !conversation.is_participant(caller) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".to_string(),
            ));
        }

        Ok(conversation)
    }

    /// Reuse the conversation for `key` or create it. A losing concurrent
    /// insert re-fetches the winner instead of surfacing the conflict.
    async fn find_or_create(&self, key: &DedupKey) -> Result<Conversation, AppError> {
        for attempt in 0..=self.max_create_retries {
            if let Some(existing) = self.store.find_by_key(key).await? {
                return Ok(existing);
            }

            match self.store.insert(key).await {
                Ok(created) => {
                    ConversationMetrics::record_created();
                    tracing::info!(
                        conversation_id = %created.id,
                        job_id = ?created.related_job_id,
                        "Conversation created"
                    );
                    return Ok(created);
                }
                Err(e) if e.is_conflict() => {
                    ConversationMetrics::record_conflict();
                    tracing::debug!(attempt = attempt, "Concurrent conversation creation, re-fetching");
                    if attempt < self.max_create_retries {
                        let jitter_ms = rand::rng().random_range(1..=10);
                        tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store.find_by_key(key).await?.ok_or_else(|| {
            AppError::Internal("Conversation could not be created after repeated conflicts".to_string())
        })
    }

    async fn append(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> Result<(Message, Conversation), AppError> {
        let sender_id = draft.sender_id.clone();
        let (message, conversation) = self
            .store
            .append_message(conversation_id, draft)
            .await
            .map_err(not_found_if_missing)?;

        ConversationMetrics::record_message_appended();
        tracing::debug!(
            conversation_id = %conversation_id,
            message_id = %message.id,
            unread_count = conversation.unread_count,
            "Message appended"
        );

        let sender_name = self.identity.display_name(&sender_id).await?;
        self.fanout
            .message_received(&message.receiver_id, &sender_name, &message)
            .await?;

        Ok((message, conversation))
    }

    async fn related_job(&self, conversation: &Conversation) -> Result<Option<JobSummary>, AppError> {
        match conversation.related_job_id {
            Some(ref job_id) => Ok(self.jobs.find_job(job_id).await?),
            None => Ok(None),
        }
    }
}

/// Treat absent and whitespace-only values as missing
fn required(value: Option<String>, message: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(message.to_string()))
}

fn not_found_if_missing(error: StoreError) -> AppError {
    match error {
        StoreError::MissingConversation(_) => AppError::NotFound("Conversation not found".to_string()),
        other => other.into(),
    }
}
