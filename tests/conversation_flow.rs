//! Conversation and notification flows through the services
//!
//! These tests run against the in-memory backends; no database or Redis
//! is required.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;

use jobboard_messaging::config::Settings;
use jobboard_messaging::conversation::StartConversationRequest;
use jobboard_messaging::directory::{JobSummary, MemoryDirectory, UserProfile};
use jobboard_messaging::error::AppError;
use jobboard_messaging::notification::{NotificationKind, RelatedEntity};
use jobboard_messaging::server::AppState;
use jobboard_messaging::storage::Backends;
use jobboard_messaging::websocket::ServerMessage;

fn user(id: &str, name: &str) -> UserProfile {
    UserProfile {
        id: id.to_string(),
        full_name: name.to_string(),
        avatar: None,
        email: Some(format!("{}@example.com", id)),
        phone: None,
    }
}

/// State with three users and one job
fn create_test_state() -> AppState {
    let directory = Arc::new(MemoryDirectory::new());
    directory.upsert_user(user("u1", "Alice Employer"));
    directory.upsert_user(user("u2", "Bob Candidate"));
    directory.upsert_user(user("u3", "Carol Outsider"));
    directory.upsert_job(JobSummary {
        id: "job-1".to_string(),
        title: "Backend Engineer".to_string(),
        company: Some("Acme".to_string()),
        location: Some("Remote".to_string()),
        status: Some("open".to_string()),
    });

    AppState::from_backends(Settings::with_secret("flow-test-secret"), Backends::memory(directory))
}

fn start(receiver: &str, message: &str, job: Option<&str>) -> StartConversationRequest {
    StartConversationRequest {
        receiver_id: Some(receiver.to_string()),
        message: Some(message.to_string()),
        related_job_id: job.map(str::to_string),
    }
}

mod scenario_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_view_and_reply() {
        let state = create_test_state();

        // U1 starts a conversation with U2
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "hi", None))
            .await
            .unwrap();

        assert!(started.conversation.is_participant("u1"));
        assert!(started.conversation.is_participant("u2"));
        assert_eq!(started.conversation.related_job_id, None);
        assert_eq!(started.conversation.unread_count, 1);
        assert_eq!(started.message.sender_id, "u1");
        assert_eq!(started.message.receiver_id, "u2");
        assert_eq!(started.message.content, "hi");
        assert!(!started.message.read);

        let notifications = state.notifications.list("u2").await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification.kind, NotificationKind::Message);
        assert_eq!(notifications[0].notification.message, "You have a new message from Alice Employer");
        assert_eq!(
            notifications[0].notification.related_entity,
            Some(RelatedEntity::Message(started.message.id))
        );
        assert_eq!(notifications[0].related_details.as_ref().unwrap()["content"], "hi");

        // U2 opens the conversation
        let conversation_id = started.conversation.id;
        let detail = state
            .conversations
            .get_conversation_detail("u2", conversation_id)
            .await
            .unwrap();

        // The response shows what was unread when U2 opened it
        assert_eq!(detail.messages.len(), 1);
        assert!(!detail.messages[0].read);
        assert_eq!(detail.conversation.conversation.unread_count, 1);
        assert_eq!(detail.conversation.participant_profiles.len(), 2);

        let stored = state.conversations.store().messages(conversation_id).await.unwrap();
        assert!(stored[0].read);
        let conversation = state.conversations.store().get(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.unread_count, 0);

        // U1 sends a second message
        let second = state
            .conversations
            .send_message("u1", conversation_id, Some("are you available?".to_string()))
            .await
            .unwrap();

        let conversation = state.conversations.store().get(conversation_id).await.unwrap().unwrap();
        assert_eq!(conversation.unread_count, 1);
        assert_eq!(conversation.last_message_id, Some(second.id));
        assert_eq!(state.notifications.list("u2").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_start_twice_reuses_conversation() {
        let state = create_test_state();

        let first = state
            .conversations
            .start_conversation("u1", start("u2", "hi", Some("job-1")))
            .await
            .unwrap();
        let second = state
            .conversations
            .start_conversation("u2", start("u1", "hello back", Some("job-1")))
            .await
            .unwrap();

        assert_eq!(first.conversation.id, second.conversation.id);
        assert_eq!(state.conversations.store().list_for_user("u1").await.unwrap().len(), 1);

        // A different job is a different conversation
        let other = state
            .conversations
            .start_conversation("u1", start("u2", "about the other role", None))
            .await
            .unwrap();
        assert_ne!(other.conversation.id, first.conversation.id);
    }

    #[tokio::test]
    async fn test_empty_job_reference_matches_absent() {
        let state = create_test_state();

        let first = state
            .conversations
            .start_conversation("u1", start("u2", "hi", None))
            .await
            .unwrap();
        let second = state
            .conversations
            .start_conversation("u1", start("u2", "again", Some("")))
            .await
            .unwrap();

        assert_eq!(first.conversation.id, second.conversation.id);
    }

    #[tokio::test]
    async fn test_messages_ordered_and_pointer_tracks_last() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "m1", None))
            .await
            .unwrap();
        let id = started.conversation.id;

        let mut last = started.message.id;
        for n in 2..=5 {
            let sender = if n % 2 == 0 { "u2" } else { "u1" };
            last = state
                .conversations
                .send_message(sender, id, Some(format!("m{}", n)))
                .await
                .unwrap()
                .id;
        }

        let messages = state.conversations.store().messages(id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2", "m3", "m4", "m5"]);
        assert!(messages.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let conversation = state.conversations.store().get(id).await.unwrap().unwrap();
        assert_eq!(conversation.last_message_id, Some(last));
    }

    #[tokio::test]
    async fn test_view_marks_only_incoming_messages() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "from alice", None))
            .await
            .unwrap();
        let id = started.conversation.id;
        state
            .conversations
            .send_message("u2", id, Some("from bob".to_string()))
            .await
            .unwrap();

        state.conversations.get_conversation_detail("u2", id).await.unwrap();

        let messages = state.conversations.store().messages(id).await.unwrap();
        let from_alice = messages.iter().find(|m| m.sender_id == "u1").unwrap();
        let from_bob = messages.iter().find(|m| m.sender_id == "u2").unwrap();
        assert!(from_alice.read);
        assert!(!from_bob.read);

        // A second view sees the flags the first one set
        let again = state.conversations.get_conversation_detail("u2", id).await.unwrap();
        assert_eq!(again.conversation.conversation.unread_count, 0);
        assert!(again.messages.iter().find(|m| m.sender_id == "u1").unwrap().read);
    }

    #[tokio::test]
    async fn test_list_shows_counterpart_and_job() {
        let state = create_test_state();
        state
            .conversations
            .start_conversation("u1", start("u2", "hi", Some("job-1")))
            .await
            .unwrap();

        let list = state.conversations.list_conversations("u2").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].counterpart_id, "u1");
        assert_eq!(list[0].counterpart.as_ref().unwrap().full_name, "Alice Employer");
        assert_eq!(list[0].related_job.as_ref().unwrap().title, "Backend Engineer");
        assert_eq!(list[0].last_message.as_ref().unwrap().content, "hi");

        assert!(state.conversations.list_conversations("u3").await.unwrap().is_empty());
    }
}

mod failure_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_fields_are_validation_errors() {
        let state = create_test_state();

        let no_receiver = StartConversationRequest {
            receiver_id: None,
            message: Some("hi".into()),
            related_job_id: None,
        };
        assert!(matches!(
            state.conversations.start_conversation("u1", no_receiver).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            state.conversations.start_conversation("u1", start("u2", "   ", None)).await,
            Err(AppError::Validation(_))
        ));

        assert!(matches!(
            state.conversations.start_conversation("u1", start("u1", "me", None)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_receiver_not_found() {
        let state = create_test_state();
        let result = state
            .conversations
            .start_conversation("u1", start("ghost", "hi", None))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(state.conversations.store().list_for_user("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_participant_forbidden() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "private", None))
            .await
            .unwrap();
        let id = started.conversation.id;

        assert!(matches!(
            state.conversations.get_conversation_detail("u3", id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            state.conversations.send_message("u3", id, Some("let me in".into())).await,
            Err(AppError::Forbidden(_))
        ));

        // The failed view must not reset the counter
        let conversation = state.conversations.store().get(id).await.unwrap().unwrap();
        assert_eq!(conversation.unread_count, 1);
    }

    #[tokio::test]
    async fn test_unknown_conversation_not_found() {
        let state = create_test_state();
        let missing = uuid::Uuid::new_v4();

        assert!(matches!(
            state.conversations.get_conversation_detail("u1", missing).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            state.conversations.send_message("u1", missing, Some("hi".into())).await,
            Err(AppError::NotFound(_))
        ));
    }
}

mod notification_tests {
    use super::*;

    #[tokio::test]
    async fn test_recipient_only_mutations() {
        let state = create_test_state();
        state
            .conversations
            .start_conversation("u1", start("u2", "hi", None))
            .await
            .unwrap();
        let id = state.notifications.list("u2").await.unwrap()[0].notification.id;

        assert!(matches!(
            state.notifications.mark_read("u1", id).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            state.notifications.delete("u3", id).await,
            Err(AppError::Forbidden(_))
        ));

        let read = state.notifications.mark_read("u2", id).await.unwrap();
        assert!(read.read);

        state.notifications.delete("u2", id).await.unwrap();
        assert!(state.notifications.list("u2").await.unwrap().is_empty());
        assert!(matches!(
            state.notifications.delete("u2", id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mark_all_read_scoped_to_caller() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "one", None))
            .await
            .unwrap();
        state
            .conversations
            .send_message("u1", started.conversation.id, Some("two".into()))
            .await
            .unwrap();
        state
            .conversations
            .send_message("u2", started.conversation.id, Some("reply".into()))
            .await
            .unwrap();

        let updated = state.notifications.mark_all_read("u2").await.unwrap();
        assert_eq!(updated, 2);

        assert!(state
            .notifications
            .list("u2")
            .await
            .unwrap()
            .iter()
            .all(|n| n.notification.read));
        assert!(state
            .notifications
            .list("u1")
            .await
            .unwrap()
            .iter()
            .all(|n| !n.notification.read));

        // Nothing left to flip
        assert_eq!(state.notifications.mark_all_read("u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "first", None))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        state
            .conversations
            .send_message("u1", started.conversation.id, Some("second".into()))
            .await
            .unwrap();

        let list = state.notifications.list("u2").await.unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].notification.created_at >= list[1].notification.created_at);
        assert_eq!(list[0].related_details.as_ref().unwrap()["content"], "second");
    }

    #[tokio::test]
    async fn test_send_pushes_to_live_recipient() {
        let state = create_test_state();
        let (tx, mut rx) = mpsc::channel(8);
        let session = state.connection_manager.register(Some("u2".into()), tx);
        state.connection_manager.join(session.id, "u2");

        state
            .conversations
            .start_conversation("u1", start("u2", "ping", None))
            .await
            .unwrap();

        match rx.try_recv() {
            Ok(ServerMessage::NewNotification(payload)) => {
                assert_eq!(payload["type"], "message");
                assert_eq!(payload["recipientId"], "u2");
            }
            other => panic!("expected newNotification, got {:?}", other),
        }
        assert_eq!(state.fanout.stats().pushes_delivered, 1);
    }

    #[tokio::test]
    async fn test_offline_recipient_still_gets_persisted_notification() {
        let state = create_test_state();

        state
            .conversations
            .start_conversation("u1", start("u2", "hello?", None))
            .await
            .unwrap();

        assert_eq!(state.notifications.list("u2").await.unwrap().len(), 1);
        assert_eq!(state.fanout.stats().pushes_offline, 1);
        assert_eq!(state.fanout.stats().pushes_delivered, 0);
    }
}

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_starts_create_one_conversation() {
        let state = create_test_state();

        let attempts = (0..16).map(|n| {
            let conversations = state.conversations.clone();
            let (caller, receiver) = if n % 2 == 0 { ("u1", "u2") } else { ("u2", "u1") };
            tokio::spawn(async move {
                conversations
                    .start_conversation(caller, start(receiver, &format!("hello {}", n), Some("job-1")))
                    .await
            })
        });

        let results = join_all(attempts).await;
        let ids: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap().conversation.id)
            .collect();

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(state.conversations.store().list_for_user("u1").await.unwrap().len(), 1);
        assert_eq!(state.conversations.store().messages(ids[0]).await.unwrap().len(), 16);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_sends_keep_every_increment() {
        let state = create_test_state();
        let started = state
            .conversations
            .start_conversation("u1", start("u2", "start", None))
            .await
            .unwrap();
        let id = started.conversation.id;

        let sends = (0..20).map(|n| {
            let conversations = state.conversations.clone();
            tokio::spawn(async move {
                conversations
                    .send_message("u1", id, Some(format!("burst {}", n)))
                    .await
            })
        });

        for result in join_all(sends).await {
            result.unwrap().unwrap();
        }

        let conversation = state.conversations.store().get(id).await.unwrap().unwrap();
        assert_eq!(conversation.unread_count, 21);
        assert_eq!(state.conversations.store().messages(id).await.unwrap().len(), 21);
        assert_eq!(state.notifications.list("u2").await.unwrap().len(), 21);
    }
}
