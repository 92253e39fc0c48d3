//! Subject dispatch.
//!
//! Maps each bus subject to its handler. Handlers see the bus only
//! through the [`BusMessage`] trait, so they run under tests without a
//! broker. Mutating handlers reply with the three ASCII bytes `OK` when
//! the message carries a reply inbox; errors are returned to the caller,
//! which surfaces them to the bus for redelivery.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use relsync_server::{CheckService, EventService, HandlerError};
use relsync_storage::{KvBucket, RelationClient, StoreAdapter};

use crate::resources::{artifact, committee, groupsio, meeting, past_meeting, project};
use crate::subjects;

/// Reply sent for every successfully handled mutating event.
pub const REPLY_OK: &[u8] = b"OK";

/// A message received from the bus.
#[async_trait]
pub trait BusMessage: Send + Sync {
    fn subject(&self) -> &str;
    fn payload(&self) -> &[u8];
    /// Reply inbox, when the producer expects a response.
    fn reply(&self) -> Option<&str>;
    async fn respond(&self, data: &[u8]) -> Result<(), DispatchError>;
}

/// Errors surfaced back to the bus consumer loop.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no handler for subject {subject:?}")]
    UnknownSubject { subject: String },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("failed to send reply: {message}")]
    Reply { message: String },
}

/// Routes bus messages to the event and check services.
pub struct Dispatcher<C, K> {
    events: EventService<C, K>,
    checks: CheckService<C, K>,
}

impl<C, K> Dispatcher<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Creates a dispatcher over a shared store adapter.
    pub fn new(store: Arc<StoreAdapter<C, K>>) -> Self {
        Self {
            events: EventService::new(Arc::clone(&store)),
            checks: CheckService::new(store),
        }
    }

    /// Handles one bus message end to end, including the reply.
    pub async fn dispatch(&self, message: &dyn BusMessage) -> Result<(), DispatchError> {
        let subject = message.subject();

        if subject == subjects::ACCESS_CHECK_REQUEST {
            let response = self.checks.handle(message.payload()).await?;
            if message.reply().is_some() {
                message.respond(&response).await?;
            }
            return Ok(());
        }

        self.dispatch_mutation(subject, message.payload()).await?;

        if message.reply().is_some() {
            message.respond(REPLY_OK).await?;
            info!(subject, "sent OK reply");
        }
        Ok(())
    }

    async fn dispatch_mutation(&self, subject: &str, payload: &[u8]) -> Result<(), DispatchError> {
        let events = &self.events;
        match subject {
            subjects::UPDATE_ACCESS => events.update_access(payload).await?,
            subjects::DELETE_ACCESS => events.delete_access(payload).await?,
            subjects::MEMBER_PUT => events.member_put(payload).await?,
            subjects::MEMBER_REMOVE => events.member_remove(payload).await?,

            subjects::PROJECT_UPDATE_ACCESS => project::update_access(events, payload).await?,
            subjects::PROJECT_DELETE_ALL_ACCESS => {
                project::delete_all_access(events, payload).await?
            }

            subjects::COMMITTEE_UPDATE_ACCESS => committee::update_access(events, payload).await?,
            subjects::COMMITTEE_DELETE_ALL_ACCESS => {
                committee::delete_all_access(events, payload).await?
            }
            subjects::COMMITTEE_MEMBER_PUT => committee::member_put(events, payload).await?,
            subjects::COMMITTEE_MEMBER_REMOVE => committee::member_remove(events, payload).await?,

            subjects::MEETING_UPDATE_ACCESS => meeting::update_access(events, payload).await?,
            subjects::MEETING_DELETE_ALL_ACCESS => {
                meeting::delete_all_access(events, payload).await?
            }
            subjects::MEETING_REGISTRANT_PUT => meeting::registrant_put(events, payload).await?,
            subjects::MEETING_REGISTRANT_REMOVE => {
                meeting::registrant_remove(events, payload).await?
            }
            subjects::MEETING_ATTACHMENT_UPDATE_ACCESS => {
                meeting::attachment_update_access(events, payload).await?
            }
            subjects::MEETING_ATTACHMENT_DELETE_ACCESS => {
                meeting::attachment_delete_access(events, payload).await?
            }

            subjects::PAST_MEETING_UPDATE_ACCESS => {
                past_meeting::update_access(events, payload).await?
            }
            subjects::PAST_MEETING_DELETE_ALL_ACCESS => {
                past_meeting::delete_all_access(events, payload).await?
            }
            subjects::PAST_MEETING_PARTICIPANT_PUT => {
                past_meeting::participant_put(events, payload).await?
            }
            subjects::PAST_MEETING_PARTICIPANT_REMOVE => {
                past_meeting::participant_remove(events, payload).await?
            }

            subjects::PAST_MEETING_RECORDING_UPDATE_ACCESS => {
                artifact::recording_update_access(events, payload).await?
            }
            subjects::PAST_MEETING_TRANSCRIPT_UPDATE_ACCESS => {
                artifact::transcript_update_access(events, payload).await?
            }
            subjects::PAST_MEETING_SUMMARY_UPDATE_ACCESS => {
                artifact::summary_update_access(events, payload).await?
            }

            subjects::GROUPSIO_SERVICE_UPDATE_ACCESS => {
                groupsio::service_update_access(events, payload).await?
            }
            subjects::GROUPSIO_SERVICE_DELETE_ALL_ACCESS => {
                groupsio::service_delete_all_access(events, payload).await?
            }
            subjects::GROUPSIO_MAILING_LIST_UPDATE_ACCESS => {
                groupsio::mailing_list_update_access(events, payload).await?
            }
            subjects::GROUPSIO_MAILING_LIST_DELETE_ALL_ACCESS => {
                groupsio::mailing_list_delete_all_access(events, payload).await?
            }
            subjects::GROUPSIO_MAILING_LIST_MEMBER_PUT => {
                groupsio::mailing_list_member_put(events, payload).await?
            }
            subjects::GROUPSIO_MAILING_LIST_MEMBER_REMOVE => {
                groupsio::mailing_list_member_remove(events, payload).await?
            }
            subjects::GROUPSIO_MEMBER_UPDATE_ACCESS => {
                groupsio::member_update_access(events, payload).await?
            }
            subjects::GROUPSIO_MEMBER_DELETE_ALL_ACCESS => {
                groupsio::member_delete_all_access(events, payload).await?
            }

            other => {
                return Err(DispatchError::UnknownSubject {
                    subject: other.to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;

    use relsync_domain::Tuple;
    use relsync_storage::{MemoryKvBucket, MemoryRelationClient};

    use super::*;

    /// Bus message double recording every reply.
    struct MockMessage {
        subject: String,
        payload: Vec<u8>,
        reply: Option<String>,
        responses: Mutex<Vec<Vec<u8>>>,
    }

    impl MockMessage {
        fn new(subject: &str, payload: impl Into<Vec<u8>>) -> Self {
            Self {
                subject: subject.to_string(),
                payload: payload.into(),
                reply: Some("_INBOX.test".to_string()),
                responses: Mutex::new(Vec::new()),
            }
        }

        fn without_reply(mut self) -> Self {
            self.reply = None;
            self
        }

        fn responses(&self) -> Vec<Vec<u8>> {
            self.responses.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BusMessage for MockMessage {
        fn subject(&self) -> &str {
            &self.subject
        }

        fn payload(&self) -> &[u8] {
            &self.payload
        }

        fn reply(&self) -> Option<&str> {
            self.reply.as_deref()
        }

        async fn respond(&self, data: &[u8]) -> Result<(), DispatchError> {
            self.responses.lock().unwrap().push(data.to_vec());
            Ok(())
        }
    }

    struct Fixture {
        client: Arc<MemoryRelationClient>,
        dispatcher: Dispatcher<MemoryRelationClient, MemoryKvBucket>,
    }

    fn fixture() -> Fixture {
        let client = Arc::new(MemoryRelationClient::new());
        let bucket = Arc::new(MemoryKvBucket::new());
        let adapter = Arc::new(StoreAdapter::new(Arc::clone(&client), bucket));
        Fixture {
            client,
            dispatcher: Dispatcher::new(adapter),
        }
    }

    #[tokio::test]
    async fn generic_update_access_replies_ok() {
        let f = fixture();
        let payload = json!({
            "object_type": "committee",
            "operation": "update_access",
            "data": {"uid": "c1", "relations": {"member": ["alice"]}}
        });
        let message = MockMessage::new(subjects::UPDATE_ACCESS, payload.to_string());

        f.dispatcher.dispatch(&message).await.unwrap();

        assert!(f
            .client
            .contains(&Tuple::new("user:alice", "member", "committee:c1")));
        assert_eq!(message.responses(), vec![b"OK".to_vec()]);
    }

    #[tokio::test]
    async fn no_reply_inbox_means_no_response() {
        let f = fixture();
        let payload = json!({
            "object_type": "committee",
            "operation": "update_access",
            "data": {"uid": "c1"}
        });
        let message =
            MockMessage::new(subjects::UPDATE_ACCESS, payload.to_string()).without_reply();

        f.dispatcher.dispatch(&message).await.unwrap();
        assert!(message.responses().is_empty());
    }

    #[tokio::test]
    async fn check_request_responds_with_the_binary_result() {
        let f = fixture();
        f.client
            .insert(Tuple::new("user:alice", "member", "committee:c1"));
        let message = MockMessage::new(
            subjects::ACCESS_CHECK_REQUEST,
            b"committee:c1#member@user:alice\n".to_vec(),
        );

        f.dispatcher.dispatch(&message).await.unwrap();
        assert_eq!(
            message.responses(),
            vec![b"committee:c1#member@user:alice=1\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn legacy_committee_update_excludes_membership() {
        let f = fixture();
        f.client
            .insert(Tuple::new("user:alice", "member", "committee:c1"));

        let payload = json!({
            "uid": "c1",
            "object_type": "committee",
            "public": true,
            "references": {"project": "proj-1"}
        });
        let message = MockMessage::new(subjects::COMMITTEE_UPDATE_ACCESS, payload.to_string());
        f.dispatcher.dispatch(&message).await.unwrap();

        // Membership survives the resync; the new tuples landed.
        assert!(f
            .client
            .contains(&Tuple::new("user:alice", "member", "committee:c1")));
        assert!(f
            .client
            .contains(&Tuple::new("user:*", "viewer", "committee:c1")));
        assert!(f
            .client
            .contains(&Tuple::new("project:proj-1", "project", "committee:c1")));
    }

    #[tokio::test]
    async fn legacy_delete_takes_a_raw_uid() {
        let f = fixture();
        f.client.insert(Tuple::new("user:a", "writer", "project:p1"));

        let message = MockMessage::new(subjects::PROJECT_DELETE_ALL_ACCESS, b"p1".to_vec());
        f.dispatcher.dispatch(&message).await.unwrap();

        assert!(f.client.object_set("project:p1").is_empty());
        assert_eq!(message.responses(), vec![b"OK".to_vec()]);
    }

    #[tokio::test]
    async fn registrant_put_transitions_roles() {
        let f = fixture();
        f.client
            .insert(Tuple::new("user:bob", "participant", "meeting:m1"));

        let payload = json!({"username": "bob", "meeting_uid": "m1", "host": true});
        let message = MockMessage::new(subjects::MEETING_REGISTRANT_PUT, payload.to_string());
        f.dispatcher.dispatch(&message).await.unwrap();

        assert_eq!(
            f.client.object_set("meeting:m1"),
            [Tuple::new("user:bob", "host", "meeting:m1")].into()
        );
    }

    #[tokio::test]
    async fn project_flat_payload_maps_roles_and_parent() {
        let f = fixture();
        let payload = json!({
            "uid": "p1",
            "public": true,
            "parent_uid": "parent-1",
            "writers": ["alice"],
            "auditors": ["bob"],
            "meeting_coordinators": ["carol"]
        });
        let message = MockMessage::new(subjects::PROJECT_UPDATE_ACCESS, payload.to_string());
        f.dispatcher.dispatch(&message).await.unwrap();

        assert_eq!(
            f.client.object_set("project:p1"),
            [
                Tuple::new("user:*", "viewer", "project:p1"),
                Tuple::new("project:parent-1", "parent", "project:p1"),
                Tuple::new("user:alice", "writer", "project:p1"),
                Tuple::new("user:bob", "auditor", "project:p1"),
                Tuple::new("user:carol", "meeting_coordinator", "project:p1"),
            ]
            .into()
        );
    }

    #[tokio::test]
    async fn recording_host_visibility_references_the_view_userset() {
        let f = fixture();
        let payload = json!({
            "uid": "r1",
            "past_meeting_uid": "p1",
            "artifact_visibility": "meeting_hosts"
        });
        let message = MockMessage::new(
            subjects::PAST_MEETING_RECORDING_UPDATE_ACCESS,
            payload.to_string(),
        );
        f.dispatcher.dispatch(&message).await.unwrap();

        assert_eq!(
            f.client.object_set("past_meeting_recording:r1"),
            [
                Tuple::new("past_meeting:p1", "past_meeting", "past_meeting_recording:r1"),
                Tuple::new(
                    "past_meeting:p1",
                    "past_meeting_for_host_view",
                    "past_meeting_recording:r1"
                ),
            ]
            .into()
        );
    }

    #[tokio::test]
    async fn mailing_list_member_put_grants_membership() {
        let f = fixture();
        let payload = json!({
            "uid": "mlm-1",
            "username": "alice",
            "mailing_list_uid": "ml-1"
        });
        let message =
            MockMessage::new(subjects::GROUPSIO_MAILING_LIST_MEMBER_PUT, payload.to_string());
        f.dispatcher.dispatch(&message).await.unwrap();

        assert!(f.client.contains(&Tuple::new(
            "user:alice",
            "member",
            "groupsio_mailing_list:ml-1"
        )));
        assert_eq!(message.responses(), vec![b"OK".to_vec()]);
    }

    #[tokio::test]
    async fn recording_visibility_mismatch_is_an_error() {
        let f = fixture();
        let payload = json!({
            "uid": "r1",
            "past_meeting_uid": "p1",
            "artifact_visibility": "everyone"
        });
        let message = MockMessage::new(
            subjects::PAST_MEETING_RECORDING_UPDATE_ACCESS,
            payload.to_string(),
        );

        let err = f.dispatcher.dispatch(&message).await.unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Handler(HandlerError::SchemaMismatch { .. })
        ));
        assert!(message.responses().is_empty());
    }

    #[tokio::test]
    async fn unknown_subjects_are_rejected() {
        let f = fixture();
        let message = MockMessage::new("lfx.unrelated.subject", b"{}".to_vec());

        let err = f.dispatcher.dispatch(&message).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnknownSubject { .. }));
    }
}
