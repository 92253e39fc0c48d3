//! Project adapters.
//!
//! The project service still publishes a flat payload with role arrays;
//! this adapter folds it into the standard access shape.

use serde::Deserialize;

use relsync_server::handlers::envelope::AccessData;
use relsync_server::{EventService, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{
    parse_delete_uid, parse_payload, RELATION_AUDITOR, RELATION_MEETING_COORDINATOR,
    RELATION_PARENT, RELATION_WRITER,
};

const OBJECT_TYPE: &str = "project";

#[derive(Debug, Deserialize)]
struct ProjectAccessMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    parent_uid: String,
    #[serde(default)]
    writers: Vec<String>,
    #[serde(default)]
    auditors: Vec<String>,
    #[serde(default)]
    meeting_coordinators: Vec<String>,
}

pub async fn update_access<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: ProjectAccessMessage = parse_payload(payload)?;

    let mut data = AccessData {
        uid: message.uid,
        public: message.public,
        ..AccessData::default()
    };
    if !message.parent_uid.is_empty() {
        data.references
            .insert(RELATION_PARENT.to_string(), vec![message.parent_uid]);
    }
    if !message.writers.is_empty() {
        data.relations
            .insert(RELATION_WRITER.to_string(), message.writers);
    }
    if !message.auditors.is_empty() {
        data.relations
            .insert(RELATION_AUDITOR.to_string(), message.auditors);
    }
    if !message.meeting_coordinators.is_empty() {
        data.relations.insert(
            RELATION_MEETING_COORDINATOR.to_string(),
            message.meeting_coordinators,
        );
    }

    events.apply_update_access(OBJECT_TYPE, data).await
}

pub async fn delete_all_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let uid = parse_delete_uid(payload)?;
    events.apply_delete_access(OBJECT_TYPE, &uid).await
}
