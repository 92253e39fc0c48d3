//! Meeting adapters.
//!
//! Meeting access updates exclude the `participant` and `host` relations:
//! those are owned by the registrant subjects, where putting a registrant
//! as one role vacates the other.

use serde::Deserialize;

use relsync_server::handlers::envelope::{AccessData, MemberData};
use relsync_server::{EventService, HandlerError, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{
    parse_delete_uid, parse_payload, RELATION_COMMITTEE, RELATION_HOST, RELATION_MEETING,
    RELATION_ORGANIZER, RELATION_PARTICIPANT, RELATION_PROJECT,
};

const OBJECT_TYPE: &str = "meeting";
const ATTACHMENT_OBJECT_TYPE: &str = "meeting_attachment";

#[derive(Debug, Deserialize)]
struct MeetingAccessMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    project_uid: String,
    #[serde(default)]
    organizers: Vec<String>,
    #[serde(default)]
    committees: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistrantMessage {
    #[serde(default)]
    username: String,
    #[serde(default)]
    meeting_uid: String,
    #[serde(default)]
    host: bool,
}

#[derive(Debug, Deserialize)]
struct MeetingAttachmentMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    meeting_uid: String,
}

pub async fn update_access<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: MeetingAccessMessage = parse_payload(payload)?;
    if message.project_uid.is_empty() {
        return Err(HandlerError::malformed("meeting project uid is required"));
    }

    let mut data = AccessData {
        uid: message.uid,
        public: message.public,
        exclude_relations: vec![
            RELATION_PARTICIPANT.to_string(),
            RELATION_HOST.to_string(),
        ],
        ..AccessData::default()
    };
    data.references
        .insert(RELATION_PROJECT.to_string(), vec![message.project_uid]);
    if !message.committees.is_empty() {
        data.references
            .insert(RELATION_COMMITTEE.to_string(), message.committees);
    }
    if !message.organizers.is_empty() {
        data.relations
            .insert(RELATION_ORGANIZER.to_string(), message.organizers);
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

/// A registrant lands as either participant or host; the two roles are
/// mutually exclusive, so the put vacates the other one.
pub async fn registrant_put<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: RegistrantMessage = parse_payload(payload)?;
    let relation = if message.host {
        RELATION_HOST
    } else {
        RELATION_PARTICIPANT
    };
    let data = MemberData {
        uid: message.meeting_uid,
        username: message.username,
        relations: vec![relation.to_string()],
        mutually_exclusive_with: vec![
            RELATION_PARTICIPANT.to_string(),
            RELATION_HOST.to_string(),
        ],
    };
    events.apply_member_put(OBJECT_TYPE, data).await
}

pub async fn registrant_remove<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: RegistrantMessage = parse_payload(payload)?;
    let relation = if message.host {
        RELATION_HOST
    } else {
        RELATION_PARTICIPANT
    };
    let data = MemberData {
        uid: message.meeting_uid,
        username: message.username,
        relations: vec![relation.to_string()],
        mutually_exclusive_with: Vec::new(),
    };
    events.apply_member_remove(OBJECT_TYPE, data).await
}

/// A meeting attachment carries a single reference to its meeting.
pub async fn attachment_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: MeetingAttachmentMessage = parse_payload(payload)?;
    if message.meeting_uid.is_empty() {
        return Err(HandlerError::malformed("meeting uid is required"));
    }

    let mut data = AccessData {
        uid: message.uid,
        ..AccessData::default()
    };
    data.references
        .insert(RELATION_MEETING.to_string(), vec![message.meeting_uid]);

    events.apply_update_access(ATTACHMENT_OBJECT_TYPE, data).await
}

pub async fn attachment_delete_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let uid = parse_delete_uid(payload)?;
    events.apply_delete_access(ATTACHMENT_OBJECT_TYPE, &uid).await
}
