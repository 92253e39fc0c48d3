//! Past-meeting adapters.
//!
//! Past-meeting access updates exclude the participant-owned relations
//! (`organizer`, `host`, `invitee`, `attendee`); those arrive through the
//! per-participant subjects, which derive the relation set from the
//! participant's flags. A participant may hold host, invitee, and
//! attendee at once; the roles are not mutually exclusive with anything
//! outside their own group.

use serde::Deserialize;

use relsync_server::handlers::envelope::{AccessData, MemberData};
use relsync_server::{EventService, HandlerError, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{
    parse_delete_uid, parse_payload, RELATION_ATTENDEE, RELATION_COMMITTEE, RELATION_HOST,
    RELATION_INVITEE, RELATION_MEETING, RELATION_ORGANIZER, RELATION_PROJECT,
};

const OBJECT_TYPE: &str = "past_meeting";

/// The relation slots participant events own on a past meeting.
fn participant_relations() -> Vec<String> {
    vec![
        RELATION_HOST.to_string(),
        RELATION_ATTENDEE.to_string(),
        RELATION_INVITEE.to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct PastMeetingAccessMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    meeting_uid: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    project_uid: String,
    #[serde(default)]
    committees: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ParticipantMessage {
    #[serde(default)]
    past_meeting_uid: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    host: bool,
    #[serde(default)]
    is_invited: bool,
    #[serde(default)]
    is_attended: bool,
}

impl ParticipantMessage {
    fn validate(&self) -> HandlerResult<()> {
        if self.username.is_empty() {
            return Err(HandlerError::malformed(
                "past meeting participant username is required",
            ));
        }
        if self.past_meeting_uid.is_empty() {
            return Err(HandlerError::malformed("past meeting uid is required"));
        }
        Ok(())
    }

    /// The relations the participant should hold, per their flags.
    fn desired_relations(&self) -> Vec<String> {
        let mut relations = Vec::new();
        if self.host {
            relations.push(RELATION_HOST.to_string());
        }
        if self.is_attended {
            relations.push(RELATION_ATTENDEE.to_string());
        }
        if self.is_invited {
            relations.push(RELATION_INVITEE.to_string());
        }
        relations
    }
}

pub async fn update_access<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: PastMeetingAccessMessage = parse_payload(payload)?;
    if message.project_uid.is_empty() {
        return Err(HandlerError::malformed("past meeting project uid is required"));
    }

    let mut data = AccessData {
        uid: message.uid,
        public: message.public,
        exclude_relations: vec![
            RELATION_ORGANIZER.to_string(),
            RELATION_HOST.to_string(),
            RELATION_INVITEE.to_string(),
            RELATION_ATTENDEE.to_string(),
        ],
        ..AccessData::default()
    };
    if !message.meeting_uid.is_empty() {
        data.references
            .insert(RELATION_MEETING.to_string(), vec![message.meeting_uid]);
    }
    data.references
        .insert(RELATION_PROJECT.to_string(), vec![message.project_uid]);
    if !message.committees.is_empty() {
        data.references
            .insert(RELATION_COMMITTEE.to_string(), message.committees);
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

/// Reconciles a participant's host/attendee/invitee slots with their
/// flags. Flags that turned off vacate their relation; a participant with
/// no flags left loses all three.
pub async fn participant_put<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: ParticipantMessage = parse_payload(payload)?;
    message.validate()?;

    let desired = message.desired_relations();
    if desired.is_empty() {
        let data = MemberData {
            uid: message.past_meeting_uid,
            username: message.username,
            relations: participant_relations(),
            mutually_exclusive_with: Vec::new(),
        };
        return events.apply_member_remove(OBJECT_TYPE, data).await;
    }

    let data = MemberData {
        uid: message.past_meeting_uid,
        username: message.username,
        relations: desired,
        mutually_exclusive_with: participant_relations(),
    };
    events.apply_member_put(OBJECT_TYPE, data).await
}

/// Removes every participant relation the user holds on the past meeting.
pub async fn participant_remove<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: ParticipantMessage = parse_payload(payload)?;
    message.validate()?;

    let data = MemberData {
        uid: message.past_meeting_uid,
        username: message.username,
        relations: participant_relations(),
        mutually_exclusive_with: Vec::new(),
    };
    events.apply_member_remove(OBJECT_TYPE, data).await
}
