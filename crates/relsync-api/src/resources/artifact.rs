//! Past-meeting artifact adapters (recordings, transcripts, summaries).
//!
//! Artifacts share one payload shape: the artifact's UID, its past
//! meeting, and a visibility literal. Visibility is not resolved at
//! write time; the artifact gets userset references into its past
//! meeting's view relations, and the store expands those to the current
//! hosts or participants on every check. An unknown literal is a schema
//! mismatch, not a default.

use serde::Deserialize;

use relsync_server::handlers::envelope::AccessData;
use relsync_server::{EventService, HandlerError, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{
    parse_payload, RELATION_PAST_MEETING, RELATION_PAST_MEETING_FOR_ATTENDEE_VIEW,
    RELATION_PAST_MEETING_FOR_HOST_VIEW, RELATION_PAST_MEETING_FOR_PARTICIPANT_VIEW,
};

pub const VISIBILITY_PUBLIC: &str = "public";
pub const VISIBILITY_MEETING_HOSTS: &str = "meeting_hosts";
pub const VISIBILITY_MEETING_PARTICIPANTS: &str = "meeting_participants";

const RECORDING_OBJECT_TYPE: &str = "past_meeting_recording";
const TRANSCRIPT_OBJECT_TYPE: &str = "past_meeting_transcript";
const SUMMARY_OBJECT_TYPE: &str = "past_meeting_summary";

#[derive(Debug, Deserialize)]
struct ArtifactAccessMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    past_meeting_uid: String,
    #[serde(default)]
    artifact_visibility: String,
}

impl ArtifactAccessMessage {
    fn into_access_data(self) -> HandlerResult<AccessData> {
        if self.past_meeting_uid.is_empty() {
            return Err(HandlerError::malformed("past meeting uid is required"));
        }

        // Typed values pass through reference encoding verbatim, which is
        // what lets these reuse the view relations as their type.
        let past_meeting = format!("{RELATION_PAST_MEETING}:{}", self.past_meeting_uid);

        let mut data = AccessData {
            uid: self.uid,
            ..AccessData::default()
        };
        data.references.insert(
            RELATION_PAST_MEETING.to_string(),
            vec![past_meeting.clone()],
        );

        match self.artifact_visibility.as_str() {
            VISIBILITY_PUBLIC => data.public = true,
            VISIBILITY_MEETING_HOSTS => {
                data.references.insert(
                    RELATION_PAST_MEETING_FOR_HOST_VIEW.to_string(),
                    vec![past_meeting],
                );
            }
            VISIBILITY_MEETING_PARTICIPANTS => {
                data.references.insert(
                    RELATION_PAST_MEETING_FOR_HOST_VIEW.to_string(),
                    vec![past_meeting.clone()],
                );
                data.references.insert(
                    RELATION_PAST_MEETING_FOR_ATTENDEE_VIEW.to_string(),
                    vec![past_meeting.clone()],
                );
                data.references.insert(
                    RELATION_PAST_MEETING_FOR_PARTICIPANT_VIEW.to_string(),
                    vec![past_meeting],
                );
            }
            other => {
                return Err(HandlerError::SchemaMismatch {
                    message: format!("unknown artifact visibility: {other}"),
                });
            }
        }

        Ok(data)
    }
}

async fn update_artifact_access<C, K>(
    events: &EventService<C, K>,
    object_type: &str,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: ArtifactAccessMessage = parse_payload(payload)?;
    let data = message.into_access_data()?;
    events.apply_update_access(object_type, data).await
}

pub async fn recording_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    update_artifact_access(events, RECORDING_OBJECT_TYPE, payload).await
}

pub async fn transcript_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    update_artifact_access(events, TRANSCRIPT_OBJECT_TYPE, payload).await
}

pub async fn summary_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    update_artifact_access(events, SUMMARY_OBJECT_TYPE, payload).await
}
