//! Resource-specific legacy adapters.
//!
//! These modules are the only place domain vocabularies (committee,
//! meeting, past meeting, ...) appear. Each translates a legacy payload
//! into the generic operations of [`relsync_server::EventService`] and is
//! deliberately thin: payload shape, validation, vocabulary, nothing else.

pub mod artifact;
pub mod committee;
pub mod groupsio;
pub mod meeting;
pub mod past_meeting;
pub mod project;

use serde::Deserialize;
use std::collections::HashMap;

use relsync_server::handlers::envelope::AccessData;
use relsync_server::{HandlerError, HandlerResult};

// Relations shared by the legacy resources.
pub const RELATION_MEMBER: &str = "member";
pub const RELATION_ORGANIZER: &str = "organizer";
pub const RELATION_PARTICIPANT: &str = "participant";
pub const RELATION_HOST: &str = "host";
pub const RELATION_INVITEE: &str = "invitee";
pub const RELATION_ATTENDEE: &str = "attendee";
pub const RELATION_PARENT: &str = "parent";
pub const RELATION_WRITER: &str = "writer";
pub const RELATION_AUDITOR: &str = "auditor";
pub const RELATION_MEETING_COORDINATOR: &str = "meeting_coordinator";
pub const RELATION_MEETING: &str = "meeting";
pub const RELATION_PAST_MEETING: &str = "past_meeting";
pub const RELATION_PROJECT: &str = "project";
pub const RELATION_COMMITTEE: &str = "committee";

// Userset relations on a past meeting that grant visibility over its
// artifacts.
pub const RELATION_PAST_MEETING_FOR_HOST_VIEW: &str = "past_meeting_for_host_view";
pub const RELATION_PAST_MEETING_FOR_ATTENDEE_VIEW: &str = "past_meeting_for_attendee_view";
pub const RELATION_PAST_MEETING_FOR_PARTICIPANT_VIEW: &str = "past_meeting_for_participant_view";

/// The shape most legacy update-access payloads share.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandardAccessMessage {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub object_type: String,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub relations: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub references: HashMap<String, Vec<String>>,
}

impl StandardAccessMessage {
    /// The object type to sync under: the payload's own when present,
    /// otherwise the subject's default.
    pub fn object_type_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.object_type.is_empty() {
            default
        } else {
            &self.object_type
        }
    }

    /// Converts into the generic access payload.
    pub fn into_access_data(self) -> AccessData {
        AccessData {
            uid: self.uid,
            public: self.public,
            relations: self.relations,
            references: self.references,
            ..AccessData::default()
        }
    }
}

/// Parses a legacy payload body.
pub(crate) fn parse_payload<'a, T: Deserialize<'a>>(payload: &'a [u8]) -> HandlerResult<T> {
    serde_json::from_slice(payload)
        .map_err(|e| HandlerError::malformed(format!("event data parse error: {e}")))
}

/// Parses the raw-UID payload legacy deletion subjects carry.
///
/// These producers predate the envelope and publish the bare object UID.
/// A payload that looks serialized is rejected rather than treated as a
/// UID.
pub fn parse_delete_uid(payload: &[u8]) -> HandlerResult<String> {
    let uid = std::str::from_utf8(payload)
        .map_err(|_| HandlerError::malformed("deletion payload is not UTF-8"))?;
    if uid.is_empty() {
        return Err(HandlerError::malformed("empty deletion payload"));
    }
    if uid.starts_with('{') || uid.starts_with('[') || uid.starts_with('"') {
        return Err(HandlerError::malformed("unsupported deletion payload"));
    }
    Ok(uid.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delete_uid_accepts_bare_identifiers() {
        assert_eq!(parse_delete_uid(b"committee-123").unwrap(), "committee-123");
    }

    #[test]
    fn delete_uid_rejects_serialized_payloads() {
        assert!(parse_delete_uid(b"").is_err());
        assert!(parse_delete_uid(b"{\"uid\":\"x\"}").is_err());
        assert!(parse_delete_uid(b"[\"x\"]").is_err());
        assert!(parse_delete_uid(b"\"x\"").is_err());
    }
}
