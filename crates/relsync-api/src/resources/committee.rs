//! Committee adapters.
//!
//! Committee access updates exclude the `member` relation from the sync:
//! committee membership is managed by the per-member subjects below, and a
//! whole-committee resync must not clobber it.

use serde::Deserialize;
use std::collections::HashMap;

use relsync_domain::Policy;
use relsync_server::handlers::envelope::{AccessData, MemberData};
use relsync_server::{EventService, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{parse_delete_uid, parse_payload, RELATION_MEMBER};

const OBJECT_TYPE: &str = "committee";

#[derive(Debug, Deserialize)]
struct CommitteeAccessMessage {
    #[serde(default)]
    uid: String,
    #[serde(default)]
    object_type: String,
    #[serde(default)]
    public: bool,
    #[serde(default)]
    relations: HashMap<String, Vec<String>>,
    /// Committee references are single-valued in the legacy schema.
    #[serde(default)]
    references: HashMap<String, String>,
    #[serde(default)]
    policies: Vec<Policy>,
}

#[derive(Debug, Deserialize)]
struct CommitteeMemberMessage {
    #[serde(default)]
    username: String,
    #[serde(default)]
    committee_uid: String,
}

pub async fn update_access<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: CommitteeAccessMessage = parse_payload(payload)?;
    let object_type = if message.object_type.is_empty() {
        OBJECT_TYPE.to_string()
    } else {
        message.object_type
    };

    let data = AccessData {
        uid: message.uid,
        public: message.public,
        relations: message.relations,
        references: message
            .references
            .into_iter()
            .map(|(relation, value)| (relation, vec![value]))
            .collect(),
        exclude_relations: vec![RELATION_MEMBER.to_string()],
        policies: message.policies,
    };

    events.apply_update_access(&object_type, data).await
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

pub async fn member_put<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: CommitteeMemberMessage = parse_payload(payload)?;
    let data = MemberData {
        uid: message.committee_uid,
        username: message.username,
        relations: vec![RELATION_MEMBER.to_string()],
        mutually_exclusive_with: Vec::new(),
    };
    events.apply_member_put(OBJECT_TYPE, data).await
}

pub async fn member_remove<C, K>(events: &EventService<C, K>, payload: &[u8]) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: CommitteeMemberMessage = parse_payload(payload)?;
    let data = MemberData {
        uid: message.committee_uid,
        username: message.username,
        relations: vec![RELATION_MEMBER.to_string()],
        mutually_exclusive_with: Vec::new(),
    };
    events.apply_member_remove(OBJECT_TYPE, data).await
}
