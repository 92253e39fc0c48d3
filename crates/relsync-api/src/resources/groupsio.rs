//! Groups.io adapters.
//!
//! The service, mailing-list, and member resources use the standard
//! access shape unchanged; mailing-list membership itself is managed by
//! the per-member put/remove subjects.

use serde::Deserialize;

use relsync_server::handlers::envelope::MemberData;
use relsync_server::{EventService, HandlerResult};
use relsync_storage::{KvBucket, RelationClient};

use super::{parse_delete_uid, parse_payload, StandardAccessMessage, RELATION_MEMBER};

const SERVICE_OBJECT_TYPE: &str = "groupsio_service";
const MAILING_LIST_OBJECT_TYPE: &str = "groupsio_mailing_list";
const MEMBER_OBJECT_TYPE: &str = "groupsio_member";

pub async fn service_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: StandardAccessMessage = parse_payload(payload)?;
    let object_type = message.object_type_or(SERVICE_OBJECT_TYPE).to_string();
    events
        .apply_update_access(&object_type, message.into_access_data())
        .await
}

pub async fn service_delete_all_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let uid = parse_delete_uid(payload)?;
    events.apply_delete_access(SERVICE_OBJECT_TYPE, &uid).await
}

pub async fn mailing_list_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: StandardAccessMessage = parse_payload(payload)?;
    let object_type = message.object_type_or(MAILING_LIST_OBJECT_TYPE).to_string();
    events
        .apply_update_access(&object_type, message.into_access_data())
        .await
}

pub async fn mailing_list_delete_all_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let uid = parse_delete_uid(payload)?;
    events
        .apply_delete_access(MAILING_LIST_OBJECT_TYPE, &uid)
        .await
}

#[derive(Debug, Deserialize)]
struct MailingListMemberMessage {
    #[serde(default)]
    username: String,
    #[serde(default)]
    mailing_list_uid: String,
}

pub async fn mailing_list_member_put<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: MailingListMemberMessage = parse_payload(payload)?;
    let data = MemberData {
        uid: message.mailing_list_uid,
        username: message.username,
        relations: vec![RELATION_MEMBER.to_string()],
        mutually_exclusive_with: Vec::new(),
    };
    events.apply_member_put(MAILING_LIST_OBJECT_TYPE, data).await
}

pub async fn mailing_list_member_remove<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: MailingListMemberMessage = parse_payload(payload)?;
    let data = MemberData {
        uid: message.mailing_list_uid,
        username: message.username,
        relations: vec![RELATION_MEMBER.to_string()],
        mutually_exclusive_with: Vec::new(),
    };
    events
        .apply_member_remove(MAILING_LIST_OBJECT_TYPE, data)
        .await
}

pub async fn member_update_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let message: StandardAccessMessage = parse_payload(payload)?;
    let object_type = message.object_type_or(MEMBER_OBJECT_TYPE).to_string();
    events
        .apply_update_access(&object_type, message.into_access_data())
        .await
}

pub async fn member_delete_all_access<C, K>(
    events: &EventService<C, K>,
    payload: &[u8],
) -> HandlerResult<()>
where
    C: RelationClient,
    K: KvBucket,
{
    let uid = parse_delete_uid(payload)?;
    events.apply_delete_access(MEMBER_OBJECT_TYPE, &uid).await
}
