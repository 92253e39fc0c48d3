//! End-to-end scenarios driving envelope payloads through the event and
//! check services against the in-memory store and KV bucket.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;

use relsync_domain::model::check::INVALIDATION_KEY;
use relsync_domain::Tuple;
use relsync_server::{CheckService, EventService, HandlerError};
use relsync_storage::{KvBucket, MemoryKvBucket, MemoryRelationClient, StoreAdapter};

struct Harness {
    client: Arc<MemoryRelationClient>,
    bucket: Arc<MemoryKvBucket>,
    events: EventService<MemoryRelationClient, MemoryKvBucket>,
    checks: CheckService<MemoryRelationClient, MemoryKvBucket>,
}

fn harness() -> Harness {
    let client = Arc::new(MemoryRelationClient::new());
    let bucket = Arc::new(MemoryKvBucket::new());
    let adapter = Arc::new(StoreAdapter::new(Arc::clone(&client), Arc::clone(&bucket)));
    Harness {
        client,
        bucket,
        events: EventService::new(Arc::clone(&adapter)),
        checks: CheckService::new(adapter),
    }
}

fn tuple_set(entries: &[(&str, &str, &str)]) -> HashSet<Tuple> {
    entries
        .iter()
        .map(|(user, relation, object)| Tuple::new(*user, *relation, *object))
        .collect()
}

async fn marker_revision(bucket: &MemoryKvBucket) -> Option<chrono::DateTime<chrono::Utc>> {
    bucket
        .get(INVALIDATION_KEY)
        .await
        .unwrap()
        .map(|e| e.created)
}

/// S1: a public committee with two members lands as three tuples and one
/// invalidation bump.
#[tokio::test]
async fn update_access_builds_the_full_object_state() {
    let h = harness();

    let payload = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {
            "uid": "c1",
            "public": true,
            "relations": {"member": ["alice", "bob"]}
        }
    });
    h.events
        .update_access(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(
        h.client.object_set("committee:c1"),
        tuple_set(&[
            ("user:*", "viewer", "committee:c1"),
            ("user:alice", "member", "committee:c1"),
            ("user:bob", "member", "committee:c1"),
        ])
    );
    assert_eq!(h.client.write_calls(), 1);
    assert!(marker_revision(&h.bucket).await.is_some());
}

/// S2: a narrower resync with `viewer` excluded removes bob but leaves the
/// wildcard viewer tuple in place.
#[tokio::test]
async fn excluded_relations_survive_a_resync() {
    let h = harness();

    let first = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {
            "uid": "c1",
            "public": true,
            "relations": {"member": ["alice", "bob"]}
        }
    });
    h.events
        .update_access(first.to_string().as_bytes())
        .await
        .unwrap();

    let second = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {
            "uid": "c1",
            "public": false,
            "relations": {"member": ["alice"]},
            "exclude_relations": ["viewer"]
        }
    });
    h.events
        .update_access(second.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(
        h.client.object_set("committee:c1"),
        tuple_set(&[
            ("user:*", "viewer", "committee:c1"),
            ("user:alice", "member", "committee:c1"),
        ])
    );
}

/// Invariant 1: a repeated sync with no intervening mutation is a no-op.
#[tokio::test]
async fn update_access_is_idempotent() {
    let h = harness();

    let payload = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {"uid": "c1", "relations": {"member": ["alice"]}}
    })
    .to_string();

    h.events.update_access(payload.as_bytes()).await.unwrap();
    assert_eq!(h.client.write_calls(), 1);

    h.events.update_access(payload.as_bytes()).await.unwrap();
    assert_eq!(h.client.write_calls(), 1);
}

/// S3: member_put adds both relations in one batch.
#[tokio::test]
async fn member_put_adds_multiple_relations_atomically() {
    let h = harness();

    let seed = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {
            "uid": "c1",
            "public": true,
            "relations": {"member": ["alice", "bob"]}
        }
    });
    h.events
        .update_access(seed.to_string().as_bytes())
        .await
        .unwrap();
    let writes_before = h.client.write_calls();

    let put = json!({
        "object_type": "committee",
        "operation": "member_put",
        "data": {"uid": "c1", "username": "charlie", "relations": ["admin", "member"]}
    });
    h.events.member_put(put.to_string().as_bytes()).await.unwrap();

    assert_eq!(h.client.write_calls(), writes_before + 1);
    assert!(h
        .client
        .contains(&Tuple::new("user:charlie", "admin", "committee:c1")));
    assert!(h
        .client
        .contains(&Tuple::new("user:charlie", "member", "committee:c1")));
}

/// S4: a participant → host transition vacates the old role in the same
/// batch.
#[tokio::test]
async fn member_put_performs_role_transitions() {
    let h = harness();
    h.client
        .insert(Tuple::new("user:bob", "participant", "meeting:m1"));

    let payload = json!({
        "object_type": "meeting",
        "operation": "member_put",
        "data": {
            "uid": "m1",
            "username": "bob",
            "relations": ["host"],
            "mutually_exclusive_with": ["participant", "host"]
        }
    });
    h.events
        .member_put(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(
        h.client.object_set("meeting:m1"),
        tuple_set(&[("user:bob", "host", "meeting:m1")])
    );
    assert_eq!(h.client.write_calls(), 1);
}

/// S5: removing one named relation leaves the user's other relations.
#[tokio::test]
async fn member_remove_deletes_named_relations_only() {
    let h = harness();
    h.client
        .insert(Tuple::new("user:alice", "host", "past_meeting:p1"));
    h.client
        .insert(Tuple::new("user:alice", "invitee", "past_meeting:p1"));

    let payload = json!({
        "object_type": "past_meeting",
        "operation": "member_remove",
        "data": {"uid": "p1", "username": "alice", "relations": ["invitee"]}
    });
    h.events
        .member_remove(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(
        h.client.object_set("past_meeting:p1"),
        tuple_set(&[("user:alice", "host", "past_meeting:p1")])
    );
}

/// Invariant 4: member_remove with an empty relation list removes every
/// tuple the user holds on the object.
#[tokio::test]
async fn member_remove_with_empty_list_removes_all() {
    let h = harness();
    h.client
        .insert(Tuple::new("user:alice", "host", "past_meeting:p1"));
    h.client
        .insert(Tuple::new("user:alice", "invitee", "past_meeting:p1"));
    h.client
        .insert(Tuple::new("user:bob", "invitee", "past_meeting:p1"));

    let payload = json!({
        "object_type": "past_meeting",
        "operation": "member_remove",
        "data": {"uid": "p1", "username": "alice", "relations": []}
    });
    h.events
        .member_remove(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert_eq!(
        h.client.object_set("past_meeting:p1"),
        tuple_set(&[("user:bob", "invitee", "past_meeting:p1")])
    );
}

/// delete_access reconciles against an empty desired set.
#[tokio::test]
async fn delete_access_removes_every_tuple() {
    let h = harness();
    h.client.insert(Tuple::new("user:*", "viewer", "committee:c1"));
    h.client
        .insert(Tuple::new("user:alice", "member", "committee:c1"));
    h.client
        .insert(Tuple::new("user:alice", "member", "committee:c2"));

    let payload = json!({
        "object_type": "committee",
        "operation": "delete_access",
        "data": {"uid": "c1"}
    });
    h.events
        .delete_access(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert!(h.client.object_set("committee:c1").is_empty());
    // Foreign objects are untouched.
    assert_eq!(h.client.object_set("committee:c2").len(), 1);
}

/// S6: the check response aligns with input order and only positive
/// results land in the cache.
#[tokio::test]
async fn check_response_is_positional_and_caches_positives() {
    let h = harness();

    let seed = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {"uid": "c1", "relations": {"member": ["alice"]}}
    });
    h.events
        .update_access(seed.to_string().as_bytes())
        .await
        .unwrap();

    let response = h
        .checks
        .handle(b"committee:c1#member@user:alice\ncommittee:c1#admin@user:alice\n")
        .await
        .unwrap();
    assert_eq!(
        response,
        b"committee:c1#member@user:alice=1\ncommittee:c1#admin@user:alice=0\n"
    );

    let member = relsync_domain::CheckItem::new("committee:c1", "member", "user:alice");
    let admin = relsync_domain::CheckItem::new("committee:c1", "admin", "user:alice");
    assert!(h.bucket.contains_key(&member.cache_key()));
    assert!(!h.bucket.contains_key(&admin.cache_key()));
}

/// Invariant 5: results cached before a mutation are stale afterwards.
#[tokio::test]
async fn check_cache_is_coherent_with_writes() {
    let h = harness();

    let grant = json!({
        "object_type": "committee",
        "operation": "member_put",
        "data": {"uid": "c1", "username": "alice", "relations": ["member"]}
    });
    h.events.member_put(grant.to_string().as_bytes()).await.unwrap();

    // Warm the cache with the allowed result.
    let response = h
        .checks
        .handle(b"committee:c1#member@user:alice\n")
        .await
        .unwrap();
    assert_eq!(response, b"committee:c1#member@user:alice=1\n");

    // Revoke; the engine bumps the invalidation marker.
    let revoke = json!({
        "object_type": "committee",
        "operation": "member_remove",
        "data": {"uid": "c1", "username": "alice", "relations": ["member"]}
    });
    h.events
        .member_remove(revoke.to_string().as_bytes())
        .await
        .unwrap();

    let response = h
        .checks
        .handle(b"committee:c1#member@user:alice\n")
        .await
        .unwrap();
    assert_eq!(response, b"committee:c1#member@user:alice=0\n");
}

/// Policies carried on an access update expand into both tuple levels.
#[tokio::test]
async fn update_access_expands_policies() {
    let h = harness();

    let payload = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {
            "uid": "c1",
            "relations": {"member": ["alice"]},
            "policies": [{
                "name": "visibility_policy",
                "value": "basic_profile",
                "relation": "allows_basic_profile"
            }]
        }
    });
    h.events
        .update_access(payload.to_string().as_bytes())
        .await
        .unwrap();

    assert!(h.client.contains(&Tuple::new(
        "visibility_policy:basic_profile",
        "visibility_policy",
        "committee:c1"
    )));
    assert!(h.client.contains(&Tuple::new(
        "committee:c1#member",
        "allows_basic_profile",
        "visibility_policy:basic_profile"
    )));
}

/// Malformed envelopes and missing required fields are terminal errors.
#[tokio::test]
async fn malformed_payloads_are_rejected() {
    let h = harness();

    let err = h.events.update_access(b"not json").await.unwrap_err();
    assert!(matches!(err, HandlerError::MalformedInput { .. }));
    assert!(!err.is_retryable());

    let missing_uid = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {"public": true}
    });
    let err = h
        .events
        .update_access(missing_uid.to_string().as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::MalformedInput { .. }));

    let empty_relations = json!({
        "object_type": "committee",
        "operation": "member_put",
        "data": {"uid": "c1", "username": "alice", "relations": []}
    });
    let err = h
        .events
        .member_put(empty_relations.to_string().as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, HandlerError::MalformedInput { .. }));
}

/// Store failures propagate unchanged so the bus can redeliver.
#[tokio::test]
async fn store_failures_are_retryable() {
    let h = harness();
    h.client.fail_reads_after(0);

    let payload = json!({
        "object_type": "committee",
        "operation": "update_access",
        "data": {"uid": "c1", "relations": {"member": ["alice"]}}
    });
    let err = h
        .events
        .update_access(payload.to_string().as_bytes())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}
