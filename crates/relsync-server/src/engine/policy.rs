//! Two-level policy expansion.

use tracing::{debug, info};

use relsync_domain::plan::{reconcile_user_relation, TupleDiff};
use relsync_domain::Policy;
use relsync_storage::{KvBucket, RelationClient};

use super::SyncEngine;
use crate::error::HandlerResult;

impl<C, K> SyncEngine<C, K>
where
    C: RelationClient,
    K: KvBucket,
{
    /// Reconciles the two-level tuple structure for each policy carried on
    /// a resource event.
    ///
    /// Level 1 links the resource to the policy object; level 2 links the
    /// policy object to the resource's member userset:
    ///
    /// ```text
    /// committee:C      #visibility_policy       @visibility_policy:basic_profile
    /// visibility_policy:basic_profile #allows_basic_profile @committee:C#member
    /// ```
    ///
    /// For each level, an exact existing tuple is left alone; a tuple with
    /// the same user but a different relation is a stale leftover and is
    /// deleted in the same batch as the new write. Callers invoke this
    /// only after the main object sync succeeded, so a policy failure
    /// leaves the event safe to redeliver wholesale.
    pub async fn apply_policies(
        &self,
        object: &str,
        member_relation: &str,
        policies: &[Policy],
    ) -> HandlerResult<()> {
        for policy in policies {
            policy.validate()?;

            let policy_object = policy.object_id();
            let mut diff = TupleDiff::default();

            // Level 1: object → policy.
            let existing = self.store().read_object(object).await?;
            diff.merge(reconcile_user_relation(
                object,
                &policy_object,
                &policy.name,
                &existing,
            ));

            // Level 2: policy → member userset of the object.
            let userset = policy.userset_ref(object, member_relation);
            let existing = self.store().read_object(&policy_object).await?;
            diff.merge(reconcile_user_relation(
                &policy_object,
                &userset,
                &policy.relation,
                &existing,
            ));

            if diff.is_empty() {
                debug!(object, policy = %policy_object, "policy tuples already in place");
                continue;
            }

            let (writes, deletes) = diff.counts();
            self.store().write_and_delete(diff.writes, diff.deletes).await?;

            info!(
                object,
                policy = %policy_object,
                writes,
                deletes,
                "reconciled policy tuples"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relsync_domain::Tuple;
    use relsync_storage::{MemoryKvBucket, MemoryRelationClient, StoreAdapter};

    use super::*;
    use crate::error::HandlerError;

    fn engine() -> (
        Arc<MemoryRelationClient>,
        SyncEngine<MemoryRelationClient, MemoryKvBucket>,
    ) {
        let client = Arc::new(MemoryRelationClient::new());
        let bucket = Arc::new(MemoryKvBucket::new());
        let adapter = Arc::new(StoreAdapter::new(Arc::clone(&client), bucket));
        (client, SyncEngine::new(adapter))
    }

    fn visibility_policy() -> Policy {
        Policy {
            name: "visibility_policy".to_string(),
            relation: "allows_basic_profile".to_string(),
            value: "basic_profile".to_string(),
        }
    }

    #[tokio::test]
    async fn expansion_writes_both_levels() {
        let (client, engine) = engine();

        engine
            .apply_policies("committee:c1", "member", &[visibility_policy()])
            .await
            .unwrap();

        assert!(client.contains(&Tuple::new(
            "visibility_policy:basic_profile",
            "visibility_policy",
            "committee:c1"
        )));
        assert!(client.contains(&Tuple::new(
            "committee:c1#member",
            "allows_basic_profile",
            "visibility_policy:basic_profile"
        )));
    }

    #[tokio::test]
    async fn expansion_is_idempotent() {
        let (client, engine) = engine();

        engine
            .apply_policies("committee:c1", "member", &[visibility_policy()])
            .await
            .unwrap();
        let writes_before = client.write_calls();

        engine
            .apply_policies("committee:c1", "member", &[visibility_policy()])
            .await
            .unwrap();
        assert_eq!(client.write_calls(), writes_before);
    }

    #[tokio::test]
    async fn conflicting_relation_is_evicted() {
        let (client, engine) = engine();
        // A leftover from a previous policy shape: same user, old relation.
        client.insert(Tuple::new(
            "visibility_policy:basic_profile",
            "legacy_policy",
            "committee:c1",
        ));

        engine
            .apply_policies("committee:c1", "member", &[visibility_policy()])
            .await
            .unwrap();

        assert!(!client.contains(&Tuple::new(
            "visibility_policy:basic_profile",
            "legacy_policy",
            "committee:c1"
        )));
        assert!(client.contains(&Tuple::new(
            "visibility_policy:basic_profile",
            "visibility_policy",
            "committee:c1"
        )));
    }

    #[tokio::test]
    async fn invalid_policy_is_rejected() {
        let (_, engine) = engine();
        let mut policy = visibility_policy();
        policy.value.clear();

        let err = engine
            .apply_policies("committee:c1", "member", &[policy])
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::MalformedInput { .. }));
    }
}
