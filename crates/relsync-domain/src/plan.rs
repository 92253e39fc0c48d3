//! Reconciliation planning.
//!
//! Pure set-difference computations that turn a desired state and the
//! store's current state into the minimal write/delete batch. All
//! functions here are deterministic and side-effect free; the engine in
//! `relsync-server` feeds them store reads and applies their output.

use std::collections::{HashMap, HashSet};

use crate::model::tuple::Tuple;

/// A planned mutation batch: tuples to add and tuples to remove.
///
/// Tuples are treated as sets keyed by `(user, relation, object)`; a diff
/// never contains the same tuple on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleDiff {
    pub writes: Vec<Tuple>,
    pub deletes: Vec<Tuple>,
}

impl TupleDiff {
    /// True when the batch would be a no-op.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }

    /// Folds another diff into this one.
    pub fn merge(&mut self, other: TupleDiff) {
        self.writes.extend(other.writes);
        self.deletes.extend(other.deletes);
    }

    /// `(writes, deletes)` sizes, the shape handlers report.
    pub fn counts(&self) -> (usize, usize) {
        (self.writes.len(), self.deletes.len())
    }
}

/// Normalizes a desired tuple set against the event's object.
///
/// - An empty `object` field is filled in with the event object.
/// - A tuple whose `object` differs from the event object is dropped:
///   events never touch foreign objects.
/// - Tuples carrying an excluded relation are dropped; those relations are
///   owned by a different event stream and this sync must not write them.
/// - Duplicates by `(user, relation)` collapse, later entries winning.
pub fn normalize_desired(
    object: &str,
    desired: Vec<Tuple>,
    excluded: &HashSet<String>,
) -> Vec<Tuple> {
    let mut by_member: HashMap<(String, String), Tuple> = HashMap::with_capacity(desired.len());
    for mut tuple in desired {
        if tuple.object.is_empty() {
            tuple.object = object.to_string();
        } else if tuple.object != object {
            continue;
        }
        if excluded.contains(&tuple.relation) {
            continue;
        }
        by_member.insert((tuple.user.clone(), tuple.relation.clone()), tuple);
    }
    by_member.into_values().collect()
}

/// Computes the minimal batch bringing `current` in line with `desired`.
///
/// `desired` must already be normalized. Writes are desired tuples missing
/// from the store; deletes are stored tuples absent from the desired set,
/// except those whose relation is excluded, which survive the sync.
pub fn diff_object(
    desired: &[Tuple],
    current: &[Tuple],
    excluded: &HashSet<String>,
) -> TupleDiff {
    let current_set: HashSet<&Tuple> = current.iter().collect();
    let desired_set: HashSet<&Tuple> = desired.iter().collect();

    let writes = desired
        .iter()
        .filter(|t| !current_set.contains(*t))
        .cloned()
        .collect();

    let deletes = current
        .iter()
        .filter(|t| !desired_set.contains(*t) && !excluded.contains(&t.relation))
        .cloned()
        .collect();

    TupleDiff { writes, deletes }
}

/// Plans a per-user multi-relation put.
///
/// `current` is the full tuple set of the object; only tuples belonging to
/// `user` participate. Desired relations missing from the store become
/// writes. Stored relations that appear in the mutual-exclusion list and
/// are not desired become deletes, which is how role transitions such as
/// participant → host vacate the old slot in the same batch. Relations
/// outside the exclusion list are left alone.
pub fn member_put_diff(
    object: &str,
    user: &str,
    desired_relations: &[String],
    mutually_exclusive_with: &[String],
    current: &[Tuple],
) -> TupleDiff {
    let desired: HashSet<&str> = desired_relations.iter().map(String::as_str).collect();
    let exclusive: HashSet<&str> = mutually_exclusive_with
        .iter()
        .map(String::as_str)
        .collect();

    let mut existing: HashSet<&str> = HashSet::new();
    let mut deletes = Vec::new();
    for tuple in current.iter().filter(|t| t.user == user) {
        existing.insert(tuple.relation.as_str());
        if exclusive.contains(tuple.relation.as_str()) && !desired.contains(tuple.relation.as_str())
        {
            deletes.push(tuple.clone());
        }
    }

    let writes = desired
        .iter()
        .filter(|r| !existing.contains(*r))
        .map(|r| Tuple::new(user, *r, object))
        .collect();

    TupleDiff { writes, deletes }
}

/// Builds the delete batch for a per-user relation removal.
///
/// Empty relation names are skipped; callers treat an empty result as the
/// signal to remove everything the user holds on the object instead.
pub fn member_remove_tuples(object: &str, user: &str, relations: &[String]) -> Vec<Tuple> {
    relations
        .iter()
        .filter(|r| !r.is_empty())
        .map(|r| Tuple::new(user, r, object))
        .collect()
}

/// Reconciles a single `(user, relation)` slot on an object.
///
/// Used by policy expansion: if the exact tuple already exists nothing is
/// written; any tuple with the same user but a different relation is a
/// conflicting leftover and is scheduled for deletion alongside the write.
pub fn reconcile_user_relation(
    object: &str,
    user: &str,
    relation: &str,
    existing: &[Tuple],
) -> TupleDiff {
    let mut diff = TupleDiff::default();
    let mut exists = false;

    for tuple in existing.iter().filter(|t| t.user == user) {
        if tuple.relation == relation {
            exists = true;
        } else {
            diff.deletes.push(tuple.clone());
        }
    }

    if !exists {
        diff.writes.push(Tuple::new(user, relation, object));
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn excluded(relations: &[&str]) -> HashSet<String> {
        relations.iter().map(|r| r.to_string()).collect()
    }

    fn sorted(mut tuples: Vec<Tuple>) -> Vec<Tuple> {
        tuples.sort_by(|a, b| a.to_string().cmp(&b.to_string()));
        tuples
    }

    #[test]
    fn normalize_fills_empty_objects() {
        let desired = vec![
            Tuple::new("user:456", "writer", ""),
            Tuple::new("user:789", "viewer", ""),
        ];
        let normalized = normalize_desired("project:123", desired, &HashSet::new());
        assert_eq!(normalized.len(), 2);
        assert!(normalized.iter().all(|t| t.object == "project:123"));
    }

    #[test]
    fn normalize_drops_foreign_objects() {
        let desired = vec![
            Tuple::new("user:456", "writer", "project:999"),
            Tuple::new("user:789", "viewer", "project:123"),
        ];
        let normalized = normalize_desired("project:123", desired, &HashSet::new());
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].user, "user:789");
    }

    #[test]
    fn normalize_dedups_by_user_and_relation() {
        let desired = vec![
            Tuple::new("user:456", "writer", ""),
            Tuple::new("user:456", "writer", "project:123"),
        ];
        let normalized = normalize_desired("project:123", desired, &HashSet::new());
        assert_eq!(normalized.len(), 1);
    }

    #[test]
    fn normalize_drops_excluded_relations() {
        let desired = vec![
            Tuple::new("user:456", "participant", ""),
            Tuple::new("user:456", "organizer", ""),
        ];
        let normalized = normalize_desired("meeting:m1", desired, &excluded(&["participant"]));
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].relation, "organizer");
    }

    #[test]
    fn diff_writes_only_missing_tuples() {
        let desired = vec![
            Tuple::new("user:a", "writer", "project:1"),
            Tuple::new("user:b", "viewer", "project:1"),
        ];
        let current = vec![Tuple::new("user:a", "writer", "project:1")];
        let diff = diff_object(&desired, &current, &HashSet::new());
        assert_eq!(diff.writes, vec![Tuple::new("user:b", "viewer", "project:1")]);
        assert!(diff.deletes.is_empty());
    }

    #[test]
    fn diff_deletes_tuples_that_fell_out_of_desired() {
        let desired = vec![Tuple::new("user:a", "writer", "project:1")];
        let current = vec![
            Tuple::new("user:a", "writer", "project:1"),
            Tuple::new("user:b", "viewer", "project:1"),
        ];
        let diff = diff_object(&desired, &current, &HashSet::new());
        assert!(diff.writes.is_empty());
        assert_eq!(diff.deletes, vec![Tuple::new("user:b", "viewer", "project:1")]);
    }

    #[test]
    fn diff_preserves_excluded_relations() {
        let current = vec![
            Tuple::new("user:a", "participant", "meeting:1"),
            Tuple::new("user:b", "organizer", "meeting:1"),
        ];
        let diff = diff_object(&[], &current, &excluded(&["participant"]));
        assert_eq!(
            diff.deletes,
            vec![Tuple::new("user:b", "organizer", "meeting:1")]
        );
    }

    #[test]
    fn diff_of_equal_sets_is_empty() {
        let state = vec![
            Tuple::new("user:a", "writer", "project:1"),
            Tuple::new("user:b", "viewer", "project:1"),
        ];
        assert!(diff_object(&state, &state, &HashSet::new()).is_empty());
    }

    #[test]
    fn member_put_writes_missing_relations_only() {
        let current = vec![Tuple::new("user:charlie", "member", "committee:c1")];
        let diff = member_put_diff(
            "committee:c1",
            "user:charlie",
            &["admin".to_string(), "member".to_string()],
            &[],
            &current,
        );
        assert_eq!(
            diff.writes,
            vec![Tuple::new("user:charlie", "admin", "committee:c1")]
        );
        assert!(diff.deletes.is_empty());
    }

    #[test]
    fn member_put_vacates_mutually_exclusive_relations() {
        let current = vec![Tuple::new("user:bob", "participant", "meeting:m1")];
        let diff = member_put_diff(
            "meeting:m1",
            "user:bob",
            &["host".to_string()],
            &["participant".to_string(), "host".to_string()],
            &current,
        );
        assert_eq!(diff.writes, vec![Tuple::new("user:bob", "host", "meeting:m1")]);
        assert_eq!(
            diff.deletes,
            vec![Tuple::new("user:bob", "participant", "meeting:m1")]
        );
    }

    #[test]
    fn member_put_keeps_desired_relation_listed_as_exclusive() {
        // Including the target in the exclusion list declares the slot
        // without vacating it.
        let current = vec![Tuple::new("user:bob", "host", "meeting:m1")];
        let diff = member_put_diff(
            "meeting:m1",
            "user:bob",
            &["host".to_string()],
            &["participant".to_string(), "host".to_string()],
            &current,
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn member_put_ignores_other_users() {
        let current = vec![Tuple::new("user:eve", "participant", "meeting:m1")];
        let diff = member_put_diff(
            "meeting:m1",
            "user:bob",
            &["host".to_string()],
            &["participant".to_string()],
            &current,
        );
        assert_eq!(diff.writes, vec![Tuple::new("user:bob", "host", "meeting:m1")]);
        assert!(diff.deletes.is_empty());
    }

    #[test]
    fn member_remove_skips_empty_relation_names() {
        let tuples = member_remove_tuples(
            "committee:c1",
            "user:alice",
            &["member".to_string(), String::new()],
        );
        assert_eq!(
            tuples,
            vec![Tuple::new("user:alice", "member", "committee:c1")]
        );
    }

    #[test]
    fn reconcile_user_relation_is_idempotent() {
        let existing = vec![Tuple::new(
            "visibility_policy:basic_profile",
            "visibility_policy",
            "committee:c1",
        )];
        let diff = reconcile_user_relation(
            "committee:c1",
            "visibility_policy:basic_profile",
            "visibility_policy",
            &existing,
        );
        assert!(diff.is_empty());
    }

    #[test]
    fn reconcile_user_relation_evicts_conflicting_relation() {
        let existing = vec![Tuple::new(
            "visibility_policy:basic_profile",
            "old_policy",
            "committee:c1",
        )];
        let diff = reconcile_user_relation(
            "committee:c1",
            "visibility_policy:basic_profile",
            "visibility_policy",
            &existing,
        );
        assert_eq!(
            sorted(diff.writes),
            vec![Tuple::new(
                "visibility_policy:basic_profile",
                "visibility_policy",
                "committee:c1"
            )]
        );
        assert_eq!(
            sorted(diff.deletes),
            vec![Tuple::new(
                "visibility_policy:basic_profile",
                "old_policy",
                "committee:c1"
            )]
        );
    }
}
