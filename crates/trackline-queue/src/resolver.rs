//! Task selection for a delivery pass.

use std::collections::HashSet;
use trackline_database::TaskMetadata;

/// Picks the next runnable task from the pending set.
///
/// A task is runnable when none of the groups it waits on are opened by
/// another pending task, and none of them were opened by a task that
/// already failed this pass. The resolver holds only pass-local state;
/// [`reset`](Self::reset) clears it between passes.
#[derive(Debug, Default)]
pub struct TaskResolver {
    excluded_groups: HashSet<String>,
}

impl TaskResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed task. Any group it opens is excluded for the
    /// rest of the pass, parking its dependents.
    pub fn deprioritize(&mut self, failed: &TaskMetadata) {
        if let Some(group) = &failed.group_start {
            self.excluded_groups.insert(group.clone());
        }
    }

    /// Forget pass-local exclusions.
    pub fn reset(&mut self) {
        self.excluded_groups.clear();
    }

    /// The earliest-created runnable task, or `None` when everything
    /// left is blocked.
    pub fn next_task(&self, pending: &[TaskMetadata]) -> Option<TaskMetadata> {
        pending
            .iter()
            .find(|candidate| self.is_runnable(candidate, pending))
            .cloned()
    }

    fn is_runnable(&self, candidate: &TaskMetadata, pending: &[TaskMetadata]) -> bool {
        candidate.blocking_groups().iter().all(|group| {
            if self.excluded_groups.contains(group) {
                return false;
            }
            !pending
                .iter()
                .any(|other| other.id != candidate.id && other.opens_group(group))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn meta(id: &str, group_start: Option<&str>, blocking: &[&str]) -> TaskMetadata {
        TaskMetadata {
            id: id.to_string(),
            task_type: "track_event".to_string(),
            group_start: group_start.map(str::to_string),
            group_member: if blocking.is_empty() {
                None
            } else {
                Some(blocking.iter().map(|s| s.to_string()).collect())
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn picks_tasks_in_creation_order() {
        let resolver = TaskResolver::new();
        let pending = vec![meta("a", None, &[]), meta("b", None, &[])];

        let next = resolver.next_task(&pending).unwrap();
        assert_eq!(next.id, "a");
    }

    #[test]
    fn skips_tasks_blocked_by_a_pending_opener() {
        let resolver = TaskResolver::new();
        let pending = vec![
            meta("dependent", None, &["identified_profile_alice"]),
            meta("opener", Some("identified_profile_alice"), &[]),
        ];

        // The dependent was created first but must wait for the opener.
        let next = resolver.next_task(&pending).unwrap();
        assert_eq!(next.id, "opener");
    }

    #[test]
    fn unblocks_once_the_opener_leaves_the_pending_set() {
        let resolver = TaskResolver::new();
        let pending = vec![meta("dependent", None, &["identified_profile_alice"])];

        let next = resolver.next_task(&pending).unwrap();
        assert_eq!(next.id, "dependent");
    }

    #[test]
    fn excluded_group_parks_dependents() {
        let mut resolver = TaskResolver::new();
        let opener = meta("opener", Some("identified_profile_alice"), &[]);
        resolver.deprioritize(&opener);

        let pending = vec![
            meta("dependent", None, &["identified_profile_alice"]),
            meta("free", None, &[]),
        ];
        let next = resolver.next_task(&pending).unwrap();
        assert_eq!(next.id, "free");
    }

    #[test]
    fn deprioritizing_a_groupless_task_excludes_nothing() {
        let mut resolver = TaskResolver::new();
        resolver.deprioritize(&meta("plain", None, &[]));

        let pending = vec![meta("dependent", None, &["identified_profile_alice"])];
        assert!(resolver.next_task(&pending).is_some());
    }

    #[test]
    fn reset_clears_exclusions() {
        let mut resolver = TaskResolver::new();
        resolver.deprioritize(&meta("opener", Some("identified_profile_alice"), &[]));

        let pending = vec![meta("dependent", None, &["identified_profile_alice"])];
        assert!(resolver.next_task(&pending).is_none());

        resolver.reset();
        assert!(resolver.next_task(&pending).is_some());
    }

    #[test]
    fn task_waiting_on_multiple_groups_needs_all_of_them() {
        let resolver = TaskResolver::new();
        let pending = vec![
            meta(
                "metric",
                None,
                &["identified_profile_alice", "registered_push_token_tok"],
            ),
            meta("token", Some("registered_push_token_tok"), &[]),
        ];

        // Profile group has no pending opener, token group does.
        let next = resolver.next_task(&pending).unwrap();
        assert_eq!(next.id, "token");
    }
}
