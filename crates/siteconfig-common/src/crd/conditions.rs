//! Keyed condition lists with upsert semantics
//!
//! Kubernetes status condition lists are arrays on the wire but behave like a
//! map keyed by condition type: at most one entry per type, entries keep the
//! position they were first inserted at, and `lastTransitionTime` only moves
//! when `status` changes. [`ConditionSet`] implements that once for every
//! record shape via the [`ConditionRecord`] trait.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use super::types::{Condition, ConditionStatus, DeploymentCondition};

/// A condition-like record that can live in a [`ConditionSet`]
pub trait ConditionRecord: Clone {
    /// Key of the record within its list
    fn condition_type(&self) -> &str;

    /// Current status
    fn status(&self) -> ConditionStatus;

    /// Last time the status changed, if recorded
    fn last_transition_time(&self) -> Option<DateTime<Utc>>;

    /// Overwrite the transition timestamp
    fn set_last_transition_time(&mut self, at: DateTime<Utc>);

    /// Record that the condition was observed at `at`
    ///
    /// Records without a probe timestamp ignore this.
    fn observed(&mut self, _at: DateTime<Utc>) {}
}

impl ConditionRecord for Condition {
    fn condition_type(&self) -> &str {
        &self.type_
    }

    fn status(&self) -> ConditionStatus {
        self.status
    }

    fn last_transition_time(&self) -> Option<DateTime<Utc>> {
        Some(self.last_transition_time)
    }

    fn set_last_transition_time(&mut self, at: DateTime<Utc>) {
        self.last_transition_time = at;
    }
}

impl ConditionRecord for DeploymentCondition {
    fn condition_type(&self) -> &str {
        &self.type_
    }

    fn status(&self) -> ConditionStatus {
        self.status
    }

    fn last_transition_time(&self) -> Option<DateTime<Utc>> {
        self.last_transition_time
    }

    fn set_last_transition_time(&mut self, at: DateTime<Utc>) {
        self.last_transition_time = Some(at);
    }

    fn observed(&mut self, at: DateTime<Utc>) {
        self.last_probe_time = Some(at);
    }
}

/// What an upsert did to the stored record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// No record of this type existed; it was appended
    Added,
    /// The stored status differed; transition time moved to `now`
    Changed {
        /// Status before the upsert
        from: ConditionStatus,
    },
    /// Status unchanged; transition time preserved
    Unchanged,
}

/// Insertion-ordered set of condition records keyed by type
#[derive(Clone, Debug, PartialEq)]
pub struct ConditionSet<T> {
    entries: IndexMap<String, T>,
}

impl<T> Default for ConditionSet<T> {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }
}

impl<T: ConditionRecord> ConditionSet<T> {
    /// Build a set from a wire list
    ///
    /// If a type appears more than once, the first occurrence wins, matching
    /// how a linear lookup over the list would resolve it.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut entries = IndexMap::new();
        for record in records {
            entries
                .entry(record.condition_type().to_string())
                .or_insert(record);
        }
        Self { entries }
    }

    /// Look up a record by type
    pub fn get(&self, condition_type: &str) -> Option<&T> {
        self.entries.get(condition_type)
    }

    /// Check whether a record of this type exists
    pub fn contains(&self, condition_type: &str) -> bool {
        self.entries.contains_key(condition_type)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set holds no records
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or update a record, keeping the transition-time discipline
    ///
    /// A new record is appended with its transition time set to `now`. An
    /// existing record is replaced in place; its transition time moves to
    /// `now` only when the status differs from the stored one. Either way the
    /// record is marked as observed at `now`.
    pub fn upsert(&mut self, mut record: T, now: DateTime<Utc>) -> Transition {
        record.observed(now);
        match self.entries.get_mut(record.condition_type()) {
            None => {
                record.set_last_transition_time(now);
                self.entries
                    .insert(record.condition_type().to_string(), record);
                Transition::Added
            }
            Some(existing) => {
                let from = existing.status();
                let transition = if from != record.status() {
                    record.set_last_transition_time(now);
                    Transition::Changed { from }
                } else {
                    match existing.last_transition_time() {
                        Some(at) => record.set_last_transition_time(at),
                        None => record.set_last_transition_time(now),
                    }
                    Transition::Unchanged
                };
                *existing = record;
                transition
            }
        }
    }

    /// Iterate records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }

    /// Convert back into the wire list, preserving insertion order
    pub fn into_records(self) -> Vec<T> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn deployment(type_: &str, status: ConditionStatus) -> DeploymentCondition {
        DeploymentCondition::new(type_, status, "Reason", "message")
    }

    #[test]
    fn first_occurrence_of_duplicate_type_wins() {
        let set = ConditionSet::from_records(vec![
            deployment("ClusterInstallStopped", ConditionStatus::True),
            deployment("ClusterInstallStopped", ConditionStatus::False),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get("ClusterInstallStopped").unwrap().status,
            ConditionStatus::True
        );
    }

    #[test]
    fn upsert_appends_new_type_with_both_timestamps() {
        let mut set = ConditionSet::default();
        let result = set.upsert(deployment("ClusterInstallFailed", ConditionStatus::False), at(0));
        assert_eq!(result, Transition::Added);

        let stored = set.get("ClusterInstallFailed").unwrap();
        assert_eq!(stored.last_transition_time, Some(at(0)));
        assert_eq!(stored.last_probe_time, Some(at(0)));
    }

    /// Story: re-observing an unchanged status only refreshes the probe time
    #[test]
    fn story_unchanged_status_keeps_transition_time() {
        let mut set = ConditionSet::default();
        set.upsert(deployment("ClusterInstallStopped", ConditionStatus::False), at(0));

        let mut updated = deployment("ClusterInstallStopped", ConditionStatus::False);
        updated.message = "still running".to_string();
        let result = set.upsert(updated, at(60));

        assert_eq!(result, Transition::Unchanged);
        let stored = set.get("ClusterInstallStopped").unwrap();
        assert_eq!(stored.last_transition_time, Some(at(0)));
        assert_eq!(stored.last_probe_time, Some(at(60)));
        assert_eq!(stored.message, "still running");
    }

    /// Story: a status flip advances the transition time
    #[test]
    fn story_status_change_moves_transition_time() {
        let mut set = ConditionSet::default();
        set.upsert(deployment("ClusterInstallStopped", ConditionStatus::False), at(0));

        let result = set.upsert(deployment("ClusterInstallStopped", ConditionStatus::True), at(90));

        assert_eq!(
            result,
            Transition::Changed {
                from: ConditionStatus::False
            }
        );
        let stored = set.get("ClusterInstallStopped").unwrap();
        assert_eq!(stored.status, ConditionStatus::True);
        assert_eq!(stored.last_transition_time, Some(at(90)));
    }

    #[test]
    fn incoming_timestamps_do_not_override_stored_transition() {
        let mut set = ConditionSet::default();
        set.upsert(deployment("ClusterInstallCompleted", ConditionStatus::False), at(0));

        let mut incoming = deployment("ClusterInstallCompleted", ConditionStatus::False);
        incoming.last_transition_time = Some(at(-500));
        set.upsert(incoming, at(30));

        assert_eq!(
            set.get("ClusterInstallCompleted").unwrap().last_transition_time,
            Some(at(0))
        );
    }

    #[test]
    fn stored_record_without_transition_time_gets_stamped() {
        let mut set = ConditionSet::from_records(vec![deployment(
            "ClusterInstallCompleted",
            ConditionStatus::False,
        )]);
        set.upsert(deployment("ClusterInstallCompleted", ConditionStatus::False), at(5));
        assert_eq!(
            set.get("ClusterInstallCompleted").unwrap().last_transition_time,
            Some(at(5))
        );
    }

    #[test]
    fn insertion_order_is_stable_across_updates() {
        let mut set = ConditionSet::default();
        for t in ["A", "B", "C"] {
            set.upsert(deployment(t, ConditionStatus::Unknown), at(0));
        }
        set.upsert(deployment("A", ConditionStatus::True), at(10));
        set.upsert(deployment("D", ConditionStatus::True), at(10));

        let order: Vec<_> = set.iter().map(|c| c.type_.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C", "D"]);
        assert_eq!(set.into_records().len(), 4);
    }

    #[test]
    fn plain_conditions_have_no_probe_time_but_keep_transition_discipline() {
        let start = at(0);
        let mut set = ConditionSet::from_records(vec![Condition {
            type_: "Provisioned".to_string(),
            status: ConditionStatus::False,
            reason: "InProgress".to_string(),
            message: "Provisioning cluster".to_string(),
            observed_generation: None,
            last_transition_time: start,
        }]);

        let same = Condition::new("Provisioned", ConditionStatus::False, "InProgress", "again");
        assert_eq!(set.upsert(same, start + Duration::seconds(10)), Transition::Unchanged);
        assert_eq!(set.get("Provisioned").unwrap().last_transition_time, start);

        let done = Condition::new("Provisioned", ConditionStatus::True, "Completed", "done");
        set.upsert(done, start + Duration::seconds(20));
        assert_eq!(
            set.get("Provisioned").unwrap().last_transition_time,
            start + Duration::seconds(20)
        );
    }
}
