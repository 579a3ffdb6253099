//! Aggregate `Provisioned` condition for a ClusterInstance
//!
//! The installer reports progress as several independent conditions plus a
//! `spec.installed` flag. They are folded into one summary condition using a
//! fixed decision table, evaluated top to bottom, first match wins:
//!
//! | installed | Stopped | Completed | Failed | Provisioned                |
//! |-----------|---------|-----------|--------|----------------------------|
//! | true      | True    | True      | any    | True / Completed           |
//! | true      | False   | any       | any    | Unknown / StaleConditions  |
//! | true      | any     | False     | any    | Unknown / StaleConditions  |
//! | any       | True    | any       | True   | False / Failed             |
//! | any       | False   | any       | any    | False / InProgress         |
//!
//! Anything else leaves the current value in place. `installed` is the
//! authoritative completion signal, but the detailed conditions can lag behind
//! it, so a contradiction is reported as Unknown rather than True. Failure is
//! only reported once the install has stopped.

use chrono::{DateTime, Utc};

use siteconfig_common::crd::{
    ClusterDeployment, Condition, ConditionSet, ConditionStatus, DeploymentCondition,
    InstallConditionType, Transition, PROVISIONED_CONDITION,
};

/// Reason of the initial Provisioned condition
pub const REASON_UNKNOWN: &str = "Unknown";

/// Message of the initial Provisioned condition
pub const MESSAGE_WAITING: &str = "Waiting for provisioning to start";

/// Outcome of the decision table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProvisionedState {
    /// Installed and every condition agrees
    Completed,
    /// Installed, but the detailed conditions have not caught up
    StaleConditions,
    /// The install stopped and reported failure
    Failed,
    /// The install is still running
    InProgress,
}

impl ProvisionedState {
    /// Status written to the Provisioned condition
    pub fn status(&self) -> ConditionStatus {
        match self {
            Self::Completed => ConditionStatus::True,
            Self::StaleConditions => ConditionStatus::Unknown,
            Self::Failed | Self::InProgress => ConditionStatus::False,
        }
    }

    /// Machine-readable reason
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Completed => "Completed",
            Self::StaleConditions => "StaleConditions",
            Self::Failed => "Failed",
            Self::InProgress => "InProgress",
        }
    }

    /// Human-readable message
    pub fn message(&self) -> &'static str {
        match self {
            Self::Completed => "Provisioning completed",
            Self::StaleConditions => {
                "ClusterDeployment Spec.Installed=true, but Status.Conditions are not updated"
            }
            Self::Failed => "Provisioning failed",
            Self::InProgress => "Provisioning cluster",
        }
    }

    /// The Provisioned condition for this state
    pub fn condition(&self, now: DateTime<Utc>) -> Condition {
        Condition {
            type_: PROVISIONED_CONDITION.to_string(),
            status: self.status(),
            reason: self.reason().to_string(),
            message: self.message().to_string(),
            observed_generation: None,
            last_transition_time: now,
        }
    }
}

/// The installer signals the decision table reads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstallSignals {
    /// `spec.installed`
    pub installed: bool,
    /// Status of ClusterInstallStopped
    pub stopped: ConditionStatus,
    /// Status of ClusterInstallCompleted
    pub completed: ConditionStatus,
    /// Status of ClusterInstallFailed
    pub failed: ConditionStatus,
}

impl InstallSignals {
    /// Read the signals from a ClusterDeployment
    ///
    /// Fails with the list of absent condition types if any of Stopped,
    /// Completed or Failed has not been reported.
    pub fn from_deployment(cd: &ClusterDeployment) -> Result<Self, Vec<InstallConditionType>> {
        Self::from_conditions(cd.is_installed(), &cd.condition_set())
    }

    /// Read the signals from an installed flag and a reported condition set
    pub fn from_conditions(
        installed: bool,
        reported: &ConditionSet<DeploymentCondition>,
    ) -> Result<Self, Vec<InstallConditionType>> {
        let lookup = |t: InstallConditionType| reported.get(t.as_str()).map(|c| c.status);

        let stopped = lookup(InstallConditionType::Stopped);
        let completed = lookup(InstallConditionType::Completed);
        let failed = lookup(InstallConditionType::Failed);

        match (stopped, completed, failed) {
            (Some(stopped), Some(completed), Some(failed)) => Ok(Self {
                installed,
                stopped,
                completed,
                failed,
            }),
            _ => Err([
                (InstallConditionType::Stopped, stopped),
                (InstallConditionType::Completed, completed),
                (InstallConditionType::Failed, failed),
            ]
            .into_iter()
            .filter(|(_, status)| status.is_none())
            .map(|(t, _)| t)
            .collect()),
        }
    }
}

/// Evaluate the decision table
///
/// `None` means no rule matched and the current value should be kept.
pub fn evaluate(signals: &InstallSignals) -> Option<ProvisionedState> {
    use ConditionStatus::{False, True};

    match (
        signals.installed,
        signals.stopped,
        signals.completed,
        signals.failed,
    ) {
        (true, True, True, _) => Some(ProvisionedState::Completed),
        (true, False, _, _) | (true, _, False, _) => Some(ProvisionedState::StaleConditions),
        (_, True, _, True) => Some(ProvisionedState::Failed),
        (_, False, _, _) => Some(ProvisionedState::InProgress),
        _ => None,
    }
}

/// What the aggregate step did on this pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisionedUpdate {
    /// The condition was written
    Set {
        /// State the table selected
        state: ProvisionedState,
        /// Effect on the stored condition
        transition: Transition,
    },
    /// Signals were complete but no rule matched
    NoRuleMatched,
    /// One or more required install conditions were absent
    MissingSignals(Vec<InstallConditionType>),
}

/// Add the initial Provisioned condition if the list has none
///
/// Returns true when the condition was added.
pub fn initialize_provisioned(conditions: &mut ConditionSet<Condition>, now: DateTime<Utc>) -> bool {
    if conditions.contains(PROVISIONED_CONDITION) {
        return false;
    }
    conditions.upsert(
        Condition {
            type_: PROVISIONED_CONDITION.to_string(),
            status: ConditionStatus::Unknown,
            reason: REASON_UNKNOWN.to_string(),
            message: MESSAGE_WAITING.to_string(),
            observed_generation: None,
            last_transition_time: now,
        },
        now,
    );
    true
}

/// Recompute the Provisioned condition from a ClusterDeployment
pub fn update_provisioned(
    cd: &ClusterDeployment,
    conditions: &mut ConditionSet<Condition>,
    now: DateTime<Utc>,
) -> ProvisionedUpdate {
    let signals = match InstallSignals::from_deployment(cd) {
        Ok(signals) => signals,
        Err(missing) => return ProvisionedUpdate::MissingSignals(missing),
    };

    match evaluate(&signals) {
        Some(state) => ProvisionedUpdate::Set {
            state,
            transition: conditions.upsert(state.condition(now), now),
        },
        None => ProvisionedUpdate::NoRuleMatched,
    }
}
