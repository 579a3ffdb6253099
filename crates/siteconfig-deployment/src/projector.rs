//! Mirror ClusterDeployment install conditions onto a ClusterInstance
//!
//! The mirror always holds exactly one record per install condition type.
//! Types the installer has not reported yet are mirrored as `Unknown`; types
//! outside the install set are never copied.

use chrono::{DateTime, Utc};
use tracing::debug;

use siteconfig_common::crd::{
    ConditionSet, DeploymentCondition, InstallConditionType, Transition,
};

/// Upsert every install condition from `reported` into `mirror`
///
/// Returns what happened to each type, in mirror order.
pub fn project_install_conditions(
    reported: &ConditionSet<DeploymentCondition>,
    mirror: &mut ConditionSet<DeploymentCondition>,
    now: DateTime<Utc>,
) -> Vec<(InstallConditionType, Transition)> {
    InstallConditionType::ALL
        .iter()
        .map(|&condition_type| {
            let observed = reported
                .get(condition_type.as_str())
                .cloned()
                .unwrap_or_else(|| DeploymentCondition::unknown(condition_type.as_str()));

            let transition = mirror.upsert(observed, now);
            if let Transition::Changed { from } = transition {
                debug!(
                    condition = %condition_type,
                    %from,
                    to = %mirror.get(condition_type.as_str()).map(|c| c.status).unwrap_or_default(),
                    "deployment condition transitioned"
                );
            }
            (condition_type, transition)
        })
        .collect()
}
