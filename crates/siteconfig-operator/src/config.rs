//! Operator configuration
//!
//! Every setting can be given as a command-line flag or through an
//! environment variable; the flag wins. Environment access goes through
//! [`EnvConfig`] so resolution can be tested without touching process state.

use std::time::Duration;

use anyhow::Context as _;
use clap::Args;

use siteconfig_common::DEFAULT_FIELD_MANAGER;
use siteconfig_deployment::controller::{DEFAULT_ERROR_REQUEUE, DEFAULT_RECONCILE_TIMEOUT};

/// Trait for reading operator settings from the environment
#[cfg_attr(test, mockall::automock)]
pub trait EnvConfig: Send + Sync {
    /// Namespace to watch (`WATCH_NAMESPACE`)
    fn watch_namespace(&self) -> Option<String>;

    /// Field manager for status patches (`SITECONFIG_FIELD_MANAGER`)
    fn field_manager(&self) -> Option<String>;

    /// Per-reconciliation deadline in seconds (`RECONCILE_TIMEOUT_SECS`)
    fn reconcile_timeout_secs(&self) -> Option<String>;

    /// Requeue delay after a failure in seconds (`ERROR_REQUEUE_SECS`)
    fn error_requeue_secs(&self) -> Option<String>;
}

/// Default implementation that reads from environment variables
#[derive(Clone, Default)]
pub struct OsEnvConfig;

impl OsEnvConfig {
    fn non_empty(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvConfig for OsEnvConfig {
    fn watch_namespace(&self) -> Option<String> {
        Self::non_empty("WATCH_NAMESPACE")
    }

    fn field_manager(&self) -> Option<String> {
        Self::non_empty("SITECONFIG_FIELD_MANAGER")
    }

    fn reconcile_timeout_secs(&self) -> Option<String> {
        Self::non_empty("RECONCILE_TIMEOUT_SECS")
    }

    fn error_requeue_secs(&self) -> Option<String> {
        Self::non_empty("ERROR_REQUEUE_SECS")
    }
}

/// Flags for the `controller` command
#[derive(Args, Debug, Clone, Default)]
pub struct ControllerArgs {
    /// Only watch this namespace (default: all namespaces)
    #[arg(long)]
    pub namespace: Option<String>,

    /// Field manager recorded on ClusterInstance status patches
    #[arg(long)]
    pub field_manager: Option<String>,

    /// Deadline for a single reconciliation, in seconds
    #[arg(long)]
    pub reconcile_timeout_secs: Option<u64>,

    /// Delay before retrying a failed reconciliation, in seconds
    #[arg(long)]
    pub error_requeue_secs: Option<u64>,
}

/// Resolved operator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Field manager for status patches
    pub field_manager: String,
    /// Deadline for one reconciliation
    pub reconcile_timeout: Duration,
    /// Base requeue delay after a failure
    pub error_requeue: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            error_requeue: DEFAULT_ERROR_REQUEUE,
        }
    }
}

impl OperatorConfig {
    /// Combine command-line flags with the environment
    pub fn resolve(args: &ControllerArgs, env: &dyn EnvConfig) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let namespace = args
            .namespace
            .clone()
            .filter(|ns| !ns.is_empty())
            .or_else(|| env.watch_namespace());

        let field_manager = args
            .field_manager
            .clone()
            .or_else(|| env.field_manager())
            .unwrap_or(defaults.field_manager);

        let reconcile_timeout = match args.reconcile_timeout_secs {
            Some(secs) => Some(secs),
            None => parse_secs("RECONCILE_TIMEOUT_SECS", env.reconcile_timeout_secs())?,
        }
        .map(Duration::from_secs)
        .unwrap_or(defaults.reconcile_timeout);

        let error_requeue = match args.error_requeue_secs {
            Some(secs) => Some(secs),
            None => parse_secs("ERROR_REQUEUE_SECS", env.error_requeue_secs())?,
        }
        .map(Duration::from_secs)
        .unwrap_or(defaults.error_requeue);

        if reconcile_timeout.is_zero() {
            anyhow::bail!("reconcile timeout must be greater than zero");
        }

        Ok(Self {
            namespace,
            field_manager,
            reconcile_timeout,
            error_requeue,
        })
    }
}

fn parse_secs(var: &str, value: Option<String>) -> anyhow::Result<Option<u64>> {
    value
        .map(|v| {
            v.trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be a whole number of seconds, got {:?}", var, v))
        })
        .transpose()
}
