//! Integration tests for the siteconfig operator
//!
//! - `status_projection`: stories about how ClusterDeployment install progress
//!   shows up on the owning ClusterInstance
//!
//! The controller runs in-process against the test cluster; nothing needs to
//! be deployed beforehand.

mod helpers;
mod status_projection;
