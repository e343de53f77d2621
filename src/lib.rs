//! nodeboot - Node bootstrap and cloud identity resolution
//!
//! Fetches and starts the node agent on a freshly booted instance, and
//! resolves running Kubernetes nodes to their EC2 identity and labels.

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod identity;

pub use error::{NodebootError, NodebootResult};
