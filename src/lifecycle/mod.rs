//! Wiring and observability of a cluster member.
//!
//! - [`ClusterConfig`] - Timeouts and mailbox sizing, from the environment or JSON
//! - [`ClusterMember`] - Spawns node actors and turns role notifications into requests
//! - [`setup_tracing`] - Installs the log subscriber

pub mod config;
pub mod member;
pub mod tracing;

pub use config::*;
pub use member::*;
pub use self::tracing::setup_tracing;
