//! # Observability & Tracing
//!
//! ## Overview
//!
//! The [`setup_tracing`] function initializes structured logging with the `tracing` crate.
//! Every log line carries the device it concerns (`device=RemoteDevice{r1}`) and, for
//! transaction actors, the actor name (`actor=r1/read-write-3`).
//!
//! ## Configuration
//!
//! The compact format hides the crate/module prefix (`with_target(false)`); levels come
//! from the `RUST_LOG` environment variable.
//!
//! ## What Gets Traced
//!
//! - **Node Actors**: start/stop, role changes, mount point registration and withdrawal
//! - **Transaction Actors**: creation, commit/cancel, idle-timeout reclamation (`warn`)
//! - **Schema Resolution**: retries on ask-timeout (`warn`, first five attempts then every
//!   tenth) and aborted resolutions (`error`)
//! - **Client Calls**: one span per request, with the request payload at `debug`
//!
//! ## Usage Examples
//!
//! ```bash
//! # Lifecycle only
//! RUST_LOG=info cargo run
//!
//! # Every message between actors
//! RUST_LOG=debug cargo run
//!
//! # Focus on schema bootstrap
//! RUST_LOG=device_mount_cluster::schema=debug cargo run
//! ```
//!
//! ## Failover Trace Example
//!
//! **With `RUST_LOG=info`**, a slave taking over after its master went away:
//!
//! ```text
//! INFO Slave role released device=RemoteDevice{r1} master=RemoteDevice{r1}
//! INFO Initialized as master device=RemoteDevice{r1} sources=2 refreshed=false
//! INFO Mount point registered device=RemoteDevice{r1}
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false) // Don't show module paths - device/actor fields identify the source
        .compact() // Compact format shows spans inline (e.g., "follow:register_as_slave_of")
        .init();
}
