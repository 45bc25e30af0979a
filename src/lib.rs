#![doc(html_logo_url = "https://www.rust-lang.org/logos/rust-logo-128x128.png")]
#![doc(html_favicon_url = "https://www.rust-lang.org/favicon.ico")]
//! # Device Mount Cluster
//!
//! > **Master/slave mount points for managed network devices, built from Tokio actors.**
//!
//! When a cluster of controllers manages a remote device, exactly one member holds the live
//! device session (the *master*). Every other member is a *slave*: it publishes the same
//! device services locally, but each call is forwarded to the master, so device I/O happens
//! once per logical operation no matter where it was issued.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### Why actors?
//!
//! - **Per-device serialization**: one [`NodeActor`](node_actor::NodeActor) per device per
//!   member, handling one message at a time.
//! - **Per-transaction serialization**: one [`TransactionActor`](tx_actor::TransactionActor)
//!   per device transaction, owning the handle exclusively.
//! - **No shared mutable state**: role-scoped resources live inside the actor that owns
//!   them; only the schema repository and the mount registry are shared, and they do their
//!   own locking.
//!
//! ## 🚀 Core Concepts
//!
//! ### Role-tagged state
//! A node actor is `Uninitialized`, `Master` (live session, shared read transaction) or
//! `Slave` (master address, schema resolution, proxy mount point). Requests that need a
//! role the node does not have get an explicit failure reply, never a crash.
//!
//! ### Schema bootstrap
//! A slave fetches schema sources from the master lazily and retries on ask-timeouts
//! forever, with decaying log verbosity. Any other failure aborts and releases the partial
//! registrations. See [`schema::SchemaResolver`].
//!
//! ### Mocking: Testing without Pain
//! [`framework::mock`] answers node and transaction mailboxes from tests;
//! [`device::mock`] is a journaled in-memory device.
//!
//! ## 👩‍💻 Architecture Notes
//!
//! ### 1. Type-Safe Error Handling
//! Every reply channel carries a [`NodeError`](node_actor::NodeError). Collaborator errors
//! (`DeviceError`, `SchemaError`, `MountError`) and [`FrameworkError`](framework::FrameworkError)
//! convert into it with `#[from]` and stay reachable through `source()`, which is how the
//! schema retry policy finds an ask-timeout under several layers of wrapping.
//!
//! ### 2. Idle Reclamation
//! Write transactions abandoned by their caller are cancelled after the configured idle
//! timeout. Abandoned data-tree sessions discard their candidate changes and unlock.
//! See [`lifecycle::ClusterConfig`].
//!
//! ### 3. Observability
//! `tracing` with structured `device` / `actor` fields everywhere.
//! See the [`lifecycle::tracing`] module for details.
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Plumbing ([`framework`], [`messages`], [`model`])
//! The ask pattern with a bounded wait, registration handles, the envelope enums and the
//! value types they carry.
//!
//! ### 2. The Actors ([`node_actor`], [`tx_actor`])
//! The role state machine, the per-transaction proxy with its read/write adapters, and the
//! data-tree session actor.
//!
//! ### 3. The Interface ([`clients`])
//! [`NodeClient`](clients::NodeClient), [`TxClient`](clients::TxClient) and
//! [`DataTreeClient`](clients::DataTreeClient), plus the slave-side proxies implementing
//! the device traits on top of them.
//!
//! ### 4. The Collaborators ([`device`], [`schema`], [`mount`])
//! What the actors consume: the device session, the schema repository and the mount point
//! registry.
//!
//! ### 5. The Orchestrator ([`lifecycle`])
//! [`ClusterMember`](lifecycle::ClusterMember) spawns node actors and turns role
//! notifications into requests.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # Run the two-member demo with info logs
//! RUST_LOG=info cargo run
//!
//! # Run the tests
//! cargo test
//! ```

pub mod clients;
pub mod device;
pub mod framework;
pub mod lifecycle;
pub mod messages;
pub mod model;
pub mod mount;
pub mod node_actor;
pub mod schema;
pub mod tx_actor;
