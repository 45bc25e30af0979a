//! Mailbox plumbing shared by every actor in the crate.
//!
//! # Main Components
//!
//! - [`ask`] / [`ask_unbounded`] - Request/reply over a mailbox with a bounded wait
//! - [`FrameworkError`] - Failures of the exchange itself (closed mailbox, dropped reply, timeout)
//! - [`Registration`] - Handle that runs its cleanup exactly once
//!
//! # Testing
//!
//! See [`mock`] module for utilities to test clients without spawning full actors.

pub mod core;
pub mod mock;

// Re-export core types for convenience
pub use core::*;
