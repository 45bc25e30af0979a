//! Immutable value types exchanged between cluster members.
//!
//! Everything here is `serde`-serializable: these types travel inside envelopes
//! from one member's actor to another's.

pub mod data;
pub mod device;
pub mod schema;

pub use data::*;
pub use device::*;
pub use schema::*;
