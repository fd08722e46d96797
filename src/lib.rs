pub mod config;
pub mod error;
pub mod protocol;

/// Opaque router identifier carried on the wire.
pub type RouterId = String;

/// Path cost in hops. `protocol::COST_INFINITY` is reserved as a transient
/// unreachable marker during recomputation and never persists in a table.
pub type Cost = u32;
