pub mod compute;
pub mod engine;
pub mod message;
pub mod table;
pub mod timers;

pub use engine::RoutingEngine;
pub use message::RouteMessage;
pub use table::RouteTable;

use crate::Cost;

/// Largest accepted advertisement payload. Matches the receive buffer;
/// anything bigger is rejected, never truncated.
pub const MAX_PAYLOAD: usize = 4096;

/// Transient unreachable marker used during recomputation. Never present in a
/// table once a pass has completed.
pub const COST_INFINITY: Cost = Cost::MAX;
