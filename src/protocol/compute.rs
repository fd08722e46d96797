use super::table::RouteTable;
use super::COST_INFINITY;
use crate::RouterId;
use log::debug;
use std::collections::HashMap;

/// One distance-vector relaxation pass over the current engine state.
///
/// Ground truth is never recomputed here: self stays at 0 and direct
/// neighbors stay at 1, both maintained solely by advertisement receipt.
/// Everything learned transitively is reset to `COST_INFINITY`, re-derived as
/// the minimum of 1 + neighbor-advertised cost, and pruned if no neighbor
/// still offers a path.
///
/// Returns true when a destination was added or a surviving destination's
/// cost moved, i.e. when the new table is worth re-advertising. Ties between
/// neighbors offering the same candidate cost fall to map iteration order.
pub fn recompute_routes(
    own_table: &mut RouteTable,
    neighbor_tables: &HashMap<RouterId, RouteTable>,
    forwarding_table: &mut HashMap<RouterId, RouterId>,
) -> bool {
    let previous = own_table.snapshot();

    // Reset every transitively learned cost; self (0) and direct
    // neighbors (1) are untouched.
    for dest in previous.keys() {
        if previous.get(dest).unwrap_or(0) > 1 {
            own_table.insert(dest.clone(), COST_INFINITY);
        }
    }

    // Relax through every neighbor's advertised table.
    for (neighbor_id, table) in neighbor_tables {
        for (dest, &advertised) in table.iter() {
            let candidate = advertised.saturating_add(1);
            match own_table.get(dest) {
                None => {
                    own_table.insert(dest.clone(), candidate);
                    forwarding_table.insert(dest.clone(), neighbor_id.clone());
                }
                // current > 1 keeps direct adjacency authoritative and
                // lets both reset and freshly inserted entries relax down.
                Some(current) if current > 1 && candidate < current => {
                    own_table.insert(dest.clone(), candidate);
                    forwarding_table.insert(dest.clone(), neighbor_id.clone());
                }
                Some(_) => {}
            }
        }
    }

    // Prune whatever no neighbor reaches anymore.
    for dest in own_table.keys_with_cost(COST_INFINITY) {
        own_table.remove(&dest);
        forwarding_table.remove(&dest);
        debug!("removed path to {dest}, no longer reachable");
    }

    // Changed iff a destination appeared or a shared one moved.
    own_table
        .iter()
        .any(|(dest, cost)| previous.get(dest) != Some(*cost))
}
