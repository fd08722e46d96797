use super::compute::recompute_routes;
use super::message::RouteMessage;
use super::table::RouteTable;
use super::timers::TimerRegistry;
use super::MAX_PAYLOAD;
use crate::config::RouterConfig;
use crate::{Cost, RouterId};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, Mutex};

/// The four routing maps owned by the engine. All mutation funnels through
/// the methods here; the engine serializes access behind one lock so that
/// every recompute-then-broadcast sequence is atomic with respect to the
/// receive loop and the timer callbacks.
pub struct EngineState {
    self_id: RouterId,
    own_table: RouteTable,
    neighbor_tables: HashMap<RouterId, RouteTable>,
    forwarding_table: HashMap<RouterId, RouterId>,
}

impl EngineState {
    pub fn new(self_id: RouterId) -> Self {
        let mut own_table = RouteTable::new();
        // The link cost to ourselves is 0, for the node's whole lifetime.
        own_table.insert(self_id.clone(), 0);

        Self {
            self_id,
            own_table,
            neighbor_tables: HashMap::new(),
            forwarding_table: HashMap::new(),
        }
    }

    /// Merges an accepted advertisement from another node and recomputes.
    ///
    /// An empty table is logged and discarded without touching the previous
    /// table for that neighbor; liveness (the timer refresh upstream) and
    /// table content are independent signals. Returns whether the own table
    /// changed and should be re-advertised.
    pub fn apply_advertisement(&mut self, source: &RouterId, table: RouteTable) -> bool {
        if table.is_empty() {
            warn!("empty advertisement from {source}, keeping its previous table");
            return false;
        }

        self.neighbor_tables.insert(source.clone(), table);

        // A node we hear from directly collapses to cost 1, whatever longer
        // path we previously knew it by.
        match self.own_table.get(source) {
            Some(cost) if cost <= 1 => {}
            _ => {
                self.own_table.insert(source.clone(), 1);
                self.forwarding_table.insert(source.clone(), source.clone());
            }
        }

        self.recompute()
    }

    /// Forgets a neighbor that went silent: its advertised table, every
    /// forwarding entry routed through it and its direct cost entry, as one
    /// sequence, followed by a recomputation over what remains.
    ///
    /// A phantom expiration (empty first advertisement, so the id never made
    /// it into the tables) falls through as a no-op.
    pub fn remove_neighbor(&mut self, neighbor: &str) -> bool {
        self.neighbor_tables.remove(neighbor);
        self.forwarding_table.retain(|_, via| via != neighbor);
        self.own_table.remove(neighbor);
        self.recompute()
    }

    fn recompute(&mut self) -> bool {
        recompute_routes(
            &mut self.own_table,
            &self.neighbor_tables,
            &mut self.forwarding_table,
        )
    }

    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    pub fn own_table(&self) -> &RouteTable {
        &self.own_table
    }

    pub fn forwarding_table(&self) -> &HashMap<RouterId, RouterId> {
        &self.forwarding_table
    }

    pub fn knows_neighbor(&self, neighbor: &str) -> bool {
        self.neighbor_tables.contains_key(neighbor)
    }
}

struct EngineInner {
    config: RouterConfig,
    socket: UdpSocket,
    state: Mutex<EngineState>,
    timers: TimerRegistry,
    shutdown: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

/// A single distance-vector node: one broadcast socket, a receive loop, and
/// timer-driven keepalive/expiration callbacks sharing the engine state.
#[derive(Clone)]
pub struct RoutingEngine {
    inner: Arc<EngineInner>,
}

impl RoutingEngine {
    pub async fn new(config: RouterConfig) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.port)).await?;
        socket.set_broadcast(true)?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let state = EngineState::new(config.router_id.clone());

        Ok(Self {
            inner: Arc::new(EngineInner {
                config,
                socket,
                state: Mutex::new(state),
                timers: TimerRegistry::new(),
                shutdown: AtomicBool::new(false),
                shutdown_tx,
            }),
        })
    }

    /// Announces this node, then receives and processes advertisements until
    /// `shutdown` is called.
    pub async fn start(&self) -> anyhow::Result<()> {
        let inner = &self.inner;
        info!(
            "router {} listening on port {}",
            inner.config.router_id, inner.config.port
        );

        {
            let state = inner.state.lock().await;
            Self::broadcast_table(inner, state.own_table()).await;
        }

        let mut shutdown_rx = inner.shutdown_tx.subscribe();
        let mut buf = [0u8; MAX_PAYLOAD];

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("receive loop shutting down");
                    break;
                }
                result = inner.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, addr)) => {
                            match RouteMessage::decode(&buf[..len]) {
                                Ok(msg) => Self::handle_advertisement(inner, msg).await,
                                Err(e) => warn!("dropping datagram from {addr}: {e}"),
                            }
                        }
                        Err(e) => {
                            if inner.shutdown.load(Ordering::SeqCst) {
                                debug!("socket closed during shutdown: {e}");
                            } else {
                                warn!("socket error outside shutdown, stopping receive loop: {e}");
                            }
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_advertisement(inner: &Arc<EngineInner>, msg: RouteMessage) {
        if msg.source == inner.config.router_id {
            // Reflection of our own broadcast.
            debug!("received our own advertisement, skipping");
            return;
        }

        debug!("advertisement from {}: {:?}", msg.source, msg.table);

        // Liveness first: any advertisement from the neighbor, even a
        // useless one, restarts its inactivity clock.
        Self::schedule_expiration(inner, msg.source.clone());

        let mut state = inner.state.lock().await;
        let changed = state.apply_advertisement(&msg.source, msg.table);
        if changed {
            info!("table changed after advertisement from {}", msg.source);
            Self::broadcast_table(inner, state.own_table()).await;
        }
    }

    fn schedule_expiration(inner: &Arc<EngineInner>, neighbor: RouterId) {
        let engine = Arc::clone(inner);
        let id = neighbor.clone();
        inner.timers.schedule(
            neighbor,
            inner.config.inactivity_interval(),
            move || async move {
                Self::expire_neighbor(engine, id).await;
            },
        );
    }

    async fn expire_neighbor(inner: Arc<EngineInner>, neighbor: RouterId) {
        if inner.shutdown.load(Ordering::SeqCst) {
            return;
        }
        info!(
            "neighbor {neighbor} silent for {:?}, purging",
            inner.config.inactivity_interval()
        );

        let mut state = inner.state.lock().await;
        let changed = state.remove_neighbor(&neighbor);
        if changed {
            Self::broadcast_table(&inner, state.own_table()).await;
        }
    }

    // Returns a boxed future to break the broadcast_table -> keepalive ->
    // broadcast_table async recursion cycle for `Send` inference.
    fn keepalive(
        inner: Arc<EngineInner>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        Box::pin(async move {
            if inner.shutdown.load(Ordering::SeqCst) {
                return;
            }
            debug!("keepalive broadcast");
            let state = inner.state.lock().await;
            Self::broadcast_table(&inner, state.own_table()).await;
        })
    }

    /// Sends the table to every configured broadcast address, restarting the
    /// keepalive clock first so periodic traffic stays throttled to one
    /// broadcast per interval. Send failures abort the remaining addresses
    /// for this call; the next keepalive retries naturally.
    async fn broadcast_table(inner: &Arc<EngineInner>, table: &RouteTable) {
        let engine = Arc::clone(inner);
        inner.timers.schedule(
            inner.config.router_id.clone(),
            inner.config.keepalive_interval(),
            move || async move {
                Self::keepalive(engine).await;
            },
        );

        let msg = RouteMessage::new(inner.config.router_id.clone(), table.snapshot());
        let bytes = match msg.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("cannot broadcast table: {e}");
                return;
            }
        };

        for addr in inner.config.broadcast_addresses() {
            match inner
                .socket
                .send_to(&bytes, (addr, inner.config.port))
                .await
            {
                Ok(_) => debug!("broadcast {} bytes to {addr}", bytes.len()),
                Err(e) => {
                    warn!("broadcast to {addr} failed, aborting remaining sends: {e}");
                    break;
                }
            }
        }
    }

    /// Idempotent, callable from any thread. Unblocks the receive loop and
    /// drops pending timers best-effort; in-flight callbacks are not waited
    /// on.
    pub fn shutdown(&self) {
        if self.inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("router {} shutting down", self.inner.config.router_id);
        let _ = self.inner.shutdown_tx.send(());
        self.inner.timers.shutdown_all();
    }

    /// Read-only snapshot of the own distance vector.
    pub async fn own_table(&self) -> HashMap<RouterId, Cost> {
        self.inner.state.lock().await.own_table().as_map().clone()
    }

    /// Read-only snapshot of the forwarding table.
    pub async fn forwarding_table(&self) -> HashMap<RouterId, RouterId> {
        self.inner.state.lock().await.forwarding_table().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    fn table(entries: &[(&str, u32)]) -> RouteTable {
        entries
            .iter()
            .map(|(id, cost)| (id.to_string(), *cost))
            .collect()
    }

    /// Domains of own_table minus self and forwarding_table must match.
    fn assert_domains_consistent(state: &EngineState) {
        assert_eq!(state.own_table().get(state.self_id()), Some(0));
        for dest in state.own_table().keys() {
            if dest != state.self_id() {
                assert!(
                    state.forwarding_table().contains_key(dest),
                    "{dest} has no next hop"
                );
            }
        }
        for dest in state.forwarding_table().keys() {
            assert!(state.own_table().contains(dest), "{dest} has no cost");
        }
    }

    #[test]
    fn first_advertisement_installs_a_direct_neighbor() {
        let mut state = EngineState::new("A".to_string());
        state.apply_advertisement(&"B".to_string(), table(&[("B", 0)]));

        assert_eq!(state.own_table().as_map(), table(&[("A", 0), ("B", 1)]).as_map());
        assert_eq!(state.forwarding_table().get("B"), Some(&"B".to_string()));
        assert_domains_consistent(&state);
    }

    #[test]
    fn transitively_known_node_collapses_to_direct_on_receipt() {
        let mut state = EngineState::new("A".to_string());
        // C is two hops away, via B.
        state.apply_advertisement(&"B".to_string(), table(&[("B", 0), ("C", 1)]));
        assert_eq!(state.own_table().get("C"), Some(2));

        // Then C is heard directly.
        state.apply_advertisement(&"C".to_string(), table(&[("C", 0)]));
        assert_eq!(state.own_table().get("C"), Some(1));
        assert_eq!(state.forwarding_table().get("C"), Some(&"C".to_string()));
        assert_domains_consistent(&state);
    }

    #[test]
    fn direct_neighbor_survives_competing_transitive_claim() {
        let mut state = EngineState::new("A".to_string());
        state.apply_advertisement(&"B".to_string(), table(&[("B", 0)]));
        // C claims a one-hop path to B; the direct entry must stay at 1.
        state.apply_advertisement(&"C".to_string(), table(&[("C", 0), ("B", 1)]));

        assert_eq!(state.own_table().get("B"), Some(1));
        assert_eq!(state.forwarding_table().get("B"), Some(&"B".to_string()));
        assert_domains_consistent(&state);
    }

    #[test]
    fn removal_is_total_and_prunes_transitive_destinations() {
        let mut state = EngineState::new("A".to_string());
        // D reachable only through B.
        state.apply_advertisement(&"B".to_string(), table(&[("B", 0), ("D", 2)]));
        assert_eq!(state.own_table().get("D"), Some(3));

        state.remove_neighbor("B");

        assert_eq!(state.own_table().as_map(), table(&[("A", 0)]).as_map());
        assert!(state.forwarding_table().is_empty());
        assert!(!state.knows_neighbor("B"));
        assert_domains_consistent(&state);
    }

    #[test]
    fn empty_advertisement_does_not_clobber_the_previous_table() {
        let mut state = EngineState::new("A".to_string());
        state.apply_advertisement(&"B".to_string(), table(&[("B", 0), ("D", 1)]));
        assert_eq!(state.own_table().get("D"), Some(2));

        let changed = state.apply_advertisement(&"B".to_string(), RouteTable::new());

        assert!(!changed);
        assert!(state.knows_neighbor("B"));
        assert_eq!(state.own_table().get("D"), Some(2));
        assert_domains_consistent(&state);
    }

    #[test]
    fn reapplying_the_same_advertisement_reports_no_change() {
        let mut state = EngineState::new("A".to_string());
        let adv = table(&[("B", 0), ("E", 3)]);
        state.apply_advertisement(&"B".to_string(), adv.clone());
        let changed = state.apply_advertisement(&"B".to_string(), adv);
        assert!(!changed);
    }

    #[test]
    fn expiring_an_unknown_neighbor_is_a_noop() {
        let mut state = EngineState::new("A".to_string());
        let changed = state.remove_neighbor("ghost");
        assert!(!changed);
        assert_eq!(state.own_table().get("A"), Some(0));
    }

    #[tokio::test]
    async fn engine_starts_and_shuts_down_idempotently() {
        let config = RouterConfig {
            router_id: "A".to_string(),
            port: 0,
            keepalive_interval_ms: 50,
            inactivity_interval_ms: 150,
            broadcast_addrs: vec![Ipv4Addr::LOCALHOST],
        };
        let engine = RoutingEngine::new(config).await.unwrap();
        assert_eq!(engine.own_table().await.get("A"), Some(&0));

        let runner = engine.clone();
        let task = tokio::spawn(async move { runner.start().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        engine.shutdown();
        engine.shutdown();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("receive loop did not exit")
            .unwrap()
            .unwrap();
    }
}
