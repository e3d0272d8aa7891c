//! Connection Registry
//!
//! Tracks every live [`Connection`] under a single read/write lock and wires
//! each new connection to the application [`Handler`]. Lookups and broadcast
//! snapshots share the read lock; registration, removal and shutdown take the
//! write lock.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::RwLock;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use super::connection::{CloseCallback, Connection, ConnectionHooks, ConnectionSettings};
use super::dispatch::{self, Handler};
use super::error::HubError;
use super::peers::{Peers, Sender, Snapshot};
use super::transport::Transport;

/// Unique identifier for a registered connection
///
/// Always a random 128-bit value chosen by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Configuration for the registry
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Settings applied to every accepted connection
    pub connection: ConnectionSettings,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            connection: ConnectionSettings::default(),
        }
    }
}

/// State shared by the registry and every [`Peers`] view of it
pub(crate) struct Shared {
    pub(crate) connections: RwLock<HashMap<ConnectionId, Sender>>,
    accepting: AtomicBool,
    tracker: TaskTracker,
    handler: Arc<dyn Handler>,
    config: HubConfig,
}

/// Handle to the connection registry. Cloning is cheap.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    /// Create a registry that dispatches every inbound frame to `handler`
    pub fn new(handler: Arc<dyn Handler>, config: HubConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                connections: RwLock::new(HashMap::new()),
                accepting: AtomicBool::new(true),
                tracker: TaskTracker::new(),
                handler,
                config,
            }),
        }
    }

    /// Read-only view handed to request handlers
    pub fn peers(&self) -> Peers {
        Peers::new(Arc::clone(&self.shared))
    }

    /// Wrap a freshly accepted transport in a connection and register it
    pub async fn accept(&self, transport: Transport) -> Result<ConnectionId, HubError> {
        let connection = Arc::new(Connection::new(
            transport,
            self.shared.config.connection.clone(),
        ));
        self.register(connection).await
    }

    /// Register a connection, wire its callbacks and start it
    ///
    /// A rejected connection is closed before the error is returned.
    pub async fn register(&self, connection: Arc<Connection>) -> Result<ConnectionId, HubError> {
        let (id, sender) = {
            let mut connections = self.shared.connections.write().await;

            if !self.shared.accepting.load(Ordering::Acquire) {
                connection.close();
                return Err(HubError::ShuttingDown);
            }

            let limit = self.shared.config.max_connections;
            if connections.len() >= limit {
                connection.close();
                return Err(HubError::TooManyConnections(limit));
            }

            let mut id = ConnectionId::generate();
            while connections.contains_key(&id) {
                id = ConnectionId::generate();
            }

            let sender = Sender::new(id, Arc::clone(&connection));
            connections.insert(id, sender.clone());
            (id, sender)
        };

        let hooks = ConnectionHooks {
            on_frame: dispatch::frame_callback(
                sender,
                self.peers(),
                Arc::clone(&self.shared.handler),
            ),
            on_close: self.removal_callback(id, &connection),
        };
        connection.start(&self.shared.tracker, id, hooks);

        tracing::info!(connection_id = %id, "WebSocket connected");
        Ok(id)
    }

    /// Remove a connection from the registry and close it
    ///
    /// Returns whether an entry was removed. Unknown ids are ignored.
    pub async fn deregister(&self, id: &ConnectionId) -> bool {
        let removed = self.shared.connections.write().await.remove(id);
        match removed {
            Some(sender) => {
                sender.close();
                tracing::info!(connection_id = %id, "WebSocket disconnected");
                true
            }
            None => false,
        }
    }

    /// Look up a single connection
    pub async fn lookup(&self, id: &ConnectionId) -> Option<Sender> {
        self.shared.connections.read().await.get(id).cloned()
    }

    /// Enumerate all connections while holding the read lock
    pub async fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self.shared.connections.read().await)
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.shared.connections.read().await.len()
    }

    /// Stop accepting connections and close every registered one
    ///
    /// Returns immediately; each connection removes itself once stopped.
    pub async fn shutdown_all(&self) {
        let connections = self.shared.connections.write().await;
        self.shared.accepting.store(false, Ordering::Release);

        for sender in connections.values() {
            sender.close();
        }

        tracing::info!(connections = connections.len(), "Closing all connections");
    }

    /// Close every connection and wait until all reader and writer tasks exit
    pub async fn shutdown(&self) {
        self.shutdown_all().await;
        self.shared.tracker.close();
        self.shared.tracker.wait().await;
        tracing::info!("Connection registry shut down");
    }

    fn removal_callback(&self, id: ConnectionId, connection: &Arc<Connection>) -> CloseCallback {
        let shared = Arc::clone(&self.shared);
        let connection = Arc::downgrade(connection);

        Box::new(move || {
            async move {
                let mut connections = shared.connections.write().await;
                let same = connections
                    .get(&id)
                    .is_some_and(|sender| Arc::as_ptr(sender.connection()) == connection.as_ptr());
                if same {
                    connections.remove(&id);
                    tracing::info!(connection_id = %id, "WebSocket disconnected");
                }
            }
            .boxed()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::dispatch::Request;
    use crate::websocket::frame::Frame;
    use crate::websocket::transport::TransportError;
    use crate::websocket::transport::memory;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::time::Duration;

    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn handle(&self, _reply_to: &Sender, _request: Request) {}
    }

    fn registry(max_connections: usize) -> Registry {
        let config = HubConfig {
            max_connections,
            ..Default::default()
        };
        Registry::new(Arc::new(NoopHandler), config)
    }

    async fn wait_for_count(registry: &Registry, expected: usize) {
        for _ in 0..100 {
            if registry.connection_count().await == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("registry never reached {} connections", expected);
    }

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.max_connections, 1000);
        assert_eq!(config.connection.outbound_capacity, 256);
    }

    #[tokio::test]
    async fn test_register_deregister() {
        let registry = registry(10);
        let (transport, mut peer) = memory();

        let id = registry.accept(transport).await.unwrap();
        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.lookup(&id).await.is_some());

        assert!(registry.deregister(&id).await);
        assert_eq!(registry.connection_count().await, 0);
        assert!(registry.lookup(&id).await.is_none());
        // The removed connection was closed.
        assert!(peer.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_after_deregistering_live_connection() {
        let registry = registry(10);
        let (transport, _peer) = memory();

        let id = registry.accept(transport).await.unwrap();
        assert!(registry.deregister(&id).await);

        tokio::time::timeout(Duration::from_secs(2), registry.shutdown())
            .await
            .expect("shutdown stalled");
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_read_error_only_drops_that_connection() {
        let registry = registry(10);
        let (failing, failing_peer) = memory();
        let (healthy, mut healthy_peer) = memory();

        let failing_id = registry.accept(failing).await.unwrap();
        let healthy_id = registry.accept(healthy).await.unwrap();

        assert!(failing_peer.fail(TransportError::Disconnected));
        wait_for_count(&registry, 1).await;
        assert!(registry.lookup(&failing_id).await.is_none());

        let sender = registry.lookup(&healthy_id).await.unwrap();
        sender.send_text("still here").unwrap();
        assert_eq!(
            healthy_peer.recv().await,
            Some(Frame::Text("still here".to_string()))
        );
    }

    #[tokio::test]
    async fn test_deregister_is_idempotent() {
        let registry = registry(10);
        let (transport, _peer) = memory();
        let (other, _other_peer) = memory();

        let id = registry.accept(transport).await.unwrap();
        let other_id = registry.accept(other).await.unwrap();

        assert!(registry.deregister(&id).await);
        assert!(!registry.deregister(&id).await);
        assert!(!registry.deregister(&ConnectionId::generate()).await);

        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.lookup(&other_id).await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_registrations_get_distinct_ids() {
        let registry = registry(1000);
        let mut tasks = Vec::new();
        let mut peers = Vec::new();

        for _ in 0..64 {
            let (transport, peer) = memory();
            peers.push(peer);
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move { registry.accept(transport).await }));
        }

        let mut ids = HashSet::new();
        for task in tasks {
            ids.insert(task.await.unwrap().unwrap());
        }

        assert_eq!(ids.len(), 64);
        assert_eq!(registry.connection_count().await, 64);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let registry = registry(2);
        let (t1, _p1) = memory();
        let (t2, _p2) = memory();
        let (t3, mut p3) = memory();

        registry.accept(t1).await.unwrap();
        registry.accept(t2).await.unwrap();
        let result = registry.accept(t3).await;

        assert!(matches!(result, Err(HubError::TooManyConnections(2))));
        assert_eq!(registry.connection_count().await, 2);
        // The rejected transport was released.
        assert!(p3.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_peer_disconnect_deregisters() {
        let registry = registry(10);
        let (transport, mut peer) = memory();

        let id = registry.accept(transport).await.unwrap();
        peer.disconnect();

        wait_for_count(&registry, 0).await;
        assert!(registry.lookup(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_snapshot_survives_churn() {
        let registry = registry(100);
        let mut peers = Vec::new();
        for _ in 0..5 {
            let (transport, peer) = memory();
            registry.accept(transport).await.unwrap();
            peers.push(peer);
        }

        let snapshot = registry.snapshot().await;

        // Writers queue behind the snapshot's read lock.
        let mut churn = Vec::new();
        for _ in 0..5 {
            let (transport, peer) = memory();
            peers.push(peer);
            let registry = registry.clone();
            churn.push(tokio::spawn(async move { registry.accept(transport).await }));
        }
        for peer in peers.iter_mut().take(2) {
            peer.disconnect();
        }

        let mut sent = 0;
        for (_, sender) in snapshot.iter() {
            if sender.send_text("tick").is_ok() {
                sent += 1;
            }
        }
        assert_eq!(snapshot.len(), 5);
        assert!(sent <= 5);
        drop(snapshot);

        for task in churn {
            tokio::time::timeout(Duration::from_secs(1), task)
                .await
                .expect("registration stalled")
                .unwrap()
                .unwrap();
        }
        wait_for_count(&registry, 8).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_everything_and_waits() {
        let registry = registry(10);
        let mut peers = Vec::new();
        for _ in 0..3 {
            let (transport, peer) = memory();
            registry.accept(transport).await.unwrap();
            peers.push(peer);
        }

        tokio::time::timeout(Duration::from_secs(1), registry.shutdown())
            .await
            .expect("shutdown stalled");

        assert_eq!(registry.connection_count().await, 0);
        for peer in peers.iter_mut() {
            assert!(peer.recv().await.is_none());
        }

        let (late, _late_peer) = memory();
        assert!(matches!(
            registry.accept(late).await,
            Err(HubError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_shutdown_races_with_self_close() {
        let registry = registry(10);
        let mut peers = Vec::new();
        for _ in 0..4 {
            let (transport, peer) = memory();
            registry.accept(transport).await.unwrap();
            peers.push(peer);
        }

        for peer in peers.iter_mut() {
            peer.disconnect();
        }
        tokio::time::timeout(Duration::from_secs(1), registry.shutdown())
            .await
            .expect("shutdown stalled");

        assert_eq!(registry.connection_count().await, 0);
    }
}
