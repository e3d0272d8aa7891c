//! Senders
//!
//! [`Sender`] is the reply capability for one connection and [`Peers`] the
//! read-only view over every registered connection. Handlers receive both and
//! never touch the registry directly.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLockReadGuard;

use super::connection::Connection;
use super::error::SendError;
use super::frame::Frame;
use super::registry::{ConnectionId, Shared};

/// Outbound half of one registered connection
///
/// A `Sender` can queue frames but cannot close the connection.
#[derive(Clone)]
pub struct Sender {
    id: ConnectionId,
    connection: Arc<Connection>,
}

impl Sender {
    pub(crate) fn new(id: ConnectionId, connection: Arc<Connection>) -> Self {
        Self { id, connection }
    }

    /// Identifier of the connection this sender writes to
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a frame
    pub fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.connection.send(frame)
    }

    /// Queue a text frame
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SendError> {
        self.connection.send_text(text)
    }

    /// Queue a binary frame
    pub fn send_binary(&self, bytes: impl Into<Vec<u8>>) -> Result<(), SendError> {
        self.connection.send_binary(bytes)
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }

    /// Frames refused because this connection's queue was full
    pub fn dropped_count(&self) -> u64 {
        self.connection.dropped_count()
    }

    pub(crate) fn close(&self) {
        self.connection.close();
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl fmt::Debug for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Outcome of a broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections registered when the broadcast started
    pub recipients: usize,
    /// Frames queued successfully
    pub delivered: usize,
    /// Frames refused because the connection was closed or backed up
    pub failed: usize,
}

/// Read-only view over the registry
#[derive(Clone)]
pub struct Peers {
    shared: Arc<Shared>,
}

impl Peers {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Look up a single connection
    pub async fn lookup(&self, id: &ConnectionId) -> Option<Sender> {
        self.shared.connections.read().await.get(id).cloned()
    }

    /// Enumerate the connections registered right now
    ///
    /// The registry's read lock is held until the snapshot is dropped, so
    /// registrations and removals wait for it. Do not call `lookup` or
    /// `snapshot` again while holding one.
    pub async fn snapshot(&self) -> Snapshot<'_> {
        Snapshot::new(self.shared.connections.read().await)
    }

    /// Queue `frame` on every registered connection, the caller's included
    pub async fn broadcast(&self, frame: Frame) -> BroadcastReport {
        let snapshot = self.snapshot().await;
        let mut report = BroadcastReport {
            recipients: snapshot.len(),
            ..Default::default()
        };

        for (id, sender) in snapshot.iter() {
            match sender.send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::debug!(connection_id = %id, error = %e, "Broadcast frame dropped");
                }
            }
        }

        tracing::trace!(
            recipients = report.recipients,
            delivered = report.delivered,
            "Broadcast frame"
        );
        report
    }

    /// Broadcast a text frame
    pub async fn broadcast_text(&self, text: impl Into<String>) -> BroadcastReport {
        self.broadcast(Frame::Text(text.into())).await
    }
}

/// Point-in-time view of the registered connections
pub struct Snapshot<'a> {
    guard: RwLockReadGuard<'a, HashMap<ConnectionId, Sender>>,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(guard: RwLockReadGuard<'a, HashMap<ConnectionId, Sender>>) -> Self {
        Self { guard }
    }

    pub fn len(&self) -> usize {
        self.guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard.is_empty()
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Sender> {
        self.guard.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConnectionId, &Sender)> + '_ {
        self.guard.iter()
    }

    /// Copy the senders out so the lock can be released
    pub fn to_vec(&self) -> Vec<Sender> {
        self.guard.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::dispatch::{Handler, Request};
    use crate::websocket::registry::{HubConfig, Registry};
    use crate::websocket::transport::memory;
    use async_trait::async_trait;
    use std::time::Duration;

    struct NoopHandler;

    #[async_trait]
    impl Handler for NoopHandler {
        async fn handle(&self, _reply_to: &Sender, _request: Request) {}
    }

    fn registry() -> Registry {
        Registry::new(Arc::new(NoopHandler), HubConfig::default())
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_peer() {
        let registry = registry();
        let (t1, mut p1) = memory();
        let (t2, mut p2) = memory();
        registry.accept(t1).await.unwrap();
        registry.accept(t2).await.unwrap();

        let report = registry.peers().broadcast_text("hello").await;

        assert_eq!(
            report,
            BroadcastReport {
                recipients: 2,
                delivered: 2,
                failed: 0
            }
        );
        assert_eq!(p1.recv().await, Some(Frame::Text("hello".to_string())));
        assert_eq!(p2.recv().await, Some(Frame::Text("hello".to_string())));
    }

    #[tokio::test]
    async fn test_broadcast_counts_closed_peers_as_failed() {
        let registry = registry();
        let (t1, _p1) = memory();
        let (t2, mut p2) = memory();
        let id1 = registry.accept(t1).await.unwrap();
        registry.accept(t2).await.unwrap();

        let snapshot = registry.snapshot().await;
        snapshot.get(&id1).unwrap().close();
        let recipients = snapshot.to_vec();
        drop(snapshot);

        let mut failed = 0;
        for sender in &recipients {
            if sender.send_text("x").is_err() {
                failed += 1;
            }
        }

        assert_eq!(failed, 1);
        assert_eq!(p2.recv().await, Some(Frame::Text("x".to_string())));
    }

    #[tokio::test]
    async fn test_lookup_through_peers() {
        let registry = registry();
        let (transport, mut peer) = memory();
        let id = registry.accept(transport).await.unwrap();

        let peers = registry.peers();
        let sender = peers.lookup(&id).await.unwrap();
        assert_eq!(sender.id(), id);
        sender.send_binary(vec![1, 2, 3]).unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), peer.recv())
            .await
            .unwrap();
        assert_eq!(frame, Some(Frame::Binary(vec![1, 2, 3])));
        assert!(peers.lookup(&ConnectionId::generate()).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_broadcast() {
        let report = registry().peers().broadcast_text("nobody").await;
        assert_eq!(report, BroadcastReport::default());
    }
}
