//! Order Handler
//!
//! Application handler behind `/order/conn`. Reads reply to the requesting
//! connection only; writes broadcast the full list to every connection.

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::book::{Order, OrderBook, UpdateOutcome};
use super::messages::{ClientMessage, ServerMessage};
use crate::websocket::{Handler, Peers, Request, Sender};

/// Shared order list plus the handler that serves it
#[derive(Debug, Default)]
pub struct OrderHandler {
    book: Mutex<OrderBook>,
}

impl OrderHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing book
    pub fn with_book(book: OrderBook) -> Self {
        Self {
            book: Mutex::new(book),
        }
    }

    /// Copy of the current order list
    pub async fn orders(&self) -> Vec<Order> {
        self.book.lock().await.orders().to_vec()
    }

    async fn send_orders(&self, reply_to: &Sender, request: &Request) {
        let book = self.book.lock().await;
        if request.is_cancelled() {
            tracing::debug!(connection_id = %request.peer_id, "Connection closed, skipping reply");
            return;
        }

        let text = match ServerMessage::orders(book.orders()).encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize orders");
                return;
            }
        };
        drop(book);

        if let Err(e) = reply_to.send_text(text) {
            tracing::debug!(connection_id = %request.peer_id, error = %e, "Orders reply dropped");
        }
    }

    /// Push the full list to everyone. Called with the book locked so that
    /// every connection sees mutations in the same order.
    async fn broadcast_orders(book: &OrderBook, peers: &Peers) {
        let text = match ServerMessage::orders(book.orders()).encode() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize orders");
                return;
            }
        };

        let report = peers.broadcast_text(text).await;
        if report.failed > 0 {
            tracing::warn!(
                recipients = report.recipients,
                failed = report.failed,
                "Orders broadcast not delivered to every connection"
            );
        }
    }
}

#[async_trait]
impl Handler for OrderHandler {
    async fn handle(&self, reply_to: &Sender, request: Request) {
        let message = match ClientMessage::decode(request.payload()) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    connection_id = %request.peer_id,
                    error = %e,
                    "Invalid client message"
                );
                return;
            }
        };

        tracing::debug!(connection_id = %request.peer_id, kind = message.kind(), "Client message");

        match message {
            ClientMessage::GetOrdersRequest(_) => {
                self.send_orders(reply_to, &request).await;
            }
            ClientMessage::AddOrderRequest(orders) => {
                let mut book = self.book.lock().await;
                let added = book.add(orders.into_vec());
                tracing::info!(
                    connection_id = %request.peer_id,
                    added,
                    total = book.len(),
                    "Orders added"
                );
                Self::broadcast_orders(&book, &request.peers).await;
            }
            ClientMessage::UpdateOrderRequest(update) => {
                let mut book = self.book.lock().await;
                match book.update(update.id, update.qty_remove) {
                    UpdateOutcome::NotFound => {
                        tracing::debug!(order_id = %update.id, "Update for unknown order ignored");
                        return;
                    }
                    UpdateOutcome::Reduced { remaining } => {
                        tracing::info!(order_id = %update.id, remaining, "Order quantity reduced");
                    }
                    UpdateOutcome::Removed => {
                        tracing::info!(order_id = %update.id, "Order fulfilled");
                    }
                }
                Self::broadcast_orders(&book, &request.peers).await;
            }
            ClientMessage::OrdersResponse(_) => {
                tracing::debug!(
                    connection_id = %request.peer_id,
                    "OrdersResponse from client ignored"
                );
            }
        }
    }
}
