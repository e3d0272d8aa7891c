//! Wire Messages
//!
//! Every message is a JSON object `{"kind": ..., "payload": ...}`. Unknown
//! kinds fail to decode.
//!
//! ## Client → Server
//!
//! ```json
//! {"kind": "GetOrdersRequest", "payload": {}}
//! {"kind": "AddOrderRequest", "payload": [{"priority": 1, "itemId": 9, "quantity": 20, ...}]}
//! {"kind": "UpdateOrderRequest", "payload": {"id": "...", "qtyRemove": 5}}
//! ```
//!
//! ## Server → Client
//!
//! ```json
//! {"kind": "OrdersResponse", "payload": {"orders": [...]}}
//! ```

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::book::{NewOrder, Order};

/// Messages accepted from clients
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ClientMessage {
    /// Ask for the current order list
    GetOrdersRequest(GetOrdersRequest),

    /// Create one or more orders
    AddOrderRequest(OneOrMany<NewOrder>),

    /// Reduce the quantity of an order
    UpdateOrderRequest(UpdateOrderRequest),

    /// Echoed server response. Accepted and ignored.
    OrdersResponse(IgnoredAny),
}

impl ClientMessage {
    /// Decode a raw frame payload
    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    /// Wire name of this message kind
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::GetOrdersRequest(_) => "GetOrdersRequest",
            ClientMessage::AddOrderRequest(_) => "AddOrderRequest",
            ClientMessage::UpdateOrderRequest(_) => "UpdateOrderRequest",
            ClientMessage::OrdersResponse(_) => "OrdersResponse",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GetOrdersRequest {}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub id: Uuid,
    #[serde(default)]
    pub qty_remove: i64,
}

/// A single value or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Messages sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "payload")]
pub enum ServerMessage<'a> {
    /// The full, sorted order list
    OrdersResponse(OrdersResponse<'a>),
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse<'a> {
    pub orders: &'a [Order],
}

impl<'a> ServerMessage<'a> {
    pub fn orders(orders: &'a [Order]) -> Self {
        ServerMessage::OrdersResponse(OrdersResponse { orders })
    }

    /// Encode as the text of a frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
