//! Order Book
//!
//! The shared list of open orders, kept sorted at all times.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use uuid::Uuid;

use super::catalog;

/// Order urgency. Lower values sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i64);

impl Priority {
    pub fn name(&self) -> &'static str {
        match self.0 {
            1 => "Top",
            2 => "High",
            3 => "Regular",
            4 => "Low",
            5 => "Standing",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An open order as shown to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub priority: Priority,
    pub priority_name: String,
    pub item_id: i64,
    pub item_name: String,
    pub item_icon: String,
    pub quantity: i64,
    pub location: String,
    pub method: String,
    pub creator: String,
}

impl Order {
    /// Create an order with a fresh id, resolving the item against the catalog
    pub fn new(request: NewOrder) -> Self {
        let item = catalog::lookup(request.item_id);
        let priority = Priority(request.priority);

        Self {
            id: Uuid::new_v4(),
            priority,
            priority_name: priority.name().to_string(),
            item_id: item.id,
            item_name: item.name.to_string(),
            item_icon: item.icon.to_string(),
            quantity: request.quantity,
            location: request.location,
            method: request.method,
            creator: request.creator,
        }
    }

    /// Display order: priority, item name, location, quantity, creator
    fn display_cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.item_name.cmp(&other.item_name))
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| self.quantity.cmp(&other.quantity))
            .then_with(|| self.creator.cmp(&other.creator))
    }
}

/// Client-supplied fields of a new order. Missing fields take zero values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewOrder {
    pub priority: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub location: String,
    pub method: String,
    pub creator: String,
}

/// Result of [`OrderBook::update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// No order has that id
    NotFound,
    /// Quantity reduced; the order is still open
    Reduced { remaining: i64 },
    /// Quantity reached zero or below; the order was removed
    Removed,
}

/// Sorted list of open orders
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append new orders and restore display order. Returns how many were added.
    pub fn add(&mut self, requests: impl IntoIterator<Item = NewOrder>) -> usize {
        let before = self.orders.len();
        self.orders.extend(requests.into_iter().map(Order::new));
        self.orders.sort_by(Order::display_cmp);
        self.orders.len() - before
    }

    /// Take `qty_remove` units off an order, removing it once nothing remains
    pub fn update(&mut self, id: Uuid, qty_remove: i64) -> UpdateOutcome {
        let Some(idx) = self.orders.iter().position(|order| order.id == id) else {
            return UpdateOutcome::NotFound;
        };

        let order = &mut self.orders[idx];
        order.quantity = order.quantity.saturating_sub(qty_remove);
        if order.quantity <= 0 {
            self.orders.remove(idx);
            UpdateOutcome::Removed
        } else {
            UpdateOutcome::Reduced {
                remaining: order.quantity,
            }
        }
    }

    pub fn get(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == id)
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}
