//! Order Board
//!
//! A shared list of supply orders kept in sync across every connected client.
//!
//! - **catalog**: the fixed item catalog
//! - **book**: order list state, sorting and fulfilment
//! - **messages**: the `kind`/`payload` JSON envelope
//! - **handler**: [`OrderHandler`], the hub handler serving the board

pub mod book;
pub mod catalog;
pub mod handler;
pub mod messages;

pub use book::{NewOrder, Order, OrderBook, Priority, UpdateOutcome};
pub use catalog::Item;
pub use handler::OrderHandler;
pub use messages::{ClientMessage, OneOrMany, ServerMessage, UpdateOrderRequest};
