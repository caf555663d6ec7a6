//! Shared types and settlement rules for the stock settlement backend
//!
//! This crate holds everything that can be decided without touching storage:
//! the documents clients submit, the order status state machine, the
//! arithmetic that accepts or rejects orders, supplies and stock counts, and
//! the stock deltas those documents apply to the ledger. It is used by the
//! backend server and, through WASM, by the admin frontend.

pub mod error;
pub mod models;
pub mod stock;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use stock::*;
pub use types::*;
pub use validation::*;
