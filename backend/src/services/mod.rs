//! Settlement services for the stock settlement server

pub mod catalog;
pub mod inventory;
pub mod ledger;
pub mod order;
pub mod supply;

pub use catalog::CatalogService;
pub use inventory::InventoryService;
pub use ledger::Ledger;
pub use order::OrderService;
pub use supply::SupplyService;

use chrono::{DateTime, Utc};
use shared::PageCursor;
use uuid::Uuid;

/// Keyset page request resolved from query parameters
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub after: Option<PageCursor>,
    pub limit: u32,
}

impl PageRequest {
    pub(crate) fn after_created_at(&self) -> Option<DateTime<Utc>> {
        self.after.map(|c| c.created_at)
    }

    pub(crate) fn after_id(&self) -> Option<Uuid> {
        self.after.map(|c| c.id)
    }

    /// One extra row tells whether another page exists
    pub(crate) fn fetch_limit(&self) -> i64 {
        i64::from(self.limit) + 1
    }

    pub(crate) fn page_size(&self) -> usize {
        self.limit as usize
    }
}
