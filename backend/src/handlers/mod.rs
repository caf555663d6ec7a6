//! HTTP handlers

pub mod health;
pub mod inventory;
pub mod order;
pub mod product;
pub mod supply;

pub use health::*;
pub use inventory::*;
pub use order::*;
pub use product::*;
pub use supply::*;

use serde::Deserialize;
use shared::PageCursor;

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};
use crate::services::PageRequest;

/// `?cursor=&limit=` on list endpoints
#[derive(Debug, Default, Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<String>,
    pub limit: Option<u32>,
}

impl CursorQuery {
    pub fn page(&self, paging: &PaginationConfig) -> AppResult<PageRequest> {
        let after = match self.cursor.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(
                PageCursor::decode(raw).map_err(|e| AppError::validation("cursor", e.to_string()))?,
            ),
        };

        Ok(PageRequest {
            after,
            limit: paging.clamp(self.limit),
        })
    }
}
