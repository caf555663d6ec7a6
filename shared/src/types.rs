//! Common types used across the platform

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Keyset position in a list ordered by `(created_at, id)` descending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed page cursor")]
pub struct CursorError;

impl PageCursor {
    pub fn new(created_at: DateTime<Utc>, id: Uuid) -> Self {
        Self { created_at, id }
    }

    /// Opaque form handed to clients
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{}|{}", self.created_at.to_rfc3339(), self.id))
    }

    pub fn decode(s: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| CursorError)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError)?;
        let (ts, id) = raw.split_once('|').ok_or(CursorError)?;

        let created_at = DateTime::parse_from_rfc3339(ts)
            .map_err(|_| CursorError)?
            .with_timezone(&Utc);
        let id = Uuid::parse_str(id).map_err(|_| CursorError)?;

        Ok(Self { created_at, id })
    }
}

/// One page of a keyset-paginated list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from a query that fetched `limit + 1` rows
    pub fn from_overfetched<F>(mut rows: Vec<T>, limit: usize, cursor_of: F) -> Self
    where
        F: Fn(&T) -> PageCursor,
    {
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|last| cursor_of(last).encode())
        } else {
            None
        };

        Self {
            data: rows,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cursor(n: u128) -> PageCursor {
        PageCursor::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            Uuid::from_u128(n),
        )
    }

    #[test]
    fn test_cursor_encode_decode() {
        let c = cursor(42);
        assert_eq!(PageCursor::decode(&c.encode()), Ok(c));
    }

    #[test]
    fn test_cursor_rejects_garbage() {
        assert_eq!(PageCursor::decode("not base64 !"), Err(CursorError));
        let no_separator = URL_SAFE_NO_PAD.encode("2024-03-01T12:00:00Z");
        assert_eq!(PageCursor::decode(&no_separator), Err(CursorError));
    }

    #[test]
    fn test_page_with_more_rows() {
        let rows: Vec<u128> = vec![5, 4, 3];
        let page = Page::from_overfetched(rows, 2, |n| cursor(*n));
        assert_eq!(page.data, vec![5, 4]);
        assert_eq!(page.next_cursor, Some(cursor(4).encode()));
    }

    #[test]
    fn test_last_page_has_no_cursor() {
        let page = Page::from_overfetched(vec![1u128, 2], 2, |n| cursor(*n));
        assert_eq!(page.data.len(), 2);
        assert!(page.next_cursor.is_none());
    }
}
