//! Pagination types for list queries

use serde::{Deserialize, Serialize};

/// Default page size for offer and transaction listings.
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Maximum page size a caller may request.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Offset/limit pagination request, 1-based pages.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamp to sane bounds: page >= 1, 1 <= page_size <= MAX_PAGE_SIZE.
    pub fn clamped(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let p = PageRequest::default();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn clamps_out_of_range_requests() {
        let p = PageRequest {
            page: 0,
            page_size: 1000,
        }
        .clamped();
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, MAX_PAGE_SIZE);

        let p = PageRequest {
            page: 3,
            page_size: 10,
        };
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), 10);
    }
}
