//! Page windows and next/previous descriptors.

use crate::document::Document;
use serde::Serialize;

/// Half-open index range `[start_index, end_index)` of one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub start_index: usize,
    pub end_index: usize,
}

impl PageWindow {
    /// Window for a 1-based `page` of `limit` items. Saturates on overflow.
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            start_index: page.saturating_sub(1).saturating_mul(limit),
            end_index: page.saturating_mul(limit),
        }
    }
}

/// Reference to an adjacent page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageDescriptor {
    pub page: usize,
    pub limit: usize,
}

/// Links to the neighbouring pages, present only when they hold records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Pagination {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<PageDescriptor>,
}

impl Pagination {
    /// `next` iff records remain past the window, `previous` iff the window
    /// does not start at the first record.
    pub fn compute(page: usize, limit: usize, total: usize) -> Self {
        let window = PageWindow::new(page, limit);
        Self {
            next: (window.end_index < total).then(|| PageDescriptor {
                page: page.saturating_add(1),
                limit,
            }),
            previous: (window.start_index > 0).then(|| PageDescriptor {
                page: page - 1,
                limit,
            }),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone)]
pub struct PageResult {
    /// Number of records matching the filter.
    pub total: usize,
    /// Number of records in `data`.
    pub count: usize,
    pub pagination: Pagination,
    pub data: Vec<Document>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window() {
        assert_eq!(
            PageWindow::new(1, 25),
            PageWindow {
                start_index: 0,
                end_index: 25
            }
        );
        assert_eq!(
            PageWindow::new(3, 10),
            PageWindow {
                start_index: 20,
                end_index: 30
            }
        );
        let huge = PageWindow::new(usize::MAX, 1000);
        assert_eq!(huge.end_index, usize::MAX);
    }

    #[test]
    fn test_first_page_of_many() {
        let p = Pagination::compute(1, 10, 35);
        assert_eq!(p.next, Some(PageDescriptor { page: 2, limit: 10 }));
        assert_eq!(p.previous, None);
    }

    #[test]
    fn test_middle_page() {
        let p = Pagination::compute(2, 10, 35);
        assert_eq!(p.next, Some(PageDescriptor { page: 3, limit: 10 }));
        assert_eq!(p.previous, Some(PageDescriptor { page: 1, limit: 10 }));
    }

    #[test]
    fn test_exact_last_page() {
        let p = Pagination::compute(4, 10, 40);
        assert_eq!(p.next, None);
        assert_eq!(p.previous, Some(PageDescriptor { page: 3, limit: 10 }));
    }

    #[test]
    fn test_page_past_end_still_links_back() {
        let p = Pagination::compute(9, 10, 5);
        assert_eq!(p.next, None);
        assert_eq!(p.previous, Some(PageDescriptor { page: 8, limit: 10 }));
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(Pagination::compute(1, 25, 0), Pagination::default());
    }

    #[test]
    fn test_serialized_shape() {
        let p = Pagination::compute(2, 5, 6);
        assert_eq!(
            serde_json::to_value(&p).unwrap(),
            serde_json::json!({"previous": {"page": 1, "limit": 5}})
        );
    }
}
