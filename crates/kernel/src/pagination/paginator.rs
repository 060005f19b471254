//! Paginated result views shared by both backends.

use serde_json::Value;

/// A page of items without a known total.
pub trait PartialPaginator: Send + Sync {
    /// Number of items on this page.
    fn count(&self) -> usize;

    /// Rows on this page, in query order.
    fn items(&self) -> &[Value];

    /// 1-based page number.
    fn current_page(&self) -> f64;

    /// Requested page size, which may exceed [`count`](Self::count).
    fn items_per_page(&self) -> f64;
}

/// A page of items with a known total.
pub trait Paginator: PartialPaginator {
    /// Rows matched across all pages.
    fn total_items(&self) -> f64;

    /// Last page number; 1 for an empty collection.
    fn last_page(&self) -> f64;

    /// Whether a page follows this one.
    fn has_next_page(&self) -> bool {
        self.last_page() > self.current_page()
    }
}

/// 1-based page of the row at `first_result`.
pub fn current_page(first_result: u64, items_per_page: i64) -> f64 {
    if items_per_page <= 0 {
        return 1.0;
    }
    (first_result as f64 / items_per_page as f64).floor() + 1.0
}

/// Last page number; never below 1.
pub fn last_page(total_items: u64, items_per_page: i64) -> f64 {
    if items_per_page <= 0 {
        return 1.0;
    }
    (total_items as f64 / items_per_page as f64).ceil().max(1.0)
}

/// Paginator over a slice of an offset/limit query with a count.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    items: Vec<Value>,
    first_result: u64,
    max_results: i64,
    total_items: u64,
}

impl OffsetPaginator {
    pub fn new(items: Vec<Value>, first_result: u64, max_results: i64, total_items: u64) -> Self {
        Self {
            items,
            first_result,
            max_results,
            total_items,
        }
    }

    pub fn first_result(&self) -> u64 {
        self.first_result
    }

    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}

impl PartialPaginator for OffsetPaginator {
    fn count(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> &[Value] {
        &self.items
    }

    fn current_page(&self) -> f64 {
        current_page(self.first_result, self.max_results)
    }

    fn items_per_page(&self) -> f64 {
        self.max_results as f64
    }
}

impl Paginator for OffsetPaginator {
    fn total_items(&self) -> f64 {
        self.total_items as f64
    }

    fn last_page(&self) -> f64 {
        last_page(self.total_items, self.max_results)
    }
}

/// Count-less paginator; "more" means a full page came back.
#[derive(Debug, Clone)]
pub struct PartialOffsetPaginator {
    items: Vec<Value>,
    first_result: u64,
    max_results: i64,
}

impl PartialOffsetPaginator {
    pub fn new(items: Vec<Value>, first_result: u64, max_results: i64) -> Self {
        Self {
            items,
            first_result,
            max_results,
        }
    }

    pub fn has_more(&self) -> bool {
        self.count() as f64 == self.items_per_page()
    }
}

impl PartialPaginator for PartialOffsetPaginator {
    fn count(&self) -> usize {
        self.items.len()
    }

    fn items(&self) -> &[Value] {
        &self.items
    }

    fn current_page(&self) -> f64 {
        current_page(self.first_result, self.max_results)
    }

    fn items_per_page(&self) -> f64 {
        self.max_results as f64
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i})).collect()
    }

    #[test]
    fn third_page_of_forty_five() {
        let paginator = OffsetPaginator::new(rows(10), 20, 10, 45);
        assert_eq!(paginator.current_page(), 3.0);
        assert_eq!(paginator.last_page(), 5.0);
        assert_eq!(paginator.total_items(), 45.0);
        assert_eq!(paginator.count(), 10);
        assert!(paginator.has_next_page());
    }

    #[test]
    fn last_page_never_below_one() {
        assert_eq!(last_page(0, 10), 1.0);
        assert_eq!(last_page(1, 10), 1.0);
        assert_eq!(last_page(10, 10), 1.0);
        assert_eq!(last_page(11, 10), 2.0);
        for total in 0..200_u64 {
            for per_page in 1..25_i64 {
                let expected = ((total as f64) / (per_page as f64)).ceil().max(1.0);
                assert_eq!(last_page(total, per_page), expected);
            }
        }
    }

    #[test]
    fn zero_items_per_page_is_single_page() {
        let paginator = OffsetPaginator::new(Vec::new(), 0, 0, 12);
        assert_eq!(paginator.current_page(), 1.0);
        assert_eq!(paginator.last_page(), 1.0);
        assert!(!paginator.has_next_page());
    }

    #[test]
    fn current_page_inverts_first_result() {
        for per_page in 1..20_i64 {
            for page in 1..50_u64 {
                let first = (page - 1) * per_page as u64;
                assert_eq!(current_page(first, per_page), page as f64);
            }
        }
    }

    #[test]
    fn partial_has_more_when_page_is_full() {
        assert!(PartialOffsetPaginator::new(rows(5), 0, 5).has_more());
        let short = PartialOffsetPaginator::new(rows(4), 10, 5);
        assert!(!short.has_more());
        assert_eq!(short.current_page(), 3.0);
    }
}
