//! Windowing over a commit log, counted backward from its newest end.

use serde::{Deserialize, Serialize};

/// Page size used when a caller does not ask for one
pub const DEFAULT_PAGE_LIMIT: u32 = 25;

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self { page, limit }
    }

    /// Select this page from a log stored oldest-to-newest
    pub fn apply<'a, T>(&self, log: &'a [T]) -> &'a [T] {
        paginate(log, self.page, self.limit)
    }
}

/// Return page `page` of `log` with `limit` entries per page.
///
/// Page 0 holds the `limit` most recently appended entries, page 1 the ones
/// before those, and so on. The returned slice keeps log order. A page that
/// starts beyond the log is empty; one that runs past its start is clamped.
pub fn paginate<T>(log: &[T], page: u32, limit: u32) -> &[T] {
    let total = log.len() as u64;
    let skipped = u64::from(page) * u64::from(limit);
    if limit == 0 || skipped >= total {
        return &[];
    }

    let end = (total - skipped) as usize;
    let start = end.saturating_sub(limit as usize);
    &log[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(n: u32) -> Vec<u32> {
        // 1-based positions make the window checks read naturally
        (1..=n).collect()
    }

    #[test]
    fn test_first_page_is_newest() {
        let log = log(30);
        let page = paginate(&log, 0, 25);
        assert_eq!(page.len(), 25);
        assert_eq!(page.first(), Some(&6));
        assert_eq!(page.last(), Some(&30));
    }

    #[test]
    fn test_second_page_is_clamped_at_log_start() {
        let log = log(30);
        assert_eq!(paginate(&log, 1, 25), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let log = log(30);
        assert!(paginate(&log, 2, 25).is_empty());
        assert!(paginate(&log, u32::MAX, u32::MAX).is_empty());
    }

    #[test]
    fn test_exact_boundary_is_empty() {
        let log = log(50);
        assert_eq!(paginate(&log, 1, 25).len(), 25);
        assert!(paginate(&log, 2, 25).is_empty());
    }

    #[test]
    fn test_zero_limit_and_empty_log() {
        assert!(paginate(&log(10), 0, 0).is_empty());
        assert!(paginate::<u32>(&[], 0, 25).is_empty());
    }

    #[test]
    fn test_pagination_is_deterministic() {
        let log = log(97);
        let req = PageRequest::new(3, 10);
        assert_eq!(req.apply(&log), req.apply(&log));
        assert_eq!(req.apply(&log), &log[57..67]);
    }

    #[test]
    fn test_default_request() {
        let req = PageRequest::default();
        assert_eq!(req.page, 0);
        assert_eq!(req.limit, DEFAULT_PAGE_LIMIT);
    }
}
