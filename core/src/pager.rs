/// Cursor-based pagination shared by the conversation list, message history
/// scroll-back and the notification tray.
///
/// `next_page` hands out one request at a time with a monotonic page counter.
/// A page shorter than the page size is terminal: `complete` reports `Final`
/// exactly once and the pager never requests again.

/// One page request to be issued by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<K> {
    pub key: K,
    pub page: u32,
    pub page_size: usize,
}

/// Result of feeding a completed page back into the pager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageOutcome {
    /// More pages may exist
    More,
    /// Last page reached; run the final hook
    Final,
    /// Not the outstanding request (late or duplicate); ignore it
    Stale,
}

#[derive(Debug, Clone)]
pub struct Pager<K> {
    key: K,
    next: u32,
    page_size: usize,
    in_flight: Option<u32>,
    finished: bool,
}

impl<K: Clone> Pager<K> {
    pub fn new(key: K, first_page: u32, page_size: usize) -> Self {
        Self {
            key,
            next: first_page,
            page_size,
            in_flight: None,
            finished: false,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Next request to issue, or `None` when finished or a page is in flight
    pub fn next_page(&mut self) -> Option<PageRequest<K>> {
        if self.finished || self.in_flight.is_some() {
            return None;
        }
        let page = self.next;
        self.next += 1;
        self.in_flight = Some(page);
        Some(PageRequest {
            key: self.key.clone(),
            page,
            page_size: self.page_size,
        })
    }

    /// Feed back a successful page of `returned` items
    pub fn complete(&mut self, page: u32, returned: usize) -> PageOutcome {
        if self.in_flight != Some(page) {
            return PageOutcome::Stale;
        }
        self.in_flight = None;
        if returned < self.page_size {
            self.finished = true;
            PageOutcome::Final
        } else {
            PageOutcome::More
        }
    }

    /// Feed back a failed page. The page number is not reused.
    pub fn fail(&mut self, page: u32) -> bool {
        if self.in_flight != Some(page) {
            return false;
        }
        self.in_flight = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_page_is_final_once() {
        let mut pager = Pager::new((), 1, 50);
        let first = pager.next_page().unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(pager.complete(first.page, 50), PageOutcome::More);

        let second = pager.next_page().unwrap();
        assert_eq!(second.page, 2);
        assert_eq!(pager.complete(second.page, 30), PageOutcome::Final);
        assert!(pager.is_finished());

        assert_eq!(pager.next_page(), None);
        assert_eq!(pager.complete(second.page, 30), PageOutcome::Stale);
        assert_eq!(pager.next_page(), None);
    }

    #[test]
    fn test_in_flight_guard() {
        let mut pager = Pager::new(9i64, 1, 100);
        let req = pager.next_page().unwrap();
        assert_eq!(req.key, 9);
        assert!(pager.is_loading());
        assert_eq!(pager.next_page(), None);
        assert_eq!(pager.complete(req.page, 100), PageOutcome::More);
        assert_eq!(pager.next_page().map(|r| r.page), Some(2));
    }

    #[test]
    fn test_failure_keeps_counter_monotonic() {
        let mut pager = Pager::new((), 0, 50);
        let req = pager.next_page().unwrap();
        assert!(pager.fail(req.page));
        assert!(!pager.fail(req.page));
        assert_eq!(pager.next_page().map(|r| r.page), Some(1));
    }
}
