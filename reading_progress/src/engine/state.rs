use std::{fmt::Display, sync::Arc};

use serde::Serialize;

/// An opaque identifier of a book in the reading service.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BookId(Arc<str>);

impl BookId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for BookId {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The page a reader is on, together with what the reading service has confirmed.
///
/// `current_page` always satisfies `1 <= current_page <= max_pages`. The progress percentage is
/// derived from it on demand and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressState {
    book_id: BookId,
    max_pages: u32,
    current_page: u32,
    last_acknowledged_page: Option<u32>,
}

impl ProgressState {
    /// Creates a state for `book_id`.
    ///
    /// A `max_pages` of zero is raised to one. If an `initial_page` is known, it is assumed to
    /// come from the reading service and is therefore treated as acknowledged.
    pub fn new(book_id: BookId, max_pages: u32, initial_page: Option<u32>) -> Self {
        let max_pages = max_pages.max(1);
        let initial_page = initial_page.map(|page| page.clamp(1, max_pages));

        Self {
            book_id,
            max_pages,
            current_page: initial_page.unwrap_or(1),
            last_acknowledged_page: initial_page,
        }
    }

    pub fn book_id(&self) -> &BookId {
        &self.book_id
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn last_acknowledged_page(&self) -> Option<u32> {
        self.last_acknowledged_page
    }

    /// `100 * current_page / max_pages`.
    pub fn progress_percentage(&self) -> f64 {
        100.0 * f64::from(self.current_page) / f64::from(self.max_pages)
    }

    pub fn clamp_page(&self, page: i64) -> u32 {
        // max_pages fits into an i64, so the clamped value fits into an u32.
        page.clamp(1, i64::from(self.max_pages)) as u32
    }

    /// The page corresponding to `percentage`, which is expected to be between 0 and 100.
    pub fn page_for_percentage(&self, percentage: f64) -> u32 {
        // Float to int casts saturate, and clamp_page takes care of the rest.
        let page = (percentage / 100.0 * f64::from(self.max_pages)).round() as i64;
        self.clamp_page(page)
    }

    /// Stores `page` after clamping it into `[1, max_pages]`, returning the stored value.
    pub(crate) fn set_page(&mut self, page: i64) -> u32 {
        self.current_page = self.clamp_page(page);
        self.current_page
    }

    /// Raises the page count to `max_pages`. Smaller values are ignored.
    pub(crate) fn correct_max_pages(&mut self, max_pages: u32) -> bool {
        if max_pages > self.max_pages {
            self.max_pages = max_pages;
            true
        } else {
            false
        }
    }

    /// Records a page confirmed by the reading service.
    ///
    /// Returns whether this acknowledgement completes the book, meaning that the previous
    /// acknowledged page (if any) was below `max_pages` and the new one is `max_pages`.
    pub(crate) fn acknowledge(&mut self, page: u32) -> bool {
        let was_incomplete = self
            .last_acknowledged_page
            .is_none_or(|previous| previous < self.max_pages);
        self.last_acknowledged_page = Some(page);

        was_incomplete && page == self.max_pages
    }
}

/// Parses a page number typed by the user.
///
/// Returns `None` for input that isn't a number at all. Numbers outside of the valid page range
/// are returned as-is so that they can be clamped.
pub fn parse_page_input(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(page) = raw.parse::<i64>() {
        return Some(page);
    }

    match raw.parse::<f64>() {
        Ok(page) if page.is_finite() => Some(page.round() as i64),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::{BookId, ProgressState, parse_page_input};

    fn state(max_pages: u32) -> ProgressState {
        ProgressState::new(BookId::from("book"), max_pages, None)
    }

    #[test]
    fn in_range_pages_are_stored() {
        let mut state = state(250);
        for page in 1..=250 {
            assert_eq!(state.set_page(page), page as u32);
            assert_eq!(state.current_page(), page as u32);

            let expected = 100.0 * page as f64 / 250.0;
            assert!((state.progress_percentage() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let mut state = state(120);
        assert_eq!(state.set_page(0), 1);
        assert_eq!(state.set_page(-15), 1);
        assert_eq!(state.set_page(121), 120);
        assert_eq!(state.set_page(i64::MAX), 120);
        assert_eq!(state.current_page(), 120);
    }

    #[test]
    fn max_pages_has_floor() {
        let mut state = state(0);
        assert_eq!(state.max_pages(), 1);
        assert_eq!(state.set_page(5), 1);
        assert_eq!(state.progress_percentage(), 100.0);
    }

    #[test]
    fn initial_page_is_acknowledged() {
        let state = ProgressState::new(BookId::from("book"), 300, Some(400));
        assert_eq!(state.current_page(), 300);
        assert_eq!(state.last_acknowledged_page(), Some(300));
    }

    #[test]
    fn percentage_to_page() {
        let state = state(320);
        assert_eq!(state.page_for_percentage(50.0), 160);
        assert_eq!(state.page_for_percentage(0.0), 1);
        assert_eq!(state.page_for_percentage(100.0), 320);
        assert_eq!(state.page_for_percentage(150.0), 320);
        assert_eq!(state.page_for_percentage(-3.0), 1);
        assert_eq!(state.page_for_percentage(33.3), 107);
    }

    #[test]
    fn max_pages_is_only_corrected_upwards() {
        let mut state = state(100);
        state.set_page(80);

        assert!(!state.correct_max_pages(50));
        assert!(!state.correct_max_pages(100));
        assert_eq!(state.max_pages(), 100);

        assert!(state.correct_max_pages(200));
        assert_eq!(state.max_pages(), 200);
        assert_eq!(state.current_page(), 80);
        assert_eq!(state.progress_percentage(), 40.0);
    }

    #[test]
    fn completion_crossing() {
        let mut state = state(10);
        assert!(!state.acknowledge(4));
        assert!(state.acknowledge(10));
        // Confirming the last page again is not another crossing.
        assert!(!state.acknowledge(10));

        assert!(!state.acknowledge(9));
        assert!(state.acknowledge(10));
    }

    #[test]
    fn completion_from_unknown_progress() {
        let mut state = state(3);
        assert!(state.acknowledge(3));

        let mut finished = ProgressState::new(BookId::from("book"), 3, Some(3));
        assert!(!finished.acknowledge(3));
    }

    #[test]
    fn parses_input() {
        assert_eq!(parse_page_input("12"), Some(12));
        assert_eq!(parse_page_input("  42 "), Some(42));
        assert_eq!(parse_page_input("-3"), Some(-3));
        assert_eq!(parse_page_input("12.6"), Some(13));
        assert_eq!(parse_page_input("99999999999999999999"), Some(i64::MAX));

        assert_eq!(parse_page_input(""), None);
        assert_eq!(parse_page_input("abc"), None);
        assert_eq!(parse_page_input("12abc"), None);
        assert_eq!(parse_page_input("NaN"), None);
        assert_eq!(parse_page_input("inf"), None);
    }
}
