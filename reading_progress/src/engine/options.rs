use std::{sync::Arc, time::Duration};

use crate::{BookId, api::auth::TokenProvider};

/// Configures a [crate::ProgressEngine] for one book.
#[derive(Clone)]
pub struct ProgressOptions {
    pub(crate) book_id: BookId,
    pub(crate) max_pages: u32,
    pub(crate) initial_page: Option<u32>,
    pub(crate) debounce_interval: Duration,
    pub(crate) token_provider: Arc<dyn TokenProvider>,
    pub(crate) completion_handler: Option<Arc<dyn Fn() + Send + Sync>>,
    pub(crate) page_observer: Option<Arc<dyn Fn(u32) + Send + Sync>>,
}

impl ProgressOptions {
    /// The quiet interval after the last page change before progress is written.
    pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(
        book_id: impl Into<BookId>,
        max_pages: u32,
        token_provider: impl TokenProvider + 'static,
    ) -> Self {
        Self {
            book_id: book_id.into(),
            max_pages,
            initial_page: None,
            debounce_interval: Self::DEFAULT_DEBOUNCE_INTERVAL,
            token_provider: Arc::new(token_provider),
            completion_handler: None,
            page_observer: None,
        }
    }

    /// The page the reading service last reported for this book, if known.
    pub fn set_initial_page(&mut self, page: u32) {
        self.initial_page = Some(page);
    }

    pub fn set_debounce_interval(&mut self, interval: Duration) {
        self.debounce_interval = interval;
    }

    /// Invoked once every time a confirmed write moves the book from an incomplete state to its
    /// last page.
    pub fn set_completion_handler(&mut self, handler: impl Fn() + Send + Sync + 'static) {
        self.completion_handler = Some(Arc::new(handler));
    }

    /// Invoked synchronously with the stored page after every accepted page change, before the
    /// change is written.
    pub fn set_page_observer(&mut self, observer: impl Fn(u32) + Send + Sync + 'static) {
        self.page_observer = Some(Arc::new(observer));
    }
}
