use std::{
    fmt::Debug,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    task::{Context, Poll},
};

use event_listener::{Event, EventListener};
use futures_lite::{FutureExt, Stream, ready};

use crate::{
    engine::state::{BookId, ProgressState},
    error::ProgressError,
};

/// An internal struct holding the current progress status, which allows notifying listeners.
pub struct ProgressStatus {
    data: Mutex<Arc<ProgressStatusData>>,
}

impl ProgressStatus {
    pub(crate) fn new(state: ProgressState) -> Self {
        Self {
            data: Mutex::new(Arc::new(ProgressStatusData::new(state))),
        }
    }

    pub fn current_snapshot(&self) -> Arc<ProgressStatusData> {
        let data = self.data.lock().unwrap();
        Arc::clone(&*data)
    }

    pub(crate) fn update<T>(&self, update: impl FnOnce(&mut ProgressStatusData) -> T) -> T {
        // Update status.
        let mut data = self.data.lock().unwrap();
        let mut new = data.new_revision();
        let res = update(&mut new);

        // Then notify listeners.
        let old_state = std::mem::replace(&mut *data, Arc::new(new));
        old_state.is_invalidated.store(true, Ordering::SeqCst);
        old_state.invalidated.notify(usize::MAX);

        res
    }

    /// Returns a [Stream] emitting the current snapshot immediately and then every time the
    /// status changes.
    ///
    /// Updates happening while the consumer is busy are coalesced, only the latest snapshot is
    /// emitted.
    pub fn watch(self: &Arc<Self>) -> impl Stream<Item = Arc<ProgressStatusData>> + 'static {
        struct StreamImpl {
            status: Arc<ProgressStatus>,
            last_data: Option<Arc<ProgressStatusData>>,
            waiter: Option<EventListener>,
        }

        impl Stream for StreamImpl {
            type Item = Arc<ProgressStatusData>;

            fn poll_next(
                mut self: Pin<&mut Self>,
                cx: &mut Context<'_>,
            ) -> Poll<Option<Self::Item>> {
                let this = &mut *self;

                let Some(last_data) = &mut this.last_data else {
                    // First poll, return immediately with the initial snapshot.
                    let data = this.status.current_snapshot();
                    this.last_data = Some(data.clone());
                    return Poll::Ready(Some(data));
                };

                loop {
                    if let Some(waiter) = &mut this.waiter {
                        ready!(waiter.poll(cx));
                        this.waiter = None;

                        let data = this.status.current_snapshot();
                        *last_data = data.clone();
                        return Poll::Ready(Some(data));
                    }

                    // Wait for previous data to become outdated.
                    let Some(listener) = last_data.listen_for_changes() else {
                        let data = this.status.current_snapshot();
                        *last_data = data.clone();
                        return Poll::Ready(Some(data));
                    };

                    this.waiter = Some(listener);
                }
            }
        }

        StreamImpl {
            status: self.clone(),
            last_data: None,
            waiter: None,
        }
    }
}

/// Where the engine is in its write cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePhase {
    /// No write is pending.
    #[default]
    Idle,
    /// A write has been scheduled and waits for the debounce interval to pass.
    Scheduled,
    /// A write is being sent to the reading service.
    Writing,
}

/// A snapshot of an engine's progress and write state.
pub struct ProgressStatusData {
    state: ProgressState,
    phase: WritePhase,
    write_error: Option<ProgressError>,
    detached: bool,

    /// Raised when a new instance is installed in [ProgressStatus].
    is_invalidated: AtomicBool,
    /// Notified when a new instance is installed in [ProgressStatus].
    invalidated: Event,
}

impl ProgressStatusData {
    fn new(state: ProgressState) -> Self {
        Self {
            state,
            phase: WritePhase::Idle,
            write_error: None,
            detached: false,
            is_invalidated: Default::default(),
            invalidated: Default::default(),
        }
    }

    fn new_revision(&self) -> Self {
        Self {
            state: self.state.clone(),
            phase: self.phase,
            write_error: self.write_error.clone(),
            detached: self.detached,
            is_invalidated: Default::default(),
            invalidated: Default::default(),
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn book_id(&self) -> &BookId {
        self.state.book_id()
    }

    pub fn current_page(&self) -> u32 {
        self.state.current_page()
    }

    pub fn max_pages(&self) -> u32 {
        self.state.max_pages()
    }

    pub fn progress_percentage(&self) -> f64 {
        self.state.progress_percentage()
    }

    pub fn last_acknowledged_page(&self) -> Option<u32> {
        self.state.last_acknowledged_page()
    }

    pub fn phase(&self) -> WritePhase {
        self.phase
    }

    pub fn is_writing(&self) -> bool {
        matches!(self.phase, WritePhase::Writing)
    }

    /// The error of the most recent write, cleared once a write succeeds.
    pub fn write_error(&self) -> Option<&ProgressError> {
        self.write_error.as_ref()
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Whether the reading service has confirmed the last page of the book.
    pub fn is_completed(&self) -> bool {
        self.state.last_acknowledged_page() == Some(self.state.max_pages())
    }

    /// Returns an [EventListener] that completes once this data is stale, or returns [None]
    /// immediately if this is already stale.
    pub(crate) fn listen_for_changes(&self) -> Option<EventListener> {
        if self.is_invalidated.load(Ordering::SeqCst) {
            return None;
        }

        let listener = self.invalidated.listen();
        if self.is_invalidated.load(Ordering::SeqCst) {
            return None;
        }

        Some(listener)
    }

    pub(crate) fn state_mut(&mut self) -> &mut ProgressState {
        &mut self.state
    }

    pub(crate) fn set_phase(&mut self, phase: WritePhase) {
        self.phase = phase;
    }

    pub(crate) fn set_write_error(&mut self, error: ProgressError) {
        self.write_error = Some(error);
    }

    pub(crate) fn clear_write_error(&mut self) {
        self.write_error = None;
    }

    pub(crate) fn mark_detached(&mut self) {
        self.detached = true;
        self.phase = WritePhase::Idle;
    }
}

impl Debug for ProgressStatusData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStatusData")
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("write_error", &self.write_error)
            .field("detached", &self.detached)
            .finish()
    }
}
