use std::fmt::{Debug, Formatter};
use std::sync::{Arc, atomic::Ordering};

use async_oneshot::oneshot;
use atomic_enum::atomic_enum;
use futures_lite::{FutureExt, Stream, StreamExt};
use log::{debug, info};

use crate::{
    api::{
        auth::TokenProvider, shelves::ShelfPrecondition, writer::ProgressAck,
        writer::ProgressWriter,
    },
    engine::{
        actor::{EngineCommand, WriteActor},
        options::ProgressOptions,
        scheduler::DebounceScheduler,
        state::{BookId, ProgressState, parse_page_input},
        status::{ProgressStatus, ProgressStatusData},
        tasks::EngineTasks,
    },
    env::ProgressEnvironment,
    error::ProgressError,
    util::listeners::{CallbackListenerHandle, CallbackListeners},
};

mod actor;
pub mod options;
mod scheduler;
pub mod state;
pub mod status;
pub mod tasks;

/// Synchronizes the page a reader is on for one book with the reading service.
///
/// Page changes are applied locally right away and written to the service once no further change
/// has happened for the debounce interval configured in [ProgressOptions]. Writes happen in the
/// [EngineTasks] returned by [Self::attach], which need to be spawned on an async runtime.
///
/// Handles are cheap to clone. The engine stops once [Self::detach] is called or once all handles
/// have been dropped, discarding any write that hasn't started yet.
#[derive(Clone)]
pub struct ProgressEngine {
    shared: Arc<EngineShared>,
    commands: async_channel::Sender<EngineCommand>,
}

impl ProgressEngine {
    pub fn attach(env: ProgressEnvironment, options: ProgressOptions) -> (Self, EngineTasks) {
        let state = ProgressState::new(
            options.book_id.clone(),
            options.max_pages,
            options.initial_page,
        );

        let page_listeners = CallbackListeners::default();
        if let Some(observer) = options.page_observer {
            page_listeners.listen_permanently(observer);
        }

        let shared = Arc::new(EngineShared {
            book_id: options.book_id,
            status: Arc::new(ProgressStatus::new(state)),
            page_listeners,
            token_provider: options.token_provider,
            shelves: ShelfPrecondition::new(env.client.clone()),
            writer: ProgressWriter::new(env.client.clone()),
            completion_handler: options.completion_handler,
            lifecycle: AtomicLifecycle::new(Lifecycle::Attached),
        });

        let (send, receive) = async_channel::unbounded();
        let scheduler = DebounceScheduler::new(env.timer.clone(), options.debounce_interval);
        let mut actor = WriteActor::new(shared.clone(), receive, scheduler);

        debug!("Attached progress engine for {}", shared.book_id);
        let engine = Self {
            shared,
            commands: send,
        };
        (engine, EngineTasks::new(async move { actor.run().await }.boxed()))
    }

    /// Applies a page number typed by the reader.
    ///
    /// Input that isn't a number is ignored and returns `None`. Numbers are clamped into
    /// `[1, max_pages]`, stored, reported to page observers and scheduled to be written. Returns
    /// the stored page.
    pub fn set_page_from_input(&self, raw: &str) -> Option<u32> {
        let Some(page) = parse_page_input(raw) else {
            debug!("Ignoring page input {raw:?}");
            return None;
        };

        self.apply_page(|state| state.clamp_page(page))
    }

    /// Applies a position from a percentage slider, expected to be between 0 and 100.
    ///
    /// The page is `round(percentage / 100 * max_pages)`, clamped into `[1, max_pages]`. Otherwise
    /// this behaves like [Self::set_page_from_input].
    pub fn set_page_from_percentage(&self, percentage: f64) -> Option<u32> {
        if !percentage.is_finite() {
            debug!("Ignoring percentage {percentage}");
            return None;
        }

        self.apply_page(|state| state.page_for_percentage(percentage))
    }

    fn apply_page(&self, resolve: impl FnOnce(&ProgressState) -> u32) -> Option<u32> {
        if !self.shared.is_attached() {
            debug!("Ignoring page change for detached {}", self.shared.book_id);
            return None;
        }

        let page = self.shared.status.update(|s| {
            let page = resolve(s.state());
            s.state_mut().set_page(i64::from(page))
        });

        self.shared.page_listeners.notify_all(page);
        if self.commands.try_send(EngineCommand::PageChanged).is_err() {
            debug!("Engine task has stopped, page {page} won't be written");
        }

        Some(page)
    }

    /// Raises the page count of the book, e.g. after the catalog reported a different edition.
    ///
    /// Page counts that aren't larger than the current one are ignored. Returns whether the page
    /// count has changed.
    pub fn correct_max_pages(&self, max_pages: u32) -> bool {
        let changed = self
            .shared
            .status
            .update(|s| s.state_mut().correct_max_pages(max_pages));
        if changed {
            debug!("Corrected page count of {} to {max_pages}", self.shared.book_id);
        }

        changed
    }

    /// Writes a scheduled page change immediately instead of waiting for the debounce interval.
    ///
    /// If a write is already running, this waits for it (and writes again if the page changed in
    /// the meantime). Completes with `Ok` right away if nothing is pending. Failed writes are not
    /// retried.
    pub async fn flush(&self) -> Result<(), ProgressError> {
        let (send, receive) = oneshot();
        if self.commands.send(EngineCommand::Flush(send)).await.is_err() {
            return Err(ProgressError::detached());
        }

        receive
            .await
            .unwrap_or_else(|_| Err(ProgressError::detached()))
    }

    /// Stops the engine, cancelling a scheduled write.
    ///
    /// After this call, page changes are ignored and the completion handler is no longer
    /// invoked. Call [Self::flush] first to write pending changes.
    pub async fn detach(&self) {
        self.shared.mark_detached();

        let (send, receive) = oneshot();
        if self.commands.send(EngineCommand::Detach(send)).await.is_ok() {
            let _ = receive.await;
        }
    }

    /// Registers a callback invoked synchronously with the stored page after every accepted page
    /// change. The callback is removed when the returned handle is dropped.
    pub fn on_page_change(
        &self,
        observer: impl Fn(u32) + Send + Sync + 'static,
    ) -> CallbackListenerHandle<'_, u32> {
        self.shared.page_listeners.listen(observer)
    }

    pub fn book_id(&self) -> &BookId {
        &self.shared.book_id
    }

    pub fn current_page(&self) -> u32 {
        self.status().current_page()
    }

    pub fn progress_percentage(&self) -> f64 {
        self.status().progress_percentage()
    }

    /// Returns the current [ProgressStatusData] snapshot.
    pub fn status(&self) -> Arc<ProgressStatusData> {
        self.shared.status.current_snapshot()
    }

    /// Returns an updating [Stream] of [ProgressStatusData] snapshots emitting every time the
    /// status is changed.
    pub fn watch_status(&self) -> impl Stream<Item = Arc<ProgressStatusData>> + 'static {
        self.shared.status.watch()
    }

    /// Completes once a status snapshot matching `predicate` has been observed.
    pub async fn wait_for_status(&self, mut predicate: impl FnMut(&ProgressStatusData) -> bool) {
        let mut stream = self.watch_status();
        while let Some(status) = stream.next().await {
            if predicate(&status) {
                return;
            }
        }
    }
}

impl Debug for ProgressEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressEngine")
            .field("book_id", &self.shared.book_id)
            .finish_non_exhaustive()
    }
}

/// State shared between [ProgressEngine] handles and their [WriteActor].
pub(crate) struct EngineShared {
    pub book_id: BookId,
    pub status: Arc<ProgressStatus>,
    pub page_listeners: CallbackListeners<u32>,
    token_provider: Arc<dyn TokenProvider>,
    shelves: ShelfPrecondition,
    writer: ProgressWriter,
    completion_handler: Option<Arc<dyn Fn() + Send + Sync>>,
    lifecycle: AtomicLifecycle,
}

impl EngineShared {
    pub fn is_attached(&self) -> bool {
        self.lifecycle.load(Ordering::SeqCst) == Lifecycle::Attached
    }

    pub fn mark_detached(&self) {
        if self.lifecycle.swap(Lifecycle::Detached, Ordering::SeqCst) == Lifecycle::Attached {
            info!("Detached progress engine for {}", self.book_id);
        }

        // Also runs for engines that are already detached, since an in-flight write may have
        // changed the phase in the meantime.
        self.status.update(|s| s.mark_detached());
    }

    /// Invokes the completion handler, unless the engine has been detached.
    pub fn notify_completed(&self) {
        if !self.is_attached() {
            debug!("Not reporting completion of {} after detach", self.book_id);
            return;
        }

        info!("Reader has completed {}", self.book_id);
        if let Some(handler) = &self.completion_handler {
            handler();
        }
    }

    /// Writes `page`: obtains a token, checks the reading shelf and then writes progress.
    pub async fn sync_page(&self, page: u32) -> Result<ProgressAck, ProgressError> {
        let Some(credentials) = self.token_provider.fetch_credentials().await? else {
            return Err(ProgressError::unauthenticated());
        };

        self.shelves
            .ensure_on_reading_shelf(&self.book_id, &credentials)
            .await;
        self.writer
            .write_progress(&self.book_id, page, &credentials)
            .await
    }
}

#[atomic_enum]
#[derive(PartialEq, Eq)]
enum Lifecycle {
    Attached = 0,
    Detached = 1,
}
