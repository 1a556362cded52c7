use std::{sync::Arc, time::Duration};

use futures_lite::future::{self, Boxed};

use crate::env::Timer;

/// A single-slot debounce timer owned by one engine.
///
/// Scheduling replaces the previously installed timer instead of queueing another one, so a burst
/// of page changes collapses into one firing after the last change. The scheduler doesn't invoke
/// anything itself: its owner awaits [Self::fired] and starts the write when it completes.
pub struct DebounceScheduler {
    timer: Arc<dyn Timer>,
    interval: Duration,
    slot: Option<Boxed<()>>,
}

impl DebounceScheduler {
    pub fn new(timer: Arc<dyn Timer>, interval: Duration) -> Self {
        Self {
            timer,
            interval,
            slot: None,
        }
    }

    /// Cancels the pending timer, if any, and starts a new one for the debounce interval.
    pub fn schedule(&mut self) {
        self.slot = Some(self.timer.delay_once(self.interval));
    }

    /// Drops the pending timer, returning whether one was installed.
    pub fn cancel(&mut self) -> bool {
        self.slot.take().is_some()
    }

    /// Drops the pending timer ahead of an immediate run.
    ///
    /// The scheduler only owns the timer, so running the debounced action is the caller's job: it
    /// must start the action right away when this returns `true`, since [Self::fired] won't
    /// complete for the cancelled timer anymore.
    pub fn cancel_and_run(&mut self) -> bool {
        self.cancel()
    }

    /// Completes once the pending timer has elapsed and clears the slot.
    ///
    /// Without a pending timer, this never completes. Dropping the returned future keeps the
    /// timer installed.
    pub async fn fired(&mut self) {
        match &mut self.slot {
            Some(timer) => {
                timer.await;
                self.slot = None;
            }
            None => future::pending().await,
        }
    }
}

#[cfg(test)]
mod test {
    use std::{
        pin::pin,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        task::Poll,
        time::Duration,
    };

    use futures_lite::{
        FutureExt,
        future::{self, Boxed},
    };
    use futures_test::task::noop_context;

    use super::DebounceScheduler;
    use crate::env::Timer;

    /// A timer whose delays complete immediately, counting how many were requested.
    #[derive(Default)]
    struct CountingTimer {
        started: AtomicUsize,
    }

    impl Timer for Arc<CountingTimer> {
        fn delay_once(&self, _duration: Duration) -> Boxed<()> {
            self.started.fetch_add(1, Ordering::SeqCst);
            future::ready(()).boxed()
        }
    }

    fn scheduler() -> (DebounceScheduler, Arc<CountingTimer>) {
        let timer = Arc::new(CountingTimer::default());
        let scheduler = DebounceScheduler::new(Arc::new(timer.clone()), Duration::from_millis(500));
        (scheduler, timer)
    }

    #[test]
    fn idle_scheduler_never_fires() {
        let (mut scheduler, _) = scheduler();
        let mut ctx = noop_context();

        let fired = pin!(scheduler.fired());
        assert_eq!(fired.poll(&mut ctx), Poll::Pending);
    }

    #[test]
    fn rescheduling_replaces_slot() {
        let (mut scheduler, timer) = scheduler();
        scheduler.schedule();
        scheduler.schedule();
        scheduler.schedule();

        assert_eq!(timer.started.load(Ordering::SeqCst), 3);

        future::block_on(scheduler.fired());
        assert!(!scheduler.cancel());

        // Only one timer was installed at a time, so nothing else fires.
        let mut ctx = noop_context();
        let fired = pin!(scheduler.fired());
        assert_eq!(fired.poll(&mut ctx), Poll::Pending);
    }

    #[test]
    fn cancel_and_run_reports_pending_timer() {
        let (mut scheduler, _) = scheduler();
        assert!(!scheduler.cancel_and_run());

        scheduler.schedule();
        assert!(scheduler.cancel_and_run());
        assert!(!scheduler.cancel_and_run());
    }

    #[test]
    fn cancel_clears_slot() {
        let (mut scheduler, _) = scheduler();
        assert!(!scheduler.cancel());

        scheduler.schedule();
        assert!(scheduler.cancel());
        assert!(!scheduler.cancel());

        let mut ctx = noop_context();
        let fired = pin!(scheduler.fired());
        assert_eq!(fired.poll(&mut ctx), Poll::Pending);
    }
}
