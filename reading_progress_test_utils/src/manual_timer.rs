use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use event_listener::Event;
use futures_lite::{FutureExt, future::Boxed};
use reading_progress::env::Timer;

/// A [Timer] that only advances when told to, for deterministic debounce tests.
#[derive(Clone, Default)]
pub struct ManualTimer {
    inner: Arc<ManualTimerState>,
}

#[derive(Default)]
struct ManualTimerState {
    now: Mutex<Duration>,
    advanced: Event,
}

impl ManualTimerState {
    fn has_reached(&self, deadline: Duration) -> bool {
        *self.now.lock().unwrap() >= deadline
    }
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward, completing every delay whose deadline has been reached.
    pub fn advance(&self, by: Duration) {
        {
            let mut now = self.inner.now.lock().unwrap();
            *now += by;
        }

        self.inner.advanced.notify(usize::MAX);
    }

    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis))
    }
}

impl Timer for ManualTimer {
    fn delay_once(&self, duration: Duration) -> Boxed<()> {
        let state = self.inner.clone();
        let deadline = *state.now.lock().unwrap() + duration;

        async move {
            loop {
                if state.has_reached(deadline) {
                    return;
                }

                let listener = state.advanced.listen();
                if state.has_reached(deadline) {
                    return;
                }

                listener.await;
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod test {
    use std::{
        pin::pin,
        task::{Context, Poll, Waker},
        time::Duration,
    };

    use reading_progress::env::Timer;

    use super::ManualTimer;

    #[test]
    fn completes_after_advancing() {
        let timer = ManualTimer::new();
        let mut cx = Context::from_waker(Waker::noop());

        let mut delay = pin!(timer.delay_once(Duration::from_millis(500)));
        assert_eq!(delay.as_mut().poll(&mut cx), Poll::Pending);

        timer.advance_millis(499);
        assert_eq!(delay.as_mut().poll(&mut cx), Poll::Pending);

        timer.advance_millis(1);
        assert_eq!(delay.as_mut().poll(&mut cx), Poll::Ready(()));
    }
}
