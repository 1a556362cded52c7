use std::{sync::Arc, time::Duration};

use futures_lite::future::Boxed;
use http_client::HttpClient;

/// A source of delays used to debounce progress writes.
///
/// The engine is executor-agnostic, so it can't sleep on its own. Implementations are available
/// for tokio ([ProgressEnvironment::default_timer]) and `async-io`
/// ([ProgressEnvironment::async_io_timer]).
pub trait Timer: Send + Sync {
    /// Returns a future completing once `duration` has elapsed, measured from the time this
    /// method is called.
    fn delay_once(&self, duration: Duration) -> Boxed<()>;
}

/// The HTTP client and timer shared by progress engines.
#[derive(Clone)]
pub struct ProgressEnvironment {
    pub(crate) client: Arc<dyn HttpClient>,
    pub(crate) timer: Arc<dyn Timer>,
}

impl ProgressEnvironment {
    pub fn custom(client: Arc<dyn HttpClient>, timer: Box<dyn Timer>) -> Self {
        Self {
            client,
            timer: Arc::from(timer),
        }
    }

    /// A [Timer] backed by `tokio::time`, which must be polled inside a tokio runtime with the
    /// time driver enabled.
    #[cfg(feature = "tokio")]
    pub fn default_timer() -> impl Timer {
        use futures_lite::FutureExt;

        struct TokioTimer;

        impl Timer for TokioTimer {
            fn delay_once(&self, duration: Duration) -> Boxed<()> {
                tokio::time::sleep(duration).boxed()
            }
        }

        TokioTimer
    }

    #[cfg(feature = "smol")]
    pub fn async_io_timer() -> impl Timer {
        use futures_lite::FutureExt;

        struct AsyncIoTimer;

        impl Timer for AsyncIoTimer {
            fn delay_once(&self, duration: Duration) -> Boxed<()> {
                let timer = async_io::Timer::after(duration);
                async move {
                    timer.await;
                }
                .boxed()
            }
        }

        AsyncIoTimer
    }
}
