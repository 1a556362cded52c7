use futures_lite::future::Boxed;
#[cfg(feature = "tokio")]
use tokio::{runtime::Runtime, spawn, task::JoinHandle};

/// The background task of a [crate::ProgressEngine], represented as a pending future that needs to
/// be polled for debounced writes to happen.
///
/// The future completes once the engine has been detached or all of its handles have been
/// dropped, so spawned tasks don't have to be cancelled manually.
#[must_use = "Engine tasks still need to be spawned on an async runtime"]
pub struct EngineTasks {
    writes: Boxed<()>,
}

impl EngineTasks {
    pub(crate) fn new(writes: Boxed<()>) -> Self {
        Self { writes }
    }

    /// Spawns the pending future.
    ///
    /// This invokes the `spawner` function with the future that the engine would like to run
    /// asynchronously. The function is responsible for continuously polling it.
    pub fn spawn_with<T>(self, spawner: impl FnOnce(Boxed<()>) -> T) -> T {
        spawner(self.writes)
    }

    /// Returns the pending future, e.g. to race it against other work on a single-threaded
    /// executor.
    pub fn into_task(self) -> Boxed<()> {
        self.writes
    }

    /// Spawns the pending future as a tokio task on the given [Runtime].
    #[cfg(feature = "tokio")]
    pub fn spawn_with_tokio_runtime(self, runtime: &Runtime) -> JoinHandle<()> {
        self.spawn_with(|f| runtime.spawn(f))
    }

    /// Spawns the pending future as a tokio task on the current [Runtime].
    #[cfg(feature = "tokio")]
    pub fn spawn_with_tokio(self) -> JoinHandle<()> {
        self.spawn_with(spawn)
    }
}
