use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A set of synchronous callbacks invoked with a value of type `T`.
///
/// Callbacks are invoked without holding the internal lock, so a callback may register or drop
/// listeners (including itself) while it runs.
pub struct CallbackListeners<T> {
    raw_listeners: Mutex<Vec<CallbackListener<T>>>,
}

impl<T> Default for CallbackListeners<T> {
    fn default() -> Self {
        Self {
            raw_listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Copy> CallbackListeners<T> {
    /// Registers `callback` until the returned [CallbackListenerHandle] is dropped.
    pub fn listen<F: Fn(T) + Send + Sync + 'static>(
        &self,
        callback: F,
    ) -> CallbackListenerHandle<'_, T> {
        let listener: Callback<T> = Arc::new(callback);
        let deactivated = Arc::new(AtomicBool::new(false));
        self.install(listener.clone(), deactivated.clone());

        CallbackListenerHandle {
            group: self,
            listener,
            deactivated,
        }
    }

    /// Registers `callback` for as long as these listeners exist.
    pub fn listen_permanently(&self, callback: Callback<T>) {
        self.install(callback, Arc::new(AtomicBool::new(false)));
    }

    fn install(&self, listener: Callback<T>, deactivated: Arc<AtomicBool>) {
        let mut raw_listeners = self.raw_listeners.lock().unwrap();
        raw_listeners.push(CallbackListener {
            listener,
            deactivated,
        });
    }

    pub fn notify_all(&self, value: T) {
        let active: Vec<CallbackListener<T>> = {
            let raw_listeners = self.raw_listeners.lock().unwrap();
            raw_listeners.clone()
        };

        for listener in active {
            // A previous callback may have dropped this one.
            if !listener.deactivated.load(Ordering::SeqCst) {
                (listener.listener)(value);
            }
        }
    }
}

struct CallbackListener<T> {
    listener: Callback<T>,
    deactivated: Arc<AtomicBool>,
}

impl<T> Clone for CallbackListener<T> {
    fn clone(&self) -> Self {
        Self {
            listener: self.listener.clone(),
            deactivated: self.deactivated.clone(),
        }
    }
}

pub struct CallbackListenerHandle<'a, T> {
    group: &'a CallbackListeners<T>,
    listener: Callback<T>,
    deactivated: Arc<AtomicBool>,
}

impl<T> Drop for CallbackListenerHandle<'_, T> {
    fn drop(&mut self) {
        self.deactivated.store(true, Ordering::SeqCst);

        let mut raw_listeners = self.group.raw_listeners.lock().unwrap();
        raw_listeners.retain(|listener| !Arc::ptr_eq(&listener.listener, &self.listener))
    }
}

#[cfg(test)]
mod test {
    use crate::util::listeners::CallbackListeners;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::{Arc, LazyLock, Mutex};

    #[test]
    fn notify() {
        let last_page = Arc::new(AtomicU32::new(0));
        let listeners = CallbackListeners::<u32>::default();
        let listener = listeners.listen({
            let last_page = last_page.clone();
            move |page| last_page.store(page, Ordering::SeqCst)
        });

        listeners.notify_all(3);
        assert_eq!(last_page.load(Ordering::SeqCst), 3);
        listeners.notify_all(7);
        assert_eq!(last_page.load(Ordering::SeqCst), 7);

        drop(listener);
        listeners.notify_all(9);
        assert_eq!(last_page.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn permanent_listeners() {
        let events = Arc::new(AtomicUsize::new(0));
        let listeners = CallbackListeners::<u32>::default();
        listeners.listen_permanently({
            let events = events.clone();
            Arc::new(move |_: u32| {
                events.fetch_add(1, Ordering::SeqCst);
            })
        });

        listeners.notify_all(1);
        listeners.notify_all(2);
        assert_eq!(events.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn drop_on_notify() {
        // Listeners run with a 'static bound, so the group being listened on lives in a static.
        static LISTENERS: LazyLock<CallbackListeners<u32>> = LazyLock::new(Default::default);

        let events = Arc::new(AtomicUsize::new(0));
        let slot = Arc::new(Mutex::new(None));

        {
            let mut guard = slot.lock().unwrap();
            let slot = slot.clone();
            let events = events.clone();
            *guard = Some(LISTENERS.listen(move |_| {
                events.fetch_add(1, Ordering::SeqCst);

                // Drop self
                drop(slot.lock().unwrap().take());
            }));
        }

        LISTENERS.notify_all(1);
        assert_eq!(events.load(Ordering::SeqCst), 1);

        // Notifying should have dropped the listener
        LISTENERS.notify_all(2);
        assert_eq!(events.load(Ordering::SeqCst), 1);
        assert!(slot.lock().unwrap().is_none());
    }
}
