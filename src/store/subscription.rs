use parking_lot::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use super::{Listener, SharedListener, StoreError};

type Slots<T> = Mutex<Vec<(u64, SharedListener<T>)>>;

struct Registry<T> {
    next_id: Mutex<u64>,
    slots: Slots<T>,
}

/// Change listeners for one kind of data.
pub struct Listeners<T> {
    inner: Arc<Registry<T>>,
}

impl<T> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Listeners {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Listeners {
            inner: Arc::new(Registry {
                next_id: Mutex::new(0),
                slots: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn add(&self, listener: Listener<T>) -> Subscription {
        let id = {
            let mut next = self.inner.next_id.lock();
            *next += 1;
            *next
        };
        self.inner.slots.lock().push((id, Arc::from(listener)));
        let weak: Weak<Registry<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.slots.lock().retain(|(slot, _)| *slot != id);
            }
        })
    }

    /// Calls every listener registered at the time of the call. Listeners run
    /// without the registry locked, so they may subscribe or unsubscribe.
    pub fn notify(&self, value: &T) {
        let current: Vec<SharedListener<T>> = self
            .inner
            .slots
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in current {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Dropping the subscription stops further notifications.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Runs `extra` after this subscription's own cleanup.
    pub(crate) fn also(mut self, extra: impl FnOnce() + Send + 'static) -> Self {
        let first = self.cancel.take();
        Subscription::new(move || {
            if let Some(cancel) = first {
                cancel();
            }
            extra();
        })
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Stops its poller when dropped.
pub(crate) struct PollHandle {
    _stop: mpsc::Sender<()>,
}

/// Calls `fetch` every `interval` on a background thread and hands
/// `listener` each result that differs from the last one delivered. Failed
/// fetches are logged and skipped.
pub(crate) fn spawn_poller<T, F>(
    name: &'static str,
    interval: Duration,
    initial: T,
    fetch: F,
    listener: SharedListener<T>,
) -> Result<PollHandle, StoreError>
where
    T: PartialEq + Send + 'static,
    F: Fn() -> Result<T, StoreError> + Send + 'static,
{
    let (stop, stopped) = mpsc::channel::<()>();
    thread::Builder::new()
        .name(format!("gooddays-poll-{}", name))
        .spawn(move || {
            let mut last = initial;
            // Dropping the handle disconnects the channel and ends the loop.
            while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                match fetch() {
                    Ok(latest) if latest != last => {
                        listener(&latest);
                        last = latest;
                    }
                    Ok(_) => {}
                    Err(err) => tracing::warn!(name, error = %err, "poll failed"),
                }
            }
            tracing::debug!(name, "poller stopped");
        })
        .map_err(|source| StoreError::Io {
            path: format!("poller {}", name),
            source,
        })?;
    Ok(PollHandle { _stop: stop })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[test]
    fn dropped_subscription_stops_notifications() {
        let listeners: Listeners<u32> = Listeners::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let sub = listeners.add(Box::new(move |v: &u32| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        }));
        listeners.notify(&2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        drop(sub);
        listeners.notify(&5);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert!(listeners.is_empty());
    }

    #[test]
    fn unsubscribe_only_removes_its_own_listener() {
        let listeners: Listeners<()> = Listeners::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let (a, b) = (seen.clone(), seen.clone());
        let first = listeners.add(Box::new(move |_: &()| {
            a.fetch_add(1, Ordering::SeqCst);
        }));
        let _second = listeners.add(Box::new(move |_: &()| {
            b.fetch_add(10, Ordering::SeqCst);
        }));
        first.unsubscribe();
        listeners.notify(&());
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn listener_may_subscribe_and_unsubscribe_while_notified() {
        let listeners: Listeners<u32> = Listeners::new();
        let registry = listeners.clone();
        let held: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&held);
        let _outer = listeners.add(Box::new(move |v: &u32| {
            if *v == 1 {
                sink.lock().push(registry.add(Box::new(|_: &u32| {})));
            } else {
                sink.lock().clear();
            }
        }));

        listeners.notify(&1);
        assert_eq!(listeners.len(), 2);
        listeners.notify(&2);
        assert_eq!(listeners.len(), 1);
        assert!(held.lock().is_empty());
    }

    #[test]
    fn listener_may_drop_its_own_subscription() {
        let listeners: Listeners<()> = Listeners::new();
        let own: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&own);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = listeners.add(Box::new(move |_: &()| {
            counter.fetch_add(1, Ordering::SeqCst);
            slot.lock().take();
        }));
        *own.lock() = Some(sub);

        listeners.notify(&());
        listeners.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn also_runs_after_own_cleanup() {
        let listeners: Listeners<()> = Listeners::new();
        let stopped = Arc::new(AtomicUsize::new(0));
        let flag = Arc::clone(&stopped);
        let sub = listeners
            .add(Box::new(|_: &()| {}))
            .also(move || {
                flag.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(listeners.len(), 1);
        drop(sub);
        assert!(listeners.is_empty());
        assert_eq!(stopped.load(Ordering::SeqCst), 1);
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn poller_delivers_changes_and_skips_failures() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let handle = spawn_poller(
            "test",
            Duration::from_millis(5),
            0usize,
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                match n {
                    1 => Err(StoreError::Unreachable("offline".into())),
                    2 | 3 => Ok(7),
                    _ => Ok(9),
                }
            },
            Arc::new(move |v: &usize| sink.lock().push(*v)),
        )
        .unwrap();

        assert!(wait_for(|| seen.lock().len() >= 2));
        drop(handle);
        assert_eq!(*seen.lock(), vec![7, 9]);
    }

    #[test]
    fn dropping_the_handle_stops_polling() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&polls);
        let handle = spawn_poller(
            "test",
            Duration::from_millis(5),
            (),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            Arc::new(|_: &()| {}),
        )
        .unwrap();

        assert!(wait_for(|| polls.load(Ordering::SeqCst) >= 2));
        drop(handle);
        thread::sleep(Duration::from_millis(50));
        let settled = polls.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(polls.load(Ordering::SeqCst), settled);
    }
}
