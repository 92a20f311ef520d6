//! Debounce primitive: coalesce a burst of values into one delayed action.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Values that can absorb a newer value of the same kind.
pub trait Coalesce {
    /// Merge `newer` into `self`.
    fn coalesce(&mut self, newer: Self);
}

struct Slot<T> {
    pending: Option<T>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every restart or cancel; a timer only fires for its own generation.
    generation: u64,
}

/// Holds at most one pending value and fires it after a quiet period.
///
/// Every [`Debouncer::push`] merges into the pending value and restarts the
/// timer, so only the last push of a burst schedules the action, and the
/// action receives the union of everything pushed since the last fire.
pub struct Debouncer<T> {
    delay: Duration,
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Coalesce + Send + 'static> Debouncer<T> {
    /// Create a debouncer with the given quiet period.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slot: Arc::new(Mutex::new(Slot {
                pending: None,
                timer: None,
                generation: 0,
            })),
        }
    }

    /// Quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Merge a value into the pending slot and restart the timer.
    ///
    /// When the timer elapses, the pending value is taken and passed to
    /// `on_fire`. Must be called from within a tokio runtime.
    pub fn push<F, Fut>(&self, value: T, on_fire: F)
    where
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        match slot.pending.as_mut() {
            Some(pending) => pending.coalesce(value),
            None => slot.pending = Some(value),
        }
        cancel_timer(&mut slot);

        let generation = slot.generation;
        let weak = Arc::downgrade(&self.slot);
        let delay = self.delay;

        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let Some(slot) = weak.upgrade() else {
                return;
            };
            let value = {
                let mut slot = slot.lock();
                if slot.generation != generation {
                    return;
                }
                // Once claimed, a later cancel must not abort the action.
                slot.timer = None;
                slot.pending.take()
            };

            if let Some(value) = value {
                on_fire(value).await;
            }
        }));
    }

    /// Cancel the timer and take the pending value.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot.lock();
        cancel_timer(&mut slot);
        slot.pending.take()
    }

    /// Copy of the pending value.
    pub fn peek(&self) -> Option<T>
    where
        T: Clone,
    {
        self.slot.lock().pending.clone()
    }

    /// Whether a value is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().pending.is_some()
    }
}

fn cancel_timer<T>(slot: &mut Slot<T>) {
    if let Some(timer) = slot.timer.take() {
        timer.abort();
    }
    slot.generation = slot.generation.wrapping_add(1);
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.slot.lock().timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    impl Coalesce for Vec<u32> {
        fn coalesce(&mut self, newer: Self) {
            self.extend(newer);
        }
    }

    type Fired = Arc<Mutex<Vec<Vec<u32>>>>;

    fn push(debouncer: &Debouncer<Vec<u32>>, fired: &Fired, value: u32) {
        let fired = Arc::clone(fired);
        debouncer.push(vec![value], move |v| async move {
            fired.lock().push(v);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn burst_fires_once_with_union() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let fired = Fired::default();

        push(&debouncer, &fired, 1);
        tokio::time::sleep(Duration::from_millis(60)).await;
        push(&debouncer, &fired, 2);
        tokio::time::sleep(Duration::from_millis(60)).await;
        push(&debouncer, &fired, 3);

        // 120ms since the first push, but only 0ms since the last.
        assert!(fired.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*fired.lock(), vec![vec![1, 2, 3]]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn take_cancels_timer() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let fired = Fired::default();

        push(&debouncer, &fired, 7);
        assert_eq!(debouncer.peek(), Some(vec![7]));
        assert_eq!(debouncer.take(), Some(vec![7]));

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().is_empty());
        assert_eq!(debouncer.take(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_fire_separately() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let fired = Fired::default();

        push(&debouncer, &fired, 1);
        tokio::time::sleep(Duration::from_millis(200)).await;
        push(&debouncer, &fired, 2);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*fired.lock(), vec![vec![1], vec![2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_debouncer_never_fires() {
        let fired = Fired::default();
        {
            let debouncer = Debouncer::new(Duration::from_millis(100));
            push(&debouncer, &fired, 9);
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(fired.lock().is_empty());
    }
}
