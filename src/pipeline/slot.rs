//! Latest-wins single-slot hand-off.
//!
//! Publishing always replaces whatever the slot holds; the evicted value is
//! handed back so callers can count drops. Consumers either poll (`take`) or
//! wait with a deadline (`take_timeout`). The slot never holds more than one
//! value and a publisher never waits for a consumer.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    // An `Option<T>` cannot be left half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `value`, returning the unconsumed value it replaced.
    pub fn publish(&self, value: T) -> Option<T> {
        let evicted = self.lock().replace(value);
        self.ready.notify_one();
        evicted
    }

    /// Take the current value without waiting.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Wait up to `timeout` for a value.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |value| value.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn publish_evicts_unconsumed_value() {
        let slot = LatestSlot::new();
        assert_eq!(slot.publish(1), None);
        assert_eq!(slot.publish(2), Some(1));
        assert_eq!(slot.publish(3), Some(2));
        assert_eq!(slot.take(), Some(3));
        assert_eq!(slot.take(), None);
        assert!(slot.is_empty());
    }

    #[test]
    fn take_timeout_returns_none_after_deadline() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        let start = Instant::now();
        assert_eq!(slot.take_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn take_timeout_wakes_on_publish() {
        let slot = Arc::new(LatestSlot::new());
        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                slot.publish("frame");
            })
        };
        assert_eq!(slot.take_timeout(Duration::from_secs(5)), Some("frame"));
        producer.join().unwrap();
    }

    #[test]
    fn consumer_only_sees_latest_of_a_burst() {
        let slot = LatestSlot::new();
        let mut dropped = 0;
        for i in 0..100 {
            if slot.publish(i).is_some() {
                dropped += 1;
            }
        }
        assert_eq!(dropped, 99);
        assert_eq!(slot.take_timeout(Duration::from_millis(1)), Some(99));
    }
}
