//! Bounded notification FIFO with the two standard discard policies.
//!
//! When the queue drops data, the reading adjacent to the drop carries the
//! overflow marker: the surviving front under discard-oldest, the replacing
//! back under discard-newest. A queue of size one holds only the most
//! recent reading and never marks.

use crate::registry;
use std::collections::VecDeque;
use ua_server_types::DataValue;

#[derive(Debug)]
pub(crate) struct NotificationQueue {
    items: VecDeque<DataValue>,
    capacity: usize,
    discard_oldest: bool,
    overflow: bool,
}

impl NotificationQueue {
    pub(crate) fn new(capacity: usize, discard_oldest: bool) -> Self {
        let capacity = capacity.max(1);
        NotificationQueue {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            discard_oldest,
            overflow: false,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub(crate) fn overflow(&self) -> bool {
        self.overflow
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn discard_oldest(&self) -> bool {
        self.discard_oldest
    }

    pub(crate) fn enqueue(&mut self, reading: DataValue) {
        if self.capacity == 1 {
            self.items.clear();
            self.items.push_back(reading);
            return;
        }
        if self.items.len() < self.capacity {
            self.items.push_back(reading);
            return;
        }

        if self.discard_oldest {
            self.items.pop_front();
            if let Some(front) = self.items.front_mut() {
                front.status = front.status.with_overflow();
            }
            self.items.push_back(reading);
        } else if let Some(back) = self.items.back_mut() {
            *back = reading;
            back.status = back.status.with_overflow();
        }
        self.overflow = true;
        registry::note_queue_overflow();
    }

    /// Empty the queue and clear the overflow marker state.
    pub(crate) fn drain(&mut self) -> Vec<DataValue> {
        self.overflow = false;
        self.items.drain(..).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
        self.overflow = false;
    }

    /// Apply a re-parameterisation.
    ///
    /// Shrinking drops from the front under discard-oldest, otherwise
    /// truncates from the back while keeping the most recent reading. The
    /// overflow flag is recomputed from the survivors; a size-one queue
    /// additionally downgrades a surviving marked reading.
    pub(crate) fn resize(&mut self, capacity: usize, discard_oldest: bool) {
        self.capacity = capacity.max(1);
        self.discard_oldest = discard_oldest;

        if self.items.len() > self.capacity {
            if self.discard_oldest {
                while self.items.len() > self.capacity {
                    self.items.pop_front();
                }
            } else if let Some(latest) = self.items.pop_back() {
                self.items.truncate(self.capacity - 1);
                self.items.push_back(latest);
            }
        }

        if self.capacity == 1 {
            if let Some(only) = self.items.front_mut() {
                only.status = only.status.without_overflow();
            }
            self.overflow = false;
        } else {
            self.overflow = self.items.iter().any(|dv| dv.status.has_overflow());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NotificationQueue;
    use ua_server_types::{DataValue, StatusCode, Variant};

    fn reading(v: i32) -> DataValue {
        DataValue::new_now(Variant::Int32(v))
    }

    fn values(q: &NotificationQueue) -> Vec<i32> {
        q.items
            .iter()
            .map(|dv| match dv.value {
                Variant::Int32(v) => v,
                _ => unreachable!("test queue holds Int32 readings"),
            })
            .collect()
    }

    fn fill(q: &mut NotificationQueue, range: std::ops::RangeInclusive<i32>) {
        for v in range {
            q.enqueue(reading(v));
        }
    }

    #[test]
    fn overflow_discard_oldest_marks_surviving_front() {
        let mut q = NotificationQueue::new(3, true);
        fill(&mut q, 1..=5);

        assert_eq!(values(&q), vec![3, 4, 5]);
        assert!(q.overflow());
        assert_eq!(q.items[0].status, StatusCode::GOOD_WITH_OVERFLOW_BIT);
        assert_eq!(q.items[1].status, StatusCode::GOOD);
        assert_eq!(q.items[2].status, StatusCode::GOOD);
    }

    #[test]
    fn overflow_discard_newest_replaces_back() {
        let mut q = NotificationQueue::new(3, false);
        fill(&mut q, 1..=5);

        assert_eq!(values(&q), vec![1, 2, 5]);
        assert!(q.overflow());
        assert_eq!(q.items[0].status, StatusCode::GOOD);
        assert_eq!(q.items[1].status, StatusCode::GOOD);
        assert_eq!(q.items[2].status, StatusCode::GOOD_WITH_OVERFLOW_BIT);
    }

    #[test]
    fn size_one_queue_overwrites_without_marking() {
        let mut q = NotificationQueue::new(1, true);
        fill(&mut q, 1..=4);
        assert_eq!(values(&q), vec![4]);
        assert!(!q.overflow());
        assert_eq!(q.items[0].status, StatusCode::GOOD);
    }

    #[test]
    fn drain_clears_overflow() {
        let mut q = NotificationQueue::new(2, true);
        fill(&mut q, 1..=3);
        assert!(q.overflow());

        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(q.len(), 0);
        assert!(!q.overflow());
    }

    #[test]
    fn shrink_discard_oldest_keeps_tail() {
        let mut q = NotificationQueue::new(5, true);
        fill(&mut q, 1..=5);
        q.resize(2, true);
        assert_eq!(values(&q), vec![4, 5]);
        assert!(q.len() <= 2);
    }

    #[test]
    fn shrink_discard_newest_preserves_most_recent() {
        let mut q = NotificationQueue::new(5, false);
        fill(&mut q, 1..=5);
        q.resize(3, false);
        assert_eq!(values(&q), vec![1, 2, 5]);
    }

    #[test]
    fn shrink_to_one_downgrades_marker() {
        let mut q = NotificationQueue::new(3, true);
        fill(&mut q, 1..=5);
        assert!(q.overflow());

        q.resize(1, true);
        assert_eq!(values(&q), vec![5]);
        assert!(!q.overflow());
        assert_eq!(q.items[0].status, StatusCode::GOOD);
    }

    #[test]
    fn shrink_recomputes_overflow_from_survivors() {
        let mut q = NotificationQueue::new(3, true);
        fill(&mut q, 1..=4);
        assert!(q.overflow());
        // Dropping the marked front on shrink leaves a clean queue.
        q.resize(2, true);
        assert_eq!(values(&q), vec![3, 4]);
        assert!(!q.overflow());
    }

    #[test]
    fn grow_keeps_contents() {
        let mut q = NotificationQueue::new(2, true);
        fill(&mut q, 1..=2);
        q.resize(6, true);
        assert_eq!(values(&q), vec![1, 2]);
        fill(&mut q, 3..=6);
        assert_eq!(values(&q), vec![1, 2, 3, 4, 5, 6]);
        assert!(!q.overflow());
    }
}
