//! A bounded single-producer/single-consumer ring buffer with
//! acquire/release-ordered head/tail indices (Design Notes §9: "model as
//! SPSC ring with release/acquire ordering on head/tail indices; no
//! locks"). Used for both the planner block queue and the segment queue.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Slot<T>(UnsafeCell<MaybeUninit<T>>);

/// Shared ring storage. `head` is advanced only by the producer, `tail`
/// only by the consumer; neither side ever writes the other's index.
struct RingInner<T> {
    buf: Box<[Slot<T>]>,
    capacity: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: access to `buf` slots is partitioned by the head/tail
// protocol below — a slot is only touched by the producer between
// reserving it (push) and publishing `head`, and only by the consumer
// between observing `head` and advancing `tail`.
unsafe impl<T: Send> Send for RingInner<T> {}
unsafe impl<T: Send> Sync for RingInner<T> {}

impl<T> Drop for RingInner<T> {
    fn drop(&mut self) {
        let tail = *self.tail.get_mut();
        let head = *self.head.get_mut();
        for i in tail..head {
            let slot = &self.buf[i % self.capacity];
            unsafe {
                (*slot.0.get()).assume_init_drop();
            }
        }
    }
}

/// Producer half of the ring: the motion planner's enqueue side, or the
/// segment generator's enqueue side into the step executor's queue.
pub struct Producer<T> {
    inner: Arc<RingInner<T>>,
}

/// Consumer half of the ring.
pub struct Consumer<T> {
    inner: Arc<RingInner<T>>,
}

/// Create a ring of the given capacity, split into its producer and
/// consumer halves.
pub fn ring<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    assert!(capacity > 0, "ring capacity must be nonzero");
    let buf = (0..capacity)
        .map(|_| Slot(UnsafeCell::new(MaybeUninit::uninit())))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let inner = Arc::new(RingInner {
        buf,
        capacity,
        head: AtomicUsize::new(0),
        tail: AtomicUsize::new(0),
    });
    (
        Producer {
            inner: inner.clone(),
        },
        Consumer { inner },
    )
}

impl<T> Producer<T> {
    /// Push an item. Returns it back (unmodified) if the ring is full —
    /// the spec.md EAGAIN/QUEUE_FULL contract: no side effects on
    /// capacity failure.
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        if head - tail >= self.inner.capacity {
            return Err(item);
        }
        let slot = &self.inner.buf[head % self.inner.capacity];
        unsafe {
            (*slot.0.get()).write(item);
        }
        self.inner.head.store(head + 1, Ordering::Release);
        Ok(())
    }

    pub fn len(&self) -> usize {
        let head = self.inner.head.load(Ordering::Relaxed);
        let tail = self.inner.tail.load(Ordering::Acquire);
        head - tail
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.inner.capacity
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl<T> Consumer<T> {
    /// Pop the oldest item, if any.
    pub fn pop(&self) -> Option<T> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail >= head {
            return None;
        }
        let slot = &self.inner.buf[tail % self.inner.capacity];
        let item = unsafe { (*slot.0.get()).assume_init_read() };
        self.inner.tail.store(tail + 1, Ordering::Release);
        Some(item)
    }

    /// Peek the oldest item without removing it.
    pub fn peek(&self) -> Option<&T> {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        if tail >= head {
            return None;
        }
        let slot = &self.inner.buf[tail % self.inner.capacity];
        Some(unsafe { (*slot.0.get()).assume_init_ref() })
    }

    pub fn len(&self) -> usize {
        let tail = self.inner.tail.load(Ordering::Relaxed);
        let head = self.inner.head.load(Ordering::Acquire);
        head - tail
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_order_preserved() {
        let (p, c) = ring::<u32>(4);
        p.push(1).unwrap();
        p.push(2).unwrap();
        assert_eq!(c.pop(), Some(1));
        assert_eq!(c.pop(), Some(2));
        assert_eq!(c.pop(), None);
    }

    #[test]
    fn full_queue_rejects_push() {
        let (p, _c) = ring::<u32>(2);
        p.push(1).unwrap();
        p.push(2).unwrap();
        assert_eq!(p.push(3), Err(3));
    }

    #[test]
    fn wraparound_reuses_slots() {
        let (p, c) = ring::<u32>(2);
        for round in 0..5u32 {
            p.push(round).unwrap();
            assert_eq!(c.pop(), Some(round));
        }
    }

    #[test]
    fn drop_cleans_up_remaining_items() {
        use std::sync::atomic::{AtomicUsize as AU, Ordering as O};
        use std::sync::Arc as A;
        struct Counted(A<AU>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.0.fetch_add(1, O::SeqCst);
            }
        }
        let counter = A::new(AU::new(0));
        {
            let (p, _c) = ring::<Counted>(4);
            p.push(Counted(counter.clone())).unwrap();
            p.push(Counted(counter.clone())).unwrap();
        }
        assert_eq!(counter.load(O::SeqCst), 2);
    }
}
