// src/spsc.rs
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicU64, Ordering};

#[repr(align(64))]
struct Al64<T>(T);

/// Bounded wait-free SPSC queue with a compile-time power-of-two capacity.
///
/// Exactly one producer thread may call `try_push` and exactly one consumer
/// thread may call `try_pop`. `head` is the consumer's counter, `tail` the
/// producer's; both increase monotonically and the slot index is the counter
/// masked by N-1. Full means `tail - head == N`, empty `tail == head`.
pub struct SpscRing<T, const N: usize> {
    buf: Box<[UnsafeCell<MaybeUninit<T>>]>,
    head: Al64<AtomicU64>,
    tail: Al64<AtomicU64>,
}

unsafe impl<T: Send, const N: usize> Send for SpscRing<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for SpscRing<T, N> {}

impl<T, const N: usize> SpscRing<T, N> {
    const CAPACITY_IS_POW2: () = assert!(
        N > 0 && N & (N - 1) == 0,
        "ring capacity must be a power of two"
    );
    const MASK: u64 = N as u64 - 1;

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::CAPACITY_IS_POW2;
        let mut buf = Vec::with_capacity(N);
        buf.resize_with(N, || UnsafeCell::new(MaybeUninit::uninit()));
        Self {
            buf: buf.into_boxed_slice(),
            head: Al64(AtomicU64::new(0)),
            tail: Al64(AtomicU64::new(0)),
        }
    }

    /// Returns the value back to the caller when the ring is full.
    #[inline]
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        // Acquire pairs with the consumer's release store of `head`, making
        // the slot's previous occupant fully moved out before we reuse it.
        let head = self.head.0.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == N as u64 {
            return Err(value);
        }
        let idx = (tail & Self::MASK) as usize;
        unsafe { (*self.buf[idx].get()).write(value) };
        self.tail.0.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Returns `None` when the ring is empty.
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let idx = (head & Self::MASK) as usize;
        let value = unsafe { (*self.buf[idx].get()).assume_init_read() };
        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Racy for the non-owning side; each side's own counter is exact.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Relaxed);
        let tail = self.tail.0.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Default for SpscRing<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for SpscRing<T, N> {
    fn drop(&mut self) {
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn empty_ring() {
        let ring: SpscRing<i32, 16> = SpscRing::new();
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.capacity(), 16);
    }

    #[test]
    fn single_push_pop() {
        let ring: SpscRing<i32, 16> = SpscRing::new();
        assert!(ring.try_push(42).is_ok());
        assert_eq!(ring.len(), 1);
        assert!(!ring.is_empty());
        assert_eq!(ring.try_pop(), Some(42));
        assert!(ring.is_empty());
    }

    #[test]
    fn pop_from_empty() {
        let ring: SpscRing<i32, 16> = SpscRing::new();
        assert_eq!(ring.try_pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn fill_to_capacity_and_reject() {
        let ring: SpscRing<i32, 4> = SpscRing::new();
        for i in 0..4 {
            assert!(ring.try_push(i).is_ok());
            assert_eq!(ring.len(), (i + 1) as usize);
        }
        assert!(ring.is_full());
        // A rejected push hands the value back and does not advance tail.
        assert_eq!(ring.try_push(999), Err(999));
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn wrap_around() {
        let ring: SpscRing<i32, 4> = SpscRing::new();
        for cycle in 0..3 {
            for i in 0..4 {
                assert!(ring.try_push(cycle * 10 + i).is_ok());
            }
            assert!(ring.is_full());
            for i in 0..4 {
                assert_eq!(ring.try_pop(), Some(cycle * 10 + i));
            }
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn partial_drain_then_refill() {
        let ring: SpscRing<i32, 4> = SpscRing::new();
        for i in 0..4 {
            assert!(ring.try_push(i).is_ok());
        }
        assert_eq!(ring.try_pop(), Some(0));
        assert_eq!(ring.len(), 3);
        assert!(ring.try_push(4).is_ok());
        for i in 1..=4 {
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn heap_element_type() {
        let ring: SpscRing<String, 4> = SpscRing::new();
        assert!(ring.try_push("hello".to_string()).is_ok());
        assert!(ring.try_push("world".to_string()).is_ok());
        assert_eq!(ring.try_pop().as_deref(), Some("hello"));
        assert_eq!(ring.try_pop().as_deref(), Some("world"));
    }

    #[test]
    fn move_only_element_type() {
        let ring: SpscRing<Box<i32>, 4> = SpscRing::new();
        assert!(ring.try_push(Box::new(42)).is_ok());
        assert!(ring.try_push(Box::new(84)).is_ok());
        assert_eq!(*ring.try_pop().unwrap(), 42);
        assert_eq!(*ring.try_pop().unwrap(), 84);
    }

    struct CountsDrop(Arc<AtomicUsize>);
    impl Drop for CountsDrop {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn drop_drains_remaining_elements() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let ring: SpscRing<CountsDrop, 8> = SpscRing::new();
            for _ in 0..3 {
                assert!(ring.try_push(CountsDrop(drops.clone())).is_ok());
            }
            let popped = ring.try_pop().unwrap();
            drop(popped);
            assert_eq!(drops.load(Ordering::Relaxed), 1);
        }
        assert_eq!(drops.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn producer_consumer_fifo() {
        let ring: Arc<SpscRing<u64, 1024>> = Arc::new(SpscRing::new());
        const ITEMS: u64 = 10_000;

        let producer = {
            let ring = ring.clone();
            thread::spawn(move || {
                for i in 0..ITEMS {
                    let mut v = i * i;
                    loop {
                        match ring.try_push(v) {
                            Ok(()) => break,
                            Err(back) => {
                                v = back;
                                thread::yield_now();
                            }
                        }
                    }
                }
            })
        };

        let consumer = {
            let ring = ring.clone();
            thread::spawn(move || {
                let mut out = Vec::with_capacity(ITEMS as usize);
                while out.len() < ITEMS as usize {
                    match ring.try_pop() {
                        Some(v) => out.push(v),
                        None => thread::yield_now(),
                    }
                }
                out
            })
        };

        producer.join().unwrap();
        let consumed = consumer.join().unwrap();
        assert_eq!(consumed.len(), ITEMS as usize);
        for (i, v) in consumed.iter().enumerate() {
            assert_eq!(*v, (i as u64) * (i as u64));
        }
        assert!(ring.is_empty());
    }
}
