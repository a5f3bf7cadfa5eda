//! Lock-free single-producer/single-consumer ring buffer for interleaved
//! samples.
//!
//! The producer half lives inside the realtime capture callback and the
//! consumer half inside the disk writer thread, so every operation here must
//! stay wait-free: no locks, no allocation, just acquire/release ordering on
//! the two monotonically increasing indices. When the writer falls behind,
//! excess samples are silently dropped; overrun is a defined lossy
//! degrade-mode, not an error.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

struct Shared {
    slots: Box<[UnsafeCell<f32>]>,
    mask: usize,
    /// Total elements ever written. Slot = index & mask.
    write: AtomicUsize,
    /// Total elements ever read. Invariant: write - read <= capacity.
    read: AtomicUsize,
}

// The producer only writes slots in [read + cap, write) and the consumer only
// reads slots in [read, write); the acquire/release pairs on the indices order
// those accesses, so the halves never touch the same slot concurrently.
unsafe impl Sync for Shared {}
unsafe impl Send for Shared {}

impl Shared {
    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Allocate a ring holding `capacity` interleaved samples and split it into
/// its producer and consumer halves. The capacity must be a non-zero power
/// of two so slot lookup can mask instead of divide.
pub fn with_capacity(capacity: usize) -> Result<(RingProducer, RingConsumer)> {
    if capacity == 0 || !capacity.is_power_of_two() {
        return Err(anyhow!(
            "ring capacity must be a non-zero power of two, got {capacity}"
        ));
    }
    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(0.0f32))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        write: AtomicUsize::new(0),
        read: AtomicUsize::new(0),
    });
    Ok((
        RingProducer {
            shared: shared.clone(),
        },
        RingConsumer { shared },
    ))
}

/// Write half. Owned by exactly one thread at a time.
pub struct RingProducer {
    shared: Arc<Shared>,
}

impl RingProducer {
    /// Append up to `samples.len()` elements, returning how many were
    /// actually written. Writes `min(len, free)` and drops the remainder.
    /// Never blocks, never allocates.
    pub fn try_write(&mut self, samples: &[f32]) -> usize {
        let write = self.shared.write.load(Ordering::Relaxed);
        let read = self.shared.read.load(Ordering::Acquire);
        let free = self.shared.capacity() - (write - read);
        let count = samples.len().min(free);
        for (offset, &sample) in samples[..count].iter().enumerate() {
            let slot = (write + offset) & self.shared.mask;
            // Sole producer; the consumer cannot read past `write` until the
            // release store below publishes these elements.
            unsafe { *self.shared.slots[slot].get() = sample };
        }
        self.shared.write.store(write + count, Ordering::Release);
        count
    }

    /// Free space in elements at the time of the call.
    pub fn write_available(&self) -> usize {
        let write = self.shared.write.load(Ordering::Relaxed);
        let read = self.shared.read.load(Ordering::Acquire);
        self.shared.capacity() - (write - read)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

/// Read half. Owned by exactly one thread at a time.
pub struct RingConsumer {
    shared: Arc<Shared>,
}

impl RingConsumer {
    /// Occupied elements at the time of the call.
    pub fn read_available(&self) -> usize {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        write - read
    }

    /// Borrow the occupied region as up to two contiguous spans (the second
    /// is the wrapped tail and may be empty). No copying; call
    /// [`advance_read`](Self::advance_read) to commit once consumed.
    pub fn read_regions(&self) -> (&[f32], &[f32]) {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        let available = write - read;
        let start = read & self.shared.mask;
        let first_len = available.min(self.shared.capacity() - start);
        let second_len = available - first_len;
        // UnsafeCell<f32> is layout-identical to f32, and the producer never
        // rewrites a slot before the read index passes it.
        unsafe {
            let base = self.shared.slots.as_ptr() as *const f32;
            (
                std::slice::from_raw_parts(base.add(start), first_len),
                std::slice::from_raw_parts(base, second_len),
            )
        }
    }

    /// Commit `count` consumed elements. Advancing past the occupied region
    /// would break the write-read invariant, so the commit is clamped to
    /// what is actually available.
    pub fn advance_read(&mut self, count: usize) {
        let read = self.shared.read.load(Ordering::Relaxed);
        let write = self.shared.write.load(Ordering::Acquire);
        debug_assert!(count <= write - read, "advance past occupied region");
        let count = count.min(write - read);
        self.shared.read.store(read + count, Ordering::Release);
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}
