//! Bounded single-producer single-consumer handoff channel
//!
//! A fixed ring of slots addressed by `position % capacity`, guarded by two
//! counting semaphores:
//!
//! - `free_slots` starts at `capacity`; the producer takes one before writing
//! - `filled_slots` starts at 0; the consumer takes one before reading
//!
//! A slot is owned by the producer from its `free_slots` acquire until its
//! `filled_slots` release, and by the consumer from its `filled_slots` acquire
//! until its `free_slots` release. Permits are conserved, so the write
//! position never leads the read position by more than `capacity` and the two
//! sides never touch the same slot at once. The type system does not see any
//! of this: the `unsafe` slot accesses below are sound only because of the
//! permit protocol and because [`HandoffChannel::split`] hands out exactly one
//! [`Producer`] and one [`Consumer`].

pub mod semaphore;

use crate::core::ChannelError;
use crossbeam::utils::CachePadded;
use semaphore::Semaphore;
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Bounded SPSC handoff channel
pub struct HandoffChannel<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    write_pos: CachePadded<AtomicUsize>, // next position the producer claims
    read_pos: CachePadded<AtomicUsize>,  // next position the consumer claims
    free_slots: Semaphore,
    filled_slots: Semaphore,
    closed: AtomicBool,
    wait_timeout: Duration,
}

// Slots are only touched under the permit protocol described above.
unsafe impl<T: Send> Send for HandoffChannel<T> {}
unsafe impl<T: Send> Sync for HandoffChannel<T> {}

impl<T> HandoffChannel<T> {
    /// Create a channel with `capacity` slots; every blocking wait gives up
    /// after `wait_timeout`.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize, wait_timeout: Duration) -> Self {
        assert!(capacity > 0, "handoff channel capacity must be non-zero");
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            write_pos: CachePadded::new(AtomicUsize::new(0)),
            read_pos: CachePadded::new(AtomicUsize::new(0)),
            free_slots: Semaphore::new(capacity),
            filled_slots: Semaphore::new(0),
            closed: AtomicBool::new(false),
            wait_timeout,
        }
    }

    /// Split into the single producer and single consumer handle
    pub fn split(self) -> (Producer<T>, Consumer<T>) {
        let channel = Arc::new(self);
        (
            Producer { channel: Arc::clone(&channel) },
            Consumer { channel },
        )
    }

    /// Number of slots
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Messages written but not yet read.
    ///
    /// The write position is sampled before the read position, so a
    /// concurrent read can only make this under-report.
    pub fn in_flight(&self) -> usize {
        let written = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        written.saturating_sub(read)
    }

    /// Cancel the channel.
    ///
    /// Sends fail at once; receives drain what was already sent and then fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.free_slots.close();
        self.filled_slots.close();
    }

    /// Whether the channel has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn send(&self, item: T) -> Result<(), ChannelError> {
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }
        self.free_slots.acquire(self.wait_timeout)?;
        if self.is_closed() {
            return Err(ChannelError::Closed);
        }

        let pos = self.write_pos.fetch_add(1, Ordering::AcqRel);
        let idx = pos % self.slots.len();
        // SAFETY: the free permit gives the producer exclusive use of this
        // slot, and the consumer already moved its previous value out.
        unsafe {
            (*self.slots[idx].get()) = MaybeUninit::new(item);
        }

        self.filled_slots.release();
        Ok(())
    }

    fn receive(&self) -> Result<T, ChannelError> {
        self.filled_slots.acquire(self.wait_timeout)?;

        let pos = self.read_pos.fetch_add(1, Ordering::AcqRel);
        let idx = pos % self.slots.len();
        // SAFETY: the filled permit gives the consumer exclusive use of this
        // slot, and the producer initialized it before releasing the permit.
        let item = unsafe { (*self.slots[idx].get()).assume_init_read() };

        self.free_slots.release();
        Ok(item)
    }
}

impl<T> Drop for HandoffChannel<T> {
    fn drop(&mut self) {
        // Both handles are gone, so [read, write) is exactly the set of
        // initialized slots.
        let read = *self.read_pos.get_mut();
        let written = *self.write_pos.get_mut();
        for pos in read..written {
            let idx = pos % self.slots.len();
            unsafe { self.slots[idx].get_mut().assume_init_drop() };
        }
    }
}

/// Sending half; exactly one exists per channel
pub struct Producer<T> {
    channel: Arc<HandoffChannel<T>>,
}

impl<T> Producer<T> {
    /// Block until a slot is free, then hand `item` over
    #[inline]
    pub fn send(&mut self, item: T) -> Result<(), ChannelError> {
        self.channel.send(item)
    }

    /// The shared channel
    pub fn channel(&self) -> &HandoffChannel<T> {
        &self.channel
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.channel.close();
    }
}

/// Receiving half; exactly one exists per channel
pub struct Consumer<T> {
    channel: Arc<HandoffChannel<T>>,
}

impl<T> Consumer<T> {
    /// Block until a slot is filled, then take its item
    #[inline]
    pub fn receive(&mut self) -> Result<T, ChannelError> {
        self.channel.receive()
    }

    /// The shared channel
    pub fn channel(&self) -> &HandoffChannel<T> {
        &self.channel
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.channel.close();
    }
}
