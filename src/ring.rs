//! Bounded sample ring buffers
//!
//! [`RingBuffer`] is a fixed-capacity FIFO of complex samples that never
//! blocks and never rejects a write: when it is full, the oldest sample is
//! evicted and the overflow counter is incremented. It is the retention
//! window that lets a relay link go down for a while without losing the
//! most recent samples.
//!
//! [`SharedRing`] wraps one ring for a single producer (the DSP stage) and a
//! single consumer (a relay sender) running on different tasks.
//!
//! # Example
//!
//! ```
//! use iqsplit::ring::RingBuffer;
//! use num_complex::Complex;
//!
//! let mut ring = RingBuffer::with_capacity(2).unwrap();
//! ring.push(Complex::new(0.1, 0.0));
//! ring.push(Complex::new(0.2, 0.0));
//! ring.push(Complex::new(0.3, 0.0)); // evicts 0.1
//!
//! assert_eq!(ring.dropped(), 1);
//! let batch = ring.pop_batch(8);
//! assert_eq!(batch, vec![Complex::new(0.2, 0.0), Complex::new(0.3, 0.0)]);
//! ```

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::Sample;
use crate::error::{Error, Result};

/// Fixed-capacity circular store with overwrite-oldest admission.
#[derive(Debug)]
pub struct RingBuffer {
    data: Box<[Sample]>,
    /// Next slot to write
    write_idx: usize,
    /// Oldest resident sample
    read_idx: usize,
    count: usize,
    dropped: u64,
    /// Absolute stream position of the sample at `read_idx`
    read_pos: u64,
}

impl RingBuffer {
    /// Allocate a ring holding at most `capacity` samples.
    ///
    /// The storage is reserved up front and never grows. Returns
    /// [`Error::Allocation`] when `capacity` is zero or the memory cannot be
    /// reserved.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::Allocation(
                "ring buffer capacity must be greater than 0".to_string(),
            ));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|e| {
            Error::Allocation(format!("ring buffer of {capacity} samples: {e}"))
        })?;
        data.resize(capacity, Sample::new(0.0, 0.0));

        Ok(Self {
            data: data.into_boxed_slice(),
            write_idx: 0,
            read_idx: 0,
            count: 0,
            dropped: 0,
            read_pos: 0,
        })
    }

    /// Append one sample, evicting the oldest one if the ring is full.
    pub fn push(&mut self, sample: Sample) {
        let capacity = self.data.len();
        if self.count == capacity {
            self.read_idx = (self.read_idx + 1) % capacity;
            self.read_pos += 1;
            self.dropped += 1;
        } else {
            self.count += 1;
        }
        self.data[self.write_idx] = sample;
        self.write_idx = (self.write_idx + 1) % capacity;
    }

    /// Append a block of samples in order.
    pub fn extend_from_slice(&mut self, samples: &[Sample]) {
        for &s in samples {
            self.push(s);
        }
    }

    /// Remove and return up to `max_n` of the oldest samples, FIFO order.
    pub fn pop_batch(&mut self, max_n: usize) -> Vec<Sample> {
        let (pos, batch) = self.peek_batch(max_n);
        self.consume(pos, batch.len());
        batch
    }

    /// Copy up to `max_n` of the oldest samples without removing them.
    ///
    /// Returns the absolute stream position of the first sample alongside the
    /// copy; pass it to [`consume`](Self::consume) once the samples have been
    /// delivered.
    pub fn peek_batch(&self, max_n: usize) -> (u64, Vec<Sample>) {
        let n = max_n.min(self.count);
        let mut out = Vec::with_capacity(n);
        let capacity = self.data.len();

        // At most two contiguous runs: up to the end of storage, then the wrap.
        let first = n.min(capacity - self.read_idx);
        out.extend_from_slice(&self.data[self.read_idx..self.read_idx + first]);
        out.extend_from_slice(&self.data[..n - first]);

        (self.read_pos, out)
    }

    /// Remove the `n` samples starting at stream position `pos`.
    ///
    /// Samples in that range which were already evicted by overflow are not
    /// counted twice, so a peek followed by pushes that overflow the ring and
    /// then a consume never removes samples newer than the peeked range.
    pub fn consume(&mut self, pos: u64, n: usize) {
        let end = pos + n as u64;
        if end <= self.read_pos {
            return;
        }
        let k = ((end - self.read_pos) as usize).min(self.count);
        self.read_idx = (self.read_idx + k) % self.data.len();
        self.read_pos += k as u64;
        self.count -= k;
    }

    /// Number of resident samples.
    pub fn occupancy(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Samples evicted by overflow since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Point-in-time view of a ring for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSnapshot {
    pub occupancy: usize,
    pub capacity: usize,
    pub dropped: u64,
}

impl RingSnapshot {
    /// Fill level in percent.
    pub fn percent(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            100.0 * self.occupancy as f64 / self.capacity as f64
        }
    }
}

/// A [`RingBuffer`] shared between one producer and one consumer task.
///
/// The lock is only ever held for the duration of a copy, never across an
/// `.await`. Occupancy and drop counters are mirrored into atomics so the
/// status reporter can read them without touching the lock.
#[derive(Debug)]
pub struct SharedRing {
    name: &'static str,
    inner: Mutex<RingBuffer>,
    available: Notify,
    occupancy: AtomicUsize,
    dropped: AtomicU64,
    capacity: usize,
}

impl SharedRing {
    pub fn new(name: &'static str, capacity: usize) -> Result<Self> {
        let ring = RingBuffer::with_capacity(capacity)?;
        Ok(Self {
            name,
            inner: Mutex::new(ring),
            available: Notify::new(),
            occupancy: AtomicUsize::new(0),
            dropped: AtomicU64::new(0),
            capacity,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    fn lock(&self) -> MutexGuard<'_, RingBuffer> {
        // A panic while holding the lock leaves the cursors consistent: every
        // mutation is a handful of integer updates with no early return.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, ring: &RingBuffer) {
        self.occupancy.store(ring.occupancy(), Ordering::Relaxed);
        self.dropped.store(ring.dropped(), Ordering::Relaxed);
    }

    /// Append a block of samples and wake the consumer.
    pub fn push_slice(&self, samples: &[Sample]) {
        if samples.is_empty() {
            return;
        }
        {
            let mut ring = self.lock();
            ring.extend_from_slice(samples);
            self.publish(&ring);
        }
        self.available.notify_one();
    }

    pub fn pop_batch(&self, max_n: usize) -> Vec<Sample> {
        let mut ring = self.lock();
        let batch = ring.pop_batch(max_n);
        self.publish(&ring);
        batch
    }

    pub fn peek_batch(&self, max_n: usize) -> (u64, Vec<Sample>) {
        self.lock().peek_batch(max_n)
    }

    pub fn consume(&self, pos: u64, n: usize) {
        let mut ring = self.lock();
        ring.consume(pos, n);
        self.publish(&ring);
    }

    /// Wait until the producer has pushed new samples.
    ///
    /// A push that happened since the last wait is remembered, so checking
    /// the ring and then calling this method cannot miss a wake-up.
    pub async fn readable(&self) {
        self.available.notified().await;
    }

    pub fn occupancy(&self) -> usize {
        self.occupancy.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> RingSnapshot {
        RingSnapshot {
            occupancy: self.occupancy.load(Ordering::Relaxed),
            capacity: self.capacity,
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
