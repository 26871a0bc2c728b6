//! Ring buffers.
//!
//! - [`RingBuffer`]: fixed-capacity FIFO that overwrites its oldest element once
//!   full. Backs the short waveform view and the long waveform history.
//! - [`create_capture_ring`]: lock-free SPSC pair used to hand samples from the
//!   real-time audio callback to the tick thread.
//!
//! Both are `ringbuf::HeapRb` underneath.

use std::fmt;

use ringbuf::{
    traits::{Observer as _, RingBuffer as _, Split},
    HeapRb,
};

pub use ringbuf::traits::{Consumer, Producer};

use crate::error::{Result, SpectraError};

/// Producer half of the capture ring, held by the audio callback thread.
pub type CaptureProducer = ringbuf::HeapProd<f32>;

/// Consumer half of the capture ring, held by the tick thread.
pub type CaptureConsumer = ringbuf::HeapCons<f32>;

/// Create a matched producer/consumer pair backed by a heap-allocated ring.
///
/// # Errors
/// `SpectraError::InvalidCapacity` when `capacity == 0`.
pub fn create_capture_ring(capacity: usize) -> Result<(CaptureProducer, CaptureConsumer)> {
    if capacity == 0 {
        return Err(SpectraError::InvalidCapacity(capacity));
    }
    Ok(HeapRb::<f32>::new(capacity).split())
}

/// Fixed-capacity FIFO with overwrite-on-full.
///
/// `len() == min(total appends, capacity)` at all times and iteration is
/// oldest → newest.
pub struct RingBuffer<T> {
    inner: HeapRb<T>,
}

impl<T> RingBuffer<T> {
    /// # Errors
    /// `SpectraError::InvalidCapacity` when `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(SpectraError::InvalidCapacity(capacity));
        }
        Ok(Self {
            inner: HeapRb::new(capacity),
        })
    }

    /// Append `value`, returning the evicted oldest element when the buffer was full.
    #[inline]
    pub fn append(&mut self, value: T) -> Option<T> {
        self.inner.push_overwrite(value)
    }

    /// Equivalent to calling [`RingBuffer::append`] for each value in order.
    pub fn append_all<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.inner.push_overwrite(value);
        }
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity().get()
    }

    /// Drop every element; capacity is unchanged.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<T: Clone> RingBuffer<T> {
    /// Chronological copy of the current contents.
    pub fn snapshot(&self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len());
        self.copy_into(&mut out);
        out
    }

    /// Replace the contents of `out` with a chronological copy, reusing its allocation.
    pub fn copy_into(&self, out: &mut Vec<T>) {
        out.clear();
        out.extend(self.inner.iter().cloned());
    }
}

impl<T: fmt::Debug> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            RingBuffer::<f64>::new(0),
            Err(SpectraError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn grows_until_capacity() {
        let mut rb = RingBuffer::new(4).unwrap();
        assert!(rb.is_empty());
        for (appended, v) in (1..=3).enumerate() {
            assert_eq!(rb.append(v), None);
            assert_eq!(rb.len(), appended + 1);
        }
        assert_eq!(rb.snapshot(), vec![1, 2, 3]);
        assert!(!rb.is_full());
    }

    #[test]
    fn keeps_only_the_most_recent_capacity_values() {
        for capacity in [1usize, 2, 3, 7, 16] {
            for k in capacity..capacity * 3 {
                let mut rb = RingBuffer::new(capacity).unwrap();
                rb.append_all(1..=k);
                let expected: Vec<usize> = (k - capacity + 1..=k).collect();
                assert_eq!(rb.snapshot(), expected, "capacity={capacity} k={k}");
                assert_eq!(rb.len(), capacity);
            }
        }
    }

    #[test]
    fn append_returns_evicted_value() {
        let mut rb = RingBuffer::new(2).unwrap();
        rb.append('a');
        rb.append('b');
        assert_eq!(rb.append('c'), Some('a'));
        assert_eq!(rb.snapshot(), vec!['b', 'c']);
    }

    #[test]
    fn copy_into_reuses_buffer() {
        let mut rb = RingBuffer::new(3).unwrap();
        rb.append_all([1.0, 2.0, 3.0, 4.0]);
        let mut out = vec![9.0; 10];
        rb.copy_into(&mut out);
        assert_eq!(out, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut rb = RingBuffer::new(3).unwrap();
        rb.append_all([1, 2, 3]);
        rb.clear();
        assert!(rb.is_empty());
        assert_eq!(rb.capacity(), 3);
    }

    #[test]
    fn capture_ring_moves_samples_across_halves() {
        let (mut producer, mut consumer) = create_capture_ring(8).unwrap();
        assert_eq!(producer.push_slice(&[0.1, 0.2, 0.3]), 3);
        let mut out = [0.0f32; 4];
        assert_eq!(consumer.pop_slice(&mut out), 3);
        assert_eq!(&out[..3], &[0.1, 0.2, 0.3]);
    }
}
