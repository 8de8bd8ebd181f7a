//! Lock-protected interleaved audio ring buffer with per-block song
//! tags.
//!
//! A single mutex guards a flat sample buffer plus a parallel tag
//! array, favoring a critical section over a lock-free SPSC design: a
//! tag needs to publish atomically with the samples that carry it,
//! which a plain mutex gives for free and a lock-free ring would need
//! extra bookkeeping to match. Lock hold time is bounded by a single
//! memcpy of at most one block, so the real-time callback still meets
//! its deadline.

use std::sync::Mutex;

/// Outcome of a `read` call. `Eos` means no data is available and the
/// loader has signaled completion. `Underrun` is `available == 0` with
/// the loader still running; the caller must produce silence and not
/// treat it as end of stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Data { samples: Vec<f32>, tag: i32 },
    Underrun,
    Eos,
}

struct Inner {
    data: Vec<f32>,
    /// One tag per `block_size`-sample block of `data`.
    tags: Vec<i32>,
    write_pos: usize,
    read_pos: usize,
    available: usize,
    loader_complete: bool,
    underrun_count: u64,
}

/// A fixed-capacity interleaved float ring buffer. `capacity` and
/// `block_size` are both counts of interleaved samples (i.e. already
/// multiplied by channel count), matching the unit `write`/`read`
/// callers operate in.
pub struct RingBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
    block_size: usize,
}

impl RingBuffer {
    /// `capacity` is rounded up to the next multiple of `block_size`.
    pub fn new(capacity: usize, block_size: usize) -> Self {
        assert!(block_size > 0, "block_size must be positive");
        let blocks = capacity.div_ceil(block_size).max(1);
        let capacity = blocks * block_size;
        Self {
            inner: Mutex::new(Inner {
                data: vec![0.0; capacity],
                tags: vec![0; blocks],
                write_pos: 0,
                read_pos: 0,
                available: 0,
                loader_complete: false,
                underrun_count: 0,
            }),
            capacity,
            block_size,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn block_of(&self, pos: usize) -> usize {
        pos / self.block_size
    }

    /// Write up to `data.len()` samples, returning how many were
    /// actually written (`min(data.len(), capacity - available)`).
    /// Partial writes are expected; callers must loop until all of
    /// `data` has been written.
    pub fn write(&self, data: &[f32], tag: i32) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let free = self.capacity - inner.available;
        let to_write = data.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let start_block = self.block_of(inner.write_pos);
        let mut pos = inner.write_pos;
        let mut written = 0;
        while written < to_write {
            let chunk = (self.capacity - pos).min(to_write - written);
            inner.data[pos..pos + chunk].copy_from_slice(&data[written..written + chunk]);
            pos = (pos + chunk) % self.capacity;
            written += chunk;
        }
        let end_block = self.block_of((inner.write_pos + to_write.saturating_sub(1)) % self.capacity);
        inner.tags[start_block] = tag;
        if end_block != start_block {
            inner.tags[end_block] = tag;
        }

        inner.write_pos = pos;
        inner.available += to_write;
        to_write
    }

    /// Read up to `requested` samples. See `ReadOutcome` for the three
    /// possible results.
    pub fn read(&self, requested: usize) -> ReadOutcome {
        let mut inner = self.inner.lock().unwrap();
        if inner.available == 0 {
            if inner.loader_complete {
                return ReadOutcome::Eos;
            }
            inner.underrun_count += 1;
            return ReadOutcome::Underrun;
        }

        let to_read = requested.min(inner.available);
        let tag = inner.tags[self.block_of(inner.read_pos)];

        let mut samples = Vec::with_capacity(to_read);
        let mut pos = inner.read_pos;
        let mut read = 0;
        while read < to_read {
            let chunk = (self.capacity - pos).min(to_read - read);
            samples.extend_from_slice(&inner.data[pos..pos + chunk]);
            pos = (pos + chunk) % self.capacity;
            read += chunk;
        }

        inner.read_pos = pos;
        inner.available -= to_read;
        ReadOutcome::Data { samples, tag }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.write_pos = 0;
        inner.read_pos = 0;
        inner.available = 0;
        inner.loader_complete = false;
    }

    pub fn set_loader_complete(&self) {
        self.inner.lock().unwrap().loader_complete = true;
    }

    pub fn available(&self) -> usize {
        self.inner.lock().unwrap().available
    }

    pub fn available_seconds(&self, sample_rate: u32, channels: u16) -> f64 {
        let frames = self.available() / channels.max(1) as usize;
        frames as f64 / sample_rate as f64
    }

    pub fn underrun_count(&self) -> u64 {
        self.inner.lock().unwrap().underrun_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips_samples() {
        let ring = RingBuffer::new(16, 4);
        let data = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(ring.write(&data, 7), 4);
        match ring.read(4) {
            ReadOutcome::Data { samples, tag } => {
                assert_eq!(samples, data);
                assert_eq!(tag, 7);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn partial_write_when_nearly_full() {
        let ring = RingBuffer::new(8, 4);
        assert_eq!(ring.write(&[0.0; 6], 1), 6);
        // only 2 free
        assert_eq!(ring.write(&[0.0; 6], 2), 2);
    }

    #[test]
    fn read_on_empty_not_complete_is_underrun() {
        let ring = RingBuffer::new(8, 4);
        assert_eq!(ring.read(4), ReadOutcome::Underrun);
        assert_eq!(ring.underrun_count(), 1);
    }

    #[test]
    fn read_on_empty_complete_is_eos() {
        let ring = RingBuffer::new(8, 4);
        ring.set_loader_complete();
        assert_eq!(ring.read(4), ReadOutcome::Eos);
    }

    #[test]
    fn write_wraps_around_capacity() {
        let ring = RingBuffer::new(8, 4);
        ring.write(&[1.0; 6], 1);
        match ring.read(6) {
            ReadOutcome::Data { samples, .. } => assert_eq!(samples, vec![1.0; 6]),
            other => panic!("expected Data, got {other:?}"),
        }
        // write_pos is now at 6; writing 4 more wraps past capacity.
        let wrapped = ring.write(&[2.0; 4], 9);
        assert_eq!(wrapped, 4);
        match ring.read(4) {
            ReadOutcome::Data { samples, tag } => {
                assert_eq!(samples, vec![2.0; 4]);
                assert_eq!(tag, 9);
            }
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn tag_reflects_block_containing_read_pos() {
        let ring = RingBuffer::new(8, 4);
        ring.write(&[0.0; 4], 100);
        ring.write(&[0.0; 4], 200);
        match ring.read(4) {
            ReadOutcome::Data { tag, .. } => assert_eq!(tag, 100),
            other => panic!("expected Data, got {other:?}"),
        }
        match ring.read(4) {
            ReadOutcome::Data { tag, .. } => assert_eq!(tag, 200),
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[test]
    fn capacity_rounds_up_to_block_multiple() {
        let ring = RingBuffer::new(10, 4);
        assert_eq!(ring.capacity(), 12);
    }

    #[test]
    fn clear_resets_state() {
        let ring = RingBuffer::new(8, 4);
        ring.write(&[1.0; 4], 1);
        ring.set_loader_complete();
        ring.clear();
        assert_eq!(ring.available(), 0);
        assert_eq!(ring.read(4), ReadOutcome::Underrun);
    }
}
