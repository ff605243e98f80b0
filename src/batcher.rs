//! Sample batching and the decoder worker
//!
//! The decoder worker owns the consumer end of the raw block queue. It keeps
//! running until every producer has gone away and the queue is empty, then
//! flushes the partial batch and ends the [`BatchStream`]. It never blocks on
//! a slow sink while producers are alive.

use std::collections::VecDeque;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::bridge::RawBlock;
use crate::config::DataRate;
use crate::decoder::{Decoder, Sample, Units};
use crate::error::{Mma8451Error, Result};

/// Ordered group of samples handed to the sink
#[derive(Debug, Clone)]
pub struct Batch {
    pub sequence: u64,
    /// Wall-clock time the first sample was appended
    pub opened_at: DateTime<Local>,
    pub units: Units,
    pub samples: Vec<Sample>,
    /// FIFO overflows reported while this batch was open
    pub overflows: u32,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// When to close a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Close once this many samples are buffered
    pub target_count: usize,
    /// Close once the first buffered sample is this old
    pub max_age: Option<Duration>,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            target_count: 800,
            max_age: Some(Duration::from_secs(2)),
        }
    }
}

impl BatchPolicy {
    pub fn new(target_count: usize, max_age: Option<Duration>) -> Self {
        Self {
            target_count: target_count.max(1),
            max_age,
        }
    }

    /// One batch per `interval` of samples at `rate`
    ///
    /// The age bound is twice the interval.
    pub fn from_interval(rate: DataRate, interval: Duration) -> Self {
        let count = (rate.hz() * interval.as_secs_f64()).round() as usize;
        Self::new(count, Some(interval * 2))
    }
}

/// Accumulates samples into batches
#[derive(Debug)]
pub struct Batcher {
    policy: BatchPolicy,
    units: Units,
    open: Option<OpenBatch>,
    next_sequence: u64,
    pending_overflows: u32,
}

#[derive(Debug)]
struct OpenBatch {
    batch: Batch,
    started: Instant,
}

impl Batcher {
    pub fn new(policy: BatchPolicy, units: Units) -> Self {
        Self {
            policy: BatchPolicy::new(policy.target_count, policy.max_age),
            units,
            open: None,
            next_sequence: 0,
            pending_overflows: 0,
        }
    }

    /// Append one sample; returns a batch if a bound was reached
    pub fn push(&mut self, sample: Sample, now: Instant) -> Option<Batch> {
        let open = self.open.get_or_insert_with(|| {
            let batch = Batch {
                sequence: self.next_sequence,
                opened_at: Local::now(),
                units: self.units,
                samples: Vec::with_capacity(self.policy.target_count),
                overflows: self.pending_overflows,
            };
            self.next_sequence += 1;
            self.pending_overflows = 0;
            OpenBatch {
                batch,
                started: now,
            }
        });
        open.batch.samples.push(sample);

        if open.batch.len() >= self.policy.target_count || self.expired(now) {
            self.take()
        } else {
            None
        }
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = Sample>, now: Instant) -> Vec<Batch> {
        samples
            .into_iter()
            .filter_map(|sample| self.push(sample, now))
            .collect()
    }

    /// Attribute an overflow to the open batch, or the next one
    pub fn note_overflow(&mut self) {
        match self.open.as_mut() {
            Some(open) => open.batch.overflows += 1,
            None => self.pending_overflows += 1,
        }
    }

    /// Close the open batch if its age bound has passed
    pub fn poll(&mut self, now: Instant) -> Option<Batch> {
        if self.expired(now) {
            self.take()
        } else {
            None
        }
    }

    /// Close the open batch regardless of bounds
    pub fn flush(&mut self) -> Option<Batch> {
        self.take()
    }

    /// Samples in the open batch
    pub fn pending(&self) -> usize {
        self.open.as_ref().map_or(0, |open| open.batch.len())
    }

    fn expired(&self, now: Instant) -> bool {
        match (&self.open, self.policy.max_age) {
            (Some(open), Some(max_age)) => now.saturating_duration_since(open.started) >= max_age,
            _ => false,
        }
    }

    fn take(&mut self) -> Option<Batch> {
        self.open
            .take()
            .map(|open| open.batch)
            .filter(|batch| !batch.is_empty())
    }
}

/// Totals reported by the decoder worker when it exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderSummary {
    pub blocks: u64,
    pub samples: u64,
    pub batches: u64,
    pub overflows: u64,
    /// Batches discarded because the sink was gone
    pub dropped_batches: u64,
}

/// Result of waiting on a [`BatchStream`] with a timeout
#[derive(Debug)]
pub enum NextBatch {
    Batch(Batch),
    Timeout,
    EndOfStream,
}

/// Sink side of the pipeline
pub struct BatchStream {
    receiver: Receiver<Batch>,
}

impl BatchStream {
    /// Block until the next batch; `None` at end of stream
    pub fn next_batch(&self) -> Option<Batch> {
        self.receiver.recv().ok()
    }

    pub fn next_batch_timeout(&self, timeout: Duration) -> NextBatch {
        match self.receiver.recv_timeout(timeout) {
            Ok(batch) => NextBatch::Batch(batch),
            Err(RecvTimeoutError::Timeout) => NextBatch::Timeout,
            Err(RecvTimeoutError::Disconnected) => NextBatch::EndOfStream,
        }
    }
}

impl Iterator for BatchStream {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        self.next_batch()
    }
}

/// Join handle for the decoder worker
pub struct DecoderHandle {
    handle: JoinHandle<DecoderSummary>,
}

impl DecoderHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker to finish
    ///
    /// Blocks until every raw block producer is gone. If the sink is bounded
    /// and nobody drains the [`BatchStream`], drop the stream first.
    pub fn join(self) -> Result<DecoderSummary> {
        self.handle.join().map_err(|_| Mma8451Error::WorkerPanicked)
    }
}

/// Decoder worker settings
#[derive(Debug, Clone, Copy)]
pub struct DecoderOptions {
    pub policy: BatchPolicy,
    pub units: Units,
    /// Queue wait between age-bound checks
    pub poll_interval: Duration,
    pub sink_capacity: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            policy: BatchPolicy::default(),
            units: Units::default(),
            poll_interval: Duration::from_millis(50),
            sink_capacity: 16,
        }
    }
}

/// Start the decoder worker on `blocks`
pub fn spawn_decoder(
    blocks: Receiver<RawBlock>,
    options: DecoderOptions,
    epoch: Instant,
) -> (DecoderHandle, BatchStream) {
    let (sink, receiver) = bounded(options.sink_capacity.max(1));
    let worker = DecoderWorker {
        blocks,
        sink,
        decoder: Decoder::new(options.units, epoch),
        batcher: Batcher::new(options.policy, options.units),
        poll_interval: options.poll_interval,
        summary: DecoderSummary::default(),
        backlog: VecDeque::new(),
        backlog_warned: false,
        sink_open: true,
    };
    let handle = thread::spawn(move || worker.run());
    (DecoderHandle { handle }, BatchStream { receiver })
}

/// Decodes raw blocks and forwards finished batches
///
/// The raw block queue is always drained, even while the sink is full:
/// batches the sink cannot take yet wait in `backlog`. A stalled reader
/// therefore never backs up into the bridge worker.
struct DecoderWorker {
    blocks: Receiver<RawBlock>,
    sink: Sender<Batch>,
    decoder: Decoder,
    batcher: Batcher,
    poll_interval: Duration,
    summary: DecoderSummary,
    backlog: VecDeque<Batch>,
    backlog_warned: bool,
    sink_open: bool,
}

impl DecoderWorker {
    fn run(mut self) -> DecoderSummary {
        debug!("decoder worker started");
        loop {
            match self.blocks.recv_timeout(self.poll_interval) {
                Ok(block) => self.consume(block),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(batch) = self.batcher.poll(Instant::now()) {
                        self.backlog.push_back(batch);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(batch) = self.batcher.flush() {
                        self.backlog.push_back(batch);
                    }
                    break;
                }
            }
            self.forward();
        }

        // No producer is left; waiting on the sink stalls nobody
        while let Some(batch) = self.backlog.pop_front() {
            if self.sink_open && self.sink.send(batch).is_ok() {
                self.summary.batches += 1;
            } else {
                self.close_sink();
            }
        }
        debug!(summary = ?self.summary, "decoder worker finished");
        self.summary
    }

    fn consume(&mut self, block: RawBlock) {
        if block.overflowed {
            self.summary.overflows += 1;
            self.batcher.note_overflow();
        }
        let samples = self.decoder.decode(&block);
        self.summary.blocks += 1;
        self.summary.samples += samples.len() as u64;

        let batches = self.batcher.extend(samples, Instant::now());
        self.backlog.extend(batches);
    }

    /// Hand backlogged batches to the sink without blocking
    fn forward(&mut self) {
        while let Some(batch) = self.backlog.pop_front() {
            if !self.sink_open {
                self.summary.dropped_batches += 1;
                continue;
            }
            match self.sink.try_send(batch) {
                Ok(()) => self.summary.batches += 1,
                Err(TrySendError::Full(batch)) => {
                    self.backlog.push_front(batch);
                    if !self.backlog_warned {
                        warn!(backlog = self.backlog.len(), "batch sink full, holding batches");
                        self.backlog_warned = true;
                    }
                    return;
                }
                Err(TrySendError::Disconnected(_)) => self.close_sink(),
            }
        }
        self.backlog_warned = false;
    }

    fn close_sink(&mut self) {
        if self.sink_open {
            warn!("batch sink closed, discarding further batches");
            self.sink_open = false;
        }
        self.summary.dropped_batches += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BitDepth, FullScale, Scale};
    use crate::decoder::encode_axis;

    fn sample(i: usize) -> Sample {
        Sample {
            timestamp: i as f64,
            x: i as f32,
            y: 0.0,
            z: 1.0,
        }
    }

    fn raw_block(sequence: u64, samples: usize, overflowed: bool) -> RawBlock {
        let mut bytes = Vec::new();
        for i in 0..samples {
            for axis in 0..3 {
                bytes.extend_from_slice(&encode_axis((i * 3 + axis) as i16, BitDepth::Bits14));
            }
        }
        RawBlock {
            sequence,
            bytes,
            scale: Scale::new(BitDepth::Bits14, FullScale::G2),
            sample_period: Duration::from_micros(1250),
            captured_at: Instant::now(),
            overflowed,
        }
    }

    #[test]
    fn test_count_bound() {
        let mut batcher = Batcher::new(BatchPolicy::new(10, None), Units::G);
        let now = Instant::now();

        let batches = batcher.extend((0..23).map(sample), now);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 10));
        assert_eq!(batches[0].sequence, 0);
        assert_eq!(batches[1].sequence, 1);
        assert_eq!(batches[1].samples[0].x, 10.0);
        assert_eq!(batcher.pending(), 3);
    }

    #[test]
    fn test_age_bound() {
        let mut batcher = Batcher::new(BatchPolicy::new(100, Some(Duration::from_millis(500))), Units::G);
        let start = Instant::now();

        assert!(batcher.push(sample(0), start).is_none());
        assert!(batcher.poll(start + Duration::from_millis(100)).is_none());

        let batch = batcher.poll(start + Duration::from_millis(500)).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batcher.pending(), 0);
    }

    #[test]
    fn test_age_bound_checked_on_push() {
        let mut batcher = Batcher::new(BatchPolicy::new(100, Some(Duration::from_millis(10))), Units::G);
        let start = Instant::now();

        batcher.push(sample(0), start);
        let batch = batcher.push(sample(1), start + Duration::from_millis(20)).unwrap();
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn test_empty_batches_never_emitted() {
        let mut batcher = Batcher::new(BatchPolicy::new(5, Some(Duration::ZERO)), Units::G);
        assert!(batcher.poll(Instant::now()).is_none());
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn test_target_count_clamped() {
        let mut batcher = Batcher::new(BatchPolicy::new(0, None), Units::G);
        assert!(batcher.push(sample(0), Instant::now()).is_some());
    }

    #[test]
    fn test_overflow_attributed_to_batch() {
        let mut batcher = Batcher::new(BatchPolicy::new(2, None), Units::G);
        let now = Instant::now();

        batcher.note_overflow();
        batcher.push(sample(0), now);
        batcher.note_overflow();
        let batch = batcher.push(sample(1), now).unwrap();
        assert_eq!(batch.overflows, 2);
    }

    #[test]
    fn test_from_interval() {
        let policy = BatchPolicy::from_interval(DataRate::Hz100, Duration::from_millis(500));
        assert_eq!(policy.target_count, 50);
        assert_eq!(policy.max_age, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_decoder_drains_everything_after_close() {
        let (tx, rx) = bounded(4);
        let options = DecoderOptions {
            policy: BatchPolicy::new(10, None),
            units: Units::Counts,
            poll_interval: Duration::from_millis(5),
            sink_capacity: 64,
        };
        let (handle, stream) = spawn_decoder(rx, options, Instant::now());

        let producer = thread::spawn(move || {
            for sequence in 0..20 {
                tx.send(raw_block(sequence, 7, sequence == 3)).unwrap();
            }
        });
        producer.join().unwrap();

        let batches: Vec<Batch> = stream.collect();
        let total: usize = batches.iter().map(|b| b.len()).sum();
        assert_eq!(total, 140);
        assert_eq!(batches.len(), 14);

        let summary = handle.join().unwrap();
        assert_eq!(summary.samples, 140);
        assert_eq!(summary.blocks, 20);
        assert_eq!(summary.batches, 14);
        assert_eq!(summary.overflows, 1);
    }

    #[test]
    fn test_partial_batch_flushed_at_end_of_stream() {
        let (tx, rx) = bounded(4);
        let options = DecoderOptions {
            policy: BatchPolicy::new(100, None),
            ..DecoderOptions::default()
        };
        let (handle, stream) = spawn_decoder(rx, options, Instant::now());

        tx.send(raw_block(0, 5, false)).unwrap();
        drop(tx);

        assert_eq!(stream.next_batch().map(|b| b.len()), Some(5));
        assert!(stream.next_batch().is_none());
        assert!(matches!(
            stream.next_batch_timeout(Duration::from_millis(10)),
            NextBatch::EndOfStream
        ));
        assert_eq!(handle.join().unwrap().batches, 1);
    }

    #[test]
    fn test_dropped_sink_does_not_stall_decoder() {
        let (tx, rx) = bounded(4);
        let options = DecoderOptions {
            policy: BatchPolicy::new(1, None),
            sink_capacity: 1,
            ..DecoderOptions::default()
        };
        let (handle, stream) = spawn_decoder(rx, options, Instant::now());
        drop(stream);

        for sequence in 0..5 {
            tx.send(raw_block(sequence, 2, false)).unwrap();
        }
        drop(tx);

        let summary = handle.join().unwrap();
        assert_eq!(summary.samples, 10);
        assert_eq!(summary.dropped_batches, 10);
    }

    #[test]
    fn test_idle_queue_flushes_aged_batch() {
        let (tx, rx) = bounded(4);
        let options = DecoderOptions {
            policy: BatchPolicy::new(100, Some(Duration::from_millis(50))),
            poll_interval: Duration::from_millis(5),
            ..DecoderOptions::default()
        };
        let (handle, stream) = spawn_decoder(rx, options, Instant::now());

        tx.send(raw_block(0, 3, false)).unwrap();
        // Sender stays alive, so only the age bound can close the batch
        match stream.next_batch_timeout(Duration::from_secs(2)) {
            NextBatch::Batch(batch) => assert_eq!(batch.len(), 3),
            other => panic!("expected an aged batch, got {:?}", other),
        }
        assert!(!handle.is_finished());

        drop(tx);
        assert!(stream.next_batch().is_none());
        assert_eq!(handle.join().unwrap().batches, 1);
    }

    #[test]
    fn test_unread_sink_does_not_block_producers() {
        let (tx, rx) = bounded(2);
        let options = DecoderOptions {
            policy: BatchPolicy::new(4, None),
            poll_interval: Duration::from_millis(5),
            sink_capacity: 1,
            ..DecoderOptions::default()
        };
        let (handle, stream) = spawn_decoder(rx, options, Instant::now());

        // Nobody reads the stream while the producer runs
        for sequence in 0..50 {
            tx.send_timeout(raw_block(sequence, 8, false), Duration::from_secs(2))
                .expect("raw block queue stalled behind a full sink");
        }
        drop(tx);

        let batches: Vec<Batch> = stream.collect();
        assert_eq!(batches.len(), 100);
        assert!(batches.windows(2).all(|w| w[0].sequence + 1 == w[1].sequence));

        let summary = handle.join().unwrap();
        assert_eq!(summary.samples, 400);
        assert_eq!(summary.batches, 100);
        assert_eq!(summary.dropped_batches, 0);
    }
}
