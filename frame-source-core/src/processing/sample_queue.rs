use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::audio_models::{ReadOutcome, ReadStatus};
use crate::processing::ring_buffer::RingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueuePhase {
    Idle,
    Recording,
    Stopped,
    Closed,
}

#[derive(Debug)]
struct QueueState {
    ring: RingBuffer,
    phase: QueuePhase,
    // Bumped on every stop/close so a waiter that slept through a
    // stop → start cycle still sees the stop.
    generation: u64,
}

/// Bounded handoff between a device producer and a blocking reader.
///
/// The producer side (an audio callback, a simulated feeder) calls `push`;
/// the reader blocks in `read` until its destination is full, capture is
/// stopped, the queue is closed or the deadline passes. `stop` and `close`
/// may be called from any thread and wake every waiting reader.
#[derive(Debug)]
pub struct SampleQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl SampleQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                ring: RingBuffer::new(capacity),
                phase: QueuePhase::Idle,
                generation: 0,
            }),
            ready: Condvar::new(),
        }
    }

    /// Begin accepting samples. Stale samples from a previous run are dropped.
    ///
    /// Returns `false` if the queue is closed.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.phase == QueuePhase::Closed {
            return false;
        }
        state.ring.reset();
        state.phase = QueuePhase::Recording;
        true
    }

    /// Stop accepting samples and wake blocked readers.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if state.phase == QueuePhase::Closed {
            return;
        }
        state.phase = QueuePhase::Stopped;
        state.generation += 1;
        drop(state);
        self.ready.notify_all();
    }

    /// Close for good and wake blocked readers.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.phase = QueuePhase::Closed;
        state.generation += 1;
        drop(state);
        self.ready.notify_all();
    }

    /// Append captured samples. Ignored unless recording.
    ///
    /// Returns whether the samples were accepted.
    pub fn push(&self, samples: &[i16]) -> bool {
        let mut state = self.state.lock();
        if state.phase != QueuePhase::Recording {
            return false;
        }
        state.ring.write(samples);
        drop(state);
        self.ready.notify_all();
        true
    }

    /// Enlarge the buffer to hold at least `capacity` samples.
    pub fn reserve(&self, capacity: usize) {
        self.state.lock().ring.grow(capacity);
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().phase == QueuePhase::Recording
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().phase == QueuePhase::Closed
    }

    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        self.state.lock().ring.count()
    }

    /// Samples lost to overflow since the queue was created.
    pub fn overruns(&self) -> u64 {
        self.state.lock().ring.dropped()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    /// Fill `out` with samples in arrival order, blocking until it is full.
    ///
    /// Returns early with a partial count when capture is stopped or closed,
    /// or when `timeout` elapses. Samples already buffered are always drained
    /// first, so a stop never discards audio that was captured before it.
    pub fn read(&self, out: &mut [i16], timeout: Option<Duration>) -> ReadOutcome {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        let generation = state.generation;
        let mut filled = 0;

        loop {
            filled += state.ring.read_into(&mut out[filled..]);
            if filled == out.len() {
                return ReadOutcome {
                    samples: filled,
                    status: ReadStatus::Complete,
                };
            }

            if state.phase == QueuePhase::Closed {
                return ReadOutcome {
                    samples: filled,
                    status: ReadStatus::Closed,
                };
            }
            if state.phase != QueuePhase::Recording || state.generation != generation {
                return ReadOutcome {
                    samples: filled,
                    status: ReadStatus::Stopped,
                };
            }

            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut state, deadline).timed_out() {
                        filled += state.ring.read_into(&mut out[filled..]);
                        let status = if filled == out.len() {
                            ReadStatus::Complete
                        } else {
                            ReadStatus::TimedOut
                        };
                        return ReadOutcome {
                            samples: filled,
                            status,
                        };
                    }
                }
                None => self.ready.wait(&mut state),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn read_returns_complete_when_enough_buffered() {
        let queue = SampleQueue::new(16);
        assert!(queue.start());
        queue.push(&[1, 2, 3, 4, 5]);

        let mut out = [0i16; 4];
        let outcome = queue.read(&mut out, None);
        assert!(outcome.is_complete());
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(queue.available(), 1);
    }

    #[test]
    fn push_is_ignored_unless_recording() {
        let queue = SampleQueue::new(16);
        queue.push(&[1, 2, 3]);
        assert_eq!(queue.available(), 0);

        queue.start();
        queue.stop();
        queue.push(&[1, 2, 3]);
        assert_eq!(queue.available(), 0);
    }

    #[test]
    fn read_blocks_until_producer_fills_destination() {
        let queue = Arc::new(SampleQueue::new(64));
        queue.start();

        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            for chunk in [[1i16, 2], [3, 4], [5, 6]] {
                thread::sleep(Duration::from_millis(5));
                producer.push(&chunk);
            }
        });

        let mut out = [0i16; 6];
        let outcome = queue.read(&mut out, None);
        handle.join().unwrap();

        assert!(outcome.is_complete());
        assert_eq!(out, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn stop_unblocks_reader_with_partial_count() {
        let queue = Arc::new(SampleQueue::new(64));
        queue.start();
        queue.push(&[9, 9, 9]);

        let stopper = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            stopper.stop();
        });

        let started = Instant::now();
        let mut out = [0i16; 10];
        let outcome = queue.read(&mut out, None);
        handle.join().unwrap();

        assert_eq!(outcome.status, ReadStatus::Stopped);
        assert_eq!(outcome.samples, 3);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn close_reports_closed() {
        let queue = SampleQueue::new(8);
        queue.start();
        queue.close();

        let mut out = [0i16; 4];
        let outcome = queue.read(&mut out, None);
        assert_eq!(outcome.status, ReadStatus::Closed);
        assert_eq!(outcome.samples, 0);
        assert!(!queue.start());
    }

    #[test]
    fn timeout_returns_what_arrived() {
        let queue = SampleQueue::new(8);
        queue.start();
        queue.push(&[1, 2]);

        let mut out = [0i16; 4];
        let outcome = queue.read(&mut out, Some(Duration::from_millis(20)));
        assert_eq!(outcome.status, ReadStatus::TimedOut);
        assert_eq!(outcome.samples, 2);
        assert_eq!(&out[..2], &[1, 2]);
    }

    #[test]
    fn restart_drops_stale_samples() {
        let queue = SampleQueue::new(8);
        queue.start();
        queue.push(&[1, 2, 3]);
        queue.stop();
        queue.start();
        assert_eq!(queue.available(), 0);
    }

    #[test]
    fn read_after_stop_returns_immediately() {
        let queue = SampleQueue::new(8);
        queue.start();
        queue.stop();

        let mut out = [0i16; 4];
        let outcome = queue.read(&mut out, None);
        assert_eq!(outcome.status, ReadStatus::Stopped);
        assert_eq!(outcome.samples, 0);
    }

    #[test]
    fn push_reports_whether_samples_were_accepted() {
        let queue = SampleQueue::new(16);
        assert!(!queue.push(&[1]));

        queue.start();
        assert!(queue.push(&[1]));

        queue.stop();
        assert!(!queue.push(&[2]));
    }

    #[test]
    fn overruns_count_samples_lost_to_overflow() {
        let queue = SampleQueue::new(320);
        queue.start();
        queue.push(&vec![7; 743]);

        assert_eq!(queue.available(), 320);
        assert_eq!(queue.overruns(), 423);

        queue.reserve(1024);
        queue.push(&vec![7; 700]);
        assert_eq!(queue.available(), 1020);
        assert_eq!(queue.overruns(), 423);
    }
}
