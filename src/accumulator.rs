use crate::{AcqError, BusMode, FrameLayout, Result, Transport};
use log::debug;
use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::Duration,
};

/// Where and how the FIFO is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FifoSettings {
    pub data_address: u32,
    pub status_address: u32,
    pub mode: BusMode,
    pub timeout_ms: u32,
    /// Pause after a read that delivered nothing.
    pub backoff: Duration,
    /// Consecutive empty reads tolerated before giving up; `None` waits forever.
    pub max_empty_reads: Option<u32>,
}

/// Pulls FIFO chunks into a growing buffer of unconsumed words.
#[derive(Debug)]
pub struct WordAccumulator {
    fifo: FifoSettings,
    buffer: Vec<u32>,
    chunk: Box<[u32]>,
}

impl WordAccumulator {
    pub fn new(layout: &FrameLayout, fifo: FifoSettings) -> Self {
        let chunk_words = layout.fifo_chunk_words();
        Self {
            fifo,
            buffer: Vec::with_capacity(chunk_words * 2),
            chunk: vec![0u32; chunk_words].into_boxed_slice(),
        }
    }

    /// Read until at least `target` words are buffered and return the whole
    /// buffer, which may be longer than `target`.
    ///
    /// Transport errors are returned as-is. Empty reads back off and retry,
    /// checking `shutdown` each time.
    pub fn accumulate<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        target: usize,
        shutdown: &AtomicBool,
    ) -> Result<&[u32]> {
        let mut empty_reads = 0u32;

        while self.buffer.len() < target {
            if shutdown.load(Ordering::SeqCst) {
                return Err(AcqError::Cancelled);
            }

            let valid = transport.read_fifo(
                &mut self.chunk,
                self.fifo.data_address,
                self.fifo.status_address,
                self.fifo.mode,
                self.fifo.timeout_ms,
            )?;

            if valid == 0 {
                empty_reads += 1;
                if let Some(max) = self.fifo.max_empty_reads {
                    if empty_reads >= max {
                        return Err(AcqError::FifoStarved { empty_reads });
                    }
                }
                thread::sleep(self.fifo.backoff);
                continue;
            }

            // never trust the driver to stay inside the chunk
            let valid = valid.min(self.chunk.len());
            empty_reads = 0;
            self.buffer.extend_from_slice(&self.chunk[..valid]);
            debug!(
                "FIFO delivered {} words, {} of {} buffered",
                valid,
                self.buffer.len(),
                target
            );
        }

        Ok(&self.buffer)
    }

    pub fn buffered(&self) -> &[u32] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop the first `words` buffered words.
    pub fn consume(&mut self, words: usize) {
        let words = words.min(self.buffer.len());
        self.buffer.drain(..words);
    }

    pub fn discard(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{ReadStep, ScriptedTransport};
    use crate::TransportError;

    fn settings(max_empty_reads: Option<u32>) -> FifoSettings {
        FifoSettings {
            data_address: 0x10,
            status_address: 0x14,
            mode: BusMode::Blocking,
            timeout_ms: 200,
            backoff: Duration::from_micros(1),
            max_empty_reads,
        }
    }

    fn small_layout() -> FrameLayout {
        FrameLayout::new(4, 2, 2).unwrap()
    }

    #[test]
    fn survives_alternating_empty_reads() {
        let layout = small_layout();
        let mut transport = ScriptedTransport::new([
            ReadStep::Empty,
            ReadStep::Words(vec![1, 2, 3]),
            ReadStep::Empty,
            ReadStep::Empty,
            ReadStep::Words(vec![4, 5, 6, 7]),
        ]);
        let mut acc = WordAccumulator::new(&layout, settings(None));
        let shutdown = AtomicBool::new(false);

        let words = acc
            .accumulate(&mut transport, layout.frame_word_count(), &shutdown)
            .unwrap();

        assert_eq!(words, &[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(transport.fifo_reads, 5);
        assert!(transport
            .requested
            .iter()
            .all(|&n| n == layout.fifo_chunk_words()));
    }

    #[test]
    fn already_full_buffer_skips_reads() {
        let layout = small_layout();
        let mut transport = ScriptedTransport::new([ReadStep::Words(vec![9; 8])]);
        let mut acc = WordAccumulator::new(&layout, settings(None));
        let shutdown = AtomicBool::new(false);

        acc.accumulate(&mut transport, 6, &shutdown).unwrap();
        acc.accumulate(&mut transport, 6, &shutdown).unwrap();
        assert_eq!(transport.fifo_reads, 1);
    }

    #[test]
    fn transport_error_is_surfaced() {
        let layout = small_layout();
        let mut transport =
            ScriptedTransport::new([ReadStep::Words(vec![1, 2]), ReadStep::Fail(-3)]);
        let mut acc = WordAccumulator::new(&layout, settings(None));
        let shutdown = AtomicBool::new(false);

        let err = acc.accumulate(&mut transport, 6, &shutdown).unwrap_err();
        assert!(matches!(
            err,
            AcqError::Transport(TransportError::Status { code: -3, .. })
        ));
        // nothing past the failed read
        assert_eq!(transport.fifo_reads, 2);
        assert_eq!(acc.buffered(), &[1, 2]);
    }

    #[test]
    fn bounded_retry_gives_up() {
        let layout = small_layout();
        let mut transport = ScriptedTransport::new([]);
        let mut acc = WordAccumulator::new(&layout, settings(Some(4)));
        let shutdown = AtomicBool::new(false);

        let err = acc.accumulate(&mut transport, 6, &shutdown).unwrap_err();
        assert!(matches!(err, AcqError::FifoStarved { empty_reads: 4 }));
        assert_eq!(transport.fifo_reads, 4);
    }

    #[test]
    fn shutdown_interrupts_wait() {
        let layout = small_layout();
        let mut transport = ScriptedTransport::new([]);
        let mut acc = WordAccumulator::new(&layout, settings(None));
        let shutdown = AtomicBool::new(true);

        let err = acc.accumulate(&mut transport, 6, &shutdown).unwrap_err();
        assert!(matches!(err, AcqError::Cancelled));
        assert_eq!(transport.fifo_reads, 0);
    }

    #[test]
    fn consume_keeps_remainder_in_order() {
        let layout = small_layout();
        let mut transport = ScriptedTransport::new([ReadStep::Words(vec![1, 2, 3, 4, 5, 6, 7, 8])]);
        let mut acc = WordAccumulator::new(&layout, settings(None));
        let shutdown = AtomicBool::new(false);

        acc.accumulate(&mut transport, 6, &shutdown).unwrap();
        acc.consume(6);
        assert_eq!(acc.buffered(), &[7, 8]);
        acc.consume(10);
        assert!(acc.is_empty());
    }
}
