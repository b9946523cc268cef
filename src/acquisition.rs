use crate::{
    decode, extract_frame, AcqError, AcqMessage, DecodedEvent, Digitizer, FifoSettings,
    FrameError, ResyncPolicy, Result, Transport, TriggerSettings, WordAccumulator,
};
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};

/// Run-level settings, fixed before the first trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionSettings {
    pub n_events: usize,
    pub trigger: TriggerSettings,
    pub fifo: FifoSettings,
    pub resync: ResyncPolicy,
}

/// Receives decoded events in trigger order.
pub trait EventSink {
    fn accept(&mut self, event: DecodedEvent) -> Result<()>;

    fn frame_lost(&mut self, _index: usize, _reason: FrameError) -> Result<()> {
        Ok(())
    }
}

impl EventSink for Vec<AcqMessage> {
    fn accept(&mut self, event: DecodedEvent) -> Result<()> {
        self.push(AcqMessage::Event(event));
        Ok(())
    }

    fn frame_lost(&mut self, index: usize, reason: FrameError) -> Result<()> {
        self.push(AcqMessage::Lost { index, reason });
        Ok(())
    }
}

impl EventSink for Sender<AcqMessage> {
    fn accept(&mut self, event: DecodedEvent) -> Result<()> {
        self.send(AcqMessage::Event(event))
            .map_err(|_| AcqError::SinkClosed)
    }

    fn frame_lost(&mut self, index: usize, reason: FrameError) -> Result<()> {
        self.send(AcqMessage::Lost { index, reason })
            .map_err(|_| AcqError::SinkClosed)
    }
}

/// Event counts for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub requested: usize,
    /// Triggers actually attempted before the run ended.
    pub attempted: usize,
    pub decoded: usize,
    pub no_header: usize,
    pub incomplete: usize,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn lost(&self) -> usize {
        self.no_header + self.incomplete
    }

    fn record_loss(&mut self, reason: &FrameError) {
        match reason {
            FrameError::NoHeaderFound { .. } => self.no_header += 1,
            FrameError::IncompleteFrame { .. } => self.incomplete += 1,
        }
    }
}

/// Drives one digitizer through a run: arm, accumulate, synchronize, decode.
pub struct Acquisition<T> {
    digitizer: Digitizer<T>,
    accumulator: WordAccumulator,
    settings: AcquisitionSettings,
}

impl<T: Transport> Acquisition<T> {
    pub fn new(digitizer: Digitizer<T>, settings: AcquisitionSettings) -> Self {
        let accumulator = WordAccumulator::new(digitizer.layout(), settings.fifo);
        Self {
            digitizer,
            accumulator,
            settings,
        }
    }

    pub fn settings(&self) -> &AcquisitionSettings {
        &self.settings
    }

    pub fn into_digitizer(self) -> Digitizer<T> {
        self.digitizer
    }

    /// Write the trigger registers and log what the board reports back.
    pub fn setup(&mut self) -> Result<()> {
        self.digitizer.configure(&self.settings.trigger)?;
        self.digitizer.log_registers()?;
        Ok(())
    }

    /// Acquire `n_events` triggers, handing each decoded one to `sink`.
    ///
    /// Lost frames are counted and the run goes on. Transport and sink errors
    /// end the run. Setting `shutdown` ends it early with a summary.
    pub fn run<S: EventSink + ?Sized>(
        &mut self,
        sink: &mut S,
        shutdown: &AtomicBool,
    ) -> Result<RunSummary> {
        let n_events = self.settings.n_events;
        let refresh_every = (n_events / 10).max(1);
        let mut summary = RunSummary {
            requested: n_events,
            ..Default::default()
        };

        info!("Acquisition started: {} events requested", n_events);

        for index in 0..n_events {
            if shutdown.load(Ordering::SeqCst) {
                summary.cancelled = true;
                break;
            }
            if index % refresh_every == 0 {
                info!(
                    "[{}/{}]  {:.1}%",
                    index,
                    n_events,
                    100.0 * index as f64 / n_events as f64
                );
            }

            summary.attempted += 1;
            match self.acquire_event(index, sink, shutdown) {
                Ok(Ok(())) => summary.decoded += 1,
                Ok(Err(reason)) => {
                    warn!("Event {} lost: {}", index, reason);
                    summary.record_loss(&reason);
                }
                Err(AcqError::Cancelled) => {
                    summary.attempted -= 1;
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    error!(
                        "Run aborted at event {}: {} ({} of {} decoded)",
                        index, e, summary.decoded, n_events
                    );
                    return Err(e);
                }
            }
        }

        info!(
            "Acquisition finished: {} of {} events decoded, {} lost ({} without header, {} incomplete){}",
            summary.decoded,
            summary.requested,
            summary.lost(),
            summary.no_header,
            summary.incomplete,
            if summary.cancelled { ", cancelled" } else { "" }
        );

        Ok(summary)
    }

    /// Arm the digitizer and turn the next frame into an event.
    ///
    /// The outer error ends the run; the inner one only loses this trigger.
    fn acquire_event<S: EventSink + ?Sized>(
        &mut self,
        index: usize,
        sink: &mut S,
        shutdown: &AtomicBool,
    ) -> Result<std::result::Result<(), FrameError>> {
        let layout = *self.digitizer.layout();

        self.digitizer.start()?;
        if self.settings.resync == ResyncPolicy::Discard {
            self.accumulator.discard();
        }

        let decoded = loop {
            let buffer = self.accumulator.accumulate(
                self.digitizer.transport_mut(),
                layout.frame_word_count(),
                shutdown,
            )?;

            let outcome = extract_frame(buffer, &layout);
            let consumed = self.settings.resync.consumed(&outcome);
            let retry = self.settings.resync == ResyncPolicy::Retain
                && matches!(outcome, Err(FrameError::IncompleteFrame { .. }));
            let decoded = outcome.map(|frame| decode(&frame, &layout));

            match consumed {
                Some(words) => self.accumulator.consume(words),
                None => self.accumulator.discard(),
            }
            if !retry {
                break decoded;
            }
        };

        match decoded {
            Ok(waveforms) => {
                sink.accept(DecodedEvent::new(index, waveforms))?;
                Ok(Ok(()))
            }
            Err(reason) => {
                sink.frame_lost(index, reason)?;
                Ok(Err(reason))
            }
        }
    }
}
