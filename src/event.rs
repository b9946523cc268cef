use crate::{FrameError, WaveformMatrix};
use time::OffsetDateTime;

/// One decoded trigger, owned by whoever receives it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    /// Index of the trigger within the run, counting lost ones.
    pub index: usize,
    /// Wall-clock time at decode, in microseconds since the UNIX epoch.
    pub timestamp_us: u64,
    pub waveforms: WaveformMatrix,
}

impl DecodedEvent {
    pub fn new(index: usize, waveforms: WaveformMatrix) -> Self {
        Self {
            index,
            timestamp_us: now_us(),
            waveforms,
        }
    }

    pub fn n_channels(&self) -> usize {
        self.waveforms.nrows()
    }

    pub fn n_samples(&self) -> usize {
        self.waveforms.ncols()
    }

    /// Size of the waveform payload in bytes.
    pub fn size(&self) -> usize {
        self.waveforms.len() * std::mem::size_of::<u16>()
    }
}

/// What the acquisition thread reports to the consumer, in trigger order.
#[derive(Debug, Clone, PartialEq)]
pub enum AcqMessage {
    Event(DecodedEvent),
    Lost { index: usize, reason: FrameError },
}

fn now_us() -> u64 {
    let micros = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000;
    u64::try_from(micros).unwrap_or(0)
}
