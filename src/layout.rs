use crate::LayoutError;

/// Word that opens every frame in the FIFO stream.
pub const FRAME_SENTINEL: u32 = 0xFFFF_FFFF;

/// Number of 16-bit channel samples packed into one 32-bit FIFO word.
pub const CHANNELS_PER_WORD: usize = 2;

/// Largest channel count the config register can carry above its command byte.
pub const MAX_CHANNELS: usize = 0x00FF_FFFF;

/// Geometry of one event frame as the firmware writes it into the FIFO.
///
/// A frame is `header_word_count` words (the first being [`FRAME_SENTINEL`])
/// followed by `samples_per_waveform` groups of `words_per_sample_group`
/// words, each word holding two channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameLayout {
    channel_count: usize,
    samples_per_waveform: usize,
    header_word_count: usize,
}

impl FrameLayout {
    /// The DT5560 configuration used on the bench: 32 channels, 40 samples, 16 header words.
    pub const DT5560: FrameLayout = FrameLayout {
        channel_count: 32,
        samples_per_waveform: 40,
        header_word_count: 16,
    };

    pub fn new(
        channel_count: usize,
        samples_per_waveform: usize,
        header_word_count: usize,
    ) -> Result<Self, LayoutError> {
        if channel_count == 0 {
            return Err(LayoutError::NoChannels);
        }
        if channel_count % CHANNELS_PER_WORD != 0 {
            return Err(LayoutError::OddChannelCount(channel_count));
        }
        if samples_per_waveform == 0 {
            return Err(LayoutError::NoSamples);
        }
        // the sentinel itself lives in the header
        if header_word_count == 0 {
            return Err(LayoutError::NoHeader);
        }
        if channel_count > MAX_CHANNELS {
            return Err(LayoutError::TooManyChannels(channel_count));
        }
        if u32::try_from(samples_per_waveform).is_err() {
            return Err(LayoutError::TooManySamples(samples_per_waveform));
        }
        // a FIFO read requests the whole chunk in one 32-bit count
        let chunk = (channel_count / CHANNELS_PER_WORD)
            .checked_mul(samples_per_waveform)
            .and_then(|payload| payload.checked_add(header_word_count))
            .and_then(|frame| frame.checked_mul(2));
        if !chunk.is_some_and(|words| u32::try_from(words).is_ok()) {
            return Err(LayoutError::FrameTooLarge {
                channels: channel_count,
                samples: samples_per_waveform,
                header: header_word_count,
            });
        }
        Ok(Self {
            channel_count,
            samples_per_waveform,
            header_word_count,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    pub fn samples_per_waveform(&self) -> usize {
        self.samples_per_waveform
    }

    pub fn header_word_count(&self) -> usize {
        self.header_word_count
    }

    pub fn words_per_sample_group(&self) -> usize {
        self.channel_count / CHANNELS_PER_WORD
    }

    pub fn payload_word_count(&self) -> usize {
        self.words_per_sample_group() * self.samples_per_waveform
    }

    pub fn frame_word_count(&self) -> usize {
        self.header_word_count + self.payload_word_count()
    }

    /// Words requested per FIFO read. Two frames, so one frame boundary can
    /// fall inside a chunk.
    pub fn fifo_chunk_words(&self) -> usize {
        self.frame_word_count() * 2
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self::DT5560
    }
}
