//! Frame synchronization: find the sentinel in a word buffer and cut one frame out of it.

use crate::{FrameError, FrameLayout, FRAME_SENTINEL};
use serde::Deserialize;

/// A complete frame borrowed from the accumulator buffer.
///
/// Only [`extract_frame`] builds one, so `words` always has exactly
/// `frame_word_count` entries and starts with the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    offset: usize,
    words: &'a [u32],
    layout: FrameLayout,
}

impl<'a> Frame<'a> {
    /// Position of the sentinel inside the buffer the frame was cut from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Buffer words up to and including the end of this frame.
    pub fn end(&self) -> usize {
        self.offset + self.words.len()
    }

    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Reserved header words following the sentinel.
    pub fn header(&self) -> &'a [u32] {
        &self.words[1..self.layout.header_word_count()]
    }

    pub fn payload(&self) -> &'a [u32] {
        &self.words[self.layout.header_word_count()..]
    }
}

/// Cut the frame that starts at the first sentinel in `buffer`.
///
/// Later sentinels are ignored for this event.
pub fn extract_frame<'a>(buffer: &'a [u32], layout: &FrameLayout) -> Result<Frame<'a>, FrameError> {
    let offset = buffer
        .iter()
        .position(|&w| w == FRAME_SENTINEL)
        .ok_or(FrameError::NoHeaderFound {
            buffered: buffer.len(),
        })?;

    let required = layout.frame_word_count();
    let available = buffer.len() - offset;
    if available < required {
        return Err(FrameError::IncompleteFrame {
            offset,
            available,
            required,
        });
    }

    Ok(Frame {
        offset,
        words: &buffer[offset..offset + required],
        layout: *layout,
    })
}

/// What happens to buffered words once a buffer has been synchronized.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResyncPolicy {
    /// Every event starts from an empty buffer, whatever the outcome.
    #[default]
    Discard,
    /// Keep words after an extracted frame for the next event, and keep a
    /// partial frame from its sentinel onwards while reading on to complete it.
    Retain,
}

impl ResyncPolicy {
    /// How many leading words to drop from the buffer after synchronizing it.
    /// `None` means drop everything.
    pub fn consumed(self, outcome: &Result<Frame<'_>, FrameError>) -> Option<usize> {
        match (self, outcome) {
            (ResyncPolicy::Discard, _) => None,
            (ResyncPolicy::Retain, Ok(frame)) => Some(frame.end()),
            (ResyncPolicy::Retain, Err(FrameError::IncompleteFrame { offset, .. })) => {
                Some(*offset)
            }
            (ResyncPolicy::Retain, Err(FrameError::NoHeaderFound { .. })) => None,
        }
    }
}
