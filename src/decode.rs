use crate::{Frame, FrameLayout, CHANNELS_PER_WORD};
use ndarray::Array2;

/// Raw ADC amplitudes indexed `[channel, sample]`.
pub type WaveformMatrix = Array2<u16>;

/// Unpack the interleaved payload of `frame` into a channel x sample matrix.
///
/// The payload is `samples_per_waveform` groups of `words_per_sample_group`
/// words. Word `p` of group `g` carries channel `2p` in its low half and
/// channel `2p + 1` in its high half, both at sample `g`.
///
/// `layout` must be the one `frame` was extracted with.
pub fn decode(frame: &Frame<'_>, layout: &FrameLayout) -> WaveformMatrix {
    debug_assert_eq!(frame.layout(), layout, "frame decoded with a foreign layout");
    let channels = layout.channel_count();
    let samples = layout.samples_per_waveform();
    let mut waves = WaveformMatrix::zeros((channels, samples));

    let groups = frame
        .payload()
        .chunks_exact(layout.words_per_sample_group())
        .take(samples);
    for (sample, group) in groups.enumerate() {
        for (pair, &word) in group.iter().enumerate() {
            let low = pair * CHANNELS_PER_WORD;
            let high = low + 1;
            if low < channels {
                waves[[low, sample]] = (word & 0xFFFF) as u16;
            }
            if high < channels {
                waves[[high, sample]] = (word >> 16) as u16;
            }
        }
    }

    waves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{extract_frame, FRAME_SENTINEL};
    use ndarray::array;

    fn pack(low: u16, high: u16) -> u32 {
        (low as u32) | ((high as u32) << 16)
    }

    #[test]
    fn small_frame_round_trip() {
        let layout = FrameLayout::new(4, 2, 2).unwrap();
        let words = [
            FRAME_SENTINEL,
            0xDEAD_BEEF,
            0x0002_0001,
            0x0004_0003,
            0x0006_0005,
            0x0008_0007,
        ];
        let frame = extract_frame(&words, &layout).unwrap();
        let waves = decode(&frame, &layout);
        assert_eq!(waves, array![[1u16, 5], [2, 6], [3, 7], [4, 8]]);
    }

    #[test]
    fn full_size_frame_unpacks_every_cell() {
        let layout = FrameLayout::default();
        let mut words = vec![FRAME_SENTINEL];
        words.extend(1..layout.header_word_count() as u32);
        for g in 0..layout.samples_per_waveform() {
            for p in 0..layout.words_per_sample_group() {
                let low = (1000 * g + 2 * p) as u16;
                let high = (1000 * g + 2 * p + 1) as u16 | 0x8000;
                words.push(pack(low, high));
            }
        }

        let frame = extract_frame(&words, &layout).unwrap();
        let waves = decode(&frame, &layout);
        assert_eq!(waves.dim(), (32, 40));
        for g in 0..layout.samples_per_waveform() {
            for p in 0..layout.words_per_sample_group() {
                assert_eq!(waves[[2 * p, g]], (1000 * g + 2 * p) as u16);
                assert_eq!(waves[[2 * p + 1, g]], (1000 * g + 2 * p + 1) as u16 | 0x8000);
            }
        }
    }

    #[test]
    fn leading_junk_does_not_change_the_matrix() {
        let layout = FrameLayout::new(6, 3, 4).unwrap();
        let mut words = vec![FRAME_SENTINEL, 0, 0, 0];
        words.extend((0..layout.payload_word_count() as u32).map(|i| i * 0x0001_0003));
        let clean = decode(&extract_frame(&words, &layout).unwrap(), &layout);

        for junk in [1usize, 7, 50] {
            let mut shifted: Vec<u32> = (0..junk as u32).map(|i| i.wrapping_mul(0x9E37)).collect();
            shifted.extend(&words);
            let frame = extract_frame(&shifted, &layout).unwrap();
            assert_eq!(frame.offset(), junk);
            assert_eq!(decode(&frame, &layout), clean);
        }
    }

    #[test]
    #[should_panic(expected = "foreign layout")]
    #[cfg(debug_assertions)]
    fn mismatched_layout_is_caught() {
        let layout = FrameLayout::new(2, 1, 2).unwrap();
        let words = [FRAME_SENTINEL, 0, pack(1, 2)];
        let frame = extract_frame(&words, &layout).unwrap();
        decode(&frame, &FrameLayout::new(4, 1, 2).unwrap());
    }

    #[test]
    fn header_contents_are_ignored() {
        let layout = FrameLayout::new(2, 1, 3).unwrap();
        let a = [FRAME_SENTINEL, 0, 0, pack(10, 20)];
        let b = [FRAME_SENTINEL, 0x1234_5678, FRAME_SENTINEL, pack(10, 20)];
        let wa = decode(&extract_frame(&a, &layout).unwrap(), &layout);
        let wb = decode(&extract_frame(&b, &layout).unwrap(), &layout);
        assert_eq!(wa, wb);
        assert_eq!(wa, array![[10u16], [20]]);
    }
}
