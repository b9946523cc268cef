//! Per-channel histograms filled from decoded events.

use crate::WaveformMatrix;
use ndarray::{s, Array2, Array3, ArrayView2, Axis as NdAxis};

/// Fixed-width binning over `[min, max)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Axis {
    pub bins: usize,
    pub min: f64,
    pub max: f64,
}

impl Axis {
    pub fn new(bins: usize, min: f64, max: f64) -> Self {
        Self { bins, min, max }
    }

    /// ADC axis with bins `bin_width` codes wide.
    pub fn adc(min: u16, max: u16, bin_width: u16) -> Self {
        let bins = max.saturating_sub(min) as usize / bin_width.max(1) as usize;
        Self::new(bins, min as f64, max as f64)
    }

    pub fn width(&self) -> f64 {
        (self.max - self.min) / self.bins as f64
    }

    /// Bin holding `x`, or `None` when it falls outside the axis.
    pub fn bin(&self, x: f64) -> Option<usize> {
        if self.bins == 0 || !(self.min..self.max).contains(&x) {
            return None;
        }
        let bin = ((x - self.min) / self.width()) as usize;
        Some(bin.min(self.bins - 1))
    }

    pub fn center(&self, bin: usize) -> f64 {
        self.min + (bin as f64 + 0.5) * self.width()
    }
}

/// Time vs amplitude persistence, one 2-D histogram per channel.
#[derive(Debug, Clone)]
pub struct Persistence {
    time: Axis,
    adc: Axis,
    sample_period_ns: f64,
    counts: Array3<u64>,
}

impl Persistence {
    pub fn new(n_channels: usize, n_samples: usize, sample_period_ns: f64, adc: Axis) -> Self {
        let time = Axis::new(n_samples, 0.0, n_samples as f64 * sample_period_ns);
        Self {
            time,
            adc,
            sample_period_ns,
            counts: Array3::zeros((n_channels, time.bins, adc.bins)),
        }
    }

    pub fn fill(&mut self, waves: &WaveformMatrix) {
        for (ch, wave) in waves.outer_iter().enumerate().take(self.counts.dim().0) {
            for (sample, &amp) in wave.iter().enumerate() {
                let t = sample as f64 * self.sample_period_ns;
                if let (Some(tb), Some(ab)) = (self.time.bin(t), self.adc.bin(amp as f64)) {
                    self.counts[[ch, tb, ab]] += 1;
                }
            }
        }
    }

    /// `[time bin, adc bin]` counts of one channel.
    pub fn channel(&self, ch: usize) -> ArrayView2<'_, u64> {
        self.counts.slice(s![ch, .., ..])
    }

    pub fn entries(&self) -> u64 {
        self.counts.sum()
    }

    pub fn time_axis(&self) -> &Axis {
        &self.time
    }

    pub fn adc_axis(&self) -> &Axis {
        &self.adc
    }
}

/// Distribution of each channel's minimum sample per event.
#[derive(Debug, Clone)]
pub struct MinAmplitude {
    axis: Axis,
    counts: Array2<u64>,
    sums: Vec<f64>,
    events: u64,
}

impl MinAmplitude {
    pub fn new(n_channels: usize, axis: Axis) -> Self {
        Self {
            axis,
            counts: Array2::zeros((n_channels, axis.bins)),
            sums: vec![0.0; n_channels],
            events: 0,
        }
    }

    pub fn fill(&mut self, waves: &WaveformMatrix) {
        self.events += 1;
        let n_channels = self.sums.len();
        for (ch, wave) in waves.axis_iter(NdAxis(0)).enumerate().take(n_channels) {
            let Some(&min) = wave.iter().min() else {
                continue;
            };
            self.sums[ch] += min as f64;
            if let Some(bin) = self.axis.bin(min as f64) {
                self.counts[[ch, bin]] += 1;
            }
        }
    }

    pub fn counts(&self) -> &Array2<u64> {
        &self.counts
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn events(&self) -> u64 {
        self.events
    }

    /// Mean minimum per channel, including minima outside the axis.
    pub fn means(&self) -> Vec<f64> {
        let n = self.events.max(1) as f64;
        self.sums.iter().map(|s| s / n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn adc_axis_binning() {
        let axis = Axis::adc(6000, 8300, 4);
        assert_eq!(axis.bins, 575);
        assert_eq!(axis.width(), 4.0);
        assert_eq!(axis.bin(6000.0), Some(0));
        assert_eq!(axis.bin(6003.0), Some(0));
        assert_eq!(axis.bin(6004.0), Some(1));
        assert_eq!(axis.bin(8299.0), Some(574));
        assert_eq!(axis.bin(8300.0), None);
        assert_eq!(axis.bin(5999.0), None);
        assert_eq!(axis.center(0), 6002.0);
    }

    #[test]
    fn persistence_fills_time_and_amplitude() {
        let mut h = Persistence::new(2, 3, 8.0, Axis::adc(100, 200, 10));
        let waves = array![[100u16, 150, 250], [199, 99, 110]];
        h.fill(&waves);
        h.fill(&waves);

        assert_eq!(h.time_axis().bins, 3);
        assert_eq!(h.time_axis().max, 24.0);
        // two events, four in-range samples each
        assert_eq!(h.entries(), 8);
        assert_eq!(h.channel(0)[[0, 0]], 2);
        assert_eq!(h.channel(0)[[1, 5]], 2);
        assert_eq!(h.channel(1)[[0, 9]], 2);
        assert_eq!(h.channel(1)[[2, 1]], 2);
    }

    #[test]
    fn min_amplitude_tracks_minima() {
        let mut h = MinAmplitude::new(2, Axis::adc(6200, 8200, 8));
        h.fill(&array![[7900u16, 7000, 7800], [7900, 7901, 7899]]);
        h.fill(&array![[7900u16, 7100, 7800], [6000, 7901, 7899]]);

        assert_eq!(h.events(), 2);
        assert_eq!(h.counts()[[0, (7000 - 6200) / 8]], 1);
        assert_eq!(h.counts()[[0, (7100 - 6200) / 8]], 1);
        assert_eq!(h.counts()[[1, (7899 - 6200) / 8]], 1);
        // 6000 is below the axis
        assert_eq!(h.counts().row(1).sum(), 1);
        assert_eq!(h.means(), vec![7050.0, 6949.5]);
    }
}
