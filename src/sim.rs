//! A software DT5560 that answers register writes and FIFO reads.
//!
//! Every start command queues one frame behind a few junk words. Reads hand
//! out the queue in random-sized pieces and sometimes come back empty, so the
//! accumulator and synchronizer see the same mess the real board produces.
//! Words left unread stay queued across triggers.

use crate::{
    BusMode, ConfigCommand, FrameLayout, Transport, TransportError, CHANNELS_PER_WORD,
    FRAME_SENTINEL,
};
use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};

/// Highest code of the 14-bit ADC.
const ADC_MAX_CODE: f64 = 16383.0;
/// Decay constant of simulated pulses, in samples.
const PULSE_TAU: f64 = 4.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimSettings {
    pub seed: Option<u64>,
    pub baseline: u16,
    pub noise: u16,
    pub pulse_probability: f64,
    pub pulse_depth: u16,
    pub junk_words_max: usize,
    pub empty_read_probability: f64,
}

impl Default for SimSettings {
    fn default() -> Self {
        Self {
            seed: None,
            baseline: 7900,
            noise: 6,
            pulse_probability: 0.5,
            pulse_depth: 900,
            junk_words_max: 8,
            empty_read_probability: 0.3,
        }
    }
}

pub struct SimulatedDigitizer {
    layout: FrameLayout,
    config_address: u32,
    settings: SimSettings,
    rng: StdRng,
    fifo: VecDeque<u32>,
    registers: HashMap<u32, u32>,
    triggers: u32,
}

impl SimulatedDigitizer {
    /// `config_address` is the register whose start command fires a trigger.
    pub fn new(layout: FrameLayout, config_address: u32, settings: SimSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            layout,
            config_address,
            settings,
            rng,
            fifo: VecDeque::new(),
            registers: HashMap::new(),
            triggers: 0,
        }
    }

    pub fn triggers(&self) -> u32 {
        self.triggers
    }

    /// Words still waiting in the FIFO.
    pub fn pending(&self) -> usize {
        self.fifo.len()
    }

    fn trigger(&mut self) {
        self.triggers += 1;

        let junk = self.rng.random_range(0..=self.settings.junk_words_max);
        for _ in 0..junk {
            let word = self.rng.random_range(0..FRAME_SENTINEL);
            self.fifo.push_back(word);
        }

        self.fifo.push_back(FRAME_SENTINEL);
        self.fifo.push_back(self.triggers);
        for _ in 2..self.layout.header_word_count() {
            self.fifo.push_back(0);
        }

        let waves = self.waveforms();
        let samples = self.layout.samples_per_waveform();
        for sample in 0..samples {
            for pair in waves.chunks_exact(CHANNELS_PER_WORD) {
                let low = pair[0][sample] as u32;
                let high = pair[1][sample] as u32;
                self.fifo.push_back(low | (high << 16));
            }
        }
        debug!(
            "Simulated trigger {} queued ({} junk words, {} pending)",
            self.triggers,
            junk,
            self.fifo.len()
        );
    }

    fn waveforms(&mut self) -> Vec<Vec<u16>> {
        let samples = self.layout.samples_per_waveform();
        let baseline = self.settings.baseline as f64;
        let noise = self.settings.noise as f64;
        let pulse_probability = self.settings.pulse_probability.clamp(0.0, 1.0);

        (0..self.layout.channel_count())
            .map(|_| {
                let pulse = if self.rng.random_bool(pulse_probability) {
                    let t0 = self.rng.random_range(0..samples);
                    let depth =
                        self.settings.pulse_depth as f64 * self.rng.random_range(0.2..=1.0);
                    Some((t0, depth))
                } else {
                    None
                };
                (0..samples)
                    .map(|s| {
                        let mut v = baseline;
                        if noise > 0.0 {
                            v += self.rng.random_range(-noise..=noise);
                        }
                        if let Some((t0, depth)) = pulse {
                            if s >= t0 {
                                v -= depth * (-((s - t0) as f64) / PULSE_TAU).exp();
                            }
                        }
                        v.round().clamp(0.0, ADC_MAX_CODE) as u16
                    })
                    .collect()
            })
            .collect()
    }
}

impl Transport for SimulatedDigitizer {
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        self.registers.insert(address, value);
        if address == self.config_address
            && value == ConfigCommand::Start.word(&self.layout)
        {
            self.trigger();
        }
        Ok(())
    }

    fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
        Ok(self.registers.get(&address).copied().unwrap_or(0))
    }

    fn read_fifo(
        &mut self,
        chunk: &mut [u32],
        _data_address: u32,
        _status_address: u32,
        _mode: BusMode,
        _timeout_ms: u32,
    ) -> Result<usize, TransportError> {
        let empty_probability = self.settings.empty_read_probability.clamp(0.0, 1.0);
        if self.fifo.is_empty() || chunk.is_empty() || self.rng.random_bool(empty_probability) {
            return Ok(0);
        }
        let available = self.fifo.len().min(chunk.len());
        let valid = self.rng.random_range(1..=available);
        for (slot, word) in chunk.iter_mut().zip(self.fifo.drain(..valid)) {
            *slot = word;
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AcqMessage, Acquisition, AcquisitionSettings, Digitizer, FifoSettings, RegisterMap,
        ResyncPolicy, TriggerSettings,
    };
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    const CONFIG: u32 = 0x20;

    fn registers() -> RegisterMap {
        RegisterMap {
            threshold: 0x10,
            delay: 0x14,
            acq_len: 0x18,
            config: CONFIG,
            fifo_data: 0x24,
            fifo_status: 0x28,
        }
    }

    fn sim(seed: u64) -> SimulatedDigitizer {
        SimulatedDigitizer::new(
            FrameLayout::default(),
            CONFIG,
            SimSettings {
                seed: Some(seed),
                ..Default::default()
            },
        )
    }

    fn run(seed: u64, n_events: usize, resync: ResyncPolicy) -> (Vec<AcqMessage>, usize) {
        let digitizer = Digitizer::new(sim(seed), registers(), FrameLayout::default());
        let settings = AcquisitionSettings {
            n_events,
            trigger: TriggerSettings {
                threshold: 7900,
                delay: 10,
            },
            fifo: FifoSettings {
                data_address: 0x24,
                status_address: 0x28,
                mode: BusMode::Blocking,
                timeout_ms: 200,
                backoff: Duration::from_micros(1),
                max_empty_reads: Some(10_000),
            },
            resync,
        };
        let mut acq = Acquisition::new(digitizer, settings);
        let mut sink = Vec::new();
        let summary = acq.run(&mut sink, &AtomicBool::new(false)).unwrap();
        (sink, summary.decoded)
    }

    #[test]
    fn only_the_start_command_triggers() {
        let mut dig = sim(1);
        let cfg = |cmd: ConfigCommand| cmd.word(&FrameLayout::DT5560);
        dig.write_register(CONFIG, cfg(ConfigCommand::Stop)).unwrap();
        dig.write_register(CONFIG, cfg(ConfigCommand::Reset)).unwrap();
        dig.write_register(0x10, cfg(ConfigCommand::Start)).unwrap();
        assert_eq!(dig.triggers(), 0);
        assert_eq!(dig.pending(), 0);

        dig.write_register(CONFIG, cfg(ConfigCommand::Start)).unwrap();
        assert_eq!(dig.triggers(), 1);
        assert!(dig.pending() >= 656);
        assert_eq!(dig.read_register(CONFIG).unwrap(), cfg(ConfigCommand::Start));
    }

    #[test]
    fn reads_never_exceed_the_chunk() {
        let mut dig = sim(2);
        dig.write_register(CONFIG, ConfigCommand::Start.word(&FrameLayout::DT5560)).unwrap();
        let total = dig.pending();
        let mut chunk = [0u32; 100];
        let mut got = 0;
        while dig.pending() > 0 {
            let n = dig
                .read_fifo(&mut chunk, 0, 0, BusMode::Blocking, 200)
                .unwrap();
            assert!(n <= chunk.len());
            got += n;
        }
        assert_eq!(got, total);
    }

    #[test]
    fn retained_words_decode_every_trigger() {
        let (events, decoded) = run(7, 25, ResyncPolicy::Retain);
        assert_eq!(decoded, 25);
        for msg in &events {
            let AcqMessage::Event(ev) = msg else {
                panic!("unexpected {:?}", msg);
            };
            assert_eq!(ev.waveforms.dim(), (32, 40));
            // baseline 7900, noise 6, pulses at most 900 deep
            assert!(ev.waveforms.iter().all(|&a| (6990..=7910).contains(&a)));
        }
    }

    #[test]
    fn discarding_still_accounts_for_every_trigger() {
        let (events, decoded) = run(11, 25, ResyncPolicy::Discard);
        assert_eq!(events.len(), 25);
        let indices: Vec<usize> = events
            .iter()
            .map(|m| match m {
                AcqMessage::Event(ev) => ev.index,
                AcqMessage::Lost { index, .. } => *index,
            })
            .collect();
        assert_eq!(indices, (0..25).collect::<Vec<_>>());
        let lost = events
            .iter()
            .filter(|m| matches!(m, AcqMessage::Lost { .. }))
            .count();
        assert!(decoded > 0);
        assert_eq!(decoded + lost, 25);
    }
}
