use crate::{
    AcquisitionSettings, Axis, BusMode, FifoSettings, FrameLayout, LayoutError, RegisterMap,
    ResyncPolicy, SimSettings, TriggerSettings,
};
use confique::Config;
use std::time::Duration;

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub device: DeviceSettings,
    #[config(nested)]
    pub layout: LayoutSettings,
    #[config(nested)]
    pub acquisition: AcqSettings,
    #[config(nested)]
    pub monitor: MonitorSettings,
    #[config(nested)]
    pub simulation: SimulationSettings,
}

#[derive(Config, Debug, Clone)]
pub struct DeviceSettings {
    pub ip_address: String,
    #[config(default = 8888)]
    pub port: u32,
    pub threshold_addr: u32,
    pub delay_addr: u32,
    pub acq_len_addr: u32,
    pub config_addr: u32,
    pub fifo_data_addr: u32,
    pub fifo_status_addr: u32,
}

#[derive(Config, Debug, Clone)]
pub struct LayoutSettings {
    #[config(default = 32)]
    pub channel_count: usize,
    #[config(default = 40)]
    pub samples_per_waveform: usize,
    #[config(default = 16)]
    pub header_word_count: usize,
}

#[derive(Config, Debug, Clone)]
pub struct AcqSettings {
    #[config(default = 100)]
    pub n_events: usize,
    #[config(default = 7900)]
    pub threshold: u32,
    #[config(default = 10)]
    pub trigger_delay: u32,
    #[config(default = 200)]
    pub fifo_timeout_ms: u32,
    #[config(default = "blocking")]
    pub bus_mode: BusMode,
    #[config(default = 500)]
    pub empty_read_backoff_us: u64,
    pub max_empty_reads: Option<u32>,
    #[config(default = "discard")]
    pub resync_policy: ResyncPolicy,
}

#[derive(Config, Debug, Clone)]
pub struct MonitorSettings {
    #[config(default = 8.0)]
    pub sample_period_ns: f64,
    #[config(default = 6000)]
    pub adc_min: u16,
    #[config(default = 8300)]
    pub adc_max: u16,
    #[config(default = 4)]
    pub adc_bin: u16,
    #[config(default = 6200)]
    pub min_adc_min: u16,
    #[config(default = 8200)]
    pub min_adc_max: u16,
    #[config(default = 8)]
    pub min_adc_bin: u16,
}

#[derive(Config, Debug, Clone)]
pub struct SimulationSettings {
    pub seed: Option<u64>,
    #[config(default = 7900)]
    pub baseline: u16,
    #[config(default = 6)]
    pub noise: u16,
    #[config(default = 0.5)]
    pub pulse_probability: f64,
    #[config(default = 900)]
    pub pulse_depth: u16,
    #[config(default = 8)]
    pub junk_words_max: usize,
    #[config(default = 0.3)]
    pub empty_read_probability: f64,
}

impl Conf {
    pub fn frame_layout(&self) -> Result<FrameLayout, LayoutError> {
        FrameLayout::new(
            self.layout.channel_count,
            self.layout.samples_per_waveform,
            self.layout.header_word_count,
        )
    }

    pub fn registers(&self) -> RegisterMap {
        RegisterMap {
            threshold: self.device.threshold_addr,
            delay: self.device.delay_addr,
            acq_len: self.device.acq_len_addr,
            config: self.device.config_addr,
            fifo_data: self.device.fifo_data_addr,
            fifo_status: self.device.fifo_status_addr,
        }
    }

    pub fn acquisition_settings(&self) -> AcquisitionSettings {
        let acq = &self.acquisition;
        AcquisitionSettings {
            n_events: acq.n_events,
            trigger: TriggerSettings {
                threshold: acq.threshold,
                delay: acq.trigger_delay,
            },
            fifo: FifoSettings {
                data_address: self.device.fifo_data_addr,
                status_address: self.device.fifo_status_addr,
                mode: acq.bus_mode,
                timeout_ms: acq.fifo_timeout_ms,
                backoff: Duration::from_micros(acq.empty_read_backoff_us),
                max_empty_reads: acq.max_empty_reads,
            },
            resync: acq.resync_policy,
        }
    }

    pub fn sim_settings(&self) -> SimSettings {
        let sim = &self.simulation;
        SimSettings {
            seed: sim.seed,
            baseline: sim.baseline,
            noise: sim.noise,
            pulse_probability: sim.pulse_probability,
            pulse_depth: sim.pulse_depth,
            junk_words_max: sim.junk_words_max,
            empty_read_probability: sim.empty_read_probability,
        }
    }

    pub fn persistence_axis(&self) -> Axis {
        Axis::adc(self.monitor.adc_min, self.monitor.adc_max, self.monitor.adc_bin)
    }

    pub fn min_amplitude_axis(&self) -> Axis {
        Axis::adc(
            self.monitor.min_adc_min,
            self.monitor.min_adc_max,
            self.monitor.min_adc_bin,
        )
    }
}
