use crate::{FrameLayout, Transport, TransportError};
use log::info;

/// Register addresses of the digitizer block in the loaded firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterMap {
    pub threshold: u32,
    pub delay: u32,
    pub acq_len: u32,
    pub config: u32,
    pub fifo_data: u32,
    pub fifo_status: u32,
}

/// Low byte of the config register; the channel count sits above it.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigCommand {
    Stop = 2,
    Reset = 0,
    Start = 1,
}

impl ConfigCommand {
    /// Stop, reset, start: issued before every trigger.
    pub const START_SEQUENCE: [ConfigCommand; 3] =
        [ConfigCommand::Stop, ConfigCommand::Reset, ConfigCommand::Start];

    /// Config register value for `layout`. [`FrameLayout::new`] caps the
    /// channel count at [`MAX_CHANNELS`](crate::MAX_CHANNELS), so the shift never drops bits.
    pub fn word(self, layout: &FrameLayout) -> u32 {
        self as u32 + ((layout.channel_count() as u32) << 8)
    }
}

/// Trigger settings written once before a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerSettings {
    pub threshold: u32,
    pub delay: u32,
}

/// Register-level control of one digitizer over some transport.
pub struct Digitizer<T> {
    transport: T,
    registers: RegisterMap,
    layout: FrameLayout,
}

impl<T: Transport> Digitizer<T> {
    pub fn new(transport: T, registers: RegisterMap, layout: FrameLayout) -> Self {
        Self {
            transport,
            registers,
            layout,
        }
    }

    pub fn registers(&self) -> &RegisterMap {
        &self.registers
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn configure(&mut self, trigger: &TriggerSettings) -> Result<(), TransportError> {
        self.transport
            .write_register(self.registers.threshold, trigger.threshold)?;
        self.transport
            .write_register(self.registers.delay, trigger.delay)?;
        self.transport.write_register(
            self.registers.acq_len,
            // fits in 32 bits, checked by FrameLayout::new
            self.layout.samples_per_waveform() as u32,
        )?;
        Ok(())
    }

    /// Re-arm the digitizer for the next trigger.
    pub fn start(&mut self) -> Result<(), TransportError> {
        for cmd in ConfigCommand::START_SEQUENCE {
            self.transport
                .write_register(self.registers.config, cmd.word(&self.layout))?;
        }
        Ok(())
    }

    /// Read back the setup registers and log them in one block.
    pub fn log_registers(&mut self) -> Result<(), TransportError> {
        let regs = [
            ("Threshold", self.registers.threshold),
            ("Delay", self.registers.delay),
            ("AcqLen", self.registers.acq_len),
            ("Config", self.registers.config),
            ("FifoStatus", self.registers.fifo_status),
        ];
        let mut reg_log = String::new();
        for (name, addr) in regs {
            let value = self.transport.read_register(addr)?;
            reg_log.push_str(&format!("{} [{:#010x}]: {}\n", name, addr, value));
        }
        if reg_log.ends_with('\n') {
            reg_log.pop();
        }
        info!("Digitizer registers:\n{}", reg_log);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use crate::MAX_CHANNELS;

    fn register_map() -> RegisterMap {
        RegisterMap {
            threshold: 0x100,
            delay: 0x104,
            acq_len: 0x108,
            config: 0x10C,
            fifo_data: 0x110,
            fifo_status: 0x114,
        }
    }

    #[test]
    fn configure_writes_trigger_and_length() {
        let mut dig = Digitizer::new(
            ScriptedTransport::default(),
            register_map(),
            FrameLayout::default(),
        );
        dig.configure(&TriggerSettings {
            threshold: 7900,
            delay: 10,
        })
        .unwrap();
        assert_eq!(
            dig.transport_mut().writes,
            vec![(0x100, 7900), (0x104, 10), (0x108, 40)]
        );
    }

    #[test]
    fn start_sequence_carries_channel_count() {
        let mut dig = Digitizer::new(
            ScriptedTransport::default(),
            register_map(),
            FrameLayout::default(),
        );
        dig.start().unwrap();
        assert_eq!(
            dig.transport_mut().writes,
            vec![
                (0x10C, 2 + (32 << 8)),
                (0x10C, 32 << 8),
                (0x10C, 1 + (32 << 8))
            ]
        );
    }

    #[test]
    fn config_word_keeps_wide_channel_counts() {
        let layout = FrameLayout::new(MAX_CHANNELS - 1, 1, 1).unwrap();
        assert_eq!(ConfigCommand::Start.word(&layout), 0xFFFF_FE01);
        assert_eq!(ConfigCommand::Stop.word(&FrameLayout::DT5560), 0x2002);
    }

    #[test]
    fn log_registers_reads_back() {
        let mut dig = Digitizer::new(
            ScriptedTransport::default(),
            register_map(),
            FrameLayout::default(),
        );
        dig.configure(&TriggerSettings {
            threshold: 1,
            delay: 2,
        })
        .unwrap();
        dig.log_registers().unwrap();
        assert_eq!(dig.into_transport().writes.len(), 3);
    }
}
