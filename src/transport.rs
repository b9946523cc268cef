use crate::TransportError;
use serde::Deserialize;

/// FIFO bus access mode, as understood by the digitizer firmware.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BusMode {
    Blocking,
    NonBlocking,
}

impl BusMode {
    pub fn code(self) -> i32 {
        match self {
            BusMode::Blocking => 1,
            BusMode::NonBlocking => 2,
        }
    }
}

/// Register and FIFO access to a digitizer.
pub trait Transport {
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError>;

    fn read_register(&mut self, address: u32) -> Result<u32, TransportError>;

    /// Read up to `chunk.len()` words from the FIFO at `data_address` into
    /// `chunk`, returning how many of them are valid. Zero is a successful
    /// read of an empty FIFO.
    fn read_fifo(
        &mut self,
        chunk: &mut [u32],
        data_address: u32,
        status_address: u32,
        mode: BusMode,
        timeout_ms: u32,
    ) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        (**self).write_register(address, value)
    }

    fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
        (**self).read_register(address)
    }

    fn read_fifo(
        &mut self,
        chunk: &mut [u32],
        data_address: u32,
        status_address: u32,
        mode: BusMode,
        timeout_ms: u32,
    ) -> Result<usize, TransportError> {
        (**self).read_fifo(chunk, data_address, status_address, mode, timeout_ms)
    }
}
