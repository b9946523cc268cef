//! Readout of a DT5560 waveform digitizer: FIFO word accumulation, frame
//! synchronization on the `0xFFFFFFFF` sentinel, and decoding of the
//! interleaved payload into per-channel waveforms.

mod accumulator;
mod acquisition;
mod config;
mod decode;
mod digitizer;
mod error;
mod event;
mod histogram;
mod layout;
#[cfg(feature = "r5560")]
mod r5560;
mod sim;
mod stats;
mod sync;
mod transport;
mod tui;

pub use accumulator::*;
pub use acquisition::*;
pub use config::*;
pub use decode::*;
pub use digitizer::*;
pub use error::*;
pub use event::*;
pub use histogram::*;
pub use layout::*;
#[cfg(feature = "r5560")]
pub use r5560::*;
pub use sim::*;
pub use stats::*;
pub use sync::*;
pub use transport::*;
pub use tui::*;
