//! Transport over the vendor R5560 SDK (`libr5560`), which talks to the
//! DT5560 over TCP.

use crate::{BusMode, Transport, TransportError};
use log::info;
use std::ffi::CString;

#[allow(non_camel_case_types)]
#[allow(non_snake_case)]
mod ffi {
    use libc::{c_char, c_int, c_void};

    pub const LOW_LEVEL_TCP: c_int = 0;

    #[repr(C)]
    #[derive(Debug)]
    pub struct tZMQEndpoint {
        pub zmq_context: *mut c_void,
        pub zmq_pullsocket: *mut c_void,
        pub zmq_connected: c_int,
        pub recv_blocking: c_int,
    }

    #[repr(C)]
    #[derive(Debug)]
    pub struct tR5560_Handle {
        pub Csocket: c_int,
        pub connected: c_int,
        pub __IICBASEADDRESS: u32,
        pub __IICBASEADDRESS_STATUS: u32,
        pub socketType: c_int,
        pub zmq: *mut tZMQEndpoint,
    }

    impl Default for tR5560_Handle {
        fn default() -> Self {
            Self {
                Csocket: 0,
                connected: 0,
                __IICBASEADDRESS: 0,
                __IICBASEADDRESS_STATUS: 0,
                socketType: LOW_LEVEL_TCP,
                zmq: std::ptr::null_mut(),
            }
        }
    }

    extern "C" {
        pub fn R5560_ConnectTCP(ipaddress: *mut c_char, port: u32, handle: *mut tR5560_Handle)
            -> c_int;
        pub fn NI_CloseConnection(handle: *mut tR5560_Handle) -> c_int;
        pub fn NI_WriteReg(data: u32, address: u32, handle: *mut tR5560_Handle) -> c_int;
        pub fn NI_ReadReg(data: *mut u32, address: u32, handle: *mut tR5560_Handle) -> c_int;
        pub fn NI_ReadFifo(
            data: *mut u32,
            count: u32,
            address: u32,
            fifo_status_address: u32,
            bus_mode: c_int,
            timeout_ms: u32,
            handle: *mut tR5560_Handle,
            valid_data: *mut u32,
        ) -> c_int;
    }
}

fn check(op: &'static str, code: libc::c_int) -> Result<(), TransportError> {
    match code {
        0 => Ok(()),
        code => Err(TransportError::Status { op, code }),
    }
}

/// An open TCP connection to a DT5560. Closed on drop.
#[derive(Debug)]
pub struct R5560 {
    handle: Box<ffi::tR5560_Handle>,
    address: String,
}

// The SDK handle is only ever used from the thread that owns it.
unsafe impl Send for R5560 {}

impl R5560 {
    pub fn connect(ip_address: &str, port: u32) -> Result<Self, TransportError> {
        let ip = CString::new(ip_address)
            .map_err(|_| TransportError::BadAddress(ip_address.to_string()))?;
        let address = format!("{}:{}", ip_address, port);
        let mut handle = Box::new(ffi::tR5560_Handle::default());

        info!("Connecting to {}", address);
        let code =
            unsafe { ffi::R5560_ConnectTCP(ip.as_ptr() as *mut libc::c_char, port, &mut *handle) };
        if code != 0 {
            return Err(TransportError::Connect { address, code });
        }
        info!("Connected to {}", address);

        Ok(Self { handle, address })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Drop for R5560 {
    fn drop(&mut self) {
        let code = unsafe { ffi::NI_CloseConnection(&mut *self.handle) };
        match check("close", code) {
            Ok(()) => info!("Connection to {} closed", self.address),
            Err(e) => log::error!("Closing {}: {}", self.address, e),
        }
    }
}

impl Transport for R5560 {
    fn write_register(&mut self, address: u32, value: u32) -> Result<(), TransportError> {
        let code = unsafe { ffi::NI_WriteReg(value, address, &mut *self.handle) };
        check("write_register", code)
    }

    fn read_register(&mut self, address: u32) -> Result<u32, TransportError> {
        let mut value = 0u32;
        let code = unsafe { ffi::NI_ReadReg(&mut value, address, &mut *self.handle) };
        check("read_register", code)?;
        Ok(value)
    }

    fn read_fifo(
        &mut self,
        chunk: &mut [u32],
        data_address: u32,
        status_address: u32,
        mode: BusMode,
        timeout_ms: u32,
    ) -> Result<usize, TransportError> {
        let mut valid = 0u32;
        // never ask for more words than the slice holds
        let count = u32::try_from(chunk.len()).unwrap_or(u32::MAX);
        let code = unsafe {
            ffi::NI_ReadFifo(
                chunk.as_mut_ptr(),
                count,
                data_address,
                status_address,
                mode.code(),
                timeout_ms,
                &mut *self.handle,
                &mut valid,
            )
        };
        check("read_fifo", code)?;
        Ok((valid as usize).min(chunk.len()))
    }
}
