// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! [`Transport`] on top of a local serial port.

use std::{
    io::{self, Read, Write},
    time::{Duration, Instant},
};

use serialport::{DataBits, FlowControl, SerialPort, StopBits};

use crate::{
    driver::{Parity, SerialSettings, Transport},
    error::Error,
};

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

/// A serial port with 8 data bits, 1 stop bit and no flow control.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    last_activity: Option<Instant>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port", &self.port.name())
            .field("last_activity", &self.last_activity)
            .finish()
    }
}

impl SerialTransport {
    /// Open the device at `path`.
    ///
    /// `timeout` bounds a single blocking read.
    pub fn open(path: &str, settings: &SerialSettings, timeout: Duration) -> Result<Self, Error> {
        let port = serialport::new(path, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .parity(settings.parity.into())
            .timeout(timeout)
            .open()
            .map_err(io::Error::from)?;
        Ok(Self::new(port))
    }

    #[must_use]
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            last_activity: None,
        }
    }

    pub fn into_inner(self) -> Box<dyn SerialPort> {
        self.port
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(cnt) => {
                if cnt > 0 {
                    self.last_activity = Some(Instant::now());
                }
                Ok(cnt)
            }
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let cnt = self.port.write(buf)?;
        self.last_activity = Some(Instant::now());
        Ok(cnt)
    }

    fn configure(&mut self, settings: &SerialSettings) -> io::Result<()> {
        self.port.set_baud_rate(settings.baud_rate)?;
        self.port.set_parity(settings.parity.into())?;
        Ok(())
    }

    fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
}
