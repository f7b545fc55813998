// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Enumerate all devices on the bus.

use std::fmt;

use crate::{
    driver::{Driver, ScanStep, Transport},
    error::Error,
    frame::*,
};

type Result<T> = core::result::Result<T, Error>;

/// A device that answered the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredDevice {
    pub device: Device,
    /// Another device answered with the same slave ID.
    pub collision: bool,
}

impl fmt::Display for DiscoveredDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.device)?;
        if self.collision {
            write!(f, "  [MODBUS ID REPEAT]")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Init,
    Scanning,
    Done,
}

/// Scan state machine.
///
/// Every device that answers is followed by a read of its model string.
#[derive(Debug)]
pub struct DiscoverySession<'d, T> {
    driver: &'d mut Driver<T>,
    state: State,
    devices: Vec<DiscoveredDevice>,
}

impl<'d, T: Transport> DiscoverySession<'d, T> {
    pub fn new(driver: &'d mut Driver<T>) -> Self {
        Self {
            driver,
            state: State::Init,
            devices: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Devices in the order they answered.
    #[must_use]
    pub fn devices(&self) -> &[DiscoveredDevice] {
        &self.devices
    }

    #[must_use]
    pub fn into_devices(self) -> Vec<DiscoveredDevice> {
        self.devices
    }

    /// Perform a single scan step.
    ///
    /// Returns `false` once the scan has ended.
    pub fn step(&mut self) -> Result<bool> {
        let step = match self.state {
            State::Init => self.scan(Driver::scan_start)?,
            State::Scanning => self.scan(Driver::scan_next)?,
            State::Done => return Ok(false),
        };
        match step {
            ScanStep::Device(serial, slave_id) => {
                self.state = State::Scanning;
                self.record(serial, slave_id);
                Ok(true)
            }
            ScanStep::End => {
                #[cfg(feature = "log")]
                log::info!("Scan finished: {} device(s)", self.devices.len());
                self.state = State::Done;
                Ok(false)
            }
        }
    }

    /// Scan until the last device has answered.
    pub fn run(mut self) -> Result<Vec<DiscoveredDevice>> {
        while self.step()? {}
        Ok(self.devices)
    }

    #[cfg_attr(not(feature = "log"), allow(unused_variables))]
    fn scan(&mut self, request: fn(&mut Driver<T>) -> Result<ScanStep>) -> Result<ScanStep> {
        let retries = self.driver.config().scan_retries;
        let mut attempt = 0;
        loop {
            match request(self.driver) {
                Err(err @ (Error::Timeout | Error::Crc(_, _) | Error::BufferOverflow))
                    if attempt < retries =>
                {
                    attempt += 1;
                    #[cfg(feature = "log")]
                    log::warn!("Scan failed: {err} (retry {attempt} of {retries})");
                }
                res => return res,
            }
        }
    }

    fn record(&mut self, serial: Serial, slave_id: SlaveId) {
        if self.devices.iter().any(|d| d.device.serial == serial) {
            #[cfg(feature = "log")]
            log::debug!("Device {serial} answered again");
            return;
        }
        let mut collision = false;
        for other in self
            .devices
            .iter_mut()
            .filter(|d| d.device.slave_id == slave_id)
        {
            other.collision = true;
            collision = true;
        }
        #[cfg(feature = "log")]
        if collision {
            log::warn!("Slave ID {slave_id} is used by more than one device");
        }

        let mut device = Device::new(serial, slave_id);
        match self.driver.read_model(serial) {
            Ok(model) => device.model = Some(model),
            Err(_err) => {
                #[cfg(feature = "log")]
                log::warn!("Failed to read model of device {serial}: {_err}");
            }
        }
        #[cfg(feature = "log")]
        log::info!("{device}");
        self.devices.push(DiscoveredDevice { device, collision });
    }
}

/// Run a complete discovery session.
pub fn discover<T: Transport>(driver: &mut Driver<T>) -> Result<Vec<DiscoveredDevice>> {
    DiscoverySession::new(driver).run()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::driver::{Config, mock::*};

    #[test]
    fn single_device() {
        let transport = MockTransport::new()
            .reply(&scan_response(0x0000_ABCD, 5))
            .reply(&model_response(0x0000_ABCD, "WBMR6C"))
            .reply(&scan_end());
        let mut drv = driver(transport);
        let devices = discover(&mut drv).unwrap();
        assert_eq!(devices.len(), 1);
        let found = devices[0];
        assert_eq!(found.device.serial, 43981);
        assert_eq!(found.device.slave_id, 5);
        assert_eq!(found.device.model.unwrap().as_str(), "WBMR6C");
        assert!(!found.collision);

        let written = &drv.transport().written;
        assert_eq!(written.len(), 3);
        assert_eq!(written[0][2], 0x01);
        assert_eq!(written[1][2], 0x08);
        assert_eq!(written[2][2], 0x02);
    }

    #[test]
    fn empty_bus() {
        let mut drv = driver(MockTransport::new().reply(&scan_end()));
        assert!(discover(&mut drv).unwrap().is_empty());
    }

    #[test]
    fn slave_id_collision_flags_both_devices() {
        let transport = MockTransport::new()
            .reply(&scan_response(1, 5))
            .reply(&model_response(1, "A"))
            .reply(&scan_response(2, 5))
            .reply(&model_response(2, "B"))
            .reply(&scan_response(3, 6))
            .reply(&model_response(3, "C"))
            .reply(&scan_end());
        let mut drv = driver(transport);
        let devices = discover(&mut drv).unwrap();
        assert_eq!(devices.len(), 3);
        assert!(devices[0].collision);
        assert!(devices[1].collision);
        assert!(!devices[2].collision);
        assert_eq!(devices[1].device.model.unwrap().as_str(), "B");
    }

    #[test]
    fn missing_model_is_tolerated() {
        let transport = MockTransport::new()
            .reply(&scan_response(0x1234, 9))
            .silence()
            .reply(&scan_end());
        let mut drv = driver(transport);
        let devices = discover(&mut drv).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device.model, None);
    }

    #[test]
    fn repeated_serial_is_recorded_once() {
        let transport = MockTransport::new()
            .reply(&scan_response(7, 1))
            .reply(&model_response(7, "X"))
            .reply(&scan_response(7, 1))
            .reply(&scan_end());
        let mut drv = driver(transport);
        let devices = discover(&mut drv).unwrap();
        assert_eq!(devices.len(), 1);
        assert!(!devices[0].collision);
        // no second model read
        assert_eq!(drv.transport().written.len(), 4);
    }

    #[test]
    fn failed_scan_step_is_retried() {
        let transport = MockTransport::new()
            .silence()
            .reply(&scan_response(0xABCD, 5))
            .reply(&model_response(0xABCD, "WBMR6C"))
            .reply(&scan_end());
        let mut drv = driver(transport);
        let devices = discover(&mut drv).unwrap();
        assert_eq!(devices.len(), 1);
        let written = &drv.transport().written;
        assert_eq!(written[0], written[1]);
    }

    #[test]
    fn give_up_after_retries() {
        let config = Config {
            response_timeout: Duration::from_millis(2),
            scan_retries: 2,
            ..Default::default()
        };
        let mut drv = Driver::new(MockTransport::new(), config).unwrap();
        assert_eq!(discover(&mut drv), Err(Error::Timeout));
        assert_eq!(drv.transport().written.len(), 3);
    }

    #[test]
    fn unexpected_response_is_not_retried() {
        let reply = with_crc(&[0xFD, 0x46, 0x12]);
        let mut drv = driver(MockTransport::new().reply(&reply));
        assert_eq!(discover(&mut drv), Err(Error::UnexpectedCommand(0x12)));
        assert_eq!(drv.transport().written.len(), 1);
    }

    #[test]
    fn step_by_step() {
        let transport = MockTransport::new()
            .reply(&scan_response(1, 1))
            .reply(&model_response(1, "A"))
            .reply(&scan_end());
        let mut drv = driver(transport);
        let mut session = DiscoverySession::new(&mut drv);
        assert!(!session.is_done());
        assert_eq!(session.step(), Ok(true));
        assert_eq!(session.devices().len(), 1);
        assert_eq!(session.step(), Ok(false));
        assert!(session.is_done());
        assert_eq!(session.step(), Ok(false));
        assert_eq!(session.into_devices().len(), 1);
    }

    #[test]
    fn display_collision() {
        let found = DiscoveredDevice {
            device: Device::new(0xABCD, 5),
            collision: true,
        };
        assert!(found.to_string().ends_with("[MODBUS ID REPEAT]"));
        let found = DiscoveredDevice {
            collision: false,
            ..found
        };
        assert!(!found.to_string().contains("REPEAT"));
    }
}
