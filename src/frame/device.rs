// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

/// Number of characters of a device model string.
pub const MODEL_LEN: usize = 20;

/// Fixed width device model string.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Model([u8; MODEL_LEN]);

impl Model {
    /// Create a model from raw characters.
    ///
    /// Input longer than [`MODEL_LEN`] is truncated, shorter input is
    /// padded with `NUL`.
    #[must_use]
    pub fn new(chars: &[u8]) -> Self {
        let mut raw = [0; MODEL_LEN];
        let len = chars.len().min(MODEL_LEN);
        raw[..len].copy_from_slice(&chars[..len]);
        Self(raw)
    }

    /// Create a model from register data where only the low byte
    /// of each (big-endian) register carries a character.
    #[must_use]
    pub fn from_registers(data: &[u8]) -> Self {
        let mut raw = [0; MODEL_LEN];
        for (c, reg) in raw.iter_mut().zip(data.chunks_exact(2)) {
            *c = reg[1];
        }
        Self(raw)
    }

    /// The printable part of the model, without trailing padding.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let raw = match self.0.iter().position(|&c| c == 0) {
            Some(end) => &self.0[..end],
            None => &self.0[..],
        };
        let s = match core::str::from_utf8(raw) {
            Ok(s) => s,
            Err(err) => core::str::from_utf8(&raw[..err.valid_up_to()]).unwrap_or_default(),
        };
        s.trim_end()
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; MODEL_LEN] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A device found on the bus.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Device {
    pub serial: Serial,
    pub slave_id: SlaveId,
    pub model: Option<Model>,
    pub firmware_version: Option<u32>,
}

impl Device {
    #[must_use]
    pub const fn new(serial: Serial, slave_id: SlaveId) -> Self {
        Self {
            serial,
            slave_id,
            model: None,
            firmware_version: None,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "serial {:>12} [{:08X}]  modbus id: {:>3}  model: {:<20}",
            self.serial,
            self.serial,
            self.slave_id,
            self.model.as_ref().map(Model::as_str).unwrap_or_default()
        )
    }
}
