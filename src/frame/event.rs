// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Size of the record header (`len`, `type`, `event_id[2]`).
const RECORD_HEADER_LEN: usize = 4;

/// Largest payload that fits into [`Event::payload`].
const MAX_PAYLOAD_LEN: usize = 8;

/// Register types that can raise events.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Coil = 1,
    DiscreteInput = 2,
    Holding = 3,
    Input = 4,
    /// Device events such as a reboot.
    System = 15,
}

impl TryFrom<u8> for EventType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Error> {
        let kind = match code {
            1 => Self::Coil,
            2 => Self::DiscreteInput,
            3 => Self::Holding,
            4 => Self::Input,
            15 => Self::System,
            _ => return Err(Error::EventType(code)),
        };
        Ok(kind)
    }
}

/// Event reporting mode of a register.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventControl {
    Disabled = 0,
    Enabled = 1,
    HighPriority = 2,
}

impl TryFrom<u8> for EventControl {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Error> {
        let ctrl = match value {
            0 => Self::Disabled,
            1 => Self::Enabled,
            2 => Self::HighPriority,
            _ => return Err(Error::EventControl(value)),
        };
        Ok(ctrl)
    }
}

/// A single event reported by a device.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// Raw event type, see [`EventType`].
    pub kind: u8,
    pub event_id: u16,
    pub payload: u64,
    /// The device that reported the event.
    pub slave_id: SlaveId,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event type: {:>3}   id: {:>5} [{:04X}]   payload: {:>10}   device {}",
            self.kind, self.event_id, self.event_id, self.payload, self.slave_id
        )
    }
}

/// Packed event records of an events response.
///
/// Each record is `len, type, event_id[2], payload[len]`.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecords<'d> {
    pub(crate) slave_id: SlaveId,
    pub(crate) data: &'d [u8],
}

impl<'d> EventRecords<'d> {
    #[must_use]
    pub const fn new(slave_id: SlaveId, data: &'d [u8]) -> Self {
        Self { slave_id, data }
    }

    /// Raw record data.
    #[must_use]
    pub const fn payload(&self) -> &'d [u8] {
        self.data
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Event iterator
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIter<'d> {
    offset: usize,
    records: EventRecords<'d>,
}

impl Iterator for EventIter<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.records.data;
        let header = data.get(self.offset..self.offset + RECORD_HEADER_LEN)?;
        let len = header[0] as usize;
        let start = self.offset + RECORD_HEADER_LEN;
        let end = (start + len).min(data.len());
        let raw = &data[start..end];
        #[cfg(feature = "log")]
        if raw.len() < len || len > MAX_PAYLOAD_LEN {
            log::warn!(
                "Clipping event payload of {len} byte(s) to {} byte(s)",
                raw.len().min(MAX_PAYLOAD_LEN)
            );
        }
        let raw = &raw[..raw.len().min(MAX_PAYLOAD_LEN)];
        let mut buf = [0; MAX_PAYLOAD_LEN];
        buf[..raw.len()].copy_from_slice(raw);
        self.offset = start + len;
        Some(Event {
            kind: header[1],
            event_id: BigEndian::read_u16(&header[2..4]),
            payload: LittleEndian::read_u64(&buf),
            slave_id: self.records.slave_id,
        })
    }
}

impl<'d> IntoIterator for EventRecords<'d> {
    type Item = Event;
    type IntoIter = EventIter<'d>;

    fn into_iter(self) -> Self::IntoIter {
        EventIter {
            offset: 0,
            records: self,
        }
    }
}
