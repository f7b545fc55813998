// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod catalog;
mod device;
mod event;

pub use self::{catalog::*, device::*, event::*};
use crate::error::Error;

/// Address used by every broadcast request and by scan responses.
pub const BROADCAST_ADDRESS: u8 = 0xFD;

/// A frame always carries at least an address, a marker and two CRC bytes.
pub const MIN_FRAME_LEN: usize = 4;

/// Offset of the relayed standard PDU inside a [`Command::PduResponse`] frame.
pub const PDU_OFFSET: usize = 7;

/// Number of bytes the relay envelope adds in front of a standard PDU
/// (which itself lacks the leading slave address).
pub const PDU_ENVELOPE_LEN: usize = PDU_OFFSET - 1;

/// Holding register that stores the slave ID of a device.
pub const SLAVE_ID_REGISTER: Address = 128;

/// First holding register of the device model string.
pub const MODEL_REGISTER: Address = 200;

/// Slave ID
pub type SlaveId = u8;

/// Factory serial number of a device.
pub type Serial = u32;

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// Lowest slave ID a device may be assigned.
pub const MIN_SLAVE_ID: SlaveId = 1;

/// Highest slave ID a device may be assigned.
pub const MAX_SLAVE_ID: SlaveId = 247;

/// Check that `id` is an assignable slave ID.
pub const fn validate_slave_id(id: SlaveId) -> Result<SlaveId, Error> {
    if id < MIN_SLAVE_ID || id > MAX_SLAVE_ID {
        return Err(Error::SlaveId(id));
    }
    Ok(id)
}

/// The location of all bytes that belong to the frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLocation {
    /// The index where the frame starts
    pub start: usize,
    /// Number of bytes that belong to the frame
    pub size: usize,
}

impl FrameLocation {
    /// One past the last byte of the frame.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.size
    }
}

/// The byte that follows the address and marks a frame as extended.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtensionMarker {
    /// `0x46`
    #[default]
    Standard,
    /// `0x60`, understood by old firmware only.
    Legacy,
}

impl ExtensionMarker {
    /// Get the [`u8`] value of the marker.
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Standard => 0x46,
            Self::Legacy => 0x60,
        }
    }

    /// Returns `true` if `byte` is one of the accepted markers.
    #[must_use]
    pub const fn is_marker(byte: u8) -> bool {
        byte == Self::Standard.value() || byte == Self::Legacy.value()
    }
}

impl TryFrom<u8> for ExtensionMarker {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte {
            0x46 => Ok(Self::Standard),
            0x60 => Ok(Self::Legacy),
            _ => Err(Error::ExtensionMarker(byte)),
        }
    }
}

/// An extended command (the byte after the marker).
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `0x01`
    ScanStart,
    /// `0x02`
    ScanNext,
    /// `0x03`
    ScanResponse,
    /// `0x04`
    ScanEnd,
    /// `0x08`: a standard PDU addressed by serial number.
    PduRequest,
    /// `0x09`: the answer to [`Command::PduRequest`].
    PduResponse,
    /// `0x10`
    EventsRequest,
    /// `0x11`
    EventsResponse,
    /// `0x12`
    EventsEnd,
    /// `0x18`: request and response share the code.
    EventsControl,
    /// Any other command byte.
    Custom(u8),
}

impl Command {
    /// Create a new [`Command`] with `value`.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x01 => Self::ScanStart,
            0x02 => Self::ScanNext,
            0x03 => Self::ScanResponse,
            0x04 => Self::ScanEnd,
            0x08 => Self::PduRequest,
            0x09 => Self::PduResponse,
            0x10 => Self::EventsRequest,
            0x11 => Self::EventsResponse,
            0x12 => Self::EventsEnd,
            0x18 => Self::EventsControl,
            code => Self::Custom(code),
        }
    }

    /// Get the [`u8`] value of the current [`Command`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ScanStart => 0x01,
            Self::ScanNext => 0x02,
            Self::ScanResponse => 0x03,
            Self::ScanEnd => 0x04,
            Self::PduRequest => 0x08,
            Self::PduResponse => 0x09,
            Self::EventsRequest => 0x10,
            Self::EventsResponse => 0x11,
            Self::EventsEnd => 0x12,
            Self::EventsControl => 0x18,
            Self::Custom(code) => code,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0>2X}", self.value())
    }
}

/// A CRC-checked frame borrowed from the receive window.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'f> {
    bytes: &'f [u8],
}

impl<'f> Frame<'f> {
    pub(crate) const fn new(bytes: &'f [u8]) -> Self {
        Self { bytes }
    }

    /// Slave address or [`BROADCAST_ADDRESS`].
    #[must_use]
    pub const fn address(&self) -> u8 {
        self.bytes[0]
    }

    #[must_use]
    pub const fn marker(&self) -> u8 {
        self.bytes[1]
    }

    #[must_use]
    pub const fn command(&self) -> Command {
        Command::new(self.bytes[2])
    }

    /// Everything between the command byte and the CRC.
    #[must_use]
    pub fn payload(&self) -> &'f [u8] {
        let end = self.bytes.len().saturating_sub(2);
        self.bytes.get(3..end).unwrap_or(&[])
    }

    /// The raw frame including its CRC.
    #[must_use]
    pub const fn as_bytes(&self) -> &'f [u8] {
        self.bytes
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Arguments of an event query.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventsRequest {
    /// Only devices with a slave ID not lower than this take part in arbitration.
    pub min_slave_id: SlaveId,
    /// Maximum size of the event data field in the response.
    pub max_data_len: u8,
    /// Device whose previously reported events are confirmed (`0` for none).
    pub confirm_slave_id: SlaveId,
    /// Confirmation flag echoed back by the device.
    pub confirm_flag: u8,
}

impl Default for EventsRequest {
    fn default() -> Self {
        Self {
            min_slave_id: 0,
            max_data_len: 0xFF,
            confirm_slave_id: 0,
            confirm_flag: 0,
        }
    }
}

/// Enable or disable event reporting for a single register.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventControlRequest {
    pub slave_id: SlaveId,
    pub event_type: EventType,
    pub register: Address,
    pub control: EventControl,
}

/// A request sent by the master.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    ScanStart,
    ScanNext,
    /// Read the model string of the device with the given serial.
    ReadModel(Serial),
    /// Write a new slave ID to the device with the given serial.
    ChangeSlaveId(Serial, SlaveId),
    Events(EventsRequest),
    EventControl(EventControlRequest),
}

impl Request {
    /// Number of bytes required for the serialized frame (including CRC).
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        match *self {
            Self::ScanStart | Self::ScanNext => 5,
            Self::ReadModel(_) | Self::ChangeSlaveId(_, _) => 14,
            Self::Events(_) => 9,
            Self::EventControl(_) => 11,
        }
    }

    /// The extension marker that goes on the wire.
    ///
    /// Event commands are unknown to legacy firmware and always use
    /// [`ExtensionMarker::Standard`].
    #[must_use]
    pub const fn marker(&self, configured: ExtensionMarker) -> ExtensionMarker {
        match self {
            Self::Events(_) | Self::EventControl(_) => ExtensionMarker::Standard,
            _ => configured,
        }
    }
}

impl From<Request> for Command {
    fn from(r: Request) -> Self {
        match r {
            Request::ScanStart => Self::ScanStart,
            Request::ScanNext => Self::ScanNext,
            Request::ReadModel(_) | Request::ChangeSlaveId(_, _) => Self::PduRequest,
            Request::Events(_) => Self::EventsRequest,
            Request::EventControl(_) => Self::EventsControl,
        }
    }
}

/// Header fields of an events response.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventsHeader {
    /// The device that won the arbitration.
    pub slave_id: SlaveId,
    pub flag: u8,
    /// Number of events announced by the device.
    pub count: u8,
}

/// A decoded response.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response<'r> {
    /// A device answered the scan.
    ScanDevice(Serial, SlaveId),
    /// No more devices take part in the scan.
    ScanEnd,
    /// A relayed standard PDU (function code followed by its data).
    Pdu(Serial, &'r [u8]),
    Events(EventsHeader, EventRecords<'r>),
    NoEvents,
    /// Acknowledged event configuration with the device's control bytes.
    EventControl(SlaveId, &'r [u8]),
}

impl<'r> From<Response<'r>> for Command {
    fn from(r: Response<'r>) -> Self {
        match r {
            Response::ScanDevice(_, _) => Self::ScanResponse,
            Response::ScanEnd => Self::ScanEnd,
            Response::Pdu(_, _) => Self::PduResponse,
            Response::Events(_, _) => Self::EventsResponse,
            Response::NoEvents => Self::EventsEnd,
            Response::EventControl(_, _) => Self::EventsControl,
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn command_into_u8() {
        assert_eq!(Command::ScanResponse.value(), 0x03);
        assert_eq!(Command::EventsControl.value(), 0x18);
        assert_eq!(Command::Custom(0xBB).value(), 0xBB);
    }

    #[test]
    fn command_from_u8() {
        assert_eq!(Command::new(0x04), Command::ScanEnd);
        assert_eq!(Command::new(0x09), Command::PduResponse);
        assert_eq!(Command::new(0xBB), Command::Custom(0xBB));
        for code in 0..=0xFF {
            assert_eq!(Command::new(code).value(), code);
        }
    }

    #[test]
    fn command_from_request() {
        let requests = &[
            (Request::ScanStart, 0x01),
            (Request::ScanNext, 0x02),
            (Request::ReadModel(1), 0x08),
            (Request::ChangeSlaveId(1, 2), 0x08),
            (Request::Events(EventsRequest::default()), 0x10),
            (
                Request::EventControl(EventControlRequest {
                    slave_id: 1,
                    event_type: EventType::Holding,
                    register: 0,
                    control: EventControl::Enabled,
                }),
                0x18,
            ),
        ];
        for (req, expected) in requests {
            assert_eq!(Command::from(*req).value(), *expected);
        }
    }

    #[test]
    fn default_events_request_accepts_full_data_field() {
        let req = EventsRequest::default();
        assert_eq!(req.max_data_len, 0xFF);
        assert_eq!(req.min_slave_id, 0);
        assert_eq!(req.confirm_slave_id, 0);
        assert_eq!(req.confirm_flag, 0);
    }

    #[test]
    fn events_always_use_standard_marker() {
        let legacy = ExtensionMarker::Legacy;
        assert_eq!(Request::ScanStart.marker(legacy), legacy);
        assert_eq!(Request::ReadModel(7).marker(legacy), legacy);
        assert_eq!(
            Request::Events(EventsRequest::default()).marker(legacy),
            ExtensionMarker::Standard
        );
    }

    #[test]
    fn extension_marker_from_u8() {
        assert_eq!(ExtensionMarker::try_from(0x46), Ok(ExtensionMarker::Standard));
        assert_eq!(ExtensionMarker::try_from(0x60), Ok(ExtensionMarker::Legacy));
        assert_eq!(
            ExtensionMarker::try_from(0x47),
            Err(Error::ExtensionMarker(0x47))
        );
        assert!(ExtensionMarker::is_marker(0x60));
        assert!(!ExtensionMarker::is_marker(0xFD));
    }

    #[test]
    fn slave_id_range() {
        assert_eq!(validate_slave_id(0), Err(Error::SlaveId(0)));
        assert_eq!(validate_slave_id(1), Ok(1));
        assert_eq!(validate_slave_id(247), Ok(247));
        assert_eq!(validate_slave_id(248), Err(Error::SlaveId(248)));
    }

    #[test]
    fn frame_accessors() {
        let bytes = &[0xFD, 0x46, 0x03, 0x00, 0x00, 0xAB, 0xCD, 0x05, 0x4C, 0x52];
        let frame = Frame::new(bytes);
        assert_eq!(frame.address(), BROADCAST_ADDRESS);
        assert_eq!(frame.marker(), 0x46);
        assert_eq!(frame.command(), Command::ScanResponse);
        assert_eq!(frame.payload(), &[0x00, 0x00, 0xAB, 0xCD, 0x05]);
        assert_eq!(frame.len(), 10);

        let short = Frame::new(&[0xFD, 0x46, 0x04, 0xD3]);
        assert!(short.payload().is_empty());
    }

    #[test]
    fn frame_location_end() {
        assert_eq!(FrameLocation { start: 0, size: 3 }.end(), 3);
        assert_eq!(FrameLocation { start: 2, size: 3 }.end(), 5);
        assert_eq!(FrameLocation { start: 2, size: 0 }.end(), 2);
    }
}
