// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

/// modbus-ext Error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Invalid buffer size
    BufferSize,
    /// Invalid CRC
    Crc(u16, u16),
    /// The receive window filled up before a frame could be decoded
    BufferOverflow,
    /// No frame arrived within the response timeout
    Timeout,
    /// A valid frame carried an unexpected command
    UnexpectedCommand(u8),
    /// A valid frame carried an unexpected address
    UnexpectedAddress(u8),
    /// Invalid byte count
    ByteCount(u8),
    /// Invalid extension marker
    ExtensionMarker(u8),
    /// Slave ID outside of `1..=247`
    SlaveId(u8),
    /// Unsupported event type
    EventType(u8),
    /// Unsupported event control value
    EventControl(u8),
    /// Unsupported baud rate
    BaudRate(u32),
    /// The transport adapter failed
    #[cfg(feature = "std")]
    Transport(std::io::ErrorKind),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Error::*;

        match self {
            BufferSize => write!(f, "Invalid buffer size"),
            Crc(expected, actual) => write!(
                f,
                "Invalid CRC: expected = 0x{expected:0>4X}, actual = 0x{actual:0>4X}"
            ),
            BufferOverflow => write!(f, "Receive buffer overflow"),
            Timeout => write!(f, "Response timeout"),
            UnexpectedCommand(cmd) => write!(f, "Unexpected command: 0x{cmd:0>2X}"),
            UnexpectedAddress(addr) => write!(f, "Unexpected address: 0x{addr:0>2X}"),
            ByteCount(cnt) => write!(f, "Invalid byte count: {cnt}"),
            ExtensionMarker(marker) => write!(f, "Invalid extension marker: 0x{marker:0>2X}"),
            SlaveId(id) => write!(f, "Invalid slave ID: {id}"),
            EventType(kind) => write!(f, "Invalid event type: {kind}"),
            EventControl(ctrl) => write!(f, "Invalid event control value: {ctrl}"),
            BaudRate(baud) => write!(f, "Unsupported baud rate: {baud}"),
            #[cfg(feature = "std")]
            Transport(kind) => write!(f, "Transport error: {kind}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.kind())
    }
}
