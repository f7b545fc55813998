// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extended Modbus RTU framing

use super::*;

pub mod client;

/// Capacity of a [`ReceiveWindow`].
pub const RX_CAPACITY: usize = 512;

/// Bytes received since the last request was sent.
#[derive(Debug, Clone)]
pub struct ReceiveWindow {
    buf: [u8; RX_CAPACITY],
    len: usize,
    overflow: bool,
}

impl Default for ReceiveWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiveWindow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buf: [0; RX_CAPACITY],
            len: 0,
            overflow: false,
        }
    }

    /// Append received bytes.
    ///
    /// Bytes that do not fit are dropped and the window is marked as
    /// overflowed. Returns the number of bytes appended.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let cnt = bytes.len().min(RX_CAPACITY - self.len);
        self.buf[self.len..self.len + cnt].copy_from_slice(&bytes[..cnt]);
        self.len += cnt;
        if cnt < bytes.len() {
            self.overflow = true;
        }
        cnt
    }

    /// Forget all received bytes.
    pub fn clear(&mut self) {
        self.len = 0;
        self.overflow = false;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The bytes that belong to `location`.
    #[must_use]
    pub fn frame(&self, location: FrameLocation) -> Option<&[u8]> {
        self.as_slice().get(location.start..location.end())
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        RX_CAPACITY
    }

    /// Returns `true` if bytes had to be dropped since the last [`clear`](Self::clear).
    #[must_use]
    pub const fn is_overflowed(&self) -> bool {
        self.overflow
    }
}

/// The result of scanning a receive buffer.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome<'f> {
    /// More bytes are needed for a decision.
    Incomplete,
    /// A complete frame with a valid CRC.
    Found(Frame<'f>, FrameLocation),
    /// A complete frame with an invalid CRC: (received, calculated).
    CrcMismatch(u16, u16),
    /// The receive window is full and holds no frame.
    BufferOverflow,
}

/// Decision for a single candidate offset.
enum Candidate {
    /// Not the start of a known frame.
    Reject,
    /// Possibly the start of a frame that is not received completely.
    Incomplete,
    /// A length complete frame of the given size.
    Complete(usize),
}

/// Compute the length of the frame that starts at `buf[0]`.
fn candidate_len(buf: &[u8]) -> Candidate {
    if buf.len() < MIN_FRAME_LEN || !ExtensionMarker::is_marker(buf[1]) {
        return Candidate::Reject;
    }
    let mut cmd = buf[2];
    let mut extended = true;
    let mut envelope_len = 0;

    if cmd == Command::PduResponse.value() {
        // The relayed PDU starts without a slave address.
        let Some(&fn_code) = buf.get(PDU_OFFSET) else {
            return Candidate::Incomplete;
        };
        cmd = fn_code;
        extended = false;
        envelope_len = PDU_ENVELOPE_LEN;
    }

    let Some(desc) = lookup(cmd, extended) else {
        return Candidate::Reject;
    };

    let variable_len = match desc.length_field_offset {
        Some(offset) => match buf.get(envelope_len + offset as usize) {
            Some(&len) => len as usize,
            None => return Candidate::Incomplete,
        },
        None => 0,
    };

    let total_len = desc.fixed_frame_length as usize + envelope_len + variable_len;
    if total_len > buf.len() {
        return Candidate::Incomplete;
    }
    Candidate::Complete(total_len)
}

/// Find the first frame in `buf`, skipping leading noise.
pub fn scan(buf: &[u8]) -> ScanOutcome<'_> {
    if buf.len() < MIN_FRAME_LEN {
        return ScanOutcome::Incomplete;
    }
    for start in 0..=buf.len() - MIN_FRAME_LEN {
        let raw_frame = &buf[start..];
        let size = match candidate_len(raw_frame) {
            Candidate::Reject => continue,
            Candidate::Incomplete => return ScanOutcome::Incomplete,
            Candidate::Complete(size) => size,
        };
        #[cfg(feature = "log")]
        if start > 0 {
            log::debug!("Dropped {start} byte(s) in front of frame: {:02X?}", &buf[..start]);
        }
        let (adu_buf, crc_buf) = raw_frame[..size].split_at(size - 2);
        let expected_crc = u16_le(crc_buf);
        let actual_crc = crc16_modbus(adu_buf);
        if expected_crc != actual_crc {
            #[cfg(feature = "log")]
            log::warn!(
                "Invalid CRC of frame {:02X?}: expected = 0x{expected_crc:0>4X}, actual = 0x{actual_crc:0>4X}",
                &raw_frame[..size]
            );
            return ScanOutcome::CrcMismatch(expected_crc, actual_crc);
        }
        return ScanOutcome::Found(
            Frame::new(&raw_frame[..size]),
            FrameLocation { start, size },
        );
    }
    ScanOutcome::Incomplete
}

/// Try to extract a frame from the receive window.
#[must_use]
pub fn try_extract(window: &ReceiveWindow) -> ScanOutcome<'_> {
    match scan(window.as_slice()) {
        ScanOutcome::Incomplete if window.is_overflowed() => {
            #[cfg(feature = "log")]
            log::error!(
                "Giving up to decode frame after receiving {} byte(s)",
                window.len()
            );
            ScanOutcome::BufferOverflow
        }
        outcome => outcome,
    }
}
