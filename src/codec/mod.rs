// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*};
use byteorder::{BigEndian, ByteOrder, LittleEndian};

pub mod ext;

type Result<T> = core::result::Result<T, Error>;

#[must_use]
pub fn u16_le(buf: &[u8]) -> u16 {
    LittleEndian::read_u16(buf)
}

#[must_use]
pub fn u16_be(buf: &[u8]) -> u16 {
    BigEndian::read_u16(buf)
}

pub fn put_u16_le(buf: &mut [u8], value: u16) {
    LittleEndian::write_u16(buf, value);
}

pub fn put_u16_be(buf: &mut [u8], value: u16) {
    BigEndian::write_u16(buf, value);
}

#[must_use]
pub fn u32_be(buf: &[u8]) -> u32 {
    BigEndian::read_u32(buf)
}

pub fn put_u32_be(buf: &mut [u8], value: u32) {
    BigEndian::write_u32(buf, value);
}

/// Calculate the CRC-16/MODBUS sum.
///
/// The result is sent least significant byte first.
#[must_use]
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = 0xFFFF;
    for x in data {
        crc ^= u16::from(*x);
        for _ in 0..8 {
            // if we followed clippy's suggestion to move out the crc >>= 1, the condition may not be met any more
            // the recommended action therefore makes no sense and it is better to allow this lint
            #[allow(clippy::branches_sharing_code)]
            if (crc & 0x0001) != 0 {
                crc >>= 1;
                crc ^= 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Returns `true` if the trailing CRC of `frame` matches its content.
#[must_use]
pub fn crc_matches(frame: &[u8]) -> bool {
    frame.len() >= 2 && {
        let (data, crc) = frame.split_at(frame.len() - 2);
        crc16_modbus(data) == u16_le(crc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_crc16() {
        assert_eq!(crc16_modbus(&[]), 0xFFFF);

        let msg = &[0x01, 0x03, 0x08, 0x2B, 0x00, 0x02];
        assert_eq!(crc16_modbus(msg), 0x63B6);

        let msg = &[0x01, 0x03, 0x04, 0x00, 0x20, 0x00, 0x00];
        assert_eq!(crc16_modbus(msg), 0xF9FB);

        let msg = &[0x12, 0x06, 0x22, 0x22, 0xAB, 0xCD];
        assert_eq!(crc16_modbus(msg), 0xBE9F);

        let msg = &[0xFD, 0x46, 0x12];
        assert_eq!(crc16_modbus(msg), 0x5D52);
    }

    #[test]
    fn appended_crc_is_reproduced() {
        let prefixes: &[&[u8]] = &[
            &[0xFD],
            &[0xFD, 0x46, 0x01],
            &[0xFD, 0x46, 0x03, 0x00, 0x00, 0xAB, 0xCD, 0x05],
            &[0x05, 0x46, 0x18, 0x05, 0x02, 0x00, 0x10, 0x01, 0x01],
        ];
        for prefix in prefixes {
            let mut frame = [0; 16];
            let len = prefix.len();
            frame[..len].copy_from_slice(prefix);
            let crc = crc16_modbus(prefix);
            put_u16_le(&mut frame[len..], crc);
            let frame = &frame[..len + 2];
            assert_eq!(crc16_modbus(&frame[..frame.len() - 2]), crc);
            assert!(crc_matches(frame));
        }
    }

    #[test]
    fn crc_mismatch() {
        assert!(crc_matches(&[0xFD, 0x46, 0x12, 0x52, 0x5D]));
        assert!(!crc_matches(&[0xFD, 0x46, 0x12, 0x5D, 0x52]));
        assert!(!crc_matches(&[0xFD]));
    }

    #[test]
    fn read_and_write_integers() {
        let buf = &mut [0; 4];
        put_u16_le(buf, 0x1234);
        assert_eq!(buf, &[0x34, 0x12, 0, 0]);
        assert_eq!(u16_le(buf), 0x1234);

        put_u16_be(buf, 0x1234);
        assert_eq!(&buf[..2], &[0x12, 0x34]);
        assert_eq!(u16_be(buf), 0x1234);

        put_u32_be(buf, 0x0000_ABCD);
        assert_eq!(buf, &[0x00, 0x00, 0xAB, 0xCD]);
        assert_eq!(u32_be(buf), 43981);
    }
}
