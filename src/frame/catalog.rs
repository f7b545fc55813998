// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Length rules of every frame a device may answer with.

/// Describes how to compute the length of a response frame.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandDescriptor {
    /// The command byte (extended command or standard function code).
    pub command: u8,
    /// Index of the byte holding the length of the variable part,
    /// `None` for fixed size frames.
    pub length_field_offset: Option<u8>,
    /// Frame length including the CRC, without the variable part.
    pub fixed_frame_length: u8,
}

impl CommandDescriptor {
    const fn fixed(command: u8, fixed_frame_length: u8) -> Self {
        Self {
            command,
            length_field_offset: None,
            fixed_frame_length,
        }
    }

    const fn variable(command: u8, length_field_offset: u8, fixed_frame_length: u8) -> Self {
        Self {
            command,
            length_field_offset: Some(length_field_offset),
            fixed_frame_length,
        }
    }
}

/// Responses to extended commands.
///
/// ```text
/// no events:       FD 46 12 52 5D
/// event control:   0A 46 18 03 05 05 00 XX XX
///                            |  -------- -----
///                            |  variable  CRC
///                            `- length of the variable part
/// ```
pub const EXTENDED_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::fixed(0x03, 10),
    CommandDescriptor::fixed(0x04, 5),
    CommandDescriptor::variable(0x11, 5, 8),
    CommandDescriptor::fixed(0x12, 5),
    CommandDescriptor::variable(0x18, 3, 6),
];

/// Standard responses relayed inside an extended envelope.
///
/// Offsets and lengths are those of a plain RTU frame; the caller adds the
/// envelope.
pub const PDU_COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor::variable(0x01, 2, 5),
    CommandDescriptor::variable(0x02, 2, 5),
    CommandDescriptor::variable(0x03, 2, 5),
    CommandDescriptor::variable(0x04, 2, 5),
    CommandDescriptor::fixed(0x05, 8),
    CommandDescriptor::fixed(0x06, 8),
    CommandDescriptor::fixed(0x0F, 8),
    CommandDescriptor::fixed(0x10, 8),
];

/// Find the descriptor of `command`.
#[must_use]
pub fn lookup(command: u8, extended: bool) -> Option<CommandDescriptor> {
    let table = if extended {
        EXTENDED_COMMANDS
    } else {
        PDU_COMMANDS
    };
    table.iter().find(|desc| desc.command == command).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_extended_commands() {
        assert_eq!(lookup(0x03, true).unwrap().fixed_frame_length, 10);
        assert_eq!(lookup(0x04, true).unwrap().fixed_frame_length, 5);
        assert_eq!(lookup(0x12, true).unwrap().fixed_frame_length, 5);

        let events = lookup(0x11, true).unwrap();
        assert_eq!(events.length_field_offset, Some(5));
        assert_eq!(events.fixed_frame_length, 8);

        let ctrl = lookup(0x18, true).unwrap();
        assert_eq!(ctrl.length_field_offset, Some(3));
        assert_eq!(ctrl.fixed_frame_length, 6);
    }

    #[test]
    fn lookup_pdu_commands() {
        for fn_code in 0x01..=0x04 {
            let desc = lookup(fn_code, false).unwrap();
            assert_eq!(desc.length_field_offset, Some(2));
            assert_eq!(desc.fixed_frame_length, 5);
        }
        for fn_code in [0x05, 0x06, 0x0F, 0x10] {
            let desc = lookup(fn_code, false).unwrap();
            assert_eq!(desc.length_field_offset, None);
            assert_eq!(desc.fixed_frame_length, 8);
        }
    }

    #[test]
    fn lookup_unknown_commands() {
        // requests are never answered with the same code
        assert!(lookup(0x01, true).is_none());
        assert!(lookup(0x10, true).is_none());
        assert!(lookup(0x09, true).is_none());
        // extended codes are not standard function codes
        assert!(lookup(0x11, false).is_none());
        assert!(lookup(0x83, false).is_none());
    }

    #[test]
    fn one_descriptor_per_command() {
        for table in [EXTENDED_COMMANDS, PDU_COMMANDS] {
            for (i, desc) in table.iter().enumerate() {
                assert!(table[i + 1..].iter().all(|d| d.command != desc.command));
            }
        }
    }
}
