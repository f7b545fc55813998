// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extended Modbus RTU client (master) specific functions.
use super::*;

/// Function code used to read the model string.
const READ_HOLDING_REGISTERS: u8 = 0x03;

/// Function code used to write the slave ID.
const WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Number of registers that hold the model string.
const MODEL_REGISTER_CNT: u16 = MODEL_LEN as u16;

/// Encode a request.
///
/// `marker` is the configured extension marker, see [`Request::marker`].
pub fn encode_request(marker: ExtensionMarker, req: Request, buf: &mut [u8]) -> Result<usize> {
    let len = req.frame_len();
    if buf.len() < len {
        return Err(Error::BufferSize);
    }
    buf[1] = req.marker(marker).value();
    buf[2] = Command::from(req).value();
    match req {
        Request::ScanStart | Request::ScanNext => {
            buf[0] = BROADCAST_ADDRESS;
        }
        Request::ReadModel(serial) => {
            buf[0] = BROADCAST_ADDRESS;
            put_u32_be(&mut buf[3..], serial);
            buf[7] = READ_HOLDING_REGISTERS;
            put_u16_be(&mut buf[8..], MODEL_REGISTER);
            put_u16_be(&mut buf[10..], MODEL_REGISTER_CNT);
        }
        Request::ChangeSlaveId(serial, slave_id) => {
            validate_slave_id(slave_id)?;
            buf[0] = BROADCAST_ADDRESS;
            put_u32_be(&mut buf[3..], serial);
            buf[7] = WRITE_SINGLE_REGISTER;
            put_u16_be(&mut buf[8..], SLAVE_ID_REGISTER);
            put_u16_be(&mut buf[10..], u16::from(slave_id));
        }
        Request::Events(EventsRequest {
            min_slave_id,
            max_data_len,
            confirm_slave_id,
            confirm_flag,
        }) => {
            buf[0] = BROADCAST_ADDRESS;
            buf[3] = min_slave_id;
            buf[4] = max_data_len;
            buf[5] = confirm_slave_id;
            buf[6] = confirm_flag;
        }
        Request::EventControl(EventControlRequest {
            slave_id,
            event_type,
            register,
            control,
        }) => {
            buf[0] = validate_slave_id(slave_id)?;
            // length of a single register setting
            buf[3] = 5;
            buf[4] = event_type as u8;
            put_u16_be(&mut buf[5..], register);
            buf[7] = 1;
            buf[8] = control as u8;
        }
    }
    let crc = crc16_modbus(&buf[..len - 2]);
    put_u16_le(&mut buf[len - 2..], crc);
    Ok(len)
}

/// Decode a response frame.
pub fn decode_response(frame: Frame<'_>) -> Result<Response<'_>> {
    let payload = frame.payload();
    let rsp = match frame.command() {
        Command::ScanResponse => {
            if payload.len() < 5 {
                return Err(Error::BufferSize);
            }
            Response::ScanDevice(u32_be(&payload[..4]), payload[4])
        }
        Command::ScanEnd => Response::ScanEnd,
        Command::PduResponse => {
            if frame.address() != BROADCAST_ADDRESS {
                return Err(Error::UnexpectedAddress(frame.address()));
            }
            if payload.len() < 5 {
                return Err(Error::BufferSize);
            }
            Response::Pdu(u32_be(&payload[..4]), &payload[4..])
        }
        Command::EventsResponse => {
            if payload.len() < 3 {
                return Err(Error::BufferSize);
            }
            let data_len = payload[2];
            let Some(data) = payload.get(3..3 + data_len as usize) else {
                return Err(Error::ByteCount(data_len));
            };
            let hdr = EventsHeader {
                slave_id: frame.address(),
                flag: payload[0],
                count: payload[1],
            };
            Response::Events(hdr, EventRecords::new(hdr.slave_id, data))
        }
        Command::EventsEnd => Response::NoEvents,
        Command::EventsControl => {
            let Some((&len, data)) = payload.split_first() else {
                return Err(Error::BufferSize);
            };
            if data.len() != len as usize {
                return Err(Error::ByteCount(len));
            }
            Response::EventControl(frame.address(), data)
        }
        cmd => return Err(Error::UnexpectedCommand(cmd.value())),
    };
    Ok(rsp)
}

/// Decode the model string out of a relayed PDU.
pub fn decode_model(pdu: &[u8]) -> Result<Model> {
    let Some((&fn_code, data)) = pdu.split_first() else {
        return Err(Error::BufferSize);
    };
    if fn_code != READ_HOLDING_REGISTERS {
        return Err(Error::UnexpectedCommand(fn_code));
    }
    let Some((&byte_count, registers)) = data.split_first() else {
        return Err(Error::BufferSize);
    };
    if registers.len() < byte_count as usize {
        return Err(Error::ByteCount(byte_count));
    }
    Ok(Model::from_registers(&registers[..byte_count as usize]))
}
