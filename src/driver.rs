// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response exchanges over a half-duplex serial line.

use std::{
    io,
    time::{Duration, Instant},
};

use crate::{
    codec::ext::{
        RX_CAPACITY, ReceiveWindow, ScanOutcome,
        client::{decode_model, decode_response, encode_request},
        try_extract,
    },
    error::Error,
    frame::*,
};

type Result<T> = core::result::Result<T, Error>;

/// Largest request frame.
const TX_CAPACITY: usize = 32;

/// Bits of a character frame on the wire, including a safety margin
/// for start, parity and stop bits.
const BITS_PER_CHARACTER: u64 = 12;

/// Baud rates a device can be configured to.
pub const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115_200, 230_400, 460_800, 921_600,
];

/// Parity of the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Settings of the physical serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub parity: Parity,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            parity: Parity::None,
        }
    }
}

impl SerialSettings {
    /// Time needed to transmit a single character.
    #[must_use]
    pub const fn character_time(&self) -> Duration {
        let baud_rate = if self.baud_rate == 0 { 1 } else { self.baud_rate as u64 };
        Duration::from_nanos(BITS_PER_CHARACTER * 1_000_000_000 / baud_rate)
    }
}

/// Driver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Extension marker of scan, model and slave ID requests.
    pub marker: ExtensionMarker,
    pub serial: SerialSettings,
    /// Idle time in front of every request, in character times.
    pub guard_chars: u32,
    /// Maximum time to wait for a response.
    pub response_timeout: Duration,
    /// Maximum number of bytes requested from the transport at once.
    pub read_chunk: usize,
    /// Number of times a failed scan step is repeated.
    pub scan_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marker: ExtensionMarker::Standard,
            serial: SerialSettings::default(),
            guard_chars: 5,
            response_timeout: Duration::from_secs(1),
            read_chunk: 16,
            scan_retries: 3,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(Error::BaudRate(self.serial.baud_rate));
        }
        if self.read_chunk == 0 || self.read_chunk > RX_CAPACITY {
            return Err(Error::BufferSize);
        }
        Ok(())
    }

    /// Idle time required in front of a request.
    #[must_use]
    pub fn frame_guard(&self) -> Duration {
        self.serial.character_time() * self.guard_chars
    }
}

/// Byte level access to the bus.
///
/// `read` should block until data arrives or the transport's own read
/// timeout elapses. An empty read is not an error and neither are
/// [`io::ErrorKind::TimedOut`], [`io::ErrorKind::WouldBlock`] and
/// [`io::ErrorKind::Interrupted`]. After an empty read the driver waits
/// one character time before reading again.
pub trait Transport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Apply the line settings.
    fn configure(&mut self, _settings: &SerialSettings) -> io::Result<()> {
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    /// The last time a byte was seen on the bus, if the transport knows.
    fn last_activity(&self) -> Option<Instant> {
        None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn configure(&mut self, settings: &SerialSettings) -> io::Result<()> {
        (**self).configure(settings)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration);
    }

    fn last_activity(&self) -> Option<Instant> {
        (**self).last_activity()
    }
}

/// One step of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    Device(Serial, SlaveId),
    End,
}

/// Events reported by a single device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBatch {
    pub header: EventsHeader,
    pub events: Vec<Event>,
}

fn unexpected(rsp: Response<'_>) -> Error {
    Error::UnexpectedCommand(Command::from(rsp).value())
}

/// Drives one request at a time over a [`Transport`].
#[derive(Debug)]
pub struct Driver<T> {
    transport: T,
    config: Config,
    tx: [u8; TX_CAPACITY],
    rx: ReceiveWindow,
    chunk: Vec<u8>,
}

impl<T: Transport> Driver<T> {
    /// Validate `config` and apply its line settings to `transport`.
    pub fn new(mut transport: T, config: Config) -> Result<Self> {
        config.validate()?;
        transport.configure(&config.serial)?;
        Ok(Self {
            transport,
            chunk: vec![0; config.read_chunk],
            config,
            tx: [0; TX_CAPACITY],
            rx: ReceiveWindow::new(),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Restart the scan on all devices.
    pub fn scan_start(&mut self) -> Result<ScanStep> {
        self.scan(Request::ScanStart)
    }

    /// Ask the next device to answer the scan.
    pub fn scan_next(&mut self) -> Result<ScanStep> {
        self.scan(Request::ScanNext)
    }

    fn scan(&mut self, req: Request) -> Result<ScanStep> {
        self.exchange(req, |rsp| match rsp {
            Response::ScanDevice(serial, slave_id) => Ok(ScanStep::Device(serial, slave_id)),
            Response::ScanEnd => Ok(ScanStep::End),
            rsp => Err(unexpected(rsp)),
        })
    }

    /// Read the model string of the device with `serial`.
    pub fn read_model(&mut self, serial: Serial) -> Result<Model> {
        self.exchange(Request::ReadModel(serial), |rsp| match rsp {
            Response::Pdu(_, pdu) => decode_model(pdu),
            rsp => Err(unexpected(rsp)),
        })
    }

    /// Assign a new slave ID to the device with `serial`.
    ///
    /// Any frame with a valid CRC is accepted as confirmation.
    pub fn change_slave_id(&mut self, serial: Serial, slave_id: SlaveId) -> Result<()> {
        validate_slave_id(slave_id)?;
        self.transact(Request::ChangeSlaveId(serial, slave_id), |_| Ok(()))
    }

    /// Query pending events and confirm previously received ones.
    ///
    /// Returns `None` if no device has pending events.
    pub fn events(&mut self, req: EventsRequest) -> Result<Option<EventBatch>> {
        self.exchange(Request::Events(req), |rsp| match rsp {
            Response::NoEvents => Ok(None),
            Response::Events(header, records) => Ok(Some(EventBatch {
                header,
                events: records.into_iter().collect(),
            })),
            rsp => Err(unexpected(rsp)),
        })
    }

    /// Configure event reporting of a register.
    ///
    /// Returns the control bytes acknowledged by the device.
    pub fn configure_event(&mut self, req: EventControlRequest) -> Result<Vec<u8>> {
        self.exchange(Request::EventControl(req), |rsp| match rsp {
            Response::EventControl(_, data) => Ok(data.to_vec()),
            rsp => Err(unexpected(rsp)),
        })
    }

    fn exchange<R>(
        &mut self,
        req: Request,
        decode: impl FnOnce(Response<'_>) -> Result<R>,
    ) -> Result<R> {
        self.transact(req, |frame| decode_response(frame).and_then(decode))
    }

    /// Send `req` and hand the first valid frame to `handle`.
    fn transact<R>(
        &mut self,
        req: Request,
        handle: impl FnOnce(Frame<'_>) -> Result<R>,
    ) -> Result<R> {
        self.send(req)?;
        let res = self.receive(handle);
        #[cfg(feature = "log")]
        if let Err(err) = &res {
            log::debug!("{:?} failed: {err}", Command::from(req));
        }
        res
    }

    fn send(&mut self, req: Request) -> Result<()> {
        let len = encode_request(self.config.marker, req, &mut self.tx)?;
        self.rx.clear();
        self.wait_frame_guard();
        #[cfg(feature = "log")]
        log::debug!("-> {:02X?}", &self.tx[..len]);
        let mut sent = 0;
        while sent < len {
            match self.transport.write(&self.tx[sent..len]) {
                Ok(0) => return Err(Error::Transport(io::ErrorKind::WriteZero)),
                Ok(cnt) => sent += cnt,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
        // The transport may return before the bytes left the wire.
        let linger = self.config.serial.character_time() * len as u32;
        self.transport.delay(linger);
        Ok(())
    }

    fn wait_frame_guard(&mut self) {
        let guard = self.config.frame_guard();
        let wait = match self.transport.last_activity() {
            Some(last) => guard.saturating_sub(last.elapsed()),
            None => guard,
        };
        if !wait.is_zero() {
            self.transport.delay(wait);
        }
    }

    fn receive<R>(&mut self, handle: impl FnOnce(Frame<'_>) -> Result<R>) -> Result<R> {
        let deadline = Instant::now() + self.config.response_timeout;
        loop {
            let cnt = match self.transport.read(&mut self.chunk) {
                Ok(cnt) => cnt,
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) =>
                {
                    0
                }
                Err(err) => return Err(err.into()),
            };
            if cnt == 0 {
                if Instant::now() >= deadline {
                    return Err(Error::Timeout);
                }
                let pause = self.config.serial.character_time();
                self.transport.delay(pause);
                continue;
            }
            self.rx.push(&self.chunk[..cnt]);
            match try_extract(&self.rx) {
                ScanOutcome::Incomplete => {}
                ScanOutcome::Found(frame, _) => {
                    #[cfg(feature = "log")]
                    log::debug!("<- {:02X?}", frame.as_bytes());
                    return handle(frame);
                }
                ScanOutcome::CrcMismatch(expected, actual) => {
                    return Err(Error::Crc(expected, actual));
                }
                ScanOutcome::BufferOverflow => return Err(Error::BufferOverflow),
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;

    use super::*;
    use crate::codec::{crc16_modbus, put_u16_le};

    /// Answers every write with the next scripted reply.
    #[derive(Debug)]
    pub(crate) struct MockTransport {
        replies: VecDeque<Vec<u8>>,
        pending: VecDeque<u8>,
        pub(crate) written: Vec<Vec<u8>>,
        pub(crate) delays: Vec<Duration>,
        pub(crate) configured: Option<SerialSettings>,
        pub(crate) chunk: usize,
        pub(crate) last_activity: Option<Instant>,
    }

    impl MockTransport {
        pub(crate) fn new() -> Self {
            Self {
                replies: VecDeque::new(),
                pending: VecDeque::new(),
                written: Vec::new(),
                delays: Vec::new(),
                configured: None,
                chunk: 3,
                last_activity: None,
            }
        }

        pub(crate) fn reply(mut self, bytes: &[u8]) -> Self {
            self.replies.push_back(bytes.to_vec());
            self
        }

        pub(crate) fn silence(self) -> Self {
            self.reply(&[])
        }
    }

    impl Transport for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let cnt = buf.len().min(self.chunk).min(self.pending.len());
            for (b, x) in buf.iter_mut().zip(self.pending.drain(..cnt)) {
                *b = x;
            }
            Ok(cnt)
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.push(buf.to_vec());
            if let Some(reply) = self.replies.pop_front() {
                self.pending.extend(reply);
            }
            Ok(buf.len())
        }

        fn configure(&mut self, settings: &SerialSettings) -> io::Result<()> {
            self.configured = Some(*settings);
            Ok(())
        }

        fn delay(&mut self, duration: Duration) {
            self.delays.push(duration);
        }

        fn last_activity(&self) -> Option<Instant> {
            self.last_activity
        }
    }

    /// Append the CRC to `bytes`.
    pub(crate) fn with_crc(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();
        frame.extend_from_slice(&[0, 0]);
        let len = frame.len();
        put_u16_le(&mut frame[len - 2..], crc16_modbus(bytes));
        frame
    }

    pub(crate) fn scan_response(serial: Serial, slave_id: SlaveId) -> Vec<u8> {
        let s = serial.to_be_bytes();
        with_crc(&[0xFD, 0x46, 0x03, s[0], s[1], s[2], s[3], slave_id])
    }

    pub(crate) fn scan_end() -> Vec<u8> {
        with_crc(&[0xFD, 0x46, 0x04])
    }

    pub(crate) fn model_response(serial: Serial, model: &str) -> Vec<u8> {
        let s = serial.to_be_bytes();
        let mut frame = vec![0xFD, 0x46, 0x09, s[0], s[1], s[2], s[3], 0x03, 40];
        let mut chars = model.bytes();
        for _ in 0..MODEL_LEN {
            frame.push(0x00);
            frame.push(chars.next().unwrap_or(0));
        }
        with_crc(&frame)
    }

    /// A driver that fails fast when no reply is scripted.
    pub(crate) fn driver(transport: MockTransport) -> Driver<MockTransport> {
        let config = Config {
            response_timeout: Duration::from_millis(5),
            ..Default::default()
        };
        Driver::new(transport, config).unwrap()
    }
}
