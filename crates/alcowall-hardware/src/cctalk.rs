//! ccTalk coin acceptor support.
//!
//! ccTalk is a serial request/response protocol. Every frame has the layout
//!
//! ```text
//! [destination, data length, source, header, data..., checksum]
//! ```
//!
//! where the checksum makes the sum of all bytes a multiple of 256. The host
//! uses address 1 and the coin acceptor address 2. Because the bus is a
//! single wire, the host reads back its own request (the echo) before the
//! acceptor's reply.
//!
//! Coins are detected by polling header 229 (read buffered credit). Its
//! reply carries an event counter followed by five `(coin code, sorter)`
//! pairs, newest first. A change in the event counter means new coins.
//!
//! The frame codec and credit tracking are always available; the serial port
//! backend requires the `hardware-serial` feature.

use crate::{HardwareError, Result};
use std::io::{Read, Write};

/// Address of the kiosk controller on the ccTalk bus.
pub const HOST_ADDRESS: u8 = 1;

/// Address of the coin acceptor on the ccTalk bus.
pub const ACCEPTOR_ADDRESS: u8 = 2;

/// Command headers used by the kiosk.
pub mod header {
    pub const SET_ACCEPT_LIMIT: u8 = 135;
    pub const MODIFY_MASTER_INHIBIT: u8 = 228;
    pub const READ_BUFFERED_CREDIT: u8 = 229;
    pub const MODIFY_INHIBIT_STATUS: u8 = 231;
    pub const SIMPLE_POLL: u8 = 254;
}

/// Number of data bytes in a buffered credit reply.
pub const BUFFERED_CREDIT_LEN: usize = 11;

/// Compute the checksum byte for the given frame bytes.
///
/// # Examples
///
/// ```
/// use alcowall_hardware::cctalk::checksum;
///
/// // Simple poll: [2, 0, 1, 254] sums to 257
/// assert_eq!(checksum(&[2, 0, 1, 254]), 255);
/// ```
pub fn checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// One ccTalk frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub destination: u8,
    pub source: u8,
    pub header: u8,
    pub data: Vec<u8>,
}

impl Frame {
    /// Build a request from the host to the coin acceptor.
    pub fn request(header: u8, data: Vec<u8>) -> Self {
        Self {
            destination: ACCEPTOR_ADDRESS,
            source: HOST_ADDRESS,
            header,
            data,
        }
    }

    /// Serialize the frame including its checksum.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u8::try_from(self.data.len())
            .map_err(|_| HardwareError::protocol("ccTalk data longer than 255 bytes"))?;

        let mut bytes = Vec::with_capacity(self.data.len() + 5);
        bytes.extend_from_slice(&[self.destination, len, self.source, self.header]);
        bytes.extend_from_slice(&self.data);
        bytes.push(checksum(&bytes));
        Ok(bytes)
    }

    /// Parse and validate a complete frame.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 5 {
            return Err(HardwareError::protocol(format!(
                "ccTalk frame too short: {} bytes",
                bytes.len()
            )));
        }

        let len = usize::from(bytes[1]);
        if bytes.len() != len + 5 {
            return Err(HardwareError::protocol(format!(
                "ccTalk frame length mismatch: declared {len} data bytes, got {}",
                bytes.len() - 5
            )));
        }

        let (body, check) = bytes.split_at(bytes.len() - 1);
        if checksum(body) != check[0] {
            return Err(HardwareError::protocol("ccTalk checksum mismatch"));
        }

        Ok(Self {
            destination: bytes[0],
            source: bytes[2],
            header: bytes[3],
            data: bytes[4..4 + len].to_vec(),
        })
    }
}

/// Read one frame from the bus.
pub fn read_frame<R: Read>(port: &mut R) -> Result<Frame> {
    let mut head = [0u8; 4];
    port.read_exact(&mut head)?;

    let mut rest = vec![0u8; usize::from(head[1]) + 1];
    port.read_exact(&mut rest)?;

    let mut bytes = head.to_vec();
    bytes.extend_from_slice(&rest);
    Frame::decode(&bytes)
}

/// Send a request and return the acceptor's reply, skipping the echo.
pub fn transact<P: Read + Write>(port: &mut P, request: &Frame) -> Result<Frame> {
    port.write_all(&request.encode()?)?;
    port.flush()?;

    let echo = read_frame(port)?;
    if echo.destination != request.destination || echo.header != request.header {
        return Err(HardwareError::protocol("ccTalk echo does not match request"));
    }

    let reply = read_frame(port)?;
    if reply.destination != HOST_ADDRESS {
        return Err(HardwareError::protocol(format!(
            "ccTalk reply addressed to {}",
            reply.destination
        )));
    }
    Ok(reply)
}

/// Turns successive buffered credit replies into accepted coin codes.
#[derive(Debug, Default, Clone)]
pub struct CreditTracker {
    last_counter: Option<u8>,
}

impl CreditTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget the last event counter, e.g. after reopening the port.
    pub fn reset(&mut self) {
        self.last_counter = None;
    }

    /// Feed the data of a buffered credit reply and return the codes of
    /// newly accepted coins, oldest first.
    ///
    /// The first reply only establishes the counter baseline.
    pub fn update(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < BUFFERED_CREDIT_LEN {
            return Err(HardwareError::protocol(format!(
                "buffered credit reply has {} bytes, expected {BUFFERED_CREDIT_LEN}",
                data.len()
            )));
        }

        let counter = data[0];
        let Some(last) = self.last_counter.replace(counter) else {
            return Ok(Vec::new());
        };
        if counter == last {
            return Ok(Vec::new());
        }

        // The counter wraps from 255 to 1; 0 is only reported after a reset.
        let events = if counter > last {
            counter - last
        } else if counter == 0 {
            return Ok(Vec::new());
        } else {
            (255 - last) + counter
        };

        let pairs = usize::from(events).min(5);
        let codes = (0..pairs)
            .rev()
            .map(|i| data[1 + 2 * i])
            .filter(|code| *code != 0)
            .collect();
        Ok(codes)
    }
}

#[cfg(feature = "hardware-serial")]
pub use serial::SerialCoinAcceptor;

#[cfg(feature = "hardware-serial")]
mod serial {
    use super::*;
    use crate::{SensorKind, traits::CoinAcceptor, types::DeviceInfo};
    use alcowall_core::constants::coin_value;
    use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
    use std::time::Duration;
    use tracing::{debug, info, warn};

    const BAUD_RATE: u32 = 9600;
    const READ_TIMEOUT: Duration = Duration::from_secs(1);
    const ACCEPT_LIMIT: u8 = 25;

    type Port = Box<dyn SerialPort>;

    /// Coin acceptor on a ccTalk serial bus.
    pub struct SerialCoinAcceptor {
        configured_port: Option<String>,
        port: Option<Port>,
        port_name: String,
        tracker: CreditTracker,
    }

    impl std::fmt::Debug for SerialCoinAcceptor {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SerialCoinAcceptor")
                .field("port_name", &self.port_name)
                .field("open", &self.port.is_some())
                .finish()
        }
    }

    impl SerialCoinAcceptor {
        /// Open the acceptor and enable all coins.
        ///
        /// When `port_name` is `None` the first `ttyACM` device is used.
        pub async fn open(port_name: Option<String>) -> Result<Self> {
            let mut acceptor = Self {
                configured_port: port_name,
                port: None,
                port_name: String::new(),
                tracker: CreditTracker::new(),
            };
            acceptor.connect().await?;
            Ok(acceptor)
        }

        async fn connect(&mut self) -> Result<()> {
            let configured = self.configured_port.clone();
            let (port, name) = tokio::task::spawn_blocking(move || -> Result<(Port, String)> {
                let name = match configured {
                    Some(name) => name,
                    None => find_acceptor_port()?,
                };
                let mut port = serialport::new(&name, BAUD_RATE)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::None)
                    .stop_bits(StopBits::One)
                    .flow_control(FlowControl::Software)
                    .timeout(READ_TIMEOUT)
                    .open()?;

                port.clear(ClearBuffer::All)?;
                transact(
                    &mut port,
                    &Frame::request(header::SET_ACCEPT_LIMIT, vec![ACCEPT_LIMIT]),
                )?;
                transact(
                    &mut port,
                    &Frame::request(header::MODIFY_INHIBIT_STATUS, vec![255, 255]),
                )?;
                transact(&mut port, &Frame::request(header::MODIFY_MASTER_INHIBIT, vec![1]))?;
                Ok((port, name))
            })
            .await
            .map_err(|e| HardwareError::Io(std::io::Error::other(e)))??;

            info!(port = %name, "ccTalk coin acceptor ready");
            self.port = Some(port);
            self.port_name = name;
            self.tracker.reset();
            Ok(())
        }
    }

    fn find_acceptor_port() -> Result<String> {
        serialport::available_ports()?
            .into_iter()
            .map(|p| p.port_name)
            .find(|name| name.contains("ttyACM"))
            .ok_or_else(|| HardwareError::disconnected("no ttyACM coin acceptor found"))
    }

    impl CoinAcceptor for SerialCoinAcceptor {
        async fn poll_coins(&mut self) -> Result<Vec<i64>> {
            let mut port = self
                .port
                .take()
                .ok_or_else(|| HardwareError::disconnected(self.port_name.clone()))?;

            let (port, reply) = tokio::task::spawn_blocking(move || {
                let request = Frame::request(header::READ_BUFFERED_CREDIT, Vec::new());
                let reply = port
                    .clear(ClearBuffer::Input)
                    .map_err(HardwareError::from)
                    .and_then(|()| transact(&mut port, &request));
                (port, reply)
            })
            .await
            .map_err(|e| HardwareError::Io(std::io::Error::other(e)))?;
            self.port = Some(port);

            let reply = reply.map_err(|e| HardwareError::sensor_read(SensorKind::Coin, e.to_string()))?;
            let codes = self.tracker.update(&reply.data)?;

            let mut coins = Vec::with_capacity(codes.len());
            for code in codes {
                match coin_value(code) {
                    Some(cents) => {
                        debug!(code, cents, "coin accepted");
                        coins.push(cents);
                    }
                    None => warn!(code, "ignoring unknown coin code"),
                }
            }
            Ok(coins)
        }

        async fn reinitialize(&mut self) -> Result<()> {
            self.port = None;
            self.connect().await
        }

        fn info(&self) -> DeviceInfo {
            DeviceInfo::new("ccTalk Coin Acceptor", "ccTalk").with_location(self.port_name.clone())
        }
    }
}
