//! Face client: plays the NDN forwarder on the gateway's face port.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use crate::protocol::{build_data, cobs_decode, encode_frame, parse_interest, parse_link_frame, Interest};

/// Client for the gateway's NDN face.
pub struct FaceClient {
    port: Box<dyn SerialPort>,
    /// Bytes received after the last complete frame
    pending: Vec<u8>,
}

impl FaceClient {
    /// Open the face port.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(50))
            .open()?;

        Ok(Self {
            port,
            pending: Vec::new(),
        })
    }

    /// Drain all pending data from the serial port.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;
        self.pending.clear();

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Send raw bytes to the face.
    pub fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    /// Send an NDN packet in a link frame.
    pub fn send_packet(&mut self, packet: &[u8]) -> Result<()> {
        self.send_raw(&encode_frame(packet))
    }

    /// Answer with a Data packet.
    pub fn send_data(&mut self, name: &str, content: &[u8]) -> Result<()> {
        self.send_packet(&build_data(name, content))
    }

    /// Read one frame, or None if nothing arrives within `timeout`.
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let start = Instant::now();
        let mut buf = [0u8; 64];

        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == 0x00) {
                let frame: Vec<u8> = self.pending.drain(..=pos).collect();
                if frame.len() > 1 {
                    return Ok(Some(frame));
                }
                continue;
            }

            if start.elapsed() >= timeout {
                return Ok(None);
            }

            match self.port.read(&mut buf) {
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Wait for the next Interest from the gateway.
    pub fn read_interest(&mut self, timeout: Duration) -> Result<Option<Interest>> {
        match self.read_frame(timeout)? {
            Some(frame) => {
                let decoded = cobs_decode(&frame)?;
                let packet = parse_link_frame(&decoded)?;
                Ok(Some(parse_interest(&packet)?))
            }
            None => Ok(None),
        }
    }

    /// Collect every Interest arriving within `window`.
    pub fn collect_interests(&mut self, window: Duration) -> Result<Vec<(Instant, Interest)>> {
        let start = Instant::now();
        let mut interests = Vec::new();

        while start.elapsed() < window {
            let remaining = window.saturating_sub(start.elapsed());
            if let Some(interest) = self.read_interest(remaining)? {
                interests.push((Instant::now(), interest));
            }
        }

        Ok(interests)
    }
}
