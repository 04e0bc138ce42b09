//! Scripted serial mock shared by the unit tests.

use std::collections::VecDeque;

use embedded_io::{ErrorType, Read, ReadReady, Write};

use crate::config::{ModemConfig, NoPin};
use crate::client::Sim7kClient;
use embassy_time::Duration;

/// Serial double for a modem: everything written is recorded, and scripted
/// reply blobs become readable one at a time, released when the driver
/// finishes writing a command (on flush). This mirrors the real timing,
/// where response bytes only show up after a command went out.
pub struct MockSerial {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    replies: VecDeque<Vec<u8>>,
}

#[derive(Debug)]
pub struct IoError;

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

impl MockSerial {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            replies: VecDeque::new(),
        }
    }

    /// Make bytes immediately readable, bypassing the reply script.
    pub fn enqueue(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Script a reply of one or more framed lines for the next command.
    pub fn reply_lines(&mut self, lines: &[&str]) {
        let mut blob = Vec::new();
        for line in lines {
            blob.extend_from_slice(b"\r\n");
            blob.extend_from_slice(line.as_bytes());
            blob.extend_from_slice(b"\r\n");
        }
        self.replies.push_back(blob);
    }

    /// Script an empty reply (the modem stays silent for one command).
    pub fn reply_nothing(&mut self) {
        self.replies.push_back(Vec::new());
    }

    /// Everything the driver wrote, in order.
    pub fn sent(&self) -> &[u8] {
        &self.tx
    }

    pub fn unread(&self) -> usize {
        self.rx.len()
    }
}

impl ErrorType for MockSerial {
    type Error = IoError;
}

impl Read for MockSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        match self.rx.pop_front() {
            Some(b) if !buf.is_empty() => {
                buf[0] = b;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

impl ReadReady for MockSerial {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.rx.is_empty())
    }
}

impl Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.tx.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }
}

/// Pinless test config with deadlines short enough for spin-poll tests.
pub struct TestConfig;

impl ModemConfig for TestConfig {
    type PowerPin = NoPin;
    type EmergencyPin = NoPin;

    const RESPONSE_TIMEOUT: Duration = Duration::from_millis(50);

    fn power_pin(&mut self) -> Option<&mut NoPin> {
        None
    }

    fn emergency_pin(&mut self) -> Option<&mut NoPin> {
        None
    }
}

pub fn client() -> Sim7kClient<MockSerial, TestConfig> {
    Sim7kClient::new(MockSerial::new(), TestConfig)
}
