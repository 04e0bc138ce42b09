use embassy_time::{Duration, Instant};
use embedded_io::{Read, ReadReady};
use heapless::Vec;

use crate::error::Error;
use crate::helpers::LossyStr;

/// Receive buffer size for a single response line.
pub const RX_BUF_SIZE: usize = 256;

const LINE_TERM_CHAR: u8 = b'\r';
const FORMAT_CHAR: u8 = b'\n';

/// Assembles one logical response line at a time out of the raw byte
/// stream.
///
/// Responses are framed as `<CR><LF>content<CR><LF>`. A successful
/// [`read_line`](LineBuffer::read_line) leaves exactly `content` in the
/// buffer; any failure leaves it empty, so a stale line can never be
/// mistaken for a fresh response. The buffer is reused for every
/// transaction over the lifetime of the client that owns it.
pub struct LineBuffer<const N: usize> {
    buf: Vec<u8, N>,
}

impl<const N: usize> LineBuffer<N> {
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Exact content comparison, no normalization.
    pub fn is(&self, expected: &str) -> bool {
        self.buf.as_slice() == expected.as_bytes()
    }

    /// Read the next response line.
    ///
    /// Everything up to and including the first line feed is discarded, so
    /// a leading bare `<LF>` without its `<CR>` is tolerated. Content then
    /// accumulates until the next line feed; stray `<CR>` and NUL bytes are
    /// skipped without being stored.
    ///
    /// Each byte is waited for with a fresh deadline of `timeout`; once it
    /// elapses the read fails with [`Error::Timeout`]. Content reaching the
    /// buffer capacity fails with [`Error::Overflow`] and drains the rest
    /// of the oversized line so the next call does not start mid-line.
    pub fn read_line<U>(&mut self, uart: &mut U, timeout: Duration) -> Result<(), Error>
    where
        U: Read + ReadReady,
    {
        self.buf.clear();
        let mut seen_format_char = false;

        loop {
            let byte = match poll_byte_until(uart, Instant::now() + timeout) {
                Ok(b) => b,
                Err(Error::Timeout) => {
                    warn!("Timed out waiting for a response line");
                    self.buf.clear();
                    return Err(Error::Timeout);
                }
                Err(e) => {
                    self.buf.clear();
                    return Err(e);
                }
            };

            match byte {
                FORMAT_CHAR if seen_format_char => {
                    debug!("Received response: {:?}", LossyStr(&self.buf));
                    return Ok(());
                }
                FORMAT_CHAR => seen_format_char = true,
                LINE_TERM_CHAR | b'\0' => {}
                b if seen_format_char => {
                    // content must stay strictly shorter than the buffer
                    if self.buf.len() >= N - 1 {
                        error!("Response line exceeds the receive buffer");
                        self.buf.clear();
                        drain_line(uart, timeout);
                        return Err(Error::Overflow);
                    }
                    self.buf.push(b).ok();
                }
                _ => {}
            }
        }
    }
}

/// Best-effort drain of the rest of an oversized line, bounded by one more
/// `timeout`. Failure here is only logged; the read already failed.
fn drain_line<U>(uart: &mut U, timeout: Duration)
where
    U: Read + ReadReady,
{
    let deadline = Instant::now() + timeout;
    loop {
        match poll_byte_until(uart, deadline) {
            Ok(FORMAT_CHAR) => return,
            Ok(_) => {}
            Err(_) => {
                warn!("Failed to drain the rest of an oversized line");
                return;
            }
        }
    }
}

/// Spin-poll `uart` until a byte is available or `deadline` passes.
///
/// Availability is checked before the deadline, so bytes that are already
/// buffered are still consumed after the deadline has passed.
fn poll_byte_until<U>(uart: &mut U, deadline: Instant) -> Result<u8, Error>
where
    U: Read + ReadReady,
{
    loop {
        if uart.read_ready().map_err(|_| Error::Read)? {
            let mut byte = [0u8; 1];
            return match uart.read(&mut byte) {
                Ok(0) | Err(_) => Err(Error::Read),
                Ok(_) => Ok(byte[0]),
            };
        }

        if Instant::now() >= deadline {
            return Err(Error::Timeout);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MockSerial;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[test]
    fn extracts_content_between_terminator_pairs() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nCONNECT OK\r\n");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("CONNECT OK"));
    }

    #[test]
    fn strips_embedded_carriage_returns_and_nuls() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nO\rK\0\r\n");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("OK"));
    }

    #[test]
    fn tolerates_leading_bare_line_feed() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\nOK\r\n");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("OK"));
    }

    #[test]
    fn discards_noise_before_the_opening_line_feed() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"AT+CIPSHUT\r\r\nSHUT OK\r\n");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("SHUT OK"));
    }

    #[test]
    fn times_out_without_a_line_feed() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nNEVER TERMINATED");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Err(Error::Timeout));
        assert!(line.is(""));
        assert!(line.is_empty());
    }

    #[test]
    fn times_out_on_a_silent_channel() {
        let mut uart = MockSerial::new();

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Err(Error::Timeout));
        assert!(line.is(""));
    }

    #[test]
    fn oversized_line_fails_and_clears_the_buffer() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nWAY TOO LONG FOR THE BUFFER\r\n");

        let mut line = LineBuffer::<8>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Err(Error::Overflow));
        assert_eq!(line.len(), 0);
    }

    #[test]
    fn next_read_never_sees_fragments_of_a_rejected_line() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nWAY TOO LONG FOR THE BUFFER\r\n\r\nOK\r\n");

        let mut line = LineBuffer::<8>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Err(Error::Overflow));
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("OK"));
    }

    #[test]
    fn content_just_below_capacity_still_passes() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\n1234567\r\n");

        let mut line = LineBuffer::<8>::new();
        assert_eq!(line.read_line(&mut uart, TIMEOUT), Ok(()));
        assert!(line.is("1234567"));
    }

    #[test]
    fn buffered_bytes_are_consumed_even_with_a_zero_deadline() {
        let mut uart = MockSerial::new();
        uart.enqueue(b"\r\nOK\r\n");

        let mut line = LineBuffer::<32>::new();
        assert_eq!(line.read_line(&mut uart, Duration::from_ticks(0)), Ok(()));
        assert!(line.is("OK"));
    }
}
