use core::fmt::Write as _;

use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;

/// Bearer profile state reported by `AT+SAPBR=2,1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BearerStatus {
    Connecting,
    Connected,
    Closing,
    Closed,
    /// Catch-all for malformed, truncated or unconfirmed responses.
    Error,
}

// Response shape: `+SAPBR: <cid>,<Status>,<IP_Addr>`, single-digit cid.
const STATUS_CHAR_INDEX: usize = 10;
const MIN_RESPONSE_LEN: usize = STATUS_CHAR_INDEX + 1;

const MAX_APN_LEN: usize = 9;

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Set the APN on bearer profile 1 (`AT+SAPBR=3,1`).
    pub fn set_bearer_apn(&mut self, apn: &str) -> Result<(), Error> {
        if apn.len() > MAX_APN_LEN {
            error!("APN is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<32>::new();
        write!(cmd, "AT+SAPBR=3,1,\"APN\",\"{}\"", apn).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Open bearer profile 1 (`AT+SAPBR=1,1`).
    pub fn open_bearer(&mut self) -> Result<(), Error> {
        self.send_command("AT+SAPBR=1,1")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Query bearer profile 1 (`AT+SAPBR=2,1`).
    ///
    /// Lines too short for the status field decode to
    /// [`BearerStatus::Error`] immediately. For everything else the
    /// closing `OK` is authoritative: without it the decoded status is
    /// discarded and [`BearerStatus::Error`] is returned.
    pub fn bearer_status(&mut self) -> BearerStatus {
        if self.send_command("AT+SAPBR=2,1").is_err() {
            return BearerStatus::Error;
        }
        if self.read_line(C::RESPONSE_TIMEOUT).is_err() {
            return BearerStatus::Error;
        }

        if self.line.len() < MIN_RESPONSE_LEN {
            warn!("Bearer status response is too short");
            return BearerStatus::Error;
        }
        let status = decode_status_char(self.line.as_bytes()[STATUS_CHAR_INDEX]);

        if !self.check_next_response("OK", C::RESPONSE_TIMEOUT) {
            return BearerStatus::Error;
        }
        status
    }
}

fn decode_status_char(c: u8) -> BearerStatus {
    match c {
        b'0' => BearerStatus::Connecting,
        b'1' => BearerStatus::Connected,
        b'2' => BearerStatus::Closing,
        b'3' => BearerStatus::Closed,
        _ => BearerStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::client;

    #[test]
    fn decodes_each_live_status_digit() {
        assert_eq!(decode_status_char(b'0'), BearerStatus::Connecting);
        assert_eq!(decode_status_char(b'1'), BearerStatus::Connected);
        assert_eq!(decode_status_char(b'2'), BearerStatus::Closing);
        assert_eq!(decode_status_char(b'3'), BearerStatus::Closed);
        assert_eq!(decode_status_char(b'4'), BearerStatus::Error);
        assert_eq!(decode_status_char(b'x'), BearerStatus::Error);
    }

    #[test]
    fn connected_bearer_with_confirmation() {
        let mut client = client();
        client
            .uart
            .reply_lines(&["+SAPBR: 1,1,\"10.160.23.42\"", "OK"]);

        assert_eq!(client.bearer_status(), BearerStatus::Connected);
    }

    #[test]
    fn short_line_is_an_error() {
        let mut client = client();
        client.uart.reply_lines(&["+SAPBR: 1", "OK"]);

        assert_eq!(client.bearer_status(), BearerStatus::Error);
    }

    #[test]
    fn status_char_outside_the_range_is_an_error() {
        let mut client = client();
        client
            .uart
            .reply_lines(&["+SAPBR: 1,9,\"10.160.23.42\"", "OK"]);

        assert_eq!(client.bearer_status(), BearerStatus::Error);
    }

    #[test]
    fn missing_confirmation_overrides_the_decoded_status() {
        let mut client = client();
        client.uart.reply_lines(&["+SAPBR: 1,1,\"10.160.23.42\""]);

        assert_eq!(client.bearer_status(), BearerStatus::Error);
    }

    #[test]
    fn set_bearer_apn_rejects_overlong_apn() {
        let mut client = client();

        assert_eq!(
            client.set_bearer_apn("tenchararg"),
            Err(Error::ArgTooLong)
        );
        assert_eq!(client.uart.sent(), b"");
    }

    #[test]
    fn open_bearer_sends_the_open_command() {
        let mut client = client();
        client.uart.reply_lines(&["OK"]);

        assert_eq!(client.open_bearer(), Ok(()));
        assert_eq!(client.uart.sent(), b"AT+SAPBR=1,1\r");
    }
}
