use core::fmt::Write as _;

use embassy_time::Duration;
use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;

/// Multi-IP application state reported by `AT+CIPSTATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    IpInitial,
    IpStart,
    IpConfig,
    IpGprsAct,
    IpStatus,
    UdpConnecting,
    ConnectOk,
    UdpClosing,
    UdpClosed,
    PdpDeact,
    /// Doubles as "module unreachable or answered something unknown";
    /// there is no separate unknown state.
    ModemOff,
}

/// `STATE: …` literals in the order the module documents them. None is a
/// prefix of another, so the order does not affect matching.
const STATE_LITERALS: [(&str, ConnectionState); 10] = [
    ("STATE: IP INITIAL", ConnectionState::IpInitial),
    ("STATE: IP START", ConnectionState::IpStart),
    ("STATE: IP CONFIG", ConnectionState::IpConfig),
    ("STATE: IP GPRSACT", ConnectionState::IpGprsAct),
    ("STATE: IP STATUS", ConnectionState::IpStatus),
    ("STATE: UDP CONNECTING", ConnectionState::UdpConnecting),
    ("STATE: CONNECT OK", ConnectionState::ConnectOk),
    ("STATE: UDP CLOSING", ConnectionState::UdpClosing),
    ("STATE: UDP CLOSED", ConnectionState::UdpClosed),
    ("STATE: PDP DEACT", ConnectionState::PdpDeact),
];

const MAX_APN_LEN: usize = 49;
const MAX_PROTOCOL_LEN: usize = 3;
const MAX_ADDRESS_LEN: usize = 24;
const MAX_PORT_LEN: usize = 5;

/// `AT+CIICR` brings up the wireless connection and may take this long
/// under bad coverage.
const BRING_UP_TIMEOUT: Duration = Duration::from_secs(85);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(75);
const SEND_TIMEOUT: Duration = Duration::from_secs(30);
/// How long to listen for an `ERROR` reply to `AT+CIPSEND` before treating
/// the silence as the send prompt.
const SEND_ABORT_TIMEOUT: Duration = Duration::from_millis(500);

/// End-of-payload marker for `AT+CIPSEND`.
const PAYLOAD_TERM: u8 = 0x1A;

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Start the TCP/IP task with the given APN (`AT+CSTT`).
    pub fn start_task_with_apn(&mut self, apn: &str) -> Result<(), Error> {
        if apn.len() > MAX_APN_LEN {
            error!("APN is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<64>::new();
        write!(cmd, "AT+CSTT=\"{}\"", apn).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Bring up the wireless connection (`AT+CIICR`). Slow.
    pub fn bring_up_network(&mut self) -> Result<(), Error> {
        self.send_command("AT+CIICR")?;
        self.expect_next("OK", BRING_UP_TIMEOUT)
    }

    /// Deactivate all connections and the PDP context (`AT+CIPSHUT`).
    pub fn shut_connections(&mut self) -> Result<(), Error> {
        self.send_command("AT+CIPSHUT")?;
        self.expect_next("SHUT OK", C::RESPONSE_TIMEOUT)
    }

    /// Request the local IP address (`AT+CIFSR`).
    ///
    /// The module answers with the bare address, or `ERROR` while the
    /// network is not up yet.
    pub fn query_local_ip(&mut self) -> Result<(), Error> {
        self.send_command("AT+CIFSR")?;
        self.read_line(C::RESPONSE_TIMEOUT)?;
        if self.check_last_response("ERROR") {
            return Err(Error::Mismatch);
        }
        Ok(())
    }

    /// Open a TCP or UDP connection (`AT+CIPSTART`).
    ///
    /// The module first acknowledges the command with `OK` and reports the
    /// outcome of the actual connect attempt separately, much later.
    pub fn start_connection(
        &mut self,
        protocol: &str,
        address: &str,
        port: &str,
    ) -> Result<(), Error> {
        if protocol.len() > MAX_PROTOCOL_LEN {
            error!("Protocol argument is too long");
            return Err(Error::ArgTooLong);
        }
        if address.len() > MAX_ADDRESS_LEN {
            error!("Address argument is too long");
            return Err(Error::ArgTooLong);
        }
        if port.len() > MAX_PORT_LEN {
            error!("Port argument is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<64>::new();
        write!(cmd, "AT+CIPSTART=\"{}\",\"{}\",{}", protocol, address, port)
            .map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;

        self.expect_next("OK", C::RESPONSE_TIMEOUT)?;
        self.expect_next("CONNECT OK", CONNECT_TIMEOUT)
    }

    /// Send the cached fix over the open connection (`AT+CIPSEND`).
    ///
    /// The send prompt carries no line terminator, so it cannot be read as
    /// a line; instead an `ERROR` reply is listened for briefly, and
    /// silence is taken as the prompt.
    pub fn send_gnss_update(&mut self, id: &str) -> Result<(), Error> {
        let payload = self.gnss_payload(id)?;

        self.send_command("AT+CIPSEND")?;

        if self.check_next_response("ERROR", SEND_ABORT_TIMEOUT) {
            warn!("AT+CIPSEND rejected, connection is probably closed");
            return Err(Error::Mismatch);
        }

        debug!("Sending payload: {}", payload.as_str());

        self.uart
            .write_all(payload.as_bytes())
            .map_err(|_| Error::Write)?;
        self.uart.write_all(&[PAYLOAD_TERM]).map_err(|_| Error::Write)?;
        self.uart.flush().map_err(|_| Error::Write)?;

        self.expect_next("SEND OK", SEND_TIMEOUT)
    }

    /// Query the connection state (`AT+CIPSTATUS`).
    ///
    /// Anything unexpected, including a module that does not answer at
    /// all, maps to [`ConnectionState::ModemOff`].
    pub fn query_connection_state(&mut self) -> ConnectionState {
        if self.send_command("AT+CIPSTATUS").is_err() {
            return ConnectionState::ModemOff;
        }
        if !self.check_next_response("OK", C::RESPONSE_TIMEOUT) {
            return ConnectionState::ModemOff;
        }
        if self.read_line(C::RESPONSE_TIMEOUT).is_err() {
            return ConnectionState::ModemOff;
        }

        STATE_LITERALS
            .iter()
            .find(|(literal, _)| self.check_last_response(literal))
            .map(|&(_, state)| state)
            .unwrap_or(ConnectionState::ModemOff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::client;

    #[test]
    fn connection_state_matches_the_status_line() {
        let mut client = client();
        client.uart.reply_lines(&["OK", "STATE: CONNECT OK"]);

        assert_eq!(
            client.query_connection_state(),
            ConnectionState::ConnectOk
        );
    }

    #[test]
    fn every_documented_state_literal_decodes() {
        for (literal, state) in STATE_LITERALS {
            let mut client = client();
            client.uart.reply_lines(&["OK", literal]);
            assert_eq!(client.query_connection_state(), state);
        }
    }

    #[test]
    fn missing_ok_means_modem_off() {
        let mut client = client();
        client.uart.reply_lines(&["STATE: IP INITIAL"]);

        assert_eq!(client.query_connection_state(), ConnectionState::ModemOff);
    }

    #[test]
    fn unknown_status_line_means_modem_off() {
        let mut client = client();
        client.uart.reply_lines(&["OK", "STATE: TCP CLOSING"]);

        assert_eq!(client.query_connection_state(), ConnectionState::ModemOff);
    }

    #[test]
    fn start_task_quotes_the_apn() {
        let mut client = client();
        client.uart.reply_lines(&["OK"]);

        assert_eq!(client.start_task_with_apn("internet"), Ok(()));
        assert_eq!(client.uart.sent(), b"AT+CSTT=\"internet\"\r");
    }

    #[test]
    fn overlong_apn_is_rejected_before_any_io() {
        let mut client = client();
        let apn = "a".repeat(MAX_APN_LEN + 1);

        assert_eq!(client.start_task_with_apn(&apn), Err(Error::ArgTooLong));
        assert_eq!(client.uart.sent(), b"");
    }

    #[test]
    fn shut_connections_expects_shut_ok() {
        let mut client = client();
        client.uart.reply_lines(&["SHUT OK"]);

        assert_eq!(client.shut_connections(), Ok(()));
    }

    #[test]
    fn query_local_ip_accepts_an_address_line() {
        let mut client = client();
        client.uart.reply_lines(&["10.160.23.42"]);

        assert_eq!(client.query_local_ip(), Ok(()));
    }

    #[test]
    fn query_local_ip_fails_on_error_line() {
        let mut client = client();
        client.uart.reply_lines(&["ERROR"]);

        assert_eq!(client.query_local_ip(), Err(Error::Mismatch));
    }

    #[test]
    fn start_connection_composes_both_expectations() {
        let mut client = client();
        client.uart.reply_lines(&["OK", "CONNECT OK"]);

        assert_eq!(client.start_connection("UDP", "93.184.216.34", "8000"), Ok(()));
        assert_eq!(
            client.uart.sent(),
            b"AT+CIPSTART=\"UDP\",\"93.184.216.34\",8000\r"
        );
    }

    #[test]
    fn start_connection_checks_argument_limits() {
        let mut client = client();

        assert_eq!(
            client.start_connection("UDPX", "host", "8000"),
            Err(Error::ArgTooLong)
        );
        assert_eq!(
            client.start_connection("UDP", "far-too-long-address-name.example.com", "8000"),
            Err(Error::ArgTooLong)
        );
        assert_eq!(
            client.start_connection("UDP", "host", "800000"),
            Err(Error::ArgTooLong)
        );
        assert_eq!(client.uart.sent(), b"");
    }

    #[test]
    fn send_gnss_update_aborts_on_error_reply() {
        let mut client = client();
        client.uart.reply_lines(&[
            "+CGNSINF: 1,1,20230101120000.000,40.7128,-74.0060,10.0,0.00,180.0",
            "OK",
        ]);
        assert_eq!(client.cache_position_update(), Ok(()));

        client.uart.reply_lines(&["ERROR"]);
        assert_eq!(client.send_gnss_update("7"), Err(Error::Mismatch));
    }

    #[test]
    fn send_gnss_update_writes_payload_and_terminator() {
        let mut client = client();
        client.uart.reply_lines(&[
            "+CGNSINF: 1,1,20230101120000.000,40.7128,-74.0060,10.0,0.00,180.0",
            "OK",
        ]);
        assert_eq!(client.cache_position_update(), Ok(()));

        client.uart.reply_nothing(); // no ERROR: the prompt is silence
        client.uart.reply_lines(&["SEND OK"]);
        assert_eq!(client.send_gnss_update("7"), Ok(()));

        let sent = client.uart.sent();
        let tail = b"AT+CIPSEND\r7,20230101120000.000,40.7128,-74.0060,0.00,180.0\x1a";
        assert!(sent.ends_with(tail));
    }

    #[test]
    fn send_gnss_update_requires_a_cached_fix() {
        let mut client = client();
        assert_eq!(client.send_gnss_update("7"), Err(Error::NoFix));
        assert_eq!(client.uart.sent(), b"");
    }
}
