use core::fmt::Write as _;

use embassy_time::Duration;
use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;

const MAX_URL_LEN: usize = 64;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Reply the module sends once a POST went through with status 200.
const POST_OK: &str = "+SHREQ: \"POST\",200,0";

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Configure the SSL/HTTPS stack: TLS 1.2 and body/header size limits.
    pub fn init_https(&mut self) -> Result<(), Error> {
        self.send_command("AT+CSSLCFG=\"sslversion\",0,3")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)?;

        self.send_command("AT+SHCONF=\"BODYLEN\",350")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)?;

        self.send_command("AT+SHCONF=\"HEADERLEN\",350")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Point the HTTPS stack at a server.
    pub fn set_https_url(&mut self, url: &str) -> Result<(), Error> {
        if url.len() > MAX_URL_LEN {
            error!("URL is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<96>::new();
        write!(cmd, "AT+SHCONF=\"URL\", \"{}\"", url).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Open the HTTPS connection (`AT+SHCONN`).
    pub fn connect_https(&mut self) -> Result<(), Error> {
        self.send_command("AT+SHCONN")?;
        self.expect_next("OK", CONNECT_TIMEOUT)
    }

    /// Drop the HTTPS connection (`AT+SHDISC`).
    pub fn disconnect_https(&mut self) -> Result<(), Error> {
        self.send_command("AT+SHDISC")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Whether the HTTPS connection is currently up (`AT+SHSTATE?`).
    pub fn https_is_connected(&mut self) -> bool {
        self.send_command("AT+SHSTATE?").is_ok()
            && self.check_next_response("+SHSTATE: 1", C::RESPONSE_TIMEOUT)
    }

    /// Announce CSV content for the subsequent request body.
    pub fn set_https_content_type(&mut self) -> Result<(), Error> {
        self.send_command("AT+SHAHEAD=\"Content-Type\",\"text/csv; charset=utf-8\"")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Stage the cached fix as the request body (`AT+SHBOD`).
    pub fn set_https_body_to_gnss_update(&mut self, id: &str) -> Result<(), Error> {
        let payload = self.gnss_payload(id)?;

        let mut cmd = String::<96>::new();
        write!(cmd, "AT+SHBOD=\"{}\",{}", payload, payload.len())
            .map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// POST the staged body to `url` and wait for the 200 report.
    pub fn send_https_post(&mut self, url: &str) -> Result<(), Error> {
        if url.len() > MAX_URL_LEN {
            error!("URL is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<96>::new();
        write!(cmd, "AT+SHREQ=\"{}\",3", url).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;

        self.expect_next("OK", C::RESPONSE_TIMEOUT)?;
        self.expect_next(POST_OK, REQUEST_TIMEOUT)
    }
}
