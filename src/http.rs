use core::fmt::Write as _;

use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;

const MAX_URL_LEN: usize = 50;

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Initialize the plain HTTP service (`AT+HTTPINIT`).
    pub fn init_http(&mut self) -> Result<(), Error> {
        self.send_command("AT+HTTPINIT")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Point the HTTP service at a server (`AT+HTTPPARA="URL"`).
    pub fn set_http_url(&mut self, url: &str) -> Result<(), Error> {
        if url.len() > MAX_URL_LEN {
            error!("URL is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<80>::new();
        write!(cmd, "AT+HTTPPARA=\"URL\",\"{}\"", url).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Upload the cached fix as POST data and trigger the action.
    ///
    /// `AT+HTTPDATA` answers `DOWNLOAD` when it is ready to take the raw
    /// body bytes; the payload is then written without a terminator, and
    /// the actual POST is kicked off with `AT+HTTPACTION=1`.
    pub fn send_http_gnss_update(&mut self, id: &str) -> Result<(), Error> {
        let payload = self.gnss_payload(id)?;

        debug!("Uploading payload: {}", payload.as_str());

        let mut cmd = String::<32>::new();
        write!(cmd, "AT+HTTPDATA={},5000", payload.len()).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;

        self.expect_next("DOWNLOAD", C::RESPONSE_TIMEOUT)?;

        self.uart
            .write_all(payload.as_bytes())
            .map_err(|_| Error::Write)?;
        self.uart.flush().map_err(|_| Error::Write)?;

        self.expect_next("OK", C::RESPONSE_TIMEOUT)?;

        self.send_command("AT+HTTPACTION=1")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }
}
