use core::fmt::Write as _;

use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;

// Response shape: `+CNACT: <status>,<ip>`.
const ACTIVE_CHAR_INDEX: usize = 8;
const MIN_RESPONSE_LEN: usize = 11;

const MAX_APN_LEN: usize = 9;

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Activate the application network PDP context (`AT+CNACT=1`).
    pub fn activate_network(&mut self, apn: &str) -> Result<(), Error> {
        if apn.len() > MAX_APN_LEN {
            error!("APN is too long");
            return Err(Error::ArgTooLong);
        }

        let mut cmd = String::<32>::new();
        write!(cmd, "AT+CNACT=1,\"{}\"", apn).map_err(|_| Error::Overflow)?;
        self.send_command(&cmd)?;
        self.expect_next("+APP PDP: ACTIVE", C::RESPONSE_TIMEOUT)
    }

    /// Whether the application network reports an active PDP context
    /// (`AT+CNACT?`).
    pub fn network_is_active(&mut self) -> bool {
        if self.send_command("AT+CNACT?").is_err() {
            return false;
        }
        if self.read_line(C::RESPONSE_TIMEOUT).is_err() {
            return false;
        }

        let line = self.line.as_bytes();
        if line.len() < MIN_RESPONSE_LEN {
            warn!("Network status response is too short");
            return false;
        }
        line[ACTIVE_CHAR_INDEX] == b'1'
    }
}
