use core::fmt::Write as _;

use embedded_io::{Read, ReadReady, Write};
use heapless::String;

use crate::client::Sim7kClient;
use crate::config::ModemConfig;
use crate::error::Error;
use crate::helpers::truncated;

/// Maximum textual widths of the `+CGNSINF` fields that are kept, fixed by
/// the widest representation the module emits (`yyyyMMddhhmmss.sss` for
/// the timestamp).
pub const TIMESTAMP_LEN: usize = 18;
pub const LATITUDE_LEN: usize = 10;
pub const LONGITUDE_LEN: usize = 11;
pub const SPEED_LEN: usize = 6;
pub const COURSE_LEN: usize = 6;

pub(crate) const MAX_ID_LEN: usize = 3;

/// `id,timestamp,lat,lon,sog,cog`
pub(crate) const PAYLOAD_LEN: usize =
    MAX_ID_LEN + TIMESTAMP_LEN + LATITUDE_LEN + LONGITUDE_LEN + SPEED_LEN + COURSE_LEN + 5;

/// First comma token of a well-formed `AT+CGNSINF` answer with the GNSS
/// run state folded in.
const GNSS_RESPONSE_CLASS: &str = "+CGNSINF: 1";

/// Speed-over-ground literal the module reports while stationary.
const STATIONARY_SPEED: &str = "0.00";

/// One confirmed GNSS position solution.
///
/// Fields keep the textual form the module reported; they are forwarded
/// into CSV payloads, never computed with. The fields are only ever valid
/// together: the client replaces its whole cached fix atomically and drops
/// nothing into it on a failed read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GnssFix {
    pub timestamp: String<TIMESTAMP_LEN>,
    pub latitude: String<LATITUDE_LEN>,
    pub longitude: String<LONGITUDE_LEN>,
    pub speed_over_ground: String<SPEED_LEN>,
    pub course_over_ground: String<COURSE_LEN>,
}

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    /// Power up the GNSS receiver (`AT+CGNSPWR=1`).
    pub fn enable_gnss(&mut self) -> Result<(), Error> {
        self.send_command("AT+CGNSPWR=1")?;
        self.expect_next("OK", C::RESPONSE_TIMEOUT)
    }

    /// Poll `AT+CGNSINF` and replace the cached fix.
    ///
    /// Token layout of the reply: response class, fix status, timestamp,
    /// latitude, longitude, altitude (dropped), speed and course over
    /// ground. A reply without fix status `1` fails with [`Error::NoFix`],
    /// which is distinct from a malformed reply ([`Error::Mismatch`]).
    ///
    /// The cache is replaced only after the whole response, including the
    /// closing `OK`, has been read back; any failure on the way leaves the
    /// previous fix in place.
    pub fn cache_position_update(&mut self) -> Result<(), Error> {
        self.send_command("AT+CGNSINF")?;
        self.read_line(C::RESPONSE_TIMEOUT)?;

        let line = core::str::from_utf8(self.line.as_bytes()).map_err(|_| Error::Mismatch)?;
        let mut tokens = line.split(',');

        match tokens.next() {
            Some(GNSS_RESPONSE_CLASS) => {}
            _ => {
                warn!("Bad GNSS response");
                return Err(Error::Mismatch);
            }
        }

        match tokens.next() {
            Some("1") => {}
            _ => {
                debug!("GNSS does not have a fix yet");
                return Err(Error::NoFix);
            }
        }

        let timestamp = truncated(tokens.next().ok_or(Error::Mismatch)?);
        let latitude = truncated(tokens.next().ok_or(Error::Mismatch)?);
        let longitude = truncated(tokens.next().ok_or(Error::Mismatch)?);
        tokens.next().ok_or(Error::Mismatch)?; // altitude
        let speed_over_ground = truncated(tokens.next().ok_or(Error::Mismatch)?);
        let course_over_ground = truncated(tokens.next().ok_or(Error::Mismatch)?);

        self.expect_next("OK", C::RESPONSE_TIMEOUT).map_err(|e| {
            warn!("GNSS response missing the closing OK");
            e
        })?;

        self.gnss = Some(GnssFix {
            timestamp,
            latitude,
            longitude,
            speed_over_ground,
            course_over_ground,
        });
        Ok(())
    }

    /// Whether the cached fix shows the asset moving.
    ///
    /// `false` when the module reported the stationary speed literal, and
    /// also while no fix has been confirmed yet.
    pub fn position_is_moving(&self) -> bool {
        match &self.gnss {
            Some(fix) => fix.speed_over_ground.as_str() != STATIONARY_SPEED,
            None => false,
        }
    }

    /// The most recently confirmed fix, if any.
    pub fn gnss_fix(&self) -> Option<&GnssFix> {
        self.gnss.as_ref()
    }

    /// Build the `id,timestamp,lat,lon,sog,cog` CSV payload from the
    /// cached fix.
    pub(crate) fn gnss_payload(&self, id: &str) -> Result<String<PAYLOAD_LEN>, Error> {
        if id.len() > MAX_ID_LEN {
            error!("Device id is too long");
            return Err(Error::ArgTooLong);
        }

        let fix = self.gnss.as_ref().ok_or(Error::NoFix)?;

        let mut payload = String::new();
        write!(
            payload,
            "{},{},{},{},{},{}",
            id,
            fix.timestamp,
            fix.latitude,
            fix.longitude,
            fix.speed_over_ground,
            fix.course_over_ground
        )
        .map_err(|_| Error::Overflow)?;
        Ok(payload)
    }
}
