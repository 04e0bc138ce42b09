use embassy_time::{block_for, Duration};
use embedded_hal::digital::OutputPin;
use embedded_io::{Read, ReadReady, Write};

use crate::config::ModemConfig;
use crate::error::Error;
use crate::framer::{LineBuffer, RX_BUF_SIZE};
use crate::gnss::GnssFix;
use crate::helpers::LossyStr;
use crate::module_timing::{boot_time, power_pulse_time};

/// Blocking client for a SIM7000 series module.
///
/// Owns the serial link, the single reusable response line buffer and the
/// GNSS fix cache; all of it is mutated inline from the calling thread,
/// there is no interrupt context or queueing involved. Every read is
/// bounded by a deadline, so no call blocks longer than its timeout
/// arguments add up to.
pub struct Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    pub(crate) uart: U,
    pub(crate) config: C,
    pub(crate) line: LineBuffer<RX_BUF_SIZE>,
    pub(crate) gnss: Option<GnssFix>,
}

enum PowerLine {
    Primary,
    Emergency,
}

impl<U, C> Sim7kClient<U, C>
where
    U: Read + Write + ReadReady,
    C: ModemConfig,
{
    pub fn new(uart: U, config: C) -> Self {
        Self {
            uart,
            config,
            line: LineBuffer::new(),
            gnss: None,
        }
    }

    /// Send one AT command, terminated with a single carriage return.
    ///
    /// Stale unread lines are flushed first, so the next read only
    /// observes output caused by `command`. No response is read here;
    /// callers compose the expectations that fit the command.
    pub fn send_command(&mut self, command: &str) -> Result<(), Error> {
        self.flush_rx()?;

        debug!("Sending command: {:?}", command);

        self.uart
            .write_all(command.as_bytes())
            .map_err(|_| Error::Write)?;
        self.uart.write_all(b"\r").map_err(|_| Error::Write)?;
        self.uart.flush().map_err(|_| Error::Write)?;
        Ok(())
    }

    /// Read the next line and compare it against `expected`.
    ///
    /// True exact match required: `OK` does not match `OKAY`, and nothing
    /// is trimmed beyond the frame terminators.
    pub fn check_next_response(&mut self, expected: &str, timeout: Duration) -> bool {
        self.expect_next(expected, timeout).is_ok()
    }

    /// Compare `expected` against the line most recently read, without any
    /// I/O. Used to re-inspect a line that was read for another purpose.
    pub fn check_last_response(&self, expected: &str) -> bool {
        self.line.is(expected)
    }

    pub(crate) fn read_line(&mut self, timeout: Duration) -> Result<(), Error> {
        self.line.read_line(&mut self.uart, timeout)
    }

    pub(crate) fn expect_next(&mut self, expected: &str, timeout: Duration) -> Result<(), Error> {
        self.read_line(timeout)?;
        if self.line.is(expected) {
            Ok(())
        } else {
            warn!(
                "Expected {:?}, got {:?}",
                expected,
                LossyStr(self.line.as_bytes())
            );
            Err(Error::Mismatch)
        }
    }

    /// Discard whatever buffered lines a previous transaction left behind.
    fn flush_rx(&mut self) -> Result<(), Error> {
        while self.uart.read_ready().map_err(|_| Error::Read)? {
            trace!("Flushing a stale line");
            self.read_line(C::RESPONSE_TIMEOUT).ok();
        }
        Ok(())
    }

    /// Check whether the module currently answers `AT`.
    pub fn is_on(&mut self) -> bool {
        self.send_command("AT").is_ok() && self.check_next_response("OK", C::RESPONSE_TIMEOUT)
    }

    /// Power the module on and apply the initial settings.
    ///
    /// Pulses the power key first; if the module stays silent, retries on
    /// the emergency reset line before giving up.
    pub fn turn_on(&mut self) -> Result<(), Error> {
        if self.is_on() {
            return Ok(());
        }

        if self.power_cycle(PowerLine::Primary)? {
            info!("Turned module on via the power key");
            return Ok(());
        }

        warn!("Power key had no effect, attempting an emergency reset");
        if self.power_cycle(PowerLine::Emergency)? {
            info!("Emergency reset successful");
            return Ok(());
        }

        error!("Emergency reset failed");
        Err(Error::PoweredDown)
    }

    /// Gracefully power the module down (`AT+CPOWD=1`).
    pub fn turn_off(&mut self) -> Result<(), Error> {
        if !self.is_on() {
            return Ok(());
        }

        self.send_command("AT+CPOWD=1")?;
        self.expect_next("NORMAL POWER DOWN", C::RESPONSE_TIMEOUT)
    }

    /// Pulse one of the power control lines, wait out the boot time and
    /// probe whether the module responds now.
    fn power_cycle(&mut self, line: PowerLine) -> Result<bool, Error> {
        match line {
            PowerLine::Primary => match self.config.power_pin() {
                Some(pin) => pulse(pin)?,
                None => {
                    warn!("No power pin configured");
                    return Ok(false);
                }
            },
            PowerLine::Emergency => match self.config.emergency_pin() {
                Some(pin) => pulse(pin)?,
                None => {
                    warn!("No emergency pin configured");
                    return Ok(false);
                }
            },
        }

        if self.is_on() {
            self.send_initial_settings()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Baud rate, echo and radio band defaults, sent fire-and-forget after
    /// every successful power on.
    fn send_initial_settings(&mut self) -> Result<(), Error> {
        self.send_command("AT+IPR=4800")?; // fix the module baud rate
        self.send_command("ATE0")?; // disable command echo
        self.send_command("AT+CNMP=38")?; // LTE only
        self.send_command("AT+CMNB=1")?; // CAT-M only
        Ok(())
    }
}

fn pulse<P: OutputPin>(pin: &mut P) -> Result<(), Error> {
    pin.set_low().map_err(|_| Error::IoPin)?;
    block_for(power_pulse_time());
    pin.set_high().map_err(|_| Error::IoPin)?;
    block_for(boot_time());
    Ok(())
}
