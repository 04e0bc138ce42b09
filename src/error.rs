/// Errors returned by the driver.
///
/// None of these are fatal: every operation leaves previously cached state
/// untouched on failure, and retries (if any) are the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Serial read error
    Read,
    /// Serial write error
    Write,
    /// No data arrived within the deadline
    Timeout,
    /// A response line exceeded the receive buffer
    Overflow,
    /// A line was read, but did not match or decode to the expected
    /// response
    Mismatch,
    /// A command argument exceeded its fixed length limit
    ArgTooLong,
    /// Power control pin error
    IoPin,
    /// The module did not come up on either power control line
    PoweredDown,
    /// No confirmed GNSS fix is cached
    NoFix,
}
