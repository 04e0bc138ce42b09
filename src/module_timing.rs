use embassy_time::Duration;

/// Low time of the power key (or emergency reset) line to trigger a power
/// state change.
pub fn power_pulse_time() -> Duration {
    Duration::from_millis(300)
}

/// Time from releasing the power key until the module accepts commands.
pub fn boot_time() -> Duration {
    Duration::from_secs(10)
}
