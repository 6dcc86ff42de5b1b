//! Rate conversion helpers

use std::time::Duration;

/// One minute, the base of [`rate_per_minute`].
pub const MINUTE: Duration = Duration::from_secs(60);

/// Convert a count per minute into the tick interval that achieves it.
///
/// Uses integer-truncating division on nanoseconds. A count of zero has no
/// valid interval and maps to [`Duration::ZERO`], which [`Pipe::start`]
/// rejects.
///
/// [`Pipe::start`]: crate::Pipe::start
///
/// ```
/// use faucet_rs::rate_per_minute;
/// use std::time::Duration;
///
/// assert_eq!(rate_per_minute(2), Duration::from_secs(30));
/// assert_eq!(rate_per_minute(0), Duration::ZERO);
/// ```
pub fn rate_per_minute(count: u32) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    MINUTE / count
}
