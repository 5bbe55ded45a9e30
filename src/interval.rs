//! Parsing of the compact interval strings used by the schedule
//! registry (`"30m"`, `"2h"`, `"7d"`).

use chrono::Duration;
use std::fmt;

/// Error for an interval string that does not match
/// `<positive integer><m|h|d>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InvalidFormat(pub String);

impl std::error::Error for InvalidFormat {}

impl fmt::Display for InvalidFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid interval `{}`, expected a positive whole number of \
             minutes, hours or days like `30m`, `2h` or `7d`",
            self.0
        )
    }
}

/// Parses an interval string into a duration. Only whole positive
/// values with a `m`/`h`/`d` unit suffix are accepted; anything else
/// (including zero, fractions and trailing characters) is rejected.
pub fn parse_interval(s: &str) -> Result<Duration, InvalidFormat> {
    let invalid = || InvalidFormat(s.to_string());
    let (last, unit) = s.char_indices().next_back().ok_or_else(invalid)?;
    let digits = &s[..last];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let value: i64 = digits.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }
    // The checked constructors also reject values past chrono's
    // duration range, which the unchecked ones would panic on.
    let duration = match unit {
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        _ => None,
    };
    duration.ok_or_else(invalid)
}
