use crate::error::ExpiryError;
use chrono::{DateTime, TimeDelta, Utc};

const WINDOWS_EPOCH: &str = "1601-01-01T00:00:00-00:00";

/// Number of 100ns file time ticks in a day
#[cfg(test)]
pub(crate) const TICKS_PER_DAY: i64 = 864_000_000_000;

/// Converts a tick count of 100ns intervals to a [`TimeDelta`]
fn ticks_to_delta(ticks: u64) -> TimeDelta {
    // split so that neither part can overflow an i64
    TimeDelta::microseconds((ticks / 10) as i64) + TimeDelta::nanoseconds((ticks % 10) as i64 * 100)
}

/// Converts from a Windows filetime to a Datetime
///
/// # Errors
/// Will `Err()` on negative file times and on values past the range of [`DateTime<Utc>`]
pub fn filetime_to_datetime(file_time: i64) -> Result<DateTime<Utc>, ExpiryError> {
    if file_time < 0 {
        return Err(ExpiryError::ConversionError(format!(
            "{file_time} is not a valid file time"
        )));
    }
    let epoch = DateTime::parse_from_rfc3339(WINDOWS_EPOCH)
        .map_err(|e| ExpiryError::ConversionError(e.to_string()))?
        .to_utc();

    // windows filetime counts the number of 100ns intervals since the WINDOWS_EPOCH
    epoch
        .checked_add_signed(ticks_to_delta(file_time.unsigned_abs()))
        .ok_or_else(|| ExpiryError::ConversionError(format!("file time {file_time} is out of range")))
}

/// Converts a directory interval to a duration.
///
/// Intervals are stored as negative tick counts, so the sign is dropped.
pub fn interval_to_duration(ticks: i64) -> TimeDelta {
    ticks_to_delta(ticks.unsigned_abs())
}

/// Interval value the directory stores for "never", e.g. `maxPwdAge` with no limit
pub const NEVER_INTERVAL: i64 = i64::MIN;

/// Converts a policy interval, treating `0` and [`NEVER_INTERVAL`] as "not set".
pub fn policy_interval(ticks: i64) -> Option<TimeDelta> {
    (ticks != 0 && ticks != NEVER_INTERVAL).then(|| interval_to_duration(ticks))
}

/// Builds the distinguished name of a domain from its DNS name
///
/// `corp.example.com` becomes `DC=corp,DC=example,DC=com`
pub fn domain_to_dn(domain: &str) -> Result<String, ExpiryError> {
    let labels: Vec<&str> = domain.trim().split('.').collect();
    if labels.iter().any(|label| label.trim().is_empty()) {
        return Err(ExpiryError::ConversionError(format!(
            "{domain:?} is not a valid domain name"
        )));
    }
    Ok(labels
        .iter()
        .map(|label| format!("DC={}", label.trim()))
        .collect::<Vec<_>>()
        .join(","))
}

#[cfg(test)]
mod date_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(133596792000000000, DateTime::<Utc>::from_timestamp_nanos(1715205600000000000))]
    #[case(116444736000000000, DateTime::<Utc>::from_timestamp_nanos(0))]
    #[case(103821696000000000, DateTime::<Utc>::from_timestamp_nanos(-1262304000000000000))]
    #[case(132223104000000000, DateTime::<Utc>::from_timestamp_nanos(1577836800000000000))]
    #[case(116444736000000001, DateTime::<Utc>::from_timestamp_nanos(100))]
    fn conversion(#[case] input: i64, #[case] expected: chrono::DateTime<Utc>) {
        assert_eq!(filetime_to_datetime(input).expect("valid file time"), expected)
    }

    #[rstest]
    #[case(-1)]
    #[case(i64::MIN)]
    fn negative_file_times_are_rejected(#[case] input: i64) {
        assert!(matches!(
            filetime_to_datetime(input),
            Err(ExpiryError::ConversionError(_))
        ));
    }
}


#[cfg(test)]
mod dn_tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("corp.example.com", "DC=corp,DC=example,DC=com")]
    #[case("  domain.com ", "DC=domain,DC=com")]
    #[case("local", "DC=local")]
    fn conversion(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(domain_to_dn(input).expect("valid domain"), expected)
    }

    #[rstest]
    #[case("")]
    #[case("corp..com")]
    #[case("domain.com.")]
    fn should_err_on_invalid_input(#[case] input: &str) {
        assert!(domain_to_dn(input).is_err());
    }
}
