use std::fmt;

use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    error::ExpiryError,
    helpers::{filetime_to_datetime, interval_to_duration, NEVER_INTERVAL},
    policy::AccountPolicy,
    records::{PsoRecord, UserAccountControl, UserRecord, PWD_MUST_CHANGE, PWD_NEVER_SET},
};

/// Format used to show expiration dates, e.g. `March 31, 2020 12:00 AM`
pub const DATE_FORMAT: &str = "%B %-d, %Y %I:%M %p";

/// Shown when no maximum password age applies
pub const NOT_AVAILABLE: &str = "Not Available";

/// When the password of an account expires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "expires_at", rename_all = "snake_case")]
pub enum ExpirationResult {
    /// `userAccountControl` has the "password never expires" flag set
    NeverExpires,
    /// `pwdLastSet` is `0`
    MustChangeAtNextLogon,
    Expires(DateTime<Utc>),
    /// Neither a PSO nor the domain policy define a maximum password age
    NotAvailable,
}

impl ExpirationResult {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Expires(at) => Some(*at),
            _ => None,
        }
    }

    /// Whether the password has to be changed before logging on at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self {
            Self::MustChangeAtNextLogon => true,
            Self::Expires(at) => *at <= now,
            Self::NeverExpires | Self::NotAvailable => false,
        }
    }

    /// Time left until the password expires, zero once it has.
    ///
    /// Only [`ExpirationResult::Expires`] has a meaningful answer, everything else is `None`.
    pub fn time_left(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.expires_at().map(|at| (at - now).max(TimeDelta::zero()))
    }
}

impl fmt::Display for ExpirationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_expiration(self, &Local))
    }
}

/// Renders a result for display, dates are shown in `tz`
pub fn format_expiration<Tz>(result: &ExpirationResult, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    match result {
        ExpirationResult::NeverExpires => String::from("Never"),
        ExpirationResult::MustChangeAtNextLogon => String::from("Must change at next logon"),
        ExpirationResult::Expires(at) => at.with_timezone(tz).format(DATE_FORMAT).to_string(),
        ExpirationResult::NotAvailable => String::from(NOT_AVAILABLE),
    }
}

/// Computes when the password of `user` expires.
///
/// The rules are applied in order and the first one that matches decides:
/// 1. "password never expires" set in `userAccountControl` → [`ExpirationResult::NeverExpires`]
/// 2. `pwdLastSet` of `0` → [`ExpirationResult::MustChangeAtNextLogon`]
/// 3. a maximum password age from the PSO, or failing that from the domain policy, is added to
///    `pwdLastSet` → [`ExpirationResult::Expires`]
/// 4. otherwise → [`ExpirationResult::NotAvailable`]
///
/// A PSO whose maximum password age is the "never" value still wins over the domain policy and
/// gives [`ExpirationResult::NotAvailable`].
///
/// # Errors
/// [`ExpiryError::PasswordNeverSet`] if `pwdLastSet` is `-1`, [`ExpiryError::ConversionError`]
/// if `pwdLastSet` is no valid file time.
pub fn compute_expiration(
    user: &UserRecord,
    pso: Option<&PsoRecord>,
    domain_policy: &AccountPolicy,
) -> Result<ExpirationResult, ExpiryError> {
    if user
        .user_account_control
        .contains(UserAccountControl::DONT_EXPIRE_PASSWORD)
    {
        debug!(user = %user.distinguished_name, "password is set to never expire");
        return Ok(ExpirationResult::NeverExpires);
    }

    let last_set_at = match user.pwd_last_set {
        PWD_MUST_CHANGE => return Ok(ExpirationResult::MustChangeAtNextLogon),
        PWD_NEVER_SET => return Err(ExpiryError::PasswordNeverSet),
        ticks => filetime_to_datetime(ticks)?,
    };

    let pso_max_age = pso.and_then(|pso| pso.maximum_password_age);
    if pso_max_age == Some(NEVER_INTERVAL) {
        debug!(user = %user.distinguished_name, "PSO sets no maximum password age");
        return Ok(ExpirationResult::NotAvailable);
    }
    let pso_max_age = pso_max_age.map(interval_to_duration);
    let Some(max_age) = pso_max_age.or(domain_policy.maximum_password_age) else {
        debug!(user = %user.distinguished_name, "no maximum password age applies");
        return Ok(ExpirationResult::NotAvailable);
    };
    debug!(
        user = %user.distinguished_name,
        from_pso = pso_max_age.is_some(),
        days = max_age.num_days(),
        "effective maximum password age"
    );

    last_set_at
        .checked_add_signed(max_age)
        .map(ExpirationResult::Expires)
        .ok_or_else(|| {
            ExpiryError::ConversionError(format!(
                "{last_set_at} plus {max_age} is out of range"
            ))
        })
}
