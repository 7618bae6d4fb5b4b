use std::{fmt, str::FromStr};

use chrono::TimeDelta;
use serde::{Serialize, Serializer};

use crate::{attributes::AttributeSet, error::ExpiryError, helpers::policy_interval};

/// Attributes of the domain object holding the account policy
pub const POLICY_ATTRIBUTES: [&str; 8] = [
    "maxPwdAge",
    "minPwdAge",
    "minPwdLength",
    "pwdProperties",
    "pwdHistoryLength",
    "lockoutDuration",
    "lockOutObservationWindow",
    "lockoutThreshold",
];

/// Flags of the `pwdProperties` attribute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PasswordProperties(u32);

impl PasswordProperties {
    /// Passwords must mix character classes
    pub const COMPLEX: Self = Self(0x1);
    /// The password cannot be changed without logging on
    pub const NO_ANON_CHANGE: Self = Self(0x2);
    /// Clients must use a protocol that hides the plaintext password from the DC
    pub const NO_CLEAR_CHANGE: Self = Self(0x4);
    /// The built-in administrator can be locked out from network logons
    pub const LOCKOUT_ADMINS: Self = Self(0x8);
    /// Passwords are stored with reversible encryption
    pub const STORE_CLEARTEXT: Self = Self(0x10);
    /// Machine account passwords are not changed automatically
    pub const REFUSE_PASSWORD_CHANGE: Self = Self(0x20);

    const NAMES: [(Self, &'static str); 6] = [
        (Self::COMPLEX, "COMPLEX"),
        (Self::NO_ANON_CHANGE, "NO_ANON_CHANGE"),
        (Self::NO_CLEAR_CHANGE, "NO_CLEAR_CHANGE"),
        (Self::LOCKOUT_ADMINS, "LOCKOUT_ADMINS"),
        (Self::STORE_CLEARTEXT, "STORE_CLEARTEXT"),
        (Self::REFUSE_PASSWORD_CHANGE, "REFUSE_PASSWORD_CHANGE"),
    ];

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl FromStr for PasswordProperties {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl fmt::Display for PasswordProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

fn as_seconds<S: Serializer>(value: &Option<TimeDelta>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(delta) => serializer.serialize_some(&delta.num_seconds()),
        None => serializer.serialize_none(),
    }
}

/// Password and lockout rules of a domain.
///
/// Every field is optional because the backing attribute can be unset. Intervals stored as
/// `0` in the directory are reported as `None`, not as a zero duration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountPolicy {
    #[serde(serialize_with = "as_seconds")]
    pub maximum_password_age: Option<TimeDelta>,
    #[serde(serialize_with = "as_seconds")]
    pub minimum_password_age: Option<TimeDelta>,
    pub minimum_password_length: Option<u32>,
    pub password_history_length: Option<u32>,
    pub password_properties: Option<PasswordProperties>,
    #[serde(serialize_with = "as_seconds")]
    pub lockout_duration: Option<TimeDelta>,
    /// Reset the lockout counter after this long
    #[serde(serialize_with = "as_seconds")]
    pub lockout_observation_window: Option<TimeDelta>,
    pub lockout_threshold: Option<u32>,
}

impl AccountPolicy {
    /// Builds the policy from the attributes of the domain object.
    ///
    /// A missing attribute leaves its field empty.
    ///
    /// # Errors
    /// Fails with [`ExpiryError::ConversionError`] if an attribute holds something that is not a number.
    pub fn from_attributes(attrs: &impl AttributeSet) -> Result<Self, ExpiryError> {
        let interval = |name: &str| -> Result<Option<TimeDelta>, ExpiryError> {
            Ok(attrs.read::<i64>(name)?.and_then(policy_interval))
        };

        Ok(Self {
            maximum_password_age: interval("maxPwdAge")?,
            minimum_password_age: interval("minPwdAge")?,
            minimum_password_length: attrs.read("minPwdLength")?,
            password_history_length: attrs.read("pwdHistoryLength")?,
            password_properties: attrs.read("pwdProperties")?,
            lockout_duration: interval("lockoutDuration")?,
            lockout_observation_window: interval("lockOutObservationWindow")?,
            lockout_threshold: attrs.read("lockoutThreshold")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{attributes::entry, helpers::TICKS_PER_DAY};
    use rstest::rstest;

    #[test]
    fn default_domain_policy() {
        let attrs = entry(&[
            ("maxPwdAge", "-36288000000000"),
            ("minPwdAge", "-864000000000"),
            ("minPwdLength", "7"),
            ("pwdProperties", "1"),
            ("pwdHistoryLength", "24"),
            ("lockoutDuration", "-18000000000"),
            ("lockOutObservationWindow", "-18000000000"),
            ("lockoutThreshold", "0"),
        ]);
        let policy = AccountPolicy::from_attributes(&attrs).expect("valid policy");
        assert_eq!(
            policy,
            AccountPolicy {
                maximum_password_age: Some(TimeDelta::days(42)),
                minimum_password_age: Some(TimeDelta::days(1)),
                minimum_password_length: Some(7),
                password_history_length: Some(24),
                password_properties: Some(PasswordProperties::COMPLEX),
                lockout_duration: Some(TimeDelta::minutes(30)),
                lockout_observation_window: Some(TimeDelta::minutes(30)),
                lockout_threshold: Some(0),
            }
        );
    }

    #[test]
    fn missing_attributes_are_not_an_error() {
        let policy = AccountPolicy::from_attributes(&entry(&[])).expect("empty policy");
        assert_eq!(policy, AccountPolicy::default());
    }

    #[rstest]
    fn unset_interval_is_absent(
        #[values("maxPwdAge", "minPwdAge", "lockoutDuration", "lockOutObservationWindow")]
        attribute: &str,
        #[values("0", "-9223372036854775808")] raw: &str,
    ) {
        let policy = AccountPolicy::from_attributes(&entry(&[(attribute, raw)])).expect("valid");
        assert_eq!(policy, AccountPolicy::default());
    }

    #[rstest]
    #[case(-90 * TICKS_PER_DAY)]
    #[case(90 * TICKS_PER_DAY)]
    fn max_age_uses_absolute_value(#[case] ticks: i64) {
        let raw = ticks.to_string();
        let policy =
            AccountPolicy::from_attributes(&entry(&[("maxPwdAge", raw.as_str())])).expect("valid");
        assert_eq!(policy.maximum_password_age, Some(TimeDelta::days(90)));
    }

    #[test]
    fn garbage_is_rejected() {
        let err = AccountPolicy::from_attributes(&entry(&[("lockoutThreshold", "-")]))
            .expect_err("not a number");
        assert!(matches!(err, ExpiryError::ConversionError(_)));
    }

    #[test]
    fn properties_display() {
        let props = PasswordProperties::from_bits(0x11);
        assert!(props.contains(PasswordProperties::COMPLEX));
        assert!(props.contains(PasswordProperties::STORE_CLEARTEXT));
        assert!(!props.contains(PasswordProperties::LOCKOUT_ADMINS));
        assert_eq!(props.to_string(), "COMPLEX | STORE_CLEARTEXT");
        assert_eq!(PasswordProperties::default().to_string(), "NONE");
    }

    #[test]
    fn serializes_intervals_as_seconds() {
        let policy = AccountPolicy {
            maximum_password_age: Some(TimeDelta::days(1)),
            password_properties: Some(PasswordProperties::COMPLEX),
            ..Default::default()
        };
        let json = serde_json::to_value(&policy).expect("serializable");
        assert_eq!(json["maximum_password_age"], 86_400);
        assert_eq!(json["password_properties"], 1);
        assert!(json["lockout_duration"].is_null());
    }
}
