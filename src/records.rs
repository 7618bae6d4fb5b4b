use std::str::FromStr;

use crate::{attributes::AttributeSet, error::ExpiryError};

/// `pwdLastSet` value of an account that never had a password
pub const PWD_NEVER_SET: i64 = -1;

/// `pwdLastSet` value that forces a password change at the next logon
pub const PWD_MUST_CHANGE: i64 = 0;

pub const USER_ATTRIBUTES: [&str; 2] = ["userAccountControl", "pwdLastSet"];

/// Constructed attribute naming the PSO that applies to a user
pub const RESULTANT_PSO: &str = "msDS-ResultantPSO";

pub const PSO_MAX_PASSWORD_AGE: &str = "msDS-MaximumPasswordAge";

/// Flags of the `userAccountControl` attribute
///
/// Ref: <https://learn.microsoft.com/en-us/troubleshoot/windows-server/active-directory/useraccountcontrol-manipulate-account-properties>
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserAccountControl(u32);

impl UserAccountControl {
    pub const ACCOUNTDISABLE: Self = Self(0x2);
    pub const LOCKOUT: Self = Self(0x10);
    pub const PASSWD_NOTREQD: Self = Self(0x20);
    pub const NORMAL_ACCOUNT: Self = Self(0x200);
    pub const DONT_EXPIRE_PASSWORD: Self = Self(0x1_0000);
    pub const PASSWORD_EXPIRED: Self = Self(0x80_0000);

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

impl FromStr for UserAccountControl {
    type Err = std::num::ParseIntError;

    /// The directory hands the flags out as a signed 32 bit integer
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u32>() {
            Ok(bits) => Ok(Self(bits)),
            Err(_) => s.parse::<i32>().map(|bits| Self(bits as u32)),
        }
    }
}

/// Snapshot of the attributes of a user needed to compute the expiration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub distinguished_name: String,
    pub user_account_control: UserAccountControl,
    /// Raw file time, [`PWD_MUST_CHANGE`], or [`PWD_NEVER_SET`]
    pub pwd_last_set: i64,
}

impl UserRecord {
    /// # Errors
    /// Fails if `userAccountControl` is missing or an attribute is not a number.
    /// A missing `pwdLastSet` is read as [`PWD_NEVER_SET`].
    pub fn from_attributes(
        distinguished_name: impl Into<String>,
        attrs: &impl AttributeSet,
    ) -> Result<Self, ExpiryError> {
        let user_account_control: UserAccountControl = attrs
            .read("userAccountControl")?
            .ok_or_else(|| ExpiryError::MissingAttribute("userAccountControl".to_owned()))?;
        Ok(Self {
            distinguished_name: distinguished_name.into(),
            user_account_control,
            pwd_last_set: attrs.read("pwdLastSet")?.unwrap_or(PWD_NEVER_SET),
        })
    }
}

/// Fine-grained password policy (Password Settings Object) applying to a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsoRecord {
    pub distinguished_name: String,
    /// Raw signed tick count of `msDS-MaximumPasswordAge`
    pub maximum_password_age: Option<i64>,
}

impl PsoRecord {
    /// # Errors
    /// Fails if `msDS-MaximumPasswordAge` is not a number.
    pub fn from_attributes(
        distinguished_name: impl Into<String>,
        attrs: &impl AttributeSet,
    ) -> Result<Self, ExpiryError> {
        Ok(Self {
            distinguished_name: distinguished_name.into(),
            maximum_password_age: attrs.read(PSO_MAX_PASSWORD_AGE)?,
        })
    }
}
