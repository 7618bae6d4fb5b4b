//! # Active Directory password expiration
//!
//! This crate computes when the password of an Active Directory account expires.
//!
//! The expiration is derived from the account's `userAccountControl` flags, its `pwdLastSet`
//! timestamp and the maximum password age of either the fine-grained password policy (PSO)
//! applying to the account or, if there is none, the domain's account policy.
//!
//! Central for that is [`AdConnection`] which holds a bound connection to a domain controller
//! and implements [`DirectoryReader`]. The computation itself is the pure function
//! [`compute_expiration()`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use ad_pwd_expiry::{AdConnection, AdSettings, BindCredentials, LdapProtocol};
//!
//! let settings = AdSettings::new(
//!     "dc.test.internal",
//!     636,
//!     LdapProtocol::Secure,
//!     "test.internal",
//! );
//! let credentials = BindCredentials::simple("reader", "secret");
//! let mut con: AdConnection = settings
//!     .connect(&credentials)
//!     .expect("working domain controller");
//! let expiration = con.try_lookup("jdoe").expect("user exists");
//! println!("{expiration}");
//! ```
//!
//! See also [`AdConnection::try_lookup()`] and [`password_expiry_display()`]
//!
//! ## Quirks
//!
//! The maximum password age of a PSO always wins over the domain policy, even when it is
//! longer. Intervals of `0` in the domain policy mean "not set"; if no maximum password age
//! applies at all the result is [`ExpirationResult::NotAvailable`] rather than a made up date.

mod attributes;
mod error;
mod expiration;
mod helpers;
mod ldap;
mod policy;
mod records;
mod types;

pub use attributes::AttributeSet;
pub use error::*;
pub use expiration::{compute_expiration, format_expiration, ExpirationResult, NOT_AVAILABLE};
pub use helpers::{domain_to_dn, filetime_to_datetime};
pub use ldap::{lookup_password_expiration, password_expiry_display, DirectoryReader};
pub use policy::{AccountPolicy, PasswordProperties};
pub use records::{PsoRecord, UserAccountControl, UserRecord};
pub use types::*;
