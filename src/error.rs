use ldap3::LdapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExpiryError {
    /// Connecting, binding or searching the directory failed, or it did not return an object
    /// it must have
    #[error("The directory is unavailable: {reason}")]
    DirectoryUnavailable {
        reason: String,
        #[source]
        source: Option<LdapError>,
    },
    /// Something was not found
    #[error("{0} not found")]
    NotFound(String),
    /// More than one account matched the given name
    #[error("More than one account matches {0}")]
    AmbiguousUser(String),
    /// A required attribute was not returned for the entry
    #[error("Attribute {0} is missing")]
    MissingAttribute(String),
    /// Conversion Error
    #[error("{0}")]
    ConversionError(String),
    /// `pwdLastSet` is `-1`, the account never had a password assigned
    #[error("User does not have a password")]
    PasswordNeverSet,
    /// Settings could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ExpiryError {
    /// The directory answered, but not with what every domain has
    pub fn directory_unavailable(reason: impl Into<String>) -> Self {
        Self::DirectoryUnavailable {
            reason: reason.into(),
            source: None,
        }
    }
}

impl From<LdapError> for ExpiryError {
    fn from(source: LdapError) -> Self {
        Self::DirectoryUnavailable {
            reason: source.to_string(),
            source: Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap3::LdapResult;
    use std::error::Error;

    #[test]
    fn ldap_errors_keep_their_source() {
        let err = ExpiryError::from(LdapError::LdapResult {
            result: LdapResult {
                rc: 32,
                matched: String::new(),
                text: String::from("no such object"),
                refs: Vec::new(),
                ctrls: Vec::new(),
            },
        });
        assert!(matches!(err, ExpiryError::DirectoryUnavailable { source: Some(_), .. }));
        assert!(err.source().is_some());
    }

    #[test]
    fn missing_objects_have_no_source() {
        let err = ExpiryError::directory_unavailable("domain object DC=corp,DC=example,DC=com was not returned");
        assert!(err.source().is_none());
        assert_eq!(
            err.to_string(),
            "The directory is unavailable: domain object DC=corp,DC=example,DC=com was not returned"
        );
    }
}
