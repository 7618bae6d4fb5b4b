use std::{fmt, fs, path::Path, str::FromStr};

use ldap3::LdapConn;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    expiration::ExpirationResult, helpers::domain_to_dn, ldap::lookup_password_expiration,
    ExpiryError,
};

/// A bound connection to a domain controller.
///
/// The connection is unbound when this is dropped, whichever way the lookup ended.
#[derive(Debug)]
pub struct AdConnection {
    pub(crate) ldap: LdapConn,
    /// DN of the domain object, e.g. `DC=corp,DC=example,DC=com`
    pub(crate) base_dn: String,
    pub(crate) user_search_base: String,
}

impl AdConnection {
    /// Looks up `username` and computes when its password expires.
    ///
    /// See [`lookup_password_expiration()`]
    pub fn try_lookup(&mut self, username: &str) -> Result<ExpirationResult, ExpiryError> {
        lookup_password_expiration(self, username)
    }
}

impl Drop for AdConnection {
    fn drop(&mut self) {
        match self.ldap.unbind() {
            Ok(()) => debug!(base_dn = %self.base_dn, "LDAP connection released"),
            Err(e) => warn!(error = %e, "LDAP unbind failed"),
        }
    }
}

/// Credentials used to bind to the directory.
///
/// These are handed in per lookup and never kept in [`AdSettings`].
#[derive(Clone)]
pub enum BindCredentials {
    /// LDAP simple bind. A bare account name gets `@domain` appended.
    Simple { username: String, password: String },
    /// SASL GSSAPI bind with the Kerberos ticket of the current user
    #[cfg(feature = "gssapi")]
    Negotiate,
}

impl BindCredentials {
    pub fn simple(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Simple {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Name to bind with. UPNs, `DOMAIN\user` and DNs are passed through unchanged.
    pub fn bind_name(username: &str, domain: &str) -> String {
        if username.contains(['@', '\\', '=']) {
            username.to_owned()
        } else {
            format!("{}@{}", username, domain.trim())
        }
    }

    fn bind(&self, ldap: &mut LdapConn, settings: &AdSettings) -> Result<(), ExpiryError> {
        match self {
            Self::Simple { username, password } => {
                // an empty password would turn into an unauthenticated bind that "succeeds"
                if password.is_empty() {
                    return Err(ExpiryError::Config(String::from(
                        "the bind password must not be empty",
                    )));
                }
                let bind_name = Self::bind_name(username, &settings.domain);
                debug!(bind_name = %bind_name, "simple bind");
                ldap.simple_bind(&bind_name, password)?.success()?;
            }
            #[cfg(feature = "gssapi")]
            Self::Negotiate => {
                debug!(server = %settings.server_fqdn, "GSSAPI bind");
                ldap.sasl_gssapi_bind(&settings.server_fqdn)?.success()?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple { username, .. } => f
                .debug_struct("Simple")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            #[cfg(feature = "gssapi")]
            Self::Negotiate => f.write_str("Negotiate"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
/// Settings needed by [`ldap3`](mod@ldap3) to connect to a domain controller of `domain`
pub struct AdSettings {
    /// Server FQDN
    pub server_fqdn: String,
    /// LDAP Port (in most cases either 389 or 636)
    pub port: LdapPort,
    /// if this is `Secure` use the `ldaps:\\` protocol
    pub protocol: LdapProtocol,
    /// DNS name of the domain, e.g. `corp.example.com`
    pub domain: String,
    /// Where to search for users, defaults to the domain root
    #[serde(default)]
    pub user_search_base: Option<String>,
}

pub type LdapPort = u16;

impl AdSettings {
    pub fn new(
        server: impl Into<String>,
        port: LdapPort,
        protocol: LdapProtocol,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            server_fqdn: server.into(),
            port,
            protocol,
            domain: domain.into(),
            user_search_base: None,
        }
    }

    /// Restricts the user search to a subtree of the domain
    pub fn with_user_search_base(mut self, search_base: impl Into<String>) -> Self {
        self.user_search_base = Some(search_base.into());
        self
    }

    /// Reads settings from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ExpiryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ExpiryError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&content)
            .map_err(|e| ExpiryError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// This will construct a connection uri from the settings given
    pub fn get_connection_uri(&self) -> String {
        let protocol: &str = self.protocol.into();
        format!("{}://{}:{}", protocol, self.server_fqdn, self.port)
    }

    /// DN of the domain object
    pub fn base_dn(&self) -> Result<String, ExpiryError> {
        domain_to_dn(&self.domain)
    }

    /// Opens a connection and binds with `credentials`
    pub fn connect(&self, credentials: &BindCredentials) -> Result<AdConnection, ExpiryError> {
        let base_dn = self.base_dn()?;
        let user_search_base = self
            .user_search_base
            .clone()
            .unwrap_or_else(|| base_dn.clone());
        let con_str = self.get_connection_uri();
        debug!(uri = %con_str, "connecting");

        let mut con = AdConnection {
            ldap: LdapConn::new(&con_str)?,
            base_dn,
            user_search_base,
        };
        // a failed bind still drops `con`, which releases the connection
        credentials.bind(&mut con.ldap, self)?;
        Ok(con)
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LdapProtocol {
    #[serde(alias = "ldaps")]
    Secure,
    #[serde(alias = "ldap")]
    Unsecure,
}

impl LdapProtocol {
    pub fn default_port(self) -> LdapPort {
        match self {
            LdapProtocol::Secure => 636,
            LdapProtocol::Unsecure => 389,
        }
    }
}

impl From<LdapProtocol> for &str {
    fn from(value: LdapProtocol) -> Self {
        match value {
            LdapProtocol::Secure => "ldaps",
            LdapProtocol::Unsecure => "ldap",
        }
    }
}

impl FromStr for LdapProtocol {
    type Err = ExpiryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ldap" => Ok(LdapProtocol::Unsecure),
            "ldaps" => Ok(LdapProtocol::Secure),
            _ => Err(ExpiryError::ConversionError(format!(
                "unknown LdapProtocol: {s}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(LdapProtocol::Secure, 636, "ldaps://dc01.corp.example.com:636")]
    #[case(LdapProtocol::Unsecure, 389, "ldap://dc01.corp.example.com:389")]
    fn connection_uri(#[case] protocol: LdapProtocol, #[case] port: LdapPort, #[case] uri: &str) {
        let settings = AdSettings::new("dc01.corp.example.com", port, protocol, "corp.example.com");
        assert_eq!(settings.get_connection_uri(), uri);
        assert_eq!(protocol.default_port(), port);
    }

    #[rstest]
    #[case("ldaps", LdapProtocol::Secure)]
    #[case("ldap", LdapProtocol::Unsecure)]
    fn protocol_from_str(#[case] input: &str, #[case] expected: LdapProtocol) {
        assert_eq!(input.parse::<LdapProtocol>().expect("known protocol"), expected);
    }

    #[test]
    fn unknown_protocol() {
        assert!("https".parse::<LdapProtocol>().is_err());
    }

    #[test]
    fn settings_from_json() {
        let json = r#"{
            "server_fqdn": "dc01.corp.example.com",
            "port": 636,
            "protocol": "Secure",
            "domain": "corp.example.com"
        }"#;
        let settings: AdSettings = serde_json::from_str(json).expect("valid settings");
        assert_eq!(
            settings,
            AdSettings::new("dc01.corp.example.com", 636, LdapProtocol::Secure, "corp.example.com")
        );
        assert_eq!(settings.base_dn().expect("valid domain"), "DC=corp,DC=example,DC=com");
    }

    #[test]
    fn settings_from_json_with_search_base() {
        let json = r#"{
            "server_fqdn": "dc01",
            "port": 389,
            "protocol": "ldap",
            "domain": "corp.example.com",
            "user_search_base": "OU=Staff,DC=corp,DC=example,DC=com"
        }"#;
        let settings: AdSettings = serde_json::from_str(json).expect("valid settings");
        assert_eq!(settings.protocol, LdapProtocol::Unsecure);
        assert_eq!(
            settings.user_search_base.as_deref(),
            Some("OU=Staff,DC=corp,DC=example,DC=com")
        );
    }

    #[test]
    fn missing_settings_file() {
        let err = AdSettings::from_json_file("/nonexistent/ad-pwd-expiry.json")
            .expect_err("file does not exist");
        assert!(matches!(err, ExpiryError::Config(_)));
    }

    #[rstest]
    #[case("jdoe", "jdoe@corp.example.com")]
    #[case("jdoe@corp.example.com", "jdoe@corp.example.com")]
    #[case("CORP\\jdoe", "CORP\\jdoe")]
    #[case("CN=svc,OU=Service,DC=corp,DC=example,DC=com", "CN=svc,OU=Service,DC=corp,DC=example,DC=com")]
    fn bind_name(#[case] username: &str, #[case] expected: &str) {
        assert_eq!(BindCredentials::bind_name(username, "corp.example.com"), expected);
    }

    #[test]
    fn debug_hides_the_password() {
        let credentials = BindCredentials::simple("jdoe", "hunter2");
        let printed = format!("{credentials:?}");
        assert!(printed.contains("jdoe"));
        assert!(!printed.contains("hunter2"));
    }
}
