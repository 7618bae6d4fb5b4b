use ldap3::{ldap_escape, Scope, SearchEntry, SearchResult};
use tracing::{debug, info, instrument, warn};

use crate::{
    attributes::AttributeSet,
    error::ExpiryError,
    expiration::{compute_expiration, ExpirationResult},
    policy::{AccountPolicy, POLICY_ATTRIBUTES},
    records::{PsoRecord, UserRecord, PSO_MAX_PASSWORD_AGE, RESULTANT_PSO, USER_ATTRIBUTES},
    types::{AdConnection, AdSettings, BindCredentials},
};

/// `noSuchObject` result code
const NO_SUCH_OBJECT: u32 = 32;

/// Read access to the directory records a password expiration is computed from
pub trait DirectoryReader {
    /// Finds the account with the given `sAMAccountName` or `userPrincipalName`
    fn resolve_user(&mut self, username: &str) -> Result<UserRecord, ExpiryError>;

    /// Finds the fine-grained password policy that applies to `user`, if any
    fn resolve_pso(&mut self, user: &UserRecord) -> Result<Option<PsoRecord>, ExpiryError>;

    /// Reads the account policy of the domain
    fn resolve_domain_policy(&mut self) -> Result<AccountPolicy, ExpiryError>;
}

/// Resolves `username`, its PSO and the domain policy and computes when its password expires.
///
/// # Errors
/// Directory failures are returned as they are, see also [`compute_expiration()`]
pub fn lookup_password_expiration(
    directory: &mut impl DirectoryReader,
    username: &str,
) -> Result<ExpirationResult, ExpiryError> {
    let user = directory.resolve_user(username)?;
    let pso = directory.resolve_pso(&user)?;
    let policy = directory.resolve_domain_policy()?;
    let result = compute_expiration(&user, pso.as_ref(), &policy)?;
    info!(user = %user.distinguished_name, expiration = ?result, "password expiration computed");
    Ok(result)
}

/// Connects with `credentials`, looks up `username` and renders the result for display.
///
/// The connection is released before this returns.
pub fn password_expiry_display(
    settings: &AdSettings,
    credentials: &BindCredentials,
    username: &str,
) -> Result<String, ExpiryError> {
    let mut con = settings.connect(credentials)?;
    let result = con.try_lookup(username.trim())?;
    Ok(result.to_string())
}

/// Search filter matching a user account by `sAMAccountName` or `userPrincipalName`
pub fn user_filter(username: &str) -> String {
    let name = ldap_escape(username);
    format!("(&(objectCategory=person)(objectClass=user)(|(sAMAccountName={name})(userPrincipalName={name})))")
}

/// Turns a search result into its entries, any result code but success is an error
fn process_search_result(rs: SearchResult) -> Result<Vec<SearchEntry>, ExpiryError> {
    let SearchResult(entries, result) = rs;
    result.success()?;
    Ok(entries
        .into_iter()
        .filter(|entry| !entry.is_ref())
        .map(SearchEntry::construct)
        .collect())
}

/// Like [`process_search_result`], but `noSuchObject` means "no entries"
fn optional_search_result(rs: SearchResult) -> Result<Vec<SearchEntry>, ExpiryError> {
    if rs.1.rc == NO_SUCH_OBJECT {
        return Ok(Vec::new());
    }
    process_search_result(rs)
}

/// Picks the one account out of the entries a user search returned
fn single_user(
    username: &str,
    mut entries: Vec<SearchEntry>,
) -> Result<SearchEntry, ExpiryError> {
    match entries.len() {
        0 => Err(ExpiryError::NotFound(format!("User {username}"))),
        1 => Ok(entries.remove(0)),
        count => {
            warn!(username, count, "more than one account matches");
            Err(ExpiryError::AmbiguousUser(username.to_owned()))
        }
    }
}

/// DN of the PSO that applies to the account, `None` when it falls under the domain policy
fn resultant_pso_dn(entry: &SearchEntry) -> Option<String> {
    entry.raw(RESULTANT_PSO).map(str::to_owned)
}

/// Builds the PSO from the entries a read of `pso_dn` returned
fn pso_from_entries(
    pso_dn: String,
    entries: Vec<SearchEntry>,
) -> Result<Option<PsoRecord>, ExpiryError> {
    match entries.into_iter().next() {
        Some(pso) => {
            debug!(pso = %pso_dn, "applying password settings");
            PsoRecord::from_attributes(pso_dn, &pso).map(Some)
        }
        None => {
            warn!(pso = %pso_dn, "password settings cannot be read");
            Ok(None)
        }
    }
}

/// Builds the account policy from the entries a read of the domain object returned
fn domain_policy_from_entries(
    base_dn: &str,
    entries: Vec<SearchEntry>,
) -> Result<AccountPolicy, ExpiryError> {
    let entry = entries.into_iter().next().ok_or_else(|| {
        ExpiryError::directory_unavailable(format!("domain object {base_dn} was not returned"))
    })?;
    AccountPolicy::from_attributes(&entry)
}

impl AdConnection {
    /// Reads `attrs` of the single object `dn`
    fn read_object(
        &mut self,
        dn: &str,
        filter: &str,
        attrs: &[&str],
    ) -> Result<SearchResult, ExpiryError> {
        Ok(self.ldap.search(dn, Scope::Base, filter, attrs)?)
    }
}

impl DirectoryReader for AdConnection {
    #[instrument(skip(self))]
    fn resolve_user(&mut self, username: &str) -> Result<UserRecord, ExpiryError> {
        let filter = user_filter(username);
        let rs = self
            .ldap
            .search(&self.user_search_base, Scope::Subtree, &filter, USER_ATTRIBUTES)?;
        let entry = single_user(username, process_search_result(rs)?)?;
        debug!(dn = %entry.dn, "found account");
        UserRecord::from_attributes(entry.dn.clone(), &entry)
    }

    #[instrument(skip(self, user), fields(user = %user.distinguished_name))]
    fn resolve_pso(&mut self, user: &UserRecord) -> Result<Option<PsoRecord>, ExpiryError> {
        // msDS-ResultantPSO is constructed and only returned for base searches
        let rs = self.read_object(&user.distinguished_name, "(objectClass=*)", &[RESULTANT_PSO])?;
        let Some(entry) = process_search_result(rs)?.into_iter().next() else {
            return Err(ExpiryError::NotFound(format!(
                "User {}",
                user.distinguished_name
            )));
        };
        let Some(pso_dn) = resultant_pso_dn(&entry) else {
            debug!("no fine-grained password policy applies");
            return Ok(None);
        };

        let rs = self.read_object(
            &pso_dn,
            "(objectClass=msDS-PasswordSettings)",
            &[PSO_MAX_PASSWORD_AGE],
        )?;
        pso_from_entries(pso_dn, optional_search_result(rs)?)
    }

    #[instrument(skip(self))]
    fn resolve_domain_policy(&mut self) -> Result<AccountPolicy, ExpiryError> {
        let base_dn = self.base_dn.clone();
        let rs = self.read_object(&base_dn, "(objectClass=domainDNS)", &POLICY_ATTRIBUTES)?;
        domain_policy_from_entries(&base_dn, process_search_result(rs)?)
    }
}
