use ad_pwd_expiry::{
    password_expiry_display, AdSettings, BindCredentials, DirectoryReader, ExpiryError, LdapPort,
    LdapProtocol,
};
use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "ad-pwd-expiry")]
#[command(about = "Show when the password of an Active Directory account expires")]
struct Args {
    /// sAMAccountName or userPrincipalName of the account
    #[arg(required_unless_present = "policy")]
    username: Option<String>,

    /// JSON file with the connection settings
    #[arg(short, long, conflicts_with_all = ["server", "domain"])]
    config: Option<PathBuf>,

    /// Domain controller to connect to
    #[arg(short, long, required_unless_present = "config")]
    server: Option<String>,

    /// DNS name of the domain, e.g. corp.example.com
    #[arg(short, long, required_unless_present = "config")]
    domain: Option<String>,

    /// ldap or ldaps
    #[arg(long, default_value = "ldaps", value_parser = parse_protocol)]
    protocol: LdapProtocol,

    /// Defaults to 636 for ldaps and 389 for ldap
    #[arg(long)]
    port: Option<LdapPort>,

    /// Only search for the account below this DN
    #[arg(long)]
    search_base: Option<String>,

    /// Account to bind with
    #[arg(short = 'u', long, env = "AD_PWD_EXPIRY_USER")]
    bind_user: Option<String>,

    /// Password of the bind account
    #[arg(long, env = "AD_PWD_EXPIRY_PASSWORD", hide_env_values = true)]
    bind_password: Option<String>,

    /// Bind with the Kerberos ticket of the current user
    #[cfg(feature = "gssapi")]
    #[arg(long, conflicts_with_all = ["bind_user", "bind_password"])]
    negotiate: bool,

    /// Print the domain's account policy instead
    #[arg(long)]
    policy: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// More logging, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_protocol(s: &str) -> Result<LdapProtocol, String> {
    s.parse().map_err(|e: ExpiryError| e.to_string())
}

impl Args {
    fn settings(&self) -> Result<AdSettings> {
        let mut settings = match (&self.config, &self.server, &self.domain) {
            (Some(path), _, _) => AdSettings::from_json_file(path)?,
            (None, Some(server), Some(domain)) => AdSettings::new(
                server.as_str(),
                self.port.unwrap_or(self.protocol.default_port()),
                self.protocol,
                domain.as_str(),
            ),
            _ => anyhow::bail!("either --config or --server and --domain are required"),
        };
        if let Some(search_base) = &self.search_base {
            settings = settings.with_user_search_base(search_base.as_str());
        }
        Ok(settings)
    }

    fn credentials(&self) -> Result<BindCredentials> {
        #[cfg(feature = "gssapi")]
        {
            if self.negotiate {
                return Ok(BindCredentials::Negotiate);
            }
        }
        let user = self
            .bind_user
            .as_deref()
            .context("--bind-user or AD_PWD_EXPIRY_USER is required")?;
        let password = self
            .bind_password
            .as_deref()
            .context("--bind-password or AD_PWD_EXPIRY_PASSWORD is required")?;
        Ok(BindCredentials::simple(user, password))
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let settings = args.settings()?;
    let credentials = args.credentials()?;
    let username = args.username.as_deref().unwrap_or_default().trim();

    if !args.policy && !args.json {
        println!("{}", password_expiry_display(&settings, &credentials, username)?);
        return Ok(());
    }

    let mut con = settings
        .connect(&credentials)
        .with_context(|| format!("cannot bind to {}", settings.get_connection_uri()))?;

    if args.policy {
        let policy = con.resolve_domain_policy()?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&policy)?);
        } else {
            println!("{policy:#?}");
        }
        return Ok(());
    }

    let expiration = con.try_lookup(username)?;
    let output = json!({
        "username": username,
        "expiration": expiration,
        "display": expiration.to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
