//! credkeep CLI - Command line interface for stored service accounts.
//!
//! This tool manages accounts in a local account file through the same
//! permission-gated API remote callers use.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use credkeep_accounts::{
    AccountApi, AccountInfo, AccountManager, LocalStore, ManagerConfig, Session, StoreConfig,
};
use credkeep_backend::create_default_registry;
use credkeep_common::{AccountConfig, AccountId, Secret, UserId};

#[derive(Parser)]
#[command(name = "credkeep")]
#[command(about = "credkeep - Service account management")]
#[command(version)]
struct Cli {
    /// Account file (default: <data dir>/credkeep/accounts.json).
    #[arg(long)]
    store: Option<PathBuf>,

    /// User to act as.
    #[arg(short, long, default_value = "local")]
    user: String,

    /// Act with administrative rights.
    #[arg(long)]
    admin: bool,

    /// Query the backend right after creating an account.
    #[arg(long)]
    refresh_on_create: bool,

    /// Allow the same login twice on one backend.
    #[arg(long)]
    allow_duplicate_logins: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available backend types.
    Types,

    /// List visible accounts.
    List,

    /// Show one account.
    Show {
        /// Account identifier.
        id: String,

        /// Backend type of the account.
        backend: String,

        /// Query the backend for fresh status.
        #[arg(short, long)]
        refresh: bool,
    },

    /// Create an account. The secret is prompted for.
    Create {
        /// Backend type.
        backend: String,

        /// Login name on the backend.
        login: String,
    },

    /// Change login and/or secret.
    Update {
        /// Account identifier.
        id: String,

        /// Backend type of the account.
        backend: String,

        /// New login name.
        #[arg(short, long)]
        login: Option<String>,

        /// Prompt for a new secret.
        #[arg(short, long)]
        secret: bool,
    },

    /// Change activation, sharing and backend options.
    Set {
        /// Account identifier.
        id: String,

        /// Backend type of the account.
        backend: String,

        /// Enable or disable the account.
        #[arg(long)]
        activated: Option<bool>,

        /// Share the account with all users.
        #[arg(long)]
        shared: Option<bool>,

        /// Backend option as key=value; value "null" removes the option.
        #[arg(short, long = "option")]
        options: Vec<String>,
    },

    /// Remove an account.
    Remove {
        /// Account identifier.
        id: String,

        /// Backend type of the account.
        backend: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let api = open_api(&cli).await?;
    let session = session(&cli)?;
    debug!(user = %session.user_id(), role = ?session.role(), "session ready");

    match cli.command {
        Commands::Types => cmd_types(&api, &session).await,

        Commands::List => cmd_list(&api, &session).await,

        Commands::Show {
            id,
            backend,
            refresh,
        } => cmd_show(&api, &session, &id, &backend, refresh).await,

        Commands::Create { backend, login } => cmd_create(&api, &session, &backend, &login).await,

        Commands::Update {
            id,
            backend,
            login,
            secret,
        } => cmd_update(&api, &session, &id, &backend, login.as_deref(), secret).await,

        Commands::Set {
            id,
            backend,
            activated,
            shared,
            options,
        } => cmd_set(&api, &session, &id, &backend, activated, shared, &options).await,

        Commands::Remove { id, backend } => cmd_remove(&api, &session, &id, &backend).await,
    }
}

/// Build the API over the account file.
async fn open_api(cli: &Cli) -> Result<AccountApi> {
    let path = match &cli.store {
        Some(path) => path.clone(),
        None => dirs::data_dir()
            .context("Cannot determine data directory, use --store")?
            .join("credkeep")
            .join("accounts.json"),
    };
    debug!("Using account file: {}", path.display());

    let store_config = StoreConfig::default().with_unique_logins(!cli.allow_duplicate_logins);
    let store = LocalStore::open(&path, store_config)
        .await
        .with_context(|| format!("Failed to open account file {}", path.display()))?;

    let manager = AccountManager::new(Arc::new(store), create_default_registry())
        .with_config(ManagerConfig::default().with_refresh_on_create(cli.refresh_on_create));

    Ok(AccountApi::new(Arc::new(manager)))
}

fn session(cli: &Cli) -> Result<Session> {
    let user = UserId::new(cli.user.as_str()).context("Invalid user name")?;
    Ok(if cli.admin {
        Session::admin(user)
    } else {
        Session::user(user)
    })
}

/// Prompt for a secret twice.
fn prompt_secret() -> Result<Secret> {
    let secret = Zeroizing::new(rpassword::prompt_password("Secret: ").context("Failed to read secret")?);
    let confirm = Zeroizing::new(
        rpassword::prompt_password("Confirm secret: ").context("Failed to read secret")?,
    );

    if *secret != *confirm {
        anyhow::bail!("Secrets do not match");
    }
    if secret.is_empty() {
        anyhow::bail!("Secret cannot be empty");
    }

    Ok(Secret::new(secret.as_str()))
}

fn parse_id(id: &str) -> Result<AccountId> {
    AccountId::parse(id).context("Invalid account identifier")
}

/// Parse `key=value` pairs. Values are read as JSON, falling back to text.
fn parse_options(options: &[String]) -> Result<AccountConfig> {
    let mut config = AccountConfig::new();
    for option in options {
        let (key, raw) = option
            .split_once('=')
            .with_context(|| format!("Option '{}' is not key=value", option))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        config.insert(key.trim().to_string(), value);
    }
    Ok(config)
}

fn print_account(info: &AccountInfo) {
    println!("Account {}", info.id);
    println!("  Backend: {}", info.backend_type);
    println!("  Login: {}", info.login_name);
    println!("  Owner: {}", info.owner);
    println!("  Activated: {}", info.activated);
    println!("  Shared: {}", info.shared);
    for (key, value) in &info.config {
        println!("  Option {}: {}", key, value);
    }
    match &info.live_status {
        Some(status) => {
            println!(
                "  Status: {} (checked {})",
                if status.report.valid { "valid" } else { "invalid" },
                status.checked_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            println!("  Premium: {}", status.report.premium);
            if let Some(until) = status.report.valid_until {
                println!("  Valid until: {}", until.format("%Y-%m-%d"));
            }
            if let Some(left) = status.report.traffic_left {
                match status.report.max_traffic {
                    Some(max) => println!("  Traffic: {} / {} bytes", left, max),
                    None => println!("  Traffic: {} bytes", left),
                }
            }
        }
        None => println!("  Status: unknown"),
    }
    if let Some(error) = &info.refresh_error {
        println!("  Last refresh failed: {}", error);
    }
}

/// List backend types.
async fn cmd_types(api: &AccountApi, session: &Session) -> Result<()> {
    let types = api.get_account_types(session).await?;

    println!("Backend types:");
    for name in types {
        println!("  {}", name);
    }

    Ok(())
}

/// List visible accounts.
async fn cmd_list(api: &AccountApi, session: &Session) -> Result<()> {
    let accounts = api
        .get_accounts(session)
        .await
        .context("Failed to list accounts")?;

    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }

    for info in accounts {
        let flags = match (info.activated, info.shared) {
            (true, true) => "shared",
            (true, false) => "",
            (false, true) => "disabled, shared",
            (false, false) => "disabled",
        };
        println!(
            "  {}  {:<12} {:<24} {} {}",
            info.id, info.backend_type, info.login_name, info.owner, flags
        );
    }

    Ok(())
}

/// Show one account.
async fn cmd_show(
    api: &AccountApi,
    session: &Session,
    id: &str,
    backend: &str,
    refresh: bool,
) -> Result<()> {
    let id = parse_id(id)?;
    let view = api
        .get_account_info(session, &id, backend, refresh)
        .await
        .context("Failed to load account")?
        .with_context(|| format!("Account {} not found", id))?;

    print_account(&view.info);
    if let Some(warning) = view.warning {
        println!("\nWarning: refresh failed, showing last known status: {}", warning);
    }

    Ok(())
}

/// Create an account.
async fn cmd_create(api: &AccountApi, session: &Session, backend: &str, login: &str) -> Result<()> {
    let secret = prompt_secret()?;

    let info = api
        .create_account(session, backend, login, secret)
        .await
        .context("Failed to create account")?;

    println!("Account created successfully!");
    print_account(&info);

    Ok(())
}

/// Change login and/or secret.
async fn cmd_update(
    api: &AccountApi,
    session: &Session,
    id: &str,
    backend: &str,
    login: Option<&str>,
    change_secret: bool,
) -> Result<()> {
    let id = parse_id(id)?;
    if login.is_none() && !change_secret {
        anyhow::bail!("Nothing to update. Use --login and/or --secret");
    }

    let secret = if change_secret {
        prompt_secret()?
    } else {
        Secret::new("")
    };

    let info = api
        .update_account(session, &id, backend, login, secret)
        .await
        .context("Failed to update account")?;

    println!("Account updated successfully!");
    print_account(&info);

    Ok(())
}

/// Change account settings.
async fn cmd_set(
    api: &AccountApi,
    session: &Session,
    id: &str,
    backend: &str,
    activated: Option<bool>,
    shared: Option<bool>,
    options: &[String],
) -> Result<()> {
    let id = parse_id(id)?;
    let config = parse_options(options)?;

    let mut info = api
        .get_account_info(session, &id, backend, false)
        .await
        .context("Failed to load account")?
        .with_context(|| format!("Account {} not found", id))?
        .info;

    if let Some(activated) = activated {
        info.activated = activated;
    }
    if let Some(shared) = shared {
        info.shared = shared;
    }
    info.config = config;

    let info = api
        .update_account_info(session, &info)
        .await
        .context("Failed to update account settings")?;

    println!("Account settings updated successfully!");
    print_account(&info);

    Ok(())
}

/// Remove an account.
async fn cmd_remove(api: &AccountApi, session: &Session, id: &str, backend: &str) -> Result<()> {
    let id = parse_id(id)?;

    api.remove_account(session, &id, backend)
        .await
        .context("Failed to remove account")?;

    println!("Account removed: {}", id);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_options() {
        let options = vec![
            "limit=3".to_string(),
            "flag=true".to_string(),
            "name=mirror".to_string(),
            "old=null".to_string(),
        ];

        let config = parse_options(&options).unwrap();
        assert_eq!(config.get("limit"), Some(&json!(3)));
        assert_eq!(config.get("flag"), Some(&json!(true)));
        assert_eq!(config.get("name"), Some(&json!("mirror")));
        assert_eq!(config.get("old"), Some(&Value::Null));
    }

    #[test]
    fn test_parse_options_rejects_missing_value() {
        assert!(parse_options(&["limit".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_set() {
        let cli = Cli::try_parse_from([
            "credkeep", "--user", "c1", "set", "id", "offline", "--shared", "true", "-o", "a=1",
        ])
        .unwrap();

        assert_eq!(cli.user, "c1");
        match cli.command {
            Commands::Set { shared, options, activated, .. } => {
                assert_eq!(shared, Some(true));
                assert_eq!(activated, None);
                assert_eq!(options, vec!["a=1".to_string()]);
            }
            _ => panic!("expected set command"),
        }
    }
}
