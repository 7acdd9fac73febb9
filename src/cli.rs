//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::ClientIpHeader;
use crate::db::{Database, NewUser, RefreshTokenStore};
use crate::password::hash_password;
use crate::rate_limit::{DEFAULT_LOGIN_PER_MINUTE, RateLimitConfig};
use clap::Parser;
use rand::{Rng, distr::Alphanumeric};
use std::sync::Arc;
use tracing::{error, info};

const MIN_SECRET_LENGTH: usize = 32;
const GENERATED_PASSWORD_LENGTH: usize = 24;
const DEFAULT_TENANT_NAME: &str = "Default";
const RESERVED_SUBDOMAINS: &[&str] = &["all"];

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "tenantgate",
    about = "Multi-tenant back-office API with rotating refresh tokens"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7291", env = "PORT")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, default_value = "tenantgate.db")]
    pub database: String,

    /// Path to file containing the access token secret. Prefer ACCESS_TOKEN_SECRET instead
    #[arg(long)]
    pub access_secret_file: Option<String>,

    /// Path to file containing the refresh token secret. Prefer REFRESH_TOKEN_SECRET instead
    #[arg(long)]
    pub refresh_secret_file: Option<String>,

    /// Omit the Secure flag on cookies (plain HTTP development only)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Take the client IP from this proxy header instead of the socket address
    #[arg(long, value_enum)]
    pub client_ip_header: Option<ClientIpHeader>,

    /// Login attempts allowed per minute per client IP
    #[arg(long, default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_rate_limit: u32,

    /// Create an admin with this email on startup and print its password
    #[arg(long, value_name = "EMAIL")]
    pub create_admin: Option<String>,

    /// Tenant for --create-admin, created if missing
    #[arg(long, value_name = "NAME", requires = "create_admin")]
    pub tenant_name: Option<String>,

    /// Deactivate the user with this email and end its session
    #[arg(long, value_name = "EMAIL", conflicts_with = "activate_user")]
    pub deactivate_user: Option<String>,

    /// Reactivate the user with this email
    #[arg(long, value_name = "EMAIL")]
    pub activate_user: Option<String>,

    /// Deactivate the tenant with this subdomain and end its users' sessions
    #[arg(long, value_name = "SUBDOMAIN", conflicts_with = "activate_tenant")]
    pub deactivate_tenant: Option<String>,

    /// Reactivate the tenant with this subdomain
    #[arg(long, value_name = "SUBDOMAIN")]
    pub activate_tenant: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// The two signing secrets.
pub struct Secrets {
    pub access: String,
    pub refresh: String,
}

/// Load one secret from an environment variable or a file.
/// Returns None and logs an error if the secret cannot be loaded.
fn load_secret(env_var: &str, file: Option<&str>, flag: &str) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var(env_var) {
        // Clear the environment variable to prevent leaking
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        secret
    } else if let Some(path) = file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read secret file");
                return None;
            }
        }
    } else {
        error!(
            "{} is required. Set the environment variable (recommended) or use {}",
            env_var, flag
        );
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!(
            "{} is shorter than {} characters. Use a longer secret",
            env_var, MIN_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Load both secrets and check that they differ.
pub fn load_secrets(access_file: Option<&str>, refresh_file: Option<&str>) -> Option<Secrets> {
    let access = load_secret("ACCESS_TOKEN_SECRET", access_file, "--access-secret-file")?;
    let refresh = load_secret("REFRESH_TOKEN_SECRET", refresh_file, "--refresh-secret-file")?;

    if access == refresh {
        error!("Access and refresh token secrets must be different");
        return None;
    }

    Some(Secrets { access, refresh })
}

/// Lowercase alphanumerics with single dashes between words.
fn subdomain_for(name: &str) -> String {
    let mut slug = String::new();
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        DEFAULT_TENANT_NAME.to_ascii_lowercase()
    } else if RESERVED_SUBDOMAINS.contains(&slug.as_str()) {
        // `/category/all` and `/food/all` shadow a public menu named "all".
        format!("{slug}-tenant")
    } else {
        slug
    }
}

fn generate_password() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

/// Handle the --create-admin flag: find or create the tenant, then create an
/// admin with a generated password and print it once.
pub async fn handle_create_admin(db: &Database, email: &str, tenant_name: Option<&str>) {
    let email = email.trim();
    let tenant_name = tenant_name.unwrap_or(DEFAULT_TENANT_NAME);
    let subdomain = subdomain_for(tenant_name);

    let tenant_id = match db.tenants().get_by_subdomain(&subdomain).await {
        Ok(Some(tenant)) => tenant.id,
        Ok(None) => match db.tenants().create(tenant_name, &subdomain).await {
            Ok(id) => {
                info!(tenant_id = %id, subdomain = %subdomain, "Tenant created");
                id
            }
            Err(e) => {
                error!(error = %e, "Failed to create tenant");
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!(error = %e, "Failed to look up tenant");
            std::process::exit(1);
        }
    };

    match db.users().email_exists(email).await {
        Ok(true) => {
            println!();
            println!("User already exists: {}", email);
            println!();
            return;
        }
        Ok(false) => {}
        Err(e) => {
            error!(error = %e, "Failed to check for existing user");
            std::process::exit(1);
        }
    }

    let password = generate_password();
    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            std::process::exit(1);
        }
    };

    let user = NewUser {
        tenant_id: &tenant_id,
        email,
        name: "Administrator",
        password_hash: &password_hash,
        role: "admin",
    };

    match db.users().create(user).await {
        Ok(id) => {
            info!(user_id = %id, tenant_id = %tenant_id, "Admin user created");
            println!();
            println!("Admin user created: {}", email);
            println!("Tenant: {} ({})", tenant_name, subdomain);
            println!("Password: {}", password);
            println!();
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin user");
            std::process::exit(1);
        }
    }
}

/// Set a user's active flag. Deactivation also revokes the user's refresh
/// token; access tokens already issued run until they expire. Returns false if
/// no user has this email.
pub async fn set_user_active(db: &Database, email: &str, active: bool) -> Result<bool, sqlx::Error> {
    let Some(user_id) = db.users().set_active_by_email(email, active).await? else {
        return Ok(false);
    };
    if !active {
        db.refresh_tokens().delete_by_user(&user_id).await?;
    }
    info!(user_id = %user_id, active, "User activity changed");
    Ok(true)
}

/// Set a tenant's active flag, revoking every session of its users on
/// deactivation. Returns false if no tenant has this subdomain.
pub async fn set_tenant_active(
    db: &Database,
    subdomain: &str,
    active: bool,
) -> Result<bool, sqlx::Error> {
    let Some(tenant_id) = db.tenants().set_active_by_subdomain(subdomain, active).await? else {
        return Ok(false);
    };
    if !active {
        db.refresh_tokens().delete_by_tenant(&tenant_id).await?;
    }
    info!(tenant_id = %tenant_id, active, "Tenant activity changed");
    Ok(true)
}

/// Handle the --activate-*/--deactivate-* flags. Exits on an unknown email or
/// subdomain.
pub async fn handle_activation_flags(db: &Database, args: &Args) {
    let users = [
        (args.deactivate_user.as_deref(), false),
        (args.activate_user.as_deref(), true),
    ];
    for (email, active) in users {
        let Some(email) = email else { continue };
        match set_user_active(db, email, active).await {
            Ok(true) => {}
            Ok(false) => {
                error!(email = %email, "No user with this email");
                std::process::exit(1);
            }
            Err(e) => {
                error!(error = %e, "Failed to update user");
                std::process::exit(1);
            }
        }
    }

    let tenants = [
        (args.deactivate_tenant.as_deref(), false),
        (args.activate_tenant.as_deref(), true),
    ];
    for (subdomain, active) in tenants {
        let Some(subdomain) = subdomain else { continue };
        match set_tenant_active(db, subdomain, active).await {
            Ok(true) => {}
            Ok(false) => {
                error!(subdomain = %subdomain, "No tenant with this subdomain");
                std::process::exit(1);
            }
            Err(e) => {
                error!(error = %e, "Failed to update tenant");
                std::process::exit(1);
            }
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, secrets: Secrets) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: secrets.access.into_bytes(),
        refresh_secret: secrets.refresh.into_bytes(),
        secure_cookies: !args.insecure_cookies,
        rate_limit: Arc::new(RateLimitConfig::new(
            args.login_rate_limit,
            args.client_ip_header,
        )),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
