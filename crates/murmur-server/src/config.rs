use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub media_dir: PathBuf,
    pub public_url: String,
    pub secure_cookies: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let jwt_secret = env::var("MURMUR_JWT_SECRET").unwrap_or_default();
        check_secret(&jwt_secret)?;

        let host = var_or("MURMUR_HOST", "0.0.0.0");
        let port: u16 = var_or("MURMUR_PORT", "5000")
            .parse()
            .context("MURMUR_PORT must be a port number")?;
        let public_url = env::var("MURMUR_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));
        let environment = var_or("MURMUR_ENV", "development");

        Ok(Self {
            host,
            port,
            db_path: var_or("MURMUR_DB_PATH", "murmur.db").into(),
            jwt_secret,
            media_dir: var_or("MURMUR_MEDIA_DIR", "./media").into(),
            public_url,
            secure_cookies: environment != "development",
        })
    }
}

fn check_secret(secret: &str) -> Result<()> {
    if secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&secret) {
        bail!("MURMUR_JWT_SECRET is unset or still a placeholder; set it in your .env file");
    }
    Ok(())
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}
