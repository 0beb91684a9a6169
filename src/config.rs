use std::env;
use std::fmt;

use crate::error::{AppError, Result};

/// HMAC key for payment links. Never printed.
#[derive(Clone)]
pub struct PaymentSecret(String);

impl PaymentSecret {
    /// Wrap a secret, rejecting empty or whitespace-only values.
    pub fn new(secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(AppError::ConfigurationMissing("PAYMENT_SECRET_KEY"));
        }
        Ok(Self(secret))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for PaymentSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PaymentSecret(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub base_url: String,
    /// Signing key for payment links (required, no default)
    pub payment_secret: PaymentSecret,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_port(env::var("PORT").ok().as_deref())?;

        let base_url = env::var("BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let payment_secret = env::var("PAYMENT_SECRET_KEY")
            .map_err(|_| AppError::ConfigurationMissing("PAYMENT_SECRET_KEY"))
            .and_then(PaymentSecret::new)?;

        Ok(Self {
            host,
            port,
            database_path: database_path_from_env(),
            base_url,
            payment_secret,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `PORT` if set, else 3000. A value that is not a port number is an error.
fn parse_port(value: Option<&str>) -> Result<u16> {
    match value {
        None => Ok(3000),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::InvalidConfiguration(format!("PORT={}", raw))),
    }
}

/// `DATABASE_PATH`, defaulting to `xfb_pay.db`. Usable without the rest of
/// the configuration (for maintenance commands that never sign links).
pub fn database_path_from_env() -> String {
    dotenvy::dotenv().ok();
    env::var("DATABASE_PATH").unwrap_or_else(|_| "xfb_pay.db".to_string())
}
