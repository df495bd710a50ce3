use crate::connection::DatabaseConfig;
use crate::identity::{DisabledMailer, HttpMailer, IdentityService, MailSender, PasswordService, TokenService};
use crate::transaction::DomainTransaction;
use anyhow::{Context, Result, bail};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_JWT_EXPIRATION: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub enabled: bool,
    pub from: String,
    pub relay_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub base_url: String,
    pub jwt_secret: Option<String>,
    pub jwt_expiration: Duration,
    pub password_hash_rounds: u32,
    pub mail: MailConfig,
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Reads the configuration from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let bind_addr = env_string("BIND_ADDR", "127.0.0.1:3000")
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a valid host:port")?;

        let jwt_expiration = match env_opt("JWT_EXPIRATION_TIME") {
            Some(raw) => parse_duration(&raw)
                .with_context(|| format!("JWT_EXPIRATION_TIME '{}' is not a valid duration", raw))?,
            None => DEFAULT_JWT_EXPIRATION,
        };

        let password_hash_rounds = env_string("PASSWORD_HASH_ROUNDS", &bcrypt::DEFAULT_COST.to_string())
            .parse::<u32>()
            .context("PASSWORD_HASH_ROUNDS must be a positive integer")?;

        let database = match env_opt("DATABASE_URL") {
            Some(url) => DatabaseConfig::from_url(&url)
                .map_err(anyhow::Error::msg)
                .context("DATABASE_URL is invalid")?,
            None => DatabaseConfig::default(),
        };

        Ok(Self {
            bind_addr,
            base_url: env_string("BASE_URL", "http://localhost:3000/"),
            jwt_secret: env_opt("JWT_TOKEN_SECRET"),
            jwt_expiration,
            password_hash_rounds,
            mail: MailConfig {
                enabled: parse_flag(&env_string("MAIL_ENABLED", "false")),
                from: env_string("MAIL_FROM", "noreply@kompagnon.fr"),
                relay_url: env_opt("MAIL_RELAY_URL"),
                api_key: env_opt("MAIL_API_KEY"),
            },
            database,
        })
    }

    /// Wires the identity service for `domain` from this configuration.
    pub fn identity_service(&self, domain: DomainTransaction) -> IdentityService {
        if self.jwt_secret.is_none() {
            warn!("JWT_TOKEN_SECRET is not set; token operations will fail");
        }

        let mailer: Arc<dyn MailSender> = match (&self.mail.relay_url, self.mail.enabled) {
            (Some(url), true) => Arc::new(HttpMailer::new(
                url.clone(),
                self.mail.api_key.clone(),
                self.mail.from.clone(),
            )),
            (None, true) => {
                warn!("MAIL_ENABLED is set without MAIL_RELAY_URL; mails are not sent");
                Arc::new(DisabledMailer::new(self.mail.from.clone()))
            }
            _ => Arc::new(DisabledMailer::new(self.mail.from.clone())),
        };

        IdentityService::new(
            domain,
            TokenService::new(self.jwt_secret.clone(), self.jwt_expiration),
        )
        .with_passwords(PasswordService::new(self.password_hash_rounds))
        .with_mailer(mailer)
        .with_base_url(self.base_url.clone())
    }
}

/// Parses `30s`, `15m`, `1h`, `7d` or a bare number of seconds.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.find(|c: char| !c.is_ascii_digit()) {
        Some(index) => raw.split_at(index),
        None => (raw, "s"),
    };
    let amount: u64 = digits
        .parse()
        .with_context(|| format!("'{}' does not start with a number", raw))?;

    let seconds = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => bail!("unknown duration unit '{}'", other),
    };
    Ok(Duration::from_secs(amount.saturating_mul(seconds)))
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
