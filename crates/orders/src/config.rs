//! Orders service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDERS_TOKEN_SECRET` - Bearer credential signing secret (min 32 chars, high entropy)
//! - `STRIPE_SECRET_KEY` - Charge provider secret key
//! - `SMTP_HOST` - SMTP server hostname
//! - `SMTP_USERNAME` - SMTP authentication username
//! - `SMTP_PASSWORD` - SMTP authentication password
//! - `SMTP_FROM` - Email sender address
//! - `BUSINESS_EMAIL` - Primary business address for staff-directed notifications
//!
//! ## Store
//! - `ORDERS_STORE` - `postgres` (default) or `memory` (not allowed in production)
//! - `ORDERS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `ORDERS_HOST` - Bind address (default: 127.0.0.1)
//! - `ORDERS_PORT` - Listen port (default: 3002)
//! - `ORDERS_ENVIRONMENT` - `development`, `staging` or `production` (default: development)
//! - `ORDERS_ALLOWED_ORIGINS` - Comma-separated list of allowed request origins
//! - `ORDERS_ALLOW_ALL_ORIGINS` - Accept any origin (rejected in production)
//! - `PRICING_TAX_RATE` - Sales tax as a fraction (default: 0.0825)
//! - `STRIPE_CURRENCY` - Charge currency (default: usd)
//! - `STRIPE_TIMEOUT_SECS` - Charge request timeout (default: 20)
//! - `STRIPE_API_BASE` - Charge provider base URL (default: <https://api.stripe.com>)
//! - `SMTP_PORT` - SMTP port (default: 587)
//! - `STAFF_EMAILS` - Comma-separated staff addresses that receive business notifications
//! - `BUSINESS_PHONE` - Business number for chat notifications
//! - `NOTIFY_RETRY_ATTEMPTS` - Attempts per channel before giving up (default: 3)
//! - `NOTIFY_RETRY_BACKOFF_MS` - Linear backoff step between attempts (default: 500)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`
//!
//! ## Optional (WhatsApp - enables the chat channel)
//! - `WHATSAPP_ACCESS_TOKEN` - Cloud API access token
//! - `WHATSAPP_PHONE_NUMBER_ID` - Sending phone number ID
//! - `WHATSAPP_API_BASE` - Graph API base URL (default: <https://graph.facebook.com/v21.0>)
//! - `WHATSAPP_TEMPLATES` - `event:lang=template` pairs, e.g.
//!   `payment_ready:es=pago_listo,payment_ready:en=payment_ready`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use panaderia_core::Language;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::middleware::OriginPolicy;
use crate::notifications::Event;

const MIN_TOKEN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v21.0";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Whether this is the production deployment.
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

/// Orders service configuration.
#[derive(Debug, Clone)]
pub struct OrdersConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Bearer credential signing secret
    pub token_secret: SecretString,
    /// Entity store backend
    pub store: StoreConfig,
    /// Sales tax rate applied on the card path
    pub tax_rate: Decimal,
    /// Charge provider configuration
    pub stripe: StripeConfig,
    /// Email (SMTP) configuration
    pub email: EmailConfig,
    /// Recipient and retry settings for notifications
    pub notifications: NotificationConfig,
    /// WhatsApp chat channel (optional)
    pub whatsapp: Option<WhatsAppConfig>,
    /// Allowed request origins
    pub origins: OriginPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Entity store backend selection.
#[derive(Clone)]
pub enum StoreConfig {
    /// `PostgreSQL` via `sqlx`.
    Postgres {
        /// Connection URL (contains password)
        database_url: SecretString,
    },
    /// In-process store; data is lost on restart.
    Memory,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres { .. } => f
                .debug_struct("Postgres")
                .field("database_url", &"[REDACTED]")
                .finish(),
            Self::Memory => f.write_str("Memory"),
        }
    }
}

/// Charge provider configuration.
///
/// Implements `Debug` manually to redact the secret key.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: SecretString,
    /// ISO currency code, lowercase
    pub currency: String,
    /// Bound on each charge request
    pub timeout: Duration,
    /// API base URL
    pub api_base: String,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// Email (SMTP) configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Recipient and retry settings for the notification dispatcher.
///
/// Addresses are kept as configured; each one is validated when a
/// notification is sent so a bad entry fails only its own delivery.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Primary business address
    pub business_email: String,
    /// Additional staff addresses
    pub staff_emails: Vec<String>,
    /// Business number for the chat channel
    pub business_phone: Option<String>,
    /// Attempts per channel, at least 1
    pub retry_attempts: u32,
    /// Linear backoff step between attempts
    pub retry_backoff: Duration,
    /// Pre-approved chat templates by `(event, language)`
    pub templates: HashMap<(Event, Language), String>,
}

/// WhatsApp Cloud API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct WhatsAppConfig {
    /// Cloud API access token
    pub access_token: SecretString,
    /// Sending phone number ID
    pub phone_number_id: String,
    /// Graph API base URL
    pub api_base: String,
}

impl std::fmt::Debug for WhatsAppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppConfig")
            .field("access_token", &"[REDACTED]")
            .field("phone_number_id", &self.phone_number_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl OrdersConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ORDERS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ORDERS_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ORDERS_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ORDERS_PORT".to_string(), e.to_string()))?;
        let environment = get_env_or_default("ORDERS_ENVIRONMENT", "development")
            .parse::<Environment>()
            .map_err(|e| ConfigError::InvalidEnvVar("ORDERS_ENVIRONMENT".to_string(), e))?;

        let token_secret = get_validated_secret("ORDERS_TOKEN_SECRET")?;
        validate_token_secret(&token_secret, "ORDERS_TOKEN_SECRET")?;

        let store = StoreConfig::from_env(environment)?;
        let tax_rate = parse_tax_rate(&get_env_or_default("PRICING_TAX_RATE", "0.0825"))?;
        let stripe = StripeConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let notifications = NotificationConfig::from_env()?;
        let whatsapp = WhatsAppConfig::from_env()?;
        let origins = origin_policy_from_env(environment)?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            environment,
            token_secret,
            store,
            tax_rate,
            stripe,
            email,
            notifications,
            whatsapp,
            origins,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Development configuration backed by the in-memory store.
    ///
    /// Providers point at unroutable defaults; callers swap in their own
    /// senders and card processor through [`crate::state::AppState::new`].
    #[must_use]
    pub fn in_memory(token_secret: SecretString, origins: OriginPolicy) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3002,
            environment: Environment::Development,
            token_secret,
            store: StoreConfig::Memory,
            tax_rate: Decimal::new(825, 4),
            stripe: StripeConfig {
                secret_key: SecretString::from(String::new()),
                currency: "usd".to_string(),
                timeout: Duration::from_secs(20),
                api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            },
            email: EmailConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 587,
                smtp_username: String::new(),
                smtp_password: SecretString::from(String::new()),
                from_address: "pedidos@panaderia.shop".to_string(),
            },
            notifications: NotificationConfig {
                business_email: "pedidos@panaderia.shop".to_string(),
                staff_emails: Vec::new(),
                business_phone: None,
                retry_attempts: 3,
                retry_backoff: Duration::ZERO,
                templates: HashMap::new(),
            },
            whatsapp: None,
            origins,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Returns a reference to the WhatsApp configuration, if available.
    ///
    /// Returns `None` if the WhatsApp variables are not set, which disables
    /// the chat channel.
    #[must_use]
    pub const fn whatsapp(&self) -> Option<&WhatsAppConfig> {
        self.whatsapp.as_ref()
    }
}

impl StoreConfig {
    fn from_env(environment: Environment) -> Result<Self, ConfigError> {
        match get_env_or_default("ORDERS_STORE", "postgres").as_str() {
            "postgres" => Ok(Self::Postgres {
                database_url: get_database_url("ORDERS_DATABASE_URL")?,
            }),
            "memory" if environment.is_production() => Err(ConfigError::InvalidEnvVar(
                "ORDERS_STORE".to_string(),
                "the memory store cannot be used in production".to_string(),
            )),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::InvalidEnvVar(
                "ORDERS_STORE".to_string(),
                format!("expected 'postgres' or 'memory', got '{other}'"),
            )),
        }
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default("STRIPE_TIMEOUT_SECS", "20")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STRIPE_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_ascii_lowercase(),
            timeout: Duration::from_secs(timeout_secs),
            api_base: get_env_or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE),
        })
    }
}

impl EmailConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;

        Ok(Self {
            smtp_host: get_required_env("SMTP_HOST")?,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
        })
    }
}

impl NotificationConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let business_email = get_required_env("BUSINESS_EMAIL")?;
        let staff_emails = get_optional_env("STAFF_EMAILS")
            .map(|s| parse_list(&s))
            .unwrap_or_default();
        for address in &staff_emails {
            if panaderia_core::Email::parse(address).is_err() {
                tracing::warn!(address = %address, "STAFF_EMAILS entry is not a valid address");
            }
        }

        let retry_attempts = get_env_or_default("NOTIFY_RETRY_ATTEMPTS", "3")
            .parse::<u32>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("NOTIFY_RETRY_ATTEMPTS".to_string(), e.to_string())
            })?
            .max(1);
        let backoff_ms = get_env_or_default("NOTIFY_RETRY_BACKOFF_MS", "500")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("NOTIFY_RETRY_BACKOFF_MS".to_string(), e.to_string())
            })?;
        let templates = get_optional_env("WHATSAPP_TEMPLATES")
            .map(|s| parse_templates(&s))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            business_email,
            staff_emails,
            business_phone: get_optional_env("BUSINESS_PHONE"),
            retry_attempts,
            retry_backoff: Duration::from_millis(backoff_ms),
            templates,
        })
    }
}

impl WhatsAppConfig {
    /// Load WhatsApp configuration from environment.
    ///
    /// Returns `None` if neither variable is set (chat channel disabled).
    /// Both variables must be set together.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let access_token = get_optional_env("WHATSAPP_ACCESS_TOKEN");
        let phone_number_id = get_optional_env("WHATSAPP_PHONE_NUMBER_ID");

        match (access_token, phone_number_id) {
            (Some(token), Some(id)) => {
                validate_secret_strength(&token, "WHATSAPP_ACCESS_TOKEN")?;
                Ok(Some(Self {
                    access_token: SecretString::from(token),
                    phone_number_id: id,
                    api_base: get_env_or_default("WHATSAPP_API_BASE", DEFAULT_WHATSAPP_API_BASE),
                }))
            }
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "WHATSAPP_*".to_string(),
                "Both WHATSAPP_ACCESS_TOKEN and WHATSAPP_PHONE_NUMBER_ID must be set together"
                    .to_string(),
            )),
        }
    }
}

fn origin_policy_from_env(environment: Environment) -> Result<OriginPolicy, ConfigError> {
    let allow_all = get_optional_env("ORDERS_ALLOW_ALL_ORIGINS")
        .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
    if allow_all && environment.is_production() {
        return Err(ConfigError::InvalidEnvVar(
            "ORDERS_ALLOW_ALL_ORIGINS".to_string(),
            "allowing all origins is not permitted in production".to_string(),
        ));
    }

    let origins = get_optional_env("ORDERS_ALLOWED_ORIGINS")
        .map(|s| parse_list(&s))
        .unwrap_or_default();
    let policy = OriginPolicy::from_origins(&origins, allow_all)
        .map_err(|e| ConfigError::InvalidEnvVar("ORDERS_ALLOWED_ORIGINS".to_string(), e))?;

    if !allow_all && policy.is_empty() {
        tracing::warn!("ORDERS_ALLOWED_ORIGINS is empty; every API request will be refused");
    }
    Ok(policy)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Blank values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Split a comma-separated list, dropping blank entries.
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a tax rate fraction in `[0, 1)`.
fn parse_tax_rate(value: &str) -> Result<Decimal, ConfigError> {
    let rate = Decimal::from_str(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("PRICING_TAX_RATE".to_string(), e.to_string()))?;
    if rate.is_sign_negative() || rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "PRICING_TAX_RATE".to_string(),
            format!("must be a fraction between 0 and 1 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Parse `event:lang=template` pairs.
fn parse_templates(value: &str) -> Result<HashMap<(Event, Language), String>, ConfigError> {
    let invalid =
        |msg: String| ConfigError::InvalidEnvVar("WHATSAPP_TEMPLATES".to_string(), msg);

    let mut templates = HashMap::new();
    for entry in parse_list(value) {
        let (key, template) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("'{entry}' is not of the form event:lang=template")))?;
        let (event, language) = key
            .split_once(':')
            .ok_or_else(|| invalid(format!("'{key}' is missing a language")))?;
        let event = event.trim().parse::<Event>().map_err(invalid)?;
        let language = language.trim().parse::<Language>().map_err(invalid)?;
        let template = template.trim();
        if template.is_empty() {
            return Err(invalid(format!("'{key}' has an empty template name")));
        }
        templates.insert((event, language), template.to_string());
    }
    Ok(templates)
}

/// Validate that the token secret meets minimum length requirements.
fn validate_token_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_TOKEN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_TOKEN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-stripe-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_token_secret_length() {
        assert!(validate_token_secret(&SecretString::from("short".to_string()), "T").is_err());
        assert!(validate_token_secret(&SecretString::from("a".repeat(32)), "T").is_ok());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("Dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("moon".parse::<Environment>().is_err());
        assert!(Environment::Production.is_production());
        assert!(!Environment::Staging.is_production());
    }

    #[test]
    fn test_parse_list_skips_blanks() {
        assert_eq!(
            parse_list(" a@x.com, ,b@x.com,"),
            vec!["a@x.com".to_string(), "b@x.com".to_string()]
        );
    }

    #[test]
    fn test_parse_tax_rate() {
        assert_eq!(parse_tax_rate("0.0825").unwrap(), dec!(0.0825));
        assert!(parse_tax_rate("1.5").is_err());
        assert!(parse_tax_rate("-0.1").is_err());
        assert!(parse_tax_rate("eight").is_err());
    }

    #[test]
    fn test_parse_templates() {
        let templates =
            parse_templates("payment_ready:es=pago_listo, payment_ready:en=payment_ready").unwrap();
        assert_eq!(
            templates.get(&(Event::PaymentReady, Language::Es)).map(String::as_str),
            Some("pago_listo")
        );
        assert_eq!(templates.len(), 2);

        assert!(parse_templates("payment_ready=pago_listo").is_err());
        assert!(parse_templates("unknown:es=x").is_err());
        assert!(parse_templates("payment_ready:fr=x").is_err());
        assert!(parse_templates("payment_ready:es=").is_err());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let config = StripeConfig {
            secret_key: SecretString::from("sk_live_super_private_key".to_string()),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(20),
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("usd"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_live_super_private_key"));
    }

    #[test]
    fn test_email_config_debug_redacts_secrets() {
        let config = EmailConfig {
            smtp_host: "smtp.panaderia.test".to_string(),
            smtp_port: 587,
            smtp_username: "pedidos@panaderia.test".to_string(),
            smtp_password: SecretString::from("super_secret_smtp_password".to_string()),
            from_address: "noreply@panaderia.test".to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.panaderia.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
    }

    #[test]
    fn test_store_config_debug_redacts_url() {
        let config = StoreConfig::Postgres {
            database_url: SecretString::from("postgres://user:hunter2@db/orders".to_string()),
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
        assert_eq!(format!("{:?}", StoreConfig::Memory), "Memory");
    }
}
