use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub stripe: StripeConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Shared secret used to verify identity tokens (HS256).
    pub identity_secret: String,
    /// Expected `iss` claim; unchecked when absent.
    #[serde(default)]
    pub identity_issuer: Option<String>,
    pub session_duration_hours: i64,
    /// Emails granted the organizer role on session init.
    #[serde(default)]
    pub organizer_emails: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StripeConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentsConfig {
    /// ISO 4217 code, lowercase as the gateway expects it.
    pub currency: String,
    pub gateway_timeout_secs: u64,
    /// Additional attempts after the first on transient gateway errors.
    pub max_retries: u32,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            currency: "bdt".to_string(),
            gateway_timeout_secs: 15,
            max_retries: 2,
        }
    }
}

impl PaymentsConfig {
    pub fn gateway_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.gateway_timeout_secs)
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://medcamp.db")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.identity_secret", "change-me-in-production")?
            .set_default("auth.session_duration_hours", 24)?
            .set_default("stripe.enabled", false)?
            .set_default("payments.currency", "bdt")?
            .set_default("payments.gateway_timeout_secs", 15)?
            .set_default("payments.max_retries", 2)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with MEDCAMP__ prefix, double underscore separates levels)
            .add_source(
                Environment::with_prefix("MEDCAMP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.organizer_emails")
                    .try_parsing(true),
            )

            .build()?;

        config.try_deserialize()
    }

    pub fn is_organizer_email(&self, email: &str) -> bool {
        self.auth.is_organizer_email(email)
    }
}

impl AuthConfig {
    pub fn is_organizer_email(&self, email: &str) -> bool {
        self.organizer_emails
            .iter()
            .any(|e| e.eq_ignore_ascii_case(email))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://medcamp.db".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                identity_secret: "change-me-in-production".to_string(),
                identity_issuer: None,
                session_duration_hours: 24,
                organizer_emails: Vec::new(),
            },
            stripe: StripeConfig {
                secret_key: None,
                webhook_secret: None,
                enabled: false,
            },
            payments: PaymentsConfig::default(),
        }
    }
}
