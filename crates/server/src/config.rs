use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

/// Sender addresses and delivery gating for outbound alert mail.
#[derive(Clone, Debug, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_digest_from")]
    pub digest_from: String,
    #[serde(default = "default_confirmation_from")]
    pub confirmation_from: String,
    /// Sender of operator notifications such as forwarded unsubscribe requests.
    #[serde(default = "default_server_from")]
    pub server_from: String,
    /// When set, digests are only delivered to recipients matching
    /// `allowed_recipients`; everyone else is logged instead of mailed.
    #[serde(default)]
    pub sandbox: bool,
    /// Case-insensitive substrings, e.g. `"@example.org"` or a mailbox name.
    #[serde(default)]
    pub allowed_recipients: Vec<String>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            digest_from: default_digest_from(),
            confirmation_from: default_confirmation_from(),
            server_from: default_server_from(),
            sandbox: false,
            allowed_recipients: Vec::new(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub smtp: SmtpConfig,
    /// Absolute base URL used when building links in emails, without trailing slash.
    pub site_url: String,
    pub signing_secret: String,
    /// Read-only database mode: signups are refused and unsubscribes are
    /// forwarded to `admins`.
    #[serde(default)]
    pub readonly_db: bool,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_digest_from() -> String {
    "alerts@openparliament.ca".to_string()
}

fn default_server_from() -> String {
    "server@openparliament.ca".to_string()
}

fn default_confirmation_from() -> String {
    "alerts@contact.openparliament.ca".to_string()
}

impl AppConfig {
    /// Checks the invariants deserialization alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signing_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "signing_secret must be at least 32 characters".into(),
            ));
        }
        if self.smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be > 0".into()));
        }
        if self.alerts.sandbox && self.alerts.allowed_recipients.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Validation(
                "alerts.allowed_recipients must not contain empty patterns".into(),
            ));
        }
        Ok(())
    }

    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `SMTP__PORT`, `ALERTS__SANDBOX`) overrides the file value.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml"))
        .add_source(
            Environment::default()
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("admins")
                .with_list_parse_key("alerts.allowed_recipients")
                .try_parsing(true),
        )
        .build()?;

    let app: AppConfig = cfg.try_deserialize()?;
    app.validate()?;
    Ok(app)
}

/// Convenience helper for binaries wanting panic-on-error behaviour.
pub fn load_config_or_panic() -> AppConfig {
    match load_config() {
        Ok(c) => c,
        Err(e) => panic!("Failed to load configuration: {e}"),
    }
}
