//! Configuration types.
//!
//! Everything is read from environment variables at startup.

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::notify::{
    HttpMailConfig, HttpNotifier, LogNotifier, MailSettings, Notifier, SmtpConfig, SmtpNotifier,
};

const DEFAULT_DB_PATH: &str = "./data/coach-onboard.db";
const DEFAULT_STORAGE_DIR: &str = "./data/storage";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_APP_URL: &str = "http://localhost:3000";
const DEFAULT_EMAIL_FROM: &str = "Boon <jfuentes@boon-health.com>";
const DEFAULT_ADMIN_EMAIL: &str = "hello@boon-health.com";

/// Portal server configuration.
#[derive(Debug)]
pub struct PortalConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Root directory for the local document bucket.
    pub storage_dir: PathBuf,
    pub port: u16,
    /// Daily-rolling log files go here when set.
    pub log_dir: Option<PathBuf>,
    pub mail: MailSettings,
    pub admin_token: SecretString,
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let admin_token = get("ADMIN_API_TOKEN")
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("ADMIN_API_TOKEN".into()))?;

        let port = match get("COACH_ONBOARD_PORT") {
            Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
                key: "COACH_ONBOARD_PORT".into(),
                message: format!("{raw}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };

        let app_url = get("APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.to_string());
        if !app_url.starts_with("http://") && !app_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "APP_URL".into(),
                message: format!("{app_url} is not an http(s) URL"),
            });
        }

        Ok(Self {
            db_path: get("COACH_ONBOARD_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            storage_dir: get("COACH_ONBOARD_STORAGE_DIR")
                .unwrap_or_else(|| DEFAULT_STORAGE_DIR.to_string())
                .into(),
            port,
            log_dir: get("COACH_ONBOARD_LOG_DIR").map(PathBuf::from),
            mail: MailSettings {
                from: get("EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.to_string()),
                admin_email: get("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.to_string()),
                app_url: app_url.trim_end_matches('/').to_string(),
            },
            admin_token,
        })
    }
}

/// Which transport outbound email goes through.
pub enum MailTransport {
    Smtp(SmtpConfig),
    Http(HttpMailConfig),
    /// No transport configured; emails are only logged.
    Log,
}

impl MailTransport {
    /// SMTP if `SMTP_HOST` is set, else the HTTP API if `EMAIL_API_URL` and
    /// `EMAIL_API_KEY` are set, else log-only.
    pub fn from_env() -> Self {
        if let Some(smtp) = SmtpConfig::from_env() {
            Self::Smtp(smtp)
        } else if let Some(http) = HttpMailConfig::from_env() {
            Self::Http(http)
        } else {
            Self::Log
        }
    }

    pub fn into_notifier(self) -> Arc<dyn Notifier> {
        match self {
            Self::Smtp(config) => Arc::new(SmtpNotifier::new(config)),
            Self::Http(config) => Arc::new(HttpNotifier::new(config)),
            Self::Log => Arc::new(LogNotifier),
        }
    }
}
