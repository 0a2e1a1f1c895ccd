use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::resolver::RecipientSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Smtp,
    Resend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS (port 587)
    Starttls,
    /// Implicit TLS (port 465)
    Tls,
    /// No encryption, local relays and test servers only
    None,
}

#[derive(Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub transport: TransportKind,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_tls: SmtpTls,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub resend_api_key: Option<String>,
    pub mail_from: String,
    pub mail_from_name: Option<String>,
    pub company_name: String,
    pub agent_name: String,
    pub company_phone: String,
    pub company_address: String,
    pub dispatch_timeout_ms: u64,
    pub delivery_max_attempts: u32,
    pub delivery_backoff_ms: u64,
    pub relay_timeout_secs: u64,
    pub recipient_sources: Vec<RecipientSource>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let transport = match env::var("MAIL_TRANSPORT")
            .unwrap_or_else(|_| "smtp".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "smtp" => TransportKind::Smtp,
            "resend" => TransportKind::Resend,
            other => return Err(ConfigError::InvalidTransport(other.to_string())),
        };

        let smtp_tls = match env::var("SMTP_TLS")
            .unwrap_or_else(|_| "starttls".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "starttls" => SmtpTls::Starttls,
            "tls" => SmtpTls::Tls,
            "none" => SmtpTls::None,
            other => return Err(ConfigError::InvalidTls(other.to_string())),
        };

        // GMAIL_* names are accepted for deployments created before the SMTP_* names
        let smtp_username = env::var("SMTP_USERNAME")
            .or_else(|_| env::var("GMAIL_USER"))
            .ok();
        let smtp_password = env::var("SMTP_PASSWORD")
            .or_else(|_| env::var("GMAIL_APP_PASSWORD"))
            .ok();

        let mail_from = env::var("MAIL_FROM")
            .ok()
            .or_else(|| smtp_username.clone())
            .ok_or(ConfigError::MissingSender)?;

        let recipient_sources = match env::var("RECIPIENT_SOURCES") {
            Ok(raw) => parse_sources(&raw)?,
            Err(_) => RecipientSource::default_order(),
        };

        Ok(Config {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            transport,
            smtp_host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            smtp_port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            smtp_tls,
            smtp_username,
            smtp_password,
            resend_api_key: env::var("RESEND_API_KEY").ok(),
            mail_from,
            mail_from_name: env::var("MAIL_FROM_NAME").ok(),
            company_name: env::var("COMPANY_NAME")
                .unwrap_or_else(|_| "Boca Raton Health Insurers".to_string()),
            agent_name: env::var("AGENT_NAME").unwrap_or_else(|_| "Gail".to_string()),
            company_phone: env::var("COMPANY_PHONE")
                .unwrap_or_else(|_| "(561) 555-0123".to_string()),
            company_address: env::var("COMPANY_ADDRESS")
                .unwrap_or_else(|_| "123 Health Plaza, Boca Raton, FL 33432".to_string()),
            dispatch_timeout_ms: number_from_env("DISPATCH_TIMEOUT_MS", 4000)?,
            delivery_max_attempts: number_from_env("DELIVERY_MAX_ATTEMPTS", 3u32)?.max(1),
            delivery_backoff_ms: number_from_env("DELIVERY_BACKOFF_MS", 500)?,
            relay_timeout_secs: number_from_env("RELAY_TIMEOUT_SECS", 10)?,
            recipient_sources,
        })
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn relay_timeout(&self) -> Duration {
        Duration::from_secs(self.relay_timeout_secs)
    }
}

// Credentials stay out of logs
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("transport", &self.transport)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_tls", &self.smtp_tls)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "***"))
            .field("resend_api_key", &self.resend_api_key.as_ref().map(|_| "***"))
            .field("mail_from", &self.mail_from)
            .field("company_name", &self.company_name)
            .field("dispatch_timeout_ms", &self.dispatch_timeout_ms)
            .field("delivery_max_attempts", &self.delivery_max_attempts)
            .field("recipient_sources", &self.recipient_sources)
            .finish()
    }
}

fn number_from_env<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    parse_number(name, env::var(name).ok(), default)
}

/// Unset means the default; a set but unparsable value is an error
fn parse_number<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name)),
        None => Ok(default),
    }
}

fn parse_sources(raw: &str) -> Result<Vec<RecipientSource>, ConfigError> {
    let sources = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<RecipientSource>()
                .map_err(|_| ConfigError::InvalidRecipientSource(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sources.is_empty() {
        return Err(ConfigError::InvalidRecipientSource(raw.to_string()));
    }
    Ok(sources)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server port")]
    InvalidPort,
    #[error("MAIL_FROM (or SMTP_USERNAME) environment variable is required")]
    MissingSender,
    #[error("Unknown MAIL_TRANSPORT: {0}")]
    InvalidTransport(String),
    #[error("Unknown SMTP_TLS mode: {0}")]
    InvalidTls(String),
    #[error("Unknown recipient source in RECIPIENT_SOURCES: {0}")]
    InvalidRecipientSource(String),
    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        server_host: "127.0.0.1".to_string(),
        server_port: 8000,
        transport: TransportKind::Smtp,
        smtp_host: "smtp.example.com".to_string(),
        smtp_port: 587,
        smtp_tls: SmtpTls::Starttls,
        smtp_username: Some("gail@example.com".to_string()),
        smtp_password: Some("app-password".to_string()),
        resend_api_key: None,
        mail_from: "gail@example.com".to_string(),
        mail_from_name: Some("Gail".to_string()),
        company_name: "Boca Raton Health Insurers".to_string(),
        agent_name: "Gail".to_string(),
        company_phone: "(561) 555-0123".to_string(),
        company_address: "123 Health Plaza, Boca Raton, FL 33432".to_string(),
        dispatch_timeout_ms: 2000,
        delivery_max_attempts: 3,
        delivery_backoff_ms: 1,
        relay_timeout_secs: 5,
        recipient_sources: RecipientSource::default_order(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sources_in_given_order() {
        let sources = parse_sources("transcript, explicit,customer").unwrap();
        assert_eq!(
            sources,
            vec![
                RecipientSource::Transcript,
                RecipientSource::Explicit,
                RecipientSource::Customer
            ]
        );
    }

    #[test]
    fn test_parse_sources_rejects_unknown() {
        let err = parse_sources("explicit,crm").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRecipientSource(s) if s == "crm"));
    }

    #[test]
    fn test_parse_sources_rejects_empty_list() {
        assert!(parse_sources(" , ").is_err());
    }

    #[test]
    fn test_numeric_setting_defaults_when_unset() {
        assert_eq!(parse_number("DISPATCH_TIMEOUT_MS", None, 4000u64).unwrap(), 4000);
        assert_eq!(
            parse_number("DELIVERY_BACKOFF_MS", Some(" 250 ".to_string()), 500u64).unwrap(),
            250
        );
    }

    #[test]
    fn test_malformed_numeric_setting_is_rejected() {
        let err = parse_number("DISPATCH_TIMEOUT_MS", Some("four-seconds".to_string()), 4000u64)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber("DISPATCH_TIMEOUT_MS")));

        let err = parse_number("DELIVERY_MAX_ATTEMPTS", Some("-1".to_string()), 3u32).unwrap_err();
        assert_eq!(err.to_string(), "Invalid numeric value for DELIVERY_MAX_ATTEMPTS");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("app-password"));
        assert!(rendered.contains("***"));
    }
}
