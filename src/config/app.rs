use anyhow::{Context, Result};
use std::env;

const DEV_SECRET_KEY: &str = "dev-insecure-change-me";
const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub secret_key: String,
    /// Public URL of the deployment, used for links in SMS messages
    pub base_url: Option<String>,
    /// Login code for the instructor seeded on first start
    pub instructor_default_code: Option<String>,
    /// Login attempts allowed per client per minute
    pub login_rate_limit: usize,
    /// Key the login limiter on `X-Forwarded-For` instead of the peer address.
    /// Only enable behind a reverse proxy that overwrites the header.
    pub trust_proxy_headers: bool,
    pub twilio: Option<TwilioConfig>,
}

#[derive(Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub api_base: String,
}

impl std::fmt::Debug for TwilioConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwilioConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            secret_key: DEV_SECRET_KEY.to_string(),
            base_url: None,
            instructor_default_code: None,
            login_rate_limit: 10,
            trust_proxy_headers: false,
            twilio: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(port) => port.parse().with_context(|| format!("Invalid PORT: {}", port))?,
            None => defaults.port,
        };

        let login_rate_limit = match get("LOGIN_RATE_LIMIT") {
            Some(limit) => limit
                .parse()
                .with_context(|| format!("Invalid LOGIN_RATE_LIMIT: {}", limit))?,
            None => defaults.login_rate_limit,
        };

        let trust_proxy_headers = match get("TRUST_PROXY_HEADERS") {
            Some(value) => parse_flag(&value)
                .with_context(|| format!("Invalid TRUST_PROXY_HEADERS: {}", value))?,
            None => defaults.trust_proxy_headers,
        };

        let twilio = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_FROM_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
                api_base: get("TWILIO_API_BASE")
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            }),
            _ => None,
        };

        Ok(AppConfig {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            environment: get("ENVIRONMENT").unwrap_or(defaults.environment),
            secret_key: get("SECRET_KEY").unwrap_or(defaults.secret_key),
            base_url: get("BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            instructor_default_code: get("INSTRUCTOR_DEFAULT_CODE"),
            login_rate_limit,
            trust_proxy_headers,
            twilio,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => anyhow::bail!("expected true or false"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None).unwrap();

        assert_eq!(config.server_address(), "0.0.0.0:3000");
        assert!(config.is_development());
        assert!(config.uses_dev_secret());
        assert!(config.twilio.is_none());
        assert!(config.base_url.is_none());
        assert_eq!(config.login_rate_limit, 10);
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_trust_proxy_headers_flag() {
        let on = AppConfig::from_lookup(lookup_from(&[("TRUST_PROXY_HEADERS", "TRUE")])).unwrap();
        assert!(on.trust_proxy_headers);

        let off = AppConfig::from_lookup(lookup_from(&[("TRUST_PROXY_HEADERS", "0")])).unwrap();
        assert!(!off.trust_proxy_headers);

        assert!(AppConfig::from_lookup(lookup_from(&[("TRUST_PROXY_HEADERS", "maybe")])).is_err());
    }

    #[test]
    fn test_twilio_requires_all_three_values() {
        let partial = AppConfig::from_lookup(lookup_from(&[
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "secret"),
        ]))
        .unwrap();
        assert!(partial.twilio.is_none());

        let full = AppConfig::from_lookup(lookup_from(&[
            ("TWILIO_ACCOUNT_SID", "AC123"),
            ("TWILIO_AUTH_TOKEN", "secret"),
            ("TWILIO_FROM_NUMBER", "+15550001111"),
        ]))
        .unwrap();
        let twilio = full.twilio.unwrap();
        assert_eq!(twilio.account_sid, "AC123");
        assert_eq!(twilio.api_base, "https://api.twilio.com");
    }

    #[test]
    fn test_twilio_debug_redacts_token() {
        let twilio = TwilioConfig {
            account_sid: "AC123".to_string(),
            auth_token: "super-secret".to_string(),
            from_number: "+15550001111".to_string(),
            api_base: DEFAULT_TWILIO_API_BASE.to_string(),
        };

        let printed = format!("{:?}", twilio);
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("[REDACTED]"));
    }

    #[test]
    fn test_blank_values_are_unset_and_base_url_trimmed() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SECRET_KEY", "   "),
            ("BASE_URL", "https://lessons.example.com/"),
            ("INSTRUCTOR_DEFAULT_CODE", ""),
        ]))
        .unwrap();

        assert!(config.uses_dev_secret());
        assert_eq!(config.base_url.as_deref(), Some("https://lessons.example.com"));
        assert!(config.instructor_default_code.is_none());
    }

    #[test]
    fn test_invalid_port_is_an_error() {
        let result = AppConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        env::set_var("PORT", "8181");
        env::set_var("ENVIRONMENT", "production");
        env::set_var("INSTRUCTOR_DEFAULT_CODE", "COACH42");

        let config = AppConfig::from_env().unwrap();

        env::remove_var("PORT");
        env::remove_var("ENVIRONMENT");
        env::remove_var("INSTRUCTOR_DEFAULT_CODE");

        assert_eq!(config.port, 8181);
        assert!(config.is_production());
        assert_eq!(config.instructor_default_code.as_deref(), Some("COACH42"));
    }
}
