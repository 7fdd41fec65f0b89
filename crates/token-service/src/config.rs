//! Configuration for the token service.

use std::time::Duration;

/// Default values mirroring the command-line defaults.
pub mod defaults {
    use std::time::Duration;

    /// Listen port.
    pub const PORT: u16 = 9096;

    /// Origin of the front-end that renders the login form.
    pub const FRONTEND_HOST: &str = "http://localhost:8080";

    /// Seeded OAuth client id.
    pub const CLIENT_ID: &str = "222222";

    /// Seeded OAuth client secret.
    pub const CLIENT_SECRET: &str = "22222222";

    /// Redirect domain of the seeded client.
    pub const CLIENT_DOMAIN: &str = "http://localhost:9094";

    /// Width of the confirmation code.
    pub const CONFIRM_CODE_DIGITS: u32 = 4;

    /// Lifetime of a confirmation code (5 minutes).
    pub const CONFIRM_CODE_TTL: Duration = Duration::from_secs(300);

    /// Wrong codes accepted before the pending login is dropped.
    pub const MAX_CONFIRM_ATTEMPTS: u32 = 5;

    /// Idle lifetime of a stored session (1 hour).
    pub const SESSION_TTL: Duration = Duration::from_secs(3600);

    /// Deadline for a single session store call.
    pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Session cookie name.
    pub const SESSION_COOKIE: &str = "token_session";

    /// Access token lifetime: 2 hours.
    pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(2 * 3600);

    /// Refresh token lifetime: 3 days.
    pub const REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(3 * 24 * 3600);

    /// Authorization code lifetime: 10 minutes.
    pub const AUTH_CODE_LIFETIME: Duration = Duration::from_secs(600);
}

/// Confirmation codes shorter than this are refused.
pub const MIN_CONFIRM_CODE_DIGITS: u32 = 4;

/// Confirmation codes longer than this do not fit the generator.
pub const MAX_CONFIRM_CODE_DIGITS: u32 = 9;

/// The OAuth client registered with the authorization core at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSeed {
    pub id: String,
    pub secret: String,
    pub domain: String,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port.
    pub port: u16,

    /// Front-end origin used for the login redirect and CORS headers.
    pub frontend_host: String,

    /// Client registered with the authorization core.
    pub client: ClientSeed,

    /// Log a dump of every handshake request.
    pub dump_requests: bool,

    /// Number of decimal digits in a confirmation code.
    pub confirm_code_digits: u32,

    /// How long a confirmation code stays valid.
    pub confirm_code_ttl: Duration,

    /// Wrong codes tolerated per pending login.
    pub max_confirm_attempts: u32,

    /// Idle lifetime of a stored session.
    pub session_ttl: Duration,

    /// Deadline applied to each session store call.
    pub store_timeout: Duration,

    /// Name of the session cookie.
    pub session_cookie: String,

    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,

    /// Access token lifetime handed to the authorization core.
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime handed to the authorization core.
    pub refresh_token_lifetime: Duration,

    /// Authorization code lifetime handed to the authorization core.
    pub auth_code_lifetime: Duration,
}

impl Config {
    /// Create a configuration with the given front-end and client, defaults elsewhere.
    #[must_use]
    pub fn new(frontend_host: impl Into<String>, client: ClientSeed) -> Self {
        Self {
            port: defaults::PORT,
            frontend_host: frontend_host.into(),
            client,
            dump_requests: true,
            confirm_code_digits: defaults::CONFIRM_CODE_DIGITS,
            confirm_code_ttl: defaults::CONFIRM_CODE_TTL,
            max_confirm_attempts: defaults::MAX_CONFIRM_ATTEMPTS,
            session_ttl: defaults::SESSION_TTL,
            store_timeout: defaults::STORE_TIMEOUT,
            session_cookie: defaults::SESSION_COOKIE.to_string(),
            secure_cookies: false,
            access_token_lifetime: defaults::ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: defaults::REFRESH_TOKEN_LIFETIME,
            auth_code_lifetime: defaults::AUTH_CODE_LIFETIME,
        }
    }

    /// Create a test configuration: quiet, short deadlines.
    #[must_use]
    pub fn for_testing(frontend_host: &str) -> Self {
        Self {
            dump_requests: false,
            store_timeout: Duration::from_secs(1),
            ..Self::new(
                frontend_host,
                ClientSeed {
                    id: defaults::CLIENT_ID.to_string(),
                    secret: defaults::CLIENT_SECRET.to_string(),
                    domain: defaults::CLIENT_DOMAIN.to_string(),
                },
            )
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let env_or = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());

        let mut config = Self::new(
            env_or("FRONTEND_HOST", defaults::FRONTEND_HOST),
            ClientSeed {
                id: env_or("CLIENT_ID", defaults::CLIENT_ID),
                secret: env_or("CLIENT_SECRET", defaults::CLIENT_SECRET),
                domain: env_or("CLIENT_DOMAIN", defaults::CLIENT_DOMAIN),
            },
        );

        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse()?;
        }
        if let Ok(dump) = std::env::var("DUMP_REQUESTS") {
            config.dump_requests = dump.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject values the handshake cannot work with.
    ///
    /// # Errors
    ///
    /// Returns error describing the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(MIN_CONFIRM_CODE_DIGITS..=MAX_CONFIRM_CODE_DIGITS).contains(&self.confirm_code_digits) {
            anyhow::bail!(
                "confirm code digits must be between {MIN_CONFIRM_CODE_DIGITS} and {MAX_CONFIRM_CODE_DIGITS}, got {}",
                self.confirm_code_digits
            );
        }
        if self.max_confirm_attempts == 0 {
            anyhow::bail!("max confirm attempts must be at least 1");
        }
        if self.confirm_code_ttl.is_zero() {
            anyhow::bail!("confirm code ttl must be positive");
        }
        if self.session_cookie.is_empty() {
            anyhow::bail!("session cookie name cannot be empty");
        }
        url::Url::parse(&self.frontend_host)
            .map_err(|e| anyhow::anyhow!("invalid frontend host {}: {e}", self.frontend_host))?;
        Ok(())
    }

    /// URL of the front-end login form.
    #[must_use]
    pub fn frontend_root(&self) -> String {
        format!("{}/", self.frontend_host.trim_end_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            defaults::FRONTEND_HOST,
            ClientSeed {
                id: defaults::CLIENT_ID.to_string(),
                secret: defaults::CLIENT_SECRET.to_string(),
                domain: defaults::CLIENT_DOMAIN.to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.port, 9096);
        assert_eq!(config.confirm_code_digits, 4);
        assert_eq!(config.client.id, "222222");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frontend_root() {
        let config = Config::for_testing("http://localhost:8080/");
        assert_eq!(config.frontend_root(), "http://localhost:8080/");

        let config = Config::for_testing("http://localhost:8080");
        assert_eq!(config.frontend_root(), "http://localhost:8080/");
    }

    #[test]
    fn test_validate_rejects_short_codes() {
        let mut config = Config::default();
        config.confirm_code_digits = 3;
        assert!(config.validate().is_err());

        config.confirm_code_digits = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = Config::default();
        config.max_confirm_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_frontend() {
        let config = Config::for_testing("not a url");
        assert!(config.validate().is_err());
    }
}
