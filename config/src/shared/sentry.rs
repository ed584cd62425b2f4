use secrecy::SecretString;
use serde::Deserialize;

/// Sentry error reporting configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SentryConfig {
    pub dsn: SecretString,
}
