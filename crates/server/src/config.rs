use anyhow::Context;

/// Runtime configuration, read from the environment (`.env` supported).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for verifying identity-provider bearer tokens.
    pub jwt_secret: String,
    /// Signing secret for identity-provider webhook deliveries.
    pub webhook_secret: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .ok()
            .map(|p| p.parse())
            .transpose()
            .context("PORT must be a number")?
            .unwrap_or(3001);
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:amorfly.db".to_string());
        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let webhook_secret = std::env::var("IDENTITY_WEBHOOK_SECRET")
            .context("IDENTITY_WEBHOOK_SECRET must be set")?;

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            webhook_secret,
        })
    }
}
