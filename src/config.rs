//! Application configuration loaded from environment variables.
//!
//! All values are read once at startup; missing required variables fail
//! the process immediately rather than surfacing later as runtime errors.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database URL (e.g. `sqlite:runclub.db`)
    pub database_url: String,
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// OAuth redirect URI registered with Strava
    pub strava_redirect_uri: String,
    /// Frontend URL to send the browser back to after login
    pub frontend_url: String,
    /// Server port
    pub port: u16,
    /// Signing key for session JWTs and the OAuth state parameter
    pub secret_key: Vec<u8>,
    /// Strava athlete IDs allowed to use the admin API
    pub admin_athlete_ids: Vec<i64>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            strava_client_id: "test_client_id".to_string(),
            strava_client_secret: "test_secret".to_string(),
            strava_redirect_uri: "http://localhost:8080/auth/strava/callback".to_string(),
            frontend_url: "http://localhost:8080".to_string(),
            port: 8080,
            secret_key: b"test_secret_key_32_bytes_minimum!".to_vec(),
            admin_athlete_ids: vec![],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL`, `STRAVA_CLIENT_ID` and `STRAVA_CLIENT_SECRET` are
    /// required; everything else has a local-development default.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            strava_redirect_uri: env::var("STRAVA_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:8080/auth/strava/callback".to_string()),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            secret_key: env::var("SECRET_KEY")
                .unwrap_or_else(|_| "dev-secret".to_string())
                .into_bytes(),
            admin_athlete_ids: parse_admin_ids(
                &env::var("ADMIN_ATHLETE_IDS").unwrap_or_default(),
            ),
        })
    }

    /// Whether an athlete is on the admin whitelist.
    pub fn is_admin(&self, athlete_id: i64) -> bool {
        self.admin_athlete_ids.contains(&athlete_id)
    }
}

/// Parse a comma-separated list of athlete IDs, ignoring blanks and junk.
fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<i64>().ok())
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("123,456"), vec![123, 456]);
        assert_eq!(parse_admin_ids(" 123 , 456 "), vec![123, 456]);
        assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("123,abc,789"), vec![123, 789]);
    }

    #[test]
    fn test_is_admin() {
        let config = Config {
            admin_athlete_ids: vec![42],
            ..Config::default()
        };
        assert!(config.is_admin(42));
        assert!(!config.is_admin(43));
    }

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("DATABASE_URL", "sqlite:test.db");
        env::set_var("STRAVA_CLIENT_ID", "test_id");
        env::set_var("STRAVA_CLIENT_SECRET", "test_secret");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.strava_client_id, "test_id");
        assert_eq!(config.strava_client_secret, "test_secret");
        assert_eq!(config.port, 8080);
    }
}
