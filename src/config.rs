use base64::{engine::general_purpose, Engine as _};
use std::env;
use std::net::SocketAddr;
use zeroize::Zeroizing;

/// Minimum length of the decoded session secret.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Upper bound for TTLs and the sweep interval (one year).
pub const MAX_DURATION_SECS: u64 = 31_536_000;

#[derive(Clone)]
pub struct Config {
    // Session signing key (decoded from SESSION_SECRET)
    pub session_secret: Zeroizing<Vec<u8>>,

    // Server
    pub bind_addr: SocketAddr,
    pub production: bool,

    // Limits
    pub max_body_bytes: usize,

    // TTLs (in seconds)
    pub nonce_ttl_secs: u64,
    pub session_ttl_secs: u64,
    pub ticket_ttl_secs: u64,

    // Background maintenance
    pub nonce_sweep_interval_secs: u64,

    // Rate limiting
    pub rate_limit_auth_per_min: u32,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("session_secret", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("production", &self.production)
            .field("max_body_bytes", &self.max_body_bytes)
            .field("nonce_ttl_secs", &self.nonce_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("ticket_ttl_secs", &self.ticket_ttl_secs)
            .field("nonce_sweep_interval_secs", &self.nonce_sweep_interval_secs)
            .field("rate_limit_auth_per_min", &self.rate_limit_auth_per_min)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let secret_b64 = Zeroizing::new(
            env::var("SESSION_SECRET")
                .map_err(|_| ConfigError::MissingVar("SESSION_SECRET".to_string()))?,
        );
        let session_secret = decode_session_secret(&secret_b64)?;

        // Server
        let bind_addr_str = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr = bind_addr_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::ParseError("BIND_ADDR".to_string(), e.to_string()))?;

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let production = match app_env.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => true,
            "development" | "dev" | "test" => false,
            other => {
                return Err(ConfigError::InvalidValue(
                    "APP_ENV".to_string(),
                    format!("expected production or development, got {}", other),
                ))
            }
        };

        let max_body_bytes = parse_env_or_default("MAX_BODY_BYTES", 16_384)?;

        // TTLs
        let nonce_ttl_secs = parse_env_or_default("NONCE_TTL_SECS", 300)?;
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", 604_800)?;
        let ticket_ttl_secs = parse_env_or_default("TICKET_TTL_SECS", 120)?;
        let nonce_sweep_interval_secs = parse_env_or_default("NONCE_SWEEP_INTERVAL_SECS", 60)?;
        for (key, value) in [
            ("NONCE_TTL_SECS", nonce_ttl_secs),
            ("SESSION_TTL_SECS", session_ttl_secs),
            ("TICKET_TTL_SECS", ticket_ttl_secs),
            ("NONCE_SWEEP_INTERVAL_SECS", nonce_sweep_interval_secs),
        ] {
            check_duration_secs(key, value)?;
        }

        // Rate limiting
        let rate_limit_auth_per_min = parse_env_or_default("RATE_LIMIT_AUTH_PER_MIN", 30)?;
        if rate_limit_auth_per_min == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_LIMIT_AUTH_PER_MIN".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            session_secret,
            bind_addr,
            production,
            max_body_bytes,
            nonce_ttl_secs,
            session_ttl_secs,
            ticket_ttl_secs,
            nonce_sweep_interval_secs,
            rate_limit_auth_per_min,
        })
    }

    /// Configuration with default values and the given secret.
    ///
    /// Used by tests and embedders that build the router without env vars.
    pub fn with_secret(secret: &[u8]) -> Self {
        Config {
            session_secret: Zeroizing::new(secret.to_vec()),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            production: false,
            max_body_bytes: 16_384,
            nonce_ttl_secs: 300,
            session_ttl_secs: 604_800,
            ticket_ttl_secs: 120,
            nonce_sweep_interval_secs: 60,
            rate_limit_auth_per_min: 30,
        }
    }
}

/// Decode SESSION_SECRET (standard base64, at least 32 bytes once decoded).
fn decode_session_secret(secret_b64: &str) -> Result<Zeroizing<Vec<u8>>, ConfigError> {
    if secret_b64.is_empty() {
        return Err(ConfigError::InvalidValue(
            "SESSION_SECRET".to_string(),
            "cannot be empty".to_string(),
        ));
    }

    let bytes = Zeroizing::new(general_purpose::STANDARD.decode(secret_b64).map_err(|e| {
        ConfigError::InvalidValue(
            "SESSION_SECRET".to_string(),
            format!("invalid base64: {}", e),
        )
    })?);

    if bytes.len() < MIN_SESSION_SECRET_BYTES {
        return Err(ConfigError::InvalidValue(
            "SESSION_SECRET".to_string(),
            format!(
                "expected at least {} bytes, got {}",
                MIN_SESSION_SECRET_BYTES,
                bytes.len()
            ),
        ));
    }

    Ok(bytes)
}

/// Durations must be non-zero and at most [`MAX_DURATION_SECS`].
fn check_duration_secs(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    if value > MAX_DURATION_SECS {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be at most {} seconds, got {}", MAX_DURATION_SECS, value),
        ));
    }
    Ok(())
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Tests modify global env vars, so they run serially.
    static TEST_MUTEX: Mutex<()> = Mutex::new(());

    fn lock_test() -> std::sync::MutexGuard<'static, ()> {
        TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn clear_test_env() {
        env::remove_var("SESSION_SECRET");
        env::remove_var("BIND_ADDR");
        env::remove_var("APP_ENV");
        env::remove_var("MAX_BODY_BYTES");
        env::remove_var("NONCE_TTL_SECS");
        env::remove_var("SESSION_TTL_SECS");
        env::remove_var("TICKET_TTL_SECS");
        env::remove_var("NONCE_SWEEP_INTERVAL_SECS");
        env::remove_var("RATE_LIMIT_AUTH_PER_MIN");
    }

    // 32 zero bytes
    const TEST_SECRET_B64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=";

    #[test]
    fn test_parse_env_or_default() {
        let _guard = lock_test();

        env::set_var("MINIFUND_TEST_U64", "12345");
        let result: Result<u64, ConfigError> = parse_env_or_default("MINIFUND_TEST_U64", 100);
        assert_eq!(result.unwrap(), 12345);

        env::remove_var("MINIFUND_TEST_U64");
        let result: Result<u64, ConfigError> = parse_env_or_default("MINIFUND_TEST_U64", 100);
        assert_eq!(result.unwrap(), 100);
    }

    #[test]
    fn test_empty_session_secret() {
        let _guard = lock_test();
        clear_test_env();

        // Empty rather than unset so a local .env cannot fill it back in.
        env::set_var("SESSION_SECRET", "");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SESSION_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_session_secret_base64() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", "not-valid-base64!!!");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SESSION_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_short_session_secret() {
        let _guard = lock_test();
        clear_test_env();

        // 16 bytes
        env::set_var("SESSION_SECRET", "AAAAAAAAAAAAAAAAAAAAAA==");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SESSION_SECRET"
        ));

        clear_test_env();
    }

    #[test]
    fn test_invalid_socket_addr() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("BIND_ADDR", "invalid_address");

        let result = Config::from_env();
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_, _)));

        clear_test_env();
    }

    #[test]
    fn test_invalid_app_env() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("APP_ENV", "staging-ish");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "APP_ENV"
        ));

        clear_test_env();
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("NONCE_TTL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "NONCE_TTL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_zero_sweep_interval_rejected() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("NONCE_SWEEP_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "NONCE_SWEEP_INTERVAL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_oversized_ttl_rejected() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("SESSION_TTL_SECS", "100000000000000000");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "SESSION_TTL_SECS"
        ));

        clear_test_env();
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("RATE_LIMIT_AUTH_PER_MIN", "0");

        let result = Config::from_env();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InvalidValue(ref s, _) if s == "RATE_LIMIT_AUTH_PER_MIN"
        ));

        clear_test_env();
    }

    #[test]
    fn test_production_flag() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("APP_ENV", "Production");

        let config = Config::from_env().unwrap();
        assert!(config.production);

        clear_test_env();
    }

    #[test]
    fn test_config_defaults() {
        let _guard = lock_test();
        clear_test_env();

        env::set_var("SESSION_SECRET", TEST_SECRET_B64);
        env::set_var("BIND_ADDR", "0.0.0.0:3000");
        env::set_var("APP_ENV", "development");

        let config = Config::from_env().unwrap();

        assert_eq!(config.session_secret.len(), 32);
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:3000");
        assert!(!config.production);
        assert_eq!(config.max_body_bytes, 16_384);
        assert_eq!(config.nonce_ttl_secs, 300);
        assert_eq!(config.session_ttl_secs, 604_800);
        assert_eq!(config.ticket_ttl_secs, 120);
        assert_eq!(config.nonce_sweep_interval_secs, 60);
        assert_eq!(config.rate_limit_auth_per_min, 30);

        clear_test_env();
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = Config::with_secret(&[7u8; 32]);
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("7, 7, 7"));
    }
}
