use std::env;
use std::fmt;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for a host embedding the check engine.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub environment: AppEnvironment,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl CheckConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let defaults = EngineConfig::default();
        let poll_interval = match env::var("ADDRESS_CHECK_POLL_INTERVAL_MS") {
            Ok(raw) => {
                Duration::from_millis(parse_millis("ADDRESS_CHECK_POLL_INTERVAL_MS", &raw)?)
            }
            Err(_) => defaults.poll_interval,
        };
        let turn_timeout = match env::var("ADDRESS_CHECK_TURN_TIMEOUT_MS") {
            Ok(raw) => match parse_millis("ADDRESS_CHECK_TURN_TIMEOUT_MS", &raw)? {
                0 => None,
                millis => Some(Duration::from_millis(millis)),
            },
            Err(_) => defaults.turn_timeout,
        };
        let auto_correction = match env::var("ADDRESS_CHECK_AUTO_CORRECTION") {
            Ok(raw) => parse_flag("ADDRESS_CHECK_AUTO_CORRECTION", &raw)?,
            Err(_) => defaults.auto_correction,
        };

        let engine = EngineConfig {
            poll_interval,
            turn_timeout,
            auto_correction,
        };
        engine.validate()?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            engine,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn parse_millis(variable: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidNumber {
            variable,
            value: raw.to_string(),
        })
}

fn parse_flag(variable: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            variable,
            value: raw.to_string(),
        }),
    }
}

/// Settings for the check engine itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Upper bound between two queue-turn checks.
    pub poll_interval: Duration,
    /// `None` waits forever for a queue turn.
    pub turn_timeout: Option<Duration>,
    pub auto_correction: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            turn_timeout: Some(Duration::from_secs(30)),
            auto_correction: true,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if let Some(timeout) = self.turn_timeout {
            if timeout < self.poll_interval {
                return Err(ConfigError::TimeoutBelowPollInterval {
                    timeout,
                    poll_interval: self.poll_interval,
                });
            }
        }
        Ok(())
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber {
        variable: &'static str,
        value: String,
    },
    InvalidFlag {
        variable: &'static str,
        value: String,
    },
    ZeroPollInterval,
    TimeoutBelowPollInterval {
        timeout: Duration,
        poll_interval: Duration,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a whole number of milliseconds, got '{value}'")
            }
            ConfigError::InvalidFlag { variable, value } => {
                write!(f, "{variable} must be true or false, got '{value}'")
            }
            ConfigError::ZeroPollInterval => write!(f, "queue poll interval must be positive"),
            ConfigError::TimeoutBelowPollInterval {
                timeout,
                poll_interval,
            } => write!(
                f,
                "queue turn timeout {timeout:?} is shorter than the poll interval {poll_interval:?}"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
