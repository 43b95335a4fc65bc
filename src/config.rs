use std::time::Duration;

use crate::errors::ConfigError;

/// Default sandbox provider API endpoint (Daytona).
const DEFAULT_API_URL: &str = "https://app.daytona.io/api";

/// Port the generated report server listens on inside the sandbox. The
/// provider's preview URL is requested for this same port.
pub const DEFAULT_REPORT_PORT: u16 = 3000;

/// Runtime configuration for Tabula.
///
/// Read once at startup and passed explicitly to the pipeline and the sandbox
/// client — there is no ambient global state. The provider API key is the one
/// required value; its absence is a startup-time fatal error, not a per-run
/// error.
#[derive(Debug, Clone)]
pub struct Config {
    /// Sandbox provider API key (`SANDBOX_API_KEY`).
    pub api_key: String,
    /// Sandbox provider base URL (`SANDBOX_API_URL`).
    pub api_url: String,
    /// Fixed port the report is served on inside the sandbox.
    pub report_port: u16,
    /// Timeout for data fetches and individual provider calls.
    pub http_timeout: Duration,
    /// Bound on the readiness wait for the deployed report, in seconds.
    pub ready_wait_secs: u64,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// `.env` loading (dotenvy) happens in `main` before this is called.
    pub fn from_env(report_port: Option<u16>) -> Result<Self, ConfigError> {
        Self::from_parts(
            std::env::var("SANDBOX_API_KEY").ok(),
            std::env::var("SANDBOX_API_URL").ok(),
            std::env::var("TABULA_HTTP_TIMEOUT_SECS").ok(),
            report_port,
        )
    }

    /// Build a config from raw optional values. Separated from `from_env` so
    /// tests do not have to mutate process-global environment variables.
    pub fn from_parts(
        api_key: Option<String>,
        api_url: Option<String>,
        http_timeout_secs: Option<String>,
        report_port: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let api_key = match api_key {
            Some(key) if !key.trim().is_empty() => key,
            _ => return Err(ConfigError::MissingCredential),
        };

        let api_url = api_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = api_url.trim_end_matches('/').to_string();

        let http_timeout = match http_timeout_secs {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    var: "TABULA_HTTP_TIMEOUT_SECS".to_string(),
                    value: raw,
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(30),
        };

        Ok(Self {
            api_key,
            api_url,
            report_port: report_port.unwrap_or(DEFAULT_REPORT_PORT),
            http_timeout,
            ready_wait_secs: 45,
        })
    }
}
