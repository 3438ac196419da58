//! Retry logic for establishing remote connections.
//!
//! Only failures the caller classifies as transient are retried; anything
//! else aborts on the spot. Waits between attempts grow exponentially.

use crate::config::{TransportConfig, TransportSettings, DEFAULT_MAX_ATTEMPTS};
use log::{debug, warn};
use std::fmt;
use std::thread;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,
    /// Multiplier for exponential backoff (typically 2.0)
    pub backoff_multiplier: f64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay_ms: 500,
            backoff_multiplier: 2.0,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32, initial_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            initial_delay_ms,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &TransportSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            initial_delay_ms: settings.retry_delay_ms,
            backoff_multiplier: 2.0,
            max_delay_ms: settings.max_retry_delay_ms,
        }
    }

    /// Calculates the delay before retry number `attempt` (0-based).
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = (self.initial_delay_ms as f64
            * self.backoff_multiplier.powi(attempt as i32))
        .min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}

/// Why a retried operation gave up.
#[derive(Debug)]
pub enum RetryError<E> {
    /// A failure that is not worth retrying.
    Fatal(E),
    /// Every attempt failed transiently; carries the last failure.
    Exhausted { attempts: u32, last: E },
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Fatal(e) => write!(f, "{}", e),
            RetryError::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
        }
    }
}

/// Runs `operation` until it succeeds, fails with an error `is_transient`
/// rejects, or the attempt budget is spent.
///
/// `operation` receives the 0-based attempt number.
pub fn retry_transient<T, E, F, P>(
    config: &RetryConfig,
    mut operation: F,
    is_transient: P,
    operation_name: &str,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Result<T, E>,
    P: Fn(&E) -> bool,
    E: fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt) {
            Ok(result) => {
                if attempt > 0 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if !is_transient(&e) => {
                debug!("{} failed with a non-retryable error: {}", operation_name, e);
                return Err(RetryError::Fatal(e));
            }
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }

                let delay = config.calculate_delay(attempt - 1);
                warn!(
                    "{} failed with {}, retrying (attempt {}/{}) after {:?}",
                    operation_name,
                    e,
                    attempt + 1,
                    max_attempts,
                    delay
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }
}

/// Provides helpful diagnostic information for SSH connection failures.
pub fn diagnose_connection_error(error: &str, config: &TransportConfig) -> String {
    let error_str = error.to_lowercase();

    let mut suggestions = Vec::new();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("no route to host")
        || error_str.contains("resolve")
    {
        suggestions.push(format!("• Verify the host '{}' is reachable", config.server));
        suggestions.push(format!(
            "• Check if SSH is running on port {} (try: sftp -P {} {}@{})",
            config.port, config.port, config.user, config.server
        ));
        suggestions.push("• Verify your network connection and firewall settings".to_string());
    }

    if error_str.contains("authentication") || error_str.contains("password") {
        suggestions.push(format!(
            "• Check the password for '{}' (SFTP_PASSWORD or the sftp section of the config)",
            config.user
        ));
    }

    if error_str.contains("banner") {
        suggestions.push(
            "• The server dropped the connection during negotiation; it may be rate limiting new sessions"
                .to_string(),
        );
    }

    if suggestions.is_empty() {
        suggestions.push("• Verify the remote host is accessible".to_string());
        suggestions.push(format!(
            "• Test the connection manually: sftp -P {} {}@{}",
            config.port, config.user, config.server
        ));
    }

    format!(
        "SFTP connection to {} failed: {}\n\nTroubleshooting suggestions:\n{}",
        config.connection_string(),
        error,
        suggestions.join("\n")
    )
}
