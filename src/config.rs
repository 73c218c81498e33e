use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_URL: &str = "ws://localhost:3000/ws";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Bounded exponential backoff applied after an unexpected channel loss
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Attempts made before giving up and staying disconnected
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait before the given attempt (1-indexed), doubling each time
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Policy that never reconnects automatically
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }
}

/// Client-side configuration for the realtime channel
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Channel endpoint, used as given
    pub base_url: String,
    /// Bearer credential attached to the upgrade request
    pub auth_token: Option<String>,
    pub reconnect: ReconnectPolicy,
    /// Upper bound on a single open attempt
    pub connect_timeout: Duration,
    /// Upper bound on one handler run before dispatch moves on
    pub handler_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            auth_token: None,
            reconnect: ReconnectPolicy::default(),
            connect_timeout: Duration::from_secs(10),
            handler_timeout: Duration::from_secs(30),
        }
    }
}

impl RealtimeConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Read configuration from `CARELINK_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = ReconnectPolicy::default();
        let millis = |key: &str, default: Duration| {
            parse_or(&lookup, key, default.as_millis() as u64)
        };

        Self {
            base_url: lookup("CARELINK_URL").unwrap_or_else(|| DEFAULT_URL.to_string()),
            auth_token: lookup("CARELINK_AUTH_TOKEN").filter(|t| !t.is_empty()),
            reconnect: ReconnectPolicy {
                max_attempts: parse_or(&lookup, "CARELINK_RECONNECT_ATTEMPTS", defaults.max_attempts),
                initial_delay: Duration::from_millis(millis(
                    "CARELINK_RECONNECT_DELAY_MS",
                    defaults.initial_delay,
                )),
                max_delay: Duration::from_millis(millis(
                    "CARELINK_RECONNECT_MAX_DELAY_MS",
                    defaults.max_delay,
                )),
            },
            connect_timeout: Duration::from_millis(millis(
                "CARELINK_CONNECT_TIMEOUT_MS",
                Duration::from_secs(10),
            )),
            handler_timeout: Duration::from_millis(millis(
                "CARELINK_HANDLER_TIMEOUT_MS",
                Duration::from_secs(30),
            )),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = timeout;
        self
    }
}

/// Configuration for the relay server binary
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
}

impl RelayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fallback = SocketAddr::from(([0, 0, 0, 0], 3000));
        Self {
            bind_addr: lookup("CARELINK_BIND_ADDR")
                .and_then(|s| s.parse().ok())
                .or_else(|| DEFAULT_BIND_ADDR.parse().ok())
                .unwrap_or(fallback),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.parse().ok()).unwrap_or(default)
}
