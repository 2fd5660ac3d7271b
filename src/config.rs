use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "heartbeat.yaml";

const ACCEPTABLE_HEARTBEAT_DELAY: &str = "acceptable-heartbeat-delay";
const CHECK_INTERVAL: &str = "check-interval";
const ADDRESS: &str = "address";
const NANNY_RESTART_URL: &str = "nanny-restart-url";
const NANNY_AUTH: &str = "nanny-auth";
const WEBHOOKER_URL: &str = "webhooker-url";
const SERVER_NAME: &str = "server-name";
const VERBOSE: &str = "verbose";

const KEYS: [&str; 8] = [
    ACCEPTABLE_HEARTBEAT_DELAY,
    CHECK_INTERVAL,
    ADDRESS,
    NANNY_RESTART_URL,
    NANNY_AUTH,
    WEBHOOKER_URL,
    SERVER_NAME,
    VERBOSE,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid duration for {key}: {value:?}")]
    InvalidDuration { key: &'static str, value: String },
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("invalid boolean for {key}: {value:?}")]
    InvalidBool { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchdogConfig {
    pub acceptable_heartbeat_delay: Duration,
    pub check_interval: Duration,
    pub address: SocketAddr,
    pub nanny_restart_url: Option<String>,
    pub nanny_auth: Option<String>,
    pub webhooker_url: Option<String>,
    pub server_name: String,
    pub verbose: bool,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            acceptable_heartbeat_delay: Duration::from_secs(10),
            check_interval: Duration::from_secs(10),
            address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            nanny_restart_url: None,
            nanny_auth: None,
            webhooker_url: None,
            server_name: String::new(),
            verbose: false,
        }
    }
}

impl WatchdogConfig {
    /// Defaults, then `heartbeat.yaml` in the working directory, then the
    /// environment.
    pub fn load() -> Self {
        Self::load_from(Path::new(CONFIG_FILE), |key| std::env::var(key).ok())
    }

    /// Never fails: every problem is logged and the affected value keeps its
    /// default.
    pub fn load_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut values = match read_file(path) {
            Ok(values) => values,
            Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config file at {}, using defaults", path.display());
                BTreeMap::new()
            }
            Err(e) => {
                warn!("Ignoring config file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        for key in KEYS {
            if let Some(value) = env(&env_key(key)) {
                values.insert(key.to_string(), value);
            }
        }

        Self::from_values(&values)
    }

    fn from_values(values: &BTreeMap<String, String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| values.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        for (key, slot) in [
            (ACCEPTABLE_HEARTBEAT_DELAY, &mut config.acceptable_heartbeat_delay),
            (CHECK_INTERVAL, &mut config.check_interval),
        ] {
            if let Some(raw) = get(key) {
                match parse_duration(raw) {
                    Some(d) if !d.is_zero() => *slot = d,
                    _ => warn!(
                        "{}, keeping default {:?}",
                        ConfigError::InvalidDuration { key, value: raw.to_string() },
                        slot
                    ),
                }
            }
        }

        if let Some(raw) = get(ADDRESS) {
            match parse_address(raw) {
                Ok(addr) => config.address = addr,
                Err(e) => warn!("{}, keeping default {}", e, config.address),
            }
        }

        if let Some(raw) = get(VERBOSE) {
            match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => config.verbose = true,
                "false" | "0" | "no" => config.verbose = false,
                _ => warn!(
                    "{}, keeping default",
                    ConfigError::InvalidBool { key: VERBOSE, value: raw.to_string() }
                ),
            }
        }

        config.nanny_restart_url = get(NANNY_RESTART_URL).map(str::to_string);
        config.nanny_auth = get(NANNY_AUTH).map(str::to_string);
        config.webhooker_url = get(WEBHOOKER_URL).map(str::to_string);
        if let Some(name) = get(SERVER_NAME) {
            config.server_name = name.to_string();
        }

        config
    }
}

fn read_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let raw: Option<BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(&contents)?;

    let mut values = BTreeMap::new();
    for (key, value) in raw.unwrap_or_default() {
        let value = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Null => continue,
            other => {
                warn!("Ignoring config key {}: unsupported value {:?}", key, other);
                continue;
            }
        };
        if !KEYS.contains(&key.as_str()) {
            debug!("Ignoring unknown config key {}", key);
        }
        values.insert(key, value);
    }
    Ok(values)
}

/// `check-interval` → `CHECK_INTERVAL`.
fn env_key(key: &str) -> String {
    key.replace('-', "_").to_ascii_uppercase()
}

/// Parse `300us`, `500ms`, `10s`, `2m`, `1h`, compounds like `1m30s` or
/// `1m 30s`, and a single fractional value like `1.5s`.
/// A plain number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    if let Ok(d) = humantime::parse_duration(s) {
        return Some(d);
    }

    // humantime only takes whole numbers
    let split = s.find(|c: char| !(c.is_ascii_digit() || c == '.'))?;
    let (amount, unit) = s.split_at(split);
    let amount: f64 = amount.parse().ok()?;
    let unit = humantime::parse_duration(&format!("1{}", unit.trim())).ok()?;
    if !amount.is_finite() || amount < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(unit.as_secs_f64() * amount).ok()
}

/// `host:port`, or `:port` for every interface.
fn parse_address(raw: &str) -> Result<SocketAddr, ConfigError> {
    let full = if raw.starts_with(':') {
        format!("0.0.0.0{}", raw)
    } else {
        raw.to_string()
    };
    full.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ConfigError::InvalidAddress(raw.to_string()))
}
