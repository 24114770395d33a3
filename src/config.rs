// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Names a TOML file with base values; environment variables override it.
pub const ENV_CONFIG_PATH: &str = "MONITOR_CONFIG_PATH";

pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;
pub const DEFAULT_STATE_PATH: &str = "state/last_seen.json";
pub const DEFAULT_INSTAGRAM_API_URL: &str =
    "https://i.instagram.com/api/v1/users/web_profile_info/";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_NOTIFY_MAX_RETRIES: u8 = 2;
/// Upper bound for `NOTIFY_MAX_RETRIES`; each retry may wait up to 30 s.
pub const MAX_NOTIFY_RETRIES: u8 = 10;
const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// How a profile snapshot is reduced to a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// Id of the most recent post.
    #[default]
    LatestPost,
    /// SHA-256 over the post count and the recent post ids.
    Digest,
}

impl FromStr for FingerprintMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "latest_post" | "latest-post" | "latest" => Ok(Self::LatestPost),
            "digest" => Ok(Self::Digest),
            other => bail!("unknown fingerprint mode: {other}"),
        }
    }
}

/// Optional file layer. Every key may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub telegram_token: Option<String>,
    pub chat_id: Option<String>,
    pub instagram_username: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub timezone: Option<String>,
    pub state_path: Option<String>,
    pub fingerprint_mode: Option<String>,
    pub instagram_api_url: Option<String>,
    pub telegram_api_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub notify_max_retries: Option<u8>,
    pub shutdown_grace_secs: Option<u64>,
    pub heartbeat: Option<bool>,
    pub dry_run: Option<bool>,
    pub status_addr: Option<String>,
}

impl FileConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing monitor config toml")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }
}

/// Fully resolved runtime configuration, handed to each component at construction.
#[derive(Clone)]
pub struct MonitorConfig {
    pub telegram_token: String,
    pub chat_id: String,
    pub username: String,
    pub poll_interval: Duration,
    pub timezone: FixedOffset,
    pub state_path: PathBuf,
    pub fingerprint_mode: FingerprintMode,
    pub instagram_api_url: String,
    pub telegram_api_url: String,
    pub http_timeout: Duration,
    pub notify_max_retries: u8,
    pub shutdown_grace: Duration,
    pub heartbeat: bool,
    pub dry_run: bool,
    pub status_addr: Option<SocketAddr>,
}

// Hand-written so the bot token never ends up in logs.
impl fmt::Debug for MonitorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorConfig")
            .field("telegram_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("username", &self.username)
            .field("poll_interval", &self.poll_interval)
            .field("timezone", &self.timezone)
            .field("state_path", &self.state_path)
            .field("fingerprint_mode", &self.fingerprint_mode)
            .field("instagram_api_url", &self.instagram_api_url)
            .field("telegram_api_url", &self.telegram_api_url)
            .field("http_timeout", &self.http_timeout)
            .field("notify_max_retries", &self.notify_max_retries)
            .field("shutdown_grace", &self.shutdown_grace)
            .field("heartbeat", &self.heartbeat)
            .field("dry_run", &self.dry_run)
            .field("status_addr", &self.status_addr)
            .finish()
    }
}

impl MonitorConfig {
    /// Load using the process environment:
    /// 1) TOML file at $MONITOR_CONFIG_PATH (if set)
    /// 2) environment variables on top
    pub fn from_env() -> Result<Self> {
        let base = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => FileConfig::load(Path::new(&p))?,
            Err(_) => FileConfig::default(),
        };
        Self::resolve(base, |key| std::env::var(key).ok())
    }

    /// Merge `base` with values from `lookup` (environment-style keys) and validate.
    pub fn resolve<F>(base: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let dry_run = match get("MONITOR_DRY_RUN") {
            Some(v) => parse_bool(&v).context("MONITOR_DRY_RUN")?,
            None => base.dry_run.unwrap_or(false),
        };
        let heartbeat = match get("MONITOR_HEARTBEAT") {
            Some(v) => parse_bool(&v).context("MONITOR_HEARTBEAT")?,
            None => base.heartbeat.unwrap_or(false),
        };

        let telegram_token = get("TELEGRAM_TOKEN")
            .or(base.telegram_token)
            .unwrap_or_default();
        if telegram_token.is_empty() && !dry_run {
            bail!("TELEGRAM_TOKEN missing (set MONITOR_DRY_RUN=true to run without one)");
        }
        let chat_id = get("CHAT_ID")
            .or(base.chat_id)
            .ok_or_else(|| anyhow!("CHAT_ID missing"))?;
        let username = get("INSTAGRAM_USERNAME")
            .or(base.instagram_username)
            .ok_or_else(|| anyhow!("INSTAGRAM_USERNAME missing"))?;

        let poll_interval_secs = match get("POLL_INTERVAL_SECS") {
            Some(v) => v.parse::<u64>().context("POLL_INTERVAL_SECS")?,
            None => base.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        if poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        let timezone = parse_timezone(
            &get("MONITOR_TIMEZONE")
                .or(base.timezone)
                .unwrap_or_else(|| "UTC".to_string()),
        )?;

        let state_path = PathBuf::from(
            get("STATE_PATH")
                .or(base.state_path)
                .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string()),
        );

        let fingerprint_mode = match get("FINGERPRINT_MODE").or(base.fingerprint_mode) {
            Some(v) => v.parse()?,
            None => FingerprintMode::default(),
        };

        let instagram_api_url = get("INSTAGRAM_API_URL")
            .or(base.instagram_api_url)
            .unwrap_or_else(|| DEFAULT_INSTAGRAM_API_URL.to_string());
        let telegram_api_url = get("TELEGRAM_API_URL")
            .or(base.telegram_api_url)
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let http_timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => v.parse::<u64>().context("HTTP_TIMEOUT_SECS")?,
            None => base.http_timeout_secs.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        };
        let notify_max_retries = match get("NOTIFY_MAX_RETRIES") {
            Some(v) => v.parse::<u8>().context("NOTIFY_MAX_RETRIES")?,
            None => base.notify_max_retries.unwrap_or(DEFAULT_NOTIFY_MAX_RETRIES),
        };
        if notify_max_retries > MAX_NOTIFY_RETRIES {
            bail!("NOTIFY_MAX_RETRIES must be at most {MAX_NOTIFY_RETRIES}, got {notify_max_retries}");
        }
        let shutdown_grace_secs = match get("SHUTDOWN_GRACE_SECS") {
            Some(v) => v.parse::<u64>().context("SHUTDOWN_GRACE_SECS")?,
            None => base.shutdown_grace_secs.unwrap_or(DEFAULT_SHUTDOWN_GRACE_SECS),
        };

        let status_addr = match get("STATUS_ADDR").or(base.status_addr) {
            Some(v) => Some(
                v.parse::<SocketAddr>()
                    .with_context(|| format!("STATUS_ADDR is not a socket address: {v}"))?,
            ),
            None => None,
        };

        Ok(Self {
            telegram_token,
            chat_id,
            username,
            poll_interval: Duration::from_secs(poll_interval_secs),
            timezone,
            state_path,
            fingerprint_mode,
            instagram_api_url,
            telegram_api_url,
            http_timeout: Duration::from_secs(http_timeout_secs.max(1)),
            notify_max_retries,
            shutdown_grace: Duration::from_secs(shutdown_grace_secs),
            heartbeat,
            dry_run,
            status_addr,
        })
    }
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: {other}"),
    }
}

/// Accepts `UTC` (also `Z`, `GMT`) or a fixed offset: `+05:30`, `-0800`, `+02`.
pub fn parse_timezone(s: &str) -> Result<FixedOffset> {
    let t = s.trim();
    if matches!(t.to_ascii_uppercase().as_str(), "UTC" | "Z" | "GMT") {
        return FixedOffset::east_opt(0).ok_or_else(|| anyhow!("utc offset"));
    }

    let (sign, rest) = match t.chars().next() {
        Some('+') => (1, &t[1..]),
        Some('-') => (-1, &t[1..]),
        _ => bail!("unsupported timezone {t:?}: use UTC or an offset like +05:30"),
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) || !matches!(digits.len(), 2 | 4) {
        bail!("malformed timezone offset {t:?}");
    }
    let hours: i32 = digits[..2].parse()?;
    let minutes: i32 = if digits.len() == 4 { digits[2..].parse()? } else { 0 };
    if hours > 14 || minutes > 59 {
        bail!("timezone offset out of range: {t:?}");
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
        .ok_or_else(|| anyhow!("timezone offset out of range: {t:?}"))
}
