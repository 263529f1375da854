use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::{errors::Error, Result};

/// Typed, immutable configuration shared by every component as `Arc<Config>`.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_token: String,
    pub users: Vec<String>,
    pub message_limit: usize,
    pub send_message_retry_count: u32,

    // Upstream services
    pub alertmanager_url: String,
    pub prometheus_url: String,
    pub api_timeout: Duration,

    // Templates
    pub webhook_alerts_template_path: Option<PathBuf>,
    pub gettable_alerts_template_path: Option<PathBuf>,
    pub silences_template_path: Option<PathBuf>,
    pub time_format: String,
    pub time_zone: Tz,

    // Menus / silences
    pub keyboard_rows: usize,
    pub button_prefix_ok: String,
    pub button_prefix_fail: String,
    pub session_ttl: Duration,
    pub silence_duration: Duration,

    // Webhook listener
    pub bind_address: String,
    pub bind_port: u16,
    pub disable_http: bool,

    // Logging
    pub logfile_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            users: Vec::new(),
            message_limit: 4096,
            send_message_retry_count: 3,
            alertmanager_url: "http://localhost:9093".to_string(),
            prometheus_url: "http://localhost:9090".to_string(),
            api_timeout: Duration::from_secs(10),
            webhook_alerts_template_path: None,
            gettable_alerts_template_path: None,
            silences_template_path: None,
            time_format: "%d/%m/%Y %H:%M:%S".to_string(),
            time_zone: chrono_tz::Europe::Moscow,
            keyboard_rows: 2,
            button_prefix_ok: String::new(),
            button_prefix_fail: String::new(),
            session_ttl: Duration::from_secs(24 * 3600),
            silence_duration: Duration::from_secs(3600),
            bind_address: "0.0.0.0".to_string(),
            bind_port: 8088,
            disable_http: false,
            logfile_path: None,
        }
    }
}

/// Partially specified configuration, as read from one source.
///
/// Field names double as YAML keys.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawConfig {
    telegram_token: Option<String>,
    users: Option<Vec<String>>,
    message_limit: Option<usize>,
    send_message_retry_count: Option<u32>,
    alertmanager_url: Option<String>,
    prometheus_url: Option<String>,
    api_timeout: Option<String>,
    webhook_alerts_template_path: Option<PathBuf>,
    gettable_alerts_template_path: Option<PathBuf>,
    silences_template_path: Option<PathBuf>,
    time_format: Option<String>,
    time_zone: Option<String>,
    keyboard_rows: Option<usize>,
    button_prefix_ok: Option<String>,
    button_prefix_fail: Option<String>,
    session_ttl: Option<String>,
    silence_duration: Option<String>,
    bind_address: Option<String>,
    bind_port: Option<u16>,
    disable_http: Option<bool>,
    logfile_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration: defaults, then environment (and `.env`), then the
    /// optional YAML file, each layer overriding the previous one.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let mut raw = RawConfig::from_env();
        if let Some(path) = config_file {
            let text = fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("error opening config file {}: {e}", path.display()))
            })?;
            let file: RawConfig = serde_yaml::from_str(&text).map_err(|e| {
                Error::Config(format!("error parsing config file {}: {e}", path.display()))
            })?;
            raw.overlay(file);
        }

        let cfg = raw.into_config()?;
        if cfg.telegram_token.trim().is_empty() {
            return Err(Error::Config(
                "telegram token is not set (TELEGRAM_TOKEN or telegram_token)".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }
}

impl RawConfig {
    fn from_env() -> Self {
        Self {
            telegram_token: env_str("TELEGRAM_TOKEN"),
            users: env_str("USERS").map(|v| parse_csv(&v)),
            message_limit: env_parse("TELEGRAM_MESSAGE_LIMIT"),
            send_message_retry_count: env_parse("SEND_MESSAGE_RETRY_COUNT"),
            alertmanager_url: env_str("ALERTMANAGER_URL"),
            prometheus_url: env_str("PROMETHEUS_URL"),
            api_timeout: env_str("API_TIMEOUT"),
            webhook_alerts_template_path: env_path("WEBHOOK_ALERTS_TEMPLATE_PATH"),
            gettable_alerts_template_path: env_path("GETTABLE_ALERTS_TEMPLATE_PATH"),
            silences_template_path: env_path("SILENCES_TEMPLATE_PATH"),
            time_format: env_str("TIMEFORMAT"),
            time_zone: env_str("TIMEZONE"),
            keyboard_rows: env_parse("KEYBOARD_ROWS"),
            button_prefix_ok: env_str("BUTTON_PREFIX_OK"),
            button_prefix_fail: env_str("BUTTON_PREFIX_FAIL"),
            session_ttl: env_str("SESSION_TTL"),
            silence_duration: env_str("SILENCE_DURATION"),
            bind_address: env_str("BIND_ADDRESS"),
            bind_port: env_parse("BIND_PORT"),
            disable_http: env_bool("DISABLE_HTTP"),
            logfile_path: env_path("LOGFILE_PATH"),
        }
    }

    /// Values set in `other` win.
    fn overlay(&mut self, other: RawConfig) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $(if other.$field.is_some() { self.$field = other.$field; })*
            };
        }
        take!(
            telegram_token,
            users,
            message_limit,
            send_message_retry_count,
            alertmanager_url,
            prometheus_url,
            api_timeout,
            webhook_alerts_template_path,
            gettable_alerts_template_path,
            silences_template_path,
            time_format,
            time_zone,
            keyboard_rows,
            button_prefix_ok,
            button_prefix_fail,
            session_ttl,
            silence_duration,
            bind_address,
            bind_port,
            disable_http,
            logfile_path,
        );
    }

    fn into_config(self) -> Result<Config> {
        let d = Config::default();

        let time_zone = match self.time_zone.and_then(non_empty) {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| Error::Config(format!("unknown time zone {name:?}: {e}")))?,
            None => d.time_zone,
        };

        Ok(Config {
            telegram_token: self.telegram_token.unwrap_or(d.telegram_token),
            users: self.users.unwrap_or(d.users),
            message_limit: self.message_limit.unwrap_or(d.message_limit).max(1),
            send_message_retry_count: self
                .send_message_retry_count
                .unwrap_or(d.send_message_retry_count)
                .max(1),
            alertmanager_url: self.alertmanager_url.unwrap_or(d.alertmanager_url),
            prometheus_url: self.prometheus_url.unwrap_or(d.prometheus_url),
            api_timeout: duration_or("api_timeout", self.api_timeout, d.api_timeout)?,
            webhook_alerts_template_path: self
                .webhook_alerts_template_path
                .filter(|p| !p.as_os_str().is_empty()),
            gettable_alerts_template_path: self
                .gettable_alerts_template_path
                .filter(|p| !p.as_os_str().is_empty()),
            silences_template_path: self
                .silences_template_path
                .filter(|p| !p.as_os_str().is_empty()),
            time_format: self
                .time_format
                .and_then(non_empty)
                .unwrap_or(d.time_format),
            time_zone,
            keyboard_rows: self.keyboard_rows.unwrap_or(d.keyboard_rows).max(1),
            button_prefix_ok: self.button_prefix_ok.unwrap_or(d.button_prefix_ok),
            button_prefix_fail: self.button_prefix_fail.unwrap_or(d.button_prefix_fail),
            session_ttl: duration_or("session_ttl", self.session_ttl, d.session_ttl)?,
            silence_duration: duration_or(
                "silence_duration",
                self.silence_duration,
                d.silence_duration,
            )?,
            bind_address: self.bind_address.unwrap_or(d.bind_address),
            bind_port: self.bind_port.unwrap_or(d.bind_port),
            disable_http: self.disable_http.unwrap_or(d.disable_http),
            logfile_path: self.logfile_path.filter(|p| !p.as_os_str().is_empty()),
        })
    }
}

fn duration_or(key: &str, raw: Option<String>, default: Duration) -> Result<Duration> {
    match raw.and_then(non_empty) {
        Some(s) => parse_duration(&s)
            .ok_or_else(|| Error::Config(format!("invalid duration for {key}: {s:?}"))),
        None => Ok(default),
    }
}

/// Parse a Go-style duration string such as `500ms`, `10s` or `1h30m`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s == "0" {
        return Some(Duration::ZERO);
    }

    let re = Regex::new(r"(\d+(?:\.\d+)?)(ns|us|µs|ms|h|m|s)").ok()?;
    let mut total = 0f64;
    let mut consumed = 0usize;
    for caps in re.captures_iter(s) {
        let whole = caps.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();

        let value: f64 = caps[1].parse().ok()?;
        let unit_secs = match &caps[2] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        total += value * unit_secs;
    }

    if consumed == 0 || consumed != s.len() {
        return None;
    }
    Duration::try_from_secs_f64(total).ok()
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_str(key).and_then(|s| s.trim().parse::<T>().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_csv(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
