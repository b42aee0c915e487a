use std::{
    collections::HashMap,
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, templates::TemplateName, Result};

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.geocaching.example/v1";

/// Typed configuration, read once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub delivery: Delivery,
    pub provider: ProviderConfig,
    pub resolve_timeout: Duration,
    pub template_paths: HashMap<TemplateName, PathBuf>,
}

/// How updates reach the bot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Polling {
        interval: Duration,
        long_poll_timeout: Duration,
        skip_pending: bool,
    },
    Webhook(WebhookConfig),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookConfig {
    pub listen: SocketAddr,
    /// External base URL Telegram posts to; `path` is appended.
    pub public_url: String,
    pub path: String,
    pub secret: Option<String>,
}

impl WebhookConfig {
    /// Full URL registered with Telegram.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.public_url.trim_end_matches('/'), self.path)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProviderConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

impl Config {
    /// Process environment, pre-seeded from `./.env` (existing variables win).
    pub fn load() -> Result<Self> {
        let mut vars: HashMap<String, String> = env::vars().collect();
        for (k, v) in read_dotenv(Path::new(".env")) {
            vars.entry(k).or_insert(v);
        }
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).cloned().and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let mode = get("DELIVERY_MODE").unwrap_or_else(|| "polling".to_string());
        let delivery = match mode.trim().to_lowercase().as_str() {
            "polling" => Delivery::Polling {
                interval: Duration::from_millis(parse_num(vars, "POLL_INTERVAL_MS", 1000)?),
                long_poll_timeout: Duration::from_secs(parse_num(
                    vars,
                    "LONG_POLL_TIMEOUT_SECS",
                    30,
                )?),
                skip_pending: parse_bool(vars, "SKIP_PENDING_UPDATES", false)?,
            },
            "webhook" => {
                let listen_raw = get("WEBHOOK_LISTEN").unwrap_or_else(|| "0.0.0.0:8443".to_string());
                let listen = listen_raw.trim().parse::<SocketAddr>().map_err(|e| {
                    Error::Config(format!("WEBHOOK_LISTEN is not a socket address ({listen_raw}): {e}"))
                })?;
                let public_url = get("WEBHOOK_PUBLIC_URL").ok_or_else(|| {
                    Error::Config("WEBHOOK_PUBLIC_URL is required when DELIVERY_MODE=webhook".to_string())
                })?;
                let path = get("WEBHOOK_PATH")
                    .unwrap_or_else(|| telegram_bot_token.clone())
                    .trim_matches('/')
                    .to_string();
                if path.is_empty() {
                    return Err(Error::Config("WEBHOOK_PATH must not be empty".to_string()));
                }
                Delivery::Webhook(WebhookConfig {
                    listen,
                    public_url,
                    path,
                    secret: get("WEBHOOK_SECRET"),
                })
            }
            other => {
                return Err(Error::Config(format!(
                    "DELIVERY_MODE must be `polling` or `webhook`, got `{other}`"
                )))
            }
        };

        let username = get("PROVIDER_USER");
        let password = get("PROVIDER_PASS");
        if username.is_some() != password.is_some() {
            return Err(Error::Config(
                "PROVIDER_USER and PROVIDER_PASS must be set together".to_string(),
            ));
        }
        let provider = ProviderConfig {
            base_url: get("PROVIDER_BASE_URL")
                .unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            username,
            password,
        };

        let resolve_timeout = Duration::from_millis(parse_num(vars, "RESOLVE_TIMEOUT_MS", 15_000)?);
        if resolve_timeout.is_zero() {
            return Err(Error::Config("RESOLVE_TIMEOUT_MS must be positive".to_string()));
        }

        let template_dir = get("TEMPLATE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("templates"));
        let template_paths = TemplateName::ALL
            .into_iter()
            .map(|name| {
                let path = get(&name.env_key())
                    .map(PathBuf::from)
                    .unwrap_or_else(|| template_dir.join(format!("{}.html", name.as_str())));
                (name, path)
            })
            .collect();

        Ok(Self {
            telegram_bot_token,
            delivery,
            provider,
            resolve_timeout,
            template_paths,
        })
    }
}

fn read_dotenv(path: &Path) -> Vec<(String, String)> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }
        out.push((key.to_string(), val));
    }
    out
}

fn parse_num(vars: &HashMap<String, String>, key: &str, default: u64) -> Result<u64> {
    match vars.get(key).map(|s| s.trim()).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(s) => s
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got `{s}`"))),
    }
}

fn parse_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> Result<bool> {
    let Some(s) = vars.get(key).map(|s| s.trim().to_lowercase()) else {
        return Ok(default);
    };
    match s.as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{key} must be a boolean, got `{s}`"))),
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
