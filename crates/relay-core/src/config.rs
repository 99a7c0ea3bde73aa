use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{domain::UserId, errors::Error, Result};

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    pub operators: Vec<UserId>,

    // Webhook
    pub webhook_base: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub bot_username: Option<String>,

    pub store: StoreConfig,
}

/// Which persistence backend to open at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreConfig {
    Memory,
    File { path: PathBuf },
    Remote { url: String, token: Option<String> },
}

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_STORE_PATH: &str = "relay-store.json";

impl Config {
    /// Load `.env` (if present) and then read the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        // OPERATOR_IDS wins; ADMIN_CHAT_ID is the single-operator legacy key.
        let raw_operators = get("OPERATOR_IDS").or_else(|| get("ADMIN_CHAT_ID"));
        let operators = parse_operators(raw_operators.as_deref().unwrap_or_default())?;
        if operators.is_empty() {
            return Err(Error::Config(
                "OPERATOR_IDS (or ADMIN_CHAT_ID) environment variable is required".to_string(),
            ));
        }

        let webhook_base = get("WEBHOOK_URL")
            .or_else(|| get("RENDER_EXTERNAL_URL"))
            .map(|s| s.trim().trim_end_matches('/').to_string());

        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {raw}")))?,
            None => DEFAULT_PORT,
        };

        let bot_username =
            get("BOT_USERNAME").map(|s| s.trim().trim_start_matches('@').to_string());

        let store = match get("STORE_BACKEND")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("file") => StoreConfig::File {
                path: PathBuf::from(
                    get("STORE_PATH").unwrap_or_else(|| DEFAULT_STORE_PATH.to_string()),
                ),
            },
            Some("memory") => StoreConfig::Memory,
            Some("remote") => StoreConfig::Remote {
                url: get("STORE_URL").ok_or_else(|| {
                    Error::Config("STORE_URL is required when STORE_BACKEND=remote".to_string())
                })?,
                token: get("STORE_TOKEN"),
            },
            Some(other) => {
                return Err(Error::Config(format!(
                    "unknown STORE_BACKEND '{other}' (expected file, memory or remote)"
                )))
            }
        };

        Ok(Self {
            telegram_bot_token,
            operators,
            webhook_base,
            bind_addr,
            port,
            bot_username,
            store,
        })
    }

    /// Full URL the platform should post updates to.
    pub fn webhook_url(&self) -> Option<String> {
        self.webhook_base.as_ref().map(|base| format!("{base}/webhook"))
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
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

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_operators(raw: &str) -> Result<Vec<UserId>> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| Error::Config(format!("invalid operator id '{part}'")))?;
        let id = UserId(id);
        if !out.contains(&id) {
            out.push(id);
        }
    }
    Ok(out)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
