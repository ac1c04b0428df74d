use std::{
    env, fs, io,
    path::Path,
    time::Duration,
};

use crate::{chat::ChatOptions, errors::Error, Result};

pub const DEFAULT_API_URL: &str = "https://7103.api.greenapi.com";

/// Runtime settings for the client.
///
/// Instance credentials and the destination number are entered interactively
/// and never read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub api_url: String,
    pub poll_interval: Duration,
    pub history_count: usize,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let chat = ChatOptions::default();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: chat.poll_interval,
            history_count: chat.history_count,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"))?;
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_url = lookup("GREEN_API_URL")
            .and_then(non_empty)
            .map(|u| u.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(Error::Config(format!(
                "GREEN_API_URL must be an http(s) URL, got {api_url:?}"
            )));
        }

        let poll_interval = match parse_num::<u64>(&lookup, "POLL_INTERVAL_MS")? {
            Some(0) => {
                return Err(Error::Config(
                    "POLL_INTERVAL_MS must be greater than zero".to_string(),
                ))
            }
            Some(ms) => Duration::from_millis(ms),
            None => defaults.poll_interval,
        };

        let history_count = match parse_num::<usize>(&lookup, "HISTORY_COUNT")? {
            Some(0) => {
                return Err(Error::Config(
                    "HISTORY_COUNT must be greater than zero".to_string(),
                ))
            }
            Some(n) => n,
            None => defaults.history_count,
        };

        let request_timeout = match parse_num::<u64>(&lookup, "REQUEST_TIMEOUT_SECS")? {
            Some(0) => {
                return Err(Error::Config(
                    "REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.request_timeout,
        };

        Ok(Self {
            api_url,
            poll_interval,
            history_count,
            request_timeout,
        })
    }

    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            poll_interval: self.poll_interval,
            history_count: self.history_count,
        }
    }
}

fn parse_num<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got {raw:?}")))
}

/// A missing file is fine; one that exists but cannot be read is an error.
fn load_dotenv_if_present(path: &Path) -> Result<()> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
    Ok(())
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
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

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
