use crate::errors::ClientError;
use reqwest::Url;
use std::{env, time::Duration};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/";
const DEFAULT_SORT_DEBOUNCE_MS: u64 = 50;
const DEFAULT_FLASH_MS: u64 = 2000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub session_cookie: Option<String>,
    pub sort_debounce: Duration,
    pub flash_duration: Duration,
    pub prefetch: bool,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_cookie: None,
            sort_debounce: Duration::from_millis(DEFAULT_SORT_DEBOUNCE_MS),
            flash_duration: Duration::from_millis(DEFAULT_FLASH_MS),
            prefetch: true,
        }
    }

    pub fn from_env() -> Result<Self, ClientError> {
        let raw_url = env::var("PERKMANAGER_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(&raw_url).map_err(|err| ClientError::invalid_url(&raw_url, err))?;

        let mut config = Self::new(base_url);
        config.session_cookie = env::var("PERKMANAGER_SESSION").ok().filter(|value| !value.is_empty());

        if let Some(ms) = millis_var("PERKMANAGER_SORT_DEBOUNCE_MS")? {
            config.sort_debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = millis_var("PERKMANAGER_FLASH_MS")? {
            config.flash_duration = Duration::from_millis(ms);
        }
        if let Ok(value) = env::var("PERKMANAGER_PREFETCH") {
            config.prefetch = parse_flag(&value)
                .ok_or_else(|| ClientError::config(format!("PERKMANAGER_PREFETCH must be a boolean, got '{value}'")))?;
        }

        Ok(config)
    }

    /// Resolves a link target the way an anchor's `href` resolves against the page.
    pub fn resolve(&self, href: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(href)
            .map_err(|err| ClientError::invalid_url(href, err))
    }
}

fn millis_var(name: &str) -> Result<Option<u64>, ClientError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ClientError::config(format!("{name} must be a number of milliseconds, got '{value}'"))),
        Err(_) => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
