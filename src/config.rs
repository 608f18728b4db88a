use log::LevelFilter;

use crate::api::ApiConfig;

pub const BASE_URL_ENV: &str = "METUBE_API_URL";
pub const LOG_LEVEL_ENV: &str = "METUBE_LOG";

#[derive(Clone, Debug)]
pub struct Settings {
    pub api: ApiConfig,
    pub log_level: LevelFilter,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            log_level: LevelFilter::Info,
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from `lookup`. Invalid values keep their defaults and
    /// are reported on stderr, since the logger is configured from the result.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();

        if let Some(base_url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            match ApiConfig::new(&base_url) {
                Ok(api) => settings.api = api,
                Err(e) => eprintln!("Warning: ignoring {}: {}", BASE_URL_ENV, e),
            }
        }

        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            match level.trim().parse::<LevelFilter>() {
                Ok(level) => settings.log_level = level,
                Err(_) => eprintln!("Warning: ignoring {}: unknown level {:?}", LOG_LEVEL_ENV, level),
            }
        }

        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[]));
        assert_eq!(settings.api.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(settings.log_level, LevelFilter::Info);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (BASE_URL_ENV, "https://downloads.example.com"),
            (LOG_LEVEL_ENV, "debug"),
        ]));
        assert_eq!(settings.api.base_url.as_str(), "https://downloads.example.com/");
        assert_eq!(settings.log_level, LevelFilter::Debug);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup(&[
            (BASE_URL_ENV, "ftp://example.com"),
            (LOG_LEVEL_ENV, "loud"),
        ]));
        assert_eq!(settings.api.base_url.as_str(), "http://localhost:8000/");
        assert_eq!(settings.log_level, LevelFilter::Info);
    }
}
