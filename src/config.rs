use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serenity::model::id::GuildId;
use std::env;

use crate::text::DEFAULT_LOCALE;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord_token: String,
    pub namespace: String,
    pub default_locale: String,
    pub log_level: String,
    pub translations_path: Option<String>,
    pub dev_guild_id: Option<GuildId>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let dev_guild_id = match lookup("DEV_GUILD_ID") {
            Some(raw) => Some(GuildId(
                raw.trim()
                    .parse()
                    .map_err(|_| anyhow!("DEV_GUILD_ID must be a numeric guild id, got '{}'", raw))?,
            )),
            None => None,
        };

        Ok(Config {
            discord_token: lookup("DISCORD_TOKEN")
                .ok_or_else(|| anyhow!("DISCORD_TOKEN environment variable not set"))?,
            namespace: lookup("COGWORK_NAMESPACE").unwrap_or_else(|| "bot".to_string()),
            default_locale: lookup("DEFAULT_LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            translations_path: lookup("TRANSLATIONS_PATH"),
            dev_guild_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn test_config_missing_token() {
        let result = Config::from_lookup(lookup(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_with_defaults() {
        let config = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "test_discord_token")])).unwrap();
        assert_eq!(config.discord_token, "test_discord_token");
        assert_eq!(config.namespace, "bot");
        assert_eq!(config.default_locale, "en-US");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.translations_path, None);
        assert_eq!(config.dev_guild_id, None);
    }

    #[test]
    fn test_config_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DISCORD_TOKEN", "token"),
            ("COGWORK_NAMESPACE", "muppets"),
            ("LOG_LEVEL", "debug"),
            ("TRANSLATIONS_PATH", "lang.json"),
            ("DEV_GUILD_ID", " 1234 "),
        ]))
        .unwrap();
        assert_eq!(config.namespace, "muppets");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.translations_path.as_deref(), Some("lang.json"));
        assert_eq!(config.dev_guild_id, Some(GuildId(1234)));
    }

    #[test]
    fn test_config_rejects_bad_guild_id() {
        let result = Config::from_lookup(lookup(&[("DISCORD_TOKEN", "token"), ("DEV_GUILD_ID", "general")]));
        assert!(result.is_err());
    }
}
