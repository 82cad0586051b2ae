//! # Feature: Localized Text
//!
//! Lookup service for display names, descriptions and user-facing messages.
//! Components receive an `Arc<dyn Translator>` at construction instead of
//! reaching for a process-wide registry.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: In-memory translations with JSON loading and library defaults

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use crate::error::BuildError;

/// Namespace holding the framework's own messages.
pub const LIBRARY_NAMESPACE: &str = "cogwork";

/// Locale used when nothing else is configured.
pub const DEFAULT_LOCALE: &str = "en-US";

const LIBRARY_DEFAULTS: &[(&str, &str)] = &[
    ("exception.command_error", "An error occurred while running this command. Please try again later."),
    ("exception.guild_only", "This command can only be used inside a server."),
    ("exception.member_not_found", "That user is not a member of this server."),
    ("exception.duration.regex", "Could not read a duration from '{0}'. Try something like 1h30m."),
    ("exception.duration.unit", "Unknown time unit '{0}'."),
    ("exception.invalid_locale", "'{0}' is not a supported language."),
    ("exception.invalid_timezone", "'{0}' is not a valid time zone offset."),
    ("exception.invalid_date", "'{0}' is not a valid date."),
    ("exception.invalid_time", "'{0}' is not a valid time."),
    ("exception.number_range", "{0} is out of range."),
    ("exception.invalid_choice", "'{0}' is not one of the available choices."),
];

/// A piece of text shown to a user, either fixed or resolved per locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Text {
    Literal(String),
    Localized {
        namespace: String,
        key: String,
        args: Vec<String>,
    },
}

impl Text {
    pub fn literal(value: impl Into<String>) -> Self {
        Text::Literal(value.into())
    }

    pub fn localized(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Text::Localized {
            namespace: namespace.into(),
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn library(key: impl Into<String>) -> Self {
        Self::localized(LIBRARY_NAMESPACE, key)
    }

    /// Appends a positional argument substituted for `{n}` placeholders.
    pub fn arg(mut self, value: impl fmt::Display) -> Self {
        if let Text::Localized { args, .. } = &mut self {
            args.push(value.to_string());
        }
        self
    }

    /// Renders the text for `locale`, falling back to the key when no translation exists.
    pub fn resolve(&self, translator: &dyn Translator, locale: &str) -> String {
        match self {
            Text::Literal(value) => value.clone(),
            Text::Localized {
                namespace,
                key,
                args,
            } => match translator.get(namespace, key, locale) {
                Some(template) => substitute(&template, args),
                None => {
                    warn!("Missing translation for {}:{} ({})", namespace, key, locale);
                    key.clone()
                }
            },
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Text::Literal(value) => write!(f, "{}", value),
            Text::Localized { namespace, key, .. } => write!(f, "{}:{}", namespace, key),
        }
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Text::literal(value)
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Text::Literal(value)
    }
}

fn substitute(template: &str, args: &[String]) -> String {
    args.iter()
        .enumerate()
        .fold(template.to_string(), |acc, (index, value)| {
            acc.replace(&format!("{{{}}}", index), value)
        })
}

/// Translation lookup service.
pub trait Translator: Send + Sync {
    fn default_locale(&self) -> &str;

    /// Every locale with at least one translation.
    fn locales(&self) -> Vec<String>;

    /// Exact lookup without any fallback.
    fn lookup(&self, namespace: &str, key: &str, locale: &str) -> Option<String>;

    /// Lookup that falls back to the default locale.
    fn get(&self, namespace: &str, key: &str, locale: &str) -> Option<String> {
        self.lookup(namespace, key, locale)
            .or_else(|| self.lookup(namespace, key, self.default_locale()))
    }

    /// Translations for every non-default locale, as Discord expects in `*_localizations`.
    fn discord_translations(&self, namespace: &str, key: &str) -> HashMap<String, String> {
        let default_locale = self.default_locale().to_string();
        self.locales()
            .into_iter()
            .filter(|locale| *locale != default_locale)
            .filter_map(|locale| {
                self.lookup(namespace, key, &locale)
                    .map(|value| (locale, value))
            })
            .collect()
    }

    fn required_string(&self, namespace: &str, key: &str, locale: &str) -> Result<String, BuildError> {
        self.lookup(namespace, key, locale)
            .ok_or_else(|| BuildError::MissingTranslation {
                namespace: namespace.to_string(),
                key: key.to_string(),
                locale: locale.to_string(),
            })
    }
}

type Table = HashMap<String, HashMap<String, HashMap<String, String>>>;

/// In-memory translations keyed by namespace, then locale, then key.
#[derive(Debug, Clone)]
pub struct StaticTranslations {
    default_locale: String,
    entries: Table,
}

impl StaticTranslations {
    /// Creates a table seeded with the library's own messages in `default_locale`.
    pub fn new(default_locale: impl Into<String>) -> Self {
        let mut translations = StaticTranslations {
            default_locale: default_locale.into(),
            entries: HashMap::new(),
        };
        let locale = translations.default_locale.clone();
        for (key, value) in LIBRARY_DEFAULTS {
            translations.insert(LIBRARY_NAMESPACE, &locale, key, value);
        }
        translations
    }

    pub fn insert(&mut self, namespace: &str, locale: &str, key: &str, value: &str) -> &mut Self {
        self.entries
            .entry(namespace.to_string())
            .or_default()
            .entry(locale.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, namespace: &str, locale: &str, key: &str, value: &str) -> Self {
        self.insert(namespace, locale, key, value);
        self
    }

    /// Merges `{namespace: {locale: {key: value}}}` JSON over the current entries.
    pub fn merge_json(&mut self, json: &str) -> Result<usize> {
        let parsed: Table = serde_json::from_str(json).context("Invalid translation JSON")?;
        let mut count = 0;
        for (namespace, locales) in parsed {
            for (locale, keys) in locales {
                for (key, value) in keys {
                    self.insert(&namespace, &locale, &key, &value);
                    count += 1;
                }
            }
        }
        debug!("Merged {} translation entries", count);
        Ok(count)
    }

    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read translations from {}", path.display()))?;
        self.merge_json(&json)
    }
}

impl Default for StaticTranslations {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

impl Translator for StaticTranslations {
    fn default_locale(&self) -> &str {
        &self.default_locale
    }

    fn locales(&self) -> Vec<String> {
        let locales: BTreeSet<&String> = self
            .entries
            .values()
            .flat_map(|locales| locales.keys())
            .collect();
        locales.into_iter().cloned().collect()
    }

    fn lookup(&self, namespace: &str, key: &str, locale: &str) -> Option<String> {
        self.entries
            .get(namespace)?
            .get(locale)?
            .get(key)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_defaults_present() {
        let translations = StaticTranslations::default();
        assert!(translations
            .lookup(LIBRARY_NAMESPACE, "exception.command_error", "en-US")
            .is_some());
    }

    #[test]
    fn test_resolve_substitutes_arguments() {
        let translations = StaticTranslations::default();
        let text = Text::library("exception.duration.unit").arg("fortnights");
        assert_eq!(
            text.resolve(&translations, "en-US"),
            "Unknown time unit 'fortnights'."
        );
    }

    #[test]
    fn test_get_falls_back_to_default_locale() {
        let translations = StaticTranslations::default()
            .with("bot", "en-US", "ping.name", "ping")
            .with("bot", "fr", "ping.name", "sonde");

        assert_eq!(translations.get("bot", "ping.name", "fr").as_deref(), Some("sonde"));
        assert_eq!(translations.get("bot", "ping.name", "de").as_deref(), Some("ping"));
        assert_eq!(translations.lookup("bot", "ping.name", "de"), None);
    }

    #[test]
    fn test_missing_key_resolves_to_key() {
        let translations = StaticTranslations::default();
        let text = Text::localized("bot", "nothing.here");
        assert_eq!(text.resolve(&translations, "en-US"), "nothing.here");
    }

    #[test]
    fn test_discord_translations_skip_default_locale() {
        let translations = StaticTranslations::default()
            .with("bot", "en-US", "ping.name", "ping")
            .with("bot", "fr", "ping.name", "sonde");

        let localized = translations.discord_translations("bot", "ping.name");
        assert_eq!(localized.len(), 1);
        assert_eq!(localized.get("fr").map(String::as_str), Some("sonde"));
    }

    #[test]
    fn test_required_string_reports_missing() {
        let translations = StaticTranslations::default();
        let result = translations.required_string("bot", "ghost.name", "en-US");
        assert!(matches!(result, Err(BuildError::MissingTranslation { .. })));
    }

    #[test]
    fn test_merge_json() {
        let mut translations = StaticTranslations::default();
        let count = translations
            .merge_json(r#"{"bot": {"en-US": {"ping.name": "ping", "ping.description": "Pong!"}}}"#)
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(translations.lookup("bot", "ping.description", "en-US").as_deref(), Some("Pong!"));
        assert!(translations.merge_json("not json").is_err());
    }
}
