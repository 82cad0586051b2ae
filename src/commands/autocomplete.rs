use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::command::Choice;
use crate::interaction::Interaction;
use crate::text::Translator;

/// Most suggestions or fixed choices a single option may carry.
pub const MAX_CHOICES: usize = 25;

/// Supplies suggestions for a partially typed option.
#[async_trait]
pub trait AutoCompleter: Send + Sync {
    async fn complete(&self, interaction: &Interaction, partial: &str) -> Result<Vec<Choice>>;
}

fn filter<I>(candidates: I, partial: &str) -> Vec<Choice>
where
    I: IntoIterator<Item = String>,
{
    let needle = partial.trim().to_lowercase();
    candidates
        .into_iter()
        .filter(|candidate| candidate.to_lowercase().contains(&needle))
        .take(MAX_CHOICES)
        .map(|candidate| Choice::new(candidate.clone(), candidate))
        .collect()
}

/// Suggests from a fixed list.
#[derive(Debug, Clone)]
pub struct StaticCompleter {
    choices: Vec<String>,
}

impl StaticCompleter {
    pub fn new<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StaticCompleter {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AutoCompleter for StaticCompleter {
    async fn complete(&self, _interaction: &Interaction, partial: &str) -> Result<Vec<Choice>> {
        Ok(filter(self.choices.iter().cloned(), partial))
    }
}

/// Suggests the locales the translator knows about.
pub struct LocaleCompleter {
    translator: Arc<dyn Translator>,
}

impl LocaleCompleter {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        LocaleCompleter { translator }
    }
}

#[async_trait]
impl AutoCompleter for LocaleCompleter {
    async fn complete(&self, _interaction: &Interaction, partial: &str) -> Result<Vec<Choice>> {
        Ok(filter(self.translator.locales(), partial))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{InteractionKind, User};
    use crate::text::StaticTranslations;

    fn interaction() -> Interaction {
        Interaction::new(InteractionKind::Autocomplete, "pick", User::new(1, "tester"))
    }

    #[tokio::test]
    async fn test_static_completer_filters_case_insensitively() {
        let completer = StaticCompleter::new(["Apple", "Banana", "Pineapple"]);
        let choices = completer.complete(&interaction(), "APP").await.unwrap();
        let names: Vec<_> = choices.iter().map(|choice| choice.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "Pineapple"]);
    }

    #[tokio::test]
    async fn test_static_completer_caps_results() {
        let completer = StaticCompleter::new((0..40).map(|n| format!("item-{}", n)));
        let choices = completer.complete(&interaction(), "").await.unwrap();
        assert_eq!(choices.len(), MAX_CHOICES);
    }

    #[tokio::test]
    async fn test_locale_completer() {
        let translations = StaticTranslations::default().with("bot", "fr", "ping.name", "sonde");
        let completer = LocaleCompleter::new(Arc::new(translations));
        let choices = completer.complete(&interaction(), "f").await.unwrap();
        assert_eq!(choices.len(), 1);
        assert_eq!(choices[0].name, "fr");
    }
}
