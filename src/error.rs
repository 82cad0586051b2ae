use serenity::model::id::GuildId;
use thiserror::Error;

use crate::text::Text;

/// Configuration errors raised while turning cogs into commands.
///
/// These surface during startup. The offending handler is logged and skipped,
/// its siblings keep registering.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no converter from {from} to {to} for parameter '{parameter}' of {command}")]
    MissingConverter {
        command: String,
        parameter: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("missing translation '{key}' in namespace '{namespace}' for locale {locale}")]
    MissingTranslation {
        namespace: String,
        key: String,
        locale: String,
    },

    #[error("subcommand id '{0}' must have two or three dot-separated parts")]
    MalformedSubcommandId(String),

    #[error("subcommand handler '{handler}' belongs to a cog without a root slash command")]
    OrphanSubcommand { handler: String },

    #[error("handler '{handler}' must carry exactly one command marker, found {found}")]
    MarkerCount { handler: String, found: usize },

    #[error("parameter '{parameter}' cannot be both contextual and an option")]
    ConflictingParameter { parameter: String },

    #[error("parameter '{parameter}' must be marked contextual or as an option")]
    UnboundParameter { parameter: String },

    #[error("invalid metadata on option '{option}': {reason}")]
    InvalidOption { option: String, reason: String },

    #[error("converter for '{parameter}' produces {produced}, which is not assignable to {expected}")]
    ConverterMismatch {
        parameter: String,
        produced: &'static str,
        expected: &'static str,
    },

    #[error("command '{name}' is already registered in scope {}", scope_label(.guild))]
    DuplicateCommand { name: String, guild: Option<GuildId> },

    #[error("root '{root}' is used both as a standalone command and as a subcommand parent")]
    RootConflict { root: String },

    #[error("invalid temporary listener: {0}")]
    InvalidListener(&'static str),
}

fn scope_label(guild: &Option<GuildId>) -> String {
    match guild {
        Some(id) => format!("guild {}", id),
        None => "global".to_string(),
    }
}

/// Errors raised while converting arguments or running a handler.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad input from the invoking user. Rendered to them, never logged as a fault.
    #[error("user error: {0}")]
    User(Text),

    #[error("argument {0} was not provided")]
    MissingArgument(usize),

    #[error("argument {position} is not a {expected}")]
    UnexpectedArgument {
        position: usize,
        expected: &'static str,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CommandError {
    pub fn user(text: Text) -> Self {
        CommandError::User(text)
    }

    /// Shorthand for a user error keyed in the library namespace.
    pub fn library(key: &str) -> Self {
        CommandError::User(Text::library(key))
    }

    pub fn internal(message: impl std::fmt::Display) -> Self {
        CommandError::Internal(anyhow::anyhow!("{}", message))
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self, CommandError::User(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_command_message_names_scope() {
        let global = BuildError::DuplicateCommand {
            name: "ping".to_string(),
            guild: None,
        };
        assert_eq!(
            global.to_string(),
            "command 'ping' is already registered in scope global"
        );

        let scoped = BuildError::DuplicateCommand {
            name: "ping".to_string(),
            guild: Some(GuildId(42)),
        };
        assert!(scoped.to_string().ends_with("guild 42"));
    }

    #[test]
    fn test_user_error_classification() {
        assert!(CommandError::library("exception.invalid_locale").is_user_error());
        assert!(!CommandError::internal("boom").is_user_error());
        assert!(!CommandError::MissingArgument(0).is_user_error());
    }
}
