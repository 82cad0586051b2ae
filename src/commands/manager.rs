//! # Feature: Command Manager
//!
//! Owns the command table, publishes it to the gateway once, and dispatches
//! inbound interactions: lookup, shape check, argument conversion, handler
//! invocation and reply routing. Autocomplete requests are answered from the
//! completers indexed at registration time.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Always replace the global list; catch handler panics in place
//! - 1.0.0: One-shot publish with incremental upserts afterwards

use dashmap::DashMap;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serenity::model::id::GuildId;
use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::autocomplete::{AutoCompleter, MAX_CHOICES};
use super::builder::Cog;
use super::command::{Command, Reply, Response};
use super::parser::CommandParser;
use super::payload::assemble;
use super::table::CommandTable;
use crate::converter::ConverterRegistry;
use crate::error::{BuildError, CommandError};
use crate::gateway::Gateway;
use crate::interaction::{Interaction, InteractionKind};
use crate::text::{Text, Translator};

const GENERIC_ERROR: &str = "exception.command_error";

/// How a dispatched interaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and its response was sent.
    Completed,
    UnknownCommand,
    /// The interaction's shape differs from what the command expects.
    ShapeMismatch,
    /// A user-facing validation error was shown to the invoker.
    Rejected,
    /// An unexpected fault; the invoker got the generic error.
    Failed,
}

pub struct CommandManager {
    table: CommandTable,
    parser: CommandParser,
    completers: DashMap<(Option<GuildId>, String), Arc<dyn AutoCompleter>>,
    gateway: Arc<dyn Gateway>,
    translator: Arc<dyn Translator>,
    published: AtomicBool,
}

impl CommandManager {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        translator: Arc<dyn Translator>,
        converters: Arc<ConverterRegistry>,
        namespace: impl Into<String>,
    ) -> Self {
        CommandManager {
            table: CommandTable::new(),
            parser: CommandParser::new(converters, translator.clone(), namespace),
            completers: DashMap::new(),
            gateway,
            translator,
            published: AtomicBool::new(false),
        }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    pub fn is_published(&self) -> bool {
        self.published.load(Ordering::SeqCst)
    }

    /// Adds a built command. After [`publish_all`](Self::publish_all) the
    /// command's root is also pushed to the gateway on its own.
    pub async fn register(&self, command: Command) -> Result<Arc<Command>, BuildError> {
        let command = self.insert(command)?;
        info!(
            "✅ Registered command '{}' from {} ({})",
            command.discord_name(),
            command.source(),
            command
                .guild_id()
                .map_or_else(|| "global".to_string(), |guild| format!("guild {}", guild))
        );

        if self.is_published() {
            self.upsert_root(&command).await;
        }
        Ok(command)
    }

    /// Builds and registers every handler of `cog`. Returns how many were registered.
    pub async fn register_cog(&self, cog: Cog) -> usize {
        let name = cog.name().to_string();
        let commands = self.parser.parse(cog);
        let mut registered = Vec::new();
        for command in commands {
            let source = command.source().to_string();
            match self.insert(command) {
                Ok(command) => {
                    debug!("Registered command '{}' from {}", command.discord_name(), source);
                    registered.push(command);
                }
                Err(e) => warn!("⚠️ Skipping {}: {}", source, e),
            }
        }

        if self.is_published() {
            let mut seen = HashSet::new();
            for command in &registered {
                let root = &command.branch().root;
                if seen.insert((command.guild_id(), root.kind, root.name.clone())) {
                    self.upsert_root(command).await;
                }
            }
        }
        info!("📦 Cog '{}' registered {} command(s)", name, registered.len());
        registered.len()
    }

    fn insert(&self, command: Command) -> Result<Arc<Command>, BuildError> {
        let command = self.table.insert(command)?;
        for (option, completer) in &command.completers {
            self.completers.insert(
                (command.guild_id(), completer_key(command.name(), option)),
                completer.clone(),
            );
        }
        Ok(command)
    }

    async fn upsert_root(&self, command: &Command) {
        let scope = command.guild_id();
        let root = &command.branch().root;
        let Some(payload) = self.table.root_payload(scope, root.kind, &root.name) else {
            return;
        };
        if let Err(e) = self.gateway.upsert_command(scope, payload).await {
            error!("❌ Failed to upsert command '{}': {:?}", root.name, e);
        }
    }

    /// Replaces the published command list of every scope. Runs once; later
    /// calls return immediately.
    pub async fn publish_all(&self) -> anyhow::Result<()> {
        if self.published.swap(true, Ordering::SeqCst) {
            debug!("Commands already published, skipping");
            return Ok(());
        }

        // The global list is always replaced, even when empty, so stale
        // commands from an earlier deploy are cleared.
        let mut scopes = self.table.scopes();
        if !scopes.contains(&None) {
            scopes.insert(0, None);
        }

        let mut failures = 0;
        for scope in scopes {
            let payloads = assemble(&self.table.in_scope(scope));
            let count = payloads.len();
            match self.gateway.replace_commands(scope, payloads).await {
                Ok(()) => info!("🚀 Published {} root command(s) to {:?}", count, scope),
                Err(e) => {
                    error!("❌ Failed to publish commands to {:?}: {:?}", scope, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 {
            anyhow::bail!("{} scope(s) failed to publish", failures);
        }
        Ok(())
    }

    /// Runs the command an interaction refers to and sends its response.
    pub async fn dispatch(&self, interaction: Interaction) -> DispatchOutcome {
        let command = match self.table.get(&interaction.command_name, interaction.guild_id) {
            Some(command) if command.kind() == interaction.kind => command,
            Some(command) => {
                warn!(
                    "⚠️ Interaction '{}' is {:?} but the command expects {:?}",
                    interaction.command_name,
                    interaction.kind,
                    command.kind()
                );
                self.generic_error(&interaction).await;
                return DispatchOutcome::ShapeMismatch;
            }
            None => {
                warn!("⚠️ Unknown command '{}'", interaction.command_name);
                self.generic_error(&interaction).await;
                return DispatchOutcome::UnknownCommand;
            }
        };

        let arguments = match command.convert_arguments(&interaction) {
            Ok(arguments) => arguments,
            Err(e) => return self.fail(&command, &interaction, e).await,
        };

        let invocation = AssertUnwindSafe(command.handle.handle(interaction.clone(), arguments));
        let result = match invocation.catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(CommandError::internal(format!("handler panicked: {}", panic_message(&*panic)))),
        };

        match result {
            Ok(response) => {
                self.respond(&interaction, response).await;
                DispatchOutcome::Completed
            }
            Err(e) => self.fail(&command, &interaction, e).await,
        }
    }

    /// Answers an autocomplete request for the focused option.
    pub async fn autocomplete(&self, interaction: Interaction) {
        let choices = match self.completer_for(&interaction) {
            Some((completer, partial)) => match completer.complete(&interaction, &partial).await {
                Ok(mut choices) => {
                    choices.truncate(MAX_CHOICES);
                    choices
                }
                Err(e) => {
                    error!("❌ Autocomplete for '{}' failed: {:?}", interaction.command_name, e);
                    Vec::new()
                }
            },
            None => {
                debug!("No completer for '{}'", interaction.command_name);
                Vec::new()
            }
        };

        if let Err(e) = self.gateway.suggest(&interaction, choices).await {
            error!("❌ Failed to send suggestions: {:?}", e);
        }
    }

    fn completer_for(&self, interaction: &Interaction) -> Option<(Arc<dyn AutoCompleter>, String)> {
        let (option, partial) = interaction.focused.clone()?;
        let command = self.table.get(&interaction.command_name, interaction.guild_id)?;
        if interaction.kind != InteractionKind::Autocomplete || !interaction.kind.matches(command.kind()) {
            return None;
        }
        let completer = self
            .completers
            .get(&(command.guild_id(), completer_key(command.name(), &option)))?
            .value()
            .clone();
        Some((completer, partial))
    }

    async fn fail(&self, command: &Command, interaction: &Interaction, e: CommandError) -> DispatchOutcome {
        match e {
            CommandError::User(text) => {
                debug!("Command '{}' rejected input: {}", command.name(), text);
                self.send(interaction, Reply::ephemeral(self.resolve(&text, interaction))).await;
                DispatchOutcome::Rejected
            }
            e => {
                error!(
                    "❌ Command '{}' ({}) failed for user {}: {:?}",
                    command.name(),
                    command.source(),
                    interaction.user.id,
                    e
                );
                self.generic_error(interaction).await;
                DispatchOutcome::Failed
            }
        }
    }

    async fn respond(&self, interaction: &Interaction, response: Response) {
        match response {
            Response::None => {}
            Response::Text(text) => self.send(interaction, Reply::new(self.resolve(&text, interaction))).await,
            Response::Message(text, modifier) => {
                let mut reply = Reply::new(self.resolve(&text, interaction));
                modifier(&mut reply);
                self.send(interaction, reply).await;
            }
            Response::Defer { ephemeral } => {
                if let Err(e) = self.gateway.defer(interaction, ephemeral).await {
                    error!("❌ Failed to defer '{}': {:?}", interaction.command_name, e);
                }
            }
        }
    }

    async fn generic_error(&self, interaction: &Interaction) {
        let text = self.resolve(&Text::library(GENERIC_ERROR), interaction);
        self.send(interaction, Reply::ephemeral(text)).await;
    }

    async fn send(&self, interaction: &Interaction, reply: Reply) {
        if let Err(e) = self.gateway.reply(interaction, reply).await {
            error!("❌ Failed to reply to '{}': {:?}", interaction.command_name, e);
        }
    }

    fn resolve(&self, text: &Text, interaction: &Interaction) -> String {
        text.resolve(self.translator.as_ref(), &interaction.locale)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn completer_key(command: &str, option: &str) -> String {
    format!("{}.options.{}", command, option)
}
