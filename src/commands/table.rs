//! # Feature: Command Table
//!
//! Concurrent lookup of built commands by the name the platform reports,
//! scoped globally or to one guild. Uses DashMap so dispatch never blocks on
//! registration.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Scoped lookup with guild-first resolution

use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::command::{Command, CommandPayload, CHAT_INPUT};
use super::payload::assemble;
use crate::error::BuildError;

type Key = (Option<GuildId>, String);

struct Entry {
    seq: u64,
    command: Arc<Command>,
}

#[derive(Default)]
pub struct CommandTable {
    commands: DashMap<Key, Entry>,
    next_seq: AtomicU64,
    writes: Mutex<()>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `command` under its scope and platform name.
    ///
    /// Fails if the name is taken in that scope, or if a chat root would be
    /// both a standalone command and the parent of subcommands.
    pub fn insert(&self, command: Command) -> Result<Arc<Command>, BuildError> {
        let _guard = self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let scope = command.guild_id();
        let key = (scope, command.discord_name());

        if self.commands.contains_key(&key) {
            return Err(BuildError::DuplicateCommand {
                name: key.1,
                guild: scope,
            });
        }

        let branch = command.branch();
        if branch.root.kind == CHAT_INPUT {
            let conflict = self.commands.iter().any(|entry| {
                let other = entry.command.branch();
                entry.key().0 == scope
                    && other.root.kind == CHAT_INPUT
                    && other.root.name == branch.root.name
                    && other.is_standalone() != branch.is_standalone()
            });
            if conflict {
                return Err(BuildError::RootConflict {
                    root: branch.root.name.clone(),
                });
            }
        }

        let command = Arc::new(command);
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.commands.insert(
            key,
            Entry {
                seq,
                command: command.clone(),
            },
        );
        Ok(command)
    }

    /// Guild-scoped command first, then the global one.
    pub fn get(&self, name: &str, guild: Option<GuildId>) -> Option<Arc<Command>> {
        let lookup = |scope: Option<GuildId>| {
            self.commands
                .get(&(scope, name.to_string()))
                .map(|entry| entry.command.clone())
        };
        match guild {
            Some(_) => lookup(guild).or_else(|| lookup(None)),
            None => lookup(None),
        }
    }

    /// Every scope with at least one command, global first.
    pub fn scopes(&self) -> Vec<Option<GuildId>> {
        let mut scopes: Vec<_> = self.commands.iter().map(|entry| entry.key().0).collect();
        scopes.sort();
        scopes.dedup();
        scopes
    }

    /// Commands of one scope in registration order.
    pub fn in_scope(&self, scope: Option<GuildId>) -> Vec<Arc<Command>> {
        let mut entries: Vec<(u64, Arc<Command>)> = self
            .commands
            .iter()
            .filter(|entry| entry.key().0 == scope)
            .map(|entry| (entry.seq, entry.command.clone()))
            .collect();
        entries.sort_by_key(|(seq, _)| *seq);
        entries.into_iter().map(|(_, command)| command).collect()
    }

    /// The merged payload of the root `name` of `kind` in `scope`.
    pub fn root_payload(&self, scope: Option<GuildId>, kind: u8, name: &str) -> Option<CommandPayload> {
        assemble(&self.in_scope(scope))
            .into_iter()
            .find(|payload| payload.kind == kind && payload.name == name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
