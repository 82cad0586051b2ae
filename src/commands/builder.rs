//! Declarative description of command handlers.
//!
//! A [`Cog`] groups handlers the way a feature module would. Each
//! [`HandlerSpec`] is marked as exactly one of slash command, subcommand or
//! context-menu command, and lists its parameters as [`ParamSpec`]s. The
//! [`CommandParser`](super::CommandParser) validates all of it and resolves
//! converters before anything is registered.

use serenity::model::id::GuildId;
use serenity::model::permissions::Permissions;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use super::autocomplete::AutoCompleter;
use super::command::{handler, Arguments, ChoiceValue, CommandHandle, Response};
use crate::converter::{Converter, TypeTag};
use crate::error::CommandError;
use crate::interaction::{ChannelKind, Interaction};

/// Discord option type of a subcommand.
pub const SUB_COMMAND: u8 = 1;
/// Discord option type of a subcommand group.
pub const SUB_COMMAND_GROUP: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    User,
    Message,
}

/// Wire type of an option. `Unknown` is inferred from the parameter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKind {
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
    Unknown,
}

impl OptionKind {
    pub fn wire(self) -> u8 {
        match self {
            OptionKind::String | OptionKind::Unknown => 3,
            OptionKind::Integer => 4,
            OptionKind::Boolean => 5,
            OptionKind::User => 6,
            OptionKind::Channel => 7,
            OptionKind::Role => 8,
            OptionKind::Mentionable => 9,
            OptionKind::Number => 10,
            OptionKind::Attachment => 11,
        }
    }

    pub fn supports_choices(self) -> bool {
        matches!(self, OptionKind::String | OptionKind::Integer | OptionKind::Number)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionRange {
    Integer { min: Option<i64>, max: Option<i64> },
    Number { min: Option<f64>, max: Option<f64> },
    Length { min: Option<u16>, max: Option<u16> },
}

pub struct ParamSpec {
    pub(crate) name: String,
    pub(crate) target: TypeTag,
    pub(crate) contextual: bool,
    pub(crate) option: Option<String>,
    pub(crate) required: bool,
    pub(crate) kind: OptionKind,
    pub(crate) range: Option<OptionRange>,
    pub(crate) channel_types: Vec<ChannelKind>,
    pub(crate) choices: Vec<(String, ChoiceValue)>,
    pub(crate) autocomplete_with: Option<Arc<dyn AutoCompleter>>,
    pub(crate) autocomplete_from: Option<Vec<String>>,
    pub(crate) converter: Option<Converter>,
}

impl ParamSpec {
    /// A parameter of type `T`, named for diagnostics.
    pub fn of<T: Any>(name: impl Into<String>) -> Self {
        ParamSpec {
            name: name.into(),
            target: TypeTag::of::<T>(),
            contextual: false,
            option: None,
            required: true,
            kind: OptionKind::Unknown,
            range: None,
            channel_types: Vec::new(),
            choices: Vec::new(),
            autocomplete_with: None,
            autocomplete_from: None,
            converter: None,
        }
    }

    /// Value derived from the interaction rather than typed by the user.
    pub fn contextual(mut self) -> Self {
        self.contextual = true;
        self
    }

    /// Value typed by the user into option `id`.
    pub fn option(mut self, id: impl Into<String>) -> Self {
        self.option = Some(id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn kind(mut self, kind: OptionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn int_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.range = Some(OptionRange::Integer { min, max });
        self
    }

    pub fn number_range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.range = Some(OptionRange::Number { min, max });
        self
    }

    pub fn length_range(mut self, min: Option<u16>, max: Option<u16>) -> Self {
        self.range = Some(OptionRange::Length { min, max });
        self
    }

    pub fn channel_types(mut self, kinds: impl IntoIterator<Item = ChannelKind>) -> Self {
        self.channel_types.extend(kinds);
        self
    }

    /// Adds a fixed choice. Its display name is translated from `id`.
    pub fn choice(mut self, id: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        self.choices.push((id.into(), value.into()));
        self
    }

    pub fn autocomplete_with(mut self, completer: Arc<dyn AutoCompleter>) -> Self {
        self.autocomplete_with = Some(completer);
        self
    }

    pub fn autocomplete_from<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.autocomplete_from = Some(suggestions.into_iter().map(Into::into).collect());
        self
    }

    /// Uses `converter` instead of searching the registry.
    pub fn convert_with(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }
}

/// Root slash command owning a cog's subcommands.
#[derive(Debug, Clone)]
pub struct SlashRoot {
    pub(crate) id: String,
    pub(crate) default_permissions: Option<Permissions>,
    pub(crate) guild_only: bool,
    pub(crate) nsfw: bool,
}

impl SlashRoot {
    pub fn new(id: impl Into<String>) -> Self {
        SlashRoot {
            id: id.into(),
            default_permissions: None,
            guild_only: false,
            nsfw: false,
        }
    }

    pub fn default_permissions(mut self, permissions: Permissions) -> Self {
        self.default_permissions = Some(permissions);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    pub fn nsfw(mut self) -> Self {
        self.nsfw = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Marker {
    Slash(String),
    Subcommand(String),
    Context(String, ContextKind),
}

pub struct HandlerSpec {
    pub(crate) method: String,
    pub(crate) markers: Vec<Marker>,
    pub(crate) namespace: Option<String>,
    pub(crate) guild: Option<GuildId>,
    pub(crate) default_permissions: Option<Permissions>,
    pub(crate) guild_only: bool,
    pub(crate) nsfw: bool,
    pub(crate) params: Vec<ParamSpec>,
    pub(crate) handle: Arc<dyn CommandHandle>,
}

impl HandlerSpec {
    pub fn new<F, Fut>(method: impl Into<String>, function: F) -> Self
    where
        F: Fn(Interaction, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, CommandError>> + Send + 'static,
    {
        Self::with_handle(method, handler(function))
    }

    pub fn with_handle(method: impl Into<String>, handle: Arc<dyn CommandHandle>) -> Self {
        HandlerSpec {
            method: method.into(),
            markers: Vec::new(),
            namespace: None,
            guild: None,
            default_permissions: None,
            guild_only: false,
            nsfw: false,
            params: Vec::new(),
            handle,
        }
    }

    pub fn slash(mut self, id: impl Into<String>) -> Self {
        self.markers.push(Marker::Slash(id.into()));
        self
    }

    /// Subcommand of the cog's root, as `sub` or `group.sub`.
    pub fn subcommand(mut self, id: impl Into<String>) -> Self {
        self.markers.push(Marker::Subcommand(id.into()));
        self
    }

    pub fn context(mut self, id: impl Into<String>, kind: ContextKind) -> Self {
        self.markers.push(Marker::Context(id.into(), kind));
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn guild(mut self, guild: GuildId) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn default_permissions(mut self, permissions: Permissions) -> Self {
        self.default_permissions = Some(permissions);
        self
    }

    pub fn guild_only(mut self) -> Self {
        self.guild_only = true;
        self
    }

    pub fn nsfw(mut self) -> Self {
        self.nsfw = true;
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }
}

/// A group of handlers sharing a namespace, scope and optional root command.
pub struct Cog {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) guild: Option<GuildId>,
    pub(crate) root: Option<SlashRoot>,
    pub(crate) handlers: Vec<HandlerSpec>,
}

impl Cog {
    pub fn new(name: impl Into<String>) -> Self {
        Cog {
            name: name.into(),
            namespace: None,
            guild: None,
            root: None,
            handlers: Vec::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn guild(mut self, guild: GuildId) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn root(mut self, root: SlashRoot) -> Self {
        self.root = Some(root);
        self
    }

    pub fn handler(mut self, handler: HandlerSpec) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
