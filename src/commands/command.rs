use async_trait::async_trait;
use serde::Serialize;
use serenity::model::id::GuildId;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use super::autocomplete::AutoCompleter;
use crate::converter::{downcast, Arg, ConverterChain, TypeTag};
use crate::error::CommandError;
use crate::interaction::{Interaction, InteractionKind, Member, OptionValue};
use crate::text::Text;

/// Wire value of a choice or a numeric bound.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Integer(i64),
    Number(f64),
    String(String),
}

impl From<i64> for ChoiceValue {
    fn from(value: i64) -> Self {
        ChoiceValue::Integer(value)
    }
}

impl From<f64> for ChoiceValue {
    fn from(value: f64) -> Self {
        ChoiceValue::Number(value)
    }
}

impl From<String> for ChoiceValue {
    fn from(value: String) -> Self {
        ChoiceValue::String(value)
    }
}

impl From<&str> for ChoiceValue {
    fn from(value: &str) -> Self {
        ChoiceValue::String(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Choice {
    pub name: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub name_localizations: HashMap<String, String>,
    pub value: ChoiceValue,
}

impl Choice {
    pub fn new(name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        Choice {
            name: name.into(),
            name_localizations: HashMap::new(),
            value: value.into(),
        }
    }
}

/// One option of a published command, including subcommands and groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionData {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub name_localizations: HashMap<String, String>,
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub description_localizations: HashMap<String, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<ChoiceValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<ChoiceValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionData>,
}

impl OptionData {
    pub fn new(kind: u8, name: impl Into<String>, description: impl Into<String>) -> Self {
        OptionData {
            kind,
            name: name.into(),
            name_localizations: HashMap::new(),
            description: description.into(),
            description_localizations: HashMap::new(),
            required: false,
            choices: Vec::new(),
            channel_types: Vec::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            autocomplete: false,
            options: Vec::new(),
        }
    }
}

/// Discord command type for chat input commands.
pub const CHAT_INPUT: u8 = 1;
/// Discord command type for user context menu commands.
pub const USER_CONTEXT: u8 = 2;
/// Discord command type for message context menu commands.
pub const MESSAGE_CONTEXT: u8 = 3;

/// A root command as published to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPayload {
    #[serde(rename = "type")]
    pub kind: u8,
    pub name: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub name_localizations: HashMap<String, String>,
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub description_localizations: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<String>,
    pub dm_permission: bool,
    pub nsfw: bool,
}

impl CommandPayload {
    pub fn new(kind: u8, name: impl Into<String>, description: impl Into<String>) -> Self {
        CommandPayload {
            kind,
            name: name.into(),
            name_localizations: HashMap::new(),
            description: description.into(),
            description_localizations: HashMap::new(),
            options: Vec::new(),
            default_member_permissions: None,
            dm_permission: true,
            nsfw: false,
        }
    }
}

/// Where a command sits in the platform's `root [group] [subcommand]` tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub root: CommandPayload,
    pub group: Option<OptionData>,
    pub subcommand: Option<OptionData>,
}

impl Branch {
    pub fn root(root: CommandPayload) -> Self {
        Branch {
            root,
            group: None,
            subcommand: None,
        }
    }

    /// Space-joined name the platform reports when the command is invoked.
    pub fn discord_name(&self) -> String {
        [
            Some(self.root.name.as_str()),
            self.group.as_ref().map(|group| group.name.as_str()),
            self.subcommand.as_ref().map(|sub| sub.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn is_standalone(&self) -> bool {
        self.subcommand.is_none()
    }
}

/// How one handler parameter gets its value.
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    pub(crate) parameter: String,
    pub(crate) chain: Arc<ConverterChain>,
    pub(crate) option_name: Option<String>,
    pub(crate) raw: TypeTag,
    pub(crate) target: TypeTag,
}

impl ParameterBinding {
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    /// `None` for contextual parameters.
    pub fn option_name(&self) -> Option<&str> {
        self.option_name.as_deref()
    }

    pub fn chain(&self) -> &ConverterChain {
        &self.chain
    }

    pub fn raw(&self) -> TypeTag {
        self.raw
    }

    pub fn target(&self) -> TypeTag {
        self.target
    }
}

/// Converted arguments, consumed in parameter order by the handler.
pub struct Arguments {
    values: Vec<Option<Arg>>,
    cursor: usize,
}

impl Arguments {
    pub fn new(values: Vec<Option<Arg>>) -> Self {
        Arguments { values, cursor: 0 }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes the next argument, failing if it was not provided.
    pub fn next<T: Any>(&mut self) -> Result<T, CommandError> {
        let position = self.cursor;
        self.next_optional::<T>()?
            .ok_or(CommandError::MissingArgument(position))
    }

    pub fn next_optional<T: Any>(&mut self) -> Result<Option<T>, CommandError> {
        let position = self.cursor;
        self.cursor += 1;
        match self.values.get_mut(position).and_then(Option::take) {
            Some(value) => downcast::<T>(value, position).map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("len", &self.values.len())
            .field("cursor", &self.cursor)
            .finish()
    }
}

/// Outgoing message assembled from a handler's response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reply {
    pub content: String,
    pub ephemeral: bool,
    pub embeds: Vec<serde_json::Value>,
    pub suppress_mentions: bool,
}

impl Reply {
    pub fn new(content: impl Into<String>) -> Self {
        Reply {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn ephemeral(content: impl Into<String>) -> Self {
        Reply {
            content: content.into(),
            ephemeral: true,
            ..Default::default()
        }
    }
}

pub type Modifier = Box<dyn FnOnce(&mut Reply) + Send>;

/// What a handler asks to be sent back.
pub enum Response {
    None,
    Text(Text),
    /// Text plus a hook that adjusts the outgoing reply.
    Message(Text, Modifier),
    Defer { ephemeral: bool },
}

impl Response {
    pub fn text(text: impl Into<Text>) -> Self {
        Response::Text(text.into())
    }

    pub fn ephemeral(text: impl Into<Text>) -> Self {
        Self::message(text, |reply| reply.ephemeral = true)
    }

    pub fn message(text: impl Into<Text>, modifier: impl FnOnce(&mut Reply) + Send + 'static) -> Self {
        Response::Message(text.into(), Box::new(modifier))
    }

    pub fn defer(ephemeral: bool) -> Self {
        Response::Defer { ephemeral }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::None => f.write_str("None"),
            Response::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Response::Message(text, _) => f.debug_tuple("Message").field(text).finish(),
            Response::Defer { ephemeral } => f.debug_struct("Defer").field("ephemeral", ephemeral).finish(),
        }
    }
}

impl From<Text> for Response {
    fn from(text: Text) -> Self {
        Response::Text(text)
    }
}

impl From<String> for Response {
    fn from(text: String) -> Self {
        Response::Text(Text::Literal(text))
    }
}

impl From<&str> for Response {
    fn from(text: &str) -> Self {
        Response::Text(Text::literal(text))
    }
}

impl From<()> for Response {
    fn from(_: ()) -> Self {
        Response::None
    }
}

impl From<bool> for Response {
    /// `true` defers ephemerally, `false` defers publicly.
    fn from(ephemeral: bool) -> Self {
        Response::Defer { ephemeral }
    }
}

#[async_trait]
pub trait CommandHandle: Send + Sync {
    async fn handle(&self, interaction: Interaction, arguments: Arguments) -> Result<Response, CommandError>;
}

struct FnHandle<F>(F);

#[async_trait]
impl<F, Fut> CommandHandle for FnHandle<F>
where
    F: Fn(Interaction, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, CommandError>> + Send + 'static,
{
    async fn handle(&self, interaction: Interaction, arguments: Arguments) -> Result<Response, CommandError> {
        (self.0)(interaction, arguments).await
    }
}

/// Wraps an async function as a [`CommandHandle`].
pub fn handler<F, Fut>(function: F) -> Arc<dyn CommandHandle>
where
    F: Fn(Interaction, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, CommandError>> + Send + 'static,
{
    Arc::new(FnHandle(function))
}

/// A fully built, immutable command.
pub struct Command {
    pub(crate) name: String,
    pub(crate) guild_id: Option<GuildId>,
    pub(crate) kind: InteractionKind,
    pub(crate) branch: Branch,
    pub(crate) bindings: Vec<ParameterBinding>,
    pub(crate) completers: HashMap<String, Arc<dyn AutoCompleter>>,
    pub(crate) handle: Arc<dyn CommandHandle>,
    pub(crate) source: String,
}

impl Command {
    /// Builds a command without bindings. Cogs go through the parser instead.
    pub fn new(
        name: impl Into<String>,
        kind: InteractionKind,
        branch: Branch,
        handle: Arc<dyn CommandHandle>,
    ) -> Self {
        let name = name.into();
        Command {
            source: name.clone(),
            name,
            guild_id: None,
            kind,
            branch,
            bindings: Vec::new(),
            completers: HashMap::new(),
            handle,
        }
    }

    pub fn in_guild(mut self, guild_id: GuildId) -> Self {
        self.guild_id = Some(guild_id);
        self
    }

    /// Dot-delimited identifier, e.g. `config.language`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn discord_name(&self) -> String {
        self.branch.discord_name()
    }

    pub fn guild_id(&self) -> Option<GuildId> {
        self.guild_id
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    pub fn branch(&self) -> &Branch {
        &self.branch
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    /// `Cog::method` the command was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn convert_arguments(&self, interaction: &Interaction) -> Result<Arguments, CommandError> {
        let mut values = Vec::with_capacity(self.bindings.len());
        for (position, binding) in self.bindings.iter().enumerate() {
            let raw = match &binding.option_name {
                None => Some(Box::new(crate::converter::Void) as Arg),
                Some(name) => interaction
                    .option(name)
                    .map(|value| raw_argument(value, binding.raw, position))
                    .transpose()?,
            };
            let value = raw
                .map(|raw| binding.chain.convert(interaction, raw))
                .transpose()?;
            values.push(value);
        }
        Ok(Arguments::new(values))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("discord_name", &self.discord_name())
            .field("guild_id", &self.guild_id)
            .field("kind", &self.kind)
            .field("bindings", &self.bindings.len())
            .finish()
    }
}

/// Boxes a platform value as the raw type its binding expects.
fn raw_argument(value: &OptionValue, raw: TypeTag, position: usize) -> Result<Arg, CommandError> {
    let arg: Arg = match value {
        OptionValue::String(value) => Box::new(value.clone()),
        OptionValue::Integer(value) if raw.is::<f64>() => Box::new(*value as f64),
        OptionValue::Integer(value) => Box::new(*value),
        OptionValue::Number(value) => Box::new(*value),
        OptionValue::Boolean(value) => Box::new(*value),
        OptionValue::User(_, member) if raw.is::<Member>() => Box::new(
            member
                .clone()
                .ok_or_else(|| CommandError::library("exception.member_not_found"))?,
        ),
        OptionValue::User(user, _) => Box::new(user.clone()),
        OptionValue::Channel(channel) => Box::new(channel.clone()),
        OptionValue::Role(role) => Box::new(role.clone()),
        OptionValue::Mentionable(mentionable) => Box::new(mentionable.clone()),
        OptionValue::Attachment(attachment) => Box::new(attachment.clone()),
    };
    if (*arg).type_id() != raw.id() {
        return Err(CommandError::UnexpectedArgument {
            position,
            expected: raw.name(),
        });
    }
    Ok(arg)
}
