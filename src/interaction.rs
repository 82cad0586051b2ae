//! Platform-neutral view of an inbound interaction.
//!
//! The gateway adapter flattens whatever the chat platform delivers into these
//! values so that conversion and dispatch never touch the client library.

use serenity::model::id::{AttachmentId, ChannelId, GuildId, MessageId, RoleId, UserId};
use std::collections::HashMap;

use crate::text::DEFAULT_LOCALE;

/// Shape of an interaction, also used as the shape a command expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Slash,
    User,
    Message,
    Autocomplete,
}

impl InteractionKind {
    /// Whether an interaction of this kind may be routed to a command expecting `expected`.
    pub fn matches(self, expected: InteractionKind) -> bool {
        match self {
            InteractionKind::Autocomplete => expected == InteractionKind::Slash,
            kind => kind == expected,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub bot: bool,
}

impl User {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        User {
            id: UserId(id),
            name: name.into(),
            bot: false,
        }
    }

    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub user: User,
    pub guild_id: GuildId,
    pub nick: Option<String>,
    pub roles: Vec<RoleId>,
}

impl Member {
    pub fn display_name(&self) -> &str {
        self.nick.as_deref().unwrap_or(&self.user.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

/// Discord channel types, carrying their wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Text,
    Private,
    Voice,
    Group,
    Category,
    News,
    NewsThread,
    PublicThread,
    PrivateThread,
    Stage,
    Directory,
    Forum,
    Unknown(u8),
}

impl ChannelKind {
    pub fn wire(self) -> u8 {
        match self {
            ChannelKind::Text => 0,
            ChannelKind::Private => 1,
            ChannelKind::Voice => 2,
            ChannelKind::Group => 3,
            ChannelKind::Category => 4,
            ChannelKind::News => 5,
            ChannelKind::NewsThread => 10,
            ChannelKind::PublicThread => 11,
            ChannelKind::PrivateThread => 12,
            ChannelKind::Stage => 13,
            ChannelKind::Directory => 14,
            ChannelKind::Forum => 15,
            ChannelKind::Unknown(value) => value,
        }
    }

    pub fn from_wire(value: u8) -> Self {
        match value {
            0 => ChannelKind::Text,
            1 => ChannelKind::Private,
            2 => ChannelKind::Voice,
            3 => ChannelKind::Group,
            4 => ChannelKind::Category,
            5 => ChannelKind::News,
            10 => ChannelKind::NewsThread,
            11 => ChannelKind::PublicThread,
            12 => ChannelKind::PrivateThread,
            13 => ChannelKind::Stage,
            14 => ChannelKind::Directory,
            15 => ChannelKind::Forum,
            other => ChannelKind::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: Option<String>,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub id: AttachmentId,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mentionable {
    User(User),
    Role(Role),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: User,
    pub content: String,
}

/// The entity a context-menu command was invoked on.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    User(User, Option<Member>),
    Message(TargetMessage),
}

/// Locale reported by the invoking client, e.g. `en-US`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Raw value of a single option as delivered by the platform.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(User, Option<Member>),
    Channel(Channel),
    Role(Role),
    Mentionable(Mentionable),
    Attachment(Attachment),
}

#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: u64,
    pub token: String,
    pub kind: InteractionKind,
    /// Space-joined compound name, e.g. `config language`.
    pub command_name: String,
    pub user: User,
    pub member: Option<Member>,
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub locale: String,
    pub options: HashMap<String, OptionValue>,
    /// Name and partial input of the focused option during autocomplete.
    pub focused: Option<(String, String)>,
    pub target: Option<Target>,
    pub resolved_members: HashMap<UserId, Member>,
}

impl Interaction {
    pub fn new(kind: InteractionKind, command_name: impl Into<String>, user: User) -> Self {
        Interaction {
            id: 0,
            token: String::new(),
            kind,
            command_name: command_name.into(),
            user,
            member: None,
            guild_id: None,
            channel_id: ChannelId(0),
            locale: DEFAULT_LOCALE.to_string(),
            options: HashMap::new(),
            focused: None,
            target: None,
            resolved_members: HashMap::new(),
        }
    }

    pub fn in_guild(mut self, guild_id: GuildId) -> Self {
        self.member = Some(Member {
            user: self.user.clone(),
            guild_id,
            nick: None,
            roles: Vec::new(),
        });
        self.guild_id = Some(guild_id);
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: OptionValue) -> Self {
        if let OptionValue::User(user, Some(member)) = &value {
            self.resolved_members.insert(user.id, member.clone());
        }
        self.options.insert(name.into(), value);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    pub fn with_focused(mut self, name: impl Into<String>, partial: impl Into<String>) -> Self {
        self.focused = Some((name.into(), partial.into()));
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }
}
