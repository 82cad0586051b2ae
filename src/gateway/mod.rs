//! Outbound side of the platform: replies, deferrals, autocomplete results and
//! command publication.
//!
//! The command manager only talks to a [`Gateway`], so dispatch can be driven
//! and observed without a live connection.

pub mod discord;

pub use discord::DiscordGateway;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use serenity::model::id::GuildId;

use crate::commands::{Choice, CommandPayload, Reply};
use crate::interaction::Interaction;

// Discord interaction response types
pub const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;
pub const DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE: u8 = 5;
pub const APPLICATION_COMMAND_AUTOCOMPLETE_RESULT: u8 = 8;

/// Message flag hiding a reply from everyone but the invoker.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn reply(&self, interaction: &Interaction, reply: Reply) -> Result<()>;

    async fn defer(&self, interaction: &Interaction, ephemeral: bool) -> Result<()>;

    async fn suggest(&self, interaction: &Interaction, choices: Vec<Choice>) -> Result<()>;

    /// Replaces every command of `scope` with `commands`.
    async fn replace_commands(&self, scope: Option<GuildId>, commands: Vec<CommandPayload>) -> Result<()>;

    /// Creates or overwrites a single root command.
    async fn upsert_command(&self, scope: Option<GuildId>, command: CommandPayload) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub response_type: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

fn flags(ephemeral: bool) -> u64 {
    if ephemeral {
        EPHEMERAL_FLAG
    } else {
        0
    }
}

pub fn reply_body(reply: &Reply) -> InteractionResponse {
    let mut data = json!({
        "content": reply.content,
        "flags": flags(reply.ephemeral),
    });
    if !reply.embeds.is_empty() {
        data["embeds"] = Value::Array(reply.embeds.clone());
    }
    if reply.suppress_mentions {
        data["allowed_mentions"] = json!({ "parse": [] });
    }
    InteractionResponse {
        response_type: CHANNEL_MESSAGE_WITH_SOURCE,
        data: Some(data),
    }
}

pub fn defer_body(ephemeral: bool) -> InteractionResponse {
    InteractionResponse {
        response_type: DEFERRED_CHANNEL_MESSAGE_WITH_SOURCE,
        data: Some(json!({ "flags": flags(ephemeral) })),
    }
}

pub fn autocomplete_body(choices: &[Choice]) -> InteractionResponse {
    InteractionResponse {
        response_type: APPLICATION_COMMAND_AUTOCOMPLETE_RESULT,
        data: Some(json!({ "choices": choices })),
    }
}
