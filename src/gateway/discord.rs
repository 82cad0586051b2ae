//! [`Gateway`] backed by serenity's HTTP client, plus conversion of serenity's
//! interaction models into [`Interaction`]s.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use log::{debug, info};
use serenity::http::Http;
use serenity::model::application::command::{CommandOptionType, CommandType};
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandData, CommandDataOption, CommandDataOptionValue, ResolvedTarget,
};
use serenity::model::application::interaction::autocomplete::AutocompleteInteraction;
use serenity::model::guild::PartialMember;
use serenity::model::id::{ChannelId, GuildId};
use serenity::model::user::User as DiscordUser;
use std::collections::HashMap;
use std::sync::Arc;

use super::{autocomplete_body, defer_body, reply_body, Gateway, InteractionResponse};
use crate::commands::{Choice, CommandPayload, Reply};
use crate::interaction::{
    Attachment, Channel, ChannelKind, Interaction, InteractionKind, Member, Mentionable, OptionValue, Role, Target,
    TargetMessage, User,
};

pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordGateway { http }
    }

    /// Command endpoints are keyed by application id, known once the bot is ready.
    pub fn set_application_id(&self, application_id: u64) {
        self.http.set_application_id(application_id);
    }

    async fn respond(&self, interaction: &Interaction, body: InteractionResponse) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.http
            .create_interaction_response(interaction.id, &interaction.token, &body)
            .await
            .with_context(|| format!("failed to respond to interaction {}", interaction.id))
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn reply(&self, interaction: &Interaction, reply: Reply) -> Result<()> {
        self.respond(interaction, reply_body(&reply)).await
    }

    async fn defer(&self, interaction: &Interaction, ephemeral: bool) -> Result<()> {
        self.respond(interaction, defer_body(ephemeral)).await
    }

    async fn suggest(&self, interaction: &Interaction, choices: Vec<Choice>) -> Result<()> {
        self.respond(interaction, autocomplete_body(&choices)).await
    }

    async fn replace_commands(&self, scope: Option<GuildId>, commands: Vec<CommandPayload>) -> Result<()> {
        let count = commands.len();
        let body = serde_json::to_value(&commands)?;
        let published = match scope {
            Some(guild) => self.http.create_guild_application_commands(guild.0, &body).await,
            None => self.http.create_global_application_commands(&body).await,
        }
        .with_context(|| format!("failed to publish {} command(s) to {:?}", count, scope))?;
        info!("📋 Published {} command(s) to {:?}", published.len(), scope);
        Ok(())
    }

    async fn upsert_command(&self, scope: Option<GuildId>, command: CommandPayload) -> Result<()> {
        let body = serde_json::to_value(&command)?;
        match scope {
            Some(guild) => self.http.create_guild_application_command(guild.0, &body).await,
            None => self.http.create_global_application_command(&body).await,
        }
        .with_context(|| format!("failed to upsert command '{}'", command.name))?;
        debug!("Upserted command '{}' in {:?}", command.name, scope);
        Ok(())
    }
}

fn user(user: &DiscordUser) -> User {
    User {
        id: user.id,
        name: user.name.clone(),
        bot: user.bot,
    }
}

fn partial_member(user: &User, member: &PartialMember, guild_id: Option<GuildId>) -> Option<Member> {
    Some(Member {
        user: user.clone(),
        guild_id: member.guild_id.or(guild_id)?,
        nick: member.nick.clone(),
        roles: member.roles.clone(),
    })
}

fn channel_kind(kind: serenity::model::channel::ChannelType) -> ChannelKind {
    u8::try_from(kind.num()).map_or(ChannelKind::Unknown(u8::MAX), ChannelKind::from_wire)
}

fn kind_of(kind: CommandType) -> InteractionKind {
    match kind {
        CommandType::User => InteractionKind::User,
        CommandType::Message => InteractionKind::Message,
        _ => InteractionKind::Slash,
    }
}

struct Source<'a> {
    id: u64,
    token: &'a str,
    data: &'a CommandData,
    guild_id: Option<GuildId>,
    channel_id: ChannelId,
    member: Option<&'a serenity::model::guild::Member>,
    user: &'a DiscordUser,
    locale: &'a str,
}

impl From<&ApplicationCommandInteraction> for Interaction {
    fn from(command: &ApplicationCommandInteraction) -> Self {
        convert(
            kind_of(command.data.kind),
            Source {
                id: command.id.0,
                token: &command.token,
                data: &command.data,
                guild_id: command.guild_id,
                channel_id: command.channel_id,
                member: command.member.as_ref(),
                user: &command.user,
                locale: &command.locale,
            },
        )
    }
}

impl From<&AutocompleteInteraction> for Interaction {
    fn from(autocomplete: &AutocompleteInteraction) -> Self {
        convert(
            InteractionKind::Autocomplete,
            Source {
                id: autocomplete.id.0,
                token: &autocomplete.token,
                data: &autocomplete.data,
                guild_id: autocomplete.guild_id,
                channel_id: autocomplete.channel_id,
                member: autocomplete.member.as_ref(),
                user: &autocomplete.user,
                locale: &autocomplete.locale,
            },
        )
    }
}

fn convert(kind: InteractionKind, source: Source<'_>) -> Interaction {
    let invoker = user(source.user);
    let mut interaction = Interaction::new(kind, source.data.name.clone(), invoker.clone());
    interaction.id = source.id;
    interaction.token = source.token.to_string();
    interaction.guild_id = source.guild_id;
    interaction.channel_id = source.channel_id;
    interaction.locale = source.locale.to_string();
    interaction.member = source.member.map(|member| Member {
        user: invoker,
        guild_id: member.guild_id,
        nick: member.nick.clone(),
        roles: member.roles.clone(),
    });

    let resolved = &source.data.resolved;
    for (id, member) in &resolved.members {
        if let Some(resolved_user) = resolved.users.get(id) {
            if let Some(member) = partial_member(&user(resolved_user), member, source.guild_id) {
                interaction.resolved_members.insert(*id, member);
            }
        }
    }

    let mut path = vec![source.data.name.clone()];
    collect_options(&source.data.options, &mut path, &mut interaction);
    interaction.command_name = path.join(" ");

    #[allow(unreachable_patterns)]
    let target = source.data.target().and_then(|target| match target {
        ResolvedTarget::User(target_user, member) => {
            let target_user = user(&target_user);
            let member = member.and_then(|member| partial_member(&target_user, &member, source.guild_id));
            Some(Target::User(target_user, member))
        }
        ResolvedTarget::Message(message) => Some(Target::Message(TargetMessage {
            id: message.id,
            channel_id: message.channel_id,
            author: user(&message.author),
            content: message.content,
        })),
        _ => None,
    });
    interaction.target = target;

    interaction
}

/// Walks subcommand and group levels, extending `path` and collecting leaves.
fn collect_options(options: &[CommandDataOption], path: &mut Vec<String>, interaction: &mut Interaction) {
    for option in options {
        match option.kind {
            CommandOptionType::SubCommand | CommandOptionType::SubCommandGroup => {
                path.push(option.name.clone());
                collect_options(&option.options, path, interaction);
            }
            _ => {
                if option.focused {
                    let partial = option
                        .value
                        .as_ref()
                        .map(|value| value.as_str().map_or_else(|| value.to_string(), str::to_string))
                        .unwrap_or_default();
                    interaction.focused = Some((option.name.clone(), partial));
                }
                let value = option.resolved.as_ref().and_then(|value| {
                    option_value(value, option.kind, interaction.guild_id, &interaction.resolved_members)
                });
                if let Some(value) = value {
                    interaction.options.insert(option.name.clone(), value);
                }
            }
        }
    }
}

fn option_value(
    value: &CommandDataOptionValue,
    kind: CommandOptionType,
    guild_id: Option<GuildId>,
    members: &HashMap<serenity::model::id::UserId, Member>,
) -> Option<OptionValue> {
    let value = match value {
        CommandDataOptionValue::String(value) => OptionValue::String(value.clone()),
        CommandDataOptionValue::Integer(value) => OptionValue::Integer(*value),
        CommandDataOptionValue::Number(value) => OptionValue::Number(*value),
        CommandDataOptionValue::Boolean(value) => OptionValue::Boolean(*value),
        CommandDataOptionValue::User(resolved_user, member) => {
            let resolved_user = user(resolved_user);
            let member = members.get(&resolved_user.id).cloned().or_else(|| {
                member
                    .as_ref()
                    .and_then(|member| partial_member(&resolved_user, member, guild_id))
            });
            if kind == CommandOptionType::Mentionable {
                OptionValue::Mentionable(Mentionable::User(resolved_user))
            } else {
                OptionValue::User(resolved_user, member)
            }
        }
        CommandDataOptionValue::Role(role) => {
            let role = Role {
                id: role.id,
                name: role.name.clone(),
            };
            if kind == CommandOptionType::Mentionable {
                OptionValue::Mentionable(Mentionable::Role(role))
            } else {
                OptionValue::Role(role)
            }
        }
        CommandDataOptionValue::Channel(channel) => OptionValue::Channel(Channel {
            id: channel.id,
            name: channel.name.clone(),
            kind: channel_kind(channel.kind),
        }),
        CommandDataOptionValue::Attachment(attachment) => OptionValue::Attachment(Attachment {
            id: attachment.id,
            filename: attachment.filename.clone(),
            url: attachment.url.clone(),
            size: attachment.size,
        }),
        _ => return None,
    };
    Some(value)
}
