//! # Feature: Command Parser
//!
//! Turns [`Cog`]s into immutable [`Command`]s. Display strings are looked up
//! in the resolved namespace, parameters are bound to converter chains, and
//! option metadata is validated against the option's wire type. A handler that
//! fails any check is logged and skipped without affecting its siblings.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Option order, uniqueness and count checks
//! - 1.0.0: Slash, subcommand and context-menu handlers

use log::{debug, warn};
use serenity::model::id::GuildId;
use serenity::model::permissions::Permissions;
use std::collections::HashMap;
use std::sync::Arc;

use super::autocomplete::{AutoCompleter, StaticCompleter, MAX_CHOICES};
use super::builder::{
    Cog, ContextKind, HandlerSpec, Marker, OptionKind, OptionRange, ParamSpec, SlashRoot, SUB_COMMAND,
    SUB_COMMAND_GROUP,
};
use super::command::{
    Branch, Choice, ChoiceValue, Command, CommandPayload, OptionData, ParameterBinding, CHAT_INPUT,
    MESSAGE_CONTEXT, USER_CONTEXT,
};
use crate::converter::{ConverterChain, ConverterRegistry, TypeTag, Void};
use crate::error::BuildError;
use crate::interaction::{Attachment, Channel, InteractionKind, Member, Mentionable, Role, User};
use crate::text::Translator;

/// Most options a single command or subcommand may declare.
pub const MAX_OPTIONS: usize = 25;

/// Cog-level settings shared by every handler of one cog.
struct CogScope {
    name: String,
    namespace: String,
    guild: Option<GuildId>,
    root: Option<SlashRoot>,
}

/// Per-command context used while building its options.
struct OptionScope<'a> {
    command_id: &'a str,
    namespace: &'a str,
}

#[derive(Default)]
struct Options {
    data: Vec<OptionData>,
    completers: HashMap<String, Arc<dyn AutoCompleter>>,
}

pub struct CommandParser {
    converters: Arc<ConverterRegistry>,
    translator: Arc<dyn Translator>,
    namespace: String,
}

impl CommandParser {
    pub fn new(
        converters: Arc<ConverterRegistry>,
        translator: Arc<dyn Translator>,
        namespace: impl Into<String>,
    ) -> Self {
        CommandParser {
            converters,
            translator,
            namespace: namespace.into(),
        }
    }

    pub fn converters(&self) -> &Arc<ConverterRegistry> {
        &self.converters
    }

    /// Builds every handler, logging and dropping the ones that fail.
    pub fn parse(&self, cog: Cog) -> Vec<Command> {
        let cog_name = cog.name.clone();
        self.parse_all(cog)
            .into_iter()
            .filter_map(|(method, result)| match result {
                Ok(command) => {
                    debug!("Built command '{}' from {}::{}", command.name(), cog_name, method);
                    Some(command)
                }
                Err(e) => {
                    warn!("⚠️ Skipping {}::{}: {}", cog_name, method, e);
                    None
                }
            })
            .collect()
    }

    /// Builds every handler, keeping each outcome next to its method name.
    pub fn parse_all(&self, cog: Cog) -> Vec<(String, Result<Command, BuildError>)> {
        let Cog {
            name,
            namespace,
            guild,
            root,
            handlers,
        } = cog;
        let scope = CogScope {
            name,
            namespace: namespace.unwrap_or_else(|| self.namespace.clone()),
            guild,
            root,
        };

        let mut groups = HashMap::new();
        handlers
            .into_iter()
            .map(|handler| {
                let method = handler.method.clone();
                (method, self.build(&scope, handler, &mut groups))
            })
            .collect()
    }

    fn build(
        &self,
        cog: &CogScope,
        handler: HandlerSpec,
        groups: &mut HashMap<String, OptionData>,
    ) -> Result<Command, BuildError> {
        if handler.markers.len() != 1 {
            return Err(BuildError::MarkerCount {
                handler: handler.method.clone(),
                found: handler.markers.len(),
            });
        }

        let namespace = handler
            .namespace
            .clone()
            .unwrap_or_else(|| cog.namespace.clone());
        let marker = handler.markers[0].clone();

        let (id, kind, branch, options) = match marker {
            Marker::Context(id, context) => {
                let (kind, payload_kind) = match context {
                    ContextKind::User => (InteractionKind::User, USER_CONTEXT),
                    ContextKind::Message => (InteractionKind::Message, MESSAGE_CONTEXT),
                };
                if let Some(param) = handler.params.iter().find(|param| !param.contextual) {
                    return Err(BuildError::InvalidOption {
                        option: param.name.clone(),
                        reason: "context-menu commands only take contextual parameters".to_string(),
                    });
                }
                let mut root = CommandPayload::new(payload_kind, self.required(&namespace, &format!("{}.name", id))?, "");
                root.name_localizations = self.localized(&namespace, &format!("{}.name", id));
                apply_flags(&mut root, handler.default_permissions, handler.guild_only, handler.nsfw);
                (id, kind, Branch::root(root), Options::default())
            }
            Marker::Slash(id) => {
                let mut root = self.chat_input(&namespace, &id)?;
                apply_flags(&mut root, handler.default_permissions, handler.guild_only, handler.nsfw);
                (id, InteractionKind::Slash, Branch::root(root), Options::default())
            }
            Marker::Subcommand(relative) => {
                let parent = cog.root.as_ref().ok_or_else(|| BuildError::OrphanSubcommand {
                    handler: handler.method.clone(),
                })?;
                let id = format!("{}.{}", parent.id, relative);
                let parts: Vec<&str> = id.split('.').collect();
                if !(2..=3).contains(&parts.len()) || parts.iter().any(|part| part.is_empty()) {
                    return Err(BuildError::MalformedSubcommandId(id));
                }

                let mut root = self.chat_input(&cog.namespace, &parent.id)?;
                apply_flags(&mut root, parent.default_permissions, parent.guild_only, parent.nsfw);

                let group = if parts.len() == 3 {
                    let group_id = format!("{}.{}", parts[0], parts[1]);
                    Some(self.group(&cog.namespace, &group_id, groups)?)
                } else {
                    None
                };
                let subcommand = OptionData {
                    name_localizations: self.localized(&namespace, &format!("{}.name", id)),
                    description_localizations: self.localized(&namespace, &format!("{}.description", id)),
                    ..OptionData::new(
                        SUB_COMMAND,
                        self.required(&namespace, &format!("{}.name", id))?,
                        self.required(&namespace, &format!("{}.description", id))?,
                    )
                };
                let branch = Branch {
                    root,
                    group,
                    subcommand: Some(subcommand),
                };
                (id, InteractionKind::Slash, branch, Options::default())
            }
        };

        let HandlerSpec {
            method,
            guild,
            params,
            handle,
            ..
        } = handler;

        let scope = OptionScope {
            command_id: &id,
            namespace: &namespace,
        };
        let mut options = options;
        let bindings = params
            .into_iter()
            .map(|param| self.bind(&scope, param, &mut options))
            .collect::<Result<Vec<_>, _>>()?;

        let mut branch = branch;
        match branch.subcommand.as_mut() {
            Some(subcommand) => subcommand.options = options.data,
            None => branch.root.options = options.data,
        }

        Ok(Command {
            name: id,
            guild_id: guild.or(cog.guild),
            kind,
            branch,
            bindings,
            completers: options.completers,
            handle,
            source: format!("{}::{}", cog.name, method),
        })
    }

    fn required(&self, namespace: &str, key: &str) -> Result<String, BuildError> {
        self.translator
            .required_string(namespace, key, self.translator.default_locale())
    }

    fn localized(&self, namespace: &str, key: &str) -> HashMap<String, String> {
        self.translator.discord_translations(namespace, key)
    }

    fn chat_input(&self, namespace: &str, id: &str) -> Result<CommandPayload, BuildError> {
        let name_key = format!("{}.name", id);
        let description_key = format!("{}.description", id);
        let mut payload = CommandPayload::new(
            CHAT_INPUT,
            self.required(namespace, &name_key)?,
            self.required(namespace, &description_key)?,
        );
        payload.name_localizations = self.localized(namespace, &name_key);
        payload.description_localizations = self.localized(namespace, &description_key);
        Ok(payload)
    }

    fn group(
        &self,
        namespace: &str,
        group_id: &str,
        groups: &mut HashMap<String, OptionData>,
    ) -> Result<OptionData, BuildError> {
        let name = self.required(namespace, &format!("{}.name", group_id))?;
        if let Some(existing) = groups.get(&name) {
            return Ok(existing.clone());
        }
        let group = OptionData {
            name_localizations: self.localized(namespace, &format!("{}.name", group_id)),
            description_localizations: self.localized(namespace, &format!("{}.description", group_id)),
            ..OptionData::new(
                SUB_COMMAND_GROUP,
                name.clone(),
                self.required(namespace, &format!("{}.description", group_id))?,
            )
        };
        groups.insert(name, group.clone());
        Ok(group)
    }

    fn bind(&self, scope: &OptionScope<'_>, param: ParamSpec, options: &mut Options) -> Result<ParameterBinding, BuildError> {
        match (param.contextual, param.option.clone()) {
            (true, Some(_)) => Err(BuildError::ConflictingParameter { parameter: param.name }),
            (false, None) => Err(BuildError::UnboundParameter { parameter: param.name }),
            (true, None) => {
                let void = TypeTag::of::<Void>();
                let chain = self.chain(scope, &param, void)?;
                Ok(ParameterBinding {
                    parameter: param.name,
                    chain,
                    option_name: None,
                    raw: void,
                    target: param.target,
                })
            }
            (false, Some(option_id)) => {
                let (kind, raw) = self.input_kind(&param);
                let chain = self.chain(scope, &param, raw)?;
                let (data, completer) = self.option(scope, &option_id, kind, &param)?;
                if let Err(reason) = placement(&options.data, &data) {
                    return Err(BuildError::InvalidOption {
                        option: format!("{}.options.{}", scope.command_id, option_id),
                        reason,
                    });
                }
                let option_name = data.name.clone();
                if let Some(completer) = completer {
                    options.completers.insert(option_name.clone(), completer);
                }
                options.data.push(data);
                Ok(ParameterBinding {
                    parameter: param.name,
                    chain,
                    option_name: Some(option_name),
                    raw,
                    target: param.target,
                })
            }
        }
    }

    fn chain(&self, scope: &OptionScope<'_>, param: &ParamSpec, raw: TypeTag) -> Result<Arc<ConverterChain>, BuildError> {
        if let Some(converter) = &param.converter {
            if !self.converters.is_assignable(converter.output(), param.target) {
                return Err(BuildError::ConverterMismatch {
                    parameter: param.name.clone(),
                    produced: converter.output().name(),
                    expected: param.target.name(),
                });
            }
            if !self.converters.is_assignable(raw, converter.input()) {
                return Err(BuildError::ConverterMismatch {
                    parameter: param.name.clone(),
                    produced: raw.name(),
                    expected: converter.input().name(),
                });
            }
            return Ok(Arc::new(ConverterChain::single(
                Arc::new(converter.clone()),
                raw,
                param.target,
            )));
        }

        self.converters
            .find_chain(raw, param.target)
            .ok_or_else(|| BuildError::MissingConverter {
                command: scope.command_id.to_string(),
                parameter: param.name.clone(),
                from: raw.name(),
                to: param.target.name(),
            })
    }

    /// Wire kind and raw input type for an option parameter.
    fn input_kind(&self, param: &ParamSpec) -> (OptionKind, TypeTag) {
        let wants_member = |target: TypeTag| self.converters.is_assignable(target, TypeTag::of::<Member>());
        match param.kind {
            OptionKind::String => (OptionKind::String, TypeTag::of::<String>()),
            OptionKind::Integer => (OptionKind::Integer, TypeTag::of::<i64>()),
            OptionKind::Number => (OptionKind::Number, TypeTag::of::<f64>()),
            OptionKind::Boolean => (OptionKind::Boolean, TypeTag::of::<bool>()),
            OptionKind::User if wants_member(param.target) => (OptionKind::User, TypeTag::of::<Member>()),
            OptionKind::User => (OptionKind::User, TypeTag::of::<User>()),
            OptionKind::Channel => (OptionKind::Channel, TypeTag::of::<Channel>()),
            OptionKind::Role => (OptionKind::Role, TypeTag::of::<Role>()),
            OptionKind::Mentionable => (OptionKind::Mentionable, TypeTag::of::<Mentionable>()),
            OptionKind::Attachment => (OptionKind::Attachment, TypeTag::of::<Attachment>()),
            OptionKind::Unknown => {
                let source = param
                    .converter
                    .as_ref()
                    .map_or(param.target, |converter| converter.input());
                guess_kind(source)
            }
        }
    }

    fn option(
        &self,
        scope: &OptionScope<'_>,
        option_id: &str,
        kind: OptionKind,
        param: &ParamSpec,
    ) -> Result<(OptionData, Option<Arc<dyn AutoCompleter>>), BuildError> {
        let prefix = format!("{}.options.{}", scope.command_id, option_id);
        let invalid = |reason: &str| BuildError::InvalidOption {
            option: prefix.clone(),
            reason: reason.to_string(),
        };

        let name_key = format!("{}.name", prefix);
        let description_key = format!("{}.description", prefix);
        let mut data = OptionData::new(
            kind.wire(),
            self.required(scope.namespace, &name_key)?,
            self.required(scope.namespace, &description_key)?,
        );
        data.name_localizations = self.localized(scope.namespace, &name_key);
        data.description_localizations = self.localized(scope.namespace, &description_key);
        data.required = param.required;

        match (&param.range, kind) {
            (None, _) => {}
            (Some(OptionRange::Integer { min, max }), OptionKind::Integer) => {
                data.min_value = min.map(ChoiceValue::Integer);
                data.max_value = max.map(ChoiceValue::Integer);
            }
            (Some(OptionRange::Integer { min, max }), OptionKind::Number) => {
                data.min_value = min.map(|value| ChoiceValue::Number(value as f64));
                data.max_value = max.map(|value| ChoiceValue::Number(value as f64));
            }
            (Some(OptionRange::Number { min, max }), OptionKind::Number) => {
                data.min_value = min.map(ChoiceValue::Number);
                data.max_value = max.map(ChoiceValue::Number);
            }
            (Some(OptionRange::Length { min, max }), OptionKind::String) => {
                data.min_length = *min;
                data.max_length = *max;
            }
            (Some(_), _) => {
                return Err(invalid("range does not fit the option type"));
            }
        }

        if !param.channel_types.is_empty() {
            if kind != OptionKind::Channel {
                return Err(invalid("channel types require a channel option"));
            }
            data.channel_types = param.channel_types.iter().map(|kind| kind.wire()).collect();
        }

        if !param.choices.is_empty() {
            if !kind.supports_choices() {
                return Err(invalid("choices require a string, integer or number option"));
            }
            if param.choices.len() > MAX_CHOICES {
                return Err(invalid("too many choices"));
            }
            for (choice_id, value) in &param.choices {
                let fits = matches!(
                    (kind, value),
                    (OptionKind::String, ChoiceValue::String(_))
                        | (OptionKind::Integer, ChoiceValue::Integer(_))
                        | (OptionKind::Number, ChoiceValue::Number(_))
                        | (OptionKind::Number, ChoiceValue::Integer(_))
                );
                if !fits {
                    return Err(invalid("choice value does not match the option type"));
                }
                let key = format!("{}.choices.{}.name", prefix, choice_id);
                let mut choice = Choice::new(self.required(scope.namespace, &key)?, value.clone());
                choice.name_localizations = self.localized(scope.namespace, &key);
                data.choices.push(choice);
            }
        }

        let completer: Option<Arc<dyn AutoCompleter>> = match (&param.autocomplete_with, &param.autocomplete_from) {
            (Some(_), Some(_)) => {
                return Err(invalid("autocomplete_with and autocomplete_from are mutually exclusive"));
            }
            (Some(completer), None) => Some(completer.clone()),
            (None, Some(suggestions)) => Some(Arc::new(StaticCompleter::new(suggestions.clone()))),
            (None, None) => None,
        };
        if completer.is_some() {
            if !kind.supports_choices() {
                return Err(invalid("autocomplete requires a string, integer or number option"));
            }
            if !data.choices.is_empty() {
                return Err(invalid("an option cannot have both choices and autocomplete"));
            }
            data.autocomplete = true;
        }

        Ok((data, completer))
    }
}

fn apply_flags(payload: &mut CommandPayload, permissions: Option<Permissions>, guild_only: bool, nsfw: bool) {
    payload.default_member_permissions = permissions.map(|permissions| permissions.bits().to_string());
    payload.dm_permission = !guild_only;
    payload.nsfw = nsfw;
}

/// Checks where `option` would land among the options already declared.
fn placement(existing: &[OptionData], option: &OptionData) -> Result<(), String> {
    if existing.iter().any(|other| other.name == option.name) {
        return Err(format!("option name '{}' is already taken", option.name));
    }
    if existing.len() >= MAX_OPTIONS {
        return Err(format!("a command cannot have more than {} options", MAX_OPTIONS));
    }
    if option.required && existing.iter().any(|other| !other.required) {
        return Err("required options must come before optional ones".to_string());
    }
    Ok(())
}

fn guess_kind(target: TypeTag) -> (OptionKind, TypeTag) {
    let kind = if target.is::<i64>() || target.is::<i32>() || target.is::<i16>() || target.is::<i8>() {
        OptionKind::Integer
    } else if target.is::<f64>() || target.is::<f32>() {
        OptionKind::Number
    } else if target.is::<bool>() {
        OptionKind::Boolean
    } else if target.is::<Member>() || target.is::<User>() {
        return (OptionKind::User, target);
    } else if target.is::<Channel>() {
        OptionKind::Channel
    } else if target.is::<Role>() {
        OptionKind::Role
    } else if target.is::<Mentionable>() {
        OptionKind::Mentionable
    } else if target.is::<Attachment>() {
        OptionKind::Attachment
    } else {
        OptionKind::String
    };

    let raw = match kind {
        OptionKind::Integer => TypeTag::of::<i64>(),
        OptionKind::Number => TypeTag::of::<f64>(),
        OptionKind::Boolean => TypeTag::of::<bool>(),
        OptionKind::Channel => TypeTag::of::<Channel>(),
        OptionKind::Role => TypeTag::of::<Role>(),
        OptionKind::Mentionable => TypeTag::of::<Mentionable>(),
        OptionKind::Attachment => TypeTag::of::<Attachment>(),
        _ => TypeTag::of::<String>(),
    };
    (kind, raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::builder::HandlerSpec;
    use crate::commands::command::{Arguments, Response};
    use crate::error::CommandError;
    use crate::interaction::{ChannelKind, Interaction};
    use crate::text::StaticTranslations;
    use chrono::Duration;

    async fn noop(_: Interaction, _: Arguments) -> Result<Response, CommandError> {
        Ok(Response::None)
    }

    fn translations() -> StaticTranslations {
        let mut translations = StaticTranslations::default();
        for (key, value) in [
            ("ping.name", "ping"),
            ("ping.description", "Check that the bot is alive"),
            ("remind.name", "remind"),
            ("remind.description", "Set a reminder"),
            ("remind.options.delay.name", "in"),
            ("remind.options.delay.description", "When to remind you"),
            ("remind.options.note.name", "note"),
            ("remind.options.note.description", "What to remind you about"),
            ("remind.options.unit.name", "unit"),
            ("remind.options.unit.description", "Unit"),
            ("remind.options.unit.choices.minutes.name", "Minutes"),
            ("remind.options.count.name", "count"),
            ("remind.options.count.description", "How many"),
            ("config.name", "config"),
            ("config.description", "Server settings"),
            ("config.language.name", "language"),
            ("config.language.description", "Change the language"),
            ("config.language.options.locale.name", "locale"),
            ("config.language.options.locale.description", "Language to use"),
            ("config.user.name", "user"),
            ("config.user.description", "Per-user settings"),
            ("config.user.timezone.name", "timezone"),
            ("config.user.timezone.description", "Change your time zone"),
            ("whois.name", "Who is this?"),
        ] {
            translations.insert("bot", "en-US", key, value);
        }
        translations.insert("bot", "fr", "ping.name", "sonde");
        translations
    }

    fn parser() -> CommandParser {
        parser_with(translations())
    }

    fn parser_with(translations: StaticTranslations) -> CommandParser {
        let translator: Arc<dyn Translator> = Arc::new(translations);
        let converters = Arc::new(ConverterRegistry::with_defaults(translator.clone()).unwrap());
        CommandParser::new(converters, translator, "bot")
    }

    fn only_error(parser: &CommandParser, cog: Cog) -> BuildError {
        let mut results = parser.parse_all(cog);
        assert_eq!(results.len(), 1);
        match results.remove(0).1 {
            Err(e) => e,
            Ok(command) => panic!("expected an error, built {:?}", command),
        }
    }

    #[test]
    fn test_slash_command_with_localizations() {
        let commands = parser().parse(Cog::new("Utility").handler(HandlerSpec::new("ping", noop).slash("ping")));
        assert_eq!(commands.len(), 1);
        let ping = &commands[0];
        assert_eq!(ping.name(), "ping");
        assert_eq!(ping.discord_name(), "ping");
        assert_eq!(ping.kind(), InteractionKind::Slash);
        assert_eq!(ping.source(), "Utility::ping");
        assert_eq!(
            ping.branch().root.name_localizations.get("fr").map(String::as_str),
            Some("sonde")
        );
    }

    #[test]
    fn test_options_bind_converters_and_metadata() {
        let cog = Cog::new("Reminders").handler(
            HandlerSpec::new("remind", noop)
                .slash("remind")
                .param(ParamSpec::of::<User>("user").contextual())
                .param(ParamSpec::of::<Duration>("delay").option("delay"))
                .param(ParamSpec::of::<String>("note").option("note").optional().length_range(Some(1), Some(200)))
                .param(ParamSpec::of::<i32>("count").option("count").optional().int_range(Some(1), Some(5))),
        );
        let commands = parser().parse(cog);
        assert_eq!(commands.len(), 1);
        let remind = &commands[0];

        let bindings = remind.bindings();
        assert_eq!(bindings.len(), 4);
        assert_eq!(bindings[0].option_name(), None);
        assert!(bindings[0].raw().is::<Void>());
        assert_eq!(bindings[1].option_name(), Some("in"));
        assert!(bindings[1].raw().is::<String>());
        assert!(bindings[3].raw().is::<i64>());

        let options = &remind.branch().root.options;
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].kind, 3);
        assert!(options[0].required);
        assert_eq!(options[1].max_length, Some(200));
        assert!(!options[1].required);
        assert_eq!(options[2].kind, 4);
        assert_eq!(options[2].max_value, Some(ChoiceValue::Integer(5)));
    }

    #[test]
    fn test_subcommands_and_groups() {
        let cog = Cog::new("Config")
            .root(SlashRoot::new("config").guild_only().default_permissions(Permissions::MANAGE_GUILD))
            .handler(
                HandlerSpec::new("language", noop)
                    .subcommand("language")
                    .param(ParamSpec::of::<crate::interaction::Locale>("locale").option("locale")),
            )
            .handler(HandlerSpec::new("timezone", noop).subcommand("user.timezone"));
        let commands = parser().parse(cog);
        assert_eq!(commands.len(), 2);

        assert_eq!(commands[0].name(), "config.language");
        assert_eq!(commands[0].discord_name(), "config language");
        let sub = commands[0].branch().subcommand.as_ref().unwrap();
        assert_eq!(sub.options.len(), 1);
        assert!(commands[0].branch().root.options.is_empty());
        assert!(!commands[0].branch().root.dm_permission);
        assert_eq!(
            commands[0].branch().root.default_member_permissions,
            Some(Permissions::MANAGE_GUILD.bits().to_string())
        );

        assert_eq!(commands[1].name(), "config.user.timezone");
        assert_eq!(commands[1].discord_name(), "config user timezone");
        assert_eq!(commands[1].branch().group.as_ref().unwrap().kind, SUB_COMMAND_GROUP);
    }

    #[test]
    fn test_context_command() {
        let cog = Cog::new("Info").handler(
            HandlerSpec::new("whois", noop)
                .context("whois", ContextKind::User)
                .param(ParamSpec::of::<crate::interaction::Target>("target").contextual()),
        );
        let commands = parser().parse(cog);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].kind(), InteractionKind::User);
        assert_eq!(commands[0].discord_name(), "Who is this?");
        assert_eq!(commands[0].branch().root.kind, USER_CONTEXT);
    }

    #[test]
    fn test_marker_count_is_checked() {
        let parser = parser();
        let none = only_error(&parser, Cog::new("Bad").handler(HandlerSpec::new("none", noop)));
        assert!(matches!(none, BuildError::MarkerCount { found: 0, .. }));

        let two = only_error(
            &parser,
            Cog::new("Bad").handler(HandlerSpec::new("two", noop).slash("ping").context("whois", ContextKind::User)),
        );
        assert!(matches!(two, BuildError::MarkerCount { found: 2, .. }));
    }

    #[test]
    fn test_malformed_and_orphan_subcommands() {
        let parser = parser();
        let orphan = only_error(&parser, Cog::new("Bad").handler(HandlerSpec::new("sub", noop).subcommand("language")));
        assert!(matches!(orphan, BuildError::OrphanSubcommand { .. }));

        let too_deep = only_error(
            &parser,
            Cog::new("Bad")
                .root(SlashRoot::new("config"))
                .handler(HandlerSpec::new("deep", noop).subcommand("a.b.c")),
        );
        assert!(matches!(too_deep, BuildError::MalformedSubcommandId(_)));

        let empty = only_error(
            &parser,
            Cog::new("Bad")
                .root(SlashRoot::new("config"))
                .handler(HandlerSpec::new("empty", noop).subcommand("")),
        );
        assert!(matches!(empty, BuildError::MalformedSubcommandId(_)));
    }

    #[test]
    fn test_missing_translation_is_fatal() {
        let error = only_error(&parser(), Cog::new("Bad").handler(HandlerSpec::new("ghost", noop).slash("ghost")));
        assert!(matches!(error, BuildError::MissingTranslation { .. }));
    }

    #[test]
    fn test_parameter_marker_errors() {
        let parser = parser();
        let both = only_error(
            &parser,
            Cog::new("Bad").handler(
                HandlerSpec::new("ping", noop)
                    .slash("ping")
                    .param(ParamSpec::of::<User>("user").contextual().option("user")),
            ),
        );
        assert!(matches!(both, BuildError::ConflictingParameter { .. }));

        let neither = only_error(
            &parser,
            Cog::new("Bad").handler(HandlerSpec::new("ping", noop).slash("ping").param(ParamSpec::of::<User>("user"))),
        );
        assert!(matches!(neither, BuildError::UnboundParameter { .. }));
    }

    #[test]
    fn test_missing_converter_names_parameter() {
        struct Unconvertible;
        let error = only_error(
            &parser(),
            Cog::new("Bad").handler(
                HandlerSpec::new("ping", noop)
                    .slash("ping")
                    .param(ParamSpec::of::<Unconvertible>("thing").contextual()),
            ),
        );
        match error {
            BuildError::MissingConverter { command, parameter, .. } => {
                assert_eq!(command, "ping");
                assert_eq!(parameter, "thing");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_option_metadata_validation() {
        let parser = parser();
        let range_on_bool = only_error(
            &parser,
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<bool>("note").option("note").int_range(Some(1), None)),
            ),
        );
        assert!(matches!(range_on_bool, BuildError::InvalidOption { .. }));

        let both_completers = only_error(
            &parser,
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop).slash("remind").param(
                    ParamSpec::of::<String>("note")
                        .option("note")
                        .autocomplete_from(["a"])
                        .autocomplete_with(Arc::new(StaticCompleter::new(["b"]))),
                ),
            ),
        );
        assert!(matches!(both_completers, BuildError::InvalidOption { .. }));

        let channel_types_on_string = only_error(
            &parser,
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("note").option("note").channel_types([ChannelKind::Text])),
            ),
        );
        assert!(matches!(channel_types_on_string, BuildError::InvalidOption { .. }));
    }

    #[test]
    fn test_required_option_after_optional_is_rejected() {
        let error = only_error(
            &parser(),
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("note").option("note").optional())
                    .param(ParamSpec::of::<Duration>("delay").option("delay")),
            ),
        );
        match error {
            BuildError::InvalidOption { option, .. } => assert_eq!(option, "remind.options.delay"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_option_names_must_be_unique() {
        let error = only_error(
            &parser(),
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("first").option("note"))
                    .param(ParamSpec::of::<String>("second").option("note")),
            ),
        );
        assert!(matches!(error, BuildError::InvalidOption { .. }));
    }

    #[test]
    fn test_option_count_is_capped() {
        let mut translations = translations();
        for index in 0..=MAX_OPTIONS {
            translations.insert("bot", "en-US", &format!("remind.options.o{}.name", index), &format!("o{}", index));
            translations.insert("bot", "en-US", &format!("remind.options.o{}.description", index), "Filler");
        }
        let parser = parser_with(translations);

        let remind = |count: usize| {
            (0..count).fold(HandlerSpec::new("remind", noop).slash("remind"), |handler, index| {
                handler.param(ParamSpec::of::<String>(format!("p{}", index)).option(format!("o{}", index)).optional())
            })
        };

        let full = parser.parse(Cog::new("Ok").handler(remind(MAX_OPTIONS)));
        assert_eq!(full[0].branch().root.options.len(), MAX_OPTIONS);

        let error = only_error(&parser, Cog::new("Bad").handler(remind(MAX_OPTIONS + 1)));
        match error {
            BuildError::InvalidOption { option, .. } => assert_eq!(option, format!("remind.options.o{}", MAX_OPTIONS)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_choices_are_translated() {
        let commands = parser().parse(
            Cog::new("Reminders").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("unit").option("unit").choice("minutes", "m")),
            ),
        );
        let option = &commands[0].branch().root.options[0];
        assert_eq!(option.choices, vec![Choice::new("Minutes", "m")]);

        let error = only_error(
            &parser(),
            Cog::new("Bad").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("unit").option("unit").choice("minutes", 5i64)),
            ),
        );
        assert!(matches!(error, BuildError::InvalidOption { .. }));
    }

    #[test]
    fn test_autocomplete_indexed_by_option_name() {
        let commands = parser().parse(
            Cog::new("Reminders").handler(
                HandlerSpec::new("remind", noop)
                    .slash("remind")
                    .param(ParamSpec::of::<String>("note").option("note").autocomplete_from(["tea", "coffee"])),
            ),
        );
        let remind = &commands[0];
        assert!(remind.branch().root.options[0].autocomplete);
        assert!(remind.completers.contains_key("note"));
    }

    #[test]
    fn test_one_bad_handler_does_not_block_siblings() {
        let cog = Cog::new("Mixed")
            .handler(HandlerSpec::new("ghost", noop).slash("ghost"))
            .handler(HandlerSpec::new("ping", noop).slash("ping"));
        let commands = parser().parse(cog);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name(), "ping");
    }

    #[test]
    fn test_guess_kind() {
        assert_eq!(guess_kind(TypeTag::of::<i32>()), (OptionKind::Integer, TypeTag::of::<i64>()));
        assert_eq!(guess_kind(TypeTag::of::<f32>()), (OptionKind::Number, TypeTag::of::<f64>()));
        assert_eq!(guess_kind(TypeTag::of::<Member>()), (OptionKind::User, TypeTag::of::<Member>()));
        assert_eq!(guess_kind(TypeTag::of::<Duration>()), (OptionKind::String, TypeTag::of::<String>()));
    }
}
