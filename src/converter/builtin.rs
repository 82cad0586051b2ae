//! Converters every registry starts with.
//!
//! Contextual converters come first so that a `Void` lookup never reaches a
//! general-purpose converter, then parsing converters, then casts.

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serenity::model::id::{ChannelId, RoleId, UserId};
use std::sync::Arc;

use super::time::TimeParser;
use super::{Converter, ConverterRegistry, Numeric};
use crate::error::CommandError;
use crate::interaction::{Channel, Interaction, Locale, Member, Role, Target, User};
use crate::text::{Text, Translator};

pub(crate) fn register_defaults(registry: &ConverterRegistry, translator: Arc<dyn Translator>) -> Result<()> {
    register_contextual(registry);
    register_locale(registry, translator);
    register_time(registry, Arc::new(TimeParser::new()?));
    register_numbers(registry);
    register_entities(registry);
    Ok(())
}

fn guild_only() -> CommandError {
    CommandError::library("exception.guild_only")
}

fn register_contextual(registry: &ConverterRegistry) {
    registry.register(Converter::contextual(|interaction: &Interaction| Ok(interaction.clone())));
    registry.register(Converter::contextual(|interaction: &Interaction| Ok(interaction.user.clone())));
    registry.register(Converter::contextual(|interaction: &Interaction| {
        interaction.member.clone().ok_or_else(guild_only)
    }));
    registry.register(Converter::contextual(|interaction: &Interaction| Ok(interaction.guild_id)));
    registry.register(Converter::contextual(|interaction: &Interaction| {
        interaction.guild_id.ok_or_else(guild_only)
    }));
    registry.register(Converter::contextual(|interaction: &Interaction| Ok(interaction.channel_id)));
    registry.register(Converter::contextual(|interaction: &Interaction| {
        Ok(Locale(interaction.locale.clone()))
    }));
    registry.register(Converter::contextual(|interaction: &Interaction| {
        interaction
            .target
            .clone()
            .ok_or_else(|| CommandError::internal("interaction carries no context-menu target"))
    }));
}

fn register_locale(registry: &ConverterRegistry, translator: Arc<dyn Translator>) {
    registry.register(Converter::new(move |_, input: String| {
        let wanted = input.trim().replace('_', "-");
        translator
            .locales()
            .into_iter()
            .find(|locale| locale.eq_ignore_ascii_case(&wanted))
            .map(Locale)
            .ok_or_else(|| CommandError::user(Text::library("exception.invalid_locale").arg(input.trim())))
    }));
}

fn register_time(registry: &ConverterRegistry, parser: Arc<TimeParser>) {
    let offsets = parser.clone();
    registry.register(Converter::new(move |_, input: String| {
        offsets
            .offset(&input)
            .ok_or_else(|| CommandError::user(Text::library("exception.invalid_timezone").arg(input.trim())))
    }));

    let durations = parser.clone();
    registry.register(Converter::new(move |_, input: String| -> Result<Duration, CommandError> {
        durations.duration(&input)
    }));

    registry.register(Converter::new(move |_, input: String| {
        parser.date_time(&input, Utc::now())
    }));
    registry.register(Converter::new(|_, moment: DateTime<FixedOffset>| {
        Ok(moment.with_timezone(&Utc))
    }));
    registry.register(Converter::new(|_, moment: DateTime<FixedOffset>| Ok(moment.naive_local())));
    registry.register(Converter::new(|_, moment: NaiveDateTime| -> Result<NaiveDate, CommandError> {
        Ok(moment.date())
    }));
    registry.register(Converter::new(|_, moment: NaiveDateTime| -> Result<NaiveTime, CommandError> {
        Ok(moment.time())
    }));
}

fn out_of_range(number: Numeric) -> CommandError {
    CommandError::user(Text::library("exception.number_range").arg(number))
}

fn integer<T: TryFrom<i64>>(number: Numeric) -> Result<T, CommandError> {
    number
        .as_i64()
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| out_of_range(number))
}

fn register_numbers(registry: &ConverterRegistry) {
    registry.register(Converter::numeric(|_, number| integer::<i64>(number)));
    registry.register(Converter::numeric(|_, number| integer::<i32>(number)));
    registry.register(Converter::numeric(|_, number| integer::<i16>(number)));
    registry.register(Converter::numeric(|_, number| integer::<i8>(number)));
    registry.register(Converter::numeric(|_, number: Numeric| Ok(number.as_f64())));
    registry.register(Converter::numeric(|_, number: Numeric| {
        let value = number.as_f64();
        if value.is_finite() && value.abs() > f64::from(f32::MAX) {
            Err(out_of_range(number))
        } else {
            Ok(value as f32)
        }
    }));
}

fn register_entities(registry: &ConverterRegistry) {
    registry.register(Converter::new(|interaction: &Interaction, user: User| {
        interaction
            .resolved_members
            .get(&user.id)
            .cloned()
            .ok_or_else(|| CommandError::library("exception.member_not_found"))
    }));
    registry.register(Converter::new(|_, member: Member| Ok(member.user)));
    registry.register(Converter::new(|_, user: User| -> Result<UserId, CommandError> { Ok(user.id) }));
    registry.register(Converter::new(|_, role: Role| -> Result<RoleId, CommandError> { Ok(role.id) }));
    registry.register(Converter::new(|_, channel: Channel| -> Result<ChannelId, CommandError> {
        Ok(channel.id)
    }));
    registry.register(Converter::new(|_, target: Target| match target {
        Target::User(user, _) => Ok(user),
        Target::Message(message) => Ok(message.author),
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{TypeTag, Void};
    use crate::interaction::{InteractionKind, OptionValue};
    use crate::text::StaticTranslations;
    use serenity::model::id::GuildId;

    fn registry() -> ConverterRegistry {
        let translations = StaticTranslations::default().with("bot", "fr", "ping.name", "sonde");
        ConverterRegistry::with_defaults(Arc::new(translations)).unwrap()
    }

    fn interaction() -> Interaction {
        Interaction::new(InteractionKind::Slash, "test", User::new(1, "piggy"))
    }

    fn contextual<T: 'static>(registry: &ConverterRegistry, interaction: &Interaction) -> Result<T, CommandError> {
        registry
            .find_chain(TypeTag::of::<Void>(), TypeTag::of::<T>())
            .expect("contextual converter")
            .convert_into(interaction, Box::new(Void))
    }

    fn convert<I: Send + Sync + 'static, T: 'static>(registry: &ConverterRegistry, input: I) -> Result<T, CommandError> {
        registry
            .find_chain(TypeTag::of::<I>(), TypeTag::of::<T>())
            .expect("conversion path")
            .convert_into(&interaction(), Box::new(input))
    }

    #[test]
    fn test_contextual_user_and_guild() {
        let registry = registry();
        let direct = interaction();
        let user: User = contextual(&registry, &direct).unwrap();
        assert_eq!(user.name, "piggy");

        let scope: Option<GuildId> = contextual(&registry, &direct).unwrap();
        assert_eq!(scope, None);
        assert!(matches!(contextual::<GuildId>(&registry, &direct), Err(CommandError::User(_))));
        assert!(matches!(contextual::<Member>(&registry, &direct), Err(CommandError::User(_))));

        let guild = interaction().in_guild(GuildId(5));
        let member: Member = contextual(&registry, &guild).unwrap();
        assert_eq!(member.guild_id, GuildId(5));
    }

    #[test]
    fn test_contextual_locale() {
        let registry = registry();
        let locale: Locale = contextual(&registry, &interaction().with_locale("fr")).unwrap();
        assert_eq!(locale.as_str(), "fr");
    }

    #[test]
    fn test_missing_target_is_internal_error() {
        let registry = registry();
        assert!(matches!(
            contextual::<Target>(&registry, &interaction()),
            Err(CommandError::Internal(_))
        ));
    }

    #[test]
    fn test_locale_from_string() {
        let registry = registry();
        let locale: Locale = convert(&registry, "EN_us".to_string()).unwrap();
        assert_eq!(locale.as_str(), "en-US");
        assert!(convert::<String, Locale>(&registry, "xx".to_string()).is_err());
    }

    #[test]
    fn test_number_narrowing() {
        let registry = registry();
        assert_eq!(convert::<i64, i32>(&registry, 42).unwrap(), 42);
        assert_eq!(convert::<f64, i64>(&registry, 9.7).unwrap(), 9);
        assert!(convert::<i64, i8>(&registry, 300).is_err());
        assert_eq!(convert::<i64, f64>(&registry, 3).unwrap(), 3.0);
    }

    #[test]
    fn test_string_to_date_chains_through_date_time() {
        let registry = registry();
        let chain = registry
            .find_chain(TypeTag::of::<String>(), TypeTag::of::<NaiveDate>())
            .unwrap();
        assert_eq!(chain.len(), 3);

        let date: NaiveDate = chain
            .convert_into(&interaction(), Box::new("2030-04-05 10am".to_string()))
            .unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2030, 4, 5).unwrap());
    }

    #[test]
    fn test_user_to_member_uses_resolved_members() {
        let registry = registry();
        let kermit = User::new(7, "kermit");
        let member = Member {
            user: kermit.clone(),
            guild_id: GuildId(5),
            nick: None,
            roles: Vec::new(),
        };
        let with_member = interaction()
            .in_guild(GuildId(5))
            .with_option("user", OptionValue::User(kermit.clone(), Some(member.clone())));

        let chain = registry
            .find_chain(TypeTag::of::<User>(), TypeTag::of::<Member>())
            .unwrap();
        let resolved: Member = chain
            .convert_into(&with_member, Box::new(kermit.clone()))
            .unwrap();
        assert_eq!(resolved, member);

        let missing = chain.convert(&interaction(), Box::new(kermit));
        assert!(matches!(missing, Err(CommandError::User(_))));
    }

    #[test]
    fn test_member_to_user_id_chains() {
        let registry = registry();
        let member = Member {
            user: User::new(9, "gonzo"),
            guild_id: GuildId(5),
            nick: None,
            roles: Vec::new(),
        };
        let id: UserId = convert(&registry, member).unwrap();
        assert_eq!(id, UserId(9));
    }
}
