use anyhow::Result;
use chrono::{Duration, FixedOffset, Utc};
use log::{error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::Interaction as GatewayInteraction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::ChannelId;
use serenity::model::permissions::Permissions;
use serenity::prelude::*;
use std::sync::Arc;
use tokio::runtime::Handle;
use ulid::Ulid;

use cogwork::commands::{
    Arguments, Cog, CommandManager, ContextKind, HandlerSpec, LocaleCompleter, OptionKind, ParamSpec, Response,
    SlashRoot,
};
use cogwork::config::Config;
use cogwork::converter::ConverterRegistry;
use cogwork::error::CommandError;
use cogwork::gateway::DiscordGateway;
use cogwork::interaction::{Interaction, Locale, Target, User};
use cogwork::listener::{TemporaryListener, TemporaryListenerExecutor};
use cogwork::text::{StaticTranslations, Text, Translator};

const DEMO: &str = "demo";

const DEMO_STRINGS: &[(&str, &str, &str)] = &[
    ("en-US", "ping.name", "ping"),
    ("en-US", "ping.description", "Check that the bot is alive"),
    ("en-US", "ping.reply", "🏓 Pong!"),
    ("fr", "ping.reply", "🏓 Pong !"),
    ("en-US", "remind.name", "remind"),
    ("en-US", "remind.description", "Remind you about something later"),
    ("en-US", "remind.options.delay.name", "in"),
    ("en-US", "remind.options.delay.description", "How long to wait, e.g. 1h30m"),
    ("en-US", "remind.options.note.name", "note"),
    ("en-US", "remind.options.note.description", "What to remind you about"),
    ("en-US", "remind.scheduled", "⏰ I'll remind you in {0}. Say `cancel` to call it off."),
    ("en-US", "remind.past", "That moment has already passed."),
    ("en-US", "config.name", "config"),
    ("en-US", "config.description", "Personal settings"),
    ("en-US", "config.language.name", "language"),
    ("en-US", "config.language.description", "Pick the language I answer in"),
    ("en-US", "config.language.options.locale.name", "locale"),
    ("en-US", "config.language.options.locale.description", "Language code"),
    ("en-US", "config.language.reply", "🌐 Language set to {0}"),
    ("fr", "config.language.reply", "🌐 Langue réglée sur {0}"),
    ("en-US", "config.timezone.name", "timezone"),
    ("en-US", "config.timezone.description", "Tell me your UTC offset"),
    ("en-US", "config.timezone.options.offset.name", "offset"),
    ("en-US", "config.timezone.options.offset.description", "For example +02:00 or UTC-5"),
    ("en-US", "config.timezone.reply", "🕒 It is {0} for you"),
    ("en-US", "whois.name", "Who is this?"),
    ("en-US", "whois.reply", "{0} goes by **{1}**{2}"),
    ("en-US", "guess.name", "guess"),
    ("en-US", "guess.description", "Guess the number I'm thinking of"),
    ("en-US", "guess.options.max.name", "max"),
    ("en-US", "guess.options.max.description", "Highest possible number"),
    ("en-US", "guess.prompt", "🎲 I'm thinking of a number from 1 to {0}. Reply within 30 seconds!"),
];

#[derive(Clone)]
struct Demo {
    listeners: TemporaryListenerExecutor,
    http: Arc<Http>,
}

impl Demo {
    /// Sends `content` to `channel` without blocking the caller.
    fn say(&self, runtime: &Handle, channel: ChannelId, content: String) {
        let http = self.http.clone();
        runtime.spawn(async move {
            if let Err(e) = channel.say(&http, content).await {
                error!("❌ Failed to send message to {}: {}", channel, e);
            }
        });
    }
}

async fn ping(_: Interaction, _: Arguments) -> Result<Response, CommandError> {
    Ok(Response::text(Text::localized(DEMO, "ping.reply")))
}

async fn remind(demo: Demo, _: Interaction, mut arguments: Arguments) -> Result<Response, CommandError> {
    let user: User = arguments.next()?;
    let channel: ChannelId = arguments.next()?;
    let delay: Duration = arguments.next()?;
    let note: Option<String> = arguments.next_optional()?;

    if delay <= Duration::zero() {
        return Err(CommandError::user(Text::localized(DEMO, "remind.past")));
    }
    let ttl = delay.to_std().map_err(CommandError::internal)?;

    let runtime = Handle::current();
    let reminder = format!(
        "⏰ {} {}",
        user.mention(),
        note.unwrap_or_else(|| "you asked me to remind you.".to_string())
    );
    let (cancel_demo, cancel_runtime) = (demo.clone(), runtime.clone());
    let (timeout_demo, timeout_runtime) = (demo.clone(), runtime);
    let listener = TemporaryListener::builder::<Message>()
        .predicate(move |message: &Message| {
            message.author.id == user.id
                && message.channel_id == channel
                && message.content.trim().eq_ignore_ascii_case("cancel")
        })
        .callback(move |message: &Message| {
            cancel_demo.say(&cancel_runtime, message.channel_id, "🛑 Reminder cancelled.".to_string());
            Ok(())
        })
        .on_timeout(move || timeout_demo.say(&timeout_runtime, channel, reminder))
        .ttl(ttl)
        .build()
        .map_err(|e| CommandError::Internal(e.into()))?;
    demo.listeners.register(listener)?;

    Ok(Response::ephemeral(
        Text::localized(DEMO, "remind.scheduled").arg(format!("{}s", delay.num_seconds())),
    ))
}

async fn language(_: Interaction, mut arguments: Arguments) -> Result<Response, CommandError> {
    let locale: Locale = arguments.next()?;
    Ok(Response::ephemeral(
        Text::localized(DEMO, "config.language.reply").arg(locale.as_str()),
    ))
}

async fn timezone(_: Interaction, mut arguments: Arguments) -> Result<Response, CommandError> {
    let offset: FixedOffset = arguments.next()?;
    let now = Utc::now().with_timezone(&offset);
    Ok(Response::ephemeral(
        Text::localized(DEMO, "config.timezone.reply").arg(now.format("%H:%M (%:z)")),
    ))
}

async fn whois(_: Interaction, mut arguments: Arguments) -> Result<Response, CommandError> {
    let target: Target = arguments.next()?;
    let (user, member) = match target {
        Target::User(user, member) => (user, member),
        Target::Message(message) => (message.author, None),
    };
    let display = member
        .as_ref()
        .map_or(user.name.as_str(), |member| member.display_name())
        .to_string();
    let bot = if user.bot { " 🤖" } else { "" };
    Ok(Response::message(
        Text::localized(DEMO, "whois.reply").arg(user.mention()).arg(display).arg(bot),
        |reply| {
            reply.ephemeral = true;
            reply.suppress_mentions = true;
        },
    ))
}

async fn guess(demo: Demo, _: Interaction, mut arguments: Arguments) -> Result<Response, CommandError> {
    let user: User = arguments.next()?;
    let channel: ChannelId = arguments.next()?;
    let max = arguments.next_optional::<i64>()?.unwrap_or(10).max(2);
    let secret = (Ulid::new().random() % max as u128) as i64 + 1;

    let runtime = Handle::current();
    let (answer_demo, answer_runtime) = (demo.clone(), runtime.clone());
    let (timeout_demo, timeout_runtime) = (demo.clone(), runtime);
    let listener = TemporaryListener::builder::<Message>()
        .predicate(move |message: &Message| {
            message.author.id == user.id
                && message.channel_id == channel
                && message.content.trim().parse::<i64>().is_ok()
        })
        .callback(move |message: &Message| {
            let guessed: i64 = message.content.trim().parse()?;
            let verdict = if guessed == secret {
                format!("🎉 {} got it, the number was {}!", message.author.name, secret)
            } else {
                format!("❌ Not quite, I was thinking of {}.", secret)
            };
            answer_demo.say(&answer_runtime, message.channel_id, verdict);
            Ok(())
        })
        .on_timeout(move || {
            timeout_demo.say(&timeout_runtime, channel, format!("⌛ Time's up! It was {}.", secret));
        })
        .ttl(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| CommandError::Internal(e.into()))?;
    demo.listeners.register(listener)?;

    Ok(Response::text(Text::localized(DEMO, "guess.prompt").arg(max)))
}

fn cogs(demo: &Demo, translator: Arc<dyn Translator>) -> Vec<Cog> {
    let reminders = demo.clone();
    let games = demo.clone();
    vec![
        Cog::new("Utility")
            .namespace(DEMO)
            .handler(HandlerSpec::new("ping", ping).slash("ping"))
            .handler(
                HandlerSpec::new("whois", whois)
                    .context("whois", ContextKind::User)
                    .param(ParamSpec::of::<Target>("target").contextual()),
            ),
        Cog::new("Reminders").namespace(DEMO).handler(
            HandlerSpec::new("remind", move |interaction, arguments| {
                remind(reminders.clone(), interaction, arguments)
            })
            .slash("remind")
            .param(ParamSpec::of::<User>("user").contextual())
            .param(ParamSpec::of::<ChannelId>("channel").contextual())
            .param(ParamSpec::of::<Duration>("delay").option("delay"))
            .param(
                ParamSpec::of::<String>("note")
                    .option("note")
                    .optional()
                    .length_range(Some(1), Some(200)),
            ),
        ),
        Cog::new("Config")
            .namespace(DEMO)
            .root(SlashRoot::new("config").default_permissions(Permissions::SEND_MESSAGES))
            .handler(
                HandlerSpec::new("language", language)
                    .subcommand("language")
                    .param(
                        ParamSpec::of::<Locale>("locale")
                            .option("locale")
                            .autocomplete_with(Arc::new(LocaleCompleter::new(translator))),
                    ),
            )
            .handler(
                HandlerSpec::new("timezone", timezone)
                    .subcommand("timezone")
                    .param(ParamSpec::of::<FixedOffset>("offset").option("offset")),
            ),
        Cog::new("Games").namespace(DEMO).handler(
            HandlerSpec::new("guess", move |interaction, arguments| guess(games.clone(), interaction, arguments))
                .slash("guess")
                .param(ParamSpec::of::<User>("user").contextual())
                .param(ParamSpec::of::<ChannelId>("channel").contextual())
                .param(
                    ParamSpec::of::<i64>("max")
                        .option("max")
                        .optional()
                        .kind(OptionKind::Integer)
                        .int_range(Some(2), Some(100)),
                ),
        ),
    ]
}

struct Handler {
    manager: Arc<CommandManager>,
    gateway: Arc<DiscordGateway>,
    listeners: TemporaryListenerExecutor,
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, _ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        self.listeners.on_event(&msg);
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("📡 Connected to {} guilds", ready.guilds.len());

        self.gateway.set_application_id(ready.application.id.0);
        if let Err(e) = self.manager.publish_all().await {
            error!("❌ Failed to publish commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, _ctx: Context, interaction: GatewayInteraction) {
        match interaction {
            GatewayInteraction::ApplicationCommand(command) => {
                let outcome = self.manager.dispatch(Interaction::from(&command)).await;
                info!("Command '{}' from {}: {:?}", command.data.name, command.user.name, outcome);
            }
            GatewayInteraction::Autocomplete(autocomplete) => {
                self.manager.autocomplete(Interaction::from(&autocomplete)).await;
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level)).init();

    info!("Starting cogwork demo bot...");

    let mut translations = StaticTranslations::new(config.default_locale.as_str());
    for (locale, key, value) in DEMO_STRINGS {
        translations.insert(DEMO, locale, key, value);
    }
    if let Some(path) = &config.translations_path {
        let loaded = translations.load_file(path)?;
        info!("📚 Loaded {} translation(s) from {}", loaded, path);
    }
    let translator: Arc<dyn Translator> = Arc::new(translations);

    let converters = Arc::new(ConverterRegistry::with_defaults(translator.clone())?);
    let http = Arc::new(Http::new(&config.discord_token));
    let gateway = Arc::new(DiscordGateway::new(http.clone()));
    let manager = Arc::new(CommandManager::new(
        gateway.clone(),
        translator.clone(),
        converters,
        config.namespace.clone(),
    ));
    let listeners = TemporaryListenerExecutor::new();

    let demo = Demo {
        listeners: listeners.clone(),
        http,
    };
    for cog in cogs(&demo, translator) {
        let cog = match config.dev_guild_id {
            Some(guild) => cog.guild(guild),
            None => cog,
        };
        if manager.register_cog(cog).await == 0 {
            warn!("⚠️ A demo cog registered no commands");
        }
    }

    let handler = Handler {
        manager,
        gateway,
        listeners,
    };

    let intents = GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| anyhow::anyhow!("Client creation failed: {}", e))?;

    info!("Connecting to Discord gateway...");
    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {:?}", why);
        return Err(anyhow::anyhow!("Failed to establish gateway connection: {}", why));
    }

    Ok(())
}
